//! Outward events broadcast by a form instance.
//!
//! Hosts subscribe through [`crate::engine::DynamicForm::subscribe`] and
//! receive one event per completed operation. Delivery is fan-out to all
//! current subscribers in subscription order.

use serde_json::Value;

#[derive(Debug, Clone)]
pub enum FormEvent {
    /// A remote configuration was fetched, validated and materialized.
    ConfigLoaded { url: String },
    /// A subtree was inserted into the named container at runtime.
    ElementAdded {
        key: String,
        target_container_id: String,
    },
    /// The subtree registered under `key` was detached and destroyed.
    ElementRemoved { key: String },
    /// A control's value changed (user input or population).
    ValueChanged { key: String, value: Value },
    /// The form was submitted while valid; carries the full value tree.
    Submit { value: Value },
    Cancel,
    Reset,
}
