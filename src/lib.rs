//! # Proteus: schema-driven form assembly
//!
//! Proteus turns a declarative JSON form configuration into a live,
//! validated, mutable control tree and back into data.
//!
//! ## Features
//!
//! - **Strict schema validation**: untyped JSON in, typed [`domain::FormConfig`]
//!   or an ordered violation list with dotted paths out
//! - **Validator registry**: `required`, length/item bounds, `pattern`,
//!   `inArray`, `email`, numeric bounds, and debounced backend validation
//! - **Control tree**: recursive materialization into value/group/array
//!   nodes with globally unique qualified keys
//! - **Runtime mutation**: insert or remove subtrees by container id
//! - **Data population**: deep-patch broadcast with array resizing
//! - **Remote loading**: TTL-cached config/option fetches with exponential
//!   backoff and an observable loading state
//! - **Performance budgets**: build-time and field-count warnings
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use proteus::engine::DynamicForm;
//! use proteus::schema::validate_config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let raw = serde_json::json!({
//!         "elements": [
//!             {"key": "name", "type": "input", "validators": [{"name": "required"}]}
//!         ]
//!     });
//!     let config = validate_config(&raw).map_err(|v| anyhow::anyhow!("{v:?}"))?;
//!     let form = DynamicForm::from_config(config)?;
//!     form.set_value("name", "Ada".into()).await?;
//!     assert!(form.is_valid().await);
//!     Ok(())
//! }
//! ```
//!
//! Rendering, styling and dependency injection are host concerns; this crate
//! only owns the tree, its validation state, and the data flowing through it.

pub mod cli;
pub mod domain;
pub mod engine;
pub mod error;
pub mod perf;
pub mod remote;
pub mod schema;
pub mod tree;
pub mod validators;

pub use domain::{FormConfig, FormElement, FormEvent};
pub use engine::DynamicForm;
pub use error::FormError;
pub use remote::FormLoader;
