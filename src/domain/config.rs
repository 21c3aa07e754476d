//! Typed form configuration tree.
//!
//! A [`FormConfig`] is the declarative description of a form: a recursive
//! tree of [`FormElement`] nodes plus an optional row of [`FormButton`]s.
//! Instances are produced by the schema validator from untyped JSON and are
//! immutable from the builder's point of view: building a control tree never
//! mutates the config it was built from.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Complete form configuration: the root of the declarative tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FormConfig {
    pub elements: Vec<FormElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<FormButton>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submit_callback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// One node of the form tree.
///
/// `key` must be unique among its siblings; the dotted chain of parent keys
/// forms the node's qualified key in the built control tree. `type` selects
/// the node-construction strategy, `children` is only legal on container
/// types, and `multiple` is only legal on the primitive `input`/`select`
/// types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FormElement {
    pub key: String,
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validators: Option<Vec<ElementValidator>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FormElementOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiple_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FormElement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

impl FormElement {
    pub fn has_children(&self) -> bool {
        self.children.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }

    /// Finds a validator entry by registry name.
    pub fn validator(&self, name: &str) -> Option<&ElementValidator> {
        self.validators
            .as_ref()
            .and_then(|vs| vs.iter().find(|v| v.name == name))
    }

    /// Reads a boolean flag out of the free-form `settings` object.
    pub fn settings_flag(&self, key: &str) -> bool {
        self.settings
            .as_ref()
            .and_then(|s| s.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Reads a string out of the free-form `settings` object.
    pub fn settings_str(&self, key: &str) -> Option<&str> {
        self.settings
            .as_ref()
            .and_then(|s| s.get(key))
            .and_then(Value::as_str)
    }
}

/// An option entry for choice elements (`select`, `radio-group`, …).
/// `value` may be null for placeholder options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormElementOption {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A validation rule attached to an element.
///
/// `name` selects a rule from the validator registry; `value` is its
/// parameter. The `async*` fields only apply to the `asyncBackend` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ElementValidator {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, rename = "async", skip_serializing_if = "Option::is_none")]
    pub is_async: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_trigger: Option<AsyncTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub async_debounce_time: Option<u64>,
}

/// When a backend validator fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AsyncTrigger {
    Blur,
    #[default]
    Debounce,
}

/// A form-level button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FormButton {
    pub key: String,
    #[serde(rename = "type")]
    pub button_type: ButtonType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<FormButtonCallback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ButtonSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonType {
    Submit,
    Reset,
    Button,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct FormButtonCallback {
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ButtonSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_if_form_invalid: Option<bool>,
}
