//! Strict schema validation for untyped form configurations.
//!
//! [`validate_config`] takes arbitrary parsed JSON and either returns the
//! typed [`FormConfig`] or an ordered list of [`SchemaViolation`]s with
//! dotted paths (`elements.0.children.2.key`) so a host can pinpoint the
//! offending node. The shape is strict: unknown fields anywhere in the tree
//! are violations, validator names must be registry keys, and `children` is
//! only accepted on container types. Duplicate sibling keys are rejected
//! here because they would break the qualified-key uniqueness invariant of
//! the built control tree.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::domain::FormConfig;

/// Hard recursion limit. JSON cannot encode cycles, but the walk refuses
/// pathological nesting instead of overflowing the stack.
pub const MAX_DEPTH: usize = 64;

/// Element types that produce a single value control.
pub const VALUE_TYPES: &[&str] = &[
    "input",
    "select",
    "checkbox",
    "radio-group",
    "key-value",
    "textarea",
    "data-select",
    "data-relation",
];

/// Element types that produce a keyed group of child controls.
pub const GROUP_TYPES: &[&str] = &[
    "fieldset",
    "card",
    "formGroup",
    "row",
    "col",
    "tabContainer",
    "tabPane",
];

/// Element types that produce an ordered array of child groups.
pub const ARRAY_TYPES: &[&str] = &["repeater"];

/// Element types that render content but own no control.
pub const DISPLAY_TYPES: &[&str] = &["form-text"];

const CONTROL_TYPES: &[&str] = &[
    "text",
    "number",
    "email",
    "password",
    "date",
    "datetime-local",
    "time",
    "week",
    "month",
    "search",
    "tel",
    "phone",
    "url",
];

const VALIDATOR_NAMES: &[&str] = &[
    "required",
    "email",
    "minLength",
    "maxLength",
    "pattern",
    "minItems",
    "maxItems",
    "inArray",
    "minNumber",
    "maxNumber",
    "asyncBackend",
];

const CONFIG_FIELDS: &[&str] = &["elements", "buttons", "submitCallback", "settings"];
const ELEMENT_FIELDS: &[&str] = &[
    "key",
    "type",
    "value",
    "label",
    "required",
    "validators",
    "options",
    "multiple",
    "multipleLabel",
    "controlType",
    "settings",
    "children",
    "class",
    "helpText",
    "order",
];
const VALIDATOR_FIELDS: &[&str] = &[
    "name",
    "value",
    "errorMessage",
    "async",
    "asyncUrl",
    "asyncTrigger",
    "asyncDebounceTime",
];
const OPTION_FIELDS: &[&str] = &["value", "label"];
const BUTTON_FIELDS: &[&str] = &["key", "type", "label", "callback", "settings"];
const BUTTON_TYPES: &[&str] = &["submit", "reset", "button", "cancel"];
const CALLBACK_FIELDS: &[&str] = &["function", "params"];
const BUTTON_SETTINGS_FIELDS: &[&str] = &["disableIfFormInvalid"];

/// One schema violation, addressed by a dotted path into the raw JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
    pub code: String,
}

/// Whether an element type may carry `children`.
pub fn is_container_type(element_type: &str) -> bool {
    GROUP_TYPES.contains(&element_type) || ARRAY_TYPES.contains(&element_type)
}

/// Whether an element type is recognized at all.
pub fn is_known_type(element_type: &str) -> bool {
    VALUE_TYPES.contains(&element_type)
        || is_container_type(element_type)
        || DISPLAY_TYPES.contains(&element_type)
}

/// Validates arbitrary JSON against the form-config schema.
///
/// Returns the typed config on success, or every violation found (ordered by
/// position in the document) on failure.
pub fn validate_config(raw: &Value) -> Result<FormConfig, Vec<SchemaViolation>> {
    let mut violations = Vec::new();

    let Some(object) = raw.as_object() else {
        return Err(vec![violation("", "expected an object", "invalid_type")]);
    };

    check_unknown_fields(object, CONFIG_FIELDS, "", &mut violations);

    match object.get("elements") {
        Some(Value::Array(elements)) => {
            check_sibling_keys(elements, "elements", &mut violations);
            for (index, element) in elements.iter().enumerate() {
                validate_element(element, &format!("elements.{index}"), 0, &mut violations);
            }
        }
        Some(_) => violations.push(violation("elements", "expected an array", "invalid_type")),
        None => violations.push(violation("elements", "field is required", "missing_field")),
    }

    match object.get("buttons") {
        None => {}
        Some(Value::Array(buttons)) => {
            for (index, button) in buttons.iter().enumerate() {
                validate_button(button, &format!("buttons.{index}"), &mut violations);
            }
        }
        Some(_) => violations.push(violation("buttons", "expected an array", "invalid_type")),
    }

    if let Some(callback) = object.get("submitCallback") {
        if !callback.is_string() {
            violations.push(violation("submitCallback", "expected a string", "invalid_type"));
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    // The walk above guarantees the shape; deserialization failing here would
    // mean the walk and the types drifted apart.
    serde_json::from_value(raw.clone())
        .map_err(|err| vec![violation("", &err.to_string(), "invalid_type")])
}

fn validate_element(raw: &Value, path: &str, depth: usize, violations: &mut Vec<SchemaViolation>) {
    if depth > MAX_DEPTH {
        violations.push(violation(path, "maximum nesting depth exceeded", "max_depth_exceeded"));
        return;
    }

    let Some(object) = raw.as_object() else {
        violations.push(violation(path, "expected an object", "invalid_type"));
        return;
    };

    check_unknown_fields(object, ELEMENT_FIELDS, path, violations);

    match object.get("key") {
        Some(Value::String(_)) => {}
        Some(_) => violations.push(violation(
            &format!("{path}.key"),
            "expected a string",
            "invalid_type",
        )),
        None => violations.push(violation(
            &format!("{path}.key"),
            "field is required",
            "missing_field",
        )),
    }

    let element_type = match object.get("type") {
        Some(Value::String(t)) => {
            if !is_known_type(t) {
                violations.push(violation(
                    &format!("{path}.type"),
                    &format!("unrecognized element type '{t}'"),
                    "unrecognized_type",
                ));
            }
            Some(t.as_str())
        }
        Some(_) => {
            violations.push(violation(
                &format!("{path}.type"),
                "expected a string",
                "invalid_type",
            ));
            None
        }
        None => {
            violations.push(violation(
                &format!("{path}.type"),
                "field is required",
                "missing_field",
            ));
            None
        }
    };

    expect_string(object, "label", path, violations);
    expect_string(object, "class", path, violations);
    expect_string(object, "helpText", path, violations);
    expect_string(object, "multipleLabel", path, violations);
    expect_bool(object, "required", path, violations);
    expect_bool(object, "multiple", path, violations);
    expect_number(object, "order", path, violations);

    if let Some(control_type) = object.get("controlType") {
        match control_type.as_str() {
            Some(t) if CONTROL_TYPES.contains(&t) => {}
            Some(t) => violations.push(violation(
                &format!("{path}.controlType"),
                &format!("'{t}' is not a valid control type"),
                "invalid_enum_value",
            )),
            None => violations.push(violation(
                &format!("{path}.controlType"),
                "expected a string",
                "invalid_type",
            )),
        }
    }

    match object.get("validators") {
        None => {}
        Some(Value::Array(validators)) => {
            for (index, entry) in validators.iter().enumerate() {
                validate_validator(entry, &format!("{path}.validators.{index}"), violations);
            }
        }
        Some(_) => violations.push(violation(
            &format!("{path}.validators"),
            "expected an array",
            "invalid_type",
        )),
    }

    match object.get("options") {
        None => {}
        Some(Value::Array(options)) => {
            for (index, entry) in options.iter().enumerate() {
                validate_option(entry, &format!("{path}.options.{index}"), violations);
            }
        }
        Some(_) => violations.push(violation(
            &format!("{path}.options"),
            "expected an array",
            "invalid_type",
        )),
    }

    match object.get("children") {
        None => {}
        Some(Value::Array(children)) => {
            if let Some(t) = element_type {
                if !is_container_type(t) {
                    violations.push(violation(
                        &format!("{path}.children"),
                        &format!("element type '{t}' does not accept children"),
                        "children_not_allowed",
                    ));
                }
            }
            let child_path = format!("{path}.children");
            check_sibling_keys(children, &child_path, violations);
            for (index, child) in children.iter().enumerate() {
                validate_element(child, &format!("{child_path}.{index}"), depth + 1, violations);
            }
        }
        Some(_) => violations.push(violation(
            &format!("{path}.children"),
            "expected an array",
            "invalid_type",
        )),
    }
}

fn validate_validator(raw: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    let Some(object) = raw.as_object() else {
        violations.push(violation(path, "expected an object", "invalid_type"));
        return;
    };

    check_unknown_fields(object, VALIDATOR_FIELDS, path, violations);

    let name = match object.get("name") {
        Some(Value::String(name)) => {
            if !VALIDATOR_NAMES.contains(&name.as_str()) {
                violations.push(violation(
                    &format!("{path}.name"),
                    &format!("unrecognized validator '{name}'"),
                    "unrecognized_validator",
                ));
            }
            Some(name.as_str())
        }
        Some(_) => {
            violations.push(violation(
                &format!("{path}.name"),
                "expected a string",
                "invalid_type",
            ));
            None
        }
        None => {
            violations.push(violation(
                &format!("{path}.name"),
                "field is required",
                "missing_field",
            ));
            None
        }
    };

    expect_string(object, "errorMessage", path, violations);
    expect_string(object, "asyncUrl", path, violations);
    expect_bool(object, "async", path, violations);
    expect_number(object, "asyncDebounceTime", path, violations);

    if let Some(trigger) = object.get("asyncTrigger") {
        match trigger.as_str() {
            Some("blur") | Some("debounce") => {}
            _ => violations.push(violation(
                &format!("{path}.asyncTrigger"),
                "expected 'blur' or 'debounce'",
                "invalid_enum_value",
            )),
        }
    }

    if name == Some("asyncBackend") && !object.get("asyncUrl").map(Value::is_string).unwrap_or(false)
    {
        violations.push(violation(
            &format!("{path}.asyncUrl"),
            "asyncBackend requires an asyncUrl",
            "missing_field",
        ));
    }
}

fn validate_option(raw: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    let Some(object) = raw.as_object() else {
        violations.push(violation(path, "expected an object", "invalid_type"));
        return;
    };

    check_unknown_fields(object, OPTION_FIELDS, path, violations);

    if let Some(value) = object.get("value") {
        if !(value.is_string() || value.is_number() || value.is_boolean() || value.is_null()) {
            violations.push(violation(
                &format!("{path}.value"),
                "expected a string, number, boolean or null",
                "invalid_type",
            ));
        }
    }
    expect_string(object, "label", path, violations);
}

fn validate_button(raw: &Value, path: &str, violations: &mut Vec<SchemaViolation>) {
    let Some(object) = raw.as_object() else {
        violations.push(violation(path, "expected an object", "invalid_type"));
        return;
    };

    check_unknown_fields(object, BUTTON_FIELDS, path, violations);

    match object.get("key") {
        Some(Value::String(_)) => {}
        Some(_) => violations.push(violation(
            &format!("{path}.key"),
            "expected a string",
            "invalid_type",
        )),
        None => violations.push(violation(
            &format!("{path}.key"),
            "field is required",
            "missing_field",
        )),
    }

    match object.get("type").and_then(Value::as_str) {
        Some(t) if BUTTON_TYPES.contains(&t) => {}
        Some(t) => violations.push(violation(
            &format!("{path}.type"),
            &format!("'{t}' is not a valid button type"),
            "invalid_enum_value",
        )),
        None => violations.push(violation(
            &format!("{path}.type"),
            "expected one of submit, reset, button, cancel",
            "missing_field",
        )),
    }

    expect_string(object, "label", path, violations);

    if let Some(callback) = object.get("callback") {
        let callback_path = format!("{path}.callback");
        match callback.as_object() {
            Some(cb) => {
                check_unknown_fields(cb, CALLBACK_FIELDS, &callback_path, violations);
                match cb.get("function") {
                    Some(Value::String(_)) => {}
                    _ => violations.push(violation(
                        &format!("{callback_path}.function"),
                        "expected a string",
                        "missing_field",
                    )),
                }
                if let Some(params) = cb.get("params") {
                    if !params.is_array() {
                        violations.push(violation(
                            &format!("{callback_path}.params"),
                            "expected an array",
                            "invalid_type",
                        ));
                    }
                }
            }
            None => violations.push(violation(&callback_path, "expected an object", "invalid_type")),
        }
    }

    if let Some(settings) = object.get("settings") {
        let settings_path = format!("{path}.settings");
        match settings.as_object() {
            Some(s) => {
                check_unknown_fields(s, BUTTON_SETTINGS_FIELDS, &settings_path, violations);
                expect_bool(s, "disableIfFormInvalid", &settings_path, violations);
            }
            None => {
                violations.push(violation(&settings_path, "expected an object", "invalid_type"))
            }
        }
    }
}

fn check_sibling_keys(elements: &[Value], path: &str, violations: &mut Vec<SchemaViolation>) {
    let mut seen: HashSet<&str> = HashSet::new();
    for (index, element) in elements.iter().enumerate() {
        if let Some(key) = element.get("key").and_then(Value::as_str) {
            if !seen.insert(key) {
                violations.push(violation(
                    &format!("{path}.{index}.key"),
                    &format!("duplicate sibling key '{key}'"),
                    "duplicate_key",
                ));
            }
        }
    }
}

fn check_unknown_fields(
    object: &serde_json::Map<String, Value>,
    known: &[&str],
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    for field in object.keys() {
        if !known.contains(&field.as_str()) {
            violations.push(violation(
                &join(path, field),
                &format!("unrecognized field '{field}'"),
                "unrecognized_keys",
            ));
        }
    }
}

fn expect_string(
    object: &serde_json::Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    if let Some(value) = object.get(field) {
        if !value.is_string() {
            violations.push(violation(&join(path, field), "expected a string", "invalid_type"));
        }
    }
}

fn expect_bool(
    object: &serde_json::Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    if let Some(value) = object.get(field) {
        if !value.is_boolean() {
            violations.push(violation(&join(path, field), "expected a boolean", "invalid_type"));
        }
    }
}

fn expect_number(
    object: &serde_json::Map<String, Value>,
    field: &str,
    path: &str,
    violations: &mut Vec<SchemaViolation>,
) {
    if let Some(value) = object.get(field) {
        if !value.is_number() {
            violations.push(violation(&join(path, field), "expected a number", "invalid_type"));
        }
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn violation(path: &str, message: &str, code: &str) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message: message.to_string(),
        code: code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_config() -> Value {
        json!({
            "elements": [
                {"key": "name", "type": "input", "label": "Name",
                 "validators": [{"name": "required"}, {"name": "minLength", "value": 2}]},
                {"key": "details", "type": "fieldset", "children": [
                    {"key": "email", "type": "input", "controlType": "email"}
                ]}
            ],
            "buttons": [
                {"key": "go", "type": "submit", "label": "Save",
                 "settings": {"disableIfFormInvalid": true}}
            ]
        })
    }

    #[test]
    fn accepts_valid_config() {
        let config = validate_config(&valid_config()).unwrap();
        assert_eq!(config.elements.len(), 2);
        assert_eq!(config.elements[1].children.as_ref().unwrap()[0].key, "email");
    }

    #[test]
    fn rejects_unknown_fields_with_path() {
        let mut raw = valid_config();
        raw["elements"][0]["bogus"] = json!(1);
        let violations = validate_config(&raw).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "elements.0.bogus");
        assert_eq!(violations[0].code, "unrecognized_keys");
    }

    #[test]
    fn rejects_unknown_validator_name() {
        let raw = json!({
            "elements": [{"key": "a", "type": "input",
                          "validators": [{"name": "shouty"}]}]
        });
        let violations = validate_config(&raw).unwrap_err();
        assert_eq!(violations[0].path, "elements.0.validators.0.name");
        assert_eq!(violations[0].code, "unrecognized_validator");
    }

    #[test]
    fn rejects_unrecognized_element_type() {
        let raw = json!({"elements": [{"key": "a", "type": "hologram"}]});
        let violations = validate_config(&raw).unwrap_err();
        assert_eq!(violations[0].code, "unrecognized_type");
    }

    #[test]
    fn rejects_duplicate_sibling_keys() {
        let raw = json!({
            "elements": [
                {"key": "twin", "type": "input"},
                {"key": "twin", "type": "input"}
            ]
        });
        let violations = validate_config(&raw).unwrap_err();
        assert_eq!(violations[0].path, "elements.1.key");
        assert_eq!(violations[0].code, "duplicate_key");
    }

    #[test]
    fn rejects_children_on_input() {
        let raw = json!({
            "elements": [{"key": "a", "type": "input", "children": [
                {"key": "b", "type": "input"}
            ]}]
        });
        let violations = validate_config(&raw).unwrap_err();
        assert_eq!(violations[0].code, "children_not_allowed");
    }

    #[test]
    fn async_backend_requires_url() {
        let raw = json!({
            "elements": [{"key": "a", "type": "input",
                          "validators": [{"name": "asyncBackend"}]}]
        });
        let violations = validate_config(&raw).unwrap_err();
        assert!(violations.iter().any(|v| v.code == "missing_field"
            && v.path == "elements.0.validators.0.asyncUrl"));
    }

    #[test]
    fn collects_multiple_ordered_violations() {
        let raw = json!({
            "elements": [
                {"type": "input"},
                {"key": "b", "type": "select", "options": [{"value": {"nested": true}}]}
            ],
            "buttons": [{"key": "x", "type": "teleport"}]
        });
        let violations = validate_config(&raw).unwrap_err();
        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["elements.0.key", "elements.1.options.0.value", "buttons.0.type"]
        );
    }

    #[test]
    fn deep_nesting_is_cut_off() {
        let mut raw = json!({"key": "leaf", "type": "input"});
        for depth in 0..(MAX_DEPTH + 2) {
            raw = json!({"key": format!("level{depth}"), "type": "fieldset", "children": [raw]});
        }
        let violations = validate_config(&json!({ "elements": [raw] })).unwrap_err();
        assert!(violations.iter().any(|v| v.code == "max_depth_exceeded"));
    }
}
