//! Validator registry and error-message resolution.
//!
//! Validator names in a config resolve to executable rules with a uniform
//! error contract: a failing rule yields a payload carrying `expected` /
//! `given` (or rule-specific fields) under the rule's name. Messages resolve
//! in priority order (element-level override, default-message table,
//! validator name as a literal fallback), then `{expected}`, `{given}` and
//! `{actual}` (alias of `{given}`) placeholders are substituted from the
//! payload.

pub mod backend;
pub mod builtin;

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::domain::{AsyncTrigger, ElementValidator, FormElement};
use crate::error::FormError;
use crate::tree::node::UpdateTrigger;

pub use backend::BackendValidator;
pub use builtin::ValidatorRule;

/// Resolves a config validator entry to an executable sync rule.
/// Unknown names and malformed parameters fail loudly.
pub fn resolve(validator: &ElementValidator) -> Result<ValidatorRule, FormError> {
    match validator.name.as_str() {
        "required" => Ok(ValidatorRule::Required),
        "email" => Ok(ValidatorRule::Email),
        "minLength" => Ok(ValidatorRule::MinLength(usize_param(validator)?)),
        "maxLength" => Ok(ValidatorRule::MaxLength(usize_param(validator)?)),
        "minItems" => Ok(ValidatorRule::MinItems(usize_param(validator)?)),
        "maxItems" => Ok(ValidatorRule::MaxItems(usize_param(validator)?)),
        "minNumber" => Ok(ValidatorRule::MinNumber(f64_param(validator)?)),
        "maxNumber" => Ok(ValidatorRule::MaxNumber(f64_param(validator)?)),
        "inArray" => match validator.value.as_ref().and_then(Value::as_array) {
            Some(allowed) => Ok(ValidatorRule::InArray(allowed.clone())),
            None => Err(FormError::Configuration(
                "validator 'inArray' requires an array of allowed values".into(),
            )),
        },
        "pattern" => match validator.value.as_ref().and_then(Value::as_str) {
            Some(pattern) => ValidatorRule::pattern(pattern),
            None => Err(FormError::Configuration(
                "validator 'pattern' requires a pattern string".into(),
            )),
        },
        other => Err(FormError::Configuration(format!(
            "unrecognized validator '{other}'"
        ))),
    }
}

fn usize_param(validator: &ElementValidator) -> Result<usize, FormError> {
    validator
        .value
        .as_ref()
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| {
            FormError::Configuration(format!(
                "validator '{}' requires a non-negative integer parameter",
                validator.name
            ))
        })
}

fn f64_param(validator: &ElementValidator) -> Result<f64, FormError> {
    validator.value.as_ref().and_then(Value::as_f64).ok_or_else(|| {
        FormError::Configuration(format!(
            "validator '{}' requires a numeric parameter",
            validator.name
        ))
    })
}

/// The sync/async validator sets compiled from one element, ready to attach
/// to every control node the element produces.
#[derive(Debug, Clone, Default)]
pub struct CompiledValidators {
    pub sync: Vec<ValidatorRule>,
    pub backend: Vec<BackendValidator>,
    pub overrides: HashMap<String, String>,
    pub update_on: UpdateTrigger,
}

/// Compiles an element's validator list. `asyncBackend` entries become
/// backend validators; everything else resolves through the registry. A
/// backend validator with the `blur` trigger switches the node's update
/// trigger to blur.
pub fn compile(element: &FormElement) -> Result<CompiledValidators, FormError> {
    let mut compiled = CompiledValidators::default();

    for validator in element.validators.as_deref().unwrap_or_default() {
        if validator.name == "asyncBackend" {
            let backend = BackendValidator::from_validator(validator)?;
            if backend.trigger == AsyncTrigger::Blur {
                compiled.update_on = UpdateTrigger::Blur;
            }
            if let Some(message) = &validator.error_message {
                compiled
                    .overrides
                    .insert("asyncBackend".to_string(), message.clone());
            }
            compiled.backend.push(backend);
        } else {
            compiled.sync.push(resolve(validator)?);
            if let Some(message) = &validator.error_message {
                compiled
                    .overrides
                    .insert(validator.name.clone(), message.clone());
            }
        }
    }

    Ok(compiled)
}

/// Default message table. Rules without an entry fall back to their name.
fn default_message(name: &str) -> Option<&'static str> {
    match name {
        "email" => Some("Email address is not in format \"name@domain.tld\""),
        "required" => Some("This field is required"),
        "subform" => Some("The form contains errors"),
        "minItems" => {
            Some("The expected amount of {expected} items is not matched by the current amount of {given}")
        }
        "maxItems" => {
            Some("The maximum amount of {expected} items is not matched by the current amount of {given}")
        }
        "minLength" => {
            Some("The expected length of {expected} is not reached by the current length of {given}")
        }
        "maxLength" => {
            Some("The maximum length of {expected} is exceeded by the current length of {given}")
        }
        // The backend's own message is the whole template.
        "asyncBackend" => Some("{message}"),
        _ => None,
    }
}

/// Resolves a node's error map into display messages.
pub fn resolve_messages(
    errors: &BTreeMap<String, Value>,
    overrides: &HashMap<String, String>,
) -> Vec<String> {
    let mut messages = Vec::with_capacity(errors.len());
    for (name, payload) in errors {
        let mut message = overrides
            .get(name)
            .cloned()
            .or_else(|| default_message(name).map(str::to_string))
            .unwrap_or_else(|| name.clone());

        if let Some(fields) = payload.as_object() {
            for (field, value) in fields {
                message = message.replace(&format!("{{{field}}}"), &render(value));
            }
            // {actual} is a documented alias of {given}.
            if let Some(given) = fields.get("given") {
                message = message.replace("{actual}", &render(given));
            }
        }
        messages.push(message);
    }
    messages
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, value: Option<Value>) -> ElementValidator {
        ElementValidator {
            name: name.to_string(),
            value,
            error_message: None,
            is_async: None,
            async_url: None,
            async_trigger: None,
            async_debounce_time: None,
        }
    }

    #[test]
    fn resolves_known_names() {
        assert!(matches!(
            resolve(&entry("required", None)).unwrap(),
            ValidatorRule::Required
        ));
        assert!(matches!(
            resolve(&entry("minLength", Some(json!(3)))).unwrap(),
            ValidatorRule::MinLength(3)
        ));
        assert!(matches!(
            resolve(&entry("pattern", Some(json!("^a+$")))).unwrap(),
            ValidatorRule::Pattern(_)
        ));
    }

    #[test]
    fn unknown_name_fails_loudly() {
        let err = resolve(&entry("telepathy", None)).unwrap_err();
        assert!(matches!(err, FormError::Configuration(_)));
    }

    #[test]
    fn missing_parameter_fails_loudly() {
        assert!(resolve(&entry("minLength", None)).is_err());
        assert!(resolve(&entry("inArray", Some(json!("not-an-array")))).is_err());
    }

    #[test]
    fn message_resolution_priority_and_placeholders() {
        let mut errors = BTreeMap::new();
        errors.insert("minLength".to_string(), json!({"expected": 5, "given": 2}));

        // Default table with substitution.
        let messages = resolve_messages(&errors, &HashMap::new());
        assert_eq!(
            messages,
            vec!["The expected length of 5 is not reached by the current length of 2"]
        );

        // Element override wins, {actual} aliases {given}.
        let mut overrides = HashMap::new();
        overrides.insert(
            "minLength".to_string(),
            "need {expected}, got {actual}".to_string(),
        );
        let messages = resolve_messages(&errors, &overrides);
        assert_eq!(messages, vec!["need 5, got 2"]);

        // Unknown name falls back to the name itself.
        let mut errors = BTreeMap::new();
        errors.insert("inArray".to_string(), json!({"expected": "a, b", "given": "c"}));
        let messages = resolve_messages(&errors, &HashMap::new());
        assert_eq!(messages, vec!["inArray"]);
    }

    #[test]
    fn compile_splits_sync_and_backend() {
        let element: FormElement = serde_json::from_value(json!({
            "key": "handle",
            "type": "input",
            "validators": [
                {"name": "required", "errorMessage": "cannot be empty"},
                {"name": "asyncBackend", "asyncUrl": "http://localhost/check",
                 "asyncTrigger": "blur"}
            ]
        }))
        .unwrap();

        let compiled = compile(&element).unwrap();
        assert_eq!(compiled.sync.len(), 1);
        assert_eq!(compiled.backend.len(), 1);
        assert_eq!(compiled.update_on, UpdateTrigger::Blur);
        assert_eq!(
            compiled.overrides.get("required").map(String::as_str),
            Some("cannot be empty")
        );
    }
}
