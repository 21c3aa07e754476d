//! Built-in synchronous validator rules.
//!
//! Each rule checks a JSON value and returns `None` when valid or an error
//! payload when not. Payload fields feed the `{expected}`/`{given}` message
//! placeholders. Length checks apply to strings (character count) and
//! arrays; values without a length pass them, matching the historical
//! behavior of the configs this format comes from.

use regex::Regex;
use serde_json::{json, Value};

use crate::error::FormError;

#[derive(Debug, Clone)]
pub enum ValidatorRule {
    Required,
    Email,
    MinLength(usize),
    MaxLength(usize),
    MinItems(usize),
    MaxItems(usize),
    MinNumber(f64),
    MaxNumber(f64),
    InArray(Vec<Value>),
    Pattern(Regex),
}

/// Local-part and total length caps for email addresses. The regex below
/// cannot express them without lookahead.
const EMAIL_MAX_TOTAL: usize = 254;
const EMAIL_MAX_LOCAL: usize = 64;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$";

impl ValidatorRule {
    /// Compiles a pattern rule from a literal pattern string.
    pub fn pattern(pattern: &str) -> Result<Self, FormError> {
        Regex::new(pattern).map(ValidatorRule::Pattern).map_err(|err| {
            FormError::Configuration(format!("invalid pattern '{pattern}': {err}"))
        })
    }

    /// Wraps an already-compiled expression.
    pub fn precompiled(regex: Regex) -> Self {
        ValidatorRule::Pattern(regex)
    }

    /// The registry name this rule reports errors under.
    pub fn name(&self) -> &'static str {
        match self {
            ValidatorRule::Required => "required",
            ValidatorRule::Email => "email",
            ValidatorRule::MinLength(_) => "minLength",
            ValidatorRule::MaxLength(_) => "maxLength",
            ValidatorRule::MinItems(_) => "minItems",
            ValidatorRule::MaxItems(_) => "maxItems",
            ValidatorRule::MinNumber(_) => "minNumber",
            ValidatorRule::MaxNumber(_) => "maxNumber",
            ValidatorRule::InArray(_) => "inArray",
            ValidatorRule::Pattern(_) => "pattern",
        }
    }

    /// Runs the rule. `None` means valid; `Some(payload)` is the error
    /// payload to record under [`ValidatorRule::name`].
    pub fn check(&self, value: &Value) -> Option<Value> {
        match self {
            ValidatorRule::Required => check_required(value),
            ValidatorRule::Email => check_email(value),
            ValidatorRule::MinLength(min) => check_min_length(value, *min),
            ValidatorRule::MaxLength(max) => check_max_length(value, *max),
            // Item-count rules share the length semantics of the string rules.
            ValidatorRule::MinItems(min) => check_min_length(value, *min),
            ValidatorRule::MaxItems(max) => check_max_length(value, *max),
            ValidatorRule::MinNumber(min) => match value.as_f64() {
                Some(n) if n < *min => Some(json!({"expected": min, "given": n})),
                _ => None,
            },
            ValidatorRule::MaxNumber(max) => match value.as_f64() {
                Some(n) if n > *max => Some(json!({"expected": max, "given": n})),
                _ => None,
            },
            ValidatorRule::InArray(allowed) => {
                if allowed.contains(value) {
                    None
                } else {
                    let joined = allowed.iter().map(display).collect::<Vec<_>>().join(", ");
                    Some(json!({"expected": joined, "given": value}))
                }
            }
            ValidatorRule::Pattern(regex) => {
                if regex.is_match(&coerce_to_string(value)) {
                    None
                } else {
                    Some(json!({
                        "expected": format!("/{}/", regex.as_str()),
                        "given": value
                    }))
                }
            }
        }
    }
}

/// Empty/falsy check shared with the backend validator's skip rule:
/// null, `false`, `0` and the empty string count as empty.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn check_required(value: &Value) -> Option<Value> {
    if let Value::Array(items) = value {
        return if items.is_empty() { Some(json!(true)) } else { None };
    }
    // The literal string "null" counts as absent. Deliberate legacy quirk;
    // existing configs rely on it.
    if is_empty_value(value) || value.as_str() == Some("null") {
        Some(json!(true))
    } else {
        None
    }
}

fn check_email(value: &Value) -> Option<Value> {
    let address = match value {
        Value::Null => return None,
        Value::String(s) if s.is_empty() => return None,
        Value::String(s) => s,
        _ => return Some(json!(true)),
    };

    let local_len = address.split('@').next().map(str::len).unwrap_or(0);
    let well_formed = address.len() <= EMAIL_MAX_TOTAL
        && local_len <= EMAIL_MAX_LOCAL
        && email_regex().is_match(address);
    if well_formed {
        None
    } else {
        Some(json!(true))
    }
}

fn email_regex() -> &'static Regex {
    use std::sync::OnceLock;
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"))
}

fn check_min_length(value: &Value, min: usize) -> Option<Value> {
    match value {
        Value::Null => Some(json!({"expected": min, "given": 0})),
        _ => match value_len(value) {
            Some(len) if len < min => Some(json!({"expected": min, "given": len})),
            _ => None,
        },
    }
}

fn check_max_length(value: &Value, max: usize) -> Option<Value> {
    match value_len(value) {
        Some(len) if len > max => Some(json!({"expected": max, "given": len})),
        _ => None,
    }
}

fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// String coercion for pattern matching, mirroring how the wire format's
/// home runtime stringifies scalars.
fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
