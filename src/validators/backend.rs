//! Backend-driven async validation.
//!
//! An `asyncBackend` validator posts `{"value": ...}` to its configured URL
//! and expects `{"valid": bool, "error": string?}` back. Empty values skip
//! the call entirely. Both a `valid: false` verdict and a transport failure
//! map to the same uniform error payload so the field shows a validation
//! message instead of surfacing an exception.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::{AsyncTrigger, ElementValidator};
use crate::error::FormError;
use crate::validators::builtin::is_empty_value;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct BackendVerdict {
    valid: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendValidator {
    pub url: String,
    pub debounce: Duration,
    pub trigger: AsyncTrigger,
}

impl BackendValidator {
    pub fn from_validator(validator: &ElementValidator) -> Result<Self, FormError> {
        let url = validator.async_url.clone().ok_or_else(|| {
            FormError::Configuration("validator 'asyncBackend' requires an asyncUrl".into())
        })?;
        Ok(Self {
            url,
            debounce: Duration::from_millis(
                validator.async_debounce_time.unwrap_or(DEFAULT_DEBOUNCE_MS),
            ),
            trigger: validator.async_trigger.unwrap_or_default(),
        })
    }

    /// Waits out the debounce window, then checks the value against the
    /// backend. Returns `None` when valid, or the error payload to record
    /// under `asyncBackend`. The caller aborts and replaces any in-flight
    /// check for the same node, so at most one request fires per burst.
    pub async fn check(&self, client: &reqwest::Client, value: &Value) -> Option<Value> {
        if is_empty_value(value) {
            return None;
        }
        tokio::time::sleep(self.debounce).await;
        self.post(client, value).await
    }

    async fn post(&self, client: &reqwest::Client, value: &Value) -> Option<Value> {
        let response = client
            .post(&self.url)
            .json(&json!({ "value": value }))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<BackendVerdict>().await {
                Ok(verdict) if verdict.valid => None,
                Ok(verdict) => Some(json!({
                    "message": verdict.error.unwrap_or_else(|| "Validation failed".to_string()),
                    "value": value
                })),
                Err(err) => {
                    warn!(url = %self.url, error = %err, "async validation response unreadable");
                    Some(transport_payload(value))
                }
            },
            Ok(resp) => {
                warn!(url = %self.url, status = %resp.status(), "async validation backend error");
                Some(transport_payload(value))
            }
            Err(err) => {
                warn!(url = %self.url, error = %err, "async validation request failed");
                Some(transport_payload(value))
            }
        }
    }
}

fn transport_payload(value: &Value) -> Value {
    json!({
        "message": "Validation request failed. Please try again.",
        "value": value
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_validator_defaults() {
        let validator: ElementValidator = serde_json::from_value(serde_json::json!({
            "name": "asyncBackend",
            "asyncUrl": "http://localhost/check"
        }))
        .unwrap();
        let backend = BackendValidator::from_validator(&validator).unwrap();
        assert_eq!(backend.debounce, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(backend.trigger, AsyncTrigger::Debounce);
    }

    #[test]
    fn from_validator_requires_url() {
        let validator: ElementValidator = serde_json::from_value(serde_json::json!({
            "name": "asyncBackend"
        }))
        .unwrap();
        assert!(BackendValidator::from_validator(&validator).is_err());
    }

    #[tokio::test]
    async fn empty_values_skip_the_backend() {
        // An unroutable URL proves no request is attempted.
        let backend = BackendValidator {
            url: "http://127.0.0.1:1/never".to_string(),
            debounce: Duration::from_millis(1),
            trigger: AsyncTrigger::Debounce,
        };
        let client = reqwest::Client::new();
        assert_eq!(backend.check(&client, &json!("")).await, None);
        assert_eq!(backend.check(&client, &json!(null)).await, None);
    }
}
