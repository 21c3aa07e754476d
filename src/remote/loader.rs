//! Remote configuration and option loading.
//!
//! [`FormLoader`] fetches form configs and dropdown option lists over HTTP,
//! retries transient failures with exponential backoff, validates fetched
//! configs through the schema validator, and caches successful results with
//! a TTL per kind (configs 5 min, options 10 min). A watch channel publishes
//! the loading-state lifecycle per config load for observability; it never
//! gates correctness.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::domain::{FormConfig, FormElementOption, LoadingError, LoadingState};
use crate::error::FormError;
use crate::remote::cache::TtlCache;
use crate::schema;

pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const FORM_CONFIG_TTL: Duration = Duration::from_secs(5 * 60);
pub const OPTIONS_TTL: Duration = Duration::from_secs(10 * 60);

/// Retry schedule: up to `max_attempts` tries, with a delay of
/// `initial_delay * 2^(n-1)` after the n-th failed attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            initial_delay: INITIAL_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    pub config_ttl: Duration,
    pub options_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            config_ttl: FORM_CONFIG_TTL,
            options_ttl: OPTIONS_TTL,
        }
    }
}

pub struct FormLoader {
    client: reqwest::Client,
    retry: RetryPolicy,
    config_cache: Mutex<TtlCache<FormConfig>>,
    options_cache: Mutex<TtlCache<Vec<Value>>>,
    loading_tx: watch::Sender<LoadingState<FormConfig>>,
}

impl FormLoader {
    pub fn new() -> Self {
        Self::with_policies(RetryPolicy::default(), CachePolicy::default())
    }

    pub fn with_policies(retry: RetryPolicy, cache: CachePolicy) -> Self {
        let (loading_tx, _) = watch::channel(LoadingState::idle());
        Self {
            client: reqwest::Client::new(),
            retry,
            config_cache: Mutex::new(TtlCache::new(cache.config_ttl)),
            options_cache: Mutex::new(TtlCache::new(cache.options_ttl)),
            loading_tx,
        }
    }

    /// The loading-state lifecycle of config loads:
    /// `Idle -> Loading -> Success | Error` per call.
    pub fn loading_state(&self) -> watch::Receiver<LoadingState<FormConfig>> {
        self.loading_tx.subscribe()
    }

    /// Loads and validates a form configuration.
    ///
    /// Cache hits return immediately. On a miss (or bypass) the fetch runs
    /// under the retry policy; a schema-invalid body is surfaced as
    /// [`FormError::Schema`], distinct from transport failure, and is
    /// never cached.
    pub async fn load_config(&self, url: &str, bypass_cache: bool) -> Result<FormConfig, FormError> {
        if !bypass_cache {
            let mut cache = self.config_cache.lock().await;
            if let Some(config) = cache.get(url) {
                let config = config.clone();
                self.loading_tx
                    .send_replace(LoadingState::success(config.clone(), None));
                return Ok(config);
            }
        }

        let started = Utc::now();
        self.loading_tx.send_replace(LoadingState::loading(started));

        let raw = match self.fetch_json(url).await {
            Ok(raw) => raw,
            Err(err) => {
                error!(url, error = %err, "form configuration load failed");
                self.loading_tx.send_replace(LoadingState::error(
                    LoadingError {
                        message: err.to_string(),
                        status_code: err.status_code(),
                    },
                    Some(started),
                ));
                return Err(err);
            }
        };

        match schema::validate_config(&raw) {
            Ok(config) => {
                self.config_cache.lock().await.insert(url, config.clone());
                self.loading_tx
                    .send_replace(LoadingState::success(config.clone(), Some(started)));
                info!(url, "form configuration loaded");
                Ok(config)
            }
            Err(violations) => {
                let summary = violations
                    .iter()
                    .map(|v| format!("{}: {}", v.path, v.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                error!(url, violations = %summary, "fetched configuration failed validation");
                self.loading_tx.send_replace(LoadingState::error(
                    LoadingError {
                        message: format!("invalid form configuration: {summary}"),
                        status_code: None,
                    },
                    Some(started),
                ));
                Err(FormError::Schema(violations))
            }
        }
    }

    /// Loads a dropdown option list: a JSON array of records whose shape is
    /// interpreted by the caller via `valueKey`/`labelKey` settings.
    pub async fn load_options(&self, url: &str, bypass_cache: bool) -> Result<Vec<Value>, FormError> {
        if !bypass_cache {
            let mut cache = self.options_cache.lock().await;
            if let Some(options) = cache.get(url) {
                return Ok(options.clone());
            }
        }

        let raw = self.fetch_json(url).await.map_err(|err| {
            error!(url, error = %err, "option list load failed");
            err
        })?;

        let options = raw
            .as_array()
            .cloned()
            .ok_or_else(|| FormError::Transport {
                message: "expected a JSON array of option records".into(),
                status: None,
            })?;

        self.options_cache.lock().await.insert(url, options.clone());
        Ok(options)
    }

    pub async fn clear_caches(&self) {
        self.config_cache.lock().await.clear();
        self.options_cache.lock().await.clear();
    }

    /// One GET under the retry policy. Each failed attempt logs its computed
    /// backoff delay before sleeping.
    async fn fetch_json(&self, url: &str) -> Result<Value, FormError> {
        let mut attempt = 1;
        loop {
            match self.try_fetch(url).await {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(err);
                    }
                    let delay = self.retry.initial_delay * 2u32.pow(attempt - 1);
                    warn!(
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "fetch attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Value, FormError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FormError::Transport {
                message: err.to_string(),
                status: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FormError::Transport {
                message: format!("server responded with {status}"),
                status: Some(status.as_u16()),
            });
        }

        response.json().await.map_err(|err| FormError::Transport {
            message: format!("malformed response body: {err}"),
            status: Some(status.as_u16()),
        })
    }
}

impl Default for FormLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Projects raw option records into `{value, label}` pairs using the
/// element's `valueKey`/`labelKey` settings: the label falls back to the
/// value key, then to the stringified record.
pub fn map_options(
    records: &[Value],
    value_key: Option<&str>,
    label_key: Option<&str>,
) -> Vec<FormElementOption> {
    records
        .iter()
        .map(|record| {
            let value = match value_key {
                Some(key) => record.get(key).cloned(),
                None => Some(record.clone()),
            };
            let label = label_key
                .or(value_key)
                .and_then(|key| record.get(key))
                .map(render)
                .unwrap_or_else(|| render(record));
            FormElementOption {
                value,
                label: Some(label),
            }
        })
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
