//! Performance budget monitoring for tree builds.
//!
//! Budgets are advisory: exceeding them emits warnings through `tracing` and
//! an observable warning stream, never an error. The build itself is always
//! allowed to finish.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct PerformanceBudget {
    /// Budget for one tree build, in milliseconds.
    pub max_render_time_ms: f64,
    /// Field count that triggers an advisory warning.
    pub field_count_warning: usize,
    /// Field count past which degradation is likely.
    pub field_count_limit: usize,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self {
            max_render_time_ms: 1000.0,
            field_count_warning: 50,
            field_count_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    FieldCount,
    RenderTime,
}

#[derive(Debug, Clone)]
pub struct PerformanceWarning {
    pub kind: WarningKind,
    pub message: String,
    pub actual: f64,
    pub threshold: f64,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PerformanceMetric {
    pub name: String,
    pub value: f64,
    pub at: DateTime<Utc>,
    pub threshold: Option<f64>,
    pub exceeds_threshold: bool,
}

pub struct PerformanceMonitor {
    budget: PerformanceBudget,
    started: Mutex<Option<Instant>>,
    metrics: Mutex<Vec<PerformanceMetric>>,
    warnings: broadcast::Sender<PerformanceWarning>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::with_budget(PerformanceBudget::default())
    }

    pub fn with_budget(budget: PerformanceBudget) -> Self {
        let (warnings, _) = broadcast::channel(32);
        Self {
            budget,
            started: Mutex::new(None),
            metrics: Mutex::new(Vec::new()),
            warnings,
        }
    }

    pub fn budget(&self) -> PerformanceBudget {
        self.budget
    }

    /// Subscribes to the warning stream.
    pub fn warnings(&self) -> broadcast::Receiver<PerformanceWarning> {
        self.warnings.subscribe()
    }

    /// Marks the start of a tracked build.
    pub fn start_tracking(&self) {
        *self.started.lock().expect("monitor lock") = Some(Instant::now());
    }

    /// Ends tracking, records the metric, and emits warnings for any budget
    /// the build exceeded. Returns the elapsed milliseconds.
    pub fn end_tracking(&self, field_count: usize) -> f64 {
        let started = self.started.lock().expect("monitor lock").take();
        let Some(started) = started else {
            warn!("render tracking was not started");
            return 0.0;
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.record_metric("form_render_time", elapsed_ms, Some(self.budget.max_render_time_ms));
        self.check_field_count(field_count);

        if elapsed_ms > self.budget.max_render_time_ms {
            self.emit(PerformanceWarning {
                kind: WarningKind::RenderTime,
                message: format!(
                    "form build time ({elapsed_ms:.0}ms) exceeds the recommended budget of {}ms; \
                     consider reducing field count",
                    self.budget.max_render_time_ms
                ),
                actual: elapsed_ms,
                threshold: self.budget.max_render_time_ms,
                at: Utc::now(),
            });
        }

        elapsed_ms
    }

    /// Checks the field count against both budget thresholds.
    pub fn check_field_count(&self, field_count: usize) {
        let warning = self.budget.field_count_warning;
        let limit = self.budget.field_count_limit;

        if field_count >= warning && field_count < limit {
            self.emit(PerformanceWarning {
                kind: WarningKind::FieldCount,
                message: format!(
                    "form has {field_count} fields, approaching the recommended limit of {limit}; \
                     consider splitting into tabs or sections"
                ),
                actual: field_count as f64,
                threshold: warning as f64,
                at: Utc::now(),
            });
        }
        if field_count >= limit {
            self.emit(PerformanceWarning {
                kind: WarningKind::FieldCount,
                message: format!(
                    "form has {field_count} fields, exceeding the recommended limit of {limit}; \
                     performance degradation likely"
                ),
                actual: field_count as f64,
                threshold: limit as f64,
                at: Utc::now(),
            });
        }

        self.record_metric("form_field_count", field_count as f64, Some(warning as f64));
    }

    pub fn record_metric(&self, name: &str, value: f64, threshold: Option<f64>) {
        let metric = PerformanceMetric {
            name: name.to_string(),
            value,
            at: Utc::now(),
            threshold,
            exceeds_threshold: threshold.map(|t| value > t).unwrap_or(false),
        };
        self.metrics.lock().expect("monitor lock").push(metric);
    }

    /// All recorded values for one metric name.
    pub fn metrics(&self, name: &str) -> Vec<PerformanceMetric> {
        self.metrics
            .lock()
            .expect("monitor lock")
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn average_metric(&self, name: &str) -> f64 {
        let metrics = self.metrics(name);
        if metrics.is_empty() {
            return 0.0;
        }
        metrics.iter().map(|m| m.value).sum::<f64>() / metrics.len() as f64
    }

    pub fn clear_metrics(&self) {
        self.metrics.lock().expect("monitor lock").clear();
    }

    fn emit(&self, warning: PerformanceWarning) {
        warn!(
            kind = ?warning.kind,
            actual = warning.actual,
            threshold = warning.threshold,
            "{}",
            warning.message
        );
        // No receivers is fine; warnings are best-effort.
        let _ = self.warnings.send(warning);
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}
