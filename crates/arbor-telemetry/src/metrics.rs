//! Prometheus metrics for Arbor.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `arbor_build_duration_seconds` | Histogram | - | Bean graph build time |
//! | `arbor_beans` | Gauge | - | Beans in the last built graph |
//! | `arbor_removed_beans` | Gauge | - | Unused beans removed by the last build |
//! | `arbor_build_diagnostics_total` | Counter | `severity` | Diagnostics reported during builds |
//! | `arbor_context_activations_total` | Counter | `scope` | Context activations |
//! | `arbor_active_contexts` | Gauge | `scope` | Currently active contexts |
//! | `arbor_instances_created_total` | Counter | `scope` | Contextual instances created |
//! | `arbor_instances_destroyed_total` | Counter | `scope` | Contextual instances destroyed |
//! | `arbor_invocations_total` | Counter | `outcome` | Intercepted business method invocations |
//! | `arbor_events_fired_total` | Counter | - | Events delivered to observers |
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_telemetry::metrics::record_build;
//!
//! record_build(42, 3, Duration::from_millis(12));
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use arbor_core::diagnostic::Severity;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Service name added as a global `service` label.
    pub service_name: String,

    /// Histogram buckets for build and invocation durations.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            service_name: "arbor".to_string(),
            // 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s
            duration_buckets: vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        }
    }
}

/// Metrics registry for Arbor.
///
/// Renders the recorded metrics in Prometheus text format.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with the given handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initializes the metrics subsystem.
///
/// Installs a global Prometheus recorder the first time it is called. Later
/// calls reuse the installed recorder. Returns `None` when metrics are
/// disabled.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(Some(MetricsRegistry::new(handle.clone())));
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", config.service_name.clone())
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle.clone());

    register_metric_descriptions();

    Ok(Some(MetricsRegistry::new(handle)))
}

/// Returns the global metrics handle if initialized.
pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_histogram!("arbor_build_duration_seconds", "Bean graph build duration in seconds");
    describe_gauge!("arbor_beans", "Number of beans in the last built graph");
    describe_gauge!("arbor_removed_beans", "Number of unused beans removed by the last build");
    describe_counter!("arbor_build_diagnostics_total", "Build diagnostics by severity");
    describe_counter!("arbor_context_activations_total", "Context activations by scope");
    describe_gauge!("arbor_active_contexts", "Currently active contexts by scope");
    describe_counter!("arbor_instances_created_total", "Contextual instances created by scope");
    describe_counter!("arbor_instances_destroyed_total", "Contextual instances destroyed by scope");
    describe_counter!("arbor_invocations_total", "Intercepted invocations by outcome");
    describe_counter!("arbor_events_fired_total", "Events delivered to observers");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Records a completed bean graph build.
///
/// Updates `arbor_beans`, `arbor_removed_beans` and
/// `arbor_build_duration_seconds`.
#[allow(clippy::cast_precision_loss)]
pub fn record_build(beans: usize, removed: usize, duration: Duration) {
    gauge!("arbor_beans").set(beans as f64);
    gauge!("arbor_removed_beans").set(removed as f64);
    histogram!("arbor_build_duration_seconds").record(duration.as_secs_f64());
}

/// Records a diagnostic reported during a build.
pub fn record_diagnostic(severity: Severity) {
    counter!(
        "arbor_build_diagnostics_total",
        "severity" => severity.as_str()
    )
    .increment(1);
}

/// Records a context activation for the given scope.
pub fn record_context_activation(scope: &str) {
    counter!(
        "arbor_context_activations_total",
        "scope" => scope.to_string()
    )
    .increment(1);
}

/// Records the creation of a contextual instance.
pub fn record_instance_created(scope: &str) {
    counter!(
        "arbor_instances_created_total",
        "scope" => scope.to_string()
    )
    .increment(1);
}

/// Records the destruction of a contextual instance.
pub fn record_instance_destroyed(scope: &str) {
    counter!(
        "arbor_instances_destroyed_total",
        "scope" => scope.to_string()
    )
    .increment(1);
}

/// Records an intercepted invocation.
///
/// `outcome` is `"ok"` or `"error"`.
pub fn record_invocation(outcome: &str) {
    counter!(
        "arbor_invocations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Records an event delivered to `observers` observer methods.
pub fn record_event(observers: usize) {
    counter!("arbor_events_fired_total").increment(observers as u64);
}

/// Guard that tracks an active context in `arbor_active_contexts`.
///
/// The gauge is incremented on creation and decremented on drop.
#[derive(Debug)]
pub struct ActiveContextGuard {
    scope: String,
}

impl ActiveContextGuard {
    /// Creates a new guard and increments the active context gauge.
    #[must_use]
    pub fn new(scope: &str) -> Self {
        gauge!("arbor_active_contexts", "scope" => scope.to_string()).increment(1.0);
        Self {
            scope: scope.to_string(),
        }
    }
}

impl Drop for ActiveContextGuard {
    fn drop(&mut self) {
        gauge!("arbor_active_contexts", "scope" => self.scope.clone()).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.service_name, "arbor");
        assert!(!config.duration_buckets.is_empty());
    }

    #[test]
    fn test_disabled_metrics() {
        let registry = init_metrics(&MetricsConfig::default()).expect("disabled init");
        assert!(registry.is_none());
    }

    #[test]
    fn test_active_context_guard() {
        let guard = ActiveContextGuard::new("arbor.RequestScoped");
        drop(guard);
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_build(10, 2, Duration::from_millis(5));
        record_diagnostic(Severity::Error);
        record_diagnostic(Severity::Warning);
        record_context_activation("arbor.RequestScoped");
        record_instance_created("arbor.ApplicationScoped");
        record_instance_destroyed("arbor.ApplicationScoped");
        record_invocation("ok");
        record_event(3);
    }
}
