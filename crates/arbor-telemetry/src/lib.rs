//! Observability for the Arbor container.
//!
//! - **Logging**: structured JSON or pretty logs via `tracing-subscriber`
//! - **Metrics**: Prometheus-format metrics via the `metrics` crate
//!
//! Build-time processing records graph size, build duration and diagnostics.
//! The runtime records context activations, instance lifecycles and
//! intercepted invocations. Recording functions are no-ops until a recorder
//! is installed with [`init_telemetry`] or [`init_metrics`].
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_telemetry::{TelemetryConfig, init_telemetry};
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("inventory")
//!     .enable_metrics()
//!     .build();
//!
//! let registry = init_telemetry(&config)?;
//! if let Some(registry) = registry {
//!     println!("{}", registry.render());
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{init_metrics, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes all telemetry subsystems.
///
/// Logging is initialized first so that metric installation problems are
/// logged. Returns the metrics registry when metrics are enabled.
///
/// # Errors
///
/// Returns `TelemetryError` if any subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    init_logging(&config.logging)?;
    let registry = init_metrics(&config.metrics)?;

    tracing::info!(
        service.name = %config.service_name,
        environment = %config.environment,
        metrics = registry.is_some(),
        "Telemetry initialized"
    );

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_telemetry_disabled() {
        let config = TelemetryConfig {
            logging: LogConfig {
                enabled: false,
                ..LogConfig::default()
            },
            ..TelemetryConfig::default()
        };
        let registry = init_telemetry(&config).expect("init");
        assert!(registry.is_none());
    }
}
