//! Structured logging.
//!
//! Arbor crates log through `tracing`. [`init_logging`] installs a global
//! `tracing-subscriber` registry with one formatting layer, JSON or pretty,
//! behind an [`EnvFilter`].
//!
//! ```rust,ignore
//! use arbor_telemetry::logging::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig { json: false, ..LogConfig::default() })?;
//! tracing::info!(beans = 42, "Bean graph built");
//! ```

use crate::error::TelemetryError;
use crate::TelemetryResult;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// What `[telemetry.logging]` controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Installs no subscriber when `false`.
    pub enabled: bool,
    /// Filter directives, e.g. `info` or `arbor_build=debug,warn`.
    pub level: String,
    /// JSON lines instead of pretty output.
    pub json: bool,
    /// Source file and line on every event.
    pub include_location: bool,
    /// Logged once when the subscriber is installed.
    pub service_name: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            json: true,
            include_location: false,
            service_name: "arbor".to_string(),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` if the filter does not parse or a
/// global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }
    let filter = create_env_filter(&config.level)?;
    let location = config.include_location;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_file(location).with_line_number(location).boxed()
    } else {
        fmt::layer().pretty().with_file(location).with_line_number(location).boxed()
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::debug!(service.name = %config.service_name, json = config.json, "Logging initialized");
    Ok(())
}

/// Parses filter directives.
///
/// # Errors
///
/// Returns `TelemetryError::LoggingInit` naming the bad directive.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::LoggingInit(format!("Invalid log level: {e}")))
}

/// Field names shared by build and runtime events.
pub mod fields {
    /// Bean identifier.
    pub const BEAN: &str = "bean";
    /// Scope annotation.
    pub const SCOPE: &str = "scope";
    /// Context activation identifier.
    pub const CONTEXT_ID: &str = "context_id";
    /// Business method signature.
    pub const METHOD: &str = "method";
    /// Number of beans.
    pub const BEANS: &str = "beans";
    /// Number of interceptors.
    pub const INTERCEPTORS: &str = "interceptors";
    /// Number of observer methods.
    pub const OBSERVERS: &str = "observers";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert!(config.enabled);
        assert!(config.json);
        assert!(!config.include_location);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("arbor_build=debug,info").is_ok());
        assert!(create_env_filter("arbor_build=[").is_err());
    }

    #[test]
    fn test_disabled_logging_installs_nothing() {
        let config = LogConfig {
            enabled: false,
            level: "not a filter [".to_string(),
            ..LogConfig::default()
        };
        assert!(init_logging(&config).is_ok());
    }
}
