//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use serde::{Deserialize, Serialize};

/// One step of the resolution tie-break policy.
///
/// When more than one bean matches an injection point, the steps of
/// [`BuildConfig::tie_break`] are applied in order until a single candidate
/// remains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Discard default beans when any non-default candidate exists.
    DefaultBean,
    /// Keep only enabled alternatives; the highest priority wins.
    AlternativePriority,
}

impl TieBreak {
    /// Parses a policy step from its configuration name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "default_bean" => Some(Self::DefaultBean),
            "alternative_priority" => Some(Self::AlternativePriority),
            _ => None,
        }
    }
}

/// Build-time configuration section.
///
/// Controls bean discovery, unused bean removal and how diagnostics are
/// treated.
///
/// # Example
///
/// ```
/// use arbor_config::{BuildConfig, TieBreak};
///
/// let config = BuildConfig::default();
/// assert!(config.remove_unused_beans);
/// assert_eq!(config.tie_break, vec![TieBreak::DefaultBean, TieBreak::AlternativePriority]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Remove beans that are never injected or looked up.
    #[serde(default = "default_true")]
    pub remove_unused_beans: bool,

    /// Bean classes that are never removed.
    #[serde(default)]
    pub unremovable_types: Vec<String>,

    /// Bean classes vetoed before graph construction.
    #[serde(default)]
    pub excluded_types: Vec<String>,

    /// Ordered tie-break policy applied to ambiguous resolutions.
    #[serde(default = "default_tie_break")]
    pub tie_break: Vec<TieBreak>,

    /// Promote warnings to fatal diagnostics.
    #[serde(default)]
    pub fail_on_warnings: bool,

    /// Produce serialisable graph metadata.
    #[serde(default = "default_true")]
    pub emit_metadata: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            remove_unused_beans: true,
            unremovable_types: Vec::new(),
            excluded_types: Vec::new(),
            tie_break: default_tie_break(),
            fail_on_warnings: false,
            emit_metadata: true,
        }
    }
}

impl BuildConfig {
    /// Returns true if the class is listed in `unremovable_types`.
    #[must_use]
    pub fn is_unremovable(&self, class: &str) -> bool {
        self.unremovable_types.iter().any(|t| t == class)
    }

    /// Returns true if the class is listed in `excluded_types`.
    #[must_use]
    pub fn is_excluded(&self, class: &str) -> bool {
        self.excluded_types.iter().any(|t| t == class)
    }
}

fn default_tie_break() -> Vec<TieBreak> {
    vec![TieBreak::DefaultBean, TieBreak::AlternativePriority]
}

/// Runtime configuration section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Capture and restore managed contexts across async hand-offs.
    #[serde(default = "default_true")]
    pub propagate_contexts: bool,

    /// Treat double deactivation of a context as a caller error.
    ///
    /// When false, deactivating an inactive context is a no-op.
    #[serde(default = "default_true")]
    pub strict_deactivation: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            propagate_contexts: true,
            strict_deactivation: true,
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON formatted logs (production).
    #[default]
    Json,
    /// Human-readable pretty format (development).
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log filter, either a level or `target=level` directives.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include source file and line in logs.
    #[serde(default)]
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            include_location: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder.
    #[serde(default)]
    pub enabled: bool,

    /// Histogram bucket boundaries for durations, in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_histogram_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
}

/// Telemetry configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Service name for telemetry identification.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Deployment environment (e.g., "development", "production").
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for TelemetryConfigSection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            environment: default_environment(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl TelemetryConfigSection {
    /// Converts this section into the telemetry crate's configuration.
    #[must_use]
    pub fn to_telemetry_config(&self) -> arbor_telemetry::TelemetryConfig {
        let logging = arbor_telemetry::LogConfig {
            enabled: self.logging.enabled,
            level: self.logging.level.clone(),
            json: self.logging.format == LogFormat::Json,
            include_location: self.logging.include_location,
            service_name: self.service_name.clone(),
        };

        let metrics = arbor_telemetry::MetricsConfig {
            enabled: self.metrics.enabled,
            duration_buckets: self.metrics.histogram_buckets.clone(),
            ..arbor_telemetry::MetricsConfig::default()
        };

        arbor_telemetry::TelemetryConfig::builder()
            .service_name(&self.service_name)
            .environment(&self.environment)
            .logging(logging)
            .metrics(metrics)
            .build()
    }
}

fn default_service_name() -> String {
    "arbor".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_default() {
        let config = BuildConfig::default();
        assert!(config.remove_unused_beans);
        assert!(config.emit_metadata);
        assert!(!config.fail_on_warnings);
        assert!(config.unremovable_types.is_empty());
    }

    #[test]
    fn test_build_config_deserialize() {
        let toml = r#"
            remove_unused_beans = false
            unremovable_types = ["acme.Api"]
            tie_break = ["alternative_priority"]
        "#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert!(!config.remove_unused_beans);
        assert!(config.is_unremovable("acme.Api"));
        assert!(!config.is_excluded("acme.Api"));
        assert_eq!(config.tie_break, vec![TieBreak::AlternativePriority]);
        // Defaults applied
        assert!(config.emit_metadata);
    }

    #[test]
    fn test_build_config_unknown_field_rejected() {
        let toml = r#"
            remove_unused_beans = true
            unknown_field = "value"
        "#;
        let result: Result<BuildConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_tie_break_parse() {
        assert_eq!(TieBreak::parse("default_bean"), Some(TieBreak::DefaultBean));
        assert_eq!(TieBreak::parse(" Alternative_Priority "), Some(TieBreak::AlternativePriority));
        assert_eq!(TieBreak::parse("random"), None);
    }

    #[test]
    fn test_runtime_config_default() {
        let config = RuntimeConfig::default();
        assert!(config.propagate_contexts);
        assert!(config.strict_deactivation);
    }

    #[test]
    fn test_log_format_deserialize() {
        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);
        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);
    }

    #[test]
    fn test_telemetry_conversion() {
        let mut section = TelemetryConfigSection::default();
        section.service_name = "inventory".to_string();
        section.logging.format = LogFormat::Pretty;
        section.logging.include_location = true;
        section.metrics.enabled = true;

        let config = section.to_telemetry_config();
        assert_eq!(config.service_name, "inventory");
        assert_eq!(config.logging.service_name, "inventory");
        assert!(!config.logging.json);
        assert!(config.logging.include_location);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.service_name, "inventory");
    }
}
