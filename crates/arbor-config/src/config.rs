//! Main configuration types.
//!
//! This module provides the top-level [`ArborConfig`] struct and its builder.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{BuildConfig, ConfigError, LogFormat, RuntimeConfig, TelemetryConfigSection};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Complete Arbor configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use arbor_config::ArborConfig;
///
/// let config = ArborConfig::default();
/// assert!(config.build.remove_unused_beans);
/// assert!(config.runtime.strict_deactivation);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ArborConfig {
    /// Build-time configuration.
    #[serde(default)]
    pub build: BuildConfig,

    /// Runtime container configuration.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl ArborConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ArborConfigBuilder {
        ArborConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `build.tie_break` is empty or lists a step twice
    /// - `telemetry.logging.level` names an unknown level
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.tie_break.is_empty() {
            return Err(ConfigError::invalid_value("build.tie_break", "must not be empty"));
        }

        let mut seen = HashSet::new();
        for step in &self.build.tie_break {
            if !seen.insert(step) {
                return Err(ConfigError::invalid_value(
                    "build.tie_break",
                    format!("duplicate step {step:?}"),
                ));
            }
        }

        validate_log_level(&self.telemetry.logging.level)?;

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// - Pretty log formatting with source locations
    /// - Debug log level
    /// - Unused beans are kept so that they can be inspected
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = LogFormat::Pretty;
        config.telemetry.logging.include_location = true;
        config.telemetry.environment = "development".to_string();

        config.build.remove_unused_beans = false;

        config
    }

    /// Create a production configuration preset.
    ///
    /// - JSON log formatting at info level
    /// - Metrics enabled
    /// - Warnings fail the build
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = LogFormat::Json;
        config.telemetry.environment = "production".to_string();
        config.telemetry.metrics.enabled = true;

        config.build.fail_on_warnings = true;

        config
    }
}

// Accepts `level` or comma separated `target=level` directives.
fn validate_log_level(filter: &str) -> Result<(), ConfigError> {
    for directive in filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        let level = directive.rsplit_once('=').map_or(directive, |(_, level)| level);
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "telemetry.logging.level",
                format!("unknown log level '{level}'"),
            ));
        }
    }
    arbor_telemetry::logging::create_env_filter(filter)
        .map(|_| ())
        .map_err(|e| ConfigError::invalid_value("telemetry.logging.level", e.to_string()))
}

/// Builder for [`ArborConfig`].
#[derive(Debug, Default)]
pub struct ArborConfigBuilder {
    build: Option<BuildConfig>,
    runtime: Option<RuntimeConfig>,
    telemetry: Option<TelemetryConfigSection>,
}

impl ArborConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the build configuration.
    #[must_use]
    pub fn build_section(mut self, build: BuildConfig) -> Self {
        self.build = Some(build);
        self
    }

    /// Set the runtime configuration.
    #[must_use]
    pub fn runtime(mut self, runtime: RuntimeConfig) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Build the configuration.
    ///
    /// Any unset sections will use their default values.
    #[must_use]
    pub fn build(self) -> ArborConfig {
        ArborConfig {
            build: self.build.unwrap_or_default(),
            runtime: self.runtime.unwrap_or_default(),
            telemetry: self.telemetry.unwrap_or_default(),
        }
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if validation fails.
    pub fn build_validated(self) -> Result<ArborConfig, ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TieBreak;

    #[test]
    fn test_default_config() {
        let config = ArborConfig::default();
        assert!(config.build.remove_unused_beans);
        assert_eq!(config.telemetry.service_name, "arbor");
        assert!(!config.telemetry.metrics.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_sections() {
        let config = ArborConfig::builder()
            .build_section(BuildConfig {
                fail_on_warnings: true,
                ..Default::default()
            })
            .runtime(RuntimeConfig {
                strict_deactivation: false,
                ..Default::default()
            })
            .build();

        assert!(config.build.fail_on_warnings);
        assert!(!config.runtime.strict_deactivation);
        // Other sections use defaults
        assert_eq!(config.telemetry.service_name, "arbor");
    }

    #[test]
    fn test_validate_empty_tie_break() {
        let result = ArborConfig::builder()
            .build_section(BuildConfig {
                tie_break: Vec::new(),
                ..Default::default()
            })
            .build_validated();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("tie_break"));
    }

    #[test]
    fn test_validate_duplicate_tie_break() {
        let config = ArborConfig::builder()
            .build_section(BuildConfig {
                tie_break: vec![TieBreak::DefaultBean, TieBreak::DefaultBean],
                ..Default::default()
            })
            .build();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = ArborConfig::default();
        config.telemetry.logging.level = "arbor_build=debug,warn".to_string();
        assert!(config.validate().is_ok());

        config.telemetry.logging.level = "verbose".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    #[test]
    fn test_development_preset() {
        let config = ArborConfig::development();
        assert_eq!(config.telemetry.logging.level, "debug");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert!(!config.build.remove_unused_beans);
    }

    #[test]
    fn test_production_preset() {
        let config = ArborConfig::production();
        assert_eq!(config.telemetry.logging.format, LogFormat::Json);
        assert!(config.telemetry.metrics.enabled);
        assert!(config.build.fail_on_warnings);
    }

    #[test]
    fn test_toml_serialization() {
        let config = ArborConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[build]"));
        assert!(toml_str.contains("[runtime]"));
        assert!(toml_str.contains("tie_break"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        let toml_str = r#"
            [server]
            http_addr = "127.0.0.1:8000"
        "#;

        let result: Result<ArborConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }
}
