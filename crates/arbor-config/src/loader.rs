//! Layered configuration loading.
//!
//! A [`ConfigLoader`] starts from defaults or a preset, lets a TOML or JSON
//! document replace them, then applies `PREFIX__SECTION__KEY` environment
//! overrides on top. Overrides are written into the serialised configuration
//! tree and deserialised again, so they go through the same field types and
//! `deny_unknown_fields` checks as files do.

use crate::{ArborConfig, ConfigError};
use std::env;
use std::fs;
use std::path::Path;
use toml::Value;

/// Builds an [`ArborConfig`] from defaults, documents and the environment.
///
/// ```no_run
/// use arbor_config::ConfigLoader;
///
/// # fn main() -> Result<(), arbor_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("arbor.toml")?
///     .with_env_prefix("ARBOR")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: ArborConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to the defaults.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = ArborConfig::default();
        self
    }

    /// Resets to [`ArborConfig::development`].
    ///
    /// ```
    /// use arbor_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ArborConfig::development();
        self
    }

    /// Resets to [`ArborConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ArborConfig::production();
        self
    }

    /// Replaces the configuration with a `.toml` or `.json` file.
    ///
    /// Sections and fields the file leaves out take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing or unreadable, has another
    /// extension, or does not parse.
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| unsupported(&path.display().to_string()))?;
        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.with_string(&content, &format)
    }

    /// Like [`ConfigLoader::with_file`], but a missing file leaves the configuration as is.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read or parsed.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Replaces the configuration with a `"toml"` or `"json"` document.
    ///
    /// ```
    /// use arbor_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[build]\nremove_unused_beans = false", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert!(!config.build.remove_unused_beans);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for another format or a document that does not parse.
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            other => return Err(unsupported(other)),
        };
        Ok(self)
    }

    /// Reads `PREFIX__SECTION__KEY` variables when loading, e.g.
    /// `ARBOR__TELEMETRY__LOGGING__LEVEL=debug`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment if there is one.
    ///
    /// # Errors
    ///
    /// Never fails; returns `Result` so it chains with the other layers.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(self)
    }

    /// Applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override does not fit its field or the
    /// result fails [`ArborConfig::validate`].
    pub fn load(mut self) -> Result<ArborConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let mut vars: Vec<(String, String)> = env::vars().filter(|(k, _)| k.starts_with(&prefix)).collect();
            vars.sort();
            for (key, value) in vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ArborConfig {
        self.config
    }

    /// Writes one override into the configuration tree. Keys naming no
    /// existing field are ignored.
    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let path: Vec<String> = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "expected PREFIX__SECTION__KEY"))?
            .split("__")
            .map(str::to_lowercase)
            .collect();

        let mut tree = Value::try_from(&self.config).map_err(|e| ConfigError::validation_error(e.to_string()))?;
        let Some(slot) = path.iter().try_fold(&mut tree, |node, part| node.get_mut(part.as_str())) else {
            return Ok(());
        };
        *slot = env_value(slot, value).map_err(|reason| ConfigError::env_parse_error(key, reason))?;
        self.config = tree
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::env_parse_error(key, e.message()))?;
        Ok(())
    }
}

fn unsupported(format: &str) -> ConfigError {
    ConfigError::validation_error(format!("unsupported configuration format: {format}"))
}

/// Converts a variable into the shape of the value it replaces. Lists are
/// comma separated.
fn env_value(current: &Value, raw: &str) -> Result<Value, &'static str> {
    match current {
        Value::Boolean(_) => parse_bool(raw).map(Value::Boolean).ok_or("expected boolean"),
        Value::Integer(_) => raw.trim().parse().map(Value::Integer).map_err(|_| "expected integer"),
        Value::Float(_) => raw.trim().parse().map(Value::Float).map_err(|_| "expected number"),
        Value::Array(_) => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(list_item)
                .collect(),
        )),
        _ => Ok(Value::String(raw.to_string())),
    }
}

fn list_item(item: &str) -> Value {
    if let Ok(integer) = item.parse() {
        Value::Integer(integer)
    } else if let Ok(float) = item.parse() {
        Value::Float(float)
    } else {
        Value::String(item.to_string())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LogFormat, TieBreak};

    fn apply(pairs: &[(&str, &str)]) -> Result<ArborConfig, ConfigError> {
        let mut loader = ConfigLoader::new();
        for (key, value) in pairs {
            loader.apply_env_var(key, value, "TEST")?;
        }
        Ok(loader.config)
    }

    #[test]
    fn test_presets() {
        let development = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(development.telemetry.logging.format, LogFormat::Pretty);
        let production = ConfigLoader::new().with_production().load().unwrap();
        assert!(production.build.fail_on_warnings);
    }

    #[test]
    fn test_json_document_keeps_defaults_for_missing_fields() {
        let config = ConfigLoader::new()
            .with_string(r#"{"runtime": {"strict_deactivation": false}}"#, "json")
            .unwrap()
            .load()
            .unwrap();
        assert!(!config.runtime.strict_deactivation);
        assert!(config.runtime.propagate_contexts);
    }

    #[test]
    fn test_unsupported_format_and_missing_file() {
        assert!(ConfigLoader::new().with_string("a: 1", "yaml").is_err());
        let missing = ConfigLoader::new().with_file("/nonexistent/arbor.toml");
        assert!(matches!(missing, Err(ConfigError::FileNotFound { .. })));
        assert!(ConfigLoader::new().with_optional_file("/nonexistent/arbor.toml").is_ok());
    }

    #[test]
    fn test_load_unvalidated_skips_validation() {
        let config = ConfigLoader::new()
            .with_string("[build]\ntie_break = []", "toml")
            .unwrap()
            .load_unvalidated();
        assert!(config.build.tie_break.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_follow_field_types() {
        let config = apply(&[
            ("TEST__BUILD__REMOVE_UNUSED_BEANS", "off"),
            ("TEST__BUILD__UNREMOVABLE_TYPES", "acme.Api, acme.Jobs,"),
            ("TEST__BUILD__TIE_BREAK", "alternative_priority,default_bean"),
            ("TEST__TELEMETRY__SERVICE_NAME", "inventory"),
            ("TEST__TELEMETRY__LOGGING__FORMAT", "pretty"),
            ("TEST__TELEMETRY__METRICS__HISTOGRAM_BUCKETS", "0.5, 1"),
        ])
        .unwrap();

        assert!(!config.build.remove_unused_beans);
        assert_eq!(config.build.unremovable_types, vec!["acme.Api", "acme.Jobs"]);
        assert_eq!(config.build.tie_break, vec![TieBreak::AlternativePriority, TieBreak::DefaultBean]);
        assert_eq!(config.telemetry.service_name, "inventory");
        assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
        assert_eq!(config.telemetry.metrics.histogram_buckets, vec![0.5, 1.0]);
    }

    #[test]
    fn test_env_override_errors_name_the_variable() {
        let err = apply(&[("TEST__BUILD__FAIL_ON_WARNINGS", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvParseError { ref var, .. } if var == "TEST__BUILD__FAIL_ON_WARNINGS"));
        assert!(apply(&[("TEST__BUILD__TIE_BREAK", "coin_flip")]).is_err());
        assert!(apply(&[("TEST__TELEMETRY__LOGGING__FORMAT", "xml")]).is_err());
        assert!(apply(&[("OTHER_BUILD", "true")]).is_err());
    }

    #[test]
    fn test_unknown_env_keys_are_ignored() {
        let config = apply(&[("TEST__BUILD__NOT_A_FIELD", "1"), ("TEST__NOWHERE__AT__ALL", "x")]).unwrap();
        assert_eq!(config, ArborConfig::default());
    }
}
