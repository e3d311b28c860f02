//! File-based configuration loading tests.

use arbor_config::{ConfigError, ConfigLoader, LogFormat, TieBreak};
use std::io::Write;
use tempfile::Builder;

#[test]
fn test_load_toml_file() {
    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[build]
unremovable_types = ["acme.Api"]
tie_break = ["alternative_priority"]

[telemetry.logging]
format = "pretty"
"#
    )
    .unwrap();

    let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();

    assert!(config.build.is_unremovable("acme.Api"));
    assert_eq!(config.build.tie_break, vec![TieBreak::AlternativePriority]);
    assert_eq!(config.telemetry.logging.format, LogFormat::Pretty);
    assert!(config.runtime.strict_deactivation);
}

#[test]
fn test_load_json_file() {
    let mut file = Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{"build": {{"fail_on_warnings": true}}}}"#).unwrap();

    let config = ConfigLoader::new()
        .with_optional_file(file.path())
        .unwrap()
        .load()
        .unwrap();

    assert!(config.build.fail_on_warnings);
}

#[test]
fn test_unknown_field_in_file_rejected() {
    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[build]\nremove_everything = true").unwrap();

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::TomlError(_))));
}

#[test]
fn test_unsupported_extension_rejected() {
    let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
    writeln!(file, "build: {{}}").unwrap();

    let result = ConfigLoader::new().with_file(file.path());
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn test_invalid_file_fails_validation_on_load() {
    let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[telemetry.logging]\nlevel = \"chatty\"").unwrap();

    let result = ConfigLoader::new().with_file(file.path()).unwrap().load();
    assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
}
