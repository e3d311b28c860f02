//! Typed configuration for Arbor.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! The root [`ArborConfig`] has three sections:
//!
//! - [`BuildConfig`] - bean discovery, unused bean removal, tie-break policy
//! - [`RuntimeConfig`] - context propagation and deactivation policy
//! - [`TelemetryConfigSection`] - logging and metrics
//!
//! # Example
//!
//! ```no_run
//! use arbor_config::ConfigLoader;
//!
//! # fn main() -> Result<(), arbor_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("arbor.toml")?
//!     .with_env_prefix("ARBOR")
//!     .load()?;
//!
//! println!("Removing unused beans: {}", config.build.remove_unused_beans);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [build]
//! remove_unused_beans = true
//! unremovable_types = ["acme.Api"]
//! excluded_types = []
//! tie_break = ["default_bean", "alternative_priority"]
//! fail_on_warnings = false
//! emit_metadata = true
//!
//! [runtime]
//! propagate_contexts = true
//! strict_deactivation = true
//!
//! [telemetry]
//! service_name = "arbor"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = false
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY` variables:
//!
//! - `ARBOR__BUILD__REMOVE_UNUSED_BEANS=false`
//! - `ARBOR__BUILD__TIE_BREAK=alternative_priority,default_bean`
//! - `ARBOR__TELEMETRY__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
