//! One-call startup: configuration, telemetry, build pipeline, container.
//!
//! # Example
//!
//! ```
//! use arbor::prelude::*;
//! use arbor::core::fixtures;
//!
//! let mut config = ArborConfig::default();
//! config.build.remove_unused_beans = false;
//!
//! let app = Arbor::new(config)
//!     .bootstrap(&fixtures::greeting_index(), Bindings::new())
//!     .unwrap();
//! assert!(app.container().is_running());
//! app.shutdown().unwrap();
//! ```

use arbor_build::{BeanProcessor, BuildExtension, Deployment, DeploymentError};
use arbor_config::{ArborConfig, ConfigError, ConfigLoader};
use arbor_core::IndexView;
use arbor_runtime::{Bindings, Container, ContainerError, Lifecycle};
use arbor_telemetry::{init_telemetry, MetricsRegistry, TelemetryError};
use std::fmt;
use thiserror::Error;
use tracing::info;

/// Environment variable prefix read by [`Arbor::from_env`].
pub const ENV_PREFIX: &str = "ARBOR";

/// Errors raised while bootstrapping.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging or metrics could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The bean graph has fatal problems.
    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    /// The container failed to start.
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Result type for bootstrapping.
pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// Bootstrap builder.
pub struct Arbor {
    config: ArborConfig,
    extensions: Vec<Box<dyn BuildExtension>>,
    telemetry: bool,
    global: bool,
}

impl Arbor {
    /// Starts from an explicit configuration.
    #[must_use]
    pub fn new(config: ArborConfig) -> Self {
        Self {
            config,
            extensions: Vec::new(),
            telemetry: false,
            global: false,
        }
    }

    /// Loads the defaults overlaid with `ARBOR__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Config` if an override is malformed or the
    /// result fails validation.
    pub fn from_env() -> BootstrapResult<Self> {
        let config = ConfigLoader::new().with_defaults().with_env_prefix(ENV_PREFIX).load()?;
        Ok(Self::new(config))
    }

    /// Loads the given loader.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Config` if loading or validation fails.
    pub fn from_loader(loader: ConfigLoader) -> BootstrapResult<Self> {
        Ok(Self::new(loader.load()?))
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    /// Adds a build extension.
    #[must_use]
    pub fn extension(mut self, extension: impl BuildExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Installs logging and metrics from the `[telemetry]` section during bootstrap.
    ///
    /// Telemetry can be installed once per process.
    #[must_use]
    pub fn with_telemetry(mut self) -> Self {
        self.telemetry = true;
        self
    }

    /// Makes the container the process-wide one through [`Lifecycle`].
    #[must_use]
    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    /// Runs the build pipeline only.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Deployment` when the graph has fatal problems.
    pub fn build(self, index: &dyn IndexView) -> BootstrapResult<Deployment> {
        let mut processor = BeanProcessor::new(index, &self.config.build);
        for extension in self.extensions {
            processor = processor.boxed_extension(extension);
        }
        Ok(processor.process()?)
    }

    /// Installs telemetry if requested, builds the deployment and starts the container.
    ///
    /// # Errors
    ///
    /// Returns the first failure among telemetry installation, the build
    /// pipeline and container startup.
    pub fn bootstrap(self, index: &dyn IndexView, bindings: Bindings) -> BootstrapResult<Application> {
        let metrics = if self.telemetry {
            init_telemetry(&self.config.telemetry.to_telemetry_config())?
        } else {
            None
        };

        let runtime = self.config.runtime;
        let global = self.global;
        let deployment = self.build(index)?;
        let container = if global {
            Lifecycle::initialize(deployment, bindings, &runtime)?
        } else {
            Container::start(deployment, bindings, &runtime)?
        };
        info!(container = %container.id(), global, "Arbor bootstrapped");

        Ok(Application {
            container,
            metrics,
            global,
        })
    }
}

impl fmt::Debug for Arbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.extensions.iter().map(|e| e.name()).collect();
        f.debug_struct("Arbor")
            .field("config", &self.config)
            .field("extensions", &names)
            .field("telemetry", &self.telemetry)
            .field("global", &self.global)
            .finish()
    }
}

/// A bootstrapped application.
#[derive(Debug)]
pub struct Application {
    container: Container,
    metrics: Option<MetricsRegistry>,
    global: bool,
}

impl Application {
    /// The running container.
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// The metrics registry, when metrics were installed.
    #[must_use]
    pub fn metrics(&self) -> Option<&MetricsRegistry> {
        self.metrics.as_ref()
    }

    /// Shuts the container down, clearing the process-wide container if this is it.
    ///
    /// # Errors
    ///
    /// Returns `BootstrapError::Container` listing failed destruction callbacks.
    pub fn shutdown(self) -> BootstrapResult<()> {
        if self.global && Lifecycle::try_current().is_some_and(|c| c.id() == self.container.id()) {
            Lifecycle::shutdown()?;
        } else {
            self.container.shutdown()?;
        }
        Ok(())
    }
}
