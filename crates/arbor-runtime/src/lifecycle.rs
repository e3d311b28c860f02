//! The process-wide container.
//!
//! At most one container is current per process. [`Lifecycle::initialize`]
//! shuts down the prior container before the new one becomes current, and
//! returns a handle that consumers receive by reference.
//!
//! # Example
//!
//! ```
//! use arbor_build::BeanProcessor;
//! use arbor_config::{BuildConfig, RuntimeConfig};
//! use arbor_core::fixtures;
//! use arbor_runtime::{Bindings, Lifecycle};
//!
//! let deployment = BeanProcessor::new(&fixtures::greeting_index(), &BuildConfig::default())
//!     .process()
//!     .unwrap();
//! let container = Lifecycle::initialize(deployment, Bindings::new(), &RuntimeConfig::default()).unwrap();
//! assert!(container.is_running());
//!
//! Lifecycle::shutdown().unwrap();
//! assert!(!container.is_running());
//! ```

use crate::bindings::Bindings;
use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};
use arbor_build::Deployment;
use arbor_config::RuntimeConfig;
use parking_lot::Mutex;
use tracing::{error, info, warn};

static CURRENT: Mutex<Option<Container>> = parking_lot::const_mutex(None);

/// Initialization and shutdown of the process-wide container.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle;

impl Lifecycle {
    /// Starts a container and makes it current, shutting down the prior one first.
    pub fn initialize(deployment: Deployment, bindings: Bindings, config: &RuntimeConfig) -> ContainerResult<Container> {
        if let Some(prior) = CURRENT.lock().take() {
            warn!(container = %prior.id(), "Container already initialized; shutting it down");
            shutdown_logged(&prior);
        }

        let container = Container::start(deployment, bindings, config)?;
        let displaced = CURRENT.lock().replace(container.clone());
        if let Some(displaced) = displaced {
            warn!(container = %displaced.id(), "Container initialized concurrently; shutting it down");
            shutdown_logged(&displaced);
        }
        info!(container = %container.id(), "Container initialized");
        Ok(container)
    }

    /// The current container.
    pub fn current() -> ContainerResult<Container> {
        Self::try_current().ok_or(ContainerError::NotRunning)
    }

    /// The current container, if any.
    #[must_use]
    pub fn try_current() -> Option<Container> {
        CURRENT.lock().clone()
    }

    /// Returns `true` if a container is current.
    #[must_use]
    pub fn is_initialized() -> bool {
        CURRENT.lock().is_some()
    }

    /// Shuts the current container down. Does nothing when none is current.
    pub fn shutdown() -> ContainerResult<()> {
        let current = CURRENT.lock().take();
        match current {
            Some(container) => container.shutdown(),
            None => Ok(()),
        }
    }
}

fn shutdown_logged(container: &Container) {
    if let Err(e) = container.shutdown() {
        error!(container = %container.id(), error = %e, "Container shutdown failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_build::BeanProcessor;
    use arbor_config::BuildConfig;
    use arbor_core::fixtures;

    static SERIAL: Mutex<()> = parking_lot::const_mutex(());

    fn deployment() -> Deployment {
        BeanProcessor::new(&fixtures::greeting_index(), &BuildConfig::default())
            .process()
            .unwrap()
    }

    #[test]
    fn test_initialize_shuts_down_the_prior_container() {
        let _serial = SERIAL.lock();
        let first = Lifecycle::initialize(deployment(), Bindings::new(), &RuntimeConfig::default()).unwrap();
        let second = Lifecycle::initialize(deployment(), Bindings::new(), &RuntimeConfig::default()).unwrap();

        assert!(!first.is_running());
        assert!(second.is_running());
        assert_eq!(Lifecycle::current().unwrap().id(), second.id());
        Lifecycle::shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_clears_the_current_container() {
        let _serial = SERIAL.lock();
        let container = Lifecycle::initialize(deployment(), Bindings::new(), &RuntimeConfig::default()).unwrap();
        assert!(Lifecycle::is_initialized());

        Lifecycle::shutdown().unwrap();
        assert!(!Lifecycle::is_initialized());
        assert!(!container.is_running());
        assert!(matches!(Lifecycle::current(), Err(ContainerError::NotRunning)));
        Lifecycle::shutdown().unwrap();
    }
}
