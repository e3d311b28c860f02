//! # Arbor
//!
//! **A build-time dependency-injection container.**
//!
//! Arbor computes the whole bean graph ahead of execution: which beans exist,
//! what every injection point resolves to, how interceptors and decorators
//! wrap each method, and which definitions are invalid. Problems surface as a
//! single aggregated deployment error before anything runs. The runtime then
//! only manages contexts, proxies and the precomposed chains.
//!
//! ## Quick Start
//!
//! ```
//! use arbor::prelude::*;
//! use arbor::core::fixtures;
//! use arbor::core::creator::instance;
//!
//! struct Clock;
//!
//! let mut config = ArborConfig::default();
//! config.build.remove_unused_beans = false;
//!
//! let bindings = Bindings::new().factory(fixtures::CLOCK, |_: &mut dyn CreationContext| Ok(instance(Clock)));
//! let app = Arbor::new(config).bootstrap(&fixtures::greeting_index(), bindings).unwrap();
//!
//! let clock = app.container().select(&TypeRef::class(fixtures::CLOCK), &[]);
//! assert!(clock.get::<Clock>().is_ok());
//! app.shutdown().unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! index → registry → discovery → synthetic beans → resolution → observers
//!       → unused bean removal → validation → chain composition → Deployment
//!                                                                    ↓
//!                       Bindings ──────────────────────────────→ Container
//! ```

#![doc(html_root_url = "https://docs.rs/arbor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bootstrap;

pub use bootstrap::{Application, Arbor, BootstrapError, BootstrapResult};

// Re-export the member crates
pub use arbor_build as build;
pub use arbor_config as config;
pub use arbor_core as core;
pub use arbor_runtime as runtime;
pub use arbor_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use arbor::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bootstrap::{Application, Arbor, BootstrapError};

    // Model
    pub use arbor_core::{
        AnnotationInstance, ArborError, ArborResult, BeanInstance, CreationContext, Creator, ErrorCategory, Inject,
        IndexView, MemoryIndex, TypeRef,
    };

    // Build
    pub use arbor_build::{BeanProcessor, BuildExtension, Deployment, DeploymentError, Resolution, SyntheticBean};

    // Configuration
    pub use arbor_config::{ArborConfig, ConfigLoader};

    // Runtime
    pub use arbor_runtime::{
        ApplicationError, Bindings, Container, ContainerError, ContextSnapshot, Instance, InstanceHandle,
        InvocationContext, Lifecycle, Value,
    };
}
