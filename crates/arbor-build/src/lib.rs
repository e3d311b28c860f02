//! # Arbor Build
//!
//! Build-time processing for the Arbor dependency-injection container.
//!
//! Given a component index, this crate discovers beans, resolves every
//! injection point, validates the graph as a whole, and composes the
//! interception chains the runtime executes:
//!
//! - [`BeanGraphBuilder`] - Bean, producer, observer, interceptor and decorator discovery
//! - [`Resolver`] - Typesafe resolution with a configurable tie-break policy
//! - [`Validator`] - Definition, deployment and resolution checks
//! - [`ChainComposer`] - Deterministic interceptor and decorator ordering
//! - [`BuildExtension`] - Registration, synthetic beans, observation and validation hooks
//! - [`BeanProcessor`] - The full pipeline, producing a frozen [`Deployment`]
//!
//! # Example
//!
//! ```
//! use arbor_build::BeanProcessor;
//! use arbor_config::BuildConfig;
//! use arbor_core::fixtures;
//!
//! let index = fixtures::greeting_index();
//! let config = BuildConfig {
//!     remove_unused_beans: false,
//!     ..BuildConfig::default()
//! };
//! let deployment = BeanProcessor::new(&index, &config).process().unwrap();
//! assert_eq!(deployment.beans().count(), 3);
//! ```

#![doc(html_root_url = "https://docs.rs/arbor-build/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bean;
pub mod builder;
pub mod chain;
pub mod error;
pub mod extension;
pub mod graph;
pub mod injection;
pub mod interceptor;
pub mod metadata;
pub mod observer;
pub mod processor;
pub mod removal;
pub mod resolver;
pub mod validator;

pub use bean::{BeanId, BeanInfo, BeanKind, BusinessMethod};
pub use builder::BeanGraphBuilder;
pub use chain::{ChainComposer, ChainLink, ChainState, InterceptionChains, MethodChain, PriorityTier};
pub use error::{ChainStateError, DeploymentError};
pub use extension::{
    BeanExclusion, BuildExtension, GraphObservation, RegistrationContext, SyntheticBean, SyntheticContext,
    SyntheticFactory, ValidationContext,
};
pub use graph::{BeanGraph, TypeHierarchy};
pub use injection::{InjectionKind, InjectionPoint, InjectionTarget, MetadataKind};
pub use interceptor::{CallbackKind, DecoratorInfo, InterceptorInfo};
pub use metadata::DeploymentMetadata;
pub use observer::ObserverInfo;
pub use processor::{BeanProcessor, Deployment};
pub use removal::{RemovalReason, RemovedBean};
pub use resolver::{Resolution, Resolver};
pub use validator::Validator;
