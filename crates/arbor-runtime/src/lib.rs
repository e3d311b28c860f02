//! # Arbor Runtime
//!
//! The runtime half of the Arbor dependency-injection container.
//!
//! A [`Container`] runs a frozen [`arbor_build::Deployment`] with the
//! [`Bindings`] that implement its beans:
//!
//! - [`Context`] - Per-scope instance storage with activation and termination
//! - [`ClientProxy`] - Lazy references to normal-scoped beans
//! - [`InvocationContext`] - Interceptor and decorator chains with the exception policy
//! - [`Instance`] / [`InstanceHandle`] - Programmatic lookup
//! - [`ObservedEvent`] - Event delivery, including context lifecycle events
//! - [`ContextSnapshot`] - Context propagation across async boundaries
//! - [`Lifecycle`] - The process-wide container

#![doc(html_root_url = "https://docs.rs/arbor-runtime/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod bindings;
pub mod container;
pub mod context;
pub mod creational;
pub mod error;
pub mod events;
pub mod interception;
pub mod lifecycle;
pub mod propagation;
pub mod proxy;

pub use bindings::Bindings;
pub use container::{Container, Instance, InstanceHandle};
pub use context::{Context, ContextState, ManagedContext, SharedContext};
pub use creational::{ContextualInstance, CreationalContext};
pub use error::{ContainerError, ContainerResult};
pub use events::ObservedEvent;
pub use interception::{ApplicationError, ExceptionKind, InterceptorMethod, InvocationContext, Value};
pub use lifecycle::Lifecycle;
pub use propagation::{with_request_context, ContextSnapshot, OwnedRequestContext, Propagated};
pub use proxy::ClientProxy;
