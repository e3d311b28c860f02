//! # Arbor Core
//!
//! Core model types for the Arbor dependency-injection container.
//!
//! This crate provides the types shared by the build-time graph processor and
//! the runtime container:
//!
//! - [`TypeRef`] - Type signatures and typesafe assignability
//! - [`AnnotationInstance`] - Annotations with member values
//! - [`IndexView`] / [`MemoryIndex`] - The read-only component index
//! - [`Registry`] - Qualifier, scope, stereotype and interceptor binding types
//! - [`Diagnostic`] - Structured build problems
//! - [`Creator`] - The type-erased instance creation seam
//! - [`ArborError`] / [`ErrorCategory`] - Error taxonomy

#![doc(html_root_url = "https://docs.rs/arbor-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod annotation;
pub mod creator;
pub mod diagnostic;
pub mod error;
pub mod fixtures;
pub mod index;
pub mod names;
pub mod registry;
pub mod types;

pub use annotation::{AnnotationInstance, AnnotationValue};
pub use creator::{BeanInstance, CreationContext, Creator, Inject, Injected, LazyInstance};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use error::{ArborError, ArborResult, ErrorCategory};
pub use index::{ClassInfo, ClassKind, FieldInfo, IndexView, MemoryIndex, MethodInfo, ParameterInfo};
pub use names::ClassName;
pub use registry::{Registry, RegistryBuilder, StereotypeDescriptor};
pub use types::{PrimitiveKind, TypeRef};
