//! Error types shared by the build and runtime crates.
//!
//! [`ErrorCategory`] classifies every failure the container can report, at
//! build time (as diagnostics) and at runtime (as errors). [`ArborError`] is
//! the error returned by bean creation callbacks and type-erased lookups.

use crate::names::ClassName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ArborError`].
pub type ArborResult<T> = Result<T, ArborError>;

/// Categories of container failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Structural illegality of a single declaration.
    Definition,
    /// Illegality that depends on the deployment as a whole.
    Deployment,
    /// No bean matches an injection point or lookup.
    UnsatisfiedResolution,
    /// Several beans match an injection point or lookup.
    AmbiguousResolution,
    /// A scope was used while its context was not active.
    ContextNotActive,
    /// A bean instance could not be created or destroyed.
    Creation,
    /// An intercepted invocation failed.
    Interception,
    /// Invalid configuration.
    Configuration,
    /// Internal container error.
    Internal,
}

impl ErrorCategory {
    /// Returns the stable machine-readable code of this category.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Definition => "DEFINITION_ERROR",
            Self::Deployment => "DEPLOYMENT_ERROR",
            Self::UnsatisfiedResolution => "UNSATISFIED_RESOLUTION",
            Self::AmbiguousResolution => "AMBIGUOUS_RESOLUTION",
            Self::ContextNotActive => "CONTEXT_NOT_ACTIVE",
            Self::Creation => "CREATION_ERROR",
            Self::Interception => "INTERCEPTION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns `true` for categories that are detected while building the graph.
    #[must_use]
    pub const fn is_build_time(&self) -> bool {
        matches!(
            self,
            Self::Definition | Self::Deployment | Self::UnsatisfiedResolution | Self::AmbiguousResolution
        )
    }
}

/// Errors raised while creating, injecting or casting bean instances.
///
/// # Example
///
/// ```
/// use arbor_core::error::{ArborError, ErrorCategory};
///
/// let error = ArborError::creation("acme.Greeter", anyhow::anyhow!("connection refused"));
/// assert_eq!(error.category(), ErrorCategory::Creation);
/// assert!(error.to_string().contains("acme.Greeter"));
/// ```
#[derive(Error, Debug)]
pub enum ArborError {
    /// A creation callback failed.
    #[error("Failed to create bean {bean}: {source}")]
    Creation {
        /// Identifier of the bean being created.
        bean: String,
        /// The underlying failure.
        #[source]
        source: anyhow::Error,
    },

    /// An injection point of the bean being created could not be satisfied.
    #[error("Injection point #{position} of bean {bean} could not be satisfied: {reason}")]
    Injection {
        /// Identifier of the bean being created.
        bean: String,
        /// Position of the injection point.
        position: usize,
        /// Why the injection failed.
        reason: String,
    },

    /// An instance did not have the expected Rust type.
    #[error("Bean {bean} is not an instance of {expected}")]
    TypeMismatch {
        /// Identifier of the bean.
        bean: String,
        /// The requested Rust type name.
        expected: &'static str,
    },

    /// A context was required but not active.
    #[error("Context for scope {scope} is not active")]
    ContextNotActive {
        /// The scope annotation.
        scope: ClassName,
    },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl ArborError {
    /// Creates a creation error.
    pub fn creation(bean: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Creation {
            bean: bean.into(),
            source: source.into(),
        }
    }

    /// Creates an injection error.
    pub fn injection(bean: impl Into<String>, position: usize, reason: impl Into<String>) -> Self {
        Self::Injection {
            bean: bean.into(),
            position,
            reason: reason.into(),
        }
    }

    /// Creates a type mismatch error for the Rust type `T`.
    pub fn type_mismatch<T: ?Sized>(bean: impl Into<String>) -> Self {
        Self::TypeMismatch {
            bean: bean.into(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Creates a context-not-active error.
    pub fn context_not_active(scope: impl Into<ClassName>) -> Self {
        Self::ContextNotActive { scope: scope.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Creation { .. } | Self::Injection { .. } | Self::TypeMismatch { .. } => ErrorCategory::Creation,
            Self::ContextNotActive { .. } => ErrorCategory::ContextNotActive,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}
