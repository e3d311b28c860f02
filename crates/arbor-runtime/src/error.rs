//! Runtime error types.

use crate::interception::ApplicationError;
use arbor_core::error::{ArborError, ErrorCategory};
use arbor_core::names::ClassName;
use thiserror::Error;

/// Result type for runtime operations.
pub type ContainerResult<T> = Result<T, ContainerError>;

/// Errors raised by a running container.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// A scope was used while its context was not active.
    #[error("Context for scope {scope} is not active")]
    ContextNotActive {
        /// The scope annotation.
        scope: ClassName,
    },

    /// A managed context was activated twice on the same thread.
    #[error("Context for scope {scope} is already active on this thread")]
    ContextAlreadyActive {
        /// The scope annotation.
        scope: ClassName,
    },

    /// No bean matches a lookup.
    #[error("Unsatisfied dependency for type {required}")]
    Unsatisfied {
        /// The required type and qualifiers.
        required: String,
    },

    /// Several beans match a lookup.
    #[error("Ambiguous dependency for type {required}: {}", beans.join(", "))]
    Ambiguous {
        /// The required type and qualifiers.
        required: String,
        /// The eligible beans.
        beans: Vec<String>,
    },

    /// A bean could not be created.
    #[error(transparent)]
    Creation(ArborError),

    /// A business method invocation failed.
    #[error("Invocation of {bean}#{method} failed: {source}")]
    Invocation {
        /// The intercepted bean.
        bean: String,
        /// The method signature.
        method: String,
        /// The application failure, after the exception policy was applied.
        #[source]
        source: ApplicationError,
    },

    /// An observer method failed.
    #[error("Observer {observer} failed: {source}")]
    Observer {
        /// The observer identifier.
        observer: String,
        /// The application failure.
        #[source]
        source: ApplicationError,
    },

    /// An instance did not have the expected Rust type.
    #[error("Bean {bean} is not an instance of {expected}")]
    TypeMismatch {
        /// Identifier of the bean.
        bean: String,
        /// The requested Rust type name.
        expected: &'static str,
    },

    /// The container has not been started or was shut down.
    #[error("Container is not running")]
    NotRunning,

    /// No bean with this identifier exists in the deployment.
    #[error("Unknown bean {id}")]
    UnknownBean {
        /// The requested identifier.
        id: String,
    },

    /// No implementation is bound for a method of a bean.
    #[error("No implementation bound for {bean}#{method}")]
    UnboundMethod {
        /// Identifier of the bean.
        bean: String,
        /// Method name or signature.
        method: String,
    },

    /// One or more destruction callbacks failed. Destruction continued past each.
    #[error("{} destruction callback(s) failed: {}", failures.len(), failures.join("; "))]
    Destruction {
        /// One message per failed callback.
        failures: Vec<String>,
    },
}

impl ContainerError {
    /// Creates a context-not-active error.
    pub fn context_not_active(scope: impl Into<ClassName>) -> Self {
        Self::ContextNotActive { scope: scope.into() }
    }

    /// Creates an unbound-method error.
    pub fn unbound(bean: impl Into<String>, method: impl Into<String>) -> Self {
        Self::UnboundMethod {
            bean: bean.into(),
            method: method.into(),
        }
    }

    /// Returns the application failure carried by an invocation or observer error.
    #[must_use]
    pub fn application_error(&self) -> Option<&ApplicationError> {
        match self {
            Self::Invocation { source, .. } | Self::Observer { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ContextNotActive { .. } | Self::ContextAlreadyActive { .. } => ErrorCategory::ContextNotActive,
            Self::Unsatisfied { .. } => ErrorCategory::UnsatisfiedResolution,
            Self::Ambiguous { .. } => ErrorCategory::AmbiguousResolution,
            Self::Creation(inner) => inner.category(),
            Self::Invocation { .. } | Self::Observer { .. } => ErrorCategory::Interception,
            Self::TypeMismatch { .. } | Self::Destruction { .. } => ErrorCategory::Creation,
            Self::NotRunning | Self::UnknownBean { .. } | Self::UnboundMethod { .. } => ErrorCategory::Internal,
        }
    }

    /// Converts into the error type seen by creators and client proxies.
    pub fn into_arbor(self, bean: &str) -> ArborError {
        match self {
            Self::Creation(inner) => inner,
            Self::ContextNotActive { scope } => ArborError::ContextNotActive { scope },
            Self::TypeMismatch { bean, expected } => ArborError::TypeMismatch { bean, expected },
            Self::Unsatisfied { required } => {
                ArborError::creation(bean, anyhow::anyhow!("Unsatisfied dependency for type {required}"))
            }
            other => ArborError::creation(bean, other),
        }
    }
}

impl From<ArborError> for ContainerError {
    fn from(error: ArborError) -> Self {
        match error {
            ArborError::ContextNotActive { scope } => Self::ContextNotActive { scope },
            ArborError::TypeMismatch { bean, expected } => Self::TypeMismatch { bean, expected },
            other => Self::Creation(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_not_active_round_trips() {
        let error = ContainerError::from(ArborError::context_not_active("arbor.RequestScoped"));
        assert!(matches!(error, ContainerError::ContextNotActive { .. }));
        assert_eq!(error.category(), ErrorCategory::ContextNotActive);
        assert!(matches!(
            error.into_arbor("acme.Cart"),
            ArborError::ContextNotActive { .. }
        ));
    }

    #[test]
    fn test_creation_keeps_its_category() {
        let error = ContainerError::from(ArborError::creation("acme.Pool", anyhow::anyhow!("refused")));
        assert_eq!(error.category(), ErrorCategory::Creation);
        assert!(error.to_string().contains("acme.Pool"));
    }

    #[test]
    fn test_destruction_lists_failures() {
        let error = ContainerError::Destruction {
            failures: vec!["acme.A: closed".to_string(), "acme.B: busy".to_string()],
        };
        assert_eq!(error.to_string(), "2 destruction callback(s) failed: acme.A: closed; acme.B: busy");
    }

    #[test]
    fn test_invocation_exposes_application_error() {
        let error = ContainerError::Invocation {
            bean: "acme.Service".to_string(),
            method: "run()".to_string(),
            source: ApplicationError::unchecked("acme.Bug", anyhow::anyhow!("oops")),
        };
        assert_eq!(error.category(), ErrorCategory::Interception);
        assert_eq!(
            error.application_error().map(|e| e.type_name().as_str()),
            Some("acme.Bug")
        );
    }
}
