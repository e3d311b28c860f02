//! Runtime execution of composed interception chains.
//!
//! A chain is a linked list of [`Next`] links ending in a terminal step: the
//! business method body, the bean constructor, or the bean's own lifecycle
//! callbacks. Each interceptor receives the [`InvocationContext`] and continues
//! the chain by calling [`InvocationContext::proceed`] at most once. An
//! interceptor that returns without proceeding short-circuits the chain.
//!
//! # Exception policy
//!
//! Application failures travel as [`ApplicationError`]. When they leave an
//! intercepted business method:
//!
//! - unchecked errors propagate unmodified
//! - checked errors assignable to a type the method declares propagate unmodified
//! - any other checked error is wrapped in an unchecked
//!   [`UNDECLARED_EXCEPTION`] whose cause is the original
//!
//! # Example
//!
//! ```
//! use arbor_runtime::interception::{apply_exception_policy, ApplicationError};
//! use arbor_core::names::ClassName;
//!
//! let declared = [ClassName::new("acme.IoException")];
//!
//! let io = ApplicationError::checked("acme.IoException", anyhow::anyhow!("disk full"));
//! assert_eq!(apply_exception_policy(io, &declared).type_name().as_str(), "acme.IoException");
//!
//! let sql = ApplicationError::checked("acme.SqlException", anyhow::anyhow!("deadlock"));
//! let wrapped = apply_exception_policy(sql, &declared);
//! assert!(!wrapped.is_checked());
//! assert_eq!(wrapped.cause().map(|c| c.type_name().as_str()), Some("acme.SqlException"));
//! ```

use arbor_build::CallbackKind;
use arbor_core::creator::BeanInstance;
use arbor_core::names::ClassName;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Argument and return values of intercepted invocations.
pub type Value = serde_json::Value;

/// Type name of the unchecked wrapper around undeclared checked errors.
pub const UNDECLARED_EXCEPTION: &str = "arbor.lang.UndeclaredThrowableException";

/// Type name of errors raised when a chain is driven incorrectly.
pub const ILLEGAL_STATE: &str = "arbor.lang.IllegalStateException";

/// Whether callers must declare an application error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Must be declared on the method signature to propagate unmodified.
    Checked,
    /// Always propagates unmodified.
    Unchecked,
}

/// A failure raised by application code inside an invocation.
#[derive(Debug, Error)]
#[error("{type_name}: {source}")]
pub struct ApplicationError {
    type_name: ClassName,
    kind: ExceptionKind,
    supertypes: Vec<ClassName>,
    #[source]
    source: anyhow::Error,
}

impl ApplicationError {
    /// Creates a checked application error.
    pub fn checked(type_name: impl Into<ClassName>, source: impl Into<anyhow::Error>) -> Self {
        Self::new(type_name, ExceptionKind::Checked, source)
    }

    /// Creates an unchecked application error.
    pub fn unchecked(type_name: impl Into<ClassName>, source: impl Into<anyhow::Error>) -> Self {
        Self::new(type_name, ExceptionKind::Unchecked, source)
    }

    fn new(type_name: impl Into<ClassName>, kind: ExceptionKind, source: impl Into<anyhow::Error>) -> Self {
        Self {
            type_name: type_name.into(),
            kind,
            supertypes: Vec::new(),
            source: source.into(),
        }
    }

    pub(crate) fn illegal_state(message: impl fmt::Display) -> Self {
        Self::unchecked(ILLEGAL_STATE, anyhow::anyhow!("{message}"))
    }

    /// Declares a supertype this error is assignable to.
    pub fn with_supertype(mut self, supertype: impl Into<ClassName>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Returns the error type name.
    #[must_use]
    pub fn type_name(&self) -> &ClassName {
        &self.type_name
    }

    /// Returns whether the error is checked.
    #[must_use]
    pub const fn kind(&self) -> ExceptionKind {
        self.kind
    }

    /// Returns `true` for checked errors.
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.kind == ExceptionKind::Checked
    }

    /// Returns `true` if this error is an instance of `ty`.
    #[must_use]
    pub fn is_assignable_to(&self, ty: &ClassName) -> bool {
        &self.type_name == ty || self.supertypes.contains(ty)
    }

    /// Returns the wrapped application error, if this is a wrapper.
    #[must_use]
    pub fn cause(&self) -> Option<&ApplicationError> {
        self.source.downcast_ref::<ApplicationError>()
    }

    /// Consumes the error and returns its source.
    pub fn into_source(self) -> anyhow::Error {
        self.source
    }
}

/// Applies the checked/unchecked propagation policy for a method declaring `declared`.
pub fn apply_exception_policy(error: ApplicationError, declared: &[ClassName]) -> ApplicationError {
    match error.kind {
        ExceptionKind::Unchecked => error,
        ExceptionKind::Checked if declared.iter().any(|d| error.is_assignable_to(d)) => error,
        ExceptionKind::Checked => ApplicationError::unchecked(UNDECLARED_EXCEPTION, anyhow::Error::new(error)),
    }
}

/// An interceptor method, or a decorator method, taking part in a chain.
pub trait InterceptorMethod: Send + Sync {
    /// Handles one invocation. Call [`InvocationContext::proceed`] to continue.
    fn intercept(&self, ctx: &mut InvocationContext<'_>) -> Result<Value, ApplicationError>;
}

impl<F> InterceptorMethod for F
where
    F: Fn(&mut InvocationContext<'_>) -> Result<Value, ApplicationError> + Send + Sync,
{
    fn intercept(&self, ctx: &mut InvocationContext<'_>) -> Result<Value, ApplicationError> {
        self(ctx)
    }
}

type Terminal<'a> = Box<dyn FnOnce(&mut InvocationContext<'a>) -> Result<Value, ApplicationError> + 'a>;

/// The remainder of a chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        interceptor: &'a dyn InterceptorMethod,
        next: Box<Next<'a>>,
    },
    Terminal(Terminal<'a>),
}

impl<'a> Next<'a> {
    /// Builds a chain running `interceptors` outermost first, then `terminal`.
    pub fn build<F>(interceptors: &'a [Arc<dyn InterceptorMethod>], terminal: F) -> Self
    where
        F: FnOnce(&mut InvocationContext<'a>) -> Result<Value, ApplicationError> + 'a,
    {
        let mut next = Self {
            inner: NextInner::Terminal(Box::new(terminal)),
        };
        for interceptor in interceptors.iter().rev() {
            next = Self {
                inner: NextInner::Chain {
                    interceptor: interceptor.as_ref(),
                    next: Box::new(next),
                },
            };
        }
        next
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            NextInner::Chain { .. } => f.write_str("Next::Chain"),
            NextInner::Terminal(_) => f.write_str("Next::Terminal"),
        }
    }
}

/// State shared by every link of one invocation.
pub struct InvocationContext<'a> {
    bean: String,
    method: Option<String>,
    kind: CallbackKind,
    target: Option<BeanInstance>,
    parameters: Vec<Value>,
    data: serde_json::Map<String, Value>,
    next: Option<Next<'a>>,
}

impl<'a> InvocationContext<'a> {
    /// Creates a context for `kind` on `bean`.
    pub fn new(bean: impl Into<String>, kind: CallbackKind, next: Next<'a>) -> Self {
        Self {
            bean: bean.into(),
            method: None,
            kind,
            target: None,
            parameters: Vec::new(),
            data: serde_json::Map::new(),
            next: Some(next),
        }
    }

    /// Sets the intercepted method signature.
    pub fn with_method(mut self, signature: impl Into<String>) -> Self {
        self.method = Some(signature.into());
        self
    }

    /// Sets the target instance.
    pub fn with_target(mut self, target: BeanInstance) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the invocation arguments.
    pub fn with_parameters(mut self, parameters: Vec<Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Identifier of the intercepted bean.
    #[must_use]
    pub fn bean(&self) -> &str {
        &self.bean
    }

    /// Signature of the intercepted business method, if any.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// The interception kind.
    #[must_use]
    pub const fn kind(&self) -> CallbackKind {
        self.kind
    }

    /// The target instance. `None` around construction until the constructor ran.
    #[must_use]
    pub fn target(&self) -> Option<&BeanInstance> {
        self.target.as_ref()
    }

    pub(crate) fn set_target(&mut self, target: BeanInstance) {
        self.target = Some(target);
    }

    pub(crate) fn take_target(&mut self) -> Option<BeanInstance> {
        self.target.take()
    }

    /// The invocation arguments.
    #[must_use]
    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Replaces the invocation arguments seen by the rest of the chain.
    pub fn set_parameters(&mut self, parameters: Vec<Value>) {
        self.parameters = parameters;
    }

    /// Data shared between the links of this invocation.
    pub fn context_data(&mut self) -> &mut serde_json::Map<String, Value> {
        &mut self.data
    }

    /// Runs the rest of the chain and returns its result.
    ///
    /// Calling `proceed` twice from the same link is an error.
    pub fn proceed(&mut self) -> Result<Value, ApplicationError> {
        let next = self.next.take().ok_or_else(|| {
            ApplicationError::illegal_state(format_args!("proceed() called more than once on {}", self.bean))
        })?;
        match next.inner {
            NextInner::Chain { interceptor, next } => {
                self.next = Some(*next);
                let result = interceptor.intercept(self);
                self.next = None;
                result
            }
            NextInner::Terminal(terminal) => terminal(self),
        }
    }
}

impl fmt::Debug for InvocationContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("bean", &self.bean)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn push(tag: &'static str) -> Arc<dyn InterceptorMethod> {
        Arc::new(move |ctx: &mut InvocationContext<'_>| {
            let mut trail = ctx.context_data().get("trail").cloned().unwrap_or_else(|| json!([]));
            if let Some(items) = trail.as_array_mut() {
                items.push(json!(tag));
            }
            ctx.context_data().insert("trail".to_string(), trail);
            ctx.proceed()
        })
    }

    #[test]
    fn test_chain_runs_outermost_first() {
        let links = vec![push("outer"), push("inner")];
        let next = Next::build(&links, |ctx: &mut InvocationContext<'_>| {
            Ok(ctx.context_data().get("trail").cloned().unwrap_or(Value::Null))
        });
        let mut ctx = InvocationContext::new("acme.Service", CallbackKind::AroundInvoke, next);
        assert_eq!(ctx.proceed().unwrap(), json!(["outer", "inner"]));
    }

    #[test]
    fn test_interceptor_can_rewrite_parameters() {
        let upper: Arc<dyn InterceptorMethod> = Arc::new(|ctx: &mut InvocationContext<'_>| {
            let rewritten = ctx
                .parameters()
                .iter()
                .map(|v| json!(v.as_str().unwrap_or_default().to_uppercase()))
                .collect();
            ctx.set_parameters(rewritten);
            ctx.proceed()
        });
        let links = vec![upper];
        let next = Next::build(&links, |ctx: &mut InvocationContext<'_>| Ok(ctx.parameters()[0].clone()));
        let mut ctx = InvocationContext::new("acme.Service", CallbackKind::AroundInvoke, next)
            .with_method("greet(arbor.lang.String)")
            .with_parameters(vec![json!("ada")]);
        assert_eq!(ctx.proceed().unwrap(), json!("ADA"));
    }

    #[test]
    fn test_short_circuit_skips_the_body() {
        let cached: Arc<dyn InterceptorMethod> = Arc::new(|_: &mut InvocationContext<'_>| Ok(json!("cached")));
        let links = vec![cached];
        let next = Next::build(&links, |_: &mut InvocationContext<'_>| -> Result<Value, ApplicationError> {
            panic!("body must not run")
        });
        let mut ctx = InvocationContext::new("acme.Service", CallbackKind::AroundInvoke, next);
        assert_eq!(ctx.proceed().unwrap(), json!("cached"));
    }

    #[test]
    fn test_double_proceed_is_rejected() {
        let twice: Arc<dyn InterceptorMethod> = Arc::new(|ctx: &mut InvocationContext<'_>| {
            ctx.proceed()?;
            ctx.proceed()
        });
        let links = vec![twice];
        let next = Next::build(&links, |_: &mut InvocationContext<'_>| Ok(json!(1)));
        let mut ctx = InvocationContext::new("acme.Service", CallbackKind::AroundInvoke, next);
        let err = ctx.proceed().unwrap_err();
        assert_eq!(err.type_name().as_str(), ILLEGAL_STATE);
    }

    #[test]
    fn test_interceptor_error_unwinds() {
        let failing: Arc<dyn InterceptorMethod> =
            Arc::new(|_: &mut InvocationContext<'_>| -> Result<Value, ApplicationError> {
                Err(ApplicationError::unchecked("acme.Denied", anyhow::anyhow!("no")))
            });
        let links = vec![push("outer"), failing];
        let next = Next::build(&links, |_: &mut InvocationContext<'_>| Ok(json!(1)));
        let mut ctx = InvocationContext::new("acme.Service", CallbackKind::AroundInvoke, next);
        assert_eq!(ctx.proceed().unwrap_err().type_name().as_str(), "acme.Denied");
    }

    #[test]
    fn test_exception_policy() {
        let declared = [ClassName::new("acme.IoException")];

        let unchecked = ApplicationError::unchecked("acme.Bug", anyhow::anyhow!("oops"));
        let unchecked = apply_exception_policy(unchecked, &declared);
        assert_eq!(unchecked.type_name().as_str(), "acme.Bug");
        assert!(unchecked.cause().is_none());

        let subtype = ApplicationError::checked("acme.FileNotFound", anyhow::anyhow!("missing"))
            .with_supertype("acme.IoException");
        assert_eq!(
            apply_exception_policy(subtype, &declared).type_name().as_str(),
            "acme.FileNotFound"
        );

        let undeclared = ApplicationError::checked("acme.SqlException", anyhow::anyhow!("deadlock"));
        let wrapped = apply_exception_policy(undeclared, &[]);
        assert_eq!(wrapped.type_name().as_str(), UNDECLARED_EXCEPTION);
        assert_eq!(wrapped.kind(), ExceptionKind::Unchecked);
        assert_eq!(wrapped.cause().map(|c| c.type_name().as_str()), Some("acme.SqlException"));
        assert!(wrapped.to_string().contains("deadlock"));
    }
}
