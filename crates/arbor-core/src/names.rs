//! Class names and the well-known annotation/type names the container understands.
//!
//! The component index identifies classes, annotations and interfaces by their
//! fully qualified [`ClassName`]. The constants in this module name the
//! annotations that drive bean discovery (scopes, qualifiers, producers,
//! interceptors, ...) and the built-in types that injection points may wrap.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// A fully qualified class, interface or annotation name (e.g. `acme.Greeter`).
///
/// # Example
///
/// ```
/// use arbor_core::names::ClassName;
///
/// let name = ClassName::new("acme.billing.InvoiceService");
/// assert_eq!(name.simple_name(), "InvoiceService");
/// assert_eq!(name.package(), Some("acme.billing"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    /// Creates a class name from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the full name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the given well-known name.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }

    /// Returns the name without its package, nested classes included (`Outer$Inner`).
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Returns the package portion of the name, if any.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.0.rfind('.').map(|idx| &self.0[..idx])
    }

    /// Returns the simple name with its first character lower-cased.
    ///
    /// This is the default bean name for a named class bean.
    #[must_use]
    pub fn decapitalized(&self) -> String {
        decapitalize(self.simple_name())
    }
}

/// Lower-cases the first character unless the first two characters are both upper-case.
#[must_use]
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && second.is_uppercase() => {
            name.to_string()
        }
        (Some(first), _) => {
            let mut out: String = first.to_lowercase().collect();
            out.push_str(&name[first.len_utf8()..]);
            out
        }
        (None, _) => String::new(),
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ClassName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClassName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&ClassName> for ClassName {
    fn from(name: &ClassName) -> Self {
        name.clone()
    }
}

impl PartialEq<str> for ClassName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ClassName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// Injection and producers
/// Marks an injected field, constructor or initializer method.
pub const INJECT: &str = "arbor.Inject";
/// Marks a producer method or field.
pub const PRODUCES: &str = "arbor.Produces";
/// Marks the disposed parameter of a disposer method.
pub const DISPOSES: &str = "arbor.Disposes";
/// Marks the event parameter of a synchronous observer method.
pub const OBSERVES: &str = "arbor.Observes";
/// Marks the event parameter of an asynchronous observer method.
pub const OBSERVES_ASYNC: &str = "arbor.ObservesAsync";
/// Restricts the bean types of a bean.
pub const TYPED: &str = "arbor.Typed";
/// Excludes a class from bean discovery.
pub const VETOED: &str = "arbor.Vetoed";
/// Marks a bean as a fallback discarded when any other bean matches.
pub const DEFAULT_BEAN: &str = "arbor.DefaultBean";
/// Marks a bean as never removable by unused-bean removal.
pub const UNREMOVABLE: &str = "arbor.Unremovable";

// Meta-annotations
/// Meta-annotation declaring a qualifier type.
pub const QUALIFIER: &str = "arbor.Qualifier";
/// Meta-annotation declaring a pseudo-scope.
pub const SCOPE: &str = "arbor.Scope";
/// Meta-annotation declaring a normal scope.
pub const NORMAL_SCOPE: &str = "arbor.NormalScope";
/// Marks an annotation member as ignored for equality.
pub const NONBINDING: &str = "arbor.Nonbinding";
/// Meta-annotation declaring a stereotype.
pub const STEREOTYPE: &str = "arbor.Stereotype";
/// Meta-annotation declaring an interceptor binding type.
pub const INTERCEPTOR_BINDING: &str = "arbor.InterceptorBinding";
/// Meta-annotation marking a scope as inherited by subclasses.
pub const INHERITED: &str = "arbor.Inherited";

// Qualifiers
/// The implicit qualifier of beans without explicit qualifiers.
pub const DEFAULT: &str = "arbor.Default";
/// The qualifier every bean carries.
pub const ANY: &str = "arbor.Any";
/// Names a bean; its `value` member is binding.
pub const NAMED: &str = "arbor.Named";
/// Qualifies the event fired when a context is initialized.
pub const INITIALIZED: &str = "arbor.Initialized";
/// Qualifies the event fired before a context is destroyed.
pub const BEFORE_DESTROYED: &str = "arbor.BeforeDestroyed";
/// Qualifies the event fired after a context is destroyed.
pub const DESTROYED: &str = "arbor.Destroyed";

// Scopes
/// Pseudo-scope: a new instance per injection.
pub const DEPENDENT: &str = "arbor.Dependent";
/// Pseudo-scope: one shared instance, never proxied.
pub const SINGLETON: &str = "arbor.Singleton";
/// Normal scope spanning the whole application.
pub const APPLICATION_SCOPED: &str = "arbor.ApplicationScoped";
/// Normal scope bound to a request.
pub const REQUEST_SCOPED: &str = "arbor.RequestScoped";
/// Normal scope bound to a session.
pub const SESSION_SCOPED: &str = "arbor.SessionScoped";

// Alternatives and ordering
/// Marks a bean as an alternative.
pub const ALTERNATIVE: &str = "arbor.Alternative";
/// Priority of an alternative, interceptor, decorator or observer.
pub const PRIORITY: &str = "arbor.Priority";

// Interceptors and decorators
/// Marks an interceptor class.
pub const INTERCEPTOR: &str = "arbor.Interceptor";
/// Marks a decorator class.
pub const DECORATOR: &str = "arbor.Decorator";
/// Marks the delegate injection point of a decorator.
pub const DELEGATE: &str = "arbor.Delegate";
/// Lifecycle callback invoked after construction and injection.
pub const POST_CONSTRUCT: &str = "arbor.PostConstruct";
/// Lifecycle callback invoked before destruction.
pub const PRE_DESTROY: &str = "arbor.PreDestroy";
/// Interceptor method around business method invocations.
pub const AROUND_INVOKE: &str = "arbor.AroundInvoke";
/// Interceptor method around constructor invocation.
pub const AROUND_CONSTRUCT: &str = "arbor.AroundConstruct";

// Built-in types
/// The root of every class hierarchy.
pub const OBJECT: &str = "arbor.lang.Object";
/// Programmatic lookup handle; injection points of this type are optional.
pub const INSTANCE: &str = "arbor.Instance";
/// Lazy provider; injection points of this type are optional.
pub const PROVIDER: &str = "arbor.Provider";
/// Optional value; injection points of this type are optional.
pub const OPTIONAL: &str = "arbor.Optional";
/// Metadata describing the injection point being injected.
pub const INJECTION_POINT: &str = "arbor.InjectionPoint";
/// Metadata describing a bean.
pub const BEAN: &str = "arbor.Bean";
/// Metadata describing the bean an interceptor is applied to.
pub const INTERCEPTED_BEAN: &str = "arbor.InterceptedBean";
