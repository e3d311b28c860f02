//! Interceptor and decorator nodes.
//!
//! Interceptors and decorators are beans themselves (they have injection
//! points and a lifecycle) but they are never injectable by type. Their
//! bindings and decorated types are matched against beans once, when the
//! interception chains are composed.

use crate::bean::{BeanId, BeanInfo};
use crate::graph::TypeHierarchy;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::registry::Registry;
use arbor_core::types::TypeRef;
use serde::{Deserialize, Serialize};

/// Interception kinds an interceptor method can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackKind {
    /// Around business method invocations.
    AroundInvoke,
    /// Around constructor invocation.
    AroundConstruct,
    /// After construction and injection.
    PostConstruct,
    /// Before destruction.
    PreDestroy,
}

impl CallbackKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [CallbackKind; 4] = [
        Self::AroundConstruct,
        Self::PostConstruct,
        Self::AroundInvoke,
        Self::PreDestroy,
    ];

    /// Returns the annotation that declares a method of this kind.
    #[must_use]
    pub const fn annotation(&self) -> &'static str {
        match self {
            Self::AroundInvoke => arbor_core::names::AROUND_INVOKE,
            Self::AroundConstruct => arbor_core::names::AROUND_CONSTRUCT,
            Self::PostConstruct => arbor_core::names::POST_CONSTRUCT,
            Self::PreDestroy => arbor_core::names::PRE_DESTROY,
        }
    }
}

/// An interceptor method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorCallback {
    /// Interception kind.
    pub kind: CallbackKind,
    /// Method name.
    pub method: String,
}

/// An interceptor node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterceptorInfo {
    /// The interceptor as a bean (identity, injection points, lifecycle).
    pub bean: BeanInfo,
    /// Interceptor bindings.
    pub bindings: Vec<AnnotationInstance>,
    /// Priority; interceptors without one are never enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Interceptor methods.
    pub callbacks: Vec<InterceptorCallback>,
}

impl InterceptorInfo {
    /// Returns the interceptor identifier.
    #[must_use]
    pub fn id(&self) -> &BeanId {
        &self.bean.id
    }

    /// Returns the outermost interceptor method of the given kind.
    #[must_use]
    pub fn callback(&self, kind: CallbackKind) -> Option<&str> {
        self.callbacks_of(kind).next()
    }

    /// Returns every interceptor method of the given kind, superclass first.
    pub fn callbacks_of(&self, kind: CallbackKind) -> impl Iterator<Item = &str> {
        self.callbacks
            .iter()
            .filter(move |c| c.kind == kind)
            .map(|c| c.method.as_str())
    }

    /// Returns `true` if the interceptor declares a method of the given kind.
    #[must_use]
    pub fn intercepts(&self, kind: CallbackKind) -> bool {
        self.callback(kind).is_some()
    }

    /// Returns `true` if the interceptor is enabled (it has bindings and a priority).
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.priority.is_some() && !self.bindings.is_empty()
    }

    /// Returns `true` if every binding of the interceptor is present in `bindings`.
    #[must_use]
    pub fn applies_to(&self, bindings: &[AnnotationInstance], registry: &Registry) -> bool {
        self.is_enabled()
            && self
                .bindings
                .iter()
                .all(|required| bindings.iter().any(|present| registry.binding_equals(present, required)))
    }
}

/// A decorator node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoratorInfo {
    /// The decorator as a bean.
    pub bean: BeanInfo,
    /// Position of the delegate injection point.
    pub delegate_position: usize,
    /// Delegate type.
    pub delegate_type: TypeRef,
    /// Delegate qualifiers.
    pub delegate_qualifiers: Vec<AnnotationInstance>,
    /// Decorated types: the interfaces the decorator implements.
    pub decorated_types: Vec<TypeRef>,
    /// Signatures of decorated-type methods the decorator implements.
    pub decorated_methods: Vec<String>,
    /// Priority; decorators without one are never enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

impl DecoratorInfo {
    /// Returns the decorator identifier.
    #[must_use]
    pub fn id(&self) -> &BeanId {
        &self.bean.id
    }

    /// Returns `true` if the decorator applies to the bean.
    ///
    /// Only class beans are decorated; the delegate type must match one of
    /// the bean types and the bean must carry every delegate qualifier.
    #[must_use]
    pub fn applies_to(&self, bean: &BeanInfo, registry: &Registry, hierarchy: &TypeHierarchy) -> bool {
        self.priority.is_some()
            && bean.is_class_bean()
            && bean.id != self.bean.id
            && bean
                .types
                .iter()
                .any(|ty| self.delegate_type.matches(ty, |a, b| hierarchy.is_subtype(a, b)))
            && self
                .delegate_qualifiers
                .iter()
                .all(|q| registry.has_qualifier(&bean.qualifiers, q))
    }
}
