//! Bean nodes.
//!
//! A [`BeanInfo`] is one injectable component of the graph: a class bean, a
//! producer method or field, or a synthetic bean contributed by an extension.
//! Bean nodes are created by the [`BeanGraphBuilder`](crate::builder::BeanGraphBuilder)
//! and never change after validation.

use crate::injection::InjectionPoint;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names::{self, ClassName};
use arbor_core::registry::Registry;
use arbor_core::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a bean.
///
/// - class beans: the class name
/// - producer methods: `Declaring#method(Param, ...)`
/// - producer fields: `Declaring#field`
/// - synthetic beans: the identifier chosen by the extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BeanId(String);

impl BeanId {
    /// Creates an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BeanId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for BeanId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&ClassName> for BeanId {
    fn from(name: &ClassName) -> Self {
        Self::new(name.as_str())
    }
}

impl std::borrow::Borrow<str> for BeanId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// How a bean is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeanKind {
    /// A managed class.
    Class,
    /// A producer method of a class bean.
    ProducerMethod,
    /// A producer field of a class bean.
    ProducerField,
    /// A bean contributed by a build extension.
    Synthetic,
}

impl BeanKind {
    /// Upper-case label used in diagnostics.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Class => "CLASS",
            Self::ProducerMethod => "PRODUCER_METHOD",
            Self::ProducerField => "PRODUCER_FIELD",
            Self::Synthetic => "SYNTHETIC",
        }
    }
}

/// Structural facts about the implementation type that decide proxyability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTraits {
    /// The type is `final` (records included).
    pub is_final: bool,
    /// The type is a record.
    pub is_record: bool,
    /// The type is a primitive.
    pub is_primitive: bool,
    /// The type is an array.
    pub is_array: bool,
    /// The type has a non-private no-arg constructor.
    pub has_no_arg_constructor: bool,
}

impl TypeTraits {
    /// Returns the reason a client proxy cannot be created for the type, if any.
    #[must_use]
    pub fn unproxyable_reason(&self) -> Option<&'static str> {
        if self.is_primitive {
            Some("primitive types cannot be proxied")
        } else if self.is_array {
            Some("array types cannot be proxied")
        } else if self.is_record {
            Some("records are implicitly final and cannot be proxied")
        } else if self.is_final {
            Some("final classes cannot be proxied")
        } else {
            None
        }
    }
}

/// A business method of a class bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessMethod {
    /// Method name.
    pub name: String,
    /// `name(Type, ...)` signature.
    pub signature: String,
    /// Method-level interceptor bindings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<AnnotationInstance>,
    /// Declared checked exceptions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<ClassName>,
    /// `final` modifier.
    #[serde(default)]
    pub is_final: bool,
    /// Class that declares the method.
    pub declared_by: ClassName,
}

/// The disposer method of a producer bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposerInfo {
    /// Method name.
    pub method: String,
    /// `name(Type, ...)` signature.
    pub signature: String,
    /// Position of the disposed parameter.
    pub disposed_position: usize,
    /// Injection points of the remaining parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injection_points: Vec<InjectionPoint>,
}

/// A bean node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeanInfo {
    /// Stable identifier.
    pub id: BeanId,
    /// How the bean is defined.
    pub kind: BeanKind,
    /// The bean class (the declaring class for producers).
    pub bean_class: ClassName,
    /// Declaring bean of a producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaring_bean: Option<BeanId>,
    /// Producer member (method signature or field name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// `static` producer member; no declaring instance is needed.
    #[serde(default)]
    pub is_static: bool,
    /// Bean types, most specific first, `Object` last.
    pub types: Vec<TypeRef>,
    /// Qualifiers, always including `Any`.
    pub qualifiers: Vec<AnnotationInstance>,
    /// Scope annotation.
    pub scope: ClassName,
    /// Bean name, if named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The bean is an alternative.
    #[serde(default)]
    pub alternative: bool,
    /// Effective priority (alternatives; producers inherit the declaring bean's).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// The bean is a fallback discarded when any other bean matches.
    #[serde(default)]
    pub default_bean: bool,
    /// The bean is never removed as unused.
    #[serde(default)]
    pub unremovable: bool,
    /// Stereotypes, transitively expanded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stereotypes: Vec<ClassName>,
    /// Class-level interceptor bindings, own and stereotype-inherited.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interceptor_bindings: Vec<AnnotationInstance>,
    /// Business methods of class beans.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<BusinessMethod>,
    /// Injection points, constructor parameters first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injection_points: Vec<InjectionPoint>,
    /// `PostConstruct` callbacks, superclass first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_construct: Vec<String>,
    /// `PreDestroy` callbacks, superclass first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_destroy: Vec<String>,
    /// Disposer of a producer bean.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposer: Option<DisposerInfo>,
    /// Proxyability facts of the implementation type.
    pub traits: TypeTraits,
    /// Discovery order, used as the final tie-break everywhere.
    pub declaration: usize,
}

impl BeanInfo {
    /// Creates a bean with the given identity and defaults for everything else.
    pub fn new(id: impl Into<BeanId>, kind: BeanKind, bean_class: impl Into<ClassName>) -> Self {
        Self {
            id: id.into(),
            kind,
            bean_class: bean_class.into(),
            declaring_bean: None,
            member: None,
            is_static: false,
            types: Vec::new(),
            qualifiers: Vec::new(),
            scope: ClassName::new(names::DEPENDENT),
            name: None,
            alternative: false,
            priority: None,
            default_bean: false,
            unremovable: false,
            stereotypes: Vec::new(),
            interceptor_bindings: Vec::new(),
            methods: Vec::new(),
            injection_points: Vec::new(),
            post_construct: Vec::new(),
            pre_destroy: Vec::new(),
            disposer: None,
            traits: TypeTraits::default(),
            declaration: 0,
        }
    }

    /// Returns `true` for class beans.
    #[must_use]
    pub fn is_class_bean(&self) -> bool {
        self.kind == BeanKind::Class
    }

    /// Returns `true` for producer methods and fields.
    #[must_use]
    pub fn is_producer(&self) -> bool {
        matches!(self.kind, BeanKind::ProducerMethod | BeanKind::ProducerField)
    }

    /// Returns `true` for synthetic beans.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.kind == BeanKind::Synthetic
    }

    /// Returns `true` if the bean is an alternative selected by a priority.
    #[must_use]
    pub fn is_enabled_alternative(&self) -> bool {
        self.alternative && self.priority.is_some()
    }

    /// Returns `false` for alternatives that no priority selects; they never match.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.alternative || self.priority.is_some()
    }

    /// Returns `true` if the bean lives in a normal scope.
    #[must_use]
    pub fn is_normal_scoped(&self, registry: &Registry) -> bool {
        registry.is_normal_scope(self.scope.as_str())
    }

    /// Returns `true` if the bean lives in the `Dependent` pseudo-scope.
    #[must_use]
    pub fn is_dependent(&self) -> bool {
        self.scope.is(names::DEPENDENT)
    }

    /// Returns the primary bean type.
    #[must_use]
    pub fn implementation_type(&self) -> Option<&TypeRef> {
        self.types.first()
    }

    /// Returns the business method with the given signature.
    #[must_use]
    pub fn method(&self, signature: &str) -> Option<&BusinessMethod> {
        self.methods.iter().find(|m| m.signature == signature)
    }

    /// Returns `true` if any class-level or method-level interceptor binding is declared.
    #[must_use]
    pub fn has_interceptor_bindings(&self) -> bool {
        !self.interceptor_bindings.is_empty() || self.methods.iter().any(|m| !m.bindings.is_empty())
    }
}

impl fmt::Display for BeanInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bean [id={}, types=[", self.kind.label(), self.id)?;
        for (idx, ty) in self.types.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{ty}")?;
        }
        f.write_str("], qualifiers=[")?;
        for (idx, qualifier) in self.qualifiers.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{qualifier}")?;
        }
        f.write_str("]]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bean_id_display_and_borrow() {
        let id = BeanId::new("acme.Factory#produce()");
        assert_eq!(id.to_string(), "acme.Factory#produce()");
        let map: std::collections::HashMap<BeanId, u8> = [(id.clone(), 1)].into_iter().collect();
        assert_eq!(map.get("acme.Factory#produce()"), Some(&1));
    }

    #[test]
    fn test_unselected_alternative_is_disabled() {
        let mut bean = BeanInfo::new("acme.Mock", BeanKind::Class, "acme.Mock");
        assert!(bean.is_enabled());
        bean.alternative = true;
        assert!(!bean.is_enabled());
        assert!(!bean.is_enabled_alternative());
        bean.priority = Some(10);
        assert!(bean.is_enabled_alternative());
    }

    #[test]
    fn test_unproxyable_reason() {
        let record = TypeTraits {
            is_final: true,
            is_record: true,
            ..TypeTraits::default()
        };
        assert!(record.unproxyable_reason().unwrap().contains("records"));
        let plain = TypeTraits {
            has_no_arg_constructor: true,
            ..TypeTraits::default()
        };
        assert!(plain.unproxyable_reason().is_none());
    }

    #[test]
    fn test_display_lists_types_and_qualifiers() {
        let mut bean = BeanInfo::new("acme.Greeter", BeanKind::Class, "acme.Greeter");
        bean.types = vec![TypeRef::class("acme.Greeter"), TypeRef::object()];
        bean.qualifiers = vec![AnnotationInstance::new(names::ANY)];
        let text = bean.to_string();
        assert!(text.starts_with("CLASS bean [id=acme.Greeter"));
        assert!(text.contains("arbor.lang.Object"));
        assert!(text.contains("@arbor.Any"));
    }
}
