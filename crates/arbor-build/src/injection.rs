//! Injection points.
//!
//! An [`InjectionPoint`] is a required type plus qualifiers owned by exactly
//! one bean, interceptor, decorator or observer. The declared type is
//! classified once when the point is created: programmatic lookup wrappers
//! are unwrapped to their element type and built-in metadata types are
//! recognised so that the resolver never matches them against beans.

use crate::resolver::Resolution;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names;
use arbor_core::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an injection point is declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InjectionTarget {
    /// An injected field.
    Field {
        /// Field name.
        name: String,
    },
    /// A parameter of the bean constructor.
    Constructor {
        /// Parameter index.
        parameter: usize,
    },
    /// A parameter of an initializer method.
    Initializer {
        /// Method signature.
        method: String,
        /// Parameter index.
        parameter: usize,
    },
    /// A parameter of a producer method.
    ProducerParameter {
        /// Method signature.
        method: String,
        /// Parameter index.
        parameter: usize,
    },
    /// A parameter of a disposer method.
    DisposerParameter {
        /// Method signature.
        method: String,
        /// Parameter index.
        parameter: usize,
    },
    /// A parameter of an observer method.
    ObserverParameter {
        /// Method signature.
        method: String,
        /// Parameter index.
        parameter: usize,
    },
    /// A dependency declared by a synthetic bean.
    Synthetic,
}

impl fmt::Display for InjectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field { name } => write!(f, "field {name}"),
            Self::Constructor { parameter } => write!(f, "constructor parameter {parameter}"),
            Self::Initializer { method, parameter } => write!(f, "initializer {method} parameter {parameter}"),
            Self::ProducerParameter { method, parameter } => write!(f, "producer {method} parameter {parameter}"),
            Self::DisposerParameter { method, parameter } => write!(f, "disposer {method} parameter {parameter}"),
            Self::ObserverParameter { method, parameter } => write!(f, "observer {method} parameter {parameter}"),
            Self::Synthetic => f.write_str("synthetic dependency"),
        }
    }
}

/// Built-in metadata types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    /// The injection point being injected.
    InjectionPoint,
    /// The bean that owns the injection point.
    Bean,
    /// The bean an interceptor is applied to.
    InterceptedBean,
}

/// How an injection point is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionKind {
    /// Exactly one bean.
    Single,
    /// At most one bean (`Optional<T>`).
    Optional,
    /// Programmatic lookup (`Instance<T>`, `Provider<T>`): every match, resolved lazily.
    Instance,
    /// Built-in metadata, never resolved against beans.
    Metadata(MetadataKind),
    /// The delegate of a decorator.
    Delegate,
}

/// A required type plus qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPoint {
    /// Position within the owner; creators receive dependencies by this index.
    pub position: usize,
    /// Declaration site.
    pub target: InjectionTarget,
    /// The type as declared.
    pub declared_type: TypeRef,
    /// The type matched against bean types (wrappers removed).
    pub required_type: TypeRef,
    /// Required qualifiers; `Default` when none are declared.
    pub qualifiers: Vec<AnnotationInstance>,
    /// How the point is satisfied.
    pub kind: InjectionKind,
    /// Filled in by the resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl InjectionPoint {
    /// Creates an injection point, classifying and unwrapping the declared type.
    pub fn new(
        position: usize,
        target: InjectionTarget,
        declared_type: TypeRef,
        qualifiers: Vec<AnnotationInstance>,
    ) -> Self {
        let (kind, required_type) = classify(&declared_type);
        let qualifiers = if qualifiers.is_empty() {
            vec![AnnotationInstance::new(names::DEFAULT)]
        } else {
            qualifiers
        };
        Self {
            position,
            target,
            declared_type,
            required_type,
            qualifiers,
            kind,
            resolution: None,
        }
    }

    /// Creates the delegate injection point of a decorator.
    pub fn delegate(
        position: usize,
        target: InjectionTarget,
        declared_type: TypeRef,
        qualifiers: Vec<AnnotationInstance>,
    ) -> Self {
        let mut point = Self::new(position, target, declared_type.clone(), qualifiers);
        point.kind = InjectionKind::Delegate;
        point.required_type = declared_type;
        point
    }

    /// Returns `true` if the point is matched against beans.
    #[must_use]
    pub fn requires_resolution(&self) -> bool {
        matches!(
            self.kind,
            InjectionKind::Single | InjectionKind::Optional | InjectionKind::Instance
        )
    }

    /// Returns `true` if an unsatisfied resolution is acceptable.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self.kind, InjectionKind::Optional | InjectionKind::Instance)
    }

    /// Returns the metadata kind of a built-in metadata point.
    #[must_use]
    pub fn metadata_kind(&self) -> Option<MetadataKind> {
        match self.kind {
            InjectionKind::Metadata(kind) => Some(kind),
            _ => None,
        }
    }

    /// Returns `true` for the delegate of a decorator.
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.kind == InjectionKind::Delegate
    }

    /// Describes the point for diagnostics.
    #[must_use]
    pub fn describe(&self, owner: &str) -> String {
        let qualifiers: Vec<String> = self.qualifiers.iter().map(ToString::to_string).collect();
        format!(
            "{owner} {} [type={}, qualifiers=[{}]]",
            self.target,
            self.declared_type,
            qualifiers.join(", ")
        )
    }
}

fn classify(declared: &TypeRef) -> (InjectionKind, TypeRef) {
    let element = || declared.element_type().cloned().unwrap_or_else(TypeRef::object);
    if declared.is_raw(names::INSTANCE) || declared.is_raw(names::PROVIDER) {
        (InjectionKind::Instance, element())
    } else if declared.is_raw(names::OPTIONAL) {
        (InjectionKind::Optional, element())
    } else if declared.is_raw(names::INJECTION_POINT) {
        (InjectionKind::Metadata(MetadataKind::InjectionPoint), declared.clone())
    } else if declared.is_raw(names::BEAN) {
        (InjectionKind::Metadata(MetadataKind::Bean), declared.clone())
    } else if declared.is_raw(names::INTERCEPTED_BEAN) {
        (InjectionKind::Metadata(MetadataKind::InterceptedBean), declared.clone())
    } else {
        (InjectionKind::Single, declared.clone())
    }
}
