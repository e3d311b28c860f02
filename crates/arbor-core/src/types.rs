//! Type signatures and the assignability rules used during resolution.
//!
//! A [`TypeRef`] is the structural description of a bean type or a required
//! type at an injection point. Matching follows the typesafe-resolution rules:
//! raw types must be identical and parameterized types must agree argument by
//! argument, where a wildcard on the required side or a type variable on the
//! bean side relaxes the comparison.

use crate::names::{self, ClassName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive type kinds, boxed to their wrapper class during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// `boolean`
    Boolean,
    /// `byte`
    Byte,
    /// `short`
    Short,
    /// `int`
    Int,
    /// `long`
    Long,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `char`
    Char,
    /// `void` (only valid as a return type)
    Void,
}

impl PrimitiveKind {
    /// Returns the wrapper class name for this primitive.
    #[must_use]
    pub const fn boxed_name(self) -> &'static str {
        match self {
            Self::Boolean => "arbor.lang.Boolean",
            Self::Byte => "arbor.lang.Byte",
            Self::Short => "arbor.lang.Short",
            Self::Int => "arbor.lang.Integer",
            Self::Long => "arbor.lang.Long",
            Self::Float => "arbor.lang.Float",
            Self::Double => "arbor.lang.Double",
            Self::Char => "arbor.lang.Character",
            Self::Void => "arbor.lang.Void",
        }
    }

    /// Returns the source keyword for this primitive.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::Void => "void",
        }
    }
}

/// A type signature.
///
/// # Example
///
/// ```
/// use arbor_core::types::TypeRef;
///
/// let required = TypeRef::parameterized("acme.Repository", vec![TypeRef::wildcard()]);
/// let bean_type = TypeRef::parameterized("acme.Repository", vec![TypeRef::class("acme.User")]);
///
/// assert!(required.matches(&bean_type, |_, _| false));
/// assert_eq!(required.to_string(), "acme.Repository<?>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// A raw class or interface type.
    Class {
        /// The class name.
        name: ClassName,
    },
    /// A parameterized type such as `List<String>`.
    Parameterized {
        /// The raw type.
        raw: ClassName,
        /// The type arguments.
        arguments: Vec<TypeRef>,
    },
    /// A wildcard type argument, `?` or `? extends Bound`.
    Wildcard {
        /// The upper bound, `None` for an unbounded wildcard.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        upper_bound: Option<Box<TypeRef>>,
    },
    /// A type variable such as `T`.
    Variable {
        /// The variable name.
        name: String,
    },
    /// An array type.
    Array {
        /// The component type.
        component: Box<TypeRef>,
    },
    /// A primitive type.
    Primitive {
        /// The primitive kind.
        primitive: PrimitiveKind,
    },
}

impl TypeRef {
    /// Creates a raw class type.
    pub fn class(name: impl Into<ClassName>) -> Self {
        Self::Class { name: name.into() }
    }

    /// Creates a parameterized type.
    pub fn parameterized(raw: impl Into<ClassName>, arguments: Vec<TypeRef>) -> Self {
        Self::Parameterized {
            raw: raw.into(),
            arguments,
        }
    }

    /// Creates an unbounded wildcard `?`.
    #[must_use]
    pub const fn wildcard() -> Self {
        Self::Wildcard { upper_bound: None }
    }

    /// Creates a bounded wildcard `? extends bound`.
    #[must_use]
    pub fn wildcard_extends(bound: TypeRef) -> Self {
        Self::Wildcard {
            upper_bound: Some(Box::new(bound)),
        }
    }

    /// Creates a type variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    /// Creates an array type.
    #[must_use]
    pub fn array(component: TypeRef) -> Self {
        Self::Array {
            component: Box::new(component),
        }
    }

    /// Creates a primitive type.
    #[must_use]
    pub const fn primitive(primitive: PrimitiveKind) -> Self {
        Self::Primitive { primitive }
    }

    /// The `Object` type.
    #[must_use]
    pub fn object() -> Self {
        Self::class(names::OBJECT)
    }

    /// Returns the raw class name of a class or parameterized type.
    #[must_use]
    pub fn raw_name(&self) -> Option<&ClassName> {
        match self {
            Self::Class { name } => Some(name),
            Self::Parameterized { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// Returns the type arguments, empty unless parameterized.
    #[must_use]
    pub fn arguments(&self) -> &[TypeRef] {
        match self {
            Self::Parameterized { arguments, .. } => arguments,
            _ => &[],
        }
    }

    /// Returns `true` if the raw type is the given well-known name.
    #[must_use]
    pub fn is_raw(&self, name: &str) -> bool {
        self.raw_name().is_some_and(|raw| raw.is(name))
    }

    /// Returns `true` for `Object`.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Class { name } if name.is(names::OBJECT))
    }

    /// Returns `true` for primitive types.
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        matches!(self, Self::Primitive { .. })
    }

    /// Returns `true` for array types.
    #[must_use]
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array { .. })
    }

    /// Returns `true` if this type or any nested argument is a type variable.
    #[must_use]
    pub fn contains_variable(&self) -> bool {
        match self {
            Self::Variable { .. } => true,
            Self::Parameterized { arguments, .. } => arguments.iter().any(Self::contains_variable),
            Self::Array { component } => component.contains_variable(),
            Self::Wildcard {
                upper_bound: Some(bound),
            } => bound.contains_variable(),
            _ => false,
        }
    }

    /// Returns the wrapper class type for primitives, the type itself otherwise.
    #[must_use]
    pub fn boxed(&self) -> TypeRef {
        match self {
            Self::Primitive { primitive } => Self::class(primitive.boxed_name()),
            other => other.clone(),
        }
    }

    /// Returns the first type argument of a wrapper type such as `Instance<T>`.
    #[must_use]
    pub fn element_type(&self) -> Option<&TypeRef> {
        self.arguments().first()
    }

    /// Replaces type variables using the given bindings.
    #[must_use]
    pub fn substitute(&self, bindings: &[(String, TypeRef)]) -> TypeRef {
        match self {
            Self::Variable { name } => bindings
                .iter()
                .find(|(var, _)| var == name)
                .map_or_else(|| self.clone(), |(_, ty)| ty.clone()),
            Self::Parameterized { raw, arguments } => Self::Parameterized {
                raw: raw.clone(),
                arguments: arguments.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Array { component } => Self::array(component.substitute(bindings)),
            Self::Wildcard {
                upper_bound: Some(bound),
            } => Self::wildcard_extends(bound.substitute(bindings)),
            other => other.clone(),
        }
    }

    /// Returns `true` if a bean of type `bean_type` satisfies this required type.
    ///
    /// `is_subtype(sub, sup)` answers class hierarchy questions for bounded
    /// wildcards; pass `|_, _| false` when no hierarchy is available.
    pub fn matches<F>(&self, bean_type: &TypeRef, is_subtype: F) -> bool
    where
        F: Fn(&ClassName, &ClassName) -> bool,
    {
        matches_required(&self.boxed(), &bean_type.boxed(), &is_subtype)
    }
}

fn matches_required<F>(required: &TypeRef, bean: &TypeRef, is_subtype: &F) -> bool
where
    F: Fn(&ClassName, &ClassName) -> bool,
{
    match (required, bean) {
        (TypeRef::Class { name: req }, TypeRef::Class { name: actual }) => req == actual,
        // A raw required type matches a parameterized bean type whose arguments
        // are all Object or unbounded type variables.
        (TypeRef::Class { name: req }, TypeRef::Parameterized { raw, arguments }) => {
            req == raw
                && arguments.iter().all(|arg| {
                    arg.is_object()
                        || matches!(arg, TypeRef::Variable { .. } | TypeRef::Wildcard { upper_bound: None })
                })
        }
        (
            TypeRef::Parameterized {
                raw: req_raw,
                arguments: req_args,
            },
            TypeRef::Parameterized {
                raw: bean_raw,
                arguments: bean_args,
            },
        ) => {
            req_raw == bean_raw
                && req_args.len() == bean_args.len()
                && req_args
                    .iter()
                    .zip(bean_args)
                    .all(|(req, actual)| argument_matches(req, actual, is_subtype))
        }
        (TypeRef::Array { component: req }, TypeRef::Array { component: actual }) => {
            matches_required(&req.boxed(), &actual.boxed(), is_subtype)
        }
        _ => required == bean,
    }
}

fn argument_matches<F>(required: &TypeRef, actual: &TypeRef, is_subtype: &F) -> bool
where
    F: Fn(&ClassName, &ClassName) -> bool,
{
    let required = required.boxed();
    let actual = actual.boxed();
    if required == actual {
        return true;
    }
    match (&required, &actual) {
        (TypeRef::Wildcard { upper_bound: None }, _) | (_, TypeRef::Variable { .. }) => true,
        (TypeRef::Wildcard { upper_bound: Some(bound) }, _) => {
            if bound.is_object() {
                return true;
            }
            match (bound.raw_name(), actual.raw_name()) {
                (Some(bound_raw), Some(actual_raw)) => {
                    bound_raw == actual_raw || is_subtype(actual_raw, bound_raw)
                }
                _ => false,
            }
        }
        (TypeRef::Parameterized { .. }, TypeRef::Parameterized { .. }) => {
            matches_required(&required, &actual, is_subtype)
        }
        _ => false,
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { name } => write!(f, "{name}"),
            Self::Parameterized { raw, arguments } => {
                write!(f, "{raw}<")?;
                for (idx, arg) in arguments.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Self::Wildcard { upper_bound: None } => f.write_str("?"),
            Self::Wildcard {
                upper_bound: Some(bound),
            } => write!(f, "? extends {bound}"),
            Self::Variable { name } => f.write_str(name),
            Self::Array { component } => write!(f, "{component}[]"),
            Self::Primitive { primitive } => f.write_str(primitive.keyword()),
        }
    }
}

impl From<ClassName> for TypeRef {
    fn from(name: ClassName) -> Self {
        Self::Class { name }
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self::class(name)
    }
}
