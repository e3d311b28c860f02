//! Annotation instances as recorded in the component index.
//!
//! An [`AnnotationInstance`] is an annotation type name plus its explicitly
//! provided member values. Default member values live on the annotation
//! type's declaration (see [`crate::index::MethodInfo::default_value`]) and
//! are filled in by the registry when instances are compared.

use crate::names::ClassName;
use crate::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The value of an annotation member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    /// A boolean constant.
    Bool(bool),
    /// An integral constant.
    Int(i64),
    /// A string constant.
    String(String),
    /// An enum constant, by its constant name.
    Enum(String),
    /// A class literal.
    Class(TypeRef),
    /// An array of values.
    Array(Vec<AnnotationValue>),
    /// A nested annotation.
    Nested(Box<AnnotationInstance>),
}

impl AnnotationValue {
    /// Returns the string content of a `String` or `Enum` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::Enum(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the integral content of an `Int` value.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the boolean content of a `Bool` value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the class literal of a `Class` value.
    #[must_use]
    pub const fn as_class(&self) -> Option<&TypeRef> {
        match self {
            Self::Class(ty) => Some(ty),
            _ => None,
        }
    }

    /// Returns the elements of an `Array` value, or the value itself as a one-element slice.
    #[must_use]
    pub fn as_slice(&self) -> &[AnnotationValue] {
        match self {
            Self::Array(values) => values,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::String(value) => write!(f, "\"{value}\""),
            Self::Enum(value) => f.write_str(value),
            Self::Class(ty) => write!(f, "{ty}.class"),
            Self::Array(values) => {
                f.write_str("{")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("}")
            }
            Self::Nested(instance) => write!(f, "{instance}"),
        }
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AnnotationValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<TypeRef> for AnnotationValue {
    fn from(value: TypeRef) -> Self {
        Self::Class(value)
    }
}

/// An annotation applied to a class, method, field or parameter.
///
/// # Example
///
/// ```
/// use arbor_core::annotation::AnnotationInstance;
/// use arbor_core::names;
///
/// let named = AnnotationInstance::new(names::NAMED).with("value", "primary");
/// assert_eq!(named.string("value"), Some("primary"));
/// assert_eq!(named.to_string(), "@arbor.Named(value = \"primary\")");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationInstance {
    /// The annotation type.
    pub name: ClassName,
    /// Explicitly provided member values, ordered by member name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, AnnotationValue>,
}

impl AnnotationInstance {
    /// Creates an annotation instance without member values.
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Adds a member value.
    pub fn with(mut self, member: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        self.values.insert(member.into(), value.into());
        self
    }

    /// Returns `true` if this is an instance of the given annotation type.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.is(name)
    }

    /// Returns a member value.
    #[must_use]
    pub fn value(&self, member: &str) -> Option<&AnnotationValue> {
        self.values.get(member)
    }

    /// Returns a string member value.
    #[must_use]
    pub fn string(&self, member: &str) -> Option<&str> {
        self.value(member).and_then(AnnotationValue::as_str)
    }

    /// Returns an integral member value.
    #[must_use]
    pub fn int(&self, member: &str) -> Option<i64> {
        self.value(member).and_then(AnnotationValue::as_int)
    }

    /// Returns the class literals of a member holding one class or an array of classes.
    #[must_use]
    pub fn classes(&self, member: &str) -> Vec<&TypeRef> {
        self.value(member)
            .map(|value| value.as_slice().iter().filter_map(AnnotationValue::as_class).collect())
            .unwrap_or_default()
    }
}

impl fmt::Display for AnnotationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if self.values.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (idx, (member, value)) in self.values.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{member} = {value}")?;
        }
        f.write_str(")")
    }
}

/// Finds the first annotation of the given type in a list.
#[must_use]
pub fn find<'a>(annotations: &'a [AnnotationInstance], name: &str) -> Option<&'a AnnotationInstance> {
    annotations.iter().find(|annotation| annotation.is(name))
}

/// Returns `true` if the list contains an annotation of the given type.
#[must_use]
pub fn has(annotations: &[AnnotationInstance], name: &str) -> bool {
    find(annotations, name).is_some()
}
