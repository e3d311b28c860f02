//! The component index: a read-only structural view over discovered classes.
//!
//! The container never parses source or bytecode itself. Tooling hands it an
//! index of classes with their annotations, supertypes and members, either
//! built programmatically with [`IndexBuilder`] or deserialised from JSON into
//! a [`MemoryIndex`].

use crate::annotation::{self, AnnotationInstance, AnnotationValue};
use crate::names::{self, ClassName};
use crate::types::TypeRef;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name used for constructors in [`MethodInfo::name`].
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// What kind of type a class entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// A regular class.
    #[default]
    Class,
    /// An interface.
    Interface,
    /// An annotation type.
    Annotation,
    /// A record (implicitly final).
    Record,
    /// An enum.
    Enum,
}

/// A method or constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Parameter name, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Parameter annotations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationInstance>,
}

impl ParameterInfo {
    /// Creates an unannotated parameter.
    pub fn new(ty: impl Into<TypeRef>) -> Self {
        Self {
            name: None,
            ty: ty.into(),
            annotations: Vec::new(),
        }
    }

    /// Sets the parameter name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds an annotation.
    pub fn annotated(mut self, annotation: impl Into<AnnotationInstance>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Returns `true` if the parameter carries the annotation.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        annotation::has(&self.annotations, name)
    }
}

/// A method or constructor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    /// Method name; [`CONSTRUCTOR_NAME`] for constructors.
    pub name: String,
    /// Parameters in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterInfo>,
    /// Return type; `None` for constructors and `void` methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<TypeRef>,
    /// Method annotations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationInstance>,
    /// Declared (checked) exception types.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceptions: Vec<ClassName>,
    /// `static` modifier.
    #[serde(default)]
    pub is_static: bool,
    /// `private` modifier.
    #[serde(default)]
    pub is_private: bool,
    /// `final` modifier.
    #[serde(default)]
    pub is_final: bool,
    /// `abstract` modifier.
    #[serde(default)]
    pub is_abstract: bool,
    /// Default value of an annotation member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<AnnotationValue>,
}

impl MethodInfo {
    /// Creates a `void` method without parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: None,
            annotations: Vec::new(),
            exceptions: Vec::new(),
            is_static: false,
            is_private: false,
            is_final: false,
            is_abstract: false,
            default_value: None,
        }
    }

    /// Creates a constructor.
    #[must_use]
    pub fn constructor() -> Self {
        Self::new(CONSTRUCTOR_NAME)
    }

    /// Creates an annotation member with a default value.
    pub fn member(name: impl Into<String>, ty: impl Into<TypeRef>, default: Option<AnnotationValue>) -> Self {
        let mut method = Self::new(name).returns(ty);
        method.is_abstract = true;
        method.default_value = default;
        method
    }

    /// Sets the return type.
    pub fn returns(mut self, ty: impl Into<TypeRef>) -> Self {
        self.return_type = Some(ty.into());
        self
    }

    /// Appends a parameter.
    pub fn param(mut self, parameter: ParameterInfo) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds an annotation.
    pub fn annotated(mut self, annotation: impl Into<AnnotationInstance>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Declares a checked exception.
    pub fn throws(mut self, exception: impl Into<ClassName>) -> Self {
        self.exceptions.push(exception.into());
        self
    }

    /// Marks the method `static`.
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Marks the method `private`.
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    /// Marks the method `final`.
    pub fn final_method(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Returns `true` for constructors.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME
    }

    /// Returns `true` if the method carries the annotation.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        annotation::has(&self.annotations, name)
    }

    /// Returns the annotation of the given type.
    #[must_use]
    pub fn annotation(&self, name: &str) -> Option<&AnnotationInstance> {
        annotation::find(&self.annotations, name)
    }

    /// Returns `true` if any parameter carries the annotation.
    #[must_use]
    pub fn has_parameter_annotated(&self, name: &str) -> bool {
        self.parameters.iter().any(|param| param.has(name))
    }

    /// Returns the `name(Type, ...)` signature used in diagnostics and chain keys.
    #[must_use]
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// A field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Field annotations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationInstance>,
    /// `static` modifier.
    #[serde(default)]
    pub is_static: bool,
    /// `final` modifier.
    #[serde(default)]
    pub is_final: bool,
}

impl FieldInfo {
    /// Creates an unannotated instance field.
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            annotations: Vec::new(),
            is_static: false,
            is_final: false,
        }
    }

    /// Adds an annotation.
    pub fn annotated(mut self, annotation: impl Into<AnnotationInstance>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Returns `true` if the field carries the annotation.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        annotation::has(&self.annotations, name)
    }
}

/// A class, interface, annotation type, record or enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Fully qualified name.
    pub name: ClassName,
    /// Kind of type.
    #[serde(default)]
    pub kind: ClassKind,
    /// `final` modifier; always `true` for records.
    #[serde(default)]
    pub is_final: bool,
    /// `abstract` modifier.
    #[serde(default)]
    pub is_abstract: bool,
    /// Direct superclass, possibly parameterized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub super_type: Option<TypeRef>,
    /// Directly implemented interfaces, possibly parameterized.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<TypeRef>,
    /// Declared type parameter names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<String>,
    /// Class-level annotations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<AnnotationInstance>,
    /// Constructors and methods in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodInfo>,
    /// Fields in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldInfo>,
}

impl ClassInfo {
    fn of_kind(name: impl Into<ClassName>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_final: matches!(kind, ClassKind::Record),
            is_abstract: matches!(kind, ClassKind::Interface | ClassKind::Annotation),
            super_type: None,
            interfaces: Vec::new(),
            type_parameters: Vec::new(),
            annotations: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Creates a class.
    pub fn class(name: impl Into<ClassName>) -> Self {
        Self::of_kind(name, ClassKind::Class)
    }

    /// Creates an interface.
    pub fn interface(name: impl Into<ClassName>) -> Self {
        Self::of_kind(name, ClassKind::Interface)
    }

    /// Creates an annotation type.
    pub fn annotation_type(name: impl Into<ClassName>) -> Self {
        Self::of_kind(name, ClassKind::Annotation)
    }

    /// Creates a record.
    pub fn record(name: impl Into<ClassName>) -> Self {
        Self::of_kind(name, ClassKind::Record)
    }

    /// Sets the superclass.
    pub fn extends(mut self, super_type: impl Into<TypeRef>) -> Self {
        self.super_type = Some(super_type.into());
        self
    }

    /// Adds an implemented interface.
    pub fn implements(mut self, interface: impl Into<TypeRef>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Declares a type parameter.
    pub fn type_parameter(mut self, name: impl Into<String>) -> Self {
        self.type_parameters.push(name.into());
        self
    }

    /// Adds a class-level annotation.
    pub fn annotated(mut self, annotation: impl Into<AnnotationInstance>) -> Self {
        self.annotations.push(annotation.into());
        self
    }

    /// Adds a method or constructor.
    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a field.
    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds a public no-arg constructor.
    pub fn no_arg_constructor(self) -> Self {
        self.with_method(MethodInfo::constructor())
    }

    /// Marks the class `final`.
    pub fn final_class(mut self) -> Self {
        self.is_final = true;
        self
    }

    /// Marks the class `abstract`.
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Returns `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// Returns `true` for annotation types.
    #[must_use]
    pub fn is_annotation(&self) -> bool {
        self.kind == ClassKind::Annotation
    }

    /// Returns `true` if the class carries the annotation.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        annotation::has(&self.annotations, name)
    }

    /// Returns the class-level annotation of the given type.
    #[must_use]
    pub fn annotation(&self, name: &str) -> Option<&AnnotationInstance> {
        annotation::find(&self.annotations, name)
    }

    /// Returns the constructors.
    pub fn constructors(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    /// Returns the non-constructor methods.
    pub fn business_methods(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(|m| !m.is_constructor())
    }

    /// Returns the method with the given name.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns `true` if the class can be instantiated through a non-private no-arg constructor.
    ///
    /// A class that declares no constructor at all has an implicit one.
    #[must_use]
    pub fn has_no_arg_constructor(&self) -> bool {
        let mut constructors = self.constructors().peekable();
        if constructors.peek().is_none() {
            return true;
        }
        constructors.any(|c| c.parameters.is_empty() && !c.is_private)
    }

    /// Returns this class as a type, parameterized by its own type variables.
    #[must_use]
    pub fn as_type(&self) -> TypeRef {
        if self.type_parameters.is_empty() {
            TypeRef::Class {
                name: self.name.clone(),
            }
        } else {
            TypeRef::Parameterized {
                raw: self.name.clone(),
                arguments: self.type_parameters.iter().map(TypeRef::variable).collect(),
            }
        }
    }
}

/// Read-only queries over the component index.
pub trait IndexView {
    /// Looks up a class by name.
    fn class(&self, name: &ClassName) -> Option<&ClassInfo>;

    /// Returns every class in a stable order.
    fn classes(&self) -> Box<dyn Iterator<Item = &ClassInfo> + '_>;

    /// Returns the classes that carry the given class-level annotation.
    fn annotated(&self, annotation: &str) -> Vec<&ClassInfo> {
        self.classes().filter(|class| class.has(annotation)).collect()
    }

    /// Returns `true` if `sub` equals `sup` or extends/implements it transitively.
    fn is_subtype(&self, sub: &ClassName, sup: &ClassName) -> bool {
        if sub == sup || sup.is(names::OBJECT) {
            return true;
        }
        let mut pending = vec![sub.clone()];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if seen.contains(&current) {
                continue;
            }
            let Some(info) = self.class(&current) else {
                seen.push(current);
                continue;
            };
            for parent in info.super_type.iter().chain(&info.interfaces) {
                if let Some(raw) = parent.raw_name() {
                    if raw == sup {
                        return true;
                    }
                    pending.push(raw.clone());
                }
            }
            seen.push(current);
        }
        false
    }

    /// Returns definitions replaced by a conflicting declaration of the same
    /// class from another component.
    fn displaced(&self) -> &[ClassInfo] {
        &[]
    }

    /// Returns the direct and indirect subclasses of a class.
    fn subclasses(&self, name: &ClassName) -> Vec<&ClassInfo> {
        self.classes()
            .filter(|class| &class.name != name && !class.is_interface() && self.is_subtype(&class.name, name))
            .collect()
    }

    /// Returns the classes implementing an interface, directly or indirectly.
    fn implementors(&self, name: &ClassName) -> Vec<&ClassInfo> {
        self.subclasses(name)
    }
}

/// An in-memory component index.
///
/// # Example
///
/// ```
/// use arbor_core::index::{ClassInfo, IndexView, MemoryIndex};
/// use arbor_core::names::ClassName;
///
/// let index = MemoryIndex::builder()
///     .class(ClassInfo::interface("acme.Greeter"))
///     .class(ClassInfo::class("acme.English").implements("acme.Greeter"))
///     .build();
///
/// assert!(index.is_subtype(&ClassName::new("acme.English"), &ClassName::new("acme.Greeter")));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryIndex {
    classes: IndexMap<ClassName, ClassInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    displaced: Vec<ClassInfo>,
}

impl MemoryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building an index.
    #[must_use]
    pub fn builder() -> IndexBuilder {
        IndexBuilder::default()
    }

    /// Parses an index from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Adds or replaces a class.
    pub fn insert(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), class);
    }

    /// Returns the number of classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if the index holds no classes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Merges the index of another component into this one.
    ///
    /// A class declared differently by both keeps the later definition. The
    /// earlier one is kept as displaced and its name is returned.
    pub fn merge(&mut self, other: MemoryIndex) -> Vec<ClassName> {
        let mut conflicts = Vec::new();
        self.displaced.extend(other.displaced);
        for (name, class) in other.classes {
            match self.classes.insert(name.clone(), class) {
                Some(previous) if self.classes.get(&name) != Some(&previous) => {
                    self.displaced.push(previous);
                    conflicts.push(name);
                }
                _ => {}
            }
        }
        conflicts
    }
}

impl IndexView for MemoryIndex {
    fn class(&self, name: &ClassName) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    fn classes(&self) -> Box<dyn Iterator<Item = &ClassInfo> + '_> {
        Box::new(self.classes.values())
    }

    fn displaced(&self) -> &[ClassInfo] {
        &self.displaced
    }
}

/// Builder for [`MemoryIndex`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    index: MemoryIndex,
}

impl IndexBuilder {
    /// Adds a class.
    pub fn class(mut self, class: ClassInfo) -> Self {
        self.index.insert(class);
        self
    }

    /// Adds several classes.
    pub fn classes(mut self, classes: impl IntoIterator<Item = ClassInfo>) -> Self {
        for class in classes {
            self.index.insert(class);
        }
        self
    }

    /// Finishes the index.
    #[must_use]
    pub fn build(self) -> MemoryIndex {
        self.index
    }
}
