//! Qualifier, scope, stereotype and interceptor-binding registry.
//!
//! The registry is populated once before graph construction: first with the
//! built-in annotations, then from the component index (annotation types
//! meta-annotated as qualifiers, scopes, stereotypes or interceptor bindings),
//! and finally from build extensions. [`RegistryBuilder::build`] freezes it
//! into an immutable [`Registry`] that answers typed lookups.
//!
//! # Example
//!
//! ```
//! use arbor_core::annotation::AnnotationInstance;
//! use arbor_core::registry::RegistryBuilder;
//!
//! let mut builder = RegistryBuilder::new().with_builtins();
//! builder.register_qualifier("acme.Region", ["code"]);
//! let registry = builder.build();
//!
//! let eu = AnnotationInstance::new("acme.Region").with("code", "eu").with("label", "Europe");
//! let eu_other_label = AnnotationInstance::new("acme.Region").with("code", "eu").with("label", "EU");
//! assert!(registry.qualifier_equals(&eu, &eu_other_label));
//! ```

use crate::annotation::{AnnotationInstance, AnnotationValue};
use crate::index::{ClassInfo, IndexView};
use crate::names::{self, ClassName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A member of a qualifier or interceptor binding annotation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDescriptor {
    /// Member name.
    pub name: String,
    /// Whether the member participates in equality.
    pub binding: bool,
    /// Default value used when an instance omits the member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AnnotationValue>,
}

impl MemberDescriptor {
    /// Creates a binding member without a default.
    pub fn binding(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: true,
            default: None,
        }
    }

    /// Creates a non-binding member without a default.
    pub fn non_binding(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            binding: false,
            default: None,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: impl Into<AnnotationValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Compares two annotation instances of the same type on their binding members.
fn binding_members_equal(members: &[MemberDescriptor], a: &AnnotationInstance, b: &AnnotationInstance) -> bool {
    members.iter().filter(|m| m.binding).all(|member| {
        let left = a.value(&member.name).or(member.default.as_ref());
        let right = b.value(&member.name).or(member.default.as_ref());
        left == right
    })
}

/// A qualifier annotation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierDescriptor {
    /// Annotation type.
    pub name: ClassName,
    /// Declared members.
    pub members: Vec<MemberDescriptor>,
}

impl QualifierDescriptor {
    /// Returns the names of the binding members.
    pub fn binding_members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter(|m| m.binding).map(|m| m.name.as_str())
    }
}

/// A scope annotation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    /// Annotation type.
    pub name: ClassName,
    /// `true` for normal scopes (client-proxied), `false` for pseudo-scopes.
    pub normal: bool,
    /// Whether subclasses inherit the scope declared on a superclass.
    pub inherited: bool,
}

/// A stereotype annotation type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StereotypeDescriptor {
    /// Annotation type.
    pub name: ClassName,
    /// Scope applied to beans that declare none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_scope: Option<ClassName>,
    /// Interceptor bindings applied to the bean.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interceptor_bindings: Vec<AnnotationInstance>,
    /// Beans carrying the stereotype are alternatives.
    #[serde(default)]
    pub alternative: bool,
    /// Beans carrying the stereotype get a default name.
    #[serde(default)]
    pub named: bool,
    /// Priority given to alternatives carrying the stereotype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Nested stereotypes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stereotypes: Vec<ClassName>,
}

impl StereotypeDescriptor {
    /// Creates an empty stereotype.
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the default scope.
    pub fn scope(mut self, scope: impl Into<ClassName>) -> Self {
        self.default_scope = Some(scope.into());
        self
    }

    /// Adds an interceptor binding.
    pub fn binding(mut self, binding: AnnotationInstance) -> Self {
        self.interceptor_bindings.push(binding);
        self
    }

    /// Marks the stereotype as an alternative stereotype with an optional priority.
    pub fn alternative(mut self, priority: Option<i32>) -> Self {
        self.alternative = true;
        self.priority = priority;
        self
    }

    /// Marks the stereotype as naming its beans.
    pub fn named(mut self) -> Self {
        self.named = true;
        self
    }

    /// Adds a nested stereotype.
    pub fn nested(mut self, stereotype: impl Into<ClassName>) -> Self {
        self.stereotypes.push(stereotype.into());
        self
    }
}

/// An interceptor binding annotation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorBindingDescriptor {
    /// Annotation type.
    pub name: ClassName,
    /// Declared members.
    pub members: Vec<MemberDescriptor>,
}

/// Mutable registry used during the registration phase.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    qualifiers: IndexMap<ClassName, QualifierDescriptor>,
    scopes: IndexMap<ClassName, ScopeDescriptor>,
    stereotypes: IndexMap<ClassName, StereotypeDescriptor>,
    bindings: IndexMap<ClassName, InterceptorBindingDescriptor>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in scopes and qualifiers.
    #[must_use]
    pub fn with_builtins(mut self) -> Self {
        self.register_scope(names::DEPENDENT, false);
        self.register_scope(names::SINGLETON, false);
        self.register_scope(names::APPLICATION_SCOPED, true);
        self.register_scope(names::REQUEST_SCOPED, true);
        self.register_scope(names::SESSION_SCOPED, true);

        self.register_qualifier_members(names::DEFAULT, Vec::new());
        self.register_qualifier_members(names::ANY, Vec::new());
        self.register_qualifier_members(
            names::NAMED,
            vec![MemberDescriptor::binding("value").with_default("")],
        );
        for event in [names::INITIALIZED, names::BEFORE_DESTROYED, names::DESTROYED] {
            self.register_qualifier_members(event, vec![MemberDescriptor::binding("value")]);
        }
        self
    }

    /// Registers a qualifier whose listed members are binding; any other member is ignored for equality.
    pub fn register_qualifier<I, S>(&mut self, name: impl Into<ClassName>, binding_members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members = binding_members.into_iter().map(MemberDescriptor::binding).collect();
        self.register_qualifier_members(name, members)
    }

    /// Registers a qualifier with fully described members.
    pub fn register_qualifier_members(
        &mut self,
        name: impl Into<ClassName>,
        members: Vec<MemberDescriptor>,
    ) -> &mut Self {
        let name = name.into();
        debug!(qualifier = %name, "Registering qualifier");
        self.qualifiers
            .insert(name.clone(), QualifierDescriptor { name, members });
        self
    }

    /// Registers a scope.
    pub fn register_scope(&mut self, name: impl Into<ClassName>, is_normal: bool) -> &mut Self {
        let name = name.into();
        self.scopes.insert(
            name.clone(),
            ScopeDescriptor {
                name,
                normal: is_normal,
                inherited: false,
            },
        );
        self
    }

    /// Registers a stereotype.
    pub fn register_stereotype(&mut self, stereotype: StereotypeDescriptor) -> &mut Self {
        self.stereotypes.insert(stereotype.name.clone(), stereotype);
        self
    }

    /// Registers an interceptor binding whose listed members are binding.
    pub fn register_interceptor_binding<I, S>(
        &mut self,
        name: impl Into<ClassName>,
        binding_members: I,
    ) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let members = binding_members.into_iter().map(MemberDescriptor::binding).collect();
        self.bindings
            .insert(name.clone(), InterceptorBindingDescriptor { name, members });
        self
    }

    /// Returns `true` if the annotation type is registered as a qualifier.
    #[must_use]
    pub fn is_qualifier(&self, name: &str) -> bool {
        self.qualifiers.contains_key(name)
    }

    /// Returns `true` if the annotation type is registered as a scope.
    #[must_use]
    pub fn is_scope(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Registers every meta-annotated annotation type found in the index.
    ///
    /// Explicit registrations made before discovery are kept.
    pub fn discover(&mut self, index: &dyn IndexView) -> &mut Self {
        let annotation_types: Vec<&ClassInfo> = index.classes().filter(|c| c.is_annotation()).collect();

        for class in &annotation_types {
            if class.has(names::QUALIFIER) && !self.is_qualifier(class.name.as_str()) {
                let members = annotation_members(class);
                self.register_qualifier_members(&class.name, members);
            }
            let normal = class.has(names::NORMAL_SCOPE);
            if (normal || class.has(names::SCOPE)) && !self.is_scope(class.name.as_str()) {
                self.scopes.insert(
                    class.name.clone(),
                    ScopeDescriptor {
                        name: class.name.clone(),
                        normal,
                        inherited: class.has(names::INHERITED),
                    },
                );
            }
            if class.has(names::INTERCEPTOR_BINDING) && !self.bindings.contains_key(class.name.as_str()) {
                self.bindings.insert(
                    class.name.clone(),
                    InterceptorBindingDescriptor {
                        name: class.name.clone(),
                        members: annotation_members(class),
                    },
                );
            }
        }

        // Stereotypes reference scopes and bindings, so they are read once those are known.
        for class in annotation_types.iter().filter(|c| c.has(names::STEREOTYPE)) {
            if self.stereotypes.contains_key(class.name.as_str()) {
                continue;
            }
            let stereotype = self.stereotype_from(class, index);
            self.register_stereotype(stereotype);
        }
        self
    }

    fn stereotype_from(&self, class: &ClassInfo, index: &dyn IndexView) -> StereotypeDescriptor {
        let mut stereotype = StereotypeDescriptor::new(&class.name);
        for annotation in &class.annotations {
            let name = annotation.name.as_str();
            if self.is_scope(name) {
                stereotype.default_scope = Some(annotation.name.clone());
            } else if self.bindings.contains_key(name) {
                stereotype.interceptor_bindings.push(annotation.clone());
            } else if annotation.is(names::ALTERNATIVE) {
                stereotype.alternative = true;
            } else if annotation.is(names::NAMED) {
                stereotype.named = true;
            } else if annotation.is(names::PRIORITY) {
                stereotype.priority = annotation
                    .int("value")
                    .and_then(|value| i32::try_from(value).ok());
            } else if index
                .class(&annotation.name)
                .is_some_and(|nested| nested.has(names::STEREOTYPE))
            {
                stereotype.stereotypes.push(annotation.name.clone());
            }
        }
        stereotype
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> Registry {
        debug!(
            qualifiers = self.qualifiers.len(),
            scopes = self.scopes.len(),
            stereotypes = self.stereotypes.len(),
            interceptor_bindings = self.bindings.len(),
            "Registry closed"
        );
        Registry {
            qualifiers: self.qualifiers,
            scopes: self.scopes,
            stereotypes: self.stereotypes,
            bindings: self.bindings,
        }
    }
}

fn annotation_members(class: &ClassInfo) -> Vec<MemberDescriptor> {
    class
        .business_methods()
        .map(|method| MemberDescriptor {
            name: method.name.clone(),
            binding: !method.has(names::NONBINDING),
            default: method.default_value.clone(),
        })
        .collect()
}

/// Immutable registry of qualifier, scope, stereotype and interceptor binding types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    qualifiers: IndexMap<ClassName, QualifierDescriptor>,
    scopes: IndexMap<ClassName, ScopeDescriptor>,
    stereotypes: IndexMap<ClassName, StereotypeDescriptor>,
    bindings: IndexMap<ClassName, InterceptorBindingDescriptor>,
}

impl Registry {
    /// Returns a registry holding only the built-ins.
    #[must_use]
    pub fn builtin() -> Self {
        RegistryBuilder::new().with_builtins().build()
    }

    /// Returns `true` if the annotation type is a qualifier.
    #[must_use]
    pub fn is_qualifier(&self, name: &str) -> bool {
        self.qualifiers.contains_key(name)
    }

    /// Returns `true` if the annotation type is a scope.
    #[must_use]
    pub fn is_scope(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    /// Returns `true` if the annotation type is a normal scope.
    #[must_use]
    pub fn is_normal_scope(&self, name: &str) -> bool {
        self.scopes.get(name).is_some_and(|scope| scope.normal)
    }

    /// Returns `true` if the annotation type is a stereotype.
    #[must_use]
    pub fn is_stereotype(&self, name: &str) -> bool {
        self.stereotypes.contains_key(name)
    }

    /// Returns `true` if the annotation type is an interceptor binding.
    #[must_use]
    pub fn is_interceptor_binding(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Looks up a qualifier.
    #[must_use]
    pub fn qualifier(&self, name: &str) -> Option<&QualifierDescriptor> {
        self.qualifiers.get(name)
    }

    /// Looks up a scope.
    #[must_use]
    pub fn scope(&self, name: &str) -> Option<&ScopeDescriptor> {
        self.scopes.get(name)
    }

    /// Looks up a stereotype.
    #[must_use]
    pub fn stereotype(&self, name: &str) -> Option<&StereotypeDescriptor> {
        self.stereotypes.get(name)
    }

    /// Looks up an interceptor binding.
    #[must_use]
    pub fn interceptor_binding(&self, name: &str) -> Option<&InterceptorBindingDescriptor> {
        self.bindings.get(name)
    }

    /// Returns every registered scope.
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeDescriptor> {
        self.scopes.values()
    }

    /// Returns every registered qualifier.
    pub fn qualifiers(&self) -> impl Iterator<Item = &QualifierDescriptor> {
        self.qualifiers.values()
    }

    /// Compares two qualifier instances using only their binding members.
    ///
    /// Instances of an unregistered annotation type compare all members.
    #[must_use]
    pub fn qualifier_equals(&self, a: &AnnotationInstance, b: &AnnotationInstance) -> bool {
        if a.name != b.name {
            return false;
        }
        match self.qualifiers.get(a.name.as_str()) {
            Some(descriptor) => binding_members_equal(&descriptor.members, a, b),
            None => a.values == b.values,
        }
    }

    /// Compares two interceptor binding instances using only their binding members.
    #[must_use]
    pub fn binding_equals(&self, a: &AnnotationInstance, b: &AnnotationInstance) -> bool {
        if a.name != b.name {
            return false;
        }
        match self.bindings.get(a.name.as_str()) {
            Some(descriptor) => binding_members_equal(&descriptor.members, a, b),
            None => a.values == b.values,
        }
    }

    /// Returns `true` if `required` is present in `available` under qualifier equality.
    #[must_use]
    pub fn has_qualifier(&self, available: &[AnnotationInstance], required: &AnnotationInstance) -> bool {
        available.iter().any(|candidate| self.qualifier_equals(candidate, required))
    }

    /// Returns a stereotype and every stereotype it transitively carries, outermost first.
    #[must_use]
    pub fn expand_stereotype(&self, name: &str) -> Vec<&StereotypeDescriptor> {
        let mut expanded: Vec<&StereotypeDescriptor> = Vec::new();
        let mut pending = vec![name];
        while let Some(current) = pending.pop() {
            if expanded.iter().any(|s| s.name.is(current)) {
                continue;
            }
            if let Some(stereotype) = self.stereotypes.get(current) {
                expanded.push(stereotype);
                pending.extend(stereotype.stereotypes.iter().rev().map(ClassName::as_str));
            }
        }
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::index::{ClassInfo, MemoryIndex, MethodInfo};

    fn qualifier(name: &str) -> AnnotationInstance {
        AnnotationInstance::new(name)
    }

    #[test]
    fn test_builtins() {
        let registry = Registry::builtin();
        assert!(registry.is_scope(names::DEPENDENT));
        assert!(!registry.is_normal_scope(names::DEPENDENT));
        assert!(!registry.is_normal_scope(names::SINGLETON));
        assert!(registry.is_normal_scope(names::APPLICATION_SCOPED));
        assert!(registry.is_normal_scope(names::REQUEST_SCOPED));
        assert!(registry.is_normal_scope(names::SESSION_SCOPED));
        assert!(registry.is_qualifier(names::DEFAULT));
        assert!(registry.is_qualifier(names::ANY));
        assert!(registry.is_qualifier(names::NAMED));
        assert!(!registry.is_qualifier("acme.Unknown"));
    }

    #[test]
    fn test_named_default_value_participates() {
        let registry = Registry::builtin();
        let implicit = qualifier(names::NAMED);
        let empty = qualifier(names::NAMED).with("value", "");
        let other = qualifier(names::NAMED).with("value", "other");
        assert!(registry.qualifier_equals(&implicit, &empty));
        assert!(!registry.qualifier_equals(&implicit, &other));
    }

    #[test]
    fn test_registered_binding_members() {
        let mut builder = RegistryBuilder::new().with_builtins();
        builder.discover(&fixtures::qualifier_index());
        assert!(!builder.is_qualifier(fixtures::BINDING_FIELD_QUALIFIER));
        builder.register_qualifier(fixtures::BINDING_FIELD_QUALIFIER, ["age"]);
        let registry = builder.build();

        let q = fixtures::BINDING_FIELD_QUALIFIER;
        let x10 = qualifier(q).with("value", "X").with("age", 10);
        let y10 = qualifier(q).with("value", "Y").with("age", 10);
        let x1 = qualifier(q).with("value", "X").with("age", 1);

        assert!(registry.qualifier_equals(&x10, &y10));
        assert!(!registry.qualifier_equals(&x10, &x1));
    }

    #[test]
    fn test_discovered_nonbinding_member() {
        let mut builder = RegistryBuilder::new().with_builtins();
        builder.discover(&fixtures::qualifier_index());
        let registry = builder.build();

        let descriptor = registry.qualifier(fixtures::REGION).expect("region");
        assert_eq!(descriptor.binding_members().collect::<Vec<_>>(), vec!["code"]);

        let eu = qualifier(fixtures::REGION).with("code", "eu").with("label", "Europe");
        let eu_short = qualifier(fixtures::REGION).with("code", "eu");
        let us = qualifier(fixtures::REGION).with("code", "us");
        assert!(registry.qualifier_equals(&eu, &eu_short));
        assert!(!registry.qualifier_equals(&eu, &us));
    }

    #[test]
    fn test_dynamic_qualifier_without_binding_members() {
        let mut builder = RegistryBuilder::new().with_builtins();
        builder.register_qualifier("acme.Dynamic", Vec::<String>::new());
        let registry = builder.build();

        let a = qualifier("acme.Dynamic").with("anything", 1);
        let b = qualifier("acme.Dynamic");
        assert!(registry.qualifier_equals(&a, &b));
        assert!(!registry.qualifier_equals(&a, &qualifier(names::DEFAULT)));
    }

    #[test]
    fn test_discover_scopes_and_stereotypes() {
        let index = MemoryIndex::builder()
            .class(
                ClassInfo::annotation_type("acme.TenantScoped")
                    .annotated(AnnotationInstance::new(names::NORMAL_SCOPE))
                    .annotated(AnnotationInstance::new(names::INHERITED)),
            )
            .class(
                ClassInfo::annotation_type("acme.Audited")
                    .annotated(AnnotationInstance::new(names::INTERCEPTOR_BINDING))
                    .with_method(MethodInfo::member("level", "arbor.lang.String", None).annotated(AnnotationInstance::new(names::NONBINDING))),
            )
            .class(
                ClassInfo::annotation_type("acme.Inner")
                    .annotated(AnnotationInstance::new(names::STEREOTYPE))
                    .annotated(AnnotationInstance::new("acme.Audited")),
            )
            .class(
                ClassInfo::annotation_type("acme.Service")
                    .annotated(AnnotationInstance::new(names::STEREOTYPE))
                    .annotated(AnnotationInstance::new(names::APPLICATION_SCOPED))
                    .annotated(AnnotationInstance::new(names::NAMED))
                    .annotated(AnnotationInstance::new("acme.Inner")),
            )
            .build();

        let mut builder = RegistryBuilder::new().with_builtins();
        builder.discover(&index);
        let registry = builder.build();

        let tenant = registry.scope("acme.TenantScoped").expect("scope");
        assert!(tenant.normal && tenant.inherited);
        assert!(registry.is_interceptor_binding("acme.Audited"));

        let service = registry.stereotype("acme.Service").expect("stereotype");
        assert_eq!(service.default_scope.as_ref().map(ClassName::as_str), Some(names::APPLICATION_SCOPED));
        assert!(service.named);

        let expanded: Vec<&str> = registry
            .expand_stereotype("acme.Service")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(expanded, vec!["acme.Service", "acme.Inner"]);

        let low = AnnotationInstance::new("acme.Audited").with("level", "low");
        let high = AnnotationInstance::new("acme.Audited").with("level", "high");
        assert!(registry.binding_equals(&low, &high));
    }

    #[test]
    fn test_expand_stereotype_tolerates_cycles() {
        let mut builder = RegistryBuilder::new();
        builder.register_stereotype(StereotypeDescriptor::new("acme.A").nested("acme.B"));
        builder.register_stereotype(StereotypeDescriptor::new("acme.B").nested("acme.A"));
        let registry = builder.build();
        assert_eq!(registry.expand_stereotype("acme.A").len(), 2);
    }
}
