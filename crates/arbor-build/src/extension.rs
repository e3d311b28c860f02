//! Build extension API.
//!
//! Extensions contribute to a build at four points, in registration order:
//!
//! 1. [`BuildExtension::register`] - qualifier, scope, stereotype and
//!    interceptor binding types, and vetoed classes, before discovery
//! 2. [`BuildExtension::synthesize`] - synthetic beans with a creation callback
//! 3. [`BuildExtension::observe`] - the resolved but unvalidated graph; may add
//!    exclusions from unused bean removal
//! 4. [`BuildExtension::validate`] - the final graph, read-only; may append diagnostics
//!
//! # Example
//!
//! ```
//! use arbor_build::extension::{BuildExtension, SyntheticBean, SyntheticContext};
//! use arbor_core::creator::ConstantCreator;
//! use arbor_core::names;
//!
//! struct ClockExtension;
//!
//! impl BuildExtension for ClockExtension {
//!     fn name(&self) -> &'static str {
//!         "clock"
//!     }
//!
//!     fn synthesize(&self, ctx: &mut SyntheticContext) {
//!         ctx.add(
//!             SyntheticBean::builder("acme.Clock")
//!                 .scope(names::SINGLETON)
//!                 .creator(ConstantCreator::new(42_u64)),
//!         );
//!     }
//! }
//! ```

use crate::bean::{BeanId, BeanInfo};
use crate::graph::{BeanGraph, InjectionOwner};
use crate::injection::InjectionPoint;
use crate::interceptor::{DecoratorInfo, InterceptorInfo};
use crate::observer::ObserverInfo;
use crate::removal::{self, RemovedBean};
use crate::resolver::Resolver;
use arbor_config::BuildConfig;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::creator::Creator;
use arbor_core::diagnostic::{Diagnostic, Diagnostics};
use arbor_core::names::{self, ClassName};
use arbor_core::registry::{MemberDescriptor, Registry, RegistryBuilder, StereotypeDescriptor};
use arbor_core::types::TypeRef;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A participant in the build.
///
/// Every hook defaults to a no-op.
pub trait BuildExtension: Send + Sync {
    /// Name used to label the extension's diagnostics.
    fn name(&self) -> &'static str;

    /// Registers annotation types before the registry closes.
    fn register(&self, _ctx: &mut RegistrationContext<'_>) {}

    /// Contributes synthetic beans.
    fn synthesize(&self, _ctx: &mut SyntheticContext) {}

    /// Observes the resolved graph before removal and validation.
    fn observe(&self, _ctx: &mut GraphObservation<'_>) {}

    /// Validates the final graph.
    fn validate(&self, _ctx: &ValidationContext<'_>, _out: &mut Diagnostics) {}
}

/// Registration phase access.
pub struct RegistrationContext<'a> {
    registry: &'a mut RegistryBuilder,
    vetoed: &'a mut Vec<ClassName>,
}

impl<'a> RegistrationContext<'a> {
    pub(crate) fn new(registry: &'a mut RegistryBuilder, vetoed: &'a mut Vec<ClassName>) -> Self {
        Self { registry, vetoed }
    }

    /// Registers a qualifier whose listed members are binding.
    pub fn register_qualifier<I, S>(&mut self, name: impl Into<ClassName>, binding_members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register_qualifier(name, binding_members);
        self
    }

    /// Registers a qualifier with fully described members.
    pub fn register_qualifier_members(&mut self, name: impl Into<ClassName>, members: Vec<MemberDescriptor>) -> &mut Self {
        self.registry.register_qualifier_members(name, members);
        self
    }

    /// Registers a scope.
    pub fn register_scope(&mut self, name: impl Into<ClassName>, is_normal: bool) -> &mut Self {
        self.registry.register_scope(name, is_normal);
        self
    }

    /// Registers a stereotype.
    pub fn register_stereotype(&mut self, stereotype: StereotypeDescriptor) -> &mut Self {
        self.registry.register_stereotype(stereotype);
        self
    }

    /// Registers an interceptor binding whose listed members are binding.
    pub fn register_interceptor_binding<I, S>(&mut self, name: impl Into<ClassName>, binding_members: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register_interceptor_binding(name, binding_members);
        self
    }

    /// Excludes a class from discovery.
    pub fn veto(&mut self, class: impl Into<ClassName>) -> &mut Self {
        self.vetoed.push(class.into());
        self
    }
}

/// Creation callback and parameters of a synthetic bean.
#[derive(Clone)]
pub struct SyntheticFactory {
    creator: Arc<dyn Creator>,
    params: BTreeMap<String, serde_json::Value>,
}

impl SyntheticFactory {
    /// Returns the creation callback.
    #[must_use]
    pub fn creator(&self) -> Arc<dyn Creator> {
        Arc::clone(&self.creator)
    }

    /// Returns a named parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.get(name)
    }

    /// Returns every parameter.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.params
    }
}

impl fmt::Debug for SyntheticFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticFactory")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A bean definition contributed by an extension.
#[derive(Debug, Clone)]
pub struct SyntheticBean {
    pub(crate) id: BeanId,
    pub(crate) implementation: Option<ClassName>,
    pub(crate) scope: ClassName,
    pub(crate) types: Vec<TypeRef>,
    pub(crate) qualifiers: Vec<AnnotationInstance>,
    pub(crate) name: Option<String>,
    pub(crate) alternative: bool,
    pub(crate) priority: Option<i32>,
    pub(crate) default_bean: bool,
    pub(crate) unremovable: bool,
    pub(crate) injection_points: Vec<(TypeRef, Vec<AnnotationInstance>)>,
    pub(crate) factory: SyntheticFactory,
}

impl SyntheticBean {
    /// Starts a synthetic bean definition with an explicit identifier.
    pub fn builder(id: impl Into<BeanId>) -> SyntheticBeanBuilder {
        SyntheticBeanBuilder {
            id: id.into(),
            implementation: None,
            scope: ClassName::new(names::DEPENDENT),
            types: Vec::new(),
            qualifiers: Vec::new(),
            name: None,
            alternative: false,
            priority: None,
            default_bean: false,
            unremovable: false,
            injection_points: Vec::new(),
            params: BTreeMap::new(),
            creator: None,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> &BeanId {
        &self.id
    }
}

/// Builder for [`SyntheticBean`].
pub struct SyntheticBeanBuilder {
    id: BeanId,
    implementation: Option<ClassName>,
    scope: ClassName,
    types: Vec<TypeRef>,
    qualifiers: Vec<AnnotationInstance>,
    name: Option<String>,
    alternative: bool,
    priority: Option<i32>,
    default_bean: bool,
    unremovable: bool,
    injection_points: Vec<(TypeRef, Vec<AnnotationInstance>)>,
    params: BTreeMap<String, serde_json::Value>,
    creator: Option<Arc<dyn Creator>>,
}

impl SyntheticBeanBuilder {
    /// Sets the implementation class; its type closure becomes the bean types when none are given.
    pub fn implementation(mut self, class: impl Into<ClassName>) -> Self {
        self.implementation = Some(class.into());
        self
    }

    /// Sets the scope (`Dependent` by default).
    pub fn scope(mut self, scope: impl Into<ClassName>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Adds a bean type.
    pub fn add_type(mut self, ty: impl Into<TypeRef>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// Adds a qualifier.
    pub fn qualifier(mut self, qualifier: AnnotationInstance) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    /// Names the bean.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.qualifiers
            .push(AnnotationInstance::new(names::NAMED).with("value", name.as_str()));
        self.name = Some(name);
        self
    }

    /// Makes the bean an alternative selected with the given priority.
    pub fn alternative(mut self, priority: i32) -> Self {
        self.alternative = true;
        self.priority = Some(priority);
        self
    }

    /// Sets the priority used for ordering in programmatic lookups.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Marks the bean as a fallback.
    pub fn default_bean(mut self) -> Self {
        self.default_bean = true;
        self
    }

    /// Protects the bean from unused bean removal.
    pub fn unremovable(mut self) -> Self {
        self.unremovable = true;
        self
    }

    /// Declares a dependency; the creator receives it at the next position.
    pub fn inject(mut self, ty: impl Into<TypeRef>, qualifiers: Vec<AnnotationInstance>) -> Self {
        self.injection_points.push((ty.into(), qualifiers));
        self
    }

    /// Adds a parameter handed to the creator.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the creation callback.
    pub fn creator(mut self, creator: impl Creator + 'static) -> Self {
        self.creator = Some(Arc::new(creator));
        self
    }

    /// Finishes the definition.
    pub fn build(self) -> Result<SyntheticBean, Diagnostic> {
        let Some(creator) = self.creator else {
            return Err(
                Diagnostic::definition(format!("Synthetic bean {} does not declare a creator", self.id))
                    .with_target(self.id.as_str()),
            );
        };
        Ok(SyntheticBean {
            id: self.id,
            implementation: self.implementation,
            scope: self.scope,
            types: self.types,
            qualifiers: self.qualifiers,
            name: self.name,
            alternative: self.alternative,
            priority: self.priority,
            default_bean: self.default_bean,
            unremovable: self.unremovable,
            injection_points: self.injection_points,
            factory: SyntheticFactory {
                creator,
                params: self.params,
            },
        })
    }
}

/// Synthetic bean phase access.
#[derive(Debug, Default)]
pub struct SyntheticContext {
    beans: Vec<SyntheticBean>,
    diagnostics: Diagnostics,
}

impl SyntheticContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a synthetic bean; an incomplete definition is reported as a diagnostic.
    pub fn add(&mut self, bean: SyntheticBeanBuilder) -> &mut Self {
        match bean.build() {
            Ok(bean) => self.beans.push(bean),
            Err(diagnostic) => self.diagnostics.push(diagnostic),
        }
        self
    }

    /// Returns the beans added so far.
    #[must_use]
    pub fn beans(&self) -> &[SyntheticBean] {
        &self.beans
    }

    pub(crate) fn into_parts(self) -> (Vec<SyntheticBean>, Diagnostics) {
        (self.beans, self.diagnostics)
    }
}

/// Excludes beans from unused bean removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeanExclusion {
    /// The bean with this identifier.
    Id(BeanId),
    /// Beans whose bean class is this class.
    Class(ClassName),
    /// Beans that have this bean type.
    Type(TypeRef),
}

impl BeanExclusion {
    /// Returns `true` if the exclusion covers the bean.
    #[must_use]
    pub fn excludes(&self, bean: &BeanInfo) -> bool {
        match self {
            Self::Id(id) => &bean.id == id,
            Self::Class(class) => &bean.bean_class == class,
            Self::Type(ty) => bean.types.contains(ty),
        }
    }
}

/// Read access to the resolved graph plus the ability to add exclusions.
pub struct GraphObservation<'a> {
    graph: &'a BeanGraph,
    registry: &'a Registry,
    config: &'a BuildConfig,
    exclusions: &'a mut Vec<BeanExclusion>,
}

impl<'a> GraphObservation<'a> {
    pub(crate) fn new(
        graph: &'a BeanGraph,
        registry: &'a Registry,
        config: &'a BuildConfig,
        exclusions: &'a mut Vec<BeanExclusion>,
    ) -> Self {
        Self {
            graph,
            registry,
            config,
            exclusions,
        }
    }

    /// Returns the beans.
    pub fn beans(&self) -> impl Iterator<Item = &BeanInfo> {
        self.graph.beans()
    }

    /// Looks up a bean.
    #[must_use]
    pub fn bean(&self, id: &str) -> Option<&BeanInfo> {
        self.graph.bean(id)
    }

    /// Returns the interceptors.
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorInfo] {
        self.graph.interceptors()
    }

    /// Returns the observers.
    #[must_use]
    pub fn observers(&self) -> &[ObserverInfo] {
        self.graph.observers()
    }

    /// Returns every injection point with its owner.
    pub fn injection_points(&self) -> impl Iterator<Item = (InjectionOwner<'_>, &InjectionPoint)> {
        self.graph.injection_points()
    }

    /// Returns a resolver over the current beans.
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        self.graph.resolver(self.registry, &self.config.tie_break)
    }

    /// Excludes beans from unused bean removal.
    pub fn exclude(&mut self, exclusion: BeanExclusion) {
        self.exclusions.push(exclusion);
    }

    /// Returns the beans that unused bean removal would remove given the current exclusions.
    #[must_use]
    pub fn unused_candidates(&self) -> Vec<RemovedBean> {
        removal::find_unused(self.graph, self.config, self.exclusions)
    }
}

/// Read-only access to the final graph.
pub struct ValidationContext<'a> {
    graph: &'a BeanGraph,
    registry: &'a Registry,
    config: &'a BuildConfig,
}

impl<'a> ValidationContext<'a> {
    pub(crate) fn new(graph: &'a BeanGraph, registry: &'a Registry, config: &'a BuildConfig) -> Self {
        Self {
            graph,
            registry,
            config,
        }
    }

    /// Returns the beans.
    pub fn beans(&self) -> impl Iterator<Item = &BeanInfo> {
        self.graph.beans()
    }

    /// Looks up a bean.
    #[must_use]
    pub fn bean(&self, id: &str) -> Option<&BeanInfo> {
        self.graph.bean(id)
    }

    /// Returns the interceptors.
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorInfo] {
        self.graph.interceptors()
    }

    /// Returns the decorators.
    #[must_use]
    pub fn decorators(&self) -> &[DecoratorInfo] {
        self.graph.decorators()
    }

    /// Returns the observers.
    #[must_use]
    pub fn observers(&self) -> &[ObserverInfo] {
        self.graph.observers()
    }

    /// Returns every injection point with its owner.
    pub fn injection_points(&self) -> impl Iterator<Item = (InjectionOwner<'_>, &InjectionPoint)> {
        self.graph.injection_points()
    }

    /// Returns the beans removed as unused.
    #[must_use]
    pub fn removed_beans(&self) -> &[RemovedBean] {
        self.graph.removed()
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Returns a resolver over the final beans.
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        self.graph.resolver(self.registry, &self.config.tie_break)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanKind;
    use arbor_core::creator::ConstantCreator;

    #[test]
    fn test_builder_requires_creator() {
        let err = SyntheticBean::builder("acme.Clock").build().unwrap_err();
        assert!(err.message.contains("acme.Clock"));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_builder_collects_definition() {
        let bean = SyntheticBean::builder("acme.Clock")
            .scope(names::SINGLETON)
            .add_type("acme.Clock")
            .named("clock")
            .alternative(5)
            .inject(TypeRef::class("acme.TimeSource"), Vec::new())
            .param("zone", "UTC")
            .creator(ConstantCreator::new(0_u64))
            .build()
            .unwrap();

        assert_eq!(bean.id().as_str(), "acme.Clock");
        assert!(bean.scope.is(names::SINGLETON));
        assert_eq!(bean.name.as_deref(), Some("clock"));
        assert!(bean.qualifiers[0].is(names::NAMED));
        assert_eq!(bean.priority, Some(5));
        assert_eq!(bean.injection_points.len(), 1);
        assert_eq!(bean.factory.param("zone"), Some(&serde_json::json!("UTC")));
    }

    #[test]
    fn test_context_records_incomplete_beans() {
        let mut ctx = SyntheticContext::new();
        ctx.add(SyntheticBean::builder("acme.Ok").creator(ConstantCreator::new(1_u8)))
            .add(SyntheticBean::builder("acme.Broken"));
        let (beans, diagnostics) = ctx.into_parts();
        assert_eq!(beans.len(), 1);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_exclusions() {
        let mut bean = BeanInfo::new("acme.Factory#make()", BeanKind::ProducerMethod, "acme.Factory");
        bean.types = vec![TypeRef::class("acme.Widget"), TypeRef::object()];

        assert!(BeanExclusion::Id(BeanId::new("acme.Factory#make()")).excludes(&bean));
        assert!(BeanExclusion::Class(ClassName::new("acme.Factory")).excludes(&bean));
        assert!(BeanExclusion::Type(TypeRef::class("acme.Widget")).excludes(&bean));
        assert!(!BeanExclusion::Type(TypeRef::class("acme.Gadget")).excludes(&bean));
    }

    #[test]
    fn test_registration_context_delegates() {
        let mut builder = RegistryBuilder::new().with_builtins();
        let mut vetoed = Vec::new();
        {
            let mut ctx = RegistrationContext::new(&mut builder, &mut vetoed);
            ctx.register_qualifier("acme.Region", ["code"])
                .register_scope("acme.TenantScoped", true)
                .veto("acme.Legacy");
        }
        let registry = builder.build();
        assert!(registry.is_qualifier("acme.Region"));
        assert!(registry.is_normal_scope("acme.TenantScoped"));
        assert_eq!(vetoed, vec![ClassName::new("acme.Legacy")]);
    }
}
