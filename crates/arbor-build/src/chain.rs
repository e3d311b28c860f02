//! Interception chain composition.
//!
//! For every intercepted or decorated class bean the composer computes,
//! once and ahead of time, the ordered interceptors around construction,
//! each lifecycle callback, and each business method. The order is
//! `(tier, priority, declaration)`, so two builds of the same input always
//! produce the same chains.
//!
//! # Example
//!
//! ```
//! use arbor_build::chain::PriorityTier;
//!
//! assert_eq!(PriorityTier::of(-5), PriorityTier::PlatformBefore);
//! assert_eq!(PriorityTier::of(1500), PriorityTier::LibraryBefore);
//! assert_eq!(PriorityTier::of(2000), PriorityTier::Application);
//! assert!(PriorityTier::of(100) < PriorityTier::of(4100));
//! ```

use crate::bean::{BeanId, BeanInfo, BusinessMethod};
use crate::error::ChainStateError;
use crate::graph::TypeHierarchy;
use crate::interceptor::{CallbackKind, DecoratorInfo, InterceptorInfo};
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names::ClassName;
use arbor_core::registry::Registry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Start of the platform range of interceptors that run first.
pub const PLATFORM_BEFORE: i32 = 0;
/// Start of the library range of interceptors that run before application ones.
pub const LIBRARY_BEFORE: i32 = 1000;
/// Start of the application range.
pub const APPLICATION: i32 = 2000;
/// Start of the library range of interceptors that run after application ones.
pub const LIBRARY_AFTER: i32 = 3000;
/// Start of the platform range of interceptors that run last.
pub const PLATFORM_AFTER: i32 = 4000;

/// Priority range an interceptor belongs to; earlier tiers are further out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    /// `[0, 1000)`, and every negative priority.
    PlatformBefore,
    /// `[1000, 2000)`.
    LibraryBefore,
    /// `[2000, 3000)`.
    Application,
    /// `[3000, 4000)`.
    LibraryAfter,
    /// `[4000, ∞)`.
    PlatformAfter,
}

impl PriorityTier {
    /// Returns the tier of a priority value.
    #[must_use]
    pub const fn of(priority: i32) -> Self {
        if priority < LIBRARY_BEFORE {
            Self::PlatformBefore
        } else if priority < APPLICATION {
            Self::LibraryBefore
        } else if priority < LIBRARY_AFTER {
            Self::Application
        } else if priority < PLATFORM_AFTER {
            Self::LibraryAfter
        } else {
            Self::PlatformAfter
        }
    }
}

/// One interceptor in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLink {
    /// Interceptor identifier.
    pub interceptor: BeanId,
    /// Interceptor priority.
    pub priority: i32,
    /// Tier derived from the priority.
    pub tier: PriorityTier,
    /// Interceptor discovery order.
    pub declaration: usize,
    /// Interceptor method invoked for this link.
    pub method: String,
}

/// One decorator around a business method; decorators run inside the interceptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratorLink {
    /// Decorator identifier.
    pub decorator: BeanId,
    /// Decorator priority.
    pub priority: i32,
    /// Decorator discovery order.
    pub declaration: usize,
}

/// The chain of one business method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodChain {
    /// `name(Type, ...)` signature.
    pub signature: String,
    /// Method name.
    pub name: String,
    /// Interceptors, outermost first.
    pub interceptors: Vec<ChainLink>,
    /// Decorators, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<DecoratorLink>,
    /// Checked exceptions declared by the method.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub declared_exceptions: Vec<ClassName>,
}

/// Every chain of one bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptionChains {
    /// The intercepted bean.
    pub bean: BeanId,
    /// Interceptors around constructor invocation.
    pub around_construct: Vec<ChainLink>,
    /// Interceptors around post-construct callbacks.
    pub post_construct: Vec<ChainLink>,
    /// Interceptors around pre-destroy callbacks.
    pub pre_destroy: Vec<ChainLink>,
    /// Business method chains, in method declaration order.
    pub methods: Vec<MethodChain>,
    /// The bean's own post-construct callbacks, innermost.
    pub own_post_construct: Vec<String>,
    /// The bean's own pre-destroy callbacks, innermost.
    pub own_pre_destroy: Vec<String>,
}

impl InterceptionChains {
    /// Returns the chain of a business method.
    #[must_use]
    pub fn method(&self, signature: &str) -> Option<&MethodChain> {
        self.methods.iter().find(|m| m.signature == signature)
    }

    /// Returns the lifecycle links of a callback kind; empty for `AroundInvoke`.
    #[must_use]
    pub fn lifecycle(&self, kind: CallbackKind) -> &[ChainLink] {
        match kind {
            CallbackKind::AroundConstruct => &self.around_construct,
            CallbackKind::PostConstruct => &self.post_construct,
            CallbackKind::PreDestroy => &self.pre_destroy,
            CallbackKind::AroundInvoke => &[],
        }
    }
}

/// Lifecycle state of an intercepted instance.
///
/// `Entry → AroundConstruct → PostConstruct → Active → PreDestroy → Terminated`;
/// construction may fail from any state before `Active`, which terminates the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainState {
    /// Nothing has run yet.
    Entry,
    /// Around-construct interceptors and the constructor are running.
    AroundConstruct,
    /// Post-construct interceptors and callbacks are running.
    PostConstruct,
    /// The instance serves business method invocations.
    Active,
    /// Pre-destroy interceptors and callbacks are running.
    PreDestroy,
    /// The instance is gone.
    Terminated,
}

impl ChainState {
    /// Moves to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(self, next: Self) -> Result<Self, ChainStateError> {
        use ChainState::{Active, AroundConstruct, Entry, PostConstruct, PreDestroy, Terminated};
        let allowed = matches!(
            (self, next),
            (Entry, AroundConstruct | PostConstruct | Active)
                | (AroundConstruct, PostConstruct | Active)
                | (PostConstruct, Active)
                | (Active, Active | PreDestroy)
                | (PreDestroy, Terminated)
                | (Entry | AroundConstruct | PostConstruct, Terminated)
        );
        if allowed {
            Ok(next)
        } else {
            Err(ChainStateError { from: self, to: next })
        }
    }

    /// Returns `true` once the instance is gone.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Returns the bindings that apply to a method: its own, plus class-level
/// bindings of annotation types the method does not redeclare.
#[must_use]
pub fn effective_bindings(bean: &BeanInfo, method: &BusinessMethod, registry: &Registry) -> Vec<AnnotationInstance> {
    let mut bindings = method.bindings.clone();
    for binding in &bean.interceptor_bindings {
        if !bindings.iter().any(|b| b.name == binding.name) && registry.is_interceptor_binding(binding.name.as_str()) {
            bindings.push(binding.clone());
        }
    }
    bindings
}

/// Composes interception chains against a fixed set of interceptors and decorators.
pub struct ChainComposer<'a> {
    registry: &'a Registry,
    hierarchy: &'a TypeHierarchy,
    interceptors: Vec<&'a InterceptorInfo>,
    decorators: Vec<&'a DecoratorInfo>,
}

impl<'a> ChainComposer<'a> {
    /// Creates a composer over the enabled interceptors and decorators.
    #[must_use]
    pub fn new(
        registry: &'a Registry,
        hierarchy: &'a TypeHierarchy,
        interceptors: &'a [InterceptorInfo],
        decorators: &'a [DecoratorInfo],
    ) -> Self {
        let mut interceptors: Vec<&InterceptorInfo> = interceptors.iter().filter(|i| i.is_enabled()).collect();
        interceptors.sort_by_key(|i| {
            let priority = i.priority.unwrap_or(APPLICATION);
            (PriorityTier::of(priority), priority, i.bean.declaration)
        });
        let mut decorators: Vec<&DecoratorInfo> = decorators.iter().filter(|d| d.priority.is_some()).collect();
        decorators.sort_by_key(|d| (d.priority.unwrap_or(APPLICATION), d.bean.declaration));
        Self {
            registry,
            hierarchy,
            interceptors,
            decorators,
        }
    }

    /// Composes the chains of a bean; `None` if nothing intercepts or decorates it.
    #[must_use]
    pub fn compose(&self, bean: &BeanInfo) -> Option<InterceptionChains> {
        if !bean.is_class_bean() {
            return None;
        }
        let class_bindings = &bean.interceptor_bindings;
        let decorators: Vec<&DecoratorInfo> = self
            .decorators
            .iter()
            .copied()
            .filter(|d| d.applies_to(bean, self.registry, self.hierarchy))
            .collect();

        let mut methods = Vec::new();
        for method in bean.methods.iter().filter(|m| !m.is_final) {
            let bindings = effective_bindings(bean, method, self.registry);
            let interceptors = self.links(CallbackKind::AroundInvoke, &bindings);
            let decorators: Vec<DecoratorLink> = decorators
                .iter()
                .filter(|d| d.decorated_methods.contains(&method.signature))
                .map(|d| DecoratorLink {
                    decorator: d.bean.id.clone(),
                    priority: d.priority.unwrap_or(APPLICATION),
                    declaration: d.bean.declaration,
                })
                .collect();
            if interceptors.is_empty() && decorators.is_empty() {
                continue;
            }
            methods.push(MethodChain {
                signature: method.signature.clone(),
                name: method.name.clone(),
                interceptors,
                decorators,
                declared_exceptions: method.exceptions.clone(),
            });
        }

        let chains = InterceptionChains {
            bean: bean.id.clone(),
            around_construct: self.links(CallbackKind::AroundConstruct, class_bindings),
            post_construct: self.links(CallbackKind::PostConstruct, class_bindings),
            pre_destroy: self.links(CallbackKind::PreDestroy, class_bindings),
            methods,
            own_post_construct: bean.post_construct.clone(),
            own_pre_destroy: bean.pre_destroy.clone(),
        };
        let intercepted = !chains.around_construct.is_empty()
            || !chains.post_construct.is_empty()
            || !chains.pre_destroy.is_empty()
            || !chains.methods.is_empty();
        if !intercepted {
            return None;
        }
        trace!(bean = %bean.id, methods = chains.methods.len(), "Interception chains composed");
        Some(chains)
    }

    /// Composes the chains of every intercepted bean, keyed by bean identifier.
    #[must_use]
    pub fn compose_all<'b>(&self, beans: impl IntoIterator<Item = &'b BeanInfo>) -> IndexMap<BeanId, InterceptionChains> {
        beans
            .into_iter()
            .filter_map(|bean| self.compose(bean).map(|chains| (bean.id.clone(), chains)))
            .collect()
    }

    fn links(&self, kind: CallbackKind, bindings: &[AnnotationInstance]) -> Vec<ChainLink> {
        self.interceptors
            .iter()
            .filter(|i| i.applies_to(bindings, self.registry))
            .flat_map(|i| {
                let priority = i.priority.unwrap_or(APPLICATION);
                i.callbacks_of(kind).map(move |method| ChainLink {
                    interceptor: i.bean.id.clone(),
                    priority,
                    tier: PriorityTier::of(priority),
                    declaration: i.bean.declaration,
                    method: method.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanKind;
    use crate::interceptor::InterceptorCallback;
    use arbor_core::names;
    use arbor_core::types::TypeRef;
    use arbor_core::RegistryBuilder;

    const LOGGED: &str = "acme.Logged";
    const TIMED: &str = "acme.Timed";

    fn registry() -> Registry {
        let mut builder = RegistryBuilder::new().with_builtins();
        builder.register_interceptor_binding(LOGGED, Vec::<String>::new());
        builder.register_interceptor_binding(TIMED, Vec::<String>::new());
        builder.build()
    }

    fn interceptor(id: &str, binding: &str, priority: i32, declaration: usize, kinds: &[CallbackKind]) -> InterceptorInfo {
        let mut bean = BeanInfo::new(id, BeanKind::Class, id);
        bean.declaration = declaration;
        InterceptorInfo {
            bean,
            bindings: vec![AnnotationInstance::new(binding)],
            priority: Some(priority),
            callbacks: kinds
                .iter()
                .map(|kind| InterceptorCallback {
                    kind: *kind,
                    method: format!("{kind:?}").to_lowercase(),
                })
                .collect(),
        }
    }

    fn method(name: &str, bindings: &[&str]) -> BusinessMethod {
        BusinessMethod {
            name: name.to_string(),
            signature: format!("{name}()"),
            bindings: bindings.iter().map(|b| AnnotationInstance::new(*b)).collect(),
            exceptions: Vec::new(),
            is_final: false,
            declared_by: ClassName::new("acme.Service"),
        }
    }

    fn service() -> BeanInfo {
        let mut bean = BeanInfo::new("acme.Service", BeanKind::Class, "acme.Service");
        bean.types = vec![TypeRef::class("acme.Service"), TypeRef::object()];
        bean.interceptor_bindings = vec![AnnotationInstance::new(LOGGED)];
        bean.methods = vec![method("run", &[TIMED]), method("plain", &[])];
        bean.post_construct = vec!["init".to_string()];
        bean
    }

    fn ids(links: &[ChainLink]) -> Vec<&str> {
        links.iter().map(|l| l.interceptor.as_str()).collect()
    }

    #[test]
    fn test_tiers() {
        assert_eq!(PriorityTier::of(i32::MIN), PriorityTier::PlatformBefore);
        assert_eq!(PriorityTier::of(999), PriorityTier::PlatformBefore);
        assert_eq!(PriorityTier::of(1000), PriorityTier::LibraryBefore);
        assert_eq!(PriorityTier::of(2999), PriorityTier::Application);
        assert_eq!(PriorityTier::of(3000), PriorityTier::LibraryAfter);
        assert_eq!(PriorityTier::of(i32::MAX), PriorityTier::PlatformAfter);
    }

    #[test]
    fn test_order_by_tier_priority_then_declaration() {
        let registry = registry();
        let hierarchy = TypeHierarchy::default();
        let interceptors = vec![
            interceptor("acme.App", LOGGED, 2000, 0, &[CallbackKind::AroundInvoke]),
            interceptor("acme.Library", LOGGED, 1000, 1, &[CallbackKind::AroundInvoke]),
            interceptor("acme.AppLate", LOGGED, 2000, 2, &[CallbackKind::AroundInvoke]),
            interceptor("acme.Platform", LOGGED, -10, 3, &[CallbackKind::AroundInvoke]),
        ];
        let composer = ChainComposer::new(&registry, &hierarchy, &interceptors, &[]);
        let chains = composer.compose(&service()).unwrap();
        let run = chains.method("run()").unwrap();
        assert_eq!(
            ids(&run.interceptors),
            vec!["acme.Platform", "acme.Library", "acme.App", "acme.AppLate"]
        );
    }

    #[test]
    fn test_method_bindings_extend_class_bindings() {
        let registry = registry();
        let hierarchy = TypeHierarchy::default();
        let interceptors = vec![
            interceptor("acme.Log", LOGGED, 2000, 0, &[CallbackKind::AroundInvoke, CallbackKind::PostConstruct]),
            interceptor("acme.Time", TIMED, 2100, 1, &[CallbackKind::AroundInvoke]),
        ];
        let composer = ChainComposer::new(&registry, &hierarchy, &interceptors, &[]);
        let chains = composer.compose(&service()).unwrap();

        assert_eq!(ids(&chains.method("run()").unwrap().interceptors), vec!["acme.Log", "acme.Time"]);
        assert_eq!(ids(&chains.method("plain()").unwrap().interceptors), vec!["acme.Log"]);
        assert_eq!(ids(&chains.post_construct), vec!["acme.Log"]);
        assert_eq!(chains.post_construct[0].method, "postconstruct");
        assert!(chains.around_construct.is_empty());
        assert_eq!(chains.own_post_construct, vec!["init".to_string()]);
    }

    #[test]
    fn test_every_interceptor_method_becomes_a_link() {
        let registry = registry();
        let hierarchy = TypeHierarchy::default();
        let mut audit = interceptor("acme.Audit", LOGGED, 2000, 0, &[]);
        audit.callbacks = ["record", "trace"]
            .into_iter()
            .map(|method| InterceptorCallback {
                kind: CallbackKind::AroundInvoke,
                method: method.to_string(),
            })
            .collect();
        let interceptors = vec![audit, interceptor("acme.Time", LOGGED, 2100, 1, &[CallbackKind::AroundInvoke])];
        let composer = ChainComposer::new(&registry, &hierarchy, &interceptors, &[]);
        let chains = composer.compose(&service()).unwrap();

        let plain = chains.method("plain()").unwrap();
        let methods: Vec<&str> = plain.interceptors.iter().map(|l| l.method.as_str()).collect();
        assert_eq!(ids(&plain.interceptors), vec!["acme.Audit", "acme.Audit", "acme.Time"]);
        assert_eq!(methods, vec!["record", "trace", "aroundinvoke"]);
    }

    #[test]
    fn test_unbound_bean_has_no_chains() {
        let registry = registry();
        let hierarchy = TypeHierarchy::default();
        let interceptors = vec![interceptor("acme.Time", TIMED, 2000, 0, &[CallbackKind::AroundInvoke])];
        let composer = ChainComposer::new(&registry, &hierarchy, &interceptors, &[]);
        let mut bean = service();
        bean.methods = vec![method("plain", &[])];
        assert!(composer.compose(&bean).is_none());
    }

    #[test]
    fn test_disabled_interceptor_is_skipped() {
        let registry = registry();
        let hierarchy = TypeHierarchy::default();
        let mut disabled = interceptor("acme.Log", LOGGED, 2000, 0, &[CallbackKind::AroundInvoke]);
        disabled.priority = None;
        let interceptors = vec![disabled];
        let composer = ChainComposer::new(&registry, &hierarchy, &interceptors, &[]);
        assert!(composer.compose(&service()).is_none());
    }

    #[test]
    fn test_decorators_ordered_by_priority() {
        let registry = registry();
        let hierarchy = TypeHierarchy::default();
        let decorator = |id: &str, priority: i32, declaration: usize| {
            let mut bean = BeanInfo::new(id, BeanKind::Class, id);
            bean.declaration = declaration;
            DecoratorInfo {
                bean,
                delegate_position: 0,
                delegate_type: TypeRef::class("acme.Service"),
                delegate_qualifiers: vec![AnnotationInstance::new(names::DEFAULT)],
                decorated_types: vec![TypeRef::class("acme.Service")],
                decorated_methods: vec!["plain()".to_string()],
                priority: Some(priority),
            }
        };
        let decorators = vec![decorator("acme.Outer", 20, 0), decorator("acme.Inner", 10, 1)];
        let composer = ChainComposer::new(&registry, &hierarchy, &[], &decorators);
        let mut bean = service();
        bean.interceptor_bindings.clear();
        bean.qualifiers = vec![AnnotationInstance::new(names::DEFAULT), AnnotationInstance::new(names::ANY)];

        let chains = composer.compose(&bean).unwrap();
        assert!(chains.method("run()").is_none());
        let plain = chains.method("plain()").unwrap();
        let order: Vec<&str> = plain.decorators.iter().map(|d| d.decorator.as_str()).collect();
        assert_eq!(order, vec!["acme.Inner", "acme.Outer"]);
    }

    #[test]
    fn test_chain_state_transitions() {
        let state = ChainState::Entry
            .advance(ChainState::AroundConstruct)
            .and_then(|s| s.advance(ChainState::PostConstruct))
            .and_then(|s| s.advance(ChainState::Active))
            .and_then(|s| s.advance(ChainState::Active))
            .and_then(|s| s.advance(ChainState::PreDestroy))
            .and_then(|s| s.advance(ChainState::Terminated))
            .unwrap();
        assert!(state.is_terminated());

        assert!(ChainState::PostConstruct.advance(ChainState::Terminated).is_ok());
        let err = ChainState::Active.advance(ChainState::Terminated).unwrap_err();
        assert_eq!(err.from, ChainState::Active);
        assert!(ChainState::Terminated.advance(ChainState::Active).is_err());
        assert!(ChainState::Active.advance(ChainState::PostConstruct).is_err());
    }
}
