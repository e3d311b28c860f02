//! The bean graph and the class hierarchy it is resolved against.

use crate::bean::{BeanId, BeanInfo};
use crate::extension::SyntheticFactory;
use crate::injection::InjectionPoint;
use crate::interceptor::{DecoratorInfo, InterceptorInfo};
use crate::observer::ObserverInfo;
use crate::removal::RemovedBean;
use crate::resolver::{Resolution, Resolver};
use arbor_config::TieBreak;
use arbor_core::diagnostic::Diagnostics;
use arbor_core::index::{ClassInfo, IndexView};
use arbor_core::names::{self, ClassName};
use arbor_core::registry::Registry;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Transitive raw supertypes of every indexed class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHierarchy {
    supertypes: BTreeMap<ClassName, BTreeSet<ClassName>>,
}

impl TypeHierarchy {
    /// Computes the hierarchy of every class in the index.
    #[must_use]
    pub fn from_index(index: &dyn IndexView) -> Self {
        let mut hierarchy = Self::default();
        for class in index.classes() {
            let mut seen = BTreeSet::new();
            let mut pending = direct_supertypes(class);
            while let Some(current) = pending.pop() {
                if !seen.insert(current.clone()) {
                    continue;
                }
                if let Some(info) = index.class(&current) {
                    pending.extend(direct_supertypes(info));
                }
            }
            hierarchy.supertypes.insert(class.name.clone(), seen);
        }
        hierarchy
    }

    /// Records supertypes of a class that is not in the index.
    pub fn insert(&mut self, class: ClassName, supertypes: impl IntoIterator<Item = ClassName>) {
        self.supertypes.entry(class).or_default().extend(supertypes);
    }

    /// Returns `true` if `sub` equals `sup` or extends/implements it transitively.
    #[must_use]
    pub fn is_subtype(&self, sub: &ClassName, sup: &ClassName) -> bool {
        sub == sup
            || sup.is(names::OBJECT)
            || self
                .supertypes
                .get(sub)
                .is_some_and(|supertypes| supertypes.contains(sup))
    }
}

fn direct_supertypes(class: &ClassInfo) -> Vec<ClassName> {
    class
        .super_type
        .iter()
        .chain(&class.interfaces)
        .filter_map(|ty| ty.raw_name().cloned())
        .collect()
}

/// Who owns an injection point.
#[derive(Debug, Clone, Copy)]
pub enum InjectionOwner<'a> {
    /// A bean (constructor, field, initializer or producer parameter).
    Bean(&'a BeanInfo),
    /// The disposer method of a producer bean.
    Disposer(&'a BeanInfo),
    /// An interceptor.
    Interceptor(&'a InterceptorInfo),
    /// A decorator.
    Decorator(&'a DecoratorInfo),
    /// An observer method.
    Observer(&'a ObserverInfo),
}

impl<'a> InjectionOwner<'a> {
    /// Identifier used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &'a str {
        match self {
            Self::Bean(bean) | Self::Disposer(bean) => bean.id.as_str(),
            Self::Interceptor(interceptor) => interceptor.bean.id.as_str(),
            Self::Decorator(decorator) => decorator.bean.id.as_str(),
            Self::Observer(observer) => &observer.id,
        }
    }

    /// The bean node behind the owner; observers have none of their own.
    #[must_use]
    pub fn bean(&self) -> Option<&'a BeanInfo> {
        match self {
            Self::Bean(bean) | Self::Disposer(bean) => Some(bean),
            Self::Interceptor(interceptor) => Some(&interceptor.bean),
            Self::Decorator(decorator) => Some(&decorator.bean),
            Self::Observer(_) => None,
        }
    }
}

/// The mutable bean graph used while the deployment is being built.
#[derive(Debug, Default)]
pub struct BeanGraph {
    pub(crate) beans: IndexMap<BeanId, BeanInfo>,
    pub(crate) interceptors: Vec<InterceptorInfo>,
    pub(crate) decorators: Vec<DecoratorInfo>,
    pub(crate) observers: Vec<ObserverInfo>,
    pub(crate) factories: IndexMap<BeanId, SyntheticFactory>,
    pub(crate) hierarchy: TypeHierarchy,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) removed: Vec<RemovedBean>,
}

impl BeanGraph {
    /// Returns the beans in discovery order.
    pub fn beans(&self) -> impl Iterator<Item = &BeanInfo> {
        self.beans.values()
    }

    /// Looks up a bean.
    #[must_use]
    pub fn bean(&self, id: &str) -> Option<&BeanInfo> {
        self.beans.get(id)
    }

    /// Returns the number of beans.
    #[must_use]
    pub fn bean_count(&self) -> usize {
        self.beans.len()
    }

    /// Returns the interceptors.
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorInfo] {
        &self.interceptors
    }

    /// Returns the decorators.
    #[must_use]
    pub fn decorators(&self) -> &[DecoratorInfo] {
        &self.decorators
    }

    /// Returns the observers.
    #[must_use]
    pub fn observers(&self) -> &[ObserverInfo] {
        &self.observers
    }

    /// Returns the class hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        &self.hierarchy
    }

    /// Returns the diagnostics recorded while the graph was built.
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Returns the beans removed as unused.
    #[must_use]
    pub fn removed(&self) -> &[RemovedBean] {
        &self.removed
    }

    /// Returns every injection point with its owner.
    pub fn injection_points(&self) -> impl Iterator<Item = (InjectionOwner<'_>, &InjectionPoint)> {
        let beans = self.beans.values().flat_map(|bean| {
            let own = bean
                .injection_points
                .iter()
                .map(move |point| (InjectionOwner::Bean(bean), point));
            let disposer = bean
                .disposer
                .iter()
                .flat_map(|disposer| disposer.injection_points.iter())
                .map(move |point| (InjectionOwner::Disposer(bean), point));
            own.chain(disposer)
        });
        let interceptors = self.interceptors.iter().flat_map(|interceptor| {
            interceptor
                .bean
                .injection_points
                .iter()
                .map(move |point| (InjectionOwner::Interceptor(interceptor), point))
        });
        let decorators = self.decorators.iter().flat_map(|decorator| {
            decorator
                .bean
                .injection_points
                .iter()
                .map(move |point| (InjectionOwner::Decorator(decorator), point))
        });
        let observers = self.observers.iter().flat_map(|observer| {
            observer
                .injection_points
                .iter()
                .map(move |point| (InjectionOwner::Observer(observer), point))
        });
        beans.chain(interceptors).chain(decorators).chain(observers)
    }

    // Same order as `injection_points`.
    fn injection_points_mut(&mut self) -> impl Iterator<Item = &mut InjectionPoint> {
        let beans = self.beans.values_mut().flat_map(|bean| {
            let BeanInfo {
                injection_points,
                disposer,
                ..
            } = bean;
            injection_points
                .iter_mut()
                .chain(disposer.iter_mut().flat_map(|d| d.injection_points.iter_mut()))
        });
        let interceptors = self
            .interceptors
            .iter_mut()
            .flat_map(|i| i.bean.injection_points.iter_mut());
        let decorators = self
            .decorators
            .iter_mut()
            .flat_map(|d| d.bean.injection_points.iter_mut());
        let observers = self
            .observers
            .iter_mut()
            .flat_map(|o| o.injection_points.iter_mut());
        beans.chain(interceptors).chain(decorators).chain(observers)
    }

    /// Creates a resolver over the current beans.
    #[must_use]
    pub fn resolver<'a>(&'a self, registry: &'a Registry, tie_break: &'a [TieBreak]) -> Resolver<'a> {
        Resolver::new(registry, &self.hierarchy, self.beans.values(), tie_break)
    }

    /// Resolves every injection point and records the result on the point.
    ///
    /// Returns the number of points that were matched against beans.
    pub fn resolve_injection_points(&mut self, registry: &Registry, tie_break: &[TieBreak]) -> usize {
        let resolutions: Vec<Option<Resolution>> = {
            let resolver = self.resolver(registry, tie_break);
            self.injection_points()
                .map(|(_, point)| resolver.resolve_point(point))
                .collect()
        };
        let resolved = resolutions.iter().filter(|r| r.is_some()).count();
        for (point, resolution) in self.injection_points_mut().zip(resolutions) {
            point.resolution = resolution;
        }
        resolved
    }

    /// Removes beans and records why.
    pub(crate) fn remove(&mut self, removed: Vec<RemovedBean>) {
        for entry in &removed {
            self.beans.shift_remove(entry.id.as_str());
            self.factories.shift_remove(entry.id.as_str());
        }
        self.removed.extend(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanKind;
    use crate::injection::InjectionTarget;
    use arbor_core::fixtures;
    use arbor_core::types::TypeRef;

    #[test]
    fn test_hierarchy_from_index() {
        let index = fixtures::greeting_index();
        let hierarchy = TypeHierarchy::from_index(&index);
        let english = ClassName::new(fixtures::ENGLISH_GREETER);
        assert!(hierarchy.is_subtype(&english, &ClassName::new(fixtures::GREETER)));
        assert!(hierarchy.is_subtype(&english, &ClassName::new(names::OBJECT)));
        assert!(!hierarchy.is_subtype(&ClassName::new(fixtures::GREETER), &english));
    }

    #[test]
    fn test_resolve_injection_points_records_results() {
        let registry = Registry::builtin();
        let mut graph = BeanGraph::default();

        let mut greeter = BeanInfo::new("acme.English", BeanKind::Class, "acme.English");
        greeter.types = vec![TypeRef::class("acme.English"), TypeRef::object()];
        greeter.qualifiers = vec![
            arbor_core::AnnotationInstance::new(names::DEFAULT),
            arbor_core::AnnotationInstance::new(names::ANY),
        ];
        let mut service = BeanInfo::new("acme.Service", BeanKind::Class, "acme.Service");
        service.declaration = 1;
        service.injection_points.push(InjectionPoint::new(
            0,
            InjectionTarget::Field {
                name: "greeter".to_string(),
            },
            TypeRef::class("acme.English"),
            Vec::new(),
        ));
        service.injection_points.push(InjectionPoint::new(
            1,
            InjectionTarget::Field {
                name: "missing".to_string(),
            },
            TypeRef::class("acme.Missing"),
            Vec::new(),
        ));
        graph.beans.insert(greeter.id.clone(), greeter);
        graph.beans.insert(service.id.clone(), service);

        let tie_break = [TieBreak::DefaultBean, TieBreak::AlternativePriority];
        assert_eq!(graph.resolve_injection_points(&registry, &tie_break), 2);

        let points: Vec<_> = graph.injection_points().collect();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].0.label(), "acme.Service");
        assert_eq!(
            points[0].1.resolution,
            Some(Resolution::Resolved(BeanId::new("acme.English")))
        );
        assert_eq!(points[1].1.resolution, Some(Resolution::Unsatisfied));
    }
}
