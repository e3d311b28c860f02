//! Graph validation.
//!
//! Runs after every injection point has been resolved and unused beans
//! have been removed. Each check appends diagnostics; nothing aborts early,
//! so a broken deployment reports every problem in one pass.

use crate::bean::{BeanId, BeanInfo};
use crate::chain;
use crate::graph::{BeanGraph, InjectionOwner};
use crate::injection::{InjectionKind, InjectionPoint, MetadataKind};
use crate::interceptor::CallbackKind;
use crate::resolver::Resolution;
use arbor_config::BuildConfig;
use arbor_core::diagnostic::{Diagnostic, Diagnostics};
use arbor_core::error::ErrorCategory;
use arbor_core::registry::Registry;
use arbor_core::types::TypeRef;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Validates a resolved bean graph.
pub struct Validator<'a> {
    graph: &'a BeanGraph,
    registry: &'a Registry,
    config: &'a BuildConfig,
}

impl<'a> Validator<'a> {
    /// Creates a validator.
    #[must_use]
    pub fn new(graph: &'a BeanGraph, registry: &'a Registry, config: &'a BuildConfig) -> Self {
        Self {
            graph,
            registry,
            config,
        }
    }

    /// Returns the discovery diagnostics followed by every validation problem.
    #[must_use]
    pub fn validate(&self) -> Diagnostics {
        let mut out = Diagnostics::new();
        out.extend(self.graph.diagnostics().iter().cloned());

        self.check_injection_points(&mut out);
        self.check_interception(&mut out);
        self.check_proxyability(&mut out);
        self.check_names(&mut out);
        self.check_cycles(&mut out);
        self.check_alternatives(&mut out);

        debug!(diagnostics = out.len(), "Validation finished");
        out
    }

    fn check_injection_points(&self, out: &mut Diagnostics) {
        for (owner, point) in self.graph.injection_points() {
            let target = point.describe(owner.label());
            match (&point.resolution, point.kind) {
                (Some(Resolution::Unsatisfied), InjectionKind::Single) => {
                    out.push(
                        Diagnostic::unsatisfied(format!(
                            "Unsatisfied dependency for type {} and qualifiers [{}]",
                            point.required_type,
                            qualifier_list(point)
                        ))
                        .with_target(target),
                    );
                }
                (Some(Resolution::Ambiguous(ids)), InjectionKind::Single | InjectionKind::Optional) => {
                    out.push(
                        Diagnostic::ambiguous(format!(
                            "Ambiguous dependencies for type {} and qualifiers [{}]\n\t- available beans:{}",
                            point.required_type,
                            qualifier_list(point),
                            self.bean_list(ids)
                        ))
                        .with_target(target),
                    );
                }
                (_, InjectionKind::Metadata(kind)) => self.check_metadata(owner, point, kind, target, out),
                (_, InjectionKind::Delegate) if !matches!(owner, InjectionOwner::Decorator(_)) => {
                    out.push(
                        Diagnostic::definition("Delegate injection point declared outside a decorator")
                            .with_target(target),
                    );
                }
                _ => {}
            }
        }
    }

    fn check_metadata(
        &self,
        owner: InjectionOwner<'_>,
        point: &InjectionPoint,
        kind: MetadataKind,
        target: String,
        out: &mut Diagnostics,
    ) {
        let owner_bean = match owner {
            InjectionOwner::Observer(observer) => self.graph.bean(observer.declaring_bean.as_str()),
            other => other.bean(),
        };
        let argument = point.declared_type.arguments().first();
        match kind {
            MetadataKind::InjectionPoint => {
                if !owner_bean.is_some_and(BeanInfo::is_dependent) {
                    out.push(
                        Diagnostic::definition("Only Dependent beans may inject InjectionPoint metadata")
                            .with_target(target),
                    );
                }
            }
            MetadataKind::InterceptedBean => {
                if !matches!(owner, InjectionOwner::Interceptor(_)) {
                    out.push(
                        Diagnostic::definition("InterceptedBean metadata may only be injected into an interceptor")
                            .with_target(target),
                    );
                } else if !argument.map_or(true, is_unbounded) {
                    out.push(
                        Diagnostic::definition(format!(
                            "Invalid InterceptedBean type parameter {}: an interceptor may only inject InterceptedBean<?>",
                            point.declared_type
                        ))
                        .with_target(target),
                    );
                }
            }
            MetadataKind::Bean => {
                let own_class = owner_bean.map(|bean| &bean.bean_class);
                let valid = argument.map_or(true, |arg| {
                    is_unbounded(arg) || (arg.raw_name().is_some() && arg.raw_name() == own_class)
                });
                if !valid {
                    out.push(
                        Diagnostic::definition(format!(
                            "Invalid Bean metadata type {}: the type parameter must be the declaring bean class",
                            point.declared_type
                        ))
                        .with_target(target),
                    );
                }
            }
        }
    }

    fn check_interception(&self, out: &mut Diagnostics) {
        let hierarchy = self.graph.hierarchy();
        for bean in self.graph.beans().filter(|b| b.is_class_bean()) {
            let intercepted_methods: Vec<&str> = bean
                .methods
                .iter()
                .filter(|method| {
                    let bindings = chain::effective_bindings(bean, method, self.registry);
                    self.graph
                        .interceptors()
                        .iter()
                        .any(|i| i.intercepts(CallbackKind::AroundInvoke) && i.applies_to(&bindings, self.registry))
                })
                .map(|method| method.signature.as_str())
                .collect();
            let class_level = self
                .graph
                .interceptors()
                .iter()
                .any(|i| i.applies_to(&bean.interceptor_bindings, self.registry));
            let decorated = self
                .graph
                .decorators()
                .iter()
                .any(|d| d.applies_to(bean, self.registry, hierarchy));

            if (class_level || decorated || !intercepted_methods.is_empty()) && bean.traits.is_final {
                out.push(
                    Diagnostic::definition("Intercepted or decorated bean class must not be final")
                        .with_target(bean.id.as_str()),
                );
            }
            for method in bean
                .methods
                .iter()
                .filter(|m| m.is_final && intercepted_methods.contains(&m.signature.as_str()))
            {
                out.push(
                    Diagnostic::warning(
                        ErrorCategory::Definition,
                        format!("Final method {} of an intercepted bean is not intercepted", method.signature),
                    )
                    .with_target(bean.id.as_str()),
                );
            }
        }
    }

    fn check_proxyability(&self, out: &mut Diagnostics) {
        for bean in self.graph.beans().filter(|b| b.is_normal_scoped(self.registry)) {
            if bean.is_class_bean() {
                if let Some(reason) = bean.traits.unproxyable_reason() {
                    out.push(
                        Diagnostic::deployment(format!(
                            "Normal scoped bean class {} is not proxyable: {reason}",
                            bean.bean_class
                        ))
                        .with_target(bean.id.as_str()),
                    );
                } else if !bean.traits.has_no_arg_constructor {
                    out.push(
                        Diagnostic::definition(format!(
                            "Normal scoped bean class {} must declare a non-private no-args constructor",
                            bean.bean_class
                        ))
                        .with_target(bean.id.as_str()),
                    );
                }
            } else if bean.is_producer() {
                if let Some(reason) = bean.traits.unproxyable_reason() {
                    let ty = bean.implementation_type().map(ToString::to_string).unwrap_or_default();
                    out.push(
                        Diagnostic::deployment(format!(
                            "Normal scoped producer {} returns unproxyable type {ty}: {reason}",
                            bean.id
                        ))
                        .with_target(bean.id.as_str()),
                    );
                }
            }
        }
    }

    fn check_names(&self, out: &mut Diagnostics) {
        let mut by_name: BTreeMap<&str, usize> = BTreeMap::new();
        for name in self.graph.beans().filter(|b| b.is_enabled()).filter_map(|b| b.name.as_deref()) {
            *by_name.entry(name).or_default() += 1;
        }
        let resolver = self.graph.resolver(self.registry, &self.config.tie_break);
        for (name, _) in by_name.into_iter().filter(|(_, count)| *count > 1) {
            if let Resolution::Ambiguous(ids) = resolver.resolve_name(name) {
                out.push(
                    Diagnostic::deployment(format!("Ambiguous bean name {name}:{}", self.bean_list(&ids)))
                        .with_target(name),
                );
            }
        }
    }

    /// Reports reference cycles among beans that are created eagerly, without a client proxy.
    fn check_cycles(&self, out: &mut Diagnostics) {
        let edges = self.eager_edges();
        let mut reported: BTreeSet<Vec<&BeanId>> = BTreeSet::new();
        let mut done: BTreeSet<&BeanId> = BTreeSet::new();

        for start in edges.keys() {
            if done.contains(start) {
                continue;
            }
            let mut path: Vec<&BeanId> = Vec::new();
            let mut stack: Vec<(&BeanId, usize)> = vec![(start, 0)];
            while let Some((node, next)) = stack.pop() {
                if next == 0 {
                    path.push(node);
                }
                let targets = edges.get(node).map_or(&[][..], Vec::as_slice);
                if let Some(&target) = targets.get(next) {
                    stack.push((node, next + 1));
                    if let Some(at) = path.iter().position(|p| *p == target) {
                        let cycle: Vec<&BeanId> = path[at..].to_vec();
                        let mut key = cycle.clone();
                        key.sort();
                        if reported.insert(key) {
                            let mut rendered: Vec<&str> = cycle.iter().map(|id| id.as_str()).collect();
                            rendered.push(target.as_str());
                            out.push(
                                Diagnostic::deployment(format!(
                                    "Circular dependency between beans that cannot be proxied: {}",
                                    rendered.join(" -> ")
                                ))
                                .with_target(target.as_str()),
                            );
                        }
                    } else if !done.contains(&target) {
                        stack.push((target, 0));
                    }
                } else {
                    path.pop();
                    done.insert(node);
                }
            }
        }
    }

    fn eager_edges(&self) -> BTreeMap<&BeanId, Vec<&BeanId>> {
        let eager = |id: &BeanId| {
            self.graph
                .bean(id.as_str())
                .is_some_and(|bean| !bean.is_normal_scoped(self.registry))
        };
        let mut edges: BTreeMap<&BeanId, Vec<&BeanId>> = BTreeMap::new();
        for bean in self.graph.beans() {
            let mut targets: Vec<&BeanId> = bean
                .injection_points
                .iter()
                .filter(|p| matches!(p.kind, InjectionKind::Single | InjectionKind::Optional))
                .filter_map(|p| p.resolution.as_ref().and_then(Resolution::bean))
                .filter(|id| eager(id))
                .collect();
            if let Some(declaring) = bean.declaring_bean.as_ref().filter(|_| !bean.is_static) {
                if eager(declaring) {
                    targets.push(declaring);
                }
            }
            targets.dedup();
            edges.insert(&bean.id, targets);
        }
        edges
    }

    fn check_alternatives(&self, out: &mut Diagnostics) {
        for bean in self.graph.beans().filter(|b| b.alternative && b.priority.is_none()) {
            out.push(
                Diagnostic::warning(
                    ErrorCategory::Deployment,
                    "Alternative is not selected by a priority and is ignored",
                )
                .with_target(bean.id.as_str()),
            );
        }
    }

    fn bean_list(&self, ids: &[BeanId]) -> String {
        ids.iter()
            .map(|id| match self.graph.bean(id.as_str()) {
                Some(bean) => format!("\n\t\t- {bean}"),
                None => format!("\n\t\t- {id}"),
            })
            .collect()
    }
}

fn qualifier_list(point: &InjectionPoint) -> String {
    let qualifiers: Vec<String> = point.qualifiers.iter().map(ToString::to_string).collect();
    qualifiers.join(", ")
}

fn is_unbounded(ty: &TypeRef) -> bool {
    ty.is_object() || matches!(ty, TypeRef::Wildcard { upper_bound: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::{BeanKind, BusinessMethod};
    use crate::injection::InjectionTarget;
    use crate::interceptor::{InterceptorCallback, InterceptorInfo};
    use arbor_core::annotation::AnnotationInstance;
    use arbor_core::names::{self, ClassName};
    use arbor_core::RegistryBuilder;

    fn bean(id: &str, scope: &str) -> BeanInfo {
        let mut bean = BeanInfo::new(id, BeanKind::Class, id);
        bean.scope = ClassName::new(scope);
        bean.types = vec![TypeRef::class(id), TypeRef::object()];
        bean.qualifiers = vec![AnnotationInstance::new(names::DEFAULT), AnnotationInstance::new(names::ANY)];
        bean.traits.has_no_arg_constructor = true;
        bean
    }

    fn field(position: usize, ty: TypeRef, resolution: Option<Resolution>) -> InjectionPoint {
        let mut point = InjectionPoint::new(
            position,
            InjectionTarget::Field {
                name: format!("f{position}"),
            },
            ty,
            Vec::new(),
        );
        point.resolution = resolution;
        point
    }

    fn graph(beans: Vec<BeanInfo>) -> BeanGraph {
        let mut graph = BeanGraph::default();
        for (declaration, mut bean) in beans.into_iter().enumerate() {
            bean.declaration = declaration;
            graph.beans.insert(bean.id.clone(), bean);
        }
        graph
    }

    fn validate(graph: &BeanGraph) -> Diagnostics {
        let registry = Registry::builtin();
        Validator::new(graph, &registry, &BuildConfig::default()).validate()
    }

    #[test]
    fn test_unsatisfied_and_ambiguous_points() {
        let mut service = bean("acme.Service", names::SINGLETON);
        service
            .injection_points
            .push(field(0, TypeRef::class("acme.Missing"), Some(Resolution::Unsatisfied)));
        service.injection_points.push(field(
            1,
            TypeRef::class("acme.Greeter"),
            Some(Resolution::Ambiguous(vec![BeanId::new("acme.A"), BeanId::new("acme.B")])),
        ));
        service.injection_points.push(field(
            2,
            TypeRef::parameterized(names::INSTANCE, vec![TypeRef::class("acme.Missing")]),
            Some(Resolution::List(Vec::new())),
        ));
        let diagnostics = validate(&graph(vec![service, bean("acme.A", names::DEPENDENT), bean("acme.B", names::DEPENDENT)]));

        assert_eq!(diagnostics.count(ErrorCategory::UnsatisfiedResolution), 1);
        assert_eq!(diagnostics.count(ErrorCategory::AmbiguousResolution), 1);
        let ambiguous = diagnostics
            .iter()
            .find(|d| d.category == ErrorCategory::AmbiguousResolution)
            .unwrap();
        assert!(ambiguous.message.contains("CLASS bean [id=acme.A"));
        assert!(ambiguous.target.as_deref().unwrap().starts_with("acme.Service field f1"));
    }

    #[test]
    fn test_optional_point_may_be_unsatisfied() {
        let mut service = bean("acme.Service", names::SINGLETON);
        service.injection_points.push(field(
            0,
            TypeRef::parameterized(names::OPTIONAL, vec![TypeRef::class("acme.Missing")]),
            Some(Resolution::Unsatisfied),
        ));
        assert!(validate(&graph(vec![service])).is_empty());
    }

    #[test]
    fn test_injection_point_metadata_requires_dependent() {
        let mut singleton = bean("acme.Service", names::SINGLETON);
        singleton
            .injection_points
            .push(field(0, TypeRef::class(names::INJECTION_POINT), None));
        let mut dependent = bean("acme.Helper", names::DEPENDENT);
        dependent
            .injection_points
            .push(field(0, TypeRef::class(names::INJECTION_POINT), None));

        let diagnostics = validate(&graph(vec![singleton, dependent]));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.iter().next().unwrap().target.as_deref().unwrap().starts_with("acme.Service"));
    }

    #[test]
    fn test_intercepted_bean_metadata_wrong_type() {
        let mut interceptor_bean = bean("acme.Audit", names::DEPENDENT);
        interceptor_bean.injection_points.push(field(
            0,
            TypeRef::parameterized(names::INTERCEPTED_BEAN, vec![TypeRef::class("acme.Other")]),
            None,
        ));
        interceptor_bean.injection_points.push(field(
            1,
            TypeRef::parameterized(names::INTERCEPTED_BEAN, vec![TypeRef::wildcard()]),
            None,
        ));
        let mut graph = graph(Vec::new());
        graph.interceptors.push(InterceptorInfo {
            bean: interceptor_bean,
            bindings: vec![AnnotationInstance::new("acme.Audited")],
            priority: Some(1),
            callbacks: Vec::new(),
        });
        let mut plain = bean("acme.Plain", names::DEPENDENT);
        plain.injection_points.push(field(
            0,
            TypeRef::parameterized(names::INTERCEPTED_BEAN, vec![TypeRef::wildcard()]),
            None,
        ));
        graph.beans.insert(plain.id.clone(), plain);

        let diagnostics = validate(&graph);
        let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages.iter().any(|m| m.starts_with("InterceptedBean metadata may only")));
        assert!(messages.iter().any(|m| m.starts_with("Invalid InterceptedBean type parameter")));
    }

    #[test]
    fn test_bean_metadata_must_name_own_class() {
        let mut service = bean("acme.Service", names::DEPENDENT);
        service.injection_points.push(field(
            0,
            TypeRef::parameterized(names::BEAN, vec![TypeRef::class("acme.Service")]),
            None,
        ));
        service.injection_points.push(field(
            1,
            TypeRef::parameterized(names::BEAN, vec![TypeRef::class("acme.Other")]),
            None,
        ));
        let diagnostics = validate(&graph(vec![service]));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.iter().next().unwrap().target.as_deref().unwrap().contains("field f1"));
    }

    #[test]
    fn test_normal_scoped_proxyability() {
        let mut record = bean("acme.Point", names::APPLICATION_SCOPED);
        record.traits.is_final = true;
        record.traits.is_record = true;
        let mut no_ctor = bean("acme.NoCtor", names::REQUEST_SCOPED);
        no_ctor.traits.has_no_arg_constructor = false;
        let mut producer = BeanInfo::new("acme.Factory#point()", BeanKind::ProducerMethod, "acme.Factory");
        producer.scope = ClassName::new(names::APPLICATION_SCOPED);
        producer.types = vec![TypeRef::class("acme.Point")];
        producer.traits.is_final = true;
        producer.traits.is_record = true;
        let singleton_final = {
            let mut b = bean("acme.Final", names::SINGLETON);
            b.traits.is_final = true;
            b
        };

        let diagnostics = validate(&graph(vec![record, no_ctor, producer, singleton_final]));
        assert_eq!(diagnostics.count(ErrorCategory::Deployment), 2);
        assert_eq!(diagnostics.count(ErrorCategory::Definition), 1);
    }

    #[test]
    fn test_final_intercepted_class() {
        let registry = {
            let mut builder = RegistryBuilder::new().with_builtins();
            builder.register_interceptor_binding("acme.Logged", Vec::<String>::new());
            builder.build()
        };
        let mut target = bean("acme.Greeter", names::SINGLETON);
        target.traits.is_final = true;
        target.methods.push(BusinessMethod {
            name: "greet".to_string(),
            signature: "greet()".to_string(),
            bindings: vec![AnnotationInstance::new("acme.Logged")],
            exceptions: Vec::new(),
            is_final: false,
            declared_by: ClassName::new("acme.Greeter"),
        });
        let mut graph = graph(vec![target]);
        graph.interceptors.push(InterceptorInfo {
            bean: bean("acme.LogInterceptor", names::DEPENDENT),
            bindings: vec![AnnotationInstance::new("acme.Logged")],
            priority: Some(2000),
            callbacks: vec![InterceptorCallback {
                kind: CallbackKind::AroundInvoke,
                method: "log".to_string(),
            }],
        });
        let diagnostics = Validator::new(&graph, &registry, &BuildConfig::default()).validate();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.iter().next().unwrap().message,
            "Intercepted or decorated bean class must not be final"
        );
    }

    #[test]
    fn test_ambiguous_names() {
        let mut a = bean("acme.A", names::DEPENDENT);
        a.name = Some("shared".to_string());
        let mut b = bean("acme.B", names::DEPENDENT);
        b.name = Some("shared".to_string());
        let mut c = bean("acme.C", names::DEPENDENT);
        c.name = Some("other".to_string());
        let diagnostics = validate(&graph(vec![a, b, c]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.iter().next().unwrap().target.as_deref(), Some("shared"));
    }

    #[test]
    fn test_dependent_cycle_is_reported_once() {
        let mut a = bean("acme.A", names::DEPENDENT);
        a.injection_points
            .push(field(0, TypeRef::class("acme.B"), Some(Resolution::Resolved(BeanId::new("acme.B")))));
        let mut b = bean("acme.B", names::SINGLETON);
        b.injection_points
            .push(field(0, TypeRef::class("acme.A"), Some(Resolution::Resolved(BeanId::new("acme.A")))));
        let diagnostics = validate(&graph(vec![a, b]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.iter().next().unwrap().message,
            "Circular dependency between beans that cannot be proxied: acme.A -> acme.B -> acme.A"
        );
    }

    #[test]
    fn test_cycle_through_normal_scope_is_allowed() {
        let mut a = bean("acme.A", names::DEPENDENT);
        a.injection_points
            .push(field(0, TypeRef::class("acme.B"), Some(Resolution::Resolved(BeanId::new("acme.B")))));
        let mut b = bean("acme.B", names::APPLICATION_SCOPED);
        b.injection_points
            .push(field(0, TypeRef::class("acme.A"), Some(Resolution::Resolved(BeanId::new("acme.A")))));
        assert!(validate(&graph(vec![a, b])).is_empty());
    }

    #[test]
    fn test_producer_depends_on_declaring_bean() {
        let mut factory = bean("acme.Factory", names::SINGLETON);
        factory.injection_points.push(field(
            0,
            TypeRef::class("acme.Widget"),
            Some(Resolution::Resolved(BeanId::new("acme.Factory#widget()"))),
        ));
        let mut producer = BeanInfo::new("acme.Factory#widget()", BeanKind::ProducerMethod, "acme.Factory");
        producer.declaring_bean = Some(BeanId::new("acme.Factory"));
        let diagnostics = validate(&graph(vec![factory, producer]));
        assert_eq!(diagnostics.count(ErrorCategory::Deployment), 1);
    }

    #[test]
    fn test_unselected_alternative_warns() {
        let mut mock = bean("acme.Mock", names::DEPENDENT);
        mock.alternative = true;
        let diagnostics = validate(&graph(vec![mock]));
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics.has_fatal());
    }
}
