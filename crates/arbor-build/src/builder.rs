//! Bean discovery.
//!
//! [`BeanGraphBuilder`] walks the component index once and turns every
//! bean-defining class into graph nodes: the class bean itself, its producer
//! methods and fields, disposers, observer methods, and interceptor or
//! decorator nodes. Synthetic beans contributed by extensions are added
//! last. Definition problems are collected on the graph; discovery never
//! stops at the first one.

use crate::bean::{BeanId, BeanInfo, BeanKind, BusinessMethod, DisposerInfo, TypeTraits};
use crate::extension::SyntheticBean;
use crate::graph::{BeanGraph, TypeHierarchy};
use crate::injection::{InjectionPoint, InjectionTarget};
use crate::interceptor::{CallbackKind, DecoratorInfo, InterceptorCallback, InterceptorInfo};
use crate::observer::{ObserverInfo, DEFAULT_OBSERVER_PRIORITY};
use arbor_config::BuildConfig;
use arbor_core::annotation::{self, AnnotationInstance};
use arbor_core::diagnostic::Diagnostic;
use arbor_core::index::{ClassInfo, ClassKind, FieldInfo, IndexView, MethodInfo};
use arbor_core::names::{self, ClassName};
use arbor_core::registry::{Registry, StereotypeDescriptor};
use arbor_core::types::TypeRef;
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, trace};

/// Builds a [`BeanGraph`] from a component index.
pub struct BeanGraphBuilder<'a> {
    index: &'a dyn IndexView,
    registry: &'a Registry,
    config: &'a BuildConfig,
    vetoed: Vec<ClassName>,
    graph: BeanGraph,
    declaration: usize,
}

impl<'a> BeanGraphBuilder<'a> {
    /// Creates a builder over the index.
    pub fn new(index: &'a dyn IndexView, registry: &'a Registry, config: &'a BuildConfig) -> Self {
        Self {
            index,
            registry,
            config,
            vetoed: Vec::new(),
            graph: BeanGraph::default(),
            declaration: 0,
        }
    }

    /// Excludes a class from discovery.
    #[must_use]
    pub fn veto(mut self, class: impl Into<ClassName>) -> Self {
        self.vetoed.push(class.into());
        self
    }

    /// Excludes several classes from discovery.
    #[must_use]
    pub fn veto_all(mut self, classes: impl IntoIterator<Item = ClassName>) -> Self {
        self.vetoed.extend(classes);
        self
    }

    /// Discovers every bean in the index, then adds the synthetic beans.
    #[must_use]
    pub fn build(mut self, synthetic: Vec<SyntheticBean>) -> BeanGraph {
        self.graph.hierarchy = TypeHierarchy::from_index(self.index);

        let index = self.index;
        self.report_displaced();
        for class in index.classes() {
            if self.is_skipped(class) || !self.is_bean_defining(class) {
                continue;
            }
            if class.has(names::INTERCEPTOR) {
                self.discover_interceptor(class);
            } else if class.has(names::DECORATOR) {
                self.discover_decorator(class);
            } else {
                self.discover_class(class);
            }
        }
        for bean in synthetic {
            self.add_synthetic(bean);
        }

        debug!(
            beans = self.graph.beans.len(),
            interceptors = self.graph.interceptors.len(),
            decorators = self.graph.decorators.len(),
            observers = self.graph.observers.len(),
            diagnostics = self.graph.diagnostics.len(),
            "Bean discovery finished"
        );
        self.graph
    }

    fn next_declaration(&mut self) -> usize {
        let declaration = self.declaration;
        self.declaration += 1;
        declaration
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.graph.diagnostics.push(diagnostic);
    }

    fn report_displaced(&mut self) {
        let index = self.index;
        let mut reported = BTreeSet::new();
        for displaced in index.displaced() {
            let current = index.class(&displaced.name);
            let defines_bean = |class: &ClassInfo| !self.is_skipped(class) && self.is_bean_defining(class);
            if !(defines_bean(displaced) || current.is_some_and(defines_bean)) {
                continue;
            }
            if reported.insert(displaced.name.clone()) {
                self.report(
                    Diagnostic::deployment(format!(
                        "Duplicate bean definition: {} is declared by more than one component",
                        displaced.name
                    ))
                    .with_target(displaced.name.as_str()),
                );
            }
        }
    }

    fn is_duplicate(&mut self, id: &BeanId) -> bool {
        if !self.graph.beans.contains_key(id) {
            return false;
        }
        self.report(Diagnostic::deployment(format!("Duplicate bean definition: {id}")).with_target(id.as_str()));
        true
    }

    fn is_skipped(&self, class: &ClassInfo) -> bool {
        class.is_interface()
            || class.is_annotation()
            || class.kind == ClassKind::Enum
            || class.has(names::VETOED)
            || self.vetoed.contains(&class.name)
            || self.config.is_excluded(class.name.as_str())
            || (class.is_abstract && !class.has(names::DECORATOR))
    }

    fn is_bean_defining(&self, class: &ClassInfo) -> bool {
        let registry = self.registry;
        class.annotations.iter().any(|a| {
            let name = a.name.as_str();
            registry.is_scope(name) || registry.is_stereotype(name) || a.is(names::INTERCEPTOR) || a.is(names::DECORATOR)
        }) || class.methods.iter().any(|m| {
            m.has(names::PRODUCES)
                || m.has_parameter_annotated(names::OBSERVES)
                || m.has_parameter_annotated(names::OBSERVES_ASYNC)
        }) || class.fields.iter().any(|f| f.has(names::PRODUCES))
    }

    // Class beans

    fn discover_class(&mut self, class: &'a ClassInfo) {
        let bean = self.class_bean(class);
        let id = bean.id.clone();
        if self.is_duplicate(&id) {
            return;
        }
        debug!(bean = %id, scope = %bean.scope, "Class bean discovered");
        self.graph.beans.insert(id.clone(), bean);

        let producers = self.discover_producers(class, &id);
        self.discover_disposers(class, &producers);
        self.discover_observers(class, &id);
    }

    fn class_bean(&mut self, class: &'a ClassInfo) -> BeanInfo {
        let declaration = self.next_declaration();
        let stereotypes = self.stereotypes_of(&class.annotations);
        let mut bean = BeanInfo::new(&class.name, BeanKind::Class, &class.name);
        bean.declaration = declaration;
        bean.scope = self.scope_of(class.name.as_str(), &class.annotations, &stereotypes, Some(class));

        let mut qualifiers = self.qualifiers_of(&class.annotations);
        bean.name = apply_name(&mut qualifiers, &stereotypes, || class.name.decapitalized());
        bean.qualifiers = normalize_qualifiers(qualifiers);

        bean.alternative = class.has(names::ALTERNATIVE) || stereotypes.iter().any(|s| s.alternative);
        bean.priority = priority_of(&class.annotations).or_else(|| stereotypes.iter().find_map(|s| s.priority));
        bean.default_bean = class.has(names::DEFAULT_BEAN);
        bean.unremovable = class.has(names::UNREMOVABLE);
        bean.stereotypes = stereotypes.iter().map(|s| s.name.clone()).collect();

        let closure = self.type_closure(class.as_type());
        bean.types = self.restrict_types(class.name.as_str(), closure, class.annotation(names::TYPED));
        bean.interceptor_bindings = self.bindings_of(&class.annotations, &stereotypes);
        bean.methods = self.business_methods(class);
        bean.post_construct = self.lifecycle_callbacks(class, names::POST_CONSTRUCT);
        bean.pre_destroy = self.lifecycle_callbacks(class, names::PRE_DESTROY);
        bean.injection_points = self.class_injection_points(class);
        bean.traits = TypeTraits {
            is_final: class.is_final || class.kind == ClassKind::Record,
            is_record: class.kind == ClassKind::Record,
            is_primitive: false,
            is_array: false,
            has_no_arg_constructor: class.has_no_arg_constructor(),
        };
        bean
    }

    fn stereotypes_of(&self, annotations: &[AnnotationInstance]) -> Vec<&'a StereotypeDescriptor> {
        let registry = self.registry;
        let mut expanded: Vec<&'a StereotypeDescriptor> = Vec::new();
        for annotation in annotations.iter().filter(|a| registry.is_stereotype(a.name.as_str())) {
            for stereotype in registry.expand_stereotype(annotation.name.as_str()) {
                if !expanded.iter().any(|s| s.name == stereotype.name) {
                    expanded.push(stereotype);
                }
            }
        }
        expanded
    }

    fn scope_of(
        &mut self,
        owner: &str,
        annotations: &[AnnotationInstance],
        stereotypes: &[&StereotypeDescriptor],
        class: Option<&'a ClassInfo>,
    ) -> ClassName {
        let registry = self.registry;
        let declared: Vec<&ClassName> = annotations
            .iter()
            .filter(|a| registry.is_scope(a.name.as_str()))
            .map(|a| &a.name)
            .collect();
        match declared.as_slice() {
            [scope] => return (*scope).clone(),
            [first, ..] => {
                let first = (*first).clone();
                let listed: Vec<&str> = declared.iter().map(|s| s.as_str()).collect();
                self.report(
                    Diagnostic::definition(format!("Multiple scopes declared: [{}]", listed.join(", ")))
                        .with_target(owner),
                );
                return first;
            }
            [] => {}
        }

        let defaults: BTreeSet<&ClassName> = stereotypes.iter().filter_map(|s| s.default_scope.as_ref()).collect();
        if defaults.len() > 1 {
            let listed: Vec<&str> = defaults.iter().map(|s| s.as_str()).collect();
            self.report(
                Diagnostic::definition(format!(
                    "Stereotypes declare conflicting default scopes: [{}]",
                    listed.join(", ")
                ))
                .with_target(owner),
            );
        }
        if let Some(scope) = defaults.into_iter().next() {
            return scope.clone();
        }

        class
            .and_then(|class| self.inherited_scope(class))
            .unwrap_or_else(|| ClassName::new(names::DEPENDENT))
    }

    fn inherited_scope(&self, class: &'a ClassInfo) -> Option<ClassName> {
        self.class_chain(class).into_iter().skip(1).find_map(|ancestor| {
            ancestor
                .annotations
                .iter()
                .find(|a| self.registry.scope(a.name.as_str()).is_some_and(|s| s.inherited))
                .map(|a| a.name.clone())
        })
    }

    fn qualifiers_of(&self, annotations: &[AnnotationInstance]) -> Vec<AnnotationInstance> {
        annotations
            .iter()
            .filter(|a| self.registry.is_qualifier(a.name.as_str()))
            .cloned()
            .collect()
    }

    fn bindings_of(
        &self,
        annotations: &[AnnotationInstance],
        stereotypes: &[&StereotypeDescriptor],
    ) -> Vec<AnnotationInstance> {
        let mut bindings: Vec<AnnotationInstance> = annotations
            .iter()
            .filter(|a| self.registry.is_interceptor_binding(a.name.as_str()))
            .cloned()
            .collect();
        for binding in stereotypes.iter().flat_map(|s| &s.interceptor_bindings) {
            if !bindings.iter().any(|b| self.registry.binding_equals(b, binding)) {
                bindings.push(binding.clone());
            }
        }
        bindings
    }

    /// Returns the class followed by its indexed superclasses.
    fn class_chain(&self, class: &'a ClassInfo) -> Vec<&'a ClassInfo> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(parent) = current
            .super_type
            .as_ref()
            .and_then(TypeRef::raw_name)
            .and_then(|raw| self.index.class(raw))
        {
            if chain.iter().any(|c| c.name == parent.name) {
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn type_closure(&self, root: TypeRef) -> Vec<TypeRef> {
        let mut types: Vec<TypeRef> = Vec::new();
        let mut pending = VecDeque::from([root]);
        while let Some(ty) = pending.pop_front() {
            if ty.is_object() || types.contains(&ty) {
                continue;
            }
            if let Some(class) = ty.raw_name().and_then(|raw| self.index.class(raw)) {
                let bindings: Vec<(String, TypeRef)> = class
                    .type_parameters
                    .iter()
                    .cloned()
                    .zip(ty.arguments().iter().cloned())
                    .collect();
                pending.extend(
                    class
                        .super_type
                        .iter()
                        .chain(&class.interfaces)
                        .map(|parent| parent.substitute(&bindings)),
                );
            }
            types.push(ty);
        }
        types.push(TypeRef::object());
        types
    }

    fn restrict_types(&mut self, owner: &str, types: Vec<TypeRef>, typed: Option<&AnnotationInstance>) -> Vec<TypeRef> {
        let Some(typed) = typed else {
            return types;
        };
        let mut restricted = Vec::new();
        for listed in typed.classes("value") {
            match types.iter().find(|ty| ty.raw_name() == listed.raw_name()) {
                Some(ty) if !restricted.contains(ty) => restricted.push(ty.clone()),
                Some(_) => {}
                None => self.report(
                    Diagnostic::definition(format!("Typed lists {listed}, which is not a bean type")).with_target(owner),
                ),
            }
        }
        if !restricted.iter().any(TypeRef::is_object) {
            restricted.push(TypeRef::object());
        }
        restricted
    }

    fn business_methods(&mut self, class: &'a ClassInfo) -> Vec<BusinessMethod> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut methods = Vec::new();
        for declaring in self.class_chain(class) {
            for method in declaring.business_methods().filter(|m| !m.is_static) {
                let signature = method.signature();
                if !seen.insert(signature.clone()) {
                    continue;
                }
                let bindings: Vec<AnnotationInstance> = method
                    .annotations
                    .iter()
                    .filter(|a| self.registry.is_interceptor_binding(a.name.as_str()))
                    .cloned()
                    .collect();
                if method.is_private {
                    if !bindings.is_empty() {
                        self.report(
                            Diagnostic::warning(
                                arbor_core::ErrorCategory::Definition,
                                format!("Interceptor bindings on private method {signature} are ignored"),
                            )
                            .with_target(class.name.as_str()),
                        );
                    }
                    continue;
                }
                methods.push(BusinessMethod {
                    name: method.name.clone(),
                    signature,
                    bindings,
                    exceptions: method.exceptions.clone(),
                    is_final: method.is_final,
                    declared_by: declaring.name.clone(),
                });
            }
        }
        methods
    }

    fn lifecycle_callbacks(&self, class: &'a ClassInfo, annotation: &str) -> Vec<String> {
        let mut callbacks: Vec<String> = Vec::new();
        for declaring in self.class_chain(class).into_iter().rev() {
            for method in declaring.business_methods().filter(|m| m.has(annotation)) {
                if !callbacks.contains(&method.name) {
                    callbacks.push(method.name.clone());
                }
            }
        }
        callbacks
    }

    fn class_injection_points(&mut self, class: &'a ClassInfo) -> Vec<InjectionPoint> {
        let mut points = Vec::new();

        let injected: Vec<&MethodInfo> = class.constructors().filter(|c| c.has(names::INJECT)).collect();
        if injected.len() > 1 {
            self.report(
                Diagnostic::definition("Multiple constructors annotated with Inject").with_target(class.name.as_str()),
            );
        }
        if let Some(constructor) = injected.first() {
            for (parameter, param) in constructor.parameters.iter().enumerate() {
                let target = InjectionTarget::Constructor { parameter };
                points.push(self.point(points.len(), target, &param.ty, &param.annotations));
            }
        }

        let chain = self.class_chain(class);
        for declaring in chain.iter().rev() {
            for field in declaring.fields.iter().filter(|f| f.has(names::INJECT) && !f.is_static) {
                let target = InjectionTarget::Field {
                    name: field.name.clone(),
                };
                points.push(self.point(points.len(), target, &field.ty, &field.annotations));
            }
        }
        for declaring in chain.iter().rev() {
            for method in declaring
                .business_methods()
                .filter(|m| m.has(names::INJECT) && !m.is_static)
            {
                let signature = method.signature();
                for (parameter, param) in method.parameters.iter().enumerate() {
                    let target = InjectionTarget::Initializer {
                        method: signature.clone(),
                        parameter,
                    };
                    points.push(self.point(points.len(), target, &param.ty, &param.annotations));
                }
            }
        }
        points
    }

    fn point(
        &self,
        position: usize,
        target: InjectionTarget,
        ty: &TypeRef,
        annotations: &[AnnotationInstance],
    ) -> InjectionPoint {
        let qualifiers = self.qualifiers_of(annotations);
        if annotation::has(annotations, names::DELEGATE) {
            InjectionPoint::delegate(position, target, ty.clone(), qualifiers)
        } else {
            InjectionPoint::new(position, target, ty.clone(), qualifiers)
        }
    }

    fn method_points(
        &self,
        method: &MethodInfo,
        skip: Option<usize>,
        target: impl Fn(usize) -> InjectionTarget,
    ) -> Vec<InjectionPoint> {
        let mut points = Vec::new();
        for (parameter, param) in method.parameters.iter().enumerate() {
            if Some(parameter) == skip {
                continue;
            }
            points.push(self.point(points.len(), target(parameter), &param.ty, &param.annotations));
        }
        points
    }

    // Producers and disposers

    fn discover_producers(&mut self, class: &'a ClassInfo, declaring: &BeanId) -> Vec<BeanId> {
        let (declaring_alternative, declaring_priority) = self
            .graph
            .beans
            .get(declaring)
            .map_or((false, None), |b| (b.alternative, b.priority));
        let mut producers = Vec::new();

        for method in class.business_methods().filter(|m| m.has(names::PRODUCES)) {
            let signature = method.signature();
            let owner = format!("{}#{signature}", class.name);
            if method.has_parameter_annotated(names::DISPOSES)
                || method.has_parameter_annotated(names::OBSERVES)
                || method.has_parameter_annotated(names::OBSERVES_ASYNC)
            {
                self.report(
                    Diagnostic::definition("Producer method cannot also be a disposer or observer method")
                        .with_target(owner),
                );
                continue;
            }
            let Some(return_type) = self.producer_type(&owner, method.return_type.as_ref()) else {
                continue;
            };
            let mut bean = self.producer_bean(
                owner,
                BeanKind::ProducerMethod,
                class,
                declaring,
                &method.annotations,
                return_type,
                || property_name(&method.name),
            );
            bean.member = Some(signature.clone());
            bean.is_static = method.is_static;
            bean.alternative |= declaring_alternative;
            if bean.priority.is_none() {
                bean.priority = declaring_priority;
            }
            bean.injection_points = self.method_points(method, None, |parameter| InjectionTarget::ProducerParameter {
                method: signature.clone(),
                parameter,
            });
            producers.extend(self.insert_producer(bean));
        }

        for field in class.fields.iter().filter(|f| f.has(names::PRODUCES)) {
            let owner = format!("{}#{}", class.name, field.name);
            let Some(ty) = self.producer_type(&owner, Some(&field.ty)) else {
                continue;
            };
            let mut bean = self.producer_bean(
                owner,
                BeanKind::ProducerField,
                class,
                declaring,
                &field.annotations,
                ty,
                || field.name.clone(),
            );
            bean.member = Some(field.name.clone());
            bean.is_static = field.is_static;
            bean.alternative |= declaring_alternative;
            if bean.priority.is_none() {
                bean.priority = declaring_priority;
            }
            producers.extend(self.insert_producer(bean));
        }
        producers
    }

    fn producer_type(&mut self, owner: &str, ty: Option<&TypeRef>) -> Option<TypeRef> {
        let problem = match ty {
            None => Some("Producer method has a void return type"),
            Some(TypeRef::Variable { .. }) => Some("Producer type must not be a type variable"),
            Some(TypeRef::Wildcard { .. }) => Some("Producer type must not be a wildcard"),
            Some(ty) if ty.arguments().iter().any(|a| matches!(a, TypeRef::Wildcard { .. })) => {
                Some("Producer type must not contain a wildcard type argument")
            }
            Some(_) => None,
        };
        if let Some(problem) = problem {
            self.report(Diagnostic::definition(problem).with_target(owner));
            return None;
        }
        ty.cloned()
    }

    #[allow(clippy::too_many_arguments)]
    fn producer_bean(
        &mut self,
        id: String,
        kind: BeanKind,
        class: &'a ClassInfo,
        declaring: &BeanId,
        annotations: &[AnnotationInstance],
        ty: TypeRef,
        default_name: impl FnOnce() -> String,
    ) -> BeanInfo {
        let declaration = self.next_declaration();
        let stereotypes = self.stereotypes_of(annotations);
        let mut bean = BeanInfo::new(id.as_str(), kind, &class.name);
        bean.declaration = declaration;
        bean.declaring_bean = Some(declaring.clone());
        bean.scope = self.scope_of(&id, annotations, &stereotypes, None);

        let mut qualifiers = self.qualifiers_of(annotations);
        bean.name = apply_name(&mut qualifiers, &stereotypes, default_name);
        bean.qualifiers = normalize_qualifiers(qualifiers);
        bean.alternative =
            annotation::has(annotations, names::ALTERNATIVE) || stereotypes.iter().any(|s| s.alternative);
        bean.priority = priority_of(annotations).or_else(|| stereotypes.iter().find_map(|s| s.priority));
        bean.default_bean = annotation::has(annotations, names::DEFAULT_BEAN);
        bean.unremovable = annotation::has(annotations, names::UNREMOVABLE);
        bean.stereotypes = stereotypes.iter().map(|s| s.name.clone()).collect();
        bean.traits = self.traits_of(&ty);

        let closure = self.type_closure(ty);
        bean.types = self.restrict_types(&id, closure, annotation::find(annotations, names::TYPED));
        bean
    }

    fn traits_of(&self, ty: &TypeRef) -> TypeTraits {
        let class = ty.raw_name().and_then(|raw| self.index.class(raw));
        TypeTraits {
            is_final: class.is_some_and(|c| c.is_final || c.kind == ClassKind::Record),
            is_record: class.is_some_and(|c| c.kind == ClassKind::Record),
            is_primitive: ty.is_primitive(),
            is_array: ty.is_array(),
            has_no_arg_constructor: class.map_or(true, |c| c.is_interface() || c.has_no_arg_constructor()),
        }
    }

    fn insert_producer(&mut self, bean: BeanInfo) -> Option<BeanId> {
        let id = bean.id.clone();
        if self.is_duplicate(&id) {
            return None;
        }
        debug!(bean = %id, kind = bean.kind.label(), scope = %bean.scope, "Producer discovered");
        self.graph.beans.insert(id.clone(), bean);
        Some(id)
    }

    fn discover_disposers(&mut self, class: &'a ClassInfo, producers: &[BeanId]) {
        for method in class
            .business_methods()
            .filter(|m| m.has_parameter_annotated(names::DISPOSES))
        {
            let signature = method.signature();
            let owner = format!("{}#{signature}", class.name);
            let disposed: Vec<usize> = method
                .parameters
                .iter()
                .enumerate()
                .filter(|(_, p)| p.has(names::DISPOSES))
                .map(|(i, _)| i)
                .collect();
            let [position] = disposed.as_slice() else {
                self.report(
                    Diagnostic::definition("Disposer method must declare exactly one disposed parameter")
                        .with_target(owner),
                );
                continue;
            };
            let position = *position;
            let param = &method.parameters[position];
            let qualifiers = self.qualifiers_of(&param.annotations);
            let qualifiers = if qualifiers.is_empty() {
                vec![AnnotationInstance::new(names::DEFAULT)]
            } else {
                qualifiers
            };

            let hierarchy = &self.graph.hierarchy;
            let registry = self.registry;
            let matching: Vec<BeanId> = producers
                .iter()
                .filter_map(|id| self.graph.beans.get(id))
                .filter(|producer| {
                    producer
                        .types
                        .iter()
                        .any(|ty| param.ty.matches(ty, |a, b| hierarchy.is_subtype(a, b)))
                        && qualifiers.iter().all(|q| registry.has_qualifier(&producer.qualifiers, q))
                })
                .map(|producer| producer.id.clone())
                .collect();
            if matching.is_empty() {
                self.report(
                    Diagnostic::definition("No producer declared by the bean class matches the disposed parameter")
                        .with_target(owner),
                );
                continue;
            }

            let injection_points = self.method_points(method, Some(position), |parameter| {
                InjectionTarget::DisposerParameter {
                    method: signature.clone(),
                    parameter,
                }
            });
            for id in matching {
                let Some(producer) = self.graph.beans.get_mut(&id) else {
                    continue;
                };
                if producer.disposer.is_some() {
                    self.graph.diagnostics.push(
                        Diagnostic::definition(format!("Multiple disposer methods found for {id}"))
                            .with_target(owner.as_str()),
                    );
                    continue;
                }
                producer.disposer = Some(DisposerInfo {
                    method: method.name.clone(),
                    signature: signature.clone(),
                    disposed_position: position,
                    injection_points: injection_points.clone(),
                });
                trace!(bean = %id, disposer = %signature, "Disposer matched");
            }
        }
    }

    // Observers

    fn discover_observers(&mut self, class: &'a ClassInfo, declaring: &BeanId) {
        for method in class.business_methods().filter(|m| {
            m.has_parameter_annotated(names::OBSERVES) || m.has_parameter_annotated(names::OBSERVES_ASYNC)
        }) {
            let signature = method.signature();
            let id = format!("{}#{signature}", class.name);
            let observed: Vec<usize> = method
                .parameters
                .iter()
                .enumerate()
                .filter(|(_, p)| p.has(names::OBSERVES) || p.has(names::OBSERVES_ASYNC))
                .map(|(i, _)| i)
                .collect();
            let [position] = observed.as_slice() else {
                self.report(
                    Diagnostic::definition("Observer method must declare exactly one observed parameter").with_target(id),
                );
                continue;
            };
            let position = *position;
            let param = &method.parameters[position];
            let priority = priority_of(&param.annotations)
                .or_else(|| priority_of(&method.annotations))
                .unwrap_or(DEFAULT_OBSERVER_PRIORITY);
            let injection_points = self.method_points(method, Some(position), |parameter| {
                InjectionTarget::ObserverParameter {
                    method: signature.clone(),
                    parameter,
                }
            });

            debug!(observer = %id, event = %param.ty, priority, "Observer discovered");
            let declaration = self.next_declaration();
            self.graph.observers.push(ObserverInfo {
                id,
                declaring_bean: declaring.clone(),
                method: signature,
                observed_type: param.ty.clone(),
                qualifiers: self.qualifiers_of(&param.annotations),
                event_position: position,
                priority,
                is_async: param.has(names::OBSERVES_ASYNC),
                is_static: method.is_static,
                injection_points,
                declaration,
            });
        }
    }

    // Interceptors and decorators

    fn discover_interceptor(&mut self, class: &'a ClassInfo) {
        let mut bean = self.class_bean(class);
        let id = bean.id.clone();
        self.require_dependent(&bean, "Interceptor");
        self.reject_bean_members(class, "Interceptor");

        let bindings = std::mem::take(&mut bean.interceptor_bindings);
        if bindings.is_empty() {
            self.report(
                Diagnostic::definition("Interceptor declares no interceptor binding").with_target(id.as_str()),
            );
        }
        if bean.priority.is_none() {
            self.report(
                Diagnostic::definition("Interceptor declares no priority and is never enabled").with_target(id.as_str()),
            );
        }

        let callbacks = self.interceptor_callbacks(class);

        debug!(interceptor = %id, priority = ?bean.priority, "Interceptor discovered");
        let priority = bean.priority;
        self.graph.interceptors.push(InterceptorInfo {
            bean,
            bindings,
            priority,
            callbacks,
        });
    }

    /// Interceptor methods of every kind, superclass first. A method
    /// overridden further down the hierarchy is not an interceptor method.
    fn interceptor_callbacks(&mut self, class: &'a ClassInfo) -> Vec<InterceptorCallback> {
        let chain = self.class_chain(class);
        let mut callbacks = Vec::new();
        for kind in CallbackKind::ALL {
            for (depth, declaring) in chain.iter().enumerate().rev() {
                let declared: Vec<&MethodInfo> =
                    declaring.business_methods().filter(|m| m.has(kind.annotation())).collect();
                if declared.len() > 1 {
                    self.report(
                        Diagnostic::definition(format!(
                            "Interceptor class declares more than one {} method",
                            kind.annotation()
                        ))
                        .with_target(declaring.name.as_str()),
                    );
                }
                let overridden = |m: &MethodInfo| {
                    chain[..depth]
                        .iter()
                        .any(|sub| sub.business_methods().any(|o| o.signature() == m.signature()))
                };
                callbacks.extend(declared.into_iter().filter(|m| !overridden(*m)).map(|m| InterceptorCallback {
                    kind,
                    method: m.name.clone(),
                }));
            }
        }
        callbacks
    }

    fn discover_decorator(&mut self, class: &'a ClassInfo) {
        let bean = self.class_bean(class);
        let id = bean.id.clone();
        self.require_dependent(&bean, "Decorator");
        self.reject_bean_members(class, "Decorator");

        let delegates: Vec<&InjectionPoint> = bean.injection_points.iter().filter(|p| p.is_delegate()).collect();
        let [delegate] = delegates.as_slice() else {
            self.report(
                Diagnostic::definition(format!(
                    "Decorator must declare exactly one delegate injection point, found {}",
                    delegates.len()
                ))
                .with_target(id.as_str()),
            );
            return;
        };
        let delegate_position = delegate.position;
        let delegate_type = delegate.required_type.clone();
        let delegate_qualifiers = delegate.qualifiers.clone();

        let decorated_types: Vec<TypeRef> = bean
            .types
            .iter()
            .filter(|ty| {
                !ty.is_object()
                    && ty
                        .raw_name()
                        .and_then(|raw| self.index.class(raw))
                        .is_some_and(ClassInfo::is_interface)
            })
            .cloned()
            .collect();
        if decorated_types.is_empty() {
            self.report(Diagnostic::definition("Decorator has no decorated types").with_target(id.as_str()));
            return;
        }

        let delegate_raw = delegate_type.raw_name().cloned();
        for decorated in &decorated_types {
            let implemented = match (&delegate_raw, decorated.raw_name()) {
                (Some(delegate), Some(decorated)) => self.graph.hierarchy.is_subtype(delegate, decorated),
                _ => false,
            };
            if !implemented {
                self.report(
                    Diagnostic::definition(format!(
                        "Delegate type {delegate_type} does not implement decorated type {decorated}"
                    ))
                    .with_target(id.as_str()),
                );
            }
        }

        let chain = self.class_chain(class);
        let mut decorated_methods: Vec<String> = Vec::new();
        for decorated in decorated_types.iter().filter_map(|ty| ty.raw_name()) {
            let Some(interface) = self.index.class(decorated) else {
                continue;
            };
            for method in interface.business_methods().filter(|m| !m.is_static) {
                let signature = method.signature();
                let implemented = chain
                    .iter()
                    .flat_map(|c| c.business_methods())
                    .any(|m| !m.is_abstract && m.signature() == signature);
                if implemented && !decorated_methods.contains(&signature) {
                    decorated_methods.push(signature);
                }
            }
        }

        if bean.priority.is_none() {
            self.report(
                Diagnostic::warning(
                    arbor_core::ErrorCategory::Definition,
                    "Decorator declares no priority and is never enabled",
                )
                .with_target(id.as_str()),
            );
        }

        debug!(decorator = %id, priority = ?bean.priority, "Decorator discovered");
        let priority = bean.priority;
        self.graph.decorators.push(DecoratorInfo {
            bean,
            delegate_position,
            delegate_type,
            delegate_qualifiers,
            decorated_types,
            decorated_methods,
            priority,
        });
    }

    fn require_dependent(&mut self, bean: &BeanInfo, what: &str) {
        if !bean.is_dependent() {
            self.report(
                Diagnostic::definition(format!("{what} must be Dependent, declares {}", bean.scope))
                    .with_target(bean.id.as_str()),
            );
        }
    }

    fn reject_bean_members(&mut self, class: &ClassInfo, what: &str) {
        let declares = class.methods.iter().any(|m| {
            m.has(names::PRODUCES)
                || m.has_parameter_annotated(names::DISPOSES)
                || m.has_parameter_annotated(names::OBSERVES)
                || m.has_parameter_annotated(names::OBSERVES_ASYNC)
        }) || class.fields.iter().any(|f: &FieldInfo| f.has(names::PRODUCES));
        if declares {
            self.report(
                Diagnostic::definition(format!("{what} must not declare producer, disposer or observer methods"))
                    .with_target(class.name.as_str()),
            );
        }
    }

    // Synthetic beans

    fn add_synthetic(&mut self, synthetic: SyntheticBean) {
        let id = synthetic.id.clone();
        if self.is_duplicate(&id) {
            return;
        }

        let implementation = synthetic.implementation.as_ref().and_then(|name| self.index.class(name));
        let mut types = synthetic.types;
        if types.is_empty() {
            if let Some(class) = implementation {
                types = self.type_closure(class.as_type());
            }
        }
        if types.is_empty() {
            self.report(Diagnostic::definition("Synthetic bean declares no bean type").with_target(id.as_str()));
            return;
        }
        if !types.iter().any(TypeRef::is_object) {
            types.push(TypeRef::object());
        }

        let bean_class = synthetic
            .implementation
            .clone()
            .or_else(|| types.first().and_then(TypeRef::raw_name).cloned())
            .unwrap_or_else(|| ClassName::new(id.as_str()));
        let mut bean = BeanInfo::new(id.clone(), BeanKind::Synthetic, bean_class);
        bean.declaration = self.next_declaration();
        bean.traits = types.first().map(|ty| self.traits_of(ty)).unwrap_or_default();
        bean.types = types;
        bean.scope = synthetic.scope;
        bean.qualifiers = normalize_qualifiers(synthetic.qualifiers);
        bean.name = synthetic.name;
        bean.alternative = synthetic.alternative;
        bean.priority = synthetic.priority;
        bean.default_bean = synthetic.default_bean;
        bean.unremovable = synthetic.unremovable;
        bean.injection_points = synthetic
            .injection_points
            .into_iter()
            .enumerate()
            .map(|(position, (ty, qualifiers))| InjectionPoint::new(position, InjectionTarget::Synthetic, ty, qualifiers))
            .collect();

        debug!(bean = %id, scope = %bean.scope, "Synthetic bean registered");
        self.graph.beans.insert(id.clone(), bean);
        self.graph.factories.insert(id, synthetic.factory);
    }
}

fn priority_of(annotations: &[AnnotationInstance]) -> Option<i32> {
    annotation::find(annotations, names::PRIORITY)
        .and_then(|priority| priority.int("value"))
        .and_then(|value| i32::try_from(value).ok())
}

/// Fills in the default `Named` value and returns the bean name.
fn apply_name(
    qualifiers: &mut Vec<AnnotationInstance>,
    stereotypes: &[&StereotypeDescriptor],
    default_name: impl FnOnce() -> String,
) -> Option<String> {
    match qualifiers.iter_mut().find(|q| q.is(names::NAMED)) {
        Some(named) => match named.string("value").filter(|v| !v.is_empty()) {
            Some(value) => Some(value.to_string()),
            None => {
                let name = default_name();
                *named = AnnotationInstance::new(names::NAMED).with("value", name.as_str());
                Some(name)
            }
        },
        None if stereotypes.iter().any(|s| s.named) => {
            let name = default_name();
            qualifiers.push(AnnotationInstance::new(names::NAMED).with("value", name.as_str()));
            Some(name)
        }
        None => None,
    }
}

/// Adds `Default` when only `Named` or `Any` are declared, and always adds `Any`.
pub(crate) fn normalize_qualifiers(mut qualifiers: Vec<AnnotationInstance>) -> Vec<AnnotationInstance> {
    let only_builtin = qualifiers.iter().all(|q| q.is(names::NAMED) || q.is(names::ANY));
    if only_builtin && !annotation::has(&qualifiers, names::DEFAULT) {
        qualifiers.push(AnnotationInstance::new(names::DEFAULT));
    }
    if !annotation::has(&qualifiers, names::ANY) {
        qualifiers.push(AnnotationInstance::new(names::ANY));
    }
    qualifiers
}

/// `getFoo` and `isFoo` name the property `foo`; other methods use their own name.
fn property_name(method: &str) -> String {
    for prefix in ["get", "is"] {
        if let Some(rest) = method.strip_prefix(prefix) {
            if rest.chars().next().is_some_and(char::is_uppercase) {
                return names::decapitalize(rest);
            }
        }
    }
    method.to_string()
}
