//! The running container.
//!
//! A [`Container`] wraps a frozen [`Deployment`] and the [`Bindings`] that
//! implement its beans. It owns one context per scope, creates instances on
//! demand through the composed interception chains, and hands out client
//! proxies for normal-scoped beans.
//!
//! # Example
//!
//! ```
//! use arbor_build::BeanProcessor;
//! use arbor_config::{BuildConfig, RuntimeConfig};
//! use arbor_core::creator::{instance, CreationContext};
//! use arbor_core::{fixtures, TypeRef};
//! use arbor_runtime::{Bindings, Container};
//!
//! struct Clock;
//!
//! let config = BuildConfig {
//!     remove_unused_beans: false,
//!     ..BuildConfig::default()
//! };
//! let deployment = BeanProcessor::new(&fixtures::greeting_index(), &config).process().unwrap();
//! let bindings = Bindings::new().factory(fixtures::CLOCK, |_: &mut dyn CreationContext| Ok(instance(Clock)));
//!
//! let container = Container::start(deployment, bindings, &RuntimeConfig::default()).unwrap();
//! let clock = container.select(&TypeRef::class(fixtures::CLOCK), &[]);
//! assert!(clock.is_resolvable());
//! assert!(clock.get::<Clock>().is_ok());
//! container.shutdown().unwrap();
//! ```

use crate::bindings::Bindings;
use crate::context::{Context, ContextState, ManagedContext, SharedContext};
use crate::creational::{ContextualInstance, CreationalContext};
use crate::error::{ContainerError, ContainerResult};
use crate::interception::{
    apply_exception_policy, ApplicationError, InterceptorMethod, InvocationContext, Next, Value,
};
use crate::proxy::ClientProxy;
use arbor_build::{
    BeanId, BeanInfo, CallbackKind, ChainLink, Deployment, InjectionKind, InjectionPoint, MetadataKind, Resolution,
    SyntheticFactory,
};
use arbor_config::RuntimeConfig;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::creator::{downcast, BeanInstance, CreationContext, Injected, InjectionPointMetadata, LazyInstance};
use arbor_core::error::{ArborError, ArborResult};
use arbor_core::names::{self, ClassName};
use arbor_core::types::TypeRef;
use arbor_telemetry::logging::fields;
use arbor_telemetry::metrics;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

/// Type name of failures raised while constructing a bean inside an around-construct chain.
const CREATION_EXCEPTION: &str = "arbor.CreationException";

/// A running container. Cheap to clone.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    id: Uuid,
    deployment: Deployment,
    bindings: Bindings,
    config: RuntimeConfig,
    shared: IndexMap<ClassName, SharedContext>,
    managed: IndexMap<ClassName, ManagedContext>,
    proxies: DashMap<BeanId, Arc<ClientProxy>>,
    resolutions: DashMap<String, Resolution>,
    running: AtomicBool,
    stopping: AtomicBool,
}

impl Container {
    /// Starts a container: activates the application and singleton contexts
    /// and fires `Initialized(ApplicationScoped)`.
    pub fn start(deployment: Deployment, bindings: Bindings, config: &RuntimeConfig) -> ContainerResult<Self> {
        let mut shared = IndexMap::new();
        let mut managed = IndexMap::new();
        for scope in deployment.registry().scopes() {
            let name = scope.name.clone();
            if name.is(names::APPLICATION_SCOPED) || name.is(names::SINGLETON) {
                shared.insert(name.clone(), SharedContext::new(name));
            } else if !name.is(names::DEPENDENT) {
                managed.insert(name.clone(), ManagedContext::new(name, config.strict_deactivation));
            }
        }

        let container = Self {
            inner: Arc::new(ContainerInner {
                id: Uuid::now_v7(),
                deployment,
                bindings,
                config: *config,
                shared,
                managed,
                proxies: DashMap::new(),
                resolutions: DashMap::new(),
                running: AtomicBool::new(true),
                stopping: AtomicBool::new(false),
            }),
        };

        for (scope, context) in &container.inner.shared {
            let state = context.activate();
            metrics::record_context_activation(scope.as_str());
            trace!({ fields::SCOPE } = %scope, { fields::CONTEXT_ID } = %state.id(), "Context activated");
        }

        info!(
            container = %container.inner.id,
            { fields::BEANS } = container.inner.deployment.beans().count(),
            { fields::INTERCEPTORS } = container.inner.deployment.interceptors().len(),
            { fields::OBSERVERS } = container.inner.deployment.observers().len(),
            "Container started"
        );
        container.fire_lifecycle(names::INITIALIZED, names::APPLICATION_SCOPED)?;
        Ok(container)
    }

    /// Unique identifier of this container.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// The deployment this container runs.
    #[must_use]
    pub fn deployment(&self) -> &Deployment {
        &self.inner.deployment
    }

    /// The runtime configuration.
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub(crate) fn bindings(&self) -> &Bindings {
        &self.inner.bindings
    }

    /// Returns `true` until [`Container::shutdown`] is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> ContainerResult<()> {
        if self.is_running() {
            Ok(())
        } else {
            Err(ContainerError::NotRunning)
        }
    }

    /// Looks up a bean by identifier.
    pub fn bean(&self, id: &str) -> ContainerResult<&BeanInfo> {
        self.inner
            .deployment
            .bean(id)
            .ok_or_else(|| ContainerError::UnknownBean { id: id.to_string() })
    }

    // Contexts

    /// Returns the context of a scope, if the container manages one.
    #[must_use]
    pub fn context(&self, scope: &str) -> Option<&dyn Context> {
        self.inner
            .shared
            .get(scope)
            .map(|c| c as &dyn Context)
            .or_else(|| self.inner.managed.get(scope).map(|c| c as &dyn Context))
    }

    /// Returns the managed context of a scope.
    pub fn managed_context(&self, scope: &str) -> ContainerResult<&ManagedContext> {
        self.inner
            .managed
            .get(scope)
            .ok_or_else(|| ContainerError::context_not_active(scope))
    }

    pub(crate) fn managed_contexts(&self) -> impl Iterator<Item = &ManagedContext> {
        self.inner.managed.values()
    }

    /// Returns `true` if the context of `scope` is active for the caller.
    #[must_use]
    pub fn is_active(&self, scope: &str) -> bool {
        self.context(scope).is_some_and(|context| context.is_active())
    }

    /// Activates a fresh state of a managed context on the current thread
    /// and fires `Initialized(scope)`.
    pub fn activate(&self, scope: &str) -> ContainerResult<ContextState> {
        self.ensure_running()?;
        let state = self.managed_context(scope)?.activate()?;
        self.opened(&state)?;
        Ok(state)
    }

    /// Activates a captured state on the current thread, keeping its instances,
    /// and fires `Initialized(scope)`.
    pub fn activate_with(&self, scope: &str, state: ContextState) -> ContainerResult<()> {
        self.ensure_running()?;
        self.managed_context(scope)?.activate_with(state.clone())?;
        self.opened(&state)
    }

    /// Activates a fresh request context on the current thread.
    pub fn activate_request(&self) -> ContainerResult<ContextState> {
        self.activate(names::REQUEST_SCOPED)
    }

    /// Deactivates the current thread's state of a managed context: fires
    /// `BeforeDestroyed(scope)`, destroys its instances, fires `Destroyed(scope)`.
    ///
    /// Deactivating an inactive context fails when strict deactivation is configured.
    pub fn deactivate(&self, scope: &str) -> ContainerResult<()> {
        let context = self.managed_context(scope)?;
        let Some(state) = context.state().filter(|s| !s.is_terminated()) else {
            return context.deactivate().map(drop);
        };
        let mut failures = Vec::new();
        if let Err(e) = self.fire_lifecycle(names::BEFORE_DESTROYED, scope) {
            failures.push(e.to_string());
        }
        context.deactivate()?;
        failures.extend(self.close(&state));
        into_result(failures)
    }

    /// Deactivates the current thread's request context.
    pub fn deactivate_request(&self) -> ContainerResult<()> {
        self.deactivate(names::REQUEST_SCOPED)
    }

    pub(crate) fn opened(&self, state: &ContextState) -> ContainerResult<()> {
        metrics::record_context_activation(state.scope().as_str());
        trace!({ fields::SCOPE } = %state.scope(), { fields::CONTEXT_ID } = %state.id(), "Context activated");
        self.fire_lifecycle(names::INITIALIZED, state.scope().as_str()).map(drop)
    }

    /// Terminates a state and destroys its instances, then fires `Destroyed`.
    pub(crate) fn close(&self, state: &ContextState) -> Vec<String> {
        let mut failures = Vec::new();
        for instance in state.terminate() {
            failures.extend(self.destroy_instance(instance));
        }
        trace!({ fields::SCOPE } = %state.scope(), { fields::CONTEXT_ID } = %state.id(), "Context deactivated");
        if let Err(e) = self.fire_lifecycle(names::DESTROYED, state.scope().as_str()) {
            failures.push(e.to_string());
        }
        failures
    }

    pub(crate) fn fire_lifecycle(&self, qualifier: &str, scope: &str) -> ContainerResult<usize> {
        let event = AnnotationInstance::new(qualifier).with("value", TypeRef::class(scope));
        self.fire(&TypeRef::object(), &[event], &Value::String(scope.to_string()))
    }

    // Lookup

    /// Resolves a type and qualifiers, caching the result.
    pub fn resolve(&self, required: &TypeRef, qualifiers: &[AnnotationInstance]) -> Resolution {
        let key = lookup_key(required, qualifiers);
        if let Some(cached) = self.inner.resolutions.get(&key) {
            return cached.value().clone();
        }
        let resolution = self.inner.deployment.resolver().resolve(required, qualifiers);
        self.inner.resolutions.insert(key, resolution.clone());
        resolution
    }

    /// Programmatic lookup of one bean.
    pub fn select(&self, required: &TypeRef, qualifiers: &[AnnotationInstance]) -> Instance {
        Instance {
            container: self.clone(),
            required: required.clone(),
            qualifiers: qualifiers.to_vec(),
            resolution: self.resolve(required, qualifiers),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Every bean of a type regardless of qualifiers, by priority descending then declaration order.
    pub fn list_all(&self, required: &TypeRef) -> Vec<InstanceHandle> {
        let any = [AnnotationInstance::new(names::ANY)];
        let all = self.inner.deployment.resolver().resolve_all(required, &any);
        all.beans().iter().map(|id| self.handle(id.clone())).collect()
    }

    /// A handle to a bean by identifier.
    pub fn bean_handle(&self, id: &str) -> ContainerResult<InstanceHandle> {
        let bean = self.bean(id)?;
        Ok(self.handle(bean.id.clone()))
    }

    fn handle(&self, bean: BeanId) -> InstanceHandle {
        InstanceHandle {
            container: self.clone(),
            bean,
            dependent: Mutex::new(None),
        }
    }

    /// Returns the client proxy of a normal-scoped bean. One proxy exists per bean.
    pub fn proxy(&self, bean: &BeanInfo) -> Arc<ClientProxy> {
        Arc::clone(
            &*self.inner
                .proxies
                .entry(bean.id.clone())
                .or_insert_with(|| Arc::new(ClientProxy::new(bean.id.clone(), Arc::downgrade(&self.inner)))),
        )
    }

    /// Returns the contextual instance of a normal-scoped or singleton bean.
    pub fn contextual(&self, bean: &BeanInfo) -> ContainerResult<BeanInstance> {
        self.ensure_running()?;
        if bean.is_dependent() {
            return Err(ContainerError::Creation(ArborError::internal(format!(
                "Dependent bean {} has no contextual instance",
                bean.id
            ))));
        }
        let context = self
            .context(bean.scope.as_str())
            .ok_or_else(|| ContainerError::context_not_active(bean.scope.clone()))?;
        context.current()?.get_or_create(&bean.id, || self.create(bean, None))
    }

    /// Obtains an instance of `bean`; new dependent instances are pushed to `dependents`.
    pub(crate) fn obtain(&self, bean: &BeanInfo, dependents: &mut Vec<ContextualInstance>) -> ContainerResult<BeanInstance> {
        if bean.is_dependent() {
            self.ensure_running()?;
            let created = self.create(bean, None)?;
            let instance = Arc::clone(created.instance());
            dependents.push(created);
            Ok(instance)
        } else {
            self.contextual(bean)
        }
    }

    // Creation

    fn create(&self, bean: &BeanInfo, injection_point: Option<InjectionPointMetadata>) -> ContainerResult<ContextualInstance> {
        let mut creational = CreationalContext::new(bean.id.clone());
        let created = self
            .construct(bean, &mut creational, injection_point)
            .and_then(|instance| self.lifecycle(bean, &instance, CallbackKind::PostConstruct).map(|()| instance));
        match created {
            Ok(instance) => {
                metrics::record_instance_created(bean.scope.as_str());
                trace!({ fields::BEAN } = %bean.id, { fields::SCOPE } = %bean.scope, "Instance created");
                Ok(creational.finish(bean.scope.clone(), instance))
            }
            Err(e) => {
                for dependent in creational.take_dependents().into_iter().rev() {
                    self.destroy_instance(dependent);
                }
                Err(e)
            }
        }
    }

    fn construct(
        &self,
        bean: &BeanInfo,
        creational: &mut CreationalContext,
        injection_point: Option<InjectionPointMetadata>,
    ) -> ContainerResult<BeanInstance> {
        let links = self
            .inner
            .deployment
            .chains(bean.id.as_str())
            .map(|chains| chains.around_construct.as_slice())
            .unwrap_or_default();
        let mut ctx = BeanCreationContext {
            container: self,
            bean,
            creational,
            injection_point,
            factory: self.inner.deployment.factory(bean.id.as_str()),
        };
        if links.is_empty() {
            return self.instantiate(bean, &mut ctx);
        }

        let methods = self.interceptor_methods(links)?;
        let next = Next::build(&methods, |ictx: &mut InvocationContext<'_>| {
            let instance = self
                .instantiate(bean, &mut ctx)
                .map_err(|e| ApplicationError::unchecked(CREATION_EXCEPTION, e))?;
            ictx.set_target(instance);
            Ok(Value::Null)
        });
        let mut ictx = InvocationContext::new(bean.id.as_str(), CallbackKind::AroundConstruct, next);
        ictx.proceed()
            .map_err(|e| ContainerError::Creation(ArborError::creation(bean.id.as_str(), e)))?;
        ictx.take_target().ok_or_else(|| {
            ContainerError::Creation(ArborError::creation(
                bean.id.as_str(),
                anyhow::anyhow!("Around-construct chain completed without constructing the instance"),
            ))
        })
    }

    fn instantiate(&self, bean: &BeanInfo, ctx: &mut BeanCreationContext<'_>) -> ContainerResult<BeanInstance> {
        let id = bean.id.as_str();
        let ctx: &mut dyn CreationContext = ctx;
        if bean.is_synthetic() {
            let factory = self
                .inner
                .deployment
                .factory(id)
                .ok_or_else(|| ContainerError::unbound(id, "<synthetic factory>"))?;
            return Ok(factory.creator().create(ctx)?);
        }
        if bean.is_producer() {
            let producer = self
                .inner
                .bindings
                .producer_for(id)
                .ok_or_else(|| ContainerError::unbound(id, "<producer>"))?;
            let mut declaring_dependents = Vec::new();
            let declaring = self.declaring_instance(bean, &mut declaring_dependents)?;
            let produced = producer(declaring.as_ref(), ctx);
            for dependent in declaring_dependents {
                self.destroy_instance(dependent);
            }
            return Ok(produced?);
        }
        let factory = self
            .inner
            .bindings
            .factory_for(id)
            .ok_or_else(|| ContainerError::unbound(id, "<constructor>"))?;
        Ok(factory.create(ctx)?)
    }

    /// The declaring bean instance of a non-static member. A dependent declaring
    /// instance is created for the call and recorded in `dependents`.
    fn declaring_instance(
        &self,
        bean: &BeanInfo,
        dependents: &mut Vec<ContextualInstance>,
    ) -> ContainerResult<Option<BeanInstance>> {
        match (&bean.declaring_bean, bean.is_static) {
            (Some(declaring), false) => {
                let declaring = self.bean(declaring.as_str())?;
                self.obtain(declaring, dependents).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn inject(
        &self,
        owner: &BeanInfo,
        point: &InjectionPoint,
        creational: &mut CreationalContext,
        owner_point: Option<&InjectionPointMetadata>,
    ) -> ContainerResult<Injected> {
        match point.kind {
            InjectionKind::Metadata(MetadataKind::InjectionPoint) => {
                Ok(owner_point.cloned().map_or(Injected::Absent, Injected::Metadata))
            }
            InjectionKind::Metadata(MetadataKind::Bean | MetadataKind::InterceptedBean) => {
                Ok(Injected::Metadata(InjectionPointMetadata {
                    bean: owner.id.to_string(),
                    required_type: point.required_type.clone(),
                    qualifiers: owner.qualifiers.clone(),
                }))
            }
            InjectionKind::Delegate => Ok(Injected::Absent),
            InjectionKind::Instance => {
                let resolution = match &point.resolution {
                    Some(resolution) => resolution.clone(),
                    None => self
                        .inner
                        .deployment
                        .resolver()
                        .resolve_all(&point.required_type, &point.qualifiers),
                };
                let metadata = point_metadata(owner, point);
                resolution
                    .beans()
                    .iter()
                    .map(|id| self.reference(id, creational, &metadata))
                    .collect::<ContainerResult<Vec<_>>>()
                    .map(Injected::Many)
            }
            InjectionKind::Single | InjectionKind::Optional => {
                let resolution = match &point.resolution {
                    Some(resolution) => resolution.clone(),
                    None => self.resolve(&point.required_type, &point.qualifiers),
                };
                match resolution {
                    Resolution::Resolved(id) => self.reference(&id, creational, &point_metadata(owner, point)),
                    Resolution::Unsatisfied if point.kind == InjectionKind::Optional => Ok(Injected::Absent),
                    Resolution::Unsatisfied => Err(ContainerError::Unsatisfied {
                        required: describe(&point.required_type, &point.qualifiers),
                    }),
                    Resolution::Ambiguous(beans) | Resolution::List(beans) => Err(ContainerError::Ambiguous {
                        required: describe(&point.required_type, &point.qualifiers),
                        beans: beans.iter().map(ToString::to_string).collect(),
                    }),
                }
            }
        }
    }

    fn reference(
        &self,
        id: &BeanId,
        creational: &mut CreationalContext,
        metadata: &InjectionPointMetadata,
    ) -> ContainerResult<Injected> {
        let bean = self.bean(id.as_str())?;
        if bean.is_normal_scoped(self.inner.deployment.registry()) {
            let proxy: Arc<dyn LazyInstance> = self.proxy(bean);
            Ok(Injected::Proxy(proxy))
        } else if bean.is_dependent() {
            let created = self.create(bean, Some(metadata.clone()))?;
            let instance = Arc::clone(created.instance());
            creational.add_dependent(created);
            Ok(Injected::Instance(instance))
        } else {
            self.contextual(bean).map(Injected::Instance)
        }
    }

    // Interception

    fn interceptor_methods(&self, links: &[ChainLink]) -> ContainerResult<Vec<Arc<dyn InterceptorMethod>>> {
        links
            .iter()
            .map(|link| {
                let id = link.interceptor.as_str();
                self.inner
                    .bindings
                    .interceptor_for(id, &link.method, &link.method)
                    .cloned()
                    .ok_or_else(|| ContainerError::unbound(id, link.method.as_str()))
            })
            .collect()
    }

    /// Runs the post-construct or pre-destroy chain of a bean: its lifecycle
    /// interceptors, then its own callbacks in declaration order.
    fn lifecycle(&self, bean: &BeanInfo, instance: &BeanInstance, kind: CallbackKind) -> ContainerResult<()> {
        let links = self
            .inner
            .deployment
            .chains(bean.id.as_str())
            .map(|chains| chains.lifecycle(kind))
            .unwrap_or_default();
        let own = match kind {
            CallbackKind::PreDestroy => bean.pre_destroy.as_slice(),
            _ => bean.post_construct.as_slice(),
        };
        if links.is_empty() && own.is_empty() {
            return Ok(());
        }

        let callbacks = own
            .iter()
            .map(|name| {
                self.inner
                    .bindings
                    .callback_for(bean.id.as_str(), name)
                    .cloned()
                    .ok_or_else(|| ContainerError::unbound(bean.id.as_str(), name.as_str()))
            })
            .collect::<ContainerResult<Vec<_>>>()?;
        let methods = self.interceptor_methods(links)?;
        let target = Arc::clone(instance);
        let next = Next::build(&methods, move |_: &mut InvocationContext<'_>| {
            for callback in &callbacks {
                callback(&target)?;
            }
            Ok(Value::Null)
        });
        let result = InvocationContext::new(bean.id.as_str(), kind, next)
            .with_target(Arc::clone(instance))
            .proceed()
            .map(drop)
            .map_err(|e| ContainerError::Creation(ArborError::creation(bean.id.as_str(), e)));
        result
    }

    /// Invokes a business method of `instance` through its interception chain.
    ///
    /// `method` is a signature such as `greet(arbor.lang.String)` or a bare method name.
    pub fn invoke(&self, bean: &BeanInfo, instance: &BeanInstance, method: &str, args: Vec<Value>) -> ContainerResult<Value> {
        self.ensure_running()?;
        let id = bean.id.as_str();
        let business = bean
            .method(method)
            .or_else(|| bean.methods.iter().find(|m| m.name == method));
        let (signature, name, declared) = match business {
            Some(m) => (m.signature.as_str(), m.name.as_str(), m.exceptions.as_slice()),
            None => (method, method, &[][..]),
        };
        let body = self
            .inner
            .bindings
            .method_for(id, signature, name)
            .cloned()
            .ok_or_else(|| ContainerError::unbound(id, signature))?;

        let mut methods = Vec::new();
        if let Some(chain) = self.inner.deployment.chains(id).and_then(|c| c.method(signature)) {
            methods.extend(self.interceptor_methods(&chain.interceptors)?);
            for link in &chain.decorators {
                let decorator = link.decorator.as_str();
                let method = self
                    .inner
                    .bindings
                    .interceptor_for(decorator, signature, name)
                    .cloned()
                    .ok_or_else(|| ContainerError::unbound(decorator, signature))?;
                methods.push(method);
            }
        }

        let target = Arc::clone(instance);
        let next = Next::build(&methods, move |ctx: &mut InvocationContext<'_>| {
            body(&target, ctx.parameters())
        });
        let result = InvocationContext::new(id, CallbackKind::AroundInvoke, next)
            .with_method(signature)
            .with_target(Arc::clone(instance))
            .with_parameters(args)
            .proceed()
            .map_err(|e| apply_exception_policy(e, declared));

        metrics::record_invocation(if result.is_ok() { "ok" } else { "error" });
        result.map_err(|source| {
            debug!({ fields::BEAN } = id, { fields::METHOD } = signature, error = %source, "Invocation failed");
            ContainerError::Invocation {
                bean: id.to_string(),
                method: signature.to_string(),
                source,
            }
        })
    }

    // Destruction

    /// Destroys an instance and its dependents. Returns one message per failed callback.
    pub(crate) fn destroy_instance(&self, contextual: ContextualInstance) -> Vec<String> {
        let (id, scope, instance, dependents) = contextual.into_parts();
        let mut failures = Vec::new();
        if let Some(bean) = self.inner.deployment.bean(id.as_str()) {
            if let Err(e) = self.lifecycle(bean, &instance, CallbackKind::PreDestroy) {
                error!({ fields::BEAN } = %id, error = %e, "Pre-destroy callback failed");
                failures.push(format!("{id}: {e}"));
            }
            if let Some(disposer) = self.inner.bindings.disposer_for(id.as_str()) {
                let mut declaring_dependents = Vec::new();
                match self.declaring_instance(bean, &mut declaring_dependents) {
                    Ok(declaring) => {
                        if let Err(e) = disposer(&instance, declaring.as_ref()) {
                            error!({ fields::BEAN } = %id, error = %e, "Disposer failed");
                            failures.push(format!("{id}: {e}"));
                        }
                    }
                    Err(e) => {
                        error!({ fields::BEAN } = %id, error = %e, "Disposer skipped, declaring bean unavailable");
                        failures.push(format!("{id}: {e}"));
                    }
                }
                for dependent in declaring_dependents {
                    failures.extend(self.destroy_instance(dependent));
                }
            }
        }
        for dependent in dependents.into_iter().rev() {
            failures.extend(self.destroy_instance(dependent));
        }
        metrics::record_instance_destroyed(scope.as_str());
        trace!({ fields::BEAN } = %id, { fields::SCOPE } = %scope, "Instance destroyed");
        failures
    }

    /// Removes the contextual instance of a normal-scoped or singleton bean
    /// from the active context and destroys it.
    pub fn destroy_contextual(&self, bean: &BeanInfo) -> ContainerResult<()> {
        let context = self
            .context(bean.scope.as_str())
            .ok_or_else(|| ContainerError::context_not_active(bean.scope.clone()))?;
        match context.current()?.remove(bean.id.as_str()) {
            Some(contextual) => into_result(self.destroy_instance(contextual)),
            None => Ok(()),
        }
    }

    /// Shuts the container down.
    ///
    /// Fires `BeforeDestroyed(ApplicationScoped)`, destroys every managed state
    /// still associated, then the singleton and application instances, and
    /// fires `Destroyed(ApplicationScoped)`. Failing callbacks do not stop the
    /// shutdown; they are reported together. Only the first call shuts down;
    /// later and concurrent calls return immediately.
    pub fn shutdown(&self) -> ContainerResult<()> {
        if self.inner.stopping.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut failures = Vec::new();
        if let Err(e) = self.fire_lifecycle(names::BEFORE_DESTROYED, names::APPLICATION_SCOPED) {
            failures.push(e.to_string());
        }
        for context in self.inner.managed.values() {
            for state in context.drain() {
                failures.extend(self.close(&state));
            }
        }
        for (scope, context) in self.inner.shared.iter().rev() {
            if let Some(state) = context.deactivate() {
                for instance in state.terminate() {
                    failures.extend(self.destroy_instance(instance));
                }
                trace!({ fields::SCOPE } = %scope, { fields::CONTEXT_ID } = %state.id(), "Context deactivated");
            }
        }
        if let Err(e) = self.fire_lifecycle(names::DESTROYED, names::APPLICATION_SCOPED) {
            failures.push(e.to_string());
        }
        self.inner.running.store(false, Ordering::Release);
        self.inner.proxies.clear();
        info!(container = %self.inner.id, failures = failures.len(), "Container shut down");
        into_result(failures)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("running", &self.is_running())
            .field("beans", &self.inner.deployment.beans().count())
            .field("bindings", &self.inner.bindings)
            .finish_non_exhaustive()
    }
}

fn into_result(failures: Vec<String>) -> ContainerResult<()> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ContainerError::Destruction { failures })
    }
}

fn lookup_key(required: &TypeRef, qualifiers: &[AnnotationInstance]) -> String {
    let mut key = required.to_string();
    for qualifier in qualifiers {
        key.push('|');
        key.push_str(&qualifier.to_string());
    }
    key
}

fn describe(required: &TypeRef, qualifiers: &[AnnotationInstance]) -> String {
    if qualifiers.is_empty() {
        required.to_string()
    } else {
        let qualifiers: Vec<String> = qualifiers.iter().map(ToString::to_string).collect();
        format!("{required} with qualifiers {}", qualifiers.join(" "))
    }
}

fn point_metadata(owner: &BeanInfo, point: &InjectionPoint) -> InjectionPointMetadata {
    InjectionPointMetadata {
        bean: owner.id.to_string(),
        required_type: point.required_type.clone(),
        qualifiers: point.qualifiers.clone(),
    }
}

/// Hands the resolved dependencies of one bean to its creator.
struct BeanCreationContext<'c> {
    container: &'c Container,
    bean: &'c BeanInfo,
    creational: &'c mut CreationalContext,
    injection_point: Option<InjectionPointMetadata>,
    factory: Option<&'c SyntheticFactory>,
}

impl CreationContext for BeanCreationContext<'_> {
    fn bean_id(&self) -> &str {
        self.bean.id.as_str()
    }

    fn inject(&mut self, position: usize) -> ArborResult<Injected> {
        let id = self.bean.id.as_str();
        let point = self
            .bean
            .injection_points
            .iter()
            .find(|p| p.position == position)
            .ok_or_else(|| ArborError::injection(id, position, "no injection point at this position"))?;
        self.container
            .inject(self.bean, point, self.creational, self.injection_point.as_ref())
            .map_err(|e| match e {
                ContainerError::Unsatisfied { required } | ContainerError::Ambiguous { required, .. } => {
                    ArborError::injection(id, position, required)
                }
                other => other.into_arbor(id),
            })
    }

    fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.factory.and_then(|factory| factory.param(name))
    }
}

/// The result of a programmatic lookup.
pub struct Instance {
    container: Container,
    required: TypeRef,
    qualifiers: Vec<AnnotationInstance>,
    resolution: Resolution,
    created: Mutex<Vec<ContextualInstance>>,
}

impl Instance {
    /// Returns `true` if exactly one bean matches.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        matches!(self.resolution, Resolution::Resolved(_))
    }

    /// Returns `true` if no bean matches.
    #[must_use]
    pub fn is_unsatisfied(&self) -> bool {
        self.resolution.is_unsatisfied()
    }

    /// Returns `true` if several beans match.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        self.resolution.is_ambiguous()
    }

    /// The resolution of this lookup.
    #[must_use]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    fn resolved(&self) -> ContainerResult<&BeanInfo> {
        match &self.resolution {
            Resolution::Resolved(id) => self.container.bean(id.as_str()),
            Resolution::Unsatisfied => Err(ContainerError::Unsatisfied {
                required: describe(&self.required, &self.qualifiers),
            }),
            Resolution::Ambiguous(beans) | Resolution::List(beans) => Err(ContainerError::Ambiguous {
                required: describe(&self.required, &self.qualifiers),
                beans: beans.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Returns the instance.
    ///
    /// Normal-scoped beans yield the instance of the active context; dependent
    /// beans yield a new instance per call, owned by this lookup until
    /// [`Instance::destroy`].
    pub fn get<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        let bean = self.resolved()?;
        let instance = self.container.obtain(bean, &mut self.created.lock())?;
        Ok(downcast::<T>(&instance, bean.id.as_str())?)
    }

    /// Returns a handle to the resolved bean.
    pub fn handle(&self) -> ContainerResult<InstanceHandle> {
        let bean = self.resolved()?;
        Ok(self.container.handle(bean.id.clone()))
    }

    /// Handles to every matching bean, by priority descending then declaration order.
    pub fn handles(&self) -> Vec<InstanceHandle> {
        let all = self
            .container
            .deployment()
            .resolver()
            .resolve_all(&self.required, &self.qualifiers);
        all.beans().iter().map(|id| self.container.handle(id.clone())).collect()
    }

    /// Destroys the dependent instances obtained through this lookup and, for
    /// a normal-scoped bean, its instance in the active context.
    pub fn destroy(&self) -> ContainerResult<()> {
        let mut failures = Vec::new();
        for created in std::mem::take(&mut *self.created.lock()).into_iter().rev() {
            failures.extend(self.container.destroy_instance(created));
        }
        if let Ok(bean) = self.resolved() {
            if !bean.is_dependent() {
                self.container.destroy_contextual(bean)?;
            }
        }
        into_result(failures)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("required", &self.required)
            .field("qualifiers", &self.qualifiers)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}

/// A handle to one bean.
pub struct InstanceHandle {
    container: Container,
    bean: BeanId,
    dependent: Mutex<Option<ContextualInstance>>,
}

impl InstanceHandle {
    /// Identifier of the bean.
    #[must_use]
    pub fn bean_id(&self) -> &BeanId {
        &self.bean
    }

    /// The bean.
    pub fn bean(&self) -> ContainerResult<&BeanInfo> {
        self.container.bean(self.bean.as_str())
    }

    /// Returns the untyped instance. A dependent bean is created once per handle.
    pub fn instance(&self) -> ContainerResult<BeanInstance> {
        let bean = self.bean()?;
        if !bean.is_dependent() {
            return self.container.contextual(bean);
        }
        let mut dependent = self.dependent.lock();
        if let Some(existing) = dependent.as_ref() {
            return Ok(Arc::clone(existing.instance()));
        }
        let mut created = Vec::with_capacity(1);
        let instance = self.container.obtain(bean, &mut created)?;
        *dependent = created.pop();
        Ok(instance)
    }

    /// Returns the typed instance.
    pub fn get<T: Send + Sync + 'static>(&self) -> ContainerResult<Arc<T>> {
        let instance = self.instance()?;
        Ok(downcast::<T>(&instance, self.bean.as_str())?)
    }

    /// Invokes a business method through the bean's interception chain.
    pub fn invoke(&self, method: &str, args: Vec<Value>) -> ContainerResult<Value> {
        let instance = self.instance()?;
        self.container.invoke(self.bean()?, &instance, method, args)
    }

    /// Destroys the instance behind this handle.
    pub fn destroy(&self) -> ContainerResult<()> {
        let bean = self.bean()?;
        if bean.is_dependent() {
            match self.dependent.lock().take() {
                Some(created) => into_result(self.container.destroy_instance(created)),
                None => Ok(()),
            }
        } else {
            self.container.destroy_contextual(bean)
        }
    }
}

impl fmt::Debug for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle").field("bean", &self.bean).finish_non_exhaustive()
    }
}
