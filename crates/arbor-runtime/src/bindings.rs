//! Implementations bound to the beans of a deployment.
//!
//! A deployment only describes beans. `Bindings` supplies the code behind
//! them, keyed by bean (or observer) identifier: how to construct each bean,
//! what its business methods, lifecycle callbacks and disposers do, and what
//! each interceptor and observer method runs.
//!
//! Business methods, decorator methods and callbacks are registered under
//! the method signature (`greet(arbor.lang.String)`) or, when unambiguous,
//! the bare method name.

use crate::events::ObservedEvent;
use crate::interception::{ApplicationError, InterceptorMethod, InvocationContext, Value};
use arbor_core::creator::{BeanInstance, CreationContext, Creator};
use arbor_core::error::ArborResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Creates the product of a producer method or field from its declaring instance.
pub type ProducerFn =
    Arc<dyn Fn(Option<&BeanInstance>, &mut dyn CreationContext) -> ArborResult<BeanInstance> + Send + Sync>;

/// Disposes of a produced instance. Receives the product and the declaring instance.
pub type DisposerFn = Arc<dyn Fn(&BeanInstance, Option<&BeanInstance>) -> Result<(), ApplicationError> + Send + Sync>;

/// A post-construct or pre-destroy callback of the bean itself.
pub type CallbackFn = Arc<dyn Fn(&BeanInstance) -> Result<(), ApplicationError> + Send + Sync>;

/// A business method body.
pub type MethodFn = Arc<dyn Fn(&BeanInstance, &[Value]) -> Result<Value, ApplicationError> + Send + Sync>;

/// An observer method body.
pub type ObserverFn = Arc<dyn Fn(&ObservedEvent<'_>) -> Result<(), ApplicationError> + Send + Sync>;

type PerMethod<T> = HashMap<String, HashMap<String, T>>;

/// Implementations of the beans of one deployment.
#[derive(Clone, Default)]
pub struct Bindings {
    factories: HashMap<String, Arc<dyn Creator>>,
    producers: HashMap<String, ProducerFn>,
    disposers: HashMap<String, DisposerFn>,
    callbacks: PerMethod<CallbackFn>,
    methods: PerMethod<MethodFn>,
    interceptors: PerMethod<Arc<dyn InterceptorMethod>>,
    observers: HashMap<String, ObserverFn>,
}

impl Bindings {
    /// Creates empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the constructor of a class bean.
    pub fn factory<F>(self, bean: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&mut dyn CreationContext) -> ArborResult<BeanInstance> + Send + Sync + 'static,
    {
        self.creator(bean, Arc::new(factory))
    }

    /// Binds an existing creator to a class bean.
    pub fn creator(mut self, bean: impl Into<String>, creator: Arc<dyn Creator>) -> Self {
        self.factories.insert(bean.into(), creator);
        self
    }

    /// Binds a producer method or field. The bean identifier is `Declaring#member`.
    pub fn producer<F>(mut self, bean: impl Into<String>, producer: F) -> Self
    where
        F: Fn(Option<&BeanInstance>, &mut dyn CreationContext) -> ArborResult<BeanInstance> + Send + Sync + 'static,
    {
        self.producers.insert(bean.into(), Arc::new(producer));
        self
    }

    /// Binds the disposer of a producer bean.
    pub fn disposer<F>(mut self, producer: impl Into<String>, disposer: F) -> Self
    where
        F: Fn(&BeanInstance, Option<&BeanInstance>) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        self.disposers.insert(producer.into(), Arc::new(disposer));
        self
    }

    /// Binds a post-construct or pre-destroy callback of a bean.
    pub fn callback<F>(mut self, bean: impl Into<String>, method: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&BeanInstance) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        insert(&mut self.callbacks, bean, method, Arc::new(callback));
        self
    }

    /// Binds a business method body.
    pub fn method<F>(mut self, bean: impl Into<String>, method: impl Into<String>, body: F) -> Self
    where
        F: Fn(&BeanInstance, &[Value]) -> Result<Value, ApplicationError> + Send + Sync + 'static,
    {
        insert(&mut self.methods, bean, method, Arc::new(body));
        self
    }

    /// Binds an interceptor method, or a method of a decorator.
    pub fn interceptor<F>(mut self, bean: impl Into<String>, method: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut InvocationContext<'_>) -> Result<Value, ApplicationError> + Send + Sync + 'static,
    {
        insert(&mut self.interceptors, bean, method, Arc::new(body));
        self
    }

    /// Binds an observer method body by observer identifier.
    pub fn observer<F>(mut self, observer: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ObservedEvent<'_>) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        self.observers.insert(observer.into(), Arc::new(body));
        self
    }

    pub(crate) fn factory_for(&self, bean: &str) -> Option<&Arc<dyn Creator>> {
        self.factories.get(bean)
    }

    pub(crate) fn producer_for(&self, bean: &str) -> Option<&ProducerFn> {
        self.producers.get(bean)
    }

    pub(crate) fn disposer_for(&self, producer: &str) -> Option<&DisposerFn> {
        self.disposers.get(producer)
    }

    pub(crate) fn callback_for(&self, bean: &str, method: &str) -> Option<&CallbackFn> {
        lookup(&self.callbacks, bean, method)
    }

    pub(crate) fn method_for(&self, bean: &str, signature: &str, name: &str) -> Option<&MethodFn> {
        lookup(&self.methods, bean, signature).or_else(|| lookup(&self.methods, bean, name))
    }

    pub(crate) fn interceptor_for(&self, bean: &str, signature: &str, name: &str) -> Option<&Arc<dyn InterceptorMethod>> {
        lookup(&self.interceptors, bean, signature).or_else(|| lookup(&self.interceptors, bean, name))
    }

    pub(crate) fn observer_for(&self, observer: &str) -> Option<&ObserverFn> {
        self.observers.get(observer)
    }
}

fn insert<T>(map: &mut PerMethod<T>, bean: impl Into<String>, method: impl Into<String>, value: T) {
    map.entry(bean.into()).or_default().insert(method.into(), value);
}

fn lookup<'m, T>(map: &'m PerMethod<T>, bean: &str, method: &str) -> Option<&'m T> {
    map.get(bean).and_then(|methods| methods.get(method))
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn count<T>(map: &PerMethod<T>) -> usize {
            map.values().map(HashMap::len).sum::<usize>()
        }
        f.debug_struct("Bindings")
            .field("factories", &self.factories.len())
            .field("producers", &self.producers.len())
            .field("disposers", &self.disposers.len())
            .field("callbacks", &count(&self.callbacks))
            .field("methods", &count(&self.methods))
            .field("interceptors", &count(&self.interceptors))
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::creator::instance;
    use serde_json::json;

    #[test]
    fn test_method_lookup_by_signature_then_name() {
        let bindings = Bindings::new()
            .method("acme.Greeter", "greet", |_, _| Ok(json!("by name")))
            .method("acme.Greeter", "greet(arbor.lang.String)", |_, _| Ok(json!("by signature")));
        let body = bindings
            .method_for("acme.Greeter", "greet(arbor.lang.String)", "greet")
            .unwrap();
        assert_eq!(body(&instance(()), &[]).unwrap(), json!("by signature"));

        let body = bindings.method_for("acme.Greeter", "greet(int)", "greet").unwrap();
        assert_eq!(body(&instance(()), &[]).unwrap(), json!("by name"));
        assert!(bindings.method_for("acme.Other", "greet()", "greet").is_none());
    }

    #[test]
    fn test_factories_and_observers() {
        let bindings = Bindings::new()
            .factory("acme.Clock", |_: &mut dyn CreationContext| Ok(instance(42u64)))
            .observer("acme.Audit#onStart(arbor.lang.Object)", |_| Ok(()));
        assert!(bindings.factory_for("acme.Clock").is_some());
        assert!(bindings.factory_for("acme.Missing").is_none());
        assert!(bindings.observer_for("acme.Audit#onStart(arbor.lang.Object)").is_some());
        assert!(format!("{bindings:?}").contains("factories: 1"));
    }
}
