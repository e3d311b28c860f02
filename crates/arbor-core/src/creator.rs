//! The type-erased instance creation seam.
//!
//! Bean instances are stored as [`BeanInstance`] (`Arc<dyn Any + Send + Sync>`).
//! A [`Creator`] builds one instance from a [`CreationContext`], which hands
//! out the already-resolved dependencies of the bean by injection point
//! position. Dependencies on normal-scoped beans arrive as lazy client
//! proxies, so user code holds an [`Inject<T>`] and calls [`Inject::get`]
//! whenever it needs the current contextual instance.
//!
//! # Example
//!
//! ```rust
//! use arbor_core::creator::{instance, BeanInstance, CreationContext, Creator};
//! use arbor_core::error::ArborResult;
//!
//! struct Clock;
//! struct Scheduler {
//!     clock: arbor_core::creator::Inject<Clock>,
//! }
//!
//! fn scheduler(ctx: &mut dyn CreationContext) -> ArborResult<BeanInstance> {
//!     let clock = ctx.get::<Clock>(0)?;
//!     Ok(instance(Scheduler { clock }))
//! }
//!
//! fn takes_creator(_: &dyn Creator) {}
//! takes_creator(&scheduler);
//! ```

use crate::annotation::AnnotationInstance;
use crate::error::{ArborError, ArborResult};
use crate::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A type-erased bean instance.
pub type BeanInstance = Arc<dyn Any + Send + Sync>;

/// Wraps a value as a [`BeanInstance`].
pub fn instance<T: Send + Sync + 'static>(value: T) -> BeanInstance {
    Arc::new(value)
}

/// Downcasts a bean instance to a concrete type.
pub fn downcast<T: Send + Sync + 'static>(instance: &BeanInstance, bean: &str) -> ArborResult<Arc<T>> {
    Arc::clone(instance)
        .downcast::<T>()
        .map_err(|_| ArborError::type_mismatch::<T>(bean))
}

/// A lazily resolved reference to a contextual instance (a client proxy).
pub trait LazyInstance: Send + Sync + fmt::Debug {
    /// Identifier of the proxied bean.
    fn bean_id(&self) -> &str;

    /// Resolves the contextual instance in the currently active context.
    fn resolve(&self) -> ArborResult<BeanInstance>;
}

/// Describes the injection point being injected into a dependent bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPointMetadata {
    /// Identifier of the bean that owns the injection point.
    pub bean: String,
    /// The required type.
    pub required_type: TypeRef,
    /// The required qualifiers.
    pub qualifiers: Vec<AnnotationInstance>,
}

/// A dependency handed to a creator.
#[derive(Clone)]
pub enum Injected {
    /// A direct instance (pseudo-scoped beans).
    Instance(BeanInstance),
    /// A client proxy (normal-scoped beans).
    Proxy(Arc<dyn LazyInstance>),
    /// Every resolved instance of a programmatic lookup, in priority order.
    Many(Vec<Injected>),
    /// Metadata about the injection point of the bean being created.
    Metadata(InjectionPointMetadata),
    /// Nothing matched an optional injection point.
    Absent,
}

impl Injected {
    /// Converts into a typed handle.
    pub fn into_inject<T: Send + Sync + 'static>(self, bean: &str) -> ArborResult<Inject<T>> {
        match self {
            Self::Instance(instance) => downcast::<T>(&instance, bean).map(Inject::direct),
            Self::Proxy(proxy) => Ok(Inject::lazy(proxy)),
            Self::Many(mut all) if all.len() == 1 => all.remove(0).into_inject(bean),
            Self::Many(_) => Err(ArborError::internal(format!(
                "Injection point of {bean} resolves to several beans"
            ))),
            Self::Metadata(_) => Err(ArborError::type_mismatch::<T>(bean)),
            Self::Absent => Err(ArborError::internal(format!(
                "Injection point of {bean} is not satisfied"
            ))),
        }
    }

    /// Returns `true` if nothing was injected.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance(..)"),
            Self::Proxy(proxy) => f.debug_tuple("Proxy").field(&proxy.bean_id()).finish(),
            Self::Many(all) => f.debug_tuple("Many").field(&all.len()).finish(),
            Self::Metadata(metadata) => f.debug_tuple("Metadata").field(metadata).finish(),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

/// Supplies the resolved dependencies of the bean being created.
pub trait CreationContext {
    /// Identifier of the bean being created.
    fn bean_id(&self) -> &str;

    /// Returns the dependency for the injection point at `position`.
    fn inject(&mut self, position: usize) -> ArborResult<Injected>;

    /// Returns a named parameter of a synthetic bean.
    fn param(&self, _name: &str) -> Option<&serde_json::Value> {
        None
    }
}

impl dyn CreationContext + '_ {
    /// Returns the dependency at `position` as a typed handle.
    pub fn get<T: Send + Sync + 'static>(&mut self, position: usize) -> ArborResult<Inject<T>> {
        let bean = self.bean_id().to_string();
        self.inject(position)?.into_inject(&bean)
    }

    /// Returns the dependency at `position`, or `None` when nothing matched.
    pub fn optional<T: Send + Sync + 'static>(&mut self, position: usize) -> ArborResult<Option<Inject<T>>> {
        let bean = self.bean_id().to_string();
        match self.inject(position)? {
            Injected::Absent => Ok(None),
            injected => injected.into_inject(&bean).map(Some),
        }
    }

    /// Returns every dependency matched by a multi-valued injection point at `position`.
    pub fn all<T: Send + Sync + 'static>(&mut self, position: usize) -> ArborResult<Vec<Inject<T>>> {
        let bean = self.bean_id().to_string();
        match self.inject(position)? {
            Injected::Many(all) => all.into_iter().map(|i| i.into_inject(&bean)).collect(),
            Injected::Absent => Ok(Vec::new()),
            single => single.into_inject(&bean).map(|i| vec![i]),
        }
    }

    /// Returns the injection point metadata at `position`.
    pub fn metadata(&mut self, position: usize) -> ArborResult<InjectionPointMetadata> {
        let bean = self.bean_id().to_string();
        match self.inject(position)? {
            Injected::Metadata(metadata) => Ok(metadata),
            _ => Err(ArborError::type_mismatch::<InjectionPointMetadata>(bean)),
        }
    }
}

/// Creates bean instances.
///
/// Implemented for every `Fn(&mut dyn CreationContext) -> ArborResult<BeanInstance>`.
pub trait Creator: Send + Sync {
    /// Creates one instance.
    fn create(&self, ctx: &mut dyn CreationContext) -> ArborResult<BeanInstance>;
}

impl<F> Creator for F
where
    F: Fn(&mut dyn CreationContext) -> ArborResult<BeanInstance> + Send + Sync,
{
    fn create(&self, ctx: &mut dyn CreationContext) -> ArborResult<BeanInstance> {
        self(ctx)
    }
}

/// A creator that hands out clones of a fixed instance.
#[derive(Clone)]
pub struct ConstantCreator(BeanInstance);

impl ConstantCreator {
    /// Creates a creator returning `value`.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self(instance(value))
    }
}

impl Creator for ConstantCreator {
    fn create(&self, _ctx: &mut dyn CreationContext) -> ArborResult<BeanInstance> {
        Ok(Arc::clone(&self.0))
    }
}

impl fmt::Debug for ConstantCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ConstantCreator(..)")
    }
}

/// A handle to an injected dependency.
///
/// Direct instances are returned as-is; proxies resolve the contextual
/// instance on every call to [`Inject::get`].
pub struct Inject<T> {
    inner: InjectInner<T>,
}

enum InjectInner<T> {
    Direct(Arc<T>),
    Lazy(Arc<dyn LazyInstance>),
}

impl<T: Send + Sync + 'static> Inject<T> {
    /// Wraps a direct instance.
    pub fn direct(inner: Arc<T>) -> Self {
        Self {
            inner: InjectInner::Direct(inner),
        }
    }

    /// Wraps a client proxy.
    pub fn lazy(proxy: Arc<dyn LazyInstance>) -> Self {
        Self {
            inner: InjectInner::Lazy(proxy),
        }
    }

    /// Returns the instance, resolving it through the proxy if needed.
    pub fn get(&self) -> ArborResult<Arc<T>> {
        match &self.inner {
            InjectInner::Direct(inner) => Ok(Arc::clone(inner)),
            InjectInner::Lazy(proxy) => downcast::<T>(&proxy.resolve()?, proxy.bean_id()),
        }
    }

    /// Returns `true` if this handle goes through a client proxy.
    #[must_use]
    pub const fn is_proxy(&self) -> bool {
        matches!(self.inner, InjectInner::Lazy(_))
    }
}

impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            InjectInner::Direct(inner) => InjectInner::Direct(Arc::clone(inner)),
            InjectInner::Lazy(proxy) => InjectInner::Lazy(Arc::clone(proxy)),
        };
        Self { inner }
    }
}

impl<T> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            InjectInner::Direct(_) => f.debug_tuple("Inject").field(&std::any::type_name::<T>()).finish(),
            InjectInner::Lazy(proxy) => f.debug_tuple("Inject").field(&proxy.bean_id()).finish(),
        }
    }
}
