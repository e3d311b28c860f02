//! Scope contexts.
//!
//! A context owns the contextual instances of one scope. Two flavours exist:
//!
//! - [`SharedContext`]: one store for the whole container, active from start
//!   to shutdown (application and singleton scopes)
//! - [`ManagedContext`]: explicitly activated and deactivated; each thread
//!   has its own association (request, session and custom normal scopes)
//!
//! The store behind an activation is a [`ContextState`]. Capturing a state and
//! restoring it elsewhere shares the same store: restoring creates a new
//! association, never a move. Once a state is terminated its instances are
//! handed back for destruction and every later lookup fails with
//! `ContextNotActive`.

use crate::creational::ContextualInstance;
use crate::error::{ContainerError, ContainerResult};
use arbor_build::BeanId;
use arbor_core::creator::BeanInstance;
use arbor_core::names::ClassName;
use arbor_telemetry::metrics::ActiveContextGuard;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use uuid::Uuid;

struct ContextStore {
    id: Uuid,
    scope: ClassName,
    creation: ReentrantMutex<()>,
    instances: Mutex<IndexMap<BeanId, ContextualInstance>>,
    terminated: AtomicBool,
    _active: ActiveContextGuard,
}

impl ContextStore {
    fn new(scope: &ClassName) -> Self {
        Self {
            id: Uuid::now_v7(),
            scope: scope.clone(),
            creation: ReentrantMutex::new(()),
            instances: Mutex::new(IndexMap::new()),
            terminated: AtomicBool::new(false),
            _active: ActiveContextGuard::new(scope.as_str()),
        }
    }
}

/// One activation of a context: the store of its contextual instances.
#[derive(Clone)]
pub struct ContextState {
    store: Arc<ContextStore>,
}

impl ContextState {
    pub(crate) fn new(scope: &ClassName) -> Self {
        Self {
            store: Arc::new(ContextStore::new(scope)),
        }
    }

    /// Unique identifier of this activation.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.store.id
    }

    /// The scope annotation.
    #[must_use]
    pub fn scope(&self) -> &ClassName {
        &self.store.scope
    }

    /// Number of contextual instances held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.instances.lock().len()
    }

    /// Returns `true` if no instance has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if an instance of `bean` exists.
    #[must_use]
    pub fn contains(&self, bean: &str) -> bool {
        self.store.instances.lock().contains_key(bean)
    }

    /// Returns `true` once the activation has ended.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.store.terminated.load(Ordering::Acquire)
    }

    /// Returns `true` if both states share the same store.
    #[must_use]
    pub fn same_as(&self, other: &ContextState) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }

    /// Returns the existing instance of `bean`.
    #[must_use]
    pub fn get(&self, bean: &str) -> Option<BeanInstance> {
        self.store.instances.lock().get(bean).map(|ci| Arc::clone(ci.instance()))
    }

    /// Returns the existing instance of `bean`, or creates and stores one.
    ///
    /// Creation is serialized per store. The lock is reentrant so that a bean
    /// may look up other beans of the same context while it is being created.
    pub fn get_or_create<F>(&self, bean: &BeanId, create: F) -> ContainerResult<BeanInstance>
    where
        F: FnOnce() -> ContainerResult<ContextualInstance>,
    {
        self.ensure_active()?;
        if let Some(existing) = self.get(bean.as_str()) {
            return Ok(existing);
        }
        let _creating = self.store.creation.lock();
        if let Some(existing) = self.get(bean.as_str()) {
            return Ok(existing);
        }
        let created = create()?;
        self.ensure_active()?;
        let instance = Arc::clone(created.instance());
        self.store.instances.lock().insert(bean.clone(), created);
        Ok(instance)
    }

    /// Removes the instance of `bean` so that it can be destroyed.
    pub fn remove(&self, bean: &str) -> Option<ContextualInstance> {
        self.store.instances.lock().shift_remove(bean)
    }

    /// Ends the activation and returns its instances, most recently created first.
    ///
    /// Only the first call returns instances.
    pub(crate) fn terminate(&self) -> Vec<ContextualInstance> {
        if self.store.terminated.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }
        let _creating = self.store.creation.lock();
        let drained = std::mem::take(&mut *self.store.instances.lock());
        drained.into_values().rev().collect()
    }

    fn ensure_active(&self) -> ContainerResult<()> {
        if self.is_terminated() {
            Err(ContainerError::context_not_active(self.scope().clone()))
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextState")
            .field("id", &self.id())
            .field("scope", self.scope())
            .field("instances", &self.len())
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// A context that can hand out its active state.
pub trait Context: Send + Sync {
    /// The scope annotation.
    fn scope(&self) -> &ClassName;

    /// Returns the state active for the caller, or `ContextNotActive`.
    fn current(&self) -> ContainerResult<ContextState>;

    /// Returns `true` if the context is active for the caller.
    fn is_active(&self) -> bool {
        self.current().is_ok()
    }
}

/// A context with a single store shared by every thread.
#[derive(Debug)]
pub struct SharedContext {
    scope: ClassName,
    state: RwLock<Option<ContextState>>,
}

impl SharedContext {
    /// Creates an inactive context for `scope`.
    pub fn new(scope: impl Into<ClassName>) -> Self {
        Self {
            scope: scope.into(),
            state: RwLock::new(None),
        }
    }

    /// Activates the context; returns the existing state if already active.
    pub fn activate(&self) -> ContextState {
        let mut state = self.state.write();
        state.get_or_insert_with(|| ContextState::new(&self.scope)).clone()
    }

    /// Deactivates the context and returns the state to destroy.
    pub fn deactivate(&self) -> Option<ContextState> {
        self.state.write().take()
    }
}

impl Context for SharedContext {
    fn scope(&self) -> &ClassName {
        &self.scope
    }

    fn current(&self) -> ContainerResult<ContextState> {
        self.state
            .read()
            .clone()
            .filter(|state| !state.is_terminated())
            .ok_or_else(|| ContainerError::context_not_active(self.scope.clone()))
    }
}

/// A context activated explicitly, with one association per thread.
///
/// Async code keeps its association across `.await` points and thread hops by
/// running inside [`crate::propagation::Propagated`], which restores the
/// association on every poll.
#[derive(Debug)]
pub struct ManagedContext {
    scope: ClassName,
    strict: bool,
    associations: DashMap<ThreadId, ContextState>,
}

impl ManagedContext {
    /// Creates an inactive context.
    ///
    /// With `strict` set, deactivating an inactive context is an error.
    pub fn new(scope: impl Into<ClassName>, strict: bool) -> Self {
        Self {
            scope: scope.into(),
            strict,
            associations: DashMap::new(),
        }
    }

    /// Creates a fresh state without associating it.
    pub fn create_state(&self) -> ContextState {
        ContextState::new(&self.scope)
    }

    /// Activates a fresh state on the current thread.
    pub fn activate(&self) -> ContainerResult<ContextState> {
        let state = self.create_state();
        self.activate_with(state.clone())?;
        Ok(state)
    }

    /// Activates a captured state on the current thread.
    pub fn activate_with(&self, state: ContextState) -> ContainerResult<()> {
        if state.is_terminated() {
            return Err(ContainerError::context_not_active(self.scope.clone()));
        }
        if self.is_active() {
            return Err(ContainerError::ContextAlreadyActive {
                scope: self.scope.clone(),
            });
        }
        self.associations.insert(thread::current().id(), state);
        Ok(())
    }

    /// Removes the current thread's association and returns its state.
    ///
    /// Returns `Ok(None)` for an inactive context unless the context is strict.
    pub fn deactivate(&self) -> ContainerResult<Option<ContextState>> {
        match self.associations.remove(&thread::current().id()) {
            Some((_, state)) if !state.is_terminated() => Ok(Some(state)),
            _ if self.strict => Err(ContainerError::context_not_active(self.scope.clone())),
            _ => Ok(None),
        }
    }

    /// Returns the state associated with the current thread.
    #[must_use]
    pub fn state(&self) -> Option<ContextState> {
        self.associations
            .get(&thread::current().id())
            .map(|entry| entry.value().clone())
    }

    /// Replaces the current thread's association without firing events.
    ///
    /// Returns the previous association so that the caller can put it back.
    pub fn restore(&self, state: Option<ContextState>) -> Option<ContextState> {
        let thread = thread::current().id();
        match state {
            Some(state) => self.associations.insert(thread, state),
            None => self.associations.remove(&thread).map(|(_, state)| state),
        }
    }

    /// Removes every association and returns the distinct live states.
    pub(crate) fn drain(&self) -> Vec<ContextState> {
        let mut states: Vec<ContextState> = Vec::new();
        let threads: Vec<ThreadId> = self.associations.iter().map(|entry| *entry.key()).collect();
        for thread in threads {
            if let Some((_, state)) = self.associations.remove(&thread) {
                if !state.is_terminated() && !states.iter().any(|s| s.same_as(&state)) {
                    states.push(state);
                }
            }
        }
        states
    }
}

impl Context for ManagedContext {
    fn scope(&self) -> &ClassName {
        &self.scope
    }

    fn current(&self) -> ContainerResult<ContextState> {
        self.state()
            .filter(|state| !state.is_terminated())
            .ok_or_else(|| ContainerError::context_not_active(self.scope.clone()))
    }
}
