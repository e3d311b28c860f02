//! Carrying managed contexts across asynchronous boundaries.
//!
//! Associations of managed contexts are per thread, while a task may be
//! polled on any worker thread. Two wrappers restore the right association
//! around every poll:
//!
//! - [`Propagated`] borrows the states captured by a [`ContextSnapshot`]. It
//!   never ends them; the owner (usually the originating thread) does.
//! - [`OwnedRequestContext`] owns a fresh request context and ends it exactly
//!   once, when the future completes or is dropped before completing.
//!
//! In both cases the poller's prior association is put back on every exit
//! path, including panics and cancellation.
//!
//! # Example
//!
//! ```no_run
//! # async fn example(container: arbor_runtime::Container) -> Result<(), arbor_runtime::ContainerError> {
//! use arbor_runtime::propagation::{with_request_context, ContextSnapshot};
//!
//! container.activate_request()?;
//! let snapshot = ContextSnapshot::capture(&container);
//! let handle = tokio::spawn(snapshot.propagate(async {
//!     // sees the caller's request context
//! }));
//! let _ = handle.await;
//! container.deactivate_request()?;
//!
//! with_request_context(&container, async {
//!     // runs inside a fresh request context, ended on completion
//! })?
//! .await;
//! # Ok(())
//! # }
//! ```

use crate::container::Container;
use crate::context::ContextState;
use crate::error::ContainerResult;
use arbor_core::names::{self, ClassName};
use arbor_telemetry::logging::fields;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tracing::error;

/// The managed context states active on a thread, captured for another thread.
#[derive(Clone)]
pub struct ContextSnapshot {
    container: Container,
    states: Vec<(ClassName, ContextState)>,
}

impl ContextSnapshot {
    /// Captures the caller's managed context states.
    ///
    /// Returns an empty snapshot when context propagation is disabled.
    pub fn capture(container: &Container) -> Self {
        let states = if container.config().propagate_contexts {
            container
                .managed_contexts()
                .filter_map(|context| {
                    context
                        .state()
                        .filter(|state| !state.is_terminated())
                        .map(|state| (state.scope().clone(), state))
                })
                .collect()
        } else {
            Vec::new()
        };
        Self {
            container: container.clone(),
            states,
        }
    }

    /// Returns `true` if no state was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Scopes whose state was captured.
    pub fn scopes(&self) -> impl Iterator<Item = &ClassName> {
        self.states.iter().map(|(scope, _)| scope)
    }

    /// Associates the captured states with the current thread until the guard drops.
    pub fn enter(&self) -> RestoreGuard {
        let entries = self.states.iter().map(|(scope, state)| (scope.clone(), Some(state.clone())));
        RestoreGuard::apply(&self.container, entries)
    }

    /// Wraps a future so that every poll sees the captured states.
    pub fn propagate<F: Future>(self, future: F) -> Propagated<F> {
        Propagated {
            snapshot: self,
            future: Some(Box::pin(future)),
        }
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSnapshot").field("states", &self.states).finish()
    }
}

/// Restores the prior associations of the current thread when dropped.
#[must_use = "the prior association is restored when the guard drops"]
pub struct RestoreGuard {
    container: Container,
    prior: Vec<(ClassName, Option<ContextState>)>,
}

impl RestoreGuard {
    fn apply(container: &Container, entries: impl IntoIterator<Item = (ClassName, Option<ContextState>)>) -> Self {
        let prior = entries
            .into_iter()
            .filter_map(|(scope, state)| {
                let context = container.managed_context(scope.as_str()).ok()?;
                Some((scope, context.restore(state)))
            })
            .collect();
        Self {
            container: container.clone(),
            prior,
        }
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        for (scope, prior) in self.prior.drain(..).rev() {
            if let Ok(context) = self.container.managed_context(scope.as_str()) {
                context.restore(prior);
            }
        }
    }
}

impl fmt::Debug for RestoreGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestoreGuard").field("prior", &self.prior).finish()
    }
}

/// A future that runs with borrowed context states.
pub struct Propagated<F> {
    snapshot: ContextSnapshot,
    future: Option<Pin<Box<F>>>,
}

impl<F: Future> Future for Propagated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let _restore = this.snapshot.enter();
        match this.future.as_mut() {
            Some(future) => future.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }
}

impl<F> Drop for Propagated<F> {
    fn drop(&mut self) {
        if let Some(future) = self.future.take() {
            let _restore = self.snapshot.enter();
            drop(future);
        }
    }
}

impl<F> fmt::Debug for Propagated<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Propagated").field("snapshot", &self.snapshot).finish_non_exhaustive()
    }
}

/// Runs `future` inside a fresh request context owned by the returned future.
///
/// The context is activated now (firing `Initialized`) and ended exactly once
/// when the future completes or is dropped.
pub fn with_request_context<F: Future>(container: &Container, future: F) -> ContainerResult<OwnedRequestContext<F>> {
    let state = container.managed_context(names::REQUEST_SCOPED)?.create_state();
    container.opened(&state)?;
    Ok(OwnedRequestContext {
        container: container.clone(),
        state: Some(state),
        future: Some(Box::pin(future)),
    })
}

/// A future that owns the request context it runs in.
pub struct OwnedRequestContext<F> {
    container: Container,
    state: Option<ContextState>,
    future: Option<Pin<Box<F>>>,
}

impl<F> OwnedRequestContext<F> {
    /// The owned request context, until it ends.
    #[must_use]
    pub fn state(&self) -> Option<&ContextState> {
        self.state.as_ref()
    }

    fn enter(&self) -> Option<RestoreGuard> {
        self.state.as_ref().map(|state| {
            RestoreGuard::apply(
                &self.container,
                [(ClassName::new(names::REQUEST_SCOPED), Some(state.clone()))],
            )
        })
    }

    fn end(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        let failures = {
            let _restore = RestoreGuard::apply(
                &self.container,
                [(ClassName::new(names::REQUEST_SCOPED), Some(state.clone()))],
            );
            let mut failures = Vec::new();
            if let Err(e) = self
                .container
                .fire_lifecycle(names::BEFORE_DESTROYED, names::REQUEST_SCOPED)
            {
                failures.push(e.to_string());
            }
            failures.extend(self.container.close(&state));
            failures
        };
        for failure in failures {
            error!({ fields::CONTEXT_ID } = %state.id(), failure = %failure, "Request context cleanup failed");
        }
    }
}

impl<F: Future> Future for OwnedRequestContext<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<F::Output> {
        let this = self.get_mut();
        let polled = {
            let _restore = this.enter();
            match this.future.as_mut() {
                Some(future) => future.as_mut().poll(cx),
                None => Poll::Pending,
            }
        };
        if polled.is_ready() {
            this.future = None;
            this.end();
        }
        polled
    }
}

impl<F> Drop for OwnedRequestContext<F> {
    fn drop(&mut self) {
        if let Some(future) = self.future.take() {
            let _restore = self.enter();
            drop(future);
        }
        self.end();
    }
}

impl<F> fmt::Debug for OwnedRequestContext<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedRequestContext").field("state", &self.state).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::Bindings;
    use arbor_build::BeanProcessor;
    use arbor_config::{BuildConfig, RuntimeConfig};
    use arbor_core::fixtures;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use uuid::Uuid;

    fn container() -> Container {
        let deployment = BeanProcessor::new(&fixtures::greeting_index(), &BuildConfig::default())
            .process()
            .unwrap();
        Container::start(deployment, Bindings::new(), &RuntimeConfig::default()).unwrap()
    }

    fn current(container: &Container) -> Option<Uuid> {
        container
            .managed_context(names::REQUEST_SCOPED)
            .ok()?
            .state()
            .map(|state| state.id())
    }

    #[test]
    fn test_owned_context_restores_prior_association_between_polls() {
        let container = container();
        let outer = container.activate_request().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = {
            let seen = Arc::clone(&seen);
            let container = container.clone();
            move || seen.lock().push(current(&container))
        };

        let owned = with_request_context(&container, async move {
            probe();
            futures_util::pending!();
            probe();
        })
        .unwrap();
        let mut task = tokio_test::task::spawn(owned);

        assert!(task.poll().is_pending());
        assert_eq!(current(&container), Some(outer.id()));
        assert!(task.poll().is_ready());
        assert_eq!(current(&container), Some(outer.id()));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert_ne!(seen[0], Some(outer.id()));
        container.deactivate_request().unwrap();
    }

    #[test]
    fn test_snapshot_is_visible_on_another_thread() {
        let container = container();
        let state = container.activate_request().unwrap();
        let snapshot = ContextSnapshot::capture(&container);
        assert_eq!(snapshot.scopes().count(), 1);

        let remote = container.clone();
        let seen = std::thread::spawn(move || {
            let inside = tokio_test::block_on(snapshot.propagate(async { current(&remote) }));
            (inside, current(&remote))
        })
        .join()
        .unwrap();

        assert_eq!(seen, (Some(state.id()), None));
        assert!(!state.is_terminated());
        container.deactivate_request().unwrap();
    }

    #[test]
    fn test_guard_restores_prior_association_when_dropped() {
        let container = container();
        let state = container.activate_request().unwrap();
        let snapshot = ContextSnapshot::capture(&container);
        container.deactivate_request().unwrap();
        assert_eq!(current(&container), None);

        // A terminated state is still associated while the guard lives.
        let guard = snapshot.enter();
        assert_eq!(current(&container), Some(state.id()));
        drop(guard);
        assert_eq!(current(&container), None);
    }
}
