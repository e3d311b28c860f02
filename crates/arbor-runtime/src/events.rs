//! Event delivery to observer methods.
//!
//! Observers are matched on the event type and qualifiers and notified in
//! ascending priority order, then declaration order. Synchronous observers
//! run on the caller's thread and the first failure aborts delivery.
//! Asynchronous observers each run on their own task, with the caller's
//! managed contexts propagated when configured.
//!
//! Context lifecycle events are fired with the `Object` type and one of the
//! `Initialized`, `BeforeDestroyed` or `Destroyed` qualifiers whose `value`
//! is the scope.

use crate::container::Container;
use crate::creational::ContextualInstance;
use crate::error::{ContainerError, ContainerResult};
use crate::interception::Value;
use crate::propagation::ContextSnapshot;
use arbor_build::ObserverInfo;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::creator::BeanInstance;
use arbor_core::error::ArborError;
use arbor_core::types::TypeRef;
use arbor_telemetry::logging::fields;
use arbor_telemetry::metrics;
use futures_util::future::join_all;
use std::fmt;
use tracing::{debug, error};

/// An event as seen by one observer method.
pub struct ObservedEvent<'e> {
    observer: &'e ObserverInfo,
    event_type: &'e TypeRef,
    qualifiers: &'e [AnnotationInstance],
    payload: &'e Value,
    declaring: Option<BeanInstance>,
}

impl<'e> ObservedEvent<'e> {
    /// Identifier of the notified observer method.
    #[must_use]
    pub fn observer(&self) -> &str {
        &self.observer.id
    }

    /// The runtime type of the event.
    #[must_use]
    pub fn event_type(&self) -> &'e TypeRef {
        self.event_type
    }

    /// The event qualifiers.
    #[must_use]
    pub fn qualifiers(&self) -> &'e [AnnotationInstance] {
        self.qualifiers
    }

    /// The event payload.
    #[must_use]
    pub fn payload(&self) -> &'e Value {
        self.payload
    }

    /// The declaring bean instance. `None` for static observer methods.
    #[must_use]
    pub fn declaring(&self) -> Option<&BeanInstance> {
        self.declaring.as_ref()
    }
}

impl fmt::Debug for ObservedEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedEvent")
            .field("observer", &self.observer.id)
            .field("event_type", self.event_type)
            .field("qualifiers", &self.qualifiers)
            .field("payload", self.payload)
            .finish_non_exhaustive()
    }
}

impl Container {
    /// Observers of an event, in notification order.
    pub fn observers_of(&self, event_type: &TypeRef, qualifiers: &[AnnotationInstance], is_async: bool) -> Vec<&ObserverInfo> {
        let deployment = self.deployment();
        let mut observers: Vec<&ObserverInfo> = deployment
            .observers()
            .iter()
            .filter(|observer| observer.is_async == is_async)
            .filter(|observer| observer.observes(event_type, qualifiers, deployment.registry(), deployment.hierarchy()))
            .collect();
        observers.sort_by_key(|observer| (observer.priority, observer.declaration));
        observers
    }

    /// Fires an event to the synchronous observers and returns how many were notified.
    pub fn fire(&self, event_type: &TypeRef, qualifiers: &[AnnotationInstance], payload: &Value) -> ContainerResult<usize> {
        let observers = self.observers_of(event_type, qualifiers, false);
        for observer in &observers {
            self.notify(observer, event_type, qualifiers, payload)?;
        }
        metrics::record_event(observers.len());
        debug!(event = %event_type, { fields::OBSERVERS } = observers.len(), "Event fired");
        Ok(observers.len())
    }

    /// Fires an event to the asynchronous observers, each on its own task.
    ///
    /// Every observer runs even if another fails; the first failure is returned.
    pub async fn fire_async(
        &self,
        event_type: TypeRef,
        qualifiers: Vec<AnnotationInstance>,
        payload: Value,
    ) -> ContainerResult<usize> {
        let ids: Vec<String> = self
            .observers_of(&event_type, &qualifiers, true)
            .into_iter()
            .map(|observer| observer.id.clone())
            .collect();
        let snapshot = ContextSnapshot::capture(self);

        let tasks = ids.iter().map(|id| {
            let container = self.clone();
            let id = id.clone();
            let event_type = event_type.clone();
            let qualifiers = qualifiers.clone();
            let payload = payload.clone();
            tokio::spawn(snapshot.clone().propagate(async move {
                let observer = container
                    .deployment()
                    .observers()
                    .iter()
                    .find(|observer| observer.id == id)
                    .ok_or_else(|| ContainerError::unbound(id.as_str(), "<observer>"))?;
                container.notify(observer, &event_type, &qualifiers, &payload)
            }))
        });

        let mut first_error = None;
        for joined in join_all(tasks).await {
            let result = joined.unwrap_or_else(|e| {
                Err(ContainerError::Creation(ArborError::internal(format!(
                    "Observer task failed: {e}"
                ))))
            });
            if let Err(e) = result {
                error!(error = %e, "Asynchronous observer failed");
                first_error.get_or_insert(e);
            }
        }
        metrics::record_event(ids.len());
        match first_error {
            Some(e) => Err(e),
            None => Ok(ids.len()),
        }
    }

    fn notify(
        &self,
        observer: &ObserverInfo,
        event_type: &TypeRef,
        qualifiers: &[AnnotationInstance],
        payload: &Value,
    ) -> ContainerResult<()> {
        let body = self
            .bindings()
            .observer_for(&observer.id)
            .cloned()
            .ok_or_else(|| ContainerError::unbound(observer.declaring_bean.as_str(), observer.method.as_str()))?;

        let mut dependents: Vec<ContextualInstance> = Vec::new();
        let declaring = if observer.is_static {
            None
        } else {
            let bean = self.bean(observer.declaring_bean.as_str())?;
            Some(self.obtain(bean, &mut dependents)?)
        };

        let event = ObservedEvent {
            observer,
            event_type,
            qualifiers,
            payload,
            declaring,
        };
        let result = body(&event).map_err(|source| ContainerError::Observer {
            observer: observer.id.clone(),
            source,
        });
        for dependent in dependents {
            for failure in self.destroy_instance(dependent) {
                error!(observer = %observer.id, failure = %failure, "Failed to destroy dependent observer instance");
            }
        }
        result
    }
}
