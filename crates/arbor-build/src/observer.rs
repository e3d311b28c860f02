//! Observer method nodes.

use crate::bean::BeanId;
use crate::graph::TypeHierarchy;
use crate::injection::InjectionPoint;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names;
use arbor_core::registry::Registry;
use arbor_core::types::TypeRef;
use serde::{Deserialize, Serialize};

/// Priority of observers that declare none, the midpoint of the application range.
pub const DEFAULT_OBSERVER_PRIORITY: i32 = 2500;

/// An observer method bound to an event type and qualifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverInfo {
    /// `Declaring#method(Param, ...)`.
    pub id: String,
    /// Bean that declares the method.
    pub declaring_bean: BeanId,
    /// Method signature.
    pub method: String,
    /// Observed event type.
    pub observed_type: TypeRef,
    /// Observed qualifiers; an observer without qualifiers observes every event of its type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<AnnotationInstance>,
    /// Position of the event parameter.
    pub event_position: usize,
    /// Notification order, ascending.
    pub priority: i32,
    /// Declared with `ObservesAsync`.
    #[serde(default)]
    pub is_async: bool,
    /// `static` method; no declaring instance is needed.
    #[serde(default)]
    pub is_static: bool,
    /// Injection points of the remaining parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injection_points: Vec<InjectionPoint>,
    /// Discovery order.
    pub declaration: usize,
}

impl ObserverInfo {
    /// Returns `true` if an event of `event_type` with `event_qualifiers` is delivered to this observer.
    #[must_use]
    pub fn observes(
        &self,
        event_type: &TypeRef,
        event_qualifiers: &[AnnotationInstance],
        registry: &Registry,
        hierarchy: &TypeHierarchy,
    ) -> bool {
        let type_matches = self.observed_type.is_object()
            || self
                .observed_type
                .matches(event_type, |a, b| hierarchy.is_subtype(a, b))
            || match (&self.observed_type, event_type.raw_name()) {
                (TypeRef::Class { name }, Some(raw)) => hierarchy.is_subtype(raw, name),
                _ => false,
            };

        type_matches
            && self
                .qualifiers
                .iter()
                .all(|q| q.is(names::ANY) || registry.has_qualifier(event_qualifiers, q))
    }
}
