//! Typesafe resolution.
//!
//! [`Resolver::resolve`] filters the enabled beans by type and qualifiers and
//! then applies the configured tie-break policy; more than one survivor is an
//! ambiguous resolution. [`Resolver::resolve_all`] is the programmatic
//! multi-select and bypasses the tie-break entirely.

use crate::bean::{BeanId, BeanInfo};
use crate::graph::TypeHierarchy;
use crate::injection::{InjectionKind, InjectionPoint};
use arbor_config::TieBreak;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names;
use arbor_core::registry::Registry;
use arbor_core::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The outcome of resolving a required type and qualifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "beans", rename_all = "snake_case")]
pub enum Resolution {
    /// No bean matches.
    Unsatisfied,
    /// Exactly one bean matches after tie-breaking.
    Resolved(BeanId),
    /// Several beans remain after tie-breaking.
    Ambiguous(Vec<BeanId>),
    /// Every match of a programmatic lookup, priority descending.
    List(Vec<BeanId>),
}

impl Resolution {
    /// Returns `true` if no bean matched.
    #[must_use]
    pub fn is_unsatisfied(&self) -> bool {
        match self {
            Self::Unsatisfied => true,
            Self::List(beans) => beans.is_empty(),
            _ => false,
        }
    }

    /// Returns `true` if several beans remained after tie-breaking.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous(_))
    }

    /// Returns the resolved bean, if exactly one.
    #[must_use]
    pub fn bean(&self) -> Option<&BeanId> {
        match self {
            Self::Resolved(id) => Some(id),
            _ => None,
        }
    }

    /// Returns every bean referenced by the resolution.
    #[must_use]
    pub fn beans(&self) -> &[BeanId] {
        match self {
            Self::Unsatisfied => &[],
            Self::Resolved(id) => std::slice::from_ref(id),
            Self::Ambiguous(ids) | Self::List(ids) => ids,
        }
    }
}

/// Resolves required types against a set of beans.
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    registry: &'a Registry,
    hierarchy: &'a TypeHierarchy,
    beans: Vec<&'a BeanInfo>,
    tie_break: &'a [TieBreak],
}

impl<'a> Resolver<'a> {
    /// Creates a resolver over the given beans.
    pub fn new(
        registry: &'a Registry,
        hierarchy: &'a TypeHierarchy,
        beans: impl IntoIterator<Item = &'a BeanInfo>,
        tie_break: &'a [TieBreak],
    ) -> Self {
        let mut beans: Vec<&BeanInfo> = beans.into_iter().collect();
        beans.sort_by_key(|bean| bean.declaration);
        Self {
            registry,
            hierarchy,
            beans,
            tie_break,
        }
    }

    /// Returns the enabled beans that have a matching type and every required qualifier.
    ///
    /// An empty qualifier list requires `Default`.
    #[must_use]
    pub fn matching(&self, required: &TypeRef, qualifiers: &[AnnotationInstance]) -> Vec<&'a BeanInfo> {
        let qualifiers = required_qualifiers(qualifiers);
        self.beans
            .iter()
            .copied()
            .filter(|bean| bean.is_enabled())
            .filter(|bean| self.has_type(bean, required))
            .filter(|bean| {
                qualifiers
                    .iter()
                    .all(|q| self.registry.has_qualifier(&bean.qualifiers, q))
            })
            .collect()
    }

    /// Resolves to a single bean, applying the tie-break policy.
    #[must_use]
    pub fn resolve(&self, required: &TypeRef, qualifiers: &[AnnotationInstance]) -> Resolution {
        let candidates = self.apply_tie_break(self.matching(required, qualifiers));
        to_resolution(&candidates)
    }

    /// Returns every match ordered by priority descending, then declaration order.
    #[must_use]
    pub fn resolve_all(&self, required: &TypeRef, qualifiers: &[AnnotationInstance]) -> Resolution {
        let mut candidates = self.matching(required, qualifiers);
        candidates.sort_by(|a, b| {
            b.priority
                .unwrap_or(0)
                .cmp(&a.priority.unwrap_or(0))
                .then(a.declaration.cmp(&b.declaration))
        });
        Resolution::List(candidates.iter().map(|bean| bean.id.clone()).collect())
    }

    /// Resolves an injection point; built-in metadata and delegates are not resolved.
    #[must_use]
    pub fn resolve_point(&self, point: &InjectionPoint) -> Option<Resolution> {
        match point.kind {
            InjectionKind::Single | InjectionKind::Optional => {
                Some(self.resolve(&point.required_type, &point.qualifiers))
            }
            InjectionKind::Instance => Some(self.resolve_all(&point.required_type, &point.qualifiers)),
            InjectionKind::Metadata(_) | InjectionKind::Delegate => None,
        }
    }

    /// Resolves a bean name, applying the tie-break policy.
    #[must_use]
    pub fn resolve_name(&self, name: &str) -> Resolution {
        let candidates: Vec<&BeanInfo> = self
            .beans
            .iter()
            .copied()
            .filter(|bean| bean.is_enabled() && bean.name.as_deref() == Some(name))
            .collect();
        to_resolution(&self.apply_tie_break(candidates))
    }

    /// Narrows a candidate set with the configured tie-break steps, in order.
    #[must_use]
    pub fn apply_tie_break(&self, mut candidates: Vec<&'a BeanInfo>) -> Vec<&'a BeanInfo> {
        for step in self.tie_break {
            if candidates.len() <= 1 {
                break;
            }
            candidates = match step {
                TieBreak::DefaultBean => drop_default_beans(candidates),
                TieBreak::AlternativePriority => keep_top_alternatives(candidates),
            };
        }
        candidates
    }

    fn has_type(&self, bean: &BeanInfo, required: &TypeRef) -> bool {
        bean.types
            .iter()
            .any(|ty| required.matches(ty, |sub, sup| self.hierarchy.is_subtype(sub, sup)))
    }
}

fn required_qualifiers(qualifiers: &[AnnotationInstance]) -> Cow<'_, [AnnotationInstance]> {
    if qualifiers.is_empty() {
        Cow::Owned(vec![AnnotationInstance::new(names::DEFAULT)])
    } else {
        Cow::Borrowed(qualifiers)
    }
}

fn drop_default_beans(candidates: Vec<&BeanInfo>) -> Vec<&BeanInfo> {
    if candidates.iter().all(|bean| bean.default_bean) {
        return candidates;
    }
    candidates.into_iter().filter(|bean| !bean.default_bean).collect()
}

fn keep_top_alternatives(candidates: Vec<&BeanInfo>) -> Vec<&BeanInfo> {
    let top = candidates
        .iter()
        .filter(|bean| bean.is_enabled_alternative())
        .filter_map(|bean| bean.priority)
        .max();
    match top {
        Some(top) => candidates
            .into_iter()
            .filter(|bean| bean.is_enabled_alternative() && bean.priority == Some(top))
            .collect(),
        None => candidates,
    }
}

fn to_resolution(candidates: &[&BeanInfo]) -> Resolution {
    match candidates {
        [] => Resolution::Unsatisfied,
        [bean] => Resolution::Resolved(bean.id.clone()),
        many => Resolution::Ambiguous(many.iter().map(|bean| bean.id.clone()).collect()),
    }
}
