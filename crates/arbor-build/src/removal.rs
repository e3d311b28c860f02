//! Unused bean removal.
//!
//! A bean is unused when no injection point or programmatic lookup resolves
//! to it and nothing else keeps it alive: a name, observer methods, a
//! configured or extension-added exclusion, or the `Unremovable` marker.
//! Producers are examined first; the declaring bean of producers that are
//! all unused is removed in a second pass.

use crate::bean::{BeanId, BeanInfo, BeanKind};
use crate::extension::BeanExclusion;
use crate::graph::BeanGraph;
use arbor_config::BuildConfig;
use arbor_core::names::ClassName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Why a bean was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// Nothing injects or looks up the bean.
    Unused,
    /// The bean only declares producers, and none of them is used.
    UnusedProducers,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unused => f.write_str("not injected or looked up"),
            Self::UnusedProducers => f.write_str("all declared producers are unused"),
        }
    }
}

/// A bean removed from the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedBean {
    /// Identifier of the removed bean.
    pub id: BeanId,
    /// Bean kind.
    pub kind: BeanKind,
    /// Bean class (the declaring class for producers).
    pub bean_class: ClassName,
    /// Why it was removed.
    pub reason: RemovalReason,
}

impl RemovedBean {
    fn of(bean: &BeanInfo, reason: RemovalReason) -> Self {
        Self {
            id: bean.id.clone(),
            kind: bean.kind,
            bean_class: bean.bean_class.clone(),
            reason,
        }
    }
}

/// Computes the beans that unused bean removal would remove.
#[must_use]
pub fn find_unused(graph: &BeanGraph, config: &BuildConfig, exclusions: &[BeanExclusion]) -> Vec<RemovedBean> {
    let injected: BTreeSet<&BeanId> = graph
        .injection_points()
        .filter_map(|(_, point)| point.resolution.as_ref())
        .flat_map(|resolution| resolution.beans())
        .collect();
    let observer_owners: BTreeSet<&BeanId> = graph.observers().iter().map(|o| &o.declaring_bean).collect();
    let producer_owners: BTreeSet<&BeanId> = graph.beans().filter_map(|b| b.declaring_bean.as_ref()).collect();

    let kept = |bean: &BeanInfo| {
        injected.contains(&bean.id)
            || bean.name.is_some()
            || bean.unremovable
            || observer_owners.contains(&bean.id)
            || is_configured_unremovable(bean, config)
            || exclusions.iter().any(|exclusion| exclusion.excludes(bean))
    };

    let mut removed = Vec::new();
    let mut unused_producers: BTreeSet<&BeanId> = BTreeSet::new();
    for bean in graph.beans() {
        if kept(bean) || producer_owners.contains(&bean.id) {
            continue;
        }
        if bean.is_producer() {
            unused_producers.insert(&bean.id);
        }
        removed.push(RemovedBean::of(bean, RemovalReason::Unused));
    }

    for bean in graph.beans().filter(|b| producer_owners.contains(&b.id)) {
        if kept(bean) {
            continue;
        }
        let all_unused = graph
            .beans()
            .filter(|p| p.declaring_bean.as_ref() == Some(&bean.id))
            .all(|p| unused_producers.contains(&p.id));
        if all_unused {
            removed.push(RemovedBean::of(bean, RemovalReason::UnusedProducers));
        }
    }

    for entry in &removed {
        debug!(bean = %entry.id, reason = %entry.reason, "Unused bean");
    }
    removed
}

fn is_configured_unremovable(bean: &BeanInfo, config: &BuildConfig) -> bool {
    config.is_unremovable(bean.bean_class.as_str())
        || bean
            .types
            .iter()
            .filter_map(|ty| ty.raw_name())
            .any(|raw| config.is_unremovable(raw.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::{InjectionPoint, InjectionTarget};
    use crate::observer::{ObserverInfo, DEFAULT_OBSERVER_PRIORITY};
    use crate::resolver::Resolution;
    use arbor_core::types::TypeRef;

    fn bean(id: &str) -> BeanInfo {
        let mut bean = BeanInfo::new(id, BeanKind::Class, id);
        bean.types = vec![TypeRef::class(id), TypeRef::object()];
        bean
    }

    fn producer(declaring: &str, member: &str) -> BeanInfo {
        let id = format!("{declaring}#{member}");
        let mut bean = BeanInfo::new(id, BeanKind::ProducerMethod, declaring);
        bean.declaring_bean = Some(BeanId::new(declaring));
        bean
    }

    fn inject(into: &mut BeanInfo, target: &str) {
        let mut point = InjectionPoint::new(
            into.injection_points.len(),
            InjectionTarget::Field {
                name: "dep".to_string(),
            },
            TypeRef::class(target),
            Vec::new(),
        );
        point.resolution = Some(Resolution::Resolved(BeanId::new(target)));
        into.injection_points.push(point);
    }

    fn graph(beans: Vec<BeanInfo>) -> BeanGraph {
        let mut graph = BeanGraph::default();
        for bean in beans {
            graph.beans.insert(bean.id.clone(), bean);
        }
        graph
    }

    fn removed_ids(removed: &[RemovedBean]) -> Vec<&str> {
        removed.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_injected_bean_is_kept() {
        let mut service = bean("acme.Service");
        service.unremovable = true;
        inject(&mut service, "acme.Repo");
        let graph = graph(vec![service, bean("acme.Repo"), bean("acme.Orphan")]);

        let removed = find_unused(&graph, &BuildConfig::default(), &[]);
        assert_eq!(removed_ids(&removed), vec!["acme.Orphan"]);
        assert_eq!(removed[0].reason, RemovalReason::Unused);
    }

    #[test]
    fn test_named_configured_and_excluded_beans_are_kept() {
        let mut named = bean("acme.Named");
        named.name = Some("named".to_string());
        let config = BuildConfig {
            unremovable_types: vec!["acme.Configured".to_string()],
            ..BuildConfig::default()
        };
        let graph = graph(vec![named, bean("acme.Configured"), bean("acme.Excluded")]);
        let exclusions = [BeanExclusion::Class(ClassName::new("acme.Excluded"))];

        assert!(find_unused(&graph, &config, &exclusions).is_empty());
    }

    #[test]
    fn test_observer_owner_is_kept() {
        let mut graph = graph(vec![bean("acme.Listener")]);
        graph.observers.push(ObserverInfo {
            id: "acme.Listener#on(acme.Event)".to_string(),
            declaring_bean: BeanId::new("acme.Listener"),
            method: "on(acme.Event)".to_string(),
            observed_type: TypeRef::class("acme.Event"),
            qualifiers: Vec::new(),
            event_position: 0,
            priority: DEFAULT_OBSERVER_PRIORITY,
            is_async: false,
            is_static: false,
            injection_points: Vec::new(),
            declaration: 0,
        });
        assert!(find_unused(&graph, &BuildConfig::default(), &[]).is_empty());
    }

    #[test]
    fn test_declaring_bean_of_unused_producers_is_removed() {
        let graph = graph(vec![
            bean("acme.Factory"),
            producer("acme.Factory", "a()"),
            producer("acme.Factory", "b()"),
        ]);
        let removed = find_unused(&graph, &BuildConfig::default(), &[]);
        assert_eq!(
            removed_ids(&removed),
            vec!["acme.Factory#a()", "acme.Factory#b()", "acme.Factory"]
        );
        assert_eq!(removed[2].reason, RemovalReason::UnusedProducers);
    }

    #[test]
    fn test_declaring_bean_of_used_producer_is_kept() {
        let mut consumer = bean("acme.Consumer");
        consumer.unremovable = true;
        inject(&mut consumer, "acme.Factory#a()");
        let graph = graph(vec![
            consumer,
            bean("acme.Factory"),
            producer("acme.Factory", "a()"),
            producer("acme.Factory", "b()"),
        ]);
        let removed = find_unused(&graph, &BuildConfig::default(), &[]);
        assert_eq!(removed_ids(&removed), vec!["acme.Factory#b()"]);
    }
}
