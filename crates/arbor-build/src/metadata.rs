//! Serialisable deployment metadata.
//!
//! A flattened, order-stable view of a validated deployment, meant to be
//! handed to code generators and tooling. Types and annotations are rendered
//! in their display form; entries are sorted by identifier so that two builds
//! of the same index serialise to identical bytes.

use crate::bean::{BeanId, BeanInfo, BeanKind};
use crate::chain::InterceptionChains;
use crate::injection::{InjectionKind, InjectionPoint};
use crate::interceptor::{CallbackKind, DecoratorInfo, InterceptorInfo};
use crate::observer::ObserverInfo;
use crate::removal::RemovedBean;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names::ClassName;
use serde::{Deserialize, Serialize};

/// Metadata of a whole deployment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    /// Beans, by identifier.
    pub beans: Vec<BeanMetadata>,
    /// Enabled and disabled interceptors, by identifier.
    pub interceptors: Vec<InterceptorMetadata>,
    /// Decorators, by identifier.
    pub decorators: Vec<DecoratorMetadata>,
    /// Observer methods, by identifier.
    pub observers: Vec<ObserverMetadata>,
    /// Interception chains, by bean identifier.
    pub chains: Vec<InterceptionChains>,
    /// Beans removed as unused, by identifier.
    pub removed: Vec<RemovedBean>,
}

/// Metadata of one bean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeanMetadata {
    /// Identifier.
    pub id: BeanId,
    /// Bean kind.
    pub kind: BeanKind,
    /// Bean class.
    pub bean_class: ClassName,
    /// Declaring bean of a producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declaring_bean: Option<BeanId>,
    /// Scope annotation.
    pub scope: ClassName,
    /// Bean types.
    pub types: Vec<String>,
    /// Qualifiers.
    pub qualifiers: Vec<String>,
    /// EL name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Alternative flag.
    #[serde(default)]
    pub alternative: bool,
    /// Priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Default bean flag.
    #[serde(default)]
    pub default_bean: bool,
    /// Injection points, in position order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injection_points: Vec<InjectionPointMetadata>,
    /// Post-construct callbacks, superclass first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_construct: Vec<String>,
    /// Pre-destroy callbacks, superclass first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_destroy: Vec<String>,
    /// Disposer method of a producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposer: Option<String>,
}

/// Metadata of one injection point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPointMetadata {
    /// Position within the owner.
    pub position: usize,
    /// Declaration site.
    pub target: String,
    /// Type matched against bean types.
    pub required_type: String,
    /// Required qualifiers.
    pub qualifiers: Vec<String>,
    /// How the point is satisfied.
    pub kind: InjectionKind,
    /// Beans the point resolved to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolved: Vec<BeanId>,
}

/// Metadata of one interceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptorMetadata {
    /// Identifier.
    pub id: BeanId,
    /// Interceptor bindings.
    pub bindings: Vec<String>,
    /// Priority; disabled without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Intercepted kinds.
    pub kinds: Vec<CallbackKind>,
}

/// Metadata of one decorator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratorMetadata {
    /// Identifier.
    pub id: BeanId,
    /// Delegate type.
    pub delegate_type: String,
    /// Decorated types.
    pub decorated_types: Vec<String>,
    /// Priority; disabled without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// Metadata of one observer method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserverMetadata {
    /// Identifier.
    pub id: String,
    /// Declaring bean.
    pub declaring_bean: BeanId,
    /// Observed event type.
    pub observed_type: String,
    /// Observed qualifiers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifiers: Vec<String>,
    /// Notification priority.
    pub priority: i32,
    /// Asynchronous observer.
    #[serde(default)]
    pub is_async: bool,
}

impl DeploymentMetadata {
    /// Collects metadata, sorting every section by identifier.
    #[must_use]
    pub fn collect<'a>(
        beans: impl IntoIterator<Item = &'a BeanInfo>,
        interceptors: &[InterceptorInfo],
        decorators: &[DecoratorInfo],
        observers: &[ObserverInfo],
        chains: impl IntoIterator<Item = &'a InterceptionChains>,
        removed: &[RemovedBean],
    ) -> Self {
        let mut beans: Vec<BeanMetadata> = beans.into_iter().map(BeanMetadata::from).collect();
        beans.sort_by(|a, b| a.id.cmp(&b.id));

        let mut interceptors: Vec<InterceptorMetadata> = interceptors
            .iter()
            .map(|i| InterceptorMetadata {
                id: i.bean.id.clone(),
                bindings: render_annotations(&i.bindings),
                priority: i.priority,
                kinds: i.callbacks.iter().map(|c| c.kind).collect(),
            })
            .collect();
        interceptors.sort_by(|a, b| a.id.cmp(&b.id));

        let mut decorators: Vec<DecoratorMetadata> = decorators
            .iter()
            .map(|d| DecoratorMetadata {
                id: d.bean.id.clone(),
                delegate_type: d.delegate_type.to_string(),
                decorated_types: d.decorated_types.iter().map(ToString::to_string).collect(),
                priority: d.priority,
            })
            .collect();
        decorators.sort_by(|a, b| a.id.cmp(&b.id));

        let mut observers: Vec<ObserverMetadata> = observers
            .iter()
            .map(|o| ObserverMetadata {
                id: o.id.clone(),
                declaring_bean: o.declaring_bean.clone(),
                observed_type: o.observed_type.to_string(),
                qualifiers: render_annotations(&o.qualifiers),
                priority: o.priority,
                is_async: o.is_async,
            })
            .collect();
        observers.sort_by(|a, b| a.id.cmp(&b.id));

        let mut chains: Vec<InterceptionChains> = chains.into_iter().cloned().collect();
        chains.sort_by(|a, b| a.bean.cmp(&b.bean));

        let mut removed = removed.to_vec();
        removed.sort_by(|a, b| a.id.cmp(&b.id));

        Self {
            beans,
            interceptors,
            decorators,
            observers,
            chains,
            removed,
        }
    }

    /// Returns the metadata of a bean.
    #[must_use]
    pub fn bean(&self, id: &str) -> Option<&BeanMetadata> {
        self.beans.iter().find(|b| b.id.as_str() == id)
    }

    /// Serialises the metadata as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses metadata previously produced by [`DeploymentMetadata::to_json`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl From<&BeanInfo> for BeanMetadata {
    fn from(bean: &BeanInfo) -> Self {
        Self {
            id: bean.id.clone(),
            kind: bean.kind,
            bean_class: bean.bean_class.clone(),
            declaring_bean: bean.declaring_bean.clone(),
            scope: bean.scope.clone(),
            types: bean.types.iter().map(ToString::to_string).collect(),
            qualifiers: render_annotations(&bean.qualifiers),
            name: bean.name.clone(),
            alternative: bean.alternative,
            priority: bean.priority,
            default_bean: bean.default_bean,
            injection_points: bean.injection_points.iter().map(InjectionPointMetadata::from).collect(),
            post_construct: bean.post_construct.clone(),
            pre_destroy: bean.pre_destroy.clone(),
            disposer: bean.disposer.as_ref().map(|d| d.signature.clone()),
        }
    }
}

impl From<&InjectionPoint> for InjectionPointMetadata {
    fn from(point: &InjectionPoint) -> Self {
        Self {
            position: point.position,
            target: point.target.to_string(),
            required_type: point.required_type.to_string(),
            qualifiers: render_annotations(&point.qualifiers),
            kind: point.kind,
            resolved: point
                .resolution
                .as_ref()
                .map(|r| r.beans().to_vec())
                .unwrap_or_default(),
        }
    }
}

fn render_annotations(annotations: &[AnnotationInstance]) -> Vec<String> {
    annotations.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injection::InjectionTarget;
    use crate::removal::RemovalReason;
    use crate::resolver::Resolution;
    use arbor_core::names;
    use arbor_core::types::TypeRef;

    const NO_CHAINS: Vec<InterceptionChains> = Vec::new();

    fn bean(id: &str) -> BeanInfo {
        let mut bean = BeanInfo::new(id, BeanKind::Class, id);
        bean.types = vec![TypeRef::class(id), TypeRef::object()];
        bean.qualifiers = vec![AnnotationInstance::new(names::DEFAULT), AnnotationInstance::new(names::ANY)];
        bean
    }

    #[test]
    fn test_sections_sorted_by_id() {
        let beans = [bean("acme.Zeta"), bean("acme.Alpha")];
        let removed = [RemovedBean {
            id: BeanId::new("acme.Unused"),
            kind: BeanKind::Class,
            bean_class: ClassName::new("acme.Unused"),
            reason: RemovalReason::Unused,
        }];
        let metadata = DeploymentMetadata::collect(&beans, &[], &[], &[], &NO_CHAINS, &removed);
        let ids: Vec<&str> = metadata.beans.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["acme.Alpha", "acme.Zeta"]);
        assert_eq!(metadata.removed.len(), 1);
    }

    #[test]
    fn test_injection_point_resolution_is_recorded() {
        let mut consumer = bean("acme.Consumer");
        let mut point = InjectionPoint::new(
            0,
            InjectionTarget::Field { name: "repo".to_string() },
            TypeRef::class("acme.Repo"),
            Vec::new(),
        );
        point.resolution = Some(Resolution::Resolved(BeanId::new("acme.Repo")));
        consumer.injection_points.push(point);

        let metadata = DeploymentMetadata::collect([&consumer], &[], &[], &[], &NO_CHAINS, &[]);
        let point = &metadata.bean("acme.Consumer").unwrap().injection_points[0];
        assert_eq!(point.resolved, vec![BeanId::new("acme.Repo")]);
        assert_eq!(point.kind, InjectionKind::Single);
        assert_eq!(point.target, "field repo");
    }

    #[test]
    fn test_json_is_stable_and_parses_back() {
        let beans = [bean("acme.B"), bean("acme.A")];
        let reversed = [bean("acme.A"), bean("acme.B")];
        let first = DeploymentMetadata::collect(&beans, &[], &[], &[], &NO_CHAINS, &[]);
        let second = DeploymentMetadata::collect(&reversed, &[], &[], &[], &NO_CHAINS, &[]);
        let json = first.to_json().unwrap();
        assert_eq!(json, second.to_json().unwrap());
        assert_eq!(DeploymentMetadata::from_json(&json).unwrap(), first);
    }
}
