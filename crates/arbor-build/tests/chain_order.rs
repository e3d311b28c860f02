//! Property tests for interception chain ordering.

use arbor_build::{
    BeanInfo, BeanKind, BusinessMethod, CallbackKind, ChainComposer, InterceptorInfo, PriorityTier, TypeHierarchy,
};
use arbor_build::interceptor::InterceptorCallback;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::names::ClassName;
use arbor_core::{Registry, RegistryBuilder};
use proptest::prelude::*;

const BINDING: &str = "acme.Traced";

fn registry() -> Registry {
    let mut builder = RegistryBuilder::new().with_builtins();
    builder.register_interceptor_binding(BINDING, Vec::<String>::new());
    builder.build()
}

fn interceptor(declaration: usize, priority: i32) -> InterceptorInfo {
    let id = format!("acme.Interceptor{declaration}");
    let mut bean = BeanInfo::new(id.as_str(), BeanKind::Class, id.as_str());
    bean.declaration = declaration;
    InterceptorInfo {
        bean,
        bindings: vec![AnnotationInstance::new(BINDING)],
        priority: Some(priority),
        callbacks: vec![InterceptorCallback {
            kind: CallbackKind::AroundInvoke,
            method: "trace".to_string(),
        }],
    }
}

fn traced_bean() -> BeanInfo {
    let mut bean = BeanInfo::new("acme.Service", BeanKind::Class, "acme.Service");
    bean.interceptor_bindings = vec![AnnotationInstance::new(BINDING)];
    bean.methods = vec![BusinessMethod {
        name: "run".to_string(),
        signature: "run()".to_string(),
        bindings: Vec::new(),
        exceptions: Vec::new(),
        is_final: false,
        declared_by: ClassName::new("acme.Service"),
    }];
    bean
}

fn order(interceptors: &[InterceptorInfo]) -> Vec<String> {
    let registry = registry();
    let hierarchy = TypeHierarchy::default();
    let composer = ChainComposer::new(&registry, &hierarchy, interceptors, &[]);
    composer
        .compose(&traced_bean())
        .and_then(|chains| chains.method("run()").cloned())
        .map(|chain| chain.interceptors.into_iter().map(|l| l.interceptor.to_string()).collect())
        .unwrap_or_default()
}

proptest! {
    #[test]
    fn test_order_ignores_input_order(priorities in prop::collection::vec(-500i32..5000, 1..12)) {
        let forward: Vec<InterceptorInfo> = priorities
            .iter()
            .enumerate()
            .map(|(declaration, priority)| interceptor(declaration, *priority))
            .collect();
        let mut backward = forward.clone();
        backward.reverse();

        prop_assert_eq!(order(&forward), order(&backward));
        prop_assert_eq!(order(&forward), order(&forward));
    }

    #[test]
    fn test_order_follows_tier_priority_declaration(priorities in prop::collection::vec(-500i32..5000, 1..12)) {
        let interceptors: Vec<InterceptorInfo> = priorities
            .iter()
            .enumerate()
            .map(|(declaration, priority)| interceptor(declaration, *priority))
            .collect();
        let ids = order(&interceptors);
        prop_assert_eq!(ids.len(), interceptors.len());

        let keys: Vec<(PriorityTier, i32, usize)> = ids
            .iter()
            .map(|id| {
                let declaration: usize = id.trim_start_matches("acme.Interceptor").parse().unwrap();
                let priority = priorities[declaration];
                (PriorityTier::of(priority), priority, declaration)
            })
            .collect();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }
}
