//! End-to-end build pipeline scenarios.

use arbor_build::{BeanProcessor, BuildExtension, RegistrationContext, Resolution};
use arbor_config::BuildConfig;
use arbor_core::annotation::AnnotationInstance;
use arbor_core::index::{ClassInfo, FieldInfo, MemoryIndex, MethodInfo, ParameterInfo};
use arbor_core::types::TypeRef;
use arbor_core::{fixtures, names, ErrorCategory};

fn keep_all() -> BuildConfig {
    BuildConfig {
        remove_unused_beans: false,
        ..BuildConfig::default()
    }
}

fn a(name: &str) -> AnnotationInstance {
    AnnotationInstance::new(name)
}

fn priority(value: i32) -> AnnotationInstance {
    a(names::PRIORITY).with("value", value)
}

fn inject(name: &str, ty: impl Into<TypeRef>) -> FieldInfo {
    FieldInfo::new(name, ty).annotated(a(names::INJECT))
}

#[test]
fn test_independent_problems_are_reported_together() {
    let index = MemoryIndex::builder()
        .class(ClassInfo::class("acme.Widget"))
        .class(
            ClassInfo::class("acme.Factory")
                .annotated(a(names::APPLICATION_SCOPED))
                .no_arg_constructor()
                .with_method(MethodInfo::new("make").annotated(a(names::PRODUCES)).returns("acme.Widget"))
                .with_method(
                    MethodInfo::new("close").param(ParameterInfo::new("acme.Widget").annotated(a(names::DISPOSES))),
                )
                .with_method(
                    MethodInfo::new("release").param(ParameterInfo::new("acme.Widget").annotated(a(names::DISPOSES))),
                ),
        )
        .class(ClassInfo::interface("acme.Repo"))
        .class(
            ClassInfo::class("acme.SqlRepo")
                .implements("acme.Repo")
                .annotated(a(names::APPLICATION_SCOPED))
                .no_arg_constructor(),
        )
        .class(
            ClassInfo::class("acme.MemoryRepo")
                .implements("acme.Repo")
                .annotated(a(names::APPLICATION_SCOPED))
                .no_arg_constructor(),
        )
        .class(
            ClassInfo::class("acme.Consumer")
                .annotated(a(names::SINGLETON))
                .with_field(inject("repo", "acme.Repo")),
        )
        .build();

    let config = keep_all();
    let err = BeanProcessor::new(&index, &config).process().unwrap_err();

    assert_eq!(err.count(ErrorCategory::AmbiguousResolution), 1);
    assert!(err
        .problems()
        .iter()
        .any(|p| p.message.contains("Multiple disposer methods found for acme.Factory#make()")));
    let text = err.to_string();
    assert!(text.starts_with("Found 2 deployment problems:"));
    assert!(text.contains("acme.SqlRepo"));
    assert!(text.contains("acme.MemoryRepo"));
}

struct QualifierRegistrar;

impl BuildExtension for QualifierRegistrar {
    fn name(&self) -> &'static str {
        "qualifier-registrar"
    }

    fn register(&self, ctx: &mut RegistrationContext<'_>) {
        ctx.register_qualifier(fixtures::TO_BE_QUALIFIER, Vec::<String>::new())
            .register_qualifier(fixtures::BINDING_FIELD_QUALIFIER, ["age"]);
    }
}

#[test]
fn test_dynamically_registered_qualifiers() {
    let index = fixtures::qualifier_index();
    let config = keep_all();
    let deployment = BeanProcessor::new(&index, &config)
        .extension(QualifierRegistrar)
        .process()
        .unwrap();
    let resolver = deployment.resolver();

    let alpha = TypeRef::class(fixtures::ALPHA);
    assert!(resolver.resolve(&alpha, &[]).is_unsatisfied());
    assert_eq!(
        resolver.resolve(&alpha, &[a(fixtures::TO_BE_QUALIFIER)]).bean().map(|b| b.as_str()),
        Some(fixtures::ALPHA)
    );

    let bravo = TypeRef::class(fixtures::BRAVO);
    let same_age = a(fixtures::BINDING_FIELD_QUALIFIER).with("value", "Y").with("age", 10);
    let other_age = a(fixtures::BINDING_FIELD_QUALIFIER).with("value", "X").with("age", 1);
    assert!(matches!(resolver.resolve(&bravo, &[same_age]), Resolution::Resolved(_)));
    assert!(resolver.resolve(&bravo, &[other_age]).is_unsatisfied());
}

#[test]
fn test_unregistered_qualifier_is_ignored() {
    let index = fixtures::qualifier_index();
    let config = keep_all();
    let deployment = BeanProcessor::new(&index, &config).process().unwrap();
    let alpha = TypeRef::class(fixtures::ALPHA);
    assert!(matches!(deployment.resolver().resolve(&alpha, &[]), Resolution::Resolved(_)));
}

#[test]
fn test_normal_scoped_record_producer_is_a_deployment_error() {
    let index = MemoryIndex::builder()
        .class(ClassInfo::record("acme.Settings"))
        .class(
            ClassInfo::class("acme.SettingsProducer")
                .annotated(a(names::APPLICATION_SCOPED))
                .no_arg_constructor()
                .with_method(
                    MethodInfo::new("settings")
                        .annotated(a(names::PRODUCES))
                        .annotated(a(names::APPLICATION_SCOPED))
                        .returns("acme.Settings"),
                ),
        )
        .build();
    let config = keep_all();
    let err = BeanProcessor::new(&index, &config).process().unwrap_err();
    assert_eq!(err.count(ErrorCategory::Deployment), 1);
    assert_eq!(err.category(), ErrorCategory::Deployment);
}

#[test]
fn test_intercepted_bean_metadata_of_wrong_type() {
    let index = MemoryIndex::builder()
        .class(ClassInfo::annotation_type("acme.Audited").annotated(a(names::INTERCEPTOR_BINDING)))
        .class(
            ClassInfo::class("acme.AuditInterceptor")
                .annotated(a(names::INTERCEPTOR))
                .annotated(a("acme.Audited"))
                .annotated(priority(10))
                .with_field(inject(
                    "bean",
                    TypeRef::parameterized(names::INTERCEPTED_BEAN, vec![TypeRef::class("acme.Other")]),
                ))
                .with_method(
                    MethodInfo::new("audit")
                        .annotated(a(names::AROUND_INVOKE))
                        .returns(names::OBJECT),
                ),
        )
        .build();
    let config = keep_all();
    let err = BeanProcessor::new(&index, &config).process().unwrap_err();
    assert_eq!(err.count(ErrorCategory::Definition), 1);
}

#[test]
fn test_alternative_priority_selects_and_lists() {
    let index = MemoryIndex::builder()
        .class(ClassInfo::interface("acme.Payment"))
        .class(
            ClassInfo::class("acme.Card")
                .implements("acme.Payment")
                .annotated(a(names::APPLICATION_SCOPED))
                .no_arg_constructor(),
        )
        .class(
            ClassInfo::class("acme.Crypto")
                .implements("acme.Payment")
                .annotated(a(names::APPLICATION_SCOPED))
                .annotated(a(names::ALTERNATIVE))
                .annotated(priority(10))
                .no_arg_constructor(),
        )
        .class(
            ClassInfo::class("acme.Cash")
                .implements("acme.Payment")
                .annotated(a(names::APPLICATION_SCOPED))
                .annotated(a(names::ALTERNATIVE))
                .no_arg_constructor(),
        )
        .class(
            ClassInfo::class("acme.Checkout")
                .annotated(a(names::SINGLETON))
                .with_field(inject("payment", "acme.Payment")),
        )
        .build();
    let config = keep_all();
    let deployment = BeanProcessor::new(&index, &config).process().unwrap();

    let payment = TypeRef::class("acme.Payment");
    let resolver = deployment.resolver();
    assert_eq!(
        resolver.resolve(&payment, &[]).bean().map(|b| b.as_str()),
        Some("acme.Crypto")
    );
    let Resolution::List(all) = resolver.resolve_all(&payment, &[]) else {
        panic!("expected a list");
    };
    let all: Vec<&str> = all.iter().map(|id| id.as_str()).collect();
    assert_eq!(all, vec!["acme.Crypto", "acme.Card"]);

    assert!(deployment
        .warnings()
        .iter()
        .any(|w| w.target.as_deref() == Some("acme.Cash")));
}

#[test]
fn test_builds_are_deterministic() {
    let config = keep_all();
    let first = BeanProcessor::new(&fixtures::greeting_index(), &config).process().unwrap();
    let second = BeanProcessor::new(&fixtures::greeting_index(), &config).process().unwrap();
    let first = first.metadata().unwrap().to_json().unwrap();
    let second = second.metadata().unwrap().to_json().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_conflicting_components_are_a_deployment_error() {
    let mut index = MemoryIndex::builder()
        .class(ClassInfo::class("acme.Dup").annotated(a(names::APPLICATION_SCOPED)).no_arg_constructor())
        .class(ClassInfo::class("acme.Helper"))
        .build();
    let conflicts = index.merge(
        MemoryIndex::builder()
            .class(ClassInfo::class("acme.Dup").annotated(a(names::SINGLETON)).no_arg_constructor())
            .class(ClassInfo::class("acme.Helper").no_arg_constructor())
            .build(),
    );
    assert_eq!(conflicts.len(), 2);

    let config = keep_all();
    let err = BeanProcessor::new(&index, &config).process().unwrap_err();

    assert_eq!(err.count(ErrorCategory::Deployment), 1);
    let duplicate = &err.problems()[0];
    assert!(duplicate.message.starts_with("Duplicate bean definition: acme.Dup"));
    assert_eq!(duplicate.target.as_deref(), Some("acme.Dup"));
}

#[test]
fn test_identical_components_merge_cleanly() {
    let component = || {
        MemoryIndex::builder()
            .class(ClassInfo::class("acme.Shared").annotated(a(names::SINGLETON)).no_arg_constructor())
            .build()
    };
    let mut index = component();
    assert!(index.merge(component()).is_empty());

    let config = keep_all();
    let deployment = BeanProcessor::new(&index, &config).process().unwrap();
    assert!(deployment.bean("acme.Shared").is_some());
}
