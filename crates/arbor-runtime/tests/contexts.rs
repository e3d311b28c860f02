//! Scope contexts, lifecycle events and context propagation.

use arbor_build::{BeanProcessor, Deployment};
use arbor_config::{BuildConfig, RuntimeConfig};
use arbor_core::annotation::AnnotationInstance;
use arbor_core::creator::{instance, CreationContext, Inject};
use arbor_core::index::{ClassInfo, FieldInfo, MemoryIndex, MethodInfo, ParameterInfo};
use arbor_core::names;
use arbor_core::types::TypeRef;
use arbor_runtime::{with_request_context, Bindings, Container, ContainerError, ContextSnapshot};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

const CART: &str = "acme.shop.Cart";
const TRACKER: &str = "acme.shop.Tracker";
const TOOL: &str = "acme.shop.Tool";
const WORKSHOP: &str = "acme.shop.Workshop";

struct Cart {
    id: u64,
}

struct Tool {
    id: u64,
}

struct Workshop {
    left: Inject<Tool>,
    right: Inject<Tool>,
}

#[derive(Default)]
struct Counters {
    next_id: AtomicU64,
    closed: AtomicUsize,
    initialized: AtomicUsize,
    before_destroyed: AtomicUsize,
    destroyed: AtomicUsize,
}

impl Counters {
    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

fn a(name: &str) -> AnnotationInstance {
    AnnotationInstance::new(name)
}

fn lifecycle_observer(method: &str, qualifier: &str) -> MethodInfo {
    MethodInfo::new(method).param(
        ParameterInfo::new(names::OBJECT)
            .annotated(a(names::OBSERVES))
            .annotated(a(qualifier).with("value", TypeRef::class(names::REQUEST_SCOPED))),
    )
}

fn deployment() -> Deployment {
    let index = MemoryIndex::builder()
        .class(
            ClassInfo::class(CART)
                .annotated(a(names::REQUEST_SCOPED))
                .no_arg_constructor()
                .with_method(MethodInfo::new("close").annotated(a(names::PRE_DESTROY))),
        )
        .class(
            ClassInfo::class(TRACKER)
                .annotated(a(names::APPLICATION_SCOPED))
                .no_arg_constructor()
                .with_method(lifecycle_observer("onInit", names::INITIALIZED))
                .with_method(lifecycle_observer("onBeforeDestroyed", names::BEFORE_DESTROYED))
                .with_method(lifecycle_observer("onDestroyed", names::DESTROYED)),
        )
        .class(ClassInfo::class(TOOL).annotated(a(names::DEPENDENT)))
        .class(
            ClassInfo::class(WORKSHOP)
                .annotated(a(names::SINGLETON))
                .with_field(FieldInfo::new("left", TOOL).annotated(a(names::INJECT)))
                .with_field(FieldInfo::new("right", TOOL).annotated(a(names::INJECT))),
        )
        .build();
    let config = BuildConfig {
        remove_unused_beans: false,
        ..BuildConfig::default()
    };
    BeanProcessor::new(&index, &config).process().unwrap()
}

fn bindings(counters: &Arc<Counters>) -> Bindings {
    let observer = |method: &str| format!("{TRACKER}#{method}({})", names::OBJECT);
    let (carts, closed, tools) = (Arc::clone(counters), Arc::clone(counters), Arc::clone(counters));
    let (initialized, before, destroyed) = (Arc::clone(counters), Arc::clone(counters), Arc::clone(counters));

    Bindings::new()
        .factory(CART, move |_: &mut dyn CreationContext| Ok(instance(Cart { id: carts.next() })))
        .callback(CART, "close", move |_| {
            closed.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .factory(TRACKER, |_: &mut dyn CreationContext| Ok(instance(())))
        .factory(TOOL, move |_: &mut dyn CreationContext| Ok(instance(Tool { id: tools.next() })))
        .factory(WORKSHOP, |ctx: &mut dyn CreationContext| {
            let left = ctx.get::<Tool>(0)?;
            let right = ctx.get::<Tool>(1)?;
            Ok(instance(Workshop { left, right }))
        })
        .observer(observer("onInit"), move |_| {
            initialized.initialized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .observer(observer("onBeforeDestroyed"), move |_| {
            before.before_destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .observer(observer("onDestroyed"), move |_| {
            destroyed.destroyed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
}

fn start(config: &RuntimeConfig) -> (Container, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let container = Container::start(deployment(), bindings(&counters), config).unwrap();
    (container, counters)
}

fn cart(container: &Container) -> Result<Arc<Cart>, ContainerError> {
    container.select(&TypeRef::class(CART), &[]).get::<Cart>()
}

#[test]
fn test_dependent_beans_are_distinct_per_injection_point() {
    let (container, _) = start(&RuntimeConfig::default());
    let workshop = container.select(&TypeRef::class(WORKSHOP), &[]).get::<Workshop>().unwrap();

    let left = workshop.left.get().unwrap();
    let right = workshop.right.get().unwrap();
    assert!(!workshop.left.is_proxy());
    assert!(!Arc::ptr_eq(&left, &right));
    assert_ne!(left.id, right.id);
    container.shutdown().unwrap();
}

#[test]
fn test_request_scoped_bean_is_shared_within_one_activation() {
    let (container, counters) = start(&RuntimeConfig::default());

    container.activate_request().unwrap();
    let first = cart(&container).unwrap();
    let again = cart(&container).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    container.deactivate_request().unwrap();
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);

    container.activate_request().unwrap();
    let second = cart(&container).unwrap();
    assert_ne!(first.id, second.id);
    container.deactivate_request().unwrap();
    container.shutdown().unwrap();
}

#[test]
fn test_lookup_before_activation_fails() {
    let (container, _) = start(&RuntimeConfig::default());
    let err = cart(&container).err().unwrap();
    assert!(matches!(err, ContainerError::ContextNotActive { .. }));
    assert!(!container.is_active(names::REQUEST_SCOPED));
    container.shutdown().unwrap();
}

#[test]
fn test_lifecycle_events_fire_once_per_activation() {
    let (container, counters) = start(&RuntimeConfig::default());

    container.activate_request().unwrap();
    assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
    assert_eq!(counters.before_destroyed.load(Ordering::SeqCst), 0);

    container.deactivate_request().unwrap();
    assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
    assert_eq!(counters.before_destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);

    let err = container.deactivate_request().err().unwrap();
    assert!(matches!(err, ContainerError::ContextNotActive { .. }));
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    container.shutdown().unwrap();
}

#[test]
fn test_lenient_deactivation_of_inactive_context() {
    let config = RuntimeConfig {
        strict_deactivation: false,
        ..RuntimeConfig::default()
    };
    let (container, counters) = start(&config);
    container.deactivate_request().unwrap();
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 0);
    container.shutdown().unwrap();
}

#[test]
fn test_double_activation_is_rejected() {
    let (container, _) = start(&RuntimeConfig::default());
    container.activate_request().unwrap();
    let err = container.activate_request().err().unwrap();
    assert!(matches!(err, ContainerError::ContextAlreadyActive { .. }));
    container.deactivate_request().unwrap();
    container.shutdown().unwrap();
}

#[test]
fn test_shutdown_ends_request_contexts_still_active() {
    let (container, counters) = start(&RuntimeConfig::default());
    container.activate_request().unwrap();
    cart(&container).unwrap();

    container.shutdown().unwrap();
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    assert!(matches!(cart(&container), Err(ContainerError::NotRunning)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_propagates_request_context_to_spawned_task() {
    let (container, counters) = start(&RuntimeConfig::default());
    container.activate_request().unwrap();
    let mine = cart(&container).unwrap();

    let snapshot = ContextSnapshot::capture(&container);
    assert!(!snapshot.is_empty());
    let spawned = container.clone();
    let seen = tokio::spawn(snapshot.propagate(async move { cart(&spawned).map(|c| c.id) }))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen, mine.id);

    // The borrowed context stays alive until its owner ends it.
    assert_eq!(counters.closed.load(Ordering::SeqCst), 0);
    container.deactivate_request().unwrap();
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    container.shutdown().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disabled_propagation_captures_nothing() {
    let config = RuntimeConfig {
        propagate_contexts: false,
        ..RuntimeConfig::default()
    };
    let (container, _) = start(&config);
    container.activate_request().unwrap();

    let snapshot = ContextSnapshot::capture(&container);
    assert!(snapshot.is_empty());
    let spawned = container.clone();
    let seen = tokio::spawn(snapshot.propagate(async move { cart(&spawned).map(|c| c.id) }))
        .await
        .unwrap();
    assert!(matches!(seen, Err(ContainerError::ContextNotActive { .. })));

    container.deactivate_request().unwrap();
    container.shutdown().unwrap();
}

#[tokio::test]
async fn test_owned_request_context_ends_on_completion() {
    let (container, counters) = start(&RuntimeConfig::default());

    let id = with_request_context(&container, async { cart(&container).map(|c| c.id) })
        .unwrap()
        .await
        .unwrap();
    assert_eq!(id, 0);
    assert_eq!(counters.initialized.load(Ordering::SeqCst), 1);
    assert_eq!(counters.before_destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    assert!(!container.is_active(names::REQUEST_SCOPED));
    container.shutdown().unwrap();
}

#[tokio::test]
async fn test_owned_request_context_ends_when_dropped() {
    let (container, counters) = start(&RuntimeConfig::default());

    let owned = with_request_context(&container, std::future::pending::<()>()).unwrap();
    assert!(owned.state().is_some());
    drop(owned);

    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
    assert!(!container.is_active(names::REQUEST_SCOPED));
    container.shutdown().unwrap();
}
