//! The build pipeline.
//!
//! [`BeanProcessor`] runs every build phase in order and either returns a
//! frozen [`Deployment`] or a [`DeploymentError`] carrying every fatal
//! problem found:
//!
//! 1. Extensions register qualifiers, scopes, stereotypes and vetoes, then
//!    annotation types are discovered from the index.
//! 2. Extensions contribute synthetic beans.
//! 3. Beans, interceptors, decorators and observers are discovered.
//! 4. Every injection point is resolved.
//! 5. Extensions observe the graph and may exclude beans from removal.
//! 6. Unused beans are removed.
//! 7. The graph is validated, extension validators included.
//! 8. Interception chains are composed and the deployment is frozen.
//!
//! # Example
//!
//! ```
//! use arbor_build::BeanProcessor;
//! use arbor_config::BuildConfig;
//! use arbor_core::fixtures;
//!
//! let index = fixtures::greeting_index();
//! let config = BuildConfig::default();
//! let deployment = BeanProcessor::new(&index, &config).process().unwrap();
//! assert!(deployment.bean(fixtures::ENGLISH_GREETER).is_some());
//! assert!(deployment.chains(fixtures::ENGLISH_GREETER).is_some());
//! ```

use crate::bean::{BeanId, BeanInfo};
use crate::builder::BeanGraphBuilder;
use crate::chain::{ChainComposer, InterceptionChains};
use crate::error::DeploymentError;
use crate::extension::{BuildExtension, GraphObservation, RegistrationContext, SyntheticContext, SyntheticFactory, ValidationContext};
use crate::graph::{BeanGraph, TypeHierarchy};
use crate::interceptor::{DecoratorInfo, InterceptorInfo};
use crate::metadata::DeploymentMetadata;
use crate::observer::ObserverInfo;
use crate::removal::{self, RemovedBean};
use crate::resolver::Resolver;
use crate::validator::Validator;
use arbor_config::{BuildConfig, TieBreak};
use arbor_core::index::IndexView;
use arbor_core::registry::{Registry, RegistryBuilder};
use arbor_core::{Diagnostic, Diagnostics};
use arbor_telemetry::metrics::{record_build, record_diagnostic};
use indexmap::IndexMap;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs the build pipeline over an index.
pub struct BeanProcessor<'a> {
    index: &'a dyn IndexView,
    config: &'a BuildConfig,
    registry: Option<RegistryBuilder>,
    extensions: Vec<Box<dyn BuildExtension>>,
}

impl<'a> BeanProcessor<'a> {
    /// Creates a processor with the builtin registry and no extensions.
    #[must_use]
    pub fn new(index: &'a dyn IndexView, config: &'a BuildConfig) -> Self {
        Self {
            index,
            config,
            registry: None,
            extensions: Vec::new(),
        }
    }

    /// Starts from a prepared registry instead of the builtin one.
    #[must_use]
    pub fn registry(mut self, registry: RegistryBuilder) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Adds a build extension; extensions run in the order they are added.
    #[must_use]
    pub fn extension(mut self, extension: impl BuildExtension + 'static) -> Self {
        self.extensions.push(Box::new(extension));
        self
    }

    /// Adds an already boxed build extension.
    #[must_use]
    pub fn boxed_extension(mut self, extension: Box<dyn BuildExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Runs every phase.
    ///
    /// # Errors
    ///
    /// Returns a [`DeploymentError`] listing every definition, deployment
    /// and resolution problem when at least one of them is fatal.
    pub fn process(self) -> Result<Deployment, DeploymentError> {
        let started = Instant::now();
        let config = self.config;

        let mut registry = self
            .registry
            .unwrap_or_else(|| RegistryBuilder::new().with_builtins());
        let mut vetoed = Vec::new();
        for extension in &self.extensions {
            extension.register(&mut RegistrationContext::new(&mut registry, &mut vetoed));
        }
        registry.discover(self.index);
        let registry = registry.build();

        let mut diagnostics = Diagnostics::new();
        let mut synthetic = Vec::new();
        for extension in &self.extensions {
            let mut ctx = SyntheticContext::new();
            extension.synthesize(&mut ctx);
            let (beans, mut problems) = ctx.into_parts();
            problems.label_source(extension.name());
            synthetic.extend(beans);
            diagnostics.append(problems);
        }

        let mut graph = BeanGraphBuilder::new(self.index, &registry, config)
            .veto_all(vetoed)
            .build(synthetic);

        let resolved = graph.resolve_injection_points(&registry, &config.tie_break);
        debug!(injection_points = resolved, "Injection points resolved");

        let mut exclusions = Vec::new();
        for extension in &self.extensions {
            extension.observe(&mut GraphObservation::new(&graph, &registry, config, &mut exclusions));
        }

        if config.remove_unused_beans {
            let removed = removal::find_unused(&graph, config, &exclusions);
            debug!(beans = removed.len(), "Removing unused beans");
            graph.remove(removed);
        }

        diagnostics.extend(Validator::new(&graph, &registry, config).validate());
        let validation = ValidationContext::new(&graph, &registry, config);
        for extension in &self.extensions {
            let mut problems = Diagnostics::new();
            extension.validate(&validation, &mut problems);
            problems.label_source(extension.name());
            diagnostics.append(problems);
        }
        if config.fail_on_warnings {
            diagnostics.promote_warnings();
        }
        for diagnostic in &diagnostics {
            report(diagnostic);
        }
        if diagnostics.has_fatal() {
            return Err(DeploymentError::new(diagnostics));
        }

        let chains = ChainComposer::new(&registry, graph.hierarchy(), graph.interceptors(), graph.decorators())
            .compose_all(graph.beans());
        let metadata = config.emit_metadata.then(|| {
            DeploymentMetadata::collect(
                graph.beans(),
                graph.interceptors(),
                graph.decorators(),
                graph.observers(),
                chains.values(),
                graph.removed(),
            )
        });

        let elapsed = started.elapsed();
        record_build(graph.bean_count(), graph.removed().len(), elapsed);
        info!(
            beans = graph.bean_count(),
            interceptors = graph.interceptors().len(),
            observers = graph.observers().len(),
            removed = graph.removed().len(),
            diagnostics = diagnostics.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Bean graph built"
        );

        Ok(Deployment {
            graph,
            registry,
            chains,
            warnings: diagnostics,
            metadata,
            tie_break: config.tie_break.clone(),
        })
    }
}

fn report(diagnostic: &Diagnostic) {
    record_diagnostic(diagnostic.severity);
    if diagnostic.is_fatal() {
        error!(category = diagnostic.category.code(), "{diagnostic}");
    } else {
        warn!(category = diagnostic.category.code(), "{diagnostic}");
    }
}

/// A validated, immutable bean graph.
pub struct Deployment {
    graph: BeanGraph,
    registry: Registry,
    chains: IndexMap<BeanId, InterceptionChains>,
    warnings: Diagnostics,
    metadata: Option<DeploymentMetadata>,
    tie_break: Vec<TieBreak>,
}

impl Deployment {
    /// Returns the beans in discovery order.
    pub fn beans(&self) -> impl Iterator<Item = &BeanInfo> {
        self.graph.beans()
    }

    /// Looks up a bean by identifier.
    #[must_use]
    pub fn bean(&self, id: &str) -> Option<&BeanInfo> {
        self.graph.bean(id)
    }

    /// Returns the interceptors, enabled or not.
    #[must_use]
    pub fn interceptors(&self) -> &[InterceptorInfo] {
        self.graph.interceptors()
    }

    /// Looks up an interceptor by identifier.
    #[must_use]
    pub fn interceptor(&self, id: &str) -> Option<&InterceptorInfo> {
        self.graph.interceptors().iter().find(|i| i.bean.id.as_str() == id)
    }

    /// Returns the decorators.
    #[must_use]
    pub fn decorators(&self) -> &[DecoratorInfo] {
        self.graph.decorators()
    }

    /// Looks up a decorator by identifier.
    #[must_use]
    pub fn decorator(&self, id: &str) -> Option<&DecoratorInfo> {
        self.graph.decorators().iter().find(|d| d.bean.id.as_str() == id)
    }

    /// Returns the observer methods in discovery order.
    #[must_use]
    pub fn observers(&self) -> &[ObserverInfo] {
        self.graph.observers()
    }

    /// Returns the interception chains of a bean.
    #[must_use]
    pub fn chains(&self, bean: &str) -> Option<&InterceptionChains> {
        self.chains.get(bean)
    }

    /// Returns every composed chain set, keyed by bean.
    #[must_use]
    pub fn all_chains(&self) -> &IndexMap<BeanId, InterceptionChains> {
        &self.chains
    }

    /// Returns the beans removed as unused.
    #[must_use]
    pub fn removed_beans(&self) -> &[RemovedBean] {
        self.graph.removed()
    }

    /// Returns the registry the deployment was built with.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the type hierarchy of the index.
    #[must_use]
    pub fn hierarchy(&self) -> &TypeHierarchy {
        self.graph.hierarchy()
    }

    /// Returns the tie-break policy used for resolution.
    #[must_use]
    pub fn tie_break(&self) -> &[TieBreak] {
        &self.tie_break
    }

    /// Returns a resolver over the deployed beans.
    #[must_use]
    pub fn resolver(&self) -> Resolver<'_> {
        self.graph.resolver(&self.registry, &self.tie_break)
    }

    /// Returns the factory of a synthetic bean.
    #[must_use]
    pub fn factory(&self, id: &str) -> Option<&SyntheticFactory> {
        self.graph.factories.get(id)
    }

    /// Returns the non-fatal diagnostics reported during the build.
    #[must_use]
    pub fn warnings(&self) -> &Diagnostics {
        &self.warnings
    }

    /// Returns the serialisable metadata, if it was emitted.
    #[must_use]
    pub fn metadata(&self) -> Option<&DeploymentMetadata> {
        self.metadata.as_ref()
    }
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("beans", &self.graph.bean_count())
            .field("interceptors", &self.graph.interceptors().len())
            .field("decorators", &self.graph.decorators().len())
            .field("observers", &self.graph.observers().len())
            .field("chains", &self.chains.len())
            .field("removed", &self.graph.removed().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{BeanExclusion, SyntheticBean};
    use arbor_core::fixtures;
    use arbor_core::names::{self, ClassName};
    use arbor_core::types::TypeRef;
    use arbor_core::creator::ConstantCreator;
    use arbor_core::ErrorCategory;

    fn config() -> BuildConfig {
        BuildConfig::default()
    }

    #[test]
    fn test_greeting_deployment() {
        let index = fixtures::greeting_index();
        let config = config();
        let deployment = BeanProcessor::new(&index, &config).process().unwrap();
        assert!(deployment.bean(fixtures::ENGLISH_GREETER).is_some());
        assert!(deployment.bean(fixtures::GREETING_SERVICE).is_none());
        assert!(deployment
            .removed_beans()
            .iter()
            .any(|r| r.id.as_str() == fixtures::GREETING_SERVICE));

        let chains = deployment.chains(fixtures::ENGLISH_GREETER).unwrap();
        let greet = chains.method("greet(arbor.lang.String)").unwrap();
        assert_eq!(greet.interceptors[0].interceptor.as_str(), fixtures::LOGGING_INTERCEPTOR);
        assert_eq!(greet.interceptors[0].method, "log");
        assert!(deployment.metadata().is_some());
        assert!(format!("{deployment:?}").starts_with("Deployment"));
    }

    #[test]
    fn test_metadata_can_be_disabled() {
        let index = fixtures::greeting_index();
        let config = BuildConfig {
            emit_metadata: false,
            ..config()
        };
        let deployment = BeanProcessor::new(&index, &config).process().unwrap();
        assert!(deployment.metadata().is_none());
    }

    struct Contributor;

    impl BuildExtension for Contributor {
        fn name(&self) -> &'static str {
            "contributor"
        }

        fn synthesize(&self, ctx: &mut SyntheticContext) {
            ctx.add(
                SyntheticBean::builder("synthetic.Clock")
                    .scope(names::SINGLETON)
                    .add_type(TypeRef::class("acme.Clock"))
                    .unremovable()
                    .creator(ConstantCreator::new(42_u64)),
            );
            ctx.add(SyntheticBean::builder("synthetic.Broken").add_type(TypeRef::class("acme.Broken")));
        }
    }

    #[test]
    fn test_extension_problems_are_labelled() {
        let index = fixtures::greeting_index();
        let config = config();
        let err = BeanProcessor::new(&index, &config)
            .extension(Contributor)
            .process()
            .unwrap_err();
        assert_eq!(err.count(ErrorCategory::Definition), 1);
        assert_eq!(err.problems()[0].source.as_deref(), Some("contributor"));
    }

    struct Keeper;

    impl BuildExtension for Keeper {
        fn name(&self) -> &'static str {
            "keeper"
        }

        fn observe(&self, ctx: &mut GraphObservation<'_>) {
            for candidate in ctx.unused_candidates() {
                ctx.exclude(BeanExclusion::Id(candidate.id));
            }
        }

        fn validate(&self, ctx: &ValidationContext<'_>, out: &mut Diagnostics) {
            if ctx.removed_beans().is_empty() {
                out.push(Diagnostic::warning(ErrorCategory::Deployment, "nothing removed"));
            }
        }
    }

    #[test]
    fn test_observer_exclusions_and_extension_warnings() {
        let index = fixtures::greeting_index();
        let config = config();
        let deployment = BeanProcessor::new(&index, &config).extension(Keeper).process().unwrap();
        assert!(deployment.removed_beans().is_empty());
        let warning = deployment.warnings().iter().find(|w| w.message == "nothing removed").unwrap();
        assert_eq!(warning.source.as_deref(), Some("keeper"));
    }

    #[test]
    fn test_fail_on_warnings_turns_warnings_fatal() {
        let index = fixtures::greeting_index();
        let config = BuildConfig {
            fail_on_warnings: true,
            ..config()
        };
        let err = BeanProcessor::new(&index, &config).extension(Keeper).process().unwrap_err();
        assert!(err.problems().iter().any(|p| p.message == "nothing removed"));
    }

    struct Vetoer;

    impl BuildExtension for Vetoer {
        fn name(&self) -> &'static str {
            "vetoer"
        }

        fn register(&self, ctx: &mut RegistrationContext<'_>) {
            ctx.veto(fixtures::GREETING_SERVICE);
        }
    }

    #[test]
    fn test_registration_veto() {
        let index = fixtures::greeting_index();
        let config = BuildConfig {
            remove_unused_beans: false,
            ..config()
        };
        let deployment = BeanProcessor::new(&index, &config).extension(Vetoer).process().unwrap();
        assert!(deployment.bean(fixtures::GREETING_SERVICE).is_none());
        assert!(deployment.bean(fixtures::CLOCK).is_some());
        assert!(!deployment
            .beans()
            .any(|b| b.bean_class == ClassName::new(fixtures::GREETING_SERVICE)));
    }

    #[test]
    fn test_synthetic_factory_is_exposed() {
        struct Clock;
        impl BuildExtension for Clock {
            fn name(&self) -> &'static str {
                "clock"
            }
            fn synthesize(&self, ctx: &mut SyntheticContext) {
                ctx.add(
                    SyntheticBean::builder("synthetic.Clock")
                        .add_type(TypeRef::class("acme.Clock"))
                        .param("zone", "UTC")
                        .unremovable()
                        .creator(ConstantCreator::new(7_i32)),
                );
            }
        }

        let index = fixtures::greeting_index();
        let config = config();
        let deployment = BeanProcessor::new(&index, &config).extension(Clock).process().unwrap();
        let factory = deployment.factory("synthetic.Clock").unwrap();
        assert_eq!(factory.param("zone").and_then(|v| v.as_str()), Some("UTC"));
    }
}
