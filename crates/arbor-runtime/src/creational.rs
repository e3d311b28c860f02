//! Contextual instances and the dependents created alongside them.
//!
//! Dependent-scoped beans injected into another bean belong to it: they are
//! recorded in the parent's [`CreationalContext`] while the parent is built,
//! and destroyed together with the parent.

use arbor_build::BeanId;
use arbor_core::creator::BeanInstance;
use arbor_core::names::ClassName;
use std::fmt;

/// A created bean instance together with its dependent instances.
pub struct ContextualInstance {
    bean: BeanId,
    scope: ClassName,
    instance: BeanInstance,
    dependents: Vec<ContextualInstance>,
}

impl ContextualInstance {
    /// Identifier of the bean.
    #[must_use]
    pub fn bean(&self) -> &BeanId {
        &self.bean
    }

    /// Scope the instance was created for.
    #[must_use]
    pub fn scope(&self) -> &ClassName {
        &self.scope
    }

    /// The instance.
    #[must_use]
    pub fn instance(&self) -> &BeanInstance {
        &self.instance
    }

    /// Dependent instances, in creation order.
    #[must_use]
    pub fn dependents(&self) -> &[ContextualInstance] {
        &self.dependents
    }

    pub(crate) fn into_parts(self) -> (BeanId, ClassName, BeanInstance, Vec<ContextualInstance>) {
        (self.bean, self.scope, self.instance, self.dependents)
    }
}

impl fmt::Debug for ContextualInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextualInstance")
            .field("bean", &self.bean)
            .field("scope", &self.scope)
            .field("dependents", &self.dependents)
            .finish_non_exhaustive()
    }
}

/// Collects the dependents of a bean while it is being created.
#[derive(Debug)]
pub struct CreationalContext {
    bean: BeanId,
    dependents: Vec<ContextualInstance>,
}

impl CreationalContext {
    /// Starts the creation of `bean`.
    pub fn new(bean: BeanId) -> Self {
        Self {
            bean,
            dependents: Vec::new(),
        }
    }

    /// Identifier of the bean being created.
    #[must_use]
    pub fn bean(&self) -> &BeanId {
        &self.bean
    }

    /// Records a dependent instance owned by the bean being created.
    pub fn add_dependent(&mut self, dependent: ContextualInstance) {
        self.dependents.push(dependent);
    }

    /// Number of dependents recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    /// Returns `true` if no dependent was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    /// Gives up ownership of the recorded dependents, e.g. after a failed creation.
    pub fn take_dependents(&mut self) -> Vec<ContextualInstance> {
        std::mem::take(&mut self.dependents)
    }

    /// Completes the creation.
    pub fn finish(self, scope: ClassName, instance: BeanInstance) -> ContextualInstance {
        ContextualInstance {
            bean: self.bean,
            scope,
            instance,
            dependents: self.dependents,
        }
    }
}
