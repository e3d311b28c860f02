//! Client proxies for normal-scoped beans.
//!
//! A proxy never holds an instance. Every [`LazyInstance::resolve`] looks up
//! the contextual instance in the context active for the caller, so one proxy
//! per bean serves every activation of its scope.

use crate::container::{Container, ContainerInner};
use arbor_build::BeanId;
use arbor_core::creator::{BeanInstance, LazyInstance};
use arbor_core::error::{ArborError, ArborResult};
use std::fmt;
use std::sync::Weak;

/// A lazily resolving reference to a normal-scoped bean.
pub struct ClientProxy {
    bean: BeanId,
    container: Weak<ContainerInner>,
}

impl ClientProxy {
    pub(crate) fn new(bean: BeanId, container: Weak<ContainerInner>) -> Self {
        Self { bean, container }
    }
}

impl LazyInstance for ClientProxy {
    fn bean_id(&self) -> &str {
        self.bean.as_str()
    }

    fn resolve(&self) -> ArborResult<BeanInstance> {
        let inner = self
            .container
            .upgrade()
            .ok_or_else(|| ArborError::internal(format!("Container of proxy {} was dropped", self.bean)))?;
        let container = Container { inner };
        let bean = container
            .bean(self.bean.as_str())
            .map_err(|e| e.into_arbor(self.bean.as_str()))?;
        container
            .contextual(bean)
            .map_err(|e| e.into_arbor(self.bean.as_str()))
    }
}

impl fmt::Debug for ClientProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProxy").field("bean", &self.bean).finish()
    }
}
