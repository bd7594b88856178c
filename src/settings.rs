//! Per-registration interceptor settings.

use std::fmt;
use std::sync::Arc;

use crate::error::{ProxyError, Result};
use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::registry::Injectable;
use crate::service_type::ServiceType;

/// Interceptors applied to a single registered service, in addition to the
/// global ones.
///
/// Instances are used as given; types are resolved from the provider each
/// time the service is constructed.
#[derive(Clone, Default)]
pub struct ProxySettings {
    pub interceptor_instances: Vec<Arc<dyn Interceptor>>,
    pub interceptor_types: Vec<ServiceType>,
    pub async_interceptor_instances: Vec<Arc<dyn AsyncInterceptor>>,
    pub async_interceptor_types: Vec<ServiceType>,
}

impl ProxySettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with synchronous interceptor instances only.
    pub fn with_interceptors(instances: Vec<Arc<dyn Interceptor>>) -> Self {
        Self {
            interceptor_instances: instances,
            ..Self::default()
        }
    }

    /// Settings with asynchronous interceptor instances only.
    pub fn with_async_interceptors(instances: Vec<Arc<dyn AsyncInterceptor>>) -> Self {
        Self {
            async_interceptor_instances: instances,
            ..Self::default()
        }
    }

    /// Settings with interceptor types only. Fails if any type does not
    /// implement the contract of the list it is placed in.
    pub fn with_types(
        interceptor_types: Vec<ServiceType>,
        async_interceptor_types: Vec<ServiceType>,
    ) -> Result<Self> {
        let mut settings = Self::default();
        for ty in interceptor_types {
            settings.add_interceptor_type(ty)?;
        }
        for ty in async_interceptor_types {
            settings.add_async_interceptor_type(ty)?;
        }
        Ok(settings)
    }

    pub fn add_interceptor_instance(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptor_instances.push(interceptor);
        self
    }

    pub fn add_interceptor<T: Interceptor + Injectable>(&mut self) -> &mut Self {
        self.interceptor_types.push(ServiceType::interceptor::<T>());
        self
    }

    pub fn add_interceptor_type(&mut self, ty: ServiceType) -> Result<&mut Self> {
        if !ty.implements_interceptor() {
            return Err(ProxyError::NotAssignable {
                type_name: ty.name(),
                contract: "Interceptor",
            });
        }
        self.interceptor_types.push(ty);
        Ok(self)
    }

    pub fn add_async_interceptor_instance(
        &mut self,
        interceptor: Arc<dyn AsyncInterceptor>,
    ) -> &mut Self {
        self.async_interceptor_instances.push(interceptor);
        self
    }

    pub fn add_async_interceptor<T: AsyncInterceptor + Injectable>(&mut self) -> &mut Self {
        self.async_interceptor_types
            .push(ServiceType::async_interceptor::<T>());
        self
    }

    pub fn add_async_interceptor_type(&mut self, ty: ServiceType) -> Result<&mut Self> {
        if !ty.implements_async_interceptor() {
            return Err(ProxyError::NotAssignable {
                type_name: ty.name(),
                contract: "AsyncInterceptor",
            });
        }
        self.async_interceptor_types.push(ty);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.interceptor_instances.is_empty()
            && self.interceptor_types.is_empty()
            && self.async_interceptor_instances.is_empty()
            && self.async_interceptor_types.is_empty()
    }

    /// Every type listed, synchronous first.
    pub(crate) fn types(&self) -> impl Iterator<Item = &ServiceType> {
        self.interceptor_types
            .iter()
            .chain(self.async_interceptor_types.iter())
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("interceptor_instances", &self.interceptor_instances.len())
            .field("interceptor_types", &self.interceptor_types)
            .field(
                "async_interceptor_instances",
                &self.async_interceptor_instances.len(),
            )
            .field("async_interceptor_types", &self.async_interceptor_types)
            .finish()
    }
}
