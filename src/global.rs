//! Interceptors applied to every proxied service.

use std::fmt;
use std::sync::Arc;

use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::registry::Injectable;
use crate::service_type::ServiceType;

/// Where an interceptor comes from.
pub enum InterceptorSource<C: ?Sized> {
    /// A ready instance, shared by every proxy.
    Instance(Arc<C>),
    /// A type resolved from the provider when each proxy is built.
    Type(ServiceType),
}

impl<C: ?Sized> Clone for InterceptorSource<C> {
    fn clone(&self) -> Self {
        match self {
            Self::Instance(instance) => Self::Instance(Arc::clone(instance)),
            Self::Type(ty) => Self::Type(*ty),
        }
    }
}

impl<C: ?Sized> fmt::Debug for InterceptorSource<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(_) => f.write_str("Instance"),
            Self::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
        }
    }
}

/// Ordered global interceptor lists, one per kind.
///
/// Handed to [`crate::ProxyRegistrar`], which shares it between all of its
/// registrations.
#[derive(Clone, Debug, Default)]
pub struct InterceptorRegistry {
    interceptors: Vec<InterceptorSource<dyn Interceptor>>,
    async_interceptors: Vec<InterceptorSource<dyn AsyncInterceptor>>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_interceptor<T: Interceptor + Injectable>(&mut self) -> &mut Self {
        self.interceptors
            .push(InterceptorSource::Type(ServiceType::interceptor::<T>()));
        self
    }

    pub fn add_interceptor_instance(&mut self, interceptor: Arc<dyn Interceptor>) -> &mut Self {
        self.interceptors
            .push(InterceptorSource::Instance(interceptor));
        self
    }

    pub fn add_async_interceptor<T: AsyncInterceptor + Injectable>(&mut self) -> &mut Self {
        self.async_interceptors
            .push(InterceptorSource::Type(ServiceType::async_interceptor::<T>()));
        self
    }

    pub fn add_async_interceptor_instance(
        &mut self,
        interceptor: Arc<dyn AsyncInterceptor>,
    ) -> &mut Self {
        self.async_interceptors
            .push(InterceptorSource::Instance(interceptor));
        self
    }

    pub fn interceptors(&self) -> &[InterceptorSource<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn async_interceptors(&self) -> &[InterceptorSource<dyn AsyncInterceptor>] {
        &self.async_interceptors
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty() && self.async_interceptors.is_empty()
    }

    /// Every type-based entry, synchronous first.
    pub(crate) fn types(&self) -> impl Iterator<Item = &ServiceType> {
        let sync = self.interceptors.iter().filter_map(source_type);
        let asynchronous = self.async_interceptors.iter().filter_map(source_type);
        sync.chain(asynchronous)
    }
}

fn source_type<C: ?Sized>(source: &InterceptorSource<C>) -> Option<&ServiceType> {
    match source {
        InterceptorSource::Type(ty) => Some(ty),
        InterceptorSource::Instance(_) => None,
    }
}
