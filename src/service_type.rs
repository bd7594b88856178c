//! Runtime identifiers for types that the registry can construct.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::registry::{ErasedService, Injectable, ServiceCollection, ServiceLifetime};

/// Identifies a type by `TypeId`, together with what it can be used as.
///
/// `ServiceType::of::<T>()` names any injectable type. The
/// [`ServiceType::interceptor`] and [`ServiceType::async_interceptor`]
/// constructors additionally record that `T` implements the matching
/// interceptor contract, which is what the interceptor type lists check.
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
    register: fn(&mut ServiceCollection) -> bool,
    interceptor: Option<fn(&ErasedService) -> Option<Arc<dyn Interceptor>>>,
    async_interceptor: Option<fn(&ErasedService) -> Option<Arc<dyn AsyncInterceptor>>>,
}

impl ServiceType {
    pub fn of<T: Injectable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            register: register_transient::<T>,
            interceptor: None,
            async_interceptor: None,
        }
    }

    pub fn interceptor<T: Interceptor + Injectable>() -> Self {
        Self {
            interceptor: Some(as_interceptor::<T>),
            ..Self::of::<T>()
        }
    }

    pub fn async_interceptor<T: AsyncInterceptor + Injectable>() -> Self {
        Self {
            async_interceptor: Some(as_async_interceptor::<T>),
            ..Self::of::<T>()
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn implements_interceptor(&self) -> bool {
        self.interceptor.is_some()
    }

    pub fn implements_async_interceptor(&self) -> bool {
        self.async_interceptor.is_some()
    }

    /// Register the type as transient unless it is already registered.
    pub(crate) fn try_register(&self, services: &mut ServiceCollection) -> bool {
        (self.register)(services)
    }

    pub(crate) fn cast_interceptor(&self, service: &ErasedService) -> Option<Arc<dyn Interceptor>> {
        self.interceptor.and_then(|cast| cast(service))
    }

    pub(crate) fn cast_async_interceptor(
        &self,
        service: &ErasedService,
    ) -> Option<Arc<dyn AsyncInterceptor>> {
        self.async_interceptor.and_then(|cast| cast(service))
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceType").field(&self.name).finish()
    }
}

fn register_transient<T: Injectable>(services: &mut ServiceCollection) -> bool {
    services.try_add_lifetime::<T>(ServiceLifetime::Transient)
}

fn as_interceptor<T: Interceptor + Injectable>(
    service: &ErasedService,
) -> Option<Arc<dyn Interceptor>> {
    let service = service.downcast_ref::<Arc<T>>()?;
    Some(Arc::clone(service) as Arc<dyn Interceptor>)
}

fn as_async_interceptor<T: AsyncInterceptor + Injectable>(
    service: &ErasedService,
) -> Option<Arc<dyn AsyncInterceptor>> {
    let service = service.downcast_ref::<Arc<T>>()?;
    Some(Arc::clone(service) as Arc<dyn AsyncInterceptor>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::Invocation;
    use crate::registry::{ResolveError, ServiceProvider};

    #[derive(Default)]
    struct Passthrough;

    impl Interceptor for Passthrough {
        fn intercept(&self, invocation: &mut Invocation<'_>) {
            invocation.proceed();
        }
    }

    impl Injectable for Passthrough {
        fn inject(_provider: &ServiceProvider) -> Result<Self, ResolveError> {
            Ok(Self)
        }
    }

    #[test]
    fn test_contracts_are_recorded() {
        let plain = ServiceType::of::<Passthrough>();
        let typed = ServiceType::interceptor::<Passthrough>();

        assert!(!plain.implements_interceptor());
        assert!(typed.implements_interceptor());
        assert!(!typed.implements_async_interceptor());
        assert_eq!(plain, typed);
    }

    #[test]
    fn test_registration_and_cast() {
        let ty = ServiceType::interceptor::<Passthrough>();
        let mut services = ServiceCollection::new();

        assert!(ty.try_register(&mut services));
        assert!(!ty.try_register(&mut services));

        let provider = services.build();
        let erased = provider.resolve_by_id(ty.id()).unwrap().unwrap();
        assert!(ty.cast_interceptor(&erased).is_some());
        assert!(ty.cast_async_interceptor(&erased).is_none());
    }
}
