//! Registration side of the service registry.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use super::{erase, Factory, Injectable, ResolveError, ServiceLifetime, ServiceProvider};

/// One registration: key type, lifetime and factory.
#[derive(Clone)]
pub struct ServiceDescriptor {
    service_type: TypeId,
    type_name: &'static str,
    lifetime: ServiceLifetime,
    factory: Factory,
}

impl ServiceDescriptor {
    pub fn new<S, F>(lifetime: ServiceLifetime, factory: F) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        Self {
            service_type: TypeId::of::<S>(),
            type_name: type_name::<S>(),
            lifetime,
            factory: Arc::new(move |provider| factory(provider).map(erase)),
        }
    }

    pub fn service_type(&self) -> TypeId {
        self.service_type
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }

    pub(crate) fn factory(&self) -> &Factory {
        &self.factory
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("type_name", &self.type_name)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Mutable list of registrations. Later registrations of the same key win
/// on resolution; earlier ones stay visible to `resolve_all`.
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_descriptor(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Register a factory for key type `S`.
    pub fn add<S, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceProvider) -> Result<Arc<S>, ResolveError> + Send + Sync + 'static,
    {
        self.add_descriptor(ServiceDescriptor::new::<S, F>(lifetime, factory))
    }

    /// Register `T` built through [`Injectable::inject`].
    pub fn add_lifetime<T: Injectable>(&mut self, lifetime: ServiceLifetime) -> &mut Self {
        self.add::<T, _>(lifetime, |provider| T::inject(provider).map(Arc::new))
    }

    /// Register `T` unless some registration for `T` already exists.
    ///
    /// Returns whether a registration was added.
    pub fn try_add_lifetime<T: Injectable>(&mut self, lifetime: ServiceLifetime) -> bool {
        if self.contains::<T>() {
            return false;
        }
        self.add_lifetime::<T>(lifetime);
        true
    }

    pub fn add_singleton<T: Injectable>(&mut self) -> &mut Self {
        self.add_lifetime::<T>(ServiceLifetime::Singleton)
    }

    pub fn add_scoped<T: Injectable>(&mut self) -> &mut Self {
        self.add_lifetime::<T>(ServiceLifetime::Scoped)
    }

    pub fn add_transient<T: Injectable>(&mut self) -> &mut Self {
        self.add_lifetime::<T>(ServiceLifetime::Transient)
    }

    /// Register an existing instance as a singleton for key type `S`.
    pub fn add_singleton_instance<S>(&mut self, instance: Arc<S>) -> &mut Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.add::<S, _>(ServiceLifetime::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    pub fn try_add_singleton_instance<S>(&mut self, instance: Arc<S>) -> bool
    where
        S: ?Sized + Send + Sync + 'static,
    {
        if self.contains::<S>() {
            return false;
        }
        self.add_singleton_instance(instance);
        true
    }

    pub fn contains<S: ?Sized + 'static>(&self) -> bool {
        self.contains_id(TypeId::of::<S>())
    }

    pub fn contains_id(&self, id: TypeId) -> bool {
        self.descriptors.iter().any(|d| d.service_type == id)
    }

    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Build a root provider over a snapshot of the current registrations.
    pub fn build(&self) -> ServiceProvider {
        ServiceProvider::new(&self.descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Widget;

    impl Injectable for Widget {
        fn inject(_provider: &ServiceProvider) -> Result<Self, ResolveError> {
            Ok(Self)
        }
    }

    #[test]
    fn test_try_add_keeps_first_registration() {
        let mut services = ServiceCollection::new();
        services.add_singleton::<Widget>();

        assert!(!services.try_add_lifetime::<Widget>(ServiceLifetime::Transient));
        assert_eq!(services.len(), 1);
        assert_eq!(
            services.descriptors()[0].lifetime(),
            ServiceLifetime::Singleton
        );
    }

    #[test]
    fn test_try_add_singleton_instance_on_empty() {
        let mut services = ServiceCollection::new();
        assert!(services.try_add_singleton_instance(Arc::new(Widget)));
        assert!(!services.try_add_singleton_instance(Arc::new(Widget)));
        assert!(services.contains::<Widget>());
    }

    #[test]
    fn test_descriptor_records_key_type() {
        let descriptor =
            ServiceDescriptor::new::<str, _>(ServiceLifetime::Transient, |_| Ok(Arc::from("x")));
        assert_eq!(descriptor.service_type(), TypeId::of::<str>());
        assert_eq!(descriptor.type_name(), "str");
    }
}
