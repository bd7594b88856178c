//! Registration facade for proxied services.
//!
//! Registers a trait-object service so that every resolution yields the
//! real implementation wrapped in the applicable interceptors, while
//! honoring the declared lifetime.
//!
//! # Example
//!
//! ```ignore
//! use interpose::{InterceptorRegistry, ProxyRegistrar, ServiceCollection};
//!
//! let mut interceptors = InterceptorRegistry::new();
//! interceptors.add_interceptor::<Timing>();
//!
//! let mut services = ServiceCollection::new();
//! let mut registrar = ProxyRegistrar::new(&mut services, interceptors);
//! registrar.add_scoped::<dyn Greeter, PoliteGreeter>(None)?;
//!
//! let provider = services.build();
//! let greeter = provider.create_scope().resolve_required::<dyn Greeter>()?;
//! ```

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::aggregate::resolve_interceptors;
use crate::compose::compose;
use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::generator::{ImplementedBy, ProxyGenerator};
use crate::global::InterceptorRegistry;
use crate::marker::MethodMarkers;
use crate::registry::{Injectable, ResolveError, ServiceCollection, ServiceLifetime, ServiceProvider};
use crate::settings::ProxySettings;

type Inject<T> = fn(&ServiceProvider) -> std::result::Result<T, ResolveError>;

/// Registers proxied services into a [`ServiceCollection`].
pub struct ProxyRegistrar<'a> {
    services: &'a mut ServiceCollection,
    interceptors: Arc<InterceptorRegistry>,
    config: ProxyConfig,
}

impl<'a> ProxyRegistrar<'a> {
    pub fn new(services: &'a mut ServiceCollection, interceptors: InterceptorRegistry) -> Self {
        Self::with_config(services, interceptors, ProxyConfig::default())
    }

    pub fn with_config(
        services: &'a mut ServiceCollection,
        interceptors: InterceptorRegistry,
        config: ProxyConfig,
    ) -> Self {
        Self {
            services,
            interceptors: Arc::new(interceptors),
            config,
        }
    }

    pub fn services(&mut self) -> &mut ServiceCollection {
        self.services
    }

    pub fn interceptors(&self) -> &InterceptorRegistry {
        &self.interceptors
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Register the proxy generator as a singleton unless one is present.
    pub fn try_add_proxy_generator(&mut self) -> &mut Self {
        let generator = Arc::new(ProxyGenerator::from_config(&self.config));
        if self.services.try_add_singleton_instance(generator) {
            debug!("Registered proxy generator");
        }
        self
    }

    pub fn add_scoped<I, T>(&mut self, settings: Option<ProxySettings>) -> Result<&mut Self>
    where
        I: ?Sized + ImplementedBy<T>,
        T: Injectable + MethodMarkers,
    {
        self.add_service::<I, T>(ServiceLifetime::Scoped, settings)
    }

    pub fn add_transient<I, T>(&mut self, settings: Option<ProxySettings>) -> Result<&mut Self>
    where
        I: ?Sized + ImplementedBy<T>,
        T: Injectable + MethodMarkers,
    {
        self.add_service::<I, T>(ServiceLifetime::Transient, settings)
    }

    pub fn add_singleton<I, T>(&mut self, settings: Option<ProxySettings>) -> Result<&mut Self>
    where
        I: ?Sized + ImplementedBy<T>,
        T: Injectable + MethodMarkers,
    {
        self.add_service::<I, T>(ServiceLifetime::Singleton, settings)
    }

    /// Register `dyn I` implemented by `T` under `lifetime`.
    pub fn add_service<I, T>(
        &mut self,
        lifetime: ServiceLifetime,
        settings: Option<ProxySettings>,
    ) -> Result<&mut Self>
    where
        I: ?Sized + ImplementedBy<T>,
        T: Injectable + MethodMarkers,
    {
        ProxyRegistration::<I, T>::new()
            .implementation(lifetime)
            .settings(settings.unwrap_or_default())
            .register(self)?;
        Ok(self)
    }

    pub fn add_singleton_instance<I, T>(
        &mut self,
        instance: Arc<T>,
        settings: Option<ProxySettings>,
    ) -> Result<&mut Self>
    where
        I: ?Sized + ImplementedBy<T>,
        T: MethodMarkers + Send + Sync + 'static,
    {
        self.add_service_instance::<I, T>(instance, settings)
    }

    /// Register `dyn I` backed by a pre-built instance. The proxy is a
    /// singleton.
    pub fn add_service_instance<I, T>(
        &mut self,
        instance: Arc<T>,
        settings: Option<ProxySettings>,
    ) -> Result<&mut Self>
    where
        I: ?Sized + ImplementedBy<T>,
        T: MethodMarkers + Send + Sync + 'static,
    {
        ProxyRegistration::<I, T>::new()
            .instance(instance)
            .settings(settings.unwrap_or_default())
            .register(self)?;
        Ok(self)
    }

    fn register_interceptor_types(&mut self, settings: &ProxySettings) {
        for ty in self.interceptors.types().chain(settings.types()) {
            if ty.try_register(self.services) {
                debug!(interceptor = ty.name(), "Registered interceptor type");
            }
        }
    }
}

enum Implementation<T> {
    Type {
        lifetime: ServiceLifetime,
        inject: Inject<T>,
    },
    Instance(Arc<T>),
}

/// A single proxied-service registration: interface `I`, implementation `T`.
pub struct ProxyRegistration<I: ?Sized, T> {
    implementation: Option<Implementation<T>>,
    settings: ProxySettings,
    interface: PhantomData<fn() -> Arc<I>>,
}

impl<I, T> Default for ProxyRegistration<I, T>
where
    I: ?Sized + ImplementedBy<T>,
    T: MethodMarkers + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, T> ProxyRegistration<I, T>
where
    I: ?Sized + ImplementedBy<T>,
    T: MethodMarkers + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            implementation: None,
            settings: ProxySettings::default(),
            interface: PhantomData,
        }
    }

    /// Back the service with an existing instance.
    pub fn instance(mut self, instance: Arc<T>) -> Self {
        self.implementation = Some(Implementation::Instance(instance));
        self
    }

    pub fn settings(mut self, settings: ProxySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add everything to the registrar's collection.
    pub fn register(self, registrar: &mut ProxyRegistrar<'_>) -> Result<()> {
        let service = type_name::<I>();
        let implementation = self
            .implementation
            .ok_or(ProxyError::ImplementationNotSet { service })?;

        registrar.try_add_proxy_generator();
        registrar.register_interceptor_types(&self.settings);

        let (lifetime, inject) = match implementation {
            Implementation::Type { lifetime, inject } => {
                registrar
                    .services
                    .add::<Real<I, T>, _>(lifetime, move |provider| {
                        inject(provider).map(|real| Arc::new(Real::new(Arc::new(real))))
                    });
                (lifetime, Some(inject))
            }
            Implementation::Instance(instance) => {
                registrar
                    .services
                    .add_singleton_instance(Arc::new(Real::<I, T>::new(instance)));
                (ServiceLifetime::Singleton, None)
            }
        };

        let markers = Arc::new(T::method_markers());
        let settings = Arc::new(self.settings);
        let globals = Arc::clone(&registrar.interceptors);
        let strict = registrar.config.strict_interceptor_resolution;

        registrar.services.add::<I, _>(lifetime, move |provider| {
            let generator = provider.resolve_required::<ProxyGenerator>()?;
            let assembled = obtain_implementation::<I, T>(service, provider, inject)
                .and_then(|real| {
                    let resolved =
                        resolve_interceptors(service, provider, &globals, &settings, strict)?;
                    let real = real.map(<I as ImplementedBy<T>>::upcast);
                    compose(service, real, resolved, Arc::clone(&markers), &generator)
                });
            assembled.map_err(|e| ResolveError::construction(service, e))
        });

        debug!(
            service,
            implementation = type_name::<T>(),
            lifetime = ?lifetime,
            "Registered proxied service"
        );
        Ok(())
    }
}

impl<I, T> ProxyRegistration<I, T>
where
    I: ?Sized + ImplementedBy<T>,
    T: Injectable + MethodMarkers,
{
    /// Back the service with `T`, constructed by the registry under `lifetime`.
    pub fn implementation(mut self, lifetime: ServiceLifetime) -> Self {
        self.implementation = Some(Implementation::Type {
            lifetime,
            inject: T::inject,
        });
        self
    }
}

/// The real implementation behind one `dyn I` registration.
///
/// Keyed by interface and implementation together, so registrations sharing
/// an implementation type keep their own lifetime and instance.
struct Real<I: ?Sized, T> {
    implementation: Arc<T>,
    interface: PhantomData<fn() -> Arc<I>>,
}

impl<I: ?Sized, T> Real<I, T> {
    fn new(implementation: Arc<T>) -> Self {
        Self {
            implementation,
            interface: PhantomData,
        }
    }
}

/// Resolve the real implementation. Constructs it directly only when the
/// registry has no entry for it; construction failures are returned as-is.
fn obtain_implementation<I, T>(
    service: &'static str,
    provider: &ServiceProvider,
    inject: Option<Inject<T>>,
) -> Result<Option<Arc<T>>>
where
    I: ?Sized + 'static,
    T: Send + Sync + 'static,
{
    if let Some(real) = provider.resolve::<Real<I, T>>()? {
        return Ok(Some(Arc::clone(&real.implementation)));
    }

    let Some(inject) = inject else {
        return Ok(None);
    };

    warn!(service, "Implementation not registered, constructing directly");
    inject(provider).map(|real| Some(Arc::new(real))).map_err(ProxyError::from)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::test_utils::{recording, TestService, TestServiceImpl};

    #[test]
    fn test_registration_without_implementation_fails() {
        let mut services = ServiceCollection::new();
        let mut registrar = ProxyRegistrar::new(&mut services, InterceptorRegistry::new());

        let err = ProxyRegistration::<dyn TestService, TestServiceImpl>::new()
            .register(&mut registrar)
            .unwrap_err();

        assert!(matches!(err, ProxyError::ImplementationNotSet { .. }));
    }

    #[test]
    fn test_try_add_proxy_generator_is_idempotent() {
        let mut services = ServiceCollection::new();
        let mut registrar = ProxyRegistrar::new(&mut services, InterceptorRegistry::new());
        registrar
            .try_add_proxy_generator()
            .try_add_proxy_generator();
        registrar
            .add_transient::<dyn TestService, TestServiceImpl>(None)
            .unwrap();

        let provider = services.build();
        assert_eq!(provider.resolve_all::<ProxyGenerator>().unwrap().len(), 1);
    }

    #[test]
    fn test_scoped_round_trip() {
        let (recorder, interceptor) = recording();
        let mut services = ServiceCollection::new();
        let mut registrar = ProxyRegistrar::new(&mut services, InterceptorRegistry::new());
        registrar
            .add_scoped::<dyn TestService, TestServiceImpl>(Some(ProxySettings::with_interceptors(
                vec![interceptor],
            )))
            .unwrap();

        let provider = services.build();
        let scope = provider.create_scope();
        let service = scope.resolve_required::<dyn TestService>().unwrap();

        assert_eq!(service.get_message(), "Hello World");
        assert_eq!(recorder.last(), Some("get_message"));
    }

    #[test]
    fn test_unregistered_implementation_falls_back_to_inject() {
        let mut services = ServiceCollection::new();
        ProxyRegistrar::new(&mut services, InterceptorRegistry::new())
            .add_transient::<dyn TestService, TestServiceImpl>(None)
            .unwrap();

        // A provider built from the proxy registration alone.
        let mut proxies_only = ServiceCollection::new();
        for descriptor in services.descriptors() {
            if descriptor.service_type()
                != std::any::TypeId::of::<Real<dyn TestService, TestServiceImpl>>()
            {
                proxies_only.add_descriptor(descriptor.clone());
            }
        }

        let service = proxies_only
            .build()
            .resolve_required::<dyn TestService>()
            .unwrap();
        assert_eq!(service.echo("fallback".to_string()), "fallback");
    }

    static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    /// Implementation whose construction always fails.
    struct Unreachable;

    impl Injectable for Unreachable {
        fn inject(_provider: &ServiceProvider) -> std::result::Result<Self, ResolveError> {
            ATTEMPTS.fetch_add(1, Ordering::SeqCst);
            Err(ResolveError::NotRegistered {
                type_name: "Database",
            })
        }
    }

    impl MethodMarkers for Unreachable {}

    #[async_trait]
    impl TestService for Unreachable {
        fn get_message(&self) -> String {
            String::new()
        }

        async fn get_message_async(&self) -> String {
            String::new()
        }

        fn echo(&self, text: String) -> String {
            text
        }

        async fn ping(&self) {}
    }

    #[test]
    fn test_construction_failure_is_reported_once_with_cause() {
        let mut services = ServiceCollection::new();
        ProxyRegistrar::new(&mut services, InterceptorRegistry::new())
            .add_transient::<dyn TestService, Unreachable>(None)
            .unwrap();

        let err = services
            .build()
            .resolve::<dyn TestService>()
            .err()
            .expect("construction fails");

        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 1);
        let ResolveError::Construction { source, .. } = &err else {
            panic!("expected a construction error, got {err:?}");
        };
        assert!(matches!(
            source.downcast_ref::<ProxyError>(),
            Some(ProxyError::Resolve(ResolveError::NotRegistered {
                type_name: "Database"
            }))
        ));
    }
}
