//! Collects the interceptors that apply to one service construction.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ProxyError, Result};
use crate::global::{InterceptorRegistry, InterceptorSource};
use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::registry::{ErasedService, ServiceProvider};
use crate::service_type::ServiceType;
use crate::settings::ProxySettings;

/// Interceptors for one service, in application order (outermost first).
#[derive(Clone, Default)]
pub struct ResolvedInterceptors {
    pub sync: Vec<Arc<dyn Interceptor>>,
    pub asynchronous: Vec<Arc<dyn AsyncInterceptor>>,
}

impl ResolvedInterceptors {
    pub fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.asynchronous.is_empty()
    }
}

impl std::fmt::Debug for ResolvedInterceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedInterceptors")
            .field("sync", &self.sync.len())
            .field("asynchronous", &self.asynchronous.len())
            .finish()
    }
}

/// Build both interceptor lists for `service`.
///
/// Each list is: global entries in registration order, then the settings'
/// instances, then the settings' types. Type entries are resolved from
/// `provider`. A type that is unregistered or does not implement the
/// contract is skipped with a warning, or rejected with
/// [`ProxyError::InterceptorUnresolved`] when `strict` is set.
pub fn resolve_interceptors(
    service: &'static str,
    provider: &ServiceProvider,
    globals: &InterceptorRegistry,
    settings: &ProxySettings,
    strict: bool,
) -> Result<ResolvedInterceptors> {
    let sync = collect(
        service,
        provider,
        globals.interceptors(),
        &settings.interceptor_instances,
        &settings.interceptor_types,
        ServiceType::cast_interceptor,
        strict,
    )?;
    let asynchronous = collect(
        service,
        provider,
        globals.async_interceptors(),
        &settings.async_interceptor_instances,
        &settings.async_interceptor_types,
        ServiceType::cast_async_interceptor,
        strict,
    )?;

    debug!(
        service,
        sync = sync.len(),
        asynchronous = asynchronous.len(),
        "Resolved interceptors"
    );

    Ok(ResolvedInterceptors { sync, asynchronous })
}

fn collect<C: ?Sized>(
    service: &'static str,
    provider: &ServiceProvider,
    globals: &[InterceptorSource<C>],
    instances: &[Arc<C>],
    types: &[ServiceType],
    cast: impl Fn(&ServiceType, &ErasedService) -> Option<Arc<C>>,
    strict: bool,
) -> Result<Vec<Arc<C>>> {
    let mut resolved = Vec::with_capacity(globals.len() + instances.len() + types.len());

    for source in globals {
        match source {
            InterceptorSource::Instance(instance) => resolved.push(Arc::clone(instance)),
            InterceptorSource::Type(ty) => {
                resolved.extend(resolve_type(service, provider, ty, &cast, strict)?)
            }
        }
    }

    resolved.extend(instances.iter().cloned());

    for ty in types {
        resolved.extend(resolve_type(service, provider, ty, &cast, strict)?);
    }

    Ok(resolved)
}

fn resolve_type<C: ?Sized>(
    service: &'static str,
    provider: &ServiceProvider,
    ty: &ServiceType,
    cast: &impl Fn(&ServiceType, &ErasedService) -> Option<Arc<C>>,
    strict: bool,
) -> Result<Option<Arc<C>>> {
    let resolved = provider
        .resolve_by_id(ty.id())?
        .and_then(|erased| cast(ty, &erased));

    if resolved.is_none() {
        if strict {
            return Err(ProxyError::InterceptorUnresolved {
                type_name: ty.name(),
                service,
            });
        }
        warn!(
            service,
            interceptor = ty.name(),
            "Skipping interceptor type that did not resolve"
        );
    }

    Ok(resolved)
}
