//! Layers resolved interceptors around a real implementation.

use std::sync::Arc;

use crate::aggregate::ResolvedInterceptors;
use crate::error::{ProxyError, Result};
use crate::generator::{Interceptable, ProxyGenerator};
use crate::marker::MarkerTable;

/// Wrap `real` in up to two proxies.
///
/// The synchronous layer (if any) wraps `real` first and the asynchronous
/// layer (if any) wraps that, so asynchronous interceptors run outermost.
/// With no interceptors `real` is returned unchanged.
pub fn compose<I>(
    service: &'static str,
    real: Option<Arc<I>>,
    interceptors: ResolvedInterceptors,
    markers: Arc<MarkerTable>,
    generator: &ProxyGenerator,
) -> Result<Arc<I>>
where
    I: ?Sized + Interceptable,
{
    let mut proxy = real.ok_or(ProxyError::NullImplementation { service })?;

    if !interceptors.sync.is_empty() {
        proxy = generator.create_interface_proxy_with_target(
            proxy,
            interceptors.sync,
            Arc::clone(&markers),
        );
    }

    if !interceptors.asynchronous.is_empty() {
        proxy = generator.create_interface_proxy_with_target(
            proxy,
            interceptors.asynchronous,
            markers,
        );
    }

    Ok(proxy)
}
