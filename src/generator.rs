//! Proxy generation.
//!
//! Proxy types are produced at compile time by `#[interceptable]`; the
//! generator wraps targets in them at runtime.
//!
//! # Example
//!
//! ```ignore
//! let generator = ProxyGenerator::new();
//! let layer: Vec<Arc<dyn Interceptor>> = vec![Arc::new(Timing)];
//! let service: Arc<dyn Greeter> =
//!     generator.create_interface_proxy_with_target(target, layer, Arc::new(MarkerTable::new()));
//! ```

use std::any::type_name;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::config::ProxyConfig;
use crate::marker::MarkerTable;
use crate::pipeline::{InterceptorLayer, Pipeline};

/// Trait objects that have a generated proxy. Implemented for `dyn Trait`
/// by `#[interceptable]`.
pub trait Interceptable: Send + Sync + 'static {
    fn proxy(target: Arc<Self>, pipeline: Pipeline) -> Arc<Self>;
}

/// `Self` (a `dyn Trait`) is implemented by `T`. Implemented for every
/// implementor by `#[interceptable]`.
pub trait ImplementedBy<T>: Interceptable {
    fn upcast(implementation: Arc<T>) -> Arc<Self>;
}

/// Creates interface proxies. Registered as a singleton; counts the
/// proxies it has produced.
#[derive(Debug, Default)]
pub struct ProxyGenerator {
    log_invocations: bool,
    created: AtomicU64,
}

impl ProxyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            log_invocations: config.log_invocations,
            created: AtomicU64::new(0),
        }
    }

    /// Wrap `target` so every call on the result passes through `layer`.
    pub fn create_interface_proxy_with_target<I>(
        &self,
        target: Arc<I>,
        layer: impl Into<InterceptorLayer>,
        markers: Arc<MarkerTable>,
    ) -> Arc<I>
    where
        I: ?Sized + Interceptable,
    {
        let layer = layer.into();
        self.created.fetch_add(1, Ordering::Relaxed);

        debug!(
            interface = type_name::<I>(),
            layer = layer.kind(),
            interceptors = layer.len(),
            "Creating interface proxy"
        );

        I::proxy(
            target,
            Pipeline::new(layer, markers).with_invocation_logging(self.log_invocations),
        )
    }

    /// Number of proxies created so far.
    pub fn proxies_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}
