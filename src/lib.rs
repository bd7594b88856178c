//! Interpose - method interception for trait-object services.
//!
//! Registers trait-object services so that every resolution returns the
//! real implementation wrapped in ordered chains of synchronous and
//! asynchronous interceptors, under singleton, scoped or transient
//! lifetimes. Interceptors can be scoped to methods carrying a marker.

extern crate self as interpose;

pub mod aggregate;
pub mod compose;
pub mod config;
pub mod error;
pub mod facade;
pub mod generator;
pub mod global;
pub mod interceptor;
pub mod invocation;
pub mod marker;
pub mod pipeline;
pub mod registry;
pub mod service_type;
pub mod settings;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use aggregate::{resolve_interceptors, ResolvedInterceptors};
pub use compose::compose;
pub use config::ProxyConfig;
pub use error::{ProxyError, Result};
pub use facade::{ProxyRegistrar, ProxyRegistration};
pub use generator::{ImplementedBy, Interceptable, ProxyGenerator};
pub use global::{InterceptorRegistry, InterceptorSource};
pub use interceptor::{AsyncInterceptor, Interceptor};
pub use invocation::{
    Arguments, AsyncInvocation, CallShape, Invocation, MethodInfo, PendingReturn, ReturnValue,
};
pub use marker::{
    AsyncMarkerInterceptor, AsyncMarkerScoped, MarkerInterceptor, MarkerScoped, MarkerTable,
    MethodMarkers,
};
pub use pipeline::{InterceptorLayer, Pipeline};
pub use registry::{
    Injectable, ResolveError, ServiceCollection, ServiceLifetime, ServiceProvider,
};
pub use service_type::ServiceType;
pub use settings::ProxySettings;
pub use utils::bootstrap::init_tracing;

pub use interpose_macros::{interceptable, marker, markers, Injectable};

/// Support items for macro-generated code.
#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
    pub use futures::future::BoxFuture;

    pub use crate::pipeline::{argument, returned};
}
