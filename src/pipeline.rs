//! The interceptor layer a proxy dispatches through.

use std::any::{type_name, Any};
use std::sync::Arc;

use tracing::trace;

use crate::error::{ProxyError, Result};
use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::invocation::{
    Arguments, AsyncInvocation, AsyncTarget, Invocation, MethodInfo, PendingReturn, ReturnValue,
    SyncChain, SyncTarget,
};
use crate::marker::MarkerTable;

/// One ordered set of interceptors of a single kind.
#[derive(Clone)]
pub enum InterceptorLayer {
    Sync(Arc<[Arc<dyn Interceptor>]>),
    Async(Arc<[Arc<dyn AsyncInterceptor>]>),
}

impl InterceptorLayer {
    pub fn len(&self) -> usize {
        match self {
            Self::Sync(interceptors) => interceptors.len(),
            Self::Async(interceptors) => interceptors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sync(_) => "sync",
            Self::Async(_) => "async",
        }
    }
}

impl From<Vec<Arc<dyn Interceptor>>> for InterceptorLayer {
    fn from(interceptors: Vec<Arc<dyn Interceptor>>) -> Self {
        Self::Sync(interceptors.into())
    }
}

impl From<Vec<Arc<dyn AsyncInterceptor>>> for InterceptorLayer {
    fn from(interceptors: Vec<Arc<dyn AsyncInterceptor>>) -> Self {
        Self::Async(interceptors.into())
    }
}

impl std::fmt::Debug for InterceptorLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InterceptorLayer::{}({})", self.kind(), self.len())
    }
}

/// Interceptor layer plus the implementation's markers, shared by every
/// call through one proxy.
#[derive(Clone, Debug)]
pub struct Pipeline {
    layer: InterceptorLayer,
    markers: Arc<MarkerTable>,
    log_invocations: bool,
}

impl Pipeline {
    pub fn new(layer: InterceptorLayer, markers: Arc<MarkerTable>) -> Self {
        Self {
            layer,
            markers,
            log_invocations: false,
        }
    }

    /// Emit a trace event for every intercepted call.
    pub fn with_invocation_logging(mut self, enabled: bool) -> Self {
        self.log_invocations = enabled;
        self
    }

    pub fn layer(&self) -> &InterceptorLayer {
        &self.layer
    }

    pub fn markers(&self) -> &MarkerTable {
        &self.markers
    }

    /// Run a synchronous method through the layer.
    pub fn invoke(
        &self,
        method: &'static MethodInfo,
        arguments: Arguments,
        target: &SyncTarget<'_>,
    ) -> Option<ReturnValue> {
        self.trace(method);

        let chain = match &self.layer {
            InterceptorLayer::Sync(interceptors) => SyncChain::Interceptors(interceptors),
            InterceptorLayer::Async(interceptors) => SyncChain::AsyncInterceptors(interceptors),
        };
        let mut invocation = Invocation::new(method, &self.markers, arguments, chain, target);
        invocation.proceed();
        invocation.into_return_value()
    }

    /// Run an async method through the layer.
    ///
    /// A synchronous layer sees the target's future as a [`PendingReturn`];
    /// whatever sits in the return slot when the chain unwinds is awaited if
    /// still pending and used as-is otherwise.
    pub async fn invoke_async(
        &self,
        method: &'static MethodInfo,
        arguments: Arguments,
        target: &AsyncTarget<'_>,
    ) -> Option<ReturnValue> {
        self.trace(method);

        match &self.layer {
            InterceptorLayer::Sync(interceptors) => {
                let returned = {
                    let deferred = |args: &Arguments| -> ReturnValue {
                        Box::new(PendingReturn::new(target(args)))
                    };
                    let mut invocation = Invocation::new(
                        method,
                        &self.markers,
                        arguments,
                        SyncChain::Interceptors(interceptors),
                        &deferred,
                    );
                    invocation.proceed();
                    invocation.into_return_value()
                };

                match returned?.downcast::<PendingReturn>() {
                    Ok(pending) => Some(pending.resolve().await),
                    Err(value) => Some(value),
                }
            }
            InterceptorLayer::Async(interceptors) => {
                let mut invocation =
                    AsyncInvocation::new(method, &self.markers, arguments, interceptors, target);
                invocation.proceed().await;
                invocation.into_return_value()
            }
        }
    }

    fn trace(&self, method: &MethodInfo) {
        if self.log_invocations {
            trace!(
                interface = method.interface(),
                method = method.name(),
                layer = self.layer.kind(),
                interceptors = self.layer.len(),
                "intercepting call"
            );
        }
    }
}

/// Convert a finished return slot into the method's declared return type.
///
/// An empty slot is accepted only for `()`.
pub fn into_return<T: Any>(value: Option<ReturnValue>, method: &MethodInfo) -> Result<T> {
    let value = match value {
        Some(value) => value,
        None => {
            let unit: ReturnValue = Box::new(());
            return unit
                .downcast::<T>()
                .map(|value| *value)
                .map_err(|_| ProxyError::MissingReturnValue {
                    method: method.to_string(),
                });
        }
    };

    value
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| ProxyError::ReturnType {
            method: method.to_string(),
            expected: type_name::<T>(),
        })
}

/// Argument unpacking for generated proxies. Panics on a type or index
/// violation, which can only come from a misbehaving interceptor.
#[doc(hidden)]
pub fn argument<T: Any + Clone>(arguments: &Arguments, index: usize, method: &MethodInfo) -> T {
    match arguments.value::<T>(index) {
        Ok(value) => value,
        Err(e) => panic!("{method}: {e}"),
    }
}

/// Return unpacking for generated proxies. Panics like [`argument`].
#[doc(hidden)]
pub fn returned<T: Any>(value: Option<ReturnValue>, method: &MethodInfo) -> T {
    match into_return::<T>(value, method) {
        Ok(value) => value,
        Err(e) => panic!("{e}"),
    }
}
