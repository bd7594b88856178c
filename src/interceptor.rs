//! Interceptor contracts.

use async_trait::async_trait;

use crate::invocation::{AsyncInvocation, Invocation};

/// Intercepts calls through a synchronous layer.
///
/// Applies to every method, async ones included. For async methods the
/// return slot holds a [`crate::PendingReturn`] after `proceed`.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, invocation: &mut Invocation<'_>);
}

/// Intercepts calls through an asynchronous layer, with one hook per call shape.
#[async_trait]
pub trait AsyncInterceptor: Send + Sync {
    /// Plain methods.
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>);

    /// Async methods without a result.
    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>);

    /// Async methods producing a value.
    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>);
}
