//! Per-call invocation objects handed to interceptors.
//!
//! A proxy packs the call into an [`Invocation`] (synchronous layers) or an
//! [`AsyncInvocation`] (asynchronous layers). Interceptors inspect or
//! rewrite arguments, call `proceed` to run the rest of the chain and the
//! target, then inspect or replace the return value.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{ProxyError, Result};
use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::marker::MarkerTable;

/// How a method returns to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// Plain method; the value is available when the call returns.
    Synchronous,
    /// Async method with no result (`async fn f(&self)`).
    Asynchronous,
    /// Async method producing a value.
    AsyncWithResult,
}

/// Static description of an intercepted method.
#[derive(Debug)]
pub struct MethodInfo {
    interface: &'static str,
    name: &'static str,
    shape: CallShape,
}

impl MethodInfo {
    pub const fn new(interface: &'static str, name: &'static str, shape: CallShape) -> Self {
        Self {
            interface,
            name,
            shape,
        }
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }

    pub fn is_async(&self) -> bool {
        self.shape != CallShape::Synchronous
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.interface, self.name)
    }
}

/// A type-erased method result.
pub type ReturnValue = Box<dyn Any + Send>;

/// Synchronous call target: consumes the current arguments, produces the result.
pub type SyncTarget<'a> = dyn Fn(&Arguments) -> ReturnValue + 'a;

/// Asynchronous call target: builds the future of the real call from the
/// current arguments.
pub type AsyncTarget<'a> =
    dyn Fn(&Arguments) -> BoxFuture<'static, ReturnValue> + Send + Sync + 'a;

/// Positional, type-erased call arguments.
#[derive(Default)]
pub struct Arguments {
    values: Vec<Box<dyn Any + Send + Sync>>,
    type_names: Vec<&'static str>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument, builder style.
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Box::new(value));
        self.type_names.push(type_name::<T>());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get<T: Any>(&self, index: usize) -> Option<&T> {
        self.values.get(index)?.downcast_ref()
    }

    pub fn get_mut<T: Any>(&mut self, index: usize) -> Option<&mut T> {
        self.values.get_mut(index)?.downcast_mut()
    }

    /// Type name of the argument at `index`.
    pub fn type_name(&self, index: usize) -> Option<&'static str> {
        self.type_names.get(index).copied()
    }

    /// Replace the argument at `index`. The new value must have the same
    /// type as the old one.
    pub fn set<T: Any + Send + Sync>(&mut self, index: usize, value: T) -> Result<()> {
        let count = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ProxyError::ArgumentIndex { index, count })?;

        if !slot.is::<T>() {
            return Err(ProxyError::ArgumentType {
                index,
                actual: self.type_names[index],
                expected: type_name::<T>(),
            });
        }

        *slot = Box::new(value);
        Ok(())
    }

    /// Clone the argument at `index` out.
    pub fn value<T: Any + Clone>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or(ProxyError::ArgumentIndex {
            index,
            count: self.values.len(),
        })?;

        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ProxyError::ArgumentType {
                index,
                actual: self.type_names[index],
                expected: type_name::<T>(),
            })
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.type_names).finish()
    }
}

/// The not-yet-awaited result of an async method, as seen by a
/// synchronous interceptor.
///
/// When a synchronous layer wraps an async method, `proceed` stores a
/// `PendingReturn` in the return slot. An interceptor may leave it, take it
/// to wrap it in its own future, or replace it with a finished value.
pub struct PendingReturn(BoxFuture<'static, ReturnValue>);

impl PendingReturn {
    pub fn new(future: BoxFuture<'static, ReturnValue>) -> Self {
        Self(future)
    }

    pub async fn resolve(self) -> ReturnValue {
        self.0.await
    }

    pub fn into_future(self) -> BoxFuture<'static, ReturnValue> {
        self.0
    }
}

impl fmt::Debug for PendingReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingReturn")
    }
}

/// Interceptors driving a synchronous invocation.
#[derive(Clone, Copy)]
pub(crate) enum SyncChain<'a> {
    Interceptors(&'a [Arc<dyn Interceptor>]),
    AsyncInterceptors(&'a [Arc<dyn AsyncInterceptor>]),
}

/// A single synchronous trip through an interceptor chain.
pub struct Invocation<'a> {
    method: &'static MethodInfo,
    markers: &'a MarkerTable,
    arguments: Arguments,
    return_value: Option<ReturnValue>,
    chain: SyncChain<'a>,
    position: usize,
    target: &'a SyncTarget<'a>,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        method: &'static MethodInfo,
        markers: &'a MarkerTable,
        arguments: Arguments,
        chain: SyncChain<'a>,
        target: &'a SyncTarget<'a>,
    ) -> Self {
        Self {
            method,
            markers,
            arguments,
            return_value: None,
            chain,
            position: 0,
            target,
        }
    }

    pub fn method(&self) -> &'static MethodInfo {
        self.method
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn argument<T: Any>(&self, index: usize) -> Option<&T> {
        self.arguments.get(index)
    }

    /// Rewrite an argument before calling [`Invocation::proceed`].
    pub fn set_argument<T: Any + Send + Sync>(&mut self, index: usize, value: T) -> Result<()> {
        self.arguments.set(index, value)
    }

    pub fn return_value<T: Any>(&self) -> Option<&T> {
        self.return_value.as_ref()?.downcast_ref()
    }

    pub fn has_return_value(&self) -> bool {
        self.return_value.is_some()
    }

    pub fn set_return_value<T: Any + Send>(&mut self, value: T) {
        self.return_value = Some(Box::new(value));
    }

    /// Put back an erased value, e.g. one obtained from `take_return_value`.
    pub fn restore_return_value(&mut self, value: ReturnValue) {
        self.return_value = Some(value);
    }

    pub fn take_return_value(&mut self) -> Option<ReturnValue> {
        self.return_value.take()
    }

    /// Markers of every method on the implementation type.
    pub fn markers(&self) -> &'a MarkerTable {
        self.markers
    }

    /// Marker of type `M` on the implementation's version of this method.
    pub fn marker<M: Any>(&self) -> Option<&'a M> {
        self.markers.get::<M>(self.method.name())
    }

    /// Run the next interceptor, or the target once the chain is exhausted.
    ///
    /// May be called more than once; each call re-runs the remainder of
    /// the chain with the current arguments.
    pub fn proceed(&mut self) {
        let position = self.position;
        self.position = position + 1;

        let chain = self.chain;
        match chain {
            SyncChain::Interceptors(chain) if position < chain.len() => {
                chain[position].intercept(self)
            }
            SyncChain::AsyncInterceptors(chain) if position < chain.len() => {
                chain[position].intercept_synchronous(self)
            }
            _ => {
                let value = (self.target)(&self.arguments);
                self.return_value = Some(value);
            }
        }

        self.position = position;
    }

    pub(crate) fn into_return_value(self) -> Option<ReturnValue> {
        self.return_value
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .field("position", &self.position)
            .field("has_return_value", &self.return_value.is_some())
            .finish()
    }
}

/// A single asynchronous trip through an asynchronous interceptor chain.
pub struct AsyncInvocation<'a> {
    method: &'static MethodInfo,
    markers: &'a MarkerTable,
    arguments: Arguments,
    return_value: Option<ReturnValue>,
    chain: &'a [Arc<dyn AsyncInterceptor>],
    position: usize,
    target: &'a AsyncTarget<'a>,
}

impl<'a> AsyncInvocation<'a> {
    pub(crate) fn new(
        method: &'static MethodInfo,
        markers: &'a MarkerTable,
        arguments: Arguments,
        chain: &'a [Arc<dyn AsyncInterceptor>],
        target: &'a AsyncTarget<'a>,
    ) -> Self {
        Self {
            method,
            markers,
            arguments,
            return_value: None,
            chain,
            position: 0,
            target,
        }
    }

    pub fn method(&self) -> &'static MethodInfo {
        self.method
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }

    pub fn argument<T: Any>(&self, index: usize) -> Option<&T> {
        self.arguments.get(index)
    }

    pub fn set_argument<T: Any + Send + Sync>(&mut self, index: usize, value: T) -> Result<()> {
        self.arguments.set(index, value)
    }

    pub fn return_value<T: Any>(&self) -> Option<&T> {
        self.return_value.as_ref()?.downcast_ref()
    }

    pub fn has_return_value(&self) -> bool {
        self.return_value.is_some()
    }

    pub fn set_return_value<T: Any + Send>(&mut self, value: T) {
        self.return_value = Some(Box::new(value));
    }

    pub fn restore_return_value(&mut self, value: ReturnValue) {
        self.return_value = Some(value);
    }

    pub fn take_return_value(&mut self) -> Option<ReturnValue> {
        self.return_value.take()
    }

    pub fn markers(&self) -> &'a MarkerTable {
        self.markers
    }

    pub fn marker<M: Any>(&self) -> Option<&'a M> {
        self.markers.get::<M>(self.method.name())
    }

    /// Run the next interceptor's asynchronous hook, or await the target.
    ///
    /// Completes once the rest of the chain and the target have completed;
    /// the result is then in the return slot.
    pub fn proceed(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let position = self.position;
            let chain = self.chain;
            match chain.get(position) {
                Some(next) => {
                    self.position = position + 1;
                    match self.method.shape() {
                        CallShape::AsyncWithResult => {
                            next.intercept_asynchronous_with_result(&mut *self).await
                        }
                        _ => next.intercept_asynchronous(&mut *self).await,
                    }
                    self.position = position;
                }
                None => {
                    let pending = (self.target)(&self.arguments);
                    self.return_value = Some(pending.await);
                }
            }
        })
    }

    pub(crate) fn into_return_value(self) -> Option<ReturnValue> {
        self.return_value
    }
}

impl fmt::Debug for AsyncInvocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncInvocation")
            .field("method", &self.method)
            .field("arguments", &self.arguments)
            .field("position", &self.position)
            .field("has_return_value", &self.return_value.is_some())
            .finish()
    }
}
