//! Per-method markers and marker-scoped interceptor adapters.
//!
//! Markers are plain values attached to the methods of an implementation
//! type with `#[markers]` / `#[marker(..)]`. A marker-scoped interceptor
//! only handles calls whose implementation method carries its marker type;
//! every other call passes straight through.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::interceptor::{AsyncInterceptor, Interceptor};
use crate::invocation::{AsyncInvocation, Invocation};

/// Markers keyed by method name.
#[derive(Clone, Default)]
pub struct MarkerTable {
    methods: HashMap<&'static str, Vec<Arc<dyn Any + Send + Sync>>>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<M: Any + Send + Sync>(&mut self, method: &'static str, marker: M) -> &mut Self {
        self.methods.entry(method).or_default().push(Arc::new(marker));
        self
    }

    pub fn with<M: Any + Send + Sync>(mut self, method: &'static str, marker: M) -> Self {
        self.insert(method, marker);
        self
    }

    /// First marker of exactly type `M` on `method`.
    pub fn get<M: Any>(&self, method: &str) -> Option<&M> {
        self.methods
            .get(method)?
            .iter()
            .find_map(|marker| marker.downcast_ref::<M>())
    }

    pub fn contains<M: Any>(&self, method: &str) -> bool {
        self.get::<M>(method).is_some()
    }

    /// Number of methods carrying at least one marker.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MarkerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.methods.iter().map(|(name, markers)| (name, markers.len())))
            .finish()
    }
}

/// Implementation types expose their method markers through this trait.
///
/// `#[markers]` generates it. Types without markers can use the empty
/// default with `impl MethodMarkers for MyType {}`.
pub trait MethodMarkers {
    fn method_markers() -> MarkerTable {
        MarkerTable::new()
    }
}

/// Synchronous handler for calls carrying marker `Marker`.
pub trait MarkerInterceptor: Send + Sync {
    type Marker: Any + Send + Sync;

    /// Called only for marked methods. Must call `proceed` to reach the target.
    fn handle_marked(&self, invocation: &mut Invocation<'_>, marker: &Self::Marker);
}

/// Adapts a [`MarkerInterceptor`] into an [`Interceptor`].
pub struct MarkerScoped<T> {
    inner: T,
}

impl<T> MarkerScoped<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: MarkerInterceptor> Interceptor for MarkerScoped<T> {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        match invocation.marker::<T::Marker>() {
            Some(marker) => self.inner.handle_marked(invocation, marker),
            None => invocation.proceed(),
        }
    }
}

/// Asynchronous handler for calls carrying marker `Marker`.
#[async_trait]
pub trait AsyncMarkerInterceptor: Send + Sync {
    type Marker: Any + Send + Sync;

    fn handle_marked_synchronous(&self, invocation: &mut Invocation<'_>, marker: &Self::Marker);

    async fn handle_marked_asynchronous(
        &self,
        invocation: &mut AsyncInvocation<'_>,
        marker: &Self::Marker,
    );

    async fn handle_marked_asynchronous_with_result(
        &self,
        invocation: &mut AsyncInvocation<'_>,
        marker: &Self::Marker,
    );
}

/// Adapts an [`AsyncMarkerInterceptor`] into an [`AsyncInterceptor`].
pub struct AsyncMarkerScoped<T> {
    inner: T,
}

impl<T> AsyncMarkerScoped<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: AsyncMarkerInterceptor> AsyncInterceptor for AsyncMarkerScoped<T> {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        match invocation.marker::<T::Marker>() {
            Some(marker) => self.inner.handle_marked_synchronous(invocation, marker),
            None => invocation.proceed(),
        }
    }

    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>) {
        match invocation.marker::<T::Marker>() {
            Some(marker) => {
                self.inner
                    .handle_marked_asynchronous(invocation, marker)
                    .await
            }
            None => invocation.proceed().await,
        }
    }

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        match invocation.marker::<T::Marker>() {
            Some(marker) => {
                self.inner
                    .handle_marked_asynchronous_with_result(invocation, marker)
                    .await
            }
            None => invocation.proceed().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Audited {
        level: u8,
    }

    #[derive(Debug, PartialEq)]
    struct Cached;

    #[test]
    fn test_get_matches_exact_type() {
        let table = MarkerTable::new()
            .with("save", Audited { level: 2 })
            .with("save", Cached);

        assert_eq!(table.get::<Audited>("save"), Some(&Audited { level: 2 }));
        assert!(table.contains::<Cached>("save"));
        assert!(table.get::<Audited>("load").is_none());
        assert!(table.get::<u8>("save").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_first_marker_of_a_type_wins() {
        let mut table = MarkerTable::new();
        table
            .insert("save", Audited { level: 1 })
            .insert("save", Audited { level: 9 });

        assert_eq!(table.get::<Audited>("save").unwrap().level, 1);
    }

    #[test]
    fn test_default_method_markers_is_empty() {
        struct Plain;
        impl MethodMarkers for Plain {}

        assert!(Plain::method_markers().is_empty());
    }
}
