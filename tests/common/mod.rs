//! Shared fixtures for integration tests.
//!
//! Provides an interceptable `TestService`, a marked implementation and a
//! set of recording interceptors.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use interpose::{
    interceptable, markers, AsyncInterceptor, AsyncInvocation, Injectable, Interceptor,
    Invocation, ResolveError, ServiceProvider,
};

// ============================================================================
// Service Fixtures
// ============================================================================

#[interceptable]
#[async_trait]
pub trait TestService: Send + Sync {
    fn get_message(&self) -> String;
    async fn get_message_async(&self) -> String;
    fn greet(&self, name: String) -> String;
    async fn notify(&self, message: String);
    fn notifications(&self) -> Vec<String>;
    async fn pending(&self) -> usize;
    async fn clear(&self);
}

/// Second interface implemented by `TestServiceImpl`.
#[interceptable]
pub trait Inbox: Send + Sync {
    fn messages(&self) -> Vec<String>;
}

/// Marker payload attached to implementation methods.
#[derive(Debug, Clone, PartialEq)]
pub struct Audited {
    pub level: u8,
}

/// Marker type that no method carries.
#[derive(Debug)]
pub struct Cached;

#[derive(Default, Injectable)]
pub struct TestServiceImpl {
    notifications: Mutex<Vec<String>>,
}

impl TestServiceImpl {
    pub fn with_notifications(notifications: &[&str]) -> Self {
        Self {
            notifications: Mutex::new(notifications.iter().map(|n| n.to_string()).collect()),
        }
    }
}

#[markers]
#[async_trait]
impl TestService for TestServiceImpl {
    fn get_message(&self) -> String {
        "Hello World".to_string()
    }

    #[marker(Audited { level: 5 })]
    async fn get_message_async(&self) -> String {
        "Hello World Async".to_string()
    }

    #[marker(Audited { level: 2 })]
    fn greet(&self, name: String) -> String {
        format!("Hello, {name}")
    }

    #[marker(Audited { level: 7 })]
    async fn notify(&self, message: String) {
        self.notifications.lock().unwrap().push(message);
    }

    fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }

    async fn pending(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    async fn clear(&self) {
        self.notifications.lock().unwrap().clear();
    }
}

impl Inbox for TestServiceImpl {
    fn messages(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }
}

// ============================================================================
// Interceptor Fixtures
// ============================================================================

/// Ordered record of interceptor activity shared between interceptors.
#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<String>>,
}

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.entries.lock().unwrap().last().cloned()
    }
}

/// Records intercepted method names, tagged with a label.
pub struct Tagging {
    pub label: &'static str,
    pub journal: Arc<Journal>,
}

impl Tagging {
    pub fn new(label: &'static str, journal: &Arc<Journal>) -> Arc<Self> {
        Arc::new(Self {
            label,
            journal: Arc::clone(journal),
        })
    }
}

impl Interceptor for Tagging {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        self.journal
            .record(format!("{}:{}", self.label, invocation.method().name()));
        invocation.proceed();
    }
}

#[async_trait]
impl AsyncInterceptor for Tagging {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        self.journal
            .record(format!("{}:{}", self.label, invocation.method().name()));
        invocation.proceed();
    }

    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>) {
        self.journal
            .record(format!("{}:{}", self.label, invocation.method().name()));
        invocation.proceed().await;
    }

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        self.journal
            .record(format!("{}:{}", self.label, invocation.method().name()));
        invocation.proceed().await;
    }
}

/// Records the last intercepted method name.
#[derive(Default)]
pub struct LastMethod {
    last: Mutex<Option<&'static str>>,
}

impl LastMethod {
    pub fn get(&self) -> Option<&'static str> {
        *self.last.lock().unwrap()
    }
}

impl Interceptor for LastMethod {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        *self.last.lock().unwrap() = Some(invocation.method().name());
        invocation.proceed();
    }
}

#[async_trait]
impl AsyncInterceptor for LastMethod {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        *self.last.lock().unwrap() = Some(invocation.method().name());
        invocation.proceed();
    }

    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>) {
        *self.last.lock().unwrap() = Some(invocation.method().name());
        invocation.proceed().await;
    }

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        *self.last.lock().unwrap() = Some(invocation.method().name());
        invocation.proceed().await;
    }
}

/// Registry-constructed interceptor writing to the registered `Journal`.
pub struct JournalingInterceptor {
    journal: Arc<Journal>,
}

impl Injectable for JournalingInterceptor {
    fn inject(provider: &ServiceProvider) -> Result<Self, ResolveError> {
        Ok(Self {
            journal: provider.resolve_required::<Journal>()?,
        })
    }
}

impl Interceptor for JournalingInterceptor {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        self.journal
            .record(format!("typed:{}", invocation.method().name()));
        invocation.proceed();
    }
}

/// Registry-constructed async interceptor writing to the registered `Journal`.
pub struct AsyncJournalingInterceptor {
    journal: Arc<Journal>,
}

impl Injectable for AsyncJournalingInterceptor {
    fn inject(provider: &ServiceProvider) -> Result<Self, ResolveError> {
        Ok(Self {
            journal: provider.resolve_required::<Journal>()?,
        })
    }
}

#[async_trait]
impl AsyncInterceptor for AsyncJournalingInterceptor {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        self.journal
            .record(format!("async-typed:{}", invocation.method().name()));
        invocation.proceed();
    }

    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>) {
        self.journal
            .record(format!("async-typed:{}", invocation.method().name()));
        invocation.proceed().await;
    }

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        self.journal
            .record(format!("async-typed:{}", invocation.method().name()));
        invocation.proceed().await;
    }
}

/// Injectable type implementing no interceptor contract.
#[derive(Default, Injectable)]
pub struct NotAnInterceptor;

/// Returns a fixed value without calling the target.
pub struct ShortCircuit(pub &'static str);

impl Interceptor for ShortCircuit {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        invocation.set_return_value(self.0.to_string());
    }
}

#[async_trait]
impl AsyncInterceptor for ShortCircuit {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        invocation.set_return_value(self.0.to_string());
    }

    async fn intercept_asynchronous(&self, _invocation: &mut AsyncInvocation<'_>) {}

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        invocation.set_return_value(self.0.to_string());
    }
}

/// Upper-cases the first `String` argument.
pub struct Shouting;

impl Interceptor for Shouting {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        if let Some(text) = invocation.argument::<String>(0).cloned() {
            invocation
                .set_argument(0, text.to_uppercase())
                .expect("argument 0 is a String");
        }
        invocation.proceed();
    }
}

/// Appends a suffix to string results, also for async methods.
pub struct Suffix(pub &'static str);

impl Interceptor for Suffix {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        invocation.proceed();
        if let Some(text) = invocation.return_value::<String>().cloned() {
            invocation.set_return_value(format!("{text}{}", self.0));
        }
    }
}

#[async_trait]
impl AsyncInterceptor for Suffix {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        invocation.proceed();
        if let Some(text) = invocation.return_value::<String>().cloned() {
            invocation.set_return_value(format!("{text}{}", self.0));
        }
    }

    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>) {
        invocation.proceed().await;
    }

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        invocation.proceed().await;
        if let Some(text) = invocation.return_value::<String>().cloned() {
            invocation.set_return_value(format!("{text}{}", self.0));
        }
    }
}

/// Data pointer of a trait object, for identity checks across casts.
pub fn address<T: ?Sized>(service: &Arc<T>) -> *const () {
    Arc::as_ptr(service).cast::<()>()
}
