//! Shared test fixtures for unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    interceptable, markers, AsyncInterceptor, AsyncInvocation, Injectable, Interceptor,
    Invocation,
};

#[interceptable]
#[async_trait]
pub trait TestService: Send + Sync {
    fn get_message(&self) -> String;
    async fn get_message_async(&self) -> String;
    fn echo(&self, text: String) -> String;
    async fn ping(&self);
}

#[derive(Debug, PartialEq)]
pub struct Audited {
    pub level: u8,
}

#[derive(Default, Injectable)]
pub struct TestServiceImpl;

#[markers]
#[async_trait]
impl TestService for TestServiceImpl {
    fn get_message(&self) -> String {
        "Hello World".to_string()
    }

    #[marker(Audited { level: 3 })]
    async fn get_message_async(&self) -> String {
        "Hello World Async".to_string()
    }

    #[marker(Audited { level: 1 })]
    fn echo(&self, text: String) -> String {
        text
    }

    async fn ping(&self) {}
}

/// Records the name of every intercepted method.
#[derive(Default)]
pub struct RecordingInterceptor {
    pub methods: Mutex<Vec<&'static str>>,
}

impl RecordingInterceptor {
    pub fn last(&self) -> Option<&'static str> {
        self.methods.lock().unwrap().last().copied()
    }
}

impl Interceptor for RecordingInterceptor {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        self.methods.lock().unwrap().push(invocation.method().name());
        invocation.proceed();
    }
}

/// Records the name of every intercepted method, in all three shapes.
#[derive(Default)]
pub struct RecordingAsyncInterceptor {
    pub methods: Mutex<Vec<&'static str>>,
}

impl RecordingAsyncInterceptor {
    pub fn last(&self) -> Option<&'static str> {
        self.methods.lock().unwrap().last().copied()
    }
}

#[async_trait]
impl AsyncInterceptor for RecordingAsyncInterceptor {
    fn intercept_synchronous(&self, invocation: &mut Invocation<'_>) {
        self.methods.lock().unwrap().push(invocation.method().name());
        invocation.proceed();
    }

    async fn intercept_asynchronous(&self, invocation: &mut AsyncInvocation<'_>) {
        self.methods.lock().unwrap().push(invocation.method().name());
        invocation.proceed().await;
    }

    async fn intercept_asynchronous_with_result(&self, invocation: &mut AsyncInvocation<'_>) {
        self.methods.lock().unwrap().push(invocation.method().name());
        invocation.proceed().await;
    }
}

/// Appends `suffix` to every `String` result.
pub struct SuffixInterceptor(pub &'static str);

impl Interceptor for SuffixInterceptor {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        invocation.proceed();
        if let Some(text) = invocation.return_value::<String>().cloned() {
            invocation.set_return_value(format!("{text}{}", self.0));
        }
    }
}

pub fn recording() -> (Arc<RecordingInterceptor>, Arc<dyn Interceptor>) {
    let recorder = Arc::new(RecordingInterceptor::default());
    let erased: Arc<dyn Interceptor> = recorder.clone();
    (recorder, erased)
}
