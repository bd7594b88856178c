//! Errors raised while registering, composing and invoking proxies.

use crate::registry::ResolveError;

/// Result alias for proxy operations.
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Errors from the interception layer.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A type added as an interceptor does not implement the required contract.
    #[error("{type_name} is not assignable to {contract}")]
    NotAssignable {
        type_name: &'static str,
        contract: &'static str,
    },

    #[error("Dynamic proxy service resolution implementation type is not set for {service}")]
    ImplementationNotSet { service: &'static str },

    #[error("Dynamic proxy service resolution resulted in a null implementation for {service}")]
    NullImplementation { service: &'static str },

    /// Raised only in strict resolution mode.
    #[error("Interceptor type {type_name} could not be resolved for {service}")]
    InterceptorUnresolved {
        type_name: &'static str,
        service: &'static str,
    },

    #[error("Registry error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Argument index {index} out of range ({count} arguments)")]
    ArgumentIndex { index: usize, count: usize },

    #[error("Argument {index} is a {actual}, not a {expected}")]
    ArgumentType {
        index: usize,
        actual: &'static str,
        expected: &'static str,
    },

    #[error("No return value was produced by {method}")]
    MissingReturnValue { method: String },

    #[error("Return value of {method} is not a {expected}")]
    ReturnType {
        method: String,
        expected: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
