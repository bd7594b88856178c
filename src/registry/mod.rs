//! Service registry with singleton, scoped and transient lifetimes.
//!
//! Services are registered against a key type `S` (a concrete type or a
//! `dyn Trait`) on a [`ServiceCollection`], which builds a root
//! [`ServiceProvider`]. Instances are stored type-erased as
//! `Arc<dyn Any + Send + Sync>` wrapping an `Arc<S>`, so trait objects and
//! concrete types share one storage path.

mod collection;
mod provider;

use std::any::Any;
use std::sync::Arc;

pub use collection::{ServiceCollection, ServiceDescriptor};
pub use provider::ServiceProvider;

/// A resolved service, erased. Always holds an `Arc<S>` for the key type `S`.
pub type ErasedService = Arc<dyn Any + Send + Sync>;

pub(crate) type Factory =
    Arc<dyn Fn(&ServiceProvider) -> Result<ErasedService, ResolveError> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance per root provider, shared by every scope.
    Singleton,
    /// One instance per scope.
    Scoped,
    /// A new instance per resolution.
    Transient,
}

/// Error types for service resolution.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("No service registered for {type_name}")]
    NotRegistered { type_name: &'static str },

    #[error("Failed to construct {type_name}: {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    #[error("Registered service does not match requested type {type_name}")]
    TypeMismatch { type_name: &'static str },
}

impl ResolveError {
    pub fn construction(
        type_name: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Construction {
            type_name,
            source: Arc::new(source),
        }
    }
}

/// Types the registry can construct on its own.
///
/// `#[derive(Injectable)]` implements this through `Default`. Implement
/// it by hand to pull dependencies from the provider.
pub trait Injectable: Sized + Send + Sync + 'static {
    fn inject(provider: &ServiceProvider) -> Result<Self, ResolveError>;
}

pub(crate) fn erase<S: ?Sized + Send + Sync + 'static>(service: Arc<S>) -> ErasedService {
    Arc::new(service)
}

pub(crate) fn unerase<S: ?Sized + Send + Sync + 'static>(service: &ErasedService) -> Option<Arc<S>> {
    service.downcast_ref::<Arc<S>>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Fixed;

    impl Named for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn test_erase_round_trips_trait_objects() {
        let named: Arc<dyn Named> = Arc::new(Fixed);
        let erased = erase(Arc::clone(&named));

        let restored = unerase::<dyn Named>(&erased).unwrap();
        assert_eq!(restored.name(), "fixed");
        assert!(Arc::ptr_eq(&restored, &named));
    }

    #[test]
    fn test_unerase_rejects_other_types() {
        let erased = erase(Arc::new(5u32));
        assert!(unerase::<String>(&erased).is_none());
    }

    #[test]
    fn test_construction_error_keeps_source() {
        let err = ResolveError::construction("Widget", std::fmt::Error);
        assert!(err.to_string().starts_with("Failed to construct Widget"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
