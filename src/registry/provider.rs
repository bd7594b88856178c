//! Resolution side of the service registry.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use super::{unerase, ErasedService, ResolveError, ServiceDescriptor, ServiceLifetime};

type CacheKey = (TypeId, usize);
type Cache = Mutex<HashMap<CacheKey, ErasedService>>;

/// Resolves registered services.
///
/// The provider returned by [`super::ServiceCollection::build`] is the root
/// scope. [`ServiceProvider::create_scope`] opens a child scope that shares
/// singletons with the root but keeps its own scoped instances.
pub struct ServiceProvider {
    descriptors: Arc<HashMap<TypeId, Vec<ServiceDescriptor>>>,
    singletons: Arc<Cache>,
    scoped: Cache,
}

impl ServiceProvider {
    pub(crate) fn new(descriptors: &[ServiceDescriptor]) -> Self {
        let mut by_type: HashMap<TypeId, Vec<ServiceDescriptor>> = HashMap::new();
        for descriptor in descriptors {
            by_type
                .entry(descriptor.service_type())
                .or_default()
                .push(descriptor.clone());
        }

        Self {
            descriptors: Arc::new(by_type),
            singletons: Arc::new(Mutex::new(HashMap::new())),
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Open a child scope.
    pub fn create_scope(&self) -> ServiceProvider {
        Self {
            descriptors: Arc::clone(&self.descriptors),
            singletons: Arc::clone(&self.singletons),
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the last registration for `S`, or `None` if `S` is not registered.
    pub fn resolve<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<S>>, ResolveError> {
        match self.resolve_by_id(TypeId::of::<S>())? {
            Some(erased) => unerase::<S>(&erased)
                .map(Some)
                .ok_or(ResolveError::TypeMismatch {
                    type_name: type_name::<S>(),
                }),
            None => Ok(None),
        }
    }

    /// Resolve `S`, failing if it is not registered.
    pub fn resolve_required<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolveError> {
        self.resolve::<S>()?.ok_or(ResolveError::NotRegistered {
            type_name: type_name::<S>(),
        })
    }

    /// Resolve every registration for `S` in registration order.
    pub fn resolve_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, ResolveError> {
        let Some(descriptors) = self.descriptors.get(&TypeId::of::<S>()) else {
            return Ok(Vec::new());
        };

        descriptors
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let erased = self.instantiate(index, descriptor)?;
                unerase::<S>(&erased).ok_or(ResolveError::TypeMismatch {
                    type_name: type_name::<S>(),
                })
            })
            .collect()
    }

    /// Resolve the last registration keyed by `id`, still erased.
    pub fn resolve_by_id(&self, id: TypeId) -> Result<Option<ErasedService>, ResolveError> {
        let Some(descriptors) = self.descriptors.get(&id) else {
            return Ok(None);
        };
        match descriptors.len().checked_sub(1) {
            Some(index) => self.instantiate(index, &descriptors[index]).map(Some),
            None => Ok(None),
        }
    }

    pub fn is_registered<S: ?Sized + 'static>(&self) -> bool {
        self.is_registered_id(TypeId::of::<S>())
    }

    pub fn is_registered_id(&self, id: TypeId) -> bool {
        self.descriptors.contains_key(&id)
    }

    fn instantiate(
        &self,
        index: usize,
        descriptor: &ServiceDescriptor,
    ) -> Result<ErasedService, ResolveError> {
        let key = (descriptor.service_type(), index);
        let create = || {
            trace!(
                service = descriptor.type_name(),
                lifetime = ?descriptor.lifetime(),
                "constructing service"
            );
            (descriptor.factory())(self)
        };

        match descriptor.lifetime() {
            ServiceLifetime::Transient => create(),
            ServiceLifetime::Singleton => cached(&self.singletons, key, create),
            ServiceLifetime::Scoped => cached(&self.scoped, key, create),
        }
    }
}

/// Look up `key`, constructing on miss. The lock is released while the
/// factory runs so factories may resolve other services. If two callers
/// race, the first stored instance wins.
fn cached(
    cache: &Cache,
    key: CacheKey,
    create: impl FnOnce() -> Result<ErasedService, ResolveError>,
) -> Result<ErasedService, ResolveError> {
    if let Some(existing) = lock(cache).get(&key) {
        return Ok(Arc::clone(existing));
    }

    let created = create()?;
    Ok(Arc::clone(lock(cache).entry(key).or_insert(created)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
