// Dependency injection container

use crate::logging::{debug, trace};
use crate::metadata::Instance;
use crate::Error;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Supplies service instances to the dispatcher, once per request.
///
/// `None` means the service is not available; the request fails with a 500
/// and nothing else is affected.
#[async_trait]
pub trait ServiceResolver: Send + Sync {
    async fn resolve(&self, type_id: TypeId, type_name: &str) -> Option<Instance>;
}

type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

#[derive(Clone)]
enum Entry {
    /// Shared by every request
    Instance(Instance),
    /// Invoked on every resolve
    Factory(Factory),
}

/// The dependency injection container
#[derive(Clone, Default)]
pub struct Container {
    providers: Arc<RwLock<HashMap<TypeId, Entry>>>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new DI container");
        Self::default()
    }

    /// Register a singleton instance
    pub fn register<T: Send + Sync + 'static>(&self, instance: T) {
        self.register_arc(Arc::new(instance));
    }

    /// Register an already shared singleton instance
    pub fn register_arc<T: Send + Sync + 'static>(&self, instance: Arc<T>) {
        let type_name = std::any::type_name::<T>();
        self.providers
            .write()
            .insert(TypeId::of::<T>(), Entry::Instance(instance));
        debug!(provider = type_name, "Provider registered in DI container");
    }

    /// Register a factory that builds a fresh instance on every resolve
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let factory: Factory = Arc::new(move || Arc::new(factory()) as Instance);
        self.providers
            .write()
            .insert(TypeId::of::<T>(), Entry::Factory(factory));
        debug!(provider = type_name, "Provider factory registered in DI container");
    }

    /// Resolve a provider by type
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, Error> {
        let type_name = std::any::type_name::<T>();
        self.resolve_by_id(TypeId::of::<T>())
            .and_then(|any| any.downcast::<T>().ok())
            .ok_or_else(|| Error::ProviderNotFound(type_name.to_string()))
    }

    /// Resolve a provider by type identity
    pub fn resolve_by_id(&self, type_id: TypeId) -> Option<Instance> {
        // The factory runs outside the lock so it may use the container itself
        let entry = self.providers.read().get(&type_id).cloned()?;
        match entry {
            Entry::Instance(instance) => Some(instance),
            Entry::Factory(factory) => Some(factory()),
        }
    }

    /// Check if a provider is registered
    pub fn has<T: 'static>(&self) -> bool {
        let exists = self.providers.read().contains_key(&TypeId::of::<T>());
        trace!(provider = std::any::type_name::<T>(), exists, "Checked provider existence");
        exists
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    /// Clear all providers
    pub fn clear(&self) {
        let mut providers = self.providers.write();
        let count = providers.len();
        providers.clear();
        debug!(provider_count = count, "Cleared all providers from container");
    }
}

#[async_trait]
impl ServiceResolver for Container {
    async fn resolve(&self, type_id: TypeId, type_name: &str) -> Option<Instance> {
        let instance = self.resolve_by_id(type_id);
        if instance.is_none() {
            debug!(provider = type_name, "Provider not found in container");
        }
        instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Greeter {
        greeting: String,
    }

    #[test]
    fn test_register_and_resolve() {
        let container = Container::new();
        container.register(Greeter {
            greeting: "hello".to_string(),
        });

        let greeter = container.resolve::<Greeter>().unwrap();
        assert_eq!(greeter.greeting, "hello");
        assert!(container.has::<Greeter>());
        assert!(!container.has::<String>());
    }

    #[test]
    fn test_missing_provider_is_an_error() {
        let container = Container::new();
        let err = container.resolve::<Greeter>().unwrap_err();
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_factory_runs_per_resolve() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        let container = Container::new();
        container.register_factory(move || Greeter {
            greeting: format!("hello #{}", counter.fetch_add(1, Ordering::SeqCst)),
        });

        let first = container.resolve::<Greeter>().unwrap();
        let second = container.resolve::<Greeter>().unwrap();
        assert_eq!(first.greeting, "hello #0");
        assert_eq!(second.greeting, "hello #1");
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolver_boundary() {
        let container = Container::new();
        container.register(Greeter {
            greeting: "hi".to_string(),
        });
        let resolver: &dyn ServiceResolver = &container;

        let found = resolver
            .resolve(TypeId::of::<Greeter>(), "Greeter")
            .await
            .unwrap();
        assert!(found.downcast::<Greeter>().is_ok());
        assert!(resolver.resolve(TypeId::of::<u8>(), "u8").await.is_none());
    }

    #[test]
    fn test_resolver_boundary_blocking() {
        let container = Container::new();
        container.register_factory(|| Greeter {
            greeting: "hey".to_string(),
        });

        let resolver: &dyn ServiceResolver = &container;
        let found = tokio_test::block_on(resolver.resolve(TypeId::of::<Greeter>(), "Greeter"));
        assert!(found.is_some());
    }
}
