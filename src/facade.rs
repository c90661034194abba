//! Cache Facade
//!
//! The handle an application keeps for its cache. It is either unbound, or
//! bound to exactly one backend built from the application's configuration.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::backend::{BackendRegistry, SharedBackend};
use crate::config::CacheSettings;
use crate::error::{CacheError, Result};
use crate::memoize::{CacheOptions, Cached};

// == Application ==
/// A host application the facade can bind to.
pub trait Application {
    /// The cache options from the application's configuration store.
    fn cache_settings(&self) -> CacheSettings;

    /// Publishes the bound backend where request handlers can reach it.
    fn attach_cache(&mut self, backend: SharedBackend);
}

// == Cachual ==
/// Cloneable cache context. Clones share the same bound backend.
#[derive(Clone)]
pub struct Cachual {
    registry: Arc<BackendRegistry>,
    bound: Arc<RwLock<Option<SharedBackend>>>,
}

impl Cachual {
    /// An unbound facade using the built-in backends.
    pub fn new() -> Self {
        Self::with_registry(BackendRegistry::default())
    }

    /// An unbound facade resolving backend types through `registry`.
    pub fn with_registry(registry: BackendRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            bound: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a facade and binds it to `app` immediately.
    pub fn with_app<A: Application>(app: &mut A) -> Result<Self> {
        let cachual = Self::new();
        cachual.bind(app)?;
        Ok(cachual)
    }

    // == Bind ==
    /// Builds the backend configured on `app`, publishes it on `app` and
    /// keeps it for memoized calls.
    ///
    /// Binding again replaces the previous backend; it is dropped once the
    /// last decorator using it finishes. On error nothing changes.
    pub fn bind<A: Application>(&self, app: &mut A) -> Result<SharedBackend> {
        let settings = app.cache_settings();
        let backend = self.registry.build(&settings)?;

        let previous = self.bound.write().replace(Arc::clone(&backend));
        match previous {
            Some(old) => info!(
                backend = backend.kind(),
                replaced = old.kind(),
                "Cache backend rebound"
            ),
            None => info!(backend = backend.kind(), "Cache backend bound"),
        }

        app.attach_cache(Arc::clone(&backend));
        Ok(backend)
    }

    /// The bound backend.
    pub fn backend(&self) -> Result<SharedBackend> {
        self.bound.read().clone().ok_or(CacheError::NotBound)
    }

    pub fn is_bound(&self) -> bool {
        self.bound.read().is_some()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Returns a decorator memoizing functions through this facade with the
    /// given TTL and pack/unpack settings.
    pub fn cached<R>(&self, options: CacheOptions<R>) -> Cached<R> {
        Cached::new(self.clone(), options)
    }
}

impl Default for Cachual {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cachual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cachual")
            .field("registry", &self.registry)
            .field("backend", &self.bound.read().as_ref().map(|b| b.kind()))
            .finish()
    }
}
