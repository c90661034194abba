//! Backend Registry
//!
//! Maps backend identifiers to constructors. A constructor receives the
//! configured arguments verbatim and either returns a backend or a
//! construction error.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::{MemcachedBackend, MemoryBackend, RedisBackend, SharedBackend};
use crate::config::CacheSettings;
use crate::error::{CacheError, Result};

/// Builds a backend from its `CACHUAL_ARGS` value (JSON null when absent).
pub type BackendConstructor = Arc<dyn Fn(&Value) -> Result<SharedBackend> + Send + Sync>;

// == Backend Registry ==
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl BackendRegistry {
    /// A registry with no backends.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Adds or replaces the constructor for `name`.
    pub fn register<C>(&mut self, name: impl Into<String>, constructor: C) -> &mut Self
    where
        C: Fn(&Value) -> Result<SharedBackend> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<C>(mut self, name: impl Into<String>, constructor: C) -> Self
    where
        C: Fn(&Value) -> Result<SharedBackend> + Send + Sync + 'static,
    {
        self.register(name, constructor);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered identifiers in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    // == Build ==
    /// Constructs the backend named by `settings`.
    ///
    /// # Errors
    /// - `Config` when no type is set or the type is not registered; no
    ///   constructor runs in either case
    /// - whatever the constructor returns for missing or malformed arguments
    pub fn build(&self, settings: &CacheSettings) -> Result<SharedBackend> {
        let backend_type = settings
            .backend_type
            .as_deref()
            .ok_or_else(|| CacheError::Config("no cache type specified".to_string()))?;

        let constructor = self.constructors.get(backend_type).ok_or_else(|| {
            CacheError::Config(format!(
                "unknown cache type '{}'. Available types: {:?}",
                backend_type,
                self.names()
            ))
        })?;

        debug!(backend = backend_type, "Constructing cache backend");
        let args = settings.backend_args.as_ref().unwrap_or(&Value::Null);
        constructor(args)
    }
}

impl Default for BackendRegistry {
    /// The built-in `redis`, `memcached` and `memory` backends.
    fn default() -> Self {
        Self::empty()
            .with(super::redis::KIND, RedisBackend::construct)
            .with(super::memcached::KIND, MemcachedBackend::construct)
            .with(super::memory::KIND, MemoryBackend::construct)
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_registry_names() {
        let registry = BackendRegistry::default();
        assert_eq!(registry.names(), vec!["memcached", "memory", "redis"]);
    }

    #[test]
    fn test_build_each_builtin() {
        let registry = BackendRegistry::default();
        let cases = [
            ("redis", json!({"host": "test", "port": 1, "db": 1})),
            ("memcached", json!({"server": ["test", 1]})),
            ("memory", json!({"max_entries": 10})),
        ];

        for (kind, args) in cases {
            let backend = registry.build(&CacheSettings::new(kind, args)).unwrap();
            assert_eq!(backend.kind(), kind);
        }
    }

    #[test]
    fn test_missing_type() {
        let registry = BackendRegistry::default();
        let settings = CacheSettings {
            backend_type: None,
            backend_args: Some(json!({"host": "test", "port": 1})),
        };

        let err = registry.build(&settings).unwrap_err();
        assert!(matches!(err, CacheError::Config(ref msg) if msg == "no cache type specified"));
    }

    #[test]
    fn test_unknown_type_runs_no_constructor() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let registry = BackendRegistry::empty().with("counting", move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(MemoryBackend::new(1, 0)) as SharedBackend)
        });

        let err = registry
            .build(&CacheSettings::new("R4n3ign4wuih4", json!({})))
            .unwrap_err();

        assert!(matches!(err, CacheError::Config(ref msg) if msg.contains("R4n3ign4wuih4")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_args_reach_constructor_as_null() {
        let registry = BackendRegistry::empty().with("strict", |args: &Value| {
            if args.is_null() {
                Err(CacheError::construction("strict", "arguments required"))
            } else {
                Ok(Arc::new(MemoryBackend::new(1, 0)) as SharedBackend)
            }
        });

        let settings = CacheSettings {
            backend_type: Some("strict".to_string()),
            backend_args: None,
        };
        assert!(matches!(
            registry.build(&settings),
            Err(CacheError::Construction { .. })
        ));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = BackendRegistry::default();
        registry.register("redis", |_: &Value| {
            Ok(Arc::new(MemoryBackend::new(1, 0)) as SharedBackend)
        });

        let backend = registry
            .build(&CacheSettings::new("redis", Value::Null))
            .unwrap();
        assert_eq!(backend.kind(), "memory");
        assert_eq!(registry.names().len(), 3);
    }
}
