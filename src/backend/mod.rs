//! Cache Backends
//!
//! The capability interface every backend implements, the registry that builds
//! backends from configuration, and the built-in implementations.
//!
//! | Identifier  | Type                | Storage                          |
//! |-------------|---------------------|----------------------------------|
//! | `redis`     | [`RedisBackend`]    | Redis server (`redis` crate)     |
//! | `memcached` | [`MemcachedBackend`]| Memcached server (`memcache`)    |
//! | `memory`    | [`MemoryBackend`]   | Process-local TTL + LRU store    |

mod memcached;
pub mod memory;
mod redis;
pub mod registry;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::memoize::CacheKey;

pub use self::memcached::{MemcachedArgs, MemcachedBackend};
pub use self::memory::{CacheStats, MemoryArgs, MemoryBackend};
pub use self::redis::{RedisArgs, RedisBackend};
pub use self::registry::{BackendConstructor, BackendRegistry};

/// A backend shared between the facade, the host application and every
/// decorator it produced.
pub type SharedBackend = Arc<dyn CacheBackend>;

// == Capability Interface ==
/// Operations the memoizing decorator needs from a cache backend.
///
/// Values are packed strings; TTLs are seconds where `None` selects the
/// backend default and `Some(0)` disables expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync + fmt::Debug {
    /// Registry identifier of this backend.
    fn kind(&self) -> &'static str;

    /// Fetches a live value. Absence and expiry are `Ok(None)`, never errors.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value with the given TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()>;

    /// Removes a value, returning whether one was stored.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Hit/miss counters, for backends that keep them.
    async fn stats(&self) -> Result<Option<CacheStats>> {
        Ok(None)
    }

    /// Builds the decorator settings for one memoized call writing with
    /// `ttl`. Backends with key restrictions override this.
    fn make_decorator(&self, ttl: Option<u64>) -> RawDecorator {
        RawDecorator::new(ttl)
    }
}

// == Raw Decorator ==
/// The string-level part of a memoizing decorator, produced by the backend:
/// the TTL handed to `set` and the shape keys take before reaching storage.
///
/// Packing and unpacking stay with the typed
/// [`Decorator`](crate::memoize::Decorator) built on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDecorator {
    ttl: Option<u64>,
    max_key_length: Option<usize>,
}

impl RawDecorator {
    pub fn new(ttl: Option<u64>) -> Self {
        Self {
            ttl,
            max_key_length: None,
        }
    }

    /// Keys longer than `len` bytes are replaced by a digest of the key.
    pub fn with_max_key_length(mut self, len: usize) -> Self {
        self.max_key_length = Some(len);
        self
    }

    pub fn ttl(&self) -> Option<u64> {
        self.ttl
    }

    pub fn max_key_length(&self) -> Option<usize> {
        self.max_key_length
    }

    /// The key actually read and written for `key`.
    pub fn storage_key<'a>(&self, key: &'a CacheKey) -> Cow<'a, str> {
        match self.max_key_length {
            Some(len) => key.fit_to(len),
            None => Cow::Borrowed(key.as_str()),
        }
    }
}
