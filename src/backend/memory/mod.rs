//! In-memory Backend
//!
//! Process-local backend with TTL expiration and LRU eviction. Useful for
//! single-instance deployments and tests.

mod entry;
mod lru;
mod stats;
mod store;
mod sweeper;


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::{CacheBackend, RawDecorator, SharedBackend};
use crate::error::{CacheError, Result};

pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::MemoryStore;
pub use sweeper::spawn_expiry_sweep;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB

/// Registry identifier
pub const KIND: &str = "memory";

/// Constructor arguments, all optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryArgs {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_ttl")]
    pub default_ttl: u64,
    /// Seconds between expiry sweeps, 0 disables the sweep
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

fn default_max_entries() -> usize {
    1000
}

fn default_ttl() -> u64 {
    300
}

fn default_cleanup_interval() -> u64 {
    1
}

impl Default for MemoryArgs {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            default_ttl: default_ttl(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

// == Memory Backend ==
#[derive(Debug)]
pub struct MemoryBackend {
    store: Arc<RwLock<MemoryStore>>,
    sweeper: Option<JoinHandle<()>>,
}

impl MemoryBackend {
    /// Creates a backend without a background sweep; expired entries are still
    /// dropped when read.
    pub fn new(max_entries: usize, default_ttl: u64) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new(max_entries, default_ttl))),
            sweeper: None,
        }
    }

    /// Builds a backend from registry arguments. JSON null means all defaults.
    ///
    /// The expiry sweep is started only when called inside a tokio runtime.
    pub fn from_args(args: &Value) -> Result<Self> {
        let args: MemoryArgs = if args.is_null() {
            MemoryArgs::default()
        } else {
            MemoryArgs::deserialize(args).map_err(|e| CacheError::construction(KIND, e))?
        };

        if args.max_entries == 0 {
            return Err(CacheError::construction(
                KIND,
                "max_entries must be greater than zero",
            ));
        }

        let mut backend = Self::new(args.max_entries, args.default_ttl);
        if args.cleanup_interval > 0 && Handle::try_current().is_ok() {
            backend.start_sweeper(Duration::from_secs(args.cleanup_interval));
        }
        Ok(backend)
    }

    /// Registry constructor.
    pub fn construct(args: &Value) -> Result<SharedBackend> {
        Ok(Arc::new(Self::from_args(args)?))
    }

    /// Starts (or restarts) the periodic expiry sweep.
    pub fn start_sweeper(&mut self, interval: Duration) {
        if let Some(previous) = self.sweeper.take() {
            previous.abort();
        }
        self.sweeper = Some(spawn_expiry_sweep(Arc::downgrade(&self.store), interval));
    }

    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }
}

impl Drop for MemoryBackend {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        // Write lock: reads update LRU order and counters
        Ok(self.store.write().await.get(key))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        self.store.write().await.set(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.write().await.delete(key))
    }

    async fn stats(&self) -> Result<Option<CacheStats>> {
        Ok(Some(self.store.read().await.stats()))
    }

    fn make_decorator(&self, ttl: Option<u64>) -> RawDecorator {
        RawDecorator::new(ttl).with_max_key_length(MAX_KEY_LENGTH)
    }
}
