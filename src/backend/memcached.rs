//! Memcached backend
//!
//! Stores packed values on a Memcached server through the blocking `memcache`
//! client, driven from `spawn_blocking`. The connection is opened on first
//! use.
//!
//! Opening the connection builds an r2d2 pool, which keeps retrying an
//! unreachable server for up to 30 seconds on a blocking-pool thread. Callers
//! stop waiting after `connect_timeout_ms` and get a `Backend` error; the
//! next call tries again.
//!
//! ## Arguments
//!
//! ```json
//! {"server": ["localhost", 11211], "default_ttl": 60, "connect_timeout_ms": 5000}
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::{task, time};

use super::{CacheBackend, RawDecorator, SharedBackend};
use crate::error::{CacheError, Result};

/// Registry identifier
pub const KIND: &str = "memcached";

/// Longest key the memcached text protocol accepts.
pub const MAX_KEY_LENGTH: usize = 250;

/// Expiration values above this are read by the server as Unix timestamps.
const MAX_RELATIVE_EXPIRATION: u64 = 60 * 60 * 24 * 30;

/// Constructor arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemcachedArgs {
    /// `[host, port]`
    pub server: (String, u16),
    /// TTL in seconds for writes that do not specify one; unset or 0 = no expiry
    #[serde(default)]
    pub default_ttl: Option<u64>,
    /// How long a call waits for the first connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

// == Memcached Backend ==
pub struct MemcachedBackend {
    url: String,
    client: OnceCell<memcache::Client>,
    default_ttl: Option<u64>,
    connect_timeout: Duration,
}

impl MemcachedBackend {
    /// Creates a backend from typed arguments. No connection is made.
    pub fn new(args: MemcachedArgs) -> Result<Self> {
        let (host, port) = args.server;
        if host.is_empty() {
            return Err(CacheError::construction(KIND, "server host is empty"));
        }

        Ok(Self {
            url: format!("memcache://{}:{}", host, port),
            client: OnceCell::new(),
            default_ttl: args.default_ttl,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
        })
    }

    /// Builds a backend from registry arguments.
    pub fn from_args(args: &Value) -> Result<Self> {
        let args =
            MemcachedArgs::deserialize(args).map_err(|e| CacheError::construction(KIND, e))?;
        Self::new(args)
    }

    /// Registry constructor.
    pub fn construct(args: &Value) -> Result<SharedBackend> {
        Ok(Arc::new(Self::from_args(args)?))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn client(&self) -> Result<memcache::Client> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let url = self.url.clone();
                let connect = task::spawn_blocking(move || memcache::Client::connect(url));
                let client = time::timeout(self.connect_timeout, connect)
                    .await
                    .map_err(|_| {
                        CacheError::Backend(format!(
                            "memcached: no connection to {} within {:?}",
                            self.url, self.connect_timeout
                        ))
                    })???;
                Ok::<_, CacheError>(client)
            })
            .await?;
        Ok(client.clone())
    }
}

/// Rejects keys the memcached protocol cannot carry.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidRequest(format!(
            "memcached keys must be 1 to {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CacheError::InvalidRequest(
            "memcached keys cannot contain whitespace or control characters".to_string(),
        ));
    }
    Ok(())
}

/// Converts a TTL in seconds to a memcached expiration value.
///
/// Long TTLs become absolute timestamps; 0 means no expiry.
fn expiration_for(ttl: u64) -> u32 {
    if ttl <= MAX_RELATIVE_EXPIRATION {
        return ttl as u32;
    }
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or(0);
    u32::try_from(now.saturating_add(ttl)).unwrap_or(u32::MAX)
}

#[async_trait]
impl CacheBackend for MemcachedBackend {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        let client = self.client().await?;
        let key = key.to_string();
        let value = task::spawn_blocking(move || client.get::<String>(&key)).await??;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        validate_key(key)?;
        let client = self.client().await?;
        let expiration = expiration_for(ttl.or(self.default_ttl).unwrap_or(0));
        let (key, value) = (key.to_string(), value.to_string());
        task::spawn_blocking(move || client.set(&key, value.as_str(), expiration)).await??;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let client = self.client().await?;
        let key = key.to_string();
        let removed = task::spawn_blocking(move || client.delete(&key)).await??;
        Ok(removed)
    }

    fn make_decorator(&self, ttl: Option<u64>) -> RawDecorator {
        RawDecorator::new(ttl).with_max_key_length(MAX_KEY_LENGTH)
    }
}

impl fmt::Debug for MemcachedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemcachedBackend")
            .field("url", &self.url)
            .field("connected", &self.client.initialized())
            .field("default_ttl", &self.default_ttl)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_construct_without_connecting() {
        let backend = MemcachedBackend::from_args(&json!({"server": ["test", 1]})).unwrap();

        assert_eq!(backend.kind(), "memcached");
        assert_eq!(backend.url(), "memcache://test:1");
        assert!(!backend.client.initialized());
    }

    #[test]
    fn test_missing_or_malformed_args() {
        let cases = [
            Value::Null,
            json!({}),
            json!({"server": "test:1"}),
            json!({"server": ["test"]}),
            json!({"server": ["", 11211]}),
            json!({"server": ["test", 1], "pool": 4}),
        ];

        for args in cases {
            assert!(
                matches!(
                    MemcachedBackend::from_args(&args),
                    Err(CacheError::Construction { .. })
                ),
                "expected construction error for {}",
                args
            );
        }
    }

    #[test]
    fn test_validate_key() {
        assert!(validate_key("cachual:fib:abc123").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("has space").is_err());
        assert!(validate_key("line\nbreak").is_err());
        assert!(validate_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_expiration_conversion() {
        assert_eq!(expiration_for(0), 0);
        assert_eq!(expiration_for(60), 60);
        assert_eq!(expiration_for(MAX_RELATIVE_EXPIRATION), MAX_RELATIVE_EXPIRATION as u32);

        let absolute = expiration_for(MAX_RELATIVE_EXPIRATION + 1) as i64;
        assert!(absolute > Utc::now().timestamp());
    }

    #[test]
    fn test_connect_timeout_argument() {
        let default = MemcachedBackend::from_args(&json!({"server": ["test", 1]})).unwrap();
        assert_eq!(default.connect_timeout, Duration::from_secs(5));

        let custom = MemcachedBackend::from_args(
            &json!({"server": ["test", 1], "connect_timeout_ms": 250}),
        )
        .unwrap();
        assert_eq!(custom.connect_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_unreachable_server_fails_within_timeout() {
        let backend = MemcachedBackend::from_args(
            &json!({"server": ["10.255.255.1", 11211], "connect_timeout_ms": 100}),
        )
        .unwrap();
        let runtime = tokio::runtime::Runtime::new().unwrap();

        let started = std::time::Instant::now();
        let result = runtime.block_on(backend.get("cachual:f:abc"));
        // the pool keeps retrying on its blocking thread
        runtime.shutdown_background();

        assert!(matches!(result, Err(CacheError::Backend(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!backend.client.initialized());
    }

    #[test]
    fn test_decorator_keeps_keys_within_limit() {
        let backend = MemcachedBackend::from_args(&json!({"server": ["test", 1]})).unwrap();
        let raw = backend.make_decorator(None);

        let key = crate::memoize::CacheKey::derive(&"f".repeat(64), &"x".repeat(200)).unwrap();
        assert!(validate_key(&raw.storage_key(&key)).is_ok());
        assert_eq!(raw.ttl(), None);
    }

    #[tokio::test]
    async fn test_invalid_key_rejected_before_connecting() {
        let backend = MemcachedBackend::from_args(&json!({"server": ["test", 1]})).unwrap();

        let result = backend.get("has space").await;
        assert!(matches!(result, Err(CacheError::InvalidRequest(_))));
        assert!(!backend.client.initialized());
    }
}
