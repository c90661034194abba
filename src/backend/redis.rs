//! Redis backend
//!
//! Stores packed values in a Redis database. The client is created from the
//! configured arguments without touching the network; a multiplexed
//! connection is opened on first use and shared afterwards.
//!
//! ## Arguments
//!
//! ```json
//! {"host": "localhost", "port": 6379, "db": 0, "password": "secret", "default_ttl": 60}
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;
use url::Url;

use super::{CacheBackend, SharedBackend};
use crate::error::{CacheError, Result};

/// Registry identifier
pub const KIND: &str = "redis";

/// Constructor arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisArgs {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// TTL in seconds for writes that do not specify one; unset or 0 = no expiry
    #[serde(default)]
    pub default_ttl: Option<u64>,
}

impl RedisArgs {
    /// Connection URL for these arguments.
    pub fn connection_url(&self) -> Result<Url> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut url = Url::parse(&format!("redis://{}:{}/{}", host, self.port, self.db))
            .map_err(|e| CacheError::construction(KIND, format!("invalid address: {}", e)))?;

        if let Some(username) = &self.username {
            url.set_username(username)
                .map_err(|_| CacheError::construction(KIND, "username not accepted"))?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| CacheError::construction(KIND, "password not accepted"))?;
        }
        Ok(url)
    }
}

// == Redis Backend ==
pub struct RedisBackend {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
    address: String,
    default_ttl: Option<u64>,
}

impl RedisBackend {
    /// Creates a backend from typed arguments. No connection is made.
    pub fn new(args: RedisArgs) -> Result<Self> {
        let url = args.connection_url()?;
        let client = Client::open(url.as_str()).map_err(|e| CacheError::construction(KIND, e))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            address: format!("{}:{}/{}", args.host, args.port, args.db),
            default_ttl: args.default_ttl,
        })
    }

    /// Builds a backend from registry arguments.
    pub fn from_args(args: &Value) -> Result<Self> {
        let args = RedisArgs::deserialize(args).map_err(|e| CacheError::construction(KIND, e))?;
        Self::new(args)
    }

    /// Registry constructor.
    pub fn construct(args: &Value) -> Result<SharedBackend> {
        Ok(Arc::new(Self::from_args(args)?))
    }

    /// `host:port/db` this backend talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let connection = self
            .connection
            .get_or_try_init(|| self.client.get_multiplexed_async_connection())
            .await?;
        Ok(connection.clone())
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.get::<_, Option<String>>(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        let mut conn = self.connection().await?;
        match ttl.or(self.default_ttl).unwrap_or(0) {
            0 => conn.set::<_, _, ()>(key, value).await?,
            seconds => conn.set_ex::<_, _, ()>(key, value, seconds).await?,
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("address", &self.address)
            .field("connected", &self.connection.initialized())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_construct_without_connecting() {
        let backend = RedisBackend::from_args(&json!({"host": "test", "port": 1, "db": 1})).unwrap();

        assert_eq!(backend.kind(), "redis");
        assert_eq!(backend.address(), "test:1/1");
        assert!(!backend.connection.initialized());
    }

    #[test]
    fn test_db_defaults_to_zero() {
        let backend = RedisBackend::from_args(&json!({"host": "cache", "port": 6379})).unwrap();
        assert_eq!(backend.address(), "cache:6379/0");
    }

    #[test]
    fn test_missing_or_malformed_args() {
        let cases = [
            Value::Null,
            json!({}),
            json!({"host": "test"}),
            json!({"host": "test", "port": "six"}),
            json!({"host": "test", "port": 70000}),
            json!({"host": "test", "port": 1, "socket": "/tmp/redis.sock"}),
        ];

        for args in cases {
            let result = RedisBackend::from_args(&args);
            assert!(
                matches!(result, Err(CacheError::Construction { ref backend, .. }) if backend == "redis"),
                "expected construction error for {}",
                args
            );
        }
    }

    #[test]
    fn test_connection_url_with_credentials() {
        let args = RedisArgs {
            host: "cache".to_string(),
            port: 6380,
            db: 2,
            username: Some("app".to_string()),
            password: Some("p@ss word".to_string()),
            default_ttl: None,
        };

        let url = args.connection_url().unwrap();
        assert_eq!(url.username(), "app");
        assert_eq!(url.host_str(), Some("cache"));
        assert_eq!(url.port(), Some(6380));
        assert_eq!(url.path(), "/2");
        assert!(url.password().is_some());
    }

    #[test]
    fn test_ipv6_host() {
        let backend = RedisBackend::from_args(&json!({"host": "::1", "port": 6379}));
        assert!(backend.is_ok());

        for host in ["::1", "[::1]"] {
            let args = RedisArgs {
                host: host.to_string(),
                port: 6379,
                db: 0,
                username: None,
                password: None,
                default_ttl: None,
            };
            let url = args.connection_url().unwrap();
            assert_eq!(url.host_str(), Some("[::1]"));
            assert_eq!(url.port(), Some(6379));
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error_not_a_miss() {
        let backend =
            RedisBackend::from_args(&json!({"host": "127.0.0.1", "port": 1})).unwrap();

        let result = backend.get("cachual:test").await;
        assert!(matches!(result, Err(CacheError::Backend(_))));
    }
}
