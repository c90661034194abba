//! Configuration Module
//!
//! Loads cache settings and demo server parameters from environment variables.

use std::env;

use serde_json::{Map, Value};

use crate::error::{CacheError, Result};

/// Option naming the backend type.
pub const CACHUAL_TYPE: &str = "CACHUAL_TYPE";

/// Option holding the backend constructor arguments.
pub const CACHUAL_ARGS: &str = "CACHUAL_ARGS";

// == Cache Settings ==
/// The configuration bundle read once when a facade binds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheSettings {
    /// Registered backend identifier (`CACHUAL_TYPE`)
    pub backend_type: Option<String>,
    /// Arguments handed verbatim to the backend constructor (`CACHUAL_ARGS`)
    pub backend_args: Option<Value>,
}

impl CacheSettings {
    /// Creates settings for the given backend type and arguments.
    pub fn new(backend_type: impl Into<String>, backend_args: Value) -> Self {
        Self {
            backend_type: Some(backend_type.into()),
            backend_args: Some(backend_args),
        }
    }

    /// Reads the two cache options from a generic configuration store.
    ///
    /// A non-string `CACHUAL_TYPE` is treated as missing.
    pub fn from_map(store: &Map<String, Value>) -> Self {
        Self {
            backend_type: store
                .get(CACHUAL_TYPE)
                .and_then(Value::as_str)
                .map(str::to_string),
            backend_args: store.get(CACHUAL_ARGS).cloned(),
        }
    }

    /// Reads the cache options from environment variables.
    ///
    /// `CACHUAL_ARGS` must hold a JSON document when set.
    pub fn from_env() -> Result<Self> {
        let backend_type = env::var(CACHUAL_TYPE).ok().filter(|v| !v.is_empty());
        let backend_args = match env::var(CACHUAL_ARGS) {
            Ok(raw) if !raw.trim().is_empty() => Some(serde_json::from_str(&raw).map_err(|e| {
                CacheError::Config(format!("{} is not valid JSON: {}", CACHUAL_ARGS, e))
            })?),
            _ => None,
        };

        Ok(Self {
            backend_type,
            backend_args,
        })
    }
}

// == Config ==
/// Demo server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache backend selection
    pub cache: CacheSettings,
    /// TTL in seconds for the memoized demo route
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHUAL_TYPE` - Backend identifier (required at bind time)
    /// - `CACHUAL_ARGS` - Backend arguments as a JSON object
    /// - `CACHUAL_DEFAULT_TTL` - TTL for memoized routes in seconds (default: 60)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            cache: CacheSettings::from_env()?,
            default_ttl: env::var("CACHUAL_DEFAULT_TTL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            default_ttl: 60,
            server_port: 3000,
        }
    }
}
