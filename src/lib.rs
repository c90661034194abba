//! Cachual - memoizing cache facade with pluggable backends
//!
//! Binds an application to a Redis, Memcached or in-memory backend chosen by
//! configuration and memoizes async functions through it.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod facade;
pub mod memoize;
pub mod models;

pub use api::AppState;
pub use backend::{BackendRegistry, CacheBackend, RawDecorator, SharedBackend};
pub use config::{CacheSettings, Config};
pub use error::{CacheError, Result};
pub use facade::{Application, Cachual};
pub use memoize::{CacheOptions, Cached, CallArgs, Decorator, Memoized};
