//! API Handlers
//!
//! Demo routes for a host application bound through the facade.

use std::future::{ready, Ready};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};

use crate::backend::SharedBackend;
use crate::config::{CacheSettings, Config};
use crate::error::{CacheError, Result};
use crate::facade::{Application, Cachual};
use crate::memoize::{CacheOptions, Memoized};
use crate::models::{FibonacciResponse, HealthResponse, InvalidateResponse, StatsResponse};

/// Largest n whose Fibonacci number fits in a u64.
pub const MAX_FIBONACCI_INPUT: u64 = 93;

/// Identity of the memoized Fibonacci function in cache keys.
pub const FIBONACCI_IDENTITY: &str = "api::fibonacci";

pub type MemoizedFibonacci = Memoized<u64, u64, fn(u64) -> Ready<u64>>;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cachual: Cachual,
    /// Backend published by the last bind
    pub cache: Option<SharedBackend>,
    pub fibonacci: Arc<MemoizedFibonacci>,
}

impl AppState {
    /// Unbound state with a fresh facade.
    pub fn new(config: Config) -> Self {
        Self::with_cachual(config, Cachual::new())
    }

    /// Unbound state around an existing facade.
    pub fn with_cachual(config: Config, cachual: Cachual) -> Self {
        let options = CacheOptions::<u64>::default().with_ttl(config.default_ttl);
        let memoized = cachual
            .cached(options)
            .apply(FIBONACCI_IDENTITY, fibonacci as fn(u64) -> Ready<u64>);

        Self {
            config: Arc::new(config),
            cachual,
            cache: None,
            fibonacci: Arc::new(memoized),
        }
    }

    /// Builds the state and binds the configured backend.
    pub fn from_config(config: Config) -> Result<Self> {
        let mut state = Self::new(config);
        let cachual = state.cachual.clone();
        cachual.bind(&mut state)?;
        Ok(state)
    }

    pub fn cache(&self) -> Option<&SharedBackend> {
        self.cache.as_ref()
    }
}

impl Application for AppState {
    fn cache_settings(&self) -> CacheSettings {
        self.config.cache.clone()
    }

    fn attach_cache(&mut self, backend: SharedBackend) {
        self.cache = Some(backend);
    }
}

fn fibonacci(n: u64) -> Ready<u64> {
    let (mut current, mut next) = (0u64, 1u64);
    for _ in 0..n {
        (current, next) = (next, current.saturating_add(next));
    }
    ready(current)
}

/// Handler for GET /fib/:n
///
/// Computes the n-th Fibonacci number through the memoized function.
pub async fn fibonacci_handler(
    State(state): State<AppState>,
    Path(n): Path<u64>,
) -> Result<Json<FibonacciResponse>> {
    if n > MAX_FIBONACCI_INPUT {
        return Err(CacheError::InvalidRequest(format!(
            "n must be at most {}",
            MAX_FIBONACCI_INPUT
        )));
    }

    let value = state.fibonacci.call(n).await?;
    Ok(Json(FibonacciResponse::new(n, value)))
}

/// Handler for DELETE /fib/:n
pub async fn invalidate_fibonacci_handler(
    State(state): State<AppState>,
    Path(n): Path<u64>,
) -> Result<Json<InvalidateResponse>> {
    let removed = state.fibonacci.invalidate(&n).await?;
    Ok(Json(InvalidateResponse::new(n, removed)))
}

/// Handler for GET /stats
///
/// Only backends that keep statistics answer; others get 501.
pub async fn stats_handler(State(state): State<AppState>) -> Result<Json<StatsResponse>> {
    let backend = state.cachual.backend()?;
    let stats = backend.stats().await?.ok_or_else(|| {
        CacheError::Unsupported(format!("{} backend keeps no statistics", backend.kind()))
    })?;

    Ok(Json(StatsResponse::new(backend.kind(), &stats)))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend = state.cachual.backend().ok();
    Json(HealthResponse::new(backend.as_ref().map(|b| b.kind())))
}
