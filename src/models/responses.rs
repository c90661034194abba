//! Response DTOs for the demo routes.

use serde::Serialize;

use crate::backend::CacheStats;

/// Response body for `GET /fib/:n`
#[derive(Debug, Clone, Serialize)]
pub struct FibonacciResponse {
    pub n: u64,
    pub value: u64,
}

impl FibonacciResponse {
    pub fn new(n: u64, value: u64) -> Self {
        Self { n, value }
    }
}

/// Response body for `DELETE /fib/:n`
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub n: u64,
    /// Whether a cached result existed
    pub removed: bool,
}

impl InvalidateResponse {
    pub fn new(n: u64, removed: bool) -> Self {
        Self { n, removed }
    }
}

/// Response body for `GET /stats`
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Backend identifier
    pub backend: String,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub total_entries: usize,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl StatsResponse {
    pub fn new(backend: impl Into<String>, stats: &CacheStats) -> Self {
        Self {
            backend: backend.into(),
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for `GET /health`
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" when a backend is bound, "unbound" otherwise
    pub status: String,
    /// Identifier of the bound backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    pub fn new(backend: Option<&str>) -> Self {
        let status = if backend.is_some() { "healthy" } else { "unbound" };
        Self {
            status: status.to_string(),
            backend: backend.map(str::to_string),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
