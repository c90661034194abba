//! Response models for the demo HTTP routes
//!
//! DTOs serialized as JSON response bodies.

pub mod responses;

pub use responses::{FibonacciResponse, HealthResponse, InvalidateResponse, StatsResponse};
