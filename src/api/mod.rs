//! API Module
//!
//! A small host application demonstrating the facade over HTTP.
//!
//! # Endpoints
//! - `GET /fib/:n` - Memoized Fibonacci number
//! - `DELETE /fib/:n` - Drop the cached Fibonacci result for n
//! - `GET /stats` - Statistics of the bound backend, when it keeps any
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
