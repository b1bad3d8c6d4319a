//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload and catalog endpoints
//! - Stage triggers and job status polling
//! - Raw artifact reads and deletes
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
