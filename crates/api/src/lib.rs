//! HTTP API layer for doctrack.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: users, departments, groups, trackers and reports
//! - **Extractors**: authenticated caller and uniform JSON rejections
//! - **Middleware**: bearer token authentication and rate limiting
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
pub use rate_limit::{Decision, RateLimiter};
