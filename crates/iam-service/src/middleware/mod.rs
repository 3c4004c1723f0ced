//! HTTP middleware.
//!
//! - `auth` - bearer authentication for protected routes
//! - `http_metrics` - request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_auth, AuthenticatedUser};
pub use http_metrics::http_metrics_middleware;
