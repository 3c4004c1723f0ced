//! HTTP request handlers.

pub mod auth;
pub mod health;
pub mod metrics;
pub mod users;

pub use auth::{login, logout, logout_all, refresh, register};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use users::{delete_user, get_me, get_user, update_user};
