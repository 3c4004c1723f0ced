//! Parley identity and access-control service.
//!
//! Authenticates users, issues and rotates session tokens, keeps PII
//! encrypted at rest while still searchable, and answers attribute-based
//! authorization questions.
//!
//! # Modules
//!
//! - `authz` - ABAC policy engine
//! - `config` - Service configuration
//! - `crypto` - Search-key hasher, field cipher, password hashing, token codec
//! - `errors` - Error types
//! - `handlers` / `middleware` / `routes` - HTTP surface
//! - `models` - Domain and storage types
//! - `observability` - Metrics and log correlation helpers
//! - `repositories` - User and session stores (memory, Postgres)
//! - `services` - Identity directory, session manager, registration

pub mod authz;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
