//! # IAM Test Utilities
//!
//! Shared test utilities for the identity service.
//!
//! This crate provides:
//! - Deterministic key material and a ready-made [`Config`](iam_service::config::Config)
//! - Builders for forged session claims and registration bodies
//! - Server test harness (TestIamServer for E2E tests over HTTP)
//! - Fixed test IDs and credentials
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use iam_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let server = TestIamServer::spawn().await?;
//!     let session = server.register_and_login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
//!
//!     session.access_token
//!         .assert_valid_jwt()
//!         .assert_for_subject(&session.user_id.to_string());
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use test_ids::*;
pub use token_builders::*;
