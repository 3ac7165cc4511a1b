//! # PDND Test Utilities
//!
//! Shared test utilities for the PDND client workspace.
//!
//! This crate provides:
//! - Fixed RSA key pairs (PEM) for signing and verifying client assertions
//! - Custom assertions over compact JWTs (`AssertionAssertions` trait)
//! - Wiremock helpers standing in for the PDND token endpoint
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pdnd_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = wiremock::MockServer::start().await;
//!     mount_token_endpoint(&server, "client-1", "token-abc", 600).await;
//!
//!     let jwt: String = build_something(TEST_RSA_PRIVATE_KEY);
//!     jwt.assert_valid_rs256_jwt()
//!        .assert_kid("kid-1")
//!        .assert_verifies_with(TEST_RSA_PUBLIC_KEY, "aud");
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod mock_provider;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use mock_provider::*;
