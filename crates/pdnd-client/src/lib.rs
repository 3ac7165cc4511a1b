//! Client for the PDND interoperability platform.
//!
//! Signs a short-lived client assertion, exchanges it for a bearer token at
//! the platform's OAuth 2.0 token endpoint, caches that token on disk, and
//! calls downstream e-service APIs with it.

#![warn(clippy::pedantic)]

/// Module for the error taxonomy shared by every component
pub mod error;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for client identity, environments and HTTP settings
pub mod config;

/// Module for building and signing RS256 client assertions
pub mod assertion;

/// Module for the OAuth 2.0 client-assertion token exchange
pub mod token_exchange;

/// Module for the single-record on-disk token cache
pub mod token_cache;

/// Module for query filter encoding
pub mod filters;

/// Module for bearer-authenticated calls to downstream APIs
pub mod api_client;

/// Module wiring cache, assertion and exchange together
pub mod session;

pub use error::{ErrorKind, PdndError, Result};
