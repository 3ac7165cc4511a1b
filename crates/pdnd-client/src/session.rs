//! Token resolution: cache first, exchange when needed.
//!
//! ```text
//! TokenCache::load ──valid──────────────────────────────► cached token
//!        │
//!        └─missing/stale─► build_assertion ─► exchange ─► (save) ─► fresh token
//! ```
//!
//! A new assertion is built only when the cache cannot serve the request.

use crate::assertion::build_assertion;
use crate::config::{ClientIdentity, Environment, HttpSettings};
use crate::error::Result;
use crate::token_cache::{TokenCache, TokenRecord};
use crate::token_exchange::TokenExchangeClient;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

/// Where a resolved token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    /// Still-valid token read from the cache file.
    Cache,
    /// Newly issued by the token endpoint.
    Exchange,
}

/// A token ready to be used as a bearer credential.
#[derive(Debug, Clone)]
pub struct ResolvedToken {
    pub record: TokenRecord,
    pub origin: TokenOrigin,
}

/// Everything needed to obtain an access token for one client identity.
#[derive(Debug)]
pub struct Session {
    identity: ClientIdentity,
    environment: Environment,
    cache: TokenCache,
    exchange: TokenExchangeClient,
    persist: bool,
}

impl Session {
    /// Session against the fixed token endpoint of `environment`.
    ///
    /// Fresh tokens are not written to the cache unless
    /// [`Session::persist_tokens`] is enabled.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Config` if the HTTP client cannot be built.
    pub fn new(
        identity: ClientIdentity,
        environment: Environment,
        cache: TokenCache,
        settings: &HttpSettings,
    ) -> Result<Self> {
        Ok(Self {
            exchange: TokenExchangeClient::new(environment, settings)?,
            identity,
            environment,
            cache,
            persist: false,
        })
    }

    /// Replace the exchange client (e.g. to target a different endpoint).
    #[must_use]
    pub fn with_exchange_client(mut self, exchange: TokenExchangeClient) -> Self {
        self.exchange = exchange;
        self
    }

    /// Save freshly exchanged tokens to the cache.
    #[must_use]
    pub fn persist_tokens(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Resolve a token valid right now.
    ///
    /// # Errors
    ///
    /// See [`Session::resolve_token_at`].
    pub async fn resolve_token(&self) -> Result<ResolvedToken> {
        self.resolve_token_at(Utc::now()).await
    }

    /// Resolve a token valid at `now`.
    ///
    /// # Errors
    ///
    /// Propagates `PdndError::Cache` from a corrupt cache file,
    /// `PdndError::Config` from key loading, and `PdndError::Api` from the
    /// exchange. Nothing is retried.
    #[instrument(skip_all, fields(client_id = %self.identity.client_id(), environment = %self.environment))]
    pub async fn resolve_token_at(&self, now: DateTime<Utc>) -> Result<ResolvedToken> {
        if let Some(record) = self.cache.load()? {
            if record.is_valid_at(now) {
                debug!(
                    target: "pdnd.session",
                    expires_at = ?record.expires_at(),
                    "Using cached token"
                );
                return Ok(ResolvedToken {
                    record,
                    origin: TokenOrigin::Cache,
                });
            }
            debug!(target: "pdnd.session", "Cached token expired");
        }

        let assertion = build_assertion(&self.identity, self.environment, now)?;
        let record = self
            .exchange
            .exchange(&assertion, self.identity.client_id())
            .await?;

        if self.persist {
            self.cache.save(&record)?;
        }

        info!(
            target: "pdnd.session",
            expires_at = ?record.expires_at(),
            persisted = self.persist,
            "Access token obtained"
        );

        Ok(ResolvedToken {
            record,
            origin: TokenOrigin::Exchange,
        })
    }
}
