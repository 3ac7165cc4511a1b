//! OAuth 2.0 client-assertion token exchange.
//!
//! Trades a signed client assertion for an access token at the environment's
//! token endpoint (RFC 7523 client authentication with the
//! `client_credentials` grant).
//!
//! # Request
//!
//! `POST <endpoint>` with an `application/x-www-form-urlencoded` body holding
//! exactly `client_id`, `client_assertion`, `client_assertion_type` and
//! `grant_type`.
//!
//! # Errors
//!
//! A non-success status becomes `PdndError::Api` with the provider's
//! `error_description`, else its `error`, else the raw body. A success body
//! that is not the expected JSON is also `PdndError::Api`. There is no retry.
//!
//! # Security
//!
//! - The assertion and the issued token are never logged
//! - Provider error bodies are logged at trace level only

use crate::assertion::SignedAssertion;
use crate::config::{Environment, HttpSettings};
use crate::error::{PdndError, Result};
use crate::secret::{ExposeSecret, SecretString};
use crate::token_cache::TokenRecord;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use tracing::{debug, instrument, trace, warn};

// =============================================================================
// Constants
// =============================================================================

/// `client_assertion_type` for JWT bearer client authentication.
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// OAuth 2.0 grant type used for the exchange.
pub const GRANT_TYPE: &str = "client_credentials";

// =============================================================================
// OAuth Response Types
// =============================================================================

/// OAuth 2.0 token response.
#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64,
    #[serde(default)]
    token_type: Option<String>,
}

impl fmt::Debug for OAuthTokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

// =============================================================================
// Exchange Client
// =============================================================================

/// Client for the PDND token endpoint. Holds no token state.
#[derive(Clone)]
pub struct TokenExchangeClient {
    endpoint: String,
    http_client: reqwest::Client,
}

impl fmt::Debug for TokenExchangeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenExchangeClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TokenExchangeClient {
    /// Client for the fixed token endpoint of `environment`.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Config` if the HTTP client cannot be built.
    pub fn new(environment: Environment, settings: &HttpSettings) -> Result<Self> {
        Self::with_endpoint(environment.token_endpoint(), settings)
    }

    /// Client for an arbitrary token endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Config` if the HTTP client cannot be built.
    pub fn with_endpoint(endpoint: impl Into<String>, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            http_client: settings.build_client(true)?,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange `assertion` for an access token.
    ///
    /// The returned record expires `expires_in` seconds after the response
    /// was received.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Api` with status 0 if no response was received,
    /// with the response status if it is not a success, or if a success body
    /// lacks `access_token`/`expires_in`.
    #[instrument(skip_all, fields(client_id = %client_id))]
    pub async fn exchange(
        &self,
        assertion: &SignedAssertion,
        client_id: &str,
    ) -> Result<TokenRecord> {
        debug!(
            target: "pdnd.token_exchange",
            url = %self.endpoint,
            jti = %assertion.claims().jti,
            "Requesting access token"
        );

        let form_body = [
            ("client_id", client_id),
            ("client_assertion", assertion.token().expose_secret()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("grant_type", GRANT_TYPE),
        ];

        let response = self
            .http_client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "*/*")
            .form(&form_body)
            .send()
            .await
            .map_err(|e| {
                debug!(target: "pdnd.token_exchange", error = %e, "HTTP request failed");
                PdndError::local(format!("Token request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            PdndError::api(status.as_u16(), format!("Failed to read token response: {e}"))
        })?;

        if !status.is_success() {
            warn!(
                target: "pdnd.token_exchange",
                status = %status,
                "Token request rejected"
            );
            trace!(
                target: "pdnd.token_exchange",
                body = %body,
                "Token rejection response body"
            );
            return Err(PdndError::from_provider_response(status.as_u16(), &body));
        }

        let token_response: OAuthTokenResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(target: "pdnd.token_exchange", error = %e, "Failed to parse token response");
            PdndError::api(status.as_u16(), format!("Invalid token response: {e}"))
        })?;

        let expires_at = expiry_from_now(Utc::now(), token_response.expires_in).ok_or_else(|| {
            PdndError::api(
                status.as_u16(),
                format!("Invalid expires_in: {}", token_response.expires_in),
            )
        })?;

        debug!(
            target: "pdnd.token_exchange",
            expires_in_secs = token_response.expires_in,
            expires_at = %expires_at,
            "Access token acquired"
        );

        Ok(TokenRecord::new(
            SecretString::from(token_response.access_token),
            expires_at,
        ))
    }
}

/// `now + expires_in`, truncated to whole seconds.
fn expiry_from_now(now: DateTime<Utc>, expires_in: u64) -> Option<DateTime<Utc>> {
    let expires_in = i64::try_from(expires_in).ok()?;
    DateTime::from_timestamp(now.timestamp().checked_add(expires_in)?, 0)
}

// =============================================================================
// Tests
// =============================================================================
