//! Client identity, target environments, and HTTP settings.
//!
//! The identity is read from a JSON file keyed by environment name:
//!
//! ```json
//! {
//!   "produzione": {
//!     "issuer": "client-id",
//!     "clientId": "client-id",
//!     "privKeyPath": "/etc/pdnd/key.pem",
//!     "kid": "key-id",
//!     "purposeId": "purpose-id"
//!   }
//! }
//! ```

use crate::error::{PdndError, Result};
use crate::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout for HTTP clients.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const PRODUCTION_TOKEN_ENDPOINT: &str = "https://auth.interop.pagopa.it/token.oauth2";
const PRODUCTION_AUDIENCE: &str = "auth.interop.pagopa.it/client-assertion";
const STAGING_TOKEN_ENDPOINT: &str = "https://auth.uat.interop.pagopa.it/token.oauth2";
const STAGING_AUDIENCE: &str = "auth.uat.interop.pagopa.it/client-assertion";

// =============================================================================
// Environment
// =============================================================================

/// PDND platform environment.
///
/// Each environment has a fixed token endpoint and assertion audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Production platform (`produzione`).
    #[default]
    Production,
    /// Acceptance-test platform (`collaudo`).
    Staging,
}

impl Environment {
    /// OAuth 2.0 token endpoint for this environment.
    #[must_use]
    pub fn token_endpoint(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_TOKEN_ENDPOINT,
            Self::Staging => STAGING_TOKEN_ENDPOINT,
        }
    }

    /// Audience claim expected in client assertions.
    #[must_use]
    pub fn audience(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_AUDIENCE,
            Self::Staging => STAGING_AUDIENCE,
        }
    }

    /// Key under which this environment appears in configuration files.
    #[must_use]
    pub fn config_key(self) -> &'static str {
        match self {
            Self::Production => "produzione",
            Self::Staging => "collaudo",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

impl FromStr for Environment {
    type Err = PdndError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "produzione" | "production" => Ok(Self::Production),
            "collaudo" | "staging" | "uat" => Ok(Self::Staging),
            other => Err(PdndError::Config(format!("Unknown environment '{other}'"))),
        }
    }
}

// =============================================================================
// Client Identity
// =============================================================================

/// Credentials identifying this client to the PDND authorization server.
///
/// Either `privKey` (inline PEM) or `privKeyPath` must be set; the inline key
/// wins when both are. This is checked when the key is loaded, not here.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientIdentity {
    issuer: String,
    client_id: String,
    #[serde(default, rename = "privKey")]
    private_key: Option<SecretString>,
    #[serde(default, rename = "privKeyPath")]
    private_key_path: Option<PathBuf>,
    kid: String,
    purpose_id: String,
}

/// Where the RSA private key comes from.
#[derive(Debug, Clone, Copy)]
pub enum KeySource<'a> {
    /// PEM text supplied inline.
    Inline(&'a SecretString),
    /// Path to a PEM file.
    File(&'a Path),
}

impl ClientIdentity {
    /// Create an identity without key material.
    ///
    /// Attach a key with [`ClientIdentity::with_private_key`] or
    /// [`ClientIdentity::with_private_key_path`].
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        kid: impl Into<String>,
        purpose_id: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            private_key: None,
            private_key_path: None,
            kid: kid.into(),
            purpose_id: purpose_id.into(),
        }
    }

    /// Set the inline PEM private key.
    #[must_use]
    pub fn with_private_key(mut self, pem: SecretString) -> Self {
        self.private_key = Some(pem);
        self
    }

    /// Set the path of the PEM private key file.
    #[must_use]
    pub fn with_private_key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_key_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub fn purpose_id(&self) -> &str {
        &self.purpose_id
    }

    /// Resolve which key source to use. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Config` if neither an inline key nor a path is set.
    pub fn key_source(&self) -> Result<KeySource<'_>> {
        if let Some(pem) = self
            .private_key
            .as_ref()
            .filter(|pem| !pem.expose_secret().trim().is_empty())
        {
            return Ok(KeySource::Inline(pem));
        }

        if let Some(path) = self
            .private_key_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
        {
            return Ok(KeySource::File(path));
        }

        Err(PdndError::Config(
            "No private key or private key path provided".to_string(),
        ))
    }
}

/// Load the identity for `environment` from a JSON file keyed by environment name.
///
/// # Errors
///
/// Returns `PdndError::Config` if the file cannot be read, is not JSON, has no
/// entry for `environment`, or the entry is missing required fields.
pub fn load_identity(path: impl AsRef<Path>, environment: &str) -> Result<ClientIdentity> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PdndError::Config(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    parse_identity(&raw, environment)
}

/// Parse the identity for `environment` from configuration JSON text.
///
/// # Errors
///
/// See [`load_identity`].
pub fn parse_identity(raw: &str, environment: &str) -> Result<ClientIdentity> {
    let mut environments: HashMap<String, serde_json::Value> = serde_json::from_str(raw)
        .map_err(|e| PdndError::Config(format!("Invalid configuration JSON: {e}")))?;

    let entry = environments
        .remove(environment)
        .ok_or_else(|| PdndError::Config(format!("Environment '{environment}' not found")))?;

    let identity = ClientIdentity::deserialize(entry).map_err(|e| {
        PdndError::Config(format!(
            "Invalid configuration for environment '{environment}': {e}"
        ))
    })?;

    debug!(
        target: "pdnd.config",
        environment = %environment,
        client_id = %identity.client_id,
        kid = %identity.kid,
        "Client identity loaded"
    );

    Ok(identity)
}

// =============================================================================
// HTTP Settings
// =============================================================================

/// Timeouts applied to every outbound HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Whole-request timeout.
    pub timeout: Duration,

    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl HttpSettings {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build a `reqwest` client honoring these timeouts.
    ///
    /// `verify_tls = false` disables certificate verification. Only use it
    /// against non-production hosts.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Config` if the HTTP client cannot be built.
    pub fn build_client(&self, verify_tls: bool) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| PdndError::Config(format!("Failed to build HTTP client: {e}")))
    }
}

/// Per-call request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    /// Verify the server's TLS certificate.
    pub verify_tls: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self { verify_tls: true }
    }
}

impl RequestOptions {
    /// Options with certificate verification disabled.
    #[must_use]
    pub fn insecure() -> Self {
        Self { verify_tls: false }
    }
}
