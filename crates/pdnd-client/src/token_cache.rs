//! Single-record on-disk token cache.
//!
//! Persists the last access token and its expiry so later runs can skip the
//! token exchange while the token is still valid.
//!
//! # File format
//!
//! ```json
//! {"token": "<access token>", "exp": "2025-03-01T12:05:00Z"}
//! ```
//!
//! `exp` is written as RFC 3339 UTC. The `%Y-%m-%d %H:%M:%S` local-time form
//! is still read when it maps to exactly one instant.
//!
//! # Concurrency
//!
//! Single writer only. Saves go through a temporary file and a rename, so a
//! reader never sees a partial record, but two processes sharing one cache
//! path may overwrite each other. Serializing them is the caller's job.

use crate::error::{PdndError, Result};
use crate::secret::{ExposeSecret, SecretString};
use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of the cache file, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = "tmp/pdnd_token.json";

/// Legacy expiry format written by older clients (local time).
const LEGACY_EXPIRY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Token Record
// =============================================================================

/// An access token and the instant it stops being valid.
///
/// Records read back from disk may have no usable expiry; such records are
/// never valid and get overwritten by the next exchange.
#[derive(Clone)]
pub struct TokenRecord {
    access_token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    #[must_use]
    pub fn new(access_token: SecretString, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expires_at: Some(expires_at),
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// True iff the token is non-empty and `now` is strictly before expiry.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
            && self.expires_at.is_some_and(|exp| now < exp)
    }
}

impl PartialEq for TokenRecord {
    fn eq(&self, other: &Self) -> bool {
        self.access_token.expose_secret() == other.access_token.expose_secret()
            && self.expires_at == other.expires_at
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// True iff a record is present and valid at `now`.
#[must_use]
pub fn is_valid(record: Option<&TokenRecord>, now: DateTime<Utc>) -> bool {
    record.is_some_and(|r| r.is_valid_at(now))
}

// =============================================================================
// Persistence
// =============================================================================

#[derive(Serialize, Deserialize)]
struct PersistedToken {
    token: String,
    exp: String,
}

/// File-backed store for one [`TokenRecord`].
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

impl TokenCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record, or `None` if no cache file exists.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Cache` if the file exists but cannot be read or is
    /// not a JSON object with string `token` and `exp` fields.
    pub fn load(&self) -> Result<Option<TokenRecord>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    target: "pdnd.token_cache",
                    path = %self.path.display(),
                    "No cached token"
                );
                return Ok(None);
            }
            Err(e) => {
                return Err(PdndError::Cache(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let persisted: PersistedToken = serde_json::from_str(&raw).map_err(|e| {
            PdndError::Cache(format!("Malformed token cache {}: {e}", self.path.display()))
        })?;

        let expires_at = parse_expiry(&persisted.exp);
        if expires_at.is_none() {
            warn!(
                target: "pdnd.token_cache",
                path = %self.path.display(),
                "Cached token has no usable expiry"
            );
        }

        debug!(
            target: "pdnd.token_cache",
            path = %self.path.display(),
            expires_at = ?expires_at,
            "Cached token loaded"
        );

        Ok(Some(TokenRecord {
            access_token: SecretString::from(persisted.token),
            expires_at,
        }))
    }

    /// Overwrite the cache file with `record`.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Cache` on any I/O failure.
    pub fn save(&self, record: &TokenRecord) -> Result<()> {
        let persisted = PersistedToken {
            token: record.access_token.expose_secret().to_string(),
            exp: record.expires_at.map(format_expiry).unwrap_or_default(),
        };
        let body = serde_json::to_string(&persisted)
            .map_err(|e| PdndError::Cache(format!("Failed to serialize token: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PdndError::Cache(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, body).map_err(|e| {
            PdndError::Cache(format!("Failed to write {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            PdndError::Cache(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        debug!(
            target: "pdnd.token_cache",
            path = %self.path.display(),
            expires_at = %persisted.exp,
            "Token saved"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn format_expiry(expires_at: DateTime<Utc>) -> String {
    expires_at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a persisted expiry. Empty, unparsable, or ambiguous values yield `None`.
fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, LEGACY_EXPIRY_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
}

// =============================================================================
// Tests
// =============================================================================
