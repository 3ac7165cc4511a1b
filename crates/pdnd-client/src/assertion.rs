//! Client assertion construction and RS256 signing.
//!
//! A client assertion is a short-lived JWT proving possession of the client's
//! registered RSA key. It is minted fresh for every token exchange and never
//! reused.
//!
//! # Format
//!
//! ```text
//! header: { "alg": "RS256", "typ": "JWT", "kid": <kid> }
//! claims: { "iss", "sub" = clientId, "aud", "purposeId",
//!           "jti" = 16 random bytes as hex, "iat", "exp" = iat + 300 }
//! ```
//!
//! # Security
//!
//! - The private key is held as `SecretString` and never logged
//! - `jti` comes from the system CSPRNG, so replayed assertions are detectable
//! - The signed assertion is wrapped in `SecretString`; only `trace` logs it

use crate::config::{ClientIdentity, Environment, KeySource};
use crate::error::{PdndError, Result};
use crate::secret::{ExposeSecret, SecretString};
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument, trace};

// =============================================================================
// Constants
// =============================================================================

/// Lifetime of a client assertion in seconds (`exp - iat`). Not configurable.
pub const ASSERTION_LIFETIME_SECS: i64 = 300;

/// Number of random bytes in the `jti` claim.
const JTI_BYTES: usize = 16;

// =============================================================================
// Claims Types
// =============================================================================

/// Claims carried by a client assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer, as registered on the platform.
    pub iss: String,

    /// Subject (the client ID).
    pub sub: String,

    /// Audience of the environment's authorization server.
    pub aud: String,

    /// Purpose the access is requested for.
    #[serde(rename = "purposeId")]
    pub purpose_id: String,

    /// Unique assertion ID (32 hex chars).
    pub jti: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl AssertionClaims {
    /// Build claims for `identity` issued at `now`, with a fresh `jti`.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Config` if the system random generator fails.
    pub fn new(
        identity: &ClientIdentity,
        environment: Environment,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let iat = now.timestamp();
        Ok(Self {
            iss: identity.issuer().to_string(),
            sub: identity.client_id().to_string(),
            aud: environment.audience().to_string(),
            purpose_id: identity.purpose_id().to_string(),
            jti: generate_jti()?,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        })
    }
}

/// A signed client assertion in compact serialization.
#[derive(Clone)]
pub struct SignedAssertion {
    token: SecretString,
    claims: AssertionClaims,
}

impl SignedAssertion {
    /// The compact `header.claims.signature` form.
    #[must_use]
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// The claims that were signed.
    #[must_use]
    pub fn claims(&self) -> &AssertionClaims {
        &self.claims
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedAssertion")
            .field("token", &"[REDACTED]")
            .field("claims", &self.claims)
            .finish()
    }
}

// =============================================================================
// Signing
// =============================================================================

/// Build and sign a client assertion for `identity` issued at `now`.
///
/// # Errors
///
/// Returns `PdndError::Config` if no key material is configured, the key file
/// does not exist or cannot be read, or the key is not a valid RSA private key.
#[instrument(skip_all, fields(kid = %identity.kid(), environment = %environment))]
pub fn build_assertion(
    identity: &ClientIdentity,
    environment: Environment,
    now: DateTime<Utc>,
) -> Result<SignedAssertion> {
    let key = load_signing_key(identity)?;
    let claims = AssertionClaims::new(identity, environment, now)?;

    let token = encode(&assertion_header(identity.kid()), &claims, &key)
        .map_err(|e| PdndError::Config(format!("Invalid private key: {e}")))?;

    debug!(
        target: "pdnd.assertion",
        jti = %claims.jti,
        iat = claims.iat,
        exp = claims.exp,
        "Client assertion signed"
    );
    trace!(target: "pdnd.assertion", assertion = %token, "Client assertion value");

    Ok(SignedAssertion {
        token: SecretString::from(token),
        claims,
    })
}

/// JOSE header for a client assertion signed with key `kid`.
#[must_use]
pub fn assertion_header(kid: &str) -> Header {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some("JWT".to_string());
    header.kid = Some(kid.to_string());
    header
}

/// Resolve and parse the RSA private key of `identity`.
///
/// The inline key takes precedence over the key file.
///
/// # Errors
///
/// Returns `PdndError::Config` if no key is configured, the file is missing or
/// unreadable, or the PEM does not hold an RSA private key.
pub fn load_signing_key(identity: &ClientIdentity) -> Result<EncodingKey> {
    let pem = match identity.key_source()? {
        KeySource::Inline(pem) => {
            debug!(target: "pdnd.assertion", "Private key supplied inline");
            pem.clone()
        }
        KeySource::File(path) => {
            let contents = std::fs::read_to_string(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PdndError::Config(format!("Private key file not found: {}", path.display()))
                } else {
                    PdndError::Config(format!(
                        "Failed to read private key file {}: {e}",
                        path.display()
                    ))
                }
            })?;
            debug!(
                target: "pdnd.assertion",
                path = %path.display(),
                "Private key read from file"
            );
            SecretString::from(contents)
        }
    };

    EncodingKey::from_rsa_pem(pem.expose_secret().as_bytes())
        .map_err(|e| PdndError::Config(format!("Invalid private key: {e}")))
}

/// Generate a fresh `jti`: 16 bytes from the system CSPRNG, hex encoded.
fn generate_jti() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; JTI_BYTES];
    rng.fill(&mut bytes)
        .map_err(|_| PdndError::Config("Failed to generate assertion ID".to_string()))?;
    Ok(hex::encode(bytes))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pdnd_test_utils::{
        jwt_claims, jwt_header, write_test_key_file, AssertionAssertions,
        MALFORMED_RSA_PRIVATE_KEY, OTHER_RSA_PUBLIC_KEY, TEST_RSA_PRIVATE_KEY,
        TEST_RSA_PUBLIC_KEY,
    };

    fn identity() -> ClientIdentity {
        ClientIdentity::new("https://example.com", "my-client-id", "abc123", "xyz456")
            .with_private_key(SecretString::from(TEST_RSA_PRIVATE_KEY))
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_assertion_structure() {
        let assertion = build_assertion(&identity(), Environment::Production, fixed_now()).unwrap();
        let token = assertion.token().expose_secret();

        token
            .assert_valid_rs256_jwt()
            .assert_kid("abc123")
            .assert_claim("iss", "https://example.com")
            .assert_claim("sub", "my-client-id")
            .assert_claim("aud", "auth.interop.pagopa.it/client-assertion")
            .assert_claim("purposeId", "xyz456")
            .assert_lifetime(ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_header_has_exactly_alg_typ_kid() {
        let assertion = build_assertion(&identity(), Environment::Production, fixed_now()).unwrap();
        let header = jwt_header(assertion.token().expose_secret());

        let mut keys: Vec<_> = header.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["alg", "kid", "typ"]);
    }

    #[test]
    fn test_claims_use_given_time() {
        let now = fixed_now();
        let assertion = build_assertion(&identity(), Environment::Staging, now).unwrap();
        let claims = jwt_claims(assertion.token().expose_secret());

        assert_eq!(claims["iat"].as_i64().unwrap(), now.timestamp());
        assert_eq!(claims["exp"].as_i64().unwrap(), now.timestamp() + 300);
        assert_eq!(claims["aud"], "auth.uat.interop.pagopa.it/client-assertion");
        assert_eq!(assertion.claims().iat, now.timestamp());
    }

    #[test]
    fn test_claims_have_exactly_expected_fields() {
        let assertion = build_assertion(&identity(), Environment::Production, fixed_now()).unwrap();
        let claims = jwt_claims(assertion.token().expose_secret());

        let mut keys: Vec<_> = claims.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["aud", "exp", "iat", "iss", "jti", "purposeId", "sub"]
        );
    }

    #[test]
    fn test_jti_is_32_hex_chars() {
        let assertion = build_assertion(&identity(), Environment::Production, fixed_now()).unwrap();
        let jti = &assertion.claims().jti;

        assert_eq!(jti.len(), 32);
        assert!(jti.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_jti_differs_between_assertions_at_same_instant() {
        let now = fixed_now();
        let first = build_assertion(&identity(), Environment::Production, now).unwrap();
        let second = build_assertion(&identity(), Environment::Production, now).unwrap();

        assert_ne!(first.claims().jti, second.claims().jti);
        assert_ne!(
            first.token().expose_secret(),
            second.token().expose_secret()
        );
    }

    #[test]
    fn test_signature_verifies_with_public_key() {
        let assertion = build_assertion(&identity(), Environment::Production, Utc::now()).unwrap();

        assertion.token().expose_secret().assert_verifies_with(
            TEST_RSA_PUBLIC_KEY,
            Environment::Production.audience(),
        );
    }

    #[test]
    fn test_signature_rejected_by_other_key() {
        let assertion = build_assertion(&identity(), Environment::Production, Utc::now()).unwrap();

        let key = jsonwebtoken::DecodingKey::from_rsa_pem(OTHER_RSA_PUBLIC_KEY.as_bytes()).unwrap();
        let mut validation = jsonwebtoken::Validation::new(Algorithm::RS256);
        validation.set_audience(&[Environment::Production.audience()]);

        let result = jsonwebtoken::decode::<AssertionClaims>(
            assertion.token().expose_secret(),
            &key,
            &validation,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_key_loaded_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_test_key_file(dir.path());
        let identity = ClientIdentity::new("iss", "cid", "kid-file", "pid")
            .with_private_key_path(key_path);

        let assertion = build_assertion(&identity, Environment::Production, fixed_now()).unwrap();
        assertion.token().expose_secret().assert_kid("kid-file");
    }

    #[test]
    fn test_missing_key_material() {
        let identity = ClientIdentity::new("iss", "cid", "kid", "pid");
        let err = build_assertion(&identity, Environment::Production, fixed_now()).unwrap_err();

        assert!(matches!(err, PdndError::Config(ref m) if m.contains("No private key")));
    }

    #[test]
    fn test_missing_key_file() {
        let identity = ClientIdentity::new("iss", "cid", "kid", "pid")
            .with_private_key_path("/nonexistent/pdnd/private_key.pem");
        let err = build_assertion(&identity, Environment::Production, fixed_now()).unwrap_err();

        assert!(matches!(err, PdndError::Config(ref m) if m.contains("not found")));
    }

    #[test]
    fn test_invalid_key_rejected() {
        for pem in ["not a pem at all", MALFORMED_RSA_PRIVATE_KEY] {
            let identity = ClientIdentity::new("iss", "cid", "kid", "pid")
                .with_private_key(SecretString::from(pem));
            let err = build_assertion(&identity, Environment::Production, fixed_now()).unwrap_err();

            assert!(
                matches!(err, PdndError::Config(ref m) if m.contains("Invalid private key")),
                "unexpected error for {pem:?}: {err:?}"
            );
        }
    }

    #[test]
    fn test_signed_assertion_debug_redacts_token() {
        let assertion = build_assertion(&identity(), Environment::Production, fixed_now()).unwrap();
        let debug_str = format!("{assertion:?}");

        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains(assertion.token().expose_secret()));
        assert!(debug_str.contains(&assertion.claims().jti));
    }
}
