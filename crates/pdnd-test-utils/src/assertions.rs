//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions over compact client assertions.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

/// Decode one base64url segment of a compact JWT into JSON.
///
/// # Panics
///
/// Panics if the segment is missing or is not base64url-encoded JSON.
pub fn decode_segment(token: &str, index: usize) -> Value {
    let segment = token
        .split('.')
        .nth(index)
        .unwrap_or_else(|| panic!("JWT has no segment {index}"));
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .unwrap_or_else(|e| panic!("Failed to base64 decode JWT segment {index}: {e}"));
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("Failed to parse JWT segment {index} JSON: {e}"))
}

/// Decoded JWT header.
pub fn jwt_header(token: &str) -> Value {
    decode_segment(token, 0)
}

/// Decoded JWT claims.
pub fn jwt_claims(token: &str) -> Value {
    decode_segment(token, 1)
}

/// Custom assertions for signed client assertions
///
/// # Example
/// ```rust,ignore
/// assertion
///     .assert_valid_rs256_jwt()
///     .assert_kid("kid-2025-01")
///     .assert_lifetime(300);
/// ```
pub trait AssertionAssertions {
    /// Assert three base64url segments with an `RS256`/`JWT` header
    fn assert_valid_rs256_jwt(&self) -> &Self;

    /// Assert the header carries the given key ID
    fn assert_kid(&self, kid: &str) -> &Self;

    /// Assert a string claim has the given value
    fn assert_claim(&self, name: &str, expected: &str) -> &Self;

    /// Assert `exp - iat` equals `seconds`
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    /// Assert the signature verifies with `public_pem` for `audience`
    fn assert_verifies_with(&self, public_pem: &str, audience: &str) -> &Self;
}

impl AssertionAssertions for str {
    fn assert_valid_rs256_jwt(&self) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );
        assert!(
            parts.iter().all(|p| !p.is_empty()),
            "JWT segments must be non-empty"
        );

        let header = jwt_header(self);
        assert_eq!(header["alg"], "RS256", "Expected RS256 algorithm");
        assert_eq!(header["typ"], "JWT", "Expected JWT type");

        let claims = jwt_claims(self);
        assert!(claims.is_object(), "JWT claims must be a JSON object");

        self
    }

    fn assert_kid(&self, kid: &str) -> &Self {
        let header = jwt_header(self);
        assert_eq!(
            header["kid"], kid,
            "Token was signed with kid {}, expected {kid}",
            header["kid"]
        );
        self
    }

    fn assert_claim(&self, name: &str, expected: &str) -> &Self {
        let claims = jwt_claims(self);
        assert_eq!(
            claims[name], expected,
            "Claim '{name}' is {}, expected {expected}",
            claims[name]
        );
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = jwt_claims(self);
        let iat = claims["iat"].as_i64().expect("iat must be an integer");
        let exp = claims["exp"].as_i64().expect("exp must be an integer");
        assert_eq!(
            exp - iat,
            seconds,
            "Token lifetime is {}s, expected {seconds}s",
            exp - iat
        );
        self
    }

    fn assert_verifies_with(&self, public_pem: &str, audience: &str) -> &Self {
        let key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .expect("Failed to parse public key PEM");
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);

        let result = decode::<Value>(self, &key, &validation);
        assert!(
            result.is_ok(),
            "Signature verification failed: {:?}",
            result.err()
        );
        self
    }
}

impl AssertionAssertions for String {
    fn assert_valid_rs256_jwt(&self) -> &Self {
        self.as_str().assert_valid_rs256_jwt();
        self
    }

    fn assert_kid(&self, kid: &str) -> &Self {
        self.as_str().assert_kid(kid);
        self
    }

    fn assert_claim(&self, name: &str, expected: &str) -> &Self {
        self.as_str().assert_claim(name, expected);
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        self.as_str().assert_lifetime(seconds);
        self
    }

    fn assert_verifies_with(&self, public_pem: &str, audience: &str) -> &Self {
        self.as_str().assert_verifies_with(public_pem, audience);
        self
    }
}
