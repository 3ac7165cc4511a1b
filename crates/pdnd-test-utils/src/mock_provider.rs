//! Wiremock stand-ins for the PDND authorization server.
//!
//! The real token endpoint lives at `/token.oauth2`; the mocks mount on the
//! same path so tests can point the exchange client at `token_endpoint(&server)`.

use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the token endpoint on the mock server.
pub const TOKEN_PATH: &str = "/token.oauth2";

/// Form-encoded `client_assertion_type` as it appears in the request body.
pub const ENCODED_ASSERTION_TYPE: &str =
    "client_assertion_type=urn%3Aietf%3Aparams%3Aoauth%3Aclient-assertion-type%3Ajwt-bearer";

/// Full token endpoint URL of `server`.
pub fn token_endpoint(server: &MockServer) -> String {
    format!("{}{TOKEN_PATH}", server.uri())
}

/// Mount a token endpoint that issues `access_token` to a well-formed request
/// from `client_id`.
///
/// Requests missing any of the four form fields fall through to wiremock's
/// default 404.
pub async fn mount_token_endpoint(
    server: &MockServer,
    client_id: &str,
    access_token: &str,
    expires_in: u64,
) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains(format!("client_id={client_id}")))
        .and(body_string_contains("client_assertion=ey"))
        .and(body_string_contains(ENCODED_ASSERTION_TYPE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in
        })))
        .mount(server)
        .await;
}

/// Mount a token endpoint that rejects every request with `status` and a JSON body.
pub async fn mount_token_error(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount a token endpoint that rejects every request with `status` and a raw body.
pub async fn mount_token_error_raw(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}
