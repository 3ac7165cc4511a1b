//! Bearer-authenticated GET requests to downstream e-service APIs.
//!
//! Two operations share one request path: [`ApiClient::check_status`] probes a
//! status URL, [`ApiClient::request_api`] calls an API URL with filters. Both
//! send `Authorization: Bearer <token>`, reject non-success statuses with
//! `PdndError::Api`, and parse the success body as JSON.

use crate::config::{HttpSettings, RequestOptions};
use crate::error::{PdndError, Result};
use crate::filters::FilterSpec;
use crate::secret::{ExposeSecret, SecretString};
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument, trace, warn};

/// Status code and parsed JSON body of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Client for downstream APIs.
///
/// Token and URL are per call. TLS verification is chosen per call between
/// two pooled clients built up front.
#[derive(Clone)]
pub struct ApiClient {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `PdndError::Config` if an HTTP client cannot be built.
    pub fn new(settings: HttpSettings) -> Result<Self> {
        Ok(Self {
            verifying: settings.build_client(true)?,
            insecure: settings.build_client(false)?,
        })
    }

    fn http_client(&self, options: RequestOptions) -> &reqwest::Client {
        if options.verify_tls {
            &self.verifying
        } else {
            &self.insecure
        }
    }

    /// GET `status_url` with the bearer token.
    ///
    /// # Errors
    ///
    /// Returns `PdndError::Api` with status 0 if `status_url` or `token` is
    /// empty (no request is sent), or if the request fails in transit; with
    /// the response status if it is not a success or the body is not JSON.
    #[instrument(skip_all)]
    pub async fn check_status(
        &self,
        status_url: &str,
        token: &SecretString,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        require(status_url, "Status URL missing")?;
        require(token.expose_secret(), "Token missing")?;

        let response = self.get(status_url, token, options).await?;
        debug!(
            target: "pdnd.api",
            status = response.status,
            "Status check completed"
        );
        Ok(response)
    }

    /// GET `api_url` with `filters` appended as the query string.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::check_status`], for `api_url`.
    #[instrument(skip_all)]
    pub async fn request_api(
        &self,
        api_url: &str,
        filters: &FilterSpec,
        token: &SecretString,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        require(api_url, "API URL missing")?;
        require(token.expose_secret(), "Token missing")?;

        let url = filters.apply_to(api_url);
        debug!(target: "pdnd.api", url = %url, "Calling API");

        let response = self.get(&url, token, options).await?;
        debug!(
            target: "pdnd.api",
            status = response.status,
            "API call completed"
        );
        Ok(response)
    }

    async fn get(
        &self,
        url: &str,
        token: &SecretString,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        if !options.verify_tls {
            warn!(
                target: "pdnd.api",
                url = %url,
                "TLS certificate verification disabled"
            );
        }
        let response = self
            .http_client(options)
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                debug!(target: "pdnd.api", error = %e, "HTTP request failed");
                PdndError::local(format!("Request to {url} failed: {e}"))
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            PdndError::api(status.as_u16(), format!("Failed to read response body: {e}"))
        })?;
        let text = String::from_utf8_lossy(&bytes);
        trace!(target: "pdnd.api", status = %status, body = %text, "Response body");

        if !status.is_success() {
            warn!(target: "pdnd.api", status = %status, url = %url, "API call failed");
            return Err(PdndError::from_provider_response(status.as_u16(), &text));
        }

        let body = serde_json::from_slice(&bytes).map_err(|e| {
            PdndError::api(status.as_u16(), format!("Invalid JSON response: {e}"))
        })?;

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

fn require(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(PdndError::local(message))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ApiClient {
        ApiClient::new(HttpSettings::default()).unwrap()
    }

    fn token() -> SecretString {
        SecretString::from("access-token")
    }

    async fn unreachable_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_request_api_requires_url() {
        let err = client()
            .request_api("", &FilterSpec::default(), &token(), RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, PdndError::local("API URL missing"));
    }

    #[tokio::test]
    async fn test_missing_token_sends_nothing() {
        let server = unreachable_server().await;
        let client = client();
        let empty = SecretString::from("  ");

        let err = client
            .request_api(
                &server.uri(),
                &FilterSpec::default(),
                &empty,
                RequestOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, PdndError::local("Token missing"));

        let err = client
            .check_status(&server.uri(), &empty, RequestOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, PdndError::local("Token missing"));
    }

    #[tokio::test]
    async fn test_check_status_requires_url() {
        let err = client()
            .check_status(" ", &token(), RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, PdndError::local("Status URL missing"));
    }

    #[tokio::test]
    async fn test_check_status_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .and(header("authorization", "Bearer access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "OK"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .check_status(
                &format!("{}/status", server.uri()),
                &token(),
                RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"status": "OK"}));
    }

    #[tokio::test]
    async fn test_request_api_appends_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/items"))
            .and(query_param("category[]", "books"))
            .and(header("authorization", "Bearer access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
            .expect(1)
            .mount(&server)
            .await;

        let filters = FilterSpec::try_from(json!({"category": ["books", "music"]})).unwrap();
        let response = client()
            .request_api(
                &format!("{}/v1/items", server.uri()),
                &filters,
                &token(),
                RequestOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(response.body, json!([{"id": 1}]));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests.first().unwrap().url.query(),
            Some("category%5B%5D=books&category%5B%5D=music")
        );
    }

    #[tokio::test]
    async fn test_request_api_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_token"})),
            )
            .mount(&server)
            .await;

        let err = client()
            .request_api(
                &server.uri(),
                &FilterSpec::default(),
                &token(),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, PdndError::api(401, "invalid_token"));
    }

    #[tokio::test]
    async fn test_error_status_with_plain_body_keeps_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Servizio non disponibile"))
            .mount(&server)
            .await;

        let err = client()
            .check_status(&server.uri(), &token(), RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err, PdndError::api(503, "Servizio non disponibile"));
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let err = client()
            .request_api(
                &server.uri(),
                &FilterSpec::default(),
                &token(),
                RequestOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, PdndError::Api { status: 200, ref message } if message.contains("Invalid JSON")));
    }

    #[tokio::test]
    async fn test_insecure_mode_still_sends_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client()
            .check_status(&server.uri(), &token(), RequestOptions::insecure())
            .await
            .unwrap();

        assert_eq!(response.body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_one_client_serves_both_tls_modes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer access-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(3)
            .mount(&server)
            .await;

        let client = client();
        for options in [
            RequestOptions::default(),
            RequestOptions::insecure(),
            RequestOptions::default(),
        ] {
            let response = client
                .check_status(&server.uri(), &token(), options)
                .await
                .unwrap();
            assert_eq!(response.status, 200);
        }
    }

    #[tokio::test]
    async fn test_transport_failure_has_zero_status() {
        let err = client()
            .check_status("http://127.0.0.1:1/status", &token(), RequestOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(0));
    }
}
