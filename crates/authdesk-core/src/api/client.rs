//! API client for the AuthBackend.
//!
//! The backend exposes a single endpoint, `POST /auth/google`, which takes
//! the Google ID token and answers with the application's own token pair.

use std::time::Duration;

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::TokenPair;
use crate::config::Config;

use super::ApiError;

/// Path of the credential exchange endpoint
const EXCHANGE_PATH: &str = "/auth/google";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeRequest<'a> {
    id_token: &'a str,
}

/// Success payload. Fields are optional so that a missing token is reported
/// as an invalid response instead of a generic parse error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Client for the AuthBackend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(
            config.backend_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Underlying HTTP client, for sharing its connection pool
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn exchange_url(&self) -> String {
        format!("{}{}", self.base_url, EXCHANGE_PATH)
    }

    /// Exchange a Google ID token for the backend's token pair.
    ///
    /// Sent once, never retried.
    pub async fn exchange_credential(&self, id_token: &str) -> Result<TokenPair, ApiError> {
        let url = self.exchange_url();
        debug!(url = %url, "Exchanging Google credential");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&ExchangeRequest { id_token })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = %status, "Credential exchange rejected");
            return Err(ApiError::from_status(status, &body));
        }

        Self::parse_token_pair(&body)
    }

    fn parse_token_pair(body: &str) -> Result<TokenPair, ApiError> {
        let parsed: ExchangeResponse = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("malformed token response: {}", e)))?;

        let access_token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("response has no accessToken".to_string()))?;
        let refresh_token = parsed
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::InvalidResponse("response has no refreshToken".to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoginError;
    use reqwest::StatusCode;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> AuthClient {
        AuthClient::new(server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_exchange_url_trims_trailing_slash() {
        let client = AuthClient::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.exchange_url(), "http://localhost:8080/auth/google");
    }

    #[test]
    fn test_parse_token_pair_ignores_extra_fields() {
        let pair = AuthClient::parse_token_pair(
            r#"{"accessToken":"a","refreshToken":"r","user":{"email":"x@example.com"}}"#,
        )
        .unwrap();
        assert_eq!(pair, TokenPair::new("a", "r"));
    }

    #[test]
    fn test_parse_token_pair_rejects_malformed() {
        for body in [
            "",
            "<html>oops</html>",
            r#"{"accessToken":"a"}"#,
            r#"{"accessToken":"","refreshToken":"r"}"#,
            r#"{"accessToken":42,"refreshToken":"r"}"#,
        ] {
            let err = AuthClient::parse_token_pair(body).unwrap_err();
            assert!(matches!(err, ApiError::InvalidResponse(_)), "body {body:?}");
        }
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .and(header_matcher("content-type", "application/json"))
            .and(body_json(json!({"idToken": "google-credential"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "abc123xyz0",
                "refreshToken": "def456uvw0"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pair = client_for(&server)
            .exchange_credential("google-credential")
            .await
            .unwrap();
        assert_eq!(pair, TokenPair::new("abc123xyz0", "def456uvw0"));
    }

    #[tokio::test]
    async fn test_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "invalid token"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).exchange_credential("bad").await.unwrap_err();
        match err {
            ApiError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "invalid token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exchange_unreachable_is_transport_error() {
        // Bind and drop a listener to get a port nothing listens on
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = AuthClient::new(format!("http://127.0.0.1:{}", port), Duration::from_secs(2))
            .unwrap();

        let err = client.exchange_credential("cred").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_exchange_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/google"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"accessToken": "a", "refreshToken": "r"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = AuthClient::new(server.uri(), Duration::from_millis(200)).unwrap();
        let err = client.exchange_credential("cred").await.unwrap_err();
        assert!(err.is_transport());
        assert!(matches!(LoginError::from(err), LoginError::TransportFailure(_)));
    }
}
