//! OAuth 2.0 Device Authorization Grant against Google.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Scopes needed for Google to include an ID token in the token response
const SCOPES: &str = "openid email profile";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Interval used when the device-code response does not specify one
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Added to the polling interval whenever Google answers `slow_down`
const SLOW_DOWN_INCREMENT_SECS: u64 = 5;

#[derive(Error, Debug)]
pub enum DeviceFlowError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authorization was denied")]
    AccessDenied,

    #[error("Device code expired, please try again")]
    Expired,

    #[error("{error}: {description}")]
    Provider { error: String, description: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// What the user needs to complete sign-in on another device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAuthorization {
    pub verification_url: String,
    pub user_code: String,
    pub device_code: String,
    pub expires_in: Duration,
    pub interval: Duration,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    // Google says `verification_url`, RFC 8628 says `verification_uri`
    #[serde(alias = "verification_uri")]
    verification_url: String,
    expires_in: u64,
    interval: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Outcome of a single poll of the token endpoint
#[derive(Debug)]
enum PollStatus {
    Complete(String),
    Pending,
    SlowDown,
}

/// Google device authorization flow.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct DeviceFlow {
    client: Client,
    client_id: String,
    client_secret: Option<String>,
    device_code_url: String,
    token_url: String,
    slow_down_step: Duration,
}

impl DeviceFlow {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            device_code_url: config.device_code_url.clone(),
            token_url: config.token_url.clone(),
            slow_down_step: Duration::from_secs(SLOW_DOWN_INCREMENT_SECS),
        }
    }

    /// Request a device code and the verification URL to show the user.
    pub async fn start(&self) -> Result<DeviceAuthorization, DeviceFlowError> {
        let response = self
            .client
            .post(&self.device_code_url)
            .form(&[("client_id", self.client_id.as_str()), ("scope", SCOPES)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Self::provider_error(&body));
        }

        let parsed: DeviceCodeResponse = serde_json::from_str(&body)
            .map_err(|e| DeviceFlowError::InvalidResponse(e.to_string()))?;

        info!(url = %parsed.verification_url, "Device authorization started");

        Ok(DeviceAuthorization {
            verification_url: parsed.verification_url,
            user_code: parsed.user_code,
            device_code: parsed.device_code,
            expires_in: Duration::from_secs(parsed.expires_in),
            interval: Duration::from_secs(parsed.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS)),
        })
    }

    /// Poll the token endpoint until the user completes authorization.
    ///
    /// Returns the Google ID token.
    pub async fn poll(&self, authorization: &DeviceAuthorization) -> Result<String, DeviceFlowError> {
        let expires_at = Instant::now() + authorization.expires_in;
        let mut interval = authorization.interval;

        loop {
            if Instant::now() >= expires_at {
                return Err(DeviceFlowError::Expired);
            }

            match self.poll_once(&authorization.device_code).await? {
                PollStatus::Complete(id_token) => {
                    info!("Device authorization complete");
                    return Ok(id_token);
                }
                PollStatus::Pending => {
                    debug!("Authorization pending");
                }
                PollStatus::SlowDown => {
                    interval = self.slowed(interval);
                    warn!(interval_secs = interval.as_secs(), "Asked to slow down polling");
                }
            }

            sleep(interval).await;
        }
    }

    fn slowed(&self, interval: Duration) -> Duration {
        interval + self.slow_down_step
    }

    async fn poll_once(&self, device_code: &str) -> Result<PollStatus, DeviceFlowError> {
        let mut form = vec![
            ("client_id", self.client_id.as_str()),
            ("device_code", device_code),
            ("grant_type", DEVICE_CODE_GRANT),
        ];
        if let Some(ref secret) = self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let parsed: TokenResponse = serde_json::from_str(&body)
                .map_err(|e| DeviceFlowError::InvalidResponse(e.to_string()))?;
            return parsed
                .id_token
                .filter(|t| !t.is_empty())
                .map(PollStatus::Complete)
                .ok_or_else(|| {
                    DeviceFlowError::InvalidResponse("token response has no id_token".to_string())
                });
        }

        match serde_json::from_str::<OAuthErrorResponse>(&body) {
            Ok(err) if err.error == "authorization_pending" => Ok(PollStatus::Pending),
            Ok(err) if err.error == "slow_down" => Ok(PollStatus::SlowDown),
            _ => Err(Self::provider_error(&body)),
        }
    }

    fn provider_error(body: &str) -> DeviceFlowError {
        match serde_json::from_str::<OAuthErrorResponse>(body) {
            Ok(err) => match err.error.as_str() {
                "access_denied" => DeviceFlowError::AccessDenied,
                "expired_token" => DeviceFlowError::Expired,
                _ => DeviceFlowError::Provider {
                    description: err.error_description.unwrap_or_default(),
                    error: err.error,
                },
            },
            Err(_) => DeviceFlowError::InvalidResponse(body.chars().take(200).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn flow_for(server: &MockServer) -> DeviceFlow {
        let config = Config {
            google_client_id: "client-123".to_string(),
            google_client_secret: Some("secret-456".to_string()),
            device_code_url: format!("{}/device/code", server.uri()),
            token_url: format!("{}/token", server.uri()),
            ..Config::default()
        };
        DeviceFlow::new(Client::new(), &config)
    }

    fn authorization() -> DeviceAuthorization {
        DeviceAuthorization {
            verification_url: "https://www.google.com/device".to_string(),
            user_code: "ABCD-EFGH".to_string(),
            device_code: "dev-code".to_string(),
            expires_in: Duration::from_secs(60),
            interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_start_parses_google_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/device/code"))
            .and(body_string_contains("client_id=client-123"))
            .and(body_string_contains("scope=openid"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "device_code": "dev-code",
                "user_code": "ABCD-EFGH",
                "verification_url": "https://www.google.com/device",
                "expires_in": 1800,
                "interval": 5
            })))
            .mount(&server)
            .await;

        let auth = flow_for(&server).start().await.unwrap();
        assert_eq!(auth.user_code, "ABCD-EFGH");
        assert_eq!(auth.verification_url, "https://www.google.com/device");
        assert_eq!(auth.expires_in, Duration::from_secs(1800));
        assert_eq!(auth.interval, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_start_rejected_client() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/device/code"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": "invalid_client",
                "error_description": "The OAuth client was not found."
            })))
            .mount(&server)
            .await;

        let err = flow_for(&server).start().await.unwrap_err();
        assert!(err.to_string().contains("invalid_client"));
    }

    #[tokio::test]
    async fn test_poll_waits_while_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(428).set_body_json(json!({"error": "authorization_pending"})),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("client_secret=secret-456"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.x",
                "id_token": "google-id-token"
            })))
            .mount(&server)
            .await;

        let id_token = flow_for(&server).poll(&authorization()).await.unwrap();
        assert_eq!(id_token, "google-id-token");
    }

    #[tokio::test]
    async fn test_poll_access_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "access_denied"})))
            .mount(&server)
            .await;

        let err = flow_for(&server).poll(&authorization()).await.unwrap_err();
        assert!(matches!(err, DeviceFlowError::AccessDenied));
    }

    #[tokio::test]
    async fn test_poll_expired_device_code() {
        let server = MockServer::start().await;
        let mut auth = authorization();
        auth.expires_in = Duration::ZERO;

        let err = flow_for(&server).poll(&auth).await.unwrap_err();
        assert!(matches!(err, DeviceFlowError::Expired));
    }

    #[tokio::test]
    async fn test_poll_success_without_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "ya29.x"})))
            .mount(&server)
            .await;

        let err = flow_for(&server).poll(&authorization()).await.unwrap_err();
        assert!(matches!(err, DeviceFlowError::InvalidResponse(_)));
    }

    #[test]
    fn test_slow_down_adds_five_seconds() {
        let flow = DeviceFlow::new(Client::new(), &Config::default());
        assert_eq!(flow.slowed(Duration::from_secs(5)), Duration::from_secs(10));
        assert_eq!(flow.slowed(Duration::from_secs(10)), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_poll_backs_off_on_slow_down() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(428).set_body_json(json!({"error": "slow_down"})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": "google-id-token"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut flow = flow_for(&server);
        flow.slow_down_step = Duration::from_millis(200);

        let started = Instant::now();
        let id_token = flow.poll(&authorization()).await.unwrap();
        assert_eq!(id_token, "google-id-token");
        // Second poll waits the original interval plus the slow-down step
        assert!(started.elapsed() >= Duration::from_millis(210));
    }
}
