//! Shared test helpers for Yoto API integration tests
//!
//! Provides wiremock-based mock setup for the authorization server and
//! the API, plus a recording progress sink for upload pipelines.

use tokio::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardpress_core::ports::card_platform::IProgressSink;
use cardpress_yoto::auth::{DeviceAuthConfig, YotoDeviceAuth};
use cardpress_yoto::client::YotoClient;

/// Returns a device-auth adapter pointing at the mock authorization server
pub fn device_auth_against(server: &MockServer) -> YotoDeviceAuth {
    YotoDeviceAuth::new(
        DeviceAuthConfig::new("test-client")
            .with_auth_base_url(server.uri())
            .with_audience("https://api.example.test"),
    )
}

/// Returns an API client pointing at the mock API server
pub fn api_client(server: &MockServer) -> YotoClient {
    YotoClient::with_base_url("test-access-token", server.uri())
}

/// Mounts the device-code endpoint with a standard five-minute code
pub async fn mount_device_code(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "device_code": "dev-code-001",
            "user_code": "WDXB-QWWK",
            "verification_uri": "https://login.example/activate",
            "verification_uri_complete": "https://login.example/activate?user_code=WDXB-QWWK",
            "expires_in": 300,
            "interval": 5
        })))
        .mount(server)
        .await;
}

/// Mounts a token-endpoint error response
pub async fn mount_token_error(server: &MockServer, status: u16, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Builds a JWT-shaped access token whose payload segment is the given JSON
pub fn fake_jwt(payload_json: &str) -> String {
    use base64::Engine as _;
    let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(payload_json);
    format!("hdr.{payload}.sig")
}

/// Progress sink that records every line it receives
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lines(&self) -> Vec<String> {
        self.lines.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl IProgressSink for RecordingSink {
    async fn log(&self, message: &str) {
        self.lines.lock().await.push(message.to_string());
    }
}
