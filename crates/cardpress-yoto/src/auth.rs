//! Device-code authentication flow for the Yoto platform
//!
//! Implements the OAuth2 device authorization grant (RFC 8628): the app
//! requests a short user code, the user approves it in a browser on any
//! device, and the app polls the token endpoint until the grant lands.
//!
//! ## Components
//!
//! - [`DeviceAuthConfig`] - Client id and endpoint configuration
//! - [`YotoDeviceAuth`] - Code issuance, token polling, token refresh

use anyhow::Result;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use cardpress_core::ports::device_auth::{
    DeviceAuthorization, IDeviceAuth, PollOutcome, TokenGrant,
};

use crate::client::API_BASE_URL;
use crate::YotoError;

/// Base URL of the Yoto authorization server
const AUTH_BASE_URL: &str = "https://login.yotoplay.com";

/// Scopes requested for the device grant
const DEVICE_SCOPE: &str = "profile offline_access";

/// Device grant type identifier (RFC 8628 §3.4)
const GRANT_TYPE_DEVICE_CODE: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Poll interval to assume when the server omits one (RFC 8628 §3.2)
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// ============================================================================
// DeviceAuthConfig
// ============================================================================

/// Configuration for the device-code flow
#[derive(Debug, Clone)]
pub struct DeviceAuthConfig {
    /// OAuth2 client identifier issued for this application
    pub client_id: String,
    /// Authorization server base URL
    pub auth_base_url: String,
    /// API audience the issued tokens are scoped to
    pub audience: String,
}

impl DeviceAuthConfig {
    /// Creates a config with the production endpoints
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            auth_base_url: AUTH_BASE_URL.to_string(),
            audience: API_BASE_URL.to_string(),
        }
    }

    /// Overrides the authorization server base URL (useful for testing)
    pub fn with_auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.auth_base_url = url.into();
        self
    }

    /// Overrides the token audience
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }
}

// ============================================================================
// Authorization server response types
// ============================================================================

/// Response from `POST /oauth/device/code`
#[derive(Debug, Deserialize)]
pub struct DeviceCodeResponse {
    /// Opaque code the app presents on every token poll
    pub device_code: String,
    /// Short code the user types at the verification page
    pub user_code: String,
    /// Verification page URL
    pub verification_uri: String,
    /// Verification URL with the user code pre-filled, when advertised
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    /// Lifetime of the code pair in seconds
    pub expires_in: u64,
    /// Minimum seconds between token polls, when advertised
    #[serde(default)]
    pub interval: Option<u64>,
}

/// Success body from `POST /oauth/token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Access token lifetime in seconds; fallback when the token
    /// payload carries no readable `exp` claim
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Error body from `POST /oauth/token` while the grant is undecided or rejected
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
    /// Replacement poll interval advertised alongside `slow_down`
    #[serde(default)]
    interval: Option<u64>,
}

/// Claims read from the access token payload (best effort)
#[derive(Debug, Default, Deserialize)]
struct AccessClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

// ============================================================================
// YotoDeviceAuth
// ============================================================================

/// Device-code authentication adapter for the Yoto authorization server
///
/// Issues user codes, polls the token endpoint and refreshes expired
/// access tokens. Through [`IDeviceAuth`], the flow-control responses of
/// the token endpoint (`authorization_pending`, `slow_down`) surface as
/// typed [`PollOutcome`] values; only transport and protocol failures
/// are errors.
pub struct YotoDeviceAuth {
    http: Client,
    config: DeviceAuthConfig,
}

impl YotoDeviceAuth {
    /// Creates an adapter with the given configuration
    pub fn new(config: DeviceAuthConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Creates an adapter with just a client id and production endpoints
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self::new(DeviceAuthConfig::new(client_id))
    }

    /// Returns a reference to the current configuration
    pub fn config(&self) -> &DeviceAuthConfig {
        &self.config
    }

    /// Requests a new device/user code pair
    ///
    /// # Errors
    /// Any transport error or non-2xx status becomes
    /// [`YotoError::AuthRequestFailed`] carrying the server body verbatim.
    pub async fn request_device_code(&self) -> Result<DeviceCodeResponse, YotoError> {
        let url = format!("{}/oauth/device/code", self.config.auth_base_url);
        debug!("Requesting device code for client {}", self.config.client_id);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", DEVICE_SCOPE),
                ("audience", self.config.audience.as_str()),
            ])
            .send()
            .await
            .map_err(|e| YotoError::AuthRequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            return Err(YotoError::AuthRequestFailed {
                message: format!("status {status}: {body}"),
            });
        }

        let code: DeviceCodeResponse = response
            .json()
            .await
            .map_err(|e| YotoError::InvalidResponse(e.to_string()))?;

        debug!("Device code issued, expires in {}s", code.expires_in);
        Ok(code)
    }

    /// Polls the token endpoint once for the given device code
    ///
    /// # Errors
    /// [`YotoError::AuthPending`] and [`YotoError::SlowDown`] report an
    /// undecided grant; [`YotoError::CodeExpired`] and
    /// [`YotoError::AuthDenied`] are terminal outcomes; the remaining
    /// variants are transport or protocol failures.
    pub async fn poll_device_token(&self, device_code: &str) -> Result<TokenGrant, YotoError> {
        let url = format!("{}/oauth/token", self.config.auth_base_url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", GRANT_TYPE_DEVICE_CODE),
                ("device_code", device_code),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| YotoError::InvalidResponse(e.to_string()))?;
            info!("Device grant approved");
            return grant_from_token(token, None);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());
        let error: TokenErrorResponse =
            serde_json::from_str(&body).map_err(|_| YotoError::Api {
                status: status.as_u16(),
                message: body.clone(),
            })?;

        Err(poll_error(status.as_u16(), &error))
    }

    /// Exchanges a refresh token for a fresh token pair
    ///
    /// The previous refresh token is kept when the server does not
    /// rotate it.
    ///
    /// # Errors
    /// A rejected grant becomes [`YotoError::Unauthorized`]; the stored
    /// credentials are no longer usable and the user must log in again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, YotoError> {
        let url = format!("{}/oauth/token", self.config.auth_base_url);
        info!("Refreshing access token");

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_string());
            return Err(YotoError::Unauthorized(format!(
                "token refresh rejected ({status}): {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| YotoError::InvalidResponse(e.to_string()))?;

        info!("Access token refreshed");
        grant_from_token(token, Some(refresh_token))
    }
}

#[async_trait::async_trait]
impl IDeviceAuth for YotoDeviceAuth {
    async fn request_code(&self) -> Result<DeviceAuthorization> {
        let code = self.request_device_code().await?;
        Ok(DeviceAuthorization {
            device_code: code.device_code,
            user_code: code.user_code,
            verification_uri: code.verification_uri,
            verification_uri_complete: code.verification_uri_complete,
            expires_in_secs: code.expires_in,
            interval_secs: code.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        })
    }

    async fn poll_token(&self, device_code: &str) -> Result<PollOutcome> {
        match self.poll_device_token(device_code).await {
            Ok(grant) => Ok(PollOutcome::Approved(grant)),
            Err(YotoError::AuthPending) => Ok(PollOutcome::Pending),
            Err(YotoError::SlowDown { interval }) => Ok(PollOutcome::SlowDown {
                interval_secs: interval,
            }),
            Err(YotoError::CodeExpired) => Ok(PollOutcome::Expired),
            Err(YotoError::AuthDenied { description }) => Ok(PollOutcome::Denied { description }),
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenGrant> {
        Ok(self.refresh(refresh_token).await?)
    }
}

// ============================================================================
// Response mapping helpers
// ============================================================================

/// Maps a token-endpoint error body to a typed [`YotoError`]
///
/// `invalid_grant` is grouped with `access_denied`: both mean the code
/// pair can never succeed and the description explains why.
fn poll_error(status: u16, error: &TokenErrorResponse) -> YotoError {
    match error.error.as_str() {
        "authorization_pending" => YotoError::AuthPending,
        "slow_down" => YotoError::SlowDown {
            interval: error.interval,
        },
        "expired_token" => YotoError::CodeExpired,
        "access_denied" | "invalid_grant" => YotoError::AuthDenied {
            description: error
                .error_description
                .clone()
                .unwrap_or_else(|| error.error.clone()),
        },
        _ => YotoError::Api {
            status,
            message: error
                .error_description
                .clone()
                .unwrap_or_else(|| error.error.clone()),
        },
    }
}

/// Builds a [`TokenGrant`] from a token response
///
/// Decodes the access token claims for the subject and expiry; decode
/// failure leaves both unset. Falls back to `previous_refresh` when the
/// server omits a refresh token from the rotation.
fn grant_from_token(
    token: TokenResponse,
    previous_refresh: Option<&str>,
) -> Result<TokenGrant, YotoError> {
    let refresh_token = token
        .refresh_token
        .or_else(|| previous_refresh.map(str::to_string))
        .ok_or_else(|| {
            YotoError::InvalidResponse("token response carried no refresh_token".to_string())
        })?;

    let claims = decode_access_claims(&token.access_token);
    let expires_at = claims
        .exp
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
        .or_else(|| {
            token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64))
        });

    Ok(TokenGrant {
        access_token: token.access_token,
        refresh_token,
        user_id: claims.sub,
        expires_at,
    })
}

/// Decodes the payload segment of a JWT access token (best effort)
///
/// Tokens stay opaque to this client; the claims are only read to
/// remember who is logged in and when the token lapses. Any decode
/// failure yields empty claims, never an error.
fn decode_access_claims(access_token: &str) -> AccessClaims {
    access_token
        .split('.')
        .nth(1)
        .and_then(|payload| {
            base64::engine::general_purpose::URL_SAFE_NO_PAD
                .decode(payload)
                .ok()
        })
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}
