//! Yoto API client
//!
//! Provides a thin authenticated HTTP client for the Yoto API. Handles
//! bearer headers, base URL construction and error-status mapping; the
//! endpoint-specific request/response types live in [`crate::upload`]
//! and [`crate::content`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cardpress_yoto::client::YotoClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = YotoClient::new("access-token-here");
//! let response = client.request(Method::GET, "/card/mine").send().await?;
//! # Ok(())
//! # }
//! ```

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use tracing::debug;

use crate::YotoError;

/// Base URL for the Yoto API
pub const API_BASE_URL: &str = "https://api.yotoplay.com";

/// HTTP client for Yoto API calls
///
/// Wraps `reqwest::Client` with bearer authentication and base URL
/// construction. The access token is replaceable so a refreshed token
/// can be applied without rebuilding the connection pool.
pub struct YotoClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Current OAuth2 access token
    access_token: String,
}

impl YotoClient {
    /// Creates a new YotoClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, API_BASE_URL)
    }

    /// Creates a new YotoClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated YotoClient access token");
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the configured base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying HTTP client
    ///
    /// Used for requests to absolute URLs handed out by the API (the
    /// pre-signed upload URL), which must not carry the bearer header.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// Automatically prepends the base URL and adds the Authorization header.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(&self.access_token)
    }
}

/// Maps a non-success response to a typed [`YotoError`]
///
/// 401 becomes [`YotoError::Unauthorized`] so callers can surface stale
/// credentials distinctly; every other error status becomes
/// [`YotoError::Api`] carrying the body verbatim.
pub(crate) async fn ensure_success(response: Response) -> Result<Response, YotoError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_string());

    if status == StatusCode::UNAUTHORIZED {
        return Err(YotoError::Unauthorized(message));
    }
    Err(YotoError::Api {
        status: status.as_u16(),
        message,
    })
}
