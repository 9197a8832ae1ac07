//! Auth commands - Login, Logout, and Status for the Yoto platform
//!
//! Provides the top-level auth subcommands which:
//! 1. `login`  - Runs the device-code grant via YotoDeviceAuth, shows
//!    the user code, polls for approval and stores the token pair in
//!    the system keyring.
//! 2. `logout` - Clears the token pair from the keyring.
//! 3. `status` - Shows who is logged in and whether the token is stale.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use tracing::{debug, info, warn};

use cardpress_core::usecases::{CredentialCache, DeviceLoginUseCase, PollResult};
use cardpress_yoto::auth::{DeviceAuthConfig, YotoDeviceAuth};
use cardpress_yoto::keyring_store::KeyringCredentialStore;

use crate::output::get_formatter;
use crate::CliContext;

/// Built-in public client id used when neither the flag nor the config
/// provides one
pub(crate) const DEFAULT_CLIENT_ID: &str = "RslORm04nKbhf04qb91r2Pxwjsn3Hnd5";

/// Credential cache over the system keyring
pub(crate) fn credential_cache() -> Arc<CredentialCache> {
    Arc::new(CredentialCache::new(Arc::new(KeyringCredentialStore::new())))
}

/// Device auth port configured from the flag, the config file, or the
/// built-in client id, in that order
pub(crate) fn device_auth(ctx: &CliContext, cli_client_id: Option<&str>) -> YotoDeviceAuth {
    let client_id = cli_client_id
        .map(str::to_string)
        .or_else(|| ctx.config.auth.client_id.clone())
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

    let config = DeviceAuthConfig::new(client_id)
        .with_auth_base_url(ctx.config.api.auth_base_url.clone())
        .with_audience(ctx.config.api.api_base_url.clone());
    YotoDeviceAuth::new(config)
}

#[derive(Debug, Args)]
pub struct LoginCommand {
    /// Custom OAuth client id
    #[arg(long)]
    client_id: Option<String>,

    /// Do not open the verification page in a browser
    #[arg(long)]
    no_browser: bool,
}

impl LoginCommand {
    /// Execute the login flow:
    /// 1. Request a device/user code pair
    /// 2. Show the code and open the verification page
    /// 3. Poll the token endpoint until the user decides
    /// 4. Store the granted token pair in the keyring
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);

        let auth = Arc::new(device_auth(ctx, self.client_id.as_deref()));
        let cache = credential_cache();

        if cache.is_authenticated().await? {
            fmt.info("Already logged in; the new login replaces the stored credentials.");
        }

        let login = DeviceLoginUseCase::new(auth, cache);

        // Step 1: Request a code pair
        let session = login.start().await?;
        info!(user_code = %session.user_code(), "Device authorization started");

        // Step 2: Show the code and open the browser
        fmt.print_json(&serde_json::json!({
            "userCode": session.user_code(),
            "verificationUri": session.verification_uri(),
            "expiresInSecs": session.seconds_remaining(),
        }));
        fmt.info(&format!(
            "Visit {} and enter code: {}",
            session.verification_uri(),
            session.user_code()
        ));

        if !self.no_browser {
            let url = session
                .verification_uri_complete()
                .unwrap_or_else(|| session.verification_uri());
            if let Err(e) = webbrowser::open(url) {
                debug!(error = %e, "Browser launch failed");
                fmt.info("Could not open a browser; use the URL above.");
            }
        }

        fmt.info("Waiting for approval...");

        // Step 3: Poll until the user approves, denies, or the code
        // lapses. The use case paces us via retry_in.
        loop {
            match login.poll_once().await? {
                PollResult::Approved(credentials) => {
                    match credentials.user_id() {
                        Some(user_id) => fmt.success(&format!("Authenticated as {user_id}")),
                        None => fmt.success("Authenticated"),
                    }
                    return Ok(());
                }
                PollResult::Pending { retry_in } => {
                    debug!(retry_in_secs = retry_in.as_secs(), "Authorization pending");
                    tokio::time::sleep(retry_in).await;
                }
                PollResult::Denied { description } => {
                    fmt.error(&format!("Authorization denied: {description}"));
                    bail!("Authorization denied");
                }
                PollResult::Expired => {
                    fmt.error("The code expired before approval. Run login again.");
                    bail!("Device code expired");
                }
            }
        }
    }
}

#[derive(Debug, Args)]
pub struct LogoutCommand {}

impl LogoutCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);
        let cache = credential_cache();

        if !cache.is_authenticated().await? {
            fmt.info("No stored credentials. Nothing to log out.");
            return Ok(());
        }

        cache.clear().await?;
        info!("Credentials cleared");
        fmt.success("Logged out");
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let fmt = get_formatter(ctx.format);
        let cache = credential_cache();

        let Some(credentials) = cache.get().await? else {
            fmt.print_json(&serde_json::json!({"authenticated": false}));
            fmt.info("Not logged in. Run `cardpress login` to authenticate.");
            return Ok(());
        };

        fmt.print_json(&serde_json::json!({
            "authenticated": true,
            "userId": credentials.user_id(),
            "expiresAt": credentials.expires_at(),
            "expired": credentials.is_expired(),
        }));

        match credentials.user_id() {
            Some(user_id) => fmt.success(&format!("Logged in as {user_id}")),
            None => fmt.success("Logged in"),
        }
        match credentials.expires_at() {
            Some(expires_at) if credentials.is_expired() => {
                warn!(%expires_at, "Access token expired");
                fmt.info(&format!(
                    "Access token expired at {expires_at}; it will be refreshed on the next publish."
                ));
            }
            Some(expires_at) => fmt.info(&format!("Access token valid until {expires_at}")),
            None => fmt.info("Access token expiry unknown"),
        }
        Ok(())
    }
}
