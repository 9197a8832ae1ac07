//! Device-code login use case
//!
//! Drives the device-code grant state machine: request a user code,
//! poll the token endpoint while the user approves, and persist the
//! granted credentials. At most one authorization attempt is live per
//! process; starting a new one silently discards the previous session.
//!
//! Polling is caller-paced. Each [`DeviceLoginUseCase::poll_once`] call
//! performs a single poll, and the returned [`PollResult`] tells the
//! caller how long to wait before the next one. Expiry is enforced
//! locally before any network traffic.

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::domain::{Credentials, DeviceSession, LoginPhase};
use crate::ports::{IDeviceAuth, PollOutcome, TokenGrant};
use crate::usecases::CredentialCache;

/// Outcome of one caller-driven poll step
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult {
    /// The user approved; credentials are stored
    Approved(Credentials),
    /// Not decided yet; poll again after `retry_in`
    Pending { retry_in: std::time::Duration },
    /// The user rejected the request
    Denied { description: String },
    /// The user code lapsed before approval
    Expired,
}

struct LoginState {
    phase: LoginPhase,
    session: Option<DeviceSession>,
}

/// Use case for device-code authentication
///
/// Coordinates the authorization server port and the credential cache,
/// owning the single live [`DeviceSession`] for the process.
pub struct DeviceLoginUseCase {
    auth: Arc<dyn IDeviceAuth + Send + Sync>,
    credentials: Arc<CredentialCache>,
    state: tokio::sync::Mutex<LoginState>,
}

impl DeviceLoginUseCase {
    /// Creates a new DeviceLoginUseCase with the required dependencies
    ///
    /// # Arguments
    ///
    /// * `auth` - Authorization server port for the device grant
    /// * `credentials` - Credential cache that approved grants are saved through
    pub fn new(auth: Arc<dyn IDeviceAuth + Send + Sync>, credentials: Arc<CredentialCache>) -> Self {
        Self {
            auth,
            credentials,
            state: tokio::sync::Mutex::new(LoginState {
                phase: LoginPhase::Idle,
                session: None,
            }),
        }
    }

    /// Starts a new device authorization attempt
    ///
    /// Requests a device/user code pair and replaces any session from a
    /// previous attempt. The returned snapshot carries the user code and
    /// verification URL for display.
    ///
    /// # Errors
    ///
    /// Returns an error when the code request fails; the state machine
    /// moves to `Failed` and no session remains.
    pub async fn start(&self) -> Result<DeviceSession> {
        let mut state = self.state.lock().await;

        // Step 1: Request a fresh code pair. Any prior attempt is
        // abandoned regardless of the outcome.
        state.session = None;
        let authorization = match self.auth.request_code().await {
            Ok(authorization) => authorization,
            Err(e) => {
                state.phase = LoginPhase::Failed;
                return Err(e).context("Failed to request device authorization code");
            }
        };

        tracing::info!(
            user_code = %authorization.user_code,
            expires_in_secs = authorization.expires_in_secs,
            "device authorization code issued"
        );

        // Step 2: Track the new session and hand a snapshot to the caller.
        let session = DeviceSession::new(
            authorization.device_code,
            authorization.user_code,
            authorization.verification_uri,
            authorization.verification_uri_complete,
            authorization.expires_in_secs,
            authorization.interval_secs,
        );
        state.session = Some(session.clone());
        state.phase = LoginPhase::CodeRequested;

        Ok(session)
    }

    /// Performs one token poll for the active session
    ///
    /// Checks expiry before touching the network: a lapsed session
    /// yields [`PollResult::Expired`] without a request. Flow-control
    /// responses keep the session alive; terminal outcomes drop it.
    ///
    /// # Errors
    ///
    /// Returns an error when no attempt is active, when the poll request
    /// itself fails, or when storing approved credentials fails. All
    /// error paths drop the session and move the phase to `Failed`.
    pub async fn poll_once(&self) -> Result<PollResult> {
        let mut state = self.state.lock().await;

        let (expired, device_code, user_code) = match state.session.as_ref() {
            Some(session) => (
                session.is_expired(),
                session.device_code().to_string(),
                session.user_code().to_string(),
            ),
            None => bail!("No device authorization in progress; call start first"),
        };

        // Step 1: Local expiry check. Expired codes never reach the
        // token endpoint.
        if expired {
            tracing::warn!(user_code = %user_code, "device code expired before approval");
            state.session = None;
            state.phase = LoginPhase::Expired;
            return Ok(PollResult::Expired);
        }

        // Step 2: Single poll against the token endpoint.
        state.phase = LoginPhase::Polling;
        let outcome = match self.auth.poll_token(&device_code).await {
            Ok(outcome) => outcome,
            Err(e) => {
                state.session = None;
                state.phase = LoginPhase::Failed;
                return Err(e).context("Device token poll failed");
            }
        };

        // Step 3: Apply the outcome to the state machine.
        match outcome {
            PollOutcome::Approved(grant) => {
                let credentials = match self.store_grant(grant).await {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        state.session = None;
                        state.phase = LoginPhase::Failed;
                        return Err(e);
                    }
                };
                tracing::info!(user_id = ?credentials.user_id(), "device authorization approved");
                state.session = None;
                state.phase = LoginPhase::Approved;
                Ok(PollResult::Approved(credentials))
            }
            PollOutcome::Pending => {
                let retry_in = state
                    .session
                    .as_ref()
                    .map(DeviceSession::poll_interval)
                    .unwrap_or_default();
                Ok(PollResult::Pending { retry_in })
            }
            PollOutcome::SlowDown { interval_secs } => {
                let session = state
                    .session
                    .as_mut()
                    .context("Session vanished during poll")?;
                session.apply_slow_down(interval_secs);
                tracing::debug!(
                    interval_secs = session.poll_interval().as_secs(),
                    "token endpoint requested slower polling"
                );
                Ok(PollResult::Pending {
                    retry_in: session.poll_interval(),
                })
            }
            PollOutcome::Denied { description } => {
                tracing::warn!(%description, "device authorization denied");
                state.session = None;
                state.phase = LoginPhase::Denied;
                Ok(PollResult::Denied { description })
            }
            PollOutcome::Expired => {
                state.session = None;
                state.phase = LoginPhase::Expired;
                Ok(PollResult::Expired)
            }
        }
    }

    /// Discards stored credentials and any active session
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be cleared
    pub async fn logout(&self) -> Result<()> {
        self.credentials
            .clear()
            .await
            .context("Failed to clear credentials on logout")?;

        let mut state = self.state.lock().await;
        state.session = None;
        state.phase = LoginPhase::Idle;
        tracing::info!("logged out");
        Ok(())
    }

    /// Current phase of the login state machine
    pub async fn phase(&self) -> LoginPhase {
        self.state.lock().await.phase
    }

    /// Builds credentials from a grant and persists them
    async fn store_grant(&self, grant: TokenGrant) -> Result<Credentials> {
        let mut credentials = Credentials::new(grant.access_token, grant.refresh_token)
            .context("Authorization server returned an incomplete token pair")?;
        if let Some(user_id) = grant.user_id {
            credentials = credentials.with_user_id(user_id);
        }
        if let Some(expires_at) = grant.expires_at {
            credentials = credentials.with_expires_at(expires_at);
        }

        self.credentials.save(&credentials).await?;
        Ok(credentials)
    }
}
