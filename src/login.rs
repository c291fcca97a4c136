//! Credential Authentication Flow
//!
//! Drives the login screen: submits credentials, interprets a step-up
//! challenge, resubmits with the second factor, and populates the session
//! store on terminal success. Authentication is not a fund movement, so no
//! idempotency key is attached; the server owns lockout, and a plain retry
//! is acceptable.
//!
//! ```text
//! CREDENTIALS ──submit──▶ MFA ──code──▶ AUTHENTICATED
//!      ▲                   │
//!      └──back to password─┘
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::gateway::{ApiFailure, Credentials, LedgerGateway};
use crate::session::SessionStore;

/// Fixed cool-down message surfaced on rate limit; the server enforces the
/// actual window.
pub const RATE_LIMIT_MESSAGE: &str = "Too many attempts. Wait one minute and try again.";

/// Login screen states. `Authenticated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    Credentials,
    Mfa,
    Authenticated,
}

impl LoginStep {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginStep::Authenticated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoginStep::Credentials => "CREDENTIALS",
            LoginStep::Mfa => "MFA",
            LoginStep::Authenticated => "AUTHENTICATED",
        }
    }
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Two-phase credential state machine.
///
/// One instance per open login screen. `&mut self` on the submit methods
/// keeps submissions serialized; the UI disables the button while one is
/// outstanding.
pub struct LoginFlow<G: LedgerGateway> {
    gateway: Arc<G>,
    session: Arc<SessionStore>,
    step: LoginStep,
    /// Credentials snapshotted when the server demanded a second factor.
    /// Resubmitted verbatim with the code; discarded on escape or success.
    pending: Option<Credentials>,
    error: Option<String>,
}

impl<G: LedgerGateway> LoginFlow<G> {
    pub fn new(gateway: Arc<G>, session: Arc<SessionStore>) -> Self {
        Self {
            gateway,
            session,
            step: LoginStep::Credentials,
            pending: None,
            error: None,
        }
    }

    pub fn step(&self) -> LoginStep {
        self.step
    }

    /// Message to surface on the current form, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Phase INITIAL: submit username and password.
    pub async fn submit_credentials(&mut self, username: &str, password: &str) -> LoginStep {
        if self.step != LoginStep::Credentials {
            debug!(step = %self.step, "credential submit ignored outside CREDENTIALS");
            return self.step;
        }
        let creds = Credentials::new(username, password);
        self.attempt(creds, None).await
    }

    /// Phase STEP_UP: resubmit the snapshotted credentials plus the code.
    pub async fn submit_code(&mut self, otp: &str) -> LoginStep {
        let Some(creds) = self.pending.clone() else {
            debug!(step = %self.step, "code submit ignored without a pending challenge");
            return self.step;
        };
        self.attempt(creds, Some(otp)).await
    }

    /// Escape hatch from MFA back to the password form; the snapshot is
    /// discarded and the next submit starts a fresh attempt.
    pub fn back_to_password(&mut self) {
        self.pending = None;
        self.error = None;
        self.step = LoginStep::Credentials;
    }

    async fn attempt(&mut self, creds: Credentials, otp: Option<&str>) -> LoginStep {
        match self.gateway.login(&creds, otp).await {
            Ok(tokens) => {
                // Token grant is the authoritative login event. The identity
                // read rides on the fresh token; if it fails the session stays
                // authenticated with identity absent.
                self.session.login(tokens.access_token, tokens.refresh_token);
                match self.gateway.current_identity().await {
                    Ok(identity) => self.session.set_identity(identity),
                    Err(e) => {
                        warn!(code = e.code(), "identity read failed after login");
                    }
                }
                info!(username = %creds.username, "login complete");
                self.pending = None;
                self.error = None;
                self.step = LoginStep::Authenticated;
            }
            Err(ApiFailure::StepUpRequired) => {
                // Entering (or re-entering on an expired code) MFA clears the
                // visible code field; the credentials snapshot is kept.
                debug!("step-up challenge issued");
                self.pending = Some(creds);
                self.error = None;
                self.step = LoginStep::Mfa;
            }
            Err(ApiFailure::RateLimited) => {
                self.error = Some(RATE_LIMIT_MESSAGE.to_string());
            }
            Err(failure) => {
                debug!(code = failure.code(), "login attempt failed");
                self.error = Some(failure.to_string());
            }
        }
        self.step
    }
}
