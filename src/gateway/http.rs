//! Ledger API Gateway
//!
//! Thin HTTP client over the ledger service. Attaches the bearer token from
//! the session store to every request and funnels every failure through the
//! normalizer, so callers only ever see [`ApiFailure`].
//!
//! The [`LedgerGateway`] trait is the seam both state machines consume; tests
//! run against [`mock::MockGateway`] instead of a live server.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::error::{ApiFailure, normalize};
use super::types::{Credentials, TokenPair, TransferOrder, TransferReceipt};
use crate::session::{Identity, SessionStore};

/// Calls the state machines depend on. Implementations must return failures
/// already normalized; no raw status codes cross this boundary.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// `POST /ledger/auth/login`. `otp` travels as a query parameter and is
    /// only present on the step-up resubmission.
    async fn login(
        &self,
        credentials: &Credentials,
        otp: Option<&str>,
    ) -> Result<TokenPair, ApiFailure>;

    /// `GET /ledger/accounts/me`.
    async fn current_identity(&self) -> Result<Identity, ApiFailure>;

    /// `POST /ledger/transfers`. `otp` only on the step-up resubmission; the
    /// order body (including its idempotency key) is caller-controlled and
    /// sent unchanged.
    async fn submit_transfer(
        &self,
        order: &TransferOrder,
        otp: Option<&str>,
    ) -> Result<TransferReceipt, ApiFailure>;
}

/// reqwest-backed gateway against a live ledger service.
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, session: Arc<SessionStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attach the bearer token when a session exists, and the otp query
    /// parameter when one was entered.
    fn prepare(&self, req: reqwest::RequestBuilder, otp: Option<&str>) -> reqwest::RequestBuilder {
        let req = match self.session.bearer_token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        match otp {
            Some(code) => req.query(&[("otp", code)]),
            None => req,
        }
    }

    /// Send and decode, normalizing transport errors and non-2xx responses.
    async fn execute<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ApiFailure> {
        let response = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "transport failure");
                return Err(normalize(None, None));
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body: Option<Value> = response.json().await.ok();
            let failure = normalize(Some(status), body.as_ref());
            debug!(status, code = failure.code(), "request failed");
            return Err(failure);
        }

        response.json::<T>().await.map_err(|e| ApiFailure::Unknown {
            raw: format!("malformed success body: {e}"),
        })
    }
}

#[async_trait]
impl LedgerGateway for HttpGateway {
    async fn login(
        &self,
        credentials: &Credentials,
        otp: Option<&str>,
    ) -> Result<TokenPair, ApiFailure> {
        let req = self
            .prepare(self.http.post(self.url("/ledger/auth/login")), otp)
            .form(credentials);
        self.execute(req).await
    }

    async fn current_identity(&self) -> Result<Identity, ApiFailure> {
        let req = self.prepare(self.http.get(self.url("/ledger/accounts/me")), None);
        self.execute(req).await
    }

    async fn submit_transfer(
        &self,
        order: &TransferOrder,
        otp: Option<&str>,
    ) -> Result<TransferReceipt, ApiFailure> {
        let req = self
            .prepare(self.http.post(self.url("/ledger/transfers")), otp)
            .json(order);
        self.execute(req).await
    }
}

/// Scripted in-process gateway for tests and offline demos.
///
/// Responses are queued per endpoint; every call is recorded for later
/// assertions (same role the simulated services play in exchange testing).
#[cfg(feature = "mock-gateway")]
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone)]
    pub struct RecordedLogin {
        pub username: String,
        pub otp: Option<String>,
    }

    #[derive(Debug, Clone)]
    pub struct RecordedTransfer {
        pub order: TransferOrder,
        pub otp: Option<String>,
    }

    #[derive(Default)]
    pub struct MockGateway {
        login_script: Mutex<VecDeque<Result<TokenPair, ApiFailure>>>,
        identity_script: Mutex<VecDeque<Result<Identity, ApiFailure>>>,
        transfer_script: Mutex<VecDeque<Result<TransferReceipt, ApiFailure>>>,
        logins: Mutex<Vec<RecordedLogin>>,
        transfers: Mutex<Vec<RecordedTransfer>>,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_login(&self, result: Result<TokenPair, ApiFailure>) {
            self.login_script.lock().unwrap().push_back(result);
        }

        pub fn push_identity(&self, result: Result<Identity, ApiFailure>) {
            self.identity_script.lock().unwrap().push_back(result);
        }

        pub fn push_transfer(&self, result: Result<TransferReceipt, ApiFailure>) {
            self.transfer_script.lock().unwrap().push_back(result);
        }

        /// Login calls seen so far, in order.
        pub fn logins(&self) -> Vec<RecordedLogin> {
            self.logins.lock().unwrap().clone()
        }

        /// Transfer submissions seen so far, in order.
        pub fn transfers(&self) -> Vec<RecordedTransfer> {
            self.transfers.lock().unwrap().clone()
        }

        pub fn transfer_count(&self) -> usize {
            self.transfers.lock().unwrap().len()
        }

        fn next<T>(script: &Mutex<VecDeque<Result<T, ApiFailure>>>) -> Result<T, ApiFailure> {
            script.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(ApiFailure::Unknown {
                    raw: "mock gateway script exhausted".to_string(),
                })
            })
        }
    }

    #[async_trait]
    impl LedgerGateway for MockGateway {
        async fn login(
            &self,
            credentials: &Credentials,
            otp: Option<&str>,
        ) -> Result<TokenPair, ApiFailure> {
            self.logins.lock().unwrap().push(RecordedLogin {
                username: credentials.username.clone(),
                otp: otp.map(str::to_string),
            });
            Self::next(&self.login_script)
        }

        async fn current_identity(&self) -> Result<Identity, ApiFailure> {
            Self::next(&self.identity_script)
        }

        async fn submit_transfer(
            &self,
            order: &TransferOrder,
            otp: Option<&str>,
        ) -> Result<TransferReceipt, ApiFailure> {
            self.transfers.lock().unwrap().push(RecordedTransfer {
                order: order.clone(),
                otp: otp.map(str::to_string),
            });
            Self::next(&self.transfer_script)
        }
    }
}
