//! Ledger API Wire Types
//!
//! Request/response shapes for the endpoints the state machines depend on.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::idempotency::IdempotencyKey;

/// Login form body (form-encoded, mirrors the OAuth2 password grant shape).
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Password never reaches logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Success body of `POST /ledger/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JSON body of `POST /ledger/transfers`.
///
/// Carries the single idempotency key of its pending operation; the same
/// instance is replayed byte-for-byte on the step-up resubmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferOrder {
    pub amount: Decimal,
    pub to_account_id: u64,
    pub from_account_id: u64,
    pub description: String,
    pub idempotency_key: IdempotencyKey,
}

/// Transfer confirmation. The machines only rely on success/failure; the
/// fields are kept for display and logging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferReceipt {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
}
