//! LuisBank Client Core
//!
//! Client-side step-up authentication protocol for the retail-banking ledger
//! API. Turns a single credential check or money-movement request into a
//! two-phase exchange whenever the server demands a second factor, without
//! losing entered data and with at-most-once execution of fund movements.
//!
//! # Modules
//!
//! - [`gateway`] - Wire types, failure normalizer, HTTP client
//! - [`idempotency`] - Per-operation key provider (secure + fallback)
//! - [`session`] - Persisted, observable session store
//! - [`login`] - Credential authentication state machine
//! - [`transfer`] - Step-up transaction state machine
//! - [`timer`] - Cancellable delayed transitions
//! - [`config`] / [`logging`] - Startup configuration and tracing setup
//!
//! The domain CRUD screens (cards, loans, billing, insurance, ...) are thin
//! consumers of the same gateway contract and live outside this crate.

pub mod config;
pub mod gateway;
pub mod idempotency;
pub mod logging;
pub mod login;
pub mod session;
pub mod timer;
pub mod transfer;

// Convenient re-exports at crate root
pub use config::{ClientConfig, ConfigError};
pub use gateway::{
    ApiFailure, Credentials, FieldError, HttpGateway, LedgerGateway, TokenPair, TransferOrder,
    TransferReceipt, normalize,
};
pub use idempotency::{IdempotencyKey, KeySource, OsRandomKeys, PseudoRandomKeys, detect_key_source};
pub use login::{LoginFlow, LoginStep, RATE_LIMIT_MESSAGE};
pub use session::{Identity, Session, SessionStore, STORAGE_NAME};
pub use timer::DelayedTransition;
pub use transfer::{SUCCESS_DISPLAY, TransferDraft, TransferFlow, TransferStep};
