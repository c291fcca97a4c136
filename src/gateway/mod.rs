//! API Gateway Module
//!
//! Everything that touches the wire: request/response types, the failure
//! normalizer, and the HTTP client behind the [`LedgerGateway`] trait.

pub mod error;
pub mod http;
pub mod types;

// Re-exports for convenient access
pub use error::{ApiFailure, FieldError, normalize};
#[cfg(feature = "mock-gateway")]
pub use http::mock;
pub use http::{HttpGateway, LedgerGateway};
pub use types::{Credentials, TokenPair, TransferOrder, TransferReceipt};
