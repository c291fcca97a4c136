//! Normalized API Failures
//!
//! The ledger service reports failures in several shapes: no response at all,
//! a bare string `detail`, or a structured validation list. `normalize` is the
//! single place allowed to inspect those shapes; everything else in the crate
//! branches on the closed [`ApiFailure`] enum.

use serde_json::Value;
use thiserror::Error;

/// One entry of a structured validation failure, in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Last segment of the server's `loc` path (`"field"` when absent).
    pub field: String,
    /// Server message, verbatim.
    pub message: String,
}

/// Discriminated failure returned by every gateway call.
///
/// Exactly one kind per failure. The original server message is kept on the
/// variants that carry one, so the UI never loses displayable detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiFailure {
    /// Server demands a second factor before completing the operation.
    #[error("additional authentication required")]
    StepUpRequired,

    /// Too many attempts; the server enforces the lockout window.
    #[error("too many attempts, wait before retrying")]
    RateLimited,

    /// Structured field-level rejection (HTTP 400/422 with a detail list).
    #[error("{}", join_fields(.fields))]
    Validation { fields: Vec<FieldError> },

    /// Credentials or second-factor code rejected.
    #[error("{message}")]
    Unauthorized { message: String },

    /// No response from the server at all.
    #[error("cannot reach the server")]
    Unreachable,

    /// Anything the decision rules above do not recognize.
    #[error("{raw}")]
    Unknown { raw: String },
}

impl ApiFailure {
    /// Stable code for logs and assertions.
    pub fn code(&self) -> &'static str {
        match self {
            ApiFailure::StepUpRequired => "STEP_UP_REQUIRED",
            ApiFailure::RateLimited => "RATE_LIMITED",
            ApiFailure::Validation { .. } => "VALIDATION",
            ApiFailure::Unauthorized { .. } => "UNAUTHORIZED",
            ApiFailure::Unreachable => "UNREACHABLE",
            ApiFailure::Unknown { .. } => "UNKNOWN",
        }
    }
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Map a raw HTTP outcome to an [`ApiFailure`].
///
/// `status` is `None` when the request never produced a response (offline,
/// connection refused, DNS). `body` is the parsed JSON body when one exists.
///
/// Decision rules, in order:
/// 1. no response → `Unreachable`
/// 2. 429 → `RateLimited`
/// 3. 401 with a detail string containing "mfa" (case-insensitive) → `StepUpRequired`
/// 4. 401 otherwise → `Unauthorized`
/// 5. 400/422 with an array-shaped detail → `Validation`
/// 6. everything else → `Unknown` with a best-effort rendering of the body
///
/// Never panics, always returns a value.
pub fn normalize(status: Option<u16>, body: Option<&Value>) -> ApiFailure {
    let Some(status) = status else {
        return ApiFailure::Unreachable;
    };

    let detail = body.and_then(|b| b.get("detail"));

    match status {
        429 => ApiFailure::RateLimited,
        401 => {
            let message = detail
                .and_then(Value::as_str)
                .unwrap_or("invalid credentials or code");
            if message.to_ascii_lowercase().contains("mfa") {
                ApiFailure::StepUpRequired
            } else {
                ApiFailure::Unauthorized {
                    message: message.to_string(),
                }
            }
        }
        400 | 422 => match detail.and_then(Value::as_array) {
            Some(entries) => ApiFailure::Validation {
                fields: entries.iter().map(field_entry).collect(),
            },
            None => unknown(status, body),
        },
        _ => unknown(status, body),
    }
}

/// One validation entry: field name is the last `loc` segment, message verbatim.
fn field_entry(entry: &Value) -> FieldError {
    let field = entry
        .get("loc")
        .and_then(Value::as_array)
        .and_then(|loc| loc.last())
        .map(render_segment)
        .unwrap_or_else(|| "field".to_string());
    let message = entry
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or("invalid value")
        .to_string();
    FieldError { field, message }
}

fn render_segment(segment: &Value) -> String {
    match segment {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unknown(status: u16, body: Option<&Value>) -> ApiFailure {
    let raw = match body {
        Some(Value::Null) | None => format!("server error (HTTP {status})"),
        // Prefer the detail payload when present, whole body otherwise.
        Some(b) => {
            let shown = b.get("detail").unwrap_or(b);
            match shown {
                Value::String(s) => s.clone(),
                other => serde_json::to_string(other)
                    .unwrap_or_else(|_| format!("server error (HTTP {status})")),
            }
        }
    };
    ApiFailure::Unknown { raw }
}
