//! Error taxonomy for backend calls.
//!
//! Every failure crossing into presentation is an [`ApiError`] whose
//! `Display` is the single human-readable message built by [`error_message`].
//! OAuth protocol failures are not represented here; they live in the link
//! state machine.

use std::fmt;

use serde_json::Value;

/// Categories of API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Rejected locally before any network call
    Validation,
    /// The request never completed (connect, timeout, body decode)
    Transport,
    /// The backend answered with an error status
    Backend,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Validation => write!(f, "validation"),
            ApiErrorKind::Transport => write!(f, "transport"),
            ApiErrorKind::Backend => write!(f, "backend"),
        }
    }
}

/// Structured error from an API operation.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    /// One-line message suitable for display
    pub message: String,
    /// HTTP status, when the backend answered
    pub status: Option<u16>,
    /// Raw response body, when there was one
    pub details: Option<String>,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Validation,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Transport,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    /// Creates a backend error from an error status and its response body.
    pub fn backend(status: u16, body: &str) -> Self {
        let payload = serde_json::from_str::<Value>(body).ok();
        let transport = format!("HTTP {status}");
        Self {
            kind: ApiErrorKind::Backend,
            message: error_message(payload.as_ref(), &transport),
            status: Some(status),
            details: if body.is_empty() {
                None
            } else {
                Some(body.to_string())
            },
        }
    }

    /// Returns true for 401/403 responses (expired or revoked token).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ApiError::backend(status.as_u16(), "");
        }
        ApiError::transport(err.to_string())
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Composes the user-facing message for a failed call.
///
/// Precedence: payload `detail` > payload `message` > transport message.
pub fn error_message(payload: Option<&Value>, transport_message: &str) -> String {
    let Some(payload) = payload else {
        return transport_message.to_string();
    };

    if let Some(detail) = payload.get("detail").and_then(render_detail) {
        return detail;
    }

    if let Some(message) = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
    {
        return message.to_string();
    }

    transport_message.to_string()
}

/// Renders a `detail` field: plain strings as-is, validation lists as their
/// joined `msg` entries, anything else as compact JSON.
fn render_detail(detail: &Value) -> Option<String> {
    match detail {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_string(),
                    None => item
                        .as_str()
                        .map_or_else(|| item.to_string(), str::to_string),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}
