use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Authentication token pair issued by the backend at login.
///
/// Replaced wholesale on every login; never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }
}

/// The authenticated user as reported by `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    /// Remaining profile fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CurrentUser {
    /// Returns a string profile field other than `username`.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
