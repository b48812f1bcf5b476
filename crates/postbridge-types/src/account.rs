use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wire::{id_string, id_string_or_empty};

/// A page (or similar publishing target) owned by a linked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Connection state of a linked account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Active,
    Inactive,
    Unknown,
    Other(String),
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionStatus::Active => "active",
            ConnectionStatus::Inactive => "inactive",
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Other(s) => s,
        }
    }
}

impl From<&str> for ConnectionStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "active" | "connected" => ConnectionStatus::Active,
            "inactive" | "disconnected" => ConnectionStatus::Inactive,
            "unknown" | "" => ConnectionStatus::Unknown,
            _ => ConnectionStatus::Other(value.to_string()),
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConnectionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A social account linked to the current user.
///
/// The platform tag is kept as the backend sent it so that the registry never
/// drops or rewrites records it does not recognize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SocialAccountWire")]
pub struct SocialAccount {
    pub id: String,
    pub platform: String,
    pub platform_user_id: String,
    pub pages: Vec<Page>,
    pub connection_status: ConnectionStatus,
}

#[derive(Deserialize)]
struct SocialAccountWire {
    #[serde(deserialize_with = "id_string")]
    id: String,
    platform: String,
    #[serde(default, deserialize_with = "id_string_or_empty")]
    platform_user_id: String,
    #[serde(default)]
    pages: Option<Value>,
    #[serde(default)]
    connection_status: Option<String>,
    #[serde(default)]
    is_active: Option<bool>,
}

impl TryFrom<SocialAccountWire> for SocialAccount {
    type Error = String;

    fn try_from(wire: SocialAccountWire) -> Result<Self, Self::Error> {
        let pages = decode_pages(wire.pages)?;
        let connection_status = match (wire.connection_status, wire.is_active) {
            (Some(status), _) => ConnectionStatus::from(status.as_str()),
            (None, Some(true)) => ConnectionStatus::Active,
            (None, Some(false)) => ConnectionStatus::Inactive,
            (None, None) => ConnectionStatus::Unknown,
        };
        Ok(SocialAccount {
            id: wire.id,
            platform: wire.platform,
            platform_user_id: wire.platform_user_id,
            pages,
            connection_status,
        })
    }
}

/// Pages arrive either as a JSON array or as a JSON-encoded string column.
fn decode_pages(raw: Option<Value>) -> Result<Vec<Page>, String> {
    match raw {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| format!("invalid page: {e}")))
            .collect(),
        Some(Value::String(encoded)) => {
            if encoded.trim().is_empty() {
                return Ok(Vec::new());
            }
            match serde_json::from_str::<Value>(&encoded) {
                Ok(list @ Value::Array(_)) => decode_pages(Some(list)),
                // Non-array payloads in the text column carry no page list.
                _ => Ok(Vec::new()),
            }
        }
        Some(other) => Err(format!("expected page list, got {other}")),
    }
}

impl SocialAccount {
    /// Returns true if this account belongs to the given platform tag.
    pub fn is_platform(&self, platform: &str) -> bool {
        self.platform.eq_ignore_ascii_case(platform)
    }
}
