use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Social platforms that can be linked through OAuth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
}

impl Platform {
    /// Returns all linkable platforms.
    pub fn all() -> &'static [Platform] {
        &[Platform::Facebook, Platform::Instagram]
    }

    /// Returns the lowercase identifier used in URLs and on the wire.
    pub fn id(&self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
        }
    }

    /// Returns the platform for an id string (case-insensitive).
    pub fn from_id(id: &str) -> Option<Platform> {
        match id.trim().to_lowercase().as_str() {
            "facebook" | "fb" => Some(Platform::Facebook),
            "instagram" | "ig" => Some(Platform::Instagram),
            _ => None,
        }
    }

    /// Returns the human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Error returned when parsing an unsupported platform id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown platform '{}'. Expected one of: facebook, instagram",
            self.0
        )
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Platform::from_id(value).ok_or_else(|| UnknownPlatform(value.to_string()))
    }
}
