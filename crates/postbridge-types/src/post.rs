use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::PostTime;
use crate::wire::id_string;

/// Publication status of a post. The backend owns all transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PostStatus {
    Published,
    Scheduled,
    Failed,
    /// A status this client does not know about, kept verbatim.
    Other(String),
}

impl PostStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PostStatus::Published => "published",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Failed => "failed",
            PostStatus::Other(s) => s,
        }
    }
}

impl From<String> for PostStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "published" => PostStatus::Published,
            "scheduled" => PostStatus::Scheduled,
            "failed" => PostStatus::Failed,
            _ => PostStatus::Other(value),
        }
    }
}

impl From<PostStatus> for String {
    fn from(status: PostStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A post as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub content: String,
    pub platform: String,
    pub status: PostStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<PostTime>,
    pub created_at: PostTime,
}

/// Aggregate counts derived from a post collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_posts: usize,
    pub per_platform_counts: BTreeMap<String, usize>,
    pub scheduled_count: usize,
}

impl Stats {
    /// Returns the number of posts tagged with `platform` (zero if none).
    pub fn count_for(&self, platform: &str) -> usize {
        self.per_platform_counts.get(platform).copied().unwrap_or(0)
    }
}
