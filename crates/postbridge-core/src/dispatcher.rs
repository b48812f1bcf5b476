//! Post creation, scheduling and instant publishing.
//!
//! Every successful dispatch is followed by a full refetch of the post
//! history; [`Stats`] are recomputed from that collection and never stored
//! independently of it.

use postbridge_types::{Post, PostStatus, Stats};
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::registry::AccountRegistry;

/// Schedule sentinel meaning "publish immediately".
pub const SCHEDULE_NOW: &str = "now";

/// When a created post should go out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    Now,
    /// Passed to the backend verbatim
    At(String),
}

impl Schedule {
    /// `"now"` (case-sensitive, surrounding whitespace ignored) is
    /// [`Schedule::Now`]; anything else is kept as written.
    pub fn parse(value: &str) -> Self {
        if value.trim() == SCHEDULE_NOW {
            Schedule::Now
        } else {
            Schedule::At(value.to_string())
        }
    }

    fn wire_value(&self) -> Option<&str> {
        match self {
            Schedule::Now => None,
            Schedule::At(time) => Some(time),
        }
    }
}

/// A post to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub content: String,
    pub platform: String,
    pub schedule: Schedule,
}

#[derive(Serialize)]
struct CreateBody<'a> {
    content: &'a str,
    platform: &'a str,
    schedule_time: Option<&'a str>,
}

#[derive(Serialize)]
struct InstantBody<'a> {
    content: &'a str,
    platform: &'a str,
}

/// Outcome of an accepted dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReceipt {
    /// Backend response, opaque
    pub response: Value,
    /// False when the follow-up history refetch failed
    pub refreshed: bool,
}

/// Aggregates posts by platform and status. Pure.
pub fn compute_stats(posts: &[Post]) -> Stats {
    posts.iter().fold(Stats::default(), |mut stats, post| {
        stats.total_posts += 1;
        *stats
            .per_platform_counts
            .entry(post.platform.clone())
            .or_insert(0) += 1;
        if post.status == PostStatus::Scheduled {
            stats.scheduled_count += 1;
        }
        stats
    })
}

/// Dispatches posts and keeps the post history snapshot.
#[derive(Debug, Clone)]
pub struct PostDispatcher {
    client: ApiClient,
    posts: Vec<Post>,
    stats: Stats,
}

impl PostDispatcher {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            posts: Vec::new(),
            stats: Stats::default(),
        }
    }

    /// Posts as of the last refresh, in backend order.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Refetches post history and recomputes stats.
    ///
    /// # Errors
    /// Returns the backend or transport error; the previous snapshot is kept.
    pub async fn refresh(&mut self) -> ApiResult<&[Post]> {
        let posts: Vec<Post> = self.client.get_json(&self.client.endpoints().posts).await?;
        self.stats = compute_stats(&posts);
        self.posts = posts;
        tracing::debug!(total = self.stats.total_posts, "post history refreshed");
        Ok(&self.posts)
    }

    /// Creates or schedules a post on a connected platform.
    ///
    /// # Errors
    /// Returns a validation error for blank content, an empty registry, or a
    /// platform with no linked account (no request is made in those cases);
    /// otherwise the backend error.
    pub async fn create(
        &mut self,
        registry: &AccountRegistry,
        post: &NewPost,
    ) -> ApiResult<DispatchReceipt> {
        validate_content(&post.content)?;

        let connected = registry.connected_platforms();
        if connected.is_empty() {
            return Err(ApiError::validation("no connected accounts"));
        }
        if !connected.contains(&post.platform) {
            return Err(ApiError::validation(format!(
                "no connected {} account (connected: {})",
                post.platform,
                connected.join(", ")
            )));
        }

        let body = CreateBody {
            content: &post.content,
            platform: &post.platform,
            schedule_time: post.schedule.wire_value(),
        };
        let response = self
            .client
            .post_json(&self.client.endpoints().create_post, &body)
            .await?;
        let scheduled = post.schedule != Schedule::Now;
        tracing::info!(platform = %post.platform, scheduled, "post created");

        Ok(self.after_dispatch(response).await)
    }

    /// Publishes immediately to `platform`.
    ///
    /// # Errors
    /// Returns a validation error for blank content, otherwise the backend error.
    pub async fn post_instant(
        &mut self,
        platform: &str,
        content: &str,
    ) -> ApiResult<DispatchReceipt> {
        validate_content(content)?;

        let body = InstantBody { content, platform };
        let response = self
            .client
            .post_json(&self.client.endpoints().instant_post, &body)
            .await?;
        tracing::info!(platform, "instant post published");

        Ok(self.after_dispatch(response).await)
    }

    async fn after_dispatch(&mut self, response: Value) -> DispatchReceipt {
        let refreshed = match self.refresh().await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "post accepted but history refresh failed");
                false
            }
        };
        DispatchReceipt {
            response,
            refreshed,
        }
    }
}

fn validate_content(content: &str) -> ApiResult<()> {
    if content.trim().is_empty() {
        return Err(ApiError::validation("Post content cannot be empty"));
    }
    Ok(())
}
