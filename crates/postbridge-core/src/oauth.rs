//! Social account linking over the backend's OAuth flow.
//!
//! The flow spans an external hop to the identity provider, so the callback
//! step carries no state from the initiating step: [`decide_callback`] works
//! from the callback query alone. [`LinkOrchestrator`] wraps the decision with
//! the network exchange and the deferred redirect that follows it.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Weak;
use std::time::Duration;

use postbridge_types::Platform;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::client::ApiClient;
use crate::config::OAuthConfig;
use crate::error::{ApiResult, error_message};
use crate::navigation::{GO_BACK_TARGET, Navigator, ScheduledRedirect};

/// Message recorded when the provider returns without a code or an error.
pub const NO_CODE_MESSAGE: &str = "no authorization code received";

/// Lifecycle of one link attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkStatus {
    #[default]
    Idle,
    Initiating,
    AwaitingRedirect,
    Exchanging,
    Linked,
    Failed,
}

impl LinkStatus {
    /// Linked and Failed are terminal until acknowledged.
    pub fn is_terminal(self) -> bool {
        matches!(self, LinkStatus::Linked | LinkStatus::Failed)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkStatus::Idle => "idle",
            LinkStatus::Initiating => "initiating",
            LinkStatus::AwaitingRedirect => "awaiting_redirect",
            LinkStatus::Exchanging => "exchanging",
            LinkStatus::Linked => "linked",
            LinkStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// State of linking one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkAttempt {
    pub platform: Platform,
    pub status: LinkStatus,
    pub error_message: Option<String>,
    /// Provider URL handed to the navigator, once known
    pub auth_url: Option<String>,
}

impl LinkAttempt {
    pub fn idle(platform: Platform) -> Self {
        Self {
            platform,
            status: LinkStatus::Idle,
            error_message: None,
            auth_url: None,
        }
    }
}

/// Query parameters the identity provider appends to the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackQuery {
    /// Parses a full callback URL, a path with a query, or a bare query
    /// string (leading `?` optional).
    pub fn parse(input: &str) -> Self {
        let value = input.trim();
        if value.is_empty() {
            return Self::default();
        }

        if let Ok(url) = url::Url::parse(value) {
            return Self::from_pairs(url.query_pairs());
        }

        let query = match value.split_once('?') {
            Some((_, query)) => query,
            None => value,
        };
        let query = query.split('#').next().unwrap_or_default();
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "code" => &mut query.code,
                "state" => &mut query.state,
                "error" => &mut query.error,
                "error_description" => &mut query.error_description,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

/// What the callback query calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackDecision {
    /// Trade the code with the backend
    Exchange { code: String, state: Option<String> },
    /// Give up without a network call
    Fail { message: String, redirect_to: String },
}

/// Decides the callback transition from the query alone.
///
/// A provider `error` wins over a `code`; an empty `code` counts as absent.
pub fn decide_callback(platform: Platform, query: &CallbackQuery) -> CallbackDecision {
    if let Some(error) = &query.error {
        let description = query.error_description.as_deref().unwrap_or_default();
        return CallbackDecision::Fail {
            message: format!("{error}: {description}"),
            redirect_to: oauth_failed_target(platform),
        };
    }

    match query.code.as_deref().filter(|c| !c.is_empty()) {
        Some(code) => CallbackDecision::Exchange {
            code: code.to_string(),
            state: query.state.clone(),
        },
        None => CallbackDecision::Fail {
            message: NO_CODE_MESSAGE.to_string(),
            redirect_to: "/connect?error=no_code".to_string(),
        },
    }
}

pub fn linked_target(platform: Platform) -> String {
    format!("/dashboard?social_linked={}&success=true", platform.id())
}

pub fn oauth_failed_target(platform: Platform) -> String {
    format!("/connect?error={}_oauth_failed", platform.id())
}

pub fn connection_failed_target(platform: Platform) -> String {
    format!("/connect?error={}_connection_failed", platform.id())
}

/// Display delays before the post-callback redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectDelays {
    pub success: Duration,
    pub failure: Duration,
}

impl Default for RedirectDelays {
    fn default() -> Self {
        Self {
            success: Duration::from_millis(2000),
            failure: Duration::from_millis(3000),
        }
    }
}

impl From<&OAuthConfig> for RedirectDelays {
    fn from(config: &OAuthConfig) -> Self {
        Self {
            success: config.success_delay(),
            failure: config.failure_delay(),
        }
    }
}

/// The non-blank `auth_url` of an init response body.
fn init_auth_url(body: &Value) -> Option<&str> {
    body.get("auth_url")
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
}

/// Result of handling a callback.
#[derive(Debug)]
pub struct CallbackResolution {
    pub attempt: LinkAttempt,
    pub redirect: ScheduledRedirect,
    /// Immediate manual alternative to waiting for the redirect
    pub go_back: &'static str,
    /// Timer task; yields whether the redirect was delivered
    pub pending: JoinHandle<bool>,
}

/// Drives link attempts, one per platform.
pub struct LinkOrchestrator {
    client: ApiClient,
    navigator: Weak<dyn Navigator>,
    delays: RedirectDelays,
    attempts: HashMap<Platform, LinkAttempt>,
}

impl LinkOrchestrator {
    pub fn new(client: ApiClient, navigator: Weak<dyn Navigator>, delays: RedirectDelays) -> Self {
        Self {
            client,
            navigator,
            delays,
            attempts: HashMap::new(),
        }
    }

    /// Current attempt for `platform` (Idle when none).
    pub fn attempt(&self, platform: Platform) -> LinkAttempt {
        self.attempts
            .get(&platform)
            .cloned()
            .unwrap_or_else(|| LinkAttempt::idle(platform))
    }

    /// Consumes a terminal attempt, resetting the platform to Idle.
    ///
    /// Non-terminal attempts are left alone and `None` is returned.
    pub fn acknowledge(&mut self, platform: Platform) -> Option<LinkAttempt> {
        if self
            .attempts
            .get(&platform)
            .is_some_and(|a| a.status.is_terminal())
        {
            return self.attempts.remove(&platform);
        }
        None
    }

    fn transition(
        &mut self,
        platform: Platform,
        status: LinkStatus,
        error_message: Option<String>,
    ) -> &mut LinkAttempt {
        tracing::info!(%platform, %status, "link attempt transition");
        let attempt = self
            .attempts
            .entry(platform)
            .or_insert_with(|| LinkAttempt::idle(platform));
        attempt.status = status;
        attempt.error_message = error_message;
        attempt
    }

    /// Starts linking `platform`, replacing any earlier attempt.
    ///
    /// On success the navigator is sent to the provider's authorization URL.
    pub async fn initiate(&mut self, platform: Platform) -> LinkAttempt {
        self.attempts.insert(platform, LinkAttempt::idle(platform));
        self.transition(platform, LinkStatus::Initiating, None);

        let path = self.client.endpoints().oauth_init_for(platform);
        let response: ApiResult<Value> = self.client.get_json(&path).await;

        let auth_url = match response {
            Ok(body) => match init_auth_url(&body) {
                Some(url) => url.to_string(),
                None => {
                    let fallback = format!("{} OAuth URL not returned", platform.label());
                    let message = error_message(Some(&body), &fallback);
                    return self
                        .transition(platform, LinkStatus::Failed, Some(message))
                        .clone();
                }
            },
            Err(err) => {
                return self
                    .transition(platform, LinkStatus::Failed, Some(err.to_string()))
                    .clone();
            }
        };

        let attempt = self.transition(platform, LinkStatus::AwaitingRedirect, None);
        attempt.auth_url = Some(auth_url.clone());
        let attempt = attempt.clone();

        match self.navigator.upgrade() {
            Some(navigator) => {
                if let Err(e) = navigator.open_external(&auth_url) {
                    tracing::warn!(%platform, error = %e, "could not open authorization URL");
                }
            }
            None => tracing::debug!(%platform, "navigator gone, authorization URL not opened"),
        }

        attempt
    }

    /// Completes linking from the provider's callback query.
    ///
    /// Works whether or not this orchestrator initiated the attempt. The
    /// follow-up redirect is scheduled before returning.
    pub async fn handle_callback(
        &mut self,
        platform: Platform,
        query: &CallbackQuery,
    ) -> CallbackResolution {
        let (attempt, redirect) = match decide_callback(platform, query) {
            CallbackDecision::Fail {
                message,
                redirect_to,
            } => {
                let attempt = self
                    .transition(platform, LinkStatus::Failed, Some(message))
                    .clone();
                (attempt, ScheduledRedirect::new(redirect_to, self.delays.failure))
            }
            CallbackDecision::Exchange { code, state } => {
                self.transition(platform, LinkStatus::Exchanging, None);
                match self.exchange(platform, &code, state.as_deref()).await {
                    Ok(_) => {
                        let attempt = self.transition(platform, LinkStatus::Linked, None).clone();
                        (
                            attempt,
                            ScheduledRedirect::new(linked_target(platform), self.delays.success),
                        )
                    }
                    Err(err) => {
                        let attempt = self
                            .transition(platform, LinkStatus::Failed, Some(err.to_string()))
                            .clone();
                        (
                            attempt,
                            ScheduledRedirect::new(
                                connection_failed_target(platform),
                                self.delays.failure,
                            ),
                        )
                    }
                }
            }
        };

        let pending = redirect.clone().spawn(Weak::clone(&self.navigator));
        CallbackResolution {
            attempt,
            redirect,
            go_back: GO_BACK_TARGET,
            pending,
        }
    }

    async fn exchange(
        &self,
        platform: Platform,
        code: &str,
        state: Option<&str>,
    ) -> ApiResult<Value> {
        let path = self.client.endpoints().oauth_callback_for(platform);
        let mut query = vec![("code", code)];
        if let Some(state) = state {
            query.push(("state", state));
        }
        self.client.get_json_with_query(&path, &query).await
    }
}

/// Probes the backend's OAuth configuration status.
///
/// # Errors
/// Returns the backend error when the probe endpoint is unavailable.
pub async fn oauth_status(client: &ApiClient) -> ApiResult<Value> {
    client.get_json(&client.endpoints().oauth_status).await
}

/// Banner-worthy result carried in a landing page's query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked {
        platform: String,
    },
    Failed {
        platform: Option<String>,
        reason: String,
    },
}

impl LinkOutcome {
    /// Reads `social_linked`/`success`/`error` from a landing URL or query.
    pub fn from_query(input: &str) -> Option<Self> {
        let value = input.trim();
        let query = match url::Url::parse(value) {
            Ok(url) => url.query().unwrap_or_default().to_string(),
            Err(_) => value
                .split_once('?')
                .map_or(value, |(_, q)| q)
                .to_string(),
        };

        let mut linked = None;
        let mut success = None;
        let mut error = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "social_linked" => linked = Some(value.into_owned()),
                "success" => success = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                _ => {}
            }
        }

        match (linked, success.as_deref(), error) {
            (Some(platform), Some("true"), _) => Some(LinkOutcome::Linked { platform }),
            (Some(platform), _, Some(reason)) => Some(LinkOutcome::Failed {
                platform: Some(platform),
                reason,
            }),
            (None, _, Some(reason)) => {
                let platform = Platform::all()
                    .iter()
                    .find(|p| reason.starts_with(&format!("{}_", p.id())))
                    .map(|p| p.id().to_string());
                Some(LinkOutcome::Failed { platform, reason })
            }
            _ => None,
        }
    }
}

impl fmt::Display for LinkOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkOutcome::Linked { platform } => {
                let label = Platform::from_id(platform).map_or(platform.as_str(), |p| p.label());
                write!(f, "{label} account connected successfully!")
            }
            LinkOutcome::Failed {
                platform: Some(platform),
                reason,
            } => write!(f, "Failed to connect {platform}: {reason}"),
            LinkOutcome::Failed {
                platform: None,
                reason,
            } => write!(f, "Connection failed: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::tempdir;

    use super::*;
    use crate::config::EndpointsConfig;
    use crate::navigation::testing::RecordingNavigator;
    use crate::session::SessionStore;

    fn query(pairs: &[(&str, &str)]) -> CallbackQuery {
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        CallbackQuery::parse(&encoded)
    }

    #[test]
    fn test_parse_accepts_url_path_and_bare_query() {
        let expected = CallbackQuery {
            code: Some("abc".to_string()),
            state: Some("xyz".to_string()),
            ..Default::default()
        };
        assert_eq!(
            CallbackQuery::parse("http://localhost:5173/auth/facebook/callback?code=abc&state=xyz"),
            expected
        );
        assert_eq!(
            CallbackQuery::parse("/auth/facebook/callback?code=abc&state=xyz"),
            expected
        );
        assert_eq!(CallbackQuery::parse("?code=abc&state=xyz"), expected);
        assert_eq!(CallbackQuery::parse("code=abc&state=xyz"), expected);
        assert_eq!(CallbackQuery::parse("  "), CallbackQuery::default());
    }

    #[test]
    fn test_provider_error_fails_with_description() {
        let q = query(&[
            ("error", "access_denied"),
            ("error_description", "user cancelled"),
        ]);
        assert_eq!(
            decide_callback(Platform::Facebook, &q),
            CallbackDecision::Fail {
                message: "access_denied: user cancelled".to_string(),
                redirect_to: "/connect?error=facebook_oauth_failed".to_string(),
            }
        );
    }

    #[test]
    fn test_provider_error_without_description() {
        let q = query(&[("error", "server_error"), ("code", "abc")]);
        let CallbackDecision::Fail { message, .. } = decide_callback(Platform::Instagram, &q) else {
            panic!("error must win over code");
        };
        assert_eq!(message, "server_error: ");
    }

    #[test]
    fn test_missing_or_empty_code() {
        for q in [CallbackQuery::default(), query(&[("code", ""), ("state", "s")])] {
            assert_eq!(
                decide_callback(Platform::Instagram, &q),
                CallbackDecision::Fail {
                    message: NO_CODE_MESSAGE.to_string(),
                    redirect_to: "/connect?error=no_code".to_string(),
                }
            );
        }
    }

    #[test]
    fn test_code_leads_to_exchange() {
        let q = query(&[("code", "abc"), ("state", "xyz")]);
        assert_eq!(
            decide_callback(Platform::Facebook, &q),
            CallbackDecision::Exchange {
                code: "abc".to_string(),
                state: Some("xyz".to_string()),
            }
        );
    }

    #[test]
    fn test_link_outcome_from_query() {
        assert_eq!(
            LinkOutcome::from_query("/dashboard?social_linked=instagram&success=true"),
            Some(LinkOutcome::Linked {
                platform: "instagram".to_string()
            })
        );
        assert_eq!(
            LinkOutcome::from_query("?social_linked=facebook&error=token%20expired"),
            Some(LinkOutcome::Failed {
                platform: Some("facebook".to_string()),
                reason: "token expired".to_string(),
            })
        );
        assert_eq!(
            LinkOutcome::from_query("http://localhost/connect?error=facebook_connection_failed"),
            Some(LinkOutcome::Failed {
                platform: Some("facebook".to_string()),
                reason: "facebook_connection_failed".to_string(),
            })
        );
        assert_eq!(LinkOutcome::from_query("/dashboard"), None);
    }

    #[test]
    fn test_link_outcome_display() {
        let linked = LinkOutcome::Linked {
            platform: "facebook".to_string(),
        };
        assert_eq!(linked.to_string(), "Facebook account connected successfully!");

        let failed = LinkOutcome::Failed {
            platform: None,
            reason: "no_code".to_string(),
        };
        assert_eq!(failed.to_string(), "Connection failed: no_code");
    }

    /// A callback error never reaches the network: the client points at an
    /// unroutable address and the attempt still resolves immediately.
    #[tokio::test(start_paused = true)]
    async fn test_failed_callback_schedules_redirect() {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("session.json")).unwrap());
        let client =
            ApiClient::new("http://127.0.0.1:9", EndpointsConfig::default(), store, None).unwrap();
        let navigator = Arc::new(RecordingNavigator::default());
        let weak: Weak<dyn Navigator> = Arc::downgrade(&navigator) as Weak<dyn Navigator>;
        let mut orchestrator = LinkOrchestrator::new(client, weak, RedirectDelays::default());

        let q = query(&[
            ("error", "access_denied"),
            ("error_description", "user cancelled"),
        ]);
        let resolution = orchestrator.handle_callback(Platform::Instagram, &q).await;

        assert_eq!(resolution.attempt.status, LinkStatus::Failed);
        assert_eq!(
            resolution.attempt.error_message.as_deref(),
            Some("access_denied: user cancelled")
        );
        assert_eq!(
            resolution.redirect,
            ScheduledRedirect::new(
                "/connect?error=instagram_oauth_failed",
                Duration::from_millis(3000)
            )
        );
        assert_eq!(resolution.go_back, "/connect");

        assert!(resolution.pending.await.unwrap());
        assert_eq!(
            *navigator.internal.lock().unwrap(),
            vec!["/connect?error=instagram_oauth_failed"]
        );

        let acknowledged = orchestrator.acknowledge(Platform::Instagram).unwrap();
        assert_eq!(acknowledged.status, LinkStatus::Failed);
        assert_eq!(
            orchestrator.attempt(Platform::Instagram).status,
            LinkStatus::Idle
        );
    }
}
