//! Route table and the authentication guard in front of it.

use std::sync::Arc;

use anyhow::Result;
use postbridge_types::Platform;

use crate::session::SessionStore;

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/login";

/// Navigation targets known to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Connect,
    Contact,
    Dashboard,
    Login,
    Logout,
    Signup,
    /// Identity-provider landing page for one platform
    OAuthCallback(Platform),
    Unknown(String),
}

impl Route {
    /// Maps a path to a route. Query strings and trailing slashes are ignored.
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');

        match trimmed {
            "" => Route::Home,
            "/connect" => Route::Connect,
            "/contact" => Route::Contact,
            "/dashboard" => Route::Dashboard,
            "/login" => Route::Login,
            "/logout" => Route::Logout,
            "/signup" => Route::Signup,
            other => other
                .strip_prefix("/auth/")
                .and_then(|rest| rest.strip_suffix("/callback"))
                .and_then(Platform::from_id)
                .map_or_else(|| Route::Unknown(path.to_string()), Route::OAuthCallback),
        }
    }

    /// True for routes that need a session to render.
    pub fn is_guarded(&self) -> bool {
        matches!(
            self,
            Route::Home | Route::Connect | Route::Contact | Route::Dashboard
        )
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Connect => "/connect".to_string(),
            Route::Contact => "/contact".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Login => "/login".to_string(),
            Route::Logout => "/logout".to_string(),
            Route::Signup => "/signup".to_string(),
            Route::OAuthCallback(platform) => format!("/auth/{}/callback", platform.id()),
            Route::Unknown(path) => path.clone(),
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect(String),
}

/// Gates guarded routes on the presence of an access token.
///
/// No validity check is made; a stale token passes and the first backend
/// call reports it.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: Arc<SessionStore>,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }

    pub fn is_authorized(&self) -> bool {
        self.session.access_token().is_some()
    }

    pub fn check(&self, route: &Route) -> GuardDecision {
        if route.is_guarded() && !self.is_authorized() {
            tracing::debug!(route = %route.path(), "guarded route without session");
            return GuardDecision::Redirect(LOGIN_PATH.to_string());
        }
        GuardDecision::Render
    }

    /// Resolves a navigation to `path`, performing the logout side effect.
    ///
    /// # Errors
    /// Returns an error if logging out fails to remove the session file.
    pub fn navigate(&self, path: &str) -> Result<GuardDecision> {
        let route = Route::parse(path);
        if route == Route::Logout {
            self.session.clear()?;
            return Ok(GuardDecision::Redirect(LOGIN_PATH.to_string()));
        }
        Ok(self.check(&route))
    }
}
