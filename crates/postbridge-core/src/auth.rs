//! Account authentication calls: login, signup, current user, logout.

use std::sync::Arc;

use anyhow::Result;
use postbridge_types::{CurrentUser, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::{ApiError, ApiResult};
use crate::guard::{Route, RouteGuard};

/// Token pair returned by the login endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Logs in and stores the issued session.
///
/// The session store is only written after the backend accepts the
/// credentials; any failure leaves the previous session untouched.
///
/// # Errors
/// Returns an [`ApiError`] (wrapped) for rejected or failed requests, or a
/// filesystem error if the session cannot be persisted.
pub async fn login(client: &ApiClient, username: &str, password: &str) -> Result<Session> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(ApiError::validation("Username and password are required").into());
    }

    let tokens: TokenResponse = client
        .post_form(
            &client.endpoints().login,
            &[("username", username), ("password", password)],
        )
        .await?;

    client
        .session()
        .set_session(&tokens.access_token, tokens.refresh_token.as_deref())?;
    tracing::info!(username, "logged in");

    Ok(Session::new(tokens.access_token, tokens.refresh_token))
}

/// Registration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub whatsapp_number: String,
    pub niche: String,
    pub email: String,
}

impl SignupRequest {
    /// Trims every field, lowercases the email and tidies the niche list.
    pub fn normalized(&self) -> Self {
        let niche = self
            .niche
            .split(',')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(",");

        Self {
            username: self.username.trim().to_string(),
            password: self.password.trim().to_string(),
            whatsapp_number: self.whatsapp_number.trim().to_string(),
            niche,
            email: self.email.trim().to_lowercase(),
        }
    }

    /// Checks that every field is present.
    ///
    /// # Errors
    /// Returns a validation error naming the first missing field.
    pub fn validate(&self) -> ApiResult<()> {
        let fields = [
            ("username", &self.username),
            ("password", &self.password),
            ("whatsapp_number", &self.whatsapp_number),
            ("niche", &self.niche),
            ("email", &self.email),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ApiError::validation(format!("{name} is required")));
            }
        }
        Ok(())
    }
}

/// Registers a new account. Does not log in.
///
/// # Errors
/// Returns a validation error for missing fields, otherwise the backend error.
pub async fn signup(client: &ApiClient, request: &SignupRequest) -> ApiResult<Value> {
    request.validate()?;
    let body = request.normalized();
    let response = client.post_json(&client.endpoints().signup, &body).await?;
    tracing::info!(username = %body.username, "account registered");
    Ok(response)
}

/// Fetches the authenticated user's profile.
///
/// # Errors
/// Returns the backend error (401 when the token is missing or stale).
pub async fn current_user(client: &ApiClient) -> ApiResult<CurrentUser> {
    client.get_json(&client.endpoints().me).await
}

/// Navigates to the logout route, which clears the stored session. Returns
/// true if a session was present.
///
/// # Errors
/// Returns an error if the session file cannot be removed.
pub fn logout(client: &ApiClient) -> Result<bool> {
    let had_session = client.session().session().is_some();
    let decision = RouteGuard::new(Arc::clone(client.session())).navigate(&Route::Logout.path())?;
    tracing::debug!(?decision, had_session, "logged out");
    Ok(had_session)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SignupRequest {
        SignupRequest {
            username: "  alice ".to_string(),
            password: " pw ".to_string(),
            whatsapp_number: " +15550100 ".to_string(),
            niche: " fitness ,  food,travel ".to_string(),
            email: " Alice@Example.COM ".to_string(),
        }
    }

    #[test]
    fn test_signup_normalization() {
        let normalized = request().normalized();
        assert_eq!(normalized.username, "alice");
        assert_eq!(normalized.password, "pw");
        assert_eq!(normalized.whatsapp_number, "+15550100");
        assert_eq!(normalized.niche, "fitness,food,travel");
        assert_eq!(normalized.email, "alice@example.com");
    }

    #[test]
    fn test_signup_requires_every_field() {
        assert!(request().validate().is_ok());

        let missing = SignupRequest {
            whatsapp_number: "   ".to_string(),
            ..request()
        };
        let err = missing.validate().unwrap_err();
        assert_eq!(err.kind, crate::ApiErrorKind::Validation);
        assert_eq!(err.to_string(), "whatsapp_number is required");
    }
}
