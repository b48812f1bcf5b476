//! HTTP gateway to the backend.
//!
//! Every request goes through [`ApiClient`], which attaches the current access
//! token (when one exists) and turns failures into [`ApiError`]s.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{Config, EndpointsConfig};
use crate::error::{ApiError, ApiResult};
use crate::session::SessionStore;

/// Standard User-Agent header for postbridge requests.
pub const USER_AGENT: &str = concat!("postbridge/", env!("CARGO_PKG_VERSION"));

/// Thin authenticated client for the backend contract.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    endpoints: EndpointsConfig,
    session: Arc<SessionStore>,
}

impl ApiClient {
    /// Creates a client for `base_url`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        base_url: &str,
        endpoints: EndpointsConfig,
        session: Arc<SessionStore>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
            session,
        })
    }

    /// Creates a client from loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the client cannot be built.
    pub fn from_config(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let base_url = config.effective_base_url()?;
        Self::new(
            &base_url,
            config.endpoints.clone(),
            session,
            config.timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }

    /// The session store this client reads tokens from.
    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Joins a backend path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match self.session.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GETs `path` and decodes the JSON response.
    ///
    /// # Errors
    /// Returns an [`ApiError`] for transport failures, error statuses, or
    /// undecodable bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.get_json_with_query(path, &[]).await
    }

    /// GETs `path` with URL-encoded query parameters.
    ///
    /// # Errors
    /// See [`ApiClient::get_json`].
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<T> {
        let mut url = self.url(path);
        if !query.is_empty() {
            let encoded: String = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url = format!("{url}?{encoded}");
        }
        self.send(self.request(Method::GET, &url), "GET", path)
            .await
    }

    /// POSTs a JSON body to `path`.
    ///
    /// # Errors
    /// See [`ApiClient::get_json`].
    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let builder = self.request(Method::POST, &self.url(path)).json(body);
        self.send(builder, "POST", path).await
    }

    /// POSTs an `application/x-www-form-urlencoded` body to `path`.
    ///
    /// # Errors
    /// See [`ApiClient::get_json`].
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> ApiResult<T> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let builder = self
            .request(Method::POST, &self.url(path))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body);
        self.send(builder, "POST", path).await
    }

    /// DELETEs `path`.
    ///
    /// # Errors
    /// See [`ApiClient::get_json`].
    pub async fn delete_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let builder = self.request(Method::DELETE, &self.url(path));
        self.send(builder, "DELETE", path).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        method: &str,
        path: &str,
    ) -> ApiResult<T> {
        tracing::debug!(method, path, "backend request");

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(method, path, error = %e, "request failed before a response");
            ApiError::transport(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(ApiError::from)?;

        if !status.is_success() {
            let err = ApiError::backend(status.as_u16(), &body);
            tracing::debug!(method, path, status = status.as_u16(), message = %err, "backend error");
            return Err(err);
        }

        let value = success_body(body, path);

        serde_json::from_value(value).map_err(|e| {
            ApiError::transport(format!("Unexpected response shape from {path}: {e}"))
        })
    }
}

/// Decodes a 2xx body. Empty is `null`; text that is not JSON is kept as a
/// JSON string, since the backend already accepted the request.
fn success_body(body: String, path: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(path, error = %e, "non-JSON success body kept as text");
            Value::String(body)
        }
    }
}
