//! Client core for the postbridge social-posting backend.
//!
//! Owns the session lifecycle, the OAuth account-linking state machine, the
//! linked-account registry and post dispatch. Presentation layers consume the
//! state exposed here and supply a [`navigation::Navigator`].

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod navigation;
pub mod oauth;
pub mod registry;
pub mod session;

pub use client::ApiClient;
pub use error::{ApiError, ApiErrorKind, ApiResult};
pub use session::SessionStore;
