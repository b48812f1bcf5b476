//! CLI command handlers.

pub mod accounts;
pub mod auth;
pub mod config;
pub mod oauth;
pub mod posts;
