//! Cached set of linked social accounts.

use postbridge_types::{Platform, SocialAccount};
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ApiResult;

/// Snapshot of the user's linked accounts, replaced wholesale on refresh.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    client: ApiClient,
    accounts: Vec<SocialAccount>,
}

impl AccountRegistry {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            accounts: Vec::new(),
        }
    }

    /// Refetches the linked accounts and replaces the cached set.
    ///
    /// On failure the previous snapshot is kept.
    ///
    /// # Errors
    /// Returns the backend or transport error.
    pub async fn refresh(&mut self) -> ApiResult<&[SocialAccount]> {
        let accounts: Vec<SocialAccount> =
            self.client.get_json(&self.client.endpoints().accounts).await?;
        tracing::debug!(count = accounts.len(), "linked accounts refreshed");
        self.accounts = accounts;
        Ok(&self.accounts)
    }

    /// Accounts as of the last refresh, in backend order.
    pub fn list(&self) -> &[SocialAccount] {
        &self.accounts
    }

    pub fn find_by_platform(&self, platform: &str) -> Option<&SocialAccount> {
        self.accounts.iter().find(|a| a.is_platform(platform))
    }

    /// Distinct platform tags in first-seen order.
    pub fn connected_platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = Vec::new();
        for account in &self.accounts {
            if !platforms.contains(&account.platform) {
                platforms.push(account.platform.clone());
            }
        }
        platforms
    }

    /// Asks the backend to unlink `platform`. The cached set is not touched;
    /// call [`AccountRegistry::refresh`] afterwards.
    ///
    /// # Errors
    /// Returns the backend or transport error.
    pub async fn unlink(&self, platform: Platform) -> ApiResult<Value> {
        let path = self.client.endpoints().unlink_account_for(platform);
        let response = self.client.delete_json(&path).await?;
        tracing::info!(%platform, "account unlinked");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::tempdir;

    use super::*;
    use crate::config::EndpointsConfig;
    use crate::session::SessionStore;

    fn registry_with(accounts: Value) -> (tempfile::TempDir, AccountRegistry) {
        let dir = tempdir().unwrap();
        let store = Arc::new(SessionStore::open(dir.path().join("session.json")).unwrap());
        let client =
            ApiClient::new("http://localhost:8000", EndpointsConfig::default(), store, None)
                .unwrap();
        let mut registry = AccountRegistry::new(client);
        registry.accounts = serde_json::from_value(accounts).unwrap();
        (dir, registry)
    }

    #[test]
    fn test_find_by_platform_returns_first_match() {
        let (_dir, registry) = registry_with(json!([
            {"id": 1, "platform": "facebook", "platform_user_id": "a"},
            {"id": 2, "platform": "facebook", "platform_user_id": "b"},
        ]));
        assert_eq!(registry.find_by_platform("facebook").unwrap().id, "1");
        assert!(registry.find_by_platform("instagram").is_none());
    }

    #[test]
    fn test_connected_platforms_dedupes_in_order() {
        let (_dir, registry) = registry_with(json!([
            {"id": 1, "platform": "instagram"},
            {"id": 2, "platform": "facebook"},
            {"id": 3, "platform": "instagram"},
        ]));
        assert_eq!(registry.connected_platforms(), vec!["instagram", "facebook"]);
    }

    #[test]
    fn test_empty_registry() {
        let (_dir, registry) = registry_with(json!([]));
        assert!(registry.list().is_empty());
        assert!(registry.connected_platforms().is_empty());
    }
}
