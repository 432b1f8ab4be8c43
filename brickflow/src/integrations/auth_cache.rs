//! Cached OAuth2 token data.

use super::storage::KeyValueStorage;
use crate::errors::{BrickflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Token data returned by a provider, plus provider-specific fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthData(pub Map<String, Value>);

impl AuthData {
    /// Returns the access token.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.0.get("access_token").and_then(Value::as_str)
    }

    /// Returns the refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.0.get("refresh_token").and_then(Value::as_str)
    }

    /// Returns a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for AuthData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Token cache keyed by integration config id, stored under one storage key.
pub struct AuthCache {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    write_lock: Mutex<()>,
}

impl fmt::Debug for AuthCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCache")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl AuthCache {
    /// Creates a cache stored under `key`.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn entries(&self) -> Result<Map<String, Value>> {
        match self.storage.get(&self.key).await? {
            Some(Value::Object(map)) => Ok(map),
            Some(Value::Null) | None => Ok(Map::new()),
            Some(_) => Err(BrickflowError::internal(format!(
                "Cached auth under {} is not a JSON object",
                self.key
            ))),
        }
    }

    /// Returns cached data for `config_id`.
    pub async fn get(&self, config_id: &str) -> Result<Option<AuthData>> {
        match self.entries().await?.remove(config_id) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Replaces the cached data for `config_id`.
    pub async fn set(&self, config_id: &str, data: AuthData) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries().await?;
        entries.insert(config_id.to_string(), Value::Object(data.0));
        self.storage.set(&self.key, Value::Object(entries)).await
    }

    /// Drops the cached data for `config_id`.
    pub async fn remove(&self, config_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries().await?;
        if entries.remove(config_id).is_some() {
            self.storage.set(&self.key, Value::Object(entries)).await?;
        }
        Ok(())
    }

    /// Drops every cached entry.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(&self.key).await
    }

    /// Returns the `Authorization` header value for `config_id`.
    pub async fn bearer_header(&self, config_id: &str) -> Result<String> {
        let data = self.get(config_id).await?;
        data.as_ref()
            .and_then(AuthData::access_token)
            .map(|token| format!("Bearer {token}"))
            .ok_or_else(|| BrickflowError::oauth2(format!("No access token cached for {config_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{InMemoryStorage, OAUTH2_STORAGE_KEY};
    use serde_json::json;

    fn data(value: Value) -> AuthData {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_entries_are_keyed_by_config_id() {
        let storage = Arc::new(InMemoryStorage::new());
        let cache = AuthCache::new(storage.clone(), OAUTH2_STORAGE_KEY);

        cache.set("a", data(json!({"access_token": "ta"}))).await.unwrap();
        cache.set("b", data(json!({"access_token": "tb"}))).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap().unwrap().access_token(), Some("ta"));
        assert_eq!(cache.bearer_header("b").await.unwrap(), "Bearer tb");
        assert_eq!(
            storage.get(OAUTH2_STORAGE_KEY).await.unwrap().unwrap()["a"]["access_token"],
            "ta"
        );

        cache.remove("a").await.unwrap();
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(cache.bearer_header("a").await.is_err());

        cache.clear().await.unwrap();
        assert_eq!(cache.get("b").await.unwrap(), None);
    }
}
