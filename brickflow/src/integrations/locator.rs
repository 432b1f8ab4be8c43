//! Integration configuration lookup.

use super::auth_cache::AuthCache;
use crate::errors::{BrickflowError, Result};
use crate::messenger::methods::{GET_CACHED_AUTH, LOCATE_SERVICE};
use crate::messenger::{MemoizeUntilSettled, Messenger};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An integration configuration with secrets removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedConfig {
    /// Config id.
    pub id: String,
    /// Integration definition id, e.g. `@acme/google-sheets`.
    pub integration_id: String,
    /// Non-secret configuration values.
    #[serde(default)]
    pub config: Value,
}

/// Finds integration configurations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IntegrationLocator: Send + Sync {
    /// Finds the config `config_id` of `integration_id`, or its first
    /// config when `config_id` is `None`.
    async fn locate(&self, integration_id: String, config_id: Option<String>) -> Result<SanitizedConfig>;

    /// Reloads local and remote configurations.
    async fn refresh(&self) -> Result<()>;

    /// Reloads local configurations only.
    async fn refresh_local(&self) -> Result<()>;
}

/// Locates a config, refreshing local configurations once if it is missing.
pub async fn locate_with_retry(
    locator: &dyn IntegrationLocator,
    integration_id: &str,
    config_id: Option<&str>,
) -> Result<SanitizedConfig> {
    let first = locator
        .locate(integration_id.to_string(), config_id.map(ToString::to_string))
        .await;
    match first {
        Err(BrickflowError::MissingConfiguration { .. }) => {
            debug!(integration_id, ?config_id, "Configuration missing, refreshing local configurations");
            locator.refresh_local().await?;
            locator
                .locate(integration_id.to_string(), config_id.map(ToString::to_string))
                .await
        }
        other => other,
    }
}

type LocateKey = (String, Option<String>);

/// Wraps a locator so concurrent identical calls share one request.
pub struct MemoizedLocator {
    inner: Arc<dyn IntegrationLocator>,
    locates: MemoizeUntilSettled<LocateKey, SanitizedConfig>,
    refreshes: MemoizeUntilSettled<bool, ()>,
}

impl fmt::Debug for MemoizedLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoizedLocator")
            .field("locates", &self.locates)
            .field("refreshes", &self.refreshes)
            .finish_non_exhaustive()
    }
}

impl MemoizedLocator {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: Arc<dyn IntegrationLocator>) -> Self {
        Self {
            inner,
            locates: MemoizeUntilSettled::new(),
            refreshes: MemoizeUntilSettled::new(),
        }
    }
}

#[async_trait]
impl IntegrationLocator for MemoizedLocator {
    async fn locate(&self, integration_id: String, config_id: Option<String>) -> Result<SanitizedConfig> {
        let inner = Arc::clone(&self.inner);
        let key = (integration_id.clone(), config_id.clone());
        self.locates
            .run(key, move || async move { inner.locate(integration_id, config_id).await })
            .await
    }

    async fn refresh(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.refreshes
            .run(true, move || async move { inner.refresh().await })
            .await
    }

    async fn refresh_local(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.refreshes
            .run(false, move || async move { inner.refresh_local().await })
            .await
    }
}

/// A locator over a fixed set of configurations.
#[derive(Debug, Default)]
pub struct InMemoryLocator {
    configs: RwLock<Vec<SanitizedConfig>>,
}

impl InMemoryLocator {
    /// Creates an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a configuration, replacing one with the same id.
    pub fn add(&self, config: SanitizedConfig) {
        let mut configs = self.configs.write();
        configs.retain(|existing| existing.id != config.id);
        configs.push(config);
    }
}

#[async_trait]
impl IntegrationLocator for InMemoryLocator {
    async fn locate(&self, integration_id: String, config_id: Option<String>) -> Result<SanitizedConfig> {
        self.configs
            .read()
            .iter()
            .find(|c| {
                c.integration_id == integration_id
                    && config_id.as_deref().map_or(true, |id| c.id == id)
            })
            .cloned()
            .ok_or_else(|| BrickflowError::missing_configuration(integration_id, config_id))
    }

    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    async fn refresh_local(&self) -> Result<()> {
        Ok(())
    }
}

/// Registers `LOCATE_SERVICE` and `GET_CACHED_AUTH` on the background
/// messenger.
pub fn register_integration_methods(
    messenger: &Messenger,
    locator: Arc<dyn IntegrationLocator>,
    cache: Arc<AuthCache>,
) -> Result<()> {
    messenger.register_method(
        LOCATE_SERVICE,
        move |(integration_id, config_id): (String, Option<String>)| {
            let locator = Arc::clone(&locator);
            async move { locate_with_retry(locator.as_ref(), &integration_id, config_id.as_deref()).await }
        },
    )?;

    messenger.register_method(GET_CACHED_AUTH, move |(config_id,): (String,)| {
        let cache = Arc::clone(&cache);
        async move { cache.get(&config_id).await }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MessengerConfig;
    use crate::integrations::{AuthData, InMemoryStorage, OAUTH2_STORAGE_KEY};
    use crate::messenger::{MessageBus, Target};
    use mockall::Sequence;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn sheets(id: &str) -> SanitizedConfig {
        SanitizedConfig {
            id: id.to_string(),
            integration_id: "@acme/sheets".to_string(),
            config: json!({"spreadsheetId": id}),
        }
    }

    #[tokio::test]
    async fn test_retry_after_local_refresh() {
        let mut locator = MockIntegrationLocator::new();
        let mut seq = Sequence::new();
        locator
            .expect_locate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, config| Err(BrickflowError::missing_configuration(id, config)));
        locator
            .expect_refresh_local()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        locator
            .expect_locate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(sheets("c1")));

        let config = locate_with_retry(&locator, "@acme/sheets", Some("c1")).await.unwrap();
        assert_eq!(config.id, "c1");
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let mut locator = MockIntegrationLocator::new();
        locator
            .expect_locate()
            .times(1)
            .returning(|_, _| Err(BrickflowError::transport("offline")));
        locator.expect_refresh_local().times(0);

        let err = locate_with_retry(&locator, "@acme/sheets", None).await.unwrap_err();
        assert!(err.is_transport_error());
    }

    #[derive(Default)]
    struct SlowLocator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IntegrationLocator for SlowLocator {
        async fn locate(&self, _integration_id: String, _config_id: Option<String>) -> Result<SanitizedConfig> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(sheets("c1"))
        }

        async fn refresh(&self) -> Result<()> {
            Ok(())
        }

        async fn refresh_local(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_memoized_locator_shares_inflight_calls() {
        let inner = Arc::new(SlowLocator::default());
        let locator = MemoizedLocator::new(Arc::clone(&inner) as Arc<dyn IntegrationLocator>);

        let (a, b) = tokio::join!(
            locator.locate("@acme/sheets".to_string(), None),
            locator.locate("@acme/sheets".to_string(), None),
        );
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);

        locator.locate("@acme/sheets".to_string(), None).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_in_memory_locator() {
        let locator = InMemoryLocator::new();
        locator.add(sheets("c1"));
        locator.add(sheets("c2"));

        assert_eq!(locator.locate("@acme/sheets".to_string(), None).await.unwrap().id, "c1");
        assert_eq!(
            locator.locate("@acme/sheets".to_string(), Some("c2".to_string())).await.unwrap().id,
            "c2"
        );
        let err = locator.locate("@acme/other".to_string(), None).await.unwrap_err();
        assert_eq!(err.name(), "MissingConfigurationError");
    }

    #[tokio::test]
    async fn test_messenger_methods() {
        let config = MessengerConfig {
            call_timeout_ms: 500,
            ready_timeout_ms: 200,
            ready_poll_interval_ms: 10,
        };
        let bus = Arc::new(MessageBus::new());
        let background = Messenger::attach(Arc::clone(&bus), Target::Background, None, config.clone()).unwrap();
        let locator = Arc::new(InMemoryLocator::new());
        locator.add(sheets("c1"));
        let cache = Arc::new(AuthCache::new(Arc::new(InMemoryStorage::new()), OAUTH2_STORAGE_KEY));
        cache
            .set("c1", AuthData(json!({"access_token": "at"}).as_object().cloned().unwrap()))
            .await
            .unwrap();
        register_integration_methods(&background, locator, cache).unwrap();

        let tab = Messenger::attach(bus, Target::top_frame(3), None, config).unwrap();
        let located: SanitizedConfig = tab
            .call_method(Target::Background, LOCATE_SERVICE, ("@acme/sheets", Some("c1")))
            .await
            .unwrap();
        assert_eq!(located, sheets("c1"));

        let auth: Option<AuthData> = tab
            .call_method(Target::Background, GET_CACHED_AUTH, ("c1",))
            .await
            .unwrap();
        assert_eq!(auth.and_then(|a| a.access_token().map(ToString::to_string)), Some("at".to_string()));

        let missing: Option<AuthData> = tab
            .call_method(Target::Background, GET_CACHED_AUTH, ("c9",))
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
