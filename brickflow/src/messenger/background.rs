//! Background routing of brick runs between tabs.

use super::context::{SenderInfo, TabId, Target};
use super::endpoint::Messenger;
use super::linkage::TabLinkage;
use super::methods::{
    OPEN_TAB, REQUEST_RUN_IN_BROADCAST, REQUEST_RUN_IN_OPENER, REQUEST_RUN_IN_TARGET,
    REQUEST_RUN_IN_TOP, RUN_BRICK,
};
use super::permissions::HostPermissions;
use crate::errors::{BrickflowError, Result};
use crate::pipeline::RemoteBrickRequest;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opens browser tabs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabLauncher: Send + Sync {
    /// Opens `url` from `opener` and returns the new tab's id.
    async fn open_tab(&self, url: String, opener: TabId) -> Result<TabId>;
}

/// Outcome of a broadcast run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResult {
    /// Results of the tabs that succeeded.
    pub fulfilled: Vec<Value>,
    /// Number of tabs that failed.
    pub rejected: usize,
}

/// Background services behind the `REQUEST_RUN_IN_*` and `OPEN_TAB` methods.
pub struct BackgroundRouter {
    messenger: Messenger,
    linkage: Arc<TabLinkage>,
    permissions: HostPermissions,
    launcher: Arc<dyn TabLauncher>,
}

impl fmt::Debug for BackgroundRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundRouter")
            .field("messenger", &self.messenger)
            .field("linkage", &self.linkage)
            .finish_non_exhaustive()
    }
}

fn sender_tab(sender: &SenderInfo, method: &str) -> Result<TabId> {
    sender.tab_id().ok_or_else(|| {
        BrickflowError::business(format!("{method} must be called from a tab, not {}", sender.target))
    })
}

impl BackgroundRouter {
    /// Creates a router on the background `messenger`.
    #[must_use]
    pub fn new(
        messenger: Messenger,
        linkage: Arc<TabLinkage>,
        permissions: HostPermissions,
        launcher: Arc<dyn TabLauncher>,
    ) -> Self {
        Self {
            messenger,
            linkage,
            permissions,
            launcher,
        }
    }

    /// Returns the tab linkage.
    #[must_use]
    pub fn linkage(&self) -> &Arc<TabLinkage> {
        &self.linkage
    }

    /// Opens `url` and links the new tab to the sender's tab.
    pub async fn open_tab(&self, sender: &SenderInfo, url: String) -> Result<TabId> {
        let opener = sender_tab(sender, OPEN_TAB.name)?;
        let child = self.launcher.open_tab(url, opener).await?;
        self.linkage.link_child_tab(opener, child);
        debug!(opener, child, "Opened linked tab");
        Ok(child)
    }

    /// Runs `request` in the tab that opened the sender's tab.
    pub async fn request_run_in_opener(&self, sender: &SenderInfo, request: RemoteBrickRequest) -> Result<Value> {
        let tab = sender_tab(sender, REQUEST_RUN_IN_OPENER.name)?;
        let opener = self
            .linkage
            .opener_of(tab)
            .ok_or_else(|| BrickflowError::business(format!("Tab {tab} has no known opener")))?;
        self.run_in(Target::top_frame(opener), request).await
    }

    /// Runs `request` in the tab most recently opened by the sender's tab.
    pub async fn request_run_in_target(&self, sender: &SenderInfo, request: RemoteBrickRequest) -> Result<Value> {
        let tab = sender_tab(sender, REQUEST_RUN_IN_TARGET.name)?;
        let target = self
            .linkage
            .target_of(tab)
            .ok_or_else(|| BrickflowError::business(format!("Tab {tab} has not opened a tab")))?;
        self.run_in(Target::top_frame(target), request).await
    }

    /// Runs `request` in the top frame of the sender's tab.
    pub async fn request_run_in_top(&self, sender: &SenderInfo, request: RemoteBrickRequest) -> Result<Value> {
        let tab = sender_tab(sender, REQUEST_RUN_IN_TOP.name)?;
        self.run_in(Target::top_frame(tab), request).await
    }

    /// Runs `request` in the top frame of every permitted tab except the
    /// sender's.
    ///
    /// Failed tabs are counted and logged; they never fail the call.
    pub async fn request_run_in_broadcast(
        &self,
        sender: &SenderInfo,
        request: RemoteBrickRequest,
    ) -> Result<BroadcastResult> {
        let sender_tab = sender.tab_id();
        let targets: Vec<Target> = self
            .messenger
            .bus()
            .attached()
            .into_iter()
            .filter(|(target, url)| {
                target.is_top_frame()
                    && target.tab_id() != sender_tab
                    && url.as_deref().is_some_and(|url| self.permissions.matches(url))
            })
            .map(|(target, _)| target)
            .collect();

        let calls = targets
            .iter()
            .map(|target| self.run_in(*target, request.clone()));
        let settled = join_all(calls).await;

        let mut result = BroadcastResult::default();
        for outcome in settled {
            match outcome {
                Ok(value) => result.fulfilled.push(value),
                Err(_) => result.rejected += 1,
            }
        }
        if result.rejected > 0 {
            warn!(
                brick_id = %request.brick_id,
                rejected = result.rejected,
                total = targets.len(),
                "Broadcast run failed in some tabs"
            );
        }
        Ok(result)
    }

    async fn run_in(&self, target: Target, request: RemoteBrickRequest) -> Result<Value> {
        self.messenger.call_method(target, RUN_BRICK, (request,)).await
    }

    /// Registers `OPEN_TAB` and the `REQUEST_RUN_IN_*` handlers.
    pub fn register(self: &Arc<Self>) -> Result<()> {
        let router = Arc::clone(self);
        self.messenger
            .register_method_with_sender(OPEN_TAB, move |sender, (url,): (String,)| {
                let router = Arc::clone(&router);
                async move { router.open_tab(&sender, url).await }
            })?;

        let router = Arc::clone(self);
        self.messenger.register_method_with_sender(
            REQUEST_RUN_IN_OPENER,
            move |sender, (request,): (RemoteBrickRequest,)| {
                let router = Arc::clone(&router);
                async move { router.request_run_in_opener(&sender, request).await }
            },
        )?;

        let router = Arc::clone(self);
        self.messenger.register_method_with_sender(
            REQUEST_RUN_IN_TARGET,
            move |sender, (request,): (RemoteBrickRequest,)| {
                let router = Arc::clone(&router);
                async move { router.request_run_in_target(&sender, request).await }
            },
        )?;

        let router = Arc::clone(self);
        self.messenger.register_method_with_sender(
            REQUEST_RUN_IN_TOP,
            move |sender, (request,): (RemoteBrickRequest,)| {
                let router = Arc::clone(&router);
                async move { router.request_run_in_top(&sender, request).await }
            },
        )?;

        let router = Arc::clone(self);
        self.messenger.register_method_with_sender(
            REQUEST_RUN_IN_BROADCAST,
            move |sender, (request,): (RemoteBrickRequest,)| {
                let router = Arc::clone(&router);
                async move { router.request_run_in_broadcast(&sender, request).await }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MessengerConfig;
    use crate::messenger::MessageBus;
    use serde_json::json;

    fn config() -> MessengerConfig {
        MessengerConfig {
            call_timeout_ms: 500,
            ready_timeout_ms: 200,
            ready_poll_interval_ms: 10,
        }
    }

    fn tab(bus: &Arc<MessageBus>, tab_id: TabId, url: &str, fail: bool) -> Messenger {
        let messenger = Messenger::attach(
            Arc::clone(bus),
            Target::top_frame(tab_id),
            Some(url.to_string()),
            config(),
        )
        .unwrap();
        messenger
            .register_method(RUN_BRICK, move |(request,): (RemoteBrickRequest,)| async move {
                if fail {
                    Err(BrickflowError::internal("tab crashed"))
                } else {
                    Ok(json!({"tab": tab_id, "brick": request.brick_id}))
                }
            })
            .unwrap();
        messenger
    }

    fn router(bus: &Arc<MessageBus>, launcher: MockTabLauncher) -> Arc<BackgroundRouter> {
        let background = Messenger::attach(Arc::clone(bus), Target::Background, None, config()).unwrap();
        let router = Arc::new(BackgroundRouter::new(
            background,
            Arc::new(TabLinkage::new()),
            HostPermissions::from_patterns(&["https://*.example.com/*"]).unwrap(),
            Arc::new(launcher),
        ));
        router.register().unwrap();
        router
    }

    fn sender(tab_id: TabId) -> SenderInfo {
        SenderInfo {
            target: Target::top_frame(tab_id),
            url: Some("https://app.example.com/".to_string()),
        }
    }

    #[tokio::test]
    async fn test_broadcast_tolerates_partial_failure() {
        let bus = Arc::new(MessageBus::new());
        let _sender = tab(&bus, 1, "https://app.example.com/", false);
        let _ok_a = tab(&bus, 2, "https://a.example.com/", false);
        let _ok_b = tab(&bus, 3, "https://b.example.com/", false);
        let _failing = tab(&bus, 4, "https://c.example.com/", true);
        let _foreign = tab(&bus, 5, "https://other.test/", false);
        let router = router(&bus, MockTabLauncher::new());

        let result = router
            .request_run_in_broadcast(&sender(1), RemoteBrickRequest::new("@acme/b", json!({})))
            .await
            .unwrap();

        assert_eq!(result.fulfilled.len(), 2);
        assert_eq!(result.rejected, 1);
        assert!(result.fulfilled.iter().all(|v| v["tab"] != 1 && v["tab"] != 5));
    }

    #[tokio::test]
    async fn test_open_tab_links_and_routes_to_opener_and_target() {
        let bus = Arc::new(MessageBus::new());
        let _opener = tab(&bus, 1, "https://app.example.com/", false);
        let _child = tab(&bus, 7, "https://child.example.com/", false);

        let mut launcher = MockTabLauncher::new();
        launcher
            .expect_open_tab()
            .withf(|url, opener| url == "https://child.example.com/" && *opener == 1)
            .times(1)
            .returning(|_, _| Ok(7));
        let router = router(&bus, launcher);

        let caller = Messenger::attach(Arc::clone(&bus), Target::Sidebar { tab_id: 1 }, None, config()).unwrap();
        let child: TabId = caller
            .call_method(Target::Background, OPEN_TAB, ("https://child.example.com/",))
            .await
            .unwrap();
        assert_eq!(child, 7);
        assert_eq!(router.linkage().opener_of(7), Some(1));

        let from_child = router
            .request_run_in_opener(&sender(7), RemoteBrickRequest::new("@acme/x", json!({})))
            .await
            .unwrap();
        assert_eq!(from_child["tab"], 1);

        let from_opener = router
            .request_run_in_target(&sender(1), RemoteBrickRequest::new("@acme/x", json!({})))
            .await
            .unwrap();
        assert_eq!(from_opener["tab"], 7);
    }

    #[tokio::test]
    async fn test_missing_opener_is_business_error() {
        let bus = Arc::new(MessageBus::new());
        let router = router(&bus, MockTabLauncher::new());
        let err = router
            .request_run_in_opener(&sender(3), RemoteBrickRequest::new("@acme/x", json!({})))
            .await
            .unwrap_err();
        assert!(err.is_business_error());

        let err = router
            .request_run_in_top(
                &SenderInfo {
                    target: Target::Offscreen,
                    url: None,
                },
                RemoteBrickRequest::new("@acme/x", json!({})),
            )
            .await
            .unwrap_err();
        assert!(err.is_business_error());
    }
}
