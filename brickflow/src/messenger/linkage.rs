//! Opener/target links between tabs.

use super::bus::MessageBus;
use super::context::TabId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

/// Tracks which tab opened which.
///
/// Entries are created by `OPEN_TAB` and pruned when either tab goes away.
#[derive(Debug, Default)]
pub struct TabLinkage {
    tab_to_opener: RwLock<HashMap<TabId, TabId>>,
    tab_to_target: RwLock<HashMap<TabId, TabId>>,
}

impl TabLinkage {
    /// Creates an empty linkage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `opener` opened `child`.
    pub fn link_child_tab(&self, opener: TabId, child: TabId) {
        self.tab_to_opener.write().insert(child, opener);
        self.tab_to_target.write().insert(opener, child);
    }

    /// Returns the tab that opened `tab`.
    #[must_use]
    pub fn opener_of(&self, tab: TabId) -> Option<TabId> {
        self.tab_to_opener.read().get(&tab).copied()
    }

    /// Returns the tab most recently opened by `tab`.
    #[must_use]
    pub fn target_of(&self, tab: TabId) -> Option<TabId> {
        self.tab_to_target.read().get(&tab).copied()
    }

    /// Drops every link involving `tab`.
    pub fn tab_removed(&self, tab: TabId) {
        for map in [&self.tab_to_opener, &self.tab_to_target] {
            let mut map = map.write();
            map.remove(&tab);
            map.retain(|_, other| *other != tab);
        }
    }

    /// Clears all links.
    pub fn reset(&self) {
        self.tab_to_opener.write().clear();
        self.tab_to_target.write().clear();
    }

    /// Returns the number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tab_to_opener.read().len()
    }

    /// Returns true if no tabs are linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Prunes links whenever a tab's top frame detaches from `bus`.
    pub fn spawn_pruner(self: &Arc<Self>, bus: &MessageBus) -> JoinHandle<()> {
        let linkage = Arc::clone(self);
        let mut detached = bus.subscribe_detached();
        tokio::spawn(async move {
            loop {
                match detached.recv().await {
                    Ok(target) if target.is_top_frame() => {
                        if let Some(tab) = target.tab_id() {
                            debug!(tab, "Pruning tab links");
                            linkage.tab_removed(tab);
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
