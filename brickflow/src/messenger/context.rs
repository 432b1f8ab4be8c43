//! Execution contexts and message targets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tab id assigned by the host browser.
pub type TabId = u32;

/// Frame id within a tab. The top frame is `0`.
pub type FrameId = u32;

/// Frame id of a tab's top-level frame.
pub const TOP_FRAME_ID: FrameId = 0;

/// The kind of execution context a messenger lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContextKind {
    /// The background service worker.
    Background,
    /// A content script in a tab frame.
    ContentScript,
    /// The offscreen document.
    Offscreen,
    /// The sidebar panel of a tab.
    Sidebar,
    /// The page editor attached to a tab.
    PageEditor,
}

impl ContextKind {
    /// Returns true for contexts that exist at most once per browser.
    #[must_use]
    pub fn is_singleton(self) -> bool {
        matches!(self, Self::Background | Self::Offscreen)
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Background => "background",
            Self::ContentScript => "contentScript",
            Self::Offscreen => "offscreen",
            Self::Sidebar => "sidebar",
            Self::PageEditor => "pageEditor",
        };
        f.write_str(name)
    }
}

/// Address of a messenger endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Target {
    /// The background service worker.
    Background,
    /// The offscreen document.
    Offscreen,
    /// A content script frame.
    #[serde(rename_all = "camelCase")]
    Tab {
        /// Tab id.
        tab_id: TabId,
        /// Frame id.
        frame_id: FrameId,
    },
    /// The sidebar of a tab.
    #[serde(rename_all = "camelCase")]
    Sidebar {
        /// Tab id.
        tab_id: TabId,
    },
    /// The page editor of a tab.
    #[serde(rename_all = "camelCase")]
    PageEditor {
        /// Tab id.
        tab_id: TabId,
    },
}

impl Target {
    /// Targets the top frame of `tab_id`.
    #[must_use]
    pub fn top_frame(tab_id: TabId) -> Self {
        Self::Tab {
            tab_id,
            frame_id: TOP_FRAME_ID,
        }
    }

    /// Returns the context kind served at this target.
    #[must_use]
    pub fn context(self) -> ContextKind {
        match self {
            Self::Background => ContextKind::Background,
            Self::Offscreen => ContextKind::Offscreen,
            Self::Tab { .. } => ContextKind::ContentScript,
            Self::Sidebar { .. } => ContextKind::Sidebar,
            Self::PageEditor { .. } => ContextKind::PageEditor,
        }
    }

    /// Returns the tab this target belongs to, if any.
    #[must_use]
    pub fn tab_id(self) -> Option<TabId> {
        match self {
            Self::Tab { tab_id, .. } | Self::Sidebar { tab_id } | Self::PageEditor { tab_id } => {
                Some(tab_id)
            }
            Self::Background | Self::Offscreen => None,
        }
    }

    /// Returns true for the top frame of a tab.
    #[must_use]
    pub fn is_top_frame(self) -> bool {
        matches!(
            self,
            Self::Tab {
                frame_id: TOP_FRAME_ID,
                ..
            }
        )
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => f.write_str("background"),
            Self::Offscreen => f.write_str("offscreen"),
            Self::Tab { tab_id, frame_id } => write!(f, "tab {tab_id} frame {frame_id}"),
            Self::Sidebar { tab_id } => write!(f, "sidebar of tab {tab_id}"),
            Self::PageEditor { tab_id } => write!(f, "page editor of tab {tab_id}"),
        }
    }
}

/// Who sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    /// The sending endpoint.
    pub target: Target,
    /// URL of the sending frame, if it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl SenderInfo {
    /// Returns the sender's tab, if any.
    #[must_use]
    pub fn tab_id(&self) -> Option<TabId> {
        self.target.tab_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_target_context_and_tab() {
        assert_eq!(Target::top_frame(3).context(), ContextKind::ContentScript);
        assert_eq!(Target::Sidebar { tab_id: 3 }.tab_id(), Some(3));
        assert_eq!(Target::Background.tab_id(), None);
        assert!(Target::top_frame(3).is_top_frame());
        assert!(!Target::Tab { tab_id: 3, frame_id: 7 }.is_top_frame());
        assert!(ContextKind::Offscreen.is_singleton());
        assert!(!ContextKind::ContentScript.is_singleton());
    }

    #[test]
    fn test_target_serialization() {
        let value = serde_json::to_value(Target::top_frame(4)).unwrap();
        assert_eq!(value, json!({"type": "tab", "tabId": 4, "frameId": 0}));
        assert_eq!(
            serde_json::from_value::<Target>(json!({"type": "background"})).unwrap(),
            Target::Background
        );
    }
}
