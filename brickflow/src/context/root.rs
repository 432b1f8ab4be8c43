//! Root references for root-aware bricks.

use serde::{Deserialize, Serialize};

/// The DOM subtree a brick operates on.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RootRef {
    /// The whole document.
    #[default]
    Document,
    /// An element identified by selector (or element reference id).
    Element {
        /// Selector or reference for the element.
        selector: String,
    },
}

impl RootRef {
    /// Creates an element root.
    #[must_use]
    pub fn element(selector: impl Into<String>) -> Self {
        Self::Element {
            selector: selector.into(),
        }
    }

    /// Returns true for the document root.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document)
    }
}

/// How a step picks its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootMode {
    /// Use the root passed in the run options.
    #[default]
    Inherit,
    /// Always use the document.
    Document,
    /// Use the element named by the step's `root` selector.
    Element,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_ref_serde() {
        let json = serde_json::to_value(RootRef::element("#main")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "element", "selector": "#main"}));
        assert!(RootRef::default().is_document());
    }
}
