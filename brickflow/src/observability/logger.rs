//! Contextual logger passed into every brick execution.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Identifies where a log line or error originated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    /// The mod (blueprint) registry id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<String>,
    /// The mod component (extension) id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_component_id: Option<String>,
    /// The brick registry id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brick_id: Option<String>,
    /// The brick instance id within its pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<Uuid>,
    /// The step label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The pipeline run id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

impl MessageContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mod id.
    #[must_use]
    pub fn with_mod_id(mut self, id: impl Into<String>) -> Self {
        self.mod_id = Some(id.into());
        self
    }

    /// Sets the mod component id.
    #[must_use]
    pub fn with_mod_component_id(mut self, id: impl Into<String>) -> Self {
        self.mod_component_id = Some(id.into());
        self
    }

    /// Overlays the fields set in `other` onto this context.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            mod_id: other.mod_id.clone().or_else(|| self.mod_id.clone()),
            mod_component_id: other
                .mod_component_id
                .clone()
                .or_else(|| self.mod_component_id.clone()),
            brick_id: other.brick_id.clone().or_else(|| self.brick_id.clone()),
            instance_id: other.instance_id.or(self.instance_id),
            label: other.label.clone().or_else(|| self.label.clone()),
            run_id: other.run_id.or(self.run_id),
        }
    }
}

/// Logger carrying a [`MessageContext`], backed by `tracing`.
#[derive(Debug, Clone, Default)]
pub struct BrickLogger {
    context: MessageContext,
}

impl BrickLogger {
    /// Creates a logger for the given context.
    #[must_use]
    pub fn new(context: MessageContext) -> Self {
        Self { context }
    }

    /// Returns the logger's context.
    #[must_use]
    pub fn context(&self) -> &MessageContext {
        &self.context
    }

    /// Returns a logger whose context overlays `context` on this one.
    #[must_use]
    pub fn child(&self, context: &MessageContext) -> Self {
        Self {
            context: self.context.merge(context),
        }
    }

    /// Logs at debug level.
    pub fn debug(&self, message: &str) {
        debug!(
            mod_id = ?self.context.mod_id,
            mod_component_id = ?self.context.mod_component_id,
            brick_id = ?self.context.brick_id,
            run_id = ?self.context.run_id,
            "{message}"
        );
    }

    /// Logs at info level.
    pub fn info(&self, message: &str) {
        info!(
            mod_id = ?self.context.mod_id,
            mod_component_id = ?self.context.mod_component_id,
            brick_id = ?self.context.brick_id,
            run_id = ?self.context.run_id,
            "{message}"
        );
    }

    /// Logs at warn level.
    pub fn warn(&self, message: &str) {
        warn!(
            mod_id = ?self.context.mod_id,
            mod_component_id = ?self.context.mod_component_id,
            brick_id = ?self.context.brick_id,
            run_id = ?self.context.run_id,
            "{message}"
        );
    }

    /// Logs at error level.
    pub fn error(&self, message: &str) {
        error!(
            mod_id = ?self.context.mod_id,
            mod_component_id = ?self.context.mod_component_id,
            brick_id = ?self.context.brick_id,
            run_id = ?self.context.run_id,
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_overlays_context() {
        let parent = BrickLogger::new(
            MessageContext::new()
                .with_mod_id("@acme/mod")
                .with_mod_component_id("c-1"),
        );
        let child = parent.child(&MessageContext {
            brick_id: Some("@pixiebrix/identity".to_string()),
            mod_component_id: Some("c-2".to_string()),
            ..MessageContext::default()
        });

        assert_eq!(child.context().mod_id.as_deref(), Some("@acme/mod"));
        assert_eq!(child.context().mod_component_id.as_deref(), Some("c-2"));
        assert_eq!(child.context().brick_id.as_deref(), Some("@pixiebrix/identity"));
        child.debug("hello");
    }

    #[test]
    fn test_context_serializes_camel_case() {
        let ctx = MessageContext::new().with_mod_component_id("c-1");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json, serde_json::json!({"modComponentId": "c-1"}));
    }
}
