//! Running bricks in other frames.

use super::BrickWindow;
use crate::errors::Result;
use crate::observability::MessageContext;
use crate::template::ApiVersion;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A brick invocation shipped to another frame. Arguments are already rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBrickRequest {
    /// Registry id of the brick.
    pub brick_id: String,
    /// Rendered arguments.
    pub args: Value,
    /// Origin of the call.
    #[serde(default)]
    pub message_context: MessageContext,
    /// API version of the calling mod.
    #[serde(default)]
    pub api_version: ApiVersion,
}

impl RemoteBrickRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(brick_id: impl Into<String>, args: Value) -> Self {
        Self {
            brick_id: brick_id.into(),
            args,
            message_context: MessageContext::default(),
            api_version: ApiVersion::default(),
        }
    }

    /// Sets the message context.
    #[must_use]
    pub fn with_message_context(mut self, context: MessageContext) -> Self {
        self.message_context = context;
        self
    }
}

/// Runs bricks whose window is not the local frame.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteBrickExecutor: Send + Sync {
    /// Runs `request` in `window`.
    ///
    /// [`BrickWindow::Broadcast`] returns an array of the fulfilled results.
    async fn run_remote(&self, window: BrickWindow, request: RemoteBrickRequest) -> Result<Value>;
}
