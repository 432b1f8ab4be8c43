//! Markdown panel renderer.

use crate::bricks::{Brick, BrickOptions, CapabilityScope};
use crate::core::BrickKind;
use crate::errors::{BrickflowError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Renders a markdown panel payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/markdown";
}

#[async_trait]
impl Brick for MarkdownRenderer {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Renderer
    }

    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn run(&self, args: Value, _options: &BrickOptions) -> Result<Value> {
        match args.get("markdown") {
            Some(Value::String(markdown)) => Ok(json!({"type": "markdown", "markdown": markdown})),
            Some(Value::Null) | None => Ok(json!({"type": "markdown", "markdown": ""})),
            Some(other) => Err(BrickflowError::prop(
                "markdown must be a string",
                "markdown",
                other.clone(),
            )),
        }
    }
}
