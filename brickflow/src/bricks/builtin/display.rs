//! Temporary information panels.

use crate::bricks::{Brick, BrickOptions};
use crate::context::BrickArgsContext;
use crate::core::{BrickKind, RendererPayload};
use crate::errors::{BrickflowError, Result};
use crate::utils::generate_uuid;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A panel shown by [`DisplayTemporaryInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelEntry {
    /// Panel id.
    pub id: Uuid,
    /// Panel title.
    pub title: String,
    /// Renderer output to show.
    pub payload: RendererPayload,
}

/// Surface that shows temporary panels (sidebar, modal, popover).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PanelHost: Send + Sync {
    /// Shows a panel.
    async fn show(&self, panel: PanelEntry) -> Result<()>;

    /// Resolves when the user closes the panel.
    async fn wait_closed(&self, panel_id: Uuid) -> Result<()>;

    /// Removes the panel. Must not fail.
    async fn hide(&self, panel_id: Uuid);
}

#[derive(Debug, Deserialize)]
struct DisplayArgs {
    #[serde(default)]
    title: String,
    body: Value,
}

/// Shows the output of a renderer pipeline until the panel is closed or the
/// run is cancelled.
///
/// Cancellation is a normal outcome here: after hiding the panel a
/// `CancelError` resolves to `null` instead of failing the run.
#[derive(Clone)]
pub struct DisplayTemporaryInfo {
    panels: Arc<dyn PanelHost>,
}

impl std::fmt::Debug for DisplayTemporaryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayTemporaryInfo").finish_non_exhaustive()
    }
}

impl DisplayTemporaryInfo {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/display";

    /// Creates the brick over `panels`.
    #[must_use]
    pub fn new(panels: Arc<dyn PanelHost>) -> Self {
        Self { panels }
    }

    async fn show_until_closed(&self, args: DisplayArgs, options: &BrickOptions) -> Result<()> {
        let payload = options
            .run_renderer_pipeline(&args.body, &BrickArgsContext::new())
            .await?;
        let panel_id = generate_uuid();
        self.panels
            .show(PanelEntry {
                id: panel_id,
                title: args.title,
                payload,
            })
            .await?;

        let outcome = tokio::select! {
            () = options.signal.cancelled() => options.signal.check(),
            closed = self.panels.wait_closed(panel_id) => closed,
        };
        self.panels.hide(panel_id).await;
        outcome
    }
}

#[async_trait]
impl Brick for DisplayTemporaryInfo {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        let args: DisplayArgs = serde_json::from_value(args.clone())
            .map_err(|e| BrickflowError::prop(format!("Invalid display arguments: {e}"), "args", args))?;

        match self.show_until_closed(args, options).await {
            Ok(()) => Ok(Value::Null),
            Err(err) if err.is_cancel() => {
                options.logger.debug("Temporary panel cancelled");
                Ok(Value::Null)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bricks::builtin::MarkdownRenderer;
    use crate::bricks::BrickRegistry;
    use crate::pipeline::{BrickConfig, Pipeline, PipelineRuntime, RunOptions};
    use mockall::predicate::always;
    use serde_json::json;

    fn body() -> Value {
        json!({
            "__type__": "pipeline",
            "__value__": [{"id": MarkdownRenderer::ID, "config": {"markdown": "**hi**"}}],
        })
    }

    fn runtime(panels: Arc<dyn PanelHost>) -> PipelineRuntime {
        let registry = Arc::new(BrickRegistry::new());
        registry.register(Arc::new(MarkdownRenderer));
        registry.register(Arc::new(DisplayTemporaryInfo::new(panels)));
        PipelineRuntime::new(registry)
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(vec![BrickConfig::new(DisplayTemporaryInfo::ID)
            .with_config(json!({"title": "Info", "body": body()}))])
        .unwrap()
    }

    #[tokio::test]
    async fn test_shows_and_hides_panel() {
        let mut panels = MockPanelHost::new();
        panels
            .expect_show()
            .withf(|panel| panel.title == "Info" && panel.payload.payload["markdown"] == "**hi**")
            .times(1)
            .returning(|_| Ok(()));
        panels.expect_wait_closed().times(1).returning(|_| Ok(()));
        panels.expect_hide().with(always()).times(1).returning(|_| ());

        let result = runtime(Arc::new(panels))
            .run_pipeline(&pipeline(), BrickArgsContext::new(), &RunOptions::new())
            .await
            .unwrap();
        assert_eq!(result.output, json!({}));
    }

    #[tokio::test]
    async fn test_cancel_is_swallowed_after_hide() {
        let mut panels = MockPanelHost::new();
        panels.expect_show().times(1).returning(|_| Ok(()));
        panels
            .expect_wait_closed()
            .returning(|_| Err(BrickflowError::cancel("Panel cancelled")));
        panels.expect_hide().times(1).returning(|_| ());

        let result = runtime(Arc::new(panels))
            .run_pipeline(&pipeline(), BrickArgsContext::new(), &RunOptions::new())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_other_errors_surface() {
        let mut panels = MockPanelHost::new();
        panels
            .expect_show()
            .returning(|_| Err(BrickflowError::internal("no sidebar")));
        panels.expect_hide().times(0);

        let err = runtime(Arc::new(panels))
            .run_pipeline(&pipeline(), BrickArgsContext::new(), &RunOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "Error");
    }
}
