//! User-defined bricks wrapping a pipeline.

use super::{Brick, BrickOptions, CapabilityScope};
use crate::context::BrickArgsContext;
use crate::core::BrickKind;
use crate::errors::Result;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use serde_json::Value;

/// A brick defined by a nested pipeline.
///
/// The composite's arguments are bound as `@input` of the nested run.
/// Purity and root awareness are derived from the nested bricks.
#[derive(Debug, Clone)]
pub struct CompositeBrick {
    id: String,
    kind: BrickKind,
    pipeline: Pipeline,
}

impl CompositeBrick {
    /// Creates a composite brick.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: BrickKind, pipeline: Pipeline) -> Self {
        Self {
            id: id.into(),
            kind,
            pipeline,
        }
    }

    /// Returns the nested pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

#[async_trait]
impl Brick for CompositeBrick {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BrickKind {
        self.kind
    }

    async fn is_pure(&self, scope: &CapabilityScope<'_>) -> Result<bool> {
        for step in self.pipeline.steps() {
            if !scope.resolve_id(&step.id).await?.pure {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn is_root_aware(&self, scope: &CapabilityScope<'_>) -> Result<bool> {
        for step in self.pipeline.steps() {
            if scope.resolve_id(&step.id).await?.root_aware {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        let result = options
            .run_steps(&self.pipeline, BrickArgsContext::with_input(args))
            .await?;
        Ok(match result.renderer {
            Some(renderer) => renderer.payload,
            None => result.output,
        })
    }
}
