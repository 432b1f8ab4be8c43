//! Options handed to every brick run.

use super::CapabilityResolver;
use crate::cancellation::AbortSignal;
use crate::context::{BrickArgsContext, RootRef};
use crate::core::RendererPayload;
use crate::errors::{BrickflowError, Result};
use crate::observability::BrickLogger;
use crate::pipeline::{Pipeline, PipelineRunResult, PipelineRuntime, RunOptions};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Per-brick execution options.
///
/// Controller bricks use [`BrickOptions::run_pipeline`] and
/// [`BrickOptions::run_renderer_pipeline`] to run the pipelines passed to
/// them as `pipeline` expressions.
#[derive(Clone)]
pub struct BrickOptions {
    /// The context the brick's arguments were rendered against.
    pub ctxt: BrickArgsContext,
    /// Logger scoped to this brick.
    pub logger: BrickLogger,
    /// The root the brick operates on.
    pub root: RootRef,
    /// Cancellation signal of the run.
    pub signal: AbortSignal,
    /// The run this brick belongs to.
    pub run_id: Uuid,
    runtime: PipelineRuntime,
    run_options: RunOptions,
    resolver: Arc<CapabilityResolver>,
}

impl fmt::Debug for BrickOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrickOptions")
            .field("ctxt", &self.ctxt)
            .field("root", &self.root)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}

impl BrickOptions {
    pub(crate) fn new(
        ctxt: BrickArgsContext,
        logger: BrickLogger,
        root: RootRef,
        run_id: Uuid,
        runtime: PipelineRuntime,
        run_options: RunOptions,
        resolver: Arc<CapabilityResolver>,
    ) -> Self {
        Self {
            ctxt,
            logger,
            root,
            signal: run_options.signal.clone(),
            run_id,
            runtime,
            run_options,
            resolver,
        }
    }

    /// Returns the runtime executing this brick.
    #[must_use]
    pub fn runtime(&self) -> &PipelineRuntime {
        &self.runtime
    }

    /// Runs `pipeline` with `ctxt` as its initial context, sharing this run's
    /// signal, root, trace log and capability cache.
    pub async fn run_steps(&self, pipeline: &Pipeline, ctxt: BrickArgsContext) -> Result<PipelineRunResult> {
        let options = self
            .run_options
            .clone()
            .with_logger(self.logger.clone())
            .with_root(self.root.clone());
        self.runtime
            .run_with_resolver(pipeline, ctxt, &options, Arc::clone(&self.resolver))
            .await
    }

    /// Runs a `pipeline` expression against this brick's context extended with
    /// `extra`, returning the pipeline's output.
    pub async fn run_pipeline(&self, expression: &Value, extra: &BrickArgsContext) -> Result<Value> {
        let pipeline = Pipeline::from_value(expression)?;
        let result = self.run_steps(&pipeline, self.ctxt.extend(extra)).await?;
        Ok(result.output)
    }

    /// Like [`BrickOptions::run_pipeline`], but requires a renderer to run.
    pub async fn run_renderer_pipeline(
        &self,
        expression: &Value,
        extra: &BrickArgsContext,
    ) -> Result<RendererPayload> {
        let pipeline = Pipeline::from_value(expression)?;
        let result = self.run_steps(&pipeline, self.ctxt.extend(extra)).await?;
        result.renderer.ok_or(BrickflowError::NoRenderer)
    }
}
