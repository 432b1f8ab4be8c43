//! The pipeline interpreter.

use super::options::RunOptions;
use super::remote::{RemoteBrickExecutor, RemoteBrickRequest};
use super::spec::{BrickConfig, Pipeline};
use crate::bricks::{BrickOptions, BrickRegistry, CapabilityResolver};
use crate::context::{BrickArgsContext, RootMode, RootRef, INPUT_KEY, OPTIONS_KEY};
use crate::core::{BrickKind, RendererPayload, StepStatus, TraceRecord};
use crate::errors::{BrickflowError, Result};
use crate::events::{
    BRICK_COMPLETED_EVENT, BRICK_FAILED_EVENT, BRICK_SKIPPED_EVENT, BRICK_STARTED_EVENT,
};
use crate::observability::MessageContext;
use crate::template::{evaluate_condition, render_args};
use crate::utils::generate_uuid;
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Skip reason recorded for falsy `if` conditions.
pub const CONDITION_SKIP_REASON: &str = "condition is falsy";

/// Skip reason recorded for impure bricks in dry runs.
pub const DRY_RUN_SKIP_REASON: &str = "impure brick skipped in dry run";

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRunResult {
    /// The run id.
    pub run_id: Uuid,
    /// The final current value.
    pub output: Value,
    /// Payload of the renderer that ended the run, if any.
    pub renderer: Option<RendererPayload>,
    /// Context after the last step.
    pub ctxt: BrickArgsContext,
    /// Traces of this run's steps, in order.
    pub trace: Vec<TraceRecord>,
    /// Total execution time in milliseconds.
    pub duration_ms: f64,
}

enum StepOutcome {
    Skipped(&'static str),
    Completed { kind: BrickKind, output: Value },
}

/// Interprets pipelines against a brick registry.
///
/// Cheap to clone; clones share the registry and remote executor.
#[derive(Clone)]
pub struct PipelineRuntime {
    registry: Arc<BrickRegistry>,
    remote: Option<Arc<dyn RemoteBrickExecutor>>,
}

impl fmt::Debug for PipelineRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineRuntime")
            .field("bricks", &self.registry.ids().len())
            .field("remote", &self.remote.is_some())
            .finish()
    }
}

impl PipelineRuntime {
    /// Creates a runtime without remote execution.
    #[must_use]
    pub fn new(registry: Arc<BrickRegistry>) -> Self {
        Self {
            registry,
            remote: None,
        }
    }

    /// Sets the executor used for bricks whose window is not `self`.
    #[must_use]
    pub fn with_remote_executor(mut self, executor: Arc<dyn RemoteBrickExecutor>) -> Self {
        self.remote = Some(executor);
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<BrickRegistry> {
        &self.registry
    }

    /// Runs `pipeline` with `initial` as its context.
    ///
    /// Steps run strictly in order. The first failing step aborts the run
    /// and its error is returned unchanged; its trace stays in
    /// [`RunOptions::trace`].
    pub async fn run_pipeline(
        &self,
        pipeline: &Pipeline,
        initial: BrickArgsContext,
        options: &RunOptions,
    ) -> Result<PipelineRunResult> {
        let resolver = Arc::new(CapabilityResolver::new(Arc::clone(&self.registry)));
        self.run_with_resolver(pipeline, initial, options, resolver).await
    }

    /// Runs a pipeline that must end in a renderer.
    pub async fn run_renderer_pipeline(
        &self,
        pipeline: &Pipeline,
        initial: BrickArgsContext,
        options: &RunOptions,
    ) -> Result<RendererPayload> {
        let result = self.run_pipeline(pipeline, initial, options).await?;
        result.renderer.ok_or(BrickflowError::NoRenderer)
    }

    /// Runs a single brick with already-rendered arguments.
    ///
    /// Used by frames receiving a [`RemoteBrickRequest`].
    pub async fn run_brick(&self, request: RemoteBrickRequest, options: &RunOptions) -> Result<Value> {
        options.signal.check()?;
        let brick = self.registry.lookup(&request.brick_id)?;
        let resolver = Arc::new(CapabilityResolver::new(Arc::clone(&self.registry)));
        let capabilities = resolver.resolve(brick.as_ref()).await?;

        let logger = options.logger.child(&request.message_context);
        let root = if capabilities.root_aware {
            options.root.clone()
        } else {
            RootRef::Document
        };
        let brick_options = BrickOptions::new(
            BrickArgsContext::new(),
            logger,
            root,
            request.message_context.run_id.unwrap_or_else(generate_uuid),
            self.clone(),
            options.clone().with_api_version(request.api_version),
            resolver,
        );

        brick
            .run(request.args, &brick_options)
            .await
            .map_err(|e| e.with_brick_id(&request.brick_id))
    }

    #[instrument(skip_all, fields(steps = pipeline.len()))]
    pub(crate) async fn run_with_resolver(
        &self,
        pipeline: &Pipeline,
        initial: BrickArgsContext,
        options: &RunOptions,
        resolver: Arc<CapabilityResolver>,
    ) -> Result<PipelineRunResult> {
        let start = Instant::now();
        let run_id = generate_uuid();

        let mut ctxt = initial;
        if let Some(mod_options) = &options.mod_options {
            if !ctxt.contains(OPTIONS_KEY) {
                ctxt = ctxt.bind(OPTIONS_KEY, mod_options.clone());
            }
        }
        let mut current = ctxt
            .get(INPUT_KEY)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let mut renderer = None;
        let mut trace = Vec::with_capacity(pipeline.len());

        debug!(%run_id, "Running pipeline");

        for config in pipeline.steps() {
            options.signal.check()?;

            let mut record =
                TraceRecord::pending(run_id, config.instance_id, &config.id, config.label.clone());
            let event_data = step_event_data(run_id, config);

            let outcome = self
                .execute_step(config, &ctxt, options, &resolver, run_id, &mut record)
                .await;

            match outcome {
                Ok(StepOutcome::Skipped(reason)) => {
                    debug!(brick_id = %config.id, reason, "Skipped brick");
                    record.skip(reason);
                    options.event_sink.try_emit(BRICK_SKIPPED_EVENT, Some(event_data));
                    options.trace.push(record.clone());
                    trace.push(record);
                }
                Ok(StepOutcome::Completed { kind, output }) => {
                    record.succeed(output.clone());
                    options.event_sink.try_emit(BRICK_COMPLETED_EVENT, Some(event_data));
                    options.trace.push(record.clone());
                    trace.push(record);

                    if kind == BrickKind::Renderer {
                        renderer = Some(RendererPayload {
                            brick_id: config.id.clone(),
                            run_id,
                            payload: output.clone(),
                        });
                        current = output;
                        break;
                    }

                    match (&config.output_key, kind) {
                        (Some(key), _) => ctxt = ctxt.bind(key.variable(), output),
                        (None, BrickKind::Effect | BrickKind::Renderer) => {}
                        (None, BrickKind::Transformer) => current = output,
                        (None, BrickKind::Reader) => current = merge_reader_output(current, output),
                    }
                }
                Err(err) => {
                    let err = err.with_brick_id(&config.id);
                    if record.status == StepStatus::Pending {
                        record.start(Value::Null);
                    }
                    record.fail(err.to_serialized());
                    options.trace.push(record);

                    let mut data = event_data;
                    data["error"] = json!(err.to_serialized());
                    options.event_sink.try_emit(BRICK_FAILED_EVENT, Some(data));

                    if !err.is_business_error() {
                        let context = options.logger.context().merge(&step_context(run_id, config));
                        options.error_reporter.report(&err, &context);
                    }
                    return Err(err);
                }
            }
        }

        Ok(PipelineRunResult {
            run_id,
            output: current,
            renderer,
            ctxt,
            trace,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }

    async fn execute_step(
        &self,
        config: &BrickConfig,
        ctxt: &BrickArgsContext,
        options: &RunOptions,
        resolver: &Arc<CapabilityResolver>,
        run_id: Uuid,
        record: &mut TraceRecord,
    ) -> Result<StepOutcome> {
        if let Some(condition) = &config.condition {
            if !evaluate_condition(condition, ctxt, options.api_version)? {
                return Ok(StepOutcome::Skipped(CONDITION_SKIP_REASON));
            }
        }

        let brick = self.registry.lookup(&config.id)?;
        let capabilities = resolver.resolve(brick.as_ref()).await?;
        if options.dry_run && !capabilities.pure {
            return Ok(StepOutcome::Skipped(DRY_RUN_SKIP_REASON));
        }

        let root = if capabilities.root_aware {
            match config.root_mode {
                RootMode::Inherit => options.root.clone(),
                RootMode::Document => RootRef::Document,
                RootMode::Element => RootRef::element(config.root.clone().ok_or_else(|| {
                    BrickflowError::invalid_definition(format!(
                        "Brick {} uses element root mode without a root selector",
                        config.id
                    ))
                })?),
            }
        } else {
            RootRef::Document
        };

        let args = render_args(&config.config, ctxt, options.api_version)?;
        record.start(args.clone());
        options
            .event_sink
            .try_emit(BRICK_STARTED_EVENT, Some(step_event_data(run_id, config)));

        let logger = options.logger.child(&step_context(run_id, config));
        logger.debug(&format!("Running brick {}", config.id));

        let kind = brick.kind();
        let output = if config.window.is_local() {
            let brick_options = BrickOptions::new(
                ctxt.clone(),
                logger,
                root,
                run_id,
                self.clone(),
                options.clone(),
                Arc::clone(resolver),
            );
            brick.run(args, &brick_options).await?
        } else {
            let remote = self.remote.as_ref().ok_or_else(|| {
                BrickflowError::invalid_definition(format!(
                    "Brick {} targets window {} but no remote executor is configured",
                    config.id, config.window
                ))
            })?;
            let request = RemoteBrickRequest {
                brick_id: config.id.clone(),
                args,
                message_context: logger.context().clone(),
                api_version: options.api_version,
            };
            remote.run_remote(config.window, request).await?
        };

        Ok(StepOutcome::Completed { kind, output })
    }
}

fn step_context(run_id: Uuid, config: &BrickConfig) -> MessageContext {
    MessageContext {
        brick_id: Some(config.id.clone()),
        instance_id: Some(config.instance_id),
        label: config.label.clone(),
        run_id: Some(run_id),
        ..MessageContext::default()
    }
}

fn step_event_data(run_id: Uuid, config: &BrickConfig) -> Value {
    json!({
        "runId": run_id,
        "brickId": config.id,
        "instanceId": config.instance_id,
        "label": config.label,
    })
}

/// Readers merge object outputs into the current value.
fn merge_reader_output(current: Value, output: Value) -> Value {
    match (current, output) {
        (Value::Object(mut current), Value::Object(output)) => {
            current.extend(output);
            Value::Object(current)
        }
        (_, output) => output,
    }
}
