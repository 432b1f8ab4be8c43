//! Mock bricks for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::bricks::{Brick, BrickOptions, CapabilityScope};
use crate::context::RootRef;
use crate::core::BrickKind;
use crate::errors::{BrickflowError, Result};
use crate::observability::MessageContext;

/// A brick with configurable kind, capabilities and output.
///
/// Without an explicit output it echoes its arguments.
#[derive(Debug)]
pub struct MockBrick {
    id: String,
    kind: BrickKind,
    pure: bool,
    root_aware: bool,
    output: Mutex<Option<Value>>,
    call_count: AtomicUsize,
    capability_queries: AtomicUsize,
}

impl MockBrick {
    /// Creates an impure transformer that echoes its arguments.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BrickKind::Transformer,
            pure: false,
            root_aware: false,
            output: Mutex::new(None),
            call_count: AtomicUsize::new(0),
            capability_queries: AtomicUsize::new(0),
        }
    }

    /// Sets the brick kind.
    #[must_use]
    pub fn with_kind(mut self, kind: BrickKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns a fixed output instead of echoing.
    #[must_use]
    pub fn with_output(self, output: Value) -> Self {
        *self.output.lock() = Some(output);
        self
    }

    /// Marks the brick as pure.
    #[must_use]
    pub fn pure(mut self) -> Self {
        self.pure = true;
        self
    }

    /// Marks the brick as root-aware.
    #[must_use]
    pub fn root_aware(mut self) -> Self {
        self.root_aware = true;
        self
    }

    /// Sets the output to return.
    pub fn set_output(&self, output: Value) {
        *self.output.lock() = Some(output);
    }

    /// Returns the number of times the brick ran.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Returns the number of `is_pure`/`is_root_aware` queries.
    #[must_use]
    pub fn capability_queries(&self) -> usize {
        self.capability_queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Brick for MockBrick {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BrickKind {
        self.kind
    }

    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        self.capability_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.pure)
    }

    async fn is_root_aware(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        self.capability_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.root_aware)
    }

    async fn run(&self, args: Value, _options: &BrickOptions) -> Result<Value> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.lock().clone().unwrap_or(args))
    }
}

/// A brick that always fails with the configured error.
#[derive(Debug)]
pub struct FailingBrick {
    id: String,
    error: BrickflowError,
}

impl FailingBrick {
    /// Creates a brick failing with `error`.
    #[must_use]
    pub fn new(id: impl Into<String>, error: BrickflowError) -> Self {
        Self {
            id: id.into(),
            error,
        }
    }

    /// Creates a brick failing with a business error.
    #[must_use]
    pub fn business(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, BrickflowError::business(message))
    }

    /// Creates a brick failing with an unexpected error.
    #[must_use]
    pub fn internal(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(id, BrickflowError::internal(message))
    }
}

#[async_trait]
impl Brick for FailingBrick {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Effect
    }

    async fn run(&self, _args: Value, _options: &BrickOptions) -> Result<Value> {
        Err(self.error.clone())
    }
}

/// A brick that waits before echoing its arguments. Honors cancellation.
#[derive(Debug)]
pub struct SlowBrick {
    id: String,
    delay: Duration,
}

impl SlowBrick {
    /// Creates a slow brick.
    #[must_use]
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
        }
    }

    /// Creates a slow brick with a delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(id: impl Into<String>, ms: u64) -> Self {
        Self::new(id, Duration::from_millis(ms))
    }
}

#[async_trait]
impl Brick for SlowBrick {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => Ok(args),
            () = options.signal.cancelled() => options.signal.check().map(|()| Value::Null),
        }
    }
}

/// A recorded brick run.
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    /// Rendered arguments.
    pub args: Value,
    /// Root handed to the brick.
    pub root: RootRef,
    /// The context the arguments were rendered against.
    pub ctxt: Value,
    /// Logger context of the run.
    pub context: MessageContext,
}

/// A brick that records every run and echoes its arguments.
#[derive(Debug)]
pub struct RecordingBrick {
    id: String,
    kind: BrickKind,
    root_aware: bool,
    executions: Mutex<Vec<RecordedExecution>>,
}

impl RecordingBrick {
    /// Creates a recording transformer.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: BrickKind::Transformer,
            root_aware: false,
            executions: Mutex::new(Vec::new()),
        }
    }

    /// Sets the brick kind.
    #[must_use]
    pub fn with_kind(mut self, kind: BrickKind) -> Self {
        self.kind = kind;
        self
    }

    /// Marks the brick as root-aware.
    #[must_use]
    pub fn root_aware(mut self) -> Self {
        self.root_aware = true;
        self
    }

    /// Returns all recorded runs.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns the number of runs.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().len()
    }

    /// Clears recorded runs.
    pub fn clear(&self) {
        self.executions.lock().clear();
    }
}

#[async_trait]
impl Brick for RecordingBrick {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> BrickKind {
        self.kind
    }

    async fn is_root_aware(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(self.root_aware)
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        self.executions.lock().push(RecordedExecution {
            args: args.clone(),
            root: options.root.clone(),
            ctxt: options.ctxt.to_value(),
            context: options.logger.context().clone(),
        });
        Ok(args)
    }
}
