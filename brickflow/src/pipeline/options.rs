//! Run options and the shared trace log.

use crate::cancellation::{AbortSignal, CancellationToken};
use crate::context::RootRef;
use crate::core::TraceRecord;
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::{BrickLogger, ErrorReporter, MessageContext, TracingErrorReporter};
use crate::template::ApiVersion;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only log of step traces, shared by a run and its nested pipelines.
#[derive(Debug, Default)]
pub struct TraceLog {
    records: RwLock<Vec<TraceRecord>>,
}

impl TraceLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&self, record: TraceRecord) {
        self.records.write().push(record);
    }

    /// Returns all records.
    #[must_use]
    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.read().clone()
    }

    /// Returns the records of one run.
    #[must_use]
    pub fn records_for_run(&self, run_id: Uuid) -> Vec<TraceRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// Options for a pipeline run.
#[derive(Clone)]
pub struct RunOptions {
    /// Logger carrying the mod context.
    pub logger: BrickLogger,
    /// Cancellation signal.
    pub signal: AbortSignal,
    /// Root passed to root-aware bricks.
    pub root: RootRef,
    /// How plain strings in arguments are treated.
    pub api_version: ApiVersion,
    /// Skip impure bricks.
    pub dry_run: bool,
    /// Mod options, bound as `@options`.
    pub mod_options: Option<Value>,
    /// Receives `brick.*` events.
    pub event_sink: Arc<dyn EventSink>,
    /// Receives unexpected errors.
    pub error_reporter: Arc<dyn ErrorReporter>,
    /// Collects step traces.
    pub trace: Arc<TraceLog>,
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("context", self.logger.context())
            .field("root", &self.root)
            .field("api_version", &self.api_version)
            .field("dry_run", &self.dry_run)
            .field("cancelled", &self.signal.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            logger: BrickLogger::new(MessageContext::new()),
            signal: CancellationToken::signal(),
            root: RootRef::Document,
            api_version: ApiVersion::default(),
            dry_run: false,
            mod_options: None,
            event_sink: Arc::new(NoOpEventSink),
            error_reporter: Arc::new(TracingErrorReporter),
            trace: Arc::new(TraceLog::new()),
        }
    }
}

impl RunOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: BrickLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Sets the cancellation signal.
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = signal;
        self
    }

    /// Sets the root.
    #[must_use]
    pub fn with_root(mut self, root: RootRef) -> Self {
        self.root = root;
        self
    }

    /// Sets the API version.
    #[must_use]
    pub fn with_api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = version;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the mod options.
    #[must_use]
    pub fn with_mod_options(mut self, options: Value) -> Self {
        self.mod_options = Some(options);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the error reporter.
    #[must_use]
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Sets the trace log.
    #[must_use]
    pub fn with_trace(mut self, trace: Arc<TraceLog>) -> Self {
        self.trace = trace;
        self
    }
}
