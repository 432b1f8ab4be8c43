//! Runtime fixtures for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::bricks::builtin::{PanelEntry, PanelHost};
use crate::bricks::{Brick, BrickOptions, BrickRegistry, CapabilityResolver};
use crate::context::{BrickArgsContext, RootRef};
use crate::errors::Result;
use crate::events::CollectingEventSink;
use crate::observability::CollectingErrorReporter;
use crate::pipeline::{Pipeline, PipelineRunResult, PipelineRuntime, RunOptions, TraceLog};
use crate::utils::generate_uuid;

/// Creates standalone brick options over an empty registry.
#[must_use]
pub fn brick_options() -> BrickOptions {
    let registry = Arc::new(BrickRegistry::new());
    let runtime = PipelineRuntime::new(Arc::clone(&registry));
    let run_options = RunOptions::default();
    BrickOptions::new(
        BrickArgsContext::new(),
        run_options.logger.clone(),
        RootRef::Document,
        generate_uuid(),
        runtime,
        run_options,
        Arc::new(CapabilityResolver::new(registry)),
    )
}

/// A runtime wired to collecting sinks.
#[derive(Debug)]
pub struct TestRuntime {
    /// The brick registry.
    pub registry: Arc<BrickRegistry>,
    /// Collected `brick.*` events.
    pub events: Arc<CollectingEventSink>,
    /// Collected error reports.
    pub errors: Arc<CollectingErrorReporter>,
    /// Shared trace log.
    pub trace: Arc<TraceLog>,
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRuntime {
    /// Creates a harness with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Arc::new(BrickRegistry::new()),
            events: Arc::new(CollectingEventSink::new()),
            errors: Arc::new(CollectingErrorReporter::new()),
            trace: Arc::new(TraceLog::new()),
        }
    }

    /// Registers a brick.
    #[must_use]
    pub fn with_brick(self, brick: Arc<dyn Brick>) -> Self {
        self.registry.register(brick);
        self
    }

    /// Returns a runtime over the registry.
    #[must_use]
    pub fn runtime(&self) -> PipelineRuntime {
        PipelineRuntime::new(Arc::clone(&self.registry))
    }

    /// Returns run options reporting into this harness.
    #[must_use]
    pub fn options(&self) -> RunOptions {
        RunOptions::new()
            .with_event_sink(self.events.clone())
            .with_error_reporter(self.errors.clone())
            .with_trace(Arc::clone(&self.trace))
    }

    /// Runs `pipeline` with default harness options.
    pub async fn run(&self, pipeline: &Pipeline, ctxt: BrickArgsContext) -> Result<PipelineRunResult> {
        self.runtime().run_pipeline(pipeline, ctxt, &self.options()).await
    }
}

/// Panel host that records panels and closes them on request.
#[derive(Debug, Default)]
pub struct RecordingPanelHost {
    shown: Mutex<Vec<PanelEntry>>,
    hidden: Mutex<Vec<Uuid>>,
    closed: Mutex<HashSet<Uuid>>,
    notify: Notify,
}

impl RecordingPanelHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every panel shown so far.
    #[must_use]
    pub fn shown(&self) -> Vec<PanelEntry> {
        self.shown.lock().clone()
    }

    /// Returns ids of hidden panels.
    #[must_use]
    pub fn hidden(&self) -> Vec<Uuid> {
        self.hidden.lock().clone()
    }

    /// Simulates the user closing a panel.
    pub fn close(&self, panel_id: Uuid) {
        self.closed.lock().insert(panel_id);
        self.notify.notify_waiters();
    }

    /// Closes every panel shown so far.
    pub fn close_all(&self) {
        let ids: Vec<Uuid> = self.shown.lock().iter().map(|p| p.id).collect();
        self.closed.lock().extend(ids);
        self.notify.notify_waiters();
    }
}

#[async_trait]
impl PanelHost for RecordingPanelHost {
    async fn show(&self, panel: PanelEntry) -> Result<()> {
        self.shown.lock().push(panel);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn wait_closed(&self, panel_id: Uuid) -> Result<()> {
        loop {
            let notified = self.notify.notified();
            if self.closed.lock().contains(&panel_id) {
                return Ok(());
            }
            notified.await;
        }
    }

    async fn hide(&self, panel_id: Uuid) {
        self.hidden.lock().push(panel_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrick;
    use crate::pipeline::BrickConfig;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_runtime_harness_collects_trace() {
        let harness = TestRuntime::new().with_brick(Arc::new(MockBrick::new("@acme/echo")));
        let pipeline = Pipeline::new(vec![BrickConfig::new("@acme/echo").with_config(json!({"a": 1}))]).unwrap();

        let result = harness.run(&pipeline, BrickArgsContext::new()).await.unwrap();
        assert_eq!(result.output, json!({"a": 1}));
        assert_eq!(harness.trace.len(), 1);
        assert!(harness.errors.is_empty());
    }

    #[tokio::test]
    async fn test_panel_host_close_wakes_waiter() {
        let host = Arc::new(RecordingPanelHost::new());
        let panel_id = generate_uuid();

        let waiter = {
            let host = Arc::clone(&host);
            tokio::spawn(async move { host.wait_closed(panel_id).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        host.close(panel_id);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
