//! Testing utilities for brickflow pipelines.
//!
//! This module provides:
//! - Mock bricks
//! - Trace assertions
//! - A runtime harness and an in-memory panel host

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_skipped, assert_step_failed, assert_step_status, assert_trace_statuses,
};
pub use fixtures::{brick_options, RecordingPanelHost, TestRuntime};
pub use mocks::{FailingBrick, MockBrick, RecordedExecution, RecordingBrick, SlowBrick};
