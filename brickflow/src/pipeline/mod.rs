//! Pipeline definitions and execution.
//!
//! This module provides:
//! - Brick configs and validated pipelines
//! - Run options and the shared trace log
//! - The pipeline interpreter
//! - The seam for running bricks in other frames

mod options;
mod remote;
mod runtime;
mod spec;


pub use options::{RunOptions, TraceLog};
#[cfg(test)]
pub use remote::MockRemoteBrickExecutor;
pub use remote::{RemoteBrickExecutor, RemoteBrickRequest};
pub use runtime::{
    PipelineRunResult, PipelineRuntime, CONDITION_SKIP_REASON, DRY_RUN_SKIP_REASON,
};
pub use spec::{BrickConfig, BrickWindow, Pipeline};
