//! Execution context for pipeline runs.
//!
//! This module provides:
//! - The persistent `@`-variable environment threaded through a run
//! - Root references for root-aware bricks

mod args;
mod root;

pub use args::{BrickArgsContext, OutputKey, INPUT_KEY, OPTIONS_KEY};
pub use root::{RootMode, RootRef};
