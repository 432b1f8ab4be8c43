//! Brick kind and step status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a brick performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrickKind {
    /// Reads data from the page; outputs merge into the current value.
    Reader,
    /// Transforms data; outputs replace the current value.
    #[default]
    Transformer,
    /// Performs a side effect; the current value is left unchanged.
    Effect,
    /// Produces a panel payload and terminates the pipeline.
    Renderer,
}

impl fmt::Display for BrickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reader => write!(f, "reader"),
            Self::Transformer => write!(f, "transform"),
            Self::Effect => write!(f, "effect"),
            Self::Renderer => write!(f, "renderer"),
        }
    }
}

/// The execution status of a single pipeline step.
///
/// `Pending → Skipped` or `Pending → Running → Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not yet reached.
    #[default]
    Pending,
    /// Condition was falsy (or the brick was impure in a dry run).
    Skipped,
    /// Currently executing.
    Running,
    /// Completed successfully.
    Succeeded,
    /// Raised an error.
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Skipped => write!(f, "skipped"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl StepStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Skipped | Self::Succeeded | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this status.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Skipped | Self::Running)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }
}
