//! Per-step trace records and renderer payloads.

use super::StepStatus;
use crate::errors::SerializedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Trace of a single pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    /// The run the step belongs to.
    pub run_id: Uuid,
    /// The brick instance id.
    pub instance_id: Uuid,
    /// The brick registry id.
    pub brick_id: String,
    /// The step label, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Final status.
    pub status: StepStatus,
    /// Arguments after rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered_args: Option<Value>,
    /// Brick output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Error raised by the brick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SerializedError>,
    /// Why the step was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step reached its terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TraceRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn pending(
        run_id: Uuid,
        instance_id: Uuid,
        brick_id: impl Into<String>,
        label: Option<String>,
    ) -> Self {
        Self {
            run_id,
            instance_id,
            brick_id: brick_id.into(),
            label,
            status: StepStatus::Pending,
            rendered_args: None,
            output: None,
            error: None,
            skipped_reason: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Moves the record to `Running`.
    pub fn start(&mut self, rendered_args: Value) {
        debug_assert!(self.status.can_transition_to(StepStatus::Running));
        self.status = StepStatus::Running;
        self.rendered_args = Some(rendered_args);
    }

    /// Moves the record to `Skipped`.
    pub fn skip(&mut self, reason: impl Into<String>) {
        debug_assert!(self.status.can_transition_to(StepStatus::Skipped));
        self.status = StepStatus::Skipped;
        self.skipped_reason = Some(reason.into());
        self.ended_at = Some(Utc::now());
    }

    /// Moves the record to `Succeeded`.
    pub fn succeed(&mut self, output: Value) {
        self.status = StepStatus::Succeeded;
        self.output = Some(output);
        self.ended_at = Some(Utc::now());
    }

    /// Moves the record to `Failed`.
    pub fn fail(&mut self, error: SerializedError) {
        self.status = StepStatus::Failed;
        self.error = Some(error);
        self.ended_at = Some(Utc::now());
    }

    /// Returns the step duration in milliseconds, once terminal.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at
            .map(|ended| (ended - self.started_at).num_milliseconds())
    }
}

/// Output of a renderer brick, surfaced to the caller instead of flowing on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererPayload {
    /// The renderer brick id.
    pub brick_id: String,
    /// The run that produced the payload.
    pub run_id: Uuid,
    /// The rendered content.
    pub payload: Value,
}
