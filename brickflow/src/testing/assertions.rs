//! Trace assertions.

use crate::core::{StepStatus, TraceRecord};

/// Asserts that step `index` ended with `expected`.
pub fn assert_step_status(trace: &[TraceRecord], index: usize, expected: StepStatus) {
    let record = trace
        .get(index)
        .unwrap_or_else(|| panic!("No trace record at index {index}, trace has {}", trace.len()));
    assert_eq!(
        record.status, expected,
        "Expected step {index} ({}) to be {expected}, got {}",
        record.brick_id, record.status
    );
}

/// Asserts the statuses of every step, in order.
pub fn assert_trace_statuses(trace: &[TraceRecord], expected: &[StepStatus]) {
    let actual: Vec<StepStatus> = trace.iter().map(|r| r.status).collect();
    assert_eq!(actual, expected, "Unexpected step statuses");
}

/// Asserts that step `index` was skipped for `reason`.
pub fn assert_skipped(trace: &[TraceRecord], index: usize, reason: &str) {
    assert_step_status(trace, index, StepStatus::Skipped);
    assert_eq!(
        trace[index].skipped_reason.as_deref(),
        Some(reason),
        "Unexpected skip reason for step {index}"
    );
    assert!(trace[index].output.is_none(), "Skipped step {index} has an output");
}

/// Asserts that step `index` failed with an error named `error_name`.
pub fn assert_step_failed(trace: &[TraceRecord], index: usize, error_name: &str) {
    assert_step_status(trace, index, StepStatus::Failed);
    let error = trace[index]
        .error
        .as_ref()
        .unwrap_or_else(|| panic!("Failed step {index} has no error"));
    assert_eq!(error.name, error_name, "Unexpected error for step {index}");
}
