//! Event sink system for run traces and state notifications.
//!
//! The pipeline runner emits `brick.*` events for every step, and the state
//! controller emits [`STATE_CHANGE_EVENT`] after each effective write.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Event type dispatched by the state controller when a value changes.
pub const STATE_CHANGE_EVENT: &str = "statechange";

/// Event type emitted when a brick starts running.
pub const BRICK_STARTED_EVENT: &str = "brick.started";

/// Event type emitted when a brick is skipped.
pub const BRICK_SKIPPED_EVENT: &str = "brick.skipped";

/// Event type emitted when a brick completes.
pub const BRICK_COMPLETED_EVENT: &str = "brick.completed";

/// Event type emitted when a brick fails.
pub const BRICK_FAILED_EVENT: &str = "brick.failed";
