//! Cooperative cancellation for brick runs and cancelable waits.
//!
//! [`AbortSignal`] is the shared handle passed into bricks and UI-facing
//! waits; a run observes it between steps and converts it into a typed
//! [`crate::errors::BrickflowError::Cancel`].

mod token;

pub use token::{AbortSignal, CancellationToken};
