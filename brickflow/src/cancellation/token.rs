//! Abort signals shared by runs, bricks and panel waits.

use crate::errors::{BrickflowError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Reason used when a run is aborted without one.
pub const DEFAULT_CANCEL_REASON: &str = "Run cancelled";

type AbortListener = Box<dyn FnOnce() + Send>;

/// Shared handle to a [`CancellationToken`].
pub type AbortSignal = Arc<CancellationToken>;

#[derive(Default)]
struct AbortState {
    reason: Option<String>,
    listeners: Vec<AbortListener>,
}

/// Cooperative cancellation flag with abort listeners.
///
/// Aborting twice keeps the first reason. Listeners run once, on the thread
/// that aborts.
#[derive(Default)]
pub struct CancellationToken {
    aborted: AtomicBool,
    state: Mutex<AbortState>,
    waiters: Notify,
}

fn run_listener(listener: AbortListener) {
    if catch_unwind(AssertUnwindSafe(listener)).is_err() {
        warn!("Abort listener panicked");
    }
}

impl CancellationToken {
    /// Creates a token that is not aborted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared [`AbortSignal`].
    #[must_use]
    pub fn signal() -> AbortSignal {
        Arc::new(Self::new())
    }

    /// Aborts with `reason`. Later calls are ignored.
    pub fn cancel(&self, reason: impl Into<String>) {
        let listeners = {
            let mut state = self.state.lock();
            if self.aborted.swap(true, Ordering::SeqCst) {
                return;
            }
            state.reason = Some(reason.into());
            std::mem::take(&mut state.listeners)
        };

        listeners.into_iter().for_each(run_listener);
        self.waiters.notify_waiters();
    }

    /// Calls `listener` on abort, or right away if already aborted.
    pub fn on_cancel<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.state.lock();
        if self.is_cancelled() {
            drop(state);
            run_listener(Box::new(listener));
        } else {
            state.listeners.push(Box::new(listener));
        }
    }

    /// Returns true once aborted.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Returns the abort reason.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.state.lock().reason.clone()
    }

    /// Returns a `CancelError` carrying the reason if aborted.
    pub fn check(&self) -> Result<()> {
        if !self.is_cancelled() {
            return Ok(());
        }
        let reason = self
            .reason()
            .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
        Err(BrickflowError::cancel(reason))
    }

    /// Resolves once the token is aborted.
    pub async fn cancelled(&self) {
        loop {
            let wakeup = self.waiters.notified();
            if self.is_cancelled() {
                break;
            }
            wakeup.await;
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("aborted", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish_non_exhaustive()
    }
}
