//! Error reporting for the application blame bucket.
//!
//! Business errors are never reported; everything else is forwarded to the
//! configured [`ErrorReporter`].

use super::MessageContext;
use crate::errors::BrickflowError;
use parking_lot::RwLock;
use tracing::error;

/// Receives unexpected (non-business) errors for engineering follow-up.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error with its origin.
    fn report(&self, error: &BrickflowError, context: &MessageContext);
}

/// Reporter that logs errors through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, err: &BrickflowError, context: &MessageContext) {
        error!(
            error_name = err.name(),
            brick_id = ?context.brick_id,
            mod_id = ?context.mod_id,
            mod_component_id = ?context.mod_component_id,
            "Unexpected error: {err}"
        );
    }
}

/// Reporter that keeps reported errors in memory.
#[derive(Debug, Default)]
pub struct CollectingErrorReporter {
    reports: RwLock<Vec<(BrickflowError, MessageContext)>>,
}

impl CollectingErrorReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the reported errors.
    #[must_use]
    pub fn reports(&self) -> Vec<(BrickflowError, MessageContext)> {
        self.reports.read().clone()
    }

    /// Returns the number of reported errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.read().len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.read().is_empty()
    }
}

impl ErrorReporter for CollectingErrorReporter {
    fn report(&self, err: &BrickflowError, context: &MessageContext) {
        self.reports.write().push((err.clone(), context.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingErrorReporter::new();
        assert!(reporter.is_empty());

        reporter.report(
            &BrickflowError::internal("boom"),
            &MessageContext::new().with_mod_id("@acme/mod"),
        );

        assert_eq!(reporter.len(), 1);
        assert_eq!(reporter.reports()[0].1.mod_id.as_deref(), Some("@acme/mod"));
        TracingErrorReporter.report(&BrickflowError::internal("boom"), &MessageContext::new());
    }
}
