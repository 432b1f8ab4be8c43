//! Cross-context messaging.
//!
//! This module provides:
//! - Context kinds and targets
//! - A message bus with per-context endpoints
//! - Typed method registration and calls with timeouts
//! - Background routing of brick runs between tabs
//! - Host permission match patterns
//! - Coalescing of concurrent identical requests
//!
//! Handlers run where they are registered; arguments and results cross the
//! bus as JSON and errors as [`SerializedError`](crate::errors::SerializedError).

mod background;
mod bus;
mod content;
mod context;
mod endpoint;
mod envelope;
mod executor;
mod linkage;
mod memoize;
pub mod methods;
mod permissions;

#[cfg(test)]
pub use background::MockTabLauncher;
pub use background::{BackgroundRouter, BroadcastResult, TabLauncher};
pub use bus::{MessageBus, RECEIVING_END_MISSING};
pub use content::register_content_script_methods;
pub use context::{ContextKind, FrameId, SenderInfo, TabId, Target, TOP_FRAME_ID};
pub use endpoint::Messenger;
pub use envelope::{Envelope, Reply};
pub use executor::MessengerRemoteExecutor;
pub use linkage::TabLinkage;
pub use memoize::MemoizeUntilSettled;
pub use methods::MethodSpec;
pub use permissions::{HostPermissions, MatchPattern};
