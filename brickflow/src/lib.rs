//! # Brickflow
//!
//! A runtime for brick pipelines as run by a browser-extension automation
//! platform.
//!
//! Brickflow provides:
//!
//! - **Pipeline interpretation**: sequential bricks with template-rendered
//!   arguments, conditions, output binding, roots and renderer termination
//! - **Cross-context messaging**: typed request/response methods between the
//!   background, tabs, frames and panels, with timeouts and readiness polling
//! - **Remote execution**: running bricks in the opener, target, top frame or
//!   every permitted tab
//! - **Page state**: namespaced state with replace, shallow and deep merges
//! - **OAuth2**: the code grant with PKCE and a token cache
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brickflow::prelude::*;
//!
//! let registry = Arc::new(BrickRegistry::new());
//! registry.register(Arc::new(IdentityBrick));
//!
//! let pipeline: Pipeline = serde_json::from_value(json!([
//!     {"id": "@brickflow/identity", "config": {"greeting": "hi"}, "outputKey": "out"}
//! ]))?;
//!
//! let result = PipelineRuntime::new(registry)
//!     .run_pipeline(&pipeline, BrickArgsContext::with_input(json!({})), &RunOptions::default())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bricks;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod integrations;
pub mod messenger;
pub mod observability;
pub mod pipeline;
pub mod state;
pub mod template;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bricks::builtin::{
        ForEachBrick, GetStateBrick, IdentityBrick, LookupBrick, MarkdownRenderer, SetStateBrick,
    };
    pub use crate::bricks::{Brick, BrickOptions, BrickRegistry, CapabilityResolver};
    pub use crate::cancellation::{AbortSignal, CancellationToken};
    pub use crate::config::RuntimeConfig;
    pub use crate::context::{BrickArgsContext, OutputKey, RootMode, RootRef};
    pub use crate::core::{BrickKind, StepStatus, TraceRecord};
    pub use crate::errors::{BrickflowError, Result};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::messenger::{MessageBus, Messenger, Target};
    pub use crate::observability::{init_tracing, BrickLogger, ErrorReporter};
    pub use crate::pipeline::{
        BrickConfig, BrickWindow, Pipeline, PipelineRunResult, PipelineRuntime, RunOptions,
    };
    pub use crate::state::{MergeStrategy, StateController, StateNamespace};
    pub use crate::template::{Expression, ExpressionType};
    pub use crate::utils::{generate_uuid, iso_timestamp, Timestamp};
}
