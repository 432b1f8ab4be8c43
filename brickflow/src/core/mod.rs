//! Core domain types shared by the runtime.
//!
//! - Brick kinds and step statuses
//! - Per-step trace records
//! - Renderer payloads

mod status;
mod trace;

pub use status::{BrickKind, StepStatus};
pub use trace::{RendererPayload, TraceRecord};
