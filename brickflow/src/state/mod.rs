//! Page/mod state controller.
//!
//! An in-memory keyed store with three isolation namespaces, three merge
//! strategies and `statechange` notifications.

mod controller;
mod merge;
mod namespace;

pub use controller::{
    GetStateRequest, PlatformCapabilities, SetStateRequest, StateChange, StateController,
};
pub use merge::{deep_merge, merge_state, MergeStrategy};
pub use namespace::StateNamespace;
