//! Brick trait and implementations.
//!
//! Bricks are the units of work in a brickflow pipeline. Each brick
//! declares its kind and answers capability queries that may depend on
//! nested bricks.

pub mod builtin;
mod composite;
mod options;
mod registry;
mod resolver;

pub use composite::CompositeBrick;
pub use options::BrickOptions;
pub use registry::BrickRegistry;
pub use resolver::{BrickCapabilities, CapabilityResolver, CapabilityScope};

use crate::core::BrickKind;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

/// Trait for pipeline bricks.
#[async_trait]
pub trait Brick: Send + Sync + Debug {
    /// Returns the registry id of the brick.
    fn id(&self) -> &str;

    /// Returns the kind of the brick.
    fn kind(&self) -> BrickKind;

    /// Returns true if the brick has no side effects.
    ///
    /// Composite bricks answer by resolving their nested bricks through
    /// `scope`.
    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(false)
    }

    /// Returns true if the brick reads or writes relative to a root element.
    async fn is_root_aware(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(false)
    }

    /// Runs the brick.
    ///
    /// # Arguments
    ///
    /// * `args` - The rendered arguments
    /// * `options` - Run context, logger, root and nested pipeline access
    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value>;
}
