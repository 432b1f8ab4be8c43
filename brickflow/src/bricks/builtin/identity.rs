//! The identity brick.

use crate::bricks::{Brick, BrickOptions, CapabilityScope};
use crate::core::BrickKind;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Returns its arguments unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityBrick;

impl IdentityBrick {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/identity";
}

#[async_trait]
impl Brick for IdentityBrick {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn run(&self, args: Value, _options: &BrickOptions) -> Result<Value> {
        Ok(args)
    }
}
