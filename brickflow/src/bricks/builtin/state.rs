//! Bricks reading and writing page/mod state.

use crate::bricks::{Brick, BrickOptions, CapabilityScope};
use crate::core::BrickKind;
use crate::errors::{BrickflowError, Result};
use crate::state::{GetStateRequest, MergeStrategy, SetStateRequest, StateController, StateNamespace};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;

fn default_namespace() -> StateNamespace {
    StateNamespace::Mod
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetStateArgs {
    #[serde(default = "default_namespace")]
    namespace: StateNamespace,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetStateArgs {
    #[serde(default = "default_namespace")]
    namespace: StateNamespace,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    merge_strategy: MergeStrategy,
}

fn parse_args<T: for<'de> Deserialize<'de>>(args: Value) -> Result<T> {
    serde_json::from_value(args.clone())
        .map_err(|e| BrickflowError::prop(format!("Invalid state arguments: {e}"), "args", args))
}

/// Reads state for the running mod component.
#[derive(Debug, Clone)]
pub struct GetStateBrick {
    state: Arc<StateController>,
}

impl GetStateBrick {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/state/get";

    /// Creates the brick over `state`.
    #[must_use]
    pub fn new(state: Arc<StateController>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Brick for GetStateBrick {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    async fn is_pure(&self, _scope: &CapabilityScope<'_>) -> Result<bool> {
        Ok(true)
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        let GetStateArgs { namespace } = parse_args(args)?;
        let context = options.logger.context();
        self.state.get_state(&GetStateRequest {
            namespace,
            mod_component_id: context.mod_component_id.clone(),
            mod_id: context.mod_id.clone(),
        })
    }
}

/// Merges data into state for the running mod component.
#[derive(Debug, Clone)]
pub struct SetStateBrick {
    state: Arc<StateController>,
}

impl SetStateBrick {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/state/set";

    /// Creates the brick over `state`.
    #[must_use]
    pub fn new(state: Arc<StateController>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Brick for SetStateBrick {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        let SetStateArgs {
            namespace,
            data,
            merge_strategy,
        } = parse_args(args)?;
        let context = options.logger.context();
        self.state.set_state(SetStateRequest {
            namespace,
            data: Value::Object(data),
            merge_strategy,
            mod_component_id: context.mod_component_id.clone(),
            mod_id: context.mod_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{BrickLogger, MessageContext};
    use crate::testing::brick_options;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_then_get_in_mod_namespace() {
        let state = Arc::new(StateController::default());
        let mut options = brick_options();
        options.logger = BrickLogger::new(MessageContext::new().with_mod_id("@acme/mod"));

        let merged = SetStateBrick::new(Arc::clone(&state))
            .run(json!({"data": {"count": 1}}), &options)
            .await
            .unwrap();
        assert_eq!(merged, json!({"count": 1}));

        let value = GetStateBrick::new(Arc::clone(&state))
            .run(json!({}), &options)
            .await
            .unwrap();
        assert_eq!(value, json!({"count": 1}));

        let stored = state
            .get_state(&GetStateRequest::new(StateNamespace::Mod).with_mod_id("@acme/mod"))
            .unwrap();
        assert_eq!(stored, json!({"count": 1}));
    }

    #[tokio::test]
    async fn test_private_namespace_uses_component_id() {
        let state = Arc::new(StateController::default());
        let options = brick_options();

        let err = SetStateBrick::new(Arc::clone(&state))
            .run(json!({"namespace": "private", "data": {"a": 1}}), &options)
            .await
            .unwrap_err();
        assert!(err.is_business_error());
    }

    #[tokio::test]
    async fn test_invalid_args_are_prop_errors() {
        let state = Arc::new(StateController::default());
        let err = SetStateBrick::new(state)
            .run(json!({"data": [1, 2]}), &brick_options())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "PropError");
    }
}
