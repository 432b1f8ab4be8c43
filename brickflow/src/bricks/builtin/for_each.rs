//! Controller brick running a pipeline per element.

use crate::bricks::{Brick, BrickOptions};
use crate::context::BrickArgsContext;
use crate::core::BrickKind;
use crate::errors::{BrickflowError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

fn default_element_key() -> String {
    "element".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ForEachArgs {
    elements: Vec<Value>,
    body: Value,
    #[serde(default = "default_element_key")]
    element_key: String,
}

/// Runs `body` once per element with the element bound as `@element`.
///
/// Returns the output of the last iteration, or `null` for no elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForEachBrick;

impl ForEachBrick {
    /// Registry id.
    pub const ID: &'static str = "@brickflow/for-each";
}

#[async_trait]
impl Brick for ForEachBrick {
    fn id(&self) -> &str {
        Self::ID
    }

    fn kind(&self) -> BrickKind {
        BrickKind::Transformer
    }

    async fn run(&self, args: Value, options: &BrickOptions) -> Result<Value> {
        let ForEachArgs {
            elements,
            body,
            element_key,
        } = serde_json::from_value(args.clone())
            .map_err(|e| BrickflowError::prop(format!("Invalid for-each arguments: {e}"), "args", args))?;

        let variable = format!("@{element_key}");
        let mut last = Value::Null;
        for element in elements {
            options.signal.check()?;
            let extra = BrickArgsContext::new().bind(variable.clone(), element);
            last = options.run_pipeline(&body, &extra).await?;
        }

        options
            .logger
            .debug(&format!("for-each finished over {variable}"));
        Ok(last)
    }
}
