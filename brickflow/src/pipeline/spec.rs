//! Brick configurations and pipeline definitions.

use crate::context::{OutputKey, RootMode};
use crate::errors::{BrickflowError, Result};
use crate::template::{Expression, ExpressionType};
use crate::utils::generate_uuid;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// The frame a brick runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrickWindow {
    /// The frame running the pipeline.
    #[default]
    #[serde(rename = "self")]
    Local,
    /// The tab that opened this one.
    Opener,
    /// The tab this one opened.
    Target,
    /// The top-level frame of this tab.
    Top,
    /// Every matching tab except this one.
    Broadcast,
}

impl BrickWindow {
    /// Returns true if the brick runs in the current frame.
    #[must_use]
    pub fn is_local(self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for BrickWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "self",
            Self::Opener => "opener",
            Self::Target => "target",
            Self::Top => "top",
            Self::Broadcast => "broadcast",
        };
        f.write_str(name)
    }
}

fn empty_config() -> Value {
    Value::Object(serde_json::Map::new())
}

/// One brick invocation within a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrickConfig {
    /// Registry id of the brick.
    pub id: String,
    /// Arguments, possibly containing expressions.
    #[serde(default = "empty_config")]
    pub config: Value,
    /// Optional condition; falsy skips the step.
    #[serde(default, rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    /// Variable to bind the output to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<OutputKey>,
    /// Where the brick runs.
    #[serde(default)]
    pub window: BrickWindow,
    /// How the root is picked.
    #[serde(default)]
    pub root_mode: RootMode,
    /// Root selector for [`RootMode::Element`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    /// Label shown in traces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Instance id used in traces.
    #[serde(default = "generate_uuid")]
    pub instance_id: Uuid,
}

impl BrickConfig {
    /// Creates a config with empty arguments.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            config: empty_config(),
            condition: None,
            output_key: None,
            window: BrickWindow::default(),
            root_mode: RootMode::default(),
            root: None,
            label: None,
            instance_id: generate_uuid(),
        }
    }

    /// Sets the arguments.
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Sets the `if` condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<Value>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Sets the output key.
    #[must_use]
    pub fn with_output_key(mut self, key: OutputKey) -> Self {
        self.output_key = Some(key);
        self
    }

    /// Sets the window.
    #[must_use]
    pub fn with_window(mut self, window: BrickWindow) -> Self {
        self.window = window;
        self
    }

    /// Runs the brick against the element matching `selector`.
    #[must_use]
    pub fn with_root(mut self, selector: impl Into<String>) -> Self {
        self.root_mode = RootMode::Element;
        self.root = Some(selector.into());
        self
    }

    /// Sets the root mode.
    #[must_use]
    pub fn with_root_mode(mut self, mode: RootMode) -> Self {
        self.root_mode = mode;
        self
    }

    /// Sets the trace label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Validates a single config.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(BrickflowError::invalid_definition("Brick id cannot be empty"));
        }
        if self.root_mode == RootMode::Element && self.root.is_none() {
            return Err(BrickflowError::invalid_definition(format!(
                "Brick {} uses element root mode without a root selector",
                self.id
            )));
        }
        Ok(())
    }
}

/// An ordered list of brick configs with unique output keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Pipeline {
    steps: Vec<BrickConfig>,
}

impl Pipeline {
    /// Creates a validated pipeline.
    pub fn new(steps: Vec<BrickConfig>) -> Result<Self> {
        let mut seen = HashSet::new();
        for step in &steps {
            step.validate()?;
            if let Some(key) = &step.output_key {
                if !seen.insert(key.as_str().to_string()) {
                    return Err(BrickflowError::invalid_definition(format!(
                        "Duplicate output key: {key}"
                    )));
                }
            }
        }
        Ok(Self { steps })
    }

    /// Parses a pipeline from JSON.
    ///
    /// Accepts an array of configs, a single config, or a `pipeline`
    /// expression wrapping either.
    pub fn from_value(value: &Value) -> Result<Self> {
        if let Some(expr) = Expression::from_value(value) {
            if expr.kind != ExpressionType::Pipeline {
                return Err(BrickflowError::invalid_definition(format!(
                    "Expected a pipeline expression, got {}",
                    expr.kind
                )));
            }
            return Self::from_value(&expr.value);
        }

        let steps = match value {
            Value::Array(_) => serde_json::from_value::<Vec<BrickConfig>>(value.clone()),
            Value::Object(_) => serde_json::from_value::<BrickConfig>(value.clone()).map(|c| vec![c]),
            Value::Null => Ok(Vec::new()),
            _ => {
                return Err(BrickflowError::invalid_definition(
                    "Pipeline must be an array of brick configs",
                ))
            }
        }
        .map_err(|e| BrickflowError::invalid_definition(format!("Invalid pipeline: {e}")))?;

        Self::new(steps)
    }

    /// Returns the steps.
    #[must_use]
    pub fn steps(&self) -> &[BrickConfig] {
        &self.steps
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl<'de> Deserialize<'de> for Pipeline {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let steps = Vec::<BrickConfig>::deserialize(deserializer)?;
        Self::new(steps).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: BrickConfig = serde_json::from_value(json!({
            "id": "@pixiebrix/identity",
            "if": {"__type__": "var", "__value__": "@flag"},
            "outputKey": "result",
            "window": "opener",
        }))
        .unwrap();

        assert_eq!(config.config, json!({}));
        assert!(config.condition.is_some());
        assert_eq!(config.output_key.unwrap().as_str(), "result");
        assert_eq!(config.window, BrickWindow::Opener);
        assert_eq!(config.root_mode, RootMode::Inherit);
    }

    #[test]
    fn test_window_serde() {
        assert_eq!(serde_json::to_value(BrickWindow::Local).unwrap(), json!("self"));
        let window: BrickWindow = serde_json::from_value(json!("self")).unwrap();
        assert!(window.is_local());
    }

    #[test]
    fn test_duplicate_output_keys_rejected() {
        let key = OutputKey::new("foo").unwrap();
        let err = Pipeline::new(vec![
            BrickConfig::new("@acme/a").with_output_key(key.clone()),
            BrickConfig::new("@acme/b").with_output_key(key),
        ])
        .unwrap_err();
        assert_eq!(err.name(), "InvalidDefinitionError");
    }

    #[test]
    fn test_element_root_requires_selector() {
        let config = BrickConfig::new("@acme/a").with_root_mode(RootMode::Element);
        assert!(Pipeline::new(vec![config]).is_err());
        assert!(Pipeline::new(vec![BrickConfig::new("@acme/a").with_root("#main")]).is_ok());
    }

    #[test]
    fn test_from_value_forms() {
        let single = Pipeline::from_value(&json!({"id": "@acme/a"})).unwrap();
        assert_eq!(single.len(), 1);

        let wrapped = Pipeline::from_value(&json!({
            "__type__": "pipeline",
            "__value__": [{"id": "@acme/a"}, {"id": "@acme/b"}],
        }))
        .unwrap();
        assert_eq!(wrapped.len(), 2);

        assert!(Pipeline::from_value(&Value::Null).unwrap().is_empty());
        assert!(Pipeline::from_value(&json!("nope")).is_err());
        assert!(Pipeline::from_value(&json!({"__type__": "var", "__value__": "@x"})).is_err());
    }

    #[test]
    fn test_pipeline_deserialize_validates() {
        let result: std::result::Result<Pipeline, _> = serde_json::from_value(json!([
            {"id": "@acme/a", "outputKey": "x"},
            {"id": "@acme/b", "outputKey": "x"},
        ]));
        assert!(result.is_err());
    }
}
