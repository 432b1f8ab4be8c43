//! Recursive argument rendering.

use super::expression::{Expression, ExpressionType};
use super::interpolate::render_template;
use super::path::lookup_path;
use super::truthy::boolean;
use crate::context::BrickArgsContext;
use crate::errors::{BrickflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Runtime API version of a mod definition.
///
/// `V3` only renders explicit expressions. `V1` and `V2` also treat plain
/// strings containing `{{` as implicit mustache templates, and `V2`
/// resolves bare `@path` strings as variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// Implicit mustache.
    V1,
    /// Implicit mustache and `@` variables.
    V2,
    /// Explicit expressions only.
    #[default]
    V3,
}

fn is_bare_variable(s: &str) -> bool {
    s.starts_with('@') && s.len() > 1 && !s.contains(char::is_whitespace)
}

fn render_expression(expr: Expression, ctxt: &BrickArgsContext, original: &Value) -> Result<Value> {
    if expr.kind.is_deferred() {
        return Ok(original.clone());
    }

    let Value::String(body) = &expr.value else {
        return Err(BrickflowError::invalid_template(
            format!("Expected a string body for {} expression", expr.kind),
            expr.value.to_string(),
        ));
    };

    match expr.kind {
        ExpressionType::Var => lookup_path(ctxt, body),
        _ => render_template(body, ctxt).map(Value::String),
    }
}

/// Renders `value` against `ctxt`.
///
/// Objects and arrays are rendered recursively. `pipeline` and `defer`
/// expressions are returned untouched.
pub fn render_args(value: &Value, ctxt: &BrickArgsContext, version: ApiVersion) -> Result<Value> {
    if let Some(expr) = Expression::from_value(value) {
        return render_expression(expr, ctxt, value);
    }

    match value {
        Value::Object(map) => {
            let mut rendered = Map::with_capacity(map.len());
            for (key, item) in map {
                rendered.insert(key.clone(), render_args(item, ctxt, version)?);
            }
            Ok(Value::Object(rendered))
        }
        Value::Array(items) => items
            .iter()
            .map(|item| render_args(item, ctxt, version))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::String(s) if version < ApiVersion::V3 => {
            if version == ApiVersion::V2 && is_bare_variable(s) {
                lookup_path(ctxt, s)
            } else if s.contains("{{") {
                render_template(s, ctxt).map(Value::String)
            } else {
                Ok(value.clone())
            }
        }
        _ => Ok(value.clone()),
    }
}

/// Renders an `if` condition and coerces it with [`boolean`].
pub fn evaluate_condition(
    condition: &Value,
    ctxt: &BrickArgsContext,
    version: ApiVersion,
) -> Result<bool> {
    render_args(condition, ctxt, version).map(|rendered| boolean(&rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctxt() -> BrickArgsContext {
        BrickArgsContext::with_input(json!({"url": "https://example.com", "count": 2}))
            .bind("@flag", json!("off"))
    }

    #[test]
    fn test_renders_nested_expressions() {
        let args = json!({
            "url": {"__type__": "var", "__value__": "@input.url"},
            "greeting": {"__type__": "nunjucks", "__value__": "n={{ @input.count }}"},
            "list": [{"__type__": "var", "__value__": "@input.count"}, "literal {{ x }}"],
        });

        let rendered = render_args(&args, &ctxt(), ApiVersion::V3).unwrap();
        assert_eq!(
            rendered,
            json!({
                "url": "https://example.com",
                "greeting": "n=2",
                "list": [2, "literal {{ x }}"],
            })
        );
    }

    #[test]
    fn test_pipeline_left_unrendered() {
        let args = json!({"body": {"__type__": "pipeline", "__value__": [{"id": "@acme/x"}]}});
        assert_eq!(render_args(&args, &ctxt(), ApiVersion::V3).unwrap(), args);
    }

    #[test]
    fn test_implicit_templates_in_older_versions() {
        let args = json!({"a": "{{ @input.count }}", "b": "@input.url"});

        assert_eq!(
            render_args(&args, &ctxt(), ApiVersion::V1).unwrap(),
            json!({"a": "2", "b": "@input.url"})
        );
        assert_eq!(
            render_args(&args, &ctxt(), ApiVersion::V2).unwrap(),
            json!({"a": "2", "b": "https://example.com"})
        );
    }

    #[test]
    fn test_evaluate_condition() {
        let ctxt = ctxt();
        let flag = json!({"__type__": "var", "__value__": "@flag"});
        assert!(!evaluate_condition(&flag, &ctxt, ApiVersion::V3).unwrap());
        assert!(evaluate_condition(&json!(true), &ctxt, ApiVersion::V3).unwrap());
        assert!(!evaluate_condition(&json!({"__type__": "var", "__value__": "@nope"}), &ctxt, ApiVersion::V3).unwrap());
    }

    #[test]
    fn test_non_string_var_body_fails() {
        let err = render_args(&json!({"__type__": "var", "__value__": 1}), &ctxt(), ApiVersion::V3)
            .unwrap_err();
        assert_eq!(err.name(), "InvalidTemplateError");
    }
}
