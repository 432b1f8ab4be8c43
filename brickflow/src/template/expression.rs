//! Explicit expression objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Key naming the expression type.
pub const EXPRESSION_TYPE_KEY: &str = "__type__";

/// Key holding the expression body.
pub const EXPRESSION_VALUE_KEY: &str = "__value__";

/// The kind of an explicit expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionType {
    /// Variable path lookup.
    Var,
    /// Mustache interpolation.
    Mustache,
    /// Nunjucks interpolation (the `{{ }}` subset).
    Nunjucks,
    /// Handlebars interpolation (the `{{ }}` subset).
    Handlebars,
    /// A nested pipeline run by a controller brick.
    Pipeline,
    /// A value rendered later by the brick that owns it.
    Defer,
}

impl ExpressionType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "var" => Some(Self::Var),
            "mustache" => Some(Self::Mustache),
            "nunjucks" => Some(Self::Nunjucks),
            "handlebars" => Some(Self::Handlebars),
            "pipeline" => Some(Self::Pipeline),
            "defer" => Some(Self::Defer),
            _ => None,
        }
    }

    /// Returns true for string templates.
    #[must_use]
    pub fn is_template(self) -> bool {
        matches!(self, Self::Mustache | Self::Nunjucks | Self::Handlebars)
    }

    /// Returns true for expressions left unrendered.
    #[must_use]
    pub fn is_deferred(self) -> bool {
        matches!(self, Self::Pipeline | Self::Defer)
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Var => "var",
            Self::Mustache => "mustache",
            Self::Nunjucks => "nunjucks",
            Self::Handlebars => "handlebars",
            Self::Pipeline => "pipeline",
            Self::Defer => "defer",
        };
        f.write_str(name)
    }
}

/// An explicit `{"__type__", "__value__"}` expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Expression type.
    pub kind: ExpressionType,
    /// Expression body.
    pub value: Value,
}

impl Expression {
    /// Creates an expression.
    #[must_use]
    pub fn new(kind: ExpressionType, value: Value) -> Self {
        Self { kind, value }
    }

    /// Creates a `var` expression.
    #[must_use]
    pub fn var(path: impl Into<String>) -> Self {
        Self::new(ExpressionType::Var, Value::String(path.into()))
    }

    /// Creates a `mustache` expression.
    #[must_use]
    pub fn mustache(template: impl Into<String>) -> Self {
        Self::new(ExpressionType::Mustache, Value::String(template.into()))
    }

    /// Creates a `pipeline` expression around a list of brick configs.
    #[must_use]
    pub fn pipeline(steps: Value) -> Self {
        Self::new(ExpressionType::Pipeline, steps)
    }

    /// Recognizes an expression object. Returns `None` for anything else.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let kind = map
            .get(EXPRESSION_TYPE_KEY)
            .and_then(Value::as_str)
            .and_then(ExpressionType::parse)?;
        let body = map.get(EXPRESSION_VALUE_KEY)?;
        Some(Self::new(kind, body.clone()))
    }

    /// Returns the expression as its JSON object form.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(
            EXPRESSION_TYPE_KEY.to_string(),
            Value::String(self.kind.to_string()),
        );
        map.insert(EXPRESSION_VALUE_KEY.to_string(), self.value.clone());
        Value::Object(map)
    }
}

impl From<Expression> for Value {
    fn from(expr: Expression) -> Self {
        expr.to_value()
    }
}

impl Serialize for Expression {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let expr = Expression::from_value(&json!({"__type__": "var", "__value__": "@input"})).unwrap();
        assert_eq!(expr.kind, ExpressionType::Var);
        assert_eq!(expr.value, json!("@input"));

        assert!(Expression::from_value(&json!({"__type__": "python", "__value__": "x"})).is_none());
        assert!(Expression::from_value(&json!({"__type__": "var"})).is_none());
        assert!(Expression::from_value(&json!("@input")).is_none());
    }

    #[test]
    fn test_to_value_round_trip() {
        let expr = Expression::mustache("Hello {{ @name }}");
        assert_eq!(Expression::from_value(&expr.to_value()), Some(expr));
    }

    #[test]
    fn test_type_predicates() {
        assert!(ExpressionType::Nunjucks.is_template());
        assert!(!ExpressionType::Var.is_template());
        assert!(ExpressionType::Pipeline.is_deferred());
        assert!(ExpressionType::Defer.is_deferred());
    }
}
