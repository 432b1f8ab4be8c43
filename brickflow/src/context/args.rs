//! The persistent `@`-variable environment (`ctxt`).

use crate::errors::{BrickflowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Variable holding the run's input.
pub const INPUT_KEY: &str = "@input";

/// Variable holding the mod options.
pub const OPTIONS_KEY: &str = "@options";

/// A validated output key (`[A-Za-z_][A-Za-z0-9_]*`), bound as `@key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OutputKey(String);

impl OutputKey {
    /// Validates and wraps an output key. A leading `@` is accepted and stripped.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let bare = key.strip_prefix('@').unwrap_or(&key);

        let mut chars = bare.chars();
        let valid_start = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(BrickflowError::invalid_definition(format!(
                "Invalid output key: {key}"
            )));
        }
        Ok(Self(bare.to_string()))
    }

    /// Returns the key without the `@` prefix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the variable name (`@key`).
    #[must_use]
    pub fn variable(&self) -> String {
        format!("@{}", self.0)
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl TryFrom<String> for OutputKey {
    type Error = BrickflowError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<OutputKey> for String {
    fn from(key: OutputKey) -> Self {
        key.0
    }
}

/// Accumulating key → JSON environment for one pipeline run.
///
/// The environment is persistent: [`BrickArgsContext::bind`] returns a new
/// context and never mutates one a later step may still be holding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrickArgsContext {
    vars: Arc<Map<String, Value>>,
}

impl BrickArgsContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context with `@input` bound.
    #[must_use]
    pub fn with_input(input: Value) -> Self {
        Self::new().bind(INPUT_KEY, input)
    }

    /// Creates a context from a JSON object of variables.
    ///
    /// Keys without a leading `@` are prefixed with one.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                vars: Arc::new(
                    map.into_iter()
                        .map(|(k, v)| {
                            let key = if k.starts_with('@') { k } else { format!("@{k}") };
                            (key, v)
                        })
                        .collect(),
                ),
            }),
            Value::Null => Ok(Self::new()),
            other => Err(BrickflowError::prop(
                "Initial context must be an object",
                "ctxt",
                other,
            )),
        }
    }

    /// Returns a new context with `key` bound to `value`.
    #[must_use]
    pub fn bind(&self, key: impl Into<String>, value: Value) -> Self {
        let mut vars = Arc::clone(&self.vars);
        Arc::make_mut(&mut vars).insert(key.into(), value);
        Self { vars }
    }

    /// Returns a new context with every entry of `other` bound on top of this one.
    #[must_use]
    pub fn extend(&self, other: &Self) -> Self {
        let mut vars = Arc::clone(&self.vars);
        let target = Arc::make_mut(&mut vars);
        for (k, v) in other.vars.iter() {
            target.insert(k.clone(), v.clone());
        }
        Self { vars }
    }

    /// Returns the value bound to `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Returns true if `key` is bound.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Returns the bound variable names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.vars.keys()
    }

    /// Returns the number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Returns the environment as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object((*self.vars).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_output_key_validation() {
        assert_eq!(OutputKey::new("foo").unwrap().variable(), "@foo");
        assert_eq!(OutputKey::new("@foo_1").unwrap().as_str(), "foo_1");
        assert!(OutputKey::new("").is_err());
        assert!(OutputKey::new("1foo").is_err());
        assert!(OutputKey::new("foo-bar").is_err());
    }

    #[test]
    fn test_output_key_serde() {
        let key: OutputKey = serde_json::from_str(r#""rows""#).unwrap();
        assert_eq!(key.to_string(), "@rows");
        assert!(serde_json::from_str::<OutputKey>(r#""not valid""#).is_err());
    }

    #[test]
    fn test_bind_is_persistent() {
        let base = BrickArgsContext::with_input(serde_json::json!({"url": "https://example.com"}));
        let extended = base.bind("@foo", serde_json::json!(42));

        assert!(!base.contains("@foo"));
        assert_eq!(extended.get("@foo"), Some(&serde_json::json!(42)));
        assert_eq!(extended.get(INPUT_KEY), base.get(INPUT_KEY));
    }

    #[test]
    fn test_from_value_prefixes_keys() {
        let ctxt = BrickArgsContext::from_value(serde_json::json!({"input": 1, "@options": {}})).unwrap();
        let mut keys: Vec<_> = ctxt.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["@input".to_string(), "@options".to_string()]);

        assert!(BrickArgsContext::from_value(serde_json::json!([1])).is_err());
        assert!(BrickArgsContext::from_value(Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_extend() {
        let a = BrickArgsContext::new().bind("@a", serde_json::json!(1));
        let b = BrickArgsContext::new().bind("@a", serde_json::json!(2)).bind("@b", serde_json::json!(3));

        let merged = a.extend(&b);
        assert_eq!(merged.to_value(), serde_json::json!({"@a": 2, "@b": 3}));
        assert_eq!(a.len(), 1);
    }
}
