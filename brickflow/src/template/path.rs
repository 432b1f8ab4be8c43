//! Variable path parsing and lookup.
//!
//! Supported forms: `@foo.bar.0`, `@foo.bar[0]`, `@foo["a b"]`, `@foo['a b']`.

use crate::context::BrickArgsContext;
use crate::errors::{BrickflowError, Result};
use serde_json::Value;

/// One step of a variable path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key (or array index written with dot notation).
    Key(String),
    /// Bracketed numeric index.
    Index(usize),
}

/// Parses a path into segments. The first segment is the variable name.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>> {
    let invalid = |reason: &str| {
        BrickflowError::invalid_template(format!("Invalid variable path: {reason}"), path)
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.trim().chars();
    let mut after_bracket = false;
    let mut after_dot = false;

    while let Some(c) = chars.next() {
        after_dot = c == '.';
        match c {
            '.' => {
                if current.is_empty() {
                    // `a[0].b`: a dot right after a bracket opens the next key
                    if !after_bracket {
                        return Err(invalid("empty segment"));
                    }
                } else {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                after_bracket = false;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut current)));
                }
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                if !closed {
                    return Err(invalid("unclosed bracket"));
                }
                let inner = inner.trim();
                let quoted = inner.len() >= 2
                    && ((inner.starts_with('"') && inner.ends_with('"'))
                        || (inner.starts_with('\'') && inner.ends_with('\'')));
                if quoted {
                    segments.push(PathSegment::Key(inner[1..inner.len() - 1].to_string()));
                } else {
                    let index = inner.parse::<usize>().map_err(|_| invalid("bad index"))?;
                    segments.push(PathSegment::Index(index));
                }
                after_bracket = true;
            }
            _ => {
                current.push(c);
                after_bracket = false;
            }
        }
    }

    if after_dot {
        return Err(invalid("empty segment"));
    }
    if !current.is_empty() {
        segments.push(PathSegment::Key(current));
    }
    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments)
}

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        (Value::Array(items), PathSegment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    }
}

/// Resolves a path against the context. Missing variables resolve to `null`.
pub fn lookup_path(ctxt: &BrickArgsContext, path: &str) -> Result<Value> {
    let segments = parse_path(path)?;
    let Some((PathSegment::Key(root), rest)) = segments.split_first() else {
        return Err(BrickflowError::invalid_template(
            "Variable path must start with a name",
            path,
        ));
    };

    let Some(mut current) = ctxt.get(root) else {
        return Ok(Value::Null);
    };
    for segment in rest {
        match step(current, segment) {
            Some(next) => current = next,
            None => return Ok(Value::Null),
        }
    }
    Ok(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn ctxt() -> BrickArgsContext {
        BrickArgsContext::new()
            .bind("@foo", json!({"bar": [10, {"baz": "qux"}], "a b": 1}))
            .bind("@n", json!(3))
    }

    #[test]
    fn test_parse_path() {
        assert_eq!(
            parse_path("@foo.bar[1].baz").unwrap(),
            vec![
                PathSegment::Key("@foo".into()),
                PathSegment::Key("bar".into()),
                PathSegment::Index(1),
                PathSegment::Key("baz".into()),
            ]
        );
        assert_eq!(
            parse_path(r#"@foo["a b"]"#).unwrap(),
            vec![PathSegment::Key("@foo".into()), PathSegment::Key("a b".into())]
        );
        assert!(parse_path("@foo[1").is_err());
        assert!(parse_path("@foo..bar").is_err());
        assert!(parse_path("").is_err());
    }

    #[test]
    fn test_trailing_dot_is_rejected() {
        for path in ["@foo.", "@foo.bar.", "@foo[0]."] {
            let err = parse_path(path).unwrap_err();
            assert_eq!(err.name(), "InvalidTemplateError", "{path}");
        }
        assert!(parse_path(r#"@foo["a."]"#).is_ok());
    }

    #[test]
    fn test_lookup() {
        let ctxt = ctxt();
        assert_eq!(lookup_path(&ctxt, "@foo.bar.0").unwrap(), json!(10));
        assert_eq!(lookup_path(&ctxt, "@foo.bar[1].baz").unwrap(), json!("qux"));
        assert_eq!(lookup_path(&ctxt, "@foo['a b']").unwrap(), json!(1));
        assert_eq!(lookup_path(&ctxt, "@n").unwrap(), json!(3));
    }

    #[test]
    fn test_lookup_missing_is_null() {
        let ctxt = ctxt();
        assert_eq!(lookup_path(&ctxt, "@missing").unwrap(), Value::Null);
        assert_eq!(lookup_path(&ctxt, "@foo.nope.deeper").unwrap(), Value::Null);
        assert_eq!(lookup_path(&ctxt, "@n.x").unwrap(), Value::Null);
    }
}
