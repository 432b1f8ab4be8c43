//! `{{ path | filter }}` string interpolation.

use super::path::lookup_path;
use crate::context::BrickArgsContext;
use crate::errors::{BrickflowError, Result};
use serde_json::Value;

/// Formats a value the way interpolation inserts it.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_literal(literal: &str) -> Value {
    let literal = literal.trim();
    if literal.len() >= 2 && literal.starts_with('\'') && literal.ends_with('\'') {
        return Value::String(literal[1..literal.len() - 1].to_string());
    }
    serde_json::from_str(literal).unwrap_or_else(|_| Value::String(literal.to_string()))
}

/// Returns the value of a literal tag: a quoted string, a number, or
/// `true`/`false`/`null`. Anything else is a variable.
fn tag_literal(body: &str) -> Option<Value> {
    let quoted = body.len() >= 2
        && ((body.starts_with('\'') && body.ends_with('\''))
            || (body.starts_with('"') && body.ends_with('"')));
    if quoted {
        return Some(parse_literal(body));
    }
    match serde_json::from_str(body) {
        Ok(value @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => Some(value),
        _ => None,
    }
}

fn apply_filter(value: Value, filter: &str, template: &str) -> Result<Value> {
    let filter = filter.trim();
    let filtered = match filter {
        "upper" => Value::String(stringify(&value).to_uppercase()),
        "lower" => Value::String(stringify(&value).to_lowercase()),
        "trim" => Value::String(stringify(&value).trim().to_string()),
        "length" => {
            let len = match &value {
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::String(s) => s.chars().count(),
                Value::Null => 0,
                _ => stringify(&value).chars().count(),
            };
            Value::from(len)
        }
        "json" => Value::String(value.to_string()),
        _ => {
            let Some(literal) = filter
                .strip_prefix("default")
                .map(str::trim_start)
                .and_then(|rest| rest.strip_prefix('('))
                .and_then(|rest| rest.strip_suffix(')'))
            else {
                return Err(BrickflowError::invalid_template(
                    format!("Unknown filter: {filter}"),
                    template,
                ));
            };
            if value.is_null() {
                parse_literal(literal)
            } else {
                value
            }
        }
    };
    Ok(filtered)
}

fn render_tag(body: &str, ctxt: &BrickArgsContext, template: &str) -> Result<String> {
    let mut parts = body.split('|');
    let path = parts.next().map(str::trim).unwrap_or_default();
    if path.is_empty() {
        return Err(BrickflowError::invalid_template("Empty tag", template));
    }

    let mut value = match tag_literal(path) {
        Some(literal) => literal,
        None => lookup_path(ctxt, path)?,
    };
    for filter in parts {
        value = apply_filter(value, filter, template)?;
    }
    Ok(stringify(&value))
}

/// Renders every `{{ ... }}` tag in `template` against `ctxt`.
pub fn render_template(template: &str, ctxt: &BrickArgsContext) -> Result<String> {
    let unterminated = || BrickflowError::invalid_template("Unterminated tag", template);

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        let close = after_open.find("}}").ok_or_else(unterminated)?;
        let body = &after_open[..close];
        if body.contains("{{") {
            return Err(unterminated());
        }
        out.push_str(&render_tag(body, ctxt, template)?);
        rest = &after_open[close + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctxt() -> BrickArgsContext {
        BrickArgsContext::new()
            .bind("@name", json!("  Ada "))
            .bind("@items", json!([1, 2, 3]))
            .bind("@user", json!({"id": 7}))
    }

    #[test]
    fn test_plain_interpolation() {
        let out = render_template("Hello {{@name}}! id={{ @user.id }}", &ctxt()).unwrap();
        assert_eq!(out, "Hello   Ada ! id=7");
    }

    #[test]
    fn test_filters() {
        let ctxt = ctxt();
        assert_eq!(render_template("{{ @name | trim | upper }}", &ctxt).unwrap(), "ADA");
        assert_eq!(render_template("{{ @items | length }}", &ctxt).unwrap(), "3");
        assert_eq!(render_template("{{ @user | json }}", &ctxt).unwrap(), r#"{"id":7}"#);
        assert_eq!(
            render_template("{{ @missing | default('n/a') }}", &ctxt).unwrap(),
            "n/a"
        );
        assert_eq!(render_template("{{ @missing }}", &ctxt).unwrap(), "");
    }

    #[test]
    fn test_bare_names_are_variables() {
        let ctxt = BrickArgsContext::new().bind("@name", json!("Ada"));
        assert_eq!(render_template("Hello {{ name }}", &ctxt).unwrap(), "Hello ");
        assert_eq!(render_template("Hello {{ name.first }}", &ctxt).unwrap(), "Hello ");
        assert_eq!(
            render_template("Hello {{ name | default('you') }}", &ctxt).unwrap(),
            "Hello you"
        );
    }

    #[test]
    fn test_literal_tags() {
        let ctxt = ctxt();
        assert_eq!(render_template("{{ 'a b' | upper }}", &ctxt).unwrap(), "A B");
        assert_eq!(render_template(r#"{{ "x" }}"#, &ctxt).unwrap(), "x");
        assert_eq!(render_template("{{ 42 }}-{{ true }}", &ctxt).unwrap(), "42-true");
        assert_eq!(render_template("{{ null | default(0) }}", &ctxt).unwrap(), "0");
    }

    #[test]
    fn test_unknown_filter_fails() {
        let err = render_template("{{ @name | shout }}", &ctxt()).unwrap_err();
        assert_eq!(err.name(), "InvalidTemplateError");
    }

    #[test]
    fn test_unterminated_tag_fails() {
        let err = render_template("Hello {{ @name", &ctxt()).unwrap_err();
        assert_eq!(err.name(), "InvalidTemplateError");

        let err = render_template("{{ {{ @name }}", &ctxt()).unwrap_err();
        assert_eq!(err.name(), "InvalidTemplateError");
    }

    #[test]
    fn test_no_tags() {
        assert_eq!(render_template("plain text", &ctxt()).unwrap(), "plain text");
    }
}
