//! Truthiness of rendered values.

use serde_json::Value;

const FALSY_STRINGS: [&str; 6] = ["false", "f", "0", "no", "off", ""];

/// Coerces a rendered value to a boolean.
///
/// `false`, `null`, `0` and the strings `"false"`, `"f"`, `"0"`, `"no"`,
/// `"off"` and `""` (case-insensitive, trimmed) are false. Everything else,
/// including empty arrays and objects, is true.
#[must_use]
pub fn boolean(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let normalized = s.trim().to_lowercase();
            !FALSY_STRINGS.contains(&normalized.as_str())
        }
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_falsy_values() {
        for value in [
            json!(false),
            json!(null),
            json!(0),
            json!(0.0),
            json!("false"),
            json!("F"),
            json!(" 0 "),
            json!("no"),
            json!("off"),
            json!(""),
        ] {
            assert!(!boolean(&value), "{value} should be falsy");
        }
    }

    #[test]
    fn test_truthy_values() {
        for value in [json!(true), json!(1), json!("yes"), json!("true"), json!([]), json!({})] {
            assert!(boolean(&value), "{value} should be truthy");
        }
    }
}
