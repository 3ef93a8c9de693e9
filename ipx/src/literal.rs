//! Permissive literal parsing for modifier arguments and environment values.
//!
//! Recognizes booleans, `null`, numbers, and JSON fragments; anything else
//! passes through as a plain string. This is deliberately forgiving: a
//! modifier argument is free-form user input, not a strict grammar.
use serde_json::Value;

/// Parse a raw argument string the same way for every handler and every
/// environment-variable override.
pub fn parse_literal(raw: &str) -> Value {
    let trimmed = raw.trim();
    match trimmed {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "null" => return Value::Null,
        "" => return Value::String(String::new()),
        _ => {},
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(n) = trimmed.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }
    // A JSON object/array fragment (e.g. background color lists) parses as
    // structured data; everything else is the raw string.
    if (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
    {
        if let Ok(v) = serde_json::from_str(trimmed) {
            return v;
        }
    }
    Value::String(raw.to_string())
}

/// Read back a literal as an `f64`, if it is numeric (or a numeric string).
pub fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// Read back a literal as a `u32`, if it is numeric (or a numeric string).
pub fn as_u32(v: &Value) -> Option<u32> {
    as_f64(v).map(|f| f.max(0.0).round() as u32)
}

/// Read back a literal as a `bool`.
pub fn as_bool(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Read back a literal as a string, regardless of its underlying type.
pub fn as_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_booleans_and_null() {
        assert_eq!(parse_literal("true"), Value::Bool(true));
        assert_eq!(parse_literal("false"), Value::Bool(false));
        assert_eq!(parse_literal("null"), Value::Null);
    }

    #[test]
    fn parses_numbers() {
        assert_eq!(as_u32(&parse_literal("50")), Some(50));
        assert_eq!(as_f64(&parse_literal("0.5")), Some(0.5));
    }

    #[test]
    fn falls_back_to_raw_string() {
        assert_eq!(parse_literal("#fff"), Value::String("#fff".to_string()));
        assert_eq!(parse_literal("cover"), Value::String("cover".to_string()));
    }
}
