//! Values, tokens and SQL fragments as serde_json::Value

use serde_json::json;

use crate::value::format_duration;
use crate::{SqlFragment, Token, Value};

/// Convert a bind value to JSON
///
/// Timestamps and durations use the `{"timestamp": ...}` / `{"duration": ...}`
/// shapes the configuration loader accepts.
pub fn value_to_json(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::UInt(u) => serde_json::Value::Number((*u).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Timestamp(_) => json!({ "timestamp": v.to_string() }),
        Value::Duration(d) => json!({ "duration": format_duration(*d) }),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}

pub fn fragment_to_json(fragment: &SqlFragment) -> serde_json::Value {
    json!({
        "sql": fragment.sql,
        "args": fragment.args.iter().map(value_to_json).collect::<Vec<_>>(),
    })
}

pub fn token_to_json(token: &Token) -> serde_json::Value {
    match token {
        Token::Identifier(name) => json!({ "identifier": name }),
        Token::Literal { kind, text } => json!({ "literal": kind, "text": text }),
        Token::Comparator(c) => json!({ "comparator": c.to_string() }),
        other => json!({ "token": other.to_string() }),
    }
}
