//! Literal token decoding

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::str::FromStr;

use crate::ast::LiteralKind;
use crate::value::Value;

/// A decoded literal.
///
/// `wildcard` is set for strings that contained an unescaped `*`; those stars
/// are already rewritten to `%` in `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub value: Value,
    pub wildcard: bool,
}

impl Decoded {
    fn plain(value: Value) -> Self {
        Decoded {
            value,
            wildcard: false,
        }
    }
}

/// Decode the raw text of a literal token into a bind value.
pub fn decode(kind: LiteralKind, text: &str) -> Result<Decoded, String> {
    match kind {
        LiteralKind::String => Ok(decode_string(text)),
        LiteralKind::Int => text
            .parse::<i64>()
            .map(|n| Decoded::plain(Value::Int(n)))
            .map_err(|e| e.to_string()),
        LiteralKind::UInt => text
            .trim_end_matches(['u', 'U'])
            .parse::<u64>()
            .map(|n| Decoded::plain(Value::UInt(n)))
            .map_err(|e| e.to_string()),
        LiteralKind::Float => text
            .parse::<f64>()
            .map(|n| Decoded::plain(Value::Float(n)))
            .map_err(|e| e.to_string()),
        LiteralKind::Timestamp => DateTime::parse_from_rfc3339(text)
            .map(|ts| Decoded::plain(Value::Timestamp(ts.with_timezone(&Utc))))
            .map_err(|e| e.to_string()),
        LiteralKind::Duration => parse_duration(text).map(|d| Decoded::plain(Value::Duration(d))),
        LiteralKind::True => Ok(Decoded::plain(Value::Bool(true))),
        LiteralKind::False => Ok(Decoded::plain(Value::Bool(false))),
        LiteralKind::Null => Ok(Decoded::plain(Value::Null)),
    }
}

/// Parse `<seconds>s` with up to nanosecond precision.
pub fn parse_duration(text: &str) -> Result<TimeDelta, String> {
    let seconds = text
        .strip_suffix('s')
        .ok_or_else(|| "missing 's' suffix".to_string())?;
    let seconds = Decimal::from_str(seconds).map_err(|e| e.to_string())?;
    let nanos = seconds
        .checked_mul(Decimal::from(1_000_000_000u32))
        .ok_or_else(|| "duration out of range".to_string())?
        .trunc()
        .to_i64()
        .ok_or_else(|| "duration out of range".to_string())?;
    Ok(TimeDelta::nanoseconds(nanos))
}

fn decode_string(text: &str) -> Decoded {
    let inner = text
        .strip_prefix(['"', '\''])
        .and_then(|s| s.strip_suffix(['"', '\'']))
        .unwrap_or(text);

    let mut value = String::with_capacity(inner.len());
    let mut wildcard = false;
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some('r') => value.push('\r'),
                Some(other) => value.push(other),
                None => value.push('\\'),
            },
            '*' => {
                wildcard = true;
                value.push('%');
            }
            _ => value.push(ch),
        }
    }

    Decoded {
        value: Value::String(value),
        wildcard,
    }
}
