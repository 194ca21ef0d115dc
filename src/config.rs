//! JSON configuration for filter policies and models
//!
//! ```json
//! {
//!   "acceptable_identifiers": ["status", "name", "tags"],
//!   "identifiers": {
//!     "status": { "enumeration": { "STATUS_ACTIVE": 1, "STATUS_DONE": 2 } },
//!     "name": { "accepted_kinds": ["string"], "column_name": "display_name" },
//!     "tags": { "is_array": true },
//!     "created": { "accepted_values": [{ "timestamp": "2024-01-01T00:00:00Z" }] }
//!   },
//!   "models": [
//!     { "name": "task", "table": "tasks", "columns": ["id", "status", "display_name", "tags"],
//!       "array_columns": ["tags"], "default_order_by": "id" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    ast::LiteralKind,
    literal,
    policy::{FilterOptions, IdentifierPolicy, PolicyError},
    query::Model,
    value::Value,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value} for {field}: {reason}")]
    InvalidValue {
        value: String,
        field: String,
        reason: String,
    },

    #[error("unknown model {0}")]
    UnknownModel(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIdentifier {
    #[serde(default)]
    accepted_kinds: Vec<LiteralKind>,
    #[serde(default)]
    accepted_values: Vec<serde_json::Value>,
    #[serde(default)]
    value_aliases: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    column_name: Option<String>,
    #[serde(default)]
    is_array: bool,
    /// Variant name to number, expanded with [`IdentifierPolicy::enumeration`].
    #[serde(default)]
    enumeration: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    acceptable_identifiers: Vec<String>,
    #[serde(default)]
    identifiers: BTreeMap<String, RawIdentifier>,
    #[serde(default)]
    models: Vec<Model>,
}

/// Filter options plus the models they are used with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub options: FilterOptions,
    pub models: Vec<Model>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(json)?;

        let mut options = FilterOptions::new().allow(raw.acceptable_identifiers);
        for (name, identifier) in raw.identifiers {
            let policy = identifier_policy(&name, identifier)?;
            options = options.identifier(name, policy);
        }
        options.validate()?;

        Ok(Config {
            options,
            models: raw.models,
        })
    }

    pub fn model(&self, name: &str) -> Result<&Model, ConfigError> {
        self.models
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| ConfigError::UnknownModel(name.to_string()))
    }
}

impl FilterOptions {
    /// Filter options from a configuration document, ignoring its models.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Config::from_json_str(json).map(|config| config.options)
    }
}

fn identifier_policy(name: &str, raw: RawIdentifier) -> Result<IdentifierPolicy, ConfigError> {
    let mut policy = match raw.enumeration {
        Some(variants) => IdentifierPolicy::enumeration(variants),
        None => IdentifierPolicy::new(),
    };

    for kind in raw.accepted_kinds {
        policy = policy.accept(kind);
    }
    for value in &raw.accepted_values {
        policy = policy.accept_value(json_to_value(value, name)?);
    }
    for (alias, canonical) in &raw.value_aliases {
        policy = policy.alias(alias.as_str(), json_to_value(canonical, name)?);
    }
    if let Some(column) = raw.column_name {
        policy = policy.column(column);
    }
    if raw.is_array {
        policy = policy.array();
    }
    Ok(policy)
}

/// Map a JSON value to a bind value.
///
/// Integers become `Int`, or `UInt` when they do not fit an `i64`.
/// Timestamps and durations are written as `{"timestamp": "<rfc3339>"}` and
/// `{"duration": "1.5s"}`.
pub fn json_to_value(json: &serde_json::Value, field: &str) -> Result<Value, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        value: json.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::UInt(u)
            } else {
                Value::Float(n.as_f64().ok_or_else(|| invalid("not a finite number"))?)
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| json_to_value(item, field))
                .collect::<Result<_, _>>()?,
        ),
        serde_json::Value::Object(map) => match map.iter().next() {
            Some((key, serde_json::Value::String(text))) if map.len() == 1 => match key.as_str() {
                "timestamp" => DateTime::parse_from_rfc3339(text)
                    .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
                    .map_err(|e| invalid(&e.to_string()))?,
                "duration" => literal::parse_duration(text)
                    .map(Value::Duration)
                    .map_err(|e| invalid(&e))?,
                _ => return Err(invalid("expected a timestamp or duration object")),
            },
            _ => return Err(invalid("expected a timestamp or duration object")),
        },
    })
}
