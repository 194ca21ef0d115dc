//! Per-field filter policy
//!
//! A [`FilterOptions`] tells the compiler which fields a filter may mention,
//! which literal kinds and values each accepts, how enum-like spellings map
//! to stored values, and which physical column backs each field.

use std::collections::HashMap;

use thiserror::Error;

use crate::ast::LiteralKind;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("value alias key {key} for identifier {identifier} is not lower case")]
    AliasKeyNotLowercase { key: String, identifier: String },

    #[error("identifier {0} is not acceptable")]
    IdentifierNotAcceptable(String),

    #[error("invalid suffix {suffix} for identifier {identifier}")]
    InvalidSortSuffix { suffix: String, identifier: String },
}

/// Rules for one filterable field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifierPolicy {
    /// Empty accepts every kind.
    pub accepted_kinds: Vec<LiteralKind>,
    /// Empty accepts every value.
    pub accepted_values: Vec<Value>,
    /// `(alias, canonical)` pairs. String aliases match case-insensitively
    /// and must be stored lower case.
    pub value_aliases: Vec<(Value, Value)>,
    /// Physical column; the field name is used when unset.
    pub column_name: Option<String>,
    /// Repeated field: `:` tests membership instead of substring.
    pub is_array: bool,
}

impl IdentifierPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy for an enum stored as its number.
    ///
    /// Every variant number is accepted, and each variant can be written by
    /// its full name or by the part after its last `_`, in any case:
    /// `STATUS_ACTIVE`, `status_active` and `Active` all resolve to the same
    /// number.
    ///
    /// # Examples
    ///
    /// ```
    /// use aipsql::{IdentifierPolicy, Value};
    ///
    /// let policy = IdentifierPolicy::enumeration([("STATUS_OK", 1), ("STATUS_FAILED", 2)]);
    /// assert_eq!(policy.resolve_alias(&Value::from("ok")), Some(&Value::Int(1)));
    /// assert_eq!(policy.resolve_alias(&Value::from("Status_Failed")), Some(&Value::Int(2)));
    /// ```
    pub fn enumeration<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut policy = IdentifierPolicy::new().accept(LiteralKind::Int);
        for (name, number) in variants {
            let full = name.as_ref().to_lowercase();
            let short = full.rsplit('_').next().unwrap_or(&full).to_string();
            if short != full {
                policy = policy.alias(short, number);
            }
            policy = policy.alias(full, number).accept_value(number);
        }
        policy
    }

    pub fn accept(mut self, kind: LiteralKind) -> Self {
        if !self.accepted_kinds.contains(&kind) {
            self.accepted_kinds.push(kind);
        }
        self
    }

    /// Accept both boolean literal kinds.
    pub fn accept_bool(self) -> Self {
        self.accept(LiteralKind::True).accept(LiteralKind::False)
    }

    pub fn accept_value(mut self, value: impl Into<Value>) -> Self {
        self.accepted_values.push(value.into());
        self
    }

    pub fn alias(mut self, alias: impl Into<Value>, canonical: impl Into<Value>) -> Self {
        let alias = alias.into();
        let canonical = canonical.into();
        match self.value_aliases.iter_mut().find(|(a, _)| *a == alias) {
            Some(entry) => entry.1 = canonical,
            None => self.value_aliases.push((alias, canonical)),
        }
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = Some(name.into());
        self
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    /// Canonical value for `value`, if it is a known alias.
    pub fn resolve_alias(&self, value: &Value) -> Option<&Value> {
        let lowered = value.as_str().map(str::to_lowercase);
        self.value_aliases
            .iter()
            .find(|(alias, _)| match (&lowered, alias) {
                (Some(s), Value::String(a)) => s == a,
                (Some(_), _) => false,
                (None, alias) => alias == value,
            })
            .map(|(_, canonical)| canonical)
    }

    pub fn accepts_kind(&self, kind: LiteralKind) -> bool {
        self.accepted_kinds.is_empty() || self.accepted_kinds.contains(&kind)
    }

    pub fn accepts_value(&self, value: &Value) -> bool {
        self.accepted_values.is_empty() || self.accepted_values.contains(value)
    }
}

/// Filter configuration shared by every compile against one resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub identifiers: HashMap<String, IdentifierPolicy>,
    /// Fields a filter may mention; empty allows any field.
    pub acceptable_identifiers: Vec<String>,
}

impl FilterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identifier(mut self, name: impl Into<String>, policy: IdentifierPolicy) -> Self {
        self.identifiers.insert(name.into(), policy);
        self
    }

    pub fn allow<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptable_identifiers
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn policy(&self, identifier: &str) -> Option<&IdentifierPolicy> {
        self.identifiers.get(identifier)
    }

    pub fn is_allowed(&self, identifier: &str) -> bool {
        self.acceptable_identifiers.is_empty()
            || self.acceptable_identifiers.iter().any(|a| a == identifier)
    }

    /// Physical column for a filter field.
    pub fn column_for<'a>(&'a self, identifier: &'a str) -> &'a str {
        self.policy(identifier)
            .and_then(|p| p.column_name.as_deref())
            .unwrap_or(identifier)
    }

    /// Columns of fields marked as arrays.
    pub fn array_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .identifiers
            .iter()
            .filter(|(_, p)| p.is_array)
            .map(|(name, _)| self.column_for(name).to_string())
            .collect();
        columns.sort();
        columns
    }

    /// Check that string alias keys are lower case.
    pub fn validate(&self) -> Result<(), PolicyError> {
        for (identifier, policy) in &self.identifiers {
            for (alias, _) in &policy.value_aliases {
                if let Value::String(key) = alias
                    && key.to_lowercase() != *key
                {
                    return Err(PolicyError::AliasKeyNotLowercase {
                        key: key.clone(),
                        identifier: identifier.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Map an order-by string such as `"name desc, create_time"` to
    /// `-column` / `column` terms.
    ///
    /// Every identifier must be in the acceptable list.
    pub fn verify_order_by(&self, order_by: &str) -> Result<Vec<String>, PolicyError> {
        let mut terms = Vec::new();
        for item in order_by.split(',') {
            let mut words = item.split_whitespace();
            let Some(identifier) = words.next() else {
                continue;
            };
            let descending = match words.next().map(str::to_lowercase) {
                None => false,
                Some(s) if s == "asc" => false,
                Some(s) if s == "desc" => true,
                Some(suffix) => {
                    return Err(PolicyError::InvalidSortSuffix {
                        suffix,
                        identifier: identifier.to_string(),
                    });
                }
            };

            if !self.acceptable_identifiers.iter().any(|a| a == identifier) {
                return Err(PolicyError::IdentifierNotAcceptable(identifier.to_string()));
            }

            let column = self.column_for(identifier);
            terms.push(if descending {
                format!("-{}", column)
            } else {
                column.to_string()
            });
        }
        Ok(terms)
    }
}
