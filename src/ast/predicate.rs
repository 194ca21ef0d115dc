use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::operators::{Hint, Joiner, Operator};

/// Errors raised while reading a hand-written `key=value` filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterSyntaxError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid operator hint __{hint} in filter {filter}")]
    UnknownHint { hint: String, filter: String },

    #[error("empty column in filter {0}")]
    EmptyColumn(String),
}

/// Right-hand side of a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Reference to a named argument, `:name`
    ///
    /// Wildcard markers add `'%' ||` / `|| '%'` around the rendered
    /// placeholder.
    ///
    /// # Examples
    /// ```text
    /// :id
    /// %:name%
    /// :prefix%
    /// ```
    Placeholder {
        name: String,
        leading_wildcard: bool,
        trailing_wildcard: bool,
    },

    /// Fixed SQL token written by the application, such as `true` in a
    /// null-check predicate.
    Literal(String),
}

impl Operand {
    pub fn placeholder(name: impl Into<String>) -> Self {
        Operand::Placeholder {
            name: name.into(),
            leading_wildcard: false,
            trailing_wildcard: false,
        }
    }

    pub fn contains(name: impl Into<String>) -> Self {
        Operand::Placeholder {
            name: name.into(),
            leading_wildcard: true,
            trailing_wildcard: true,
        }
    }

    /// Read `:name`, `%:name`, `:name%` or `%:name%`; anything else is a
    /// literal.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let (leading, rest) = match s.strip_prefix('%') {
            Some(rest) if rest.starts_with(':') => (true, rest),
            _ => (false, s),
        };
        let Some(name) = rest.strip_prefix(':') else {
            return Operand::Literal(s.to_string());
        };
        let (trailing, name) = match name.strip_suffix('%') {
            Some(name) => (true, name),
            None => (false, name),
        };
        Operand::Placeholder {
            name: name.to_string(),
            leading_wildcard: leading,
            trailing_wildcard: trailing,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Placeholder {
                name,
                leading_wildcard,
                trailing_wildcard,
            } => {
                if *leading_wildcard {
                    f.write_str("%")?;
                }
                write!(f, ":{}", name)?;
                if *trailing_wildcard {
                    f.write_str("%")?;
                }
                Ok(())
            }
            Operand::Literal(text) => f.write_str(text),
        }
    }
}

/// A single `column <op> operand` comparison.
///
/// The hint list carries the operator (absent means `=`) and any combinator
/// that decides how this predicate joins the one before it.
///
/// # Examples
///
/// ```
/// use aipsql::ast::{Operator, Predicate};
///
/// let p: Predicate = "status__gte__or=:status".parse().unwrap();
/// assert_eq!(p.column, "status");
/// assert_eq!(p.operator(), Operator::Gte);
/// assert_eq!(p.to_string(), "status__gte__or=:status");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub column: String,
    pub hints: Vec<Hint>,
    pub operand: Operand,
}

impl Predicate {
    pub fn new(column: impl Into<String>, operator: Operator, operand: Operand) -> Self {
        let hints = if operator == Operator::Eq {
            Vec::new()
        } else {
            vec![Hint::Op(operator)]
        };
        Predicate {
            column: column.into(),
            hints,
            operand,
        }
    }

    pub fn with_joiner(mut self, joiner: Joiner) -> Self {
        self.hints.push(Hint::Join(joiner));
        self
    }

    /// First operator hint, `=` when none is present.
    pub fn operator(&self) -> Operator {
        self.hints
            .iter()
            .find_map(|hint| match hint {
                Hint::Op(op) => Some(*op),
                Hint::Join(_) => None,
            })
            .unwrap_or(Operator::Eq)
    }

    /// Last combinator hint, if any.
    pub fn joiner(&self) -> Option<Joiner> {
        self.hints.iter().rev().find_map(|hint| match hint {
            Hint::Join(joiner) => Some(*joiner),
            Hint::Op(_) => None,
        })
    }

    /// Column followed by its hint suffixes, e.g. `status__gt__or`.
    pub fn render_key(&self) -> String {
        let mut key = self.column.clone();
        for hint in &self.hints {
            key.push_str(&hint.to_string());
        }
        key
    }
}

impl FromStr for Predicate {
    type Err = FilterSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(FilterSyntaxError::InvalidFilter(s.to_string()));
        };

        let mut segments = key.trim().split("__");
        let column = segments.next().unwrap_or_default().to_string();
        if column.is_empty() {
            return Err(FilterSyntaxError::EmptyColumn(s.to_string()));
        }

        let hints = segments
            .map(|name| {
                Hint::parse(name).ok_or_else(|| FilterSyntaxError::UnknownHint {
                    hint: name.to_string(),
                    filter: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Predicate {
            column,
            hints,
            operand: Operand::parse(value),
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.render_key(), self.operand)
    }
}
