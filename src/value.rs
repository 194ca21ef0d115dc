use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use crate::ast::LiteralKind;

/// A bind value passed to the database alongside the rendered SQL.
///
/// Filter literals decode into these, and hand-written filters take them as
/// named arguments. Integers keep their signedness so identifier policies can
/// tell `5` from `5u`.
///
/// # Examples
///
/// ```
/// use aipsql::Value;
///
/// let status = Value::Int(1);
/// let name = Value::from("draft");
/// let tags = Value::Array(vec![Value::from("a"), Value::from("b")]);
/// assert_eq!(name, Value::String("draft".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,

    Bool(bool),

    /// Signed 64-bit integer
    Int(i64),

    /// Unsigned 64-bit integer
    UInt(u64),

    Float(f64),

    /// UTF-8 text
    String(String),

    /// Point in time, normalized to UTC
    Timestamp(DateTime<Utc>),

    /// Signed span of time with nanosecond precision
    Duration(TimeDelta),

    /// Array bound to `= ANY($n)` / `!= ALL($n)`
    Array(Vec<Value>),
}

impl Value {
    /// The literal kind a filter would have used to write this value.
    ///
    /// Arrays have no literal form.
    pub fn kind(&self) -> Option<LiteralKind> {
        match self {
            Value::Null => Some(LiteralKind::Null),
            Value::Bool(true) => Some(LiteralKind::True),
            Value::Bool(false) => Some(LiteralKind::False),
            Value::Int(_) => Some(LiteralKind::Int),
            Value::UInt(_) => Some(LiteralKind::UInt),
            Value::Float(_) => Some(LiteralKind::Float),
            Value::String(_) => Some(LiteralKind::String),
            Value::Timestamp(_) => Some(LiteralKind::Timestamp),
            Value::Duration(_) => Some(LiteralKind::Duration),
            Value::Array(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(d) => write!(f, "{}", format_duration(*d)),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// `1.5s`, `-20s`, `0.000000001s`
pub fn format_duration(d: TimeDelta) -> String {
    let nanos = d.num_nanoseconds();
    match nanos {
        Some(n) => {
            let sign = if n < 0 { "-" } else { "" };
            let n = n.unsigned_abs();
            let (secs, frac) = (n / 1_000_000_000, n % 1_000_000_000);
            if frac == 0 {
                format!("{}{}s", sign, secs)
            } else {
                let frac = format!("{:09}", frac);
                format!("{}{}.{}s", sign, secs, frac.trim_end_matches('0'))
            }
        }
        None => format!("{}s", d.num_seconds()),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::UInt(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<TimeDelta> for Value {
    fn from(d: TimeDelta) -> Self {
        Value::Duration(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Rendered SQL with its own `$1..$n` placeholders, used as an `IN (...)`
/// operand of another query.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

/// What a placeholder name is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Value(Value),
    SubQuery(SubQuery),
}

impl From<Value> for Argument {
    fn from(v: Value) -> Self {
        Argument::Value(v)
    }
}

macro_rules! argument_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Argument {
            fn from(v: $ty) -> Self {
                Argument::Value(v.into())
            }
        })*
    };
}

argument_from!(bool, i64, i32, u64, f64, &str, String, DateTime<Utc>, TimeDelta);

impl<T: Into<Value>> From<Vec<T>> for Argument {
    fn from(v: Vec<T>) -> Self {
        Argument::Value(v.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Argument {
    fn from(v: Option<T>) -> Self {
        Argument::Value(v.into())
    }
}

impl From<SubQuery> for Argument {
    fn from(q: SubQuery) -> Self {
        Argument::SubQuery(q)
    }
}

/// Insertion-ordered map from placeholder name to argument.
///
/// Order decides positional numbering. Setting an existing name replaces the
/// value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArgs {
    entries: Vec<(String, Argument)>,
}

impl NamedArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, arg: impl Into<Argument>) {
        let name = name.into();
        let arg = arg.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = arg,
            None => self.entries.push((name, arg)),
        }
    }

    /// Chaining form of [`NamedArgs::set`].
    pub fn with(mut self, name: impl Into<String>, arg: impl Into<Argument>) -> Self {
        self.set(name, arg);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Argument> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, arg)| arg)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn extend(&mut self, other: NamedArgs) {
        for (name, arg) in other.entries {
            self.set(name, arg);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Argument)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
