use std::fmt;

use serde::{Deserialize, Serialize};

/// Literal kinds recognized by the lexer.
///
/// The kind travels with the literal's raw text so the compiler can decode it
/// and so identifier policies can restrict which kinds a field accepts.
/// Displayed in upper case, the way policy errors report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    /// Quoted text
    ///
    /// # Examples
    /// ```text
    /// "hello"
    /// 'item*'
    /// ```
    String,

    /// Seconds with an `s` suffix
    ///
    /// # Examples
    /// ```text
    /// 20s
    /// 1.5s
    /// ```
    Duration,

    /// RFC 3339 date-time
    ///
    /// # Examples
    /// ```text
    /// 2020-01-01T00:00:00Z
    /// 2021-06-01T12:30:00.5+02:00
    /// ```
    Timestamp,

    /// Floating-point number
    Float,

    /// Signed integer
    Int,

    /// Unsigned integer, written with a `u` suffix
    ///
    /// # Examples
    /// ```text
    /// 42u
    /// ```
    #[serde(rename = "uint")]
    UInt,

    /// `true`
    True,

    /// `false`
    False,

    /// `null`
    Null,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LiteralKind::String => "STRING",
            LiteralKind::Duration => "DURATION",
            LiteralKind::Timestamp => "TIMESTAMP",
            LiteralKind::Float => "NUM_FLOAT",
            LiteralKind::Int => "NUM_INT",
            LiteralKind::UInt => "NUM_UINT",
            LiteralKind::True => "TRUE",
            LiteralKind::False => "FALSE",
            LiteralKind::Null => "NULL",
        };
        f.write_str(name)
    }
}

/// Comparison symbols of the filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// `=`
    Equals,
    /// `!=`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessEquals,
    /// `>=`
    GreaterEquals,
    /// `>`
    GreaterThan,
    /// `:` (has)
    Has,
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::Equals => "=",
            Comparator::NotEquals => "!=",
            Comparator::LessThan => "<",
            Comparator::LessEquals => "<=",
            Comparator::GreaterEquals => ">=",
            Comparator::GreaterThan => ">",
            Comparator::Has => ":",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Field name, optionally qualified with a single table prefix
    ///
    /// # Examples
    /// ```text
    /// status
    /// create_time
    /// author.name
    /// ```
    Identifier(String),

    /// Literal value with its raw source text
    ///
    /// String literals keep their quotes and escapes; decoding is left to the
    /// compiler so that wildcard stars can be told apart from escaped ones.
    Literal { kind: LiteralKind, text: String },

    /// Comparison symbol
    Comparator(Comparator),

    /// Left parenthesis `(`
    LParen,

    /// Right parenthesis `)`
    RParen,

    /// `AND`
    And,

    /// `OR`
    Or,

    /// `NOT` or a leading `-`
    ///
    /// # Examples
    /// ```text
    /// NOT status = 1
    /// -(tags:"a")
    /// ```
    Not,

    /// `,`
    Comma,

    /// End of input
    Eof,
}

impl Token {
    pub fn literal(kind: LiteralKind, text: impl Into<String>) -> Self {
        Token::Literal {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Identifier(name) => write!(f, "{}", name),
            Token::Literal { text, .. } => write!(f, "{}", text),
            Token::Comparator(c) => write!(f, "{}", c),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::And => write!(f, "AND"),
            Token::Or => write!(f, "OR"),
            Token::Not => write!(f, "NOT"),
            Token::Comma => write!(f, ","),
            Token::Eof => write!(f, "end of input"),
        }
    }
}
