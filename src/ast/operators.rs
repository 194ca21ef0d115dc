use std::fmt;

use super::tokens::Comparator;

/// SQL comparison operators a predicate can carry.
///
/// Each operator has a hint suffix (`__gt`, `__nin`, ...) used in predicate
/// render keys and hand-written filters. `Eq` is the implicit default and is
/// never written as a suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// Membership, `= ANY(...)` or `IN (subquery)`
    In,
    /// Exclusion, `!= ALL(...)` or `NOT IN (subquery)`
    NotIn,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `ILIKE`
    ILike,
    /// `NOT ILIKE`
    NotILike,
    /// `IS NULL`
    IsNull,
    /// `IS NOT NULL`
    IsNotNull,
}

impl Operator {
    const ALL: [Operator; 14] = [
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::In,
        Operator::NotIn,
        Operator::Like,
        Operator::NotLike,
        Operator::ILike,
        Operator::NotILike,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// Hint name without the leading `__`.
    pub fn hint(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::In => "in",
            Operator::NotIn => "nin",
            Operator::Like => "like",
            Operator::NotLike => "nlike",
            Operator::ILike => "ilike",
            Operator::NotILike => "nilike",
            Operator::IsNull => "null",
            Operator::IsNotNull => "notnull",
        }
    }

    pub fn from_hint(hint: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.hint() == hint)
    }

    /// SQL text placed between column and operand.
    ///
    /// `In` and `NotIn` report their scalar form; the renderer rewrites them
    /// into `ANY`/`ALL`/`IN` shapes depending on the operand.
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq | Operator::In => "=",
            Operator::Ne | Operator::NotIn => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::ILike => "ILIKE",
            Operator::NotILike => "NOT ILIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Logical complement: `NOT (a op b)` is `a op.negated() b`.
    ///
    /// Ordering operators flip to the complement, not the mirror:
    /// `NOT a < 1` is `a >= 1`, never `a > 1`.
    pub fn negated(self) -> Self {
        match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::Lt => Operator::Gte,
            Operator::Lte => Operator::Gt,
            Operator::Gt => Operator::Lte,
            Operator::Gte => Operator::Lt,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::Like => Operator::NotLike,
            Operator::NotLike => Operator::Like,
            Operator::ILike => Operator::NotILike,
            Operator::NotILike => Operator::ILike,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
        }
    }

    /// Operator for a filter comparator on a scalar field.
    pub fn from_comparator(comparator: Comparator) -> Self {
        match comparator {
            Comparator::Equals => Operator::Eq,
            Comparator::NotEquals => Operator::Ne,
            Comparator::LessThan => Operator::Lt,
            Comparator::LessEquals => Operator::Lte,
            Comparator::GreaterEquals => Operator::Gte,
            Comparator::GreaterThan => Operator::Gt,
            Comparator::Has => Operator::ILike,
        }
    }

    pub fn is_null_check(self) -> bool {
        matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// Boolean combinator attached to a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joiner {
    And,
    Or,
}

impl Joiner {
    pub fn sql(self) -> &'static str {
        match self {
            Joiner::And => "AND",
            Joiner::Or => "OR",
        }
    }
}

/// One `__suffix` of a predicate render key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hint {
    Op(Operator),
    Join(Joiner),
}

impl Hint {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "and" => Some(Hint::Join(Joiner::And)),
            "or" => Some(Hint::Join(Joiner::Or)),
            other => Operator::from_hint(other).map(Hint::Op),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Hint::Op(op) => op.hint(),
            Hint::Join(Joiner::And) => "and",
            Hint::Join(Joiner::Or) => "or",
        }
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__{}", self.name())
    }
}
