use std::mem;

use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    ast::{Comparator, FilterGroup, Joiner, LiteralKind, Operand, Operator, Predicate, Token},
    lexer::{LexError, Lexer},
    literal::{self, Decoded},
    policy::{FilterOptions, PolicyError},
    render::{RenderError, Renderer, SqlFragment},
    value::{NamedArgs, Value},
};

/// Suffix joining a predicate's render key and its argument counter.
const ARG_MARKER: &str = "_aip160_";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("invalid filter options: {0}")]
    Policy(#[from] PolicyError),

    #[error("nested expressions are not supported")]
    NestedExpression,

    #[error("cannot combine multiple values in subexpression")]
    CombinedValues,

    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,

    #[error("empty parenthesized expression")]
    EmptyExpression,

    #[error("unexpected identifier {0}")]
    UnexpectedIdentifier(String),

    #[error("unexpected token {0}")]
    UnexpectedToken(String),

    #[error("unexpected end of filter")]
    UnexpectedEnd,

    #[error("missing identifier before {0}")]
    MissingIdentifier(String),

    #[error("missing operator for identifier {0}")]
    MissingOperator(String),

    #[error("missing value for identifier {0}")]
    MissingValue(String),

    #[error("null can only be compared with = or != (identifier {0})")]
    InvalidNullComparison(String),

    #[error("invalid {kind} literal {text}: {reason}")]
    InvalidLiteral {
        kind: LiteralKind,
        text: String,
        reason: String,
    },

    #[error("identifier {0} is not allowed")]
    IdentifierNotAllowed(String),

    #[error("type {kind} is not accepted for identifier {identifier}")]
    KindNotAccepted {
        kind: LiteralKind,
        identifier: String,
    },

    #[error("value {value} is not accepted for identifier {identifier}")]
    ValueNotAccepted { value: Value, identifier: String },

    #[error("unknown alias type for identifier {0}")]
    UnknownAliasType(String),
}

/// Output of a compile: groups in source order and the arguments their
/// placeholders reference, in the order they were discovered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub groups: Vec<FilterGroup>,
    pub args: NamedArgs,
}

impl CompiledFilter {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Render this filter's conditions on their own.
    pub fn to_sql(&self, renderer: &Renderer) -> Result<SqlFragment, RenderError> {
        renderer.render_conditions(&[&self.groups], &self.args)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Scope {
    /// Start of the filter: predicates share one group until a `(`.
    #[default]
    Initial,
    /// Inside `( ... )`.
    Paren,
    /// After a `)`: every predicate forms its own group.
    Open,
}

#[derive(Debug, Default)]
struct ScanState {
    scope: Scope,
    /// Negation applied to every predicate of a `NOT ( ... )` scope.
    force_not: bool,
    negate: bool,
    or: bool,
    joins: Vec<Joiner>,
    identifier: Option<String>,
    comparator: Option<Comparator>,
    group: Option<FilterGroup>,
}

impl ScanState {
    fn scope(scope: Scope) -> Self {
        ScanState {
            scope,
            ..Default::default()
        }
    }

    /// Error describing a predicate left half-built.
    fn incomplete(&self) -> Option<CompileError> {
        let identifier = self.identifier.as_ref()?;
        Some(match self.comparator {
            None => CompileError::MissingOperator(identifier.clone()),
            Some(_) => CompileError::MissingValue(identifier.clone()),
        })
    }

    fn has_pending_keyword(&self) -> bool {
        self.negate || !self.joins.is_empty()
    }
}

/// Single-pass compiler from filter tokens to predicate groups.
///
/// Supports one level of parentheses. `NOT (...)` negates every predicate
/// inside, and an explicit `NOT` inside cancels it again.
pub struct Compiler<'a> {
    lexer: Lexer,
    options: &'a FilterOptions,
    state: ScanState,
    groups: Vec<FilterGroup>,
    args: NamedArgs,
}

impl<'a> Compiler<'a> {
    pub fn new(lexer: Lexer, options: &'a FilterOptions) -> Self {
        Compiler {
            lexer,
            options,
            state: ScanState::default(),
            groups: Vec::new(),
            args: NamedArgs::new(),
        }
    }

    pub fn compile(mut self) -> Result<CompiledFilter, CompileError> {
        self.options.validate()?;

        loop {
            let token = self.lexer.next_token()?;
            trace!(token = %token, position = self.lexer.position(), "filter token");

            match token {
                Token::Eof => break,
                Token::LParen => self.open_paren()?,
                Token::RParen => self.close_paren()?,
                Token::And => self.combine(Joiner::And)?,
                Token::Or => self.combine(Joiner::Or)?,
                Token::Not => {
                    if self.state.comparator.is_some() {
                        return Err(CompileError::UnexpectedToken(token.to_string()));
                    }
                    self.state.negate = !self.state.negate;
                }
                Token::Comparator(comparator) => self.comparator(comparator)?,
                Token::Identifier(name) => self.identifier(name)?,
                Token::Literal { kind, text } => self.literal(kind, text)?,
                Token::Comma => return Err(CompileError::UnexpectedToken(token.to_string())),
            }
        }

        self.finish()
    }

    fn open_paren(&mut self) -> Result<(), CompileError> {
        if self.state.scope == Scope::Paren {
            return Err(CompileError::NestedExpression);
        }
        if self.state.identifier.is_some() {
            return Err(CompileError::CombinedValues);
        }

        if self.state.group.is_none() {
            self.state.scope = Scope::Paren;
        } else {
            let next = ScanState {
                scope: Scope::Paren,
                negate: self.state.negate,
                or: self.state.or,
                joins: mem::take(&mut self.state.joins),
                ..Default::default()
            };
            self.close_state(next);
        }

        self.state.force_not = self.state.negate;
        self.state.negate = false;
        Ok(())
    }

    fn close_paren(&mut self) -> Result<(), CompileError> {
        if self.state.scope != Scope::Paren {
            return Err(CompileError::UnbalancedParenthesis);
        }
        if let Some(err) = self.state.incomplete() {
            return Err(err);
        }
        if self.state.has_pending_keyword() {
            return Err(CompileError::UnexpectedToken(Token::RParen.to_string()));
        }
        if self.state.group.is_none() {
            return Err(CompileError::EmptyExpression);
        }

        self.close_state(ScanState::scope(Scope::Open));
        Ok(())
    }

    fn combine(&mut self, joiner: Joiner) -> Result<(), CompileError> {
        if let Some(err) = self.state.incomplete() {
            return Err(err);
        }
        self.state.or = joiner == Joiner::Or;
        self.state.joins.push(joiner);
        Ok(())
    }

    fn comparator(&mut self, comparator: Comparator) -> Result<(), CompileError> {
        if self.state.identifier.is_none() {
            return Err(CompileError::MissingIdentifier(comparator.to_string()));
        }
        if self.state.comparator.is_some() {
            return Err(CompileError::UnexpectedToken(comparator.to_string()));
        }
        self.state.comparator = Some(comparator);
        Ok(())
    }

    fn identifier(&mut self, name: String) -> Result<(), CompileError> {
        if self.state.identifier.is_some() {
            return Err(CompileError::UnexpectedIdentifier(name));
        }
        self.state.identifier = Some(name);
        Ok(())
    }

    fn literal(&mut self, kind: LiteralKind, text: String) -> Result<(), CompileError> {
        let Some(identifier) = self.state.identifier.take() else {
            return Err(CompileError::MissingIdentifier(text));
        };
        let Some(comparator) = self.state.comparator.take() else {
            return Err(CompileError::MissingOperator(identifier));
        };

        let decoded = literal::decode(kind, &text).map_err(|reason| CompileError::InvalidLiteral {
            kind,
            text: text.clone(),
            reason,
        })?;
        let decoded = self.apply_policy(&identifier, decoded)?;

        self.flush(identifier, comparator, decoded)
    }

    /// Resolve aliases, then check kind and value restrictions.
    fn apply_policy(&self, identifier: &str, mut decoded: Decoded) -> Result<Decoded, CompileError> {
        let Some(policy) = self.options.policy(identifier) else {
            return Ok(decoded);
        };

        if let Some(canonical) = policy.resolve_alias(&decoded.value) {
            if matches!(canonical, Value::Null | Value::Array(_)) {
                return Err(CompileError::UnknownAliasType(identifier.to_string()));
            }
            decoded = Decoded {
                wildcard: decoded.wildcard && matches!(canonical, Value::String(_)),
                value: canonical.clone(),
            };
        }

        if let Some(kind) = decoded.value.kind()
            && !policy.accepts_kind(kind)
        {
            return Err(CompileError::KindNotAccepted {
                kind,
                identifier: identifier.to_string(),
            });
        }

        if !decoded.value.is_null() && !policy.accepts_value(&decoded.value) {
            return Err(CompileError::ValueNotAccepted {
                value: decoded.value,
                identifier: identifier.to_string(),
            });
        }

        Ok(decoded)
    }

    fn flush(
        &mut self,
        identifier: String,
        comparator: Comparator,
        decoded: Decoded,
    ) -> Result<(), CompileError> {
        if !self.options.is_allowed(&identifier) {
            return Err(CompileError::IdentifierNotAllowed(identifier));
        }

        let is_array = self.options.policy(&identifier).is_some_and(|p| p.is_array);
        let negate = self.state.force_not ^ self.state.negate;
        let operator = resolve_operator(comparator, negate, &decoded, is_array)
            .ok_or_else(|| CompileError::InvalidNullComparison(identifier.clone()))?;

        let column = self.options.column_for(&identifier).to_string();
        let mut predicate = Predicate::new(column, operator, Operand::Literal("true".to_string()));
        for joiner in self.state.joins.drain(..) {
            predicate = predicate.with_joiner(joiner);
        }

        if !operator.is_null_check() {
            let name = self.argument_name(&predicate.render_key());
            let substring = comparator == Comparator::Has && !is_array;
            predicate.operand = Operand::Placeholder {
                name: name.clone(),
                leading_wildcard: substring,
                trailing_wildcard: substring,
            };
            self.args.set(name, decoded.value);
        }

        trace!(predicate = %predicate, "flushed predicate");

        let or = self.state.or;
        self.state
            .group
            .get_or_insert_with(|| FilterGroup::new(or, false))
            .push(predicate);
        self.state.negate = false;
        self.state.or = false;

        if self.state.scope == Scope::Open {
            self.close_state(ScanState::scope(Scope::Open));
        }
        Ok(())
    }

    /// `<key>_aip160_`, then `<key>_aip160_1`, `_2`, ... on repeats.
    fn argument_name(&self, render_key: &str) -> String {
        let base = format!("{}{}", render_key, ARG_MARKER);
        if !self.args.contains(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}{}", base, n);
            if !self.args.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    fn close_state(&mut self, next: ScanState) {
        let finished = mem::replace(&mut self.state, next);
        if let Some(group) = finished.group
            && !group.is_empty()
        {
            self.groups.push(group);
        }
    }

    fn finish(mut self) -> Result<CompiledFilter, CompileError> {
        if let Some(err) = self.state.incomplete() {
            return Err(err);
        }
        if self.state.scope == Scope::Paren {
            return Err(CompileError::UnbalancedParenthesis);
        }
        if self.state.has_pending_keyword() {
            return Err(CompileError::UnexpectedEnd);
        }
        self.close_state(ScanState::default());

        debug!(
            groups = self.groups.len(),
            args = self.args.len(),
            "compiled filter"
        );
        Ok(CompiledFilter {
            groups: self.groups,
            args: self.args,
        })
    }
}

/// Operator for a comparison, or `None` when null is compared with anything
/// but `=` / `!=`.
fn resolve_operator(
    comparator: Comparator,
    negate: bool,
    decoded: &Decoded,
    is_array: bool,
) -> Option<Operator> {
    let base = match comparator {
        Comparator::Has if is_array => Operator::In,
        other => Operator::from_comparator(other),
    };

    let operator = if decoded.value.is_null() {
        match base {
            Operator::Eq => Operator::IsNull,
            Operator::Ne => Operator::IsNotNull,
            _ => return None,
        }
    } else if decoded.wildcard {
        match base {
            Operator::Eq => Operator::Like,
            Operator::Ne => Operator::NotLike,
            other => other,
        }
    } else {
        base
    };

    Some(if negate { operator.negated() } else { operator })
}

/// Compile `filter` against `options`.
///
/// # Examples
///
/// ```
/// use aipsql::{compile, FilterOptions};
///
/// let compiled = compile("status = 1 OR name:\"bob\"", &FilterOptions::new()).unwrap();
/// assert_eq!(compiled.groups.len(), 1);
/// assert_eq!(compiled.args.len(), 2);
/// ```
pub fn compile(filter: &str, options: &FilterOptions) -> Result<CompiledFilter, CompileError> {
    Compiler::new(Lexer::new(filter), options).compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Hint;

    fn keys(compiled: &CompiledFilter) -> Vec<Vec<String>> {
        compiled
            .groups
            .iter()
            .map(|g| g.predicates.iter().map(|p| p.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_single_predicate() {
        let compiled = compile("id = 1", &FilterOptions::new()).unwrap();
        assert_eq!(keys(&compiled), vec![vec!["id=:id_aip160_"]]);
        assert_eq!(
            compiled.args.get("id_aip160_"),
            Some(&crate::value::Argument::Value(Value::Int(1)))
        );
    }

    #[test]
    fn test_argument_names_are_unique() {
        let compiled = compile("id = 1 OR id = 2 OR id = 3", &FilterOptions::new()).unwrap();
        assert_eq!(
            keys(&compiled),
            vec![vec![
                "id=:id_aip160_",
                "id__or=:id__or_aip160_",
                "id__or=:id__or_aip160_1",
            ]]
        );
    }

    #[test]
    fn test_sticky_negation_cancels() {
        let compiled = compile("NOT (NOT a = 1 AND b > 2)", &FilterOptions::new()).unwrap();
        let preds = &compiled.groups[0].predicates;
        assert_eq!(preds[0].operator(), Operator::Eq);
        assert_eq!(preds[1].operator(), Operator::Lte);
        assert_eq!(preds[1].hints, vec![Hint::Op(Operator::Lte), Hint::Join(Joiner::And)]);
    }

    #[test]
    fn test_null_with_ordering_comparator() {
        assert_eq!(
            compile("a > null", &FilterOptions::new()),
            Err(CompileError::InvalidNullComparison("a".to_string()))
        );
    }
}
