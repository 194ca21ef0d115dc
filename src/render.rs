use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{FilterGroup, Joiner, Operand, Operator, Predicate},
    value::{Argument, NamedArgs, Value},
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("Invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("invalid key {0}")]
    InvalidKey(String),

    #[error("no argument named :{0}")]
    UnknownArgument(String),

    #[error("subquery argument :{name} can only be used with __in or __nin")]
    MisplacedSubQuery { name: String },
}

/// SQL text with `$n` placeholders and the values bound to them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Positional numbering of named arguments.
struct Numbering<'a> {
    positions: HashMap<&'a str, usize>,
    subqueries: HashMap<&'a str, String>,
    values: Vec<Value>,
}

impl<'a> Numbering<'a> {
    /// Subquery arguments take the first positions, then scalar arguments in
    /// insertion order.
    fn new(args: &'a NamedArgs) -> Self {
        let mut numbering = Numbering {
            positions: HashMap::new(),
            subqueries: HashMap::new(),
            values: Vec::new(),
        };

        for (name, arg) in args.iter() {
            if let Argument::SubQuery(query) = arg {
                let sql = shift_placeholders(&query.sql, numbering.values.len(), query.args.len());
                numbering.values.extend(query.args.iter().cloned());
                numbering.subqueries.insert(name, sql);
            }
        }
        for (name, arg) in args.iter() {
            if let Argument::Value(value) = arg {
                numbering.values.push(value.clone());
                numbering.positions.insert(name, numbering.values.len());
            }
        }
        numbering
    }
}

/// Shift `$1..=$count` by `offset` in one pass; other `$k` are left alone.
pub fn shift_placeholders(sql: &str, offset: usize, count: usize) -> String {
    if offset == 0 {
        return sql.to_string();
    }
    PLACEHOLDER
        .replace_all(sql, |caps: &Captures| match caps[1].parse::<usize>() {
            Ok(k) if (1..=count).contains(&k) => format!("${}", k + offset),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders predicate groups as a PostgreSQL WHERE clause.
///
/// Columns are qualified with the model alias unless the key already names a
/// table (`author.name`). Array columns switch membership tests around so the
/// bound value is searched inside the column.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    qualifier: Option<String>,
    array_columns: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Renderer {
    pub fn new(model: impl Into<String>) -> Self {
        Renderer {
            qualifier: Some(model.into()),
            ..Default::default()
        }
    }

    /// Renderer emitting bare `"column"` names, for DELETE and UPDATE.
    pub fn unqualified() -> Self {
        Renderer::default()
    }

    pub fn array_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.array_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// `-column` sorts descending.
    pub fn order_by<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset;
        self
    }

    pub fn quote_column(&self, column: &str) -> Result<String, RenderError> {
        let parts: Vec<&str> = column.split('.').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(match &self.qualifier {
                Some(model) => format!("{}.{}", quote_ident(model), quote_ident(name)),
                None => quote_ident(name),
            }),
            [table, name] if !table.is_empty() && !name.is_empty() => {
                Ok(format!("{}.{}", quote_ident(table), quote_ident(name)))
            }
            _ => Err(RenderError::InvalidKey(column.to_string())),
        }
    }

    /// Conditions only, without `WHERE` or the ordering tail.
    ///
    /// Sections are AND/OR-joined by the `or` flag of their first group. When
    /// there is more than one section, a section holding several groups is
    /// wrapped in its own parentheses so its ORs cannot escape it.
    /// Nothing is bound when no condition renders.
    pub fn render_conditions<S>(&self, sections: &[S], args: &NamedArgs) -> Result<SqlFragment, RenderError>
    where
        S: AsRef<[FilterGroup]>,
    {
        let sections: Vec<Vec<&FilterGroup>> = sections
            .iter()
            .map(|s| s.as_ref().iter().filter(|g| !g.is_empty()).collect::<Vec<_>>())
            .filter(|groups| !groups.is_empty())
            .collect();
        if sections.is_empty() {
            return Ok(SqlFragment::default());
        }
        let numbering = Numbering::new(args);
        let wrap = sections.len() > 1;

        let mut sql = String::new();
        for groups in &sections {
            if !sql.is_empty() {
                sql.push_str(if groups[0].or { " OR " } else { " AND " });
            }
            let wrapped = wrap && groups.len() > 1;
            if wrapped {
                sql.push('(');
            }
            for (i, group) in groups.iter().enumerate() {
                if i > 0 {
                    sql.push_str(if group.or { " OR " } else { " AND " });
                }
                self.render_group(group, &numbering, &mut sql)?;
            }
            if wrapped {
                sql.push(')');
            }
        }

        Ok(SqlFragment {
            sql,
            args: numbering.values,
        })
    }

    /// ` WHERE ...` followed by ORDER BY, LIMIT and OFFSET.
    pub fn render<S>(&self, sections: &[S], args: &NamedArgs) -> Result<SqlFragment, RenderError>
    where
        S: AsRef<[FilterGroup]>,
    {
        let conditions = self.render_conditions(sections, args)?;
        let mut sql = String::new();
        if !conditions.sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.sql);
        }
        sql.push_str(&self.render_tail()?);

        debug!(sql = %sql, args = conditions.args.len(), "rendered filter");
        Ok(SqlFragment {
            sql,
            args: conditions.args,
        })
    }

    fn render_group(&self, group: &FilterGroup, numbering: &Numbering, sql: &mut String) -> Result<(), RenderError> {
        let default_joiner = if group.inner_or { Joiner::Or } else { Joiner::And };
        sql.push('(');
        for (i, predicate) in group.predicates.iter().enumerate() {
            if i > 0 {
                let joiner = predicate.joiner().unwrap_or(default_joiner);
                sql.push(' ');
                sql.push_str(joiner.sql());
                sql.push(' ');
            }
            sql.push_str(&self.render_predicate(predicate, numbering)?);
        }
        sql.push(')');
        Ok(())
    }

    fn render_tail(&self) -> Result<String, RenderError> {
        let mut sql = String::new();
        if !self.order_by.is_empty() {
            let terms = self
                .order_by
                .iter()
                .map(|term| -> Result<String, RenderError> {
                    match term.strip_prefix('-') {
                        Some(column) => Ok(format!("{} DESC", self.quote_column(column)?)),
                        None => Ok(format!("{} ASC", self.quote_column(term)?)),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        Ok(sql)
    }

    fn render_predicate(&self, predicate: &Predicate, numbering: &Numbering) -> Result<String, RenderError> {
        let column = self.quote_column(&predicate.column)?;
        let operator = predicate.operator();
        if operator.is_null_check() {
            return Ok(format!("{} {}", column, operator.sql()));
        }

        let operand = match &predicate.operand {
            Operand::Literal(text) => text.clone(),
            Operand::Placeholder {
                name,
                leading_wildcard,
                trailing_wildcard,
            } => {
                if let Some(sql) = numbering.subqueries.get(name.as_str()) {
                    return match operator {
                        Operator::In => Ok(format!("{} IN ({})", column, sql)),
                        Operator::NotIn => Ok(format!("{} NOT IN ({})", column, sql)),
                        _ => Err(RenderError::MisplacedSubQuery { name: name.clone() }),
                    };
                }
                let position = numbering
                    .positions
                    .get(name.as_str())
                    .ok_or_else(|| RenderError::UnknownArgument(name.clone()))?;
                let mut operand = format!("${}", position);
                if *leading_wildcard {
                    operand = format!("'%' || {}", operand);
                }
                if *trailing_wildcard {
                    operand = format!("{} || '%'", operand);
                }
                operand
            }
        };

        Ok(match operator {
            Operator::In | Operator::NotIn => {
                let quantifier = if operator == Operator::In { "ANY" } else { "ALL" };
                if self.array_columns.iter().any(|c| *c == predicate.column) {
                    format!("{} {} {}({})", operand, operator.sql(), quantifier, column)
                } else {
                    format!("{} {} {}({})", column, operator.sql(), quantifier, operand)
                }
            }
            _ => format!("{} {} {}", column, operator.sql(), operand),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_placeholders_single_pass() {
        let sql = "SELECT 1 WHERE a = $1 AND b = $2 AND c = $10";
        assert_eq!(
            shift_placeholders(sql, 9, 10),
            "SELECT 1 WHERE a = $10 AND b = $11 AND c = $19"
        );
        assert_eq!(shift_placeholders("x = $3", 2, 2), "x = $3");
    }

    #[test]
    fn test_quote_column() {
        let r = Renderer::new("M");
        assert_eq!(r.quote_column("id").unwrap(), r#""M"."id""#);
        assert_eq!(r.quote_column("t.id").unwrap(), r#""t"."id""#);
        assert_eq!(r.quote_column("a.b.c"), Err(RenderError::InvalidKey("a.b.c".to_string())));
        assert_eq!(Renderer::unqualified().quote_column("id").unwrap(), r#""id""#);
        assert_eq!(r.quote_column("we\"ird").unwrap(), r#""M"."we""ird""#);
    }

    #[test]
    fn test_tail() {
        let r = Renderer::new("M")
            .order_by(["-created", "id"])
            .limit(Some(10))
            .offset(Some(20));
        let fragment = r.render::<Vec<FilterGroup>>(&[], &NamedArgs::new()).unwrap();
        assert_eq!(
            fragment.sql,
            r#" ORDER BY "M"."created" DESC, "M"."id" ASC LIMIT 10 OFFSET 20"#
        );
    }
}
