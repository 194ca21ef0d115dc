//! Statement assembly
//!
//! A [`QuerySet`] collects hand-written filters, compiled AIP-160 filters,
//! arguments, joins, ordering and paging for one [`Model`], and renders
//! SELECT, COUNT, UPDATE, DELETE and INSERT statements from them.
//!
//! ```
//! use aipsql::{FilterOptions, Model, NamedArgs, QuerySet};
//!
//! let model = Model::new("book", "books").columns(["id", "title", "shelf_id"]);
//! let query = QuerySet::new(&model)
//!     .filter(["shelf_id=:shelf"]).unwrap()
//!     .args(NamedArgs::new().with("shelf", 7))
//!     .aip160("title:\"rust\"", &FilterOptions::new()).unwrap()
//!     .all_query()
//!     .unwrap();
//!
//! assert_eq!(
//!     query.sql,
//!     "SELECT \"book\".\"id\", \"book\".\"title\", \"book\".\"shelf_id\" FROM \"books\" \"book\" \
//!      WHERE (\"book\".\"shelf_id\" = $1) AND (\"book\".\"title\" ILIKE '%' || $2 || '%')"
//! );
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{FilterGroup, FilterSyntaxError, Operand},
    compiler::{self, CompileError},
    policy::FilterOptions,
    render::{RenderError, Renderer, SqlFragment, quote_ident},
    value::{Argument, NamedArgs, SubQuery, Value},
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Filter(#[from] FilterSyntaxError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("No filter statement found")]
    NoFilter,

    #[error("no column values given")]
    NoValues,

    #[error("unknown column {0}")]
    UnknownColumn(String),
}

/// Table description used in place of runtime reflection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Model {
    /// Alias qualifying every column, e.g. `"book"."id"`.
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    /// Columns holding PostgreSQL arrays.
    #[serde(default)]
    pub array_columns: Vec<String>,
    /// Used when a query sets no ordering; `-column` sorts descending.
    #[serde(default)]
    pub default_order_by: Option<String>,
}

impl Model {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Model {
            name: name.into(),
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add an array-typed column.
    pub fn array_column(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.columns.contains(&column) {
            self.columns.push(column.clone());
        }
        self.array_columns.push(column);
        self
    }

    pub fn default_order_by(mut self, term: impl Into<String>) -> Self {
        self.default_order_by = Some(term.into());
        self
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinKind {
    pub fn sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    kind: JoinKind,
    first_model: String,
    first_key: String,
    second_table: String,
    second_model: String,
    second_key: String,
}

impl Join {
    fn sql(&self) -> String {
        format!(
            "{} {} {} ON {}.{} = {}.{}",
            self.kind.sql(),
            quote_ident(&self.second_table),
            quote_ident(&self.second_model),
            quote_ident(&self.first_model),
            quote_ident(&self.first_key),
            quote_ident(&self.second_model),
            quote_ident(&self.second_key),
        )
    }
}

/// Consecutive hand-written groups share a section; each compiled filter
/// gets its own.
#[derive(Debug, Clone, PartialEq)]
struct Section {
    groups: Vec<FilterGroup>,
    compiled: bool,
}

impl AsRef<[FilterGroup]> for Section {
    fn as_ref(&self) -> &[FilterGroup] {
        &self.groups
    }
}

/// Chainable statement builder over one [`Model`].
///
/// Builders are consumed by each call; errors surface at the call that
/// introduced them.
#[derive(Debug, Clone)]
pub struct QuerySet<'m> {
    model: &'m Model,
    sections: Vec<Section>,
    args: NamedArgs,
    array_columns: Vec<String>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    joins: Vec<Join>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl<'m> QuerySet<'m> {
    pub fn new(model: &'m Model) -> Self {
        QuerySet {
            model,
            sections: Vec::new(),
            args: NamedArgs::new(),
            array_columns: model.array_columns.clone(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            joins: Vec::new(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// AND-combined group of `key__hint=:arg` filters.
    ///
    /// Keys may end in an operator hint (`__ne`, `__in`, `__gte`, `__ilike`,
    /// `__null`, ...) and a combinator hint (`__or`, `__and`) overriding how
    /// the predicate joins the previous one.
    pub fn filter<I, S>(self, queries: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push_filter(queries, false, false)
    }

    /// Like [`QuerySet::filter`], but OR-combined with the previous group.
    pub fn filter_or<I, S>(self, queries: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push_filter(queries, true, false)
    }

    /// Like [`QuerySet::filter`], with OR between the group's predicates.
    pub fn filter_inner_or<I, S>(self, queries: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push_filter(queries, false, true)
    }

    pub fn filter_or_inner_or<I, S>(self, queries: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.push_filter(queries, true, true)
    }

    fn push_filter<I, S>(mut self, queries: I, or: bool, inner_or: bool) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let group = FilterGroup::parse(queries, or, inner_or)?;
        match self.sections.last_mut() {
            Some(section) if !section.compiled => section.groups.push(group),
            _ => self.sections.push(Section {
                groups: vec![group],
                compiled: false,
            }),
        }
        Ok(self)
    }

    /// Merge named arguments; later values replace earlier ones.
    pub fn args(mut self, args: NamedArgs) -> Self {
        self.args.extend(args);
        self
    }

    pub fn arg(mut self, name: impl Into<String>, arg: impl Into<Argument>) -> Self {
        self.args.set(name, arg);
        self
    }

    /// Compile an AIP-160 filter and AND it onto the query.
    ///
    /// Fields marked as arrays in `options` become array columns, so `:`
    /// renders as `$n = ANY(column)`.
    pub fn aip160(mut self, filter: &str, options: &FilterOptions) -> Result<Self, QueryError> {
        let compiled = compiler::compile(filter, options)?;
        for column in options.array_columns() {
            if !self.array_columns.contains(&column) {
                self.array_columns.push(column);
            }
        }
        if compiled.is_empty() {
            return Ok(self);
        }

        let mut groups = compiled.groups;
        let mut renames = HashMap::new();
        for (name, arg) in compiled.args.iter() {
            let mut unique = name.to_string();
            let mut n = 1;
            while self.args.contains(&unique) {
                unique = format!("{}{}", name, n);
                n += 1;
            }
            if unique != name {
                renames.insert(name.to_string(), unique.clone());
            }
            self.args.set(unique, arg.clone());
        }
        rename_placeholders(&mut groups, &renames);
        if let Some(first) = groups.first_mut() {
            first.or = false;
        }
        self.sections.push(Section {
            groups,
            compiled: true,
        });
        Ok(self)
    }

    /// Append ordering terms; `-column` sorts descending.
    pub fn order_by<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn reset_order_by(mut self) -> Self {
        self.order_by.clear();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Select only these columns.
    pub fn include<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Leave these columns out of the select list.
    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn inner_join(self, first: &Model, second: &Model, first_key: &str, second_key: &str) -> Self {
        self.join(JoinKind::Inner, first, second, first_key, second_key)
    }

    pub fn left_join(self, first: &Model, second: &Model, first_key: &str, second_key: &str) -> Self {
        self.join(JoinKind::Left, first, second, first_key, second_key)
    }

    pub fn right_join(self, first: &Model, second: &Model, first_key: &str, second_key: &str) -> Self {
        self.join(JoinKind::Right, first, second, first_key, second_key)
    }

    pub fn full_join(self, first: &Model, second: &Model, first_key: &str, second_key: &str) -> Self {
        self.join(JoinKind::Full, first, second, first_key, second_key)
    }

    /// `<kind> "second.table" "second.name" ON "first.name"."first_key" = "second.name"."second_key"`
    pub fn join(
        mut self,
        kind: JoinKind,
        first: &Model,
        second: &Model,
        first_key: &str,
        second_key: &str,
    ) -> Self {
        self.joins.push(Join {
            kind,
            first_model: first.name.clone(),
            first_key: first_key.to_string(),
            second_table: second.table.clone(),
            second_model: second.name.clone(),
            second_key: second_key.to_string(),
        });
        self
    }

    pub fn has_filters(&self) -> bool {
        self.sections
            .iter()
            .any(|s| s.groups.iter().any(|g| !g.is_empty()))
    }

    fn selected_columns(&self) -> impl Iterator<Item = &String> {
        self.model.columns.iter().filter(move |c| {
            (self.include.is_empty() || self.include.contains(*c)) && !self.exclude.contains(*c)
        })
    }

    fn select_list(&self, qualified: bool) -> String {
        self.selected_columns()
            .map(|c| {
                if qualified {
                    format!("{}.{}", quote_ident(&self.model.name), quote_ident(c))
                } else {
                    quote_ident(c)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn from_clause(&self) -> String {
        let mut sql = format!(
            "FROM {} {}",
            quote_ident(&self.model.table),
            quote_ident(&self.model.name)
        );
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.sql());
        }
        sql
    }

    fn renderer(&self) -> Renderer {
        Renderer::new(&self.model.name).array_columns(self.array_columns.iter().cloned())
    }

    fn effective_order_by(&self) -> Vec<String> {
        if self.order_by.is_empty() {
            self.model.default_order_by.iter().cloned().collect()
        } else {
            self.order_by.clone()
        }
    }

    fn select(&self, limit: Option<u64>) -> Result<SqlFragment, QueryError> {
        let renderer = self
            .renderer()
            .order_by(self.effective_order_by())
            .limit(limit)
            .offset(self.offset);
        let tail = renderer.render(&self.sections, &self.args)?;
        let sql = format!("SELECT {} {}{}", self.select_list(true), self.from_clause(), tail.sql);
        debug!(query = %sql, args = tail.args.len(), "select query");
        Ok(SqlFragment {
            sql,
            args: tail.args,
        })
    }

    /// SELECT with filters, ordering, LIMIT and OFFSET.
    pub fn all_query(&self) -> Result<SqlFragment, QueryError> {
        self.select(self.limit)
    }

    /// SELECT of at most one row; any LIMIT set on the query is ignored.
    pub fn get_query(&self) -> Result<SqlFragment, QueryError> {
        self.select(Some(1))
    }

    /// `SELECT COUNT(*)` with filters but no ordering or paging.
    pub fn count_query(&self) -> Result<SqlFragment, QueryError> {
        let tail = self.renderer().render(&self.sections, &self.args)?;
        let sql = format!("SELECT COUNT(*) {}{}", self.from_clause(), tail.sql);
        debug!(query = %sql, args = tail.args.len(), "count query");
        Ok(SqlFragment {
            sql,
            args: tail.args,
        })
    }

    /// DELETE of every row matching the filters; refuses to run unfiltered.
    pub fn delete_query(&self) -> Result<SqlFragment, QueryError> {
        if !self.has_filters() {
            return Err(QueryError::NoFilter);
        }
        let tail = Renderer::unqualified()
            .array_columns(self.array_columns.iter().cloned())
            .render(&self.sections, &self.args)?;
        let sql = format!("DELETE FROM {}{}", quote_ident(&self.model.table), tail.sql);
        debug!(query = %sql, args = tail.args.len(), "delete query");
        Ok(SqlFragment {
            sql,
            args: tail.args,
        })
    }

    /// UPDATE of the filtered rows; SET placeholders follow the filter's.
    pub fn update_query(&self, values: &[(&str, Value)]) -> Result<SqlFragment, QueryError> {
        if values.is_empty() {
            return Err(QueryError::NoValues);
        }
        self.check_columns(values)?;
        if !self.has_filters() {
            return Err(QueryError::NoFilter);
        }

        let tail = Renderer::unqualified()
            .array_columns(self.array_columns.iter().cloned())
            .render(&self.sections, &self.args)?;
        let mut args = tail.args;
        let assignments = values
            .iter()
            .map(|(column, value)| {
                args.push(value.clone());
                format!("{} = ${}", quote_ident(column), args.len())
            })
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "UPDATE {} SET {}{} RETURNING {}",
            quote_ident(&self.model.table),
            assignments,
            tail.sql,
            self.select_list(false)
        );
        debug!(query = %sql, args = args.len(), "update query");
        Ok(SqlFragment { sql, args })
    }

    /// INSERT of one row, returning the selected columns.
    pub fn create_query(&self, values: &[(&str, Value)]) -> Result<SqlFragment, QueryError> {
        if values.is_empty() {
            return Err(QueryError::NoValues);
        }
        self.check_columns(values)?;

        let columns = values
            .iter()
            .map(|(column, _)| quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=values.len())
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            quote_ident(&self.model.table),
            columns,
            placeholders,
            self.select_list(false)
        );
        debug!(query = %sql, args = values.len(), "create query");
        Ok(SqlFragment {
            sql,
            args: values.iter().map(|(_, v)| v.clone()).collect(),
        })
    }

    /// This query as an `IN (...)` operand for another query.
    pub fn sub_query(&self) -> Result<SubQuery, QueryError> {
        let fragment = self.all_query()?;
        Ok(SubQuery {
            sql: fragment.sql,
            args: fragment.args,
        })
    }

    fn check_columns(&self, values: &[(&str, Value)]) -> Result<(), QueryError> {
        match values.iter().find(|(c, _)| !self.model.has_column(c)) {
            Some((column, _)) => Err(QueryError::UnknownColumn(column.to_string())),
            None => Ok(()),
        }
    }
}

fn rename_placeholders(groups: &mut [FilterGroup], renames: &HashMap<String, String>) {
    if renames.is_empty() {
        return;
    }
    for predicate in groups.iter_mut().flat_map(|g| g.predicates.iter_mut()) {
        if let Operand::Placeholder { name, .. } = &mut predicate.operand
            && let Some(to) = renames.get(name.as_str())
        {
            *name = to.clone();
        }
    }
}
