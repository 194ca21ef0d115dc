//! # Filter Syntax Tree
//!
//! Types shared by the lexer, the filter compiler and the SQL renderer.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens of the AIP-160 filter grammar
//! - **[operators]** - SQL operators and the `__hint` suffixes naming them
//! - **[predicate]** - Single `column <op> operand` comparisons
//! - **[group]** - Parenthesized predicate lists
//!
//! ## From filter to SQL
//!
//! ```text
//! (status = 1 OR title:"draft") AND -(tags:"archived")
//! ```
//!
//! compiles to two groups:
//!
//! ```text
//! [status=:status_aip160_, title__ilike__or=%:title__ilike__or_aip160_%]
//! AND [tags__nin__and=:tags__nin__and_aip160_]
//! ```
//!
//! which render (with `tags` declared as an array column) as:
//!
//! ```text
//! ("M"."status" = $1 OR "M"."title" ILIKE '%' || $2 || '%') AND ($3 != ALL("M"."tags"))
//! ```
//!
//! ## Hint suffixes
//!
//! Hand-written filters use the same keys the compiler produces:
//!
//! | suffix | SQL |
//! |---|---|
//! | (none), `__eq` | `=` |
//! | `__ne` | `!=` |
//! | `__lt`, `__lte`, `__gt`, `__gte` | `<`, `<=`, `>`, `>=` |
//! | `__in`, `__nin` | `= ANY($n)`, `!= ALL($n)`, `IN (subquery)` |
//! | `__like`, `__nlike`, `__ilike`, `__nilike` | `LIKE`, `NOT LIKE`, ... |
//! | `__null`, `__notnull` | `IS NULL`, `IS NOT NULL` |
//! | `__or`, `__and` | combinator with the previous predicate |
pub mod group;
pub mod operators;
pub mod predicate;
pub mod tokens;

pub use group::FilterGroup;
pub use operators::{Hint, Joiner, Operator};
pub use predicate::{FilterSyntaxError, Operand, Predicate};
pub use tokens::{Comparator, LiteralKind, Token};
