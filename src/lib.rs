pub mod ast;
pub mod compiler;
pub mod config;
pub mod lexer;
pub mod literal;
pub mod page_token;
pub mod policy;
pub mod query;
pub mod render;
pub mod value;

#[cfg(feature = "cli")]
pub mod cli;

pub use ast::{FilterGroup, Hint, Joiner, LiteralKind, Operand, Operator, Predicate, Token};
pub use compiler::{compile, CompileError, CompiledFilter, Compiler};
pub use config::{Config, ConfigError};
pub use lexer::{Lexer, LexError, Position};
pub use page_token::{PageRequest, PageToken, PageTokenError};
pub use policy::{FilterOptions, IdentifierPolicy, PolicyError};
pub use query::{JoinKind, Model, QueryError, QuerySet};
pub use render::{RenderError, Renderer, SqlFragment};
pub use value::{Argument, NamedArgs, SubQuery, Value};
