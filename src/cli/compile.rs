//! Compile AIP-160 filters into SQL from the command line

use super::{fragment_to_json, token_to_json, CliError};
use crate::{compile, Config, FilterOptions, Lexer, QuerySet, Renderer};

/// Options for the compile command
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// The AIP-160 filter to compile
    pub filter: String,
    /// Policy/model configuration as JSON text
    pub config: Option<String>,
    /// Model to build a full SELECT for; conditions only when unset
    pub model: Option<String>,
    /// Only validate the filter, don't render SQL
    pub check_only: bool,
}

/// Result of a compile operation
#[derive(Debug)]
pub enum CompileResult {
    /// The filter compiled against the policy
    Valid,
    /// Rendered SQL and its arguments
    Success(serde_json::Value),
}

/// Execute a compile operation
pub fn execute_compile(options: &CompileOptions) -> Result<CompileResult, CliError> {
    let config = match &options.config {
        Some(json) => Config::from_json_str(json)?,
        None => Config::default(),
    };
    let filter_options: &FilterOptions = &config.options;

    if options.check_only {
        compile(&options.filter, filter_options)?;
        return Ok(CompileResult::Valid);
    }

    let fragment = match &options.model {
        Some(name) => QuerySet::new(config.model(name)?)
            .aip160(&options.filter, filter_options)?
            .all_query()?,
        None => compile(&options.filter, filter_options)?
            .to_sql(&Renderer::unqualified().array_columns(filter_options.array_columns()))?,
    };

    Ok(CompileResult::Success(fragment_to_json(&fragment)))
}

/// Tokenize a filter, one JSON object per token
pub fn execute_tokens(filter: &str) -> Result<serde_json::Value, CliError> {
    let tokens = Lexer::new(filter).tokenize()?;
    Ok(serde_json::Value::Array(tokens.iter().map(token_to_json).collect()))
}
