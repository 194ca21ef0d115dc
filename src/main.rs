use aipsql::cli::{self, CliError, CompileOptions, CompileResult};
use clap::{Parser as ClapParser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "aipsql")]
#[command(about = "aipsql - Compile AIP-160 filters into parameterized PostgreSQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a filter and print the SQL with its arguments
    Compile {
        /// The filter to compile (reads from stdin if not provided)
        filter: Option<String>,

        /// JSON file with identifier policies and models
        #[arg(short = 'c', long)]
        policy: Option<PathBuf>,

        /// Model from the policy file to build a full SELECT for
        #[arg(short, long)]
        model: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate a filter against the policy without rendering
    Check {
        /// The filter to check (reads from stdin if not provided)
        filter: Option<String>,

        /// JSON file with identifier policies
        #[arg(short = 'c', long)]
        policy: Option<PathBuf>,
    },

    /// Print the tokens of a filter
    Tokens {
        /// The filter to tokenize (reads from stdin if not provided)
        filter: Option<String>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            filter,
            policy,
            model,
            pretty,
        } => run_compile(filter, policy, model, pretty, false),
        Commands::Check { filter, policy } => run_compile(filter, policy, None, false, true),
        Commands::Tokens { filter, pretty } => run_tokens(filter, pretty),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("AIPSQL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_filter(filter: Option<String>) -> Result<String, CliError> {
    match filter {
        Some(s) => Ok(s),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer.trim().to_string())
        }
        None => Err(CliError::NoInput),
    }
}

fn print_json(output: &serde_json::Value, pretty: bool) -> Result<(), CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(output)
    } else {
        serde_json::to_string(output)
    }?;
    println!("{}", json);
    Ok(())
}

fn run_compile(
    filter: Option<String>,
    policy: Option<PathBuf>,
    model: Option<String>,
    pretty: bool,
    check_only: bool,
) -> Result<(), CliError> {
    let filter = read_filter(filter)?;
    let config = policy.map(fs::read_to_string).transpose()?;

    let options = CompileOptions {
        filter,
        config,
        model,
        check_only,
    };

    match cli::execute_compile(&options)? {
        CompileResult::Valid => println!("Filter is valid"),
        CompileResult::Success(output) => print_json(&output, pretty)?,
    }
    Ok(())
}

fn run_tokens(filter: Option<String>, pretty: bool) -> Result<(), CliError> {
    let filter = read_filter(filter)?;
    print_json(&cli::execute_tokens(&filter)?, pretty)
}
