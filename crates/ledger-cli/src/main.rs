//! # ledger-cli
//!
//! Command-line interface for performing ledger operations.
//!
//! Operations run against the in-memory ledger, seeded from the
//! configuration file, so a single invocation can create, find, update or
//! delete a resource and report the result as JSON.

mod commands;
mod config;
mod input;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ledger_operation::OperationKind;
use tracing_subscriber::EnvFilter;

use crate::commands::{Ledger, ResourceSource};
use crate::config::CliConfig;

const EXIT_FATAL: u8 = 3;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(about = "Ledger sync operations CLI")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `ledger_operation=trace`
    #[arg(long)]
    log_level: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform an operation against the ledger
    Perform {
        /// Operation kind (create, find, update, delete)
        #[arg(value_parser = parse_kind)]
        kind: OperationKind,

        /// Resource type (e.g., account, vendor)
        resource_type: String,

        #[command(flatten)]
        input: InputArgs,

        /// Perform even if the resource fails the operation's contract
        #[arg(long)]
        skip_validation: bool,
    },

    /// Check a resource against an operation's contract
    Validate {
        /// Operation kind (create, find, update, delete)
        #[arg(value_parser = parse_kind)]
        kind: OperationKind,

        /// Resource type (e.g., account, vendor)
        resource_type: String,

        #[command(flatten)]
        input: InputArgs,
    },

    /// List registered operations
    Operations,
}

#[derive(Args)]
struct InputArgs {
    /// Resource as inline JSON
    #[arg(short, long, conflicts_with = "file")]
    data: Option<String>,

    /// File holding the resource JSON
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Ledger id, overriding any in the input
    #[arg(long)]
    id: Option<String>,
}

impl From<InputArgs> for ResourceSource {
    fn from(args: InputArgs) -> Self {
        Self {
            data: args.data,
            file: args.file,
            id: args.id,
        }
    }
}

fn parse_kind(name: &str) -> Result<OperationKind, String> {
    OperationKind::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = OperationKind::ALL.iter().map(|kind| kind.name()).collect();
        format!("unknown operation '{name}' (expected one of: {})", known.join(", "))
    })
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = CliConfig::load_or_default(cli.config.as_deref())?;
    init_logging(cli.log_level.as_deref().or(config.log_level.as_deref()));

    let ledger = Ledger::from_config(&config)?;
    match cli.command {
        Commands::Perform {
            kind,
            resource_type,
            input,
            skip_validation,
        } => commands::perform(
            &ledger,
            kind,
            &resource_type,
            &input.into(),
            skip_validation,
            cli.pretty,
        ),
        Commands::Validate {
            kind,
            resource_type,
            input,
        } => commands::validate(&ledger, kind, &resource_type, &input.into(), cli.pretty),
        Commands::Operations => Ok(commands::operations(&ledger)),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("ERROR: {error:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
