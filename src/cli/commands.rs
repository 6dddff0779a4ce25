//! CLI command definitions using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Run external commands with captured output and enforced timeouts.
///
/// Each command is launched directly (no shell), its stdout and stderr are
/// captured, and it is killed if it outlives its timeout.
#[derive(Parser, Debug)]
#[command(name = "procwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (overrides default XDG paths)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log filter, e.g. "debug" or "procwatch=trace" (overrides PROCWATCH_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a single command
    Run(RunArgs),

    /// Run all commands of a manifest concurrently
    Batch(BatchArgs),

    /// Show resolved configuration
    Config(ConfigArgs),
}

/// Arguments for the `run` subcommand
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Timeout in milliseconds (defaults to the configured timeout)
    #[arg(short, long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// Program to run
    #[arg(required = true)]
    pub command: String,

    /// Arguments passed verbatim to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Arguments for the `batch` subcommand
#[derive(Parser, Debug)]
pub struct BatchArgs {
    /// Manifest file with [[commands]] entries
    pub manifest: PathBuf,

    /// Default timeout in milliseconds for entries without one
    #[arg(short, long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the `config` subcommand
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Table,
    /// JSON output
    Json,
    /// Raw captured output only
    Plain,
}
