//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Query execution core: run patterns and inspect source health
#[derive(Parser, Debug)]
#[command(name = "queryweave")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $QUERYWEAVE_CONFIG, then queryweave.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Color output mode [auto, always, never]
    #[arg(
        long,
        global = true,
        default_value = "auto",
        hide_possible_values = true
    )]
    pub color: ColorChoice,

    /// JSON output for scripting
    #[arg(long, global = true)]
    pub json: bool,

    /// Decrease output verbosity
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Color output mode for terminal rendering.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect automatically
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a query pattern and print the JSON response
    Query(QueryArgs),

    /// Check every configured source and show pool statistics
    Health,
}

/// Arguments for `queryweave query`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Pattern JSON file, or `-` for stdin
    #[arg(long, short)]
    pub pattern: String,

    /// Federation strategy to request
    #[arg(long)]
    pub strategy: Option<String>,
}
