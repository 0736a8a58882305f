//! Command-line adapter.

pub mod command;
pub mod health;
pub mod output;
pub mod query;

use anyhow::Result;

use self::command::{Cli, Commands};
use self::output::OutputConfig;
use crate::infrastructure::config::settings::Config;

/// Run a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.color));

    let path = cli
        .config
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(Config::path_from_env);
    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            output::error(&format!("failed to load {path}: {e}"));
            return Err(e.into());
        }
    };
    config.init_logging();

    match cli.command {
        Commands::Query(args) => query::execute(&config, &args.pattern, args.strategy.as_deref()).await,
        Commands::Health => health::execute(&config).await,
    }
}
