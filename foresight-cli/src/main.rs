//! `foresight` binary entry point.
//!
//! Parses arguments, loads `foresight.toml`, initializes logging and
//! dispatches to the subcommand handlers in [`commands`].

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use foresight_core::config::ForesightConfig;
use foresight_core::error::{ConfigError, ForesightError};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // `config` loads the file itself so it can report what is wrong with it.
    let config = match &cli.command {
        Commands::Config(_) => ForesightConfig::default(),
        _ => match resolve_config(&cli.config).await {
            Ok(config) => config,
            Err(e) => return fail(&e),
        },
    };

    let mut general = config.general.clone();
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = logging::init_tracing(&general) {
        return fail(&CliError::Config(e.to_string()));
    }

    foresight_core::metrics::describe_all();
    tracing::debug!(config = %cli.config.display(), "foresight starting");

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

async fn run(cli: Cli, config: ForesightConfig) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    match cli.command {
        Commands::Search(args) => commands::search::execute(args, &config, &writer).await,
        Commands::Check(args) => commands::check::execute(args, &config, &writer).await,
        Commands::Rules(args) => commands::rules::execute(args, &config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}

/// Loads the configuration file; a missing file falls back to defaults
/// with environment overrides applied.
async fn resolve_config(path: &Path) -> Result<ForesightConfig, CliError> {
    match ForesightConfig::load(path).await {
        Ok(config) => Ok(config),
        Err(ForesightError::Config(ConfigError::FileNotFound { .. })) => {
            let mut config = ForesightConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

fn fail(err: &CliError) -> ExitCode {
    eprintln!("{} {err}", "error:".red().bold());
    ExitCode::from(err.exit_code())
}
