//! equate CLI - harmonize and validate survey items across cycles.

mod cli;
mod commands;
mod logging;

use std::process;

use clap::Parser;
use cli::{Cli, Commands};
use equate::{EquateConfig, EquateError};
use logging::{init_logging, LogConfig};

/// Exit status when the data loaded but failed a hard check.
const EXIT_VALIDATION_FAILED: i32 = 2;

fn main() {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format));

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Codebook { file, json } => commands::codebook::run(file, json),

        Commands::Harmonize {
            source,
            cycles,
            audit,
        } => commands::harmonize::run(source, cycles, audit, config),

        Commands::Resolve {
            source,
            cycle,
            threshold,
            output,
            format,
        } => commands::resolve::run(source, cycle, threshold, output, format, config),

        Commands::Validate {
            source,
            cycles,
            report,
            json,
        } => commands::validate::run(source, cycles, report, json, cli.verbose > 0, config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let code = match e.downcast_ref::<EquateError>() {
            Some(EquateError::ValidationFailure { .. }) => EXIT_VALIDATION_FAILED,
            _ => 1,
        };
        process::exit(code);
    }
}

fn load_config(path: Option<&std::path::Path>) -> equate::Result<EquateConfig> {
    match path {
        Some(path) => {
            let config = EquateConfig::from_toml_file(path)?;
            tracing::info!(config = %path.display(), "loaded configuration");
            Ok(config)
        }
        None => Ok(EquateConfig::default()),
    }
}
