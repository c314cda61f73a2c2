//! smerkle CLI binary.

use clap::Parser;
use smerkle::cli::{self, Cli};
use smerkle::config::Settings;
use smerkle::logging::{init_logging, LoggingConfig};
use std::path::Path;
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(Path::new(".")) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let logging = build_logging_config(&cli, &settings);
    if let Err(e) = init_logging(&logging) {
        eprintln!("failed to initialize logging: {e}");
        process::exit(1);
    }

    if let Err(e) = cli::run(cli, settings).await {
        error!("command failed: {}", e);
        eprintln!("{e}");
        process::exit(1);
    }
}

/// Logging is off unless asked for: `--verbose` enables the configured
/// level, `--log-level` overrides it outright.
fn build_logging_config(cli: &Cli, settings: &Settings) -> LoggingConfig {
    let mut config = settings.logging.clone();
    if !cli.verbose && cli.log_level.is_none() {
        config.level = "off".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    config
}
