//! serve-hmr - Launcher and hot-reload listener for the `serve` static file server.

mod cli;
mod config;
mod core;
mod hmr;
mod launch;
mod logger;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::AppConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = AppConfig::load(&cli.config)?;
    if let Some(path) = &config.config_path {
        debug!("config"; "using {}", path.display());
    }

    match &cli.command {
        Commands::Launch { args } => {
            let code = cli::launch::run_launch(args, &config)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Listen { args } => cli::listen::run_listen(args, &config),
    }
}
