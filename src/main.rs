//! Satchel - an asset bundler for scripts, stylesheets and html templates.

mod asset;
mod bundle;
mod cache;
mod cli;
mod config;
mod container;
mod core;
mod error;
mod fs;
mod graph;
mod logger;
mod service;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::SatchelConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = SatchelConfig::load(&cli.config)?;
    crate::debug!("config"; "loaded {}", config.config_path.display());

    match &cli.command {
        Commands::Build { force } => cli::build::build(&config, *force),
        Commands::Watch => cli::watch::watch(&config),
        Commands::Check => cli::check::check(&config),
        Commands::Refs { paths } => cli::refs::refs(&config, paths),
        Commands::Clean => cli::build::clean(&config),
    }
}
