//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE;

/// Asset bundler for scripts, stylesheets and html templates
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path (default: satchel.toml)
    #[arg(short = 'C', long, global = true, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build all bundles, reusing the manifest cache when it is fresh
    #[command(visible_alias = "b")]
    Build {
        /// Ignore and rebuild the manifest cache
        #[arg(short, long)]
        force: bool,
    },

    /// Build, then rebuild whenever a source file changes
    #[command(visible_alias = "w")]
    Watch,

    /// Validate references and ordering without producing output
    #[command(visible_alias = "c")]
    Check,

    /// Print the bundle urls needed for the given paths, dependencies first
    #[command(visible_alias = "r")]
    Refs {
        /// Asset or bundle paths (`~/app/main.js`, `~/styles`)
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,
    },

    /// Remove the manifest cache
    Clean,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_refs() {
        let cli = Cli::parse_from(["satchel", "-v", "refs", "~/app/a.js", "~/css"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("satchel.toml"));
        match cli.command {
            Commands::Refs { paths } => assert_eq!(paths, vec!["~/app/a.js", "~/css"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_build_force() {
        let cli = Cli::parse_from(["satchel", "build", "--force", "-C", "web/satchel.toml"]);
        assert!(matches!(cli.command, Commands::Build { force: true }));
        assert_eq!(cli.config, PathBuf::from("web/satchel.toml"));
    }
}
