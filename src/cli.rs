// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `assetflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetflow",
    version,
    about = "Build, watch and serve static-site assets.",
    long_about = "Build, watch and serve static-site assets.\n\n\
                  Without a subcommand: clean, build everything, start the dev \
                  server and watch for changes."
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value = "Assetflow.toml")]
    pub config: String,

    /// Build for production (minify, prefix, production output root).
    #[arg(long, global = true)]
    pub production: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETFLOW_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the task graph, but don't run anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Open the site in a browser after the first successful build
    /// (default flow only).
    #[arg(long)]
    pub open: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Clean the output directory, then run every task once.
    Build,
    /// Re-run tasks whenever their source files change.
    Watch,
    /// Remove the output directory of the active mode.
    Clean,
    /// Serve the output directory with live reload.
    Serve {
        /// Open the site in the default browser.
        #[arg(long)]
        open: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_the_default_flow() {
        let args = CliArgs::try_parse_from(["assetflow", "--open"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.open);
        assert_eq!(args.config, "Assetflow.toml");
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let args =
            CliArgs::try_parse_from(["assetflow", "build", "--production", "--config", "site.toml"])
                .unwrap();
        assert!(matches!(args.command, Some(Command::Build)));
        assert!(args.production);
        assert_eq!(args.config, "site.toml");

        let args = CliArgs::try_parse_from(["assetflow", "serve", "--open"]).unwrap();
        assert!(matches!(args.command, Some(Command::Serve { open: true })));
    }
}
