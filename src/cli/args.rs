//! Top-level argument definitions

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::cli::commands::config::ConfigArgs;
use crate::cli::commands::run::RunArgs;
use crate::cli::commands::simulate::SimulateArgs;
use crate::cli::commands::sweep::SweepArgs;

#[derive(Parser, Debug)]
#[command(name = "bando")]
#[command(author, version, about = "Monte-Carlo tolerance-stack analysis for bandolier cell modules")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Auto, global = true)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text on a terminal
    #[default]
    Auto,
    Text,
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a Monte-Carlo batch on one configuration
    Run(RunArgs),

    /// Run a parameter sweep and write every trial to CSV
    Sweep(SweepArgs),

    /// Build and relax a single module
    Simulate(SimulateArgs),

    /// Print the default (or a resolved) model configuration
    Config(ConfigArgs),
}
