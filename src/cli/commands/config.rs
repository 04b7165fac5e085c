//! `bando config` command - print the model configuration

use std::path::PathBuf;

use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::load_config;
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Resolve and validate this file instead of printing the defaults
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

pub fn run(args: ConfigArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    if print_structured(global.format, &config)? {
        return Ok(());
    }
    print!("{}", config.to_yaml().into_diagnostic()?);
    Ok(())
}
