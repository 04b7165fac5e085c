use bando::cli::helpers::init_tracing;
use bando::cli::{Cli, Commands};
use clap::Parser;
use miette::Result;

fn main() -> Result<()> {
    // Install miette's fancy error handler for beautiful diagnostics
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Run(args) => bando::cli::commands::run::run(args, &cli.global),
        Commands::Sweep(args) => bando::cli::commands::sweep::run(args, &cli.global),
        Commands::Simulate(args) => bando::cli::commands::simulate::run(args, &cli.global),
        Commands::Config(args) => bando::cli::commands::config::run(args, &cli.global),
    }
}
