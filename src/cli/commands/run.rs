//! `bando run` command - Monte-Carlo batch on one configuration

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{batch_seed, format_mm, load_config, print_summary, progress_line};
use crate::cli::output::print_structured;
use crate::cli::viz::{render_histogram, render_module, MODULE_HEIGHT};
use crate::cli::GlobalOpts;
use crate::core::config::ModelConfig;
use crate::core::monte_carlo::{
    default_jobs, trial_specs, Batch, BatchSummary, MonteCarlo, RelaxationRunner, TrialExtreme,
};
use crate::core::simulation::SimulationDriver;
use crate::core::sink::{CsvSink, ResultSink};

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Model configuration file (YAML); defaults apply when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Number of trials
    #[arg(long, short = 'n', default_value = "100")]
    pub iterations: usize,

    /// Batch seed; trial i is seeded with seed + i (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (default: available CPUs)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Write every trial record to this CSV file
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Keep unstable trials in the statistics
    #[arg(long)]
    pub keep_unstable: bool,

    /// Show ASCII histogram of the total width distribution
    #[arg(long, short = 'H')]
    pub histogram: bool,

    /// Number of histogram bins
    #[arg(long, default_value = "30")]
    pub bins: usize,

    /// Replay and draw the narrowest and widest modules
    #[arg(long)]
    pub show_extremes: bool,

    /// Hide the progress line
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Machine-readable batch report
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    seed: u64,
    jobs: usize,
    started_at: DateTime<Utc>,
    elapsed_seconds: f64,
    discard_unstable: bool,
    summary: &'a BatchSummary,
    widths: &'a [f64],
}

pub fn run(args: RunArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let seed = batch_seed(args.seed);
    let jobs = args.jobs.unwrap_or_else(default_jobs);
    let discard_unstable = config.discard_unstable_results && !args.keep_unstable;
    let config = Arc::new(config);

    let sink = match &args.output {
        Some(path) => Some(
            CsvSink::create(path, &[], config.bandolier_count)
                .map_err(|e| miette::miette!("Failed to create {}: {}", path.display(), e))?,
        ),
        None => None,
    };

    let runner = RelaxationRunner;
    let progress = progress_line(args.quiet);
    let mut batch_runner = MonteCarlo::new(&runner).jobs(jobs);
    if let Some(sink) = &sink {
        batch_runner = batch_runner.sink(sink as &dyn ResultSink);
    }
    if let Some(progress) = &progress {
        batch_runner = batch_runner.on_progress(progress);
    }

    let batch = batch_runner
        .run(trial_specs(Arc::clone(&config), args.iterations, seed))
        .into_diagnostic()?;
    let summary = batch.summarize(args.keep_unstable);

    let report = RunReport {
        seed,
        jobs,
        started_at: batch.started_at,
        elapsed_seconds: batch.elapsed.as_secs_f64(),
        discard_unstable,
        summary: &summary,
        widths: &summary.widths,
    };
    if print_structured(global.format, &report)? {
        return Ok(());
    }

    println!(
        "{} Ran {} trials in {:.2}s  (seed {}, {} workers)",
        style("✓").green(),
        summary.total,
        batch.elapsed.as_secs_f64(),
        seed,
        jobs
    );
    if discard_unstable && summary.unstable > 0 {
        println!(
            "   {}",
            style(format!("{} unstable trials discarded", summary.unstable)).dim()
        );
    }
    print_summary(&summary);

    if args.histogram {
        println!();
        println!("{}", render_histogram(&summary.widths, args.bins));
    }

    if let Some(path) = &args.output {
        println!(
            "   {} {}",
            style("Records written to").dim(),
            style(path.display()).cyan()
        );
    }

    if args.show_extremes {
        for (label, extreme) in [("Narrowest", summary.min), ("Widest", summary.max)] {
            if let Some(extreme) = extreme {
                println!();
                show_extreme(label, extreme, &batch, &config)?;
            }
        }
    }

    Ok(())
}

/// Replay an extreme trial from its seed and draw it
fn show_extreme(
    label: &str,
    extreme: TrialExtreme,
    batch: &Batch,
    config: &ModelConfig,
) -> Result<()> {
    let Some(outcome) = batch.outcomes.iter().find(|o| o.index == extreme.index) else {
        return Ok(());
    };
    let (module, _) = RelaxationRunner
        .replay(&outcome.spec(), &SimulationDriver::from_config(config))
        .into_diagnostic()?;

    println!(
        "{} {} module: {}  (trial {}, seed {})",
        style("◆").cyan(),
        style(label).bold(),
        style(format_mm(extreme.total_width)).yellow(),
        extreme.index,
        extreme.seed
    );
    println!("{}", render_module(&module, MODULE_HEIGHT));
    Ok(())
}
