//! `bando sweep` command - Cartesian parameter sweep to CSV

use std::collections::BTreeMap;
use std::path::PathBuf;

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{batch_seed, load_config, print_summary, progress_line, truncate_str};
use crate::cli::output::print_structured;
use crate::cli::GlobalOpts;
use crate::core::monte_carlo::{
    default_jobs, summarize, BatchSummary, MonteCarlo, RelaxationRunner, TrialOutcome,
};
use crate::core::sink::CsvSink;
use crate::core::sweep::SweepPlan;

#[derive(clap::Args, Debug)]
pub struct SweepArgs {
    /// Sweep definition file (YAML)
    pub file: PathBuf,

    /// CSV file receiving one record per trial
    #[arg(long, short = 'o', default_value = "results.csv")]
    pub output: PathBuf,

    /// Base configuration file; replaces the sweep file's `base`
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Batch seed; overrides the sweep file's seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (default: available CPUs)
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Keep unstable trials in the statistics, whatever each variant's
    /// `discard_unstable_results`
    #[arg(long)]
    pub keep_unstable: bool,

    /// Hide the progress line
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Per-variant digest
#[derive(Debug, Serialize, Tabled)]
struct VariantRow {
    #[tabled(rename = "Variant")]
    variant: String,
    #[tabled(rename = "Trials")]
    trials: usize,
    #[tabled(rename = "Stable")]
    stable: usize,
    #[tabled(rename = "Failed")]
    failed: usize,
    #[tabled(rename = "Mean width")]
    #[serde(skip)]
    mean_label: String,
    #[tabled(skip)]
    mean_width: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SweepReport<'a> {
    seed: u64,
    trials: usize,
    output: String,
    summary: &'a BatchSummary,
    variants: Vec<VariantRow>,
}

fn variant_rows(outcomes: &[TrialOutcome], keep_unstable: bool) -> Vec<VariantRow> {
    let mut groups: BTreeMap<String, Vec<TrialOutcome>> = BTreeMap::new();
    for outcome in outcomes {
        let label = outcome
            .variant
            .fields
            .iter()
            .zip(outcome.variant.display_values())
            .map(|((field, _), value)| format!("{}={}", field, value))
            .collect::<Vec<_>>()
            .join(" ");
        groups.entry(label).or_default().push(outcome.clone());
    }

    groups
        .into_iter()
        .map(|(variant, outcomes)| {
            let summary = summarize(&outcomes, keep_unstable);
            VariantRow {
                variant: if variant.is_empty() {
                    "(base)".to_string()
                } else {
                    variant
                },
                trials: summary.total,
                stable: summary.stable,
                failed: summary.failed,
                mean_label: summary
                    .mean
                    .map_or_else(|| "-".to_string(), |m| format!("{:.3}", m)),
                mean_width: summary.mean,
            }
        })
        .collect()
}

pub fn run(args: SweepArgs, global: &GlobalOpts) -> Result<()> {
    let plan = SweepPlan::load(&args.file)
        .map_err(|e| miette::miette!("Failed to load {}: {}", args.file.display(), e))?;
    let base = match &args.config {
        Some(path) => load_config(Some(path.as_path()))?,
        None => plan.base.clone(),
    };
    let seed = batch_seed(args.seed.or(plan.seed));
    let jobs = args.jobs.unwrap_or_else(default_jobs);

    // Every variant is applied and validated here, before any trial runs
    let trials = plan.trials(&base, seed).into_diagnostic()?;
    let bandoliers = trials
        .iter()
        .map(|t| t.config.bandolier_count)
        .max()
        .unwrap_or(base.bandolier_count);

    let sink = CsvSink::create(&args.output, &plan.swept_fields(), bandoliers)
        .map_err(|e| miette::miette!("Failed to create {}: {}", args.output.display(), e))?;

    let runner = RelaxationRunner;
    let progress = progress_line(args.quiet);
    let mut batch_runner = MonteCarlo::new(&runner).jobs(jobs).sink(&sink);
    if let Some(progress) = &progress {
        batch_runner = batch_runner.on_progress(progress);
    }

    let total = trials.len();
    let batch = batch_runner.run(trials).into_diagnostic()?;
    let summary = batch.summarize(args.keep_unstable);
    let variants = variant_rows(&batch.outcomes, args.keep_unstable);

    let report = SweepReport {
        seed,
        trials: total,
        output: args.output.display().to_string(),
        summary: &summary,
        variants,
    };
    if print_structured(global.format, &report)? {
        return Ok(());
    }

    println!(
        "{} Swept {} variants × {} iterations = {} trials in {:.2}s  (seed {})",
        style("✓").green(),
        report.variants.len(),
        plan.iterations,
        total,
        batch.elapsed.as_secs_f64(),
        seed
    );
    print_summary(&summary);

    let mut rows = report.variants;
    for row in &mut rows {
        row.variant = truncate_str(&row.variant, 48);
    }
    println!("{}", Table::new(&rows).with(Style::rounded()));
    println!(
        "   {} {}",
        style("Records written to").dim(),
        style(args.output.display()).cyan()
    );

    Ok(())
}
