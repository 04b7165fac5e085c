//! `bando simulate` command - build and relax a single module

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::cli::helpers::{batch_seed, format_mm, load_config};
use crate::cli::output::print_structured;
use crate::cli::viz::{render_module, render_speed_trace, MODULE_HEIGHT, TRACE_HEIGHT, TRACE_WIDTH};
use crate::cli::GlobalOpts;
use crate::core::analytics::SimulationResult;
use crate::core::monte_carlo::{RelaxationRunner, TrialSpec};
use crate::core::simulation::{RunLength, SimulationDriver, Termination};
use crate::core::sweep::Variant;

#[derive(clap::Args, Debug)]
pub struct SimulateArgs {
    /// Model configuration file (YAML); defaults apply when omitted
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Tolerance sampling seed (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run exactly this many steps instead of detecting stability
    #[arg(long)]
    pub steps: Option<usize>,

    /// Plot the last bandolier's speed per step
    #[arg(long)]
    pub trace: bool,

    /// Draw the relaxed module
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Serialize)]
struct SimulateReport {
    seed: u64,
    termination: Termination,
    steps: usize,
    result: SimulationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<Vec<f64>>,
}

#[derive(Tabled)]
struct ClearanceRow {
    #[tabled(rename = "Bandolier")]
    bandolier: usize,
    #[tabled(rename = "Upper X")]
    upper_x: String,
    #[tabled(rename = "Upper Y")]
    upper_y: String,
    #[tabled(rename = "Lower X")]
    lower_x: String,
    #[tabled(rename = "Lower Y")]
    lower_y: String,
}

pub fn run(args: SimulateArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let seed = batch_seed(args.seed);
    let include_end_constraints = config.include_end_constraints;
    let threshold = config.velocity_threshold;

    let mut driver = match args.steps {
        Some(steps) => SimulationDriver::new(RunLength::Fixed(steps)),
        None => SimulationDriver::from_config(&config),
    };
    if args.trace {
        driver = driver.with_trace();
    }

    let spec = TrialSpec {
        index: 0,
        seed,
        config: Arc::new(config),
        variant: Arc::new(Variant::default()),
    };
    let (module, outcome) = RelaxationRunner.replay(&spec, &driver).into_diagnostic()?;
    let result = SimulationResult::collect(&module, &outcome).into_diagnostic()?;

    let report = SimulateReport {
        seed,
        termination: outcome.termination,
        steps: outcome.steps,
        result,
        trace: outcome.trace,
    };
    if print_structured(global.format, &report)? {
        return Ok(());
    }

    let verdict = match report.termination {
        Termination::Stable => style("stable".to_string()).green(),
        Termination::Exhausted => style("exhausted (not stable)".to_string()).red(),
        Termination::Completed => style("fixed-length run".to_string()).yellow(),
    };
    println!(
        "{} Relaxed {} cells in {} steps: {}  (seed {})",
        style("✓").green(),
        module.cell_count(),
        report.steps,
        verdict,
        seed
    );
    println!(
        "{}: {}",
        style("Total width").bold(),
        style(format_mm(report.result.total_width)).yellow()
    );

    if include_end_constraints {
        let rows: Vec<ClearanceRow> = report
            .result
            .clearances
            .iter()
            .enumerate()
            .map(|(i, c)| ClearanceRow {
                bandolier: i + 1,
                upper_x: format!("{:.3}", c.upper_x),
                upper_y: format!("{:.3}", c.upper_y),
                lower_x: format!("{:.3}", c.lower_x),
                lower_y: format!("{:.3}", c.lower_y),
            })
            .collect();
        println!("{}", style("Clearance to end limits (mm):").bold());
        println!("{}", Table::new(rows).with(Style::rounded()));
    } else {
        println!("   {}", style("End constraints disabled; no clearances").dim());
    }

    if let Some(trace) = &report.trace {
        println!();
        println!(
            "{}",
            render_speed_trace(trace, threshold, TRACE_WIDTH, TRACE_HEIGHT)
        );
    }

    if args.show {
        println!();
        println!("{}", render_module(&module, MODULE_HEIGHT));
    }

    Ok(())
}
