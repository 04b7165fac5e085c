//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use std::path::Path;

use console::{style, Term};
use miette::Result;
use tracing_subscriber::EnvFilter;

use crate::core::config::ModelConfig;
use crate::core::monte_carlo::BatchSummary;

/// Install the stderr log subscriber
///
/// `RUST_LOG` wins over the `-v` count when set.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A subscriber may already be installed
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Load a configuration file, or the defaults when no path is given
pub fn load_config(path: Option<&Path>) -> Result<ModelConfig> {
    match path {
        Some(path) => ModelConfig::load(path)
            .map_err(|e| miette::miette!("Failed to load {}: {}", path.display(), e)),
        None => Ok(ModelConfig::default()),
    }
}

/// Batch seed: the given one, or a fresh random one
pub fn batch_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// Truncate a string to max_len, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format a length in millimetres
pub fn format_mm(value: f64) -> String {
    format!("{:.3} mm", value)
}

/// Progress callback writing a single updating line to stderr
///
/// Returns `None` when stderr is not a terminal or the user asked for quiet.
pub fn progress_line(quiet: bool) -> Option<impl Fn(usize, usize) + Sync> {
    let term = Term::stderr();
    if quiet || !term.is_term() {
        return None;
    }
    Some(move |done: usize, total: usize| {
        let _ = term.clear_line();
        let _ = term.write_str(&format!(
            "   {} {}/{} trials",
            style("Running").cyan(),
            done,
            total
        ));
        if done == total {
            let _ = term.clear_line();
        }
    })
}

/// Print the stable / unstable / failed tally and the width statistics
pub fn print_summary(summary: &BatchSummary) {
    println!(
        "{} {} trials: {} stable, {} unstable, {} failed",
        style("◆").cyan(),
        summary.total,
        style(summary.stable).green(),
        style(summary.unstable).yellow(),
        style(summary.failed).red()
    );

    if summary.sink_errors > 0 {
        println!(
            "   {} {} records could not be written",
            style("!").red(),
            summary.sink_errors
        );
    }

    let (Some(min), Some(max)) = (summary.min, summary.max) else {
        println!("   {}", style("No retained trials").dim());
        return;
    };

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Retained").bold(), summary.retained);
    if let (Some(mean), Some(std_dev)) = (summary.mean, summary.std_dev) {
        println!(
            "{}: {}  (σ = {:.4})",
            style("Mean width").bold(),
            style(format_mm(mean)).yellow(),
            std_dev
        );
    }
    println!(
        "{}: {}  (trial {}, seed {})",
        style("Min width").bold(),
        format_mm(min.total_width),
        min.index,
        min.seed
    );
    println!(
        "{}: {}  (trial {}, seed {})",
        style("Max width").bold(),
        format_mm(max.total_width),
        max.index,
        max.seed
    );
    if let (Some(lo), Some(hi)) = (summary.percentile_2_5, summary.percentile_97_5) {
        println!(
            "{}: {:.3} .. {:.3} mm",
            style("95% range").bold(),
            lo,
            hi
        );
    }
    println!("{}", style("─".repeat(60)).dim());
}
