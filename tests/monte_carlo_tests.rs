//! Batch execution tests with scripted trial runners

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use bando::core::analytics::{BandolierClearance, SimulationResult};
use bando::core::config::ModelConfig;
use bando::core::error::{ModelError, SinkError};
use bando::core::monte_carlo::{
    trial_specs, MonteCarlo, TrialOutcome, TrialRunner, TrialSpec, TrialStatus,
};
use bando::core::sink::{CsvSink, ResultSink};
use bando::core::sweep::SweepPlan;

/// Returns a fixed width per trial index; indices listed in `unstable`
/// report an unstable run
struct ScriptedRunner {
    widths: Vec<f64>,
    unstable: Vec<usize>,
    panic_on: Option<usize>,
    fail_on: Option<usize>,
}

impl ScriptedRunner {
    fn new(widths: &[f64]) -> Self {
        Self {
            widths: widths.to_vec(),
            unstable: Vec::new(),
            panic_on: None,
            fail_on: None,
        }
    }
}

impl TrialRunner for ScriptedRunner {
    fn run_trial(&self, spec: &TrialSpec) -> Result<SimulationResult, ModelError> {
        if self.panic_on == Some(spec.index) {
            panic!("solver diverged");
        }
        if self.fail_on == Some(spec.index) {
            return Err(ModelError::NegativeDiameter {
                bandolier: 1,
                cell: 0,
                diameter: -0.5,
            });
        }
        Ok(SimulationResult {
            stable: !self.unstable.contains(&spec.index),
            total_width: self.widths[spec.index % self.widths.len()],
            steps: 100,
            clearances: vec![BandolierClearance::default(); spec.config.bandolier_count],
        })
    }
}

fn specs(n: usize) -> Vec<TrialSpec> {
    trial_specs(Arc::new(ModelConfig::default()), n, 1000)
}

#[test]
fn test_batch_statistics() {
    let runner = ScriptedRunner::new(&[10.0, 12.0, 9.0, 15.0, 11.0]);
    let batch = MonteCarlo::new(&runner).jobs(3).run(specs(5)).unwrap();
    assert_eq!(batch.outcomes.len(), 5);

    let summary = batch.summarize(false);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.stable, 5);
    assert_eq!(summary.retained, 5);

    let min = summary.min.unwrap();
    assert_eq!(min.index, 2);
    assert_eq!(min.seed, 1002);
    assert_relative_eq!(min.total_width, 9.0);

    let max = summary.max.unwrap();
    assert_eq!(max.index, 3);
    assert_relative_eq!(max.total_width, 15.0);

    assert_relative_eq!(summary.mean.unwrap(), 11.4, epsilon = 1e-12);
    // Population standard deviation
    assert_relative_eq!(summary.std_dev.unwrap(), 4.24_f64.sqrt(), epsilon = 1e-12);
}

#[test]
fn test_unstable_trials_discarded_or_kept() {
    let mut runner = ScriptedRunner::new(&[10.0, 20.0, 30.0, 40.0]);
    runner.unstable = vec![3];
    let batch = MonteCarlo::new(&runner).jobs(2).run(specs(4)).unwrap();

    let discarded = batch.summarize(false);
    assert_eq!(discarded.unstable, 1);
    assert_eq!(discarded.retained, 3);
    assert_relative_eq!(discarded.max.unwrap().total_width, 30.0);

    let kept = batch.summarize(true);
    assert_eq!(kept.retained, 4);
    assert_relative_eq!(kept.max.unwrap().total_width, 40.0);
}

#[test]
fn test_panicking_trial_is_failed_not_fatal() {
    let mut runner = ScriptedRunner::new(&[10.0]);
    runner.panic_on = Some(1);
    runner.fail_on = Some(2);
    let batch = MonteCarlo::new(&runner).jobs(2).run(specs(4)).unwrap();

    let summary = batch.summarize(true);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.retained, 2);

    let panicked = batch.outcomes.iter().find(|o| o.index == 1).unwrap();
    assert_eq!(panicked.status(), TrialStatus::Failed);
    assert!(panicked
        .result
        .as_ref()
        .unwrap_err()
        .contains("solver diverged"));

    let failed = batch.outcomes.iter().find(|o| o.index == 2).unwrap();
    assert!(failed.result.as_ref().unwrap_err().contains("not positive"));
}

#[test]
fn test_progress_reports_every_trial() {
    let runner = ScriptedRunner::new(&[10.0]);
    let calls = AtomicUsize::new(0);
    let last_total = AtomicUsize::new(0);
    let progress = |_done: usize, total: usize| {
        calls.fetch_add(1, Ordering::Relaxed);
        last_total.store(total, Ordering::Relaxed);
    };
    MonteCarlo::new(&runner)
        .jobs(4)
        .on_progress(&progress)
        .run(specs(12))
        .unwrap();
    assert_eq!(calls.load(Ordering::Relaxed), 12);
    assert_eq!(last_total.load(Ordering::Relaxed), 12);
}

#[test]
fn test_sink_receives_every_record() {
    let plan = SweepPlan::from_yaml(
        "iterations: 2\naxes:\n  - field: pitch_y2\n    values: [23.0, 24.0]\n",
    )
    .unwrap();
    let trials = plan.trials(&plan.base, 50).unwrap();

    let mut runner = ScriptedRunner::new(&[100.0, 101.0, 102.0, 103.0]);
    runner.fail_on = Some(3);
    let sink = CsvSink::new(Vec::new(), &plan.swept_fields(), 3).unwrap();
    let batch = MonteCarlo::new(&runner)
        .jobs(2)
        .sink(&sink)
        .run(trials)
        .unwrap();
    assert_eq!(batch.summarize(false).sink_errors, 0);

    let bytes = sink.into_inner().unwrap();
    let mut reader = csv::Reader::from_reader(bytes.as_slice());
    assert_eq!(reader.headers().unwrap().len(), 2 + 1 + 3 + 3 * 4);

    let mut rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    rows.sort_by_key(|r| r[0].parse::<usize>().unwrap());
    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[0][2], "23.0");
    assert_eq!(&rows[3][2], "24.0");
    assert_eq!(&rows[3][3], "failed");
    assert_eq!(&rows[3][5], "");
    assert_eq!(&rows[1][5], "101");
}

#[test]
fn test_zero_trials() {
    let runner = ScriptedRunner::new(&[10.0]);
    let batch = MonteCarlo::new(&runner).run(Vec::new()).unwrap();
    let summary = batch.summarize(false);
    assert_eq!(summary.total, 0);
    assert!(summary.mean.is_none());
    assert!(summary.min.is_none());
}

/// Rejects the record of one trial and counts every write attempt
struct RejectingSink {
    reject: usize,
    writes: AtomicUsize,
}

impl ResultSink for RejectingSink {
    fn write(&self, outcome: &TrialOutcome) -> Result<(), SinkError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if outcome.index == self.reject {
            return Err(SinkError::Poisoned);
        }
        Ok(())
    }
}

#[test]
fn test_sink_failure_reported_on_its_record() {
    let runner = ScriptedRunner::new(&[10.0, 11.0, 12.0]);
    let sink = RejectingSink {
        reject: 2,
        writes: AtomicUsize::new(0),
    };
    let batch = MonteCarlo::new(&runner)
        .jobs(3)
        .sink(&sink)
        .run(specs(6))
        .unwrap();

    assert_eq!(batch.outcomes.len(), 6);
    assert_eq!(sink.writes.load(Ordering::Relaxed), 6);
    for outcome in &batch.outcomes {
        assert_eq!(outcome.status(), TrialStatus::Stable);
        assert_eq!(outcome.sink_error.is_some(), outcome.index == 2);
    }

    let summary = batch.summarize(false);
    assert_eq!(summary.sink_errors, 1);
    // A rejected record still counts in the statistics
    assert_eq!(summary.retained, 6);
}

#[test]
fn test_sweep_discard_follows_each_variant() {
    let plan = SweepPlan::from_yaml(
        "iterations: 3\naxes:\n  - field: discard_unstable_results\n    values: [false, true]\n",
    )
    .unwrap();
    let trials = plan.trials(&plan.base, 0).unwrap();
    assert_eq!(trials.len(), 6);

    // Every trial runs out of steps
    let mut runner = ScriptedRunner::new(&[20.0, 21.0, 22.0, 23.0, 24.0, 25.0]);
    runner.unstable = (0..6).collect();
    let batch = MonteCarlo::new(&runner).jobs(2).run(trials).unwrap();

    let summary = batch.summarize(false);
    assert_eq!(summary.unstable, 6);
    // Only the first variant keeps its unstable trials
    assert_eq!(summary.retained, 3);
    assert_eq!(summary.max.unwrap().index, 2);

    assert_eq!(batch.summarize(true).retained, 6);
}
