//! Monte-Carlo orchestration - independent trials on a worker pool
//!
//! Each trial owns its configuration, its RNG and its physics session; the
//! workers share nothing but the optional result sink. Outcomes are sent
//! back over a channel in completion order and only reduced once the whole
//! batch has returned.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::analytics::SimulationResult;
use crate::core::config::ModelConfig;
use crate::core::error::ModelError;
use crate::core::physics::RelaxationWorld;
use crate::core::simulation::{SimulationDriver, SimulationOutcome};
use crate::core::sink::ResultSink;
use crate::core::sweep::Variant;
use crate::entities::module::Module;

/// Everything needed to run (or replay) one trial
#[derive(Debug, Clone)]
pub struct TrialSpec {
    pub index: usize,
    pub seed: u64,
    pub config: Arc<ModelConfig>,
    /// Swept values this trial's configuration was derived with
    pub variant: Arc<Variant>,
}

/// `iterations` trials of one configuration, seeded `seed + index`
pub fn trial_specs(config: Arc<ModelConfig>, iterations: usize, seed: u64) -> Vec<TrialSpec> {
    let variant = Arc::new(Variant::default());
    (0..iterations)
        .map(|index| TrialSpec {
            index,
            seed: seed.wrapping_add(index as u64),
            config: Arc::clone(&config),
            variant: Arc::clone(&variant),
        })
        .collect()
}

/// Runs one trial to completion
pub trait TrialRunner: Sync {
    fn run_trial(&self, spec: &TrialSpec) -> Result<SimulationResult, ModelError>;
}

/// Builds every trial in a fresh [`RelaxationWorld`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxationRunner;

impl RelaxationRunner {
    /// Rebuild and relax the module of a trial, for inspection
    pub fn replay(
        &self,
        spec: &TrialSpec,
        driver: &SimulationDriver,
    ) -> Result<(Module<RelaxationWorld>, SimulationOutcome), ModelError> {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let session = RelaxationWorld::new(spec.config.physics);
        let mut module = Module::build(&spec.config, session, &mut rng)?;
        let outcome = driver.run(&mut module);
        Ok((module, outcome))
    }
}

impl TrialRunner for RelaxationRunner {
    fn run_trial(&self, spec: &TrialSpec) -> Result<SimulationResult, ModelError> {
        let driver = SimulationDriver::from_config(&spec.config);
        let (module, outcome) = self.replay(spec, &driver)?;
        SimulationResult::collect(&module, &outcome)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialStatus {
    Stable,
    /// Ran out of steps before settling
    Unstable,
    /// Returned an error or panicked
    Failed,
}

impl std::fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrialStatus::Stable => write!(f, "stable"),
            TrialStatus::Unstable => write!(f, "unstable"),
            TrialStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Immutable record a worker hands back for one trial
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub index: usize,
    pub seed: u64,
    pub config: Arc<ModelConfig>,
    pub variant: Arc<Variant>,
    /// Measurements, or the failure message
    pub result: Result<SimulationResult, String>,
    /// Set when the sink rejected this record
    pub sink_error: Option<String>,
}

impl TrialOutcome {
    pub fn status(&self) -> TrialStatus {
        match &self.result {
            Ok(r) if r.stable => TrialStatus::Stable,
            Ok(_) => TrialStatus::Unstable,
            Err(_) => TrialStatus::Failed,
        }
    }

    pub fn total_width(&self) -> Option<f64> {
        self.result.as_ref().ok().map(|r| r.total_width)
    }

    /// Spec to rebuild this trial
    pub fn spec(&self) -> TrialSpec {
        TrialSpec {
            index: self.index,
            seed: self.seed,
            config: Arc::clone(&self.config),
            variant: Arc::clone(&self.variant),
        }
    }
}

/// All outcomes of a batch, in completion order
#[derive(Debug, Clone)]
pub struct Batch {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub outcomes: Vec<TrialOutcome>,
}

impl Batch {
    pub fn summarize(&self, keep_unstable: bool) -> BatchSummary {
        summarize(&self.outcomes, keep_unstable)
    }
}

/// Trial at one end of the width distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialExtreme {
    pub index: usize,
    pub seed: u64,
    pub total_width: f64,
}

/// Reduction of a batch over its retained trials
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub stable: usize,
    pub unstable: usize,
    pub failed: usize,
    /// Trials that entered the statistics
    pub retained: usize,
    pub sink_errors: usize,
    pub min: Option<TrialExtreme>,
    pub max: Option<TrialExtreme>,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub percentile_2_5: Option<f64>,
    pub percentile_97_5: Option<f64>,
    /// Retained widths in completion order (histogram input)
    #[serde(skip)]
    pub widths: Vec<f64>,
}

/// Reduce outcomes; failed trials never count
///
/// An unstable trial is retained when its own configuration keeps unstable
/// results or when `keep_unstable` overrides it. Ties for min/max go to the
/// lowest trial index, so completion order never changes the extremes.
pub fn summarize(outcomes: &[TrialOutcome], keep_unstable: bool) -> BatchSummary {
    let count = |status: TrialStatus| outcomes.iter().filter(|o| o.status() == status).count();

    let mut min: Option<TrialExtreme> = None;
    let mut max: Option<TrialExtreme> = None;
    let mut widths = Vec::new();

    for outcome in outcomes {
        let keep = match outcome.status() {
            TrialStatus::Stable => true,
            TrialStatus::Unstable => keep_unstable || !outcome.config.discard_unstable_results,
            TrialStatus::Failed => false,
        };
        let Some(width) = outcome.total_width().filter(|_| keep) else {
            continue;
        };
        let extreme = TrialExtreme {
            index: outcome.index,
            seed: outcome.seed,
            total_width: width,
        };
        let earlier = |m: TrialExtreme| width == m.total_width && outcome.index < m.index;
        if min.map_or(true, |m| width < m.total_width || earlier(m)) {
            min = Some(extreme);
        }
        if max.map_or(true, |m| width > m.total_width || earlier(m)) {
            max = Some(extreme);
        }
        widths.push(width);
    }

    let (mean, std_dev, percentile_2_5, percentile_97_5) = if widths.is_empty() {
        (None, None, None, None)
    } else {
        let n = widths.len() as f64;
        let mean = widths.iter().sum::<f64>() / n;
        let variance = widths.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n;
        let mut sorted = widths.clone();
        sorted.sort_by(f64::total_cmp);
        let at = |q: f64| sorted[((n * q) as usize).min(sorted.len() - 1)];
        (Some(mean), Some(variance.sqrt()), Some(at(0.025)), Some(at(0.975)))
    };

    BatchSummary {
        total: outcomes.len(),
        stable: count(TrialStatus::Stable),
        unstable: count(TrialStatus::Unstable),
        failed: count(TrialStatus::Failed),
        retained: widths.len(),
        sink_errors: outcomes.iter().filter(|o| o.sink_error.is_some()).count(),
        min,
        max,
        mean,
        std_dev,
        percentile_2_5,
        percentile_97_5,
        widths,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Batch executor
pub struct MonteCarlo<'a, R: TrialRunner> {
    runner: &'a R,
    jobs: usize,
    sink: Option<&'a dyn ResultSink>,
    progress: Option<&'a (dyn Fn(usize, usize) + Sync)>,
}

impl<'a, R: TrialRunner> MonteCarlo<'a, R> {
    /// One worker per available CPU
    pub fn new(runner: &'a R) -> Self {
        Self {
            runner,
            jobs: default_jobs(),
            sink: None,
            progress: None,
        }
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Persist every outcome as it completes
    pub fn sink(mut self, sink: &'a dyn ResultSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Called with `(completed, total)` after each trial
    pub fn on_progress(mut self, progress: &'a (dyn Fn(usize, usize) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every trial to completion
    pub fn run(&self, trials: Vec<TrialSpec>) -> Result<Batch, ModelError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| ModelError::WorkerPool(e.to_string()))?;

        let total = trials.len();
        let started_at = Utc::now();
        let clock = Instant::now();
        info!(trials = total, jobs = self.jobs, "batch started");

        let completed = AtomicUsize::new(0);
        let (sender, receiver) = mpsc::channel();
        pool.install(|| {
            trials.into_par_iter().for_each_with(sender, |sender, spec| {
                let outcome = self.execute(spec);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(progress) = self.progress {
                    progress(done, total);
                }
                // Receiver outlives the pool
                let _ = sender.send(outcome);
            });
        });
        let outcomes: Vec<TrialOutcome> = receiver.into_iter().collect();

        let elapsed = clock.elapsed();
        info!(
            trials = outcomes.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "batch finished"
        );

        Ok(Batch {
            started_at,
            elapsed,
            outcomes,
        })
    }

    fn execute(&self, spec: TrialSpec) -> TrialOutcome {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.runner.run_trial(&spec))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(ModelError::TrialPanicked(panic_message(payload.as_ref())).to_string()),
        };

        match &result {
            Ok(r) => debug!(
                trial = spec.index,
                seed = spec.seed,
                stable = r.stable,
                steps = r.steps,
                total_width = r.total_width,
                "trial finished"
            ),
            Err(message) => warn!(trial = spec.index, seed = spec.seed, %message, "trial failed"),
        }

        let mut outcome = TrialOutcome {
            index: spec.index,
            seed: spec.seed,
            config: spec.config,
            variant: spec.variant,
            result,
            sink_error: None,
        };

        if let Some(sink) = self.sink {
            if let Err(e) = sink.write(&outcome) {
                warn!(trial = outcome.index, error = %e, "failed to write result record");
                outcome.sink_error = Some(e.to_string());
            }
        }
        outcome
    }
}

/// Available CPU parallelism, at least 1
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
