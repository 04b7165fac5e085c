//! Simulation driver - relax a module until it settles
//!
//! ```text
//! Running --(still for sustained_step_count steps)--> Stable
//! Running --(max_steps reached)---------------------> Exhausted
//! ```
//!
//! Stillness is judged on the last bandolier only: it is the farthest from
//! the fixed reference, so disturbances reach it last.

use serde::Serialize;
use tracing::trace;

use crate::core::config::ModelConfig;
use crate::core::physics::PhysicsBackend;
use crate::entities::module::Module;

/// Stability detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityPolicy {
    pub max_steps: usize,
    pub velocity_threshold: f64,
    pub sustained_step_count: usize,
}

impl From<&ModelConfig> for StabilityPolicy {
    fn from(config: &ModelConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            velocity_threshold: config.velocity_threshold,
            sustained_step_count: config.sustained_step_count,
        }
    }
}

/// How long to run a module
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunLength {
    /// Run until stable or out of steps
    UntilStable(StabilityPolicy),
    /// Run exactly this many steps, no stability detection
    Fixed(usize),
}

/// Running/Stable part of the state machine, fed one speed sample per step
#[derive(Debug, Clone)]
pub struct StabilityMonitor {
    threshold: f64,
    sustained: usize,
    still_steps: usize,
}

impl StabilityMonitor {
    pub fn new(velocity_threshold: f64, sustained_step_count: usize) -> Self {
        Self {
            threshold: velocity_threshold,
            sustained: sustained_step_count,
            still_steps: 0,
        }
    }

    /// Record one sample; returns true once stable
    pub fn observe(&mut self, speed: f64) -> bool {
        if speed < self.threshold {
            self.still_steps += 1;
        } else {
            self.still_steps = 0;
        }
        self.is_stable()
    }

    pub fn is_stable(&self) -> bool {
        self.still_steps >= self.sustained
    }

    /// Consecutive samples below the threshold
    pub fn still_steps(&self) -> usize {
        self.still_steps
    }
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Stable,
    Exhausted,
    /// Fixed-length run finished
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutcome {
    pub termination: Termination,
    pub steps: usize,
    /// Max |vx| of the last bandolier per step, when recorded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<f64>>,
}

impl SimulationOutcome {
    /// Only a stability-detected run counts as stable
    pub fn stable(&self) -> bool {
        self.termination == Termination::Stable
    }
}

/// Steps a module and applies the stability policy
#[derive(Debug, Clone)]
pub struct SimulationDriver {
    run: RunLength,
    record_trace: bool,
}

impl SimulationDriver {
    pub fn new(run: RunLength) -> Self {
        Self {
            run,
            record_trace: false,
        }
    }

    /// Stability-detected run with the module's own policy
    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(RunLength::UntilStable(StabilityPolicy::from(config)))
    }

    /// Keep the per-step speed of the last bandolier
    pub fn with_trace(mut self) -> Self {
        self.record_trace = true;
        self
    }

    pub fn run<B: PhysicsBackend>(&self, module: &mut Module<B>) -> SimulationOutcome {
        let mut trace = self.record_trace.then(Vec::new);
        let outcome = match self.run {
            RunLength::Fixed(steps) => {
                for _ in 0..steps {
                    module.step();
                    if let Some(t) = trace.as_mut() {
                        t.push(module.last_bandolier_speed());
                    }
                }
                (Termination::Completed, steps)
            }
            RunLength::UntilStable(policy) => {
                let mut monitor =
                    StabilityMonitor::new(policy.velocity_threshold, policy.sustained_step_count);
                let mut result = (Termination::Exhausted, policy.max_steps);
                for step in 1..=policy.max_steps {
                    module.step();
                    let speed = module.last_bandolier_speed();
                    if let Some(t) = trace.as_mut() {
                        t.push(speed);
                    }
                    if monitor.observe(speed) {
                        result = (Termination::Stable, step);
                        break;
                    }
                }
                result
            }
        };

        module.mark_simulated();
        trace!(termination = ?outcome.0, steps = outcome.1, "relaxation finished");

        SimulationOutcome {
            termination: outcome.0,
            steps: outcome.1,
            trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps_to_stable(monitor: &mut StabilityMonitor, speeds: &[f64]) -> Option<usize> {
        speeds
            .iter()
            .position(|&v| monitor.observe(v))
            .map(|i| i + 1)
    }

    #[test]
    fn test_stable_after_sustained_window() {
        let mut monitor = StabilityMonitor::new(0.5, 5);
        let speeds = [3.0, 2.0, 1.0, 0.4, 0.3, 0.2, 0.1, 0.1];
        // Below threshold from step 4, sustained for 5 steps at step 8
        assert_eq!(steps_to_stable(&mut monitor, &speeds), Some(8));
    }

    #[test]
    fn test_violation_resets_window() {
        let mut monitor = StabilityMonitor::new(0.5, 5);
        let speeds = [0.1, 0.1, 0.1, 0.1, 0.9, 0.1, 0.1, 0.1, 0.1, 0.1];
        assert_eq!(steps_to_stable(&mut monitor, &speeds), Some(10));
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut monitor = StabilityMonitor::new(0.5, 2);
        assert!(!monitor.observe(0.5));
        assert!(!monitor.observe(0.5));
        assert_eq!(monitor.still_steps(), 0);
        assert!(!monitor.observe(0.49));
        assert!(monitor.observe(0.49));
    }

    #[test]
    fn test_fixed_outcome_not_stable() {
        let outcome = SimulationOutcome {
            termination: Termination::Completed,
            steps: 10,
            trace: None,
        };
        assert!(!outcome.stable());
    }
}
