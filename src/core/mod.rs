//! Core module - configuration, physics, simulation and batch execution

pub mod analytics;
pub mod config;
pub mod error;
pub mod monte_carlo;
pub mod physics;
pub mod sampler;
pub mod simulation;
pub mod sink;
pub mod sweep;

pub use analytics::{BandolierClearance, SimulationResult};
pub use config::{EndOffsets, ModelConfig, PhysicsSettings, MAX_BANDOLIERS};
pub use error::{ModelError, SinkError};
pub use monte_carlo::{
    summarize, trial_specs, Batch, BatchSummary, MonteCarlo, RelaxationRunner, TrialOutcome,
    TrialRunner, TrialSpec, TrialStatus,
};
pub use physics::{PhysicsBackend, RelaxationWorld, Vec2};
pub use sampler::{CellTolerance, ToleranceSampler};
pub use simulation::{
    RunLength, SimulationDriver, SimulationOutcome, StabilityMonitor, StabilityPolicy, Termination,
};
pub use sink::{CsvSink, ResultSink};
pub use sweep::{SweepPlan, Variant};
