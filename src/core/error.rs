//! Error types for model construction, sweeps and result persistence

use thiserror::Error;

/// Errors raised while configuring, building or measuring a module
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sampled diameter {diameter:.4} for bandolier {bandolier}, cell {cell} is not positive")]
    NegativeDiameter {
        bandolier: usize,
        cell: usize,
        diameter: f64,
    },

    #[error("Bandolier {0} cannot be repositioned after its constraints are created")]
    AssemblyLocked(usize),

    #[error("Unknown sweep field: {0}")]
    UnknownSweepField(String),

    #[error("Invalid value for sweep field '{field}': {message}")]
    InvalidSweepValue { field: String, message: String },

    #[error("Module has not been simulated")]
    NotSimulated,

    #[error("Trial panicked: {0}")]
    TrialPanicked(String),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a result sink while persisting a trial record
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Result sink lock poisoned")]
    Poisoned,
}
