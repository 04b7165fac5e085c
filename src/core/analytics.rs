//! Measurements taken from a relaxed module

use serde::{Deserialize, Serialize};

use crate::core::error::ModelError;
use crate::core::physics::PhysicsBackend;
use crate::core::simulation::SimulationOutcome;
use crate::entities::module::Module;

/// Clearance of one bandolier's end plates to their stops (mm)
///
/// Each component is live plate position minus stop design position.
/// All zero when end constraints are disabled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BandolierClearance {
    pub upper_x: f64,
    pub upper_y: f64,
    pub lower_x: f64,
    pub lower_y: f64,
}

/// Measurements of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub stable: bool,
    pub total_width: f64,
    pub steps: usize,
    pub clearances: Vec<BandolierClearance>,
}

impl SimulationResult {
    /// Collect the measurements of a simulated module
    pub fn collect<B: PhysicsBackend>(
        module: &Module<B>,
        outcome: &SimulationOutcome,
    ) -> Result<Self, ModelError> {
        let total_width = module.total_width().ok_or(ModelError::NotSimulated)?;
        let session = module.session();

        let clearances = module
            .bandoliers
            .iter()
            .map(|bando| {
                let upper = bando.upper_clearance(session);
                let lower = bando.lower_clearance(session);
                BandolierClearance {
                    upper_x: upper.x,
                    upper_y: upper.y,
                    lower_x: lower.x,
                    lower_y: lower.y,
                }
            })
            .collect();

        Ok(Self {
            stable: outcome.stable(),
            total_width,
            steps: outcome.steps,
            clearances,
        })
    }
}
