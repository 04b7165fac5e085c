//! Model configuration - the immutable per-trial parameter set
//!
//! A `ModelConfig` carries everything a trial needs: assembly size, nominal
//! cell lattice, tolerance distributions, end-feature geometry, stability
//! policy and the physics settings of the relaxation world. It is loaded from
//! YAML (any omitted key falls back to its default) and never mutated once a
//! batch has started.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ModelError;

/// 18650 cell diameter (mm)
pub const CELL_DIAMETER_18650: f64 = 18.0;
/// 2170 cell diameter (mm)
pub const CELL_DIAMETER_2170: f64 = 21.0;
/// 4680 cell diameter (mm)
pub const CELL_DIAMETER_4680: f64 = 46.0;

/// Each bandolier owns one bit of the 32-bit collision category
pub const MAX_BANDOLIERS: usize = 32;

/// Offsets of the lower/upper end features relative to the end cells
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndOffsets {
    pub lower_x: f64,
    pub lower_y: f64,
    pub upper_x: f64,
    pub upper_y: f64,
}

impl Default for EndOffsets {
    fn default() -> Self {
        Self {
            lower_x: 5.5,
            lower_y: 12.0,
            upper_x: 5.5,
            upper_y: 12.0,
        }
    }
}

/// Settings of the relaxation world
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsSettings {
    /// Gravity along X (mm/s²); pushes every dynamic bandolier onto the reference one
    pub gravity_x: f64,

    /// Gravity along Y (mm/s²)
    pub gravity_y: f64,

    /// Fraction of velocity retained after one second
    pub damping: f64,

    /// Fixed integration step (s)
    pub time_step: f64,

    /// Constraint projection passes per step
    pub solver_iterations: u32,

    pub cell_mass: f64,
    pub cell_moment: f64,
    pub plate_mass: f64,
    pub plate_moment: f64,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity_x: -1000.0,
            gravity_y: 0.0,
            damping: 1.0e-26,
            time_step: 0.001,
            solver_iterations: 10,
            cell_mass: 10.0,
            cell_moment: 10.0,
            plate_mass: 10.0,
            plate_moment: 10.0,
        }
    }
}

/// Complete parameter set for one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Cells per bandolier
    pub cell_count: usize,

    /// Bandoliers per module (bandolier 0 is the fixed reference)
    pub bandolier_count: usize,

    /// Nominal X offset between the two zig-zag columns (mm, may be negative)
    pub pitch_x: f64,

    /// Nominal Y offset from an even cell to the following odd cell (mm)
    pub pitch_y1: f64,

    /// Nominal Y pitch between consecutive cells of the same column (mm)
    pub pitch_y2: f64,

    pub offset_mu_x: f64,
    pub offset_sigma_x: f64,
    pub offset_mu_y: f64,
    pub offset_sigma_y: f64,

    /// Design cell diameter (mm)
    pub diameter_nominal: f64,
    pub diameter_mu: f64,
    pub diameter_sigma: f64,

    /// Extra spacing added to the minimal non-overlapping start placement (mm)
    pub initial_spacing: f64,

    /// Design-intent X pitch between bandolier origins (mm)
    pub desired_spacing: f64,

    /// Enable end constraint plates and end limit stops
    pub include_end_constraints: bool,

    pub end_constraint_offsets: EndOffsets,
    pub end_limit_offsets: EndOffsets,

    /// Add the Y-direction wall to each end limit stop
    pub include_y_constraints: bool,

    /// Make end limit stops collide with their own bandolier's plates
    pub end_limit_collision: bool,

    pub end_constraint_thickness: f64,
    pub end_limit_height: f64,
    pub end_limit_wall_thickness: f64,

    /// Step budget before a trial is declared exhausted
    pub max_steps: usize,

    /// Max |vx| of the last bandolier below which a step counts as still
    pub velocity_threshold: f64,

    /// Consecutive still steps required to declare stability
    pub sustained_step_count: usize,

    /// Drop unstable trials before aggregation
    pub discard_unstable_results: bool,

    pub physics: PhysicsSettings,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            cell_count: 20,
            bandolier_count: 3,
            pitch_x: 16.0,
            pitch_y1: 12.0,
            pitch_y2: 23.0,
            offset_mu_x: 0.0,
            offset_sigma_x: 0.2,
            offset_mu_y: 0.0,
            offset_sigma_y: 0.3,
            diameter_nominal: CELL_DIAMETER_18650,
            diameter_mu: 0.0,
            diameter_sigma: 0.001,
            initial_spacing: 0.0,
            desired_spacing: 31.5,
            include_end_constraints: true,
            end_constraint_offsets: EndOffsets::default(),
            end_limit_offsets: EndOffsets {
                lower_x: 0.0,
                lower_y: 15.0,
                upper_x: 0.0,
                upper_y: 15.0,
            },
            include_y_constraints: false,
            end_limit_collision: false,
            end_constraint_thickness: 5.0,
            end_limit_height: 20.0,
            end_limit_wall_thickness: 5.0,
            max_steps: 20_000,
            velocity_threshold: 0.5,
            sustained_step_count: 200,
            discard_unstable_results: true,
            physics: PhysicsSettings::default(),
        }
    }
}

impl ModelConfig {
    /// Load a configuration from a YAML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ModelError> {
        let config: ModelConfig = if content.trim().is_empty() {
            ModelConfig::default()
        } else {
            serde_yml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> Result<String, ModelError> {
        Ok(serde_yml::to_string(self)?)
    }

    /// Reject configurations that cannot produce a meaningful module
    pub fn validate(&self) -> Result<(), ModelError> {
        let fail = |msg: String| Err(ModelError::InvalidConfig(msg));

        if self.cell_count == 0 {
            return fail("cell_count must be at least 1".to_string());
        }
        if self.include_end_constraints && self.cell_count < 2 {
            return fail(format!(
                "end constraints need at least 2 cells per bandolier, got {}",
                self.cell_count
            ));
        }
        if self.bandolier_count == 0 || self.bandolier_count > MAX_BANDOLIERS {
            return fail(format!(
                "bandolier_count must be between 1 and {}, got {}",
                MAX_BANDOLIERS, self.bandolier_count
            ));
        }
        if !(self.diameter_nominal.is_finite() && self.diameter_nominal > 0.0) {
            return fail(format!(
                "diameter_nominal must be positive, got {}",
                self.diameter_nominal
            ));
        }

        let finite = [
            ("pitch_x", self.pitch_x),
            ("pitch_y1", self.pitch_y1),
            ("pitch_y2", self.pitch_y2),
            ("offset_mu_x", self.offset_mu_x),
            ("offset_mu_y", self.offset_mu_y),
            ("diameter_mu", self.diameter_mu),
            ("initial_spacing", self.initial_spacing),
            ("desired_spacing", self.desired_spacing),
            ("velocity_threshold", self.velocity_threshold),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return fail(format!("{} must be finite, got {}", name, value));
            }
        }

        let sigmas = [
            ("offset_sigma_x", self.offset_sigma_x),
            ("offset_sigma_y", self.offset_sigma_y),
            ("diameter_sigma", self.diameter_sigma),
        ];
        for (name, value) in sigmas {
            if !(value.is_finite() && value >= 0.0) {
                return fail(format!("{} must be non-negative, got {}", name, value));
            }
        }

        let dimensions = [
            ("end_constraint_thickness", self.end_constraint_thickness),
            ("end_limit_height", self.end_limit_height),
            ("end_limit_wall_thickness", self.end_limit_wall_thickness),
        ];
        for (name, value) in dimensions {
            if !(value.is_finite() && value > 0.0) {
                return fail(format!("{} must be positive, got {}", name, value));
            }
        }

        if self.max_steps == 0 {
            return fail("max_steps must be at least 1".to_string());
        }
        if self.velocity_threshold <= 0.0 {
            return fail(format!(
                "velocity_threshold must be positive, got {}",
                self.velocity_threshold
            ));
        }
        if self.sustained_step_count == 0 {
            return fail("sustained_step_count must be at least 1".to_string());
        }

        let physics = &self.physics;
        if !(physics.time_step.is_finite() && physics.time_step > 0.0) {
            return fail(format!(
                "physics.time_step must be positive, got {}",
                physics.time_step
            ));
        }
        if !(physics.damping.is_finite() && physics.damping > 0.0 && physics.damping <= 1.0) {
            return fail(format!(
                "physics.damping must be in (0, 1], got {}",
                physics.damping
            ));
        }
        if physics.solver_iterations == 0 {
            return fail("physics.solver_iterations must be at least 1".to_string());
        }
        for (name, value) in [
            ("physics.cell_mass", physics.cell_mass),
            ("physics.cell_moment", physics.cell_moment),
            ("physics.plate_mass", physics.plate_mass),
            ("physics.plate_moment", physics.plate_moment),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return fail(format!("{} must be positive, got {}", name, value));
            }
        }

        Ok(())
    }

    /// Worst-case cell diameter used for start placement (µ + 3σ)
    pub fn max_cell_diameter(&self) -> f64 {
        self.diameter_nominal + self.diameter_mu + 3.0 * self.diameter_sigma
    }

    /// Worst-case X placement offset used for start placement (|µ| + 3σ)
    pub fn max_cell_offset(&self) -> f64 {
        self.offset_mu_x.abs() + 3.0 * self.offset_sigma_x
    }
}
