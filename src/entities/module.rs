//! Module entity - the full assembly and its builder
//!
//! Bandolier 0 is static and defines the coordinate frame. Every other
//! bandolier starts to its right with a gap wide enough that worst-case
//! cells of neighbouring bandoliers cannot overlap, then relaxes onto its
//! neighbour under the world's X gravity.

use rand::Rng;
use tracing::debug;

use crate::core::config::ModelConfig;
use crate::core::error::ModelError;
use crate::core::physics::{PhysicsBackend, Vec2};
use crate::core::sampler::ToleranceSampler;
use crate::entities::bandolier::Bandolier;

/// Clearance added beyond the end-constraint design spacing at start (mm)
const START_CLEARANCE_FROM_END_CONSTRAINT: f64 = 1.0;

/// X gap, on top of `|pitch_x|`, that keeps two worst-case cells of
/// neighbouring bandoliers apart when they sit `pitch_y2 / 2` apart in Y
pub fn minimal_spacing_offset(config: &ModelConfig) -> f64 {
    let reach = config.max_cell_diameter() + config.max_cell_offset() + 1.0;
    let half_pitch = config.pitch_y2 / 2.0;
    (reach * reach - half_pitch * half_pitch).max(0.0).sqrt()
}

/// Starting X origin of bandolier `index`
pub fn start_origin_x(config: &ModelConfig, index: usize) -> f64 {
    let i = index as f64;
    let x = i * (config.pitch_x.abs() + minimal_spacing_offset(config) + config.initial_spacing);
    if index != 0 && config.include_end_constraints {
        x.max(i * config.desired_spacing + START_CLEARANCE_FROM_END_CONSTRAINT)
    } else {
        x
    }
}

/// A complete assembly bound to its own physics session
pub struct Module<B: PhysicsBackend> {
    pub bandoliers: Vec<Bandolier>,
    config: ModelConfig,
    session: B,
    simulated: bool,
}

impl<B: PhysicsBackend> Module<B> {
    /// Sample tolerances and build the constrained assembly in `session`
    ///
    /// Every tolerance is drawn before the first body is created, so a bad
    /// sample fails without leaving a half-built session behind.
    pub fn build<R: Rng + ?Sized>(
        config: &ModelConfig,
        mut session: B,
        rng: &mut R,
    ) -> Result<Self, ModelError> {
        config.validate()?;

        let sampler = ToleranceSampler::new(config)?;
        let tolerances = (0..config.bandolier_count)
            .map(|b| sampler.sample_bandolier(b, config.cell_count, rng))
            .collect::<Result<Vec<_>, _>>()?;

        let mut bandoliers = Vec::with_capacity(config.bandolier_count);
        for (id, cells) in tolerances.iter().enumerate() {
            let mut bando = Bandolier::new(id, cells, id == 0, config, &mut session);
            bando.set_origin(Vec2::new(start_origin_x(config, id), 0.0), &mut session)?;
            if config.include_end_constraints {
                bando.attach_end_features(config, &mut session)?;
            }
            bando.constrain_cells(&mut session);
            bandoliers.push(bando);
        }

        debug!(
            bandoliers = bandoliers.len(),
            cells = config.cell_count,
            end_constraints = config.include_end_constraints,
            "module built"
        );

        Ok(Self {
            bandoliers,
            config: config.clone(),
            session,
            simulated: false,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn session(&self) -> &B {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut B {
        &mut self.session
    }

    /// Advance the session by one configured time step
    pub fn step(&mut self) {
        self.session.step(self.config.physics.time_step);
    }

    /// Largest |vx| of the last bandolier, the slowest to settle
    pub fn last_bandolier_speed(&self) -> f64 {
        self.bandoliers
            .last()
            .map_or(0.0, |b| b.max_x_speed(&self.session))
    }

    pub fn mark_simulated(&mut self) {
        self.simulated = true;
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Rightmost cell X of the last bandolier minus leftmost cell X of the
    /// first, plus one cell diameter; `None` until simulated
    pub fn total_width(&self) -> Option<f64> {
        if !self.simulated {
            return None;
        }
        let first = self.bandoliers.first()?;
        let last = self.bandoliers.last()?;
        let (left, _) = first.x_extent(&self.session);
        let (_, right) = last.x_extent(&self.session);
        let diameter = first.cells.first()?.diameter;
        Some(right - left + diameter)
    }

    pub fn cell_count(&self) -> usize {
        self.bandoliers.iter().map(|b| b.cells.len()).sum()
    }
}
