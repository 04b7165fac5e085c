//! Cell entity - one cylindrical cell of a bandolier
//!
//! A cell sits at its bandolier origin plus its nominal zig-zag lattice
//! position plus its sampled placement offset. The physics body is commanded
//! to exactly that point at construction and whenever the origin moves.

use crate::core::config::ModelConfig;
use crate::core::physics::{
    BodyHandle, BodyKind, CollisionFilter, PhysicsBackend, ShapeHandle, Vec2,
};
use crate::core::sampler::CellTolerance;

/// Nominal position of cell `id` inside its bandolier
///
/// Even cells sit on the first column, odd cells on the second column
/// `pitch_x` away and `pitch_y1` higher. Each pair advances by `pitch_y2`.
pub fn nominal_position(id: usize, config: &ModelConfig) -> Vec2 {
    let pair = (id / 2) as f64;
    if id % 2 == 0 {
        Vec2::new(0.0, pair * config.pitch_y2)
    } else {
        Vec2::new(config.pitch_x, pair * config.pitch_y2 + config.pitch_y1)
    }
}

/// A single cell with its sampled tolerance and physics body
#[derive(Debug, Clone)]
pub struct Cell {
    /// Position in the chain (0-based)
    pub id: usize,

    pub x_offset: f64,
    pub y_offset: f64,

    /// Design position inside the bandolier
    pub x_nominal: f64,
    pub y_nominal: f64,

    /// Bandolier origin
    pub x_start: f64,
    pub y_start: f64,

    /// Sampled diameter (mm)
    pub diameter: f64,

    /// Fixed in space (reference bandolier only)
    pub is_static: bool,

    body: BodyHandle,
    shape: ShapeHandle,
}

impl Cell {
    /// Create the cell body and its circle shape on the shared cell layer
    pub fn new<B: PhysicsBackend>(
        id: usize,
        tolerance: CellTolerance,
        config: &ModelConfig,
        start: Vec2,
        is_static: bool,
        session: &mut B,
    ) -> Self {
        let nominal = nominal_position(id, config);
        let kind = if is_static {
            BodyKind::Static
        } else {
            BodyKind::Dynamic
        };
        let body = session.create_body(config.physics.cell_mass, config.physics.cell_moment, kind);
        let shape = session.add_circle(body, tolerance.diameter / 2.0, CollisionFilter::CELLS);

        let cell = Self {
            id,
            x_offset: tolerance.x_offset,
            y_offset: tolerance.y_offset,
            x_nominal: nominal.x,
            y_nominal: nominal.y,
            x_start: start.x,
            y_start: start.y,
            diameter: tolerance.diameter,
            is_static,
            body,
            shape,
        };
        session.set_position(body, cell.design_position());
        cell
    }

    pub fn x_position(&self) -> f64 {
        self.x_start + self.x_nominal + self.x_offset
    }

    pub fn y_position(&self) -> f64 {
        self.y_start + self.y_nominal + self.y_offset
    }

    /// Position commanded to the body before relaxation
    pub fn design_position(&self) -> Vec2 {
        Vec2::new(self.x_position(), self.y_position())
    }

    /// Move the cell with its bandolier origin and recommand the body
    pub fn set_start<B: PhysicsBackend>(&mut self, start: Vec2, session: &mut B) {
        self.x_start = start.x;
        self.y_start = start.y;
        session.set_position(self.body, self.design_position());
    }

    /// Live position of the body
    pub fn position<B: PhysicsBackend>(&self, session: &B) -> Vec2 {
        session.position(self.body)
    }

    pub fn velocity<B: PhysicsBackend>(&self, session: &B) -> Vec2 {
        session.velocity(self.body)
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape(&self) -> ShapeHandle {
        self.shape
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}
