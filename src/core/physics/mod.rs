//! Physics backend contract
//!
//! The assembly model drives a rigid-body relaxation engine through this
//! narrow interface only: create bodies and shapes, tie bodies together with
//! pin constraints, advance time and read back positions and velocities.
//! Every trial owns its own backend instance (a "session"); sessions are
//! never shared between trials.

mod collide;
mod world;

use nalgebra::Vector2;

pub use world::RelaxationWorld;

/// 2D vector used throughout the model (mm, mm/s)
pub type Vec2 = Vector2<f64>;

/// Index of a body inside one session; backends assign these
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub usize);

/// Index of a shape inside one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub usize);

/// Index of a pin constraint inside one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinHandle(pub usize);

/// Whether a body moves during relaxation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

/// Collision filter: two shapes collide only if each one's category
/// intersects the other's mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub category: u32,
    pub mask: u32,
}

impl CollisionFilter {
    /// Shared layer of every cell in a module
    pub const CELLS: CollisionFilter = CollisionFilter {
        category: 1,
        mask: 1,
    };

    /// Collides with nothing
    pub const NONE: CollisionFilter = CollisionFilter {
        category: 0,
        mask: 0,
    };

    /// Filter whose category and mask are both `layer`
    pub fn layer(layer: u32) -> Self {
        Self {
            category: layer,
            mask: layer,
        }
    }

    pub fn collides_with(&self, other: &CollisionFilter) -> bool {
        (self.category & other.mask) != 0 && (other.category & self.mask) != 0
    }
}

/// Capability set required from a rigid-body relaxation engine
pub trait PhysicsBackend {
    /// Create a body; static bodies ignore mass and moment
    fn create_body(&mut self, mass: f64, moment: f64, kind: BodyKind) -> BodyHandle;

    fn set_position(&mut self, body: BodyHandle, position: Vec2);

    fn position(&self, body: BodyHandle) -> Vec2;

    fn velocity(&self, body: BodyHandle) -> Vec2;

    /// Attach a circle centered on the body origin
    fn add_circle(&mut self, body: BodyHandle, radius: f64, filter: CollisionFilter)
        -> ShapeHandle;

    /// Attach a convex polygon given in body-local coordinates
    fn add_polygon(
        &mut self,
        body: BodyHandle,
        vertices: &[Vec2],
        filter: CollisionFilter,
    ) -> ShapeHandle;

    fn set_filter(&mut self, shape: ShapeHandle, filter: CollisionFilter);

    /// Rigid two-point distance tie between body-local anchors; the rest
    /// length is the anchor distance at creation time
    fn add_pin(&mut self, a: BodyHandle, b: BodyHandle, anchor_a: Vec2, anchor_b: Vec2)
        -> PinHandle;

    /// Advance all bodies and constraints by one fixed increment
    fn step(&mut self, dt: f64);
}
