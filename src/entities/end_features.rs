//! End features - end-cap plates and the mechanical stops they are measured against

use crate::core::config::ModelConfig;
use crate::core::physics::{
    BodyHandle, BodyKind, CollisionFilter, PhysicsBackend, PinHandle, ShapeHandle, Vec2,
};

/// Which end of a bandolier a feature belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum End {
    Lower,
    Upper,
}

/// Rigid plate pinned to the two cells nearest one end of a bandolier
///
/// The body origin sits on the plate's outer face at
/// `(x_start + x_nominal, y_start + y_outer)`; the plate extends
/// `thickness` along +X and back towards the end cell along Y.
#[derive(Debug, Clone)]
pub struct EndConstraint {
    pub end: End,
    pub x_nominal: f64,
    /// Y of the end cell the plate caps
    pub y_inner: f64,
    /// Y of the plate's outer face
    pub y_outer: f64,
    pub x_start: f64,
    pub y_start: f64,
    pub thickness: f64,
    body: BodyHandle,
    shape: ShapeHandle,
    pins: Vec<PinHandle>,
}

impl EndConstraint {
    /// Create the plate body and pin it twice to every given cell body
    #[allow(clippy::too_many_arguments)]
    pub fn new<B: PhysicsBackend>(
        end: End,
        x_nominal: f64,
        y_inner: f64,
        y_outer: f64,
        start: Vec2,
        is_static: bool,
        cells: &[BodyHandle],
        config: &ModelConfig,
        session: &mut B,
    ) -> Self {
        let thickness = config.end_constraint_thickness;
        let kind = if is_static {
            BodyKind::Static
        } else {
            BodyKind::Dynamic
        };
        let body = session.create_body(config.physics.plate_mass, config.physics.plate_moment, kind);
        session.set_position(body, Vec2::new(start.x + x_nominal, start.y + y_outer));

        let depth = y_inner - y_outer;
        let vertices = [
            Vec2::new(0.0, 0.0),
            Vec2::new(0.0, depth),
            Vec2::new(thickness, depth),
            Vec2::new(thickness, 0.0),
        ];
        let shape = session.add_polygon(body, &vertices, CollisionFilter::layer(2));

        // Two anchors per cell lock the plate's rotation as well as its offset.
        // The second one is the far corner mirrored across the outer face.
        let mirrored_corner = Vec2::new(thickness, -depth);
        let mut pins = Vec::with_capacity(cells.len() * 2);
        for &cell in cells {
            pins.push(session.add_pin(cell, body, Vec2::zeros(), Vec2::zeros()));
            pins.push(session.add_pin(cell, body, Vec2::zeros(), mirrored_corner));
        }

        Self {
            end,
            x_nominal,
            y_inner,
            y_outer,
            x_start: start.x,
            y_start: start.y,
            thickness,
            body,
            shape,
            pins,
        }
    }

    /// Position the plate was created at
    pub fn design_position(&self) -> Vec2 {
        Vec2::new(self.x_start + self.x_nominal, self.y_start + self.y_outer)
    }

    /// Live plate position
    pub fn position<B: PhysicsBackend>(&self, session: &B) -> Vec2 {
        session.position(self.body)
    }

    pub fn set_filter<B: PhysicsBackend>(&self, filter: CollisionFilter, session: &mut B) {
        session.set_filter(self.shape, filter);
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn pins(&self) -> &[PinHandle] {
        &self.pins
    }
}

/// Fixed mechanical stop placed relative to a bandolier's design-intent position
///
/// Only a measurement reference by default: its shapes collide with nothing
/// unless `end_limit_collision` is set.
#[derive(Debug, Clone)]
pub struct EndLimit {
    pub end: End,
    /// X of the stop face (`desired_x + offset`)
    pub x: f64,
    /// Y of the stop's outer face
    pub y_outer: f64,
    /// Y where the wall ends, `height` towards the bandolier
    pub y_inner: f64,
    body: BodyHandle,
    shapes: Vec<ShapeHandle>,
}

impl EndLimit {
    pub fn new<B: PhysicsBackend>(
        end: End,
        desired_x: f64,
        x_offset: f64,
        y_limit: f64,
        config: &ModelConfig,
        session: &mut B,
    ) -> Self {
        let x = desired_x + x_offset;
        let height = config.end_limit_height;
        let wall = config.end_limit_wall_thickness;
        let y_outer = y_limit;
        let y_inner = match end {
            End::Upper => y_limit - height,
            End::Lower => y_limit + height,
        };

        let body = session.create_body(0.0, 0.0, BodyKind::Static);
        let mut shapes = Vec::with_capacity(2);

        // Wall facing +X, behind the stop face
        let wall_box = [
            Vec2::new(x - wall, y_outer),
            Vec2::new(x, y_outer),
            Vec2::new(x, y_inner),
            Vec2::new(x - wall, y_inner),
        ];
        shapes.push(session.add_polygon(body, &wall_box, CollisionFilter::NONE));

        if config.include_y_constraints {
            let thickness = if y_outer > y_inner { wall } else { -wall };
            let y_box = [
                Vec2::new(x, y_outer),
                Vec2::new(x + height, y_outer),
                Vec2::new(x + height, y_outer + thickness),
                Vec2::new(x, y_outer + thickness),
            ];
            shapes.push(session.add_polygon(body, &y_box, CollisionFilter::NONE));
        }

        Self {
            end,
            x,
            y_outer,
            y_inner,
            body,
            shapes,
        }
    }

    /// Design position the clearance is measured against
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y_outer)
    }

    pub fn set_filter<B: PhysicsBackend>(&self, filter: CollisionFilter, session: &mut B) {
        for &shape in &self.shapes {
            session.set_filter(shape, filter);
        }
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }
}

/// Both plates and both stops of one bandolier
#[derive(Debug, Clone)]
pub struct EndFeatures {
    pub lower_constraint: EndConstraint,
    pub upper_constraint: EndConstraint,
    pub lower_limit: EndLimit,
    pub upper_limit: EndLimit,
}

impl EndFeatures {
    /// Live plate position minus stop design position
    pub fn clearance<B: PhysicsBackend>(&self, end: End, session: &B) -> Vec2 {
        match end {
            End::Lower => self.lower_constraint.position(session) - self.lower_limit.position(),
            End::Upper => self.upper_constraint.position(session) - self.upper_limit.position(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::physics::RelaxationWorld;
    use approx::assert_relative_eq;

    #[test]
    fn test_plate_pinned_to_each_cell_twice() {
        let config = ModelConfig::default();
        let mut world = RelaxationWorld::new(config.physics);
        let a = world.create_body(10.0, 10.0, BodyKind::Dynamic);
        let b = world.create_body(10.0, 10.0, BodyKind::Dynamic);

        let plate = EndConstraint::new(
            End::Lower,
            5.5,
            0.0,
            -12.0,
            Vec2::new(40.0, 0.0),
            false,
            &[a, b],
            &config,
            &mut world,
        );
        assert_eq!(plate.pins().len(), 4);
        assert_eq!(world.pin_count(), 4);
        assert_eq!(plate.design_position(), Vec2::new(45.5, -12.0));
        assert_eq!(plate.position(&world), plate.design_position());
    }

    #[test]
    fn test_plate_pin_rest_lengths() {
        let config = ModelConfig::default();
        let mut world = RelaxationWorld::new(config.physics);
        let cell = world.create_body(10.0, 10.0, BodyKind::Dynamic);
        world.set_position(cell, Vec2::new(40.0, 0.0));

        let plate = EndConstraint::new(
            End::Lower,
            5.5,
            0.0,
            -12.0,
            Vec2::new(40.0, 0.0),
            false,
            &[cell],
            &config,
            &mut world,
        );
        // Plate origin at (45.5, -12); second anchor at (+5, outer - inner)
        assert_relative_eq!(world.pin_length(plate.pins()[0]), 5.5_f64.hypot(12.0));
        assert_relative_eq!(world.pin_length(plate.pins()[1]), 10.5_f64.hypot(24.0));
    }

    #[test]
    fn test_limit_geometry() {
        let config = ModelConfig {
            include_y_constraints: true,
            ..Default::default()
        };
        let mut world = RelaxationWorld::new(config.physics);

        let upper = EndLimit::new(End::Upper, 31.5, 0.5, 250.0, &config, &mut world);
        assert_eq!(upper.position(), Vec2::new(32.0, 250.0));
        assert_eq!(upper.y_inner, 230.0);
        assert_eq!(upper.shape_count(), 2);

        let lower = EndLimit::new(End::Lower, 0.0, 0.0, -15.0, &config, &mut world);
        assert_eq!(lower.y_inner, 5.0);
        assert_eq!(world.position(lower.body()), Vec2::zeros());
    }
}
