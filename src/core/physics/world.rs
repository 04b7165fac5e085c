//! Built-in relaxation world
//!
//! A small position-based rigid-body relaxer, just large enough to settle a
//! module under gravity:
//!
//! ```text
//! For each step:
//!   1. Apply gravity and damping to dynamic bodies: v += g * dt, v *= damping^dt
//!   2. Predict poses: x* = x + v * dt, θ* = θ + ω * dt
//!   3. Broad phase (sweep and prune on X) over the predicted poses
//!   4. For each solver iteration:
//!      a. Project pin constraints back to their rest length
//!      b. Push penetrating shape pairs apart
//!   5. Update velocities from pose change: v = (x - x_prev) / dt
//! ```
//!
//! Static bodies never move and are never pushed. The step is fully
//! deterministic for a given sequence of calls.

use tracing::trace;

use super::collide::{self, Contact, WorldGeometry};
use super::{
    BodyHandle, BodyKind, CollisionFilter, PhysicsBackend, PinHandle, ShapeHandle, Vec2,
};
use crate::core::config::PhysicsSettings;

#[derive(Debug, Clone)]
struct Body {
    kind: BodyKind,
    inv_mass: f64,
    inv_moment: f64,
    position: Vec2,
    angle: f64,
    velocity: Vec2,
    angular_velocity: f64,
}

impl Body {
    fn is_dynamic(&self) -> bool {
        self.kind == BodyKind::Dynamic
    }

    fn rotate(&self, local: Vec2) -> Vec2 {
        let (s, c) = self.angle.sin_cos();
        Vec2::new(c * local.x - s * local.y, s * local.x + c * local.y)
    }

    fn world_point(&self, local: Vec2) -> Vec2 {
        self.position + self.rotate(local)
    }
}

#[derive(Debug, Clone)]
enum Geometry {
    Circle { radius: f64 },
    Polygon { vertices: Vec<Vec2> },
}

#[derive(Debug, Clone)]
struct Shape {
    body: usize,
    geometry: Geometry,
    filter: CollisionFilter,
}

#[derive(Debug, Clone, Copy)]
struct Pin {
    a: usize,
    b: usize,
    anchor_a: Vec2,
    anchor_b: Vec2,
    rest_length: f64,
}

/// Deterministic position-based relaxation engine
#[derive(Debug, Clone)]
pub struct RelaxationWorld {
    settings: PhysicsSettings,
    bodies: Vec<Body>,
    shapes: Vec<Shape>,
    pins: Vec<Pin>,
    steps: u64,
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

impl RelaxationWorld {
    pub fn new(settings: PhysicsSettings) -> Self {
        Self {
            settings,
            bodies: Vec::new(),
            shapes: Vec::new(),
            pins: Vec::new(),
            steps: 0,
        }
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    /// Steps taken since the session was created
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Current pin length, for diagnostics
    pub fn pin_length(&self, pin: PinHandle) -> f64 {
        let p = &self.pins[pin.0];
        let a = self.bodies[p.a].world_point(p.anchor_a);
        let b = self.bodies[p.b].world_point(p.anchor_b);
        (b - a).norm()
    }

    fn world_geometry(&self, shape: &Shape) -> WorldGeometry {
        let body = &self.bodies[shape.body];
        match &shape.geometry {
            Geometry::Circle { radius } => WorldGeometry::Circle {
                center: body.position,
                radius: *radius,
            },
            Geometry::Polygon { vertices } => WorldGeometry::Polygon {
                vertices: vertices.iter().map(|v| body.world_point(*v)).collect(),
            },
        }
    }

    /// Candidate shape pairs whose X extents overlap and whose filters match
    fn broad_phase(&self) -> Vec<(usize, usize)> {
        let margin = 1e-6;
        let mut spans: Vec<(f64, f64, Vec2, Vec2, usize)> = self
            .shapes
            .iter()
            .enumerate()
            .map(|(i, shape)| {
                let (min, max) = self.world_geometry(shape).bounds();
                (min.x - margin, max.x + margin, min, max, i)
            })
            .collect();
        spans.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut pairs = Vec::new();
        for (k, &(_, max_x, min_a, max_a, i)) in spans.iter().enumerate() {
            for &(min_x, _, min_b, max_b, j) in &spans[k + 1..] {
                if min_x > max_x {
                    break;
                }
                if min_a.y > max_b.y + margin || min_b.y > max_a.y + margin {
                    continue;
                }
                if self.may_collide(i, j) {
                    pairs.push((i.min(j), i.max(j)));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    fn may_collide(&self, i: usize, j: usize) -> bool {
        let (sa, sb) = (&self.shapes[i], &self.shapes[j]);
        if sa.body == sb.body {
            return false;
        }
        let (ba, bb) = (&self.bodies[sa.body], &self.bodies[sb.body]);
        if !ba.is_dynamic() && !bb.is_dynamic() {
            return false;
        }
        sa.filter.collides_with(&sb.filter)
    }

    /// Move bodies `a` and `b` apart along `normal` (a -> b) by `correction`,
    /// split by generalized inverse mass at the given world points
    fn apply_correction(
        &mut self,
        a: usize,
        b: usize,
        point_a: Vec2,
        point_b: Vec2,
        normal: Vec2,
        correction: f64,
    ) {
        let ra = point_a - self.bodies[a].position;
        let rb = point_b - self.bodies[b].position;
        let ca = cross(ra, normal);
        let cb = cross(rb, normal);

        let body_a = &self.bodies[a];
        let body_b = &self.bodies[b];
        let (ima, iia) = if body_a.is_dynamic() {
            (body_a.inv_mass, body_a.inv_moment)
        } else {
            (0.0, 0.0)
        };
        let (imb, iib) = if body_b.is_dynamic() {
            (body_b.inv_mass, body_b.inv_moment)
        } else {
            (0.0, 0.0)
        };

        let w = ima + iia * ca * ca + imb + iib * cb * cb;
        if w <= 0.0 {
            return;
        }
        let lambda = correction / w;

        let body_a = &mut self.bodies[a];
        body_a.position -= normal * (lambda * ima);
        body_a.angle -= iia * ca * lambda;

        let body_b = &mut self.bodies[b];
        body_b.position += normal * (lambda * imb);
        body_b.angle += iib * cb * lambda;
    }

    fn solve_pins(&mut self) {
        for k in 0..self.pins.len() {
            let pin = self.pins[k];
            let pa = self.bodies[pin.a].world_point(pin.anchor_a);
            let pb = self.bodies[pin.b].world_point(pin.anchor_b);
            let d = pb - pa;
            let length = d.norm();
            if length < 1e-12 {
                continue;
            }
            let normal = d / length;
            // Too long: pull together (negative push)
            self.apply_correction(pin.a, pin.b, pa, pb, normal, pin.rest_length - length);
        }
    }

    fn solve_contacts(&mut self, pairs: &[(usize, usize)]) -> usize {
        let mut resolved = 0;
        for &(i, j) in pairs {
            let ga = self.world_geometry(&self.shapes[i]);
            let gb = self.world_geometry(&self.shapes[j]);
            if let Some(Contact {
                normal,
                depth,
                point,
            }) = collide::collide(&ga, &gb)
            {
                let (a, b) = (self.shapes[i].body, self.shapes[j].body);
                self.apply_correction(a, b, point, point, normal, depth);
                resolved += 1;
            }
        }
        resolved
    }
}

impl PhysicsBackend for RelaxationWorld {
    fn create_body(&mut self, mass: f64, moment: f64, kind: BodyKind) -> BodyHandle {
        let (inv_mass, inv_moment) = match kind {
            BodyKind::Static => (0.0, 0.0),
            BodyKind::Dynamic => (
                if mass > 0.0 { 1.0 / mass } else { 0.0 },
                if moment > 0.0 { 1.0 / moment } else { 0.0 },
            ),
        };
        self.bodies.push(Body {
            kind,
            inv_mass,
            inv_moment,
            position: Vec2::zeros(),
            angle: 0.0,
            velocity: Vec2::zeros(),
            angular_velocity: 0.0,
        });
        BodyHandle(self.bodies.len() - 1)
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        self.bodies[body.0].position = position;
    }

    fn position(&self, body: BodyHandle) -> Vec2 {
        self.bodies[body.0].position
    }

    fn velocity(&self, body: BodyHandle) -> Vec2 {
        self.bodies[body.0].velocity
    }

    fn add_circle(
        &mut self,
        body: BodyHandle,
        radius: f64,
        filter: CollisionFilter,
    ) -> ShapeHandle {
        self.shapes.push(Shape {
            body: body.0,
            geometry: Geometry::Circle { radius },
            filter,
        });
        ShapeHandle(self.shapes.len() - 1)
    }

    fn add_polygon(
        &mut self,
        body: BodyHandle,
        vertices: &[Vec2],
        filter: CollisionFilter,
    ) -> ShapeHandle {
        self.shapes.push(Shape {
            body: body.0,
            geometry: Geometry::Polygon {
                vertices: collide::counter_clockwise(vertices.to_vec()),
            },
            filter,
        });
        ShapeHandle(self.shapes.len() - 1)
    }

    fn set_filter(&mut self, shape: ShapeHandle, filter: CollisionFilter) {
        self.shapes[shape.0].filter = filter;
    }

    fn add_pin(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> PinHandle {
        let pa = self.bodies[a.0].world_point(anchor_a);
        let pb = self.bodies[b.0].world_point(anchor_b);
        self.pins.push(Pin {
            a: a.0,
            b: b.0,
            anchor_a,
            anchor_b,
            rest_length: (pb - pa).norm(),
        });
        PinHandle(self.pins.len() - 1)
    }

    fn step(&mut self, dt: f64) {
        debug_assert!(dt > 0.0, "time step must be positive");
        let gravity = Vec2::new(self.settings.gravity_x, self.settings.gravity_y);
        let retain = self.settings.damping.powf(dt);

        let previous: Vec<(Vec2, f64)> = self.bodies.iter().map(|b| (b.position, b.angle)).collect();

        for body in self.bodies.iter_mut().filter(|b| b.is_dynamic()) {
            body.velocity = (body.velocity + gravity * dt) * retain;
            body.angular_velocity *= retain;
            body.position += body.velocity * dt;
            body.angle += body.angular_velocity * dt;
        }

        let pairs = self.broad_phase();
        let mut contacts = 0;
        for _ in 0..self.settings.solver_iterations {
            self.solve_pins();
            contacts = self.solve_contacts(&pairs);
        }

        for (body, (position, angle)) in self.bodies.iter_mut().zip(previous) {
            if body.is_dynamic() {
                body.velocity = (body.position - position) / dt;
                body.angular_velocity = (body.angle - angle) / dt;
            }
        }

        self.steps += 1;
        trace!(step = self.steps, pairs = pairs.len(), contacts, "relaxation step");
    }
}
