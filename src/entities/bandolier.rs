//! Bandolier entity - a chain of cells braced by pairwise pin links
//!
//! Consecutive cells are pinned (`i -> i+1`) and so are every other cell
//! (`i -> i+2`). The single chain alone would fold under load; the skip-one
//! links give it bending stiffness. The reference bandolier is static and
//! carries no links.

use crate::core::config::ModelConfig;
use crate::core::error::ModelError;
use crate::core::physics::{CollisionFilter, PhysicsBackend, PinHandle, Vec2};
use crate::core::sampler::CellTolerance;
use crate::entities::cell::Cell;
use crate::entities::end_features::{End, EndConstraint, EndFeatures, EndLimit};

/// Topology of one pin link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// `i -> i+1`
    Adjacent,
    /// `i -> i+2`
    SkipOne,
}

/// A pin between two cells of the same bandolier
#[derive(Debug, Clone, Copy)]
pub struct CellLink {
    pub a: usize,
    pub b: usize,
    pub kind: LinkKind,
    pub pin: PinHandle,
}

#[derive(Debug, Clone)]
pub struct Bandolier {
    pub id: usize,

    /// Origin of the bandolier (mm)
    pub x: f64,
    pub y: f64,

    /// Design-intent X origin (`id * desired_spacing`)
    pub desired_x: f64,

    pub is_static: bool,
    pub cells: Vec<Cell>,

    /// Present when end constraints are enabled
    pub ends: Option<EndFeatures>,

    links: Vec<CellLink>,
    locked: bool,
}

impl Bandolier {
    /// Create the cells at the local origin `(0, 0)`
    pub fn new<B: PhysicsBackend>(
        id: usize,
        tolerances: &[CellTolerance],
        is_static: bool,
        config: &ModelConfig,
        session: &mut B,
    ) -> Self {
        let cells = tolerances
            .iter()
            .enumerate()
            .map(|(i, t)| Cell::new(i, *t, config, Vec2::zeros(), is_static, session))
            .collect();

        Self {
            id,
            x: 0.0,
            y: 0.0,
            desired_x: id as f64 * config.desired_spacing,
            is_static,
            cells,
            ends: None,
            links: Vec::new(),
            locked: false,
        }
    }

    /// Move the bandolier and all of its cells
    ///
    /// Pins take their rest length when created, so the origin is frozen as
    /// soon as links or end features exist.
    pub fn set_origin<B: PhysicsBackend>(
        &mut self,
        origin: Vec2,
        session: &mut B,
    ) -> Result<(), ModelError> {
        if self.locked {
            return Err(ModelError::AssemblyLocked(self.id));
        }
        self.x = origin.x;
        self.y = origin.y;
        for cell in &mut self.cells {
            cell.set_start(origin, session);
        }
        Ok(())
    }

    /// Create both end plates and both end stops, then move them onto this
    /// bandolier's private collision layer
    pub fn attach_end_features<B: PhysicsBackend>(
        &mut self,
        config: &ModelConfig,
        session: &mut B,
    ) -> Result<(), ModelError> {
        let (first, second) = match self.cells.as_slice() {
            [first, second, ..] => (first, second),
            _ => {
                return Err(ModelError::InvalidConfig(format!(
                    "bandolier {} needs at least 2 cells for end constraints",
                    self.id
                )))
            }
        };
        let n = self.cells.len();
        let (last, before_last) = (&self.cells[n - 1], &self.cells[n - 2]);

        let origin = Vec2::new(self.x, self.y);
        let plates = &config.end_constraint_offsets;
        let limits = &config.end_limit_offsets;

        let lower_constraint = EndConstraint::new(
            End::Lower,
            plates.lower_x,
            first.y_nominal,
            first.y_nominal - plates.lower_y,
            origin,
            self.is_static,
            &[first.body(), second.body()],
            config,
            session,
        );
        let upper_constraint = EndConstraint::new(
            End::Upper,
            plates.upper_x,
            last.y_nominal,
            last.y_nominal + plates.upper_y,
            origin,
            self.is_static,
            &[before_last.body(), last.body()],
            config,
            session,
        );
        let lower_limit = EndLimit::new(
            End::Lower,
            self.desired_x,
            limits.lower_x,
            first.y_nominal - limits.lower_y,
            config,
            session,
        );
        let upper_limit = EndLimit::new(
            End::Upper,
            self.desired_x,
            limits.upper_x,
            last.y_nominal + limits.upper_y,
            config,
            session,
        );

        let layer = CollisionFilter::layer(self.collision_category());
        lower_constraint.set_filter(layer, session);
        upper_constraint.set_filter(layer, session);
        let stop = if config.end_limit_collision {
            layer
        } else {
            CollisionFilter::NONE
        };
        lower_limit.set_filter(stop, session);
        upper_limit.set_filter(stop, session);

        self.ends = Some(EndFeatures {
            lower_constraint,
            upper_constraint,
            lower_limit,
            upper_limit,
        });
        self.locked = true;
        Ok(())
    }

    /// Pin the chain together; a static bandolier stays unlinked
    pub fn constrain_cells<B: PhysicsBackend>(&mut self, session: &mut B) {
        self.locked = true;
        if self.is_static {
            return;
        }

        let n = self.cells.len();
        for i in 0..n.saturating_sub(1) {
            let pin = self.pin(i, i + 1, session);
            self.links.push(CellLink {
                a: i,
                b: i + 1,
                kind: LinkKind::Adjacent,
                pin,
            });
            if i + 2 < n {
                let pin = self.pin(i, i + 2, session);
                self.links.push(CellLink {
                    a: i,
                    b: i + 2,
                    kind: LinkKind::SkipOne,
                    pin,
                });
            }
        }
    }

    fn pin<B: PhysicsBackend>(&self, a: usize, b: usize, session: &mut B) -> PinHandle {
        session.add_pin(
            self.cells[a].body(),
            self.cells[b].body(),
            Vec2::zeros(),
            Vec2::zeros(),
        )
    }

    /// Private collision category of the end features (`2^id`)
    pub fn collision_category(&self) -> u32 {
        1u32 << self.id
    }

    pub fn links(&self) -> &[CellLink] {
        &self.links
    }

    pub fn link_count(&self, kind: LinkKind) -> usize {
        self.links.iter().filter(|l| l.kind == kind).count()
    }

    /// Upper plate position minus upper stop design position; `(0, 0)`
    /// without end constraints
    pub fn upper_clearance<B: PhysicsBackend>(&self, session: &B) -> Vec2 {
        self.ends
            .as_ref()
            .map_or_else(Vec2::zeros, |ends| ends.clearance(End::Upper, session))
    }

    pub fn lower_clearance<B: PhysicsBackend>(&self, session: &B) -> Vec2 {
        self.ends
            .as_ref()
            .map_or_else(Vec2::zeros, |ends| ends.clearance(End::Lower, session))
    }

    /// Largest |vx| over the cells
    pub fn max_x_speed<B: PhysicsBackend>(&self, session: &B) -> f64 {
        self.cells
            .iter()
            .map(|c| c.velocity(session).x.abs())
            .fold(0.0, f64::max)
    }

    /// Leftmost and rightmost live cell X
    pub fn x_extent<B: PhysicsBackend>(&self, session: &B) -> (f64, f64) {
        self.cells.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(min, max), cell| {
                let x = cell.position(session).x;
                (min.min(x), max.max(x))
            },
        )
    }
}
