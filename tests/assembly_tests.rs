//! Module assembly and relaxation tests
//!
//! Most tests drive a scripted backend that records what the assembly asks
//! of it and replays a fixed speed schedule; a few run the real relaxation
//! world end to end.

use approx::assert_relative_eq;
use bando::core::analytics::SimulationResult;
use bando::core::config::ModelConfig;
use bando::core::physics::{
    BodyHandle, BodyKind, CollisionFilter, PhysicsBackend, PinHandle, RelaxationWorld,
    ShapeHandle, Vec2,
};
use bando::core::simulation::{RunLength, SimulationDriver, StabilityPolicy, Termination};
use bando::entities::bandolier::LinkKind;
use bando::entities::cell::nominal_position;
use bando::entities::module::{start_origin_x, Module};
use rand::rngs::StdRng;
use rand::SeedableRng;

// ============================================================================
// Scripted backend
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShapeKind {
    Circle,
    Polygon,
}

#[derive(Default)]
struct ScriptedBackend {
    positions: Vec<Vec2>,
    kinds: Vec<BodyKind>,
    shapes: Vec<(BodyHandle, ShapeKind, CollisionFilter)>,
    pins: Vec<(BodyHandle, BodyHandle)>,
    /// Speed reported by every dynamic body after step `k` is `speeds[k-1]`
    speeds: Vec<f64>,
    steps: usize,
}

impl ScriptedBackend {
    fn with_speeds(speeds: &[f64]) -> Self {
        Self {
            speeds: speeds.to_vec(),
            ..Default::default()
        }
    }
}

impl PhysicsBackend for ScriptedBackend {
    fn create_body(&mut self, _mass: f64, _moment: f64, kind: BodyKind) -> BodyHandle {
        self.positions.push(Vec2::zeros());
        self.kinds.push(kind);
        BodyHandle(self.positions.len() - 1)
    }

    fn set_position(&mut self, body: BodyHandle, position: Vec2) {
        self.positions[body.0] = position;
    }

    fn position(&self, body: BodyHandle) -> Vec2 {
        self.positions[body.0]
    }

    fn velocity(&self, body: BodyHandle) -> Vec2 {
        if self.kinds[body.0] == BodyKind::Static || self.steps == 0 || self.speeds.is_empty() {
            return Vec2::zeros();
        }
        let k = (self.steps - 1).min(self.speeds.len() - 1);
        Vec2::new(-self.speeds[k], 0.0)
    }

    fn add_circle(&mut self, body: BodyHandle, _radius: f64, filter: CollisionFilter) -> ShapeHandle {
        self.shapes.push((body, ShapeKind::Circle, filter));
        ShapeHandle(self.shapes.len() - 1)
    }

    fn add_polygon(
        &mut self,
        body: BodyHandle,
        _vertices: &[Vec2],
        filter: CollisionFilter,
    ) -> ShapeHandle {
        self.shapes.push((body, ShapeKind::Polygon, filter));
        ShapeHandle(self.shapes.len() - 1)
    }

    fn set_filter(&mut self, shape: ShapeHandle, filter: CollisionFilter) {
        self.shapes[shape.0].2 = filter;
    }

    fn add_pin(
        &mut self,
        a: BodyHandle,
        b: BodyHandle,
        _anchor_a: Vec2,
        _anchor_b: Vec2,
    ) -> PinHandle {
        self.pins.push((a, b));
        PinHandle(self.pins.len() - 1)
    }

    fn step(&mut self, _dt: f64) {
        self.steps += 1;
    }
}

fn config(cells: usize, bandoliers: usize) -> ModelConfig {
    ModelConfig {
        cell_count: cells,
        bandolier_count: bandoliers,
        ..Default::default()
    }
}

fn build<B: PhysicsBackend>(config: &ModelConfig, session: B, seed: u64) -> Module<B> {
    Module::build(config, session, &mut StdRng::seed_from_u64(seed)).unwrap()
}

// ============================================================================
// Layout
// ============================================================================

#[test]
fn test_zig_zag_layout() {
    let config = config(6, 1);
    let expected = [
        (0.0, 0.0),
        (16.0, 12.0),
        (0.0, 23.0),
        (16.0, 35.0),
        (0.0, 46.0),
        (16.0, 58.0),
    ];
    for (id, (x, y)) in expected.iter().enumerate() {
        let p = nominal_position(id, &config);
        assert_relative_eq!(p.x, *x);
        assert_relative_eq!(p.y, *y);
    }
}

#[test]
fn test_cells_start_at_origin_plus_nominal_plus_offset() {
    let config = config(5, 3);
    let module = build(&config, ScriptedBackend::default(), 21);

    for (index, bando) in module.bandoliers.iter().enumerate() {
        assert_relative_eq!(bando.x, start_origin_x(&config, index));
        for cell in &bando.cells {
            let p = cell.position(module.session());
            assert_relative_eq!(p.x, bando.x + cell.x_nominal + cell.x_offset, epsilon = 1e-12);
            assert_relative_eq!(p.y, bando.y + cell.y_nominal + cell.y_offset, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_start_origins_never_overlap_desired_spacing() {
    let config = config(4, 4);
    for index in 1..4 {
        let x = start_origin_x(&config, index);
        assert!(x >= index as f64 * config.desired_spacing + 1.0 - 1e-12);
    }

    let open = ModelConfig {
        include_end_constraints: false,
        ..config
    };
    assert_relative_eq!(start_origin_x(&open, 0), 0.0);
    assert!(start_origin_x(&open, 1) > open.pitch_x.abs());
}

// ============================================================================
// Topology and collision layers
// ============================================================================

#[test]
fn test_link_topology() {
    for (cells, adjacent, skip) in [(1, 0, 0), (2, 1, 0), (3, 2, 1), (8, 7, 6)] {
        let config = ModelConfig {
            include_end_constraints: cells >= 2,
            ..config(cells, 2)
        };
        let module = build(&config, ScriptedBackend::default(), 3);

        let reference = &module.bandoliers[0];
        assert!(reference.is_static);
        assert!(reference.links().is_empty());

        let moving = &module.bandoliers[1];
        assert_eq!(moving.link_count(LinkKind::Adjacent), adjacent);
        assert_eq!(moving.link_count(LinkKind::SkipOne), skip);
    }
}

#[test]
fn test_end_features_use_private_layers() {
    let config = config(4, 3);
    let module = build(&config, ScriptedBackend::default(), 8);
    let session = module.session();

    for bando in &module.bandoliers {
        let ends = bando.ends.as_ref().unwrap();
        let layer = CollisionFilter::layer(1 << bando.id);
        for plate in [&ends.lower_constraint, &ends.upper_constraint] {
            let filters: Vec<_> = session
                .shapes
                .iter()
                .filter(|(body, _, _)| *body == plate.body())
                .map(|(_, _, f)| *f)
                .collect();
            assert_eq!(filters, vec![layer]);
            // Two pins to each of the two capped cells
            assert_eq!(plate.pins().len(), 4);
        }
        for stop in [&ends.lower_limit, &ends.upper_limit] {
            assert!(session
                .shapes
                .iter()
                .filter(|(body, _, _)| *body == stop.body())
                .all(|(_, kind, f)| *kind == ShapeKind::Polygon && *f == CollisionFilter::NONE));
        }
    }

    for (_, kind, filter) in &session.shapes {
        if *kind == ShapeKind::Circle {
            assert_eq!(*filter, CollisionFilter::CELLS);
        }
    }
}

#[test]
fn test_colliding_end_limits() {
    let config = ModelConfig {
        end_limit_collision: true,
        include_y_constraints: true,
        ..config(4, 2)
    };
    let module = build(&config, ScriptedBackend::default(), 8);
    let session = module.session();

    let ends = module.bandoliers[1].ends.as_ref().unwrap();
    assert_eq!(ends.upper_limit.shape_count(), 2);
    assert!(session
        .shapes
        .iter()
        .filter(|(body, _, _)| *body == ends.upper_limit.body())
        .all(|(_, _, f)| *f == CollisionFilter::layer(2)));
}

// ============================================================================
// Stability detection
// ============================================================================

fn driver(max_steps: usize, threshold: f64, sustained: usize) -> SimulationDriver {
    SimulationDriver::new(RunLength::UntilStable(StabilityPolicy {
        max_steps,
        velocity_threshold: threshold,
        sustained_step_count: sustained,
    }))
}

#[test]
fn test_stable_after_sustained_quiet_steps() {
    let speeds = [5.0, 4.0, 3.0, 2.0, 1.0, 0.4, 0.3, 0.2, 0.1];
    let mut module = build(&config(4, 2), ScriptedBackend::with_speeds(&speeds), 1);

    let outcome = driver(100, 0.5, 3).with_trace().run(&mut module);
    assert_eq!(outcome.termination, Termination::Stable);
    assert_eq!(outcome.steps, 8);
    assert_eq!(outcome.trace.as_ref().unwrap().len(), 8);
    assert_relative_eq!(outcome.trace.as_ref().unwrap()[0], 5.0);

    let result = SimulationResult::collect(&module, &outcome).unwrap();
    assert!(result.stable);
    assert_eq!(result.steps, 8);
    assert_eq!(result.clearances.len(), 2);
}

#[test]
fn test_threshold_is_strict() {
    // Exactly at the threshold never counts as still
    let mut module = build(&config(4, 2), ScriptedBackend::with_speeds(&[0.5]), 1);
    let outcome = driver(30, 0.5, 2).run(&mut module);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.steps, 30);
    assert!(!outcome.stable());
}

#[test]
fn test_exhausted_run_still_measured() {
    let mut module = build(&config(4, 2), ScriptedBackend::with_speeds(&[2.0]), 1);
    assert!(module.total_width().is_none());

    let outcome = driver(25, 0.5, 5).run(&mut module);
    let result = SimulationResult::collect(&module, &outcome).unwrap();
    assert!(!result.stable);
    assert_eq!(result.steps, 25);
    assert!(result.total_width.is_finite());
}

#[test]
fn test_single_bandolier_module() {
    // The static reference is the last bandolier; it never moves
    let mut module = build(&config(4, 1), ScriptedBackend::with_speeds(&[9.0]), 1);
    let outcome = driver(100, 0.5, 10).run(&mut module);
    assert_eq!(outcome.termination, Termination::Stable);
    assert_eq!(outcome.steps, 10);
}

// ============================================================================
// Relaxation world, end to end
// ============================================================================

#[test]
fn test_relaxed_width_is_plausible() {
    let config = ModelConfig {
        max_steps: 600,
        sustained_step_count: 30,
        ..config(4, 2)
    };
    let mut module = build(&config, RelaxationWorld::new(config.physics), 17);

    let start_width = {
        let first = &module.bandoliers[0];
        let last = &module.bandoliers[1];
        let left = first.cells.iter().map(|c| c.position(module.session()).x).fold(f64::INFINITY, f64::min);
        let right = last.cells.iter().map(|c| c.position(module.session()).x).fold(f64::NEG_INFINITY, f64::max);
        right - left + first.cells[0].diameter
    };

    let outcome = SimulationDriver::from_config(&config).run(&mut module);
    let width = module.total_width().unwrap();
    assert!(width.is_finite());
    assert!(outcome.steps > 0);

    // One bandolier pitch plus a cell at the very least, and no wider than
    // where the moving bandolier started
    assert!(width > config.pitch_x + config.diameter_nominal);
    assert!(width <= start_width + 1.0);
}

#[test]
fn test_same_seed_same_module() {
    let config = ModelConfig {
        max_steps: 200,
        ..config(4, 2)
    };
    let widths: Vec<f64> = (0..2)
        .map(|_| {
            let mut module = build(&config, RelaxationWorld::new(config.physics), 42);
            SimulationDriver::new(RunLength::Fixed(120)).run(&mut module);
            module.total_width().unwrap()
        })
        .collect();
    assert_eq!(widths[0], widths[1]);
}
