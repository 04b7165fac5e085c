//! Terminal visualization using braille graphics
//!
//! Provides terminal-based views of a relaxed module, the stability trace of
//! a run and the width distribution of a batch, using Unicode braille
//! characters for graphical rendering.

use console::style;
use drawille::Canvas;

use crate::core::physics::{PhysicsBackend, Vec2};
use crate::entities::module::Module;

/// Default canvas size for module renders (braille dots)
pub const MODULE_HEIGHT: u32 = 160;

/// Default canvas size for speed traces
pub const TRACE_WIDTH: u32 = 120;
pub const TRACE_HEIGHT: u32 = 40;

/// Maps model millimetres to canvas dots, Y pointing down
struct Viewport {
    min: Vec2,
    scale: f64,
    height: u32,
}

impl Viewport {
    fn fit(min: Vec2, max: Vec2, height: u32) -> (Self, u32) {
        let span = max - min;
        let scale = if span.y > 0.0 {
            (height - 1) as f64 / span.y
        } else {
            1.0
        };
        let width = ((span.x * scale).ceil() as u32 + 1).max(2);
        (Self { min, scale, height }, width)
    }

    fn map(&self, p: Vec2) -> (u32, u32) {
        let x = ((p.x - self.min.x) * self.scale).max(0.0) as u32;
        let y = ((p.y - self.min.y) * self.scale).max(0.0) as u32;
        (x, (self.height - 1).saturating_sub(y))
    }
}

fn draw_circle(canvas: &mut Canvas, view: &Viewport, center: Vec2, radius: f64) {
    let steps = 36;
    for i in 0..steps {
        let theta = 2.0 * std::f64::consts::PI * (i as f64) / (steps as f64);
        let (x, y) = view.map(center + Vec2::new(theta.cos(), theta.sin()) * radius);
        canvas.set(x, y);
    }
}

fn draw_segment(canvas: &mut Canvas, view: &Viewport, a: Vec2, b: Vec2) {
    let (x1, y1) = view.map(a);
    let (x2, y2) = view.map(b);
    canvas.line(x1, y1, x2, y2);
}

/// Render the live state of a module
///
/// Cells are drawn as circles, end plates as rectangles and end stops as
/// their stop faces.
pub fn render_module<B: PhysicsBackend>(module: &Module<B>, height: u32) -> String {
    let session = module.session();

    let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
    let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut grow = |p: Vec2, r: f64| {
        min = min.inf(&(p - Vec2::new(r, r)));
        max = max.sup(&(p + Vec2::new(r, r)));
    };
    for bando in &module.bandoliers {
        for cell in &bando.cells {
            grow(cell.position(session), cell.radius());
        }
        if let Some(ends) = &bando.ends {
            for plate in [&ends.lower_constraint, &ends.upper_constraint] {
                let p = plate.position(session);
                grow(p, 0.0);
                grow(p + Vec2::new(plate.thickness, plate.y_inner - plate.y_outer), 0.0);
            }
            for limit in [&ends.lower_limit, &ends.upper_limit] {
                grow(limit.position(), 0.0);
                grow(Vec2::new(limit.x, limit.y_inner), 0.0);
            }
        }
    }
    if !min.x.is_finite() {
        return "  (empty module)".to_string();
    }

    let (view, width) = Viewport::fit(min, max, height.max(8));
    let mut canvas = Canvas::new(width, height.max(8));

    for bando in &module.bandoliers {
        for cell in &bando.cells {
            draw_circle(&mut canvas, &view, cell.position(session), cell.radius());
        }
        if let Some(ends) = &bando.ends {
            for plate in [&ends.lower_constraint, &ends.upper_constraint] {
                let p = plate.position(session);
                let depth = plate.y_inner - plate.y_outer;
                let corners = [
                    p,
                    p + Vec2::new(plate.thickness, 0.0),
                    p + Vec2::new(plate.thickness, depth),
                    p + Vec2::new(0.0, depth),
                ];
                for i in 0..4 {
                    draw_segment(&mut canvas, &view, corners[i], corners[(i + 1) % 4]);
                }
            }
            for limit in [&ends.lower_limit, &ends.upper_limit] {
                draw_segment(
                    &mut canvas,
                    &view,
                    limit.position(),
                    Vec2::new(limit.x, limit.y_inner),
                );
            }
        }
    }

    let mut output = canvas.frame();
    output.push_str(&format!(
        "\n  x: {:.1} .. {:.1} mm   y: {:.1} .. {:.1} mm",
        min.x, max.x, min.y, max.y
    ));
    output
}

/// Render the per-step speed of the last bandolier on a log scale
///
/// The dotted line marks the stability threshold.
pub fn render_speed_trace(trace: &[f64], threshold: f64, width: u32, height: u32) -> String {
    if trace.is_empty() {
        return "  (no steps recorded)".to_string();
    }

    let floor = (threshold / 100.0).max(1e-12);
    let log = |v: f64| v.max(floor).log10();
    let peak = trace.iter().cloned().fold(threshold, f64::max);
    let (lo, hi) = (log(floor), log(peak));
    let span = (hi - lo).max(1e-9);

    let mut canvas = Canvas::new(width, height);
    let to_y = |v: f64| {
        let t = (log(v) - lo) / span;
        (height - 1).saturating_sub((t * (height - 1) as f64) as u32)
    };

    // Bucket steps into columns, keeping the worst speed of each
    let per_column = trace.len().div_ceil(width as usize).max(1);
    for (x, chunk) in trace.chunks(per_column).enumerate() {
        let worst = chunk.iter().cloned().fold(0.0, f64::max);
        canvas.set(x as u32, to_y(worst));
    }

    let threshold_y = to_y(threshold);
    for x in (0..width).step_by(3) {
        canvas.set(x, threshold_y);
    }

    let mut output = String::new();
    output.push_str(&format!(
        "Last bandolier max |vx| ({} steps, log scale):\n",
        trace.len()
    ));
    output.push_str(&canvas.frame());
    output.push_str(&format!(
        "\n  peak {:.3} mm/s   threshold {:.3} mm/s   final {:.4} mm/s",
        peak,
        threshold,
        trace.last().copied().unwrap_or(0.0)
    ));
    output
}

/// Render a histogram of total widths, marking the mean bin
pub fn render_histogram(samples: &[f64], bins: usize) -> String {
    if samples.is_empty() || bins == 0 {
        return String::new();
    }

    let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;

    // A single repeated value still gets a visible bin
    let range = (max - min).max(1e-6);
    let bin_width = range / bins as f64;

    let mut counts: Vec<usize> = vec![0; bins];
    for &sample in samples {
        let bin = ((sample - min) / bin_width) as usize;
        counts[bin.min(bins - 1)] += 1;
    }

    let max_count = counts.iter().copied().max().unwrap_or(1).max(1);
    let bar_max_width = 50;
    let mean_bin = (((mean - min) / bin_width) as usize).min(bins - 1);

    let mut lines = Vec::with_capacity(bins + 4);
    lines.push(format!(
        "   {} ({} samples, {} bins):",
        style("Total width histogram").bold(),
        samples.len(),
        bins
    ));
    lines.push(String::new());

    for (i, &count) in counts.iter().enumerate() {
        let bar_width = (count as f64 / max_count as f64 * bar_max_width as f64) as usize;
        let bin_center = min + (i as f64 + 0.5) * bin_width;
        let marker = if i == mean_bin { " ◄mean" } else { "" };
        lines.push(format!(
            "   {:>9.3} │{:<width$}│ {:>5}{}",
            bin_center,
            style("█".repeat(bar_width)).green(),
            count,
            style(marker).cyan(),
            width = bar_max_width
        ));
    }

    lines.push(format!("   {:>9} └{}┘", "", "─".repeat(bar_max_width)));
    lines.push(format!(
        "   {} min={:.3}  mean={:.3}  max={:.3} mm",
        style("Legend:").dim(),
        min,
        mean,
        max
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ModelConfig;
    use crate::core::physics::RelaxationWorld;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn has_braille(s: &str) -> bool {
        s.chars().any(|c| (0x2800..=0x28FF).contains(&(c as u32)))
    }

    #[test]
    fn test_render_module() {
        let config = ModelConfig {
            cell_count: 6,
            bandolier_count: 2,
            ..Default::default()
        };
        let module = Module::build(
            &config,
            RelaxationWorld::new(config.physics),
            &mut StdRng::seed_from_u64(5),
        )
        .unwrap();

        let output = render_module(&module, 64);
        assert!(has_braille(&output));
        assert!(output.contains("x:"));
    }

    #[test]
    fn test_render_speed_trace() {
        let trace: Vec<f64> = (0..500).map(|i| 100.0 * 0.98_f64.powi(i)).collect();
        let output = render_speed_trace(&trace, 0.5, TRACE_WIDTH, TRACE_HEIGHT);
        assert!(output.contains("500 steps"));
        assert!(has_braille(&output));

        assert!(render_speed_trace(&[], 0.5, 40, 20).contains("no steps"));
    }

    #[test]
    fn test_render_histogram() {
        let samples = [100.1, 100.2, 100.2, 100.3, 100.5];
        let output = render_histogram(&samples, 4);
        assert!(output.contains("5 samples"));
        assert!(output.contains("mean"));
        assert_eq!(render_histogram(&[], 4), "");
    }

    #[test]
    fn test_render_histogram_single_value() {
        let output = render_histogram(&[42.0, 42.0], 10);
        assert!(output.contains("2 samples"));
    }
}
