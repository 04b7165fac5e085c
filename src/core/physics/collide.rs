//! Narrow-phase contact generation for circles and convex polygons
//!
//! All functions work in world coordinates. A returned contact's normal
//! points from the first shape towards the second.

use super::Vec2;

/// Penetrating contact between two shapes
#[derive(Debug, Clone, Copy)]
pub(crate) struct Contact {
    /// Unit normal from shape A to shape B
    pub normal: Vec2,
    /// Overlap depth (> 0)
    pub depth: f64,
    /// Approximate world contact point
    pub point: Vec2,
}

/// World-space geometry of one shape for a single step
#[derive(Debug, Clone)]
pub(crate) enum WorldGeometry {
    Circle { center: Vec2, radius: f64 },
    Polygon { vertices: Vec<Vec2> },
}

impl WorldGeometry {
    /// Axis-aligned bounds as (min, max)
    pub fn bounds(&self) -> (Vec2, Vec2) {
        match self {
            WorldGeometry::Circle { center, radius } => (
                Vec2::new(center.x - radius, center.y - radius),
                Vec2::new(center.x + radius, center.y + radius),
            ),
            WorldGeometry::Polygon { vertices } => {
                let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
                let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
                for v in vertices {
                    min.x = min.x.min(v.x);
                    min.y = min.y.min(v.y);
                    max.x = max.x.max(v.x);
                    max.y = max.y.max(v.y);
                }
                (min, max)
            }
        }
    }
}

/// Dispatch on the geometry pair
pub(crate) fn collide(a: &WorldGeometry, b: &WorldGeometry) -> Option<Contact> {
    match (a, b) {
        (
            WorldGeometry::Circle {
                center: ca,
                radius: ra,
            },
            WorldGeometry::Circle {
                center: cb,
                radius: rb,
            },
        ) => circle_circle(*ca, *ra, *cb, *rb),
        (WorldGeometry::Polygon { vertices }, WorldGeometry::Circle { center, radius }) => {
            polygon_circle(vertices, *center, *radius)
        }
        (WorldGeometry::Circle { center, radius }, WorldGeometry::Polygon { vertices }) => {
            polygon_circle(vertices, *center, *radius).map(flip)
        }
        (WorldGeometry::Polygon { vertices: va }, WorldGeometry::Polygon { vertices: vb }) => {
            polygon_polygon(va, vb)
        }
    }
}

fn flip(contact: Contact) -> Contact {
    Contact {
        normal: -contact.normal,
        ..contact
    }
}

fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Outward normal of edge `i` of a counter-clockwise polygon
fn edge_normal(vertices: &[Vec2], i: usize) -> Vec2 {
    let v1 = vertices[i];
    let v2 = vertices[(i + 1) % vertices.len()];
    let edge = v2 - v1;
    Vec2::new(edge.y, -edge.x).normalize()
}

/// Reorder vertices counter-clockwise (signed area > 0)
pub(crate) fn counter_clockwise(mut vertices: Vec<Vec2>) -> Vec<Vec2> {
    let n = vertices.len();
    let area: f64 = (0..n)
        .map(|i| cross(vertices[i], vertices[(i + 1) % n]))
        .sum();
    if area < 0.0 {
        vertices.reverse();
    }
    vertices
}

fn circle_circle(ca: Vec2, ra: f64, cb: Vec2, rb: f64) -> Option<Contact> {
    let d = cb - ca;
    let dist = d.norm();
    let depth = ra + rb - dist;
    if depth <= 0.0 {
        return None;
    }
    let normal = if dist > 1e-12 {
        d / dist
    } else {
        Vec2::new(1.0, 0.0)
    };
    Some(Contact {
        normal,
        depth,
        point: ca + normal * ra,
    })
}

/// Polygon (A) against circle (B)
fn polygon_circle(vertices: &[Vec2], center: Vec2, radius: f64) -> Option<Contact> {
    let n = vertices.len();
    if n < 3 {
        return None;
    }

    // Edge of maximum separation
    let mut separation = f64::NEG_INFINITY;
    let mut edge = 0;
    for i in 0..n {
        let s = edge_normal(vertices, i).dot(&(center - vertices[i]));
        if s > radius {
            return None;
        }
        if s > separation {
            separation = s;
            edge = i;
        }
    }

    let v1 = vertices[edge];
    let v2 = vertices[(edge + 1) % n];

    // Center inside the polygon
    if separation < 1e-12 {
        let normal = edge_normal(vertices, edge);
        return Some(Contact {
            normal,
            depth: radius - separation,
            point: center - normal * radius,
        });
    }

    let u1 = (center - v1).dot(&(v2 - v1));
    let u2 = (center - v2).dot(&(v1 - v2));
    let (closest, normal) = if u1 <= 0.0 {
        (v1, center - v1)
    } else if u2 <= 0.0 {
        (v2, center - v2)
    } else {
        let normal = edge_normal(vertices, edge);
        return Some(Contact {
            normal,
            depth: radius - separation,
            point: center - normal * radius,
        });
    };

    let dist = normal.norm();
    if dist > radius || dist < 1e-12 {
        return None;
    }
    Some(Contact {
        normal: normal / dist,
        depth: radius - dist,
        point: closest,
    })
}

/// Largest separation of `b` from any edge of `a`: (separation, normal, deepest vertex of b)
fn max_separation(a: &[Vec2], b: &[Vec2]) -> (f64, Vec2, Vec2) {
    let mut best = (f64::NEG_INFINITY, Vec2::zeros(), Vec2::zeros());
    for i in 0..a.len() {
        let normal = edge_normal(a, i);
        let mut min_sep = f64::INFINITY;
        let mut deepest = b[0];
        for v in b {
            let s = normal.dot(&(v - a[i]));
            if s < min_sep {
                min_sep = s;
                deepest = *v;
            }
        }
        if min_sep > best.0 {
            best = (min_sep, normal, deepest);
        }
    }
    best
}

fn polygon_polygon(a: &[Vec2], b: &[Vec2]) -> Option<Contact> {
    if a.len() < 3 || b.len() < 3 {
        return None;
    }

    let (sep_a, normal_a, deepest_b) = max_separation(a, b);
    if sep_a > 0.0 {
        return None;
    }
    let (sep_b, normal_b, deepest_a) = max_separation(b, a);
    if sep_b > 0.0 {
        return None;
    }

    if sep_a >= sep_b {
        Some(Contact {
            normal: normal_a,
            depth: -sep_a,
            point: deepest_b,
        })
    } else {
        Some(Contact {
            normal: -normal_b,
            depth: -sep_b,
            point: deepest_a,
        })
    }
}
