//! The directed Hausdorff distance between polylines.
//!
//! The distance from a point moving along a segment of `a` to the polyline
//! `b` is a piecewise function whose maximum is attained either at an
//! endpoint of the segment or where the closest feature of `b` changes.
//! Those switch points lie on bisectors between features of `b`: the
//! perpendicular bisector of two vertices, the angle bisectors of two edge
//! lines, or the parabola between a vertex and an edge line. We collect all
//! such candidates and evaluate the exact distance at each.

use arrayvec::ArrayVec;
use kurbo::common::solve_quadratic;

use crate::geom::{perp, point_polyline_distance, InfLine, Point};

/// `max_{p ∈ a} min_{q ∈ b} |p - q|`, where both `a` and `b` are polylines
/// given by their vertices.
///
/// A single-vertex polyline is treated as a point. If `b` is empty, the
/// distance is infinite; if `a` is empty it is zero.
pub fn directed_hausdorff(a: &[Point], b: &[Point]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    if b.is_empty() {
        return f64::INFINITY;
    }

    let dist = |p: Point| point_polyline_distance(p, b);
    let mut best = a.iter().map(|p| dist(*p)).fold(0.0, f64::max);

    if a.len() < 2 {
        return best;
    }

    let edge_lines: Vec<InfLine> = b
        .windows(2)
        .filter_map(|w| InfLine::through_points(w[0], w[1]))
        .collect();

    for w in a.windows(2) {
        let (s0, s1) = (w[0], w[1]);
        let Some(seg) = InfLine::through_points(s0, s1) else {
            continue;
        };
        let mut consider = |t: f64| {
            if (0.0..=1.0).contains(&t) {
                best = best.max(dist(s0 + seg.dir * t));
            }
        };

        for (i, &vi) in b.iter().enumerate() {
            for &vj in &b[i + 1..] {
                if let Some(bisector) = vertex_bisector(vi, vj) {
                    if let Some(t) = line_param(&seg, &bisector) {
                        consider(t);
                    }
                }
            }
        }

        for (i, li) in edge_lines.iter().enumerate() {
            for lj in &edge_lines[i + 1..] {
                for bisector in angle_bisectors(li, lj) {
                    if let Some(t) = line_param(&seg, &bisector) {
                        consider(t);
                    }
                }
            }
        }

        for &v in b {
            for line in &edge_lines {
                for t in vertex_line_params(&seg, v, line) {
                    consider(t);
                }
            }
        }
    }

    best
}

/// The symmetric Hausdorff distance.
pub fn hausdorff(a: &[Point], b: &[Point]) -> f64 {
    directed_hausdorff(a, b).max(directed_hausdorff(b, a))
}

fn vertex_bisector(p: Point, q: Point) -> Option<InfLine> {
    let line = InfLine::through_points(p, q)?;
    Some(line.with_through(p.midpoint(q)).turned())
}

/// The parameter along `seg` at which it crosses `other`.
fn line_param(seg: &InfLine, other: &InfLine) -> Option<f64> {
    let denom = seg.dir.cross(other.dir);
    if denom == 0.0 {
        return None;
    }
    Some((other.through - seg.through).cross(other.dir) / denom)
}

fn angle_bisectors(a: &InfLine, b: &InfLine) -> ArrayVec<InfLine, 2> {
    let mut ret = ArrayVec::new();
    let da = a.dir.normalize();
    let db = b.dir.normalize();
    let through = a
        .intersect(b)
        .unwrap_or_else(|| a.through.midpoint(b.closest_point(a.through)));
    let sum = da + db;
    let diff = da - db;
    if sum.hypot2() > 0.0 {
        ret.push(InfLine { through, dir: sum });
    }
    if diff.hypot2() > 0.0 {
        ret.push(InfLine { through, dir: diff });
    }
    ret
}

/// Parameters along `seg` that are equidistant from `v` and from `line`.
fn vertex_line_params(seg: &InfLine, v: Point, line: &InfLine) -> ArrayVec<f64, 2> {
    // With p(t) = s + t r and n the unit normal of the line:
    // |p - v|^2 = (n . (p - q))^2
    let n = perp(line.dir).normalize();
    let r = seg.dir;
    let w = seg.through - v;
    let h0 = n.dot(seg.through - line.through);
    let h1 = n.dot(r);
    let c2 = r.hypot2() - h1 * h1;
    let c1 = 2.0 * (w.dot(r) - h0 * h1);
    let c0 = w.hypot2() - h0 * h0;
    solve_quadratic(c0, c1, c2)
}
