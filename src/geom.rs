//! Geometric primitives: segment intersection, infinite lines and polygon areas.

use kurbo::Vec2;

pub use kurbo::Point;

use crate::num::EPS;

/// How two closed line segments meet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Crossing {
    /// The segments meet in a single point.
    Point(Point),
    /// The segments are collinear and share a sub-segment of positive length.
    Overlap(Point, Point),
}

/// The counter-clockwise perpendicular of `v` (same length).
#[inline]
pub fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

/// Intersects the closed segments `a0-a1` and `b0-b1`.
///
/// Touching counts: a segment endpoint lying within [`EPS`] of the other
/// segment is reported as a [`Crossing::Point`].
pub fn intersect_segments(a0: Point, a1: Point, b0: Point, b1: Point) -> Option<Crossing> {
    let r = a1 - a0;
    let s = b1 - b0;
    let r_len = r.hypot();
    let s_len = s.hypot();

    if r_len <= EPS && s_len <= EPS {
        return (a0.distance(b0) <= EPS).then_some(Crossing::Point(a0));
    }
    if r_len <= EPS {
        return (point_segment_distance(a0, b0, b1) <= EPS).then_some(Crossing::Point(a0));
    }
    if s_len <= EPS {
        return (point_segment_distance(b0, a0, a1) <= EPS).then_some(Crossing::Point(b0));
    }

    let qp = b0 - a0;
    let denom = r.cross(s);
    if denom.abs() <= 1e-12 * r_len * s_len {
        // Parallel. Unless b0 is on a's supporting line there is nothing to report.
        if qp.cross(r).abs() > EPS * r_len {
            return None;
        }
        let r2 = r.hypot2();
        let t0 = qp.dot(r) / r2;
        let t1 = t0 + s.dot(r) / r2;
        let lo = t0.min(t1).max(0.0);
        let hi = t0.max(t1).min(1.0);
        let slack = EPS / r_len;
        if lo > hi + slack {
            return None;
        }
        if (hi - lo) * r_len <= EPS {
            let t = (0.5 * (lo + hi)).clamp(0.0, 1.0);
            return Some(Crossing::Point(a0 + r * t));
        }
        return Some(Crossing::Overlap(a0 + r * lo, a0 + r * hi));
    }

    let t = qp.cross(s) / denom;
    let u = qp.cross(r) / denom;
    let t_slack = EPS / r_len;
    let u_slack = EPS / s_len;
    if (-t_slack..=1.0 + t_slack).contains(&t) && (-u_slack..=1.0 + u_slack).contains(&u) {
        Some(Crossing::Point(a0 + r * t.clamp(0.0, 1.0)))
    } else {
        None
    }
}

/// Do the closed segments `a0-a1` and `b0-b1` meet at all?
#[inline]
pub fn segments_meet(a0: Point, a1: Point, b0: Point, b1: Point) -> bool {
    intersect_segments(a0, a1, b0, b1).is_some()
}

/// Do two polylines (given by their vertices) meet anywhere?
pub fn polylines_meet(a: &[Point], b: &[Point]) -> bool {
    a.windows(2).any(|sa| {
        b.windows(2)
            .any(|sb| segments_meet(sa[0], sa[1], sb[0], sb[1]))
    })
}

/// The distance from `p` to the closed segment `a-b`.
pub fn point_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.hypot2();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// The distance from `p` to a polyline. A single vertex counts as a point.
pub fn point_polyline_distance(p: Point, pts: &[Point]) -> f64 {
    match pts {
        [] => f64::INFINITY,
        [q] => p.distance(*q),
        _ => pts
            .windows(2)
            .map(|w| point_segment_distance(p, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// The total length of a polyline.
pub fn polyline_length(pts: &[Point]) -> f64 {
    pts.windows(2).map(|w| w[0].distance(w[1])).sum()
}

/// Shoelace area of the closed polygon through `pts`; positive when
/// counter-clockwise in a y-up frame.
pub fn signed_area(pts: &[Point]) -> f64 {
    let n = pts.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let p = pts[i];
        let q = pts[(i + 1) % n];
        twice += p.x * q.y - q.x * p.y;
    }
    0.5 * twice
}

/// Unsigned area of the closed polygon through `pts`.
pub fn polygon_area(pts: &[Point]) -> f64 {
    signed_area(pts).abs()
}

/// Even-odd containment test for the closed polygon through `poly`.
///
/// Points within [`EPS`] of the boundary count as contained.
pub fn polygon_contains(poly: &[Point], p: Point) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let on_boundary = (0..n).any(|i| point_segment_distance(p, poly[i], poly[(i + 1) % n]) <= EPS);
    if on_boundary {
        return true;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (poly[i], poly[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x = pj.x + (p.y - pj.y) / (pi.y - pj.y) * (pi.x - pj.x);
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// An infinite, directed line.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct InfLine {
    /// Some point on the line.
    pub through: Point,
    /// The direction. Not necessarily normalized, but never zero.
    pub dir: Vec2,
}

impl InfLine {
    /// The line through `a` and `b`, directed from `a` to `b`.
    ///
    /// Returns `None` if the points are (almost) coincident.
    pub fn through_points(a: Point, b: Point) -> Option<Self> {
        let dir = b - a;
        (dir.hypot() > EPS).then_some(InfLine { through: a, dir })
    }

    /// The same line, moved to pass through `p`.
    pub fn with_through(self, p: Point) -> Self {
        InfLine { through: p, ..self }
    }

    /// The same line, translated by `v`.
    pub fn translated(self, v: Vec2) -> Self {
        InfLine {
            through: self.through + v,
            ..self
        }
    }

    /// The line through the same point, turned a quarter counter-clockwise.
    pub fn turned(self) -> Self {
        InfLine {
            dir: perp(self.dir),
            ..self
        }
    }

    /// Unit normal pointing to the left of the direction.
    pub fn normal(&self) -> Vec2 {
        perp(self.dir).normalize()
    }

    /// Orthogonal projection of `p` onto the line.
    pub fn closest_point(&self, p: Point) -> Point {
        let t = (p - self.through).dot(self.dir) / self.dir.hypot2();
        self.through + self.dir * t
    }

    /// The (unsigned) distance from `p` to the line.
    pub fn distance(&self, p: Point) -> f64 {
        self.signed_distance(p).abs()
    }

    /// Positive on the left of the direction, negative on the right.
    pub fn signed_distance(&self, p: Point) -> f64 {
        self.dir.cross(p - self.through) / self.dir.hypot()
    }

    /// Is `b` strictly further along the direction than `a`?
    pub fn is_ordered(&self, a: Point, b: Point) -> bool {
        self.dir.dot(b - a) > 0.0
    }

    /// The intersection point of two lines, or `None` if they are parallel.
    pub fn intersect(&self, other: &InfLine) -> Option<Point> {
        let denom = self.dir.cross(other.dir);
        if denom.abs() <= 1e-12 * self.dir.hypot() * other.dir.hypot() {
            return None;
        }
        let t = (other.through - self.through).cross(other.dir) / denom;
        Some(self.through + self.dir * t)
    }
}

/// The locus of replacement points `n` for the quadruple `a-b-c-d` such that
/// the path `a-n-d` encloses the same signed area as `a-b-c-d`.
///
/// The line is parallel to `a-d`, directed from `a` to `d`. Returns `None`
/// when `a` and `d` coincide, because then no such line exists.
pub fn area_preserving_line(a: Point, b: Point, c: Point, d: Point) -> Option<InfLine> {
    let base = InfLine::through_points(a, d)?;
    let area = signed_area(&[a, b, c, d]);
    // The triangle a-n-d has signed area -|ad| h / 2 for n at height h
    // along the left normal.
    let height = -2.0 * area / base.dir.hypot();
    Some(base.translated(base.normal() * height))
}
