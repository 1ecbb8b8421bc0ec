//! How bad is a collapse?

use crate::geom::{intersect_segments, polygon_area, Crossing, Point};

/// The ranking used to pick the next ladder to collapse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScoreFunction {
    /// The area between the old and the new geometry, summed over rungs.
    #[default]
    SymmetricDifference,
    /// The largest directed Hausdorff distance from a replacement to the
    /// input geometry it stands for.
    Hausdorff,
}

fn crossing(p0: Point, p1: Point, q0: Point, q1: Point) -> Option<Point> {
    match intersect_segments(p0, p1, q0, q1)? {
        Crossing::Point(p) => Some(p),
        Crossing::Overlap(..) => None,
    }
}

/// The area of the symmetric difference between the path `a-b-c-d` and its
/// replacement `a-n-d`.
///
/// Handles the usual configurations, where the old and the new path cross
/// at most twice. More tangled quadruples get an overestimate, but those
/// are infeasible anyway.
pub fn symmetric_difference(a: Point, b: Point, c: Point, d: Point, n: Point) -> f64 {
    let area = polygon_area;
    let ab_nd = crossing(a, b, n, d);
    let bc_nd = crossing(b, c, n, d);
    let bc_an = crossing(b, c, a, n);
    let cd_an = crossing(c, d, a, n);

    if let Some(x) = ab_nd {
        area(&[a, n, x])
            + match bc_nd {
                Some(y) => area(&[x, b, y]) + area(&[y, c, d]),
                None => area(&[x, b, c, d]),
            }
    } else if let Some(x) = cd_an {
        area(&[x, n, d])
            + match bc_an {
                Some(y) => area(&[y, c, x]) + area(&[a, b, y]),
                None => area(&[a, b, c, x]),
            }
    } else {
        match (bc_an, bc_nd) {
            (None, None) => area(&[a, b, c, d, n]),
            (None, Some(y)) => area(&[n, a, b, y]) + area(&[y, c, d]),
            (Some(x), None) => area(&[a, b, x]) + area(&[x, c, d, n]),
            (Some(x), Some(y)) => area(&[a, b, x]) + area(&[x, n, y]) + area(&[y, c, d]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn straight_is_free() {
        let s = symmetric_difference(p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(3.0, 0.0), p(1.5, 0.0));
        assert!(s.abs() < 1e-12);
    }

    #[test]
    fn bump_on_one_side() {
        // b and c are above a-d, n is on a-d: the whole bump is lost.
        let s = symmetric_difference(p(0.0, 0.0), p(1.0, 1.0), p(2.0, 1.0), p(3.0, 0.0), p(1.5, 0.0));
        assert!((s - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zigzag_crossing_the_middle() {
        // b is above and c below the line a-d. With n in the middle, the new
        // path crosses b-c exactly once, at n.
        let s = symmetric_difference(p(0.0, 0.0), p(1.0, 1.0), p(2.0, -1.0), p(3.0, 0.0), p(1.5, 0.0));
        assert!((s - 1.5).abs() < 1e-9);
    }
}
