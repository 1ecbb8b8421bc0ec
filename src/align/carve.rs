//! Cutting cyclic isolines open so that they can be aligned as polylines.

use crate::{
    geom::{point_polyline_distance, Point},
    isoline::Isoline,
};

/// Two isolines, cut open where needed.
///
/// A carved cycle starts and ends at the same vertex, so its polyline has
/// one more point than the isoline has vertices.
#[derive(Clone, Debug, PartialEq)]
pub struct Carving {
    /// The polyline of the first isoline.
    pub lower: Vec<Point>,
    /// The polyline of the second isoline.
    pub upper: Vec<Point>,
    /// The vertex of the first isoline that `lower` starts at.
    pub lower_start: usize,
    /// The vertex of the second isoline that `upper` starts at.
    pub upper_start: usize,
    /// The vertex of the second isoline that `upper` ends at.
    pub upper_end: usize,
}

/// Carves a pair of neighbouring isolines.
///
/// If both are cyclic they are cut at their closest pair of vertices. If
/// only one is, it is cut at the vertex furthest away from the other one.
pub fn carve(lower: &Isoline, upper: &Isoline) -> Carving {
    let open = |iso: &Isoline| iso.points.clone();
    let last = |iso: &Isoline| iso.len().saturating_sub(1);

    match (lower.cyclic, upper.cyclic) {
        (true, true) => {
            let mut best = (0, 0);
            let mut dist = f64::INFINITY;
            for (i, p) in lower.points.iter().enumerate() {
                for (j, q) in upper.points.iter().enumerate() {
                    let d = p.distance(*q);
                    if d < dist {
                        dist = d;
                        best = (i, j);
                    }
                }
            }
            Carving {
                lower: carve_cycle(lower, best.0),
                upper: carve_cycle(upper, best.1),
                lower_start: best.0,
                upper_start: best.1,
                upper_end: best.1,
            }
        }
        (true, false) => {
            let cut = furthest_from(lower, &upper.points);
            Carving {
                lower: carve_cycle(lower, cut),
                upper: open(upper),
                lower_start: cut,
                upper_start: 0,
                upper_end: last(upper),
            }
        }
        (false, true) => {
            let cut = furthest_from(upper, &lower.points);
            Carving {
                lower: open(lower),
                upper: carve_cycle(upper, cut),
                lower_start: 0,
                upper_start: cut,
                upper_end: cut,
            }
        }
        (false, false) => Carving {
            lower: open(lower),
            upper: open(upper),
            lower_start: 0,
            upper_start: 0,
            upper_end: last(upper),
        },
    }
}

fn furthest_from(iso: &Isoline, other: &[Point]) -> usize {
    let mut best = 0;
    let mut dist = -1.0;
    for (i, p) in iso.points.iter().enumerate() {
        let d = point_polyline_distance(*p, other);
        if d > dist {
            dist = d;
            best = i;
        }
    }
    best
}

fn carve_cycle(iso: &Isoline, start: usize) -> Vec<Point> {
    let n = iso.len();
    if n == 0 {
        return Vec::new();
    }
    (0..=n).map(|k| iso.points[(start + k) % n]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(offset: f64, size: f64) -> Isoline {
        Isoline::closed([
            (offset, offset),
            (offset + size, offset),
            (offset + size, offset + size),
            (offset, offset + size),
        ])
    }

    #[test]
    fn two_cycles_cut_at_closest_pair() {
        let inner = square(1.0, 1.0);
        let outer = square(0.0, 3.0);
        let c = carve(&inner, &outer);
        assert_eq!((c.lower_start, c.upper_start, c.upper_end), (0, 0, 0));
        assert_eq!(c.lower.len(), 5);
        assert_eq!(c.lower.first(), c.lower.last());
        assert_eq!(c.upper.first(), c.upper.last());
    }

    #[test]
    fn cycle_cut_far_from_open_line() {
        let ring = square(0.0, 2.0);
        let line = Isoline::open([(0.0, -1.0), (2.0, -1.0)]);
        let c = carve(&line, &ring);
        // (2, 2) and (0, 2) are equally far; the first one wins.
        assert_eq!(c.upper_start, 2);
        assert_eq!(c.upper[0], Point::new(2.0, 2.0));
        assert_eq!(c.upper[4], Point::new(2.0, 2.0));
        assert_eq!(c.lower, line.points);
        assert_eq!((c.lower_start, c.upper_end), (0, 2));
    }

    #[test]
    fn open_lines_are_untouched() {
        let a = Isoline::open([(0.0, 0.0), (1.0, 0.0)]);
        let b = Isoline::open([(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]);
        let c = carve(&a, &b);
        assert_eq!(c.upper, b.points);
        assert_eq!((c.lower_start, c.upper_start, c.upper_end), (0, 0, 2));
    }
}
