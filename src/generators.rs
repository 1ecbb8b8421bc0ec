//! Utilities for generating examples, benchmarks, and test cases.

use std::f64::consts::TAU;

use crate::{
    geom::Point,
    isoline::{Isoline, IsolineStack},
};

/// A deterministic wobble in `[-1, 1]`, built from a few incommensurate
/// sines so that it doesn't look periodic.
fn wobble(t: f64, phase: f64) -> f64 {
    ((3.0 * t + phase).sin() + 0.5 * (7.0 * t + 2.0 * phase).sin() + 0.25 * (13.0 * t - phase).sin()) / 1.75
}

/// Generate `count` nested rings, each with `len` vertices.
///
/// Ring `k` has mean radius `10 (k + 1)` and a radial wobble of amplitude
/// `amplitude`. Neighbouring rings share most of their wobble, so their
/// features line up, the way that contour lines on a hillside do. As long as
/// `amplitude` is less than about 4, the rings don't cross.
pub fn nested_rings(count: usize, len: usize, amplitude: f64) -> IsolineStack {
    (0..count)
        .map(|k| {
            let phase = 0.1 * k as f64;
            Isoline::closed((0..len).map(|i| {
                let t = i as f64 * TAU / len as f64;
                let r = 10.0 * (k + 1) as f64 + amplitude * wobble(t, phase);
                Point::new(r * t.cos(), r * t.sin())
            }))
        })
        .collect()
}

/// Generate `count` roughly horizontal polylines, `spacing` apart, with `len`
/// vertices each.
///
/// The lines run from `x = 0` to `x = len - 1`, and their wobbles are
/// similar but not identical.
pub fn parallel_lines(count: usize, len: usize, spacing: f64, amplitude: f64) -> IsolineStack {
    (0..count)
        .map(|k| {
            let phase = 0.2 * k as f64;
            Isoline::open((0..len).map(|i| {
                let x = i as f64;
                let y = spacing * k as f64 + amplitude * wobble(x / 4.0, phase);
                Point::new(x, y)
            }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::polylines_meet;

    #[test]
    fn rings_are_nested() {
        let stack = nested_rings(4, 64, 3.0);
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.vertex_count(), 256);
        for pair in stack.isolines.windows(2) {
            let close = |iso: &Isoline| {
                let mut pts = iso.points.clone();
                pts.push(pts[0]);
                pts
            };
            assert!(!polylines_meet(&close(&pair[0]), &close(&pair[1])));
        }
    }

    #[test]
    fn lines_are_separate() {
        let stack = parallel_lines(3, 40, 5.0, 2.0);
        for pair in stack.isolines.windows(2) {
            assert!(!polylines_meet(&pair[0].points, &pair[1].points));
        }
    }
}
