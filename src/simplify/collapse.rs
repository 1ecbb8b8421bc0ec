//! Choosing where the vertices of a ladder go when it collapses.
//!
//! Collapsing the rung `b-c` of the quadruple `a-b-c-d` removes `b` and moves
//! `c` to a new point `n`. Keeping `n` on the quadruple's area-preserving
//! line keeps the area enclosed by the isoline unchanged. That leaves one
//! degree of freedom per rung, and we tie them together: all the new points
//! of a ladder lie on a common "harmony line", which we slide along a
//! sample line to find the placement that stays closest to the input.

use crate::{
    geom::{area_preserving_line, InfLine, Point},
    hausdorff::directed_hausdorff,
    isoline::IsolineStack,
};

use super::output::{CoordIdx, OutputMap};

/// The geometry of one collapsible rung.
struct Rung {
    b: CoordIdx,
    quad: [Point; 4],
    area_line: InfLine,
    /// The extent of the quadruple along its area-preserving line.
    slab: (Point, Point),
    /// The input geometry the quadruple stands for, padded with `a` and `d`.
    old: Vec<Point>,
}

impl Rung {
    /// Where the harmony line `harmony` puts the new point.
    fn placement(&self, harmony: &InfLine) -> Point {
        let n = self
            .area_line
            .intersect(harmony)
            .unwrap_or_else(|| self.area_line.closest_point(harmony.through));
        let (first, last) = self.slab;
        if self.area_line.is_ordered(n, first) {
            first
        } else if self.area_line.is_ordered(last, n) {
            last
        } else {
            n
        }
    }

    fn score(&self, n: Point) -> f64 {
        let [a, _, _, d] = self.quad;
        directed_hausdorff(&[a, n, d], &self.old)
    }
}

/// The outcome of a successful evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct Collapse {
    /// The new point for every collapsible rung.
    pub locations: Vec<(CoordIdx, Point)>,
    /// The largest directed Hausdorff distance over the rungs, at the chosen
    /// placement.
    pub hausdorff: f64,
}

/// The first and last of `pts` along `line`, after projecting them onto it.
fn extent(line: &InfLine, pts: impl IntoIterator<Item = Point>) -> Option<(Point, Point)> {
    let mut out: Option<(Point, Point)> = None;
    for p in pts {
        let p = line.closest_point(p);
        out = Some(match out {
            None => (p, p),
            Some((first, last)) => (
                if line.is_ordered(p, first) { p } else { first },
                if line.is_ordered(last, p) { p } else { last },
            ),
        });
    }
    out
}

/// Finds the best harmony-line placement for the collapsible rungs of a
/// ladder.
///
/// Returns `None` if no rung is collapsible, or if some quadruple is too
/// degenerate to have an area-preserving line.
pub fn evaluate(map: &OutputMap, input: &IsolineStack, rungs: &[CoordIdx], samples: usize) -> Option<Collapse> {
    let mut collapsible = Vec::new();
    for &b in rungs.iter().filter(|b| map.is_collapsible(**b)) {
        let quad = map.quadruple_points(b)?;
        let [a, pb, pc, d] = quad;
        let Some(area_line) = area_preserving_line(a, pb, pc, d) else {
            tracing::warn!(?b, "quadruple with coincident ends");
            return None;
        };
        let slab = extent(&area_line, quad)?;
        let mut old = vec![a];
        old.extend(map.represented_geometry(&input.isolines[map[b].isoline], b, true));
        old.push(d);
        collapsible.push(Rung {
            b,
            quad,
            area_line,
            slab,
            old,
        });
    }
    let (first_rung, last_rung) = (collapsible.first()?, collapsible.last()?);

    let sample_line = if collapsible.len() == 1 {
        first_rung.area_line
    } else {
        let halfway = |r: &Rung| r.quad[1].midpoint(r.quad[2]);
        let (start, end) = (halfway(first_rung), halfway(last_rung));
        match InfLine::through_points(start, end) {
            Some(l) => l.turned().with_through(start.midpoint(end)),
            None => first_rung.area_line,
        }
    };
    let harmony = sample_line.turned();

    let projected = collapsible.iter().flat_map(|r| {
        r.quad
            .iter()
            .map(|p| r.area_line.closest_point(*p))
            .collect::<Vec<_>>()
    });
    let (first, last) = extent(&sample_line, projected)?;

    let ladder_score = |h: &InfLine| {
        collapsible
            .iter()
            .map(|r| r.score(r.placement(h)))
            .fold(0.0, f64::max)
    };

    let dir = last - first;
    let samples = samples.max(1);
    let mut best: Option<(f64, InfLine)> = None;
    for i in 0..samples {
        let h = harmony.with_through(first + dir * (i as f64 / samples as f64));
        let score = ladder_score(&h);
        if best.as_ref().map_or(score.is_finite(), |(s, _)| score < *s) {
            best = Some((score, h));
        }
    }
    let (hausdorff, h) = best?;

    Some(Collapse {
        locations: collapsible.iter().map(|r| (r.b, r.placement(&h))).collect(),
        hausdorff,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{geom::signed_area, isoline::Isoline};

    fn run(stack: &IsolineStack, rung_vertices: &[(usize, usize)]) -> (OutputMap, Option<Collapse>) {
        let map = OutputMap::new(stack);
        let rungs: Vec<_> = rung_vertices
            .iter()
            .filter_map(|&(k, v)| map.initial(k, v))
            .collect();
        let c = evaluate(&map, stack, &rungs, 500);
        (map, c)
    }

    #[test]
    fn parallel_lines_slide_to_the_end() {
        let stack: IsolineStack = [0.0, 1.0]
            .iter()
            .map(|y| Isoline::open((0..4).map(|x| (x as f64, *y))))
            .collect();
        let (_, c) = run(&stack, &[(0, 1), (1, 1)]);
        let c = c.expect("contractible");
        // Every placement is exact, so the first sample wins.
        assert_eq!(c.hausdorff, 0.0);
        let points: Vec<_> = c.locations.iter().map(|(_, p)| *p).collect();
        assert!(points[0].distance(Point::new(3.0, 0.0)) < 1e-9);
        assert!(points[1].distance(Point::new(3.0, 1.0)) < 1e-9);
    }

    #[test]
    fn nothing_collapsible() {
        let stack: IsolineStack = [Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)])]
            .into_iter()
            .collect();
        assert!(run(&stack, &[(0, 0), (0, 1)]).1.is_none());
    }

    #[test]
    fn single_bump_stays_near_the_input() {
        let stack: IsolineStack = [Isoline::open([
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 1.0),
            (3.0, 0.0),
            (4.0, 0.0),
        ])]
        .into_iter()
        .collect();
        let (map, c) = run(&stack, &[(0, 1)]);
        let c = c.expect("contractible");
        let (b, n) = c.locations[0];
        let [a, pb, pc, d] = map.quadruple_points(b).expect("quadruple");
        let before = signed_area(&[a, pb, pc, d]);
        let after = signed_area(&[a, n, d]);
        assert!((before - after).abs() < 1e-9);
        assert!(c.hausdorff < 1.0);
    }

    proptest! {
        #[test]
        fn placements_preserve_area(
            ys in proptest::collection::vec(-2.0f64..2.0, 6),
            gap in 0.5f64..3.0,
        ) {
            let stack: IsolineStack = [0.0, gap]
                .iter()
                .map(|off| Isoline::open(ys.iter().enumerate().map(|(x, y)| (x as f64, y + off))))
                .collect();
            let map = OutputMap::new(&stack);
            let rungs: Vec<_> = [(0, 2), (1, 2)]
                .iter()
                .filter_map(|&(k, v)| map.initial(k, v))
                .collect();
            if let Some(c) = evaluate(&map, &stack, &rungs, 50) {
                for (b, n) in c.locations {
                    let [a, pb, pc, d] = map.quadruple_points(b).unwrap();
                    let before = signed_area(&[a, pb, pc, d]);
                    let after = signed_area(&[a, n, d]);
                    prop_assert!((before - after).abs() < 1e-6 * (1.0 + before.abs()));
                }
            }
        }
    }
}
