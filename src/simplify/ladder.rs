//! Ladders: chains of corresponding edges across the isoline stack.
//!
//! A ladder has at most one edge ("rung") per isoline, ordered by layer.
//! Rungs are identified by the output vertex the edge starts at.

use crate::{
    align::{Alignment, MatchInterval},
    geom::{polylines_meet, segments_meet, Point},
    isoline::{Isoline, IsolineStack},
};

use super::output::{CoordIdx, OutputMap};

impl_typed_vec!(
    /// All ladders ever created. Collapsed ladders are retired, not removed.
    LadderVec,
    /// A handle to a ladder.
    LadderIdx,
    "l"
);

/// A chain of corresponding edges, and the cached state of its evaluation.
#[derive(Clone, Debug, serde::Serialize)]
pub struct Ladder {
    /// The starting vertices of the edges, by ascending layer.
    pub rungs: Vec<CoordIdx>,
    /// The vertices where the chain stopped because the matched vertices on
    /// the next layer coincided: one below the first rung, one above the
    /// last.
    pub pinches: [Option<CoordIdx>; 2],
    pub(crate) dirty: bool,
    pub(crate) retired: bool,
    pub(crate) contractible: bool,
    pub(crate) cost: f64,
    pub(crate) self_intersects: bool,
    pub(crate) intersection_count: i64,
    pub(crate) generation: u64,
}

impl Ladder {
    pub(crate) fn new(rungs: Vec<CoordIdx>, pinches: [Option<CoordIdx>; 2]) -> Self {
        Ladder {
            rungs,
            pinches,
            dirty: true,
            retired: false,
            contractible: false,
            cost: f64::NAN,
            self_intersects: false,
            intersection_count: 0,
            generation: 0,
        }
    }

    /// Forgets the evaluation.
    pub(crate) fn set_dirty(&mut self) {
        self.dirty = true;
        self.contractible = false;
        self.cost = f64::NAN;
        self.self_intersects = false;
        self.intersection_count = 0;
        self.generation += 1;
    }

    /// Does this ladder need to be evaluated again?
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Has this ladder been collapsed?
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Does this ladder have a collapse to offer?
    pub fn is_contractible(&self) -> bool {
        self.contractible
    }

    /// The cost of collapsing, if contractible.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Could this ladder be collapsed without creating crossings?
    pub fn is_feasible(&self) -> bool {
        self.intersection_count == 0 && !self.self_intersects
    }

    /// The number of map segments crossed by this ladder's replacements.
    pub fn intersection_count(&self) -> i64 {
        self.intersection_count
    }

    /// Adds `inc` for every replacement segment of this ladder that the map
    /// segment starting at `other` crosses.
    ///
    /// Segments touching the rungs being replaced are skipped, as are
    /// crossings at shared endpoints.
    pub(crate) fn check(&mut self, map: &OutputMap, other: CoordIdx, inc: i64) {
        let Some(other_next) = map.cyclic_next(other) else {
            return;
        };
        for &b in &self.rungs {
            if other == b || Some(other) == map.cyclic_prev(b) || Some(other) == map.cyclic_next(b) {
                return;
            }
        }

        let (p, q) = (map[other].location, map[other_next].location);
        for &b in &self.rungs {
            if !map.is_collapsible(b) {
                continue;
            }
            let (Some([a, _, _, d]), Some(n)) = (map.quadruple(b), map[b].collapse) else {
                continue;
            };
            if other != a && other_next != a && segments_meet(map[a].location, n, p, q) {
                self.intersection_count += inc;
            }
            if other != d && other_next != d && segments_meet(n, map[d].location, p, q) {
                self.intersection_count += inc;
            }
        }
    }

    /// Does any rung's new geometry cross another rung's geometry?
    ///
    /// The incremental count skips every map segment next to a rung, so
    /// rungs that stay put are compared here using their current `a-b-c-d`
    /// polyline.
    pub(crate) fn compute_self_intersection(&mut self, map: &OutputMap) {
        self.self_intersects = rungs_meet(&rung_polylines(map, &self.rungs));
    }

    /// Recounts the crossings with every segment of the map.
    pub(crate) fn compute_intersections(&mut self, map: &OutputMap) {
        self.compute_self_intersection(map);
        self.intersection_count = 0;
        for c in map.all_vertices() {
            self.check(map, c, 1);
        }
    }
}

/// The polyline each rung will have after collapsing: `a-n-d` for rungs
/// that collapse (flagged `true`), the current `a-b-c-d` for the others.
fn rung_polylines(map: &OutputMap, rungs: &[CoordIdx]) -> Vec<(bool, Vec<Point>)> {
    rungs
        .iter()
        .map(|&b| match (map.quadruple(b), map[b].collapse) {
            (Some([a, _, _, d]), Some(n)) if map.is_collapsible(b) => {
                (true, vec![map[a].location, n, map[d].location])
            }
            _ => (false, current_geometry(map, b)),
        })
        .collect()
}

/// The output polyline around the edge starting at `b`, as far as it exists.
fn current_geometry(map: &OutputMap, b: CoordIdx) -> Vec<Point> {
    let c = map.cyclic_next(b);
    let mut pts = Vec::with_capacity(4);
    pts.extend(map.cyclic_prev(b).map(|a| map[a].location));
    pts.push(map[b].location);
    pts.extend(c.map(|c| map[c].location));
    pts.extend(c.and_then(|c| map.cyclic_next(c)).map(|d| map[d].location));
    pts
}

/// Do two rungs meet, where at least one of them moves?
fn rungs_meet(polys: &[(bool, Vec<Point>)]) -> bool {
    polys.iter().enumerate().any(|(i, (moved, r))| {
        polys[i + 1..]
            .iter()
            .any(|(other_moved, s)| (*moved || *other_moved) && polylines_meet(r, s))
    })
}

/// Checks by brute force whether collapsing `ladder` would create a
/// crossing.
///
/// This looks at every segment of the map, skipping the ones next to the
/// ladder's rungs, and ignores crossings at shared endpoints. The skipped
/// segments are compared rung against rung.
pub fn causes_no_intersections(map: &OutputMap, ladder: &Ladder) -> bool {
    let in_ladder = |c: Option<CoordIdx>| c.is_some_and(|c| ladder.rungs.contains(&c));
    let polys = rung_polylines(map, &ladder.rungs);
    let reps = ladder.rungs.iter().zip(&polys).filter(|(_, (moved, _))| *moved);

    for (&b, (_, rep)) in reps {
        let Some([a, _, _, d]) = map.quadruple(b) else {
            continue;
        };
        for nn in map.all_vertices() {
            let Some(next) = map.cyclic_next(nn) else {
                continue;
            };
            if in_ladder(Some(next)) || in_ladder(Some(nn)) || in_ladder(map.cyclic_prev(nn)) {
                continue;
            }
            let (p, q) = (map[nn].location, map[next].location);
            let hit = (next != a && segments_meet(rep[0], rep[1], p, q))
                || (nn != d && segments_meet(rep[1], rep[2], p, q));
            if hit {
                return false;
            }
        }
    }

    !rungs_meet(&polys)
}

/// Where a chain of rungs stopped.
enum Continuation {
    /// The next rung starts at this vertex.
    Rung(CoordIdx),
    /// The matched vertices coincide at this vertex.
    Pinch(CoordIdx),
    Stop,
}

/// Groups the edges of a freshly created output map into ladders.
pub struct LadderBuilder<'a> {
    input: &'a IsolineStack,
    alignment: &'a Alignment,
    map: &'a mut OutputMap,
}

impl<'a> LadderBuilder<'a> {
    /// Prepares to build ladders for `map`, which must not have had any
    /// vertices removed.
    pub fn new(input: &'a IsolineStack, alignment: &'a Alignment, map: &'a mut OutputMap) -> Self {
        LadderBuilder {
            input,
            alignment,
            map,
        }
    }

    /// Makes every edge its own ladder.
    pub fn singletons(mut self) -> LadderVec<Ladder> {
        let mut ladders = LadderVec::default();
        let starts: Vec<_> = self.map.all_vertices().collect();
        for c in starts {
            if self.map.cyclic_next(c).is_some() {
                let idx = ladders.push(Ladder::new(vec![c], [None, None]));
                self.map[c].ladder = Some(idx);
            }
        }
        ladders
    }

    /// Chains edges into ladders by following the match intervals up and
    /// down the stack.
    pub fn build(mut self) -> LadderVec<Ladder> {
        let mut ladders = LadderVec::default();
        let starts: Vec<_> = self.map.all_vertices().collect();
        for c in starts {
            if self.map[c].ladder.is_some() || self.map.cyclic_next(c).is_none() {
                continue;
            }
            let idx = LadderIdx(ladders.len());
            self.map[c].ladder = Some(idx);
            let (mut below, bottom) = self.walk(idx, c, false);
            let (above, top) = self.walk(idx, c, true);
            below.reverse();
            below.push(c);
            below.extend(above);
            ladders.push(Ladder::new(below, [bottom, top]));
        }

        {
            let lengths = ladders.iter().map(|(_, l)| l.rungs.len());
            tracing::debug!(
                ladders = ladders.len(),
                longest = lengths.max().unwrap_or(0),
                "built ladders"
            );
        }
        ladders
    }

    /// Follows the chain from the edge at `start` in one direction, claiming
    /// the edges it passes for ladder `idx`.
    fn walk(&mut self, idx: LadderIdx, start: CoordIdx, upward: bool) -> (Vec<CoordIdx>, Option<CoordIdx>) {
        let mut rungs = Vec::new();
        let mut cur = start;
        loop {
            match self.continuation(cur, upward) {
                Continuation::Rung(next) if self.map[next].ladder.is_none() => {
                    self.map[next].ladder = Some(idx);
                    rungs.push(next);
                    cur = next;
                }
                Continuation::Pinch(p) => return (rungs, Some(p)),
                _ => return (rungs, None),
            }
        }
    }

    fn continuation(&self, b: CoordIdx, upward: bool) -> Continuation {
        let k = self.map[b].isoline;
        let target = if upward {
            k + 1
        } else if let Some(t) = k.checked_sub(1) {
            t
        } else {
            return Continuation::Stop;
        };
        let (Some(target_iso), Some(c)) = (self.input.isolines.get(target), self.map.cyclic_next(b)) else {
            return Continuation::Stop;
        };
        let vb = self.map[b].represents_from;
        let vc = self.map[c].represents_from;
        let vertex = |v: usize| self.map.initial(target, v);

        let mut pinch = None;
        for mi in self.alignment.intervals_towards(k, vb, target) {
            for next_mi in self.alignment.intervals_towards(k, vc, target) {
                match step_between(target_iso, mi, next_mi) {
                    Some(Step::Edge(v)) => {
                        if let Some(r) = vertex(v) {
                            return Continuation::Rung(r);
                        }
                    }
                    Some(Step::Same(v)) => pinch = pinch.or(vertex(v)),
                    None => {}
                }
            }
        }
        pinch.map_or(Continuation::Stop, Continuation::Pinch)
    }
}

enum Step {
    /// The edge starting at this vertex continues the rung.
    Edge(usize),
    /// Both ends of the rung are matched to this vertex.
    Same(usize),
}

fn step_between(iso: &Isoline, mi: &MatchInterval, next_mi: &MatchInterval) -> Option<Step> {
    if iso.next(mi.last) == Some(next_mi.first) {
        Some(Step::Edge(mi.last))
    } else if iso.prev(mi.first) == Some(next_mi.last) {
        Some(Step::Edge(next_mi.last))
    } else if mi.last == next_mi.first || mi.first == next_mi.last {
        Some(Step::Same(if mi.last == next_mi.first {
            mi.last
        } else {
            mi.first
        }))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::{align_stack, AlignConfig};

    fn lines(ys: &[f64], n: usize) -> IsolineStack {
        ys.iter()
            .map(|y| Isoline::open((0..n).map(|x| (x as f64, *y))))
            .collect()
    }

    #[test]
    fn parallel_lines_make_vertical_ladders() {
        let input = lines(&[0.0, 1.0, 2.0], 4);
        let al = align_stack(&input, &AlignConfig::default());
        let mut map = OutputMap::new(&input);
        let ladders = LadderBuilder::new(&input, &al, &mut map).build();
        assert_eq!(ladders.len(), 3);
        for (_, l) in ladders.iter() {
            let layers: Vec<_> = l.rungs.iter().map(|c| map[*c].isoline).collect();
            assert_eq!(layers, vec![0, 1, 2]);
            let starts: Vec<_> = l.rungs.iter().map(|c| map[*c].represents_from).collect();
            assert!(starts.iter().all(|s| *s == starts[0]));
        }
        // Every edge is owned, and the last vertices own nothing.
        for k in 0..3 {
            let owned: Vec<_> = map.vertices(k).map(|c| map[c].ladder.is_some()).collect();
            assert_eq!(owned, vec![true, true, true, false]);
        }
    }

    #[test]
    fn pinch_where_matches_coincide() {
        // The upper line has a single vertex over both ends of the lower
        // middle edge.
        let input = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (1.2, 0.0), (2.4, 0.0)]),
            Isoline::open([(0.0, 1.0), (1.1, 1.0), (2.4, 1.0)]),
        ]);
        let al = align_stack(&input, &AlignConfig::default());
        let mut map = OutputMap::new(&input);
        let ladders = LadderBuilder::new(&input, &al, &mut map).build();
        let lower: Vec<_> = map.vertices(0).collect();
        let upper: Vec<_> = map.vertices(1).collect();
        let middle = map[lower[1]].ladder.expect("owned");
        assert_eq!(ladders[middle].rungs, vec![lower[1]]);
        assert_eq!(ladders[middle].pinches, [None, Some(upper[1])]);
    }

    #[test]
    fn singletons() {
        let input = lines(&[0.0, 1.0], 3);
        let al = align_stack(&input, &AlignConfig::default());
        let mut map = OutputMap::new(&input);
        let ladders = LadderBuilder::new(&input, &al, &mut map).singletons();
        assert_eq!(ladders.len(), 4);
        assert!(ladders.iter().all(|(_, l)| l.rungs.len() == 1));
    }

    #[test]
    fn crossing_counts() {
        // A collapse on the lower line whose replacement pokes through the
        // upper line.
        let input = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]),
            Isoline::open([(0.0, 1.0), (4.0, 1.0)]),
        ]);
        let mut map = OutputMap::new(&input);
        let lower: Vec<_> = map.vertices(0).collect();
        let upper: Vec<_> = map.vertices(1).collect();
        map[lower[1]].collapse = Some(Point::new(1.5, 2.0));
        let mut ladder = Ladder::new(vec![lower[1]], [None, None]);
        ladder.compute_intersections(&map);
        assert_eq!(ladder.intersection_count(), 2);
        assert!(!ladder.is_feasible());
        assert!(!causes_no_intersections(&map, &ladder));

        ladder.check(&map, upper[0], -1);
        assert!(ladder.is_feasible());

        map[lower[1]].collapse = Some(Point::new(1.5, 0.5));
        ladder.compute_intersections(&map);
        assert!(ladder.is_feasible());
        assert!(causes_no_intersections(&map, &ladder));
        assert!(causes_no_intersections(&map, &ladder));
    }

    #[test]
    fn rung_that_stays_put_blocks_a_collapse() {
        // The upper rung is too short to collapse, so its edge is skipped by
        // the crossing count; the lower replacement still goes through it.
        let input = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]),
            Isoline::open([(0.0, 1.0), (4.0, 1.0)]),
        ]);
        let mut map = OutputMap::new(&input);
        let lower: Vec<_> = map.vertices(0).collect();
        let upper: Vec<_> = map.vertices(1).collect();
        assert!(!map.is_collapsible(upper[0]));
        map[lower[1]].collapse = Some(Point::new(1.5, 2.0));

        let mut ladder = Ladder::new(vec![lower[1], upper[0]], [None, None]);
        ladder.compute_intersections(&map);
        assert_eq!(ladder.intersection_count(), 0);
        assert!(!ladder.is_feasible());
        assert!(!causes_no_intersections(&map, &ladder));

        map[lower[1]].collapse = Some(Point::new(1.5, 0.5));
        ladder.compute_intersections(&map);
        assert!(ladder.is_feasible());
        assert!(causes_no_intersections(&map, &ladder));
    }
}
