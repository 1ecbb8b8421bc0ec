//! Joint simplification of an aligned isoline stack.
//!
//! The [`Simplifier`] groups the edges of the stack into ladders and then
//! greedily collapses the cheapest ladder whose collapse doesn't introduce
//! crossings. Collapsing a ladder removes one vertex from every isoline it
//! touches (as long as that isoline has vertices to spare), so features that
//! line up across the stack disappear together.
//!
//! Each ladder caches its evaluation. A collapse only touches the
//! neighbourhood of the collapsed ladder, so it marks the neighbouring
//! ladders dirty and updates everyone else's crossing counts incrementally:
//! the segments it removes are "checked out" before the collapse, and the
//! new ones "checked in" afterwards.

use std::{cmp::Reverse, collections::BinaryHeap};

use crate::{align::Alignment, isoline::IsolineStack, num::CheapOrderedFloat, Error};

mod collapse;
mod ladder;
mod maintain;
mod output;
mod score;

pub use ladder::{causes_no_intersections, Ladder, LadderIdx, LadderVec};
pub use output::{CoordIdx, OutputCoord, OutputMap};
pub use score::{symmetric_difference, ScoreFunction};

use ladder::LadderBuilder;

/// Options for [`Simplifier`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimplifyConfig {
    /// Make every edge its own ladder, ignoring the alignment. This
    /// simplifies every isoline on its own.
    pub singleton_ladders: bool,
    /// Refuse collapses that would make the output cross itself.
    pub check_intersections: bool,
    /// Average the symmetric difference over the rungs of a ladder instead
    /// of summing it, so that long ladders aren't penalized.
    pub normalize: bool,
    /// How ladders are ranked.
    pub score: ScoreFunction,
    /// The number of placements tried when evaluating a ladder.
    pub samples: usize,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        SimplifyConfig {
            singleton_ladders: false,
            check_intersections: true,
            normalize: true,
            score: ScoreFunction::default(),
            samples: 500,
        }
    }
}

/// What a call to [`Simplifier::step`] did.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct AppliedCollapse {
    /// The collapsed ladder.
    pub ladder: LadderIdx,
    /// Its cost at the time of collapse.
    pub cost: f64,
    /// The number of vertices removed.
    pub removed: usize,
    /// The number of vertices left in the whole stack.
    pub vertex_count: usize,
}

type HeapEntry = Reverse<(CheapOrderedFloat, LadderIdx, u64)>;

/// Greedily simplifies an isoline stack.
pub struct Simplifier {
    input: IsolineStack,
    map: OutputMap,
    ladders: LadderVec<Ladder>,
    config: SimplifyConfig,
    vertex_count: usize,
    heap: BinaryHeap<HeapEntry>,
    dirty: Vec<LadderIdx>,
}

impl std::fmt::Debug for Simplifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simplifier")
            .field("vertex_count", &self.vertex_count)
            .field("ladders", &self.ladders.len())
            .field("candidates", &self.heap.len())
            .finish()
    }
}

impl Simplifier {
    /// Prepares to simplify `stack`, which must be the stack that
    /// `alignment` was computed for.
    ///
    /// This builds the ladders and evaluates all of them, so it does most of
    /// the work of the first step.
    pub fn new(stack: &IsolineStack, alignment: &Alignment, config: SimplifyConfig) -> Result<Simplifier, Error> {
        crate::check_finite(stack)?;
        debug_assert_eq!(alignment.isoline_count(), stack.len());

        let input = stack.clone();
        let mut map = OutputMap::new(&input);
        let builder = LadderBuilder::new(&input, alignment, &mut map);
        let ladders = if config.singleton_ladders {
            builder.singletons()
        } else {
            builder.build()
        };

        let mut ret = Simplifier {
            vertex_count: map.vertex_count(),
            dirty: ladders.indices().collect(),
            input,
            map,
            ladders,
            config,
            heap: BinaryHeap::new(),
        };
        ret.refresh();
        Ok(ret)
    }

    /// The current output.
    pub fn map(&self) -> &OutputMap {
        &self.map
    }

    /// The current output, as an isoline stack.
    pub fn output(&self) -> IsolineStack {
        self.map.to_stack()
    }

    /// The isolines being simplified.
    pub fn input(&self) -> &IsolineStack {
        &self.input
    }

    /// The total number of output vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Looks up a ladder.
    pub fn ladder(&self, idx: LadderIdx) -> &Ladder {
        &self.ladders[idx]
    }

    /// All ladders, including retired ones.
    pub fn ladders(&self) -> impl Iterator<Item = (LadderIdx, &Ladder)> + '_ {
        self.ladders.iter()
    }

    /// The number of live ladders that offer a collapse, feasible or not.
    pub fn contractible_count(&self) -> usize {
        self.ladders
            .iter()
            .filter(|(_, l)| !l.retired && l.contractible)
            .count()
    }

    /// The ladder that the next step will collapse.
    pub fn best_ladder(&self) -> Option<LadderIdx> {
        self.heap.peek().map(|Reverse((_, idx, _))| *idx)
    }

    fn is_current(&self, entry: &HeapEntry) -> bool {
        let Reverse((_, idx, generation)) = *entry;
        let l = &self.ladders[idx];
        !l.retired && !l.dirty && l.contractible && l.generation == generation && l.is_feasible()
    }

    /// Evaluates the dirty ladders and drops stale candidates from the top
    /// of the heap.
    fn refresh(&mut self) {
        while let Some(idx) = self.dirty.pop() {
            self.evaluate(idx);
        }
        while let Some(top) = self.heap.peek() {
            if self.is_current(top) {
                break;
            }
            self.heap.pop();
        }
    }

    fn evaluate(&mut self, idx: LadderIdx) {
        let ladder = &mut self.ladders[idx];
        if ladder.retired || !ladder.dirty {
            return;
        }
        for &b in &ladder.rungs {
            self.map[b].collapse = None;
        }
        ladder.dirty = false;

        let Some(result) = collapse::evaluate(&self.map, &self.input, &ladder.rungs, self.config.samples) else {
            return;
        };
        let cost = match self.config.score {
            ScoreFunction::Hausdorff => result.hausdorff,
            ScoreFunction::SymmetricDifference => {
                let total: f64 = result
                    .locations
                    .iter()
                    .filter_map(|&(b, n)| {
                        let [a, b, c, d] = self.map.quadruple_points(b)?;
                        Some(symmetric_difference(a, b, c, d, n))
                    })
                    .sum();
                if self.config.normalize {
                    total / result.locations.len() as f64
                } else {
                    total
                }
            }
        };
        if !cost.is_finite() {
            tracing::warn!(?idx, cost, "ladder with non-finite cost");
            return;
        }

        for &(b, n) in &result.locations {
            self.map[b].collapse = Some(n);
        }
        ladder.contractible = true;
        ladder.cost = cost;
        if self.config.check_intersections {
            ladder.compute_intersections(&self.map);
        }
        if ladder.is_feasible() {
            self.heap.push(Reverse((cost.into(), idx, ladder.generation)));
        }
    }

    /// Adds `inc` to the crossing counts of every clean, contractible ladder
    /// for the map segment starting at `seg`.
    fn check_segment(&mut self, seg: CoordIdx, inc: i64) {
        if !self.config.check_intersections {
            return;
        }
        for (idx, ladder) in self.ladders.iter_mut() {
            if ladder.retired || ladder.dirty || !ladder.contractible {
                continue;
            }
            let before = ladder.intersection_count;
            ladder.check(&self.map, seg, inc);
            if before != 0 && ladder.is_feasible() {
                self.heap
                    .push(Reverse((ladder.cost.into(), idx, ladder.generation)));
            }
        }
    }

    fn mark_dirty(&mut self, c: Option<CoordIdx>) {
        if let Some(idx) = c.and_then(|c| self.map[c].ladder) {
            let ladder = &mut self.ladders[idx];
            if !ladder.retired && !ladder.dirty {
                ladder.set_dirty();
                self.dirty.push(idx);
            }
        }
    }

    /// Collapses the cheapest feasible ladder.
    ///
    /// Returns `None`, and does nothing, if there is no such ladder.
    pub fn step(&mut self) -> Option<AppliedCollapse> {
        self.refresh();
        let Reverse((cost, best, _)) = self.heap.pop()?;
        let cost = cost.into_inner();

        #[cfg(feature = "slow-asserts")]
        if self.config.check_intersections {
            assert!(causes_no_intersections(&self.map, &self.ladders[best]));
        }

        self.ladders[best].retired = true;
        let rungs = self.ladders[best].rungs.clone();
        let pinches = self.ladders[best].pinches;

        let mut removed = 0;
        // For each rung, the vertex that now stands in for it: itself if it
        // survived, otherwise the vertex it collapsed onto.
        let mut survivors = Vec::with_capacity(rungs.len());
        let mut shrunk = Vec::new();
        for &b in &rungs {
            let collapse = self.map[b].collapse.filter(|_| self.map.is_collapsible(b));
            let (Some(n), Some([a, _, c, d])) = (collapse, self.map.quadruple(b)) else {
                survivors.push((b, false));
                continue;
            };

            for seg in [a, b, c] {
                self.check_segment(seg, -1);
            }
            let k = self.map[b].isoline;
            maintain::update_ranges(&mut self.map, &self.input.isolines[k], b, n);
            self.mark_dirty(self.map.cyclic_prev(a));
            for v in [a, c, d] {
                self.mark_dirty(Some(v));
            }
            self.map[c].location = n;
            self.map[c].collapse = None;
            self.map.remove(b);
            for seg in [a, c] {
                self.check_segment(seg, 1);
            }

            removed += 1;
            survivors.push((c, true));
            if self.map.isoline_len(k) <= 3 {
                shrunk.push(k);
            }
        }

        // Isolines that got too short have nothing left to collapse.
        for k in shrunk {
            let vertices: Vec<_> = self.map.vertices(k).collect();
            for v in vertices {
                self.mark_dirty(Some(v));
            }
        }

        self.regroup(&survivors, pinches);
        self.vertex_count -= removed;

        #[cfg(feature = "slow-asserts")]
        assert!(self.map.check_ranges(&self.input));

        tracing::debug!(
            ladder = ?best,
            cost,
            removed,
            vertex_count = self.vertex_count,
            "collapsed ladder"
        );

        self.refresh();
        Some(AppliedCollapse {
            ladder: best,
            cost,
            removed,
            vertex_count: self.vertex_count,
        })
    }

    /// Puts the rungs of a collapsed ladder that weren't collapsed into new
    /// ladders, one for each run of consecutive surviving rungs.
    ///
    /// Each run is anchored below and above by the nearest vertex that a
    /// neighbouring rung collapsed onto, or by the old ladder's pinch.
    fn regroup(&mut self, survivors: &[(CoordIdx, bool)], pinches: [Option<CoordIdx>; 2]) {
        let mut start = 0;
        while start < survivors.len() {
            if survivors[start].1 {
                start += 1;
                continue;
            }
            let mut end = start;
            while end < survivors.len() && !survivors[end].1 {
                end += 1;
            }

            let below = match start.checked_sub(1) {
                Some(i) => Some(survivors[i].0),
                None => pinches[0],
            };
            let above = survivors.get(end).map_or(pinches[1], |(c, _)| Some(*c));
            let rungs: Vec<_> = survivors[start..end].iter().map(|(c, _)| *c).collect();
            let idx = self.ladders.push(Ladder::new(rungs, [below, above]));
            for &(c, _) in &survivors[start..end] {
                self.map[c].ladder = Some(idx);
            }
            self.dirty.push(idx);
            start = end;
        }
    }

    /// Collapses ladders until at most `target` vertices remain, or until
    /// there's nothing left to collapse. Returns the number of collapses.
    pub fn run_until(&mut self, target: usize) -> usize {
        let mut steps = 0;
        while self.vertex_count > target {
            if self.step().is_none() {
                break;
            }
            steps += 1;
        }
        steps
    }

    /// Draws the output map, highlighting the next ladder to collapse.
    #[cfg(feature = "debug-svg")]
    pub fn dump_svg(&self) -> svg::Document {
        use svg::node::element::{path::Data, Circle, Path};

        let bbox = self.input.bounding_box().unwrap_or_default();
        let pad = 0.05 * bbox.width().max(bbox.height()).max(1.0);
        let stroke_width = pad / 20.0;
        let mut document = svg::Document::new().set(
            "viewBox",
            (
                bbox.x0 - pad,
                bbox.y0 - pad,
                bbox.width() + 2.0 * pad,
                bbox.height() + 2.0 * pad,
            ),
        );

        for k in 0..self.map.isoline_count() {
            let mut points = self.map.points(k).into_iter();
            let Some(p) = points.next() else {
                continue;
            };
            let mut data = Data::new().move_to((p.x, p.y));
            for p in points {
                data = data.line_to((p.x, p.y));
            }
            if self.map.is_cyclic(k) {
                data = data.close();
            }
            let path = Path::new()
                .set("stroke", "black")
                .set("stroke-width", stroke_width)
                .set("stroke-linejoin", "round")
                .set("fill", "none")
                .set("d", data);
            document = document.add(path);
        }

        if let Some(best) = self.best_ladder() {
            for &b in &self.ladders[best].rungs {
                let Some(c) = self.map.cyclic_next(b) else {
                    continue;
                };
                let (p, q) = (self.map[b].location, self.map[c].location);
                let rung = Path::new()
                    .set("stroke", "#AE2012")
                    .set("stroke-width", 3.0 * stroke_width)
                    .set("d", Data::new().move_to((p.x, p.y)).line_to((q.x, q.y)));
                document = document.add(rung);
                if let Some(n) = self.map[b].collapse {
                    let dot = Circle::new()
                        .set("cx", n.x)
                        .set("cy", n.y)
                        .set("r", 2.0 * stroke_width)
                        .set("fill", "#0A9396");
                    document = document.add(dot);
                }
            }
        }
        document
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::{
        align::{align_stack, AlignConfig},
        geom::{segments_meet, signed_area, Point},
        isoline::Isoline,
    };

    fn simplifier(stack: &IsolineStack, config: SimplifyConfig) -> Simplifier {
        let al = align_stack(stack, &AlignConfig::default());
        Simplifier::new(stack, &al, config).unwrap()
    }

    fn lines(ys: &[f64], n: usize) -> IsolineStack {
        ys.iter()
            .map(|y| Isoline::open((0..n).map(|x| (x as f64, *y))))
            .collect()
    }

    #[test]
    fn parallel_lines_bottom_out() {
        let stack = lines(&[0.0, 1.0], 4);
        let mut s = simplifier(&stack, SimplifyConfig::default());
        assert_eq!(s.vertex_count(), 8);
        assert_eq!(s.contractible_count(), 1);

        let applied = s.step().unwrap();
        assert_eq!(applied.removed, 2);
        assert_eq!(applied.vertex_count, 6);
        assert!(s.map().check_ranges(s.input()));
        assert_eq!(s.contractible_count(), 0);
        assert!(s.step().is_none());

        let out = s.output();
        for (k, iso) in out.isolines.iter().enumerate() {
            let y = k as f64;
            // The middle vertex slid all the way onto the end.
            assert_eq!(iso.points, vec![Point::new(0.0, y), Point::new(3.0, y), Point::new(3.0, y)]);
        }
    }

    #[test]
    fn run_until_current_count_does_nothing() {
        let stack = lines(&[0.0, 1.0, 2.5], 7);
        let mut s = simplifier(&stack, SimplifyConfig::default());
        let n = s.vertex_count();
        assert_eq!(s.run_until(n), 0);
        assert_eq!(s.output(), stack);
    }

    #[test]
    fn ring_keeps_its_area() {
        let ring = Isoline::closed((0..12).map(|i| {
            let t = i as f64 * std::f64::consts::TAU / 12.0;
            let r = if i % 2 == 0 { 10.0 } else { 9.0 };
            (r * t.cos(), r * t.sin())
        }));
        let stack = IsolineStack::new(vec![ring.clone()]);
        let mut s = simplifier(&stack, SimplifyConfig::default());
        let steps = s.run_until(6);
        assert!(steps > 0);
        assert!(s.vertex_count() >= 3);
        assert!(s.map().check_ranges(s.input()));
        let before = signed_area(&ring.points);
        let after = signed_area(&s.output().isolines[0].points);
        assert!((before - after).abs() < 1e-6 * before.abs());
    }

    #[test]
    fn singletons_simplify_each_line_alone() {
        let stack = lines(&[0.0, 1.0], 6);
        let config = SimplifyConfig {
            singleton_ladders: true,
            ..SimplifyConfig::default()
        };
        let mut s = simplifier(&stack, config);
        let applied = s.step().unwrap();
        assert_eq!(applied.removed, 1);
        assert_eq!(s.vertex_count(), 11);
    }

    /// The edges of each isoline, with runs of coincident vertices merged.
    fn edges(stack: &IsolineStack) -> Vec<(bool, Vec<(Point, Point)>)> {
        stack
            .isolines
            .iter()
            .map(|iso| {
                let mut pts: Vec<Point> = Vec::new();
                for &p in &iso.points {
                    if pts.last().map_or(true, |q| q.distance(p) > crate::num::EPS) {
                        pts.push(p);
                    }
                }
                let closed = iso.cyclic && pts.len() > 2;
                if closed && pts[0].distance(pts[pts.len() - 1]) <= crate::num::EPS {
                    pts.pop();
                }
                if closed {
                    pts.push(pts[0]);
                }
                (closed, pts.windows(2).map(|w| (w[0], w[1])).collect())
            })
            .collect()
    }

    /// Do any two isolines meet, or does any isoline meet itself away from
    /// its shared vertices?
    fn has_crossings(stack: &IsolineStack) -> bool {
        let edges = edges(stack);
        let between = edges.iter().enumerate().any(|(k, (_, e))| {
            edges[k + 1..].iter().any(|(_, f)| {
                e.iter()
                    .any(|&(p, q)| f.iter().any(|&(r, t)| segments_meet(p, q, r, t)))
            })
        });
        let within = edges.iter().any(|(closed, e)| {
            let n = e.len();
            (0..n).any(|i| {
                (i + 2..n).any(|j| {
                    let adjacent = *closed && i == 0 && j == n - 1;
                    !adjacent && segments_meet(e[i].0, e[i].1, e[j].0, e[j].1)
                })
            })
        });
        between || within
    }

    #[test]
    fn every_step_keeps_the_invariants() {
        arbtest::arbtest(|u| {
            let stack = crate::arbitrary::isoline_stack(u, 12)?;
            let config = SimplifyConfig {
                samples: 20,
                ..SimplifyConfig::default()
            };
            let input_crosses = has_crossings(&stack);
            let mut s = simplifier(&stack, config);
            let areas: Vec<_> = stack.isolines.iter().map(|iso| signed_area(&iso.points)).collect();
            while let Some(best) = s.best_ladder() {
                let ladder = s.ladder(best);
                let first = causes_no_intersections(s.map(), ladder);
                assert!(first);
                assert_eq!(first, causes_no_intersections(s.map(), ladder));

                assert!(s.step().is_some());
                assert!(s.map().check_ranges(s.input()));
                assert_eq!(s.vertex_count(), s.map().vertex_count());
                if !input_crosses {
                    assert!(!has_crossings(&s.output()));
                }
            }
            for (k, iso) in s.output().isolines.iter().enumerate() {
                if iso.cyclic {
                    let after = signed_area(&iso.points);
                    assert!((areas[k] - after).abs() <= 1e-6 * (1.0 + areas[k].abs()));
                }
            }
            Ok(())
        })
        .budget_ms(5_000);
    }

    #[test]
    fn crossing_detection() {
        let square = |r: f64| Isoline::closed([(-r, -r), (r, -r), (r, r), (-r, r)]);
        assert!(!has_crossings(&IsolineStack::new(vec![square(1.0), square(2.0)])));
        assert!(has_crossings(&IsolineStack::new(vec![
            square(1.0),
            Isoline::open([(0.0, 0.0), (3.0, 0.0)]),
        ])));

        let bowtie = Isoline::closed([(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0)]);
        assert!(has_crossings(&IsolineStack::new(vec![bowtie])));
        // A vertex that slid onto its neighbour doesn't count.
        let slid = Isoline::open([(0.0, 0.0), (3.0, 0.0), (3.0, 0.0)]);
        assert!(!has_crossings(&IsolineStack::new(vec![slid])));
    }

    #[test]
    fn rejects_nan() {
        let stack = IsolineStack::new(vec![Isoline::open([(0.0, 0.0), (f64::NAN, 1.0)])]);
        let al = Alignment::default();
        assert_matches!(
            Simplifier::new(&stack, &al, SimplifyConfig::default()),
            Err(Error::NaN)
        );
    }
}
