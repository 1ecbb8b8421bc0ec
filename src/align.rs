//! Aligning neighbouring isolines.
//!
//! Every pair of consecutive isolines in a stack gets a monotone matching
//! between their vertices. From the matching, every vertex learns which
//! vertices of the neighbouring isolines it corresponds to, as a list of
//! [`MatchInterval`]s. Those intervals are what the simplifier uses to
//! chain edges into ladders.

use crate::{
    distance::{CostMatrix, Metric},
    geom::Point,
    isoline::{Isoline, IsolineStack},
};

pub mod carve;
mod dtw;
pub mod matching;
#[cfg(any(test, feature = "arbitrary"))]
pub mod reference;
pub mod solver;

pub use matching::{Match, Matching};
pub use solver::{solve, SolutionTree};

/// Thresholds for dropping matched pairs that are too far apart.
///
/// A matched pair is dropped if its cost exceeds any of the thresholds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatchFilters {
    /// Relative to the bottleneck cost of the matching.
    pub max_filter: f64,
    /// Relative to the diagonal of the bounding box of the whole stack.
    pub abs_filter: f64,
    /// Relative to the straight-line distance between the two vertices.
    pub max_detour: f64,
}

impl Default for MatchFilters {
    fn default() -> Self {
        MatchFilters {
            max_filter: 1.0,
            abs_filter: 1.0,
            max_detour: 1.0,
        }
    }
}

/// The algorithm used to match two polylines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AlignMethod {
    /// The locally correct bottleneck matching.
    #[default]
    Lcfm,
    /// Dynamic time warping, with every match interval widened by `splash`
    /// vertices on both sides.
    Dtw {
        /// How far to widen the match intervals.
        splash: usize,
    },
}

/// Parameters for [`crate::align`].
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// How to measure matching costs.
    pub metric: Metric,
    /// Also try matching against the reversed upper isoline, keeping the
    /// orientation with the smaller bottleneck.
    pub test_reverse: bool,
    /// If set, drop matched pairs that are too expensive.
    pub filters: Option<MatchFilters>,
    /// Check every matching for local correctness. This costs the length of
    /// the matching times the area of its cost matrix, so leave it off for
    /// long isolines.
    pub verify: bool,
    /// The matching algorithm.
    pub method: AlignMethod,
}

/// A contiguous run of vertices on a neighbouring isoline.
///
/// The run goes from `first` to `last` in the isoline's own order, wrapping
/// around if the isoline is cyclic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct MatchInterval {
    /// The isoline that the matched vertices belong to.
    pub isoline: usize,
    /// The first matched vertex.
    pub first: usize,
    /// The last matched vertex.
    pub last: usize,
}

/// The matching between two consecutive isolines.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PairAlignment {
    /// The index of the lower isoline.
    pub lower: usize,
    /// The index of the upper isoline.
    pub upper: usize,
    /// The matching between the carved polylines.
    pub matching: Matching,
    /// Whether the upper isoline was matched in reverse.
    pub reversed: bool,
}

/// The result of aligning a whole stack.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Alignment {
    intervals: Vec<Vec<Vec<MatchInterval>>>,
    pairs: Vec<PairAlignment>,
}

impl Alignment {
    /// The match intervals of a vertex, towards both neighbouring isolines.
    pub fn intervals(&self, isoline: usize, vertex: usize) -> &[MatchInterval] {
        self.intervals
            .get(isoline)
            .and_then(|iso| iso.get(vertex))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The match intervals of a vertex towards one neighbouring isoline.
    pub fn intervals_towards(
        &self,
        isoline: usize,
        vertex: usize,
        other: usize,
    ) -> impl Iterator<Item = &MatchInterval> + '_ {
        self.intervals(isoline, vertex)
            .iter()
            .filter(move |mi| mi.isoline == other)
    }

    /// The matchings of all consecutive pairs, from the bottom of the stack.
    pub fn pairs(&self) -> &[PairAlignment] {
        &self.pairs
    }

    /// The number of isolines this alignment was computed for.
    pub fn isoline_count(&self) -> usize {
        self.intervals.len()
    }
}

/// A vertex position during the walk along a matching.
#[derive(Clone, Copy, Debug)]
struct Cursor {
    isoline: usize,
    vertex: usize,
    reversed: bool,
}

/// Walks one isoline along a matching, collecting the match intervals of its
/// vertices.
struct Walk<'a> {
    iso: &'a Isoline,
    cursor: Cursor,
    /// The matching index that `cursor` corresponds to.
    prev: Option<usize>,
    /// The interval opened at the very first vertex.
    init: Option<(usize, usize)>,
    /// The interval currently being extended, as (vertex, position).
    current: Option<(usize, usize)>,
    out: Vec<Vec<MatchInterval>>,
}

impl<'a> Walk<'a> {
    fn new(iso: &'a Isoline, isoline: usize, start: usize, reversed: bool) -> Self {
        Walk {
            iso,
            cursor: Cursor {
                isoline,
                vertex: start,
                reversed,
            },
            prev: None,
            init: None,
            current: None,
            out: vec![Vec::new(); iso.len()],
        }
    }

    /// Moves to the vertex for matching index `idx`, returning whether we
    /// actually moved.
    fn shift(&mut self, idx: usize) -> bool {
        match self.prev {
            Some(p) if p == idx => false,
            None => {
                self.prev = Some(idx);
                true
            }
            Some(_) => {
                let n = self.iso.len();
                self.cursor.vertex = if self.cursor.reversed {
                    (self.cursor.vertex + n - 1) % n
                } else {
                    (self.cursor.vertex + 1) % n
                };
                self.prev = Some(idx);
                true
            }
        }
    }

    fn no_match(&mut self) {
        self.current = None;
    }

    fn update(&mut self, other: Cursor, changed: bool) {
        match self.current {
            Some((v, k)) if !changed => {
                // A reversed neighbour is walked backwards, so it grows at the front.
                if other.reversed {
                    self.out[v][k].first = other.vertex;
                } else {
                    self.out[v][k].last = other.vertex;
                }
            }
            _ => {
                let v = self.cursor.vertex;
                self.out[v].push(MatchInterval {
                    isoline: other.isoline,
                    first: other.vertex,
                    last: other.vertex,
                });
                self.current = Some((v, self.out[v].len() - 1));
                if self.prev == Some(0) && self.init.is_none() {
                    self.init = self.current;
                }
            }
        }
    }

    /// On a cycle, the last interval may continue the first one across the
    /// carving seam.
    fn merge_ends(&mut self) {
        if !self.iso.cyclic {
            return;
        }
        let (Some((cv, ck)), Some((iv, ik))) = (self.current, self.init) else {
            return;
        };
        if (cv, ck) == (iv, ik) {
            return;
        }
        if self.out[cv][ck].last == self.out[iv][ik].first {
            self.out[iv][ik].first = self.out[cv][ck].first;
            self.out[cv].remove(ck);
            self.current = None;
        }
    }

    /// Widens every interval by `splash` vertices of the neighbour on both
    /// sides.
    fn widen(&mut self, other: &Isoline, splash: usize) {
        if splash == 0 || other.is_empty() {
            return;
        }
        let n = other.len();
        for mi in self.out.iter_mut().flatten() {
            if other.cyclic {
                let span = (mi.last + n - mi.first) % n + 1;
                let grow = splash.min(n.saturating_sub(span) / 2);
                mi.first = (mi.first + n - grow) % n;
                mi.last = (mi.last + grow) % n;
            } else {
                mi.first = mi.first.saturating_sub(splash);
                mi.last = (mi.last + splash).min(n - 1);
            }
        }
    }
}

fn compute_matching(lower: &[Point], upper: &[Point], config: &AlignConfig) -> (Matching, CostMatrix) {
    let costs = CostMatrix::compute(lower, upper, config.metric);
    let matching = match config.method {
        AlignMethod::Lcfm => solve(&costs),
        AlignMethod::Dtw { .. } => dtw::solve(&costs),
    };
    (matching, costs)
}

fn check(matching: &Matching, costs: &CostMatrix, lower: usize, upper: usize) {
    if let Err(e) = matching.verify(costs) {
        #[cfg(feature = "slow-asserts")]
        panic!("matching between isolines {lower} and {upper}: {e}");
        #[cfg(not(feature = "slow-asserts"))]
        tracing::error!(lower, upper, "{e}");
    }
}

/// Aligns every pair of consecutive isolines.
///
/// The inputs are assumed to be finite; see [`crate::align`] for the checked
/// version.
pub fn align_stack(stack: &IsolineStack, config: &AlignConfig) -> Alignment {
    let mut intervals: Vec<Vec<Vec<MatchInterval>>> = stack
        .isolines
        .iter()
        .map(|iso| vec![Vec::new(); iso.len()])
        .collect();
    let mut pairs = Vec::new();
    let abs_threshold = config
        .filters
        .map(|f| f.abs_filter * stack.distance_norm());

    for (lower_idx, pair) in stack.isolines.windows(2).enumerate() {
        let (lower, upper) = (&pair[0], &pair[1]);
        let upper_idx = lower_idx + 1;
        if lower.is_empty() || upper.is_empty() {
            continue;
        }

        let carving = carve::carve(lower, upper);
        let (fwd, fwd_costs) = compute_matching(&carving.lower, &carving.upper, config);
        let fwd_max = fwd.bottleneck();

        let rev = config.test_reverse.then(|| {
            let upper_rev: Vec<_> = carving.upper.iter().rev().copied().collect();
            compute_matching(&carving.lower, &upper_rev, config)
        });
        let rev_max = rev
            .as_ref()
            .map(|(m, _)| m.bottleneck())
            .unwrap_or(f64::INFINITY);

        let (matching, costs, reversed, bottleneck, upper_start) = match rev {
            Some((m, c)) if fwd_max >= rev_max => (m, c, true, rev_max, carving.upper_end),
            _ => (fwd, fwd_costs, false, fwd_max, carving.upper_start),
        };
        if config.verify {
            check(&matching, &costs, lower_idx, upper_idx);
        }

        let mut lo = Walk::new(lower, lower_idx, carving.lower_start, false);
        let mut up = Walk::new(upper, upper_idx, upper_start, reversed);
        let mut dropped = 0;
        for m in &matching.pairs {
            let lo_changed = lo.shift(m.i);
            let up_changed = up.shift(m.j);

            let too_far = config.filters.is_some_and(|f| {
                let straight = lower.points[lo.cursor.vertex].distance(upper.points[up.cursor.vertex]);
                m.cost > f.max_filter * bottleneck
                    || abs_threshold.is_some_and(|t| m.cost > t)
                    || m.cost > f.max_detour * straight
            });
            if too_far {
                dropped += 1;
                lo.no_match();
                up.no_match();
            } else {
                let (lo_cursor, up_cursor) = (lo.cursor, up.cursor);
                lo.update(up_cursor, lo_changed);
                up.update(lo_cursor, up_changed);
            }
        }
        lo.merge_ends();
        up.merge_ends();
        if let AlignMethod::Dtw { splash } = config.method {
            lo.widen(upper, splash);
            up.widen(lower, splash);
        }

        tracing::debug!(
            lower = lower_idx,
            upper = upper_idx,
            cells = matching.len(),
            bottleneck,
            reversed,
            dropped,
            "aligned isolines"
        );

        for (all, new) in [(lower_idx, lo.out), (upper_idx, up.out)] {
            for (v, mis) in new.into_iter().enumerate() {
                intervals[all][v].extend(mis);
            }
        }
        pairs.push(PairAlignment {
            lower: lower_idx,
            upper: upper_idx,
            matching,
            reversed,
        });
    }

    Alignment { intervals, pairs }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mi(isoline: usize, first: usize, last: usize) -> MatchInterval {
        MatchInterval {
            isoline,
            first,
            last,
        }
    }

    #[test]
    fn parallel_lines() {
        let stack = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]),
            Isoline::open([(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0)]),
        ]);
        let al = align_stack(&stack, &AlignConfig::default());
        let pair = &al.pairs()[0];
        assert_eq!(pair.matching.cells(), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert!(pair.matching.pairs.iter().all(|m| m.cost == 1.0));
        for v in 0..4 {
            assert_eq!(al.intervals(0, v), &[mi(1, v, v)]);
            assert_eq!(al.intervals(1, v), &[mi(0, v, v)]);
        }
    }

    #[test]
    fn runs_become_intervals() {
        // The lower vertex 1 sees all of the middle of the upper line.
        let stack = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (2.0, 0.0), (4.0, 0.0)]),
            Isoline::open([(0.0, 1.0), (1.5, 1.0), (2.0, 1.0), (2.5, 1.0), (4.0, 1.0)]),
        ]);
        let al = align_stack(&stack, &AlignConfig::default());
        assert_eq!(al.intervals(0, 1), &[mi(1, 1, 3)]);
        assert_eq!(al.intervals(1, 2), &[mi(0, 1, 1)]);
        assert_eq!(al.intervals_towards(1, 2, 2).count(), 0);
    }

    #[test]
    fn far_vertex_is_filtered() {
        let stack = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]),
            Isoline::open([(0.0, 1.0), (1.0, 1.0), (2.0, 10.0), (3.0, 1.0), (4.0, 1.0)]),
        ]);
        let config = AlignConfig {
            filters: Some(MatchFilters {
                max_filter: 0.5,
                ..MatchFilters::default()
            }),
            ..AlignConfig::default()
        };
        let al = align_stack(&stack, &config);
        assert!(al.intervals(1, 2).is_empty());
        for v in [0, 1, 3, 4] {
            assert!(!al.intervals(1, v).is_empty(), "{v}");
        }

        let unfiltered = align_stack(&stack, &AlignConfig::default());
        assert!(!unfiltered.intervals(1, 2).is_empty());
    }

    #[test]
    fn reversed_upper() {
        let stack = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            Isoline::open([(2.0, 1.0), (1.0, 1.0), (0.0, 1.0)]),
        ]);
        let config = AlignConfig {
            test_reverse: true,
            verify: true,
            ..AlignConfig::default()
        };
        let al = align_stack(&stack, &config);
        assert!(al.pairs()[0].reversed);
        assert_eq!(al.intervals(0, 0), &[mi(1, 2, 2)]);
        assert_eq!(al.intervals(0, 2), &[mi(1, 0, 0)]);
        assert_eq!(al.intervals(1, 1), &[mi(0, 1, 1)]);
    }

    #[test]
    fn concentric_rings_merge_across_the_seam() {
        let ring = |r: f64| {
            Isoline::closed((0..8).map(|k| {
                let t = k as f64 * std::f64::consts::TAU / 8.0;
                (r * t.cos(), r * t.sin())
            }))
        };
        let stack = IsolineStack::new(vec![ring(1.0), ring(2.0)]);
        let al = align_stack(&stack, &AlignConfig::default());
        for v in 0..8 {
            assert_eq!(al.intervals(0, v), &[mi(1, v, v)], "{v}");
            assert_eq!(al.intervals(1, v), &[mi(0, v, v)], "{v}");
        }
    }

    #[test]
    fn dtw_splash_widens() {
        let stack = IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]),
            Isoline::open([(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0)]),
        ]);
        let config = AlignConfig {
            method: AlignMethod::Dtw { splash: 1 },
            ..AlignConfig::default()
        };
        let al = align_stack(&stack, &config);
        assert_eq!(al.intervals(0, 0), &[mi(1, 0, 1)]);
        assert_eq!(al.intervals(0, 2), &[mi(1, 1, 3)]);
    }
}
