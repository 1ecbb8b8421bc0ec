use kurbo::Line;

use crate::geom::{intersect_segments, Crossing, Point};

/// An index into our segment arena.
///
/// Segments keep their identity even when two of them have the same
/// endpoints, so that (for example) the two edges incident to a vertex can
/// be told apart from an unrelated edge passing through it.
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash, serde::Serialize)]
pub struct SegIdx(pub usize);

impl std::fmt::Debug for SegIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s_{}", self.0)
    }
}

/// Where a segment came from: the `vertex`-th edge of the `contour`-th
/// polyline added to the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SegSource {
    /// The index of the polyline, in the order they were added.
    pub contour: usize,
    /// The index of the edge's starting vertex within its polyline.
    pub vertex: usize,
}

/// An arena of straight line segments.
///
/// Segments are indexed by [`SegIdx`] and can be retrieved by indexing (i.e. with square brackets).
#[derive(Debug, Clone, Default)]
pub struct Segments {
    segs: Vec<Line>,
    source: Vec<SegSource>,
    contours: usize,
}

pub(crate) fn cyclic_pairs<T>(xs: &[T]) -> impl Iterator<Item = (&T, &T)> {
    pairs(xs).chain(xs.last().zip(xs.first()))
}

pub(crate) fn pairs<T>(xs: &[T]) -> impl Iterator<Item = (&T, &T)> {
    xs.windows(2).map(|pair| (&pair[0], &pair[1]))
}

impl Segments {
    /// The number of line segments in this arena.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.segs.len()
    }

    /// Iterate over all indices that can be used to index into this arena.
    pub fn indices(&self) -> impl Iterator<Item = SegIdx> {
        (0..self.segs.len()).map(SegIdx)
    }

    /// Which polyline, and which of its edges, the segment at `idx` is.
    pub fn source(&self, idx: SegIdx) -> SegSource {
        self.source[idx.0]
    }

    /// Add a (non-closed) polyline to this arena, returning its contour index.
    pub fn add_points<P: Into<Point>>(&mut self, ps: impl IntoIterator<Item = P>) -> usize {
        let ps: Vec<Point> = ps.into_iter().map(|p| p.into()).collect();
        self.add_edges(pairs(&ps))
    }

    /// Add a closed polyline to this arena, returning its contour index.
    pub fn add_cycle<P: Into<Point>>(&mut self, ps: impl IntoIterator<Item = P>) -> usize {
        let ps: Vec<Point> = ps.into_iter().map(|p| p.into()).collect();
        if ps.len() <= 2 {
            // A closed "polygon" with two vertices would just double its edge.
            return self.add_edges(pairs(&ps));
        }
        self.add_edges(cyclic_pairs(&ps))
    }

    /// Add a collection of closed polylines to this arena.
    pub fn add_cycles<P: Into<Point>>(
        &mut self,
        ps: impl IntoIterator<Item = impl IntoIterator<Item = P>>,
    ) {
        for p in ps {
            self.add_cycle(p);
        }
    }

    fn add_edges<'a>(&mut self, edges: impl Iterator<Item = (&'a Point, &'a Point)>) -> usize {
        let contour = self.contours;
        self.contours += 1;
        for (vertex, (p, q)) in edges.enumerate() {
            self.segs.push(Line::new(*p, *q));
            self.source.push(SegSource { contour, vertex });
        }
        contour
    }

    /// Construct a segment arena from a single non-closed polyline.
    pub fn from_polyline<P: Into<Point>>(ps: impl IntoIterator<Item = P>) -> Self {
        let mut ret = Self::default();
        ret.add_points(ps);
        ret
    }

    /// Construct a segment arena from a single closed polyline.
    pub fn from_closed_cycle<P: Into<Point>>(ps: impl IntoIterator<Item = P>) -> Self {
        let mut ret = Self::default();
        ret.add_cycle(ps);
        ret
    }

    /// The number of segments that the segment `p-q` meets, not counting
    /// the ones for which `skip` returns true.
    pub fn crossing_count(&self, p: Point, q: Point, mut skip: impl FnMut(SegIdx) -> bool) -> usize {
        self.indices()
            .filter(|&idx| !skip(idx))
            .filter(|&idx| {
                let s = self[idx];
                intersect_segments(p, q, s.p0, s.p1).is_some()
            })
            .count()
    }

    /// Does the segment `p-q` touch any segment of this arena anywhere
    /// except at `p` and `q` themselves?
    ///
    /// A collinear overlap only counts as harmless if it covers exactly
    /// `p-q`, i.e. the segment runs along an edge of the arena.
    pub fn touches_interior(&self, p: Point, q: Point, eps: f64) -> bool {
        self.segs.iter().any(|s| {
            match intersect_segments(p, q, s.p0, s.p1) {
                None => false,
                Some(Crossing::Point(x)) => x.distance(p) > eps && x.distance(q) > eps,
                Some(Crossing::Overlap(x, y)) => {
                    let same = (x.distance(p) <= eps && y.distance(q) <= eps)
                        || (x.distance(q) <= eps && y.distance(p) <= eps);
                    !same
                }
            }
        })
    }
}

impl std::ops::Index<SegIdx> for Segments {
    type Output = Line;

    fn index(&self, index: SegIdx) -> &Self::Output {
        &self.segs[index.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn sources() {
        let mut segs = Segments::default();
        let open = segs.add_points([p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0)]);
        let closed = segs.add_cycle([p(0.0, 1.0), p(1.0, 1.0), p(1.0, 2.0)]);
        assert_eq!((open, closed), (0, 1));
        assert_eq!(segs.len(), 5);
        assert_eq!(
            segs.source(SegIdx(3)),
            SegSource {
                contour: 1,
                vertex: 1
            }
        );
        // The closing edge of the cycle.
        assert_eq!(segs[SegIdx(4)], Line::new(p(1.0, 2.0), p(0.0, 1.0)));
    }

    #[test]
    fn crossings() {
        let segs = Segments::from_polyline([p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(4.0, 2.0)]);
        assert_eq!(segs.crossing_count(p(1.0, -1.0), p(3.0, 3.0), |_| false), 3);
        assert_eq!(
            segs.crossing_count(p(1.0, -1.0), p(3.0, 3.0), |idx| idx == SegIdx(1)),
            2
        );
    }

    #[test]
    fn interior_touches() {
        let square = Segments::from_closed_cycle([
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 2.0),
            p(0.0, 2.0),
        ]);
        // A diagonal only meets the boundary at its own endpoints.
        assert!(!square.touches_interior(p(0.0, 0.0), p(2.0, 2.0), 1e-9));
        // Running along an edge is fine, running past its end is not.
        assert!(!square.touches_interior(p(0.0, 0.0), p(2.0, 0.0), 1e-9));
        assert!(!square.touches_interior(p(0.5, 0.0), p(1.5, 0.0), 1e-9));
        assert!(square.touches_interior(p(1.0, 0.0), p(3.0, 0.0), 1e-9));
        assert!(square.touches_interior(p(1.0, -1.0), p(1.0, 1.0), 1e-9));
    }
}
