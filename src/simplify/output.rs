//! The output map: the isolines being simplified.
//!
//! Every output vertex remembers the range of input vertices it stands for.
//! The vertices of an isoline live in one arena shared by all isolines and
//! are chained together as a doubly linked list, so that removing one is
//! cheap and doesn't invalidate the indices held by ladders.

use crate::{
    geom::Point,
    isoline::{Isoline, IsolineStack},
};

use super::LadderIdx;

impl_typed_vec!(
    /// The vertices of all output isolines.
    CoordVec,
    /// A handle to an output vertex. Handles stay valid after removals.
    CoordIdx,
    "v"
);

/// A vertex of an output isoline.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct OutputCoord {
    /// The current position.
    pub location: Point,
    /// The isoline this vertex belongs to.
    pub isoline: usize,
    /// The first input vertex this vertex stands for.
    pub represents_from: usize,
    /// The last input vertex this vertex stands for.
    pub represents_to: usize,
    /// The ladder owning the edge that starts at this vertex.
    pub ladder: Option<LadderIdx>,
    /// Where this vertex would go if its ladder were collapsed.
    pub collapse: Option<Point>,
    prev: Option<CoordIdx>,
    next: Option<CoordIdx>,
    removed: bool,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
struct OutputIsoline {
    cyclic: bool,
    first: Option<CoordIdx>,
    last: Option<CoordIdx>,
    len: usize,
}

/// The simplified isolines.
#[derive(Clone, Debug, serde::Serialize)]
pub struct OutputMap {
    coords: CoordVec<OutputCoord>,
    isolines: Vec<OutputIsoline>,
}

impl OutputMap {
    /// A copy of `stack`, with every vertex standing for itself.
    pub fn new(stack: &IsolineStack) -> Self {
        let mut coords = CoordVec::with_capacity(stack.vertex_count());
        let mut isolines = Vec::with_capacity(stack.len());
        for (k, iso) in stack.isolines.iter().enumerate() {
            let base = coords.len();
            for (v, p) in iso.points.iter().enumerate() {
                coords.push(OutputCoord {
                    location: *p,
                    isoline: k,
                    represents_from: v,
                    represents_to: v,
                    ladder: None,
                    collapse: None,
                    prev: v.checked_sub(1).map(|u| CoordIdx(base + u)),
                    next: (v + 1 < iso.len()).then_some(CoordIdx(base + v + 1)),
                    removed: false,
                });
            }
            isolines.push(OutputIsoline {
                cyclic: iso.cyclic,
                first: (!iso.is_empty()).then_some(CoordIdx(base)),
                last: (!iso.is_empty()).then_some(CoordIdx(base + iso.len() - 1)),
                len: iso.len(),
            });
        }
        OutputMap { coords, isolines }
    }

    /// The number of isolines.
    pub fn isoline_count(&self) -> usize {
        self.isolines.len()
    }

    /// The number of vertices left on isoline `k`.
    pub fn isoline_len(&self, k: usize) -> usize {
        self.isolines[k].len
    }

    /// Is isoline `k` closed?
    pub fn is_cyclic(&self, k: usize) -> bool {
        self.isolines[k].cyclic
    }

    /// The total number of vertices left.
    pub fn vertex_count(&self) -> usize {
        self.isolines.iter().map(|iso| iso.len).sum()
    }

    /// The vertices of isoline `k`, in order.
    pub fn vertices(&self, k: usize) -> impl Iterator<Item = CoordIdx> + '_ {
        std::iter::successors(self.isolines[k].first, move |c| self.coords[*c].next)
    }

    /// Every vertex that hasn't been removed.
    pub fn all_vertices(&self) -> impl Iterator<Item = CoordIdx> + '_ {
        (0..self.isolines.len()).flat_map(move |k| self.vertices(k))
    }

    /// The positions of the vertices of isoline `k`.
    pub fn points(&self, k: usize) -> Vec<Point> {
        self.vertices(k).map(|c| self.coords[c].location).collect()
    }

    /// The output isolines.
    pub fn to_stack(&self) -> IsolineStack {
        (0..self.isolines.len())
            .map(|k| Isoline {
                points: self.points(k),
                cyclic: self.isolines[k].cyclic,
            })
            .collect()
    }

    /// The arena index of the `v`th vertex of isoline `k`, as long as no
    /// vertex has been removed.
    pub(crate) fn initial(&self, k: usize, v: usize) -> Option<CoordIdx> {
        let first = self.isolines.get(k)?.first?;
        (v < self.isolines[k].len).then_some(CoordIdx(first.0 + v))
    }

    /// Has this vertex been removed?
    pub fn is_removed(&self, c: CoordIdx) -> bool {
        self.coords[c].removed
    }

    /// The next vertex, wrapping around on cyclic isolines.
    pub fn cyclic_next(&self, c: CoordIdx) -> Option<CoordIdx> {
        let coord = &self.coords[c];
        let iso = &self.isolines[coord.isoline];
        match coord.next {
            Some(n) => Some(n),
            None if iso.cyclic && iso.len > 1 => iso.first,
            None => None,
        }
    }

    /// The previous vertex, wrapping around on cyclic isolines.
    pub fn cyclic_prev(&self, c: CoordIdx) -> Option<CoordIdx> {
        let coord = &self.coords[c];
        let iso = &self.isolines[coord.isoline];
        match coord.prev {
            Some(p) => Some(p),
            None if iso.cyclic && iso.len > 1 => iso.last,
            None => None,
        }
    }

    /// Can the edge starting at `b` be collapsed?
    ///
    /// The isoline needs more than three vertices. On an open isoline, `b`
    /// additionally can't be the first, the last or the second-to-last one.
    pub fn is_collapsible(&self, b: CoordIdx) -> bool {
        let coord = &self.coords[b];
        let iso = &self.isolines[coord.isoline];
        if coord.removed || iso.len <= 3 {
            return false;
        }
        if iso.cyclic {
            return true;
        }
        let second_to_last = iso.last.and_then(|l| self.coords[l].prev);
        Some(b) != iso.first && Some(b) != iso.last && Some(b) != second_to_last
    }

    /// The vertices `b.prev, b, b.next, b.next.next`.
    pub fn quadruple(&self, b: CoordIdx) -> Option<[CoordIdx; 4]> {
        let a = self.cyclic_prev(b)?;
        let c = self.cyclic_next(b)?;
        let d = self.cyclic_next(c)?;
        Some([a, b, c, d])
    }

    /// The positions of [`OutputMap::quadruple`].
    pub fn quadruple_points(&self, b: CoordIdx) -> Option<[Point; 4]> {
        self.quadruple(b).map(|q| q.map(|c| self.coords[c].location))
    }

    /// Unlinks `c` from its isoline.
    pub fn remove(&mut self, c: CoordIdx) {
        let OutputCoord {
            prev,
            next,
            isoline,
            removed,
            ..
        } = self.coords[c];
        if removed {
            return;
        }
        match prev {
            Some(p) => self.coords[p].next = next,
            None => self.isolines[isoline].first = next,
        }
        match next {
            Some(n) => self.coords[n].prev = prev,
            None => self.isolines[isoline].last = prev,
        }
        let coord = &mut self.coords[c];
        coord.removed = true;
        coord.prev = None;
        coord.next = None;
        coord.ladder = None;
        self.isolines[isoline].len -= 1;
    }

    /// The input vertices between the end of `a`'s range and the start of
    /// `d`'s, where `a-b-c-d` is the quadruple of `b`.
    ///
    /// With `extend`, the walk continues past both ends for as long as it
    /// gets closer to `a` (before the start) or to `d` (after the end).
    pub fn represented_indices(&self, input: &Isoline, b: CoordIdx, extend: bool) -> Vec<usize> {
        let Some([a, _, _, d]) = self.quadruple(b) else {
            return Vec::new();
        };
        let (a, d) = (&self.coords[a], &self.coords[d]);
        let dist = |v: usize, p: Point| input.points[v].distance(p);

        let mut out = Vec::new();
        let mut fwd_sentinel = a.represents_to;
        if extend {
            let mut walk = a.represents_to;
            while let Some(prev) = input.prev(walk) {
                if prev == d.represents_from || dist(walk, a.location) <= dist(prev, a.location) {
                    break;
                }
                out.push(prev);
                walk = prev;
            }
            fwd_sentinel = walk;
            out.reverse();
        }

        let mut walk = a.represents_to;
        out.push(walk);
        while walk != d.represents_from {
            match input.next(walk) {
                Some(next) => walk = next,
                None => break,
            }
            out.push(walk);
        }

        if extend {
            let mut walk = d.represents_to;
            while let Some(next) = input.next(walk) {
                if next == fwd_sentinel || dist(walk, d.location) <= dist(next, d.location) {
                    break;
                }
                out.push(next);
                walk = next;
            }
        }
        out
    }

    /// The input geometry represented by the quadruple of `b`; see
    /// [`OutputMap::represented_indices`].
    pub fn represented_geometry(&self, input: &Isoline, b: CoordIdx, extend: bool) -> Vec<Point> {
        self.represented_indices(input, b, extend)
            .into_iter()
            .map(|v| input.points[v])
            .collect()
    }

    /// Checks that the ranges of every output isoline partition its input
    /// isoline, in order.
    pub fn check_ranges(&self, input: &IsolineStack) -> bool {
        (0..self.isolines.len()).all(|k| {
            let iso = &input.isolines[k];
            let n = iso.len();
            let mut covered = 0;
            let mut expected: Option<usize> = None;
            for c in self.vertices(k) {
                let coord = &self.coords[c];
                if let Some(e) = expected {
                    if coord.represents_from != e {
                        return false;
                    }
                } else if !iso.cyclic && coord.represents_from != 0 {
                    return false;
                }
                let span = if coord.represents_to >= coord.represents_from {
                    coord.represents_to - coord.represents_from + 1
                } else if iso.cyclic {
                    coord.represents_to + n - coord.represents_from + 1
                } else {
                    return false;
                };
                covered += span;
                expected = Some((coord.represents_to + 1) % n.max(1));
            }
            let closes = match (self.isolines[k].first, expected) {
                (Some(first), Some(e)) if iso.cyclic => self.coords[first].represents_from == e,
                (Some(_), Some(e)) => e == 0,
                _ => n == 0,
            };
            closes && covered == n
        })
    }
}

impl std::ops::Index<CoordIdx> for OutputMap {
    type Output = OutputCoord;

    fn index(&self, index: CoordIdx) -> &OutputCoord {
        &self.coords[index]
    }
}

impl std::ops::IndexMut<CoordIdx> for OutputMap {
    fn index_mut(&mut self, index: CoordIdx) -> &mut OutputCoord {
        &mut self.coords[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> IsolineStack {
        IsolineStack::new(vec![
            Isoline::open([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]),
            Isoline::closed([(0.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]),
        ])
    }

    #[test]
    fn linked_lists() {
        let input = stack();
        let mut map = OutputMap::new(&input);
        assert_eq!(map.vertex_count(), 9);
        let ring: Vec<_> = map.vertices(1).collect();
        assert_eq!(map.cyclic_next(ring[3]), Some(ring[0]));
        assert_eq!(map.cyclic_prev(ring[0]), Some(ring[3]));

        let line: Vec<_> = map.vertices(0).collect();
        assert_eq!(map.cyclic_next(line[4]), None);
        assert!(!map.is_collapsible(line[0]));
        assert!(map.is_collapsible(line[1]));
        assert!(map.is_collapsible(line[2]));
        assert!(!map.is_collapsible(line[3]));
        assert!(ring.iter().all(|c| map.is_collapsible(*c)));

        map.remove(ring[0]);
        assert_eq!(map.isoline_len(1), 3);
        assert_eq!(map.cyclic_prev(ring[1]), Some(ring[3]));
        assert!(!map.is_collapsible(ring[1]));
        assert_eq!(map.points(1).len(), 3);
    }

    #[test]
    fn ranges_partition() {
        let input = stack();
        let mut map = OutputMap::new(&input);
        assert!(map.check_ranges(&input));

        let line: Vec<_> = map.vertices(0).collect();
        map.remove(line[2]);
        assert!(!map.check_ranges(&input));
        map[line[1]].represents_to = 2;
        assert!(map.check_ranges(&input));

        let ring: Vec<_> = map.vertices(1).collect();
        map.remove(ring[0]);
        map[ring[3]].represents_to = 0;
        assert!(map.check_ranges(&input));
    }

    #[test]
    fn represented_geometry() {
        let input = stack();
        let map = OutputMap::new(&input);
        let line: Vec<_> = map.vertices(0).collect();
        assert_eq!(map.represented_indices(&input.isolines[0], line[1], false), vec![0, 1, 2, 3]);
        // Walking back from 0 is impossible, and walking on from 4 gets
        // further from 3.
        assert_eq!(map.represented_indices(&input.isolines[0], line[1], true), vec![0, 1, 2, 3]);

        let ring: Vec<_> = map.vertices(1).collect();
        assert_eq!(map.represented_indices(&input.isolines[1], ring[0], false), vec![3, 0, 1, 2]);
    }
}
