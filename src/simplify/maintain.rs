//! Keeping representation ranges up to date across collapses.
//!
//! When `b` is removed and `c` moves to `n`, the input vertices that `a`,
//! `b`, `c` and `d` used to stand for have to be handed out again among `a`,
//! the moved `c` and `d`. We do this by aligning the new path `a-n-d` with
//! the old input geometry, using the same bottleneck matching as for the
//! isolines themselves.

use crate::{align::solve, distance::CostMatrix, geom::Point, isoline::Isoline};

use super::output::{CoordIdx, OutputMap};

/// Re-derives the ranges of the quadruple of `b`, for `b` collapsing onto
/// `n`.
///
/// This must run before `b` is removed. `a` keeps its start and `d` its end;
/// `a`, `c` and `d` each keep at least one input vertex.
pub fn update_ranges(map: &mut OutputMap, input: &Isoline, b: CoordIdx, n: Point) {
    let Some([a, _, c, d]) = map.quadruple(b) else {
        return;
    };
    let old = map.represented_indices(input, b, false);
    let m = old.len();
    debug_assert!(m >= 4, "quadruple of {b:?} represents {m} vertices");
    if m < 3 {
        return;
    }

    let new = [map[a].location, n, map[d].location];
    let old_pts: Vec<_> = old.iter().map(|v| input.points[*v]).collect();
    let matching = solve(&CostMatrix::euclidean(&new, &old_pts));

    let a_end = matching
        .pairs
        .iter()
        .filter(|p| p.i == 0)
        .map(|p| p.j)
        .max()
        .unwrap_or(0)
        .min(m - 3);
    let d_start = matching
        .pairs
        .iter()
        .filter(|p| p.i == 2)
        .map(|p| p.j)
        .min()
        .unwrap_or(m - 1)
        .max(a_end + 2);

    map[a].represents_to = old[a_end];
    map[c].represents_from = old[a_end + 1];
    map[c].represents_to = old[d_start - 1];
    map[d].represents_from = old[d_start];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isoline::IsolineStack;

    fn ranges(map: &OutputMap, k: usize) -> Vec<(usize, usize)> {
        map.vertices(k)
            .map(|c| (map[c].represents_from, map[c].represents_to))
            .collect()
    }

    #[test]
    fn collapse_onto_the_end() {
        let input: IsolineStack = [Isoline::open((0..4).map(|x| (x as f64, 0.0)))]
            .into_iter()
            .collect();
        let mut map = OutputMap::new(&input);
        let v: Vec<_> = map.vertices(0).collect();
        let n = Point::new(3.0, 0.0);
        update_ranges(&mut map, &input.isolines[0], v[1], n);
        map[v[2]].location = n;
        map.remove(v[1]);
        assert_eq!(ranges(&map, 0), vec![(0, 1), (2, 2), (3, 3)]);
        assert!(map.check_ranges(&input));
    }

    #[test]
    fn collapse_in_the_middle() {
        let input: IsolineStack = [Isoline::open((0..7).map(|x| (x as f64, 0.0)))]
            .into_iter()
            .collect();
        let mut map = OutputMap::new(&input);
        let v: Vec<_> = map.vertices(0).collect();
        let n = Point::new(3.0, 0.0);
        update_ranges(&mut map, &input.isolines[0], v[2], n);
        map[v[3]].location = n;
        map.remove(v[2]);
        assert!(map.check_ranges(&input));
        // The moved vertex stands for the input vertex it landed on.
        let c = &map[v[3]];
        assert!(c.represents_from <= 3 && 3 <= c.represents_to);
    }

    #[test]
    fn ring_wraps_around() {
        let input: IsolineStack = [Isoline::closed([
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (0.0, 1.0),
        ])]
        .into_iter()
        .collect();
        let mut map = OutputMap::new(&input);
        let v: Vec<_> = map.vertices(0).collect();
        // The quadruple 5-0-1-2 crosses the end of the arena.
        let n = Point::new(0.5, 0.0);
        update_ranges(&mut map, &input.isolines[0], v[0], n);
        map[v[1]].location = n;
        map.remove(v[0]);
        assert!(map.check_ranges(&input));
    }
}
