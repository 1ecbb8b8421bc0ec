//! Geodesic costs: shortest paths that stay in the region between two
//! polylines.
//!
//! The region is approximated by a set of "pockets", simple polygons whose
//! union covers the space between the curves. Two vertices see each other
//! if the segment between them stays inside the pockets, and the cost of a
//! pair is the length of the shortest path in the resulting visibility
//! graph.

use std::{cmp::Reverse, collections::BinaryHeap};

use crate::{
    geom::{polygon_contains, polyline_length, segments_meet, InfLine, Point},
    num::{CheapOrderedFloat, EPS},
    segments::Segments,
};

use super::CostMatrix;

/// Curves whose endpoints are closer than this fraction of their length are
/// treated as (carved) cycles.
const CYCLE_GAP_RATIO: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    A,
    B,
}

#[derive(Clone, Copy, Debug)]
struct Tagged {
    p: Point,
    side: Side,
    index: usize,
}

pub(super) fn geodesic_costs(a: &[Point], b: &[Point]) -> CostMatrix {
    let n = a.len();
    let m = b.len();
    if n == 0 || m == 0 {
        return CostMatrix::from_fn(n, m, |_, _| 0.0);
    }

    let cycle_mode = match (a.first(), a.last()) {
        (Some(first), Some(last)) => first.distance(*last) < CYCLE_GAP_RATIO * polyline_length(a),
        _ => false,
    };
    let pockets = if cycle_mode {
        vec![a.to_vec(), b.to_vec()]
    } else {
        compute_pockets(a, b)
    };

    let graph = VisibilityGraph::new(a, b, &pockets, cycle_mode);
    let mut unreachable = 0;
    let mut costs = Vec::with_capacity(n * m);
    for i in 0..n {
        let dist = graph.shortest_paths(i);
        for j in 0..m {
            let d = dist[n + j];
            if d.is_finite() {
                costs.push(d);
            } else {
                unreachable += 1;
                costs.push(a[i].distance(b[j]));
            }
        }
    }
    if unreachable > 0 {
        tracing::warn!(
            unreachable,
            total = n * m,
            "geodesic distance undefined for some pairs, using straight-line distance"
        );
    }
    CostMatrix::from_row_major(n, m, costs)
}

struct VisibilityGraph {
    points: Vec<Point>,
    adj: Vec<Vec<(usize, f64)>>,
}

impl VisibilityGraph {
    fn new(a: &[Point], b: &[Point], pockets: &[Vec<Point>], cycle_mode: bool) -> Self {
        let n = a.len();
        let points: Vec<Point> = a.iter().chain(b).copied().collect();
        let mut boundary = Segments::default();
        boundary.add_cycles(pockets.iter().map(|p| p.iter().copied()));

        let visible = |p: Point, q: Point| {
            if boundary.touches_interior(p, q, EPS) {
                return false;
            }
            let mid = p.midpoint(q);
            let contained = pockets.iter().filter(|poly| polygon_contains(poly, mid)).count();
            if cycle_mode {
                contained == 1
            } else {
                contained > 0
            }
        };

        let mut adj = vec![Vec::new(); points.len()];
        let mut connect = |u: usize, v: usize| {
            let w = points[u].distance(points[v]);
            adj[u].push((v, w));
            adj[v].push((u, w));
        };

        for u in 0..points.len() {
            for v in u + 1..points.len() {
                let same_curve = (u < n) == (v < n);
                if (same_curve && v == u + 1) || visible(points[u], points[v]) {
                    connect(u, v);
                }
            }
        }
        VisibilityGraph { points, adj }
    }

    fn shortest_paths(&self, source: usize) -> Vec<f64> {
        let mut dist = vec![f64::INFINITY; self.points.len()];
        let mut queue = BinaryHeap::new();
        dist[source] = 0.0;
        queue.push(Reverse((CheapOrderedFloat::from(0.0), source)));

        while let Some(Reverse((d, u))) = queue.pop() {
            let d = d.into_inner();
            if d > dist[u] {
                continue;
            }
            for &(v, w) in &self.adj[u] {
                let nd = d + w;
                if nd < dist[v] {
                    dist[v] = nd;
                    queue.push(Reverse((CheapOrderedFloat::from(nd), v)));
                }
            }
        }
        dist
    }
}

/// Pockets for two open curves: the ones cut off near the starting ends,
/// the ones cut off near the finishing ends, and the polygon in between.
fn compute_pockets(a: &[Point], b: &[Point]) -> Vec<Vec<Point>> {
    let mut pockets = Vec::new();
    let (start_a, start_b) = find_pockets(a, b, &mut pockets);

    let a_rev: Vec<Point> = a.iter().rev().copied().collect();
    let b_rev: Vec<Point> = b.iter().rev().copied().collect();
    let (end_a, end_b) = find_pockets(&a_rev, &b_rev, &mut pockets);
    let end_a = a.len() - 1 - end_a;
    let end_b = b.len() - 1 - end_b;

    let mut middle = Vec::new();
    if start_a <= end_a {
        middle.extend_from_slice(&a[start_a..=end_a]);
    }
    if start_b <= end_b {
        middle.extend(b[start_b..=end_b].iter().rev());
    }
    pockets.push(middle);
    pockets
}

/// Finds the pockets at the start of `a` and `b`.
///
/// The "cap" is the segment between the two starting vertices. If either
/// curve folds back across the cap, the parts before the last crossing are
/// hidden behind the cap; we wrap them in a convex hull and peel off the
/// pockets between the hull and each curve. Returns the vertex index on
/// each curve at which the middle polygon should start.
fn find_pockets(a: &[Point], b: &[Point], pockets: &mut Vec<Vec<Point>>) -> (usize, usize) {
    let (Some(&a0), Some(&b0)) = (a.first(), b.first()) else {
        return (0, 0);
    };
    let Some(cap_line) = InfLine::through_points(a0, b0) else {
        return (0, 0);
    };

    let last_crossing = |pts: &[Point]| {
        (1..pts.len().saturating_sub(1))
            .filter(|&i| segments_meet(pts[i], pts[i + 1], a0, b0))
            .last()
            .unwrap_or(0)
    };
    let last_a = last_crossing(a);
    let last_b = last_crossing(b);
    if last_a == 0 && last_b == 0 {
        return (0, 0);
    }

    let is_left = |p: Point| cap_line.signed_distance(p) > EPS;
    let is_right = |p: Point| cap_line.signed_distance(p) < -EPS;
    let consider_left = if last_a == 0 {
        !is_left(b[last_b + 1])
    } else {
        let left = is_left(a[last_a + 1]);
        if last_b != 0 && left != is_left(b[last_b + 1]) {
            tracing::debug!("curves leave the cap on different sides");
        }
        !left
    };
    let on_side = |p: Point| if consider_left { is_left(p) } else { is_right(p) };

    let mut tagged = Vec::new();
    for (pts, last, side) in [(a, last_a, Side::A), (b, last_b, Side::B)] {
        for (index, &p) in pts.iter().enumerate().take(last + 1) {
            if index == 0 || on_side(p) {
                tagged.push(Tagged { p, side, index });
            }
        }
    }

    let mut hull = convex_hull(tagged);
    let start_of = |hull: &[Tagged], side: Side| hull.iter().position(|t| t.side == side && t.index == 0);
    let (Some(pos_a), Some(pos_b)) = (start_of(&hull, Side::A), start_of(&hull, Side::B)) else {
        return (0, 0);
    };
    // Orient the hull so that the b start comes right before the a start,
    // then rotate so that it runs from the a start around to the b start.
    if (pos_a + 1) % hull.len() == pos_b {
        hull.reverse();
    }
    if let Some(pos_a) = start_of(&hull, Side::A) {
        hull.rotate_left(pos_a);
    }

    let mut walk_a = 0;
    let mut k = 0;
    while k + 1 < hull.len() && hull[k + 1].side == Side::A {
        k += 1;
        let target = hull[k].index;
        if target < walk_a {
            break;
        }
        let pocket = a[walk_a..=target].to_vec();
        walk_a = target;
        if pocket.len() > 2 {
            pockets.push(pocket);
        }
    }

    let mut walk_b = 0;
    let mut k = hull.len() - 1;
    while k >= 1 && hull[k - 1].side == Side::B {
        k -= 1;
        let target = hull[k].index;
        if target < walk_b {
            break;
        }
        let pocket = b[walk_b..=target].to_vec();
        walk_b = target;
        if pocket.len() > 2 {
            pockets.push(pocket);
        }
    }

    (walk_a, walk_b)
}

/// Andrew's monotone chain, returning the hull counter-clockwise without
/// collinear points.
fn convex_hull(mut pts: Vec<Tagged>) -> Vec<Tagged> {
    pts.sort_by(|s, t| {
        CheapOrderedFloat::from(s.p.x)
            .cmp(&CheapOrderedFloat::from(t.p.x))
            .then(CheapOrderedFloat::from(s.p.y).cmp(&CheapOrderedFloat::from(t.p.y)))
    });
    if pts.len() < 3 {
        return pts;
    }

    let turn = |o: &Tagged, a: &Tagged, b: &Tagged| (a.p - o.p).cross(b.p - o.p);
    let mut hull: Vec<Tagged> = Vec::with_capacity(2 * pts.len());
    for pass in 0..2 {
        let start = hull.len();
        let iter: Box<dyn Iterator<Item = &Tagged>> = if pass == 0 {
            Box::new(pts.iter())
        } else {
            Box::new(pts.iter().rev())
        };
        for t in iter {
            while hull.len() >= start + 2 && turn(&hull[hull.len() - 2], &hull[hull.len() - 1], t) <= 0.0 {
                hull.pop();
            }
            hull.push(*t);
        }
        hull.pop();
    }
    hull
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(xs: &[(f64, f64)]) -> Vec<Point> {
        xs.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn straight_corridor_is_euclidean() {
        let a = pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]);
        let b = pts(&[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0), (3.0, 1.0)]);
        let geo = geodesic_costs(&a, &b);
        let euc = CostMatrix::euclidean(&a, &b);
        for i in 0..4 {
            for j in 0..4 {
                assert!((geo.get(i, j) - euc.get(i, j)).abs() < 1e-9, "{i} {j}");
            }
        }
    }

    #[test]
    fn walks_around_an_obstacle() {
        // b dips down to (2, 0.5), blocking the straight line from a[0]
        // to b[4]; the shortest path bends around the tip of the dip.
        let a = pts(&[(0.0, 0.0), (2.0, 0.0), (4.0, 0.0)]);
        let b = pts(&[(0.0, 3.0), (1.0, 3.0), (2.0, 0.5), (3.0, 3.0), (4.0, 3.0)]);
        let geo = geodesic_costs(&a, &b);
        let euc = CostMatrix::euclidean(&a, &b);
        assert!(geo.get(0, 4) > euc.get(0, 4) + 1e-3);
        assert!((geo.get(1, 2) - euc.get(1, 2)).abs() < 1e-9);
    }

    #[test]
    fn hull_is_counter_clockwise() {
        let tag = |x, y, index| Tagged {
            p: Point::new(x, y),
            side: Side::A,
            index,
        };
        let hull = convex_hull(vec![
            tag(0.0, 0.0, 0),
            tag(1.0, 1.0, 1),
            tag(2.0, 0.0, 2),
            tag(1.0, 2.0, 3),
            tag(1.0, 0.0, 4),
        ]);
        let order: Vec<usize> = hull.iter().map(|t| t.index).collect();
        assert_eq!(order, vec![0, 2, 3]);
    }
}
