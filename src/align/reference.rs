//! A slow solver that compares candidate paths by walking them cell by cell.
//!
//! It makes exactly the same decisions as [`super::solver::SolutionTree`],
//! so the two must agree on every matrix.

use crate::{distance::CostMatrix, num::EPS};

use super::matching::Matching;

/// Computes the same matching as [`super::solve`], without shortcuts.
pub fn solve(costs: &CostMatrix) -> Matching {
    let (rows, cols) = (costs.rows(), costs.cols());
    if rows == 0 || cols == 0 {
        return Matching::default();
    }

    let mut pred: Vec<Option<(usize, usize)>> = vec![None; rows * cols];
    let at = |i: usize, j: usize| i * cols + j;
    for i in 1..rows {
        pred[at(i, 0)] = Some((i - 1, 0));
    }
    for j in 1..cols {
        pred[at(0, j)] = Some((0, j - 1));
    }

    let better = |pred: &[Option<(usize, usize)>], a: (usize, usize), b: (usize, usize)| {
        let cost = |c: (usize, usize)| costs.get(c.0, c.1);
        let (pa, pb) = (pred[at(a.0, a.1)], pred[at(b.0, b.1)]);
        if pa == Some(b) {
            return false;
        }
        if pb == Some(a) {
            return cost(b) > 0.0;
        }
        if pa == pb {
            return cost(a) < cost(b);
        }

        let (mut wa, mut wb) = (a, b);
        let (mut max_a, mut max_b) = (0.0f64, 0.0f64);
        while wa != wb {
            if wa > wb {
                max_a = max_a.max(cost(wa));
                match pred[at(wa.0, wa.1)] {
                    Some(p) => wa = p,
                    None => break,
                }
            } else {
                max_b = max_b.max(cost(wb));
                match pred[at(wb.0, wb.1)] {
                    Some(p) => wb = p,
                    None => break,
                }
            }
        }
        max_a < max_b - EPS
    };

    if cols >= 2 {
        for i in 1..rows {
            for j in 1..cols {
                let down = (i, j - 1);
                let diagonal = (i - 1, j - 1);
                let left = (i - 1, j);
                let mut best = down;
                if better(&pred, diagonal, best) {
                    best = diagonal;
                }
                if better(&pred, left, best) {
                    best = left;
                }
                pred[at(i, j)] = Some(best);
            }
        }
    }

    let mut cells = Vec::new();
    let mut cur = Some((rows - 1, cols - 1));
    while let Some(c) = cur {
        cells.push(c);
        cur = pred[at(c.0, c.1)];
    }
    cells.reverse();
    Matching::from_cells(cells, costs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integer_ties() {
        // Many equal costs, so most comparisons go to the tie-breaking rules.
        let costs = CostMatrix::from_fn(6, 5, |i, j| ((i + 2 * j) % 3) as f64);
        let m = solve(&costs);
        assert!(m.is_monotone());
        assert_eq!(m.bottleneck(), super::super::matching::bottleneck_by_dp(&costs));
        assert_eq!(m, super::super::solve(&costs));
    }
}
