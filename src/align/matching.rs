//! Matchings between two vertex sequences, and checking them.

use crate::{distance::CostMatrix, num::close, Error};

/// One matched pair of vertices: row `i` with column `j`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Match {
    /// The vertex of the first (lower) polyline.
    pub i: usize,
    /// The vertex of the second (upper) polyline.
    pub j: usize,
    /// The cost of this cell.
    pub cost: f64,
}

/// A monotone staircase of matched cells from `(0, 0)` to the far corner.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct Matching {
    /// The matched cells, in order.
    pub pairs: Vec<Match>,
}

impl Matching {
    /// Builds a matching from cell coordinates, looking the costs up in `costs`.
    pub fn from_cells(cells: impl IntoIterator<Item = (usize, usize)>, costs: &CostMatrix) -> Self {
        Matching {
            pairs: cells
                .into_iter()
                .map(|(i, j)| Match {
                    i,
                    j,
                    cost: costs.get(i, j),
                })
                .collect(),
        }
    }

    /// The number of matched cells.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Is this the empty matching (of an empty polyline)?
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// The largest cost of any matched cell.
    pub fn bottleneck(&self) -> f64 {
        self.pairs.iter().map(|m| m.cost).fold(0.0, f64::max)
    }

    /// Does every step advance `i`, `j` or both by exactly one?
    pub fn is_monotone(&self) -> bool {
        self.pairs.windows(2).all(|w| {
            let di = w[1].i.wrapping_sub(w[0].i);
            let dj = w[1].j.wrapping_sub(w[0].j);
            matches!((di, dj), (0, 1) | (1, 0) | (1, 1))
        })
    }

    /// The cell coordinates, without costs.
    pub fn cells(&self) -> Vec<(usize, usize)> {
        self.pairs.iter().map(|m| (m.i, m.j)).collect()
    }

    /// The same matching, with the column order reversed.
    ///
    /// If this matching was computed against a reversed copy of the
    /// second polyline, this translates it back to the original indices.
    pub(crate) fn unreverse_columns(&self, cols: usize) -> Self {
        Matching {
            pairs: self
                .pairs
                .iter()
                .map(|m| Match {
                    j: cols - 1 - m.j,
                    ..*m
                })
                .collect(),
        }
    }

    /// Checks that every stretch of this matching is bottleneck-optimal.
    ///
    /// For every pair of matched cells, the discrete Fréchet distance over
    /// the rectangle they span must equal the largest cost matched in
    /// between. A locally correct matching satisfies this for all stretches,
    /// not only the whole.
    ///
    /// Each starting pair fills one Fréchet table reaching to the end of the
    /// matching, so this takes time proportional to the matching's length
    /// times the area it spans.
    pub fn verify(&self, costs: &CostMatrix) -> Result<(), Error> {
        let Some(&last) = self.pairs.last() else {
            return Ok(());
        };
        for (t1, &start) in self.pairs.iter().enumerate() {
            let cols = last.j - start.j + 1;
            let reach = frechet_table(costs, start, last);
            let mut matched = start.cost.max(0.0);
            for &end in &self.pairs[t1 + 1..] {
                matched = matched.max(end.cost);
                let frechet = reach[(end.i - start.i) * cols + (end.j - start.j)];
                if !close(matched, frechet) {
                    return Err(Error::InconsistentMatching {
                        from: (start.i, start.j),
                        to: (end.i, end.j),
                        matched,
                        frechet,
                    });
                }
            }
        }
        Ok(())
    }
}

/// The bottleneck cost of the best monotone path from `from` to every cell
/// of the rectangle up to `to`, row by row.
fn frechet_table(costs: &CostMatrix, from: Match, to: Match) -> Vec<f64> {
    let rows = to.i - from.i + 1;
    let cols = to.j - from.j + 1;
    let cost = |i: usize, j: usize| costs.get(from.i + i, from.j + j);

    let mut reach = vec![0.0_f64; rows * cols];
    for i in 0..rows {
        for j in 0..cols {
            let best = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => reach[j - 1],
                (_, 0) => reach[(i - 1) * cols],
                _ => reach[(i - 1) * cols + j - 1]
                    .min(reach[(i - 1) * cols + j])
                    .min(reach[i * cols + j - 1]),
            };
            reach[i * cols + j] = best.max(cost(i, j));
        }
    }
    reach
}

/// The optimal bottleneck value over all monotone paths, by plain dynamic
/// programming.
#[cfg(any(test, feature = "arbitrary"))]
pub fn bottleneck_by_dp(costs: &CostMatrix) -> f64 {
    if costs.rows() == 0 || costs.cols() == 0 {
        return 0.0;
    }
    let whole = |i, j| Match { i, j, cost: 0.0 };
    let reach = frechet_table(costs, whole(0, 0), whole(costs.rows() - 1, costs.cols() - 1));
    reach[reach.len() - 1]
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn frechet_of_small_grid() {
        let costs = CostMatrix::from_row_major(2, 3, vec![1.0, 5.0, 2.0, 4.0, 1.0, 1.0]);
        assert_eq!(bottleneck_by_dp(&costs), 1.0);
    }

    #[test]
    fn detects_a_bad_matching() {
        let costs = CostMatrix::from_row_major(2, 2, vec![0.0, 1.0, 1.0, 0.0]);
        let good = Matching::from_cells([(0, 0), (1, 1)], &costs);
        assert!(good.is_monotone());
        assert_eq!(good.bottleneck(), 0.0);
        assert!(good.verify(&costs).is_ok());

        let bad = Matching::from_cells([(0, 0), (0, 1), (1, 1)], &costs);
        assert_matches!(
            bad.verify(&costs),
            Err(Error::InconsistentMatching { matched, frechet, .. }) if matched == 1.0 && frechet == 0.0
        );
    }

    #[test]
    fn detects_a_detour_hidden_by_a_larger_cost() {
        #[rustfmt::skip]
        let costs = CostMatrix::from_row_major(3, 3, vec![
            0.0, 1.0, 9.0,
            1.0, 0.0, 9.0,
            9.0, 9.0, 5.0,
        ]);
        let detour = Matching::from_cells([(0, 0), (0, 1), (1, 1), (2, 2)], &costs);
        assert_eq!(detour.bottleneck(), bottleneck_by_dp(&costs));
        assert_matches!(
            detour.verify(&costs),
            Err(Error::InconsistentMatching { from: (0, 0), to: (1, 1), .. })
        );
        assert!(Matching::from_cells([(0, 0), (1, 1), (2, 2)], &costs)
            .verify(&costs)
            .is_ok());
    }

    #[test]
    fn monotonicity() {
        let costs = CostMatrix::from_fn(3, 3, |_, _| 0.0);
        assert!(!Matching::from_cells([(0, 0), (2, 1)], &costs).is_monotone());
        assert!(!Matching::from_cells([(1, 1), (0, 1)], &costs).is_monotone());
    }
}
