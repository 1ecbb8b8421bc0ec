//! Dynamic time warping: the warping path minimizing the *sum* of matched
//! costs, instead of the largest one.

use crate::distance::CostMatrix;

use super::matching::Matching;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Start,
    Diagonal,
    Row,
    Column,
}

/// Computes a minimum-sum warping path through `costs`.
///
/// Ties prefer the diagonal step, then advancing the row.
pub fn solve(costs: &CostMatrix) -> Matching {
    let (rows, cols) = (costs.rows(), costs.cols());
    if rows == 0 || cols == 0 {
        return Matching::default();
    }

    let at = |i: usize, j: usize| i * cols + j;
    let mut total = vec![0.0; rows * cols];
    let mut steps = vec![Step::Start; rows * cols];

    total[0] = costs.get(0, 0);
    for i in 1..rows {
        total[at(i, 0)] = total[at(i - 1, 0)] + costs.get(i, 0);
        steps[at(i, 0)] = Step::Row;
    }
    for j in 1..cols {
        total[at(0, j)] = total[at(0, j - 1)] + costs.get(0, j);
        steps[at(0, j)] = Step::Column;
    }
    for i in 1..rows {
        for j in 1..cols {
            let diagonal = total[at(i - 1, j - 1)];
            let row = total[at(i - 1, j)];
            let column = total[at(i, j - 1)];
            let (step, best) = if diagonal <= row.min(column) {
                (Step::Diagonal, diagonal)
            } else if row <= column {
                (Step::Row, row)
            } else {
                (Step::Column, column)
            };
            total[at(i, j)] = best + costs.get(i, j);
            steps[at(i, j)] = step;
        }
    }

    let (mut i, mut j) = (rows - 1, cols - 1);
    let mut cells = vec![(i, j)];
    loop {
        match steps[at(i, j)] {
            Step::Start => break,
            Step::Diagonal => {
                i -= 1;
                j -= 1;
            }
            Step::Row => i -= 1,
            Step::Column => j -= 1,
        }
        cells.push((i, j));
    }
    cells.reverse();
    Matching::from_cells(cells, costs)
}
