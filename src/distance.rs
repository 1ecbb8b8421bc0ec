//! Cost matrices between the vertices of two polylines.

use crate::{geom::Point, segments::Segments};

mod geodesic;

/// How to measure the cost of matching a vertex of one polyline with a
/// vertex of another.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    /// Straight-line distance.
    #[default]
    Euclidean,
    /// Straight-line distance, inflated by `penalty` for every edge of
    /// either polyline that the connecting segment crosses.
    CrossingPenalty {
        /// The relative surcharge per crossing; zero means plain Euclidean.
        penalty: f64,
    },
    /// Shortest-path distance through the region between the polylines.
    Geodesic,
}

/// An `rows × cols` matrix of non-negative matching costs.
#[derive(Clone, PartialEq, serde::Serialize)]
pub struct CostMatrix {
    rows: usize,
    cols: usize,
    costs: Vec<f64>,
}

impl CostMatrix {
    /// Builds a matrix by evaluating `f(i, j)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut costs = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                costs.push(f(i, j));
            }
        }
        CostMatrix { rows, cols, costs }
    }

    /// Wraps row-major costs.
    ///
    /// # Panics
    ///
    /// Panics if `costs` doesn't have exactly `rows * cols` entries.
    pub fn from_row_major(rows: usize, cols: usize, costs: Vec<f64>) -> Self {
        assert_eq!(costs.len(), rows * cols);
        CostMatrix { rows, cols, costs }
    }

    /// Computes the matrix between the vertices of `a` (rows) and `b`
    /// (columns), both taken to be open polylines.
    pub fn compute(a: &[Point], b: &[Point], metric: Metric) -> Self {
        match metric {
            Metric::Euclidean => Self::euclidean(a, b),
            Metric::CrossingPenalty { penalty } if penalty <= 0.0 => Self::euclidean(a, b),
            Metric::CrossingPenalty { penalty } => Self::crossing_penalty(a, b, penalty),
            Metric::Geodesic => geodesic::geodesic_costs(a, b),
        }
    }

    /// Straight-line distances.
    pub fn euclidean(a: &[Point], b: &[Point]) -> Self {
        Self::from_fn(a.len(), b.len(), |i, j| a[i].distance(b[j]))
    }

    fn crossing_penalty(a: &[Point], b: &[Point], penalty: f64) -> Self {
        let mut segs = Segments::default();
        let a_contour = segs.add_points(a.iter().copied());
        segs.add_points(b.iter().copied());

        Self::from_fn(a.len(), b.len(), |i, j| {
            let crossings = segs.crossing_count(a[i], b[j], |idx| {
                let src = segs.source(idx);
                let own = if src.contour == a_contour { i } else { j };
                src.vertex == own || src.vertex + 1 == own
            });
            a[i].distance(b[j]) * (1.0 + crossings as f64 * penalty)
        })
    }

    /// The number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The cost of matching row `i` with column `j`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        debug_assert!(i < self.rows && j < self.cols);
        self.costs[i * self.cols + j]
    }

    /// The same costs, with rows and columns swapped.
    pub fn transposed(&self) -> Self {
        Self::from_fn(self.cols, self.rows, |i, j| self.get(j, i))
    }
}

impl std::fmt::Debug for CostMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows: Vec<_> = self.costs.chunks(self.cols.max(1)).collect();
        f.debug_struct("CostMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("costs", &rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(xs: &[(f64, f64)]) -> Vec<Point> {
        xs.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn euclidean() {
        let a = pts(&[(0.0, 0.0), (3.0, 0.0)]);
        let b = pts(&[(0.0, 4.0)]);
        let m = CostMatrix::compute(&a, &b, Metric::Euclidean);
        assert_eq!((m.rows(), m.cols()), (2, 1));
        assert_eq!(m.get(0, 0), 4.0);
        assert_eq!(m.get(1, 0), 5.0);
        assert_eq!(m.transposed().get(0, 1), 5.0);
    }

    #[test]
    fn crossing_penalty() {
        // The segment from a[0] to b[2] crosses edge b[0]-b[1]; the
        // segment from a[0] to b[0] crosses nothing.
        let a = pts(&[(0.0, 0.0), (4.0, 0.0)]);
        let b = pts(&[(-1.0, 1.0), (3.0, 1.0), (3.0, 2.0), (-1.0, 2.0)]);
        let plain = CostMatrix::compute(&a, &b, Metric::Euclidean);
        let penalized = CostMatrix::compute(&a, &b, Metric::CrossingPenalty { penalty: 2.0 });
        let zero = CostMatrix::compute(&a, &b, Metric::CrossingPenalty { penalty: 0.0 });
        assert_eq!(zero, plain);
        assert_eq!(penalized.get(0, 0), plain.get(0, 0));
        assert!((penalized.get(0, 3) - 3.0 * plain.get(0, 3)).abs() < 1e-12);
    }
}
