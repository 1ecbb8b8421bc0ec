//! Float tolerances and an ordered float for heaps and sorting.

/// Absolute tolerance used for "approximately equal" throughout the crate.
///
/// Coordinates are expected to be in map units (meters, pixels), where
/// anything closer than this is considered the same point.
pub const EPS: f64 = 1e-6;

/// Are `a` and `b` within [`EPS`] of each other?
#[inline]
pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}

/// A wrapper for `f64` that implements `Ord`.
///
/// It doesn't guard against NaN on construction, and compares NaN as equal
/// to everything. Costs that go into a heap are checked for finiteness
/// before they get there.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct CheapOrderedFloat(f64);

impl CheapOrderedFloat {
    /// Retrieve the inner `f64`.
    pub fn into_inner(self) -> f64 {
        self.0
    }
}

impl Eq for CheapOrderedFloat {}

impl PartialOrd for CheapOrderedFloat {
    #[inline(always)]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CheapOrderedFloat {
    #[inline(always)]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.0 < other.0 {
            std::cmp::Ordering::Less
        } else if self.0 > other.0 {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    }
}

impl From<f64> for CheapOrderedFloat {
    fn from(value: f64) -> Self {
        CheapOrderedFloat(value)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn ordering() {
        let mut xs: Vec<CheapOrderedFloat> = [3.0, -1.0, 2.5, 0.0]
            .into_iter()
            .map(CheapOrderedFloat::from)
            .collect();
        xs.sort();
        let xs: Vec<f64> = xs.into_iter().map(CheapOrderedFloat::into_inner).collect();
        assert_eq!(xs, vec![-1.0, 0.0, 2.5, 3.0]);
    }

    proptest! {
        #[test]
        fn agrees_with_partial_cmp(a in -1e6f64..1e6, b in -1e6f64..1e6) {
            let ord = CheapOrderedFloat::from(a).cmp(&CheapOrderedFloat::from(b));
            prop_assert_eq!(Some(ord), a.partial_cmp(&b));
        }
    }
}
