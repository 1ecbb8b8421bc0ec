#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

#[macro_use]
mod typed_vec;

pub mod align;
#[cfg(any(test, feature = "arbitrary"))]
pub mod arbitrary;
pub mod distance;
pub mod geom;
pub mod hausdorff;
pub mod isoline;
mod num;
mod segments;
pub mod simplify;

#[cfg(feature = "generators")]
pub mod generators;

pub use align::{AlignConfig, AlignMethod, Alignment, MatchFilters, MatchInterval};
pub use distance::Metric;
pub use geom::Point;
pub use isoline::{CleanupConfig, Isoline, IsolineStack};
pub use num::CheapOrderedFloat;
pub use segments::{SegIdx, Segments};
pub use simplify::{AppliedCollapse, ScoreFunction, Simplifier, SimplifyConfig};

#[derive(Clone, Copy, Debug, PartialEq)]
/// Something went wrong.
pub enum Error {
    /// At least one of the inputs was infinite.
    Infinity,
    /// At least one of the inputs was not a number.
    NaN,
    /// A matching disagreed with the discrete Fréchet distance on one of its
    /// sub-intervals. This indicates a bug in the solver.
    InconsistentMatching {
        /// The first matched cell of the offending interval.
        from: (usize, usize),
        /// The last matched cell of the offending interval.
        to: (usize, usize),
        /// The largest cost on the matching between `from` and `to`.
        matched: f64,
        /// The discrete Fréchet distance between `from` and `to`.
        frechet: f64,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Infinity => write!(f, "one of the inputs was infinite"),
            Error::NaN => write!(f, "one of the inputs had a NaN"),
            Error::InconsistentMatching {
                from,
                to,
                matched,
                frechet,
            } => write!(
                f,
                "matching from {from:?} to {to:?} has cost {matched}, but the Fréchet distance is {frechet}"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Rejects stacks with non-finite coordinates.
pub(crate) fn check_finite(stack: &IsolineStack) -> Result<(), Error> {
    let coords = || {
        stack
            .isolines
            .iter()
            .flat_map(|iso| iso.points.iter())
            .flat_map(|p| [p.x, p.y])
    };
    if coords().any(f64::is_nan) {
        return Err(Error::NaN);
    }
    if coords().any(f64::is_infinite) {
        return Err(Error::Infinity);
    }
    Ok(())
}

/// Aligns every pair of consecutive isolines in `stack`.
///
/// The stack should already be cleaned up (see [`IsolineStack::cleanup`]):
/// repeated vertices make for ambiguous matchings.
pub fn align(stack: &IsolineStack, config: &AlignConfig) -> Result<Alignment, Error> {
    check_finite(stack)?;
    Ok(align::align_stack(stack, config))
}
