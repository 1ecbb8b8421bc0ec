//! Utilities for fuzz and/or property testing using `arbitrary`.

use arbitrary::Unstructured;

use crate::{
    distance::CostMatrix,
    geom::Point,
    isoline::{Isoline, IsolineStack},
};

/// Generate an arbitrary float in some range.
pub fn float_in_range(start: f64, end: f64, u: &mut Unstructured<'_>) -> Result<f64, arbitrary::Error> {
    let num: u32 = u.arbitrary()?;
    let t = num as f64 / u32::MAX as f64;
    Ok((1.0 - t) * start + t * end)
}

/// Generate an arbitrary cost matrix with at most `max_dim` rows and columns.
///
/// There are three flavors, chosen at random: small integer costs (so that
/// there are lots of ties for the tie-breaking rules to resolve), uniform
/// random costs, and Euclidean distances between two roughly parallel
/// polylines.
pub fn cost_matrix(u: &mut Unstructured<'_>, max_dim: usize) -> Result<CostMatrix, arbitrary::Error> {
    let rows = u.int_in_range(1..=max_dim.max(1))?;
    let cols = u.int_in_range(1..=max_dim.max(1))?;
    let flavor: u8 = u.int_in_range(0..=2)?;
    match flavor {
        0 => {
            let costs = (0..rows * cols)
                .map(|_| u.int_in_range(0..=3u8).map(f64::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CostMatrix::from_row_major(rows, cols, costs))
        }
        1 => {
            let costs = (0..rows * cols)
                .map(|_| float_in_range(0.0, 1.0, u))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CostMatrix::from_row_major(rows, cols, costs))
        }
        _ => {
            let lower = wobbly_line(u, rows, 0.0, 1.0)?;
            let upper = wobbly_line(u, cols, 1.0, rows as f64 / cols as f64)?;
            Ok(CostMatrix::euclidean(&lower, &upper))
        }
    }
}

/// `n` points with x roughly `spacing` apart, and y within one unit of `y`.
fn wobbly_line(u: &mut Unstructured<'_>, n: usize, y: f64, spacing: f64) -> Result<Vec<Point>, arbitrary::Error> {
    (0..n)
        .map(|i| {
            Ok(Point::new(
                i as f64 * spacing + float_in_range(0.0, 1.0, u)?,
                y + float_in_range(0.0, 1.0, u)?,
            ))
        })
        .collect()
}

/// Generate a stack of roughly parallel isolines.
///
/// The isolines are either horizontal polylines stacked at increasing
/// heights, or concentric star-shaped rings, with at most `max_len` vertices
/// each. Vertices are perturbed; rings with only a few vertices can cut
/// through their inner neighbour.
pub fn isoline_stack(u: &mut Unstructured<'_>, max_len: usize) -> Result<IsolineStack, arbitrary::Error> {
    let count = u.int_in_range(1..=4usize)?;
    let rings: bool = u.arbitrary()?;
    let mut isolines = Vec::with_capacity(count);
    for k in 0..count {
        let len = u.int_in_range(if rings { 3 } else { 2 }..=max_len.max(4))?;
        let iso = if rings {
            let points = (0..len)
                .map(|i| {
                    let angle = (i as f64 + float_in_range(-0.3, 0.3, u)?) * std::f64::consts::TAU / len as f64;
                    let r = 10.0 * (k + 1) as f64 + float_in_range(-3.0, 3.0, u)?;
                    Ok(Point::new(r * angle.cos(), r * angle.sin()))
                })
                .collect::<Result<Vec<_>, arbitrary::Error>>()?;
            Isoline::closed(points)
        } else {
            let points = (0..len)
                .map(|i| {
                    let x = i as f64 + float_in_range(-0.3, 0.3, u)?;
                    let y = 10.0 * k as f64 + float_in_range(-3.0, 3.0, u)?;
                    Ok(Point::new(x, y))
                })
                .collect::<Result<Vec<_>, arbitrary::Error>>()?;
            Isoline::open(points)
        };
        isolines.push(iso);
    }
    Ok(IsolineStack::new(isolines))
}
