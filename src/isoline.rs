//! Input isolines and the stacks they come in.

use kurbo::Rect;

use crate::{geom::Point, num::EPS};

/// A single, possibly closed, polyline.
///
/// Cyclic isolines do not repeat their first vertex at the end; the edge
/// from the last vertex back to the first is implicit.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Isoline {
    /// The vertices, in order.
    pub points: Vec<Point>,
    /// Whether there is an edge from the last vertex back to the first.
    pub cyclic: bool,
}

/// Parameters for [`IsolineStack::cleanup`].
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Points closer than this are merged.
    pub eps: f64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig { eps: EPS }
    }
}

impl Isoline {
    /// An open polyline.
    pub fn open(points: impl IntoIterator<Item = impl Into<Point>>) -> Self {
        Isoline {
            points: points.into_iter().map(Into::into).collect(),
            cyclic: false,
        }
    }

    /// A closed polyline.
    pub fn closed(points: impl IntoIterator<Item = impl Into<Point>>) -> Self {
        Isoline {
            points: points.into_iter().map(Into::into).collect(),
            cyclic: true,
        }
    }

    /// The number of vertices.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Are there no vertices at all?
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The index after `i`, wrapping around if the isoline is cyclic.
    pub fn next(&self, i: usize) -> Option<usize> {
        if i + 1 < self.len() {
            Some(i + 1)
        } else if self.cyclic && !self.is_empty() {
            Some(0)
        } else {
            None
        }
    }

    /// The index before `i`, wrapping around if the isoline is cyclic.
    pub fn prev(&self, i: usize) -> Option<usize> {
        if i > 0 {
            Some(i - 1)
        } else if self.cyclic && !self.is_empty() {
            Some(self.len() - 1)
        } else {
            None
        }
    }

    /// All edges, including the closing one of a cyclic isoline.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let closing = self
            .cyclic
            .then(|| self.points.last().zip(self.points.first()))
            .flatten()
            .filter(|_| self.len() > 2)
            .map(|(p, q)| (*p, *q));
        self.points.windows(2).map(|w| (w[0], w[1])).chain(closing)
    }

    /// The total length of all edges.
    pub fn perimeter(&self) -> f64 {
        self.edges().map(|(p, q)| p.distance(q)).sum()
    }

    /// Closes an open isoline whose endpoints coincide, and merges
    /// consecutive coincident vertices.
    pub fn cleanup(&mut self, config: &CleanupConfig) {
        let close = |p: &Point, q: &Point| p.distance(*q) <= config.eps;

        if !self.cyclic && self.len() > 1 {
            if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
                if close(first, last) {
                    self.points.pop();
                    self.cyclic = true;
                }
            }
        }

        self.points.dedup_by(|q, p| close(p, q));
        while self.cyclic && self.len() > 1 {
            match (self.points.first(), self.points.last()) {
                (Some(first), Some(last)) if close(first, last) => {
                    self.points.pop();
                }
                _ => break,
            }
        }
    }
}

/// An ordered stack of isolines; neighbours in the stack get aligned.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IsolineStack {
    /// The isolines, ordered by layer.
    pub isolines: Vec<Isoline>,
}

impl IsolineStack {
    /// Creates a stack from isolines ordered by layer.
    pub fn new(isolines: Vec<Isoline>) -> Self {
        IsolineStack { isolines }
    }

    /// The number of layers.
    pub fn len(&self) -> usize {
        self.isolines.len()
    }

    /// Are there no layers at all?
    pub fn is_empty(&self) -> bool {
        self.isolines.is_empty()
    }

    /// The total number of vertices over all layers.
    pub fn vertex_count(&self) -> usize {
        self.isolines.iter().map(Isoline::len).sum()
    }

    /// The smallest rectangle containing every vertex.
    pub fn bounding_box(&self) -> Option<Rect> {
        let mut points = self.isolines.iter().flat_map(|iso| iso.points.iter());
        let first = points.next()?;
        Some(points.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)))
    }

    /// The length of the bounding box diagonal, used to make absolute
    /// thresholds scale-independent.
    pub fn distance_norm(&self) -> f64 {
        self.bounding_box()
            .map(|r| Point::new(r.x0, r.y0).distance(Point::new(r.x1, r.y1)))
            .unwrap_or(0.0)
    }

    /// Cleans up every isoline; see [`Isoline::cleanup`].
    pub fn cleanup(&mut self, config: &CleanupConfig) {
        for iso in &mut self.isolines {
            iso.cleanup(config);
        }
    }
}

impl FromIterator<Isoline> for IsolineStack {
    fn from_iter<T: IntoIterator<Item = Isoline>>(iter: T) -> Self {
        IsolineStack::new(iter.into_iter().collect())
    }
}
