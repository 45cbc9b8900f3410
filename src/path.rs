//! `RenderPath`: a fill rule plus an ordered set of polygonal subpaths.
//!
//! Inputs are always polygonal (flattening of curves happens upstream, see
//! §1's Non-goals), so a subpath is just an ordered list of vertices whose
//! implicit closing edge returns to the first vertex.

use crate::geometry::{Bounds2, Pt2};

/// The four fill rules a `RenderPath` may request; drives the winding ->
/// inside/outside decision in CAG's path-program resolution step (§4.2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillRule {
    NonZero,
    EvenOdd,
    Positive,
    Negative,
}

impl FillRule {
    /// Whether a face with the given signed winding number is "inside" this
    /// path under this fill rule.
    #[inline]
    pub fn is_inside(&self, winding: i32) -> bool {
        match self {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding.rem_euclid(2) != 0,
            FillRule::Positive => winding > 0,
            FillRule::Negative => winding < 0,
        }
    }
}

/// A single closed loop of vertices. Implicitly closed: the last vertex
/// connects back to the first. A subpath with fewer than three vertices is
/// zero-area and is ignored by consumers (data-model invariant).
#[derive(Debug, Clone, PartialEq)]
pub struct Subpath {
    pub vertices: Vec<Pt2>,
}

impl Subpath {
    pub fn new(vertices: Vec<Pt2>) -> Subpath {
        Subpath { vertices }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Iterate the closed edge loop `(v[i], v[(i+1) % n])`.
    pub fn edges(&self) -> impl Iterator<Item = (Pt2, Pt2)> + '_ {
        let n = self.vertices.len();
        (0..n).filter(move |_| n > 0).map(move |i| {
            let a = self.vertices[i];
            let b = self.vertices[(i + 1) % n];
            (a, b)
        })
    }

    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_points(self.vertices.iter().copied())
    }
}

/// A `RenderPath`: a fill rule plus an ordered list of subpaths. Paths are
/// value objects with structural equality; CAG identifies a path by its
/// position in the input slice (see `crate::cag::PathId`), not by this
/// struct's address, so no `Eq`/`Hash` impl is provided here beyond what
/// tests need via `PartialEq`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPath {
    pub fill_rule: FillRule,
    pub subpaths: Vec<Subpath>,
}

impl RenderPath {
    pub fn new(fill_rule: FillRule, subpaths: Vec<Subpath>) -> RenderPath {
        RenderPath {
            fill_rule,
            subpaths,
        }
    }

    pub fn rectangle(fill_rule: FillRule, min: Pt2, max: Pt2) -> RenderPath {
        RenderPath::new(
            fill_rule,
            vec![Subpath::new(vec![
                Pt2::new(min.x, min.y),
                Pt2::new(max.x, min.y),
                Pt2::new(max.x, max.y),
                Pt2::new(min.x, max.y),
            ])],
        )
    }

    pub fn bounds(&self) -> Bounds2 {
        self.subpaths
            .iter()
            .filter(|s| !s.is_degenerate())
            .map(Subpath::bounds)
            .fold(Bounds2::EMPTY, |a, b| a.union(b))
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(Subpath::is_degenerate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonzero_includes_any_nonzero_winding() {
        assert!(FillRule::NonZero.is_inside(2));
        assert!(FillRule::NonZero.is_inside(-1));
        assert!(!FillRule::NonZero.is_inside(0));
    }

    #[test]
    fn evenodd_alternates() {
        assert!(!FillRule::EvenOdd.is_inside(0));
        assert!(FillRule::EvenOdd.is_inside(1));
        assert!(!FillRule::EvenOdd.is_inside(2));
        assert!(FillRule::EvenOdd.is_inside(-1));
    }

    #[test]
    fn degenerate_subpaths_are_excluded_from_bounds() {
        let p = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![Pt2::new(0.0, 0.0), Pt2::new(1.0, 0.0)])],
        );
        assert!(p.bounds().is_empty());
    }
}
