//! `LinearEdge`: the common edge representation shared by the `Edged` and
//! `EdgedClipped` face variants (§3, §4.1).

use crate::geometry::{Bounds2, Pt2};

/// An ordered edge `startPoint -> endPoint`. `count_only` marks an edge whose
/// geometric extent has been collapsed to a box-corner chord during bounds
/// clipping: it still contributes to winding/area sums but is always
/// axis-aligned against the clip rectangle that produced it (data-model
/// invariant).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearEdge {
    pub start: Pt2,
    pub end: Pt2,
    pub count_only: bool,
}

impl LinearEdge {
    pub fn new(start: Pt2, end: Pt2) -> LinearEdge {
        LinearEdge {
            start,
            end,
            count_only: false,
        }
    }

    pub fn count_only(start: Pt2, end: Pt2) -> LinearEdge {
        LinearEdge {
            start,
            end,
            count_only: true,
        }
    }

    #[inline]
    pub fn dx(&self) -> f64 {
        self.end.x - self.start.x
    }

    #[inline]
    pub fn dy(&self) -> f64 {
        self.end.y - self.start.y
    }

    pub fn bounds(&self) -> Bounds2 {
        Bounds2::from_points([self.start, self.end])
    }

    pub fn reversed(&self) -> LinearEdge {
        LinearEdge {
            start: self.end,
            end: self.start,
            count_only: self.count_only,
        }
    }

    pub fn translated(&self, dx: f64, dy: f64) -> LinearEdge {
        LinearEdge {
            start: Pt2::new(self.start.x + dx, self.start.y + dy),
            end: Pt2::new(self.end.x + dx, self.end.y + dy),
            count_only: self.count_only,
        }
    }

    /// The shoelace contribution `x0*y1 - x1*y0` of this directed edge.
    #[inline]
    pub fn shoelace_term(&self) -> f64 {
        self.start.x * self.end.y - self.end.x * self.start.y
    }
}
