//! Step 1 of CAG (§4.2): choose a common scale and convert every path vertex
//! to an integer-coordinate (exposed as rational) point, carrying the inverse
//! transform for later.

use crate::error::{RasterError, RasterResult};
use crate::numeric::rational::RationalPoint2;
use crate::path::RenderPath;
use crate::winding::PathId;

/// Integer coordinates are kept within +/- this magnitude so that a single
/// cross-product (two multiplications) during face tracing cannot overflow
/// `i128`.
const SAFE_INTEGER_RANGE: f64 = 1_000_000_000.0;

pub struct IntegerizedEdge {
    pub path: PathId,
    pub start: RationalPoint2,
    pub end: RationalPoint2,
}

pub struct Integerized {
    pub edges: Vec<IntegerizedEdge>,
    /// Multiply rational coordinates by this to return to the input's scale.
    pub inv_scale: f64,
    /// Translation applied before scaling (in the input's original space).
    pub origin: (f64, f64),
}

pub fn integerize(paths: &[RenderPath]) -> RasterResult<Integerized> {
    let bounds = super::paths_bounds(paths);
    let (origin, span) = if bounds.is_empty() {
        ((0.0, 0.0), 1.0)
    } else {
        (
            (bounds.min_x, bounds.min_y),
            (bounds.width().max(bounds.height())).max(1e-9),
        )
    };

    // Map the path bounds into [0, SAFE_INTEGER_RANGE].
    let scale = SAFE_INTEGER_RANGE / span;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RasterError::NumericOverflow);
    }
    let inv_scale = 1.0 / scale;

    let mut edges = Vec::new();
    for (path_idx, path) in paths.iter().enumerate() {
        for subpath in &path.subpaths {
            if subpath.is_degenerate() {
                continue;
            }
            for (a, b) in subpath.edges() {
                let sx = ((a.x - origin.0) * scale).round() as i128;
                let sy = ((a.y - origin.1) * scale).round() as i128;
                let ex = ((b.x - origin.0) * scale).round() as i128;
                let ey = ((b.y - origin.1) * scale).round() as i128;
                edges.push(IntegerizedEdge {
                    path: path_idx as PathId,
                    start: RationalPoint2::from_int(sx, sy),
                    end: RationalPoint2::from_int(ex, ey),
                });
            }
        }
    }

    Ok(Integerized {
        edges,
        inv_scale,
        origin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{FillRule, Subpath};

    #[test]
    fn integerizes_a_unit_square() {
        let path = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                crate::geometry::Pt2::new(0.0, 0.0),
                crate::geometry::Pt2::new(1.0, 0.0),
                crate::geometry::Pt2::new(1.0, 1.0),
                crate::geometry::Pt2::new(0.0, 1.0),
            ])],
        );
        let result = integerize(&[path]).unwrap();
        assert_eq!(result.edges.len(), 4);
        for e in &result.edges {
            let (x, y) = e.start.to_f64();
            assert!(x.abs() * result.inv_scale <= 1.0 + 1e-6);
            assert!(y.abs() * result.inv_scale <= 1.0 + 1e-6);
        }
    }
}
