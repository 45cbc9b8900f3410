//! Analytic polygon moment integrals `∫∫ x^a y^b dA`, computed edge-by-edge
//! via Green's theorem. Area (a=b=0) and the first moments used for the
//! centroid (a=1,b=0 / a=0,b=1) are the classic shoelace formulas; the same
//! machinery generalizes to the higher moments the polygon filter kernels
//! (`crate::face::filter`) need.

use super::linear_edge::LinearEdge;

/// 5-point Gauss-Legendre quadrature nodes/weights on `[0, 1]`, exact for
/// polynomials up to degree 9 — comfortably more than the degree-7 integrands
/// (`a, b <= 3`) this module evaluates.
const GAUSS5_NODES: [f64; 5] = [
    0.046_910_077_030_668_04,
    0.230_765_344_947_158_5,
    0.5,
    0.769_234_655_052_841_5,
    0.953_089_922_969_332,
];
const GAUSS5_WEIGHTS: [f64; 5] = [
    0.118_463_442_528_094_5,
    0.239_314_335_249_683_23,
    0.284_444_444_444_444_44,
    0.239_314_335_249_683_23,
    0.118_463_442_528_094_5,
];

#[inline]
fn gauss5(f: impl Fn(f64) -> f64) -> f64 {
    let mut sum = 0.0;
    for i in 0..5 {
        sum += GAUSS5_WEIGHTS[i] * f(GAUSS5_NODES[i]);
    }
    sum
}

/// `∫∫_polygon x^a y^b dA` for a closed (possibly multi-loop, possibly
/// unordered-but-balanced) set of directed edges, via the Green's-theorem
/// identity `∫∫ x^a y^b dA = -1/(b+1) ∮ x^a y^(b+1) dx`.
pub fn moment(edges: &[LinearEdge], a: i32, b: i32) -> f64 {
    debug_assert!(a >= 0 && b >= 0);
    let mut total = 0.0;
    for e in edges {
        let (x0, y0, dx) = (e.start.x, e.start.y, e.dx());
        let dy = e.dy();
        let integrand = |t: f64| -> f64 {
            let x = x0 + t * dx;
            let y = y0 + t * dy;
            x.powi(a) * y.powi(b + 1)
        };
        total += dx * gauss5(integrand);
    }
    -total / (b as f64 + 1.0)
}

/// Signed area via the shoelace sum (equivalent to `moment(edges, 0, 0)` but
/// cheaper and exact in floating point for the common case).
pub fn area(edges: &[LinearEdge]) -> f64 {
    0.5 * edges.iter().map(LinearEdge::shoelace_term).sum::<f64>()
}

/// Pre-division centroid moment `(Mx, My)`, i.e. `(∫∫x dA, ∫∫y dA)`.
pub fn centroid_partial(edges: &[LinearEdge]) -> (f64, f64) {
    (moment(edges, 1, 0), moment(edges, 0, 1))
}

pub fn centroid(edges: &[LinearEdge], area: f64) -> (f64, f64) {
    if area.abs() < 1e-12 {
        return (0.0, 0.0);
    }
    let (mx, my) = centroid_partial(edges);
    (mx / area, my / area)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pt2;

    fn square_edges() -> Vec<LinearEdge> {
        let pts = [
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ];
        (0..4)
            .map(|i| LinearEdge::new(pts[i], pts[(i + 1) % 4]))
            .collect()
    }

    #[test]
    fn unit_square_has_unit_area() {
        let edges = square_edges();
        assert!((area(&edges) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unit_square_centroid_is_center() {
        let edges = square_edges();
        let a = area(&edges);
        let (cx, cy) = centroid(&edges, a);
        assert!((cx - 0.5).abs() < 1e-9);
        assert!((cy - 0.5).abs() < 1e-9);
    }

    #[test]
    fn second_moment_matches_closed_form() {
        // integral of x^2 over the unit square is 1/3.
        let edges = square_edges();
        assert!((moment(&edges, 2, 0) - 1.0 / 3.0).abs() < 1e-9);
    }
}
