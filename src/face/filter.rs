//! Analytic polygon-filter convolution: `getBilinearFiltered` and
//! `getMitchellNetravaliFiltered` (§4.1).
//!
//! Both kernels are separable and piecewise-polynomial in `u = x - px` (and
//! `v = y - py`). Within one piece `k(u) = c0 + c1 u + c2 u^2 + c3 u^3`, so the
//! double integral of the separable product `kx(u) * ky(v)` over a cell
//! between consecutive x/y breakpoints is a weighted sum of the polygon
//! moments `crate::face::moment::moment(edges, a, b)` for `a, b in 0..=3` —
//! the same machinery the centroid (`a=1,b=0` / `a=0,b=1`) already uses.
//! Box filtering does not need this machinery: it is just `getClipped` area.

use super::clip::clip_to_bounds;
use super::linear_edge::LinearEdge;
use super::moment::moment;
use super::ClippableFace;
use crate::geometry::{Bounds2, Pt2};

/// `(lo, hi, [c0, c1, c2, c3])` pieces of a 1-D separable reconstruction
/// kernel, expressed as a polynomial directly in the signed offset `u`
/// (so mirrored pieces for `u < 0` already carry the correct odd-term signs).
type KernelPieces = [(f64, f64, [f64; 4])];

const BILINEAR: [(f64, f64, [f64; 4]); 2] = [
    (-1.0, 0.0, [1.0, 1.0, 0.0, 0.0]),
    (0.0, 1.0, [1.0, -1.0, 0.0, 0.0]),
];

// Mitchell-Netravali with B = C = 1/3, the standard choice.
const MITCHELL: [(f64, f64, [f64; 4]); 4] = [
    (-2.0, -1.0, [16.0 / 9.0, 10.0 / 3.0, 2.0, 7.0 / 18.0]),
    (-1.0, 0.0, [8.0 / 9.0, 0.0, -2.0, -7.0 / 6.0]),
    (0.0, 1.0, [8.0 / 9.0, 0.0, -2.0, 7.0 / 6.0]),
    (1.0, 2.0, [16.0 / 9.0, -10.0 / 3.0, 2.0, -7.0 / 18.0]),
];

fn eval_cell(face: &ClippableFace, cell: Bounds2, px: f64, py: f64, cx: [f64; 4], cy: [f64; 4]) -> f64 {
    let clipped = clip_to_bounds(face, cell);
    if clipped.get_bounds().is_empty() {
        return 0.0;
    }
    let shifted: Vec<LinearEdge> = clipped
        .edges()
        .into_iter()
        .map(|e| e.translated(-px, -py))
        .collect();
    if shifted.is_empty() {
        return 0.0;
    }
    let mut total = 0.0;
    for a in 0..4 {
        if cx[a] == 0.0 {
            continue;
        }
        for b in 0..4 {
            if cy[b] == 0.0 {
                continue;
            }
            total += cx[a] * cy[b] * moment(&shifted, a as i32, b as i32);
        }
    }
    total
}

/// Generic separable-kernel convolution of `face` against a pixel centered at
/// `(px, py)`, sampled with a sub-pixel offset `(sub_x, sub_y)` (read per the
/// resolved open question in `DESIGN.md`: the sample point is simply
/// `(px + sub_x, py + sub_y)`, keeping the kernel piece table fixed).
fn filter_integral(
    face: &ClippableFace,
    px: f64,
    py: f64,
    sub_x: f64,
    sub_y: f64,
    pieces: &KernelPieces,
) -> f64 {
    let cx = px + sub_x;
    let cy = py + sub_y;
    let bounds = face.get_bounds();
    let mut total = 0.0;
    for &(xlo, xhi, cxs) in pieces {
        let cell_x0 = cx + xlo;
        let cell_x1 = cx + xhi;
        if cell_x1 <= bounds.min_x || cell_x0 >= bounds.max_x {
            continue;
        }
        for &(ylo, yhi, cys) in pieces {
            let cell_y0 = cy + ylo;
            let cell_y1 = cy + yhi;
            if cell_y1 <= bounds.min_y || cell_y0 >= bounds.max_y {
                continue;
            }
            let cell = Bounds2::new(cell_x0, cell_y0, cell_x1, cell_y1);
            total += eval_cell(face, cell, cx, cy, cxs, cys);
        }
    }
    total
}

pub fn bilinear_filtered(face: &ClippableFace, px: f64, py: f64, sub_x: f64, sub_y: f64) -> f64 {
    filter_integral(face, px, py, sub_x, sub_y, &BILINEAR)
}

pub fn mitchell_netravali_filtered(
    face: &ClippableFace,
    px: f64,
    py: f64,
    sub_x: f64,
    sub_y: f64,
) -> f64 {
    filter_integral(face, px, py, sub_x, sub_y, &MITCHELL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pt2 as P;

    fn big_square() -> ClippableFace {
        // Large enough to fully contain any filter's support around the origin.
        ClippableFace::Polygonal(vec![vec![
            P::new(-10.0, -10.0),
            P::new(10.0, -10.0),
            P::new(10.0, 10.0),
            P::new(-10.0, 10.0),
        ]])
    }

    #[test]
    fn bilinear_kernel_integrates_to_one_over_full_support() {
        let face = big_square();
        let w = bilinear_filtered(&face, 0.0, 0.0, 0.0, 0.0);
        assert!((w - 1.0).abs() < 1e-6, "weight = {w}");
    }

    #[test]
    fn mitchell_kernel_integrates_to_one_over_full_support() {
        let face = big_square();
        let w = mitchell_netravali_filtered(&face, 0.0, 0.0, 0.0, 0.0);
        assert!((w - 1.0).abs() < 1e-5, "weight = {w}");
    }
}
