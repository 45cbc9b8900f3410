//! `DepthSort` splitting (§4.3): partitions a face into the cells induced by
//! every pairwise front/back separating half-plane of its `RenderPlanar`
//! items, and replaces each cell's fragment list with a `Stack` in that
//! cell's front-to-back order.

use nalgebra::{Matrix3, Vector3};

use crate::face::clip::binary_line_clip;
use crate::face::ClippableFace;
use crate::geometry::{Pt3, Vec2};

use super::node::{ProgramRef, RenderPlanar, RenderProgram};

const MIN_CELL_AREA: f64 = 1e-8;

/// Coefficients `(a, b, c)` of the plane `z = a*x + b*y + c` through a
/// triangle's three vertices, fit by solving the 3x3 linear system directly
/// (degenerate -- zero-area -- triangles return a flat `z = 0` plane, which
/// only ever matters for discarded zero-area cells).
fn plane_coeffs(tri: &[Pt3; 3]) -> (f64, f64, f64) {
    let m = Matrix3::new(
        tri[0].x, tri[0].y, 1.0,
        tri[1].x, tri[1].y, 1.0,
        tri[2].x, tri[2].y, 1.0,
    );
    let z = Vector3::new(tri[0].z, tri[1].z, tri[2].z);
    match m.lu().solve(&z) {
        Some(sol) => (sol.x, sol.y, sol.z),
        None => (0.0, 0.0, 0.0),
    }
}

fn depth_at(plane: (f64, f64, f64), x: f64, y: f64) -> f64 {
    plane.0 * x + plane.1 * y + plane.2
}

/// Recursively split `face` by every pair of items whose planes actually
/// cross inside it. `candidates` holds the items still relevant to this
/// sub-face (all items are candidates at the top level); planes are
/// precomputed once by the caller and indexed by position in `items`.
fn partition(
    face: ClippableFace,
    items: &[RenderPlanar],
    planes: &[(f64, f64, f64)],
    pairs: &[(usize, usize)],
    pair_idx: usize,
    out: &mut Vec<(ClippableFace, ProgramRef)>,
) {
    if face.get_area().abs() < MIN_CELL_AREA {
        return;
    }
    if pair_idx >= pairs.len() {
        out.push((face.clone(), order_stack(&face, items, planes)));
        return;
    }
    let (i, j) = pairs[pair_idx];
    let (ai, bi, _) = planes[i];
    let (aj, bj, _) = planes[j];
    let da = ai - aj;
    let db = bi - bj;
    if da.abs() < 1e-12 && db.abs() < 1e-12 {
        // Planes are parallel over this whole cell; no crossing, skip to the
        // next pair without splitting.
        partition(face, items, planes, pairs, pair_idx + 1, out);
        return;
    }
    let dc = planes[i].2 - planes[j].2;
    let normal = Vec2::new(da, db);
    let d = -dc;
    let (below, above) = binary_line_clip(&face, normal, d);
    partition(below, items, planes, pairs, pair_idx + 1, out);
    partition(above, items, planes, pairs, pair_idx + 1, out);
}

fn order_stack(
    face: &ClippableFace,
    items: &[RenderPlanar],
    planes: &[(f64, f64, f64)],
) -> ProgramRef {
    let area = face.get_area();
    let (cx, cy) = face.get_centroid(area);
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        let za = depth_at(planes[a], cx, cy);
        let zb = depth_at(planes[b], cx, cy);
        // Front-to-back: larger z (closer to the viewer) sorts first.
        zb.partial_cmp(&za).unwrap_or(std::cmp::Ordering::Equal)
    });
    let children = order.into_iter().map(|i| items[i].program.clone()).collect();
    super::simplify::simplify(&RenderProgram::stack(children))
}

/// Split `face` into its `DepthSort` cells, each paired with the `Stack`
/// program giving that cell's resolved painter's-algorithm order. Cells
/// below `1e-8` area are discarded, per the splitting contract.
pub fn split(face: &ClippableFace, items: &[RenderPlanar]) -> Vec<(ClippableFace, ProgramRef)> {
    if items.is_empty() {
        return Vec::new();
    }
    if items.len() == 1 {
        return vec![(face.clone(), items[0].program.clone())];
    }
    let planes: Vec<_> = items.iter().map(|i| plane_coeffs(&i.triangle)).collect();
    let mut pairs = Vec::new();
    for i in 0..items.len() {
        for j in (i + 1)..items.len() {
            pairs.push((i, j));
        }
    }
    let mut out = Vec::new();
    partition(face.clone(), items, &planes, &pairs, 0, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color4;
    use crate::geometry::Pt2;

    fn square() -> ClippableFace {
        ClippableFace::Polygonal(vec![vec![
            Pt2::new(-1.0, -1.0),
            Pt2::new(1.0, -1.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(-1.0, 1.0),
        ]])
    }

    #[test]
    fn crossing_triangles_split_into_two_cells_with_opposite_order() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let blue = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0)));
        // Two triangles covering the square, sloped so their planes cross at x=0.
        let front_left = RenderPlanar {
            program: red,
            triangle: [
                Pt3::new(-1.0, -1.0, 1.0),
                Pt3::new(1.0, -1.0, -1.0),
                Pt3::new(0.0, 1.0, 0.0),
            ],
        };
        let front_right = RenderPlanar {
            program: blue,
            triangle: [
                Pt3::new(-1.0, -1.0, -1.0),
                Pt3::new(1.0, -1.0, 1.0),
                Pt3::new(0.0, 1.0, 0.0),
            ],
        };
        let cells = split(&square(), &[front_left, front_right]);
        assert!(cells.len() >= 2);
        let total_area: f64 = cells.iter().map(|(f, _)| f.get_area()).sum();
        assert!((total_area - square().get_area()).abs() < 1e-6);
    }

    #[test]
    fn single_item_is_not_split() {
        let color = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 1.0, 1.0, 1.0)));
        let item = RenderPlanar {
            program: color,
            triangle: [
                Pt3::new(-1.0, -1.0, 0.0),
                Pt3::new(1.0, -1.0, 0.0),
                Pt3::new(0.0, 1.0, 0.0),
            ],
        };
        let cells = split(&square(), &[item]);
        assert_eq!(cells.len(), 1);
    }
}
