//! CAG steps 4-5 (§4.2): for each face, determines its final signed winding
//! number against every source path by representative-point winding-number
//! testing, then resolves every `PathBoolean` node in the paint program
//! against that winding map, substituting each into its `inside` or
//! `outside` branch and simplifying the result.

use crate::geometry::Pt2;
use crate::numeric::rational::{Rational, RationalPoint2};
use crate::path::RenderPath;
use crate::program::{simplify, ProgramKind, ProgramRef, RenderPlanar, RenderProgram};
use crate::winding::{PathId, WindingMap};

use super::RationalFace;

/// Signed crossing number of `path`'s boundary around `point`, by the
/// standard edge-crossing winding-number test: each upward crossing of the
/// horizontal ray through `point` contributes +1, each downward crossing
/// -1, independent of `path`'s own fill rule (fill rules only matter once
/// this number is compared against a threshold).
fn path_winding(point: Pt2, path: &RenderPath) -> i32 {
    let is_left = |a: Pt2, b: Pt2, p: Pt2| (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);
    let mut w = 0;
    for subpath in &path.subpaths {
        if subpath.is_degenerate() {
            continue;
        }
        for (a, b) in subpath.edges() {
            if a.y <= point.y {
                if b.y > point.y && is_left(a, b, point) > 0.0 {
                    w += 1;
                }
            } else if b.y <= point.y && is_left(a, b, point) < 0.0 {
                w -= 1;
            }
        }
    }
    w
}

/// Exact-rational interior-point sample, in the style of `point_in_loop`'s
/// ray-casting test (`crate::cag::halfedge`): sweep a horizontal line
/// through a y strictly between the two lowest distinct vertex y-values of
/// `face` (outer loop plus holes), so it can graze no vertex; the line
/// crosses the face's boundary an even number of times, and the widest
/// resulting even-odd interior interval's midpoint is guaranteed to lie
/// inside the face, even when `face` is non-convex (e.g. CAG's own
/// bowtie/pentagon overlap case) or has holes. Unlike the polygon's area
/// centroid, this sample point can never fall outside the face or inside a
/// hole.
fn interior_point(face: &RationalFace) -> RationalPoint2 {
    let loops: Vec<&Vec<RationalPoint2>> =
        std::iter::once(&face.outer).chain(face.holes.iter()).collect();

    let mut ys: Vec<Rational> = loops.iter().flat_map(|l| l.iter().map(|p| p.y)).collect();
    ys.sort();
    ys.dedup();
    if ys.len() < 2 {
        return face.outer[0];
    }
    let sweep_y = (ys[0] + ys[1]) / Rational::from_int(2);

    let mut xs: Vec<Rational> = Vec::new();
    for l in &loops {
        let n = l.len();
        for i in 0..n {
            let a = l[i];
            let b = l[(i + 1) % n];
            if (a.y > sweep_y) != (b.y > sweep_y) {
                let t_num = sweep_y - a.y;
                let t_den = b.y - a.y;
                xs.push(a.x + (b.x - a.x) * (t_num / t_den));
            }
        }
    }
    xs.sort();

    let mut best: Option<(Rational, Rational)> = None;
    let mut i = 0;
    while i + 1 < xs.len() {
        let width = xs[i + 1] - xs[i];
        if best.as_ref().map_or(true, |(w, _)| width > *w) {
            best = Some((width, (xs[i] + xs[i + 1]) / Rational::from_int(2)));
        }
        i += 2;
    }

    match best {
        Some((_, mid_x)) => RationalPoint2::new(mid_x, sweep_y),
        None => face.outer[0],
    }
}

fn face_winding(
    face: &RationalFace,
    paths: &[RenderPath],
    inv_scale: f64,
    origin: (f64, f64),
) -> WindingMap {
    let sample = interior_point(face);
    let (sx, sy) = sample.to_f64();
    let point = Pt2::new(sx * inv_scale + origin.0, sy * inv_scale + origin.1);

    let mut winding = WindingMap::empty();
    for (i, path) in paths.iter().enumerate() {
        winding.add_delta(i as PathId, path_winding(point, path));
    }
    winding
}

/// Recursively substitutes every `PathBoolean` node against `winding`,
/// keeping every other node shape intact; `PathBoolean` can appear nested
/// anywhere in the tree, not just at the root.
fn resolve_program(program: &ProgramRef, winding: &WindingMap) -> ProgramRef {
    match &program.kind {
        ProgramKind::PathBoolean {
            path,
            fill_rule,
            inside,
            outside,
        } => {
            let branch = if fill_rule.is_inside(winding.get(*path)) {
                inside
            } else {
                outside
            };
            resolve_program(branch, winding)
        }
        ProgramKind::Color(_)
        | ProgramKind::NormalDebug
        | ProgramKind::Image { .. }
        | ProgramKind::LinearGradient { .. }
        | ProgramKind::RadialGradient { .. }
        | ProgramKind::Phong { .. } => program.clone(),
        ProgramKind::Stack(children) => RenderProgram::stack(
            children
                .iter()
                .map(|c| resolve_program(c, winding))
                .collect(),
        ),
        ProgramKind::Alpha(child, a) => RenderProgram::alpha(resolve_program(child, winding), *a),
        ProgramKind::BlendCompose {
            src,
            dst,
            compose,
            blend,
        } => RenderProgram::blend_compose(
            resolve_program(src, winding),
            resolve_program(dst, winding),
            *compose,
            *blend,
        ),
        ProgramKind::Filter { matrix, child } => {
            RenderProgram::filter(matrix.clone(), resolve_program(child, winding))
        }
        ProgramKind::LinearBlend { from, to, start, end } => RenderProgram::linear_blend(
            resolve_program(from, winding),
            resolve_program(to, winding),
            *start,
            *end,
        ),
        ProgramKind::RadialBlend {
            from,
            to,
            center,
            radius,
        } => RenderProgram::radial_blend(
            resolve_program(from, winding),
            resolve_program(to, winding),
            *center,
            *radius,
        ),
        ProgramKind::BarycentricBlend { colors, triangle } => RenderProgram::barycentric_blend(
            [
                resolve_program(&colors[0], winding),
                resolve_program(&colors[1], winding),
                resolve_program(&colors[2], winding),
            ],
            *triangle,
        ),
        ProgramKind::BarycentricPerspectiveBlend { colors, triangle } => {
            RenderProgram::barycentric_perspective_blend(
                [
                    resolve_program(&colors[0], winding),
                    resolve_program(&colors[1], winding),
                    resolve_program(&colors[2], winding),
                ],
                *triangle,
            )
        }
        ProgramKind::Normalize(child) => RenderProgram::normalize(resolve_program(child, winding)),
        ProgramKind::DepthSort(items) => {
            let items = items
                .iter()
                .map(|i| RenderPlanar {
                    program: resolve_program(&i.program, winding),
                    triangle: i.triangle,
                })
                .collect();
            RenderProgram::depth_sort(items)
        }
        ProgramKind::Premultiply(child) => {
            RenderProgram::premultiply(resolve_program(child, winding))
        }
        ProgramKind::Unpremultiply(child) => {
            RenderProgram::unpremultiply(resolve_program(child, winding))
        }
        ProgramKind::ColorSpaceConvert { from, to, child } => {
            RenderProgram::color_space_convert(*from, *to, resolve_program(child, winding))
        }
    }
}

/// CAG steps 4-5: compute each face's final winding map by representative-
/// point testing against every source path, then resolve `program`'s
/// `PathBoolean` nodes against it and simplify the result.
pub fn resolve_winding_and_programs(
    faces: Vec<RationalFace>,
    paths: &[RenderPath],
    program: &ProgramRef,
    inv_scale: f64,
    origin: (f64, f64),
) -> Vec<RationalFace> {
    faces
        .into_iter()
        .map(|face| {
            let winding = face_winding(&face, paths, inv_scale, origin);
            let resolved = simplify::simplify(&resolve_program(program, &winding));
            RationalFace {
                winding,
                program: resolved,
                ..face
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color4;
    use crate::face::ClippableFace;
    use crate::numeric::rational::RationalPoint2;
    use crate::path::{FillRule, Subpath};

    fn unit_square_path() -> RenderPath {
        RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(0.0, 0.0),
                Pt2::new(1.0, 0.0),
                Pt2::new(1.0, 1.0),
                Pt2::new(0.0, 1.0),
            ])],
        )
    }

    fn rational_square(min: i128, max: i128) -> RationalFace {
        RationalFace {
            outer: vec![
                RationalPoint2::from_int(min, min),
                RationalPoint2::from_int(max, min),
                RationalPoint2::from_int(max, max),
                RationalPoint2::from_int(min, max),
            ],
            holes: Vec::new(),
            winding: WindingMap::empty(),
            program: RenderProgram::color(Color4::TRANSPARENT),
        }
    }

    #[test]
    fn point_inside_path_gets_winding_one() {
        let path = unit_square_path();
        let face = rational_square(0, 10);
        let resolved = resolve_winding_and_programs(
            vec![face],
            &[path],
            &RenderProgram::color(Color4::TRANSPARENT),
            0.1,
            (0.0, 0.0),
        );
        assert_eq!(resolved[0].winding.get(0), 1);
    }

    #[test]
    fn path_boolean_selects_inside_branch_for_covered_face() {
        let path = unit_square_path();
        let inside = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let outside = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0)));
        let program = RenderProgram::path_boolean(0, FillRule::NonZero, inside.clone(), outside);
        let face = rational_square(0, 10);
        let resolved =
            resolve_winding_and_programs(vec![face], &[path], &program, 0.1, (0.0, 0.0));
        assert!(simplify::program_eq(&resolved[0].program, &inside));
    }

    #[test]
    fn face_winding_helper_matches_to_polygonal_area() {
        let face = rational_square(0, 10);
        let polygonal = face.to_polygonal(0.1, (0.0, 0.0));
        match polygonal {
            ClippableFace::Polygonal(polys) => assert_eq!(polys[0].len(), 4),
            other => panic!("expected polygonal face, got {:?}", other),
        }
    }

    #[test]
    fn face_winding_samples_inside_a_nonconvex_u_shape_not_its_area_centroid() {
        // A squared "U": solid across the bottom (y in [0,2]) and up both
        // side legs (x in [0,2] or [8,10]); the notch at x in [2,8], y in
        // [2,10] is empty. This shape's area centroid (5, ~4.08) falls
        // inside that empty notch, so a correct interior-point sample must
        // land somewhere else, on the solid part of the U.
        let u_shape = RationalFace {
            outer: vec![
                RationalPoint2::from_int(0, 0),
                RationalPoint2::from_int(10, 0),
                RationalPoint2::from_int(10, 10),
                RationalPoint2::from_int(8, 10),
                RationalPoint2::from_int(8, 2),
                RationalPoint2::from_int(2, 2),
                RationalPoint2::from_int(2, 10),
                RationalPoint2::from_int(0, 10),
            ],
            holes: Vec::new(),
            winding: WindingMap::empty(),
            program: RenderProgram::color(Color4::TRANSPARENT),
        };
        // A path exactly covering the notch; a correctly-placed interior
        // sample point must test as outside it.
        let notch_path = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(2.0, 2.0),
                Pt2::new(8.0, 2.0),
                Pt2::new(8.0, 10.0),
                Pt2::new(2.0, 10.0),
            ])],
        );
        let resolved = resolve_winding_and_programs(
            vec![u_shape],
            &[notch_path],
            &RenderProgram::color(Color4::TRANSPARENT),
            1.0,
            (0.0, 0.0),
        );
        assert_eq!(resolved[0].winding.get(0), 0);
    }
}
