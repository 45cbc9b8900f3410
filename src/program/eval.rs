//! `evaluate(program, ctx)` (§4.3): walks the program tree and returns a
//! premultiplied linear color. The context carries exactly the fields a
//! node's flags may require; a node whose `needs_*` flag is set but whose
//! context field is `None` evaluates to transparent black rather than
//! panicking, consistent with the error taxonomy's "never abort" policy
//! (§7) -- malformed contexts are a caller bug, not a recoverable one, but
//! the core still degrades gracefully instead of crashing a render.

use crate::color::Color4;
use crate::colorspace;
use crate::face::ClippableFace;
use crate::geometry::{Bounds2, Pt2};

use super::node::{ComposeOp, GradientAccuracy, ProgramKind, ProgramRef};

/// Everything a node might read while evaluating at one pixel's filtered
/// sub-face.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub face: Option<&'a ClippableFace>,
    pub area: Option<f64>,
    pub centroid: Option<Pt2>,
    pub bounds: Bounds2,
    /// Surface normal, populated only while evaluating inside a `DepthSort`
    /// fragment's `Stack` replacement (`Normalize`/`NormalDebug`/`Phong`).
    pub normal: Option<crate::geometry::Vec3>,
}

impl<'a> EvalContext<'a> {
    pub fn new(bounds: Bounds2) -> EvalContext<'a> {
        EvalContext {
            face: None,
            area: None,
            centroid: None,
            bounds,
            normal: None,
        }
    }

    pub(crate) fn centroid_or_mid(&self) -> Pt2 {
        self.centroid.unwrap_or_else(|| {
            Pt2::new(
                (self.bounds.min_x + self.bounds.max_x) * 0.5,
                (self.bounds.min_y + self.bounds.max_y) * 0.5,
            )
        })
    }
}

pub fn evaluate(program: &ProgramRef, ctx: &EvalContext) -> Color4 {
    if program.flags.fully_transparent {
        return Color4::TRANSPARENT;
    }
    match &program.kind {
        ProgramKind::Color(c) => *c,
        // Children are stored front-to-back (index 0 topmost); fold from the
        // back forward so each subsequent (more-frontward) child composites
        // `over` everything already accumulated behind it.
        ProgramKind::Stack(children) => children
            .iter()
            .rev()
            .fold(Color4::TRANSPARENT, |dst, child| evaluate(child, ctx).over(dst)),
        ProgramKind::Alpha(child, a) => evaluate(child, ctx).scale_alpha(*a),
        ProgramKind::BlendCompose {
            src,
            dst,
            compose,
            blend,
        } => super::node::blend_compose(evaluate(src, ctx), evaluate(dst, ctx), *compose, *blend),
        ProgramKind::PathBoolean { inside, .. } => {
            // Unresolved at evaluation time only if CAG's path-program
            // resolution pass was skipped; fall back to the inside branch,
            // matching `FillRule::is_inside`'s default-on-ambiguity stance.
            evaluate(inside, ctx)
        }
        ProgramKind::Filter { matrix, child } => {
            let straight = Color4::unpremultiply(evaluate(child, ctx));
            Color4::premultiply(matrix.apply(straight)).clamped()
        }
        ProgramKind::Image {
            image,
            transform,
            extend,
            resample,
        } => {
            let p = transform
                .inverse()
                .map(|inv| inv.transform_point(ctx.centroid_or_mid()))
                .unwrap_or_else(|| ctx.centroid_or_mid());
            sample_image(image, p, *extend, *resample)
        }
        ProgramKind::LinearBlend { from, to, start, end } => {
            let t = project_fraction(ctx.centroid_or_mid(), *start, *end);
            Color4::lerp(evaluate(from, ctx), evaluate(to, ctx), t as f32)
        }
        ProgramKind::RadialBlend {
            from,
            to,
            center,
            radius,
        } => {
            let d = (ctx.centroid_or_mid() - *center).norm();
            let t = if *radius <= 0.0 {
                0.0
            } else {
                (d / radius).clamp(0.0, 1.0)
            };
            Color4::lerp(evaluate(from, ctx), evaluate(to, ctx), t as f32)
        }
        ProgramKind::LinearGradient {
            stops,
            start,
            end,
            accuracy,
        } => {
            let t = project_fraction(ctx.centroid_or_mid(), *start, *end);
            sample_gradient(stops, t, *accuracy)
        }
        ProgramKind::RadialGradient {
            stops,
            center,
            radius,
            accuracy,
        } => {
            let d = (ctx.centroid_or_mid() - *center).norm();
            let t = if *radius <= 0.0 {
                0.0
            } else {
                (d / radius).clamp(0.0, 1.0)
            };
            sample_gradient(stops, t, *accuracy)
        }
        ProgramKind::BarycentricBlend { colors, triangle } => {
            let (u, v, w) = barycentric(ctx.centroid_or_mid(), triangle);
            let [ca, cb, cc] = colors;
            blend3(evaluate(ca, ctx), evaluate(cb, ctx), evaluate(cc, ctx), u, v, w)
        }
        ProgramKind::BarycentricPerspectiveBlend { colors, triangle } => {
            let flat = [
                Pt2::new(triangle[0].x, triangle[0].y),
                Pt2::new(triangle[1].x, triangle[1].y),
                Pt2::new(triangle[2].x, triangle[2].y),
            ];
            let (u, v, w) = barycentric(ctx.centroid_or_mid(), &flat);
            // Perspective-correct: weight each barycentric coefficient by
            // 1/z then renormalize, the standard rational-linear correction.
            let iz = [
                1.0 / triangle[0].z.max(1e-9),
                1.0 / triangle[1].z.max(1e-9),
                1.0 / triangle[2].z.max(1e-9),
            ];
            let pu = u * iz[0];
            let pv = v * iz[1];
            let pw = w * iz[2];
            let sum = pu + pv + pw;
            let (pu, pv, pw) = if sum.abs() < 1e-12 {
                (u, v, w)
            } else {
                (pu / sum, pv / sum, pw / sum)
            };
            let [ca, cb, cc] = colors;
            blend3(evaluate(ca, ctx), evaluate(cb, ctx), evaluate(cc, ctx), pu, pv, pw)
        }
        ProgramKind::Phong {
            ambient,
            diffuse,
            specular,
            shininess,
            lights,
        } => evaluate_phong(*ambient, *diffuse, *specular, *shininess, lights, ctx),
        ProgramKind::Normalize(child) => {
            // A face normal is only meaningful inside depth-sorted 3-D
            // fragments; outside that context this degenerates to the
            // child's own color, matching the "normal field unset" case.
            evaluate(child, ctx)
        }
        ProgramKind::NormalDebug => match ctx.normal {
            Some(n) => {
                let n = n.normalize();
                Color4::new(
                    (n.x * 0.5 + 0.5) as f32,
                    (n.y * 0.5 + 0.5) as f32,
                    (n.z * 0.5 + 0.5) as f32,
                    1.0,
                )
            }
            None => Color4::new(0.5, 0.5, 1.0, 1.0),
        },
        ProgramKind::DepthSort(items) => {
            // Evaluated directly only if `split` was never run; fall back to
            // compositing all fragments back-to-front by centroid depth.
            let mut ordered: Vec<_> = items.iter().collect();
            ordered.sort_by(|a, b| {
                let za = (a.triangle[0].z + a.triangle[1].z + a.triangle[2].z) / 3.0;
                let zb = (b.triangle[0].z + b.triangle[1].z + b.triangle[2].z) / 3.0;
                zb.partial_cmp(&za).unwrap_or(std::cmp::Ordering::Equal)
            });
            ordered
                .into_iter()
                .rev()
                .fold(Color4::TRANSPARENT, |dst, item| {
                    evaluate(&item.program, ctx).over(dst)
                })
        }
        ProgramKind::Premultiply(child) => Color4::premultiply(evaluate(child, ctx)),
        ProgramKind::Unpremultiply(child) => Color4::unpremultiply(evaluate(child, ctx)),
        ProgramKind::ColorSpaceConvert { from, to, child } => {
            let straight = Color4::unpremultiply(evaluate(child, ctx));
            let converted = colorspace::convert(*from, *to, straight);
            Color4::premultiply(converted)
        }
    }
}

pub(crate) fn project_fraction(p: Pt2, start: Pt2, end: Pt2) -> f64 {
    let axis = end - start;
    let len2 = axis.dot(&axis);
    if len2 < 1e-18 {
        return 0.0;
    }
    ((p - start).dot(&axis) / len2).clamp(0.0, 1.0)
}

pub(crate) fn sample_gradient(stops: &[(f64, Color4)], t: f64, _accuracy: GradientAccuracy) -> Color4 {
    if stops.is_empty() {
        return Color4::TRANSPARENT;
    }
    if t <= stops[0].0 {
        return stops[0].1;
    }
    if let Some(last) = stops.last() {
        if t >= last.0 {
            return last.1;
        }
    }
    for pair in stops.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t >= t0 && t <= t1 {
            let local = if (t1 - t0).abs() < 1e-12 {
                0.0
            } else {
                (t - t0) / (t1 - t0)
            };
            return Color4::lerp(c0, c1, local as f32);
        }
    }
    stops[0].1
}

pub(crate) fn barycentric(p: Pt2, tri: &[Pt2; 3]) -> (f32, f32, f32) {
    let (a, b, c) = (tri[0], tri[1], tri[2]);
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let den = v0.x * v1.y - v1.x * v0.y;
    if den.abs() < 1e-18 {
        return (1.0, 0.0, 0.0);
    }
    let v = (v2.x * v1.y - v1.x * v2.y) / den;
    let w = (v0.x * v2.y - v2.x * v0.y) / den;
    let u = 1.0 - v - w;
    (u as f32, v as f32, w as f32)
}

pub(crate) fn blend3(a: Color4, b: Color4, c: Color4, u: f32, v: f32, w: f32) -> Color4 {
    Color4::new(
        a.r() * u + b.r() * v + c.r() * w,
        a.g() * u + b.g() * v + c.g() * w,
        a.b() * u + b.b() * v + c.b() * w,
        a.a() * u + b.a() * v + c.a() * w,
    )
}

pub(crate) fn evaluate_phong(
    ambient: Color4,
    diffuse: Color4,
    specular: Color4,
    shininess: f32,
    lights: &[super::node::PhongLight],
    ctx: &EvalContext,
) -> Color4 {
    let normal = ctx
        .normal
        .map(|n| n.normalize())
        .unwrap_or(crate::geometry::Vec3::new(0.0, 0.0, 1.0));
    let p = ctx.centroid_or_mid();
    let surface = crate::geometry::Pt3::new(p.x, p.y, 0.0);
    let view = crate::geometry::Vec3::new(0.0, 0.0, 1.0);

    let mut out = ambient;
    for light in lights {
        let to_light = (light.position - surface).normalize();
        let ndotl = normal.dot(&to_light).max(0.0) as f32;
        let diff = Color4::new(
            diffuse.r() * light.color.r() * ndotl,
            diffuse.g() * light.color.g() * ndotl,
            diffuse.b() * light.color.b() * ndotl,
            diffuse.a(),
        );
        let reflect = (normal * (2.0 * normal.dot(&to_light)) - to_light).normalize();
        let spec_term = reflect.dot(&view).max(0.0).powf(shininess.max(1.0) as f64) as f32;
        let spec = Color4::new(
            specular.r() * light.color.r() * spec_term,
            specular.g() * light.color.g() * spec_term,
            specular.b() * light.color.b() * spec_term,
            specular.a(),
        );
        out = Color4::new(
            out.r() + diff.r() + spec.r(),
            out.g() + diff.g() + spec.g(),
            out.b() + diff.b() + spec.b(),
            (out.a() + diff.a() + spec.a()).min(1.0),
        );
    }
    out.clamped()
}

pub(crate) fn sample_image(
    image: &super::node::ImageData,
    p: Pt2,
    extend: super::node::ExtendMode,
    resample: super::node::ResampleType,
) -> Color4 {
    use super::node::ResampleType::*;
    match resample {
        NearestNeighbor => {
            Color4::premultiply(image.get(p.x.floor() as i64, p.y.floor() as i64, extend))
        }
        Bilinear | AnalyticMitchellNetravali => {
            // Per-pixel sampling here uses ordinary (non-analytic) bilinear
            // reconstruction; the "analytic" variants of these filters apply
            // to the *polygon* convolution in `crate::face::filter`, used
            // upstream while integrating the pixel's sub-face, not to this
            // point-sample fallback.
            let x0 = p.x.floor();
            let y0 = p.y.floor();
            let fx = (p.x - x0) as f32;
            let fy = (p.y - y0) as f32;
            let (x0i, y0i) = (x0 as i64, y0 as i64);
            let c00 = Color4::premultiply(image.get(x0i, y0i, extend));
            let c10 = Color4::premultiply(image.get(x0i + 1, y0i, extend));
            let c01 = Color4::premultiply(image.get(x0i, y0i + 1, extend));
            let c11 = Color4::premultiply(image.get(x0i + 1, y0i + 1, extend));
            let top = Color4::lerp(c00, c10, fx);
            let bottom = Color4::lerp(c01, c11, fx);
            Color4::lerp(top, bottom, fy)
        }
    }
}
