//! Algebraic simplification (§4.3): `simplify` is idempotent and never
//! changes observable output. Structural equality (`program_eq`) backs both
//! the `PathBoolean` bubbling rule and the property test in `mod.rs` that
//! `simplify(simplify(p)) == simplify(p)`.

use std::sync::Arc;

use super::node::{ProgramKind, ProgramRef, RenderProgram};

/// Structural equality over the closed node set (§3: "equality is structural
/// and memoized"). Reference-equal subtrees short-circuit to `true` without
/// recursing, which is also the fast path `simplify` itself produces
/// (unchanged children come back `Arc`-identical) — but two freshly
/// reconstructed nodes (e.g. `simplify` rebuilding an unchanged `Filter`)
/// must still compare equal, so every variant gets a real field-by-field
/// comparison rather than falling through to `false`.
pub fn program_eq(a: &ProgramRef, b: &ProgramRef) -> bool {
    if Arc::ptr_eq(a, b) {
        return true;
    }
    match (&a.kind, &b.kind) {
        (ProgramKind::Color(x), ProgramKind::Color(y)) => x == y,
        (ProgramKind::Stack(xs), ProgramKind::Stack(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| program_eq(x, y))
        }
        (ProgramKind::Alpha(x, xa), ProgramKind::Alpha(y, ya)) => xa == ya && program_eq(x, y),
        (
            ProgramKind::PathBoolean {
                path: pa,
                fill_rule: fa,
                inside: ia,
                outside: oa,
            },
            ProgramKind::PathBoolean {
                path: pb,
                fill_rule: fb,
                inside: ib,
                outside: ob,
            },
        ) => pa == pb && fa == fb && program_eq(ia, ib) && program_eq(oa, ob),
        (
            ProgramKind::BlendCompose {
                src: sa,
                dst: da,
                compose: ca,
                blend: ba,
            },
            ProgramKind::BlendCompose {
                src: sb,
                dst: db,
                compose: cb,
                blend: bb,
            },
        ) => ca == cb && ba == bb && program_eq(sa, sb) && program_eq(da, db),
        (
            ProgramKind::Filter { matrix: ma, child: ca },
            ProgramKind::Filter { matrix: mb, child: cb },
        ) => ma == mb && program_eq(ca, cb),
        (
            ProgramKind::Image {
                image: ia,
                transform: ta,
                extend: ea,
                resample: ra,
            },
            ProgramKind::Image {
                image: ib,
                transform: tb,
                extend: eb,
                resample: rb,
            },
        ) => ta == tb && ea == eb && ra == rb && (Arc::ptr_eq(ia, ib) || **ia == **ib),
        (
            ProgramKind::LinearBlend {
                from: fa,
                to: ta,
                start: sa,
                end: ea,
            },
            ProgramKind::LinearBlend {
                from: fb,
                to: tb,
                start: sb,
                end: eb,
            },
        ) => sa == sb && ea == eb && program_eq(fa, fb) && program_eq(ta, tb),
        (
            ProgramKind::RadialBlend {
                from: fa,
                to: ta,
                center: ca,
                radius: ra,
            },
            ProgramKind::RadialBlend {
                from: fb,
                to: tb,
                center: cb,
                radius: rb,
            },
        ) => ca == cb && ra == rb && program_eq(fa, fb) && program_eq(ta, tb),
        (
            ProgramKind::LinearGradient {
                stops: sa,
                start: pa,
                end: ea,
                accuracy: aa,
            },
            ProgramKind::LinearGradient {
                stops: sb,
                start: pb,
                end: eb,
                accuracy: ab,
            },
        ) => sa == sb && pa == pb && ea == eb && aa == ab,
        (
            ProgramKind::RadialGradient {
                stops: sa,
                center: ca,
                radius: ra,
                accuracy: aa,
            },
            ProgramKind::RadialGradient {
                stops: sb,
                center: cb,
                radius: rb,
                accuracy: ab,
            },
        ) => sa == sb && ca == cb && ra == rb && aa == ab,
        (
            ProgramKind::BarycentricBlend {
                colors: ca,
                triangle: ta,
            },
            ProgramKind::BarycentricBlend {
                colors: cb,
                triangle: tb,
            },
        ) => {
            ta == tb
                && ca.iter().zip(cb.iter()).all(|(x, y)| program_eq(x, y))
        }
        (
            ProgramKind::BarycentricPerspectiveBlend {
                colors: ca,
                triangle: ta,
            },
            ProgramKind::BarycentricPerspectiveBlend {
                colors: cb,
                triangle: tb,
            },
        ) => {
            ta == tb
                && ca.iter().zip(cb.iter()).all(|(x, y)| program_eq(x, y))
        }
        (
            ProgramKind::Phong {
                ambient: aa,
                diffuse: da,
                specular: sa,
                shininess: ha,
                lights: la,
            },
            ProgramKind::Phong {
                ambient: ab,
                diffuse: db,
                specular: sb,
                shininess: hb,
                lights: lb,
            },
        ) => aa == ab && da == db && sa == sb && ha == hb && la == lb,
        (
            ProgramKind::Premultiply(x),
            ProgramKind::Premultiply(y),
        )
        | (ProgramKind::Unpremultiply(x), ProgramKind::Unpremultiply(y))
        | (ProgramKind::Normalize(x), ProgramKind::Normalize(y)) => program_eq(x, y),
        (ProgramKind::NormalDebug, ProgramKind::NormalDebug) => true,
        (ProgramKind::DepthSort(xs), ProgramKind::DepthSort(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| x.triangle == y.triangle && program_eq(&x.program, &y.program))
        }
        (
            ProgramKind::ColorSpaceConvert {
                from: fa,
                to: ta,
                child: ca,
            },
            ProgramKind::ColorSpaceConvert {
                from: fb,
                to: tb,
                child: cb,
            },
        ) => fa == fb && ta == tb && program_eq(ca, cb),
        _ => false,
    }
}

/// Simplify one node bottom-up. Always recurses into children first so that
/// a rule firing at this level sees already-simplified children.
pub fn simplify(program: &ProgramRef) -> ProgramRef {
    match &program.kind {
        ProgramKind::Stack(children) => simplify_stack(children),
        ProgramKind::Alpha(child, a) => {
            let child = simplify(child);
            match &child.kind {
                ProgramKind::Alpha(inner, ia) => RenderProgram::alpha(inner.clone(), ia * a),
                _ if *a >= 1.0 => child,
                _ => RenderProgram::alpha(child, *a),
            }
        }
        ProgramKind::Filter { matrix, child } => {
            let child = simplify(child);
            if let ProgramKind::Color(c) = &child.kind {
                let straight = crate::color::Color4::unpremultiply(*c);
                return RenderProgram::color(crate::color::Color4::premultiply(
                    matrix.apply(straight),
                ));
            }
            RenderProgram::filter(matrix.clone(), child)
        }
        ProgramKind::ColorSpaceConvert { from, to, child } => {
            let child = simplify(child);
            if let ProgramKind::ColorSpaceConvert {
                from: inner_from,
                to: inner_to,
                child: inner_child,
            } = &child.kind
            {
                // Converting A->B then B->A (or any reversed pair) cancels.
                if inner_to == from && inner_from == to {
                    return inner_child.clone();
                }
            }
            if from == to {
                return child;
            }
            RenderProgram::color_space_convert(*from, *to, child)
        }
        ProgramKind::BlendCompose {
            src,
            dst,
            compose,
            blend,
        } => RenderProgram::blend_compose(simplify(src), simplify(dst), *compose, *blend),
        ProgramKind::PathBoolean {
            path,
            fill_rule,
            inside,
            outside,
        } => {
            let inside = simplify(inside);
            let outside = simplify(outside);
            if program_eq(&inside, &outside) {
                return inside;
            }
            RenderProgram::path_boolean(*path, *fill_rule, inside, outside)
        }
        ProgramKind::Premultiply(child) => {
            let child = simplify(child);
            if let ProgramKind::Unpremultiply(inner) = &child.kind {
                return inner.clone();
            }
            RenderProgram::premultiply(child)
        }
        ProgramKind::Unpremultiply(child) => {
            let child = simplify(child);
            if let ProgramKind::Premultiply(inner) = &child.kind {
                return inner.clone();
            }
            RenderProgram::unpremultiply(child)
        }
        ProgramKind::Normalize(child) => RenderProgram::normalize(simplify(child)),
        ProgramKind::LinearBlend { from, to, start, end } => {
            let from = simplify(from);
            let to = simplify(to);
            if program_eq(&from, &to) {
                return from;
            }
            RenderProgram::linear_blend(from, to, *start, *end)
        }
        ProgramKind::RadialBlend {
            from,
            to,
            center,
            radius,
        } => {
            let from = simplify(from);
            let to = simplify(to);
            if program_eq(&from, &to) {
                return from;
            }
            RenderProgram::radial_blend(from, to, *center, *radius)
        }
        ProgramKind::BarycentricBlend { colors, triangle } => {
            let colors = [
                simplify(&colors[0]),
                simplify(&colors[1]),
                simplify(&colors[2]),
            ];
            RenderProgram::barycentric_blend(colors, *triangle)
        }
        ProgramKind::BarycentricPerspectiveBlend { colors, triangle } => {
            let colors = [
                simplify(&colors[0]),
                simplify(&colors[1]),
                simplify(&colors[2]),
            ];
            RenderProgram::barycentric_perspective_blend(colors, *triangle)
        }
        ProgramKind::DepthSort(items) => {
            let items = items
                .iter()
                .map(|i| super::node::RenderPlanar {
                    program: simplify(&i.program),
                    triangle: i.triangle,
                })
                .collect();
            RenderProgram::depth_sort(items)
        }
        // Leaf-like nodes with no child to recurse into, or nodes whose
        // simplification has no useful algebraic rule beyond identity.
        ProgramKind::Color(_)
        | ProgramKind::Image { .. }
        | ProgramKind::LinearGradient { .. }
        | ProgramKind::RadialGradient { .. }
        | ProgramKind::Phong { .. }
        | ProgramKind::NormalDebug => program.clone(),
    }
}

fn simplify_stack(children: &[ProgramRef]) -> ProgramRef {
    let simplified: Vec<ProgramRef> = children.iter().map(simplify).collect();

    // Drop fully-transparent children; they composite to nothing.
    let mut kept: Vec<ProgramRef> = simplified
        .into_iter()
        .filter(|c| !c.flags.fully_transparent)
        .collect();

    // Anything below a fully-opaque child is unreachable.
    if let Some(idx) = kept.iter().position(|c| c.flags.fully_opaque) {
        kept.truncate(idx + 1);
    }

    // Pre-composite adjacent constant colors. `merged` holds children in
    // front-to-back order, so the previously-pushed entry sits on top of the
    // current (later, further-back) one: `over` takes the front color as src.
    let mut merged: Vec<ProgramRef> = Vec::with_capacity(kept.len());
    for child in kept {
        if let (Some(last), ProgramKind::Color(c)) = (merged.last(), &child.kind) {
            if let ProgramKind::Color(front) = &last.kind {
                let composed = front.over(*c);
                let new_last = RenderProgram::color(composed);
                merged.pop();
                merged.push(new_last);
                continue;
            }
        }
        merged.push(child);
    }

    match merged.len() {
        0 => RenderProgram::color(crate::color::Color4::TRANSPARENT),
        1 => merged.into_iter().next().unwrap(),
        _ => RenderProgram::stack(merged),
    }
}
