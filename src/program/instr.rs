//! Compilation to a flat instruction stream and the stack VM that executes it
//! (§4.3). The opcode set is exhaustive over `ProgramKind` (§3's "New kinds
//! are never added piecemeal" invariant applies here too, same as `simplify`
//! and `eval`): every node kind compiles to a real, binary-encodable opcode,
//! so `decode(encode(compile(program).instrs))` can reconstruct and re-run
//! any program, including ones using gradients, blends, barycentric shading,
//! Phong lighting, depth-sorted fragments, or images -- not just the flat
//! compositing subset. `Image` is the one node whose literal payload (a
//! pixel buffer) doesn't belong inlined in the instruction stream itself;
//! it's kept in a side `image_table`, addressed by index the same way a GPU
//! back-end would bind a texture resource, with its own binary encoding
//! (`encode_image_table`/`decode_image_table`) so that payload is
//! transportable too.

use std::sync::Arc;

use nalgebra::Matrix3;

use crate::color::Color4;
use crate::colorspace::ColorSpace;
use crate::geometry::{Pt2, Pt3, Transform2};

use super::eval::{self, EvalContext};
use super::node::{
    BlendMode, ColorMatrix, ComposeOp, ExtendMode, GradientAccuracy, ImageData, PhongLight,
    ProgramKind, ProgramRef, ResampleType,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    ColorPush(Color4),
    Alpha(f32),
    Premultiply,
    Unpremultiply,
    ColorSpaceConvert(ColorSpace, ColorSpace),
    BlendCompose(ComposeOp, BlendMode),
    Filter(ColorMatrix),
    LinearBlend(Pt2, Pt2),
    RadialBlend(Pt2, f64),
    LinearGradient(Vec<(f64, Color4)>, Pt2, Pt2, GradientAccuracy),
    RadialGradient(Vec<(f64, Color4)>, Pt2, f64, GradientAccuracy),
    BarycentricBlend([Pt2; 3]),
    BarycentricPerspectiveBlend([Pt3; 3]),
    Phong(Color4, Color4, Color4, f32, Vec<PhongLight>),
    /// Passes its one operand through unchanged: `Normalize` only has
    /// observable effect inside a depth-sorted 3-D fragment's own
    /// evaluation context, which the flat VM doesn't carry (§4.3).
    Normalize,
    NormalDebug,
    /// Pops `triangles.len()` operands (the item colors, in emission order)
    /// and composites them back-to-front by each triangle's average depth.
    DepthSort(Vec<[Pt3; 3]>),
    /// An unresolved `PathBoolean`'s fallback: passes its `inside` operand
    /// through unchanged, mirroring `eval::evaluate`'s default-to-inside
    /// stance when CAG's winding resolution pass was skipped.
    PathBooleanFallback,
    Image {
        image_idx: u32,
        transform: Transform2,
        extend: ExtendMode,
        resample: ResampleType,
    },
    /// Pops `b` (top) then `a` (next), pushes `a.over(b)`.
    Over,
    /// If the current top of stack is fully opaque, jump to the absolute
    /// instruction index `target`, skipping everything that would only
    /// affect already-fully-covered background layers.
    OpaqueJump { target: u32 },
    Return,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    pub instrs: Vec<Instr>,
    /// `Image` nodes' pixel buffers, indexed by `Instr::Image::image_idx`.
    pub image_table: Vec<Arc<ImageData>>,
}

pub fn compile(program: &ProgramRef) -> CompiledProgram {
    let mut instrs = Vec::new();
    let mut images = Vec::new();
    emit(program, &mut instrs, &mut images);
    instrs.push(Instr::Return);
    instrs.push(Instr::Exit);
    CompiledProgram {
        instrs,
        image_table: images,
    }
}

fn emit(program: &ProgramRef, instrs: &mut Vec<Instr>, images: &mut Vec<Arc<ImageData>>) {
    match &program.kind {
        ProgramKind::Color(c) => instrs.push(Instr::ColorPush(*c)),
        ProgramKind::Stack(children) => emit_stack(children, instrs, images),
        ProgramKind::Alpha(child, a) => {
            emit(child, instrs, images);
            instrs.push(Instr::Alpha(*a));
        }
        ProgramKind::BlendCompose {
            src,
            dst,
            compose,
            blend,
        } => {
            emit(src, instrs, images);
            emit(dst, instrs, images);
            instrs.push(Instr::BlendCompose(*compose, *blend));
        }
        ProgramKind::PathBoolean { inside, .. } => {
            emit(inside, instrs, images);
            instrs.push(Instr::PathBooleanFallback);
        }
        ProgramKind::Filter { matrix, child } => {
            emit(child, instrs, images);
            instrs.push(Instr::Filter(matrix.clone()));
        }
        ProgramKind::Image {
            image,
            transform,
            extend,
            resample,
        } => {
            let image_idx = images.len() as u32;
            images.push(image.clone());
            instrs.push(Instr::Image {
                image_idx,
                transform: *transform,
                extend: *extend,
                resample: *resample,
            });
        }
        ProgramKind::LinearBlend { from, to, start, end } => {
            emit(from, instrs, images);
            emit(to, instrs, images);
            instrs.push(Instr::LinearBlend(*start, *end));
        }
        ProgramKind::RadialBlend {
            from,
            to,
            center,
            radius,
        } => {
            emit(from, instrs, images);
            emit(to, instrs, images);
            instrs.push(Instr::RadialBlend(*center, *radius));
        }
        ProgramKind::LinearGradient {
            stops,
            start,
            end,
            accuracy,
        } => instrs.push(Instr::LinearGradient(stops.clone(), *start, *end, *accuracy)),
        ProgramKind::RadialGradient {
            stops,
            center,
            radius,
            accuracy,
        } => instrs.push(Instr::RadialGradient(stops.clone(), *center, *radius, *accuracy)),
        ProgramKind::BarycentricBlend { colors, triangle } => {
            for c in colors {
                emit(c, instrs, images);
            }
            instrs.push(Instr::BarycentricBlend(*triangle));
        }
        ProgramKind::BarycentricPerspectiveBlend { colors, triangle } => {
            for c in colors {
                emit(c, instrs, images);
            }
            instrs.push(Instr::BarycentricPerspectiveBlend(*triangle));
        }
        ProgramKind::Phong {
            ambient,
            diffuse,
            specular,
            shininess,
            lights,
        } => instrs.push(Instr::Phong(*ambient, *diffuse, *specular, *shininess, lights.clone())),
        ProgramKind::Normalize(child) => {
            emit(child, instrs, images);
            instrs.push(Instr::Normalize);
        }
        ProgramKind::NormalDebug => instrs.push(Instr::NormalDebug),
        ProgramKind::DepthSort(items) => {
            for item in items {
                emit(&item.program, instrs, images);
            }
            instrs.push(Instr::DepthSort(items.iter().map(|i| i.triangle).collect()));
        }
        ProgramKind::Premultiply(child) => {
            emit(child, instrs, images);
            instrs.push(Instr::Premultiply);
        }
        ProgramKind::Unpremultiply(child) => {
            emit(child, instrs, images);
            instrs.push(Instr::Unpremultiply);
        }
        ProgramKind::ColorSpaceConvert { from, to, child } => {
            emit(child, instrs, images);
            instrs.push(Instr::ColorSpaceConvert(*from, *to));
        }
    }
}

fn emit_stack(children: &[ProgramRef], instrs: &mut Vec<Instr>, images: &mut Vec<Arc<ImageData>>) {
    if children.is_empty() {
        instrs.push(Instr::ColorPush(Color4::TRANSPARENT));
        return;
    }
    emit(&children[0], instrs, images);
    let mut jump_patches = Vec::new();
    for child in &children[1..] {
        jump_patches.push(instrs.len());
        instrs.push(Instr::OpaqueJump { target: 0 }); // patched below
        emit(child, instrs, images);
        instrs.push(Instr::Over);
    }
    let end = instrs.len() as u32;
    for idx in jump_patches {
        if let Instr::OpaqueJump { target } = &mut instrs[idx] {
            *target = end;
        }
    }
}

/// Execute `program` against `ctx` on a stack machine, returning the same
/// result `evaluate` would for the uncompiled tree.
pub fn run(compiled: &CompiledProgram, ctx: &EvalContext) -> Color4 {
    let mut stack: Vec<Color4> = Vec::with_capacity(16);
    let mut pc = 0usize;
    loop {
        match &compiled.instrs[pc] {
            Instr::ColorPush(c) => stack.push(*c),
            Instr::Alpha(a) => {
                let v = stack.pop().expect("stack underflow: Alpha");
                stack.push(v.scale_alpha(*a));
            }
            Instr::Premultiply => {
                let v = stack.pop().expect("stack underflow: Premultiply");
                stack.push(Color4::premultiply(v));
            }
            Instr::Unpremultiply => {
                let v = stack.pop().expect("stack underflow: Unpremultiply");
                stack.push(Color4::unpremultiply(v));
            }
            Instr::ColorSpaceConvert(from, to) => {
                let v = stack.pop().expect("stack underflow: ColorSpaceConvert");
                let straight = Color4::unpremultiply(v);
                let converted = crate::colorspace::convert(*from, *to, straight);
                stack.push(Color4::premultiply(converted));
            }
            Instr::BlendCompose(compose, blend) => {
                let b = stack.pop().expect("stack underflow: BlendCompose b");
                let a = stack.pop().expect("stack underflow: BlendCompose a");
                stack.push(super::node::blend_compose(a, b, *compose, *blend));
            }
            Instr::Filter(matrix) => {
                let v = stack.pop().expect("stack underflow: Filter");
                let straight = Color4::unpremultiply(v);
                stack.push(Color4::premultiply(matrix.apply(straight)).clamped());
            }
            Instr::LinearBlend(start, end) => {
                let to = stack.pop().expect("stack underflow: LinearBlend to");
                let from = stack.pop().expect("stack underflow: LinearBlend from");
                let t = eval::project_fraction(ctx.centroid_or_mid(), *start, *end);
                stack.push(Color4::lerp(from, to, t as f32));
            }
            Instr::RadialBlend(center, radius) => {
                let to = stack.pop().expect("stack underflow: RadialBlend to");
                let from = stack.pop().expect("stack underflow: RadialBlend from");
                let d = (ctx.centroid_or_mid() - *center).norm();
                let t = if *radius <= 0.0 {
                    0.0
                } else {
                    (d / radius).clamp(0.0, 1.0)
                };
                stack.push(Color4::lerp(from, to, t as f32));
            }
            Instr::LinearGradient(stops, start, end, accuracy) => {
                let t = eval::project_fraction(ctx.centroid_or_mid(), *start, *end);
                stack.push(eval::sample_gradient(stops, t, *accuracy));
            }
            Instr::RadialGradient(stops, center, radius, accuracy) => {
                let d = (ctx.centroid_or_mid() - *center).norm();
                let t = if *radius <= 0.0 {
                    0.0
                } else {
                    (d / radius).clamp(0.0, 1.0)
                };
                stack.push(eval::sample_gradient(stops, t, *accuracy));
            }
            Instr::BarycentricBlend(triangle) => {
                let c2 = stack.pop().expect("stack underflow: BarycentricBlend");
                let c1 = stack.pop().expect("stack underflow: BarycentricBlend");
                let c0 = stack.pop().expect("stack underflow: BarycentricBlend");
                let (u, v, w) = eval::barycentric(ctx.centroid_or_mid(), triangle);
                stack.push(eval::blend3(c0, c1, c2, u, v, w));
            }
            Instr::BarycentricPerspectiveBlend(triangle) => {
                let c2 = stack.pop().expect("stack underflow: BarycentricPerspectiveBlend");
                let c1 = stack.pop().expect("stack underflow: BarycentricPerspectiveBlend");
                let c0 = stack.pop().expect("stack underflow: BarycentricPerspectiveBlend");
                let flat = [
                    Pt2::new(triangle[0].x, triangle[0].y),
                    Pt2::new(triangle[1].x, triangle[1].y),
                    Pt2::new(triangle[2].x, triangle[2].y),
                ];
                let (u, v, w) = eval::barycentric(ctx.centroid_or_mid(), &flat);
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
                stack.push(eval::blend3(c0, c1, c2, pu, pv, pw));
            }
            Instr::Phong(ambient, diffuse, specular, shininess, lights) => {
                stack.push(eval::evaluate_phong(*ambient, *diffuse, *specular, *shininess, lights, ctx));
            }
            Instr::Normalize | Instr::PathBooleanFallback => {
                // Pass the already-computed operand through unchanged.
            }
            Instr::NormalDebug => {
                stack.push(match ctx.normal {
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
                });
            }
            Instr::DepthSort(triangles) => {
                let n = triangles.len();
                let mut colors = Vec::with_capacity(n);
                for _ in 0..n {
                    colors.push(stack.pop().expect("stack underflow: DepthSort"));
                }
                colors.reverse();
                let mut order: Vec<usize> = (0..n).collect();
                order.sort_by(|&a, &b| {
                    let za = (triangles[a][0].z + triangles[a][1].z + triangles[a][2].z) / 3.0;
                    let zb = (triangles[b][0].z + triangles[b][1].z + triangles[b][2].z) / 3.0;
                    zb.partial_cmp(&za).unwrap_or(std::cmp::Ordering::Equal)
                });
                let mut acc = Color4::TRANSPARENT;
                for idx in order.into_iter().rev() {
                    acc = colors[idx].over(acc);
                }
                stack.push(acc);
            }
            Instr::Image {
                image_idx,
                transform,
                extend,
                resample,
            } => {
                let image = &compiled.image_table[*image_idx as usize];
                let p = transform
                    .inverse()
                    .map(|inv| inv.transform_point(ctx.centroid_or_mid()))
                    .unwrap_or_else(|| ctx.centroid_or_mid());
                stack.push(eval::sample_image(image, p, *extend, *resample));
            }
            Instr::Over => {
                let b = stack.pop().expect("stack underflow: Over b");
                let a = stack.pop().expect("stack underflow: Over a");
                stack.push(a.over(b));
            }
            Instr::OpaqueJump { target } => {
                if stack.last().map(Color4::is_fully_opaque).unwrap_or(false) {
                    pc = *target as usize;
                    continue;
                }
            }
            Instr::Return => break,
            Instr::Exit => break,
        }
        pc += 1;
    }
    stack.pop().unwrap_or(Color4::TRANSPARENT)
}

// --- Binary encoding -------------------------------------------------------
//
// Every instruction starts with one 32-bit header word: the low 8 bits hold
// the opcode, the remaining 24 bits hold the operand word count that follows
// (informational -- `decode` always knows exactly how many words a given
// opcode carries, the same way it did before this file's opcode set grew to
// cover literals like gradient stops and Phong light lists).

const OP_COLOR_PUSH: u8 = 0;
const OP_ALPHA: u8 = 2;
const OP_PREMULTIPLY: u8 = 3;
const OP_UNPREMULTIPLY: u8 = 4;
const OP_COLOR_SPACE_CONVERT: u8 = 5;
const OP_BLEND_COMPOSE: u8 = 6;
const OP_OVER: u8 = 7;
const OP_OPAQUE_JUMP: u8 = 8;
const OP_RETURN: u8 = 9;
const OP_EXIT: u8 = 10;
const OP_FILTER: u8 = 11;
const OP_LINEAR_BLEND: u8 = 12;
const OP_RADIAL_BLEND: u8 = 13;
const OP_LINEAR_GRADIENT: u8 = 14;
const OP_RADIAL_GRADIENT: u8 = 15;
const OP_BARYCENTRIC_BLEND: u8 = 16;
const OP_BARYCENTRIC_PERSPECTIVE_BLEND: u8 = 17;
const OP_PHONG: u8 = 18;
const OP_NORMALIZE: u8 = 19;
const OP_NORMAL_DEBUG: u8 = 20;
const OP_DEPTH_SORT: u8 = 21;
const OP_PATH_BOOLEAN_FALLBACK: u8 = 22;
const OP_IMAGE: u8 = 23;

fn color_space_tag(c: ColorSpace) -> u32 {
    match c {
        ColorSpace::Srgb => 0,
        ColorSpace::LinearSrgb => 1,
        ColorSpace::DisplayP3 => 2,
        ColorSpace::LinearDisplayP3 => 3,
        ColorSpace::Oklab => 4,
    }
}

fn color_space_from_tag(tag: u32) -> ColorSpace {
    match tag {
        0 => ColorSpace::Srgb,
        1 => ColorSpace::LinearSrgb,
        2 => ColorSpace::DisplayP3,
        3 => ColorSpace::LinearDisplayP3,
        _ => ColorSpace::Oklab,
    }
}

fn compose_tag(c: ComposeOp) -> u32 {
    match c {
        ComposeOp::Clear => 0,
        ComposeOp::Source => 1,
        ComposeOp::Over => 2,
        ComposeOp::In => 3,
        ComposeOp::Out => 4,
        ComposeOp::Atop => 5,
        ComposeOp::Dest => 6,
        ComposeOp::DestOver => 7,
        ComposeOp::DestIn => 8,
        ComposeOp::DestOut => 9,
        ComposeOp::DestAtop => 10,
        ComposeOp::Xor => 11,
    }
}

fn compose_from_tag(tag: u32) -> ComposeOp {
    match tag {
        0 => ComposeOp::Clear,
        1 => ComposeOp::Source,
        2 => ComposeOp::Over,
        3 => ComposeOp::In,
        4 => ComposeOp::Out,
        5 => ComposeOp::Atop,
        6 => ComposeOp::Dest,
        7 => ComposeOp::DestOver,
        8 => ComposeOp::DestIn,
        9 => ComposeOp::DestOut,
        10 => ComposeOp::DestAtop,
        _ => ComposeOp::Xor,
    }
}

fn blend_tag(b: BlendMode) -> u32 {
    match b {
        BlendMode::Normal => 0,
        BlendMode::Multiply => 1,
        BlendMode::Screen => 2,
        BlendMode::Darken => 3,
        BlendMode::Lighten => 4,
    }
}

fn blend_from_tag(tag: u32) -> BlendMode {
    match tag {
        0 => BlendMode::Normal,
        1 => BlendMode::Multiply,
        2 => BlendMode::Screen,
        3 => BlendMode::Darken,
        _ => BlendMode::Lighten,
    }
}

fn accuracy_tag(a: GradientAccuracy) -> u32 {
    match a {
        GradientAccuracy::Fast => 0,
        GradientAccuracy::Accurate => 1,
    }
}

fn accuracy_from_tag(tag: u32) -> GradientAccuracy {
    if tag == 0 {
        GradientAccuracy::Fast
    } else {
        GradientAccuracy::Accurate
    }
}

fn extend_tag(e: ExtendMode) -> u32 {
    match e {
        ExtendMode::Pad => 0,
        ExtendMode::Repeat => 1,
        ExtendMode::Reflect => 2,
    }
}

fn extend_from_tag(tag: u32) -> ExtendMode {
    match tag {
        0 => ExtendMode::Pad,
        1 => ExtendMode::Repeat,
        _ => ExtendMode::Reflect,
    }
}

fn resample_tag(r: ResampleType) -> u32 {
    match r {
        ResampleType::NearestNeighbor => 0,
        ResampleType::Bilinear => 1,
        ResampleType::AnalyticMitchellNetravali => 2,
    }
}

fn resample_from_tag(tag: u32) -> ResampleType {
    match tag {
        0 => ResampleType::NearestNeighbor,
        1 => ResampleType::Bilinear,
        _ => ResampleType::AnalyticMitchellNetravali,
    }
}

fn header(op: u8, operand_words: u32) -> u32 {
    (op as u32) | (operand_words << 8)
}

fn push_f64(out: &mut Vec<u32>, v: f64) {
    let bits = v.to_bits();
    out.push((bits & 0xFFFF_FFFF) as u32);
    out.push((bits >> 32) as u32);
}

fn read_f64(words: &[u32], i: &mut usize) -> f64 {
    let lo = words[*i] as u64;
    let hi = words[*i + 1] as u64;
    *i += 2;
    f64::from_bits(lo | (hi << 32))
}

fn push_pt2(out: &mut Vec<u32>, p: Pt2) {
    push_f64(out, p.x);
    push_f64(out, p.y);
}

fn read_pt2(words: &[u32], i: &mut usize) -> Pt2 {
    let x = read_f64(words, i);
    let y = read_f64(words, i);
    Pt2::new(x, y)
}

fn push_pt3(out: &mut Vec<u32>, p: Pt3) {
    push_f64(out, p.x);
    push_f64(out, p.y);
    push_f64(out, p.z);
}

fn read_pt3(words: &[u32], i: &mut usize) -> Pt3 {
    let x = read_f64(words, i);
    let y = read_f64(words, i);
    let z = read_f64(words, i);
    Pt3::new(x, y, z)
}

fn push_color4(out: &mut Vec<u32>, c: Color4) {
    out.push(c.r().to_bits());
    out.push(c.g().to_bits());
    out.push(c.b().to_bits());
    out.push(c.a().to_bits());
}

fn read_color4(words: &[u32], i: &mut usize) -> Color4 {
    let c = Color4::new(
        f32::from_bits(words[*i]),
        f32::from_bits(words[*i + 1]),
        f32::from_bits(words[*i + 2]),
        f32::from_bits(words[*i + 3]),
    );
    *i += 4;
    c
}

fn push_color_matrix(out: &mut Vec<u32>, m: &ColorMatrix) {
    for row in &m.m {
        for v in row {
            out.push(v.to_bits());
        }
    }
    for v in &m.translate {
        out.push(v.to_bits());
    }
}

fn read_color_matrix(words: &[u32], i: &mut usize) -> ColorMatrix {
    let mut m = [[0.0f32; 4]; 4];
    for row in m.iter_mut() {
        for v in row.iter_mut() {
            *v = f32::from_bits(words[*i]);
            *i += 1;
        }
    }
    let mut translate = [0.0f32; 4];
    for v in translate.iter_mut() {
        *v = f32::from_bits(words[*i]);
        *i += 1;
    }
    ColorMatrix { m, translate }
}

fn push_gradient_stops(out: &mut Vec<u32>, stops: &[(f64, Color4)]) {
    out.push(stops.len() as u32);
    for (t, c) in stops {
        push_f64(out, *t);
        push_color4(out, *c);
    }
}

fn read_gradient_stops(words: &[u32], i: &mut usize) -> Vec<(f64, Color4)> {
    let n = words[*i] as usize;
    *i += 1;
    (0..n)
        .map(|_| {
            let t = read_f64(words, i);
            let c = read_color4(words, i);
            (t, c)
        })
        .collect()
}

fn push_phong_light(out: &mut Vec<u32>, l: &PhongLight) {
    push_pt3(out, l.position);
    push_color4(out, l.color);
}

fn read_phong_light(words: &[u32], i: &mut usize) -> PhongLight {
    let position = read_pt3(words, i);
    let color = read_color4(words, i);
    PhongLight { position, color }
}

/// Encode a compiled program's instructions into 32-bit words. `Image`
/// opcodes carry only an index into a separately-encoded `image_table`
/// (see `encode_image_table`).
pub fn encode(instrs: &[Instr]) -> Vec<u32> {
    let mut out = Vec::new();
    for instr in instrs {
        match instr {
            Instr::ColorPush(c) => {
                out.push(header(OP_COLOR_PUSH, 4));
                push_color4(&mut out, *c);
            }
            Instr::Alpha(a) => {
                out.push(header(OP_ALPHA, 1));
                out.push(a.to_bits());
            }
            Instr::Premultiply => out.push(header(OP_PREMULTIPLY, 0)),
            Instr::Unpremultiply => out.push(header(OP_UNPREMULTIPLY, 0)),
            Instr::ColorSpaceConvert(from, to) => {
                out.push(header(OP_COLOR_SPACE_CONVERT, 2));
                out.push(color_space_tag(*from));
                out.push(color_space_tag(*to));
            }
            Instr::BlendCompose(compose, blend) => {
                out.push(header(OP_BLEND_COMPOSE, 2));
                out.push(compose_tag(*compose));
                out.push(blend_tag(*blend));
            }
            Instr::Filter(matrix) => {
                out.push(header(OP_FILTER, 20));
                push_color_matrix(&mut out, matrix);
            }
            Instr::LinearBlend(start, end) => {
                out.push(header(OP_LINEAR_BLEND, 8));
                push_pt2(&mut out, *start);
                push_pt2(&mut out, *end);
            }
            Instr::RadialBlend(center, radius) => {
                out.push(header(OP_RADIAL_BLEND, 6));
                push_pt2(&mut out, *center);
                push_f64(&mut out, *radius);
            }
            Instr::LinearGradient(stops, start, end, accuracy) => {
                let start_idx = out.len();
                out.push(0);
                push_gradient_stops(&mut out, stops);
                push_pt2(&mut out, *start);
                push_pt2(&mut out, *end);
                out.push(accuracy_tag(*accuracy));
                let words = (out.len() - start_idx - 1) as u32;
                out[start_idx] = header(OP_LINEAR_GRADIENT, words);
            }
            Instr::RadialGradient(stops, center, radius, accuracy) => {
                let start_idx = out.len();
                out.push(0);
                push_gradient_stops(&mut out, stops);
                push_pt2(&mut out, *center);
                push_f64(&mut out, *radius);
                out.push(accuracy_tag(*accuracy));
                let words = (out.len() - start_idx - 1) as u32;
                out[start_idx] = header(OP_RADIAL_GRADIENT, words);
            }
            Instr::BarycentricBlend(triangle) => {
                out.push(header(OP_BARYCENTRIC_BLEND, 12));
                for p in triangle {
                    push_pt2(&mut out, *p);
                }
            }
            Instr::BarycentricPerspectiveBlend(triangle) => {
                out.push(header(OP_BARYCENTRIC_PERSPECTIVE_BLEND, 18));
                for p in triangle {
                    push_pt3(&mut out, *p);
                }
            }
            Instr::Phong(ambient, diffuse, specular, shininess, lights) => {
                let start_idx = out.len();
                out.push(0);
                push_color4(&mut out, *ambient);
                push_color4(&mut out, *diffuse);
                push_color4(&mut out, *specular);
                out.push(shininess.to_bits());
                out.push(lights.len() as u32);
                for l in lights {
                    push_phong_light(&mut out, l);
                }
                let words = (out.len() - start_idx - 1) as u32;
                out[start_idx] = header(OP_PHONG, words);
            }
            Instr::Normalize => out.push(header(OP_NORMALIZE, 0)),
            Instr::NormalDebug => out.push(header(OP_NORMAL_DEBUG, 0)),
            Instr::DepthSort(triangles) => {
                let start_idx = out.len();
                out.push(0);
                out.push(triangles.len() as u32);
                for tri in triangles {
                    for p in tri {
                        push_pt3(&mut out, *p);
                    }
                }
                let words = (out.len() - start_idx - 1) as u32;
                out[start_idx] = header(OP_DEPTH_SORT, words);
            }
            Instr::PathBooleanFallback => out.push(header(OP_PATH_BOOLEAN_FALLBACK, 0)),
            Instr::Image {
                image_idx,
                transform,
                extend,
                resample,
            } => {
                out.push(header(OP_IMAGE, 21));
                out.push(*image_idx);
                let m = &transform.0;
                for r in 0..3 {
                    for c in 0..3 {
                        push_f64(&mut out, m[(r, c)]);
                    }
                }
                out.push(extend_tag(*extend));
                out.push(resample_tag(*resample));
            }
            Instr::Over => out.push(header(OP_OVER, 0)),
            Instr::OpaqueJump { target } => {
                out.push(header(OP_OPAQUE_JUMP, 1));
                out.push(*target);
            }
            Instr::Return => out.push(header(OP_RETURN, 0)),
            Instr::Exit => out.push(header(OP_EXIT, 0)),
        }
    }
    out
}

/// Decode a word stream produced by `encode`. Any malformed opcode is an
/// `UnsupportedProgram` error (§7) -- this is the deserializer boundary
/// named there.
pub fn decode(words: &[u32]) -> crate::error::RasterResult<Vec<Instr>> {
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < words.len() {
        let word = words[i];
        let op = (word & 0xFF) as u8;
        i += 1;
        let instr = match op {
            OP_COLOR_PUSH => Instr::ColorPush(read_color4(words, &mut i)),
            OP_ALPHA => {
                let a = f32::from_bits(words[i]);
                i += 1;
                Instr::Alpha(a)
            }
            OP_PREMULTIPLY => Instr::Premultiply,
            OP_UNPREMULTIPLY => Instr::Unpremultiply,
            OP_COLOR_SPACE_CONVERT => {
                let from = color_space_from_tag(words[i]);
                let to = color_space_from_tag(words[i + 1]);
                i += 2;
                Instr::ColorSpaceConvert(from, to)
            }
            OP_BLEND_COMPOSE => {
                let compose = compose_from_tag(words[i]);
                let blend = blend_from_tag(words[i + 1]);
                i += 2;
                Instr::BlendCompose(compose, blend)
            }
            OP_FILTER => Instr::Filter(read_color_matrix(words, &mut i)),
            OP_LINEAR_BLEND => {
                let start = read_pt2(words, &mut i);
                let end = read_pt2(words, &mut i);
                Instr::LinearBlend(start, end)
            }
            OP_RADIAL_BLEND => {
                let center = read_pt2(words, &mut i);
                let radius = read_f64(words, &mut i);
                Instr::RadialBlend(center, radius)
            }
            OP_LINEAR_GRADIENT => {
                let stops = read_gradient_stops(words, &mut i);
                let start = read_pt2(words, &mut i);
                let end = read_pt2(words, &mut i);
                let accuracy = accuracy_from_tag(words[i]);
                i += 1;
                Instr::LinearGradient(stops, start, end, accuracy)
            }
            OP_RADIAL_GRADIENT => {
                let stops = read_gradient_stops(words, &mut i);
                let center = read_pt2(words, &mut i);
                let radius = read_f64(words, &mut i);
                let accuracy = accuracy_from_tag(words[i]);
                i += 1;
                Instr::RadialGradient(stops, center, radius, accuracy)
            }
            OP_BARYCENTRIC_BLEND => {
                let triangle = [
                    read_pt2(words, &mut i),
                    read_pt2(words, &mut i),
                    read_pt2(words, &mut i),
                ];
                Instr::BarycentricBlend(triangle)
            }
            OP_BARYCENTRIC_PERSPECTIVE_BLEND => {
                let triangle = [
                    read_pt3(words, &mut i),
                    read_pt3(words, &mut i),
                    read_pt3(words, &mut i),
                ];
                Instr::BarycentricPerspectiveBlend(triangle)
            }
            OP_PHONG => {
                let ambient = read_color4(words, &mut i);
                let diffuse = read_color4(words, &mut i);
                let specular = read_color4(words, &mut i);
                let shininess = f32::from_bits(words[i]);
                i += 1;
                let n = words[i] as usize;
                i += 1;
                let lights = (0..n).map(|_| read_phong_light(words, &mut i)).collect();
                Instr::Phong(ambient, diffuse, specular, shininess, lights)
            }
            OP_NORMALIZE => Instr::Normalize,
            OP_NORMAL_DEBUG => Instr::NormalDebug,
            OP_DEPTH_SORT => {
                let n = words[i] as usize;
                i += 1;
                let triangles = (0..n)
                    .map(|_| [read_pt3(words, &mut i), read_pt3(words, &mut i), read_pt3(words, &mut i)])
                    .collect();
                Instr::DepthSort(triangles)
            }
            OP_PATH_BOOLEAN_FALLBACK => Instr::PathBooleanFallback,
            OP_IMAGE => {
                let image_idx = words[i];
                i += 1;
                let mut v = [0.0f64; 9];
                for slot in v.iter_mut() {
                    *slot = read_f64(words, &mut i);
                }
                let transform = Transform2(Matrix3::new(
                    v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8],
                ));
                let extend = extend_from_tag(words[i]);
                i += 1;
                let resample = resample_from_tag(words[i]);
                i += 1;
                Instr::Image {
                    image_idx,
                    transform,
                    extend,
                    resample,
                }
            }
            OP_OVER => Instr::Over,
            OP_OPAQUE_JUMP => {
                let target = words[i];
                i += 1;
                Instr::OpaqueJump { target }
            }
            OP_RETURN => Instr::Return,
            OP_EXIT => Instr::Exit,
            other => {
                return Err(crate::error::RasterError::UnsupportedProgram(other));
            }
        };
        out.push(instr);
    }
    Ok(out)
}

/// Encode a compiled program's `image_table` into 32-bit words: a count
/// followed by each image's width, height, and straight-color pixel data.
pub fn encode_image_table(images: &[Arc<ImageData>]) -> Vec<u32> {
    let mut out = Vec::new();
    out.push(images.len() as u32);
    for image in images {
        out.push(image.width);
        out.push(image.height);
        for pixel in &image.pixels {
            push_color4(&mut out, *pixel);
        }
    }
    out
}

/// Decode a word stream produced by `encode_image_table`.
pub fn decode_image_table(words: &[u32]) -> crate::error::RasterResult<Vec<Arc<ImageData>>> {
    let mut i = 0usize;
    let n = words[i] as usize;
    i += 1;
    let mut images = Vec::with_capacity(n);
    for _ in 0..n {
        let width = words[i];
        let height = words[i + 1];
        i += 2;
        let count = (width as usize) * (height as usize);
        let pixels = (0..count).map(|_| read_color4(words, &mut i)).collect();
        images.push(Arc::new(ImageData {
            width,
            height,
            pixels,
        }));
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Bounds2;
    use crate::program::node::RenderProgram;
    use eval::evaluate;

    #[test]
    fn compiled_stack_matches_tree_evaluation() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let blue_half = RenderProgram::alpha(
            RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0))),
            0.5,
        );
        let tree = RenderProgram::stack(vec![red, blue_half]);

        let ctx = EvalContext::new(Bounds2::EMPTY);
        let direct = evaluate(&tree, &ctx);

        let compiled = compile(&tree);
        let via_vm = run(&compiled, &ctx);
        assert_eq!(direct, via_vm);
    }

    #[test]
    fn binary_roundtrip_preserves_execution() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let blue_half = RenderProgram::alpha(
            RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0))),
            0.5,
        );
        let tree = RenderProgram::stack(vec![red, blue_half]);
        let compiled = compile(&tree);

        let words = encode(&compiled.instrs);
        let decoded = decode(&words).unwrap();
        assert_eq!(decoded, compiled.instrs);

        let roundtripped = CompiledProgram {
            instrs: decoded,
            image_table: compiled.image_table.clone(),
        };
        let ctx = EvalContext::new(Bounds2::EMPTY);
        assert_eq!(run(&compiled, &ctx), run(&roundtripped, &ctx));
    }

    #[test]
    fn opaque_jump_skips_hidden_background() {
        let front_opaque =
            RenderProgram::color(Color4::premultiply(Color4::new(0.2, 0.2, 0.2, 1.0)));
        let back = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let tree = RenderProgram::stack(vec![front_opaque, back]);
        let compiled = compile(&tree);
        let ctx = EvalContext::new(Bounds2::EMPTY);
        let result = run(&compiled, &ctx);
        assert!((result.r() - 0.2).abs() < 1e-6);
        assert!((result.g() - 0.2).abs() < 1e-6);
    }

    /// A gradient node used to be punted to `ContextEval`, whose
    /// `context_table` `encode` admitted it couldn't serialize. It now
    /// compiles to a dedicated `LinearGradient` opcode that must survive a
    /// full binary round-trip.
    #[test]
    fn linear_gradient_roundtrips_through_binary_encoding() {
        let red = Color4::new(1.0, 0.0, 0.0, 1.0);
        let blue = Color4::new(0.0, 0.0, 1.0, 1.0);
        let tree = RenderProgram::linear_gradient(
            vec![(0.0, red), (1.0, blue)],
            Pt2::new(0.0, 0.0),
            Pt2::new(10.0, 0.0),
            GradientAccuracy::Accurate,
        );
        let mut ctx = EvalContext::new(Bounds2::new(0.0, 0.0, 10.0, 10.0));
        ctx.centroid = Some(Pt2::new(5.0, 5.0));

        let direct = evaluate(&tree, &ctx);
        let compiled = compile(&tree);
        let words = encode(&compiled.instrs);
        let decoded_instrs = decode(&words).unwrap();
        assert_eq!(decoded_instrs, compiled.instrs);
        let decoded = CompiledProgram {
            instrs: decoded_instrs,
            image_table: compiled.image_table.clone(),
        };
        let from_binary = run(&decoded, &ctx);
        assert_eq!(direct, from_binary);
    }

    /// Same check for a `BarycentricBlend` plus `Phong`, the two other node
    /// families the old `ContextEval` escape hatch swallowed.
    #[test]
    fn barycentric_and_phong_roundtrip_through_binary_encoding() {
        let a = RenderProgram::color(Color4::new(1.0, 0.0, 0.0, 1.0));
        let b = RenderProgram::color(Color4::new(0.0, 1.0, 0.0, 1.0));
        let c = RenderProgram::color(Color4::new(0.0, 0.0, 1.0, 1.0));
        let triangle = [Pt2::new(0.0, 0.0), Pt2::new(10.0, 0.0), Pt2::new(0.0, 10.0)];
        let bary = RenderProgram::barycentric_blend([a, b, c], triangle);

        let phong = RenderProgram::phong(
            Color4::new(0.1, 0.1, 0.1, 1.0),
            Color4::new(0.8, 0.8, 0.8, 1.0),
            Color4::new(1.0, 1.0, 1.0, 1.0),
            32.0,
            vec![PhongLight {
                position: Pt3::new(0.0, 0.0, 5.0),
                color: Color4::new(1.0, 1.0, 1.0, 1.0),
            }],
        );

        let tree = RenderProgram::stack(vec![bary, phong]);
        let mut ctx = EvalContext::new(Bounds2::new(0.0, 0.0, 10.0, 10.0));
        ctx.centroid = Some(Pt2::new(3.0, 3.0));
        ctx.normal = Some(crate::geometry::Vec3::new(0.0, 0.0, 1.0));

        let direct = evaluate(&tree, &ctx);
        let compiled = compile(&tree);
        let words = encode(&compiled.instrs);
        let decoded_instrs = decode(&words).unwrap();
        let decoded = CompiledProgram {
            instrs: decoded_instrs,
            image_table: compiled.image_table.clone(),
        };
        let from_binary = run(&decoded, &ctx);
        assert!((direct.r() - from_binary.r()).abs() < 1e-6);
        assert!((direct.g() - from_binary.g()).abs() < 1e-6);
        assert!((direct.b() - from_binary.b()).abs() < 1e-6);
    }

    /// `Image`'s pixel payload lives in a side table with its own wire
    /// format; both the instruction stream and the image table must
    /// round-trip for a program using it to be reconstructable.
    #[test]
    fn image_table_roundtrips_independently_of_instruction_stream() {
        let image = Arc::new(ImageData {
            width: 2,
            height: 1,
            pixels: vec![
                Color4::new(1.0, 0.0, 0.0, 1.0),
                Color4::new(0.0, 0.0, 1.0, 1.0),
            ],
        });
        let tree = RenderProgram::image(
            image,
            Transform2::identity(),
            ExtendMode::Pad,
            ResampleType::NearestNeighbor,
        );

        let compiled = compile(&tree);
        let instr_words = encode(&compiled.instrs);
        let image_words = encode_image_table(&compiled.image_table);

        let decoded_instrs = decode(&instr_words).unwrap();
        let decoded_images = decode_image_table(&image_words).unwrap();
        assert_eq!(decoded_images, compiled.image_table);

        let decoded = CompiledProgram {
            instrs: decoded_instrs,
            image_table: decoded_images,
        };
        let ctx = EvalContext::new(Bounds2::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(run(&compiled, &ctx), run(&decoded, &ctx));
    }
}
