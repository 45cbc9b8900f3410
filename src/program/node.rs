//! The render-program expression DAG (§4.3): a closed, exhaustively-matched
//! set of node kinds, each wrapped in `RenderProgram` with flags cached at
//! construction. Children are shared by `Arc` rather than an arena+index
//! table, matching the teacher's use of reference-counted handles for
//! anything shared across threads; the program tree is read-only once built,
//! so there is no arena-compaction concern that would favor indices.

use std::sync::Arc;

use crate::color::Color4;
use crate::colorspace::ColorSpace;
use crate::geometry::{Pt2, Pt3, Transform2};
use crate::path::FillRule;
use crate::winding::PathId;

/// Shared handle to a node. Cheap to clone; structural sharing is how
/// simplification avoids re-allocating unchanged subtrees.
pub type ProgramRef = Arc<RenderProgram>;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flags {
    pub fully_transparent: bool,
    pub fully_opaque: bool,
    pub needs_face: bool,
    pub needs_area: bool,
    pub needs_centroid: bool,
}

impl Flags {
    fn union(self, other: Flags) -> Flags {
        Flags {
            fully_transparent: false,
            fully_opaque: false,
            needs_face: self.needs_face || other.needs_face,
            needs_area: self.needs_area || other.needs_area,
            needs_centroid: self.needs_centroid || other.needs_centroid,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtendMode {
    Pad,
    Repeat,
    Reflect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResampleType {
    NearestNeighbor,
    Bilinear,
    AnalyticMitchellNetravali,
}

/// Interpolation accuracy for `LinearGradient`/`RadialGradient`: `Fast`
/// decomposes into a single pair of `LinearBlend`/`RadialBlend` nodes
/// straddling the two nearest stops; `Accurate` decomposes into one blend per
/// stop interval, composited with `Stack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientAccuracy {
    Fast,
    Accurate,
}

/// Porter-Duff compositing operator, paired with a separable blend mode in
/// `BlendCompose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeOp {
    Clear,
    Source,
    Over,
    In,
    Out,
    Atop,
    Dest,
    DestOver,
    DestIn,
    DestOut,
    DestAtop,
    Xor,
}

impl ComposeOp {
    /// The `(Fa, Fb)` source/destination coefficient pair, in the classic
    /// Porter-Duff formulation `result = Fa*src + Fb*dst`.
    fn coefficients(self, src_a: f32, dst_a: f32) -> (f32, f32) {
        match self {
            ComposeOp::Clear => (0.0, 0.0),
            ComposeOp::Source => (1.0, 0.0),
            ComposeOp::Over => (1.0, 1.0 - src_a),
            ComposeOp::In => (dst_a, 0.0),
            ComposeOp::Out => (1.0 - dst_a, 0.0),
            ComposeOp::Atop => (dst_a, 1.0 - src_a),
            ComposeOp::Dest => (0.0, 1.0),
            ComposeOp::DestOver => (1.0 - dst_a, 1.0),
            ComposeOp::DestIn => (0.0, src_a),
            ComposeOp::DestOut => (0.0, 1.0 - src_a),
            ComposeOp::DestAtop => (1.0 - dst_a, src_a),
            ComposeOp::Xor => (1.0 - dst_a, 1.0 - src_a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Darken,
    Lighten,
}

impl BlendMode {
    fn apply(self, src: f32, dst: f32) -> f32 {
        match self {
            BlendMode::Normal => src,
            BlendMode::Multiply => src * dst,
            BlendMode::Screen => src + dst - src * dst,
            BlendMode::Darken => src.min(dst),
            BlendMode::Lighten => src.max(dst),
        }
    }
}

/// Composes `src` over `dst` using `compose`'s Porter-Duff coefficients
/// applied to each channel blended by `blend`, per straight (non-premultiplied)
/// channel semantics, operating here directly on the premultiplied values as
/// the evaluator threads them (consistent with the teacher's blend module,
/// which blends premultiplied channels directly).
pub fn blend_compose(src: Color4, dst: Color4, compose: ComposeOp, blend: BlendMode) -> Color4 {
    let (fa, fb) = compose.coefficients(src.a(), dst.a());
    let blended = |s: f32, d: f32| blend.apply(s, d);
    Color4::new(
        blended(src.r(), dst.r()) * fa + dst.r() * fb,
        blended(src.g(), dst.g()) * fa + dst.g() * fb,
        blended(src.b(), dst.b()) * fa + dst.b() * fb,
        src.a() * fa + dst.a() * fb,
    )
}

/// A 4x4 color matrix plus translation, applied to a straight RGBA color
/// (Filter node, §4.3).
#[derive(Debug, Clone, PartialEq)]
pub struct ColorMatrix {
    /// Row-major 4x4 linear part.
    pub m: [[f32; 4]; 4],
    pub translate: [f32; 4],
}

impl ColorMatrix {
    pub fn identity() -> ColorMatrix {
        let mut m = [[0.0; 4]; 4];
        for i in 0..4 {
            m[i][i] = 1.0;
        }
        ColorMatrix {
            m,
            translate: [0.0; 4],
        }
    }

    pub fn apply(&self, c: Color4) -> Color4 {
        let v = [c.r(), c.g(), c.b(), c.a()];
        let mut out = [0.0f32; 4];
        for (row, out_v) in self.m.iter().zip(out.iter_mut()) {
            *out_v = row.iter().zip(v.iter()).map(|(a, b)| a * b).sum();
        }
        Color4::new(
            out[0] + self.translate[0],
            out[1] + self.translate[1],
            out[2] + self.translate[2],
            out[3] + self.translate[3],
        )
    }

    fn is_identity(&self) -> bool {
        self == &ColorMatrix::identity()
    }
}

/// A sampled raster image, referenced by `Image` nodes. Pixels are stored
/// straight (non-premultiplied); sampling premultiplies on the way out.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color4>,
}

impl ImageData {
    pub fn get(&self, x: i64, y: i64, extend: ExtendMode) -> Color4 {
        let wrap = |v: i64, len: u32| -> u32 {
            let len = len as i64;
            if len == 0 {
                return 0;
            }
            match extend {
                ExtendMode::Pad => v.clamp(0, len - 1) as u32,
                ExtendMode::Repeat => v.rem_euclid(len) as u32,
                ExtendMode::Reflect => {
                    let period = 2 * len;
                    let m = v.rem_euclid(period);
                    (if m >= len { period - 1 - m } else { m }) as u32
                }
            }
        };
        let x = wrap(x, self.width);
        let y = wrap(y, self.height);
        self.pixels[(y * self.width + x) as usize]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhongLight {
    pub position: Pt3,
    pub color: Color4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlanar {
    pub program: ProgramRef,
    pub triangle: [Pt3; 3],
}

/// The exhaustive set of render-program node kinds (§4.3). New kinds are
/// never added piecemeal; a change to this enum touches every exhaustive
/// match in `simplify`, `eval`, and `instr`.
#[derive(Debug, Clone)]
pub enum ProgramKind {
    Color(Color4),
    Stack(Vec<ProgramRef>),
    Alpha(ProgramRef, f32),
    BlendCompose {
        src: ProgramRef,
        dst: ProgramRef,
        compose: ComposeOp,
        blend: BlendMode,
    },
    PathBoolean {
        path: PathId,
        fill_rule: FillRule,
        inside: ProgramRef,
        outside: ProgramRef,
    },
    Filter {
        matrix: ColorMatrix,
        child: ProgramRef,
    },
    Image {
        image: Arc<ImageData>,
        transform: Transform2,
        extend: ExtendMode,
        resample: ResampleType,
    },
    LinearBlend {
        from: ProgramRef,
        to: ProgramRef,
        start: Pt2,
        end: Pt2,
    },
    RadialBlend {
        from: ProgramRef,
        to: ProgramRef,
        center: Pt2,
        radius: f64,
    },
    LinearGradient {
        stops: Vec<(f64, Color4)>,
        start: Pt2,
        end: Pt2,
        accuracy: GradientAccuracy,
    },
    RadialGradient {
        stops: Vec<(f64, Color4)>,
        center: Pt2,
        radius: f64,
        accuracy: GradientAccuracy,
    },
    BarycentricBlend {
        colors: [ProgramRef; 3],
        triangle: [Pt2; 3],
    },
    BarycentricPerspectiveBlend {
        colors: [ProgramRef; 3],
        triangle: [Pt3; 3],
    },
    Phong {
        ambient: Color4,
        diffuse: Color4,
        specular: Color4,
        shininess: f32,
        lights: Vec<PhongLight>,
    },
    Normalize(ProgramRef),
    NormalDebug,
    DepthSort(Vec<RenderPlanar>),
    Premultiply(ProgramRef),
    Unpremultiply(ProgramRef),
    ColorSpaceConvert {
        from: ColorSpace,
        to: ColorSpace,
        child: ProgramRef,
    },
}

#[derive(Debug, Clone)]
pub struct RenderProgram {
    pub kind: ProgramKind,
    pub flags: Flags,
}

fn child_flags<'a>(children: impl IntoIterator<Item = &'a ProgramRef>) -> Flags {
    children
        .into_iter()
        .fold(Flags::default(), |acc, c| acc.union(c.flags))
}

impl RenderProgram {
    fn wrap(kind: ProgramKind, flags: Flags) -> ProgramRef {
        Arc::new(RenderProgram { kind, flags })
    }

    pub fn color(c: Color4) -> ProgramRef {
        RenderProgram::wrap(
            ProgramKind::Color(c),
            Flags {
                fully_transparent: c.is_fully_transparent(),
                fully_opaque: c.is_fully_opaque(),
                needs_face: false,
                needs_area: false,
                needs_centroid: false,
            },
        )
    }

    pub fn stack(children: Vec<ProgramRef>) -> ProgramRef {
        let mut flags = child_flags(&children);
        flags.fully_transparent = children.iter().all(|c| c.flags.fully_transparent);
        flags.fully_opaque = children.iter().rev().any(|c| c.flags.fully_opaque);
        RenderProgram::wrap(ProgramKind::Stack(children), flags)
    }

    pub fn alpha(child: ProgramRef, a: f32) -> ProgramRef {
        let a = a.clamp(0.0, 1.0);
        let mut flags = child.flags;
        flags.fully_transparent = child.flags.fully_transparent || a <= 0.0;
        flags.fully_opaque = child.flags.fully_opaque && a >= 1.0;
        RenderProgram::wrap(ProgramKind::Alpha(child, a), flags)
    }

    pub fn blend_compose(
        src: ProgramRef,
        dst: ProgramRef,
        compose: ComposeOp,
        blend: BlendMode,
    ) -> ProgramRef {
        let flags = child_flags([&src, &dst]);
        RenderProgram::wrap(
            ProgramKind::BlendCompose {
                src,
                dst,
                compose,
                blend,
            },
            flags,
        )
    }

    pub fn path_boolean(
        path: PathId,
        fill_rule: FillRule,
        inside: ProgramRef,
        outside: ProgramRef,
    ) -> ProgramRef {
        let flags = child_flags([&inside, &outside]);
        RenderProgram::wrap(
            ProgramKind::PathBoolean {
                path,
                fill_rule,
                inside,
                outside,
            },
            flags,
        )
    }

    pub fn filter(matrix: ColorMatrix, child: ProgramRef) -> ProgramRef {
        let mut flags = child.flags;
        // A non-identity matrix can move alpha in or out of {0,1}; only an
        // identity matrix is safe to treat as flag-preserving.
        if !matrix.is_identity() {
            flags.fully_transparent = false;
            flags.fully_opaque = false;
        }
        RenderProgram::wrap(ProgramKind::Filter { matrix, child }, flags)
    }

    pub fn image(
        image: Arc<ImageData>,
        transform: Transform2,
        extend: ExtendMode,
        resample: ResampleType,
    ) -> ProgramRef {
        RenderProgram::wrap(
            ProgramKind::Image {
                image,
                transform,
                extend,
                resample,
            },
            Flags {
                fully_transparent: false,
                fully_opaque: false,
                needs_face: true,
                needs_area: false,
                needs_centroid: true,
            },
        )
    }

    pub fn linear_blend(from: ProgramRef, to: ProgramRef, start: Pt2, end: Pt2) -> ProgramRef {
        let mut flags = child_flags([&from, &to]);
        flags.needs_centroid = true;
        RenderProgram::wrap(ProgramKind::LinearBlend { from, to, start, end }, flags)
    }

    pub fn radial_blend(from: ProgramRef, to: ProgramRef, center: Pt2, radius: f64) -> ProgramRef {
        let mut flags = child_flags([&from, &to]);
        flags.needs_centroid = true;
        RenderProgram::wrap(
            ProgramKind::RadialBlend {
                from,
                to,
                center,
                radius,
            },
            flags,
        )
    }

    pub fn linear_gradient(
        stops: Vec<(f64, Color4)>,
        start: Pt2,
        end: Pt2,
        accuracy: GradientAccuracy,
    ) -> ProgramRef {
        let fully_opaque = stops.iter().all(|(_, c)| c.is_fully_opaque());
        let fully_transparent = stops.iter().all(|(_, c)| c.is_fully_transparent());
        RenderProgram::wrap(
            ProgramKind::LinearGradient {
                stops,
                start,
                end,
                accuracy,
            },
            Flags {
                fully_transparent,
                fully_opaque,
                needs_face: false,
                needs_area: false,
                needs_centroid: true,
            },
        )
    }

    pub fn radial_gradient(
        stops: Vec<(f64, Color4)>,
        center: Pt2,
        radius: f64,
        accuracy: GradientAccuracy,
    ) -> ProgramRef {
        let fully_opaque = stops.iter().all(|(_, c)| c.is_fully_opaque());
        let fully_transparent = stops.iter().all(|(_, c)| c.is_fully_transparent());
        RenderProgram::wrap(
            ProgramKind::RadialGradient {
                stops,
                center,
                radius,
                accuracy,
            },
            Flags {
                fully_transparent,
                fully_opaque,
                needs_face: false,
                needs_area: false,
                needs_centroid: true,
            },
        )
    }

    pub fn barycentric_blend(colors: [ProgramRef; 3], triangle: [Pt2; 3]) -> ProgramRef {
        let flags = child_flags(colors.iter());
        let mut flags = flags;
        flags.needs_centroid = true;
        RenderProgram::wrap(ProgramKind::BarycentricBlend { colors, triangle }, flags)
    }

    pub fn barycentric_perspective_blend(
        colors: [ProgramRef; 3],
        triangle: [Pt3; 3],
    ) -> ProgramRef {
        let mut flags = child_flags(colors.iter());
        flags.needs_centroid = true;
        RenderProgram::wrap(
            ProgramKind::BarycentricPerspectiveBlend { colors, triangle },
            flags,
        )
    }

    pub fn phong(
        ambient: Color4,
        diffuse: Color4,
        specular: Color4,
        shininess: f32,
        lights: Vec<PhongLight>,
    ) -> ProgramRef {
        RenderProgram::wrap(
            ProgramKind::Phong {
                ambient,
                diffuse,
                specular,
                shininess,
                lights,
            },
            Flags {
                fully_transparent: false,
                fully_opaque: ambient.is_fully_opaque()
                    && diffuse.is_fully_opaque()
                    && specular.is_fully_opaque(),
                needs_face: false,
                needs_area: false,
                needs_centroid: true,
            },
        )
    }

    pub fn normalize(child: ProgramRef) -> ProgramRef {
        let flags = child.flags;
        RenderProgram::wrap(ProgramKind::Normalize(child), flags)
    }

    pub fn normal_debug() -> ProgramRef {
        RenderProgram::wrap(
            ProgramKind::NormalDebug,
            Flags {
                fully_transparent: false,
                fully_opaque: true,
                needs_face: false,
                needs_area: false,
                needs_centroid: false,
            },
        )
    }

    pub fn depth_sort(items: Vec<RenderPlanar>) -> ProgramRef {
        let flags = Flags {
            fully_transparent: items.iter().all(|i| i.program.flags.fully_transparent),
            fully_opaque: false,
            needs_face: true,
            needs_area: true,
            needs_centroid: true,
        };
        RenderProgram::wrap(ProgramKind::DepthSort(items), flags)
    }

    pub fn premultiply(child: ProgramRef) -> ProgramRef {
        let flags = child.flags;
        RenderProgram::wrap(ProgramKind::Premultiply(child), flags)
    }

    pub fn unpremultiply(child: ProgramRef) -> ProgramRef {
        let flags = child.flags;
        RenderProgram::wrap(ProgramKind::Unpremultiply(child), flags)
    }

    pub fn color_space_convert(from: ColorSpace, to: ColorSpace, child: ProgramRef) -> ProgramRef {
        let flags = child.flags;
        RenderProgram::wrap(ProgramKind::ColorSpaceConvert { from, to, child }, flags)
    }
}
