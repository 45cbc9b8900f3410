//! The render-program tree (§4.3): an immutable expression DAG for painting,
//! its evaluator, its compiled instruction form, and the color-space graph
//! that threads conversions through it. `RenderableFace` is the hand-off
//! point to the rasterization scheduler (§3).

pub mod colorspace;
pub mod depthsort;
pub mod eval;
pub mod instr;
pub mod node;
pub mod simplify;

pub use self::eval::{evaluate, EvalContext};
pub use self::node::{
    BlendMode, ColorMatrix, ComposeOp, ExtendMode, Flags, GradientAccuracy, ImageData,
    PhongLight, ProgramKind, ProgramRef, RenderPlanar, RenderProgram, ResampleType,
};
pub use self::simplify::simplify;

use crate::face::ClippableFace;
use crate::geometry::Bounds2;

/// A `(face, program, bounds)` triple ready for rasterization (§3). Produced
/// by CAG plus face-conversion, and by per-tile/per-pixel splitting
/// downstream in the scheduler.
#[derive(Debug, Clone)]
pub struct RenderableFace {
    pub face: ClippableFace,
    pub program: ProgramRef,
    pub bounds: Bounds2,
}

impl RenderableFace {
    pub fn new(face: ClippableFace, program: ProgramRef) -> RenderableFace {
        let bounds = face.get_bounds();
        RenderableFace {
            face,
            program,
            bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color4;
    use crate::geometry::Pt2;

    #[test]
    fn simplify_is_idempotent() {
        let stack = RenderProgram::stack(vec![
            RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 0.0))),
            RenderProgram::alpha(
                RenderProgram::alpha(
                    RenderProgram::color(Color4::premultiply(Color4::new(0.0, 1.0, 0.0, 1.0))),
                    0.5,
                ),
                0.5,
            ),
        ]);
        let once = simplify(&stack);
        let twice = simplify(&once);
        assert!(simplify::program_eq(&once, &twice));
    }

    #[test]
    fn fully_transparent_child_is_dropped_from_stack() {
        let transparent =
            RenderProgram::color(Color4::premultiply(Color4::new(1.0, 1.0, 1.0, 0.0)));
        let green = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 1.0, 0.0, 1.0)));
        let stack = RenderProgram::stack(vec![transparent, green.clone()]);
        let simplified = simplify(&stack);
        assert!(simplify::program_eq(&simplified, &green));
    }

    #[test]
    fn renderable_face_bounds_match_its_face() {
        let face = ClippableFace::Polygonal(vec![vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(2.0, 2.0),
            Pt2::new(0.0, 2.0),
        ]]);
        let program = RenderProgram::color(Color4::TRANSPARENT);
        let rf = RenderableFace::new(face, program);
        assert_eq!(rf.bounds.width(), 2.0);
    }
}
