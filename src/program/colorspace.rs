//! Threads a `ColorSpaceConvert` chain through a program subtree along the
//! minimal path found by `crate::colorspace::shortest_path` (§4.3's
//! `convert(renderProgram, from, to)`).

use crate::colorspace::{shortest_path, ColorSpace};

use super::node::{ProgramRef, RenderProgram};

/// Wrap `program` in the sequence of `ColorSpaceConvert` nodes needed to go
/// from `from` to `to`. Returns `program` unchanged if the two spaces are the
/// same.
pub fn convert(program: ProgramRef, from: ColorSpace, to: ColorSpace) -> ProgramRef {
    let mut node = program;
    for edge in shortest_path(from, to) {
        node = RenderProgram::color_space_convert(edge.from, edge.to, node);
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color4;
    use crate::program::eval::{evaluate, EvalContext};
    use crate::geometry::Bounds2;

    #[test]
    fn display_p3_roundtrip_through_program_nodes_is_identity() {
        let base = RenderProgram::color(Color4::premultiply(Color4::new(0.3, 0.6, 0.2, 1.0)));
        let out_node = convert(
            convert(base, ColorSpace::Srgb, ColorSpace::DisplayP3),
            ColorSpace::DisplayP3,
            ColorSpace::Srgb,
        );
        let simplified = super::super::simplify::simplify(&out_node);
        let ctx = EvalContext::new(Bounds2::EMPTY);
        let result = evaluate(&simplified, &ctx);
        assert!((result.r() - 0.3).abs() < 1e-3);
        assert!((result.g() - 0.6).abs() < 1e-3);
        assert!((result.b() - 0.2).abs() < 1e-3);
    }
}
