//! External-facing convenience layer over CAG and the scheduler (§6):
//! `VectorCanvas` for incremental painter's-algorithm scene building, and
//! `PolygonalBoolean` for one-shot set operations between polygon outlines.

use crate::color::Color4;
use crate::error::RasterResult;
use crate::face::ClippableFace;
use crate::geometry::{Bounds2, Pt2};
use crate::path::{FillRule, RenderPath};
use crate::program::{GradientAccuracy, ProgramRef, RenderProgram};
use crate::raster::{rasterize, Raster, RasterizationOptions};
use crate::winding::PathId;

/// Accumulates fills in painter's-algorithm order and exports the whole
/// scene as one raster. Each `fill_*` call paints `path` over everything
/// painted so far, built as a `PathBoolean` of the new layer's program
/// (stacked over the running composite) against the prior composite
/// everywhere outside `path`.
///
/// The "combine adjacent equal programs" invariant (§6) is realized by CAG
/// itself, not by anything `VectorCanvas` does: pass
/// `RenderableFaceType::SimplifyingCombined` in the `RasterizationOptions`
/// given to `export` and faces get the same adjacency-aware merge
/// (`crate::cag::combine`) any other caller of `rasterize` gets. There is no
/// separate incremental merge step here.
pub struct VectorCanvas {
    paths: Vec<RenderPath>,
    composite: ProgramRef,
}

impl VectorCanvas {
    pub fn new() -> VectorCanvas {
        VectorCanvas {
            paths: Vec::new(),
            composite: RenderProgram::color(Color4::TRANSPARENT),
        }
    }

    pub fn fill_color(&mut self, path: RenderPath, color: Color4) -> &mut Self {
        self.fill_render_program(path, RenderProgram::color(color))
    }

    pub fn fill_linear_gradient(
        &mut self,
        path: RenderPath,
        stops: Vec<(f64, Color4)>,
        start: Pt2,
        end: Pt2,
        accuracy: GradientAccuracy,
    ) -> &mut Self {
        self.fill_render_program(path, RenderProgram::linear_gradient(stops, start, end, accuracy))
    }

    pub fn fill_radial_gradient(
        &mut self,
        path: RenderPath,
        stops: Vec<(f64, Color4)>,
        center: Pt2,
        radius: f64,
        accuracy: GradientAccuracy,
    ) -> &mut Self {
        self.fill_render_program(path, RenderProgram::radial_gradient(stops, center, radius, accuracy))
    }

    /// Paints `path` with an arbitrary program, over everything accumulated
    /// so far.
    pub fn fill_render_program(&mut self, path: RenderPath, program: ProgramRef) -> &mut Self {
        let path_id = self.paths.len() as PathId;
        let fill_rule = path.fill_rule;
        self.paths.push(path);

        let layered = RenderProgram::stack(vec![program, self.composite.clone()]);
        self.composite =
            RenderProgram::path_boolean(path_id, fill_rule, layered, self.composite.clone());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Renders every accumulated fill into a single raster covering
    /// `output_bounds`.
    pub fn export(&self, output_bounds: Bounds2, options: &RasterizationOptions) -> RasterResult<Raster> {
        rasterize(&self.composite, &self.paths, output_bounds, options)
    }
}

impl Default for VectorCanvas {
    fn default() -> VectorCanvas {
        VectorCanvas::new()
    }
}

/// The result of `PolygonalBoolean::get_overlaps`: the three regions a pair
/// of shapes partitions into.
pub struct Overlaps {
    pub a_only: ClippableFace,
    pub b_only: ClippableFace,
    pub intersection: ClippableFace,
}

/// One-shot polygon set operations (§6), built directly on CAG: `a`/`b` are
/// painted with distinguishable sentinel colors and the resulting faces are
/// grouped back by which source path(s) cover them.
pub struct PolygonalBoolean;

impl PolygonalBoolean {
    pub fn union(a: &RenderPath, b: &RenderPath) -> RasterResult<ClippableFace> {
        let Overlaps {
            a_only,
            b_only,
            intersection,
        } = Self::get_overlaps(a, b)?;
        Ok(merge_polygonal(vec![a_only, b_only, intersection]))
    }

    pub fn intersection(a: &RenderPath, b: &RenderPath) -> RasterResult<ClippableFace> {
        Ok(Self::get_overlaps(a, b)?.intersection)
    }

    pub fn difference(a: &RenderPath, b: &RenderPath) -> RasterResult<ClippableFace> {
        Ok(Self::get_overlaps(a, b)?.a_only)
    }

    /// Partitions `a` and `b` into the region covered only by `a`, only by
    /// `b`, and by both, via CAG's `NonZero` winding resolution against each
    /// source path independently of either path's own fill rule.
    pub fn get_overlaps(a: &RenderPath, b: &RenderPath) -> RasterResult<Overlaps> {
        let paths = [a.clone(), b.clone()];
        let sentinel_a = RenderProgram::color(Color4::new(1.0, 0.0, 0.0, 1.0));
        let sentinel_b = RenderProgram::color(Color4::new(0.0, 1.0, 0.0, 1.0));
        let neither = RenderProgram::color(Color4::TRANSPARENT);

        let program = RenderProgram::path_boolean(
            0,
            FillRule::NonZero,
            RenderProgram::path_boolean(1, FillRule::NonZero, both_marker(), sentinel_a),
            RenderProgram::path_boolean(1, FillRule::NonZero, sentinel_b, neither),
        );

        let faces = crate::cag::run(&paths, &program, crate::cag::FaceStrategy::Simple)?;

        let mut a_only = Vec::new();
        let mut b_only = Vec::new();
        let mut intersection = Vec::new();
        for face in faces {
            let polys = polys_of(&face.face);
            if crate::program::simplify::program_eq(&face.program, &both_marker()) {
                intersection.extend(polys);
            } else if crate::program::simplify::program_eq(&face.program, &sentinel_a) {
                a_only.extend(polys);
            } else if crate::program::simplify::program_eq(&face.program, &sentinel_b) {
                b_only.extend(polys);
            }
        }

        Ok(Overlaps {
            a_only: ClippableFace::Polygonal(a_only),
            b_only: ClippableFace::Polygonal(b_only),
            intersection: ClippableFace::Polygonal(intersection),
        })
    }
}

fn both_marker() -> ProgramRef {
    RenderProgram::color(Color4::new(0.0, 0.0, 1.0, 1.0))
}

fn polys_of(face: &ClippableFace) -> Vec<Vec<Pt2>> {
    match face.to_polygonal() {
        ClippableFace::Polygonal(polys) => polys,
        _ => unreachable!("to_polygonal always returns Polygonal"),
    }
}

fn merge_polygonal(faces: Vec<ClippableFace>) -> ClippableFace {
    let mut polys = Vec::new();
    for face in faces {
        polys.extend(polys_of(&face));
    }
    ClippableFace::Polygonal(polys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Subpath;

    fn square(min: Pt2, max: Pt2) -> RenderPath {
        RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(min.x, min.y),
                Pt2::new(max.x, min.y),
                Pt2::new(max.x, max.y),
                Pt2::new(min.x, max.y),
            ])],
        )
    }

    #[test]
    fn overlapping_squares_partition_into_three_regions() {
        let a = square(Pt2::new(0.0, 0.0), Pt2::new(2.0, 2.0));
        let b = square(Pt2::new(1.0, 1.0), Pt2::new(3.0, 3.0));
        let overlaps = PolygonalBoolean::get_overlaps(&a, &b).unwrap();
        assert!((overlaps.intersection.get_area() - 1.0).abs() < 1e-6);
        assert!((overlaps.a_only.get_area() - 3.0).abs() < 1e-6);
        assert!((overlaps.b_only.get_area() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn union_area_equals_sum_minus_intersection() {
        let a = square(Pt2::new(0.0, 0.0), Pt2::new(2.0, 2.0));
        let b = square(Pt2::new(1.0, 1.0), Pt2::new(3.0, 3.0));
        let union = PolygonalBoolean::union(&a, &b).unwrap();
        assert!((union.get_area() - 7.0).abs() < 1e-6);
    }

    #[test]
    fn canvas_export_paints_later_fill_over_earlier_one() {
        let mut canvas = VectorCanvas::new();
        canvas.fill_color(
            square(Pt2::new(0.0, 0.0), Pt2::new(2.0, 2.0)),
            Color4::new(1.0, 0.0, 0.0, 1.0),
        );
        canvas.fill_color(
            square(Pt2::new(0.0, 0.0), Pt2::new(2.0, 2.0)),
            Color4::new(0.0, 1.0, 0.0, 1.0),
        );
        let options = RasterizationOptions::default();
        let raster = canvas.export(Bounds2::new(0.0, 0.0, 2.0, 2.0), &options).unwrap();
        assert_eq!(raster.pixel(0, 0), [0, 255, 0, 255]);
    }
}
