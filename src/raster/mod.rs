//! The rasterization scheduler (§4.4): CAG, tile/bin/pixel integration, and
//! final accumulation, tied together by `rasterize`, the crate's primary
//! entry point (§6).

pub mod accumulator;
pub mod options;
pub mod scheduler;
pub mod tile;

pub use self::accumulator::{CombinedRaster, Raster};
pub use self::options::{FilterKernel, RasterizationOptions, RenderableFaceType};
pub use self::scheduler::TileScheduler;
pub use self::tile::{RasterBin, RasterTile, TileId};

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::cag;
use crate::error::RasterResult;
use crate::geometry::Bounds2;
use crate::path::RenderPath;
use crate::program::{ProgramRef, RenderableFace};

/// Runs CAG, then the tile scheduler, then finalizes the accumulated raster
/// into the requested output color space (§4.4 pipeline, steps 1-5).
pub fn rasterize(
    program: &ProgramRef,
    paths: &[RenderPath],
    output_bounds: Bounds2,
    options: &RasterizationOptions,
) -> RasterResult<Raster> {
    rasterize_cancellable(program, paths, output_bounds, options, None)
}

/// As `rasterize`, but accepts a cooperative cancellation flag checked
/// between tiles (§5).
pub fn rasterize_cancellable(
    program: &ProgramRef,
    paths: &[RenderPath],
    output_bounds: Bounds2,
    options: &RasterizationOptions,
    cancel: Option<Arc<AtomicBool>>,
) -> RasterResult<Raster> {
    let strategy = options.renderable_face_type.strategy();
    let mut faces = cag::run(paths, program, strategy)?;
    if options.renderable_face_type.forces_edged() {
        faces = faces
            .into_iter()
            .map(|f| RenderableFace::new(f.face.to_edged(), f.program))
            .collect();
    }

    let scheduler = TileScheduler::new();
    let combined = scheduler.run(&faces, output_bounds, options, cancel);
    Ok(combined.finalize(options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color4;
    use crate::geometry::Pt2;
    use crate::path::{FillRule, Subpath};
    use crate::program::RenderProgram;

    #[test]
    fn rasterizing_a_unit_square_fills_one_pixel() {
        let path = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(0.0, 0.0),
                Pt2::new(1.0, 0.0),
                Pt2::new(1.0, 1.0),
                Pt2::new(0.0, 1.0),
            ])],
        );
        let program = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 1.0, 0.0, 1.0)));
        let options = RasterizationOptions::default();
        let bounds = Bounds2::new(0.0, 0.0, 2.0, 2.0);
        let raster = rasterize(&program, &[path], bounds, &options).unwrap();
        assert_eq!(raster.pixel(0, 0), [0, 255, 0, 255]);
        assert_eq!(raster.pixel(1, 1), [0, 0, 0, 0]);
    }
}
