//! `TileScheduler` (§4.4 steps 2-4, §5): distributes `RenderableFace`s over
//! the output's tile grid, generalizing the teacher's `Mapper`/
//! `TrustedThreadSafe` unsafe-pointer work-stealing pattern (`parallel.rs`)
//! into a safe disjoint-mutable-region-per-tile dispatch over
//! `scoped_threadpool::Pool`. Bins and per-pixel integration (steps 3-4) run
//! single-threaded inside each tile's task.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use scoped_threadpool::Pool;

use crate::face::{clip::clip_to_bounds, filter, ClippableFace};
use crate::geometry::Bounds2;
use crate::program::{evaluate, EvalContext, RenderableFace};

use super::accumulator::CombinedRaster;
use super::options::{FilterKernel, RasterizationOptions};
use super::tile::{bin_grid, tile_grid, RasterTile, DEFAULT_BIN_SIZE};

/// Disjoint-write wrapper around `CombinedRaster`, the same safety argument
/// as the teacher's `TrustedThreadSafe<T>`: every tile task only ever
/// touches pixels inside its own tile bounds, which partition the raster's
/// index space without overlap, so concurrent `as_mut()` calls from
/// different tile tasks never alias.
struct TrustedRaster(UnsafeCell<CombinedRaster>);

unsafe impl Sync for TrustedRaster {}

impl TrustedRaster {
    fn new(raster: CombinedRaster) -> TrustedRaster {
        TrustedRaster(UnsafeCell::new(raster))
    }

    /// Safety: callers must only write pixels within their own, disjoint
    /// tile bounds; see the struct-level safety argument.
    #[allow(clippy::mut_from_ref)]
    unsafe fn as_mut(&self) -> &mut CombinedRaster {
        &mut *self.0.get()
    }

    fn into_inner(self) -> CombinedRaster {
        self.0.into_inner()
    }
}

/// Distributes tiles of one `rasterize` call across a thread pool.
pub struct TileScheduler {
    pool_size: u32,
}

impl TileScheduler {
    /// A pool sized to the number of logical CPUs, matching the teacher's
    /// own `num_cpus::get()` default.
    pub fn new() -> TileScheduler {
        TileScheduler {
            pool_size: (num_cpus::get() as u32).max(1),
        }
    }

    pub fn with_threads(threads: u32) -> TileScheduler {
        TileScheduler {
            pool_size: threads.max(1),
        }
    }

    /// Runs the full tile/bin/pixel pipeline (§4.4 steps 2-4) over `faces`,
    /// accumulating into a freshly allocated `CombinedRaster` sized to
    /// `output_bounds`. `cancel`, if given, is polled between tiles only
    /// (§5's cooperative-cancellation contract).
    pub fn run(
        &self,
        faces: &[RenderableFace],
        output_bounds: Bounds2,
        options: &RasterizationOptions,
        cancel: Option<Arc<AtomicBool>>,
    ) -> CombinedRaster {
        let width = output_bounds.width().round().max(0.0) as u32;
        let height = output_bounds.height().round().max(0.0) as u32;
        let raster = TrustedRaster::new(CombinedRaster::new(width, height));
        let tiles = tile_grid(output_bounds, f64::from(options.tile_size));
        let log = options.log_sink();

        let mut pool = Pool::new(self.pool_size);
        pool.scoped(|scope| {
            for tile in &tiles {
                let raster = &raster;
                let log = log.clone();
                let cancel = cancel.clone();
                scope.execute(move || {
                    if cancel.as_deref().map_or(false, |c| c.load(Ordering::Relaxed)) {
                        return;
                    }
                    log.tile_started(tile.id);
                    let started = Instant::now();
                    // Safety: tiles partition the output's pixel index space
                    // disjointly (`tile_grid` never produces overlapping
                    // bounds), so concurrent tasks never write the same
                    // pixel.
                    let raster_mut = unsafe { raster.as_mut() };
                    process_tile(*tile, faces, output_bounds, options, raster_mut);
                    log.tile_finished(tile.id, started.elapsed());
                });
            }
        });

        raster.into_inner()
    }
}

impl Default for TileScheduler {
    fn default() -> TileScheduler {
        TileScheduler::new()
    }
}

/// Steps 2-4 for one tile: bounds-clip candidate faces to the tile, bin, and
/// integrate per pixel.
fn process_tile(
    tile: RasterTile,
    faces: &[RenderableFace],
    output_bounds: Bounds2,
    options: &RasterizationOptions,
    raster: &mut CombinedRaster,
) {
    let radius = options.filter.support_radius(options.filter_scale);
    let candidates: Vec<&RenderableFace> = faces
        .iter()
        .filter(|f| f.bounds.dilated(radius).intersects(tile.bounds))
        .collect();
    if candidates.is_empty() {
        return;
    }

    for bin in bin_grid(tile.bounds, DEFAULT_BIN_SIZE) {
        for face in &candidates {
            if !face.bounds.dilated(radius).intersects(bin.bounds) {
                continue;
            }
            integrate_face_over_bin(face, bin.bounds, output_bounds, options, radius, raster);
        }
    }
}

/// Step 4 for one (face, bin) pair: for every pixel the face's dilated
/// bounds cover inside `bin_bounds`, clip to the filter support, evaluate
/// the program, weight by the analytic filter contribution, and accumulate.
fn integrate_face_over_bin(
    face: &RenderableFace,
    bin_bounds: Bounds2,
    output_bounds: Bounds2,
    options: &RasterizationOptions,
    radius: f64,
    raster: &mut CombinedRaster,
) {
    let reach = face.bounds.dilated(radius).intersect(bin_bounds).intersect(output_bounds);
    if reach.is_empty() {
        return;
    }

    let i0 = (reach.min_x - output_bounds.min_x - 0.5).floor().max(0.0) as i64;
    let i1 = (reach.max_x - output_bounds.min_x - 0.5).ceil() as i64;
    let j0 = (reach.min_y - output_bounds.min_y - 0.5).floor().max(0.0) as i64;
    let j1 = (reach.max_y - output_bounds.min_y - 0.5).ceil() as i64;

    for j in j0..=j1 {
        if j < 0 || j as u32 >= raster.height() {
            continue;
        }
        let py = output_bounds.min_y + j as f64 + 0.5;
        for i in i0..=i1 {
            if i < 0 || i as u32 >= raster.width() {
                continue;
            }
            let px = output_bounds.min_x + i as f64 + 0.5;

            let weight = filter_weight(&face.face, options.filter, px, py);
            if weight <= 0.0 {
                continue;
            }

            let support = Bounds2::new(px - 0.5, py - 0.5, px + 0.5, py + 0.5).dilated(radius);
            let sub_face = clip_to_bounds(&face.face, support);
            let area = sub_face.get_area();
            let (cx, cy) = sub_face.get_centroid(area);
            let mut ctx = EvalContext::new(sub_face.get_bounds());
            ctx.face = Some(&sub_face);
            ctx.area = Some(area);
            ctx.centroid = Some(crate::geometry::Pt2::new(cx, cy));

            let color = evaluate(&face.program, &ctx).scale_alpha(weight as f32);
            raster.accumulate(i as u32, j as u32, color);
        }
    }
}

/// The analytic filter contribution of `face` at pixel center `(px, py)`:
/// clipped area for Box, the separable polygon-filter integrators for
/// Bilinear/Mitchell-Netravali (§4.1, §4.4 step 4).
fn filter_weight(face: &ClippableFace, kernel: FilterKernel, px: f64, py: f64) -> f64 {
    match kernel {
        FilterKernel::Box => {
            let cell = Bounds2::new(px - 0.5, py - 0.5, px + 0.5, py + 0.5);
            clip_to_bounds(face, cell).get_area()
        }
        FilterKernel::Bilinear => filter::bilinear_filtered(face, px, py, 0.0, 0.0),
        FilterKernel::MitchellNetravali => filter::mitchell_netravali_filtered(face, px, py, 0.0, 0.0),
    }
}
