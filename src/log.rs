//! Diagnostics sink injected through `RasterizationOptions::log`.
//!
//! The original engine performs a process-wide "register by name" side
//! effect at construction time purely for diagnostics; per the redesign note
//! in §9 this is dropped in favor of passing an explicit `&dyn RasterLog`
//! down through the scheduler. The crate's own module-boundary tracing still
//! goes through the ordinary `log` facade (`log::trace!` etc.) — `RasterLog`
//! is specifically for the scheduler's per-tile/per-face counters a caller
//! may want to capture without configuring a global logger.

use std::time::Duration;

use crate::raster::tile::TileId;

/// Sink for rasterization diagnostics. Implementations must be `Send + Sync`
/// since tiles are processed concurrently (§5).
pub trait RasterLog: Send + Sync {
    /// A degenerate-but-recoverable geometric case was encountered and
    /// resolved locally (collinear triple crossing, zero-length edge, ...).
    /// Never fatal; `where_` names the call site for triage.
    fn degenerate_geometry(&self, _where_: &'static str) {}

    fn tile_started(&self, _tile: TileId) {}

    fn tile_finished(&self, _tile: TileId, _duration: Duration) {}
}

/// Default no-op sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLog;

impl RasterLog for NullLog {}

/// Atomic-counter sink, primarily useful in tests that assert on how many
/// degenerate cases a given input triggers.
#[derive(Debug, Default)]
pub struct CountingLog {
    pub degenerate: std::sync::atomic::AtomicUsize,
    pub tiles_started: std::sync::atomic::AtomicUsize,
    pub tiles_finished: std::sync::atomic::AtomicUsize,
}

impl RasterLog for CountingLog {
    fn degenerate_geometry(&self, where_: &'static str) {
        log::debug!("degenerate geometry recovered in {where_}");
        self.degenerate
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn tile_started(&self, tile: TileId) {
        log::trace!("tile {tile:?} started");
        self.tiles_started
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn tile_finished(&self, tile: TileId, duration: Duration) {
        log::trace!("tile {tile:?} finished in {duration:?}");
        self.tiles_finished
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}
