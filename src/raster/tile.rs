//! Tile/bin grid (§3, §4.4 step 2-3): disjoint axis-aligned sub-regions of
//! the output image. The tile grid is coarse (the configured `tileSize`,
//! typically 256-1024px) and is what the scheduler hands to worker threads;
//! bins further subdivide a tile down to a size that keeps the per-pixel
//! work of one bin comfortably inside cache.

use crate::geometry::Bounds2;

/// Default bin side in pixels; small enough that a bin's worth of per-pixel
/// filter-support clipping and program evaluation stays cache-resident.
pub const DEFAULT_BIN_SIZE: f64 = 32.0;

/// A tile's grid coordinates, also used as the unit the `RasterLog` sink
/// reports timings against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub col: u32,
    pub row: u32,
}

impl std::fmt::Display for TileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.col, self.row)
    }
}

/// One coarse tile of the output, independently assigned to a worker thread.
#[derive(Debug, Clone, Copy)]
pub struct RasterTile {
    pub id: TileId,
    pub bounds: Bounds2,
}

/// A finer subdivision of a `RasterTile`, the unit the binning step clips
/// faces to before per-pixel integration.
#[derive(Debug, Clone, Copy)]
pub struct RasterBin {
    pub bounds: Bounds2,
}

/// Partition `output_bounds` into a grid of `tile_size`-pixel tiles, row
/// major, each tagged with its `(col, row)` grid coordinate.
pub fn tile_grid(output_bounds: Bounds2, tile_size: f64) -> Vec<RasterTile> {
    if output_bounds.is_empty() || tile_size <= 0.0 {
        return Vec::new();
    }
    let mut tiles = Vec::new();
    let mut row = 0u32;
    let mut y = output_bounds.min_y;
    while y < output_bounds.max_y {
        let y1 = (y + tile_size).min(output_bounds.max_y);
        let mut col = 0u32;
        let mut x = output_bounds.min_x;
        while x < output_bounds.max_x {
            let x1 = (x + tile_size).min(output_bounds.max_x);
            tiles.push(RasterTile {
                id: TileId { col, row },
                bounds: Bounds2::new(x, y, x1, y1),
            });
            x = x1;
            col += 1;
        }
        y = y1;
        row += 1;
    }
    tiles
}

/// Split one tile's bounds into bins no larger than `bin_size` on a side.
pub fn bin_grid(tile_bounds: Bounds2, bin_size: f64) -> Vec<RasterBin> {
    tile_bounds
        .tiles(bin_size)
        .into_iter()
        .map(|bounds| RasterBin { bounds })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_grid_covers_output_bounds_exactly() {
        let bounds = Bounds2::new(0.0, 0.0, 600.0, 300.0);
        let tiles = tile_grid(bounds, 256.0);
        let total: f64 = tiles.iter().map(|t| t.bounds.area()).sum();
        assert!((total - bounds.area()).abs() < 1e-6);
        // 3 columns (256, 256, 88) x 2 rows (256, 44).
        assert_eq!(tiles.len(), 6);
    }

    #[test]
    fn bin_grid_covers_a_single_tile_exactly() {
        let tile_bounds = Bounds2::new(0.0, 0.0, 256.0, 256.0);
        let bins = bin_grid(tile_bounds, DEFAULT_BIN_SIZE);
        let total: f64 = bins.iter().map(|b| b.bounds.area()).sum();
        assert!((total - tile_bounds.area()).abs() < 1e-6);
    }
}
