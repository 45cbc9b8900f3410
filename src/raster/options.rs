//! `RasterizationOptions` (§4.4, ambient config per §4.5): the plain
//! builder-style record the scheduler is configured with.

use std::sync::Arc;

use crate::cag::FaceStrategy;
use crate::colorspace::ColorSpace;
use crate::log::{NullLog, RasterLog};

/// Polygon filter kernel selection. Each variant's `width` is the number of
/// pixels its 1-D separable kernel spans; the scheduler expands a pixel's
/// clip bounds by `0.5 * (width - 1) * filter_scale` on every side to cover
/// the kernel's full support (§4.4 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKernel {
    Box,
    Bilinear,
    MitchellNetravali,
}

impl FilterKernel {
    /// Kernel support width in pixels: 1 for Box (the pixel's own clipped
    /// area), 2 for the bilinear triangle, 4 for Mitchell-Netravali.
    pub fn width(self) -> f64 {
        match self {
            FilterKernel::Box => 1.0,
            FilterKernel::Bilinear => 2.0,
            FilterKernel::MitchellNetravali => 4.0,
        }
    }

    /// Per-side expansion of a pixel's clip bounds needed to cover this
    /// kernel's full support at the given `filter_scale`.
    pub fn support_radius(self, filter_scale: f32) -> f64 {
        0.5 * (self.width() - 1.0) * filter_scale as f64
    }
}

impl Default for FilterKernel {
    fn default() -> FilterKernel {
        FilterKernel::Box
    }
}

/// Which CAG combining strategy produces the faces handed to the scheduler;
/// `Edged` additionally forces `EdgedFace` output instead of the strategy's
/// natural polygonal result (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderableFaceType {
    Simple,
    FullyCombined,
    SimplifyingCombined,
    Traced,
    Edged,
}

impl RenderableFaceType {
    pub fn strategy(self) -> FaceStrategy {
        match self {
            RenderableFaceType::Simple | RenderableFaceType::Edged => FaceStrategy::Simple,
            RenderableFaceType::FullyCombined => FaceStrategy::FullyCombined,
            RenderableFaceType::SimplifyingCombined => FaceStrategy::SimplifyingCombined,
            RenderableFaceType::Traced => FaceStrategy::TracedCombined,
        }
    }

    pub fn forces_edged(self) -> bool {
        matches!(self, RenderableFaceType::Edged)
    }
}

impl Default for RenderableFaceType {
    fn default() -> RenderableFaceType {
        RenderableFaceType::Simple
    }
}

/// Configuration record for `rasterize` (§4.4). Built with the `with_*`
/// chain; `Default` matches the documented defaults.
#[derive(Clone)]
pub struct RasterizationOptions {
    pub tile_size: u32,
    pub filter: FilterKernel,
    pub filter_scale: f32,
    pub color_space: ColorSpace,
    pub renderable_face_type: RenderableFaceType,
    pub show_out_of_gamut: bool,
    pub log: Option<Arc<dyn RasterLog>>,
}

impl RasterizationOptions {
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_filter(mut self, filter: FilterKernel) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_filter_scale(mut self, filter_scale: f32) -> Self {
        self.filter_scale = filter_scale.max(1.0);
        self
    }

    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_renderable_face_type(mut self, renderable_face_type: RenderableFaceType) -> Self {
        self.renderable_face_type = renderable_face_type;
        self
    }

    pub fn with_show_out_of_gamut(mut self, show_out_of_gamut: bool) -> Self {
        self.show_out_of_gamut = show_out_of_gamut;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn RasterLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// The injected sink, or the no-op default if none was configured.
    pub fn log_sink(&self) -> Arc<dyn RasterLog> {
        self.log.clone().unwrap_or_else(|| Arc::new(NullLog))
    }
}

impl Default for RasterizationOptions {
    fn default() -> RasterizationOptions {
        RasterizationOptions {
            tile_size: 256,
            filter: FilterKernel::Box,
            filter_scale: 1.0,
            color_space: ColorSpace::Srgb,
            renderable_face_type: RenderableFaceType::Simple,
            show_out_of_gamut: false,
            log: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let opts = RasterizationOptions::default();
        assert_eq!(opts.tile_size, 256);
        assert_eq!(opts.filter, FilterKernel::Box);
        assert_eq!(opts.filter_scale, 1.0);
        assert_eq!(opts.color_space, ColorSpace::Srgb);
        assert_eq!(opts.renderable_face_type, RenderableFaceType::Simple);
        assert!(!opts.show_out_of_gamut);
        assert!(opts.log.is_none());
    }

    #[test]
    fn builder_chain_overrides_every_field() {
        let opts = RasterizationOptions::default()
            .with_tile_size(512)
            .with_filter(FilterKernel::MitchellNetravali)
            .with_filter_scale(2.0)
            .with_color_space(ColorSpace::DisplayP3)
            .with_renderable_face_type(RenderableFaceType::Traced)
            .with_show_out_of_gamut(true);
        assert_eq!(opts.tile_size, 512);
        assert_eq!(opts.filter, FilterKernel::MitchellNetravali);
        assert_eq!(opts.filter_scale, 2.0);
        assert_eq!(opts.color_space, ColorSpace::DisplayP3);
        assert_eq!(opts.renderable_face_type, RenderableFaceType::Traced);
        assert!(opts.show_out_of_gamut);
    }

    #[test]
    fn box_filter_has_no_support_expansion() {
        assert_eq!(FilterKernel::Box.support_radius(1.0), 0.0);
        assert_eq!(FilterKernel::Bilinear.support_radius(1.0), 0.5);
        assert_eq!(FilterKernel::MitchellNetravali.support_radius(1.0), 1.5);
    }
}
