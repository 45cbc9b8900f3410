//! `CombinedRaster` (§4.2 step 5 / §4.4 step 5): the additive premultiplied
//! linear-sRGB accumulation buffer every tile writes its pixel contributions
//! into, and `finalize`, which performs the one color-space conversion,
//! gamut check, and 8-bit pack at the very end.

use crate::color::Color4;
use crate::colorspace::{self, ColorSpace};

use super::options::RasterizationOptions;

/// A sentinel magenta written in place of any out-of-gamut pixel when
/// `RasterizationOptions::show_out_of_gamut` is set, instead of clamping.
const OUT_OF_GAMUT_SENTINEL: Color4 = Color4(nalgebra::Vector4::new(1.0, 0.0, 1.0, 1.0));

/// The accumulation buffer for one `rasterize` call: one premultiplied
/// linear-sRGB `Color4` per pixel, summed additively by every tile that
/// contributes to it (§4.4 step 5). Tiles partition this buffer's pixel
/// index space disjointly, so `raster::scheduler::TileScheduler` can hand
/// out exclusive per-tile access without locking (§5).
pub struct CombinedRaster {
    width: u32,
    height: u32,
    pixels: Vec<Color4>,
}

impl CombinedRaster {
    pub fn new(width: u32, height: u32) -> CombinedRaster {
        CombinedRaster {
            width,
            height,
            pixels: vec![Color4::TRANSPARENT; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Adds `contribution` (premultiplied linear sRGB) into pixel `(x, y)`.
    /// Out-of-bounds coordinates are silently ignored; callers clip to the
    /// output bounds upstream, this is just a last-resort guard.
    #[inline]
    pub fn accumulate(&mut self, x: u32, y: u32, contribution: Color4) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        let p = self.pixels[i];
        self.pixels[i] = Color4::new(
            p.r() + contribution.r(),
            p.g() + contribution.g(),
            p.b() + contribution.b(),
            p.a() + contribution.a(),
        );
    }

    /// Converts the accumulated linear buffer to `options.color_space`,
    /// clamping (or sentinel-marking) out-of-gamut pixels, and packs the
    /// result into premultiplied 8-bit RGBA.
    pub fn finalize(&self, options: &RasterizationOptions) -> Raster {
        let mut pixels = Vec::with_capacity(self.pixels.len() * 4);
        for &accumulated in &self.pixels {
            let straight = Color4::unpremultiply(accumulated);
            let converted = colorspace::convert(ColorSpace::LinearSrgb, options.color_space, straight);
            let in_gamut = converted.is_in_gamut();
            let display = if in_gamut {
                converted
            } else if options.show_out_of_gamut {
                OUT_OF_GAMUT_SENTINEL
            } else {
                converted.clamped()
            };
            let premul = Color4::premultiply(display);
            pixels.push(to_u8(premul.r()));
            pixels.push(to_u8(premul.g()));
            pixels.push(to_u8(premul.b()));
            pixels.push(to_u8(premul.a()));
        }
        Raster {
            width: self.width,
            height: self.height,
            color_space: options.color_space,
            pixels,
        }
    }
}

#[inline]
fn to_u8(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Finished raster image (§6): premultiplied 8-bit RGBA, row-major, stride
/// `width * 4`.
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub pixels: Vec<u8>,
}

impl Raster {
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_opaque_white_produces_opaque_white_pixel() {
        let mut raster = CombinedRaster::new(2, 2);
        raster.accumulate(0, 0, Color4::new(1.0, 1.0, 1.0, 1.0));
        let out = raster.finalize(&RasterizationOptions::default());
        assert_eq!(out.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(out.pixel(1, 1), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_bounds_accumulate_is_ignored() {
        let mut raster = CombinedRaster::new(1, 1);
        raster.accumulate(5, 5, Color4::new(1.0, 0.0, 0.0, 1.0));
        let out = raster.finalize(&RasterizationOptions::default());
        assert_eq!(out.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_gamut_pixel_is_clamped_by_default() {
        let mut raster = CombinedRaster::new(1, 1);
        // Premultiplied linear value > 1.0, out of [0,1] gamut once converted.
        raster.accumulate(0, 0, Color4::new(2.0, 2.0, 2.0, 1.0));
        let out = raster.finalize(&RasterizationOptions::default());
        assert_eq!(out.pixel(0, 0), [255, 255, 255, 255]);
    }

    #[test]
    fn out_of_gamut_pixel_is_sentinel_when_requested() {
        let mut raster = CombinedRaster::new(1, 1);
        raster.accumulate(0, 0, Color4::new(2.0, 2.0, 2.0, 1.0));
        let options = RasterizationOptions::default().with_show_out_of_gamut(true);
        let out = raster.finalize(&options);
        assert_eq!(out.pixel(0, 0), [255, 0, 255, 255]);
    }
}
