//! Premultiplied linear RGBA color, the evaluation result type threaded
//! through the render-program tree and the instruction VM (§3, §4.3).
//!
//! Grounded on the teacher's `color::predefined` module, which aliases
//! `nalgebra::VectorN` for its channel storage; this crate only ever needs
//! the 4-channel case, so `Color4` is a thin newtype over `Vector4<f32>`
//! rather than the teacher's generic 1-4 channel family.

use nalgebra::Vector4;

use crate::color::helper::AlphaMultiply;

pub mod helper;

/// A premultiplied-alpha RGBA color in whatever color space the surrounding
/// `RenderProgram` subtree declares (linear sRGB unless a conversion node
/// says otherwise).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color4(pub Vector4<f32>);

impl Color4 {
    pub const TRANSPARENT: Color4 = Color4(Vector4::new(0.0, 0.0, 0.0, 0.0));

    #[inline]
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Color4 {
        Color4(Vector4::new(r, g, b, a))
    }

    #[inline]
    pub fn r(&self) -> f32 {
        self.0.x
    }
    #[inline]
    pub fn g(&self) -> f32 {
        self.0.y
    }
    #[inline]
    pub fn b(&self) -> f32 {
        self.0.z
    }
    #[inline]
    pub fn a(&self) -> f32 {
        self.0.w
    }

    #[inline]
    pub fn is_fully_transparent(&self) -> bool {
        self.a() <= 0.0
    }

    #[inline]
    pub fn is_fully_opaque(&self) -> bool {
        self.a() >= 1.0
    }

    /// Premultiplied source-over-destination composite.
    #[inline]
    pub fn over(&self, dst: Color4) -> Color4 {
        let inv_a = 1.0 - self.a();
        Color4(self.0 + dst.0 * inv_a)
    }

    #[inline]
    pub fn scale_alpha(&self, alpha: f32) -> Color4 {
        Color4(self.0 * alpha)
    }

    pub fn premultiply(straight: Color4) -> Color4 {
        Color4::new(
            AlphaMultiply::mul_alpha(straight.r(), straight.a()),
            AlphaMultiply::mul_alpha(straight.g(), straight.a()),
            AlphaMultiply::mul_alpha(straight.b(), straight.a()),
            straight.a(),
        )
    }

    pub fn unpremultiply(premul: Color4) -> Color4 {
        if premul.a() <= 0.0 {
            return Color4::new(0.0, 0.0, 0.0, 0.0);
        }
        Color4::new(
            premul.r() / premul.a(),
            premul.g() / premul.a(),
            premul.b() / premul.a(),
            premul.a(),
        )
    }

    pub fn lerp(a: Color4, b: Color4, t: f32) -> Color4 {
        Color4(a.0.lerp(&b.0, t))
    }

    pub fn clamped(&self) -> Color4 {
        Color4(self.0.map(|c| c.clamp(0.0, 1.0)))
    }

    pub fn is_in_gamut(&self) -> bool {
        self.0.iter().all(|c| (0.0..=1.0).contains(c))
    }
}

impl Default for Color4 {
    fn default() -> Color4 {
        Color4::TRANSPARENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiply_then_unpremultiply_recovers_input() {
        let straight = Color4::new(0.5, 0.25, 1.0, 0.5);
        let premul = Color4::premultiply(straight);
        let back = Color4::unpremultiply(premul);
        assert!((back.r() - straight.r()).abs() < 1e-5);
        assert!((back.g() - straight.g()).abs() < 1e-5);
        assert!((back.b() - straight.b()).abs() < 1e-5);
    }

    #[test]
    fn unpremultiply_then_premultiply_is_identity_always() {
        let premul = Color4::new(0.2, 0.1, 0.05, 0.4);
        let roundtrip = Color4::premultiply(Color4::unpremultiply(premul));
        assert!((roundtrip.0 - premul.0).norm() < 1e-5);
    }

    #[test]
    fn over_opaque_source_replaces_destination() {
        let src = Color4::new(1.0, 0.0, 0.0, 1.0);
        let dst = Color4::new(0.0, 1.0, 0.0, 1.0);
        let out = src.over(dst);
        assert_eq!(out, src);
    }
}
