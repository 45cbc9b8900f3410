//! 2-D affine transforms used to push `transformed()` through faces and
//! render-program nodes alike (§4.3's `transformed(node, M)` contract).

use nalgebra::{Matrix3, Point2, Vector2};

use super::{Bounds2, Pt2, Vec2};

/// A 2-D affine transform, stored as a 3x3 homogeneous matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2(pub Matrix3<f64>);

impl Transform2 {
    pub fn identity() -> Transform2 {
        Transform2(Matrix3::identity())
    }

    pub fn translation(t: Vec2) -> Transform2 {
        let mut m = Matrix3::identity();
        m[(0, 2)] = t.x;
        m[(1, 2)] = t.y;
        Transform2(m)
    }

    pub fn scale(sx: f64, sy: f64) -> Transform2 {
        Transform2(Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0))
    }

    pub fn from_rows(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Transform2 {
        Transform2(Matrix3::new(a, b, e, c, d, f, 0.0, 0.0, 1.0))
    }

    pub fn then(&self, next: &Transform2) -> Transform2 {
        Transform2(next.0 * self.0)
    }

    pub fn transform_point(&self, p: Pt2) -> Pt2 {
        let v = self.0 * Point2::new(p.x, p.y).to_homogeneous();
        Point2::new(v.x / v.z, v.y / v.z)
    }

    pub fn transform_vector(&self, v: Vec2) -> Vec2 {
        Vector2::new(
            self.0[(0, 0)] * v.x + self.0[(0, 1)] * v.y,
            self.0[(1, 0)] * v.x + self.0[(1, 1)] * v.y,
        )
    }

    /// Determinant of the linear part, used to correct orientation and scale
    /// area integrals after a transform.
    pub fn linear_det(&self) -> f64 {
        self.0[(0, 0)] * self.0[(1, 1)] - self.0[(0, 1)] * self.0[(1, 0)]
    }

    pub fn inverse(&self) -> Option<Transform2> {
        self.0.try_inverse().map(Transform2)
    }

    pub fn transform_bounds(&self, b: Bounds2) -> Bounds2 {
        if b.is_empty() {
            return b;
        }
        let corners = [
            Pt2::new(b.min_x, b.min_y),
            Pt2::new(b.max_x, b.min_y),
            Pt2::new(b.max_x, b.max_y),
            Pt2::new(b.min_x, b.max_y),
        ];
        Bounds2::from_points(corners.into_iter().map(|p| self.transform_point(p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_moves_points() {
        let t = Transform2::translation(Vec2::new(1.0, 2.0));
        let p = t.transform_point(Pt2::new(0.0, 0.0));
        assert_eq!(p, Pt2::new(1.0, 2.0));
    }

    #[test]
    fn scale_changes_linear_determinant() {
        let t = Transform2::scale(2.0, 3.0);
        assert!((t.linear_det() - 6.0).abs() < 1e-12);
    }
}
