//! Shared 2-D primitives used across the face algebra, CAG, and the scheduler.

pub mod bounds;
pub mod matrix;

pub use self::bounds::Bounds2;
pub use self::matrix::Transform2;

use nalgebra::{Point2, Point3, Vector2, Vector3};

/// A plain 2-D point, aliasing `nalgebra::Point2<f64>`.
pub type Pt2 = Point2<f64>;
/// A plain 2-D vector, aliasing `nalgebra::Vector2<f64>`.
pub type Vec2 = Vector2<f64>;
/// A 3-D point, used by `DepthSort`'s oriented triangles and barycentric
/// perspective blending.
pub type Pt3 = Point3<f64>;
/// A 3-D vector, used by `Phong` lighting and face normals.
pub type Vec3 = Vector3<f64>;

/// Closed scalar interval, returned by `getDotRange`/`getDistanceRangeTo*`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    #[inline]
    pub fn new(min: f64, max: f64) -> Range {
        debug_assert!(min <= max, "Range::new requires min <= max");
        Range { min, max }
    }

    #[inline]
    pub fn len(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    pub fn union(&self, other: Range) -> Range {
        Range::new(self.min.min(other.min), self.max.max(other.max))
    }
}

/// A direction-agnostic half-plane `{ p : normal . p <= d }`, used by the
/// binary/stripe line-clip family in `crate::face`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfPlane {
    pub normal: Vec2,
    pub d: f64,
}

impl HalfPlane {
    pub fn new(normal: Vec2, d: f64) -> HalfPlane {
        HalfPlane { normal, d }
    }

    #[inline]
    pub fn signed_distance(&self, p: Pt2) -> f64 {
        self.normal.dot(&p.coords) - self.d
    }
}
