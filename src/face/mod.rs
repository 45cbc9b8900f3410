//! `ClippableFace`: the polygonal/edged/edged-clipped sum type and the
//! operations of §4.1.

pub mod clip;
pub mod filter;
pub mod linear_edge;
pub mod moment;

pub use self::linear_edge::LinearEdge;

use crate::geometry::{Bounds2, Pt2, Range, Transform2, Vec2};

/// A closed, oriented loop of vertices. Positive (counter-clockwise)
/// orientation has positive signed area (§3).
pub type Polygon = Vec<Pt2>;

/// Net winding contribution of each side of an `EdgedClipped` face's bounds,
/// standing in for the corner-to-corner count-only chords that would
/// otherwise have to be materialized (§3, §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipCounts {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl ClipCounts {
    pub fn is_zero(&self) -> bool {
        self.min_x == 0 && self.min_y == 0 && self.max_x == 0 && self.max_y == 0
    }
}

/// Sum type over the three clippable-face representations (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum ClippableFace {
    Polygonal(Vec<Polygon>),
    Edged(Vec<LinearEdge>),
    EdgedClipped {
        edges: Vec<LinearEdge>,
        bounds: Bounds2,
        clip_counts: ClipCounts,
    },
}

impl ClippableFace {
    pub fn empty() -> ClippableFace {
        ClippableFace::Edged(Vec::new())
    }

    /// Turn a polygon loop into its closed directed edge list.
    fn polygon_edges(poly: &[Pt2]) -> impl Iterator<Item = LinearEdge> + '_ {
        let n = poly.len();
        (0..n)
            .filter(move |_| n > 1)
            .map(move |i| LinearEdge::new(poly[i], poly[(i + 1) % n]))
    }

    /// The four directed boundary edges (CCW, bottom/right/top/left) implied
    /// by `bounds`, each scaled by the `clip_counts` multiplicity it carries.
    /// Returned with each edge's signed multiplicity for use with the
    /// moment-weighted accumulators.
    fn side_edges(bounds: Bounds2, counts: ClipCounts) -> Vec<(LinearEdge, f64)> {
        let (x0, y0, x1, y1) = (bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y);
        vec![
            (
                LinearEdge::count_only(Pt2::new(x0, y0), Pt2::new(x1, y0)),
                counts.min_y as f64,
            ),
            (
                LinearEdge::count_only(Pt2::new(x1, y0), Pt2::new(x1, y1)),
                counts.max_x as f64,
            ),
            (
                LinearEdge::count_only(Pt2::new(x1, y1), Pt2::new(x0, y1)),
                counts.max_y as f64,
            ),
            (
                LinearEdge::count_only(Pt2::new(x0, y1), Pt2::new(x0, y0)),
                counts.min_x as f64,
            ),
        ]
    }

    /// All edges contributing to this face's integrals, expanded so that
    /// `EdgedClipped`'s clip-count sides become ordinary (possibly repeated)
    /// edges. Used by callers that need a concrete edge list rather than the
    /// weighted-moment fast path (`moment_weighted`).
    pub fn edges(&self) -> Vec<LinearEdge> {
        match self {
            ClippableFace::Polygonal(polys) => polys
                .iter()
                .flat_map(|p| Self::polygon_edges(p))
                .collect(),
            ClippableFace::Edged(edges) => edges.clone(),
            ClippableFace::EdgedClipped {
                edges, bounds, clip_counts,
            } => {
                let mut out = edges.clone();
                for (edge, mult) in Self::side_edges(*bounds, *clip_counts) {
                    let n = mult.round() as i32;
                    for _ in 0..n.unsigned_abs() {
                        out.push(if n < 0 { edge.reversed() } else { edge });
                    }
                }
                out
            }
        }
    }

    /// `moment(a, b)` generalized to weight each of an `EdgedClipped` face's
    /// synthetic side edges by its (possibly fractional, but in practice
    /// integer) clip count instead of materializing repeated edges.
    fn moment_weighted(&self, a: i32, b: i32) -> f64 {
        match self {
            ClippableFace::Polygonal(_) | ClippableFace::Edged(_) => {
                moment::moment(&self.edges(), a, b)
            }
            ClippableFace::EdgedClipped {
                edges,
                bounds,
                clip_counts,
            } => {
                let mut total = moment::moment(edges, a, b);
                if !clip_counts.is_zero() {
                    for (edge, mult) in Self::side_edges(*bounds, *clip_counts) {
                        total += mult * moment::moment(std::slice::from_ref(&edge), a, b);
                    }
                }
                total
            }
        }
    }

    pub fn get_bounds(&self) -> Bounds2 {
        match self {
            ClippableFace::Polygonal(polys) => {
                Bounds2::from_points(polys.iter().flatten().copied())
            }
            ClippableFace::Edged(edges) => {
                edges.iter().fold(Bounds2::EMPTY, |b, e| b.union(e.bounds()))
            }
            ClippableFace::EdgedClipped { bounds, .. } => *bounds,
        }
    }

    pub fn get_area(&self) -> f64 {
        self.moment_weighted(0, 0)
    }

    pub fn get_centroid_partial(&self) -> (f64, f64) {
        (self.moment_weighted(1, 0), self.moment_weighted(0, 1))
    }

    pub fn get_centroid(&self, area: f64) -> (f64, f64) {
        if area.abs() < 1e-12 {
            return (0.0, 0.0);
        }
        let (mx, my) = self.get_centroid_partial();
        (mx / area, my / area)
    }

    /// Signed crossing number of this face's boundary around the origin;
    /// should be an integer (to floating slop) for a properly closed face
    /// and is used as a closure sanity check.
    pub fn get_zero(&self) -> i64 {
        let mut winding = 0.0_f64;
        for e in self.edges() {
            // Ray casting: does the edge cross the positive x-axis from the origin?
            let (y0, y1) = (e.start.y, e.end.y);
            if (y0 <= 0.0) != (y1 <= 0.0) {
                let t = -y0 / (y1 - y0);
                let x_at = e.start.x + t * e.dx();
                if x_at > 0.0 {
                    winding += if y1 > y0 { 1.0 } else { -1.0 };
                }
            }
        }
        winding.round() as i64
    }

    /// RMS-distance approximation to the average distance from `p` to points
    /// inside the face, using the centroid and the face's second central
    /// moment (the exact average-distance integral has no closed form for a
    /// general polygon; this is the standard second-moment approximation
    /// used for radial falloff estimates).
    pub fn get_average_distance(&self, p: Pt2, area: f64) -> f64 {
        if area.abs() < 1e-12 {
            return 0.0;
        }
        let (cx, cy) = self.get_centroid(area);
        let mxx = self.moment_weighted(2, 0) / area - cx * cx;
        let myy = self.moment_weighted(0, 2) / area - cy * cy;
        let variance = (mxx.max(0.0) + myy.max(0.0)).max(0.0);
        let dx = p.x - cx;
        let dy = p.y - cy;
        (dx * dx + dy * dy + variance).sqrt()
    }

    pub fn get_average_distance_transformed_to_origin(
        &self,
        m: &Transform2,
        area: f64,
    ) -> f64 {
        let transformed = self.get_transformed(m);
        transformed.get_average_distance(Pt2::origin(), area * m.linear_det().abs())
    }

    /// Range of `dir . p` over every vertex of the face, i.e. the support
    /// function sampled at the face's boundary vertices.
    pub fn get_dot_range(&self, dir: Vec2) -> Range {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for e in self.edges() {
            for p in [e.start, e.end] {
                let d = dir.dot(&p.coords);
                min = min.min(d);
                max = max.max(d);
            }
        }
        if !min.is_finite() {
            Range::new(0.0, 0.0)
        } else {
            Range::new(min, max)
        }
    }

    /// Range of Euclidean distance from `p` to each edge's closest point.
    pub fn get_distance_range_to_edges(&self, p: Pt2) -> Range {
        let mut min = f64::INFINITY;
        let mut max = 0.0_f64;
        for e in self.edges() {
            let d = distance_to_segment(p, e.start, e.end);
            min = min.min(d);
            max = max.max(d);
        }
        if !min.is_finite() {
            Range::new(0.0, 0.0)
        } else {
            Range::new(min, max)
        }
    }

    /// Conservative range of distance from `p` to any point inside the face:
    /// `[0, max-distance-to-a-vertex]` if `p` is inside the face's bounds,
    /// else `[distance-to-edges.min, distance-to-edges.max]`.
    pub fn get_distance_range_to_inside(&self, p: Pt2) -> Range {
        let edge_range = self.get_distance_range_to_edges(p);
        let bounds = self.get_bounds();
        if bounds.min_x <= p.x && p.x <= bounds.max_x && bounds.min_y <= p.y && p.y <= bounds.max_y
        {
            Range::new(0.0, edge_range.max)
        } else {
            edge_range
        }
    }

    pub fn get_transformed(&self, m: &Transform2) -> ClippableFace {
        match self {
            ClippableFace::Polygonal(polys) => ClippableFace::Polygonal(
                polys
                    .iter()
                    .map(|poly| poly.iter().map(|p| m.transform_point(*p)).collect())
                    .collect(),
            ),
            ClippableFace::Edged(edges) => ClippableFace::Edged(
                edges
                    .iter()
                    .map(|e| LinearEdge {
                        start: m.transform_point(e.start),
                        end: m.transform_point(e.end),
                        count_only: e.count_only,
                    })
                    .collect(),
            ),
            ClippableFace::EdgedClipped { bounds, .. } => {
                // Count-only side edges encode axis-aligned clip geometry;
                // an arbitrary transform can break that invariant, so we
                // expand to concrete edges before transforming.
                let edges = self.edges();
                let transformed: Vec<LinearEdge> = edges
                    .iter()
                    .map(|e| LinearEdge {
                        start: m.transform_point(e.start),
                        end: m.transform_point(e.end),
                        count_only: false,
                    })
                    .collect();
                let _ = bounds;
                ClippableFace::Edged(transformed)
            }
        }
    }

    pub fn to_polygonal(&self) -> ClippableFace {
        match self {
            ClippableFace::Polygonal(_) => self.clone(),
            _ => ClippableFace::Polygonal(vec![clip::trace_loops(&self.edges())]),
        }
    }

    pub fn to_edged(&self) -> ClippableFace {
        match self {
            ClippableFace::Edged(_) => self.clone(),
            _ => ClippableFace::Edged(self.edges()),
        }
    }

    pub fn to_edged_clipped(&self, bounds: Bounds2) -> ClippableFace {
        let clipped = clip::clip_to_bounds(self, bounds);
        clipped
    }
}

/// Euclidean distance from `p` to the closest point on segment `a -> b`.
pub fn distance_to_segment(p: Pt2, a: Pt2, b: Pt2) -> f64 {
    let ab = b - a;
    let len2 = ab.dot(&ab);
    if len2 < 1e-18 {
        return (p - a).norm();
    }
    let t = crate::numeric::clamp((p - a).dot(&ab) / len2, 0.0, 1.0);
    let proj = a + ab * t;
    (p - proj).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> ClippableFace {
        ClippableFace::Polygonal(vec![vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(1.0, 0.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(0.0, 1.0),
        ]])
    }

    #[test]
    fn polygonal_and_edged_area_agree() {
        let poly = unit_square();
        let edged = poly.to_edged();
        assert!((poly.get_area() - edged.get_area()).abs() < 1e-10);
    }

    #[test]
    fn zero_is_zero_for_closed_loop() {
        let face = ClippableFace::Polygonal(vec![vec![
            Pt2::new(-1.0, -1.0),
            Pt2::new(1.0, -1.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(-1.0, 1.0),
        ]]);
        assert_eq!(face.get_zero(), 1);
    }

    #[test]
    fn centroid_of_unit_square_is_center() {
        let face = unit_square();
        let area = face.get_area();
        let (cx, cy) = face.get_centroid(area);
        assert!((cx - 0.5).abs() < 1e-9 && (cy - 0.5).abs() < 1e-9);
    }
}
