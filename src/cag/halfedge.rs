//! CAG step 3 (§4.2): builds a half-edge graph over the already-split
//! (non-crossing) integerized edges and traces it into closed, left-turn
//! loops, nesting clockwise "hole" loops inside their smallest enclosing
//! counter-clockwise "outer" loop to produce the raw face partition.
//! Winding numbers and paint programs are resolved afterward
//! (`crate::cag::resolve`).

use std::collections::HashMap;

use crate::color::Color4;
use crate::error::RasterResult;
use crate::numeric::rational::{Rational, RationalPoint2};
use crate::program::RenderProgram;
use crate::winding::WindingMap;

use super::integerize::Integerized;
use super::intersect::{self, SplitEdge};
use super::RationalFace;

type VertexKey = (i128, i128, i128, i128);

fn vertex_key(p: RationalPoint2) -> VertexKey {
    (p.x.numer(), p.x.denom(), p.y.numer(), p.y.denom())
}

struct HalfEdge {
    origin: RationalPoint2,
    target: RationalPoint2,
    twin: usize,
    visited: bool,
}

/// Exact angular ordering of direction vectors around a shared origin,
/// sweeping counter-clockwise starting at the positive x-axis: first by
/// half-plane (upper half, including +x, then lower half), then by
/// cross-product sign within a half-plane.
fn angle_cmp(dx_a: Rational, dy_a: Rational, dx_b: Rational, dy_b: Rational) -> std::cmp::Ordering {
    let half = |dx: Rational, dy: Rational| -> i32 {
        if dy.signum() > 0 || (dy.is_zero() && dx.signum() >= 0) {
            0
        } else {
            1
        }
    };
    let ha = half(dx_a, dy_a);
    let hb = half(dx_b, dy_b);
    if ha != hb {
        return ha.cmp(&hb);
    }
    let c = dx_a * dy_b - dy_a * dx_b;
    if c.is_zero() {
        std::cmp::Ordering::Equal
    } else if c.signum() > 0 {
        std::cmp::Ordering::Less
    } else {
        std::cmp::Ordering::Greater
    }
}

/// Build the directed half-edge list and, for each half-edge, the index of
/// the next half-edge around the face lying to its left (the standard
/// "clockwise neighbor of the twin, at the twin's origin" face-tracing
/// rule for a planar straight-line graph whose edges are sorted
/// counter-clockwise around every vertex).
fn build_next_table(edges: &[SplitEdge]) -> (Vec<HalfEdge>, Vec<usize>) {
    let mut half_edges = Vec::with_capacity(edges.len() * 2);
    let mut by_vertex: HashMap<VertexKey, Vec<usize>> = HashMap::new();

    for e in edges {
        if e.start == e.end {
            continue;
        }
        let fwd = half_edges.len();
        half_edges.push(HalfEdge {
            origin: e.start,
            target: e.end,
            twin: fwd + 1,
            visited: false,
        });
        let bwd = half_edges.len();
        half_edges.push(HalfEdge {
            origin: e.end,
            target: e.start,
            twin: fwd,
            visited: false,
        });
        by_vertex.entry(vertex_key(e.start)).or_default().push(fwd);
        by_vertex.entry(vertex_key(e.end)).or_default().push(bwd);
    }

    for outgoing in by_vertex.values_mut() {
        outgoing.sort_by(|&a, &b| {
            let ea = &half_edges[a];
            let eb = &half_edges[b];
            angle_cmp(
                ea.target.x - ea.origin.x,
                ea.target.y - ea.origin.y,
                eb.target.x - eb.origin.x,
                eb.target.y - eb.origin.y,
            )
        });
    }

    let mut next = vec![0usize; half_edges.len()];
    for h in 0..half_edges.len() {
        let twin = half_edges[h].twin;
        let vkey = vertex_key(half_edges[twin].origin);
        let at_vertex = &by_vertex[&vkey];
        let n = at_vertex.len();
        let pos = at_vertex.iter().position(|&x| x == twin).unwrap();
        next[h] = at_vertex[(pos + n - 1) % n];
    }

    (half_edges, next)
}

fn trace_loops(half_edges: &mut [HalfEdge], next: &[usize]) -> Vec<Vec<RationalPoint2>> {
    let mut loops = Vec::new();
    for start in 0..half_edges.len() {
        if half_edges[start].visited {
            continue;
        }
        let mut verts = Vec::new();
        let mut h = start;
        loop {
            half_edges[h].visited = true;
            verts.push(half_edges[h].origin);
            h = next[h];
            if h == start {
                break;
            }
        }
        loops.push(verts);
    }
    loops
}

/// Twice the signed area of a closed rational polygon, exact (shoelace sum,
/// undivided). Positive for counter-clockwise loops.
fn loop_signed_area2(pts: &[RationalPoint2]) -> Rational {
    let n = pts.len();
    let mut acc = Rational::ZERO;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        acc = acc + (a.x * b.y - b.x * a.y);
    }
    acc
}

/// Exact even-odd ray-casting point-in-polygon test, used only to nest hole
/// loops inside their enclosing outer loop (not for winding resolution,
/// which is CAG step 4, `crate::cag::resolve`).
fn point_in_loop(p: RationalPoint2, loop_pts: &[RationalPoint2]) -> bool {
    let n = loop_pts.len();
    let mut inside = false;
    for i in 0..n {
        let a = loop_pts[i];
        let b = loop_pts[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let t_num = p.y - a.y;
            let t_den = b.y - a.y;
            let x_at = a.x + (b.x - a.x) * (t_num / t_den);
            if x_at > p.x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Build the raw rational face partition from `integerized`'s edges. Each
/// face's `winding` and `program` are placeholders (empty map, transparent
/// color) until `crate::cag::resolve` fills them in.
pub fn build_faces(integerized: &Integerized) -> RasterResult<Vec<RationalFace>> {
    let split = intersect::split_edges(integerized);
    let (mut half_edges, next) = build_next_table(&split);
    let loops = trace_loops(&mut half_edges, &next);

    let areas: Vec<Rational> = loops.iter().map(|l| loop_signed_area2(l)).collect();

    let mut outer: Vec<usize> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();
    for (i, a) in areas.iter().enumerate() {
        if loops[i].len() < 3 {
            continue;
        }
        if a.signum() > 0 {
            outer.push(i);
        } else if a.signum() < 0 {
            holes.push(i);
        }
    }

    let placeholder_program = RenderProgram::color(Color4::TRANSPARENT);
    let mut faces: Vec<RationalFace> = outer
        .iter()
        .map(|&i| RationalFace {
            outer: loops[i].clone(),
            holes: Vec::new(),
            winding: WindingMap::empty(),
            program: placeholder_program.clone(),
        })
        .collect();

    for &hole_idx in &holes {
        let sample = loops[hole_idx][0];
        let mut best: Option<(usize, Rational)> = None;
        for (face_idx, &outer_idx) in outer.iter().enumerate() {
            if !point_in_loop(sample, &loops[outer_idx]) {
                continue;
            }
            let abs_area = areas[outer_idx];
            if best.map_or(true, |(_, best_area)| abs_area < best_area) {
                best = Some((face_idx, abs_area));
            }
        }
        if let Some((face_idx, _)) = best {
            faces[face_idx].holes.push(loops[hole_idx].clone());
        }
    }

    Ok(faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pt2;
    use crate::path::{FillRule, RenderPath, Subpath};

    fn square(min: Pt2, max: Pt2) -> RenderPath {
        RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(min.x, min.y),
                Pt2::new(max.x, min.y),
                Pt2::new(max.x, max.y),
                Pt2::new(min.x, max.y),
            ])],
        )
    }

    #[test]
    fn single_square_produces_one_quad_face() {
        let path = square(Pt2::new(0.0, 0.0), Pt2::new(1.0, 1.0));
        let integerized = super::super::integerize::integerize(&[path]).unwrap();
        let faces = build_faces(&integerized).unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].outer.len(), 4);
        assert!(faces[0].holes.is_empty());
    }

    #[test]
    fn overlapping_squares_produce_more_than_one_face() {
        let a = square(Pt2::new(0.0, 0.0), Pt2::new(2.0, 2.0));
        let b = square(Pt2::new(1.0, 1.0), Pt2::new(3.0, 3.0));
        let integerized = super::super::integerize::integerize(&[a, b]).unwrap();
        let faces = build_faces(&integerized).unwrap();
        // a-only, b-only, and the overlap region.
        assert_eq!(faces.len(), 3);
        let total_area2: f64 = faces
            .iter()
            .map(|f| loop_signed_area2(&f.outer).to_f64())
            .sum();
        assert!((total_area2 - 7.0 * 2.0).abs() < 1e-6);
    }
}
