//! CAG step 6 (§4.2): converts a `CagResult`'s rational faces into
//! `RenderableFace`s by one of four selectable strategies.

use crate::face::{ClippableFace, LinearEdge};
use crate::geometry::Pt2;
use crate::numeric::rational::RationalPoint2;
use crate::program::simplify::program_eq;
use crate::program::{ProgramRef, RenderableFace};

use super::{CagResult, RationalFace};

const EPS: f64 = 1e-9;

/// The four face-tracing-and-combining strategies of §4.2 step 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceStrategy {
    /// One renderable face per rational face; no merging.
    Simple,
    /// Faces are grouped into equivalence classes by program equality
    /// regardless of adjacency.
    FullyCombined,
    /// Adjacent faces with equal programs are merged into one multi-loop
    /// polygonal face.
    SimplifyingCombined,
    /// Like `SimplifyingCombined`, but the merged region's boundary is
    /// retraced into closed loops so the output remains a clean polygon set
    /// rather than a union of loops that may share edges.
    TracedCombined,
}

pub fn to_renderable_faces(result: &CagResult, strategy: FaceStrategy) -> Vec<RenderableFace> {
    match strategy {
        FaceStrategy::Simple => result
            .faces
            .iter()
            .map(|f| {
                let face = f.to_polygonal(result.inv_scale, result.origin);
                RenderableFace::new(face, f.program.clone())
            })
            .collect(),
        FaceStrategy::FullyCombined => fully_combined(result),
        FaceStrategy::SimplifyingCombined => adjacency_combined(result, false),
        FaceStrategy::TracedCombined => adjacency_combined(result, true),
    }
}

/// Groups faces into equivalence classes by structural program equality,
/// ignoring adjacency entirely.
fn fully_combined(result: &CagResult) -> Vec<RenderableFace> {
    let mut groups: Vec<(ProgramRef, Vec<Vec<Pt2>>)> = Vec::new();
    for face in &result.faces {
        let polys = polygon_loops(face, result);
        match groups.iter_mut().find(|(p, _)| program_eq(p, &face.program)) {
            Some((_, existing)) => existing.extend(polys),
            None => groups.push((face.program.clone(), polys)),
        }
    }
    groups
        .into_iter()
        .map(|(program, polys)| RenderableFace::new(ClippableFace::Polygonal(polys), program))
        .collect()
}

/// Groups faces by program equality *and* true edge adjacency (sharing a
/// boundary edge, exactly, in the rational half-edge graph — not merely
/// overlapping or touching bounding boxes), via union-find over the
/// candidate graph restricted to same-program pairs. `retrace` additionally
/// cancels the shared edges and retraces each merged component's boundary
/// into closed loops (§4.2 step 6: "shared edges become count-only").
fn adjacency_combined(result: &CagResult, retrace: bool) -> Vec<RenderableFace> {
    let n = result.faces.len();
    let mut uf = UnionFind::new(n);

    for i in 0..n {
        for j in (i + 1)..n {
            if program_eq(&result.faces[i].program, &result.faces[j].program)
                && shares_edge(&result.faces[i], &result.faces[j])
            {
                uf.union(i, j);
            }
        }
    }

    let mut components: Vec<(usize, ProgramRef, Vec<Vec<Pt2>>)> = Vec::new();
    for i in 0..n {
        let root = uf.find(i);
        let polys = polygon_loops(&result.faces[i], result);
        match components.iter_mut().find(|(r, _, _)| *r == root) {
            Some((_, _, existing)) => existing.extend(polys),
            None => components.push((root, result.faces[i].program.clone(), polys)),
        }
    }

    components
        .into_iter()
        .map(|(_, program, polys)| {
            let face = if retrace {
                let edged = ClippableFace::Polygonal(polys).to_edged();
                let cancelled = cancel_shared_edges(edged.edges());
                ClippableFace::Polygonal(crate::face::clip::trace_all_loops(&cancelled))
            } else {
                ClippableFace::Polygonal(polys)
            };
            RenderableFace::new(face, program)
        })
        .collect()
}

fn polygon_loops(face: &super::RationalFace, result: &CagResult) -> Vec<Vec<Pt2>> {
    match face.to_polygonal(result.inv_scale, result.origin) {
        ClippableFace::Polygonal(polys) => polys,
        _ => unreachable!("RationalFace::to_polygonal always returns Polygonal"),
    }
}

/// All boundary edges of a rational face (outer loop plus hole loops),
/// directed the same way the loop itself is wound.
fn rational_edges(face: &RationalFace) -> Vec<(RationalPoint2, RationalPoint2)> {
    let mut edges = Vec::new();
    for loop_pts in std::iter::once(&face.outer).chain(face.holes.iter()) {
        let n = loop_pts.len();
        for i in 0..n {
            if n > 1 {
                edges.push((loop_pts[i], loop_pts[(i + 1) % n]));
            }
        }
    }
    edges
}

/// True iff `a` and `b` share a boundary edge exactly (same two endpoints,
/// necessarily traversed in opposite directions since the two faces lie on
/// opposite sides of it) — the actual adjacency relation CAG's adjacent-face
/// merge requires, as opposed to bounding-box overlap.
fn shares_edge(a: &RationalFace, b: &RationalFace) -> bool {
    let edges_b = rational_edges(b);
    rational_edges(a)
        .iter()
        .any(|(p, q)| edges_b.iter().any(|(r, s)| p == s && q == r))
}

/// Removes edges that appear once in each direction (the interior edges
/// exposed when two adjacent faces are unioned), leaving only the true
/// outer/hole boundary of the merged region for `trace_all_loops` to walk.
fn cancel_shared_edges(edges: Vec<LinearEdge>) -> Vec<LinearEdge> {
    let mut remaining: Vec<LinearEdge> = Vec::with_capacity(edges.len());
    for e in edges {
        match remaining
            .iter()
            .position(|r| (r.start - e.end).norm() < EPS && (r.end - e.start).norm() < EPS)
        {
            Some(idx) => {
                remaining.remove(idx);
            }
            None => remaining.push(e),
        }
    }
    remaining
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> UnionFind {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color4;
    use crate::numeric::rational::RationalPoint2;
    use crate::program::RenderProgram;
    use crate::winding::WindingMap;

    fn square_face(min: i128, max: i128, program: ProgramRef) -> super::super::RationalFace {
        rect_face(min, max, min, max, program)
    }

    fn rect_face(
        min_x: i128,
        max_x: i128,
        min_y: i128,
        max_y: i128,
        program: ProgramRef,
    ) -> super::super::RationalFace {
        super::super::RationalFace {
            outer: vec![
                RationalPoint2::from_int(min_x, min_y),
                RationalPoint2::from_int(max_x, min_y),
                RationalPoint2::from_int(max_x, max_y),
                RationalPoint2::from_int(min_x, max_y),
            ],
            holes: Vec::new(),
            winding: WindingMap::empty(),
            program,
        }
    }

    #[test]
    fn simple_strategy_keeps_one_face_per_rational_face() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let result = CagResult {
            faces: vec![
                square_face(0, 10, red.clone()),
                square_face(10, 20, red.clone()),
            ],
            inv_scale: 0.1,
            origin: (0.0, 0.0),
        };
        let faces = to_renderable_faces(&result, FaceStrategy::Simple);
        assert_eq!(faces.len(), 2);
    }

    #[test]
    fn fully_combined_merges_non_adjacent_faces_with_equal_programs() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let blue = RenderProgram::color(Color4::premultiply(Color4::new(0.0, 0.0, 1.0, 1.0)));
        let result = CagResult {
            faces: vec![
                square_face(0, 10, red.clone()),
                square_face(100, 110, red.clone()),
                square_face(10, 20, blue),
            ],
            inv_scale: 0.1,
            origin: (0.0, 0.0),
        };
        let faces = to_renderable_faces(&result, FaceStrategy::FullyCombined);
        assert_eq!(faces.len(), 2);
        let red_face = faces.iter().find(|f| program_eq(&f.program, &red)).unwrap();
        match &red_face.face {
            ClippableFace::Polygonal(polys) => assert_eq!(polys.len(), 2),
            other => panic!("expected polygonal face, got {:?}", other),
        }
    }

    #[test]
    fn simplifying_combined_keeps_distant_same_program_faces_separate() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let result = CagResult {
            faces: vec![
                rect_face(0, 10, 0, 10, red.clone()),
                rect_face(10, 20, 0, 10, red.clone()),
                rect_face(1000, 1010, 0, 10, red),
            ],
            inv_scale: 0.1,
            origin: (0.0, 0.0),
        };
        let faces = to_renderable_faces(&result, FaceStrategy::SimplifyingCombined);
        // The first two squares share the edge x=10, y in [0,10]; the
        // distant third square stays its own component even though its
        // program is structurally equal.
        assert_eq!(faces.len(), 2);
    }

    #[test]
    fn diagonal_touch_without_shared_edge_does_not_merge() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        let result = CagResult {
            faces: vec![
                square_face(0, 10, red.clone()),
                square_face(10, 20, red),
            ],
            inv_scale: 0.1,
            origin: (0.0, 0.0),
        };
        let faces = to_renderable_faces(&result, FaceStrategy::SimplifyingCombined);
        // These two squares touch only at the corner (10, 10), not along a
        // shared edge, so they must stay separate components.
        assert_eq!(faces.len(), 2);
    }

    #[test]
    fn traced_combined_retraces_a_ring_into_outer_and_hole_loops() {
        let red = RenderProgram::color(Color4::premultiply(Color4::new(1.0, 0.0, 0.0, 1.0)));
        // 8 unit-ish cells of a 3x3 grid, skipping the center, each 10
        // units wide: a connected ring of same-program faces whose union
        // has a hole in the middle.
        let cells: Vec<(i128, i128)> = vec![
            (0, 0), (1, 0), (2, 0),
            (0, 1),         (2, 1),
            (0, 2), (1, 2), (2, 2),
        ];
        let faces = cells
            .iter()
            .map(|&(col, row)| {
                rect_face(
                    col * 10,
                    col * 10 + 10,
                    row * 10,
                    row * 10 + 10,
                    red.clone(),
                )
            })
            .collect();
        let result = CagResult {
            faces,
            inv_scale: 0.1,
            origin: (0.0, 0.0),
        };
        let combined = to_renderable_faces(&result, FaceStrategy::TracedCombined);
        assert_eq!(combined.len(), 1);
        match &combined[0].face {
            ClippableFace::Polygonal(polys) => {
                assert_eq!(polys.len(), 2, "expected an outer loop and a hole loop");
                let area = combined[0].face.get_area();
                // Outer 3x3 square (30x30 at inv_scale 0.1 -> 3x3) minus the
                // 1x1 hole in the middle.
                assert!((area - 8.0).abs() < 1e-6);
            }
            other => panic!("expected polygonal face, got {:?}", other),
        }
    }
}
