//! CAG step 2 (§4.2): splits every integerized edge at its exact
//! intersections with every other edge whose bounding box overlaps it, so
//! the half-edge graph builder only ever sees a non-crossing, already-planar
//! set of segments. Bounding-box pruning keeps this from degenerating to a
//! dense all-pairs scan on inputs where most edges never come near each
//! other.

use crate::numeric::rational::{segment_intersect, Rational, RationalPoint2, SegmentIntersection};
use crate::winding::PathId;

use super::integerize::Integerized;

/// One maximal non-crossing piece of an original integerized edge, tagged
/// with the path it came from.
pub struct SplitEdge {
    pub path: PathId,
    pub start: RationalPoint2,
    pub end: RationalPoint2,
}

fn bbox(a: RationalPoint2, b: RationalPoint2) -> (Rational, Rational, Rational, Rational) {
    let (x0, x1) = if a.x <= b.x { (a.x, b.x) } else { (b.x, a.x) };
    let (y0, y1) = if a.y <= b.y { (a.y, b.y) } else { (b.y, a.y) };
    (x0, y0, x1, y1)
}

fn bbox_overlap(
    a: (Rational, Rational, Rational, Rational),
    b: (Rational, Rational, Rational, Rational),
) -> bool {
    a.0 <= b.2 && b.0 <= a.2 && a.1 <= b.3 && b.1 <= a.3
}

/// Parameter `t` such that `a + (b - a) * t == p`, assuming `p` lies on the
/// line through `a` and `b`. Projects onto whichever axis `a->b` actually
/// varies along (a segment can be axis-aligned in either coordinate).
fn param_t(a: RationalPoint2, b: RationalPoint2, p: RationalPoint2) -> Rational {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    if !dx.is_zero() {
        (p.x - a.x) / dx
    } else if !dy.is_zero() {
        (p.y - a.y) / dy
    } else {
        Rational::ZERO
    }
}

/// Split every edge of `integerized` at its crossings with every other
/// edge, returning the resulting non-crossing segments in no particular
/// order. Degenerate (zero-length) pieces produced by coincident break
/// points are dropped.
pub fn split_edges(integerized: &Integerized) -> Vec<SplitEdge> {
    let edges = &integerized.edges;
    let bboxes: Vec<_> = edges.iter().map(|e| bbox(e.start, e.end)).collect();
    let mut breaks: Vec<Vec<Rational>> = edges
        .iter()
        .map(|_| vec![Rational::ZERO, Rational::ONE])
        .collect();

    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            if !bbox_overlap(bboxes[i], bboxes[j]) {
                continue;
            }
            let (a0, a1) = (edges[i].start, edges[i].end);
            let (b0, b1) = (edges[j].start, edges[j].end);
            match segment_intersect(a0, a1, b0, b1) {
                SegmentIntersection::None => {}
                SegmentIntersection::Point { t0, t1, .. } => {
                    breaks[i].push(t0);
                    breaks[j].push(t1);
                }
                SegmentIntersection::Collinear { from, to } => {
                    breaks[i].push(param_t(a0, a1, from));
                    breaks[i].push(param_t(a0, a1, to));
                    breaks[j].push(param_t(b0, b1, from));
                    breaks[j].push(param_t(b0, b1, to));
                }
            }
        }
    }

    let mut out = Vec::new();
    for (i, edge) in edges.iter().enumerate() {
        let mut ts = breaks[i].clone();
        ts.sort();
        ts.dedup();
        let at = |t: Rational| {
            RationalPoint2::new(
                edge.start.x + (edge.end.x - edge.start.x) * t,
                edge.start.y + (edge.end.y - edge.start.y) * t,
            )
        };
        for w in ts.windows(2) {
            let start = at(w[0]);
            let end = at(w[1]);
            if start == end {
                continue;
            }
            out.push(SplitEdge {
                path: edge.path,
                start,
                end,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pt2;
    use crate::path::{FillRule, RenderPath, Subpath};

    #[test]
    fn crossing_squares_split_at_intersections() {
        let a = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(0.0, 0.0),
                Pt2::new(2.0, 0.0),
                Pt2::new(2.0, 2.0),
                Pt2::new(0.0, 2.0),
            ])],
        );
        let b = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(1.0, 1.0),
                Pt2::new(3.0, 1.0),
                Pt2::new(3.0, 3.0),
                Pt2::new(1.0, 3.0),
            ])],
        );
        let integerized = super::super::integerize::integerize(&[a, b]).unwrap();
        let split = split_edges(&integerized);
        // Each original edge gets cut into at least its own piece; the two
        // crossing edges (a's top/right, b's bottom/left) must have been
        // split into more than one piece each.
        assert!(split.len() > integerized.edges.len());
    }

    #[test]
    fn disjoint_squares_are_not_split() {
        let a = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(0.0, 0.0),
                Pt2::new(1.0, 0.0),
                Pt2::new(1.0, 1.0),
                Pt2::new(0.0, 1.0),
            ])],
        );
        let b = RenderPath::new(
            FillRule::NonZero,
            vec![Subpath::new(vec![
                Pt2::new(5.0, 5.0),
                Pt2::new(6.0, 5.0),
                Pt2::new(6.0, 6.0),
                Pt2::new(5.0, 6.0),
            ])],
        );
        let integerized = super::super::integerize::integerize(&[a, b]).unwrap();
        let split = split_edges(&integerized);
        assert_eq!(split.len(), integerized.edges.len());
    }
}
