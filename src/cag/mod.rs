//! Constructive Area Geometry (§4.2): resolves a set of overlapping
//! `RenderPath`s into a planar partition of rational-coordinate faces, each
//! tagged with its winding map and resolved render program, then converts
//! that partition into `RenderableFace`s by one of four combining
//! strategies.

pub mod combine;
pub mod halfedge;
pub mod integerize;
pub mod intersect;
pub mod resolve;

pub use self::combine::FaceStrategy;

use crate::error::{RasterError, RasterResult};
use crate::face::ClippableFace;
use crate::geometry::Bounds2;
use crate::path::RenderPath;
use crate::program::ProgramRef;
use crate::winding::WindingMap;

/// A face of the half-edge graph: its boundary loops (outer + holes), the
/// resolved winding map at a representative interior point, and the
/// (path-boolean-resolved) render program painted over it (§3).
#[derive(Debug, Clone)]
pub struct RationalFace {
    pub outer: Vec<crate::numeric::rational::RationalPoint2>,
    pub holes: Vec<Vec<crate::numeric::rational::RationalPoint2>>,
    pub winding: WindingMap,
    pub program: crate::program::ProgramRef,
}

impl RationalFace {
    pub fn to_polygonal(&self, inv_scale: f64, origin: (f64, f64)) -> ClippableFace {
        let to_f64 = |p: &crate::numeric::rational::RationalPoint2| {
            let (x, y) = p.to_f64();
            crate::geometry::Pt2::new(x * inv_scale + origin.0, y * inv_scale + origin.1)
        };
        let mut polys = vec![self.outer.iter().map(to_f64).collect::<Vec<_>>()];
        polys.extend(self.holes.iter().map(|h| h.iter().map(to_f64).collect()));
        ClippableFace::Polygonal(polys)
    }
}

/// Output of the full CAG pipeline: a face partition plus the inverse
/// transform needed to map its rational faces back to the paths' original
/// floating-point coordinate space.
pub struct CagResult {
    pub faces: Vec<RationalFace>,
    pub inv_scale: f64,
    pub origin: (f64, f64),
}

/// Run CAG end-to-end over `paths`, evaluating `program`'s `PathBoolean`
/// nodes against each face's winding map (§4.2 step 5) to obtain each face's
/// resolved, simplified program, then producing `RenderableFace`s via
/// `strategy` (§4.2 step 6).
pub fn run(
    paths: &[RenderPath],
    program: &ProgramRef,
    strategy: FaceStrategy,
) -> RasterResult<Vec<crate::program::RenderableFace>> {
    for (i, p) in paths.iter().enumerate() {
        if p.subpaths.is_empty() {
            return Err(RasterError::InvalidPath("path has no subpaths"));
        }
        let _ = i;
    }

    let integerized = integerize::integerize(paths)?;
    let rational_faces = halfedge::build_faces(&integerized)?;
    let resolved = resolve::resolve_winding_and_programs(
        rational_faces,
        paths,
        program,
        integerized.inv_scale,
        integerized.origin,
    );

    let cag_result = CagResult {
        faces: resolved,
        inv_scale: integerized.inv_scale,
        origin: integerized.origin,
    };

    Ok(combine::to_renderable_faces(&cag_result, strategy))
}

/// Bounds of every subpath across every path, used to choose the
/// integerization scale.
pub fn paths_bounds(paths: &[RenderPath]) -> Bounds2 {
    paths.iter().map(RenderPath::bounds).fold(Bounds2::EMPTY, |a, b| a.union(b))
}
