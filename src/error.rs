//! Error taxonomy for the engine, grounded on the teacher's `RenderError`
//! (`failure`-derived) but expressed with `thiserror`, the idiom's modern
//! descendant, and matching the kinds enumerated in the design's error
//! taxonomy (§7): degenerate geometry is handled internally and never
//! constructed at this boundary.

use thiserror::Error;

/// Errors that can surface from a `rasterize()` call or a `PolygonalBoolean`
/// operation. Degenerate-but-recoverable geometry never reaches this type; it
/// is logged through `RasterLog` and resolved locally (§7's propagation
/// policy).
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid path: {0}")]
    InvalidPath(&'static str),

    #[error("integerization scale too small to represent input bounds without overflow")]
    NumericOverflow,

    #[error("unsupported render-program tag {0} encountered while decoding")]
    UnsupportedProgram(u8),

    #[error("arena exhausted: {0} nodes exceeds the configured ceiling of {1}")]
    OutOfMemory(usize, usize),
}

pub type RasterResult<T> = Result<T, RasterError>;
