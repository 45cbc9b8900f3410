//! `vecraster`: an analytic vector rasterization engine.
//!
//! A paint program (`program`) is resolved against a set of paths by
//! constructive area geometry (`cag`) into a planar partition of faces
//! (`face`), each clipped and filtered per pixel by the rasterization
//! scheduler (`raster`) into a premultiplied-color raster. `facade` wraps
//! the whole pipeline for incremental scene building and one-shot polygon
//! booleans.

pub mod cag;
pub mod color;
pub mod colorspace;
pub mod error;
pub mod face;
pub mod facade;
pub mod geometry;
pub mod log;
pub mod numeric;
pub mod path;
pub mod program;
pub mod raster;
pub mod winding;

pub use crate::error::{RasterError, RasterResult};
pub use crate::facade::{Overlaps, PolygonalBoolean, VectorCanvas};
pub use crate::path::{FillRule, RenderPath, Subpath};
pub use crate::raster::{rasterize, rasterize_cancellable, Raster, RasterizationOptions};
