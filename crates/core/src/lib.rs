//! # Verdant Core
//!
//! Core types and I/O for the Verdant vegetation-index pipeline.
//!
//! This crate provides:
//! - `Raster<T>`: generic raster grid type with georeferencing
//! - `PixelGrid` and `Mask`: the shared lattice and per-pixel validity
//! - `Image` and `ImageCollection`: named bands, metadata and filtering
//! - `CRS` and `Rectangle`: coordinate systems and extents
//! - GeoTIFF reading, writing and export

pub mod collection;
pub mod crs;
pub mod error;
pub mod geometry;
pub mod image;
pub mod io;
pub mod raster;

pub use collection::{CalendarField, CompareOp, Filter, ImageCollection, Season};
pub use crs::CRS;
pub use error::{Error, Result};
pub use geometry::Rectangle;
pub use image::Image;
pub use raster::{GeoTransform, Mask, PixelGrid, Raster, RasterElement};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::collection::{Filter, ImageCollection, Season};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::geometry::Rectangle;
    pub use crate::image::Image;
    pub use crate::raster::{GeoTransform, Mask, PixelGrid, Raster, RasterElement};
}
