//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod mask;
mod pixel_grid;
mod resample;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use mask::Mask;
pub use pixel_grid::PixelGrid;
pub use resample::resample_nearest;
