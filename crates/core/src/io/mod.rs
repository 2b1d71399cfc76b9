//! I/O operations for reading and writing geospatial data

mod export;
mod native;

pub use export::{export_image, export_rgba, Dimensions, ExportParams, FileFormat, DEFAULT_MAX_PIXELS};
pub use native::{
    read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer,
    write_rgba_geotiff, GeoTiffOptions,
};
