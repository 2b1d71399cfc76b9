//! Error types for Verdant

use thiserror::Error;

/// Main error type for Verdant raster and image operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Band '{band}' not found in image '{image}'")]
    MissingBand { band: String, image: String },

    #[error("Band list mismatch: {0}")]
    BandMismatch(String),

    #[error("Export of {rows}x{cols} pixels exceeds the cap of {max_pixels}")]
    TooManyPixels {
        rows: usize,
        cols: usize,
        max_pixels: u64,
    },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid filter expression '{0}'")]
    InvalidFilter(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Verdant operations
pub type Result<T> = std::result::Result<T, Error>;
