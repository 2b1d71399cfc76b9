//! Imagery analysis algorithms
//!
//! - Spectral indices: NDVI, EVI and user formulas
//! - Band math: scale factors and per-cell functions
//! - Threshold: inclusive value-range masking

mod band_math;
mod expression;
mod indices;
mod threshold;

pub use band_math::{band_math, scale_bands};
pub use expression::Expression;
pub use indices::{evi, ndvi, normalized_difference, EviParams, SpectralIndex};
pub use threshold::{threshold, threshold_image, ThresholdRange};
