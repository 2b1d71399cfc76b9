//! # Verdant Algorithms
//!
//! Per-pixel algorithms of the Verdant pipeline.
//!
//! ## Modules
//!
//! - **masking**: QA bitmask cloud masks, land/water mask
//! - **sensor**: band tables and reflectance scaling per sensor
//! - **imagery**: NDVI, EVI, expressions, band math, thresholds
//! - **composite**: NaN-aware median and mean over collections

pub mod composite;
pub mod imagery;
mod kernel;
pub mod masking;
pub(crate) mod maybe_rayon;
pub mod sensor;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::composite::{composite, median, Reducer};
    pub use crate::imagery::{
        band_math, evi, ndvi, normalized_difference, threshold, threshold_image, EviParams,
        Expression, SpectralIndex, ThresholdRange,
    };
    pub use crate::masking::{mask_clouds, mask_water, qa_mask, QaMask};
    pub use crate::sensor::{standardize, Archive, AssetTable, Sensor, SensorProfile, QA_BAND};
    pub use verdant_core::prelude::*;
}
