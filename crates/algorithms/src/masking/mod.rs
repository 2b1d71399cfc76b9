//! Pixel masking: QA cloud masks and the land/water mask

mod qa;

pub use qa::{mask_clouds, mask_water, qa_mask, QaMask};
