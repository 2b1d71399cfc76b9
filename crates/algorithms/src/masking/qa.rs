//! Quality-assessment bitmask cloud masks

use serde::{Deserialize, Serialize};
use verdant_core::image::Image;
use verdant_core::raster::{Mask, Raster};
use verdant_core::{Error, Result};

const BIT_0: u16 = 1;
const BIT_1: u16 = 1 << 1;
const BIT_3: u16 = 1 << 3;
const BIT_4: u16 = 1 << 4;
const BIT_5: u16 = 1 << 5;
const BIT_7: u16 = 1 << 7;
const BIT_10: u16 = 1 << 10;
const BIT_11: u16 = 1 << 11;

/// How a sensor's QA band flags cloudy pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaMask {
    /// Sentinel-2 `QA60`: bit 10 opaque clouds, bit 11 cirrus
    Sentinel2,
    /// Landsat 4/5/7 `pixel_qa`: bad when (bit 5 AND bit 7) OR bit 3.
    /// Also drops pixels that are not valid in every band.
    Landsat457,
    /// Landsat 8 `pixel_qa`: bit 3 cloud shadow, bit 5 cloud
    Landsat8,
    /// Sentinel-2 L2A scene classification (`SCL`): no data, saturated,
    /// cloud shadow, cloud (medium, high) and cirrus classes are not clear
    SentinelScl,
    /// Landsat Collection 2 `QA_PIXEL`: bit 0 fill, bit 1 dilated cloud,
    /// bit 3 cloud, bit 4 cloud shadow
    LandsatC2,
    /// No QA-based masking
    None,
}

impl QaMask {
    /// Whether a QA word describes a clear pixel
    pub fn is_clear(self, qa: u16) -> bool {
        match self {
            QaMask::Sentinel2 => qa & BIT_10 == 0 && qa & BIT_11 == 0,
            QaMask::Landsat457 => {
                let cloud = (qa & BIT_5 != 0 && qa & BIT_7 != 0) || qa & BIT_3 != 0;
                !cloud
            }
            QaMask::Landsat8 => qa & BIT_3 == 0 && qa & BIT_5 == 0,
            QaMask::SentinelScl => !matches!(qa, 0 | 1 | 3 | 8 | 9 | 10),
            QaMask::LandsatC2 => qa & (BIT_0 | BIT_1 | BIT_3 | BIT_4) == 0,
            QaMask::None => true,
        }
    }

    /// Whether the mask also requires validity in every band
    fn requires_all_bands(self) -> bool {
        matches!(self, QaMask::Landsat457)
    }
}

/// Decode a float QA sample; NaN, negative or fractional values are invalid
fn qa_word(v: f64) -> Option<u16> {
    if v.is_nan() || v < 0.0 || v > u16::MAX as f64 || v.fract() != 0.0 {
        return None;
    }
    Some(v as u16)
}

/// Per-pixel clear-sky mask from a QA band. Invalid QA samples are not clear.
pub fn qa_mask(qa: &Raster<f64>, variant: QaMask) -> Mask {
    Mask::from_array(
        qa.data()
            .mapv(|v| qa_word(v).is_some_and(|w| variant.is_clear(w))),
    )
}

/// Set cloudy pixels of every band to NaN using the QA band `qa_band`.
pub fn mask_clouds(image: &Image, variant: QaMask, qa_band: &str) -> Result<Image> {
    if variant == QaMask::None {
        return Ok(image.clone());
    }
    let mut mask = qa_mask(image.band(qa_band)?, variant);
    if variant.requires_all_bands() {
        mask = mask.and(&image.mask())?;
    }
    image.update_mask(&mask)
}

/// Remove pixels where the land/water band equals 1 (water).
///
/// Pixels with no land/water information are kept.
pub fn mask_water(image: &Image, water: &Raster<f64>) -> Result<Image> {
    let Some(grid) = image.grid() else {
        return Ok(image.clone());
    };
    if water.shape() != grid.shape() {
        return Err(Error::SizeMismatch {
            er: grid.rows,
            ec: grid.cols,
            ar: water.rows(),
            ac: water.cols(),
        });
    }
    let land = Mask::from_array(water.data().mapv(|v| v != 1.0));
    image.update_mask(&land)
}
