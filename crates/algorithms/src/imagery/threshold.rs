//! Value-range masking of index images

use crate::kernel::build_output;
use crate::maybe_rayon::*;
use serde::{Deserialize, Serialize};
use verdant_core::image::Image;
use verdant_core::raster::Raster;
use verdant_core::{Error, Result};

/// Inclusive range of values to keep
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ThresholdRange {
    /// `[0.1, 1.0]`: drops water, bare ground and invalid index values
    fn default() -> Self {
        Self { min: 0.1, max: 1.0 }
    }
}

impl ThresholdRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min <= max) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: format!("[{}, {}]", min, max),
                reason: "min must not exceed max".into(),
            });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

/// Keep values in `range` (inclusive); everything else becomes NaN
pub fn threshold(raster: &Raster<f64>, range: ThresholdRange) -> Result<Raster<f64>> {
    let (rows, cols) = raster.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let v = unsafe { raster.get_unchecked(row, col) };
                if range.contains(v) {
                    *out = v;
                }
            }
            row_data
        })
        .collect();
    build_output(raster, rows, cols, data)
}

/// Threshold every band of `image` independently
pub fn threshold_image(image: &Image, range: ThresholdRange) -> Result<Image> {
    let bands = image
        .bands()
        .map(|(name, raster)| Ok((name.to_string(), threshold(raster, range)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(image.replace_bands(bands))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_inclusive() {
        let r = Raster::from_vec(vec![0.05, 0.1, 1.0, 1.5, f64::NAN, 0.5], 2, 3).unwrap();
        let out = threshold(&r, ThresholdRange::default()).unwrap();
        assert!(out.get(0, 0).unwrap().is_nan());
        assert_eq!(out.get(0, 1).unwrap(), 0.1);
        assert_eq!(out.get(0, 2).unwrap(), 1.0);
        assert!(out.get(1, 0).unwrap().is_nan());
        assert!(out.get(1, 1).unwrap().is_nan());
        assert_eq!(out.get(1, 2).unwrap(), 0.5);
    }

    #[test]
    fn test_invalid_range() {
        assert!(ThresholdRange::new(1.0, 0.1).is_err());
        assert!(ThresholdRange::new(f64::NAN, 0.1).is_err());
        assert!(ThresholdRange::new(0.2, 0.2).is_ok());
    }
}
