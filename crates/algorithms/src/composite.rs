//! Per-pixel temporal reduction of image collections

use crate::kernel::build_output;
use crate::maybe_rayon::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use verdant_core::collection::ImageCollection;
use verdant_core::image::Image;
use verdant_core::raster::Raster;
use verdant_core::{Error, Result};

/// Reduction applied across the images of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Median,
    Mean,
}

impl Reducer {
    /// Reduce `values` in place. `None` when there is nothing to reduce.
    pub fn reduce(self, values: &mut [f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        match self {
            Reducer::Mean => Some(values.iter().sum::<f64>() / values.len() as f64),
            Reducer::Median => {
                values.sort_unstable_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    Some((values[mid - 1] + values[mid]) / 2.0)
                } else {
                    Some(values[mid])
                }
            }
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Median => f.write_str("median"),
            Reducer::Mean => f.write_str("mean"),
        }
    }
}

impl FromStr for Reducer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "median" => Ok(Reducer::Median),
            "mean" => Ok(Reducer::Mean),
            _ => Err(Error::InvalidParameter {
                name: "reducer",
                value: s.to_string(),
                reason: "expected median or mean".into(),
            }),
        }
    }
}

/// Reduce one band across a stack of same-shaped rasters, ignoring NaN
pub fn reduce_stack(stack: &[&Raster<f64>], template: &Raster<f64>, reducer: Reducer) -> Result<Raster<f64>> {
    let (rows, cols) = template.shape();
    for raster in stack {
        if raster.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: raster.rows(),
                ac: raster.cols(),
            });
        }
    }

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values = Vec::with_capacity(stack.len());
            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();
                for raster in stack {
                    let v = unsafe { raster.get_unchecked(row, col) };
                    if !v.is_nan() {
                        values.push(v);
                    }
                }
                if let Some(v) = reducer.reduce(&mut values) {
                    *out = v;
                }
            }
            row_data
        })
        .collect();

    build_output(template, rows, cols, data)
}

/// Per-pixel, per-band reduction of `collection`.
///
/// Only non-NaN values take part; a pixel with no valid value stays NaN.
/// An empty collection yields an all-NaN image with the collection's bands.
pub fn composite(collection: &ImageCollection, reducer: Reducer) -> Result<Image> {
    let grid = collection.grid();
    let template = Raster::empty(grid);
    let mut bands = Vec::with_capacity(collection.band_names().len());
    for name in collection.band_names() {
        let stack = collection
            .iter()
            .map(|img| img.band(name))
            .collect::<Result<Vec<_>>>()?;
        bands.push((name.clone(), reduce_stack(&stack, &template, reducer)?));
    }
    Ok(Image::new(reducer.to_string()).replace_bands(bands))
}

pub fn median(collection: &ImageCollection) -> Result<Image> {
    composite(collection, Reducer::Median)
}

pub fn mean(collection: &ImageCollection) -> Result<Image> {
    composite(collection, Reducer::Mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_core::raster::{GeoTransform, PixelGrid};

    fn grid() -> PixelGrid {
        PixelGrid::new(GeoTransform::new(0.0, 1.0, 1.0, -1.0), 1, 2, None)
    }

    fn collection(values: &[[f64; 2]]) -> ImageCollection {
        let images = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                Image::new(format!("img{}", i))
                    .with_band("NDVI", Raster::from_vec(v.to_vec(), 1, 2).unwrap())
                    .unwrap()
            })
            .collect();
        ImageCollection::from_images(grid(), vec!["NDVI".into()], images).unwrap()
    }

    #[test]
    fn test_median_odd_and_even() {
        let mut odd = [0.3, 0.1, 0.2];
        assert_eq!(Reducer::Median.reduce(&mut odd), Some(0.2));
        let mut even = [0.4, 0.1, 0.3, 0.2];
        let m = Reducer::Median.reduce(&mut even).unwrap();
        assert!((m - 0.25).abs() < 1e-12);
        assert_eq!(Reducer::Mean.reduce(&mut []), None);
    }

    #[test]
    fn test_composite_ignores_nan() {
        let c = collection(&[[0.2, f64::NAN], [0.4, f64::NAN], [0.9, 0.5]]);
        let out = median(&c).unwrap();
        let band = out.band("NDVI").unwrap();
        assert_eq!(band.get(0, 0).unwrap(), 0.4);
        assert_eq!(band.get(0, 1).unwrap(), 0.5);

        let out = mean(&c).unwrap();
        assert!((out.band("NDVI").unwrap().get(0, 0).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_nan_pixel_stays_nan() {
        let c = collection(&[[f64::NAN, 0.3], [f64::NAN, 0.5]]);
        let band = median(&c).unwrap().band("NDVI").unwrap().clone();
        assert!(band.get(0, 0).unwrap().is_nan());
        assert!((band.get(0, 1).unwrap() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_empty_collection_is_all_nan() {
        let c = collection(&[]);
        let out = composite(&c, Reducer::Median).unwrap();
        assert_eq!(out.band_names(), vec!["NDVI"]);
        let band = out.band("NDVI").unwrap();
        assert_eq!(band.shape(), (1, 2));
        assert_eq!(band.statistics().valid_count, 0);
        assert_eq!(band.transform(), &grid().transform);
    }

    #[test]
    fn test_parse_reducer() {
        assert_eq!("Median".parse::<Reducer>().unwrap(), Reducer::Median);
        assert!("max".parse::<Reducer>().is_err());
    }
}
