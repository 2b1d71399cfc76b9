//! Spectral vegetation indices
//!
//! NDVI and EVI computed from single-band rasters, plus the [`SpectralIndex`]
//! selector that evaluates one of them (or a user formula) on a whole image.

use super::expression::Expression;
use crate::kernel::{build_output, check_dimensions, is_nodata_f64};
use crate::maybe_rayon::*;
use std::collections::BTreeMap;
use verdant_core::image::Image;
use verdant_core::raster::Raster;
use verdant_core::Result;

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in the range [-1, 1] for non-negative inputs. Pixels where the
/// sum is (near) zero or either input is nodata are set to NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    check_dimensions(band_a, band_b)?;

    let (rows, cols) = band_a.shape();
    let nodata_a = band_a.nodata();
    let nodata_b = band_b.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let a = unsafe { band_a.get_unchecked(row, col) };
                let b = unsafe { band_b.get_unchecked(row, col) };

                if is_nodata_f64(a, nodata_a) || is_nodata_f64(b, nodata_b) {
                    continue;
                }

                let sum = a + b;
                if sum.abs() < 1e-10 {
                    continue; // Avoid division by zero
                }

                row_data[col] = (a - b) / sum;
            }
            row_data
        })
        .collect();

    build_output(band_a, rows, cols, data)
}

// ---------------------------------------------------------------------------
// NDVI
// ---------------------------------------------------------------------------

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
///
/// Dense vegetation sits around 0.6 to 0.9, bare soil near 0.1 to 0.2 and
/// water below zero.
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

// ---------------------------------------------------------------------------
// EVI
// ---------------------------------------------------------------------------

/// Parameters for EVI
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f64,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f64,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f64,
    /// Canopy background adjustment (default: 1.0)
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// Enhanced Vegetation Index (Huete et al., 2002)
///
/// `EVI = G * (NIR - Red) / (NIR + C1 * Red - C2 * Blue + L)`
///
/// Expects reflectances in [0, 1]; with raw digital numbers the `L` term is
/// negligible and the result is not comparable across sensors.
pub fn evi(
    nir: &Raster<f64>,
    red: &Raster<f64>,
    blue: &Raster<f64>,
    params: EviParams,
) -> Result<Raster<f64>> {
    check_dimensions(nir, red)?;
    check_dimensions(nir, blue)?;

    let (rows, cols) = nir.shape();
    let nodata_nir = nir.nodata();
    let nodata_red = red.nodata();
    let nodata_blue = blue.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for col in 0..cols {
                let n = unsafe { nir.get_unchecked(row, col) };
                let r = unsafe { red.get_unchecked(row, col) };
                let b = unsafe { blue.get_unchecked(row, col) };

                if is_nodata_f64(n, nodata_nir)
                    || is_nodata_f64(r, nodata_red)
                    || is_nodata_f64(b, nodata_blue)
                {
                    continue;
                }

                let denom = n + params.c1 * r - params.c2 * b + params.l;
                if denom.abs() < 1e-10 {
                    continue;
                }

                row_data[col] = params.g * (n - r) / denom;
            }
            row_data
        })
        .collect();

    build_output(nir, rows, cols, data)
}

// ---------------------------------------------------------------------------
// Image-level selector
// ---------------------------------------------------------------------------

/// Index evaluated on a standardized image (bands `B`, `R`, `NIR`, ...)
#[derive(Debug, Clone, PartialEq)]
pub enum SpectralIndex {
    Ndvi,
    Evi(EviParams),
    /// Arithmetic formula; `bands` maps formula variables to image bands.
    /// Variables without an entry refer to the band of the same name.
    Expression {
        name: String,
        formula: String,
        bands: BTreeMap<String, String>,
    },
}

impl SpectralIndex {
    pub fn evi() -> Self {
        SpectralIndex::Evi(EviParams::default())
    }

    /// Name of the output band
    pub fn name(&self) -> &str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Evi(_) => "EVI",
            SpectralIndex::Expression { name, .. } => name,
        }
    }

    /// Bands of the input image this index reads
    pub fn required_bands(&self) -> Result<Vec<String>> {
        Ok(match self {
            SpectralIndex::Ndvi => vec!["NIR".into(), "R".into()],
            SpectralIndex::Evi(_) => vec!["NIR".into(), "R".into(), "B".into()],
            SpectralIndex::Expression { formula, bands, .. } => Expression::parse(formula)?
                .variables()
                .iter()
                .map(|v| bands.get(v).cloned().unwrap_or_else(|| v.clone()))
                .collect(),
        })
    }

    /// Evaluate on `image`, returning a single-band image that keeps the
    /// input's id, timestamp and properties.
    pub fn compute(&self, image: &Image) -> Result<Image> {
        let raster = match self {
            SpectralIndex::Ndvi => ndvi(image.band("NIR")?, image.band("R")?)?,
            SpectralIndex::Evi(params) => evi(
                image.band("NIR")?,
                image.band("R")?,
                image.band("B")?,
                *params,
            )?,
            SpectralIndex::Expression { formula, bands, .. } => {
                let expr = Expression::parse(formula)?;
                let mut inputs = Vec::with_capacity(expr.variables().len());
                for var in expr.variables() {
                    let band = bands.get(var).map(String::as_str).unwrap_or(var);
                    inputs.push(image.band(band)?);
                }
                expr.evaluate(&inputs)?
            }
        };
        Ok(image.replace_bands(vec![(self.name().to_string(), raster)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        let mut r = Raster::filled(rows, cols, value);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        r
    }

    fn make_gradient(rows: usize, cols: usize, start: f64, step: f64) -> Raster<f64> {
        let mut r = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, rows as f64, 1.0, -1.0));
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, start + (row * cols + col) as f64 * step)
                    .unwrap();
            }
        }
        r
    }

    fn make_image(nir: f64, red: f64, blue: f64) -> Image {
        Image::new("scene")
            .with_property("CLOUDY_PIXEL_PERCENTAGE", 3.0)
            .with_band("B", make_band(3, 3, blue))
            .unwrap()
            .with_band("R", make_band(3, 3, red))
            .unwrap()
            .with_band("NIR", make_band(3, 3, nir))
            .unwrap()
    }

    #[test]
    fn test_normalized_difference_range() {
        let a = make_gradient(10, 10, 0.1, 0.01);
        let b = make_gradient(10, 10, 0.5, -0.005);

        let result = normalized_difference(&a, &b).unwrap();

        for row in 0..10 {
            for col in 0..10 {
                let val = result.get(row, col).unwrap();
                if !val.is_nan() {
                    assert!(
                        (-1.0..=1.0).contains(&val),
                        "ND out of range: {} at ({}, {})",
                        val,
                        row,
                        col
                    );
                }
            }
        }
    }

    #[test]
    fn test_ndvi() {
        let result = ndvi(&make_band(5, 5, 0.5), &make_band(5, 5, 0.1)).unwrap();
        let val = result.get(2, 2).unwrap();
        assert!(
            (val - 2.0 / 3.0).abs() < 1e-10,
            "Expected 0.6667, got {}",
            val
        );

        let water = ndvi(&make_band(5, 5, 0.1), &make_band(5, 5, 0.5)).unwrap();
        let val = water.get(2, 2).unwrap();
        assert!((val + 2.0 / 3.0).abs() < 1e-10, "Expected -0.6667, got {}", val);
    }

    #[test]
    fn test_ndvi_equal_bands_is_zero() {
        for x in [0.01, 0.3, 0.9, 4000.0] {
            let val = ndvi(&make_band(2, 2, x), &make_band(2, 2, x))
                .unwrap()
                .get(0, 0)
                .unwrap();
            assert_eq!(val, 0.0);
        }
    }

    #[test]
    fn test_ndvi_zero_denominator_is_nan() {
        let result = ndvi(&make_band(2, 2, 0.0), &make_band(2, 2, 0.0)).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert_eq!(result.statistics().valid_count, 0);
    }

    #[test]
    fn test_evi() {
        let result = evi(
            &make_band(5, 5, 0.5),
            &make_band(5, 5, 0.1),
            &make_band(5, 5, 0.05),
            EviParams::default(),
        )
        .unwrap();
        let val = result.get(2, 2).unwrap();
        // 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1) = 1.0 / 1.725
        assert!((val - 0.5797).abs() < 1e-4, "Expected ~0.5797, got {}", val);
    }

    #[test]
    fn test_evi_zero_denominator_is_nan() {
        // 0 + 6*0 - 7.5*(1/7.5) + 1 == 0
        let result = evi(
            &make_band(2, 2, 0.0),
            &make_band(2, 2, 0.0),
            &make_band(2, 2, 1.0 / 7.5),
            EviParams::default(),
        )
        .unwrap();
        assert!(result.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_nodata_handling() {
        let mut nir = make_band(3, 3, 0.5);
        nir.set(1, 1, f64::NAN).unwrap();
        let result = ndvi(&nir, &make_band(3, 3, 0.1)).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert!(!result.get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(ndvi(&make_band(5, 5, 0.5), &make_band(5, 6, 0.1)).is_err());
    }

    #[test]
    fn test_spectral_index_on_image() {
        let img = make_image(0.5, 0.1, 0.05);

        let out = SpectralIndex::Ndvi.compute(&img).unwrap();
        assert_eq!(out.band_names(), vec!["NDVI"]);
        assert_eq!(out.property("CLOUDY_PIXEL_PERCENTAGE"), Some(3.0));

        let out = SpectralIndex::evi().compute(&img).unwrap();
        let val = out.band("EVI").unwrap().get(0, 0).unwrap();
        assert!((val - 0.5797).abs() < 1e-4);
    }

    #[test]
    fn test_expression_index_matches_builtin() {
        let img = make_image(0.5, 0.1, 0.05);
        let bands = BTreeMap::from([
            ("nir".to_string(), "NIR".to_string()),
            ("red".to_string(), "R".to_string()),
            ("blue".to_string(), "B".to_string()),
        ]);
        let index = SpectralIndex::Expression {
            name: "EVI".into(),
            formula: "2.5 * (nir - red) / (nir + 6 * red - 7.5 * blue + 1)".into(),
            bands,
        };
        assert_eq!(index.required_bands().unwrap(), vec!["NIR", "R", "B"]);
        let from_expr = index.compute(&img).unwrap();
        let builtin = SpectralIndex::evi().compute(&img).unwrap();
        let a = from_expr.band("EVI").unwrap().get(1, 1).unwrap();
        let b = builtin.band("EVI").unwrap().get(1, 1).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_missing_band_is_an_error() {
        let img = Image::new("x").with_band("NIR", make_band(2, 2, 0.5)).unwrap();
        assert!(SpectralIndex::Ndvi.compute(&img).is_err());
    }
}
