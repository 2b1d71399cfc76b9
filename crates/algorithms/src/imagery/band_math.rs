//! Band math
//!
//! Apply a scalar function to every valid cell of a raster, e.g. the
//! reflectance scale factors (`v * 0.0001`, `v / 10000`).

use crate::kernel::{build_output, is_nodata_f64};
use crate::maybe_rayon::*;
use verdant_core::image::Image;
use verdant_core::raster::Raster;
use verdant_core::Result;

/// Apply a unary function to every cell in a raster.
///
/// Nodata cells stay NaN.
///
/// # Example
/// ```ignore
/// let reflectance = band_math(&dn, |v| v * 0.0001)?;
/// ```
pub fn band_math<F>(raster: &Raster<f64>, f: F) -> Result<Raster<f64>>
where
    F: Fn(f64) -> f64 + Sync + Send,
{
    let (rows, cols) = raster.shape();
    let nodata = raster.nodata();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let val = unsafe { raster.get_unchecked(row, col) };
                if is_nodata_f64(val, nodata) {
                    continue;
                }
                *out = f(val);
            }
            row_data
        })
        .collect();

    build_output(raster, rows, cols, data)
}

/// Apply `v * scale + offset` to every band of `image`, leaving the bands
/// named in `skip` untouched.
pub fn scale_bands(image: &Image, scale: f64, offset: f64, skip: &[&str]) -> Result<Image> {
    if scale == 1.0 && offset == 0.0 {
        return Ok(image.clone());
    }
    let bands = image
        .bands()
        .map(|(name, raster)| {
            let raster = if skip.contains(&name) {
                raster.clone()
            } else {
                band_math(raster, |v| v.mul_add(scale, offset))?
            };
            Ok((name.to_string(), raster))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(image.replace_bands(bands))
}
