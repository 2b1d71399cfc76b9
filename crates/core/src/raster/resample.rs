//! Nearest-neighbour resampling between grids that share a CRS

use crate::error::Result;
use crate::raster::{PixelGrid, Raster};
use ndarray::Array2;

/// Resample `src` onto `target` by sampling the source pixel under each
/// target pixel centre.
///
/// Target pixels falling outside the source extent, or onto source no-data,
/// become NaN. Both grids must use the same CRS; nothing is reprojected.
pub fn resample_nearest(src: &Raster<f64>, target: &PixelGrid) -> Result<Raster<f64>> {
    target.check_crs(src.crs())?;

    if src.grid().transform == target.transform && src.shape() == target.shape() {
        let mut out = src.clone();
        out.set_crs(target.crs.clone().or_else(|| src.crs().cloned()));
        return Ok(out);
    }

    let (src_rows, src_cols) = src.shape();
    let src_transform = *src.transform();
    let nodata = src.nodata();

    let data = Array2::from_shape_fn(target.shape(), |(row, col)| {
        let (x, y) = target.transform.pixel_to_geo(col, row);
        let (fc, fr) = src_transform.geo_to_pixel(x, y);
        if !(fc.is_finite() && fr.is_finite()) || fc < 0.0 || fr < 0.0 {
            return f64::NAN;
        }
        let (c, r) = (fc.floor() as usize, fr.floor() as usize);
        if r >= src_rows || c >= src_cols {
            return f64::NAN;
        }
        let v = unsafe { src.get_unchecked(r, c) };
        match nodata {
            Some(nd) if (v - nd).abs() < f64::EPSILON => f64::NAN,
            _ => v,
        }
    });

    let mut out = Raster::from_array(data);
    out.set_transform(target.transform);
    out.set_crs(target.crs.clone().or_else(|| src.crs().cloned()));
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}
