//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::raster::{GeoTransform, Mask, PixelGrid, RasterElement};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order with the affine
/// transform and CRS that place it on the ground. Spectral bands are
/// `Raster<f64>` with NaN marking masked pixels.
///
/// # Example
///
/// ```ignore
/// use verdant_core::Raster;
///
/// let mut red: Raster<f64> = Raster::new(100, 100);
/// red.set(10, 20, 0.12)?;
/// let value = red.get(10, 20)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Raster data stored in row-major order (row, col)
    data: Array2<T>,
    /// Affine transformation
    transform: GeoTransform,
    /// Coordinate reference system
    crs: Option<CRS>,
    /// No-data value
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from existing row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a raster with the same georeferencing but a different element type
    pub fn with_same_meta<U: RasterElement>(&self, rows: usize, cols: usize) -> Raster<U> {
        Raster {
            data: Array2::zeros((rows, cols)),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: None,
        }
    }

    /// Create a raster with the same dimensions and metadata, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata: self.nodata,
        }
    }

    // Dimensions

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the raster is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Get a view of the underlying data
    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    /// Get a reference to the underlying array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying array
    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Consume the raster and return the underlying array
    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Get the no-data value
    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Map-coordinate bounds of the raster
    pub fn bounds(&self) -> Rectangle {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// The pixel grid this raster is laid out on
    pub fn grid(&self) -> PixelGrid {
        PixelGrid::new(self.transform, self.rows(), self.cols(), self.crs.clone())
    }

    /// Place the raster on `grid`, which must have the same shape
    pub fn set_grid(&mut self, grid: &PixelGrid) -> Result<()> {
        grid.check_shape(self.rows(), self.cols())?;
        self.transform = grid.transform;
        self.crs = grid.crs.clone();
        Ok(())
    }

    // Value checks

    /// Check if a value is no-data
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    // Statistics

    /// Calculate basic statistics (min, max, mean, count of valid cells)
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }

            if min.is_none_or(|m| value < m) {
                min = Some(value);
            }
            if max.is_none_or(|m| value > m) {
                max = Some(value);
            }

            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        let mean = if count > 0 {
            Some(sum / count as f64)
        } else {
            None
        };

        RasterStatistics {
            min,
            max,
            mean,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

impl Raster<f64> {
    /// An all-NaN raster laid out on `grid`
    pub fn empty(grid: &PixelGrid) -> Self {
        let mut raster = Self::filled(grid.rows, grid.cols, f64::NAN);
        raster.transform = grid.transform;
        raster.crs = grid.crs.clone();
        raster.nodata = Some(f64::NAN);
        raster
    }

    /// Mask of cells holding a valid (non-nodata) value
    pub fn valid_mask(&self) -> Mask {
        let nodata = self.nodata;
        Mask::from_array(self.data.mapv(|v| !v.is_nodata(nodata)))
    }

    /// Return a copy where every cell with `mask == false` becomes NaN.
    ///
    /// Masks only ever remove pixels: a cell that is already no-data stays
    /// no-data regardless of the mask. A declared no-data value is kept.
    pub fn update_mask(&self, mask: &Mask) -> Result<Self> {
        mask.check_shape(self.rows(), self.cols())?;
        let mut out = self.clone();
        ndarray::Zip::from(&mut out.data)
            .and(mask.data())
            .for_each(|v, &keep| {
                if !keep {
                    *v = f64::NAN;
                }
            });
        out.nodata.get_or_insert(f64::NAN);
        Ok(out)
    }
}

/// Basic statistics for a raster
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_creation() {
        let raster: Raster<f32> = Raster::new(100, 200);
        assert_eq!(raster.rows(), 100);
        assert_eq!(raster.cols(), 200);
        assert_eq!(raster.shape(), (100, 200));
    }

    #[test]
    fn test_raster_access() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        raster.set(5, 5, 0.42).unwrap();
        assert_eq!(raster.get(5, 5).unwrap(), 0.42);
        assert!(raster.get(10, 0).is_err());
    }

    #[test]
    fn test_raster_statistics_skip_nan() {
        let mut raster: Raster<f64> = Raster::new(10, 10);
        for i in 0..10 {
            for j in 0..10 {
                raster.set(i, j, (i * 10 + j) as f64).unwrap();
            }
        }
        raster.set(0, 0, f64::NAN).unwrap();

        let stats = raster.statistics();
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(99.0));
        assert_eq!(stats.valid_count, 99);
        assert_eq!(stats.nodata_count, 1);
    }

    #[test]
    fn test_update_mask() {
        let raster = Raster::filled(2, 2, 0.3);
        let mask = Mask::from_vec(vec![true, false, true, true], 2, 2).unwrap();
        let masked = raster.update_mask(&mask).unwrap();
        assert!(masked.get(0, 1).unwrap().is_nan());
        assert_eq!(masked.get(1, 1).unwrap(), 0.3);
        assert_eq!(masked.valid_mask().count_valid(), 3);
    }

    #[test]
    fn test_update_mask_keeps_declared_nodata() {
        let mut raster = Raster::from_vec(vec![-9999.0, 0.3, 0.4, 0.5], 2, 2).unwrap();
        raster.set_nodata(Some(-9999.0));
        let mask = Mask::from_vec(vec![true, true, false, true], 2, 2).unwrap();
        let masked = raster.update_mask(&mask).unwrap();
        assert_eq!(masked.nodata(), Some(-9999.0));
        assert_eq!(masked.valid_mask().count_valid(), 2);
        assert_eq!(masked.valid_mask().get(0, 0), Some(false));
    }

    #[test]
    fn test_update_mask_shape_mismatch() {
        let raster = Raster::filled(2, 2, 0.3);
        let mask = Mask::filled(3, 2, true);
        assert!(raster.update_mask(&mask).is_err());
    }
}
