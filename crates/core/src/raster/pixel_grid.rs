//! Pixel grids shared by every image of a collection

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::raster::GeoTransform;
use serde::{Deserialize, Serialize};

/// The georeferenced lattice a raster is laid out on.
///
/// Images loaded from a catalog are resampled onto one `PixelGrid` so that
/// per-pixel masking, compositing and index math line up across scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelGrid {
    pub transform: GeoTransform,
    pub rows: usize,
    pub cols: usize,
    pub crs: Option<CRS>,
}

impl PixelGrid {
    pub fn new(transform: GeoTransform, rows: usize, cols: usize, crs: Option<CRS>) -> Self {
        Self {
            transform,
            rows,
            cols,
            crs,
        }
    }

    /// Grid of exactly `cols x rows` pixels covering `region`.
    pub fn from_dimensions(region: &Rectangle, cols: usize, rows: usize, crs: Option<CRS>) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Ok(Self::new(GeoTransform::covering(region, cols, rows), rows, cols, crs))
    }

    /// Grid with square pixels of `scale` CRS units covering `region`.
    ///
    /// The pixel count is rounded up so the whole region is covered; the
    /// grid's south and east edges may extend past the region by less than
    /// one pixel.
    pub fn from_scale(region: &Rectangle, scale: f64, crs: Option<CRS>) -> Result<Self> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(Error::InvalidParameter {
                name: "scale",
                value: scale.to_string(),
                reason: "must be a positive number".into(),
            });
        }
        let cols = (region.width() / scale).ceil().max(1.0) as usize;
        let rows = (region.height() / scale).ceil().max(1.0) as usize;
        let transform = GeoTransform::new(region.min_x, region.max_y, scale, -scale);
        Ok(Self::new(transform, rows, cols, crs))
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bounds(&self) -> Rectangle {
        self.transform.bounds(self.cols, self.rows)
    }

    pub(crate) fn check_shape(&self, rows: usize, cols: usize) -> Result<()> {
        if (rows, cols) != (self.rows, self.cols) {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: rows,
                ac: cols,
            });
        }
        Ok(())
    }

    /// Fail when both CRSs are known and differ.
    pub fn check_crs(&self, other: Option<&CRS>) -> Result<()> {
        if let (Some(a), Some(b)) = (self.crs.as_ref(), other) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.to_string(), b.to_string()));
            }
        }
        Ok(())
    }
}
