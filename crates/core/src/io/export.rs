//! Image export to GeoTIFF files on the local filesystem

use super::native::{write_geotiff, write_rgba_geotiff, GeoTiffOptions};
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::image::Image;
use crate::raster::{resample_nearest, PixelGrid};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default cap on exported pixels
pub const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// Requested output size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimensions {
    /// Exact `width x height`
    Exact { width: usize, height: usize },
    /// Longest side in pixels; the other follows the region's aspect ratio
    MaxSide(usize),
}

impl Dimensions {
    /// `(cols, rows)` for a region
    pub fn resolve(self, region: &Rectangle) -> (usize, usize) {
        match self {
            Dimensions::Exact { width, height } => (width, height),
            Dimensions::MaxSide(n) => {
                let (w, h) = (region.width(), region.height());
                if w >= h {
                    (n, ((n as f64 * h / w).round() as usize).max(1))
                } else {
                    (((n as f64 * w / h).round() as usize).max(1), n)
                }
            }
        }
    }
}

impl FromStr for Dimensions {
    type Err = Error;

    /// Parse `"24x40"` (width x height) or a single longest-side `"512"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidParameter {
            name: "dimensions",
            value: s.to_string(),
            reason: "expected WIDTHxHEIGHT or a single positive size".into(),
        };
        let parse = |v: &str| v.trim().parse::<usize>().ok().filter(|&n| n > 0);
        match s.trim().split_once(['x', 'X']) {
            Some((w, h)) => Ok(Dimensions::Exact {
                width: parse(w).ok_or_else(invalid)?,
                height: parse(h).ok_or_else(invalid)?,
            }),
            None => Ok(Dimensions::MaxSide(parse(s).ok_or_else(invalid)?)),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimensions::Exact { width, height } => write!(f, "{}x{}", width, height),
            Dimensions::MaxSide(n) => write!(f, "{}", n),
        }
    }
}

/// Output container; only GeoTIFF is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    GeoTiff,
}

/// Parameters of one export task
#[derive(Debug, Clone, PartialEq)]
pub struct ExportParams {
    /// Base file name, without extension
    pub description: String,
    /// Pixel size in CRS units; ignored when `dimensions` is set
    pub scale: Option<f64>,
    pub dimensions: Option<Dimensions>,
    /// Must match the image CRS
    pub crs: Option<CRS>,
    /// Defaults to the image extent
    pub region: Option<Rectangle>,
    pub max_pixels: u64,
    pub file_format: FileFormat,
    pub cloud_optimized: bool,
}

impl ExportParams {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            scale: None,
            dimensions: None,
            crs: None,
            region: None,
            max_pixels: DEFAULT_MAX_PIXELS,
            file_format: FileFormat::GeoTiff,
            cloud_optimized: false,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn with_region(mut self, region: Rectangle) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn with_cloud_optimized(mut self, cloud_optimized: bool) -> Self {
        self.cloud_optimized = cloud_optimized;
        self
    }

    /// Same parameters under another file name
    pub fn renamed(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }

    /// Path of the single-file output inside `dir`
    pub fn file_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.tif", self.description))
    }

    /// The grid an image laid out on `source` is exported onto.
    pub fn target_grid(&self, source: &PixelGrid) -> Result<PixelGrid> {
        let crs = match (&self.crs, &source.crs) {
            (Some(requested), Some(actual)) if !requested.is_equivalent(actual) => {
                return Err(Error::CrsMismatch(requested.to_string(), actual.to_string()));
            }
            (Some(requested), _) => Some(requested.clone()),
            (None, actual) => actual.clone(),
        };

        let region = self.region.unwrap_or_else(|| source.bounds());
        let grid = match (self.dimensions, self.scale) {
            (Some(dims), _) => {
                let (cols, rows) = dims.resolve(&region);
                PixelGrid::from_dimensions(&region, cols, rows, crs)?
            }
            (None, Some(scale)) => PixelGrid::from_scale(&region, scale, crs)?,
            (None, None) if self.region.is_none() => PixelGrid { crs, ..source.clone() },
            (None, None) => PixelGrid::from_scale(&region, source.transform.cell_size(), crs)?,
        };

        let (rows, cols) = grid.shape();
        if (rows as u64).saturating_mul(cols as u64) > self.max_pixels {
            return Err(Error::TooManyPixels {
                rows,
                cols,
                max_pixels: self.max_pixels,
            });
        }
        Ok(grid)
    }

    /// Resample every band of `image` onto the export grid
    pub fn prepare(&self, image: &Image) -> Result<Image> {
        let source = image
            .grid()
            .ok_or_else(|| Error::BandMismatch(format!("image '{}' has no bands", image.id())))?;
        let target = self.target_grid(&source)?;
        let bands = image
            .bands()
            .map(|(name, raster)| Ok((name.to_string(), resample_nearest(raster, &target)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(image.replace_bands(bands))
    }
}

/// Export a float image as 32-bit GeoTIFF.
///
/// A single-band image is written to `<description>.tif`; a multi-band image
/// to one `<description>_<band>.tif` per band. Returns the written paths.
pub fn export_image(image: &Image, params: &ExportParams, dir: &Path) -> Result<Vec<PathBuf>> {
    let prepared = params.prepare(image)?;
    let options = GeoTiffOptions {
        cloud_optimized: params.cloud_optimized,
    };
    std::fs::create_dir_all(dir)?;

    if prepared.num_bands() == 1 {
        let path = params.file_path(dir);
        if let Some((_, raster)) = prepared.bands().next() {
            write_geotiff(raster, &path, Some(options))?;
        }
        return Ok(vec![path]);
    }

    let mut paths = Vec::with_capacity(prepared.num_bands());
    for (name, raster) in prepared.bands() {
        let path = dir.join(format!("{}_{}.tif", params.description, name));
        write_geotiff(raster, &path, Some(options.clone()))?;
        paths.push(path);
    }
    Ok(paths)
}

/// Export RGBA8 pixels already laid out on `grid` to `<description>.tif`.
pub fn export_rgba(pixels: &[u8], grid: &PixelGrid, params: &ExportParams, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = params.file_path(dir);
    write_rgba_geotiff(pixels, grid, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_geotiff;
    use crate::raster::{GeoTransform, Raster};

    fn image() -> Image {
        // 10 x 20 pixels of 100 m in Irish Transverse Mercator
        let mut r = Raster::filled(10, 20, 0.5);
        r.set_transform(GeoTransform::new(600000.0, 750000.0, 100.0, -100.0));
        r.set_crs(Some(CRS::from_epsg(2157)));
        Image::new("ndvi").with_band("NDVI", r).unwrap()
    }

    #[test]
    fn parse_dimensions() {
        assert_eq!(
            "24x40".parse::<Dimensions>().unwrap(),
            Dimensions::Exact { width: 24, height: 40 }
        );
        assert_eq!("512".parse::<Dimensions>().unwrap(), Dimensions::MaxSide(512));
        assert!("0x40".parse::<Dimensions>().is_err());
        assert!("24x".parse::<Dimensions>().is_err());
        assert!("big".parse::<Dimensions>().is_err());
    }

    #[test]
    fn dimensions_win_over_scale() {
        let params = ExportParams::new("WinterNDVI")
            .with_scale(100.0)
            .with_dimensions("24x40".parse().unwrap());
        let grid = params.target_grid(&image().grid().unwrap()).unwrap();
        assert_eq!(grid.shape(), (40, 24));
    }

    #[test]
    fn scale_sets_pixel_size() {
        let params = ExportParams::new("x").with_scale(200.0);
        let grid = params.target_grid(&image().grid().unwrap()).unwrap();
        assert_eq!(grid.shape(), (5, 10));
        let max_side = Dimensions::MaxSide(10).resolve(&image().grid().unwrap().bounds());
        assert_eq!(max_side, (10, 5));
    }

    #[test]
    fn max_pixels_cap() {
        let params = ExportParams::new("x")
            .with_dimensions("24x40".parse().unwrap())
            .with_max_pixels(959);
        let err = params.target_grid(&image().grid().unwrap()).unwrap_err();
        assert!(matches!(err, Error::TooManyPixels { rows: 40, cols: 24, .. }));
        let params = params.with_max_pixels(960);
        assert!(params.target_grid(&image().grid().unwrap()).is_ok());
    }

    #[test]
    fn crs_must_match() {
        let params = ExportParams::new("x").with_crs(CRS::wgs84());
        assert!(matches!(
            params.target_grid(&image().grid().unwrap()),
            Err(Error::CrsMismatch(_, _))
        ));
    }

    #[test]
    fn export_writes_description_file() {
        let dir = tempfile::tempdir().unwrap();
        let params = ExportParams::new("SummerNDVI")
            .with_crs(CRS::from_epsg(2157))
            .with_dimensions("4x2".parse().unwrap());
        let paths = export_image(&image(), &params, dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("SummerNDVI.tif")]);

        let back: Raster<f64> = read_geotiff(&paths[0], None).unwrap();
        assert_eq!(back.shape(), (2, 4));
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(2157));
        assert!((back.get(1, 3).unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn multi_band_export_splits_files() {
        let dir = tempfile::tempdir().unwrap();
        let img = image()
            .add_bands(
                &Image::new("b")
                    .with_band("EVI", image().band("NDVI").unwrap().clone())
                    .unwrap(),
            )
            .unwrap();
        let paths = export_image(&img, &ExportParams::new("Both"), dir.path()).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[1].ends_with("Both_EVI.tif"));
    }
}
