//! Image-to-RGBA rendering through visualization parameters.

use crate::palette::Palette;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use verdant_core::image::Image;
use verdant_core::io::{export_rgba, ExportParams};
use verdant_core::raster::PixelGrid;
use verdant_core::{Error, Result};

/// How an image is turned into colour.
///
/// - one band with a palette: colour ramp over `[min, max]`
/// - one band without palette: grey stretch
/// - three bands: per-channel stretch to red, green and blue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub bands: Vec<String>,
    #[serde(default)]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub palette: Option<Palette>,
}

fn default_max() -> f64 {
    1.0
}

fn default_gamma() -> f64 {
    1.0
}

impl VisParams {
    /// Palette ramp over a single band
    pub fn palette(band: impl Into<String>, min: f64, max: f64, palette: Palette) -> Self {
        Self {
            bands: vec![band.into()],
            min,
            max,
            gamma: 1.0,
            palette: Some(palette),
        }
    }

    /// Three-band colour stretch
    pub fn rgb<S: Into<String>>(bands: [S; 3], min: f64, max: f64) -> Self {
        Self {
            bands: bands.into_iter().map(Into::into).collect(),
            min,
            max,
            gamma: 1.0,
            palette: None,
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |name: &'static str, value: String, reason: &str| Error::InvalidParameter {
            name,
            value,
            reason: reason.to_string(),
        };
        if self.bands.len() != 1 && self.bands.len() != 3 {
            return Err(invalid(
                "bands",
                format!("{:?}", self.bands),
                "visualization needs one or three bands",
            ));
        }
        if !(self.max > self.min) {
            return Err(invalid(
                "max",
                format!("{} (min {})", self.max, self.min),
                "max must be greater than min",
            ));
        }
        if !(self.gamma > 0.0) || !self.gamma.is_finite() {
            return Err(invalid("gamma", self.gamma.to_string(), "gamma must be positive"));
        }
        if self.palette.is_some() && self.bands.len() != 1 {
            return Err(invalid(
                "palette",
                format!("{:?}", self.bands),
                "a palette can only be applied to one band",
            ));
        }
        Ok(())
    }

    /// Linear stretch to `[0, 1]` with gamma correction
    fn stretch(&self, v: f64) -> f64 {
        let t = ((v - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        if self.gamma == 1.0 { t } else { t.powf(1.0 / self.gamma) }
    }

    fn to_byte(t: f64) -> u8 {
        (t * 255.0).round() as u8
    }
}

/// An RGBA8 rendering laid out on a pixel grid
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    grid: PixelGrid,
    pixels: Vec<u8>,
}

impl Visualization {
    pub fn new(grid: PixelGrid, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != grid.len() * 4 {
            return Err(Error::InvalidDimensions {
                width: grid.cols,
                height: grid.rows,
            });
        }
        Ok(Self { grid, pixels })
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn rows(&self) -> usize {
        self.grid.rows
    }

    pub fn cols(&self) -> usize {
        self.grid.cols
    }

    /// Interleaved RGBA, row-major
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, row: usize, col: usize) -> Option<[u8; 4]> {
        if row >= self.rows() || col >= self.cols() {
            return None;
        }
        let i = (row * self.cols() + col) * 4;
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Write as a 4-band 8-bit GeoTIFF named after `params.description`.
    ///
    /// The rendering must already be on the export grid.
    pub fn export(&self, params: &ExportParams, dir: &Path) -> Result<PathBuf> {
        export_rgba(&self.pixels, &self.grid, params, dir)
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        let buffer = image::RgbaImage::from_raw(
            self.cols() as u32,
            self.rows() as u32,
            self.pixels.clone(),
        )
        .ok_or_else(|| Error::InvalidDimensions {
            width: self.cols(),
            height: self.rows(),
        })?;
        buffer
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| Error::Other(format!("Cannot write PNG {}: {}", path.display(), e)))
    }
}

/// Render `image` through `params`.
///
/// A pixel that is NaN in any used band is fully transparent.
pub fn visualize(image: &Image, params: &VisParams) -> Result<Visualization> {
    params.validate()?;
    let bands = params
        .bands
        .iter()
        .map(|b| image.band(b))
        .collect::<Result<Vec<_>>>()?;
    let grid = bands[0].grid();
    for band in &bands[1..] {
        if band.shape() != bands[0].shape() {
            let (ar, ac) = band.shape();
            return Err(Error::SizeMismatch {
                er: grid.rows,
                ec: grid.cols,
                ar,
                ac,
            });
        }
    }

    let mut rgba = vec![0u8; grid.len() * 4];
    let data: Vec<_> = bands.iter().map(|b| b.data()).collect();

    for (i, px) in rgba.chunks_exact_mut(4).enumerate() {
        let (row, col) = (i / grid.cols, i % grid.cols);
        if data.iter().any(|d| d[[row, col]].is_nan()) {
            continue; // transparent
        }
        let color = match (&params.palette, data.len()) {
            (Some(palette), _) => {
                let v = data[0][[row, col]];
                palette.evaluate((v - params.min) / (params.max - params.min)).rgba()
            }
            (None, 1) => {
                let g = VisParams::to_byte(params.stretch(data[0][[row, col]]));
                [g, g, g, 255]
            }
            (None, _) => [
                VisParams::to_byte(params.stretch(data[0][[row, col]])),
                VisParams::to_byte(params.stretch(data[1][[row, col]])),
                VisParams::to_byte(params.stretch(data[2][[row, col]])),
                255,
            ],
        };
        px.copy_from_slice(&color);
    }

    Visualization::new(grid, rgba)
}
