//! Map viewports and the two-pane split view.

use crate::legend::{fill, Legend};
use crate::visualize::Visualization;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use verdant_core::raster::PixelGrid;
use verdant_core::{Error, Rectangle, Result, CRS};

/// Map background behind transparent pixels
const BACKGROUND: Rgba<u8> = Rgba([229, 227, 223, 255]);
const DIVIDER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DIVIDER_WIDTH: u32 = 2;

/// A longitude/latitude centre and web-map zoom level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    pub lon: f64,
    pub lat: f64,
    pub zoom: u8,
}

impl MapView {
    pub fn new(lon: f64, lat: f64, zoom: u8) -> Self {
        Self { lon, lat, zoom }
    }

    /// Degrees covered by one screen pixel at this zoom
    pub fn degrees_per_pixel(&self) -> f64 {
        360.0 / (256.0 * 2f64.powi(self.zoom as i32))
    }

    /// Geographic extent of a `width x height` canvas centred on the view
    pub fn extent(&self, width: u32, height: u32) -> Rectangle {
        let d = self.degrees_per_pixel();
        let half_w = width as f64 * d / 2.0;
        let half_h = height as f64 * d / 2.0;
        Rectangle::new(
            self.lon - half_w,
            self.lat - half_h,
            self.lon + half_w,
            self.lat + half_h,
        )
    }

    /// WGS84 pixel grid of the canvas
    pub fn grid(&self, width: u32, height: u32) -> Result<PixelGrid> {
        PixelGrid::from_dimensions(
            &self.extent(width, height),
            width as usize,
            height as usize,
            Some(CRS::wgs84()),
        )
    }
}

/// Two linked panes sharing one view, split down the middle
#[derive(Debug, Clone, PartialEq)]
pub struct SplitView {
    pub view: MapView,
    pub width: u32,
    pub height: u32,
    pub left_label: String,
    pub right_label: String,
    /// Drawn in the bottom-right of the right pane
    pub legend: Option<Legend>,
}

/// JSON description written next to the rendered PNG
#[derive(Debug, Serialize, Deserialize)]
pub struct SplitViewSidecar {
    pub image: String,
    pub view: MapView,
    pub extent: [f64; 4],
    pub size: [u32; 2],
    pub split_x: u32,
    pub left: PaneInfo,
    pub right: PaneInfo,
    pub legend: Option<Legend>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaneInfo {
    pub label: String,
}

impl SplitView {
    pub fn new(view: MapView, width: u32, height: u32) -> Self {
        Self {
            view,
            width,
            height,
            left_label: String::new(),
            right_label: String::new(),
            legend: None,
        }
    }

    pub fn with_labels(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_label = left.into();
        self.right_label = right.into();
        self
    }

    pub fn with_legend(mut self, legend: Legend) -> Self {
        self.legend = Some(legend);
        self
    }

    /// Grid both panes must be rendered on
    pub fn grid(&self) -> Result<PixelGrid> {
        self.view.grid(self.width, self.height)
    }

    /// Column where the right pane starts
    pub fn split_x(&self) -> u32 {
        self.width / 2
    }

    fn check_pane(&self, pane: &Visualization) -> Result<()> {
        if pane.rows() != self.height as usize || pane.cols() != self.width as usize {
            return Err(Error::SizeMismatch {
                er: self.height as usize,
                ec: self.width as usize,
                ar: pane.rows(),
                ac: pane.cols(),
            });
        }
        Ok(())
    }

    /// Compose both panes into one canvas
    pub fn compose(&self, left: &Visualization, right: &Visualization) -> Result<RgbaImage> {
        self.check_pane(left)?;
        self.check_pane(right)?;

        let split = self.split_x();
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        for (x, y, px) in canvas.enumerate_pixels_mut() {
            let pane = if x < split { left } else { right };
            if let Some(rgba) = pane.pixel(y as usize, x as usize)
                && rgba[3] > 0
            {
                *px = Rgba(rgba);
            }
        }

        let half = DIVIDER_WIDTH / 2;
        fill(
            &mut canvas,
            split.saturating_sub(half),
            0,
            DIVIDER_WIDTH,
            self.height,
            DIVIDER,
        );
        if let Some(legend) = &self.legend {
            legend.draw(&mut canvas, self.width);
        }
        Ok(canvas)
    }

    /// Write the composed PNG and its JSON sidecar (`<stem>.json`).
    /// Returns the sidecar path.
    pub fn save(&self, left: &Visualization, right: &Visualization, png: &Path) -> Result<PathBuf> {
        let canvas = self.compose(left, right)?;
        if let Some(parent) = png.parent() {
            std::fs::create_dir_all(parent)?;
        }
        canvas
            .save_with_format(png, image::ImageFormat::Png)
            .map_err(|e| Error::Other(format!("Cannot write PNG {}: {}", png.display(), e)))?;

        let extent = self.view.extent(self.width, self.height);
        let sidecar = SplitViewSidecar {
            image: png
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            view: self.view,
            extent: [extent.min_x, extent.min_y, extent.max_x, extent.max_y],
            size: [self.width, self.height],
            split_x: self.split_x(),
            left: PaneInfo {
                label: self.left_label.clone(),
            },
            right: PaneInfo {
                label: self.right_label.clone(),
            },
            legend: self.legend.clone(),
        };
        let json_path = png.with_extension("json");
        let json = serde_json::to_string_pretty(&sidecar)
            .map_err(|e| Error::Other(format!("Cannot encode sidecar: {}", e)))?;
        std::fs::write(&json_path, json)?;
        Ok(json_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Rgb;

    fn solid(grid: PixelGrid, color: Rgb) -> Result<Visualization> {
        let pixels = color.rgba().repeat(grid.len());
        Visualization::new(grid, pixels)
    }

    #[test]
    fn zoom_scale() {
        let v = MapView::new(-6.13498, 53.29408, 13);
        assert!((v.degrees_per_pixel() - 360.0 / (256.0 * 8192.0)).abs() < 1e-15);
        let e = v.extent(512, 256);
        let (cx, cy) = e.center();
        assert!((cx - v.lon).abs() < 1e-12 && (cy - v.lat).abs() < 1e-12);
        assert!((e.width() - 512.0 * v.degrees_per_pixel()).abs() < 1e-12);
        let grid = v.grid(512, 256).unwrap();
        assert_eq!(grid.shape(), (256, 512));
        assert!(grid.crs.as_ref().is_some_and(|c| c.is_geographic()));
    }

    #[test]
    fn compose_split_and_legend() {
        let view = SplitView::new(MapView::new(-7.0, 53.5, 7), 300, 200)
            .with_labels("Visual Image", "Infrared - Red")
            .with_legend(Legend::plant_productivity());
        let grid = view.grid().unwrap();
        let left = solid(grid.clone(), Rgb::new(255, 0, 0)).unwrap();
        let right = solid(grid, Rgb::new(0, 0, 255)).unwrap();
        let canvas = view.compose(&left, &right).unwrap();

        assert_eq!(canvas.get_pixel(10, 10).0, [255, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(160, 10).0, [0, 0, 255, 255]);
        assert_eq!(canvas.get_pixel(150, 10).0, DIVIDER.0);
        // legend panel background near the bottom-right corner
        assert_eq!(canvas.get_pixel(290, 190).0, [255, 255, 255, 255]);
    }

    #[test]
    fn transparent_pixels_show_background() {
        let view = SplitView::new(MapView::new(0.0, 0.0, 2), 4, 2);
        let grid = view.grid().unwrap();
        let clear = Visualization::new(grid.clone(), vec![0; 4 * 2 * 4]).unwrap();
        let canvas = view.compose(&clear, &clear).unwrap();
        assert_eq!(canvas.get_pixel(0, 0).0, BACKGROUND.0);
    }

    #[test]
    fn pane_size_must_match() {
        let view = SplitView::new(MapView::new(0.0, 0.0, 2), 4, 2);
        let other = MapView::new(0.0, 0.0, 2).grid(3, 2).unwrap();
        let pane = solid(other, Rgb::new(0, 0, 0)).unwrap();
        assert!(view.compose(&pane, &pane).is_err());
    }

    #[test]
    fn save_writes_png_and_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("split.png");
        let view = SplitView::new(MapView::new(-6.13498, 53.29408, 13), 64, 32)
            .with_labels("Visual Image", "Infrared - Red")
            .with_legend(Legend::plant_productivity());
        let grid = view.grid().unwrap();
        let pane = solid(grid, Rgb::new(10, 20, 30)).unwrap();
        let json = view.save(&pane, &pane, &png).unwrap();

        assert!(png.exists());
        let sidecar: SplitViewSidecar =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(sidecar.left.label, "Visual Image");
        assert_eq!(sidecar.right.label, "Infrared - Red");
        assert_eq!(sidecar.size, [64, 32]);
        assert_eq!(sidecar.legend.unwrap().rows.len(), 6);
    }
}
