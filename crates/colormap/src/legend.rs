//! Map legends: a title and colour swatches with labels.

use crate::palette::{Palette, Rgb};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use verdant_core::{Error, Result};

/// Swatch edge length in pixels
const SWATCH: u32 = 16;
/// Vertical gap between swatches
const ROW_GAP: u32 = 4;
const PAD_X: u32 = 15;
const PAD_Y: u32 = 8;
/// Distance from the pane corner
const MARGIN: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendRow {
    pub color: Rgb,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Legend {
    pub title: String,
    pub rows: Vec<LegendRow>,
}

impl Legend {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_row(mut self, color: Rgb, label: impl Into<String>) -> Self {
        self.rows.push(LegendRow {
            color,
            label: label.into(),
        });
        self
    }

    /// One row per entry of `indices`, taking the colour from `palette` and
    /// the label from `names` at the same index.
    pub fn from_palette<S: AsRef<str>>(
        title: impl Into<String>,
        palette: &Palette,
        names: &[S],
        indices: &[usize],
    ) -> Result<Self> {
        let mut legend = Self::new(title);
        for &i in indices {
            let color = palette.get(i).ok_or_else(|| Error::InvalidParameter {
                name: "legend",
                value: i.to_string(),
                reason: format!("palette has {} colours", palette.len()),
            })?;
            let label = names.get(i).map(|n| n.as_ref()).unwrap_or_default();
            legend = legend.with_row(color, label);
        }
        Ok(legend)
    }

    /// The vegetation productivity legend over [`Palette::ndvi`]
    pub fn plant_productivity() -> Self {
        const NAMES: [&str; 17] = [
            "None", "Very Low", "", "", "Low", "", "", "", "", "Medium", "", "", "", "High", "",
            "", "Very High",
        ];
        Self::from_palette("Plant Productivity", &Palette::ndvi(), &NAMES, &[0, 1, 4, 9, 13, 16])
            .unwrap_or_else(|_| Self::new("Plant Productivity"))
    }

    /// Size of the swatch panel in pixels
    pub fn panel_size(&self) -> (u32, u32) {
        let n = self.rows.len() as u32;
        let height = if n == 0 { 0 } else { n * SWATCH + (n - 1) * ROW_GAP };
        (SWATCH + 2 * PAD_X, height + 2 * PAD_Y)
    }

    /// Draw the swatch panel into the bottom-right corner of the region of
    /// `canvas` that ends at column `right` (exclusive).
    pub fn draw(&self, canvas: &mut RgbaImage, right: u32) {
        if self.rows.is_empty() {
            return;
        }
        let (w, h) = self.panel_size();
        let x0 = right.saturating_sub(w + MARGIN);
        let y0 = canvas.height().saturating_sub(h + MARGIN);
        fill(canvas, x0, y0, w, h, Rgba([255, 255, 255, 255]));
        for (i, row) in self.rows.iter().enumerate() {
            let y = y0 + PAD_Y + i as u32 * (SWATCH + ROW_GAP);
            fill(canvas, x0 + PAD_X, y, SWATCH, SWATCH, Rgba(row.color.rgba()));
        }
    }
}

pub(crate) fn fill(canvas: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x1 = (x0 + w).min(canvas.width());
    let y1 = (y0 + h).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.put_pixel(x, y, color);
        }
    }
}
