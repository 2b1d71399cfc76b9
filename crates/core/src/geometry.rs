//! Axis-aligned rectangles used for catalog bounds, export regions and map
//! viewports.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A rectangle given by its west, south, east and north edges.
///
/// Coordinates are in the units of whatever CRS the caller pairs it with;
/// catalog queries use degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rectangle {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build a rectangle, rejecting inverted or non-finite edges.
    pub fn try_new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        let edges = [min_x, min_y, max_x, max_y];
        if edges.iter().any(|v| !v.is_finite()) || min_x >= max_x || min_y >= max_y {
            return Err(Error::InvalidParameter {
                name: "rectangle",
                value: format!("{:?}", edges),
                reason: "expected finite [west, south, east, north] with west < east and south < north".into(),
            });
        }
        Ok(Self::new(min_x, min_y, max_x, max_y))
    }

    /// Build from a `[west, south, east, north]` slice (STAC bbox order).
    pub fn from_slice(bbox: &[f64]) -> Result<Self> {
        match bbox {
            [w, s, e, n] => Self::try_new(*w, *s, *e, *n),
            // 3D bboxes: [w, s, zmin, e, n, zmax]
            [w, s, _, e, n, _] => Self::try_new(*w, *s, *e, *n),
            _ => Err(Error::InvalidParameter {
                name: "bbox",
                value: format!("{:?}", bbox),
                reason: "expected 4 or 6 values".into(),
            }),
        }
    }

    /// `[west, south, east, north]`
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Check if two rectangles intersect.
    pub fn intersects(&self, other: &Rectangle) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Whether the point lies inside or on the boundary.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}
