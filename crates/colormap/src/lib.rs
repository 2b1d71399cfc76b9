//! # Verdant Colormap
//!
//! Turning index and reflectance images into pictures.
//!
//! - [`Palette`]: hex colour lists with evenly spaced stops
//! - [`VisParams`] and [`visualize`]: palette ramps, grey and RGB stretches
//! - [`Legend`]: titled swatch lists
//! - [`MapView`] and [`SplitView`]: linked two-pane rendering to PNG
//!
//! ## Usage
//!
//! ```ignore
//! use verdant_colormap::{visualize, Palette, VisParams};
//!
//! let params = VisParams::palette("NDVI", 0.2, 0.9, Palette::ndvi());
//! let vis = visualize(&ndvi_image, &params)?;
//! vis.save_png(Path::new("ndvi.png"))?;
//! ```

mod legend;
mod palette;
mod view;
mod visualize;

pub use legend::{Legend, LegendRow};
pub use palette::{Palette, Rgb, NDVI_HEX};
pub use view::{MapView, PaneInfo, SplitView, SplitViewSidecar};
pub use visualize::{visualize, VisParams, Visualization};
