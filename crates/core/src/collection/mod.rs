//! Ordered image collections on a common grid

mod filter;
mod season;

pub use filter::{CalendarField, CompareOp, Filter};
pub use season::Season;

use crate::error::{Error, Result};
use crate::image::Image;
use crate::raster::PixelGrid;
use chrono::{DateTime, Utc};

/// Images sharing one pixel grid and one band list.
///
/// The grid and band names survive filtering, so an empty collection still
/// knows the shape of what it would have held.
#[derive(Debug, Clone)]
pub struct ImageCollection {
    grid: PixelGrid,
    band_names: Vec<String>,
    images: Vec<Image>,
}

impl ImageCollection {
    pub fn new(grid: PixelGrid, band_names: Vec<String>) -> Self {
        Self {
            grid,
            band_names,
            images: Vec::new(),
        }
    }

    pub fn from_images(grid: PixelGrid, band_names: Vec<String>, images: Vec<Image>) -> Result<Self> {
        let mut collection = Self::new(grid, band_names);
        for image in images {
            collection.push(image)?;
        }
        Ok(collection)
    }

    /// Append an image; its band names and grid shape must match
    pub fn push(&mut self, image: Image) -> Result<()> {
        let names = image.band_names();
        if names != self.band_names {
            return Err(Error::BandMismatch(format!(
                "image '{}' has bands {:?}, collection expects {:?}",
                image.id(),
                names,
                self.band_names
            )));
        }
        for (_, raster) in image.bands() {
            self.grid.check_shape(raster.rows(), raster.cols())?;
        }
        self.images.push(image);
        Ok(())
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn band_names(&self) -> &[String] {
        &self.band_names
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn first(&self) -> Option<&Image> {
        self.images.first()
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Image> {
        self.images.iter()
    }

    /// Acquisition timestamps, in collection order
    pub fn dates(&self) -> Vec<DateTime<Utc>> {
        self.images.iter().filter_map(|img| img.acquired()).collect()
    }

    pub fn filter(&self, filter: &Filter) -> ImageCollection {
        ImageCollection {
            grid: self.grid.clone(),
            band_names: self.band_names.clone(),
            images: self
                .images
                .iter()
                .filter(|img| filter.matches(img))
                .cloned()
                .collect(),
        }
    }

    /// Apply `f` to every image.
    ///
    /// The output band list comes from the first result; on an empty
    /// collection `f` is run once on an all-NaN probe image to learn it.
    pub fn map<F>(&self, f: F) -> Result<ImageCollection>
    where
        F: Fn(&Image) -> Result<Image>,
    {
        let mapped = self.images.iter().map(&f).collect::<Result<Vec<_>>>()?;
        let band_names = match mapped.first() {
            Some(first) => first.band_names(),
            None => f(&Image::empty("probe", &self.grid, &self.band_names))?.band_names(),
        };
        ImageCollection::from_images(self.grid.clone(), band_names, mapped)
    }

    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<ImageCollection> {
        for name in names {
            if !self.band_names.iter().any(|b| b == name.as_ref()) {
                return Err(Error::MissingBand {
                    band: name.as_ref().to_string(),
                    image: "collection".to_string(),
                });
            }
        }
        self.map(|img| img.select(names))
    }

    /// Concatenate two collections with identical grids and bands
    pub fn merge(&self, other: &ImageCollection) -> Result<ImageCollection> {
        if self.grid != other.grid {
            return Err(Error::BandMismatch(
                "cannot merge collections on different grids".into(),
            ));
        }
        let mut out = self.clone();
        for image in &other.images {
            out.push(image.clone())?;
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a ImageCollection {
    type Item = &'a Image;
    type IntoIter = std::slice::Iter<'a, Image>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}
