//! Multi-band satellite images

use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::raster::{Mask, PixelGrid, Raster};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// A scene (or a composite) made of named `f64` bands on a shared grid.
///
/// Bands keep their insertion order. Every operation returns a new image;
/// masking only ever turns pixels into NaN.
#[derive(Debug, Clone)]
pub struct Image {
    id: String,
    acquired: Option<DateTime<Utc>>,
    properties: BTreeMap<String, f64>,
    footprint: Option<Rectangle>,
    bands: Vec<(String, Raster<f64>)>,
}

impl Image {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            acquired: None,
            properties: BTreeMap::new(),
            footprint: None,
            bands: Vec::new(),
        }
    }

    /// An image whose bands are all NaN on `grid`
    pub fn empty(id: impl Into<String>, grid: &PixelGrid, bands: &[String]) -> Self {
        let mut image = Self::new(id);
        image.bands = bands
            .iter()
            .map(|name| (name.clone(), Raster::empty(grid)))
            .collect();
        image
    }

    pub fn with_acquired(mut self, acquired: DateTime<Utc>) -> Self {
        self.acquired = Some(acquired);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: f64) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_footprint(mut self, footprint: Rectangle) -> Self {
        self.footprint = Some(footprint);
        self
    }

    /// Append a band. Its shape must match the bands already present.
    pub fn with_band(mut self, name: impl Into<String>, raster: Raster<f64>) -> Result<Self> {
        let name = name.into();
        if let Some((_, first)) = self.bands.first() {
            let (rows, cols) = first.shape();
            let (ar, ac) = raster.shape();
            if (rows, cols) != (ar, ac) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar,
                    ac,
                });
            }
        }
        if self.has_band(&name) {
            return Err(Error::BandMismatch(format!(
                "band '{}' already present in image '{}'",
                name, self.id
            )));
        }
        self.bands.push((name, raster));
        Ok(self)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn acquired(&self) -> Option<DateTime<Utc>> {
        self.acquired
    }

    pub fn property(&self, name: &str) -> Option<f64> {
        self.properties.get(name).copied()
    }

    pub fn properties(&self) -> &BTreeMap<String, f64> {
        &self.properties
    }

    /// Footprint, falling back to the extent of the first band
    pub fn footprint(&self) -> Option<Rectangle> {
        self.footprint
            .or_else(|| self.bands.first().map(|(_, r)| r.bounds()))
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn num_bands(&self) -> usize {
        self.bands.len()
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.iter().any(|(n, _)| n == name)
    }

    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.bands
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, r)| r)
            .ok_or_else(|| Error::MissingBand {
                band: name.to_string(),
                image: self.id.clone(),
            })
    }

    pub fn bands(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.bands.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Grid of the first band
    pub fn grid(&self) -> Option<PixelGrid> {
        self.bands.first().map(|(_, r)| r.grid())
    }

    /// Keep only `names`, in that order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Image> {
        let mut bands = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            bands.push((name.to_string(), self.band(name)?.clone()));
        }
        Ok(self.replace_bands(bands))
    }

    /// Rename every band positionally
    pub fn rename<S: AsRef<str>>(&self, names: &[S]) -> Result<Image> {
        if names.len() != self.bands.len() {
            return Err(Error::BandMismatch(format!(
                "cannot rename {} band(s) of '{}' to {} name(s)",
                self.bands.len(),
                self.id,
                names.len()
            )));
        }
        let bands = self
            .bands
            .iter()
            .zip(names)
            .map(|((_, raster), name)| (name.as_ref().to_string(), raster.clone()))
            .collect();
        Ok(self.replace_bands(bands))
    }

    /// Select `from` and rename the result to `to`
    pub fn select_as<S: AsRef<str>, U: AsRef<str>>(&self, from: &[S], to: &[U]) -> Result<Image> {
        self.select(from)?.rename(to)
    }

    /// Append every band of `other`; names must not collide
    pub fn add_bands(&self, other: &Image) -> Result<Image> {
        let mut out = self.clone();
        for (name, raster) in &other.bands {
            out = out.with_band(name.clone(), raster.clone())?;
        }
        Ok(out)
    }

    /// Pixels valid in every band
    pub fn mask(&self) -> Mask {
        let mut iter = self.bands.iter();
        let Some((_, first)) = iter.next() else {
            return Mask::filled(0, 0, false);
        };
        let mut data = first.valid_mask().data().clone();
        for (_, raster) in iter {
            ndarray::Zip::from(&mut data)
                .and(raster.valid_mask().data())
                .for_each(|keep, &valid| *keep = *keep && valid);
        }
        Mask::from_array(data)
    }

    /// Apply `mask` to every band
    pub fn update_mask(&self, mask: &Mask) -> Result<Image> {
        let bands = self
            .bands
            .iter()
            .map(|(name, raster)| Ok((name.clone(), raster.update_mask(mask)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.replace_bands(bands))
    }

    /// Same metadata, different bands
    pub fn replace_bands(&self, bands: Vec<(String, Raster<f64>)>) -> Image {
        Image {
            id: self.id.clone(),
            acquired: self.acquired,
            properties: self.properties.clone(),
            footprint: self.footprint,
            bands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scene() -> Image {
        Image::new("S2_20180512")
            .with_acquired(Utc.with_ymd_and_hms(2018, 5, 12, 11, 0, 0).unwrap())
            .with_property("CLOUDY_PIXEL_PERCENTAGE", 4.5)
            .with_band("B4", Raster::filled(2, 2, 0.1))
            .unwrap()
            .with_band("B8", Raster::from_vec(vec![0.5, f64::NAN, 0.5, 0.5], 2, 2).unwrap())
            .unwrap()
    }

    #[test]
    fn select_and_rename() {
        let img = scene().select_as(&["B8", "B4"], &["NIR", "R"]).unwrap();
        assert_eq!(img.band_names(), vec!["NIR", "R"]);
        assert_eq!(img.property("CLOUDY_PIXEL_PERCENTAGE"), Some(4.5));
        assert!(matches!(
            scene().select(&["B2"]),
            Err(Error::MissingBand { .. })
        ));
        assert!(scene().rename(&["only_one"]).is_err());
    }

    #[test]
    fn mask_is_valid_in_all_bands() {
        let img = scene();
        let mask = img.mask();
        assert_eq!(mask.count_valid(), 3);
        assert_eq!(mask.get(0, 1), Some(false));
        let masked = img.update_mask(&mask).unwrap();
        assert!(masked.band("B4").unwrap().get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn mask_honors_nodata_of_every_band() {
        let mut qa = Raster::from_vec(vec![0.0, 0.0, 1.0, 0.0], 2, 2).unwrap();
        qa.set_nodata(Some(1.0));
        let img = scene().with_band("QA", qa).unwrap();
        let mask = img.mask();
        assert_eq!(mask.count_valid(), 2);
        assert_eq!(mask.get(1, 0), Some(false));
    }

    #[test]
    fn band_shapes_must_agree() {
        let err = scene().with_band("B2", Raster::filled(3, 3, 0.0));
        assert!(matches!(err, Err(Error::SizeMismatch { .. })));
        assert!(scene().with_band("B4", Raster::filled(2, 2, 0.0)).is_err());
    }

    #[test]
    fn empty_image_is_all_nan() {
        let grid = Raster::<f64>::filled(2, 3, 0.0).grid();
        let img = Image::empty("empty", &grid, &["NDVI".to_string()]);
        assert_eq!(img.mask().count_valid(), 0);
        assert_eq!(img.band("NDVI").unwrap().shape(), (2, 3));
    }
}
