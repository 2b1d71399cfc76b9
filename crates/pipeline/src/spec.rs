//! Immutable pipeline descriptions.
//!
//! A [`PipelineSpec`] says what to load, how to reduce it and what to write.
//! Building one does no I/O; evaluation happens in [`crate::Pipeline`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use verdant_algorithms::composite::Reducer;
use verdant_algorithms::imagery::{SpectralIndex, ThresholdRange};
use verdant_algorithms::sensor::{Archive, Sensor};
use verdant_cloud::{BandAsset, CatalogQuery};
use verdant_colormap::{MapView, Palette, VisParams};
use verdant_core::io::ExportParams;
use verdant_core::raster::PixelGrid;
use verdant_core::{CalendarField, Filter, Rectangle, Season};

use crate::error::{PipelineError, Result};

/// Where the index is computed relative to the temporal reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeOrder {
    /// Reduce the bands, then compute the index on the composite
    #[default]
    CompositeFirst,
    /// Compute the index per image, then reduce the index images
    IndexFirst,
}

/// Linked two-pane display: composite on the left, index on the right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSpec {
    pub lon: f64,
    pub lat: f64,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
    pub left_label: String,
    pub right_label: String,
    /// Draw the plant productivity legend
    pub legend: bool,
    /// Restrict to one season; the whole period otherwise
    pub season: Option<Season>,
}

impl Default for ViewSpec {
    fn default() -> Self {
        Self {
            lon: -6.13498,
            lat: 53.29408,
            zoom: 13,
            width: 1024,
            height: 768,
            left_label: "Visual Image".to_string(),
            right_label: "Infrared - Red".to_string(),
            legend: true,
            season: None,
        }
    }
}

impl ViewSpec {
    pub fn map_view(&self) -> MapView {
        MapView::new(self.lon, self.lat, self.zoom)
    }
}

/// Everything one pipeline run needs, fixed up front.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    sensor: Sensor,
    archive: Archive,
    query: CatalogQuery,
    years: Option<(i32, i32)>,
    grid: PixelGrid,
    seasons: Vec<Season>,
    label: String,
    reducer: Reducer,
    order: CompositeOrder,
    index: Option<SpectralIndex>,
    threshold: Option<ThresholdRange>,
    index_vis: Option<VisParams>,
    rgb_vis: Option<VisParams>,
    export: ExportParams,
    raw_index: bool,
    water_mask: Option<PathBuf>,
    view: Option<ViewSpec>,
}

impl PipelineSpec {
    /// Seasonal NDVI for `sensor` on `grid`, with the sensor's default
    /// collection and archive years.
    pub fn new(sensor: Sensor, grid: PixelGrid) -> Self {
        let profile = sensor.profile();
        Self {
            sensor,
            archive: Archive::Native,
            query: CatalogQuery::new(profile.collection),
            years: profile.years,
            grid,
            seasons: Season::ALL.to_vec(),
            label: "Composite".to_string(),
            reducer: Reducer::Median,
            order: CompositeOrder::CompositeFirst,
            index: Some(SpectralIndex::Ndvi),
            threshold: Some(ThresholdRange::default()),
            index_vis: Some(VisParams::palette("NDVI", 0.2, 0.9, Palette::ndvi())),
            rgb_vis: Some(VisParams::rgb(["R", "G", "B"], 0.0, 0.3)),
            export: ExportParams::new("verdant"),
            raw_index: false,
            water_mask: None,
            view: None,
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.query.collection = collection.into();
        self
    }

    /// Asset layout of the catalog the scenes come from
    pub fn with_archive(mut self, archive: Archive) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.query = self.query.with_dates(start, end);
        self
    }

    /// Either end may be open
    pub fn with_date_bounds(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.query.start = start;
        self.query.end = end;
        self
    }

    pub fn with_bbox(mut self, bbox: Rectangle) -> Self {
        self.query = self.query.with_bbox(bbox);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.query = self.query.with_filter(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.query = self.query.with_limit(limit);
        self
    }

    /// Keep acquisitions from these calendar years (inclusive); `None`
    /// lifts the sensor's default restriction.
    pub fn with_years(mut self, years: Option<(i32, i32)>) -> Self {
        self.years = years;
        self
    }

    /// Seasons to produce; an empty list reduces the whole period once
    pub fn with_seasons(mut self, seasons: Vec<Season>) -> Self {
        self.seasons = seasons;
        self
    }

    /// Output name prefix used when no seasons are requested
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn with_order(mut self, order: CompositeOrder) -> Self {
        self.order = order;
        self
    }

    /// Compute `index`; a single-band index visualization follows its name
    pub fn with_index(mut self, index: SpectralIndex) -> Self {
        if let Some(vis) = self.index_vis.as_mut()
            && vis.bands.len() == 1
        {
            vis.bands = vec![index.name().to_string()];
        }
        self.index = Some(index);
        self
    }

    /// Composites only
    pub fn without_index(mut self) -> Self {
        self.index = None;
        self.index_vis = None;
        self
    }

    pub fn with_threshold(mut self, threshold: Option<ThresholdRange>) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_index_vis(mut self, vis: Option<VisParams>) -> Self {
        self.index_vis = vis;
        self
    }

    pub fn with_rgb_vis(mut self, vis: Option<VisParams>) -> Self {
        self.rgb_vis = vis;
        self
    }

    /// Export settings; `description` is replaced per output
    pub fn with_export(mut self, export: ExportParams) -> Self {
        self.export = export;
        self
    }

    /// Also write the float index values as GeoTIFF
    pub fn with_raw_index(mut self, raw: bool) -> Self {
        self.raw_index = raw;
        self
    }

    /// GeoTIFF whose pixels equal to 1 are water and get masked
    pub fn with_water_mask(mut self, path: impl Into<PathBuf>) -> Self {
        self.water_mask = Some(path.into());
        self
    }

    pub fn with_view(mut self, view: ViewSpec) -> Self {
        self.view = Some(view);
        self
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn archive(&self) -> Archive {
        self.archive
    }

    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    pub fn seasons(&self) -> &[Season] {
        &self.seasons
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn reducer(&self) -> Reducer {
        self.reducer
    }

    pub fn order(&self) -> CompositeOrder {
        self.order
    }

    pub fn index(&self) -> Option<&SpectralIndex> {
        self.index.as_ref()
    }

    pub fn threshold(&self) -> Option<ThresholdRange> {
        self.threshold
    }

    pub fn index_vis(&self) -> Option<&VisParams> {
        self.index_vis.as_ref()
    }

    pub fn rgb_vis(&self) -> Option<&VisParams> {
        self.rgb_vis.as_ref()
    }

    pub fn export(&self) -> &ExportParams {
        &self.export
    }

    pub fn raw_index(&self) -> bool {
        self.raw_index
    }

    pub fn water_mask(&self) -> Option<&Path> {
        self.water_mask.as_deref()
    }

    pub fn view(&self) -> Option<&ViewSpec> {
        self.view.as_ref()
    }

    /// The catalog query, including the calendar-year restriction
    pub fn catalog_query(&self) -> CatalogQuery {
        match self.years {
            Some((first, last)) => self.query.clone().with_filter(Filter::calendar_range(
                first as i64,
                last as i64,
                CalendarField::Year,
            )),
            None => self.query.clone(),
        }
    }

    /// Every native band of the sensor with its asset key in the archive
    pub fn band_assets(&self) -> Result<Vec<BandAsset>> {
        Ok(self
            .sensor
            .profile()
            .band_assets(self.archive)?
            .into_iter()
            .map(|(band, key)| BandAsset::new(band, key))
            .collect())
    }

    /// Check parameter consistency before anything is loaded.
    pub fn validate(&self) -> Result<()> {
        self.band_assets()?;
        if let Some(vis) = &self.index_vis {
            vis.validate()?;
            let Some(index) = &self.index else {
                return Err(PipelineError::Config(
                    "index visualization given without an index".into(),
                ));
            };
            if vis.bands.iter().any(|b| b != index.name()) {
                return Err(PipelineError::Config(format!(
                    "index visualization reads {:?} but the index band is '{}'",
                    vis.bands,
                    index.name()
                )));
            }
        }
        if let Some(vis) = &self.rgb_vis {
            vis.validate()?;
            let canonical = self.sensor.profile().canonical_bands;
            if let Some(missing) = vis.bands.iter().find(|b| !canonical.contains(&b.as_str())) {
                return Err(PipelineError::Config(format!(
                    "band '{}' is not produced for {}",
                    missing, self.sensor
                )));
            }
        }
        if let Some(index) = &self.index {
            index.required_bands()?;
        }
        if self.seasons.is_empty() && self.label.is_empty() {
            return Err(PipelineError::Config("an output label is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdant_core::CRS;

    fn grid() -> PixelGrid {
        PixelGrid::from_scale(
            &Rectangle::new(0.0, 0.0, 100.0, 100.0),
            10.0,
            Some(CRS::from_epsg(32629)),
        )
        .unwrap()
    }

    #[test]
    fn defaults_follow_sensor() {
        let spec = PipelineSpec::new(Sensor::Landsat457, grid());
        let q = spec.catalog_query();
        assert_eq!(q.collection, "LANDSAT/LE07/C01/T1_SR");
        assert_eq!(
            q.filters,
            vec![Filter::calendar_range(1999, 2018, CalendarField::Year)]
        );
        assert_eq!(spec.seasons().len(), 4);
        assert_eq!(spec.archive(), Archive::Native);
        let assets = spec.band_assets().unwrap();
        assert_eq!(assets.len(), 7);
        assert_eq!(assets[0], BandAsset::native("B1"));
        spec.validate().unwrap();

        let open = spec.with_years(None);
        assert!(open.catalog_query().filters.is_empty());
    }

    #[test]
    fn builder_returns_new_values() {
        let base = PipelineSpec::new(Sensor::Sentinel2, grid());
        let evi = base.clone().with_index(SpectralIndex::evi());
        assert_eq!(base.index(), Some(&SpectralIndex::Ndvi));
        assert_eq!(evi.index_vis().unwrap().bands, vec!["EVI".to_string()]);
        evi.validate().unwrap();
    }

    #[test]
    fn validation_catches_band_mismatches() {
        let spec = PipelineSpec::new(Sensor::Sentinel2, grid())
            .with_index_vis(Some(VisParams::palette("EVI", 0.0, 1.0, Palette::ndvi())));
        assert!(matches!(spec.validate(), Err(PipelineError::Config(_))));

        let spec = PipelineSpec::new(Sensor::Sentinel2, grid())
            .with_rgb_vis(Some(VisParams::rgb(["R", "G", "Cirrus"], 0.0, 0.3)));
        assert!(spec.validate().is_err());

        let spec = PipelineSpec::new(Sensor::Modis, grid())
            .with_rgb_vis(Some(VisParams::rgb(["R", "G", "Cirrus"], 0.0, 0.3)));
        spec.validate().unwrap();

        let spec = PipelineSpec::new(Sensor::Sentinel2, grid()).without_index();
        assert!(spec.index_vis().is_none());
        spec.validate().unwrap();

        let spec = PipelineSpec::new(Sensor::Modis, grid()).with_archive(Archive::EarthSearch);
        assert!(matches!(spec.validate(), Err(PipelineError::Core(_))));
    }
}
