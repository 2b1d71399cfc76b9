//! Pipeline files.
//!
//! A pipeline is described in TOML:
//!
//! ```toml
//! [source]
//! sensor = "sentinel2"
//! catalog = "local"            # or "earth-search", "planetary-computer", a STAC URL
//! # archive = "earth-search"   # asset keys; derived from `catalog` by default
//! path = "catalog.json"
//! start = "2019-01-01"
//! end = "2020-01-01"
//! filters = ["CLOUDY_PIXEL_PERCENTAGE < 20"]
//!
//! [grid]
//! crs = "EPSG:2157"
//! bbox = [560000.0, 700000.0, 760000.0, 960000.0]
//! scale = 100.0
//!
//! [composite]
//! reducer = "median"
//! order = "index_first"
//!
//! [visualization.index]
//! bands = ["NDVI"]
//! min = 0.2
//! max = 0.9
//! palette = "ndvi"
//!
//! [export]
//! dimensions = "24x40"
//! ```
//!
//! Relative paths are resolved against the directory of the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use verdant_algorithms::composite::Reducer;
use verdant_algorithms::imagery::{SpectralIndex, ThresholdRange};
use verdant_algorithms::sensor::{Archive, Sensor};
use verdant_cloud::{ImageSource, LocalCatalog, StacCatalog, StacClientOptions, StacSource};
use verdant_colormap::VisParams;
use verdant_core::io::{Dimensions, ExportParams};
use verdant_core::raster::PixelGrid;
use verdant_core::{Filter, Rectangle, Season, CRS};

use crate::error::{PipelineError, Result};
use crate::spec::{CompositeOrder, PipelineSpec, ViewSpec};

/// Output directory when neither the file nor the caller names one
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub grid: GridConfig,
    #[serde(default)]
    pub composite: CompositeConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<ViewSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub sensor: Sensor,
    #[serde(default = "default_catalog")]
    pub catalog: String,
    /// How the catalog keys band assets; follows `catalog` unless given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<Archive>,
    /// Catalog file for `catalog = "local"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Defaults to the sensor's collection id (STAC id for remote catalogs)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    /// Property predicates such as `"CLOUDY_PIXEL_PERCENTAGE < 20"`
    #[serde(default)]
    pub filters: Vec<String>,
    /// `[first, last]`; `[]` lifts the sensor's default years
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_mask: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

fn default_catalog() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub crs: String,
    /// Working extent; defaults to the source bbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub reducer: Reducer,
    pub order: CompositeOrder,
    /// Defaults to all four; `[]` reduces the whole period
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seasons: Option<Vec<Season>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    #[default]
    Ndvi,
    Evi,
    Expression,
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub kind: IndexKind,
    /// Output band name of an expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Expression variable -> band
    pub bands: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub enabled: bool,
    pub min: f64,
    pub max: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let range = ThresholdRange::default();
        Self {
            enabled: true,
            min: range.min,
            max: range.max,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<VisParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb: Option<VisParams>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pixels: Option<u64>,
    pub cloud_optimized: bool,
    /// Also write float index values
    pub raw_index: bool,
}

fn rect(b: [f64; 4]) -> Result<Rectangle> {
    Ok(Rectangle::from_slice(&b)?)
}

fn resolve(base: &Path, p: &mut Option<PathBuf>) {
    if let Some(path) = p.as_mut()
        && path.is_relative()
    {
        *path = base.join(&*path);
    }
}

impl PipelineConfig {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a pipeline file, resolving relative paths against its directory.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        resolve(base, &mut config.source.path);
        resolve(base, &mut config.source.water_mask);
        resolve(base, &mut config.export.dir);
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    fn is_local(&self) -> bool {
        self.source.catalog.eq_ignore_ascii_case("local")
    }

    /// Asset layout of the configured catalog. Custom STAC APIs are assumed
    /// to use the common band names Earth Search uses.
    pub fn archive(&self) -> Archive {
        if let Some(archive) = self.source.archive {
            return archive;
        }
        if self.is_local() {
            return Archive::Native;
        }
        match StacCatalog::from_str_or_url(&self.source.catalog) {
            StacCatalog::PlanetaryComputer => Archive::PlanetaryComputer,
            StacCatalog::EarthSearch | StacCatalog::Custom(_) => Archive::EarthSearch,
        }
    }

    /// Where outputs go unless the caller overrides it
    pub fn output_dir(&self) -> PathBuf {
        self.export
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
    }

    /// Open the configured catalog.
    pub fn open_source(&self) -> Result<Box<dyn ImageSource>> {
        if self.is_local() {
            let path = self.source.path.as_ref().ok_or_else(|| {
                PipelineError::Config("[source] path is required for a local catalog".into())
            })?;
            return Ok(Box::new(LocalCatalog::open(path)?));
        }
        let mut options = StacClientOptions::default();
        // the limit counts images after local filtering
        if let Some(limit) = self.source.limit {
            options.max_items = options.max_items.max(limit);
        }
        let catalog = StacCatalog::from_str_or_url(&self.source.catalog);
        Ok(Box::new(StacSource::new(catalog, options)?))
    }

    fn working_grid(&self) -> Result<PixelGrid> {
        let g = &self.grid;
        let crs: CRS = g.crs.parse()?;
        let bbox = g.bbox.or(self.source.bbox).ok_or_else(|| {
            PipelineError::Config("[grid] bbox or [source] bbox is required".into())
        })?;
        let region = rect(bbox)?;
        match (&g.dimensions, g.scale) {
            (Some(dims), _) => {
                let (cols, rows) = dims.parse::<Dimensions>()?.resolve(&region);
                Ok(PixelGrid::from_dimensions(&region, cols, rows, Some(crs))?)
            }
            (None, Some(scale)) => Ok(PixelGrid::from_scale(&region, scale, Some(crs))?),
            (None, None) => Err(PipelineError::Config(
                "[grid] needs scale or dimensions".into(),
            )),
        }
    }

    fn spectral_index(&self) -> Result<Option<SpectralIndex>> {
        let cfg = &self.index;
        Ok(match cfg.kind {
            IndexKind::None => None,
            IndexKind::Ndvi => Some(SpectralIndex::Ndvi),
            IndexKind::Evi => Some(SpectralIndex::evi()),
            IndexKind::Expression => {
                let formula = cfg.expression.clone().ok_or_else(|| {
                    PipelineError::Config("[index] expression is required".into())
                })?;
                Some(SpectralIndex::Expression {
                    name: cfg.name.clone().unwrap_or_else(|| "index".to_string()),
                    formula,
                    bands: cfg.bands.clone(),
                })
            }
        })
    }

    fn export_params(&self) -> Result<ExportParams> {
        let e = &self.export;
        let mut params = ExportParams::new("verdant").with_cloud_optimized(e.cloud_optimized);
        if let Some(scale) = e.scale {
            params = params.with_scale(scale);
        }
        if let Some(dims) = &e.dimensions {
            params = params.with_dimensions(dims.parse()?);
        }
        if let Some(crs) = &e.crs {
            params = params.with_crs(crs.parse()?);
        }
        if let Some(region) = e.region {
            params = params.with_region(rect(region)?);
        }
        if let Some(max) = e.max_pixels {
            params = params.with_max_pixels(max);
        }
        Ok(params)
    }

    /// Build the immutable spec this file describes.
    pub fn to_spec(&self) -> Result<PipelineSpec> {
        let src = &self.source;
        let profile = src.sensor.profile();
        let mut spec = PipelineSpec::new(src.sensor, self.working_grid()?);

        let collection = match (&src.collection, self.is_local()) {
            (Some(c), _) => c.clone(),
            (None, true) => profile.collection.to_string(),
            (None, false) => profile.stac_collection.to_string(),
        };
        spec = spec.with_collection(collection).with_archive(self.archive());

        if let (Some(start), Some(end)) = (src.start, src.end)
            && start >= end
        {
            return Err(PipelineError::Config(format!(
                "[source] start {} is not before end {}",
                start, end
            )));
        }
        spec = spec.with_date_bounds(src.start, src.end);
        if let Some(b) = src.bbox {
            spec = spec.with_bbox(rect(b)?);
        }
        for f in &src.filters {
            spec = spec.with_filter(f.parse::<Filter>()?);
        }
        if let Some(years) = &src.years {
            spec = match years.as_slice() {
                [] => spec.with_years(None),
                [first, last] if first <= last => spec.with_years(Some((*first, *last))),
                _ => {
                    return Err(PipelineError::Config(format!(
                        "[source] years must be [] or [first, last], got {:?}",
                        years
                    )));
                }
            };
        }
        if let Some(limit) = src.limit {
            spec = spec.with_limit(limit);
        }
        if let Some(path) = &src.water_mask {
            spec = spec.with_water_mask(path.clone());
        }

        let comp = &self.composite;
        spec = spec.with_reducer(comp.reducer).with_order(comp.order);
        if let Some(seasons) = &comp.seasons {
            spec = spec.with_seasons(seasons.clone());
        }
        if let Some(label) = &comp.label {
            spec = spec.with_label(label.clone());
        }

        spec = match self.spectral_index()? {
            Some(index) => spec.with_index(index),
            None => spec.without_index(),
        };
        spec = spec.with_threshold(if self.threshold.enabled {
            Some(ThresholdRange::new(self.threshold.min, self.threshold.max)?)
        } else {
            None
        });
        if let Some(vis) = &self.visualization.index {
            spec = spec.with_index_vis(Some(vis.clone()));
        }
        if let Some(vis) = &self.visualization.rgb {
            spec = spec.with_rgb_vis(Some(vis.clone()));
        }

        spec = spec
            .with_export(self.export_params()?)
            .with_raw_index(self.export.raw_index);
        if let Some(view) = &self.view {
            spec = spec.with_view(view.clone());
        }

        spec.validate()?;
        Ok(spec)
    }
}
