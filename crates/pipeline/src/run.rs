//! Evaluating a [`PipelineSpec`] against an image source.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use verdant_algorithms::composite::composite;
use verdant_algorithms::imagery::threshold_image;
use verdant_algorithms::masking::mask_water;
use verdant_cloud::{load_collection, ImageSource};
use verdant_colormap::{visualize, Legend, SplitView};
use verdant_core::io::{export_image, read_geotiff};
use verdant_core::raster::{resample_nearest, PixelGrid};
use verdant_core::{Image, ImageCollection, Raster, Season};

use crate::error::{PipelineError, Result};
use crate::spec::{CompositeOrder, PipelineSpec};

/// Reduction of one season (or of the whole period)
#[derive(Debug, Clone)]
pub struct PeriodOutput {
    /// `Winter`, `Spring`, ... or the pipeline label
    pub label: String,
    pub season: Option<Season>,
    /// Images that went into the reduction
    pub images: usize,
    /// Standardized bands reduced per pixel
    pub composite: Image,
    /// Index after thresholding
    pub index: Option<Image>,
}

/// What a run wrote
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// `(label, image count)` per period, in evaluation order
    pub periods: Vec<(String, usize)>,
    pub outputs: Vec<PathBuf>,
}

/// A spec bound to the source it reads from.
pub struct Pipeline<'a, S: ImageSource + ?Sized> {
    spec: &'a PipelineSpec,
    source: &'a S,
}

impl<'a, S: ImageSource + ?Sized> Pipeline<'a, S> {
    pub fn new(spec: &'a PipelineSpec, source: &'a S) -> Self {
        Self { spec, source }
    }

    pub fn spec(&self) -> &PipelineSpec {
        self.spec
    }

    /// Load the query onto `grid`, standardize bands and apply the water
    /// mask.
    pub fn load(&self, grid: &PixelGrid) -> Result<ImageCollection> {
        let spec = self.spec;
        let profile = spec.sensor().profile();
        let assets = profile.assets(spec.archive())?;
        let raw = load_collection(self.source, &spec.catalog_query(), &spec.band_assets()?, grid)?;
        info!(
            sensor = %spec.sensor(),
            archive = %spec.archive(),
            images = raw.len(),
            "standardizing collection"
        );
        let standardized = raw.map(|img| profile.standardize_as(img, &assets))?;

        match spec.water_mask() {
            Some(path) => {
                let water = read_water_mask(path, grid)?;
                Ok(standardized.map(|img| mask_water(img, &water))?)
            }
            None => Ok(standardized),
        }
    }

    /// Reduce `collection` for one season, or for all of it.
    pub fn evaluate_period(
        &self,
        collection: &ImageCollection,
        season: Option<Season>,
    ) -> Result<PeriodOutput> {
        let spec = self.spec;
        let (label, subset) = match season {
            Some(s) => (s.title().to_string(), collection.filter(&s.filter())),
            None => (spec.label().to_string(), collection.clone()),
        };
        if subset.is_empty() {
            warn!(period = %label, "no images left after filtering; output will be empty");
        } else {
            debug!(period = %label, images = subset.len(), "reducing");
        }

        let composite_img = composite(&subset, spec.reducer())?;
        let index = match spec.index() {
            None => None,
            Some(index) => {
                let img = match spec.order() {
                    CompositeOrder::CompositeFirst => index.compute(&composite_img)?,
                    CompositeOrder::IndexFirst => {
                        let per_image = subset.map(|img| index.compute(img))?;
                        composite(&per_image, spec.reducer())?
                    }
                };
                Some(match spec.threshold() {
                    Some(range) => threshold_image(&img, range)?,
                    None => img,
                })
            }
        };

        Ok(PeriodOutput {
            label,
            season,
            images: subset.len(),
            composite: composite_img,
            index,
        })
    }

    /// Evaluate every requested period on the working grid.
    pub fn evaluate(&self) -> Result<Vec<PeriodOutput>> {
        self.spec.validate()?;
        let collection = self.load(self.spec.grid())?;
        let seasons = self.spec.seasons();
        if seasons.is_empty() {
            return Ok(vec![self.evaluate_period(&collection, None)?]);
        }
        seasons
            .iter()
            .map(|&s| self.evaluate_period(&collection, Some(s)))
            .collect()
    }

    /// Evaluate and write every output into `out_dir`:
    /// `<Label><Index>.tif` (palette rendering), `<Label>RGB.tif`, and
    /// `<Label><Index>_values.tif` when raw index export is on.
    pub fn run(&self, out_dir: &Path) -> Result<RunReport> {
        let spec = self.spec;
        let export = spec.export();
        if export.cloud_optimized {
            info!("cloud-optimized output requested; writing striped GeoTIFF");
        }

        let mut report = RunReport::default();
        for period in self.evaluate()? {
            report.periods.push((period.label.clone(), period.images));

            if let Some(index) = &period.index {
                let name = format!("{}{}", period.label, index_band(index)?);
                if let Some(vis) = spec.index_vis() {
                    let params = export.renamed(name.clone());
                    let rendered = visualize(&params.prepare(index)?, vis)?;
                    report.outputs.push(rendered.export(&params, out_dir)?);
                }
                if spec.raw_index() {
                    let params = export.renamed(format!("{}_values", name));
                    report.outputs.extend(export_image(index, &params, out_dir)?);
                }
            }

            if let Some(vis) = spec.rgb_vis() {
                let params = export.renamed(format!("{}RGB", period.label));
                let rendered = visualize(&params.prepare(&period.composite)?, vis)?;
                report.outputs.push(rendered.export(&params, out_dir)?);
            }
        }

        for path in &report.outputs {
            info!(path = %path.display(), "written");
        }
        Ok(report)
    }

    /// Render the split view to `png` (plus its JSON sidecar).
    ///
    /// Data are loaded straight onto the view's WGS84 grid, so the catalog
    /// must be in EPSG:4326. Returns the sidecar path.
    pub fn split_view(&self, png: &Path) -> Result<PathBuf> {
        let spec = self.spec;
        spec.validate()?;
        let view_spec = spec.view().cloned().unwrap_or_default();
        let (Some(index_vis), Some(rgb_vis)) = (spec.index_vis(), spec.rgb_vis()) else {
            return Err(PipelineError::Config(
                "split view needs both index and RGB visualization".into(),
            ));
        };

        let mut view = SplitView::new(view_spec.map_view(), view_spec.width, view_spec.height)
            .with_labels(view_spec.left_label.clone(), view_spec.right_label.clone());
        if view_spec.legend {
            view = view.with_legend(Legend::plant_productivity());
        }

        let grid = view.grid()?;
        let collection = self.load(&grid)?;
        let period = self.evaluate_period(&collection, view_spec.season)?;
        let Some(index) = &period.index else {
            return Err(PipelineError::Config("split view needs an index".into()));
        };

        let left = visualize(&period.composite, rgb_vis)?;
        let right = visualize(index, index_vis)?;
        let sidecar = view.save(&left, &right, png)?;
        info!(png = %png.display(), images = period.images, "split view written");
        Ok(sidecar)
    }
}

fn index_band(index: &Image) -> Result<String> {
    index
        .band_names()
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::Config(format!("index image '{}' has no band", index.id())))
}

fn read_water_mask(path: &Path, grid: &PixelGrid) -> Result<Raster<f64>> {
    let raster: Raster<f64> = read_geotiff(path, None)?;
    debug!(path = %path.display(), "read water mask");
    Ok(resample_nearest(&raster, grid)?)
}
