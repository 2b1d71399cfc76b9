//! Catalog queries and loading items onto a common pixel grid.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use verdant_core::raster::{resample_nearest, PixelGrid};
use verdant_core::{Filter, Image, ImageCollection, Raster, Rectangle, CRS};

use crate::error::{CloudError, Result};
use crate::stac_models::{StacItem, StacSearchParams};

/// What to fetch from a catalog.
///
/// `collection`, dates, `bbox` and property predicates reachable through
/// `And` are sent to the catalog; every filter is also re-checked locally,
/// so calendar ranges and `Or`/`Not` trees work against any source.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub collection: String,
    /// Inclusive
    pub start: Option<NaiveDate>,
    /// Exclusive
    pub end: Option<NaiveDate>,
    pub bbox: Option<Rectangle>,
    pub filters: Vec<Filter>,
    /// Maximum number of images after local filtering
    pub limit: Option<usize>,
}

impl CatalogQuery {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            start: None,
            end: None,
            bbox: None,
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_bbox(mut self, bbox: Rectangle) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// STAC interval string; open ends are `..`
    pub fn datetime(&self) -> Option<String> {
        if self.start.is_none() && self.end.is_none() {
            return None;
        }
        let fmt = |d: Option<NaiveDate>| {
            d.map(|d| format!("{}T00:00:00Z", d))
                .unwrap_or_else(|| "..".to_string())
        };
        Some(format!("{}/{}", fmt(self.start), fmt(self.end)))
    }

    /// Body of the `POST /search` request for this query.
    pub fn to_search_params(&self) -> StacSearchParams {
        let mut params = StacSearchParams::new().collections(&[self.collection.as_str()]);
        if let Some(b) = &self.bbox {
            params = params.bbox(b.min_x, b.min_y, b.max_x, b.max_y);
        }
        if let Some(dt) = self.datetime() {
            params = params.datetime(&dt);
        }
        for filter in &self.filters {
            for (name, op, value) in filter.conjunctive_properties() {
                params = params.query(name, op, value);
            }
        }
        params
    }

    /// Everything this query asks of an image, as one predicate.
    pub fn local_filter(&self) -> Filter {
        let mut all = Vec::new();
        if self.start.is_some() || self.end.is_some() {
            let day = |d: NaiveDate| d.and_time(chrono::NaiveTime::MIN).and_utc();
            all.push(Filter::DateRange {
                start: self.start.map(day).unwrap_or(DateTime::<Utc>::MIN_UTC),
                end: self.end.map(day).unwrap_or(DateTime::<Utc>::MAX_UTC),
            });
        }
        if let Some(b) = self.bbox {
            all.push(Filter::bounds(b));
        }
        all.extend(self.filters.iter().cloned());
        Filter::and(all)
    }
}

/// A band to load and the item asset holding it.
///
/// Archives publish the same band under different keys (`B04`, `red`), so
/// the loaded image is named by `band` and the item is read at `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandAsset {
    pub band: String,
    pub key: String,
}

impl BandAsset {
    pub fn new(band: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            band: band.into(),
            key: key.into(),
        }
    }

    /// A band stored under its own name
    pub fn native(band: impl Into<String>) -> Self {
        let band = band.into();
        Self {
            key: band.clone(),
            band,
        }
    }
}

/// A catalog that can list items and read their band assets.
pub trait ImageSource {
    /// Candidate items for `query`. Sources may over-return; the caller
    /// applies [`CatalogQuery::local_filter`].
    fn search(&self, query: &CatalogQuery) -> Result<Vec<StacItem>>;

    /// Decode one asset of `item` as a float raster.
    fn read_asset(&self, item: &StacItem, key: &str) -> Result<Arc<Raster<f64>>>;

    /// Decode several assets of `item`, in the order of `keys`.
    fn read_assets(&self, item: &StacItem, keys: &[&str]) -> Result<Vec<Arc<Raster<f64>>>> {
        keys.iter().map(|key| self.read_asset(item, key)).collect()
    }
}

/// Band-less image carrying an item's id, time, footprint and numeric
/// properties.
pub fn item_metadata(item: &StacItem) -> Image {
    let mut image = Image::new(item.id.clone());
    if let Some(t) = item.acquired() {
        image = image.with_acquired(t);
    }
    if let Some(fp) = item.footprint() {
        image = image.with_footprint(fp);
    }
    for (name, value) in item.numeric_properties() {
        image = image.with_property(name, value);
    }
    image
}

/// Search `source` and load `bands` of every matching item, resampled onto
/// `grid`.
///
/// Items lacking one of the assets are skipped with a warning; if every
/// matching item is skipped the asset keys are wrong for this catalog and
/// loading fails. Rasters without a CRS take the item's `proj:epsg`.
pub fn load_collection<S: ImageSource + ?Sized>(
    source: &S,
    query: &CatalogQuery,
    bands: &[BandAsset],
    grid: &PixelGrid,
) -> Result<ImageCollection> {
    let items = source.search(query)?;
    let filter = query.local_filter();
    info!(
        collection = %query.collection,
        candidates = items.len(),
        "catalog search complete"
    );

    let names = bands.iter().map(|b| b.band.clone()).collect();
    let mut collection = ImageCollection::new(grid.clone(), names);
    let mut skipped = 0;
    let mut missing_keys: Vec<String> = Vec::new();
    for item in &items {
        if query.limit.is_some_and(|n| collection.len() >= n) {
            break;
        }
        let meta = item_metadata(item);
        if !filter.matches(&meta) {
            debug!(item = %item.id, "rejected by local filter");
            continue;
        }
        match load_item(source, item, meta, bands, grid) {
            Ok(image) => collection.push(image)?,
            Err(CloudError::MissingAsset { item, key }) => {
                warn!(%item, %key, "skipping item without band");
                skipped += 1;
                if !missing_keys.contains(&key) {
                    missing_keys.push(key);
                }
            }
            Err(e) => return Err(e),
        }
    }

    if collection.is_empty() && skipped > 0 {
        return Err(CloudError::Catalog(format!(
            "all {} matching items of '{}' lack assets {:?}",
            skipped, query.collection, missing_keys
        )));
    }

    info!(images = collection.len(), "collection loaded");
    Ok(collection)
}

fn load_item<S: ImageSource + ?Sized>(
    source: &S,
    item: &StacItem,
    mut image: Image,
    bands: &[BandAsset],
    grid: &PixelGrid,
) -> Result<Image> {
    if let Some(missing) = bands.iter().find(|b| item.asset(&b.key).is_none()) {
        return Err(CloudError::MissingAsset {
            item: item.id.clone(),
            key: missing.key.clone(),
        });
    }
    let keys: Vec<&str> = bands.iter().map(|b| b.key.as_str()).collect();
    let rasters = source.read_assets(item, &keys)?;
    for (band, raster) in bands.iter().zip(rasters) {
        let resampled = match (raster.crs(), item.epsg()) {
            (None, Some(code)) => {
                let mut tagged = (*raster).clone();
                tagged.set_crs(Some(CRS::from_epsg(code)));
                resample_nearest(&tagged, grid)?
            }
            _ => resample_nearest(&raster, grid)?,
        };
        image = image.with_band(band.band.clone(), resampled)?;
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use verdant_core::CompareOp;

    #[test]
    fn search_params_from_query() {
        let q = CatalogQuery::new("sentinel-2-l2a")
            .with_dates(
                NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            )
            .with_bbox(Rectangle::new(-7.0, 53.0, -6.0, 54.0))
            .with_filter(Filter::property("eo:cloud_cover", CompareOp::Lt, 20.0))
            .with_filter(Filter::or(vec![Filter::property("gsd", CompareOp::Eq, 10.0)]));
        let json = serde_json::to_value(q.to_search_params()).unwrap();
        assert_eq!(json["collections"], serde_json::json!(["sentinel-2-l2a"]));
        assert_eq!(json["datetime"], "2019-01-01T00:00:00Z/2020-01-01T00:00:00Z");
        assert_eq!(json["bbox"], serde_json::json!([-7.0, 53.0, -6.0, 54.0]));
        // only the conjunctive predicate is pushed down
        assert_eq!(json["query"], serde_json::json!({"eo:cloud_cover": {"lt": 20.0}}));
    }

    #[test]
    fn open_ended_interval() {
        let mut q = CatalogQuery::new("c");
        assert!(q.datetime().is_none());
        q.start = NaiveDate::from_ymd_opt(2018, 6, 1);
        assert_eq!(q.datetime().unwrap(), "2018-06-01T00:00:00Z/..");
    }

    #[test]
    fn local_filter_checks_dates_bounds_and_predicates() {
        let q = CatalogQuery::new("c")
            .with_dates(
                NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2019, 2, 1).unwrap(),
            )
            .with_bbox(Rectangle::new(0.0, 0.0, 1.0, 1.0))
            .with_filter(Filter::property("CLOUDY_PIXEL_PERCENTAGE", CompareOp::Lt, 20.0));
        let f = q.local_filter();

        let ok = Image::new("a")
            .with_acquired(Utc.with_ymd_and_hms(2019, 1, 15, 0, 0, 0).unwrap())
            .with_footprint(Rectangle::new(0.5, 0.5, 2.0, 2.0))
            .with_property("CLOUDY_PIXEL_PERCENTAGE", 5.0);
        assert!(f.matches(&ok));
        assert!(!f.matches(&ok.clone().with_property("CLOUDY_PIXEL_PERCENTAGE", 50.0)));
        assert!(!f.matches(
            &ok.clone()
                .with_acquired(Utc.with_ymd_and_hms(2019, 2, 1, 0, 0, 0).unwrap())
        ));
        assert!(!f.matches(&ok.with_footprint(Rectangle::new(5.0, 5.0, 6.0, 6.0))));
    }
}
