//! On-disk STAC catalogs.
//!
//! A catalog is a single ItemCollection JSON file. Asset hrefs are paths
//! relative to that file (absolute paths and `file://` URLs also work), each
//! pointing at a single-band GeoTIFF.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use verdant_core::io::{read_geotiff, write_geotiff};
use verdant_core::{Image, Raster};

use crate::cache::RasterCache;
use crate::error::{CloudError, Result};
use crate::source::{CatalogQuery, ImageSource};
use crate::stac_models::{StacAsset, StacItem, StacItemCollection, StacItemProperties};

/// File name used by [`LocalCatalog::write`].
pub const CATALOG_FILE: &str = "catalog.json";

const GEOTIFF_MEDIA_TYPE: &str = "image/tiff; application=geotiff";

/// A STAC ItemCollection on the local filesystem.
pub struct LocalCatalog {
    path: PathBuf,
    root: PathBuf,
    items: StacItemCollection,
    cache: Mutex<RasterCache>,
}

impl LocalCatalog {
    /// Load the catalog file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let text = std::fs::read_to_string(&path)?;
        let items: StacItemCollection = serde_json::from_str(&text)?;
        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        info!(path = %path.display(), items = items.len(), "opened local catalog");
        Ok(Self {
            path,
            root,
            items,
            cache: Mutex::new(RasterCache::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[StacItem] {
        &self.items.features
    }

    /// Filesystem path of an asset href.
    pub fn resolve(&self, href: &str) -> PathBuf {
        let href = href.strip_prefix("file://").unwrap_or(href);
        let p = Path::new(href);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Write `images` as a catalog under `dir`: one GeoTIFF per band at
    /// `<id>/<band>.tif` and the item list in [`CATALOG_FILE`].
    ///
    /// Returns the catalog file path.
    pub fn write(dir: &Path, collection: &str, images: &[Image]) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let mut features = Vec::with_capacity(images.len());

        for image in images {
            let item_dir = dir.join(image.id());
            std::fs::create_dir_all(&item_dir)?;

            let mut assets = HashMap::new();
            for (name, raster) in image.bands() {
                let file = format!("{}.tif", name);
                write_geotiff(raster, item_dir.join(&file), None)?;
                assets.insert(
                    name.to_string(),
                    StacAsset {
                        href: format!("{}/{}", image.id(), file),
                        type_: Some(GEOTIFF_MEDIA_TYPE.to_string()),
                        title: Some(name.to_string()),
                        roles: Some(vec!["data".to_string()]),
                        extra: HashMap::new(),
                    },
                );
            }

            let mut extra = HashMap::new();
            for (k, v) in image.properties() {
                extra.insert(k.clone(), serde_json::json!(v));
            }
            if let Some(code) = image.grid().and_then(|g| g.crs).and_then(|c| c.epsg()) {
                extra.insert("proj:epsg".to_string(), serde_json::json!(code));
            }

            features.push(StacItem {
                type_: "Feature".to_string(),
                id: image.id().to_string(),
                geometry: None,
                bbox: image.footprint().map(|r| r.to_vec()),
                properties: StacItemProperties {
                    datetime: image.acquired().map(|t| t.to_rfc3339()),
                    eo_cloud_cover: None,
                    platform: None,
                    constellation: None,
                    gsd: None,
                    extra,
                },
                assets,
                collection: Some(collection.to_string()),
                links: Vec::new(),
            });
        }

        let path = dir.join(CATALOG_FILE);
        let json = serde_json::to_string_pretty(&StacItemCollection::new(features))?;
        std::fs::write(&path, json)?;
        info!(path = %path.display(), items = images.len(), "wrote local catalog");
        Ok(path)
    }
}

impl ImageSource for LocalCatalog {
    /// Items of the query's collection; an item without a collection id
    /// belongs to every collection.
    fn search(&self, query: &CatalogQuery) -> Result<Vec<StacItem>> {
        Ok(self
            .items()
            .iter()
            .filter(|item| {
                item.collection
                    .as_deref()
                    .is_none_or(|c| c == query.collection)
            })
            .cloned()
            .collect())
    }

    fn read_asset(&self, item: &StacItem, key: &str) -> Result<Arc<Raster<f64>>> {
        let asset = item.asset(key).ok_or_else(|| CloudError::MissingAsset {
            item: item.id.clone(),
            key: key.to_string(),
        })?;

        let mut cache = self
            .cache
            .lock()
            .map_err(|_| CloudError::Catalog("raster cache lock poisoned".into()))?;
        if let Some(hit) = cache.get(&asset.href) {
            return Ok(hit);
        }
        let path = self.resolve(&asset.href);
        debug!(path = %path.display(), "reading asset");
        let raster: Raster<f64> = read_geotiff(&path, None)?;
        Ok(cache.insert(asset.href.clone(), raster))
    }
}
