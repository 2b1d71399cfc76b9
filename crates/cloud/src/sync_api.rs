//! Blocking STAC access.
//!
//! Wraps the async [`StacClient`] and [`AssetFetcher`] with a
//! current-thread Tokio runtime so callers don't need their own.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use verdant_core::io::read_geotiff_from_buffer;
use verdant_core::Raster;

use crate::cache::RasterCache;
use crate::error::{CloudError, Result};
use crate::http::AssetFetcher;
use crate::source::{CatalogQuery, ImageSource};
use crate::stac_client::{StacCatalog, StacClient, StacClientOptions};
use crate::stac_models::StacItem;

/// A remote STAC API as an [`ImageSource`].
///
/// Decoded assets are cached by their unsigned href.
pub struct StacSource {
    rt: tokio::runtime::Runtime,
    client: StacClient,
    fetcher: AssetFetcher,
    cache: Mutex<RasterCache>,
}

impl StacSource {
    pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(e.to_string()))?;
        let max_retries = options.max_retries;
        let client = StacClient::new(catalog, options)?;
        let fetcher = AssetFetcher::new(client.http().clone(), max_retries);
        Ok(Self {
            rt,
            client,
            fetcher,
            cache: Mutex::new(RasterCache::default()),
        })
    }

    /// Replace the asset cache with one holding `capacity` rasters.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Mutex::new(RasterCache::new(capacity));
        self
    }

    pub fn catalog(&self) -> &StacCatalog {
        self.client.catalog()
    }

    /// Download the bytes of asset `key` of `item`.
    pub fn download(&self, item: &StacItem, key: &str) -> Result<Vec<u8>> {
        self.rt.block_on(async {
            let href = self.client.asset_href(item, key).await?;
            self.fetcher.fetch(&href).await
        })
    }

    fn cache(&self) -> Result<MutexGuard<'_, RasterCache>> {
        self.cache
            .lock()
            .map_err(|_| CloudError::Catalog("raster cache lock poisoned".into()))
    }
}

impl ImageSource for StacSource {
    fn search(&self, query: &CatalogQuery) -> Result<Vec<StacItem>> {
        self.rt.block_on(self.client.search_query(query))
    }

    fn read_asset(&self, item: &StacItem, key: &str) -> Result<Arc<Raster<f64>>> {
        self.read_assets(item, &[key])?
            .pop()
            .ok_or_else(|| CloudError::MissingAsset {
                item: item.id.clone(),
                key: key.to_string(),
            })
    }

    /// Uncached assets are downloaded concurrently.
    fn read_assets(&self, item: &StacItem, keys: &[&str]) -> Result<Vec<Arc<Raster<f64>>>> {
        let hrefs = keys
            .iter()
            .map(|key| {
                item.asset(key)
                    .map(|a| a.href.clone())
                    .ok_or_else(|| CloudError::MissingAsset {
                        item: item.id.clone(),
                        key: key.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rasters: Vec<Option<Arc<Raster<f64>>>> = {
            let mut cache = self.cache()?;
            hrefs.iter().map(|href| cache.get(href)).collect()
        };
        let wanted: Vec<usize> = (0..keys.len()).filter(|&i| rasters[i].is_none()).collect();
        debug!(
            item = %item.id,
            cached = keys.len() - wanted.len(),
            downloads = wanted.len(),
            "reading assets"
        );

        if !wanted.is_empty() {
            let bodies = self.rt.block_on(async {
                let mut urls = Vec::with_capacity(wanted.len());
                for &i in &wanted {
                    urls.push(self.client.asset_href(item, keys[i]).await?);
                }
                self.fetcher.fetch_all(&urls).await
            })?;
            let mut cache = self.cache()?;
            for (i, bytes) in wanted.into_iter().zip(bodies) {
                let raster: Raster<f64> = read_geotiff_from_buffer(&bytes, None)?;
                rasters[i] = Some(cache.insert(hrefs[i].clone(), raster));
            }
        }

        rasters
            .into_iter()
            .zip(keys)
            .map(|(raster, key)| {
                raster.ok_or_else(|| CloudError::MissingAsset {
                    item: item.id.clone(),
                    key: key.to_string(),
                })
            })
            .collect()
    }
}
