//! LRU cache of decoded band rasters, keyed by asset href.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use verdant_core::Raster;

/// Default number of rasters held.
pub const DEFAULT_CAPACITY: usize = 64;

/// LRU cache storing decoded assets.
pub struct RasterCache {
    inner: LruCache<String, Arc<Raster<f64>>>,
}

impl RasterCache {
    /// Create a new cache with the given capacity (number of rasters).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    pub fn get(&mut self, href: &str) -> Option<Arc<Raster<f64>>> {
        self.inner.get(href).cloned()
    }

    /// Insert a raster, returning the shared handle.
    pub fn insert(&mut self, href: impl Into<String>, raster: Raster<f64>) -> Arc<Raster<f64>> {
        let shared = Arc::new(raster);
        self.inner.put(href.into(), Arc::clone(&shared));
        shared
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl Default for RasterCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
