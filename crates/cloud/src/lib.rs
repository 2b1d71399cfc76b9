//! # Verdant Cloud
//!
//! Catalog access for Verdant: a STAC Item Search client, on-disk STAC
//! catalogs, and loading catalog items onto a common pixel grid as an
//! [`ImageCollection`](verdant_core::ImageCollection).
//!
//! ## Usage
//!
//! ```ignore
//! use verdant_cloud::{load_collection, BandAsset, CatalogQuery, StacCatalog, StacSource};
//!
//! let catalog = StacSource::new(StacCatalog::EarthSearch, Default::default())?;
//! let query = CatalogQuery::new("sentinel-2-l2a").with_dates(start, end);
//! let bands = [BandAsset::new("B4", "red"), BandAsset::new("B8", "nir")];
//! let images = load_collection(&catalog, &query, &bands, &grid)?;
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod local;
pub mod source;
pub mod stac_client;
pub mod stac_models;
pub mod sync_api;

pub use cache::RasterCache;
pub use error::{CloudError, Result};
pub use http::AssetFetcher;
pub use local::LocalCatalog;
pub use source::{item_metadata, load_collection, BandAsset, CatalogQuery, ImageSource};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacSearchParams};
pub use sync_api::StacSource;

/// Blocking API.
pub mod blocking {
    pub use crate::sync_api::*;
}
