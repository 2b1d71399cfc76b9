//! Error types for catalog access and image loading.

use thiserror::Error;

/// Errors produced while searching catalogs and loading assets.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("invalid catalog: {0}")]
    Catalog(String),

    #[error("asset '{key}' not found in item '{item}'")]
    MissingAsset { item: String, key: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core error: {0}")]
    Core(#[from] verdant_core::Error),
}

/// Result alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
