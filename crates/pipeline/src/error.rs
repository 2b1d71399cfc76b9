//! Error types for pipeline configuration and evaluation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] verdant_core::Error),

    #[error(transparent)]
    Cloud(#[from] verdant_cloud::CloudError),

    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    #[error("cannot parse pipeline file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("cannot encode pipeline file: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
