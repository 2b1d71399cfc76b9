//! # Verdant Pipeline
//!
//! Seasonal composites and vegetation indices, end to end.
//!
//! A [`PipelineSpec`] is an immutable description (sensor, catalog query,
//! working grid, seasons, reducer, index, threshold, visualization and
//! export settings). Nothing is read until a [`Pipeline`] binds it to an
//! [`ImageSource`](verdant_cloud::ImageSource) and runs it.
//!
//! ```ignore
//! use verdant_pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load_from_path(Path::new("jigsaw.toml"))?;
//! let spec = config.to_spec()?;
//! let source = config.open_source()?;
//! let report = Pipeline::new(&spec, source.as_ref()).run(&config.output_dir())?;
//! ```

pub mod config;
pub mod error;
pub mod run;
pub mod spec;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use run::{PeriodOutput, Pipeline, RunReport};
pub use spec::{CompositeOrder, PipelineSpec, ViewSpec};
