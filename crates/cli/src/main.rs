//! Verdant CLI - seasonal vegetation-index composites from satellite imagery

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use verdant_algorithms::imagery::{evi, ndvi, EviParams};
use verdant_algorithms::masking::qa_mask;
use verdant_algorithms::sensor::Sensor;
use verdant_colormap::Legend;
use verdant_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use verdant_core::Raster;
use verdant_pipeline::{Pipeline, PipelineConfig};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "verdant")]
#[command(author, version, about = "Seasonal vegetation-index composites", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Normalized Difference Vegetation Index
    Ndvi {
        /// NIR band file
        #[arg(long)]
        nir: PathBuf,
        /// Red band file
        #[arg(long)]
        red: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Enhanced Vegetation Index
    Evi {
        /// NIR band file
        #[arg(long)]
        nir: PathBuf,
        /// Red band file
        #[arg(long)]
        red: PathBuf,
        /// Blue band file
        #[arg(long)]
        blue: PathBuf,
        /// Output file
        output: PathBuf,
        /// Gain factor
        #[arg(long, default_value = "2.5")]
        gain: f64,
        /// Aerosol coefficient for the red band
        #[arg(long, default_value = "6.0")]
        c1: f64,
        /// Aerosol coefficient for the blue band
        #[arg(long, default_value = "7.5")]
        c2: f64,
        /// Canopy background adjustment
        #[arg(long, default_value = "1.0")]
        l: f64,
    },
    /// Clear-sky mask from a QA band (1 = clear, 0 = cloudy)
    QaMask {
        /// QA band file
        #[arg(long)]
        qa: PathBuf,
        /// Sensor that produced the QA band (sentinel2, landsat457, landsat8, modis)
        #[arg(long)]
        sensor: String,
        /// Output file
        output: PathBuf,
        /// Write cloudy pixels as NaN instead of 0
        #[arg(long)]
        nan: bool,
    },
    /// Run a pipeline file and export every season
    Run {
        /// Pipeline TOML file
        pipeline: PathBuf,
        /// Output directory (overrides [export] dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render the side-by-side RGB / index map of a pipeline
    SplitView {
        /// Pipeline TOML file
        pipeline: PathBuf,
        /// Output PNG (default: <output dir>/split_view.png)
        output: Option<PathBuf>,
    },
    /// Print the plant productivity legend
    Legend {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set default subscriber")?;
    Ok(())
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn load_pipeline(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load_from_path(path)
        .with_context(|| format!("Failed to load pipeline {}", path.display()))
}

/// Clear pixels become 1; cloudy pixels 0 (or NaN). Invalid QA samples count as cloudy.
fn mask_raster(qa: &Raster<f64>, sensor: Sensor, nan: bool) -> Raster<f64> {
    let mask = qa_mask(qa, sensor.profile().qa_mask);
    let cloudy = if nan { f64::NAN } else { 0.0 };
    let mut out: Raster<f64> = qa.with_same_meta(qa.rows(), qa.cols());
    *out.data_mut() = mask.data().mapv(|clear| if clear { 1.0 } else { cloudy });
    if nan {
        out.set_nodata(Some(f64::NAN));
    }
    out
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            if !raster.is_empty() {
                println!(
                    "  Valid cells: {} ({:.1}%)",
                    stats.valid_count,
                    100.0 * stats.valid_count as f64 / raster.len() as f64
                );
            }
        }

        Commands::Ndvi { nir, red, output } => {
            let nir_r = read_raster(&nir)?;
            let red_r = read_raster(&red)?;
            let start = Instant::now();
            let result = ndvi(&nir_r, &red_r).context("Failed to calculate NDVI")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("NDVI", &output, elapsed);
        }

        Commands::Evi {
            nir,
            red,
            blue,
            output,
            gain,
            c1,
            c2,
            l,
        } => {
            let nir_r = read_raster(&nir)?;
            let red_r = read_raster(&red)?;
            let blue_r = read_raster(&blue)?;
            let params = EviParams { g: gain, c1, c2, l };
            let start = Instant::now();
            let result =
                evi(&nir_r, &red_r, &blue_r, params).context("Failed to calculate EVI")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("EVI", &output, elapsed);
        }

        Commands::QaMask {
            qa,
            sensor,
            output,
            nan,
        } => {
            let sensor: Sensor = sensor.parse().context("Unknown sensor")?;
            let qa_r = read_raster(&qa)?;
            let start = Instant::now();
            let result = mask_raster(&qa_r, sensor, nan);
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("QA mask", &output, elapsed);
        }

        Commands::Run { pipeline, output } => {
            let config = load_pipeline(&pipeline)?;
            let out_dir = output.unwrap_or_else(|| config.output_dir());
            let spec = config.to_spec().context("Invalid pipeline")?;
            let source = config.open_source().context("Failed to open catalog")?;

            let pb = spinner("Running pipeline...");
            let start = Instant::now();
            let report = Pipeline::new(&spec, source.as_ref())
                .run(&out_dir)
                .context("Pipeline failed")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            for (label, images) in &report.periods {
                println!("{}: {} images", label, images);
            }
            if report.outputs.is_empty() {
                warn!("no outputs written; enable [visualization] or [export] raw_index");
            }
            for path in &report.outputs {
                println!("  {}", path.display());
            }
            done("Pipeline", &out_dir, elapsed);
        }

        Commands::SplitView { pipeline, output } => {
            let config = load_pipeline(&pipeline)?;
            let png = output.unwrap_or_else(|| config.output_dir().join("split_view.png"));
            let spec = config.to_spec().context("Invalid pipeline")?;
            let source = config.open_source().context("Failed to open catalog")?;

            let pb = spinner("Rendering split view...");
            let start = Instant::now();
            let sidecar = Pipeline::new(&spec, source.as_ref())
                .split_view(&png)
                .context("Failed to render split view")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            println!("Metadata: {}", sidecar.display());
            done("Split view", &png, elapsed);
        }

        Commands::Legend { json } => {
            let legend = Legend::plant_productivity();
            if json {
                println!("{}", serde_json::to_string_pretty(&legend)?);
            } else {
                println!("{}", legend.title);
                for row in &legend.rows {
                    println!("  {}  {}", row.color, row.label);
                }
            }
        }
    }

    Ok(())
}
