//! End-to-end runs over an on-disk catalog written to a temp dir.

use std::path::Path;

use approx::assert_abs_diff_eq;
use chrono::{TimeZone, Utc};
use verdant_cloud::LocalCatalog;
use verdant_core::io::read_geotiff;
use verdant_core::{GeoTransform, Image, Raster, Season, CRS};
use verdant_pipeline::{Pipeline, PipelineConfig};

/// 20 x 20 pixels of 0.001 degrees around the Dublin view centre
fn band(value: f64) -> Raster<f64> {
    let mut r = Raster::filled(20, 20, value);
    r.set_transform(GeoTransform::new(-6.145, 53.304, 0.001, -0.001));
    r.set_crs(Some(CRS::wgs84()));
    r
}

/// Sentinel-2 scene in stored units (reflectance x 10000)
fn scene(id: &str, month: u32, day: u32, nir: f64, cloudy: f64) -> Image {
    let bands = [
        ("B2", 500.0),
        ("B3", 800.0),
        ("B4", 1000.0),
        ("B8", nir),
        ("B11", 2000.0),
        ("B12", 1500.0),
        ("QA60", 0.0),
    ];
    let mut image = Image::new(id)
        .with_acquired(Utc.with_ymd_and_hms(2019, month, day, 11, 0, 0).unwrap())
        .with_property("CLOUDY_PIXEL_PERCENTAGE", cloudy);
    for (name, value) in bands {
        image = image.with_band(name, band(value)).unwrap();
    }
    image
}

fn with_cloud_at_origin(image: Image) -> Image {
    let mut qa = image.band("QA60").unwrap().clone();
    // the target pixel centre sits on a source pixel corner
    for (row, col) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
        qa.set(row, col, 1024.0).unwrap();
    }
    let bands = image
        .bands()
        .map(|(n, r)| (n.to_string(), if n == "QA60" { qa.clone() } else { r.clone() }))
        .collect();
    image.replace_bands(bands)
}

fn write_catalog(dir: &Path, with_winter: bool) -> std::path::PathBuf {
    let mut images = vec![
        scene("apr", 4, 10, 4000.0, 5.0),
        with_cloud_at_origin(scene("jul-a", 7, 3, 5000.0, 5.0)),
        scene("jul-b", 7, 20, 3000.0, 8.0),
        // rejected by the cloud-percentage filter
        scene("jul-cloudy", 7, 25, 9000.0, 90.0),
        scene("oct", 10, 2, 2500.0, 1.0),
    ];
    if with_winter {
        images.insert(0, scene("jan", 1, 15, 1100.0, 2.0));
    }
    LocalCatalog::write(&dir.join("catalog"), "COPERNICUS/S2", &images).unwrap()
}

fn config(catalog: &Path, composite: &str) -> PipelineConfig {
    let text = format!(
        r#"
[source]
sensor = "sentinel2"
path = "{}"
start = "2019-01-01"
end = "2020-01-01"
filters = ["CLOUDY_PIXEL_PERCENTAGE < 20"]

[grid]
crs = "EPSG:4326"
bbox = [-6.145, 53.284, -6.125, 53.304]
dimensions = "10x10"

[composite]
{}

[export]
raw_index = true

[view]
width = 64
height = 48
season = "summer"
"#,
        catalog.display(),
        composite
    );
    PipelineConfig::parse(&text).unwrap()
}

fn summer_ndvi(cfg: &PipelineConfig) -> (f64, f64) {
    let spec = cfg.to_spec().unwrap();
    let source = cfg.open_source().unwrap();
    let periods = Pipeline::new(&spec, source.as_ref()).evaluate().unwrap();
    let summer = periods
        .iter()
        .find(|p| p.season == Some(Season::Summer))
        .unwrap();
    assert_eq!(summer.images, 2);
    let ndvi = summer.index.as_ref().unwrap().band("NDVI").unwrap();
    (ndvi.get(0, 0).unwrap(), ndvi.get(5, 5).unwrap())
}

#[test]
fn composite_then_index() {
    let dir = tempfile::tempdir().unwrap();
    let cat = write_catalog(dir.path(), true);
    let (cloudy_px, clear_px) = summer_ndvi(&config(&cat, r#"order = "composite_first""#));
    // median NIR of 0.5 and 0.3 is 0.4
    assert_abs_diff_eq!(clear_px, (0.4 - 0.1) / (0.4 + 0.1), epsilon = 1e-6);
    // the QA-flagged pixel only sees jul-b
    assert_abs_diff_eq!(cloudy_px, 0.5, epsilon = 1e-6);
}

#[test]
fn index_then_composite() {
    let dir = tempfile::tempdir().unwrap();
    let cat = write_catalog(dir.path(), true);
    let (cloudy_px, clear_px) = summer_ndvi(&config(&cat, r#"order = "index_first""#));
    assert_abs_diff_eq!(clear_px, (2.0 / 3.0 + 0.5) / 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(cloudy_px, 0.5, epsilon = 1e-6);
}

#[test]
fn run_writes_seasonal_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let cat = write_catalog(dir.path(), true);
    let cfg = config(&cat, "");
    let spec = cfg.to_spec().unwrap();
    let source = cfg.open_source().unwrap();
    let out = dir.path().join("out");

    let report = Pipeline::new(&spec, source.as_ref()).run(&out).unwrap();
    let counts: Vec<_> = report.periods.iter().map(|(l, n)| (l.as_str(), *n)).collect();
    assert_eq!(
        counts,
        [("Winter", 1), ("Spring", 1), ("Summer", 2), ("Autumn", 1)]
    );
    for name in ["WinterNDVI", "SpringRGB", "SummerNDVI", "AutumnRGB", "SummerNDVI_values"] {
        assert!(out.join(format!("{}.tif", name)).exists(), "{} missing", name);
    }

    // winter NDVI (0.11 - 0.1) / 0.21 is below the 0.1 threshold
    let winter: Raster<f64> = read_geotiff(out.join("WinterNDVI_values.tif"), None).unwrap();
    assert!(winter.get(5, 5).unwrap().is_nan());
    // its rendering is transparent there
    let alpha: Raster<f64> = read_geotiff(out.join("WinterNDVI.tif"), Some(3)).unwrap();
    assert_eq!(alpha.get(5, 5).unwrap(), 0.0);

    let autumn: Raster<f64> = read_geotiff(out.join("AutumnNDVI_values.tif"), None).unwrap();
    assert_abs_diff_eq!(autumn.get(5, 5).unwrap(), 0.15 / 0.35, epsilon = 1e-6);
    assert_eq!(autumn.crs().and_then(|c| c.epsg()), Some(4326));
}

#[test]
fn empty_season_still_exports() {
    let dir = tempfile::tempdir().unwrap();
    let cat = write_catalog(dir.path(), false);
    let cfg = config(&cat, r#"seasons = ["winter"]"#);
    let spec = cfg.to_spec().unwrap();
    let source = cfg.open_source().unwrap();
    let out = dir.path().join("out");

    let report = Pipeline::new(&spec, source.as_ref()).run(&out).unwrap();
    assert_eq!(report.periods, vec![("Winter".to_string(), 0)]);
    let ndvi: Raster<f64> = read_geotiff(out.join("WinterNDVI_values.tif"), None).unwrap();
    assert_eq!(ndvi.shape(), (10, 10));
    assert!(ndvi.data().iter().all(|v| v.is_nan()));
}

#[test]
fn split_view_renders_png_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let cat = write_catalog(dir.path(), true);
    let cfg = config(&cat, "");
    let spec = cfg.to_spec().unwrap();
    let source = cfg.open_source().unwrap();
    let png = dir.path().join("view").join("split.png");

    let sidecar = Pipeline::new(&spec, source.as_ref()).split_view(&png).unwrap();
    assert!(png.exists());
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(sidecar).unwrap()).unwrap();
    assert_eq!(json["size"], serde_json::json!([64, 48]));
    assert_eq!(json["left"]["label"], "Visual Image");
    assert_eq!(json["legend"]["title"], "Plant Productivity");
}
