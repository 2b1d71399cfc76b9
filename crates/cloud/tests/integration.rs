//! Loading an on-disk catalog onto a working grid.

use chrono::{NaiveDate, TimeZone, Utc};
use verdant_cloud::{load_collection, BandAsset, CatalogQuery, CloudError, LocalCatalog};
use verdant_core::raster::PixelGrid;
use verdant_core::{
    CalendarField, CompareOp, Filter, GeoTransform, Image, Raster, Rectangle, CRS,
};

const EPSG: u32 = 32629;

fn band(value: f64, cell: f64) -> Raster<f64> {
    let n = (40.0 / cell) as usize;
    let mut r = Raster::filled(n, n, value);
    r.set_transform(GeoTransform::new(500000.0, 6000000.0, cell, -cell));
    r.set_crs(Some(CRS::from_epsg(EPSG)));
    r
}

fn scene(id: &str, month: u32, cloudy: f64) -> Image {
    Image::new(id)
        .with_acquired(Utc.with_ymd_and_hms(2019, month, 5, 11, 0, 0).unwrap())
        .with_property("CLOUDY_PIXEL_PERCENTAGE", cloudy)
        .with_band("B4", band(0.1 * month as f64, 20.0))
        .unwrap()
        .with_band("B8", band(0.5, 20.0))
        .unwrap()
}

fn grid() -> PixelGrid {
    PixelGrid::from_scale(
        &Rectangle::new(500000.0, 5999960.0, 500040.0, 6000000.0),
        10.0,
        Some(CRS::from_epsg(EPSG)),
    )
    .unwrap()
}

fn catalog(dir: &std::path::Path) -> LocalCatalog {
    let images = vec![
        scene("jan", 1, 5.0),
        scene("feb", 2, 80.0),
        scene("jul", 7, 2.0),
        scene("dec", 12, 10.0),
    ];
    let path = LocalCatalog::write(dir, "S2", &images).unwrap();
    LocalCatalog::open(path).unwrap()
}

#[test]
fn loads_and_resamples_onto_grid() {
    let dir = tempfile::tempdir().unwrap();
    let cat = catalog(dir.path());
    let bands = vec![BandAsset::native("B4"), BandAsset::native("B8")];
    let query = CatalogQuery::new("S2").with_dates(
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
    );

    let col = load_collection(&cat, &query, &bands, &grid()).unwrap();
    assert_eq!(col.len(), 4);
    assert_eq!(col.band_names(), ["B4", "B8"]);

    let jul = &col.images()[2];
    assert_eq!(jul.id(), "jul");
    let red = jul.band("B4").unwrap();
    // 20 m source on a 10 m grid
    assert_eq!(red.shape(), (4, 4));
    assert!((red.get(3, 3).unwrap() - 0.7).abs() < 1e-6);
    assert_eq!(jul.property("CLOUDY_PIXEL_PERCENTAGE"), Some(2.0));
}

#[test]
fn local_filters_and_limit() {
    let dir = tempfile::tempdir().unwrap();
    let cat = catalog(dir.path());
    let bands = vec![BandAsset::native("B8")];

    let winter = CatalogQuery::new("S2")
        .with_filter(Filter::or(vec![
            Filter::calendar_range(1, 2, CalendarField::Month),
            Filter::calendar_range(12, 12, CalendarField::Month),
        ]))
        .with_filter(Filter::property("CLOUDY_PIXEL_PERCENTAGE", CompareOp::Lt, 20.0));
    let col = load_collection(&cat, &winter, &bands, &grid()).unwrap();
    let ids: Vec<_> = col.iter().map(|i| i.id().to_string()).collect();
    assert_eq!(ids, ["jan", "dec"]);

    let limited = load_collection(&cat, &CatalogQuery::new("S2").with_limit(1), &bands, &grid())
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn bands_are_named_apart_from_asset_keys() {
    let dir = tempfile::tempdir().unwrap();
    let cat = catalog(dir.path());
    let bands = vec![BandAsset::new("red", "B4"), BandAsset::new("nir08", "B8")];
    let col = load_collection(&cat, &CatalogQuery::new("S2"), &bands, &grid()).unwrap();
    assert_eq!(col.len(), 4);
    assert_eq!(col.band_names(), ["red", "nir08"]);
    let jan = &col.images()[0];
    assert!((jan.band("red").unwrap().get(0, 0).unwrap() - 0.1).abs() < 1e-6);
    assert!(jan.band("B4").is_err());
}

#[test]
fn items_without_band_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut images = vec![scene("jan", 1, 5.0), scene("jul", 7, 2.0)];
    images[1] = images[1]
        .clone()
        .with_band("B2", band(0.05, 20.0))
        .unwrap();
    let path = LocalCatalog::write(dir.path(), "S2", &images).unwrap();
    let cat = LocalCatalog::open(path).unwrap();

    let bands = vec![BandAsset::native("B2"), BandAsset::native("B8")];
    let col = load_collection(&cat, &CatalogQuery::new("S2"), &bands, &grid()).unwrap();
    let ids: Vec<_> = col.iter().map(|i| i.id().to_string()).collect();
    assert_eq!(ids, ["jul"]);
    assert_eq!(col.band_names(), ["B2", "B8"]);
}

#[test]
fn wrong_asset_keys_fail_instead_of_loading_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let cat = catalog(dir.path());
    let bands = vec![BandAsset::native("red")];
    let err = load_collection(&cat, &CatalogQuery::new("S2"), &bands, &grid()).unwrap_err();
    assert!(matches!(err, CloudError::Catalog(_)), "{}", err);
    assert!(err.to_string().contains("red"));

    // nothing matching is still an empty collection
    let none = CatalogQuery::new("S2").with_filter(Filter::calendar_range(
        2000,
        2001,
        CalendarField::Year,
    ));
    assert!(load_collection(&cat, &none, &bands, &grid()).unwrap().is_empty());
}

#[test]
fn crs_mismatch_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let cat = catalog(dir.path());
    let wgs = PixelGrid::from_scale(&Rectangle::new(0.0, 0.0, 1.0, 1.0), 0.5, Some(CRS::wgs84()))
        .unwrap();
    let bands = vec![BandAsset::native("B8")];
    assert!(load_collection(&cat, &CatalogQuery::new("S2"), &bands, &wgs).is_err());
}
