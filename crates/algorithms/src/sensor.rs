//! Sensor profiles: band tables, QA masks and reflectance scaling

use crate::imagery::scale_bands;
use crate::masking::{mask_clouds, QaMask};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use verdant_core::image::Image;
use verdant_core::{Error, Result};

/// Canonical name of the quality band after standardization
pub const QA_BAND: &str = "pixel_qa";

const CANONICAL: &[&str] = &["B", "G", "R", "NIR", "SWIR1", "SWIR2", QA_BAND];

/// Supported sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Sentinel2,
    Landsat457,
    Landsat8,
    Modis,
}

/// Where scene assets are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Archive {
    /// Assets keyed by native band name (local catalogs)
    #[default]
    Native,
    /// Element 84 Earth Search, also used for custom STAC APIs
    EarthSearch,
    PlanetaryComputer,
}

impl Archive {
    pub fn name(self) -> &'static str {
        match self {
            Archive::Native => "native",
            Archive::EarthSearch => "earth-search",
            Archive::PlanetaryComputer => "planetary-computer",
        }
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How one archive publishes a sensor's bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetTable {
    pub archive: Archive,
    /// `(native band, asset key)` pairs
    pub keys: &'static [(&'static str, &'static str)],
    pub qa_mask: QaMask,
    /// Reflectance is `stored * scale + offset`
    pub scale: f64,
    pub offset: f64,
}

impl AssetTable {
    /// Asset key holding a native band
    pub fn asset_key<'a>(&self, native: &'a str) -> Option<&'a str> {
        if self.archive == Archive::Native {
            return Some(native);
        }
        self.keys.iter().find(|(n, _)| *n == native).map(|(_, k)| *k)
    }
}

/// Static description of how a sensor's products are read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorProfile {
    pub sensor: Sensor,
    /// Catalog collection id
    pub collection: &'static str,
    /// Matching collection on STAC APIs
    pub stac_collection: &'static str,
    /// Native band names, positionally matched to `canonical_bands`
    pub native_bands: &'static [&'static str],
    pub canonical_bands: &'static [&'static str],
    pub qa_mask: QaMask,
    /// Multiplier turning stored values into surface reflectance
    pub scale: f64,
    /// Years for which the archive holds data (inclusive)
    pub years: Option<(i32, i32)>,
    /// Asset layouts on the STAC archives that publish this sensor
    pub stac: &'static [AssetTable],
}

const S2_EARTH_SEARCH: &[(&str, &str)] = &[
    ("B2", "blue"),
    ("B3", "green"),
    ("B4", "red"),
    ("B8", "nir"),
    ("B11", "swir16"),
    ("B12", "swir22"),
    ("QA60", "scl"),
];

const S2_PLANETARY: &[(&str, &str)] = &[
    ("B2", "B02"),
    ("B3", "B03"),
    ("B4", "B04"),
    ("B8", "B08"),
    ("B11", "B11"),
    ("B12", "B12"),
    ("QA60", "SCL"),
];

const L457_C2: &[(&str, &str)] = &[
    ("B1", "blue"),
    ("B2", "green"),
    ("B3", "red"),
    ("B4", "nir08"),
    ("B5", "swir16"),
    ("B7", "swir22"),
    ("pixel_qa", "qa_pixel"),
];

const L8_C2: &[(&str, &str)] = &[
    ("B2", "blue"),
    ("B3", "green"),
    ("B4", "red"),
    ("B5", "nir08"),
    ("B6", "swir16"),
    ("B7", "swir22"),
    ("pixel_qa", "qa_pixel"),
];

const MODIS_PLANETARY: &[(&str, &str)] = &[
    ("sur_refl_b01", "sur_refl_b01"),
    ("sur_refl_b02", "sur_refl_b02"),
    ("sur_refl_b03", "sur_refl_b03"),
    ("sur_refl_b04", "sur_refl_b04"),
    ("sur_refl_b05", "sur_refl_b05"),
    ("sur_refl_b06", "sur_refl_b06"),
    ("sur_refl_b07", "sur_refl_b07"),
    ("QC_500m", "sur_refl_qc_500m"),
];

const fn c2_table(archive: Archive, keys: &'static [(&'static str, &'static str)]) -> AssetTable {
    AssetTable {
        archive,
        keys,
        qa_mask: QaMask::LandsatC2,
        scale: 0.0000275,
        offset: -0.2,
    }
}

const fn s2_table(archive: Archive, keys: &'static [(&'static str, &'static str)]) -> AssetTable {
    AssetTable {
        archive,
        keys,
        qa_mask: QaMask::SentinelScl,
        scale: 0.0001,
        offset: 0.0,
    }
}

const SENTINEL2: SensorProfile = SensorProfile {
    sensor: Sensor::Sentinel2,
    collection: "COPERNICUS/S2",
    stac_collection: "sentinel-2-l2a",
    native_bands: &["B2", "B3", "B4", "B8", "B11", "B12", "QA60"],
    canonical_bands: CANONICAL,
    qa_mask: QaMask::Sentinel2,
    scale: 0.0001,
    years: None,
    stac: &[
        s2_table(Archive::EarthSearch, S2_EARTH_SEARCH),
        s2_table(Archive::PlanetaryComputer, S2_PLANETARY),
    ],
};

const LANDSAT457: SensorProfile = SensorProfile {
    sensor: Sensor::Landsat457,
    collection: "LANDSAT/LE07/C01/T1_SR",
    stac_collection: "landsat-c2-l2",
    native_bands: &["B1", "B2", "B3", "B4", "B5", "B7", "pixel_qa"],
    canonical_bands: CANONICAL,
    qa_mask: QaMask::Landsat457,
    scale: 0.0001,
    years: Some((1999, 2018)),
    stac: &[
        c2_table(Archive::EarthSearch, L457_C2),
        c2_table(Archive::PlanetaryComputer, L457_C2),
    ],
};

const LANDSAT8: SensorProfile = SensorProfile {
    sensor: Sensor::Landsat8,
    collection: "LANDSAT/LC08/C01/T1_SR",
    stac_collection: "landsat-c2-l2",
    native_bands: &["B2", "B3", "B4", "B5", "B6", "B7", "pixel_qa"],
    canonical_bands: CANONICAL,
    qa_mask: QaMask::Landsat8,
    scale: 0.0001,
    years: Some((2013, 2019)),
    stac: &[
        c2_table(Archive::EarthSearch, L8_C2),
        c2_table(Archive::PlanetaryComputer, L8_C2),
    ],
};

const MODIS: SensorProfile = SensorProfile {
    sensor: Sensor::Modis,
    collection: "MODIS/006/MOD09GA",
    stac_collection: "modis-09A1-061",
    native_bands: &[
        "sur_refl_b01",
        "sur_refl_b02",
        "sur_refl_b03",
        "sur_refl_b04",
        "sur_refl_b05",
        "sur_refl_b06",
        "sur_refl_b07",
        "QC_500m",
    ],
    canonical_bands: &["R", "NIR", "B", "G", "Cirrus", "SWIR1", "SWIR2", QA_BAND],
    qa_mask: QaMask::None,
    scale: 0.0001,
    years: None,
    stac: &[AssetTable {
        archive: Archive::PlanetaryComputer,
        keys: MODIS_PLANETARY,
        qa_mask: QaMask::None,
        scale: 0.0001,
        offset: 0.0,
    }],
};

impl Sensor {
    pub const ALL: [Sensor; 4] = [
        Sensor::Sentinel2,
        Sensor::Landsat457,
        Sensor::Landsat8,
        Sensor::Modis,
    ];

    pub fn profile(self) -> &'static SensorProfile {
        match self {
            Sensor::Sentinel2 => &SENTINEL2,
            Sensor::Landsat457 => &LANDSAT457,
            Sensor::Landsat8 => &LANDSAT8,
            Sensor::Modis => &MODIS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Sensor::Sentinel2 => "sentinel2",
            Sensor::Landsat457 => "landsat457",
            Sensor::Landsat8 => "landsat8",
            Sensor::Modis => "modis",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sensor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "sentinel2" | "s2" => Ok(Sensor::Sentinel2),
            "landsat457" | "landsat7" | "landsat5" | "landsat4" | "l7" | "etm" => {
                Ok(Sensor::Landsat457)
            }
            "landsat8" | "l8" | "oli" => Ok(Sensor::Landsat8),
            "modis" => Ok(Sensor::Modis),
            _ => Err(Error::InvalidParameter {
                name: "sensor",
                value: s.to_string(),
                reason: "expected sentinel2, landsat457, landsat8 or modis".into(),
            }),
        }
    }
}

impl SensorProfile {
    /// Native band name behind a canonical one
    pub fn native_name(&self, canonical: &str) -> Option<&'static str> {
        self.canonical_bands
            .iter()
            .position(|b| *b == canonical)
            .map(|i| self.native_bands[i])
    }

    /// Native name of the QA band
    pub fn qa_band(&self) -> &'static str {
        self.native_name(QA_BAND).unwrap_or(QA_BAND)
    }

    /// Asset layout of this sensor on `archive`
    pub fn assets(&self, archive: Archive) -> Result<AssetTable> {
        if archive == Archive::Native {
            return Ok(AssetTable {
                archive,
                keys: &[],
                qa_mask: self.qa_mask,
                scale: self.scale,
                offset: 0.0,
            });
        }
        self.stac
            .iter()
            .find(|t| t.archive == archive)
            .copied()
            .ok_or_else(|| Error::InvalidParameter {
                name: "archive",
                value: archive.to_string(),
                reason: format!("{} is not published there", self.sensor),
            })
    }

    /// `(native band, asset key)` for every band read from `archive`
    pub fn band_assets(&self, archive: Archive) -> Result<Vec<(&'static str, &'static str)>> {
        let table = self.assets(archive)?;
        self.native_bands
            .iter()
            .map(|native| {
                table
                    .asset_key(*native)
                    .map(|key| (*native, key))
                    .ok_or_else(|| Error::InvalidParameter {
                        name: "band",
                        value: native.to_string(),
                        reason: format!("no {} asset for {}", archive, self.sensor),
                    })
            })
            .collect()
    }

    /// Rename to canonical bands, mask clouds, then scale to reflectance.
    ///
    /// The QA band keeps its raw integer values.
    pub fn standardize(&self, image: &Image) -> Result<Image> {
        self.standardize_as(image, &self.assets(Archive::Native)?)
    }

    /// [`standardize`](Self::standardize) with the QA semantics and scaling of
    /// the archive the scene was read from
    pub fn standardize_as(&self, image: &Image, table: &AssetTable) -> Result<Image> {
        let renamed = image.select_as(self.native_bands, self.canonical_bands)?;
        let masked = mask_clouds(&renamed, table.qa_mask, QA_BAND)?;
        scale_bands(&masked, table.scale, table.offset, &[QA_BAND])
    }
}

/// Standardize `image` with the profile of `sensor`
pub fn standardize(image: &Image, sensor: Sensor) -> Result<Image> {
    sensor.profile().standardize(image)
}
