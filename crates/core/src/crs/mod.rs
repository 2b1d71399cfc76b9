//! Coordinate Reference System handling
//!
//! Verdant never reprojects; a CRS is carried alongside every raster so that
//! mismatches between a catalog item, the working grid and an export request
//! can be detected and reported.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// EPSG codes of geographic (degree-based) systems we recognise.
const GEOGRAPHIC_EPSG: &[u32] = &[4326, 4258, 4269, 4283, 4167, 4617];

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation, kept verbatim when no EPSG code is available
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates in this CRS are longitude/latitude degrees
    pub fn is_geographic(&self) -> bool {
        self.epsg.is_some_and(|c| GEOGRAPHIC_EPSG.contains(&c))
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }
        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", &wkt[..wkt.len().min(50)]);
        }
        "Unknown".to_string()
    }
}

impl FromStr for CRS {
    type Err = Error;

    /// Parse `"EPSG:2157"`, `"epsg:4326"` or a bare code such as `"32629"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = match trimmed.split_once(':') {
            Some((authority, code)) if authority.eq_ignore_ascii_case("epsg") => code,
            Some(_) => {
                return Err(Error::InvalidParameter {
                    name: "crs",
                    value: s.to_string(),
                    reason: "only EPSG codes are supported".into(),
                });
            }
            None => trimmed,
        };
        code.trim()
            .parse::<u32>()
            .map(Self::from_epsg)
            .map_err(|_| Error::InvalidParameter {
                name: "crs",
                value: s.to_string(),
                reason: "expected EPSG:<code>".into(),
            })
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
