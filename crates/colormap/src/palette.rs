//! Colour palettes and multi-stop interpolation.

use serde::{Deserialize, Serialize};
use std::fmt;
use verdant_core::{Error, Result};

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `"CE7E45"` or `"#ce7e45"`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        let invalid = || Error::InvalidParameter {
            name: "palette",
            value: hex.to_string(),
            reason: "expected a 6-digit hex colour".into(),
        };
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Upper-case hex without `#`
    pub fn to_hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 255]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = Error;

    fn try_from(hex: String) -> Result<Self> {
        Rgb::from_hex(&hex)
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_hex()
    }
}

/// Palette used for vegetation indices, white through brown to dark green.
pub const NDVI_HEX: [&str; 17] = [
    "FFFFFF", "CE7E45", "DF923D", "F1B555", "FCD163", "99B718", "74A901", "66A000", "529400",
    "3E8601", "207401", "056201", "004C00", "023B01", "012E01", "011D01", "011301",
];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

/// Ordered colours spread evenly over `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PaletteSpec", into = "Vec<String>")]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb>) -> Result<Self> {
        if colors.is_empty() {
            return Err(Error::InvalidParameter {
                name: "palette",
                value: "[]".into(),
                reason: "a palette needs at least one colour".into(),
            });
        }
        Ok(Self { colors })
    }

    pub fn from_hex<S: AsRef<str>>(hex: &[S]) -> Result<Self> {
        let colors = hex
            .iter()
            .map(|h| Rgb::from_hex(h.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(colors)
    }

    /// The 17-colour vegetation palette
    pub fn ndvi() -> Self {
        Self {
            colors: NDVI_HEX
                .iter()
                .filter_map(|h| Rgb::from_hex(h).ok())
                .collect(),
        }
    }

    pub fn grayscale() -> Self {
        Self {
            colors: vec![Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)],
        }
    }

    /// Built-in palette by name (`"ndvi"`, `"grayscale"`)
    pub fn named(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ndvi" => Ok(Self::ndvi()),
            "grayscale" | "greyscale" | "gray" | "grey" => Ok(Self::grayscale()),
            _ => Err(Error::InvalidParameter {
                name: "palette",
                value: name.to_string(),
                reason: "unknown palette name".into(),
            }),
        }
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgb> {
        self.colors.get(index).copied()
    }

    /// Colour at `t`; clamps outside `[0, 1]`.
    pub fn evaluate(&self, t: f64) -> Rgb {
        let n = self.colors.len();
        let last = self.colors[n - 1];
        if n == 1 || t >= 1.0 {
            return last;
        }
        if t <= 0.0 || t.is_nan() {
            return self.colors[0];
        }
        let pos = t * (n - 1) as f64;
        let i = (pos.floor() as usize).min(n - 2);
        lerp_color(self.colors[i], self.colors[i + 1], pos - i as f64)
    }
}

/// Palette as written in configuration: a built-in name or a hex list
#[derive(Deserialize)]
#[serde(untagged)]
enum PaletteSpec {
    Named(String),
    Colors(Vec<String>),
}

impl TryFrom<PaletteSpec> for Palette {
    type Error = Error;

    fn try_from(spec: PaletteSpec) -> Result<Self> {
        match spec {
            PaletteSpec::Named(name) => Palette::named(&name),
            PaletteSpec::Colors(hex) => Palette::from_hex(&hex),
        }
    }
}

impl From<Palette> for Vec<String> {
    fn from(p: Palette) -> Self {
        p.colors.iter().map(|c| c.to_hex()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(Rgb::from_hex("CE7E45").unwrap(), Rgb::new(206, 126, 69));
        assert_eq!(Rgb::from_hex("#ce7e45").unwrap(), Rgb::new(206, 126, 69));
        assert!(Rgb::from_hex("CE7E4").is_err());
        assert!(Rgb::from_hex("GG0000").is_err());
        assert_eq!(Rgb::new(1, 46, 1).to_hex(), "012E01");
    }

    #[test]
    fn ndvi_endpoints() {
        let p = Palette::ndvi();
        assert_eq!(p.len(), 17);
        assert_eq!(p.evaluate(0.0), Rgb::from_hex("FFFFFF").unwrap());
        assert_eq!(p.evaluate(1.0), Rgb::from_hex("011301").unwrap());
        // stops sit at i / 16
        assert_eq!(p.evaluate(9.0 / 16.0), Rgb::from_hex("3E8601").unwrap());
    }

    #[test]
    fn midpoint_interpolates() {
        let p = Palette::grayscale();
        assert_eq!(p.evaluate(0.5), Rgb::new(128, 128, 128));
    }

    #[test]
    fn clamping() {
        let p = Palette::ndvi();
        assert_eq!(p.evaluate(-0.5), p.colors()[0]);
        assert_eq!(p.evaluate(1.5), p.colors()[16]);
        assert_eq!(p.evaluate(f64::NAN), p.colors()[0]);
        let single = Palette::from_hex(&["00FF00"]).unwrap();
        assert_eq!(single.evaluate(0.3), Rgb::new(0, 255, 0));
    }

    #[test]
    fn empty_palette_rejected() {
        assert!(Palette::from_hex::<&str>(&[]).is_err());
        assert!(Palette::named("viridis").is_err());
    }
}
