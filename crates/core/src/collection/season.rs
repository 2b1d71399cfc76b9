//! Fixed calendar-month seasons

use super::filter::{CalendarField, Filter};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Meteorological seasons of the northern hemisphere
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Autumn];

    pub fn months(self) -> [u32; 3] {
        match self {
            Season::Winter => [12, 1, 2],
            Season::Spring => [3, 4, 5],
            Season::Summer => [6, 7, 8],
            Season::Autumn => [9, 10, 11],
        }
    }

    /// Calendar filter selecting this season's months of any year
    pub fn filter(self) -> Filter {
        match self {
            Season::Winter => Filter::or(vec![
                Filter::calendar_range(1, 2, CalendarField::Month),
                Filter::calendar_range(12, 12, CalendarField::Month),
            ]),
            Season::Spring => Filter::calendar_range(3, 5, CalendarField::Month),
            Season::Summer => Filter::calendar_range(6, 8, CalendarField::Month),
            Season::Autumn => Filter::calendar_range(9, 11, CalendarField::Month),
        }
    }

    /// Capitalised name used in export descriptions ("WinterNDVI")
    pub fn title(self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title().to_lowercase())
    }
}

impl FromStr for Season {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" | "fall" => Ok(Season::Autumn),
            _ => Err(Error::InvalidParameter {
                name: "season",
                value: s.to_string(),
                reason: "expected winter, spring, summer or autumn".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Image;
    use chrono::{TimeZone, Utc};

    fn in_month(year: i32, month: u32) -> Image {
        Image::new("x").with_acquired(Utc.with_ymd_and_hms(year, month, 15, 0, 0, 0).unwrap())
    }

    #[test]
    fn winter_keeps_dec_jan_feb_of_any_year() {
        let winter = Season::Winter.filter();
        for year in [1999, 2013, 2018] {
            for month in 1..=12 {
                assert_eq!(
                    winter.matches(&in_month(year, month)),
                    matches!(month, 12 | 1 | 2),
                    "month {}",
                    month
                );
            }
        }
    }

    #[test]
    fn seasons_partition_the_year() {
        for month in 1..=12 {
            let img = in_month(2018, month);
            let hits = Season::ALL.iter().filter(|s| s.filter().matches(&img)).count();
            assert_eq!(hits, 1);
            let owner = Season::ALL.iter().find(|s| s.months().contains(&month)).unwrap();
            assert!(owner.filter().matches(&img));
        }
    }

    #[test]
    fn parse_names() {
        assert_eq!("Winter".parse::<Season>().unwrap(), Season::Winter);
        assert_eq!("fall".parse::<Season>().unwrap(), Season::Autumn);
        assert!("monsoon".parse::<Season>().is_err());
    }
}
