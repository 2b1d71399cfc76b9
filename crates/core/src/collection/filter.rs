//! Metadata predicates over images

use crate::error::{Error, Result};
use crate::geometry::Rectangle;
use crate::image::Image;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

/// Comparison used by property filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl CompareOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Neq => lhs != rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
        }
    }
}

/// Calendar component compared by [`Filter::CalendarRange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarField {
    Month,
    Year,
    DayOfYear,
}

impl CalendarField {
    fn of(self, t: &DateTime<Utc>) -> i64 {
        match self {
            CalendarField::Month => t.month() as i64,
            CalendarField::Year => t.year() as i64,
            CalendarField::DayOfYear => t.ordinal() as i64,
        }
    }
}

/// Predicate on image metadata.
///
/// An image lacking whatever a filter inspects (timestamp, footprint,
/// property) does not pass it.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `start <= acquired < end`
    DateRange { start: DateTime<Utc>, end: DateTime<Utc> },
    /// Footprint intersects the rectangle
    Bounds(Rectangle),
    Property { name: String, op: CompareOp, value: f64 },
    /// Inclusive on both ends; wraps around when `start > end`
    CalendarRange { start: i64, end: i64, field: CalendarField },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Date range over whole days: `start` inclusive, `end` exclusive
    pub fn date(start: NaiveDate, end: NaiveDate) -> Self {
        Filter::DateRange {
            start: start.and_time(chrono::NaiveTime::MIN).and_utc(),
            end: end.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }

    pub fn bounds(rect: Rectangle) -> Self {
        Filter::Bounds(rect)
    }

    pub fn property(name: impl Into<String>, op: CompareOp, value: f64) -> Self {
        Filter::Property {
            name: name.into(),
            op,
            value,
        }
    }

    pub fn calendar_range(start: i64, end: i64, field: CalendarField) -> Self {
        Filter::CalendarRange { start, end, field }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or(filters)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }

    pub fn matches(&self, image: &Image) -> bool {
        match self {
            Filter::DateRange { start, end } => image
                .acquired()
                .is_some_and(|t| *start <= t && t < *end),
            Filter::Bounds(rect) => image.footprint().is_some_and(|fp| fp.intersects(rect)),
            Filter::Property { name, op, value } => image
                .property(name)
                .is_some_and(|v| op.apply(v, *value)),
            Filter::CalendarRange { start, end, field } => image.acquired().is_some_and(|t| {
                let v = field.of(&t);
                if start <= end {
                    *start <= v && v <= *end
                } else {
                    v >= *start || v <= *end
                }
            }),
            Filter::And(filters) => filters.iter().all(|f| f.matches(image)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(image)),
            Filter::Not(filter) => !filter.matches(image),
        }
    }

    /// Property predicates reachable through `And` nodes only.
    ///
    /// These can be pushed down to a catalog search; everything else must be
    /// evaluated locally.
    pub fn conjunctive_properties(&self) -> Vec<(&str, CompareOp, f64)> {
        match self {
            Filter::Property { name, op, value } => vec![(name.as_str(), *op, *value)],
            Filter::And(filters) => filters
                .iter()
                .flat_map(|f| f.conjunctive_properties())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    /// Parse `"<property> <op> <number>"`, e.g. `"CLOUDY_PIXEL_PERCENTAGE < 20"`.
    fn from_str(s: &str) -> Result<Self> {
        const OPS: [(&str, CompareOp); 7] = [
            ("<=", CompareOp::Lte),
            (">=", CompareOp::Gte),
            ("!=", CompareOp::Neq),
            ("==", CompareOp::Eq),
            ("<", CompareOp::Lt),
            (">", CompareOp::Gt),
            ("=", CompareOp::Eq),
        ];
        let (name, op, rest) = OPS
            .iter()
            .find_map(|(sym, op)| s.split_once(sym).map(|(l, r)| (l, *op, r)))
            .ok_or_else(|| Error::InvalidFilter(s.to_string()))?;

        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::InvalidFilter(s.to_string()));
        }
        let value = rest
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::InvalidFilter(s.to_string()))?;
        Ok(Filter::property(name, op, value))
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::DateRange { start, end } => {
                write!(f, "date in [{}, {})", start.date_naive(), end.date_naive())
            }
            Filter::Bounds(r) => write!(
                f,
                "bounds intersect [{}, {}, {}, {}]",
                r.min_x, r.min_y, r.max_x, r.max_y
            ),
            Filter::Property { name, op, value } => write!(f, "{} {} {}", name, op.symbol(), value),
            Filter::CalendarRange { start, end, field } => {
                write!(f, "{:?} in {}..={}", field, start, end)
            }
            Filter::And(filters) => write_joined(f, filters, " AND "),
            Filter::Or(filters) => write_joined(f, filters, " OR "),
            Filter::Not(filter) => write!(f, "NOT ({})", filter),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, filters: &[Filter], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", filter)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> Image {
        Image::new(format!("{}-{}-{}", y, m, d))
            .with_acquired(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap())
            .with_property("CLOUDY_PIXEL_PERCENTAGE", 12.0)
            .with_footprint(Rectangle::new(-7.0, 53.0, -6.0, 54.0))
    }

    #[test]
    fn parse_property_filter() {
        let f: Filter = "CLOUDY_PIXEL_PERCENTAGE < 20".parse().unwrap();
        assert_eq!(f, Filter::property("CLOUDY_PIXEL_PERCENTAGE", CompareOp::Lt, 20.0));
        let f: Filter = "eo:cloud_cover<=5".parse().unwrap();
        assert_eq!(f, Filter::property("eo:cloud_cover", CompareOp::Lte, 5.0));
        assert!("cloud cover < 20".parse::<Filter>().is_err());
        assert!("CLOUDY < twenty".parse::<Filter>().is_err());
        assert!("no operator".parse::<Filter>().is_err());
    }

    #[test]
    fn property_filters() {
        let img = at(2018, 5, 12);
        assert!(Filter::property("CLOUDY_PIXEL_PERCENTAGE", CompareOp::Lt, 20.0).matches(&img));
        assert!(!Filter::property("CLOUDY_PIXEL_PERCENTAGE", CompareOp::Gt, 20.0).matches(&img));
        // missing property never matches
        assert!(!Filter::property("eo:cloud_cover", CompareOp::Lt, 20.0).matches(&img));
        assert!(!Filter::property("eo:cloud_cover", CompareOp::Neq, 20.0).matches(&img));
    }

    #[test]
    fn date_range_end_is_exclusive() {
        let f = Filter::date(
            NaiveDate::from_ymd_opt(2018, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2018, 6, 30).unwrap(),
        );
        assert!(f.matches(&at(2018, 5, 1)));
        assert!(f.matches(&at(2018, 6, 29)));
        assert!(!f.matches(&at(2018, 6, 30)));
        assert!(!f.matches(&Image::new("undated")));
    }

    #[test]
    fn calendar_range_wraps() {
        let f = Filter::calendar_range(12, 2, CalendarField::Month);
        assert!(f.matches(&at(2017, 12, 5)));
        assert!(f.matches(&at(2018, 2, 28)));
        assert!(!f.matches(&at(2018, 3, 1)));

        let years = Filter::calendar_range(1999, 2018, CalendarField::Year);
        assert!(years.matches(&at(2018, 7, 1)));
        assert!(!years.matches(&at(2019, 1, 1)));
    }

    #[test]
    fn bounds_and_combinators() {
        let ireland = Rectangle::new(-10.5, 51.3, -5.4, 55.4);
        let img = at(2018, 5, 12);
        assert!(Filter::bounds(ireland).matches(&img));
        assert!(!Filter::bounds(Rectangle::new(0.0, 0.0, 1.0, 1.0)).matches(&img));

        let f = Filter::and(vec![
            Filter::bounds(ireland),
            Filter::not(Filter::calendar_range(6, 8, CalendarField::Month)),
        ]);
        assert!(f.matches(&img));
        assert!(!f.matches(&at(2018, 7, 1)));
    }

    #[test]
    fn conjunctive_properties_skip_disjunctions() {
        let f = Filter::and(vec![
            "eo:cloud_cover < 20".parse().unwrap(),
            Filter::or(vec!["a > 1".parse().unwrap()]),
        ]);
        let props = f.conjunctive_properties();
        assert_eq!(props, vec![("eo:cloud_cover", CompareOp::Lt, 20.0)]);
    }
}
