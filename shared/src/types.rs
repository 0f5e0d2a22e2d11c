//! Common types used across the workbench

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Surface form of period dates (`31.01.2024`)
pub const PERIOD_DATE_FORMAT: &str = "%d.%m.%Y";

/// Placeholder shown wherever a product name cannot be determined
pub const NO_DATA_LABEL: &str = "Veri Yok";

/// A single table cell
///
/// Serialized untagged, so a row reads naturally as JSON:
/// `Missing` is `null`, numbers are numbers and text is a string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Convert an arbitrary JSON value into a cell.
    ///
    /// Booleans, arrays and objects have no cell form of their own and are
    /// kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Cell::Missing,
            serde_json::Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Missing),
            serde_json::Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(n) => n.is_nan(),
            Cell::Text(_) => false,
        }
    }

    /// Text rendering used for labels; `None` for missing cells
    pub fn as_label(&self) -> Option<Cow<'_, str>> {
        match self {
            Cell::Missing => None,
            Cell::Number(n) if n.is_nan() => None,
            Cell::Number(n) => Some(Cow::Owned(format_number(*n))),
            Cell::Text(s) => Some(Cow::Borrowed(s.as_str())),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_label() {
            Some(label) => f.write_str(&label),
            None => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Missing)
    }
}

/// Integral values print without a fractional part
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse a `DD.MM.YYYY` period date
pub fn parse_period_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), PERIOD_DATE_FORMAT).ok()
}

/// Render a period date in its `DD.MM.YYYY` surface form
pub fn format_period_date(date: NaiveDate) -> String {
    date.format(PERIOD_DATE_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp.
///
/// Offset-carrying values are converted to UTC; naive values (as written by
/// older history files) are taken to already be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Serde adapter for optional `DD.MM.YYYY` dates.
///
/// An absent date is written as an empty string; unparsable input reads back
/// as `None` instead of failing the whole record.
pub mod period_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&super::format_period_date(*d)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_period_date))
    }
}

/// Serde adapter for optional ISO-8601 timestamps, same leniency as `period_date`
pub mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_json_forms() {
        assert_eq!(Cell::from_json(&serde_json::json!(null)), Cell::Missing);
        assert_eq!(Cell::from_json(&serde_json::json!(12.5)), Cell::Number(12.5));
        assert_eq!(Cell::from_json(&serde_json::json!("x")), Cell::Text("x".into()));
        assert_eq!(Cell::from_json(&serde_json::json!(true)), Cell::Text("true".into()));
    }

    #[test]
    fn test_cell_serializes_untagged() {
        let cells = vec![Cell::Missing, Cell::Number(3.0), Cell::Text("a".into())];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,3.0,"a"]"#);
        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn test_cell_labels() {
        assert_eq!(Cell::Number(42.0).to_string(), "42");
        assert_eq!(Cell::Number(1.5).to_string(), "1.5");
        assert_eq!(Cell::Missing.as_label(), None);
        assert!(Cell::Number(f64::NAN).is_missing());
    }

    #[test]
    fn test_period_date_round_trip() {
        let date = parse_period_date("05.03.2024").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(format_period_date(date), "05.03.2024");
        assert!(parse_period_date("2024-03-05").is_none());
    }

    #[test]
    fn test_parse_timestamp_accepts_naive_and_offset() {
        let naive = parse_timestamp("2024-03-05T10:15:30.123456").unwrap();
        let utc = parse_timestamp("2024-03-05T10:15:30.123456Z").unwrap();
        assert_eq!(naive, utc);
        let offset = parse_timestamp("2024-03-05T13:15:30.123456+03:00").unwrap();
        assert_eq!(offset, utc);
        assert!(parse_timestamp("yesterday").is_none());
    }
}
