use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::catalog::{SqlType, TypeFamily};

/// A single cell value read from or written to SQL Server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact numeric (`decimal`, `numeric`, `money`) kept as its digits.
    Decimal(String),
    Text(String),
    Uuid(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(value) => Some(*value),
            SqlValue::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Int(value) => Some(*value as f64),
            SqlValue::Float(value) => Some(*value),
            SqlValue::Decimal(value) => value.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(value) | SqlValue::Uuid(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// String form used for dictionary keys and CSV export.
    ///
    /// Returns `None` for NULL so callers cannot accidentally map NULLs.
    pub fn canonical(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(value) => Some(if *value { "1" } else { "0" }.to_string()),
            SqlValue::Int(value) => Some(value.to_string()),
            SqlValue::Float(value) => Some(value.to_string()),
            SqlValue::Decimal(value) | SqlValue::Text(value) => Some(value.clone()),
            SqlValue::Uuid(value) => Some(value.to_lowercase()),
            SqlValue::Date(value) => Some(value.format("%Y-%m-%d").to_string()),
            SqlValue::Time(value) => Some(value.format("%H:%M:%S%.f").to_string()),
            SqlValue::DateTime(value) => Some(value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        }
    }

    /// Parse text into the value shape `sql_type` stores.
    ///
    /// Used for static values, dictionary entries, and coercion of generated
    /// text. Integer values outside the type's range are rejected.
    pub fn parse_typed(text: &str, sql_type: SqlType) -> Option<SqlValue> {
        let trimmed = text.trim();
        match sql_type.family() {
            TypeFamily::Bool => parse_bool_value(trimmed).map(SqlValue::Bool),
            TypeFamily::Integer => {
                let value = trimmed.parse::<i64>().ok().or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|value| value.fract() == 0.0)
                        .map(|value| value as i64)
                })?;
                let (min, max) = sql_type.integer_range()?;
                (min..=max).contains(&value).then_some(SqlValue::Int(value))
            }
            TypeFamily::Decimal => parse_decimal_value(trimmed).map(SqlValue::Decimal),
            TypeFamily::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(SqlValue::Float),
            TypeFamily::Text => Some(SqlValue::Text(text.to_string())),
            TypeFamily::Date => parse_date_value(trimmed)
                .or_else(|| parse_datetime_value(trimmed).map(|value| value.date()))
                .map(SqlValue::Date),
            TypeFamily::Time => parse_time_value(trimmed).map(SqlValue::Time),
            TypeFamily::DateTime => parse_datetime_value(trimmed)
                .or_else(|| {
                    parse_date_value(trimmed).and_then(|value| value.and_hms_opt(0, 0, 0))
                })
                .map(SqlValue::DateTime),
            TypeFamily::Uuid => {
                is_uuid_text(trimmed).then(|| SqlValue::Uuid(trimmed.to_lowercase()))
            }
        }
    }
}

pub fn parse_bool_value(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

/// Validate exact numeric text: optional sign, digits, optional fraction.
pub fn parse_decimal_value(value: &str) -> Option<String> {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    let valid = !(whole.is_empty() && fraction.is_empty())
        && whole.chars().all(|ch| ch.is_ascii_digit())
        && fraction.chars().all(|ch| ch.is_ascii_digit());
    valid.then(|| value.strip_prefix('+').unwrap_or(value).to_string())
}

pub fn parse_date_value(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_time_value(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .ok()
        .or_else(|| NaiveTime::parse_from_str(value, "%H:%M:%S%.f").ok())
}

pub fn parse_datetime_value(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.naive_utc())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").ok())
}

fn is_uuid_text(value: &str) -> bool {
    value.len() == 36
        && value.char_indices().all(|(idx, ch)| match idx {
            8 | 13 | 18 | 23 => ch == '-',
            _ => ch.is_ascii_hexdigit(),
        })
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
