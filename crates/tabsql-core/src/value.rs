//! Tagged cell values.
//!
//! Every cell of a [`Dataset`](crate::Dataset) carries one of these variants.
//! The tag is fixed when the value is built and travels unchanged through
//! inference, statement synthesis and parameter binding.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Fractional second digits kept when staging samples for type inference.
pub const STAGING_FRACTION_DIGITS: usize = 3;

/// Fractional second digits the engine stores for `TIME` and `DATETIME2`.
pub const STORAGE_FRACTION_DIGITS: usize = 7;

/// Text tokens that stand for a missing value in loosely typed input.
const NULL_TOKENS: &[&str] = &["", "none", "nan", "nat", "<na>", "null"];

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean, stored as `BIT`.
    Bool(bool),
    /// Unsigned 8-bit integer, stored as `TINYINT`.
    TinyInt(u8),
    /// 16-bit integer.
    SmallInt(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    BigInt(i64),
    /// Double precision float.
    Float(f64),
    /// Time of day.
    Time(NaiveTime),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
    /// Text.
    Text(String),
}

impl Value {
    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as an `i64` if it is an integer or boolean.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::TinyInt(i) => Some(i64::from(*i)),
            Self::SmallInt(i) => Some(i64::from(*i)),
            Self::Int(i) => Some(i64::from(*i)),
            Self::BigInt(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as an `f64` if it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    /// Returns the text if this is [`Value::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text form written into the inference scratch table.
    ///
    /// Null-like tokens collapse to `None`, text is trimmed, integer-valued
    /// floats lose their `.0` and temporal values keep at most
    /// [`STAGING_FRACTION_DIGITS`] fractional digits.
    #[must_use]
    pub fn staging_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) => {
                let trimmed = s.trim();
                if NULL_TOKENS.contains(&trimmed.to_ascii_lowercase().as_str()) {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Self::Float(f) if f.is_nan() => None,
            Self::Time(_) | Self::DateTime(_) => self
                .temporal_text(STAGING_FRACTION_DIGITS)
                .map(|(text, _)| text),
            other => Some(other.to_string()),
        }
    }

    /// The value with text trimmed, and with null-like tokens and NaN as
    /// [`Value::Null`], the same way samples are staged for inference.
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::Text(_) => self.staging_text().map_or(Self::Null, Self::Text),
            Self::Float(f) if f.is_nan() => Self::Null,
            other => other.clone(),
        }
    }

    /// Text form of a temporal value and whether precision was dropped.
    ///
    /// Returns `None` for non-temporal values.
    #[must_use]
    pub fn temporal_text(&self, fraction_digits: usize) -> Option<(String, bool)> {
        match self {
            Self::Time(t) => {
                let (fraction, truncated) = fraction(t.nanosecond(), fraction_digits);
                Some((format!("{}{fraction}", t.format("%H:%M:%S")), truncated))
            }
            Self::Date(d) => Some((d.format("%Y-%m-%d").to_string(), false)),
            Self::DateTime(dt) => {
                let (fraction, truncated) = fraction(dt.nanosecond(), fraction_digits);
                Some((
                    format!("{}{fraction}", dt.format("%Y-%m-%d %H:%M:%S")),
                    truncated,
                ))
            }
            _ => None,
        }
    }

    /// Character length of the value's text form.
    #[must_use]
    pub fn char_len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Text(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        }
    }

    /// Returns true when the text form needs a national character type.
    #[must_use]
    pub fn is_national(&self) -> bool {
        matches!(self, Self::Text(s) if !s.is_ascii())
    }
}

/// Renders `.ddd` for the kept digits, trimming trailing zeros.
fn fraction(nanos: u32, digits: usize) -> (String, bool) {
    // leap seconds are reported as nanos >= 1e9
    let nanos = nanos % 1_000_000_000;
    let digits = digits.min(9);
    let step = 10u32.pow(u32::try_from(9 - digits).unwrap_or(0));
    let kept = nanos - nanos % step;
    let truncated = kept != nanos;
    if kept == 0 {
        return (String::new(), truncated);
    }
    let text = format!(".{kept:09}");
    (text.trim_end_matches('0').to_string(), truncated)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::TinyInt(i) => write!(f, "{i}"),
            Self::SmallInt(i) => write!(f, "{i}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::BigInt(i) => write!(f, "{i}"),
            Self::Float(x) => {
                let text = x.to_string();
                write!(f, "{}", text.strip_suffix(".0").unwrap_or(&text))
            }
            Self::Text(s) => write!(f, "{s}"),
            temporal => {
                let (text, _) = temporal.temporal_text(9).unwrap_or_default();
                write!(f, "{text}")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn staging_collapses_null_tokens() {
        for token in ["", "  ", "None", "nan", "NaT", "<NA>", "null"] {
            assert_eq!(Value::from(token).staging_text(), None, "{token:?}");
        }
        assert_eq!(Value::Null.staging_text(), None);
        assert_eq!(Value::Float(f64::NAN).staging_text(), None);
        assert_eq!(Value::from(" a b ").staging_text().as_deref(), Some("a b"));
    }

    #[test]
    fn normalized_matches_staging() {
        assert_eq!(Value::from(" None ").normalized(), Value::Null);
        assert_eq!(Value::from(" y ").normalized(), Value::from("y"));
        assert_eq!(Value::Float(f64::NAN).normalized(), Value::Null);
        assert_eq!(Value::Float(2.0).normalized(), Value::Float(2.0));
    }

    #[test]
    fn staging_strips_float_zero_fraction() {
        assert_eq!(Value::Float(3.0).staging_text().as_deref(), Some("3"));
        assert_eq!(Value::Float(3.25).staging_text().as_deref(), Some("3.25"));
        assert_eq!(Value::Bool(true).staging_text().as_deref(), Some("1"));
    }

    #[test]
    fn staging_truncates_fractional_seconds() {
        let value = Value::DateTime(datetime("2024-01-02 03:04:05.123456789"));
        assert_eq!(
            value.staging_text().as_deref(),
            Some("2024-01-02 03:04:05.123")
        );
    }

    #[test]
    fn temporal_text_reports_truncation() {
        let value = Value::DateTime(datetime("2024-01-02 03:04:05.123456789"));
        assert_eq!(
            value.temporal_text(7),
            Some(("2024-01-02 03:04:05.1234567".to_string(), true))
        );

        let value = Value::DateTime(datetime("2024-01-02 03:04:05.5"));
        assert_eq!(
            value.temporal_text(7),
            Some(("2024-01-02 03:04:05.5".to_string(), false))
        );

        let value = Value::Time(NaiveTime::from_hms_opt(1, 2, 3).unwrap());
        assert_eq!(value.temporal_text(7), Some(("01:02:03".to_string(), false)));
    }

    #[test]
    fn integers_compare_across_widths() {
        assert_eq!(Value::TinyInt(5).as_i64(), Value::BigInt(5).as_i64());
        assert_eq!(Value::SmallInt(-2).as_f64(), Some(-2.0));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }
}
