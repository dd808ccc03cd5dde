//! SQL column types and their host-side equivalents.
//!
//! The set of engine types is closed: a type name outside [`SqlType::parse`]
//! is rejected rather than guessed at.

use std::fmt;
use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::value::Value;

static TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([a-z][a-z0-9]*)\s*(?:\(\s*(max|-?\d+)\s*(?:,\s*(\d+)\s*)?\))?\s*$")
        .expect("type pattern is valid")
});

/// Longest sized `VARCHAR`; longer text needs `MAX`.
pub const VARCHAR_LIMIT: usize = 8000;

/// Longest sized `NVARCHAR`; longer text needs `MAX`.
pub const NVARCHAR_LIMIT: usize = 4000;

/// Length of a character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Size {
    /// A fixed number of characters.
    Chars(u32),
    /// The engine's unbounded length.
    Max,
}

impl Size {
    /// Length for `len` characters, or `Max` beyond the engine's sized limit.
    pub(crate) fn for_len(len: usize, limit: usize) -> Self {
        if len > limit {
            return Self::Max;
        }
        u32::try_from(len.max(1)).map_or(Self::Max, Self::Chars)
    }

    fn fits(self, len: usize) -> bool {
        match self {
            Self::Max => true,
            Self::Chars(n) => usize::try_from(n).is_ok_and(|n| len <= n),
        }
    }
}

/// An engine column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Decimal { precision: u8, scale: u8 },
    Time,
    Date,
    DateTime,
    DateTime2,
    Char(Size),
    NChar(Size),
    Varchar(Size),
    NVarchar(Size),
}

impl SqlType {
    /// Parses `name` or `name(size)`, e.g. `varchar(10)`, `decimal(18, 2)`, `NVARCHAR(MAX)`.
    ///
    /// A size of `-1` means `MAX`, matching how catalogs report unbounded columns.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let caps = TYPE_PATTERN.captures(text)?;
        let name = caps.get(1)?.as_str().to_ascii_lowercase();
        let first = caps.get(2).map(|m| m.as_str());
        let second = caps.get(3).map(|m| m.as_str());

        let size = match first {
            None => None,
            Some(s) if s.eq_ignore_ascii_case("max") || s == "-1" => Some(Size::Max),
            Some(s) => Some(Size::Chars(s.parse().ok()?)),
        };

        let text_size = |size: Option<Size>| -> Option<Size> {
            if second.is_some() {
                return None;
            }
            Some(size.unwrap_or(Size::Chars(1)))
        };

        let sized = first.is_some();
        let ty = match name.as_str() {
            "char" => Self::Char(text_size(size)?),
            "nchar" => Self::NChar(text_size(size)?),
            "varchar" => Self::Varchar(text_size(size)?),
            "nvarchar" => Self::NVarchar(text_size(size)?),
            "decimal" | "numeric" => {
                let precision = match size {
                    None => 18,
                    Some(Size::Chars(p)) => u8::try_from(p).ok()?,
                    Some(Size::Max) => return None,
                };
                let scale = second.map_or(Ok(0), str::parse::<u8>).ok()?;
                if precision == 0 || precision > 38 || scale > precision {
                    return None;
                }
                Self::Decimal { precision, scale }
            }
            _ if sized => return None,
            "bit" => Self::Bit,
            "tinyint" => Self::TinyInt,
            "smallint" => Self::SmallInt,
            "int" | "integer" => Self::Int,
            "bigint" => Self::BigInt,
            "float" | "real" => Self::Float,
            "time" => Self::Time,
            "date" => Self::Date,
            "datetime" | "smalldatetime" => Self::DateTime,
            "datetime2" => Self::DateTime2,
            _ => return None,
        };
        Some(ty)
    }

    /// Lowercase engine type name without size, as bound into dynamic SQL.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bit => "bit",
            Self::TinyInt => "tinyint",
            Self::SmallInt => "smallint",
            Self::Int => "int",
            Self::BigInt => "bigint",
            Self::Float => "float",
            Self::Decimal { .. } => "decimal",
            Self::Time => "time",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateTime2 => "datetime2",
            Self::Char(_) => "char",
            Self::NChar(_) => "nchar",
            Self::Varchar(_) => "varchar",
            Self::NVarchar(_) => "nvarchar",
        }
    }

    /// The length or precision fragment, e.g. `(10)`, `(MAX)`, `(18,2)`.
    #[must_use]
    pub fn size_fragment(&self) -> Option<String> {
        match self {
            Self::Char(size) | Self::NChar(size) | Self::Varchar(size) | Self::NVarchar(size) => {
                Some(match size {
                    Size::Max => "(MAX)".to_string(),
                    Size::Chars(n) => format!("({n})"),
                })
            }
            Self::Decimal { precision, scale } => Some(format!("({precision},{scale})")),
            _ => None,
        }
    }

    /// The character length for text types.
    #[must_use]
    pub const fn text_size(&self) -> Option<Size> {
        match self {
            Self::Char(size) | Self::NChar(size) | Self::Varchar(size) | Self::NVarchar(size) => {
                Some(*size)
            }
            _ => None,
        }
    }

    /// Returns true for national (Unicode) character types.
    #[must_use]
    pub const fn is_national(&self) -> bool {
        matches!(self, Self::NChar(_) | Self::NVarchar(_))
    }

    /// Inclusive value range of integer types, including `BIT`.
    #[must_use]
    pub const fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            Self::Bit => Some((0, 1)),
            Self::TinyInt => Some((0, 255)),
            Self::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Host-side equivalent of this engine type.
    #[must_use]
    pub const fn host_type(&self) -> HostType {
        match self {
            Self::Bit => HostType::Boolean,
            Self::TinyInt => HostType::UInt8,
            Self::SmallInt => HostType::Int16,
            Self::Int => HostType::Int32,
            Self::BigInt => HostType::Int64,
            Self::Float | Self::Decimal { .. } => HostType::Float64,
            Self::Time => HostType::TimeOfDay,
            Self::Date => HostType::Date,
            Self::DateTime | Self::DateTime2 => HostType::DateTime,
            Self::Char(_) | Self::NChar(_) | Self::Varchar(_) | Self::NVarchar(_) => {
                HostType::String
            }
        }
    }

    /// Narrowest type that can hold a single value. `None` for NULL.
    #[must_use]
    pub fn for_value(value: &Value) -> Option<Self> {
        let ty = match value {
            Value::Null => return None,
            Value::Bool(_) => Self::Bit,
            Value::Float(_) => Self::Float,
            Value::Time(_) => Self::Time,
            Value::Date(_) => Self::Date,
            Value::DateTime(_) => Self::DateTime2,
            Value::Text(s) => {
                let len = s.chars().count();
                if s.is_ascii() {
                    Self::Varchar(Size::for_len(len, VARCHAR_LIMIT))
                } else {
                    Self::NVarchar(Size::for_len(len, NVARCHAR_LIMIT))
                }
            }
            integer => Self::for_integer(integer.as_i64()?),
        };
        Some(ty)
    }

    fn for_integer(i: i64) -> Self {
        [Self::TinyInt, Self::SmallInt, Self::Int]
            .into_iter()
            .find(|ty| ty.integer_range().is_some_and(|(lo, hi)| (lo..=hi).contains(&i)))
            .unwrap_or(Self::BigInt)
    }

    /// Narrowest type holding every value of both `self` and `other`.
    #[must_use]
    pub fn widen(self, other: Self) -> Self {
        if self == other {
            return self;
        }
        if let (Some(a), Some(b)) = (self.integer_rank(), other.integer_rank()) {
            return if a >= b { self } else { other };
        }
        if let (Some(a), Some(b)) = (self.text_size(), other.text_size()) {
            let size = a.max(b);
            let national = self.is_national() || other.is_national();
            let fixed = matches!(self, Self::Char(_) | Self::NChar(_))
                && matches!(other, Self::Char(_) | Self::NChar(_));
            return match (fixed, national) {
                (true, true) => Self::NChar(size),
                (true, false) => Self::Char(size),
                (false, true) => Self::NVarchar(size),
                (false, false) => Self::Varchar(size),
            };
        }
        match (self, other) {
            (
                Self::Decimal {
                    precision: p1,
                    scale: s1,
                },
                Self::Decimal {
                    precision: p2,
                    scale: s2,
                },
            ) => Self::Decimal {
                precision: p1.max(p2),
                scale: s1.max(s2),
            },
            (a, b) if a.is_numeric() && b.is_numeric() => Self::Float,
            (a, b) if a.is_calendar() && b.is_calendar() => Self::DateTime2,
            _ => Self::NVarchar(Size::Max),
        }
    }

    /// Returns true when `value` fits without truncation or overflow.
    ///
    /// Text must fit the length and character set. Every other value must
    /// convert to the column's host type without loss, so `3.7` does not
    /// fit an integer column and `2024-03-01 12:00:00` does not fit a date.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        if let Some(size) = self.text_size() {
            return size.fits(value.char_len()) && (self.is_national() || !value.is_national());
        }
        self.host_type().coerce(value.clone()).is_some()
    }

    /// The value as this column stores it.
    ///
    /// Numeric and temporal columns get the host form of the value, e.g. a
    /// midnight datetime becomes a date in a `DATE` column and `" 7 "`
    /// becomes an integer. Values that do not convert are returned as is.
    #[must_use]
    pub fn conform(&self, value: &Value) -> Value {
        if self.text_size().is_some() {
            return value.clone();
        }
        self.host_type()
            .coerce(value.clone())
            .unwrap_or_else(|| value.clone())
    }

    const fn integer_rank(self) -> Option<u8> {
        match self {
            Self::Bit => Some(0),
            Self::TinyInt => Some(1),
            Self::SmallInt => Some(2),
            Self::Int => Some(3),
            Self::BigInt => Some(4),
            _ => None,
        }
    }

    const fn is_numeric(self) -> bool {
        self.integer_rank().is_some() || matches!(self, Self::Float | Self::Decimal { .. })
    }

    const fn is_calendar(self) -> bool {
        matches!(self, Self::Date | Self::DateTime | Self::DateTime2)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name().to_ascii_uppercase())?;
        if let Some(size) = self.size_fragment() {
            write!(f, "{size}")?;
        }
        Ok(())
    }
}

/// Host-side value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostType {
    Boolean,
    UInt8,
    Int16,
    Int32,
    Int64,
    Float64,
    TimeOfDay,
    Date,
    DateTime,
    String,
}

impl HostType {
    /// Converts a loosely typed value into this host type.
    ///
    /// Returns `None` when the value cannot be represented without loss.
    #[must_use]
    pub fn coerce(self, raw: Value) -> Option<Value> {
        if raw.is_null() {
            return Some(Value::Null);
        }
        let value = match self {
            Self::Boolean => match &raw {
                Value::Bool(b) => Value::Bool(*b),
                Value::Text(s) if s.trim().eq_ignore_ascii_case("true") => Value::Bool(true),
                Value::Text(s) if s.trim().eq_ignore_ascii_case("false") => Value::Bool(false),
                other => match integer(other)? {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    _ => return None,
                },
            },
            Self::UInt8 => Value::TinyInt(u8::try_from(integer(&raw)?).ok()?),
            Self::Int16 => Value::SmallInt(i16::try_from(integer(&raw)?).ok()?),
            Self::Int32 => Value::Int(i32::try_from(integer(&raw)?).ok()?),
            Self::Int64 => Value::BigInt(integer(&raw)?),
            Self::Float64 => match &raw {
                Value::Text(s) => Value::Float(s.trim().parse().ok()?),
                other => Value::Float(other.as_f64()?),
            },
            Self::TimeOfDay => match raw {
                Value::Time(t) => Value::Time(t),
                other => Value::Time(parse_time(text(&other)?)?),
            },
            Self::Date => match raw {
                Value::Date(d) => Value::Date(d),
                Value::DateTime(dt) => Value::Date(midnight_date(dt)?),
                other => Value::Date(parse_datetime(text(&other)?).and_then(midnight_date)?),
            },
            Self::DateTime => match raw {
                Value::DateTime(dt) => Value::DateTime(dt),
                Value::Date(d) => Value::DateTime(d.and_time(NaiveTime::MIN)),
                other => Value::DateTime(parse_datetime(text(&other)?)?),
            },
            Self::String => match raw {
                Value::Text(s) => Value::Text(s),
                other => Value::Text(other.to_string()),
            },
        };
        Some(value)
    }
}

/// Integer form of a value, including integral floats and numeric text.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integer(raw: &Value) -> Option<i64> {
    let whole = |f: f64| {
        (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
    };
    match raw {
        Value::Float(f) => whole(*f),
        Value::Text(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| whole(s.parse().ok()?))
        }
        other => other.as_i64(),
    }
}

fn text(raw: &Value) -> Option<&str> {
    raw.as_str().map(str::trim)
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").ok()
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn midnight_date(dt: NaiveDateTime) -> Option<NaiveDate> {
    (dt.time() == NaiveTime::MIN).then_some(dt.date())
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::TimeOfDay => "time of day",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_sizes_and_aliases() {
        assert_eq!(SqlType::parse("VARCHAR(10)"), Some(SqlType::Varchar(Size::Chars(10))));
        assert_eq!(SqlType::parse("nvarchar(max)"), Some(SqlType::NVarchar(Size::Max)));
        assert_eq!(SqlType::parse("NVARCHAR(-1)"), Some(SqlType::NVarchar(Size::Max)));
        assert_eq!(SqlType::parse("varchar"), Some(SqlType::Varchar(Size::Chars(1))));
        assert_eq!(
            SqlType::parse("decimal(18, 2)"),
            Some(SqlType::Decimal {
                precision: 18,
                scale: 2
            })
        );
        assert_eq!(SqlType::parse("INTEGER"), Some(SqlType::Int));
        assert_eq!(SqlType::parse(" datetime2 "), Some(SqlType::DateTime2));
    }

    #[test]
    fn parse_rejects_unknown_or_malformed() {
        assert_eq!(SqlType::parse("geography"), None);
        assert_eq!(SqlType::parse("int(4)"), None);
        assert_eq!(SqlType::parse("varchar(10); DROP TABLE x"), None);
        assert_eq!(SqlType::parse("decimal(2,5)"), None);
        assert_eq!(SqlType::parse("TEXT"), None);
    }

    #[test]
    fn display_round_trips() {
        for text in ["VARCHAR(10)", "NVARCHAR(MAX)", "DECIMAL(18,2)", "BIGINT", "DATETIME2"] {
            assert_eq!(SqlType::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn narrowest_integer_for_value() {
        assert_eq!(SqlType::for_value(&Value::BigInt(255)), Some(SqlType::TinyInt));
        assert_eq!(SqlType::for_value(&Value::BigInt(256)), Some(SqlType::SmallInt));
        assert_eq!(SqlType::for_value(&Value::BigInt(-1)), Some(SqlType::SmallInt));
        assert_eq!(SqlType::for_value(&Value::BigInt(40_000)), Some(SqlType::Int));
        assert_eq!(SqlType::for_value(&Value::BigInt(1 << 40)), Some(SqlType::BigInt));
        assert_eq!(SqlType::for_value(&Value::Null), None);
        assert_eq!(
            SqlType::for_value(&Value::from("é")),
            Some(SqlType::NVarchar(Size::Chars(1)))
        );
    }

    #[test]
    fn widen_picks_the_smallest_common_type() {
        use SqlType::{BigInt, Date, DateTime2, Float, NVarchar, SmallInt, TinyInt, Varchar};
        assert_eq!(TinyInt.widen(SmallInt), SmallInt);
        assert_eq!(BigInt.widen(TinyInt), BigInt);
        assert_eq!(TinyInt.widen(Float), Float);
        assert_eq!(Date.widen(DateTime2), DateTime2);
        assert_eq!(
            Varchar(Size::Chars(3)).widen(NVarchar(Size::Chars(2))),
            NVarchar(Size::Chars(3))
        );
        assert_eq!(Varchar(Size::Chars(3)).widen(Varchar(Size::Max)), Varchar(Size::Max));
        assert_eq!(Date.widen(TinyInt), NVarchar(Size::Max));
    }

    #[test]
    fn accepts_checks_length_and_range() {
        let ty = SqlType::Varchar(Size::Chars(3));
        assert!(ty.accepts(&Value::from("abc")));
        assert!(!ty.accepts(&Value::from("abcd")));
        assert!(!ty.accepts(&Value::from("é")));
        assert!(ty.accepts(&Value::Null));
        assert!(SqlType::TinyInt.accepts(&Value::BigInt(255)));
        assert!(!SqlType::TinyInt.accepts(&Value::BigInt(256)));
    }

    #[test]
    fn accepts_rejects_lossy_conversions() {
        assert!(SqlType::TinyInt.accepts(&Value::Float(3.0)));
        assert!(!SqlType::TinyInt.accepts(&Value::Float(3.7)));
        assert!(SqlType::Int.accepts(&Value::from(" 42 ")));
        assert!(!SqlType::Int.accepts(&Value::from("forty two")));
        assert!(!SqlType::Bit.accepts(&Value::BigInt(2)));
        assert!(!SqlType::Float.accepts(&Value::from("n/a")));

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(SqlType::Date.accepts(&Value::DateTime(day.and_time(NaiveTime::MIN))));
        assert!(!SqlType::Date.accepts(&Value::DateTime(day.and_hms_opt(12, 0, 0).unwrap())));
        assert!(!SqlType::Date.accepts(&Value::from("2024-02-30")));
        assert!(SqlType::DateTime2.accepts(&Value::Date(day)));
        assert!(!SqlType::Time.accepts(&Value::Date(day)));
    }

    #[test]
    fn conform_stores_the_host_form() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            SqlType::Date.conform(&Value::DateTime(day.and_time(NaiveTime::MIN))),
            Value::Date(day)
        );
        assert_eq!(
            SqlType::DateTime2.conform(&Value::from("2024-03-01")),
            Value::DateTime(day.and_time(NaiveTime::MIN))
        );
        assert_eq!(SqlType::SmallInt.conform(&Value::from(" 7 ")), Value::SmallInt(7));
        assert_eq!(SqlType::Bit.conform(&Value::BigInt(1)), Value::Bool(true));
        assert_eq!(
            SqlType::Varchar(Size::Chars(3)).conform(&Value::from(" 7 ")),
            Value::from(" 7 ")
        );
        assert_eq!(SqlType::Int.conform(&Value::from("x")), Value::from("x"));
    }

    #[test]
    fn coerce_engine_values() {
        assert_eq!(HostType::Boolean.coerce(Value::BigInt(1)), Some(Value::Bool(true)));
        assert_eq!(HostType::UInt8.coerce(Value::BigInt(300)), None);
        assert_eq!(HostType::Int16.coerce(Value::BigInt(300)), Some(Value::SmallInt(300)));
        assert_eq!(HostType::Float64.coerce(Value::BigInt(2)), Some(Value::Float(2.0)));
        assert_eq!(
            HostType::Date.coerce(Value::from("2024-02-29")),
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(
            HostType::DateTime.coerce(Value::from("2024-02-29 01:02:03.5")),
            Some(Value::DateTime(
                NaiveDate::from_ymd_opt(2024, 2, 29)
                    .unwrap()
                    .and_hms_milli_opt(1, 2, 3, 500)
                    .unwrap()
            ))
        );
        assert_eq!(HostType::String.coerce(Value::Null), Some(Value::Null));
    }

    #[test]
    fn date_accepts_a_zero_time_part() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            HostType::Date.coerce(Value::from("2024-03-01 00:00:00")),
            Some(Value::Date(day))
        );
        assert_eq!(HostType::Date.coerce(Value::from("2024-03-01 00:00:01")), None);
        assert_eq!(HostType::UInt8.coerce(Value::Float(3.7)), None);
    }
}
