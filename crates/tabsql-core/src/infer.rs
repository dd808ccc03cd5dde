//! Client-side half of type inference.
//!
//! The engine decides which conversions succeed; this module prepares the
//! staged sample, turns probe rows into [`SqlType`]s and picks primary keys
//! and NOT NULL columns from the data.

use std::collections::HashSet;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::types::{Size, SqlType, NVARCHAR_LIMIT, VARCHAR_LIMIT};
use crate::value::Value;

/// Default number of rows sampled for inference.
pub const DEFAULT_ROW_COUNT: usize = 1000;

/// One row of the inference probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRow {
    pub column_name: String,
    /// Lowercase engine type name chosen by the probe.
    pub type_name: String,
    /// Longest value in characters.
    pub max_len: Option<i64>,
}

/// Normalized text rows for the scratch table.
#[must_use]
pub fn staging_rows(sample: &Dataset) -> Vec<Vec<Value>> {
    sample
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|value| value.staging_text().map_or(Value::Null, Value::Text))
                .collect()
        })
        .collect()
}

/// Turns probe rows into a type per sample column, in column order.
///
/// Columns without a probe row held only NULLs and become `NVARCHAR(MAX)`.
/// Text columns are sized to their longest value and use the national type
/// when any value is not ASCII.
pub fn resolve_types(sample: &Dataset, probe: &[ProbeRow]) -> Result<Vec<(String, SqlType)>> {
    sample
        .columns()
        .iter()
        .map(|column| {
            let Some(row) = probe.iter().find(|r| &r.column_name == column) else {
                return Ok((column.clone(), SqlType::NVarchar(Size::Max)));
            };
            let sql_type = if row.type_name.eq_ignore_ascii_case("varchar") {
                let len = row
                    .max_len
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(1);
                let national = sample.column_values(column.as_str()).is_some_and(|mut values| {
                    values.any(|v| v.staging_text().is_some_and(|t| !t.is_ascii()))
                });
                if national {
                    SqlType::NVarchar(Size::for_len(len, NVARCHAR_LIMIT))
                } else {
                    SqlType::Varchar(Size::for_len(len, VARCHAR_LIMIT))
                }
            } else {
                SqlType::parse(&row.type_name).ok_or_else(|| Error::UnsupportedType {
                    table: String::new(),
                    columns: vec![(column.clone(), row.type_name.clone())],
                })?
            };
            Ok((column.clone(), sql_type))
        })
        .collect()
}

/// Columns without a single NULL.
#[must_use]
pub fn not_null_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|column| {
            dataset
                .column_values(column)
                .is_some_and(|mut values| values.all(|v| !v.is_null()))
        })
        .cloned()
        .collect()
}

fn is_unique(dataset: &Dataset, column: &str) -> bool {
    let mut seen = HashSet::new();
    dataset.column_values(column).is_some_and(|mut values| {
        values.all(|v| v.staging_text().is_some_and(|text| seen.insert(text)))
    })
}

/// Picks the column best suited as a primary key.
///
/// Only non-null, unique columns qualify. The integer column with the
/// smallest maximum wins, then the float column with the smallest maximum,
/// then the text column with the shortest longest value.
#[must_use]
pub fn infer_primary_key(dataset: &Dataset, types: &[(String, SqlType)]) -> Option<String> {
    if dataset.is_empty() {
        return None;
    }
    let candidates: Vec<&(String, SqlType)> = types
        .iter()
        .filter(|(column, _)| is_unique(dataset, column))
        .collect();

    let values = |column: &str| dataset.column_values(column).into_iter().flatten();

    let integer = candidates
        .iter()
        .filter(|(_, ty)| ty.integer_range().is_some() && *ty != SqlType::Bit)
        .filter_map(|(column, _)| {
            let max = values(column.as_str()).filter_map(integer_of).max()?;
            Some((column, max))
        })
        .min_by_key(|(_, max)| *max);
    if let Some((column, _)) = integer {
        return Some(column.clone());
    }

    let float = candidates
        .iter()
        .filter(|(_, ty)| matches!(ty, SqlType::Float | SqlType::Decimal { .. }))
        .filter_map(|(column, _)| {
            let max = values(column.as_str())
                .filter_map(float_of)
                .max_by(f64::total_cmp)?;
            Some((column, max))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((column, _)) = float {
        return Some(column.clone());
    }

    candidates
        .iter()
        .filter(|(_, ty)| ty.text_size().is_some())
        .filter_map(|(column, _)| {
            let longest = values(column.as_str()).map(Value::char_len).max()?;
            Some((column, longest))
        })
        .min_by_key(|(_, longest)| *longest)
        .map(|(column, _)| column.clone())
}

fn integer_of(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.staging_text().and_then(|t| t.parse().ok()))
}

fn float_of(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.staging_text().and_then(|t| t.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(column: &str, type_name: &str, max_len: i64) -> ProbeRow {
        ProbeRow {
            column_name: column.to_string(),
            type_name: type_name.to_string(),
            max_len: Some(max_len),
        }
    }

    #[test]
    fn staging_rows_are_text_or_null() {
        let dataset = Dataset::from_rows(
            ["a", "b"],
            vec![vec![Value::Float(2.0), Value::from(" nan ")]],
        )
        .unwrap();
        assert_eq!(
            staging_rows(&dataset),
            vec![vec![Value::from("2"), Value::Null]]
        );
    }

    #[test]
    fn resolves_text_sizes_and_null_columns() {
        let dataset = Dataset::from_rows(
            ["ascii", "national", "empty", "n"],
            vec![
                vec![Value::from("abc"), Value::from("é"), Value::Null, Value::from(3)],
                vec![Value::from("a"), Value::from("xy"), Value::Null, Value::from(4)],
            ],
        )
        .unwrap();
        let rows = vec![
            probe("ascii", "varchar", 3),
            probe("national", "varchar", 2),
            probe("n", "tinyint", 1),
        ];
        let types = resolve_types(&dataset, &rows).unwrap();
        assert_eq!(
            types,
            vec![
                ("ascii".to_string(), SqlType::Varchar(Size::Chars(3))),
                ("national".to_string(), SqlType::NVarchar(Size::Chars(2))),
                ("empty".to_string(), SqlType::NVarchar(Size::Max)),
                ("n".to_string(), SqlType::TinyInt),
            ]
        );
    }

    #[test]
    fn unknown_probe_type_is_an_error() {
        let dataset = Dataset::from_rows(["a"], vec![vec![Value::from(1)]]).unwrap();
        assert!(resolve_types(&dataset, &[probe("a", "hologram", 1)]).is_err());
    }

    #[test]
    fn not_null_requires_every_value() {
        let dataset = Dataset::from_rows(
            ["a", "b"],
            vec![
                vec![Value::from(1), Value::Null],
                vec![Value::from(2), Value::from("x")],
            ],
        )
        .unwrap();
        assert_eq!(not_null_columns(&dataset), vec!["a".to_string()]);
    }

    #[test]
    fn primary_key_prefers_smallest_integer() {
        let dataset = Dataset::from_rows(
            ["big", "small", "dup", "text"],
            vec![
                vec![Value::from(1000), Value::from(1), Value::from(7), Value::from("a")],
                vec![Value::from(2000), Value::from(2), Value::from(7), Value::from("b")],
            ],
        )
        .unwrap();
        let types = vec![
            ("big".to_string(), SqlType::SmallInt),
            ("small".to_string(), SqlType::TinyInt),
            ("dup".to_string(), SqlType::TinyInt),
            ("text".to_string(), SqlType::Varchar(Size::Chars(1))),
        ];
        assert_eq!(infer_primary_key(&dataset, &types).as_deref(), Some("small"));
    }

    #[test]
    fn primary_key_falls_back_to_float_then_text() {
        let dataset = Dataset::from_rows(
            ["f", "t"],
            vec![
                vec![Value::from(1.5), Value::from("aa")],
                vec![Value::from(2.5), Value::from("b")],
            ],
        )
        .unwrap();
        let types = vec![
            ("f".to_string(), SqlType::Float),
            ("t".to_string(), SqlType::Varchar(Size::Chars(2))),
        ];
        assert_eq!(infer_primary_key(&dataset, &types).as_deref(), Some("f"));
        assert_eq!(infer_primary_key(&dataset, &types[1..]).as_deref(), Some("t"));

        let with_null = Dataset::from_rows(["t"], vec![vec![Value::Null]]).unwrap();
        assert_eq!(infer_primary_key(&with_null, &types[1..]), None);
    }
}
