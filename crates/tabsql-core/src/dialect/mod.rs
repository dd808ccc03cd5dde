//! Database dialect implementations.
//!
//! A dialect turns table definitions, merge plans and selections into
//! parameterized statements for one database system. Identifiers reach a
//! dialect raw; the quoted form is looked up in an [`Identifiers`] map that
//! the caller filled by round-tripping every name through the engine's own
//! quoting function.

mod sqlite;
mod tsql;

use std::collections::HashMap;

pub use sqlite::SqliteDialect;
pub use tsql::TsqlDialect;

use crate::definition::TableDefinition;
use crate::error::{Error, Result};
use crate::schema::{ColumnSpec, Schema};
use crate::value::Value;

/// SQL text plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// A statement without parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// A statement with parameters.
    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Raw identifiers mapped to their engine-quoted form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifiers {
    quoted: HashMap<String, String>,
}

impl Identifiers {
    /// Pairs raw names with the quoted names returned by the engine.
    #[must_use]
    pub fn new(raw: &[String], quoted: Vec<String>) -> Self {
        Self {
            quoted: raw.iter().cloned().zip(quoted).collect(),
        }
    }

    /// Adds the pairs of another map.
    pub fn extend(&mut self, other: Self) {
        self.quoted.extend(other.quoted);
    }

    /// Returns true if `raw` has been quoted.
    #[must_use]
    pub fn contains(&self, raw: &str) -> bool {
        self.quoted.contains_key(raw)
    }

    /// The quoted form of `raw`.
    pub fn get(&self, raw: &str) -> Result<&str> {
        self.quoted
            .get(raw)
            .map(String::as_str)
            .ok_or_else(|| Error::General(format!("identifier '{raw}' was not sanitized")))
    }

    /// Quoted forms of several names, in order.
    pub fn all(&self, raw: &[String]) -> Result<Vec<String>> {
        raw.iter()
            .map(|name| self.get(name).map(str::to_string))
            .collect()
    }
}

/// How incoming rows are reconciled with existing rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// Update matched rows only.
    Update,
    /// Update matched rows and insert the rest.
    Upsert,
    /// Upsert, then delete existing rows that were not matched.
    Merge,
}

/// Everything a dialect needs to reconcile a staged source with a target.
#[derive(Debug, Clone)]
pub struct MergePlan<'a> {
    pub target: &'a str,
    /// Session-scoped table holding the incoming rows.
    pub source: &'a str,
    /// Incoming columns.
    pub columns: &'a [String],
    pub match_columns: &'a [String],
    /// Restricts deletes to rows whose values in these columns occur in the source.
    pub subset_columns: &'a [String],
    pub mode: MergeMode,
    pub time_insert: Option<&'a str>,
    pub time_update: Option<&'a str>,
    /// Bound for both timestamp columns.
    pub timestamp: Value,
    /// The target's identity column receives explicit values.
    pub identity_insert: bool,
}

impl MergePlan<'_> {
    /// Incoming columns that are not match columns.
    #[must_use]
    pub fn update_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !self.match_columns.contains(c))
            .cloned()
            .collect()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A resolved SELECT.
#[derive(Debug, Clone)]
pub struct SelectPlan<'a> {
    pub table: &'a str,
    /// Empty selects every column.
    pub columns: &'a [String],
    /// Predicate text over quoted names and its arguments.
    pub predicate: Option<(String, Vec<Value>)>,
    pub order_by: Option<(&'a str, Order)>,
    pub limit: Option<u64>,
}

/// Trait for database-specific SQL generation.
pub trait Dialect: Send + Sync {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Most parameters one statement may bind.
    fn max_params(&self) -> usize;

    /// Most rows one `VALUES` list may hold.
    fn max_rows(&self) -> usize {
        usize::MAX
    }

    /// Fractional second digits the dialect stores.
    fn fraction_digits(&self) -> usize {
        crate::value::STORAGE_FRACTION_DIGITS
    }

    /// One-row query returning the quoted form of each identifier, or NULL
    /// where the engine refuses it.
    fn sanitize(&self, identifiers: &[String]) -> Statement;

    /// Recognizes an identifier that is already quoted in this dialect's
    /// style and returns the name it denotes.
    fn unquote(&self, identifier: &str) -> Option<String>;

    /// Catalog query producing `column_name`, `declared_type`, `not_null`,
    /// `is_primary_key`, `is_identity` for a table, in ordinal order.
    fn table_info(&self, table: &str) -> Statement;

    /// CREATE TABLE.
    fn create_table(&self, definition: &TableDefinition, names: &Identifiers) -> Result<Statement>;

    /// Adds a nullable column.
    fn add_column(
        &self,
        table: &str,
        column: &ColumnSpec,
        names: &Identifiers,
    ) -> Result<Statement>;

    /// Changes the type of a column to `column.sql_type`.
    fn alter_column(
        &self,
        schema: &Schema,
        column: &ColumnSpec,
        names: &Identifiers,
    ) -> Result<Vec<Statement>>;

    /// Name of the scratch table used to infer types for `table`.
    fn scratch_table(&self, table: &str) -> String;

    /// Name of the table that stages incoming rows for `table`.
    fn source_table(&self, table: &str) -> String;

    /// Name of the temporary copy [`Dialect::alter_column`] builds, for
    /// dialects that rebuild tables to change a column type.
    fn rebuild_table(&self, _table: &str) -> Option<String> {
        None
    }

    /// Names of the scratch table's text columns.
    fn scratch_columns(&self, width: usize) -> Vec<String> {
        (0..width).map(|i| format!("c{i}")).collect()
    }

    /// (Re)creates the scratch table with `width` maximal-width text columns.
    fn stage_scratch(&self, scratch: &str, width: usize, names: &Identifiers)
        -> Result<Vec<Statement>>;

    /// Set-based probe over the scratch table. Produces one row per column
    /// with a non-null value: `column_name`, `type_name`, `max_len`.
    fn infer_probe(&self, scratch: &str, columns: &[String], names: &Identifiers)
        -> Result<Statement>;

    /// (Re)creates `source` with the target's types for `columns`.
    fn stage_source(
        &self,
        target: &str,
        source: &str,
        columns: &[String],
        names: &Identifiers,
    ) -> Result<Vec<Statement>>;

    /// Drops a table if it exists.
    fn drop_table(&self, table: &str, names: &Identifiers) -> Result<Statement>;

    /// Multi-row INSERT, split into batches that respect the parameter limit.
    ///
    /// `stamp` adds a column bound to the same value on every row. Rows
    /// without any column to write are an error.
    fn insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
        stamp: Option<(&str, &Value)>,
        names: &Identifiers,
    ) -> Result<Vec<Statement>> {
        let table = names.get(table)?;
        let mut quoted = names.all(columns)?;
        if let Some((column, _)) = stamp {
            quoted.push(names.get(column)?.to_string());
        }
        let width = quoted.len();
        if width == 0 {
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            return Err(Error::General(format!(
                "cannot insert {} rows into {table} without columns",
                rows.len()
            )));
        }
        let per_batch = (self.max_params() / width).clamp(1, self.max_rows());
        let row_sql = format!("({})", vec!["?"; width].join(", "));

        Ok(rows
            .chunks(per_batch)
            .map(|chunk| {
                let mut sql = format!("INSERT INTO {table} ({}) VALUES ", quoted.join(", "));
                sql.push_str(&vec![row_sql.as_str(); chunk.len()].join(", "));
                let mut params = Vec::with_capacity(chunk.len() * width);
                for row in chunk {
                    params.extend(row.iter().cloned());
                    if let Some((_, value)) = stamp {
                        params.push(value.clone());
                    }
                }
                Statement::with_params(sql, params)
            })
            .collect())
    }

    /// Statements reconciling `plan.source` into `plan.target`.
    fn merge(&self, plan: &MergePlan<'_>, names: &Identifiers) -> Result<Vec<Statement>>;

    /// SELECT.
    fn select(&self, plan: &SelectPlan<'_>, names: &Identifiers) -> Result<Statement>;
}

/// `a.x = b.x AND a.y = b.y`
pub(crate) fn join_equal(left: &str, right: &str, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("{left}.{c} = {right}.{c}"))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `a.x, a.y`
pub(crate) fn qualified(alias: &str, columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
