//! Table schemas as read from the engine catalog.

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::types::{HostType, SqlType};
use crate::value::Value;

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Engine type, including size.
    pub sql_type: SqlType,
    /// Whether NULL is rejected.
    pub not_null: bool,
    /// Whether the column belongs to the primary key.
    pub is_primary_key: bool,
    /// Whether the engine generates the value.
    pub is_identity: bool,
}

impl ColumnSpec {
    /// Creates a nullable, non-key column.
    #[must_use]
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            not_null: false,
            is_primary_key: false,
            is_identity: false,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.not_null = true;
        self
    }

    /// Marks the column as an engine-managed identity primary key.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.is_identity = true;
        self.primary_key()
    }

    /// Size fragment such as `(10)` or `(MAX)`.
    #[must_use]
    pub fn size(&self) -> Option<String> {
        self.sql_type.size_fragment()
    }

    /// Host-side equivalent of the column type.
    #[must_use]
    pub const fn host_type(&self) -> HostType {
        self.sql_type.host_type()
    }
}

/// A raw catalog row, before type mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    /// Declared type with size, e.g. `varchar(10)` or `nvarchar(-1)`.
    pub declared_type: String,
    pub not_null: bool,
    pub is_primary_key: bool,
    pub is_identity: bool,
}

/// Columns of a table in ordinal order.
///
/// A schema is a snapshot: re-read it after any DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    table: String,
    columns: Vec<ColumnSpec>,
}

impl Schema {
    /// Creates a schema, enforcing a single identity column.
    pub fn new(table: impl Into<String>, columns: Vec<ColumnSpec>) -> Result<Self> {
        let table = table.into();
        let identities: Vec<&str> = columns
            .iter()
            .filter(|c| c.is_identity)
            .map(|c| c.name.as_str())
            .collect();
        if identities.len() > 1 {
            return Err(Error::General(format!(
                "table '{table}' has more than one identity column: {}",
                identities.join(", ")
            )));
        }
        Ok(Self { table, columns })
    }

    /// Maps catalog rows through the closed type table.
    ///
    /// No rows means the table does not exist. Every column with an
    /// unmapped type is reported at once.
    pub fn from_catalog(table: &str, rows: Vec<CatalogColumn>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::TableNotFound(table.to_string()));
        }

        let mut columns = Vec::with_capacity(rows.len());
        let mut unsupported = Vec::new();
        for row in rows {
            match SqlType::parse(&row.declared_type) {
                Some(sql_type) => columns.push(ColumnSpec {
                    name: row.name,
                    sql_type,
                    not_null: row.not_null || row.is_identity,
                    is_primary_key: row.is_primary_key,
                    is_identity: row.is_identity,
                }),
                None => unsupported.push((row.name, row.declared_type)),
            }
        }

        if !unsupported.is_empty() {
            return Err(Error::UnsupportedType {
                table: table.to_string(),
                columns: unsupported,
            });
        }
        Self::new(table, columns)
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns in ordinal order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the table has the column.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Primary key columns in ordinal order.
    #[must_use]
    pub fn primary_key(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    /// The identity column, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.is_identity)
    }

    /// Column names in ordinal order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Host types keyed by column, in ordinal order.
    #[must_use]
    pub fn host_types(&self) -> Vec<(String, HostType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.host_type()))
            .collect()
    }

    /// Rows of `dataset` with every value in the form its column stores.
    ///
    /// Dataset columns the table lacks are passed through unchanged.
    #[must_use]
    pub fn conform(&self, dataset: &Dataset) -> Vec<Vec<Value>> {
        let types: Vec<Option<SqlType>> = dataset
            .columns()
            .iter()
            .map(|name| self.column(name).map(|c| c.sql_type))
            .collect();
        dataset
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&types)
                    .map(|(value, sql_type)| {
                        sql_type.map_or_else(|| value.clone(), |ty| ty.conform(value))
                    })
                    .collect()
            })
            .collect()
    }
}
