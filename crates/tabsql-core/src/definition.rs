//! Table definitions for CREATE TABLE.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::{ColumnSpec, Schema};
use crate::types::SqlType;

/// Name of the engine-managed identity column.
pub const IDENTITY_COLUMN: &str = "_pk";

/// How a table created from a dataset gets its primary key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrimaryKey {
    /// No primary key.
    #[default]
    None,
    /// An engine-managed identity column named [`IDENTITY_COLUMN`].
    Identity,
    /// An existing dataset column.
    Column(String),
    /// The best candidate among the dataset's columns, if any.
    Infer,
}

/// Columns and key options for a new table.
///
/// # Example
///
/// ```
/// use tabsql_core::{SqlType, TableDefinition};
///
/// let table = TableDefinition::new("people")
///     .column("id", SqlType::Int)
///     .column("name", SqlType::parse("VARCHAR(100)").unwrap())
///     .not_null(["name"])
///     .primary_key("id");
/// assert_eq!(table.columns().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    table: String,
    columns: Vec<(String, SqlType)>,
    not_null: Vec<String>,
    primary_key: Option<String>,
    identity: Option<String>,
}

impl TableDefinition {
    /// Starts a definition for `table`.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            not_null: Vec::new(),
            primary_key: None,
            identity: None,
        }
    }

    /// Rebuilds the definition of an existing table.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let mut definition = Self::new(schema.table());
        for column in schema.columns() {
            if column.is_identity {
                definition.identity = Some(column.name.clone());
                continue;
            }
            definition
                .columns
                .push((column.name.clone(), column.sql_type));
            if column.not_null && !column.is_primary_key {
                definition.not_null.push(column.name.clone());
            }
            if column.is_primary_key {
                definition.primary_key = Some(column.name.clone());
            }
        }
        definition
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.columns.push((name.into(), sql_type));
        self
    }

    /// Marks columns NOT NULL.
    #[must_use]
    pub fn not_null<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_null.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Makes one of the columns the primary key.
    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = Some(column.into());
        self
    }

    /// Adds an engine-managed identity primary key as the first column.
    #[must_use]
    pub fn identity(mut self, column: impl Into<String>) -> Self {
        self.identity = Some(column.into());
        self
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every column name, identity first.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.identity
            .iter()
            .cloned()
            .chain(self.columns.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    /// Validates the key options and resolves the final column list.
    pub fn columns(&self) -> Result<Vec<ColumnSpec>> {
        if let (Some(primary_key), Some(identity)) = (&self.primary_key, &self.identity) {
            return Err(Error::ConflictingPrimaryKey {
                table: self.table.clone(),
                primary_key: primary_key.clone(),
                identity: identity.clone(),
            });
        }

        let mut referenced: Vec<&String> = self.not_null.iter().collect();
        referenced.extend(&self.primary_key);
        let missing: Vec<String> = referenced
            .into_iter()
            .filter(|name| !self.columns.iter().any(|(c, _)| c == *name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Error::ColumnNotFound {
                table: self.table.clone(),
                columns: missing,
            });
        }

        let mut specs = Vec::with_capacity(self.columns.len() + 1);
        if let Some(identity) = &self.identity {
            if self.columns.iter().any(|(c, _)| c == identity) {
                return Err(Error::General(format!(
                    "identity column '{identity}' of table '{}' is also a regular column",
                    self.table
                )));
            }
            specs.push(ColumnSpec::new(identity.clone(), SqlType::Int).identity());
        }
        for (name, sql_type) in &self.columns {
            let mut spec = ColumnSpec::new(name.clone(), *sql_type);
            if self.primary_key.as_ref() == Some(name) {
                spec = spec.primary_key();
            } else if self.not_null.contains(name) {
                spec = spec.not_null();
            }
            specs.push(spec);
        }
        if specs.is_empty() {
            return Err(Error::General(format!(
                "table '{}' needs at least one column",
                self.table
            )));
        }
        Ok(specs)
    }
}
