//! Schema introspection.

use sqlx::Row;
use tabsql_core::{CatalogColumn, Dialect, Error, Schema};
use tracing::debug;

use crate::engine::{fetch_all, SqliteEngine};
use crate::error::{Result, TabsqlError};

impl SqliteEngine {
    /// Reads the column definitions of a table.
    ///
    /// Fails with [`Error::TableNotFound`] when the table does not exist and
    /// with [`Error::UnsupportedType`] naming every column whose type has no
    /// host mapping.
    pub async fn get_schema(&mut self, table: &str) -> Result<Schema> {
        let statement = self.dialect.table_info(table);
        let rows = fetch_all(&mut self.conn, &self.dialect, &statement).await?;
        let catalog = rows
            .iter()
            .map(|row| {
                Ok(CatalogColumn {
                    name: row.try_get("column_name")?,
                    declared_type: row.try_get("declared_type")?,
                    not_null: row.try_get("not_null")?,
                    is_primary_key: row.try_get("is_primary_key")?,
                    is_identity: row.try_get("is_identity")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        let schema = Schema::from_catalog(table, catalog)?;
        debug!(table, columns = schema.columns().len(), "Read table schema");
        Ok(schema)
    }

    /// Returns true if the table exists.
    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        match self.get_schema(table).await {
            Ok(_) | Err(TabsqlError::Core(Error::UnsupportedType { .. })) => Ok(true),
            Err(TabsqlError::Core(Error::TableNotFound(_))) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
