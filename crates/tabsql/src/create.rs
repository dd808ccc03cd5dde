//! Table creation.

use tabsql_core::infer::{infer_primary_key, not_null_columns};
use tabsql_core::{Dataset, Dialect, PrimaryKey, Schema, TableDefinition, IDENTITY_COLUMN};
use tracing::{info, warn};

use crate::engine::{execute, SqliteEngine};
use crate::error::Result;

impl SqliteEngine {
    /// Creates a table from an explicit definition.
    pub async fn create_table(&mut self, definition: &TableDefinition) -> Result<()> {
        let mut raw = vec![definition.table().to_string()];
        raw.extend(definition.names());
        let names = self.identifiers(&raw).await?;

        let statement = self.dialect.create_table(definition, &names)?;
        execute(&mut self.conn, &self.dialect, &statement).await?;
        info!(table = definition.table(), "Created table");
        Ok(())
    }

    /// Creates a table shaped after `dataset` and inserts its rows.
    ///
    /// Text is trimmed and null-like tokens become NULL before anything
    /// else, so the rows written are the rows the types were inferred from.
    /// Column types are inferred, columns without NULLs become NOT NULL,
    /// and the primary key follows `primary_key`. When the rows cannot be
    /// written the new table is dropped again. Returns the new schema.
    pub async fn create_table_from_dataset(
        &mut self,
        table: &str,
        dataset: &Dataset,
        primary_key: PrimaryKey,
    ) -> Result<Schema> {
        let dataset = &dataset.normalized();
        let types = self.infer_types(table, dataset).await?;

        let mut definition = types
            .iter()
            .fold(TableDefinition::new(table), |definition, (column, sql_type)| {
                definition.column(column.clone(), *sql_type)
            })
            .not_null(not_null_columns(dataset));
        definition = match primary_key {
            PrimaryKey::None => definition,
            PrimaryKey::Identity => definition.identity(IDENTITY_COLUMN),
            PrimaryKey::Column(column) => definition.primary_key(column),
            PrimaryKey::Infer => match infer_primary_key(dataset, &types) {
                Some(column) => {
                    info!(table, column = %column, "Inferred primary key");
                    definition.primary_key(column)
                }
                None => definition,
            },
        };

        self.create_table(&definition).await?;
        if let Err(err) = self.insert(table, dataset).await {
            warn!(table, error = %err, "Dropping table after failed insert");
            if let Err(cleanup) = self.drop_table(table).await {
                warn!(table, error = %cleanup, "Could not drop table");
            }
            return Err(err);
        }
        self.get_schema(table).await
    }

    async fn drop_table(&mut self, table: &str) -> Result<()> {
        let names = self.identifiers(&[table.to_string()]).await?;
        let statement = self.dialect.drop_table(table, &names)?;
        execute(&mut self.conn, &self.dialect, &statement).await?;
        Ok(())
    }
}
