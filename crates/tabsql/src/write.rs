//! Writing datasets into existing tables.
//!
//! Every write first checks the dataset against the table. Missing columns
//! and values that do not fit are errors unless the engine was configured
//! to adjust the schema, in which case columns are added or widened with a
//! warning. Metadata timestamp columns are always created when enabled.
//! Values are bound in the form their column stores, so a value that fits
//! always reads back as the column's host type.

use chrono::{SubsecRound, Utc};
use sqlx::Connection;
use tabsql_core::value::STORAGE_FRACTION_DIGITS;
use tabsql_core::{
    ColumnSpec, Dataset, Dialect, Error, MergeMode, MergePlan, Schema, SqlType, Value,
};
use tracing::{info, warn};

use crate::engine::{execute, execute_all, SqliteEngine};
use crate::error::Result;

/// Column stamped with the time a row was inserted.
pub const TIME_INSERT_COLUMN: &str = "_time_insert";

/// Column stamped with the time a row last changed.
pub const TIME_UPDATE_COLUMN: &str = "_time_update";

fn now() -> Value {
    let digits = u16::try_from(STORAGE_FRACTION_DIGITS).unwrap_or(9);
    Value::DateTime(Utc::now().naive_utc().trunc_subsecs(digits))
}

impl SqliteEngine {
    /// Appends every row of `dataset` to `table`.
    ///
    /// Returns the number of inserted rows.
    pub async fn insert(&mut self, table: &str, dataset: &Dataset) -> Result<u64> {
        let stamp = self
            .config
            .include_metadata_timestamps
            .then_some(TIME_INSERT_COLUMN);
        let schema = self.get_schema(table).await?;
        let schema = self.prepare_write(schema, dataset, stamp.as_slice()).await?;
        let rows = schema.conform(dataset);

        let mut raw = vec![table.to_string()];
        raw.extend(dataset.columns().iter().cloned());
        raw.extend(stamp.map(str::to_string));
        let names = self.identifiers(&raw).await?;

        let timestamp = now();
        let statements = self.dialect.insert(
            table,
            dataset.columns(),
            &rows,
            stamp.map(|column| (column, &timestamp)),
            &names,
        )?;

        let mut tx = self.conn.begin().await?;
        let inserted = execute_all(&mut tx, &self.dialect, &statements).await?;
        tx.commit().await?;
        info!(table, rows = inserted, "Inserted rows");
        Ok(inserted)
    }

    /// Updates existing rows matched on `match_columns`, or on the primary
    /// key when `match_columns` is empty. Unmatched rows are ignored.
    pub async fn update(
        &mut self,
        table: &str,
        dataset: &Dataset,
        match_columns: &[&str],
    ) -> Result<u64> {
        self.reconcile(table, dataset, match_columns, &[], MergeMode::Update)
            .await
    }

    /// Updates matched rows and inserts the rest. Nothing is deleted.
    pub async fn upsert(
        &mut self,
        table: &str,
        dataset: &Dataset,
        match_columns: &[&str],
    ) -> Result<u64> {
        self.reconcile(table, dataset, match_columns, &[], MergeMode::Upsert)
            .await
    }

    /// Makes `table` mirror `dataset`.
    ///
    /// Matched rows whose values differ are updated, unmatched rows are
    /// inserted and existing rows absent from the dataset are deleted. With
    /// `subset_columns`, deletes only touch rows whose values in those
    /// columns occur in the dataset, so a partial dataset can be merged
    /// without wiping the rest of the table. Merging the same dataset twice
    /// changes nothing the second time.
    pub async fn merge(
        &mut self,
        table: &str,
        dataset: &Dataset,
        match_columns: &[&str],
        subset_columns: &[&str],
    ) -> Result<u64> {
        self.reconcile(table, dataset, match_columns, subset_columns, MergeMode::Merge)
            .await
    }

    async fn reconcile(
        &mut self,
        table: &str,
        dataset: &Dataset,
        match_columns: &[&str],
        subset_columns: &[&str],
        mode: MergeMode,
    ) -> Result<u64> {
        let schema = self.get_schema(table).await?;
        let matches: Vec<String> = if match_columns.is_empty() {
            let key = schema.primary_key();
            if key.is_empty() {
                return Err(Error::UndefinedPrimaryKey(table.to_string()).into());
            }
            key
        } else {
            match_columns.iter().map(ToString::to_string).collect()
        };
        let subset: Vec<String> = subset_columns.iter().map(ToString::to_string).collect();

        let mut required = matches.clone();
        required.extend(subset.iter().cloned());
        let missing = dataset.missing_columns(&required);
        if !missing.is_empty() {
            return Err(Error::ColumnNotFound {
                table: "dataset".to_string(),
                columns: missing,
            }
            .into());
        }

        let metadata: Vec<&str> = match (self.config.include_metadata_timestamps, mode) {
            (false, _) => Vec::new(),
            (true, MergeMode::Update) => vec![TIME_UPDATE_COLUMN],
            (true, _) => vec![TIME_INSERT_COLUMN, TIME_UPDATE_COLUMN],
        };
        let schema = self.prepare_write(schema, dataset, &metadata).await?;

        let source = self.dialect.source_table(table);
        let mut raw = vec![table.to_string(), source.clone()];
        raw.extend(dataset.columns().iter().cloned());
        raw.extend(metadata.iter().map(ToString::to_string));
        let names = self.identifiers(&raw).await?;

        let plan = MergePlan {
            target: table,
            source: &source,
            columns: dataset.columns(),
            match_columns: &matches,
            subset_columns: &subset,
            mode,
            time_insert: metadata.contains(&TIME_INSERT_COLUMN).then_some(TIME_INSERT_COLUMN),
            time_update: metadata.contains(&TIME_UPDATE_COLUMN).then_some(TIME_UPDATE_COLUMN),
            timestamp: now(),
            identity_insert: schema
                .identity()
                .is_some_and(|column| dataset.has_column(&column.name)),
        };
        let mut staging = self
            .dialect
            .stage_source(table, &source, dataset.columns(), &names)?;
        staging.extend(self.dialect.insert(
            &source,
            dataset.columns(),
            &schema.conform(dataset),
            None,
            &names,
        )?);
        let statements = self.dialect.merge(&plan, &names)?;
        let drop = self.dialect.drop_table(&source, &names)?;

        let mut tx = self.conn.begin().await?;
        execute_all(&mut tx, &self.dialect, &staging).await?;
        let affected = execute_all(&mut tx, &self.dialect, &statements).await?;
        execute(&mut tx, &self.dialect, &drop).await?;
        tx.commit().await?;

        info!(
            table,
            mode = ?mode,
            rows = dataset.len(),
            affected,
            "Reconciled rows"
        );
        Ok(affected)
    }

    /// Brings the table in line with the dataset before a write.
    ///
    /// Returns the schema as it stands afterwards. Nothing is changed when
    /// the dataset is rejected.
    async fn prepare_write(
        &mut self,
        mut schema: Schema,
        dataset: &Dataset,
        metadata: &[&str],
    ) -> Result<Schema> {
        let table = schema.table().to_string();
        let autoadjust = self.config.autoadjust_sql_objects;

        let missing: Vec<String> = dataset
            .columns()
            .iter()
            .filter(|column| !schema.contains(column))
            .cloned()
            .collect();
        if !missing.is_empty() && !autoadjust {
            return Err(Error::ColumnNotFound {
                table,
                columns: missing,
            }
            .into());
        }
        let undersized = Self::undersized(&schema, dataset);
        if !undersized.is_empty() && !autoadjust {
            return Err(Error::InsufficientColumnSize {
                table,
                columns: undersized.into_iter().map(|c| c.name).collect(),
            }
            .into());
        }

        let mut added = Vec::new();
        for column in metadata.iter().filter(|c| !schema.contains(c)) {
            warn!("Creating column '{column}' in table '{table}' with data type 'datetime2'.");
            added.push(ColumnSpec::new(*column, SqlType::DateTime2));
        }
        if !missing.is_empty() {
            let types = self.infer_types(&table, &dataset.project(&missing)?).await?;
            for (column, sql_type) in types {
                warn!(table = %table, column = %column, sql_type = %sql_type, "Adding column");
                added.push(ColumnSpec::new(column, sql_type));
            }
        }
        if !added.is_empty() {
            let mut raw = vec![table.clone()];
            raw.extend(added.iter().map(|c| c.name.clone()));
            let names = self.identifiers(&raw).await?;
            let statements = added
                .iter()
                .map(|column| self.dialect.add_column(&table, column, &names))
                .collect::<tabsql_core::Result<Vec<_>>>()?;
            execute_all(&mut self.conn, &self.dialect, &statements).await?;
            schema = self.get_schema(&table).await?;
        }

        for column in Self::undersized(&schema, dataset) {
            warn!(
                table = %table,
                column = %column.name,
                sql_type = %column.sql_type,
                "Widening column"
            );
            let mut raw = vec![table.clone()];
            raw.extend(self.dialect.rebuild_table(&table));
            raw.extend(schema.names());
            let names = self.identifiers(&raw).await?;
            let statements = self.dialect.alter_column(&schema, &column, &names)?;

            let mut tx = self.conn.begin().await?;
            execute_all(&mut tx, &self.dialect, &statements).await?;
            tx.commit().await?;
            schema = self.get_schema(&table).await?;
        }
        Ok(schema)
    }

    /// Columns holding values they cannot fit, retyped to fit them.
    fn undersized(schema: &Schema, dataset: &Dataset) -> Vec<ColumnSpec> {
        schema
            .columns()
            .iter()
            .filter_map(|column| {
                let needed = dataset
                    .column_values(&column.name)?
                    .filter(|value| !column.sql_type.accepts(value))
                    .filter_map(SqlType::for_value)
                    .reduce(SqlType::widen)?;
                Some(ColumnSpec {
                    sql_type: column.sql_type.widen(needed),
                    ..column.clone()
                })
            })
            .collect()
    }
}
