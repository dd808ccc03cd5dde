//! Type inference against the engine.

use sqlx::Row;
use tabsql_core::infer::{resolve_types, staging_rows, ProbeRow};
use tabsql_core::{Dataset, Dialect, Error, SqlType};
use tracing::info;

use crate::engine::{execute, execute_all, fetch_all, SqliteEngine};
use crate::error::Result;

impl SqliteEngine {
    /// Infers an engine type for every column of `dataset`.
    ///
    /// The first `infer_row_count` rows are staged as text in a
    /// session-scoped scratch table named after `table`, and a single probe
    /// asks the engine which conversions succeed for every value. The
    /// scratch table is dropped whether or not the probe succeeds.
    pub async fn infer_types(
        &mut self,
        table: &str,
        dataset: &Dataset,
    ) -> Result<Vec<(String, SqlType)>> {
        if dataset.columns().is_empty() {
            return Err(
                Error::General("cannot infer types of a dataset without columns".into()).into(),
            );
        }
        let sample = dataset.head(self.config.infer_row_count);
        let width = sample.columns().len();
        let scratch = self.dialect.scratch_table(table);
        let staged = self.dialect.scratch_columns(width);

        let mut raw = vec![scratch.clone()];
        raw.extend(staged.iter().cloned());
        let names = self.identifiers(&raw).await?;

        let mut statements = self.dialect.stage_scratch(&scratch, width, &names)?;
        statements.extend(self.dialect.insert(
            &scratch,
            &staged,
            &staging_rows(&sample),
            None,
            &names,
        )?);
        let probe = self.dialect.infer_probe(&scratch, sample.columns(), &names)?;
        let drop = self.dialect.drop_table(&scratch, &names)?;

        let probed = match execute_all(&mut self.conn, &self.dialect, &statements).await {
            Ok(_) => fetch_all(&mut self.conn, &self.dialect, &probe).await,
            Err(err) => Err(err),
        };
        execute(&mut self.conn, &self.dialect, &drop).await?;

        let rows = probed?
            .iter()
            .map(|row| {
                Ok(ProbeRow {
                    column_name: row.try_get("column_name")?,
                    type_name: row.try_get("type_name")?,
                    max_len: row.try_get("max_len")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()?;

        let types = resolve_types(&sample, &rows)?;
        info!(
            table,
            columns = width,
            rows = sample.len(),
            "Inferred column types"
        );
        Ok(types)
    }
}
