//! Reading tables back into datasets.

use tabsql_core::{Condition, Dataset, Dialect, Error, Order, SelectPlan};
use tracing::debug;

use crate::engine::{decode_cell, fetch_all, SqliteEngine};
use crate::error::Result;

/// A SELECT over one table.
///
/// # Example
///
/// ```
/// use tabsql::Select;
///
/// let query = Select::from_table("orders")
///     .columns(["id", "total"])
///     .filter("total > 100 AND status IS NOT NULL")
///     .order_by_desc("total")
///     .limit(10);
/// assert_eq!(query.table(), "orders");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Select {
    table: String,
    columns: Vec<String>,
    filter: Option<String>,
    order_by: Option<(String, Order)>,
    limit: Option<u64>,
}

impl Select {
    /// Selects every column of `table`.
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Restricts the selected columns.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Filters rows with a condition such as `a > 5 AND b IS NULL`.
    pub fn filter(mut self, condition: impl Into<String>) -> Self {
        self.filter = Some(condition.into());
        self
    }

    /// Sorts ascending.
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some((column.into(), Order::Asc));
        self
    }

    /// Sorts descending.
    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some((column.into(), Order::Desc));
        self
    }

    /// Returns at most `limit` rows.
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Table being read.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl SqliteEngine {
    /// Runs a [`Select`], converting every cell to its column's host type.
    pub async fn select(&mut self, query: &Select) -> Result<Dataset> {
        let schema = self.get_schema(&query.table).await?;
        let columns = if query.columns.is_empty() {
            schema.names()
        } else {
            query.columns.clone()
        };
        let unknown: Vec<String> = columns
            .iter()
            .filter(|column| !schema.contains(column))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(Error::ColumnNotFound {
                table: query.table.clone(),
                columns: unknown,
            }
            .into());
        }
        let condition = query.filter.as_deref().map(Condition::parse).transpose()?;

        let mut raw = vec![query.table.clone()];
        raw.extend(columns.iter().cloned());
        if let Some(condition) = &condition {
            raw.extend(condition.columns());
        }
        if let Some((column, _)) = &query.order_by {
            raw.push(column.clone());
        }
        let names = self.identifiers(&raw).await?;

        let predicate = match &condition {
            Some(condition) => Some(condition.render(&names.all(&condition.columns())?)?),
            None => None,
        };
        let plan = SelectPlan {
            table: &query.table,
            columns: &columns,
            predicate,
            order_by: query
                .order_by
                .as_ref()
                .map(|(column, order)| (column.as_str(), *order)),
            limit: query.limit,
        };
        let statement = self.dialect.select(&plan, &names)?;
        let rows = fetch_all(&mut self.conn, &self.dialect, &statement).await?;

        let host_types: Vec<_> = columns
            .iter()
            .map(|column| schema.column(column).map(|c| c.host_type()))
            .collect();
        let mut dataset = Dataset::new(columns.iter().cloned());
        for row in &rows {
            let mut values = Vec::with_capacity(columns.len());
            for (index, column) in columns.iter().enumerate() {
                let raw = decode_cell(row, index)?;
                let value = match host_types[index] {
                    Some(host) => host.coerce(raw.clone()).ok_or_else(|| Error::Conversion {
                        column: column.clone(),
                        value: raw.to_string(),
                        target: host.to_string(),
                    })?,
                    None => raw,
                };
                values.push(value);
            }
            dataset.push_row(values)?;
        }
        debug!(table = %query.table, rows = dataset.len(), "Selected rows");
        Ok(dataset)
    }

    /// Reads a whole table.
    pub async fn read_table(&mut self, table: &str) -> Result<Dataset> {
        self.select(&Select::from_table(table)).await
    }
}

impl From<&str> for Select {
    fn from(table: &str) -> Self {
        Self::from_table(table)
    }
}

