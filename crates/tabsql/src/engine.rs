//! The SQLite engine and its statement plumbing.

use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{Connection, Row, Sqlite, TypeInfo, ValueRef};
use tabsql_core::{Dialect, Error, SqliteDialect, Statement, Value};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::Result;

/// Moves datasets in and out of tables on one SQLite connection.
///
/// Operations take `&mut self` and run one after another. Writes run inside
/// a transaction, so a failed write leaves the table untouched.
#[derive(Debug)]
pub struct SqliteEngine {
    pub(crate) conn: SqliteConnection,
    pub(crate) dialect: SqliteDialect,
    pub(crate) config: EngineConfig,
}

impl SqliteEngine {
    /// Wraps a connection with the default configuration.
    #[must_use]
    pub fn new(conn: SqliteConnection) -> Self {
        Self::with_config(conn, EngineConfig::default())
    }

    /// Wraps a connection.
    #[must_use]
    pub fn with_config(conn: SqliteConnection, config: EngineConfig) -> Self {
        Self {
            conn,
            dialect: SqliteDialect::new(),
            config,
        }
    }

    /// Opens a connection, e.g. `sqlite::memory:` or `sqlite://data.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, EngineConfig::default()).await
    }

    /// Opens a connection with a configuration.
    pub async fn connect_with(url: &str, config: EngineConfig) -> Result<Self> {
        let conn = SqliteConnection::connect(url).await?;
        debug!(url, dialect = SqliteDialect::new().name(), "Connected");
        Ok(Self::with_config(conn, config))
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The underlying connection, for statements the engine does not cover.
    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Releases the connection.
    #[must_use]
    pub fn into_connection(self) -> SqliteConnection {
        self.conn
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Binds a value to a query.
///
/// Temporal values travel as text with the engine's fractional precision.
fn bind_value<'q>(
    query: SqliteQuery<'q>,
    value: &Value,
    fraction_digits: usize,
) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(b) => query.bind(*b),
        Value::TinyInt(i) => query.bind(i64::from(*i)),
        Value::SmallInt(i) => query.bind(i64::from(*i)),
        Value::Int(i) => query.bind(i64::from(*i)),
        Value::BigInt(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        temporal @ (Value::Time(_) | Value::Date(_) | Value::DateTime(_)) => {
            let (text, truncated) = temporal
                .temporal_text(fraction_digits)
                .unwrap_or_default();
            if truncated {
                warn!(value = %temporal, stored = %text, "Truncating fractional seconds");
            }
            query.bind(text)
        }
    }
}

fn prepare<'q>(statement: &'q Statement, fraction_digits: usize) -> SqliteQuery<'q> {
    debug!(sql = %statement.sql, params = statement.params.len(), "Executing SQL");
    statement
        .params
        .iter()
        .fold(sqlx::query(&statement.sql), |query, value| {
            bind_value(query, value, fraction_digits)
        })
}

/// Executes one statement, returning the number of affected rows.
pub(crate) async fn execute(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    statement: &Statement,
) -> Result<u64> {
    let result = prepare(statement, dialect.fraction_digits())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Executes statements in order, returning the total affected rows.
pub(crate) async fn execute_all(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    statements: &[Statement],
) -> Result<u64> {
    let mut affected = 0;
    for statement in statements {
        affected += execute(conn, dialect, statement).await?;
    }
    Ok(affected)
}

/// Runs a query and collects its rows.
pub(crate) async fn fetch_all(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    statement: &Statement,
) -> Result<Vec<SqliteRow>> {
    Ok(prepare(statement, dialect.fraction_digits())
        .fetch_all(&mut *conn)
        .await?)
}

/// Runs a query expected to return exactly one row.
pub(crate) async fn fetch_one(
    conn: &mut SqliteConnection,
    dialect: &SqliteDialect,
    statement: &Statement,
) -> Result<SqliteRow> {
    Ok(prepare(statement, dialect.fraction_digits())
        .fetch_one(&mut *conn)
        .await?)
}

/// Reads a cell by its storage class.
pub(crate) fn decode_cell(row: &SqliteRow, index: usize) -> Result<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => Value::BigInt(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "NUMERIC" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => {
            return Err(Error::General(format!(
                "column {index} holds a BLOB, which has no host type"
            ))
            .into())
        }
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}
