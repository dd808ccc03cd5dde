//! Move in-memory datasets in and out of relational tables.
//!
//! `tabsql` creates tables shaped after a [`Dataset`], inserts into them,
//! and reconciles later datasets with what is already stored:
//!
//! - **Create** - column types are inferred by the database engine itself
//!   from a sample of the data, then the rows are inserted
//! - **Insert / Update / Upsert / Merge** - write paths with optional
//!   `_time_insert` / `_time_update` stamps and optional schema adjustment
//! - **Select** - read back with a parameterized filter, converted to host
//!   types
//!
//! Every identifier is quoted by the engine's own quoting function before it
//! reaches a statement, and every value travels as a bound parameter.
//!
//! Statement synthesis lives in `tabsql-core` and covers SQLite and SQL
//! Server. This crate executes the SQLite dialect through sqlx.
//!
//! # Example
//!
//! ```rust,no_run
//! use tabsql::{Dataset, EngineConfig, PrimaryKey, Select, SqliteEngine, Value};
//!
//! # async fn run() -> tabsql::Result<()> {
//! let config = EngineConfig::default().metadata_timestamps(true);
//! let mut engine = SqliteEngine::connect_with("sqlite::memory:", config).await?;
//!
//! let orders = Dataset::from_rows(
//!     ["id", "total"],
//!     vec![vec![Value::from(1), Value::from(9.5)]],
//! )?;
//! engine
//!     .create_table_from_dataset("orders", &orders, PrimaryKey::Infer)
//!     .await?;
//!
//! let changed = Dataset::from_rows(
//!     ["id", "total"],
//!     vec![vec![Value::from(1), Value::from(12.0)], vec![Value::from(2), Value::from(3.0)]],
//! )?;
//! engine.merge("orders", &changed, &[], &[]).await?;
//!
//! let big = engine
//!     .select(&Select::from_table("orders").filter("total > 5"))
//!     .await?;
//! assert_eq!(big.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod read;
pub mod write;

mod create;
mod infer;
mod introspect;
mod sanitize;

pub use config::EngineConfig;
pub use engine::SqliteEngine;
pub use error::{Result, TabsqlError};
pub use read::Select;
pub use write::{TIME_INSERT_COLUMN, TIME_UPDATE_COLUMN};

pub use tabsql_core::{
    Condition, Dataset, Error, HostType, PrimaryKey, Schema, Size, SqlType, TableDefinition,
    Value, IDENTITY_COLUMN,
};
