//! # tabsql-core
//!
//! The I/O-free half of tabsql: everything needed to move an in-memory
//! [`Dataset`] into a relational table without talking to a database yet.
//!
//! - [`Value`] is the tagged cell model; [`SqlType`] and [`HostType`] are
//!   the closed engine and host type vocabularies.
//! - [`Condition`] parses free-text filters into parameterized predicates.
//! - [`Schema`] maps catalog rows to typed column specs.
//! - [`infer`] holds the client side of the type inference probe.
//! - [`Dialect`] synthesizes CREATE TABLE, MERGE, SELECT and the inference
//!   probe for SQL Server ([`TsqlDialect`]) and SQLite ([`SqliteDialect`]).
//!
//! ## Example
//!
//! ```
//! use tabsql_core::Condition;
//!
//! let condition = Condition::parse("ColumnA > 5 AND ColumnB IS NULL").unwrap();
//! let quoted = vec!["[ColumnA]".to_string(), "[ColumnB]".to_string()];
//! let (sql, args) = condition.render(&quoted).unwrap();
//! assert_eq!(sql, "[ColumnA] > ? AND [ColumnB] IS NULL");
//! assert_eq!(args.len(), 1);
//! ```

pub mod condition;
pub mod dataset;
pub mod definition;
pub mod dialect;
pub mod error;
pub mod infer;
pub mod schema;
pub mod types;
pub mod value;

pub use condition::{Clause, Condition, Connective, Operator};
pub use dataset::Dataset;
pub use definition::{PrimaryKey, TableDefinition, IDENTITY_COLUMN};
pub use dialect::{
    Dialect, Identifiers, MergeMode, MergePlan, Order, SelectPlan, SqliteDialect, Statement,
    TsqlDialect,
};
pub use error::{Error, Result};
pub use schema::{CatalogColumn, ColumnSpec, Schema};
pub use types::{HostType, Size, SqlType};
pub use value::Value;
