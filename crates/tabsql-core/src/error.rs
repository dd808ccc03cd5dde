//! Error types shared by every component.

use thiserror::Error;

/// Errors raised while sanitizing, parsing, inferring or synthesizing statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// One or more identifiers could not be quoted by the engine.
    #[error("unsafe identifier(s): {}", quoted_list(.identifiers))]
    UnsafeIdentifier {
        /// The identifiers the engine refused to quote.
        identifiers: Vec<String>,
    },

    /// A filter clause did not match any comparison operator.
    #[error("invalid filter syntax in clause '{clause}': {reason}")]
    InvalidFilterSyntax {
        /// The offending clause, as written.
        clause: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The table has no columns, usually because it does not exist.
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    /// The engine reported a type outside the supported mapping.
    #[error("unsupported type(s) in table '{table}': {}", pairs(.columns))]
    UnsupportedType {
        /// Table being read, or empty when a type string was parsed standalone.
        table: String,
        /// `(column, engine type)` pairs.
        columns: Vec<(String, String)>,
    },

    /// Both an explicit primary key column and an identity column were requested.
    #[error(
        "table '{table}' cannot have both primary key column '{primary_key}' and identity column '{identity}'"
    )]
    ConflictingPrimaryKey {
        /// Table being created.
        table: String,
        /// Requested primary key column.
        primary_key: String,
        /// Requested identity column.
        identity: String,
    },

    /// Columns referenced by a write are missing from the table or the dataset.
    #[error("column(s) not found in '{table}': {}", quoted_list(.columns))]
    ColumnNotFound {
        /// Table (or dataset) that lacks the columns.
        table: String,
        /// Missing columns.
        columns: Vec<String>,
    },

    /// Values are too large for the columns they are written to.
    #[error("insufficient column size in table '{table}': {}", quoted_list(.columns))]
    InsufficientColumnSize {
        /// Target table.
        table: String,
        /// Columns that would need widening.
        columns: Vec<String>,
    },

    /// No match columns were given and the table has no primary key.
    #[error("table '{0}' has no primary key and no match columns were given")]
    UndefinedPrimaryKey(String),

    /// A value read from the engine does not fit the column's host type.
    #[error("cannot convert value '{value}' of column '{column}' to {target}")]
    Conversion {
        /// Column being decoded.
        column: String,
        /// Textual form of the value.
        value: String,
        /// Host type that was expected.
        target: String,
    },

    /// Anything else.
    #[error("{0}")]
    General(String),
}

fn quoted_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("'{item}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pairs(items: &[(String, String)]) -> String {
    items
        .iter()
        .map(|(column, ty)| format!("'{column}' ({ty})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
