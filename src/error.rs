//! Structured error taxonomy for the exporter.
//!
//! Every failure mode named in the design is its own variant so callers
//! can match on `kind` rather than parse a message. Nothing here is
//! retried internally; an export is all-or-nothing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("table {0} has no primary key")]
    PrimaryKeyMissing(String),

    #[error("table {0} has a composite primary key, which the walker cannot drive traversal from")]
    CompositePrimaryKey(String),

    #[error("metadata error on {table}{}: {message}", column.as_deref().map(|c| format!(".{c}")).unwrap_or_default())]
    MetadataError {
        table: String,
        column: Option<String>,
        message: String,
    },

    #[error("query error on {table}: {message}")]
    QueryError { table: String, message: String },

    #[error("could not coerce value for {table}.{column} (declared type {declared_type}): {message}")]
    CoercionError {
        table: String,
        column: String,
        declared_type: String,
        message: String,
    },

    #[error("cyclic dependencies among tables: {0:?}")]
    CyclicDependencies(Vec<String>),

    #[error("unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("export cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
