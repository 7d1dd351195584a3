#[cfg(test)]
mod tests;

pub mod pretty;

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, io, path::PathBuf, time::Duration};
use thiserror::Error;
use types::{SqlType, Value};

/// Identifier for a column within a table schema.
pub type ColumnId = u16;

/// Identifier for a table registered in the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(pub u64);

/// Positional row representation backed by `types::Value`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Named projection of a row keyed by column name, produced at the
/// facade boundary for rendering query results.
pub type RowMap = HashMap<String, Value>;

/// Rectangular result set carrying column labels and rows.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordBatch {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

/// Canonical error type shared across database subsystems.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("parse error at position {position}: expected {expected}")]
    ParseError { position: usize, expected: String },
    #[error("parse: {0}")]
    Parser(String),
    #[error("plan: {0}")]
    Planner(String),
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("column '{column}' ambiguous between {candidates:?}")]
    AmbiguousColumn {
        column: String,
        candidates: Vec<String>,
    },
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: SqlType, found: SqlType },
    #[error("aggregation misuse: {0}")]
    AggregationMisuse(String),
    #[error("exec: {0}")]
    Executor(String),
    #[error("catalog: {0}")]
    Catalog(String),
    #[error("primary key violation: {0}")]
    PKViolation(String),
    #[error("foreign key violation: {0}")]
    FKViolation(String),
    #[error("key type mismatch on index '{index}': expected {expected}, found {found}")]
    KeyTypeMismatch {
        index: String,
        expected: SqlType,
        found: SqlType,
    },
    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),
    #[error("ddl failed: {0}")]
    DDLFailed(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result alias that carries a `DbError`.
pub type DbResult<T> = Result<T, DbError>;

/// Runtime configuration for the database engine.
///
/// # Example
/// ```
/// use common::Config;
/// use std::path::PathBuf;
///
/// let config = Config::builder()
///     .data_dir(PathBuf::from("./my_db"))
///     .page_size(8192)
///     .build();
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, bon::Builder)]
pub struct Config {
    /// Directory where the catalog snapshot and index files live.
    #[builder(default = PathBuf::from("./db_data"))]
    pub data_dir: PathBuf,
    /// Fixed-size page allocation used by the ordered index store, in bytes.
    #[builder(default = 4096)]
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./db_data"),
            page_size: 4096,
        }
    }
}

impl Config {
    /// Name of the catalog snapshot file within `data_dir`.
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("catalog.json")
    }

    /// Name of the lockfile guarding single-engine ownership of `data_dir`.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("LOCK")
    }

    /// Filename for an index's on-disk file: `<table>__<column>.idx`.
    pub fn index_path(&self, table: &str, column: &str) -> PathBuf {
        self.data_dir.join(format!("{table}__{column}.idx"))
    }
}

/// Execution statistics collected during query execution, exposed through
/// the facade's debug access-path hook.
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    pub open_time: Duration,
    pub total_next_time: Duration,
    pub close_time: Duration,
    pub rows_produced: u64,
    pub rows_filtered: u64,
    pub access_path: Option<String>,
}

impl ExecutionStats {
    pub fn total_time(&self) -> Duration {
        self.open_time + self.total_next_time + self.close_time
    }

    pub fn format_duration(d: Duration) -> String {
        let micros = d.as_micros();
        if micros < 1000 {
            format!("{micros}µs")
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1000.0)
        } else {
            format!("{:.3}s", micros as f64 / 1_000_000.0)
        }
    }
}

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{Config, DbError, DbResult, ExecutionStats, RecordBatch, Row, RowMap, TableId};
    pub use types::{SqlType, Value};
}
