//! Executor errors.
//!
//! This is the single error surface the wire session translates into
//! `ErrorResponse` fields. Lower-level storage and buffer errors normalize
//! into it; user-visible messages mirror PostgreSQL phrasing.

use std::fmt;

use crate::heap::HeapError;
use crate::sql::SyntaxError;
use crate::storage::StorageError;

/// Errors surfaced by statement execution.
#[derive(Debug)]
pub enum ExecutorError {
    /// The referenced table does not exist.
    TableNotFound(String),
    /// CREATE TABLE of an existing table.
    TableAlreadyExists(String),
    /// The statement failed to parse.
    Syntax(SyntaxError),
    /// The statement is valid SQL but not supported by this engine.
    UnsupportedFeature(String),
    /// INSERT arity does not match the schema.
    ColumnCountMismatch { provided: usize, expected: usize },
    /// INSERT value category does not match the column type.
    TypeMismatch {
        column: String,
        actual: &'static str,
        expected: &'static str,
    },
    /// A string exceeds its varchar limit.
    ValueTooLong {
        column: String,
        length: usize,
        max: u32,
    },
    /// Catch-all for storage faults the executor cannot recover from.
    Internal(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::TableNotFound(table) => {
                write!(f, "relation \"{}\" does not exist", table)
            }
            ExecutorError::TableAlreadyExists(table) => {
                write!(f, "relation \"{}\" already exists", table)
            }
            ExecutorError::Syntax(e) => write!(f, "{}", e),
            ExecutorError::UnsupportedFeature(what) => {
                write!(f, "{} is not supported", what)
            }
            ExecutorError::ColumnCountMismatch { provided, expected } => {
                write!(
                    f,
                    "INSERT has {} expressions but table has {} columns",
                    provided, expected
                )
            }
            ExecutorError::TypeMismatch {
                column,
                actual,
                expected,
            } => {
                write!(
                    f,
                    "column \"{}\" is of type {} but value is of type {}",
                    column, expected, actual
                )
            }
            ExecutorError::ValueTooLong { max, .. } => {
                write!(f, "value too long for type character varying({})", max)
            }
            ExecutorError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExecutorError::Syntax(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyntaxError> for ExecutorError {
    fn from(e: SyntaxError) -> Self {
        ExecutorError::Syntax(e)
    }
}

impl From<HeapError> for ExecutorError {
    fn from(e: HeapError) -> Self {
        match e {
            HeapError::Storage(StorageError::FileNotFound(table)) => {
                ExecutorError::TableNotFound(table)
            }
            HeapError::Storage(StorageError::FileAlreadyExists(table)) => {
                ExecutorError::TableAlreadyExists(table)
            }
            other => ExecutorError::Internal(other.to_string()),
        }
    }
}
