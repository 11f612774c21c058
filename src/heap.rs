//! Heap storage: table lifecycle and row operations over the page stack.
//!
//! A heap table is an unordered, append-mostly sequence of pages with no
//! ordering guarantee beyond insertion. [`TableStore`] is the capability
//! seam the executor works against:
//!
//! - [`HeapStorage`]: the paged, file-backed default implementation
//! - [`MemoryStore`]: an in-memory implementation for tests

mod memory;
mod paged;

pub use memory::MemoryStore;
pub use paged::HeapStorage;

use std::fmt;

use crate::catalog::ColumnDef;
use crate::storage::{BufferError, StorageError, Value};

/// Errors from heap operations.
#[derive(Debug)]
pub enum HeapError {
    /// Error from the page file layer.
    Storage(StorageError),
    /// Error from the buffer pool.
    Buffer(BufferError),
    /// A column name did not resolve against the table's schema.
    ColumnNotFound {
        table: String,
        column: String,
    },
    /// A rebuilt row no longer fits its page.
    RowTooLarge {
        table: String,
        page_no: u64,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::Storage(e) => write!(f, "storage error: {}", e),
            HeapError::Buffer(e) => write!(f, "buffer error: {}", e),
            HeapError::ColumnNotFound { table, column } => {
                write!(
                    f,
                    "column \"{}\" of relation \"{}\" does not exist",
                    column, table
                )
            }
            HeapError::RowTooLarge { table, page_no } => {
                write!(
                    f,
                    "updated row no longer fits page {} of relation \"{}\"",
                    page_no, table
                )
            }
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Storage(e) => Some(e),
            HeapError::Buffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for HeapError {
    fn from(e: StorageError) -> Self {
        HeapError::Storage(e)
    }
}

impl From<BufferError> for HeapError {
    fn from(e: BufferError) -> Self {
        HeapError::Buffer(e)
    }
}

/// Summary of a table returned by [`TableStore::table_info`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub row_count: u64,
    pub page_count: u64,
    pub data_pages: u64,
    pub file_size: u64,
    /// Creation time as unix seconds.
    pub created_at: i64,
    pub schema: Vec<ColumnDef>,
}

/// Row predicate used by [`TableStore::update_rows`].
pub type RowPredicate<'a> = &'a (dyn Fn(&[Value]) -> bool + Sync);

/// Capability interface for table storage.
///
/// The default implementation is the paged heap ([`HeapStorage`]); the seam
/// exists so tests can run the executor against [`MemoryStore`] without
/// touching disk.
pub trait TableStore: Send + Sync {
    /// Creates a table with the given schema.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileAlreadyExists`] (wrapped) if the table
    /// already exists.
    fn create_table(
        &self,
        table: &str,
        columns: Vec<ColumnDef>,
    ) -> impl Future<Output = Result<(), HeapError>> + Send;

    /// Returns true if the table exists.
    fn table_exists(&self, table: &str) -> impl Future<Output = bool> + Send;

    /// Returns the table's column definitions.
    fn get_schema(&self, table: &str)
    -> impl Future<Output = Result<Vec<ColumnDef>, HeapError>> + Send;

    /// Inserts a row and returns its row id.
    fn insert_row(
        &self,
        table: &str,
        values: Vec<Value>,
    ) -> impl Future<Output = Result<u64, HeapError>> + Send;

    /// Returns every row's values in insertion order.
    fn select_all_rows(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Vec<Vec<Value>>, HeapError>> + Send;

    /// Sets `column` to `new_value` on every row matching `predicate`.
    ///
    /// Returns the number of rows updated.
    fn update_rows(
        &self,
        table: &str,
        column: &str,
        new_value: Value,
        predicate: RowPredicate<'_>,
    ) -> impl Future<Output = Result<u64, HeapError>> + Send;

    /// Returns a summary of the table.
    fn table_info(&self, table: &str) -> impl Future<Output = Result<TableInfo, HeapError>> + Send;
}
