//! Storage layer errors.

use std::fmt;

/// Errors from the page, page-file, and buffer layers.
#[derive(Debug)]
pub enum StorageError {
    /// The page file for a table does not exist.
    FileNotFound(String),
    /// Attempted to create a page file that already exists.
    FileAlreadyExists(String),
    /// The requested page number is beyond the end of the file.
    PageNotFound(u64),
    /// A page has no room for the tuple being added.
    NoSpace,
    /// The file has a header page but no data pages yet.
    NoDataPages,
    /// Raw bytes could not be decoded as a page or tuple.
    Deserialize(String),
    /// A page buffer was not exactly [`PAGE_SIZE`](crate::storage::PAGE_SIZE) bytes.
    InvalidPageSize {
        /// Expected size (PAGE_SIZE).
        expected: usize,
        /// Size actually provided.
        actual: usize,
    },
    /// I/O error from the underlying file system.
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(table) => {
                write!(f, "page file for table \"{}\" not found", table)
            }
            StorageError::FileAlreadyExists(table) => {
                write!(f, "page file for table \"{}\" already exists", table)
            }
            StorageError::PageNotFound(n) => write!(f, "page {} not found", n),
            StorageError::NoSpace => write!(f, "no page with enough free space"),
            StorageError::NoDataPages => write!(f, "file has no data pages"),
            StorageError::Deserialize(msg) => write!(f, "deserialize error: {}", msg),
            StorageError::InvalidPageSize { expected, actual } => {
                write!(f, "invalid page size: expected {}, got {}", expected, actual)
            }
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Errors from the buffer pool.
#[derive(Debug)]
pub enum BufferError {
    /// `mark_dirty` was called for a page that is not pinned.
    PageNotPinned,
    /// The page is not present in the cache.
    PageNotCached,
    /// Underlying storage error (disk read on the slow path, flush on eviction).
    Storage(StorageError),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::PageNotPinned => write!(f, "page is not pinned"),
            BufferError::PageNotCached => write!(f, "page is not in the buffer pool"),
            BufferError::Storage(e) => write!(f, "storage error: {}", e),
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for BufferError {
    fn from(e: StorageError) -> Self {
        BufferError::Storage(e)
    }
}
