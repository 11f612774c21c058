//! Paged storage stack: slotted pages, per-table page files, and the shared
//! buffer pool.

pub mod buffer;
pub mod error;
pub mod page;
pub mod pagefile;
pub mod tuple;
pub mod value;

pub use buffer::{BufferPool, DEFAULT_BUFFER_SIZE, PageKey};
pub use error::{BufferError, StorageError};
pub use page::{LINE_POINTER_SIZE, PAGE_FORMAT_VERSION, PAGE_HEADER_SIZE, PAGE_SIZE, Page, PageHeader};
pub use pagefile::PageFiles;
pub use tuple::Tuple;
pub use value::Value;
