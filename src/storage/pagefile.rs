//! Per-table page file I/O.
//!
//! Each table lives in one append-only file, `<data_root>/pages/<table>.pages`,
//! whose length is always a multiple of [`PAGE_SIZE`]. Page 0 is the header
//! page; pages 1..N-1 hold data. All I/O is positioned at page-aligned
//! offsets through `tokio::fs`.
//!
//! # File Layout
//!
//! ```text
//! +------------------+------------------+------------------+
//! | Page 0 (header)  | Page 1 (data)    | Page 2 (data)    | ...
//! +------------------+------------------+------------------+
//! ^ offset 0         ^ offset 8192      ^ offset 16384
//! ```

use std::path::PathBuf;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::catalog::TableMeta;

use super::error::StorageError;
use super::page::{PAGE_SIZE, Page};

/// Manager for per-table page files.
///
/// Holds no pages in memory; every operation opens the file, performs one
/// positioned transfer, and lets the handle drop. Serialization of writes to
/// a single page is the caller's responsibility (the buffer pool keeps pages
/// pinned and dirty until flush, and the heap layer serializes writers per
/// table).
#[derive(Debug, Clone)]
pub struct PageFiles {
    pages_dir: PathBuf,
}

impl PageFiles {
    /// Creates a manager rooted at `<data_root>/pages`.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            pages_dir: data_root.into().join("pages"),
        }
    }

    /// Creates the pages directory if it does not exist.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.pages_dir).await?;
        Ok(())
    }

    /// Returns the path of a table's page file.
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.pages_dir.join(format!("{}.pages", table))
    }

    /// Creates a new page file with its initial header page.
    ///
    /// The header page carries a bootstrap metadata tuple; the heap layer
    /// overwrites it with the real schema immediately after.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::FileAlreadyExists`] if the table already has a
    /// page file.
    pub async fn create(&self, table: &str) -> Result<(), StorageError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.table_path(table))
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::FileAlreadyExists(table.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut header = Page::new(0);
        header.add_tuple(0, &[TableMeta::bootstrap(table).to_value()])?;
        file.write_all(&header.serialize()).await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Returns true if the table's page file exists.
    pub async fn exists(&self, table: &str) -> bool {
        tokio::fs::try_exists(self.table_path(table))
            .await
            .unwrap_or(false)
    }

    /// Reads page `n` of a table.
    ///
    /// # Errors
    ///
    /// - [`StorageError::FileNotFound`] if the page file is missing.
    /// - [`StorageError::PageNotFound`] if `n` is beyond the end of file.
    /// - [`StorageError::Deserialize`] on partial or malformed page data.
    pub async fn read(&self, table: &str, n: u64) -> Result<Page, StorageError> {
        let mut file = self.open(table).await?;
        let size = file.metadata().await?.len();
        let offset = n * PAGE_SIZE as u64;
        if offset >= size {
            return Err(StorageError::PageNotFound(n));
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        if let Err(e) = file.read_exact(&mut buf).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                return Err(StorageError::Deserialize(format!(
                    "partial page {} in table \"{}\"",
                    n, table
                )));
            }
            return Err(e.into());
        }
        Page::deserialize(&buf)
    }

    /// Writes page `n` of a table in place.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PageNotFound`] when writing beyond the end of
    /// the file; use [`append`](Self::append) to grow it.
    pub async fn write(&self, table: &str, n: u64, page: &Page) -> Result<(), StorageError> {
        let mut file = self.open(table).await?;
        let size = file.metadata().await?.len();
        let offset = n * PAGE_SIZE as u64;
        if offset >= size {
            return Err(StorageError::PageNotFound(n));
        }

        file.seek(std::io::SeekFrom::Start(offset)).await?;
        file.write_all(&page.serialize()).await?;
        Ok(())
    }

    /// Appends a page at the end of the file and returns its page number.
    pub async fn append(&self, table: &str, page: &Page) -> Result<u64, StorageError> {
        let mut file = self.open(table).await?;
        let offset = file.seek(std::io::SeekFrom::End(0)).await?;
        file.write_all(&page.serialize()).await?;
        Ok(offset / PAGE_SIZE as u64)
    }

    /// Returns the number of pages in the table's file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Deserialize`] if the file length is not a
    /// multiple of the page size.
    pub async fn page_count(&self, table: &str) -> Result<u64, StorageError> {
        let size = self.file_size(table).await?;
        if size % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Deserialize(format!(
                "file size {} is not a multiple of page size {}",
                size, PAGE_SIZE
            )));
        }
        Ok(size / PAGE_SIZE as u64)
    }

    /// Returns the byte length of the table's page file.
    pub async fn file_size(&self, table: &str) -> Result<u64, StorageError> {
        match tokio::fs::metadata(self.table_path(table)).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(table.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Finds the first data page with room for `bytes_needed` more tuple
    /// bytes. First fit suffices at this scale.
    ///
    /// Pages that fail to read are skipped with a warning rather than
    /// aborting the scan.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NoDataPages`] if the file holds only the header page.
    /// - [`StorageError::NoSpace`] if no data page has room.
    pub async fn find_page_with_space(
        &self,
        table: &str,
        bytes_needed: usize,
    ) -> Result<u64, StorageError> {
        let count = self.page_count(table).await?;
        if count <= 1 {
            return Err(StorageError::NoDataPages);
        }
        for n in 1..count {
            match self.read(table, n).await {
                Ok(page) if page.has_space_for(bytes_needed) => return Ok(n),
                Ok(_) => {}
                Err(e) => {
                    eprintln!(
                        "warning: skipping unreadable page {} of \"{}\": {}",
                        n, table, e
                    );
                }
            }
        }
        Err(StorageError::NoSpace)
    }

    /// Removes a table's page file.
    pub async fn remove(&self, table: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.table_path(table)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(table.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, table: &str) -> Result<File, StorageError> {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.table_path(table))
            .await
        {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::FileNotFound(table.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;
    use tempfile::tempdir;

    async fn files() -> (tempfile::TempDir, PageFiles) {
        let dir = tempdir().unwrap();
        let files = PageFiles::new(dir.path());
        files.init().await.unwrap();
        (dir, files)
    }

    fn data_page(page_id: u64, rows: u64) -> Page {
        let mut page = Page::new(page_id);
        for i in 0..rows {
            page.add_tuple(i + 1, &[Value::Int64(i as i64)]).unwrap();
        }
        page
    }

    #[tokio::test]
    async fn test_create_writes_header_page() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();

        assert!(files.exists("users").await);
        assert_eq!(files.page_count("users").await.unwrap(), 1);

        let header = files.read("users", 0).await.unwrap();
        let tuples = header.tuples().unwrap();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].row_id, 0);
        let meta = TableMeta::from_value(&tuples[0].values[0]).unwrap();
        assert_eq!(meta.table_name, "users");
        assert_eq!(meta.total_tuples, 0);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();
        assert!(matches!(
            files.create("users").await,
            Err(StorageError::FileAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let (_dir, files) = files().await;
        assert!(matches!(
            files.read("ghost", 0).await,
            Err(StorageError::FileNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_past_eof() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();
        assert!(matches!(
            files.read("users", 5).await,
            Err(StorageError::PageNotFound(5))
        ));
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();

        let page = data_page(1, 3);
        let n = files.append("users", &page).await.unwrap();
        assert_eq!(n, 1);
        assert_eq!(files.page_count("users").await.unwrap(), 2);

        let read_back = files.read("users", 1).await.unwrap();
        assert_eq!(read_back, page);
    }

    #[tokio::test]
    async fn test_write_in_place() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();
        files.append("users", &data_page(1, 1)).await.unwrap();

        let replacement = data_page(1, 5);
        files.write("users", 1, &replacement).await.unwrap();
        assert_eq!(files.read("users", 1).await.unwrap(), replacement);
        // Length unchanged: the write was positioned, not appended.
        assert_eq!(files.page_count("users").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_write_past_eof() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();
        assert!(matches!(
            files.write("users", 3, &data_page(3, 0)).await,
            Err(StorageError::PageNotFound(3))
        ));
    }

    #[tokio::test]
    async fn test_find_page_with_space() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();

        assert!(matches!(
            files.find_page_with_space("users", 16).await,
            Err(StorageError::NoDataPages)
        ));

        // Page 1 nearly full, page 2 has room.
        let mut full = Page::new(1);
        while full.has_space_for(600) {
            full.add_tuple(1, &[Value::Text("z".repeat(580))]).unwrap();
        }
        files.append("users", &full).await.unwrap();
        files.append("users", &data_page(2, 1)).await.unwrap();

        assert_eq!(files.find_page_with_space("users", 600).await.unwrap(), 2);
        // Small requests still land on the first page that fits.
        assert!(files.find_page_with_space("users", 8).await.unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_find_page_with_space_none_fit() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();
        let mut full = Page::new(1);
        while full.has_space_for(600) {
            full.add_tuple(1, &[Value::Text("z".repeat(580))]).unwrap();
        }
        files.append("users", &full).await.unwrap();

        assert!(matches!(
            files.find_page_with_space("users", 4000).await,
            Err(StorageError::NoSpace)
        ));
    }

    #[tokio::test]
    async fn test_partial_page_is_deserialize_error() {
        let (dir, files) = files().await;
        files.create("users").await.unwrap();
        // Corrupt the file with a trailing partial page.
        let path = files.table_path("users");
        let mut contents = tokio::fs::read(&path).await.unwrap();
        contents.extend_from_slice(&[0u8; 100]);
        tokio::fs::write(&path, contents).await.unwrap();

        assert!(matches!(
            files.page_count("users").await,
            Err(StorageError::Deserialize(_))
        ));
        drop(dir);
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, files) = files().await;
        files.create("users").await.unwrap();
        files.remove("users").await.unwrap();
        assert!(!files.exists("users").await);
        assert!(matches!(
            files.remove("users").await,
            Err(StorageError::FileNotFound(_))
        ));
    }
}
