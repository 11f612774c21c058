//! Paged heap storage over page files and the buffer pool.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::{ColumnDef, TableMeta};
use crate::storage::{BufferPool, Page, PageFiles, StorageError, Tuple, Value};

use super::{HeapError, RowPredicate, TableInfo, TableStore};

/// The default, file-backed table store.
///
/// All page reads and writes go through the buffer pool, so a row inserted by
/// one connection is visible to any subsequent scan the moment `insert_row`
/// returns. Writers to the same table are serialized by a per-table async
/// mutex held across the read-modify-mark_dirty window; readers are never
/// blocked by it.
pub struct HeapStorage {
    files: PageFiles,
    pool: Arc<BufferPool>,
    write_locks: parking_lot::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl HeapStorage {
    /// Creates heap storage over the given page files and pool.
    pub fn new(files: PageFiles, pool: Arc<BufferPool>) -> Self {
        Self {
            files,
            pool,
            write_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    async fn writer_lock(&self, table: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.write_locks.lock();
            Arc::clone(
                locks
                    .entry(table.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Reads the metadata record from the header page.
    async fn read_meta(&self, table: &str) -> Result<TableMeta, HeapError> {
        let page = self.pool.get_page(table, 0).await?;
        self.pool.unpin_page(table, 0);
        meta_from_page(&page).map_err(HeapError::from)
    }

    /// Rewrites the header page with an updated metadata record.
    ///
    /// The header page always holds exactly one tuple, so the rewrite builds
    /// a fresh page 0 and swaps it in through the pool in one `mark_dirty`.
    async fn write_meta(&self, table: &str, meta: &TableMeta) -> Result<(), HeapError> {
        let mut header = Page::new(0);
        header.add_tuple(0, &[meta.to_value()])?;

        self.pool.get_page(table, 0).await?;
        let result = self.pool.mark_dirty(table, 0, header);
        self.pool.unpin_page(table, 0);
        result.map_err(HeapError::from)
    }

    /// Appends an empty data page and returns its page number.
    async fn append_fresh_page(&self, table: &str) -> Result<u64, HeapError> {
        let page_no = self.files.page_count(table).await?;
        let page = Page::new(page_no);
        let appended = self.files.append(table, &page).await?;
        Ok(appended)
    }

    /// Adds an encoded row to the page, going through the pool's pin and
    /// dirty protocol.
    async fn add_to_page(
        &self,
        table: &str,
        page_no: u64,
        row_id: u64,
        values: &[Value],
    ) -> Result<(), HeapError> {
        let mut page = self.pool.get_page(table, page_no).await?;
        match page.add_tuple(row_id, values) {
            Ok(()) => {
                let result = self.pool.mark_dirty(table, page_no, page);
                self.pool.unpin_page(table, page_no);
                result.map_err(HeapError::from)
            }
            Err(e) => {
                self.pool.unpin_page(table, page_no);
                Err(e.into())
            }
        }
    }
}

fn meta_from_page(page: &Page) -> Result<TableMeta, StorageError> {
    let tuples = page.tuples()?;
    let tuple = tuples
        .first()
        .ok_or_else(|| StorageError::Deserialize("header page has no metadata tuple".into()))?;
    let value = tuple
        .values
        .first()
        .ok_or_else(|| StorageError::Deserialize("metadata tuple is empty".into()))?;
    TableMeta::from_value(value)
}

impl TableStore for HeapStorage {
    async fn create_table(&self, table: &str, columns: Vec<ColumnDef>) -> Result<(), HeapError> {
        let _guard = self.writer_lock(table).await;
        self.files.create(table).await?;

        let meta = TableMeta::new(table, columns);
        self.write_meta(table, &meta).await
    }

    async fn table_exists(&self, table: &str) -> bool {
        self.files.exists(table).await
    }

    async fn get_schema(&self, table: &str) -> Result<Vec<ColumnDef>, HeapError> {
        Ok(self.read_meta(table).await?.columns)
    }

    async fn insert_row(&self, table: &str, values: Vec<Value>) -> Result<u64, HeapError> {
        let _guard = self.writer_lock(table).await;

        let mut meta = self.read_meta(table).await?;
        let row_id = meta.total_tuples + 1;
        let size = Tuple::encoded_len(&values);

        let page_no = match self.files.find_page_with_space(table, size).await {
            Ok(n) => n,
            Err(StorageError::NoDataPages) | Err(StorageError::NoSpace) => {
                self.append_fresh_page(table).await?
            }
            Err(e) => return Err(e.into()),
        };

        match self.add_to_page(table, page_no, row_id, &values).await {
            Ok(()) => {}
            Err(HeapError::Storage(StorageError::NoSpace)) => {
                // The buffered copy is fuller than its on-disk image; fall
                // back to a fresh page.
                let fresh = self.append_fresh_page(table).await?;
                self.add_to_page(table, fresh, row_id, &values).await?;
            }
            Err(e) => return Err(e),
        }

        meta.total_tuples = row_id;
        self.write_meta(table, &meta).await?;
        Ok(row_id)
    }

    async fn select_all_rows(&self, table: &str) -> Result<Vec<Vec<Value>>, HeapError> {
        let count = self.files.page_count(table).await?;
        let mut rows = Vec::new();
        for page_no in 1..count {
            let page = match self.pool.get_page(table, page_no).await {
                Ok(page) => page,
                Err(e) => {
                    eprintln!(
                        "warning: skipping unreadable page {} of \"{}\": {}",
                        page_no, table, e
                    );
                    continue;
                }
            };
            self.pool.unpin_page(table, page_no);
            match page.tuples() {
                Ok(tuples) => rows.extend(tuples.into_iter().map(|t| t.values)),
                Err(e) => {
                    eprintln!(
                        "warning: skipping undecodable page {} of \"{}\": {}",
                        page_no, table, e
                    );
                }
            }
        }
        Ok(rows)
    }

    async fn update_rows(
        &self,
        table: &str,
        column: &str,
        new_value: Value,
        predicate: RowPredicate<'_>,
    ) -> Result<u64, HeapError> {
        let _guard = self.writer_lock(table).await;

        let meta = self.read_meta(table).await?;
        let ordinal = meta
            .column_ordinal(column)
            .ok_or_else(|| HeapError::ColumnNotFound {
                table: table.to_string(),
                column: column.to_string(),
            })?;

        let count = self.files.page_count(table).await?;
        let mut updated = 0u64;
        for page_no in 1..count {
            let page = match self.pool.get_page(table, page_no).await {
                Ok(page) => page,
                Err(e) => {
                    eprintln!(
                        "warning: skipping unreadable page {} of \"{}\": {}",
                        page_no, table, e
                    );
                    continue;
                }
            };

            let result = {
                let mut tuples = match page.tuples() {
                    Ok(tuples) => tuples,
                    Err(e) => {
                        eprintln!(
                            "warning: skipping undecodable page {} of \"{}\": {}",
                            page_no, table, e
                        );
                        self.pool.unpin_page(table, page_no);
                        continue;
                    }
                };

                let mut changed = 0u64;
                for tuple in &mut tuples {
                    if ordinal < tuple.values.len() && predicate(&tuple.values) {
                        tuple.values[ordinal] = new_value.clone();
                        changed += 1;
                    }
                }

                if changed == 0 {
                    Ok(0)
                } else {
                    // Rebuild the page from scratch with the same identity.
                    let mut rebuilt = Page::new(page.page_id());
                    let mut refit = Ok(());
                    for tuple in &tuples {
                        if let Err(e) = rebuilt.add_tuple(tuple.row_id, &tuple.values) {
                            refit = Err(match e {
                                StorageError::NoSpace => HeapError::RowTooLarge {
                                    table: table.to_string(),
                                    page_no,
                                },
                                other => other.into(),
                            });
                            break;
                        }
                    }
                    refit
                        .and_then(|()| {
                            self.pool
                                .mark_dirty(table, page_no, rebuilt)
                                .map_err(HeapError::from)
                        })
                        .map(|()| changed)
                }
            };

            self.pool.unpin_page(table, page_no);
            updated += result?;
        }
        Ok(updated)
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo, HeapError> {
        let meta = self.read_meta(table).await?;
        let page_count = self.files.page_count(table).await?;
        let file_size = self.files.file_size(table).await?;
        Ok(TableInfo {
            row_count: meta.total_tuples,
            page_count,
            data_pages: page_count.saturating_sub(1),
            file_size,
            created_at: meta.created_at,
            schema: meta.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnType;
    use tempfile::tempdir;

    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", ColumnType::Integer, None),
            ColumnDef::new("name", ColumnType::Varchar, Some(255)),
        ]
    }

    fn row(id: i64, name: &str) -> Vec<Value> {
        vec![Value::Int64(id), Value::Text(name.into())]
    }

    async fn heap() -> (tempfile::TempDir, HeapStorage) {
        let dir = tempdir().unwrap();
        let files = PageFiles::new(dir.path());
        files.init().await.unwrap();
        let pool = Arc::new(BufferPool::new(files.clone(), 16));
        (dir, HeapStorage::new(files, pool))
    }

    #[tokio::test]
    async fn test_create_table_and_schema() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();

        assert!(heap.table_exists("users").await);
        assert!(!heap.table_exists("ghost").await);
        assert_eq!(heap.get_schema("users").await.unwrap(), schema());
    }

    #[tokio::test]
    async fn test_create_table_twice() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();
        assert!(matches!(
            heap.create_table("users", schema()).await,
            Err(HeapError::Storage(StorageError::FileAlreadyExists(_)))
        ));
    }

    #[tokio::test]
    async fn test_insert_and_select() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();

        assert_eq!(heap.insert_row("users", row(1, "ada")).await.unwrap(), 1);
        assert_eq!(heap.insert_row("users", row(2, "bob")).await.unwrap(), 2);
        assert_eq!(heap.insert_row("users", row(3, "cyd")).await.unwrap(), 3);

        let rows = heap.select_all_rows("users").await.unwrap();
        assert_eq!(rows, vec![row(1, "ada"), row(2, "bob"), row(3, "cyd")]);
    }

    #[tokio::test]
    async fn test_row_ids_are_monotonic() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();
        for i in 1..=5 {
            let row_id = heap.insert_row("users", row(i, "x")).await.unwrap();
            assert_eq!(row_id, i as u64);
        }
        let info = heap.table_info("users").await.unwrap();
        assert_eq!(info.row_count, 5);
    }

    #[tokio::test]
    async fn test_select_missing_table() {
        let (_dir, heap) = heap().await;
        assert!(matches!(
            heap.select_all_rows("ghost").await,
            Err(HeapError::Storage(StorageError::FileNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_page_overflow_spills_to_new_pages() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();

        // 20 rows of ~500 bytes each cannot fit in two 8 KiB data pages.
        let long = "x".repeat(500);
        for i in 1..=20 {
            heap.insert_row("users", row(i, &long)).await.unwrap();
        }

        let info = heap.table_info("users").await.unwrap();
        assert!(info.page_count >= 3, "page_count = {}", info.page_count);
        assert_eq!(info.data_pages, info.page_count - 1);

        let rows = heap.select_all_rows("users").await.unwrap();
        assert_eq!(rows.len(), 20);
        for (i, r) in rows.iter().enumerate() {
            assert_eq!(r[0], Value::Int64(i as i64 + 1));
        }
    }

    #[tokio::test]
    async fn test_persistence_across_handles() {
        let dir = tempdir().unwrap();
        let files = PageFiles::new(dir.path());
        files.init().await.unwrap();

        {
            let pool = Arc::new(BufferPool::new(files.clone(), 16));
            let heap = HeapStorage::new(files.clone(), pool.clone());
            heap.create_table("users", schema()).await.unwrap();
            heap.insert_row("users", row(1, "ada")).await.unwrap();
            heap.insert_row("users", row(2, "bob")).await.unwrap();
            pool.flush_all().await.unwrap();
        }

        // A fresh handle over the same files sees the same rows.
        let pool = Arc::new(BufferPool::new(files.clone(), 16));
        let heap = HeapStorage::new(files, pool);
        assert_eq!(heap.get_schema("users").await.unwrap(), schema());
        assert_eq!(
            heap.select_all_rows("users").await.unwrap(),
            vec![row(1, "ada"), row(2, "bob")]
        );
        assert_eq!(heap.insert_row("users", row(3, "cyd")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_rows() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();
        heap.insert_row("users", row(1, "ada")).await.unwrap();
        heap.insert_row("users", row(2, "bob")).await.unwrap();
        heap.insert_row("users", row(3, "bob")).await.unwrap();

        let updated = heap
            .update_rows(
                "users",
                "name",
                Value::Text("carol".into()),
                &|values: &[Value]| values[1] == Value::Text("bob".into()),
            )
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let rows = heap.select_all_rows("users").await.unwrap();
        assert_eq!(rows[0], row(1, "ada"));
        assert_eq!(rows[1], row(2, "carol"));
        assert_eq!(rows[2], row(3, "carol"));
    }

    #[tokio::test]
    async fn test_update_unknown_column() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();
        assert!(matches!(
            heap.update_rows("users", "email", Value::Null, &|_: &[Value]| true)
                .await,
            Err(HeapError::ColumnNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_preserves_row_order() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();
        for i in 1..=10 {
            heap.insert_row("users", row(i, "n")).await.unwrap();
        }
        heap.update_rows("users", "name", Value::Text("m".into()), &|v: &[Value]| {
            matches!(v[0], Value::Int64(n) if n % 2 == 0)
        })
        .await
        .unwrap();

        let rows = heap.select_all_rows("users").await.unwrap();
        for (i, r) in rows.iter().enumerate() {
            assert_eq!(r[0], Value::Int64(i as i64 + 1));
        }
    }

    #[tokio::test]
    async fn test_concurrent_inserts_allocate_distinct_row_ids() {
        let (_dir, heap) = heap().await;
        heap.create_table("users", schema()).await.unwrap();
        let heap = Arc::new(heap);

        let mut handles = Vec::new();
        for i in 0..16 {
            let heap = Arc::clone(&heap);
            handles.push(tokio::spawn(async move {
                heap.insert_row("users", row(i, "w")).await.unwrap()
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<u64>>());
        assert_eq!(heap.select_all_rows("users").await.unwrap().len(), 16);
    }
}
