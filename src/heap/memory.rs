//! In-memory table store for tests.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::catalog::{ColumnDef, TableMeta};
use crate::storage::{StorageError, Value};

use super::{HeapError, RowPredicate, TableInfo, TableStore};

struct MemTable {
    meta: TableMeta,
    rows: Vec<Vec<Value>>,
}

/// In-memory [`TableStore`] implementation.
///
/// Mirrors the paged heap's observable behavior (row-id allocation, error
/// kinds, insertion order) without any file I/O. Exists for executor and
/// session tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TableStore for MemoryStore {
    async fn create_table(&self, table: &str, columns: Vec<ColumnDef>) -> Result<(), HeapError> {
        let mut tables = self.tables.write();
        if tables.contains_key(table) {
            return Err(StorageError::FileAlreadyExists(table.to_string()).into());
        }
        tables.insert(
            table.to_string(),
            MemTable {
                meta: TableMeta::new(table, columns),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> bool {
        self.tables.read().contains_key(table)
    }

    async fn get_schema(&self, table: &str) -> Result<Vec<ColumnDef>, HeapError> {
        let tables = self.tables.read();
        let entry = tables
            .get(table)
            .ok_or_else(|| StorageError::FileNotFound(table.to_string()))?;
        Ok(entry.meta.columns.clone())
    }

    async fn insert_row(&self, table: &str, values: Vec<Value>) -> Result<u64, HeapError> {
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::FileNotFound(table.to_string()))?;
        entry.meta.total_tuples += 1;
        entry.rows.push(values);
        Ok(entry.meta.total_tuples)
    }

    async fn select_all_rows(&self, table: &str) -> Result<Vec<Vec<Value>>, HeapError> {
        let tables = self.tables.read();
        let entry = tables
            .get(table)
            .ok_or_else(|| StorageError::FileNotFound(table.to_string()))?;
        Ok(entry.rows.clone())
    }

    async fn update_rows(
        &self,
        table: &str,
        column: &str,
        new_value: Value,
        predicate: RowPredicate<'_>,
    ) -> Result<u64, HeapError> {
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| StorageError::FileNotFound(table.to_string()))?;
        let ordinal =
            entry
                .meta
                .column_ordinal(column)
                .ok_or_else(|| HeapError::ColumnNotFound {
                    table: table.to_string(),
                    column: column.to_string(),
                })?;

        let mut updated = 0;
        for row in &mut entry.rows {
            if ordinal < row.len() && predicate(row) {
                row[ordinal] = new_value.clone();
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn table_info(&self, table: &str) -> Result<TableInfo, HeapError> {
        let tables = self.tables.read();
        let entry = tables
            .get(table)
            .ok_or_else(|| StorageError::FileNotFound(table.to_string()))?;
        Ok(TableInfo {
            row_count: entry.meta.total_tuples,
            page_count: 1,
            data_pages: 0,
            file_size: 0,
            created_at: entry.meta.created_at,
            schema: entry.meta.columns.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnType;

    fn schema() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("id", ColumnType::Integer, None),
            ColumnDef::new("name", ColumnType::Text, None),
        ]
    }

    #[tokio::test]
    async fn test_create_insert_select() {
        let store = MemoryStore::new();
        store.create_table("users", schema()).await.unwrap();
        assert!(store.table_exists("users").await);

        let id = store
            .insert_row("users", vec![Value::Int64(1), Value::Text("ada".into())])
            .await
            .unwrap();
        assert_eq!(id, 1);

        let rows = store.select_all_rows("users").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], Value::Text("ada".into()));
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let store = MemoryStore::new();
        store.create_table("users", schema()).await.unwrap();
        assert!(matches!(
            store.create_table("users", schema()).await,
            Err(HeapError::Storage(StorageError::FileAlreadyExists(_)))
        ));
    }

    #[tokio::test]
    async fn test_update() {
        let store = MemoryStore::new();
        store.create_table("users", schema()).await.unwrap();
        for (id, name) in [(1, "a"), (2, "b")] {
            store
                .insert_row("users", vec![Value::Int64(id), Value::Text(name.into())])
                .await
                .unwrap();
        }
        let updated = store
            .update_rows("users", "name", Value::Text("z".into()), &|row: &[Value]| {
                row[0] == Value::Int64(2)
            })
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let rows = store.select_all_rows("users").await.unwrap();
        assert_eq!(rows[1][1], Value::Text("z".into()));
        assert_eq!(rows[0][1], Value::Text("a".into()));
    }
}
