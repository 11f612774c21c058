//! Table schema metadata.
//!
//! Every table's page 0 carries a single tuple (row_id 0) whose payload is a
//! [`TableMeta`] record: the table name, creation time, page format version,
//! column definitions, and the running tuple count used for row-id
//! allocation. The record is stored as a nested [`Value::Map`] so it flows
//! through the same tuple encoding as ordinary rows.

use std::fmt;

use crate::storage::{PAGE_FORMAT_VERSION, StorageError, Value};

/// Column type categories supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Text,
    Varchar,
    Boolean,
}

impl ColumnType {
    /// Returns the lowercase name used in metadata records and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Text => "text",
            ColumnType::Varchar => "varchar",
            ColumnType::Boolean => "boolean",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "integer" => Some(ColumnType::Integer),
            "text" => Some(ColumnType::Text),
            "varchar" => Some(ColumnType::Varchar),
            "boolean" => Some(ColumnType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default length for `VARCHAR` declared without a size.
pub const DEFAULT_VARCHAR_SIZE: u32 = 255;

/// One column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
    /// Maximum length; meaningful only for `Varchar`.
    pub size: Option<u32>,
}

impl ColumnDef {
    /// Creates a column definition.
    pub fn new(name: impl Into<String>, ty: ColumnType, size: Option<u32>) -> Self {
        Self {
            name: name.into(),
            ty,
            size,
        }
    }

    /// Returns the effective varchar limit (declared size or the default).
    pub fn varchar_limit(&self) -> u32 {
        self.size.unwrap_or(DEFAULT_VARCHAR_SIZE)
    }

    fn to_value(&self) -> Value {
        let mut entries = vec![
            ("name".to_string(), Value::Text(self.name.clone())),
            ("type".to_string(), Value::Text(self.ty.as_str().to_string())),
        ];
        if let Some(size) = self.size {
            entries.push(("size".to_string(), Value::Int64(size as i64)));
        }
        Value::Map(entries)
    }

    fn from_value(value: &Value) -> Result<Self, StorageError> {
        let Value::Map(entries) = value else {
            return Err(meta_err("column definition is not a map"));
        };
        let name = match lookup(entries, "name") {
            Some(Value::Text(s)) => s.clone(),
            _ => return Err(meta_err("column definition missing name")),
        };
        let ty = match lookup(entries, "type") {
            Some(Value::Text(s)) => ColumnType::parse(s)
                .ok_or_else(|| meta_err(format!("unknown column type \"{}\"", s)))?,
            _ => return Err(meta_err("column definition missing type")),
        };
        let size = match lookup(entries, "size") {
            Some(Value::Int64(n)) => Some(*n as u32),
            _ => None,
        };
        Ok(Self { name, ty, size })
    }
}

/// The metadata record stored on every table's header page.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMeta {
    pub table_name: String,
    /// Creation time as unix seconds.
    pub created_at: i64,
    pub page_format_version: u16,
    pub columns: Vec<ColumnDef>,
    /// Total tuples ever inserted; the next row gets `total_tuples + 1`.
    /// Monotonic, never reused within a table's lifetime.
    pub total_tuples: u64,
}

impl TableMeta {
    /// Creates the metadata record for a newly created table.
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        let created_at = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            table_name: table_name.into(),
            created_at,
            page_format_version: PAGE_FORMAT_VERSION,
            columns,
            total_tuples: 0,
        }
    }

    /// The bootstrap record written by the page file manager before the heap
    /// layer fills in the real schema.
    pub fn bootstrap(table_name: impl Into<String>) -> Self {
        Self::new(table_name, Vec::new())
    }

    /// Converts this record to the value stored in the header tuple.
    pub fn to_value(&self) -> Value {
        Value::Map(vec![
            (
                "table_name".to_string(),
                Value::Text(self.table_name.clone()),
            ),
            ("created_at".to_string(), Value::Int64(self.created_at)),
            (
                "page_format_version".to_string(),
                Value::Int64(self.page_format_version as i64),
            ),
            (
                "columns".to_string(),
                Value::List(self.columns.iter().map(ColumnDef::to_value).collect()),
            ),
            (
                "total_tuples".to_string(),
                Value::Int64(self.total_tuples as i64),
            ),
        ])
    }

    /// Decodes a record from the header tuple's value.
    pub fn from_value(value: &Value) -> Result<Self, StorageError> {
        let Value::Map(entries) = value else {
            return Err(meta_err("metadata record is not a map"));
        };
        let table_name = match lookup(entries, "table_name") {
            Some(Value::Text(s)) => s.clone(),
            _ => return Err(meta_err("metadata record missing table_name")),
        };
        let created_at = match lookup(entries, "created_at") {
            Some(Value::Int64(n)) => *n,
            _ => return Err(meta_err("metadata record missing created_at")),
        };
        let page_format_version = match lookup(entries, "page_format_version") {
            Some(Value::Int64(n)) => *n as u16,
            _ => return Err(meta_err("metadata record missing page_format_version")),
        };
        let columns = match lookup(entries, "columns") {
            Some(Value::List(items)) => items
                .iter()
                .map(ColumnDef::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(meta_err("metadata record missing columns")),
        };
        let total_tuples = match lookup(entries, "total_tuples") {
            Some(Value::Int64(n)) => *n as u64,
            _ => return Err(meta_err("metadata record missing total_tuples")),
        };
        Ok(Self {
            table_name,
            created_at,
            page_format_version,
            columns,
            total_tuples,
        })
    }

    /// Resolves a column name to its ordinal position.
    pub fn column_ordinal(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

fn lookup<'a>(entries: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn meta_err(msg: impl Into<String>) -> StorageError {
    StorageError::Deserialize(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> TableMeta {
        TableMeta {
            table_name: "users".into(),
            created_at: 1_700_000_000,
            page_format_version: PAGE_FORMAT_VERSION,
            columns: vec![
                ColumnDef::new("id", ColumnType::Integer, None),
                ColumnDef::new("name", ColumnType::Varchar, Some(255)),
                ColumnDef::new("active", ColumnType::Boolean, None),
            ],
            total_tuples: 12,
        }
    }

    #[test]
    fn test_meta_roundtrip() {
        let meta = sample_meta();
        let restored = TableMeta::from_value(&meta.to_value()).unwrap();
        assert_eq!(restored, meta);
    }

    #[test]
    fn test_meta_roundtrip_no_columns() {
        let meta = TableMeta::bootstrap("fresh");
        let restored = TableMeta::from_value(&meta.to_value()).unwrap();
        assert_eq!(restored.table_name, "fresh");
        assert!(restored.columns.is_empty());
        assert_eq!(restored.total_tuples, 0);
    }

    #[test]
    fn test_column_ordinal() {
        let meta = sample_meta();
        assert_eq!(meta.column_ordinal("id"), Some(0));
        assert_eq!(meta.column_ordinal("active"), Some(2));
        assert_eq!(meta.column_ordinal("email"), None);
    }

    #[test]
    fn test_varchar_limit_default() {
        let with_size = ColumnDef::new("a", ColumnType::Varchar, Some(10));
        let without = ColumnDef::new("b", ColumnType::Varchar, None);
        assert_eq!(with_size.varchar_limit(), 10);
        assert_eq!(without.varchar_limit(), DEFAULT_VARCHAR_SIZE);
    }

    #[test]
    fn test_from_value_rejects_non_map() {
        assert!(TableMeta::from_value(&Value::Int64(1)).is_err());
        assert!(ColumnDef::from_value(&Value::Text("x".into())).is_err());
    }

    #[test]
    fn test_column_type_parse() {
        for ty in [
            ColumnType::Integer,
            ColumnType::Text,
            ColumnType::Varchar,
            ColumnType::Boolean,
        ] {
            assert_eq!(ColumnType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(ColumnType::parse("float"), None);
    }
}
