//! Statement execution.
//!
//! The executor validates a parsed [`Statement`] against the target table's
//! schema, translates it into [`TableStore`] calls, and shapes the result
//! for the wire layer.

pub mod error;
pub mod eval;

pub use error::ExecutorError;

use crate::catalog::{ColumnDef, ColumnType};
use crate::heap::TableStore;
use crate::sql::{self, Expr, SelectItem, Statement};
use crate::storage::Value;

/// Sentinel column name for literal SELECT output, as PostgreSQL names them.
pub const UNNAMED_COLUMN: &str = "?column?";

/// One output column of a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub ty: ColumnType,
}

impl OutputColumn {
    fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// The result of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// A result set (SELECT).
    Rows {
        columns: Vec<OutputColumn>,
        rows: Vec<Vec<Value>>,
    },
    /// A command with no result set; `tag` is the CommandComplete tag.
    Command { tag: String },
}

/// Validates and executes statements against a [`TableStore`].
pub struct Executor<S> {
    store: S,
}

impl<S: TableStore> Executor<S> {
    /// Creates an executor over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Parses and executes one SQL string.
    pub async fn execute(&self, sql: &str) -> Result<QueryOutcome, ExecutorError> {
        let statement = sql::parse(sql)?;
        self.execute_statement(statement).await
    }

    /// Executes an already-parsed statement.
    pub async fn execute_statement(
        &self,
        statement: Statement,
    ) -> Result<QueryOutcome, ExecutorError> {
        match statement {
            Statement::CreateTable { table, columns } => self.create_table(table, columns).await,
            Statement::Insert { table, values } => self.insert(table, values).await,
            Statement::Select {
                columns,
                from,
                where_clause,
            } => match from {
                Some(table) => self.select_from(table, columns, where_clause).await,
                None => self.select_literals(columns),
            },
            Statement::Update {
                table,
                column,
                value,
                where_clause,
            } => self.update(table, column, value, where_clause).await,
        }
    }

    async fn create_table(
        &self,
        table: String,
        columns: Vec<ColumnDef>,
    ) -> Result<QueryOutcome, ExecutorError> {
        if self.store.table_exists(&table).await {
            return Err(ExecutorError::TableAlreadyExists(table));
        }
        self.store.create_table(&table, columns).await?;
        Ok(QueryOutcome::Command {
            tag: "CREATE TABLE".to_string(),
        })
    }

    async fn insert(
        &self,
        table: String,
        values: Vec<Value>,
    ) -> Result<QueryOutcome, ExecutorError> {
        if !self.store.table_exists(&table).await {
            return Err(ExecutorError::TableNotFound(table));
        }

        let schema = self.store.get_schema(&table).await?;
        // Legacy tables created without a column list skip validation.
        if !schema.is_empty() {
            validate_insert(&schema, &values)?;
        }

        self.store.insert_row(&table, values).await?;
        Ok(QueryOutcome::Command {
            tag: "INSERT 0 1".to_string(),
        })
    }

    fn select_literals(&self, items: Vec<SelectItem>) -> Result<QueryOutcome, ExecutorError> {
        let mut columns = Vec::with_capacity(items.len());
        let mut row = Vec::with_capacity(items.len());
        for item in items {
            match item {
                SelectItem::Literal(value) => {
                    columns.push(OutputColumn::new(UNNAMED_COLUMN, value_type(&value)));
                    row.push(value);
                }
                SelectItem::Wildcard => {
                    return Err(ExecutorError::UnsupportedFeature(
                        "SELECT * without a FROM clause".to_string(),
                    ));
                }
                SelectItem::Column(name) => {
                    return Err(ExecutorError::UnsupportedFeature(format!(
                        "column reference \"{}\" without a FROM clause",
                        name
                    )));
                }
            }
        }
        Ok(QueryOutcome::Rows {
            columns,
            rows: vec![row],
        })
    }

    async fn select_from(
        &self,
        table: String,
        items: Vec<SelectItem>,
        where_clause: Option<Expr>,
    ) -> Result<QueryOutcome, ExecutorError> {
        if !self.store.table_exists(&table).await {
            return Err(ExecutorError::TableNotFound(table));
        }

        let schema = self.store.get_schema(&table).await?;
        let all_rows = self.store.select_all_rows(&table).await?;

        let filtered: Vec<Vec<Value>> = match &where_clause {
            Some(expr) => all_rows
                .into_iter()
                .filter(|row| eval::matches_row(expr, row, &schema))
                .collect(),
            None => all_rows,
        };

        let plan = projection_plan(&items, &schema, filtered.first())?;
        let columns = plan.iter().map(|p| p.column.clone()).collect();
        let rows = filtered
            .iter()
            .map(|row| {
                plan.iter()
                    .map(|p| match &p.source {
                        ProjectionSource::Ordinal(i) => {
                            row.get(*i).cloned().unwrap_or(Value::Null)
                        }
                        ProjectionSource::Constant(value) => value.clone(),
                    })
                    .collect()
            })
            .collect();

        Ok(QueryOutcome::Rows { columns, rows })
    }

    async fn update(
        &self,
        table: String,
        column: String,
        value: Value,
        where_clause: Option<Expr>,
    ) -> Result<QueryOutcome, ExecutorError> {
        if !self.store.table_exists(&table).await {
            return Err(ExecutorError::TableNotFound(table));
        }

        let schema = self.store.get_schema(&table).await?;
        let predicate = move |row: &[Value]| match &where_clause {
            Some(expr) => eval::matches_row(expr, row, &schema),
            None => true,
        };

        let updated = self
            .store
            .update_rows(&table, &column, value, &predicate)
            .await?;
        Ok(QueryOutcome::Command {
            tag: format!("UPDATE {}", updated),
        })
    }
}

enum ProjectionSource {
    Ordinal(usize),
    Constant(Value),
}

struct Projection {
    column: OutputColumn,
    source: ProjectionSource,
}

/// Resolves a SELECT list against the schema into output columns and row
/// sources. For legacy schemaless tables, `*` derives generic text columns
/// from the first row.
fn projection_plan(
    items: &[SelectItem],
    schema: &[ColumnDef],
    first_row: Option<&Vec<Value>>,
) -> Result<Vec<Projection>, ExecutorError> {
    let mut plan = Vec::new();
    for item in items {
        match item {
            SelectItem::Wildcard => {
                if schema.is_empty() {
                    let width = first_row.map(|r| r.len()).unwrap_or(0);
                    for i in 0..width {
                        plan.push(Projection {
                            column: OutputColumn::new(UNNAMED_COLUMN, ColumnType::Text),
                            source: ProjectionSource::Ordinal(i),
                        });
                    }
                } else {
                    for (i, def) in schema.iter().enumerate() {
                        plan.push(Projection {
                            column: OutputColumn::new(def.name.clone(), def.ty),
                            source: ProjectionSource::Ordinal(i),
                        });
                    }
                }
            }
            SelectItem::Column(name) => {
                let ordinal = schema
                    .iter()
                    .position(|c| &c.name == name)
                    .ok_or_else(|| {
                        ExecutorError::Internal(format!("column \"{}\" does not exist", name))
                    })?;
                plan.push(Projection {
                    column: OutputColumn::new(name.clone(), schema[ordinal].ty),
                    source: ProjectionSource::Ordinal(ordinal),
                });
            }
            SelectItem::Literal(value) => {
                plan.push(Projection {
                    column: OutputColumn::new(UNNAMED_COLUMN, value_type(value)),
                    source: ProjectionSource::Constant(value.clone()),
                });
            }
        }
    }
    Ok(plan)
}

fn validate_insert(schema: &[ColumnDef], values: &[Value]) -> Result<(), ExecutorError> {
    if values.len() != schema.len() {
        return Err(ExecutorError::ColumnCountMismatch {
            provided: values.len(),
            expected: schema.len(),
        });
    }

    for (def, value) in schema.iter().zip(values) {
        let ok = matches!(
            (def.ty, value),
            (ColumnType::Integer, Value::Int64(_))
                | (ColumnType::Text, Value::Text(_))
                | (ColumnType::Varchar, Value::Text(_))
                | (ColumnType::Boolean, Value::Bool(_))
        );
        if !ok {
            return Err(ExecutorError::TypeMismatch {
                column: def.name.clone(),
                actual: value_category(value),
                expected: def.ty.as_str(),
            });
        }

        if def.ty == ColumnType::Varchar
            && let Value::Text(s) = value
        {
            let length = s.chars().count();
            let max = def.varchar_limit();
            if length > max as usize {
                return Err(ExecutorError::ValueTooLong {
                    column: def.name.clone(),
                    length,
                    max,
                });
            }
        }
    }
    Ok(())
}

fn value_type(value: &Value) -> ColumnType {
    match value {
        Value::Int64(_) => ColumnType::Integer,
        Value::Bool(_) => ColumnType::Boolean,
        _ => ColumnType::Text,
    }
}

fn value_category(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Int64(_) => "integer",
        Value::Text(_) => "text",
        Value::Bool(_) => "boolean",
        Value::List(_) | Value::Map(_) => "composite",
    }
}
