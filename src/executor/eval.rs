//! WHERE-clause evaluation.
//!
//! Column references resolve positionally against the table's schema (name
//! to ordinal); there is no implicit coercion. Any comparison between
//! incomparable values, or a reference that does not resolve, makes the
//! predicate false for that row rather than an error.

use std::cmp::Ordering;

use crate::catalog::ColumnDef;
use crate::sql::{BinaryOp, Expr};
use crate::storage::Value;

/// Evaluates a WHERE expression against one row.
pub fn matches_row(expr: &Expr, row: &[Value], schema: &[ColumnDef]) -> bool {
    matches!(eval(expr, row, schema), Some(Value::Bool(true)))
}

fn eval(expr: &Expr, row: &[Value], schema: &[ColumnDef]) -> Option<Value> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::Column(name) => {
            let ordinal = schema.iter().position(|c| &c.name == name)?;
            row.get(ordinal).cloned()
        }
        Expr::BinaryOp { left, op, right } => {
            let left = eval(left, row, schema);
            let right = eval(right, row, schema);
            match op {
                BinaryOp::And => Some(Value::Bool(truthy(&left) && truthy(&right))),
                BinaryOp::Or => Some(Value::Bool(truthy(&left) || truthy(&right))),
                comparison => Some(Value::Bool(compare(comparison, left?, right?))),
            }
        }
    }
}

fn truthy(value: &Option<Value>) -> bool {
    matches!(value, Some(Value::Bool(true)))
}

fn compare(op: &BinaryOp, left: Value, right: Value) -> bool {
    let ordering = match (&left, &right) {
        (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::Eq => return a == b,
            BinaryOp::Neq => return a != b,
            _ => return false,
        },
        // NULLs and mixed categories never compare.
        _ => return false,
    };
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Neq => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        BinaryOp::GtEq => ordering != Ordering::Less,
        BinaryOp::And | BinaryOp::Or => false,
    }
}
