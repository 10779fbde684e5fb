//! Binding aiodb's dynamically-typed [`Value`] into `rusqlite`'s statement API,
//! and reading it back out of result rows.

use aiodb_core::{Row, Value};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Result as SqliteResult, Statement, ToSql};
use std::sync::Arc;

impl ToSql for Value {
    fn to_sql(&self) -> SqliteResult<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::from(rusqlite::types::Null),
            Value::Bool(v) => ToSqlOutput::from(*v),
            Value::Int64(v) => ToSqlOutput::from(*v),
            Value::Float64(v) => ToSqlOutput::from(*v),
            Value::Text(v) => ToSqlOutput::from(v.as_str()),
            Value::Blob(v) => ToSqlOutput::from(v.as_slice()),
        })
    }
}

pub fn bind_params(stmt: &mut Statement<'_>, args: &[Value]) -> SqliteResult<()> {
    for (i, value) in args.iter().enumerate() {
        stmt.raw_bind_parameter(i + 1, value)?;
    }
    Ok(())
}

pub fn row_from_statement(row: &rusqlite::Row<'_>) -> SqliteResult<Row> {
    let columns: Arc<[String]> = row
        .as_ref()
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>()
        .into();
    let values = (0..columns.len())
        .map(|i| value_from_ref(row.get_ref(i)?))
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}

fn value_from_ref(value: ValueRef<'_>) -> SqliteResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int64(v),
        ValueRef::Real(v) => Value::Float64(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    })
}
