//! Bridging aiodb's [`Value`] to `mysql_async::Value` and back.

use aiodb_core::{Row, Value};
use std::sync::Arc;

pub fn value_to_mysql(value: &Value) -> mysql_async::Value {
    match value {
        Value::Null => mysql_async::Value::NULL,
        Value::Bool(v) => mysql_async::Value::Int(*v as i64),
        Value::Int64(v) => mysql_async::Value::Int(*v),
        Value::Float64(v) => mysql_async::Value::Double(*v),
        Value::Text(v) => mysql_async::Value::Bytes(v.clone().into_bytes()),
        Value::Blob(v) => mysql_async::Value::Bytes(v.clone()),
    }
}

pub fn params_from(args: &[Value]) -> mysql_async::Params {
    mysql_async::Params::Positional(args.iter().map(value_to_mysql).collect())
}

fn value_from_mysql(value: mysql_async::Value) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Blob(e.into_bytes()),
        },
        mysql_async::Value::Int(v) => Value::Int64(v),
        mysql_async::Value::UInt(v) => Value::Int64(v as i64),
        mysql_async::Value::Float(v) => Value::Float64(v as f64),
        mysql_async::Value::Double(v) => Value::Float64(v),
        other => Value::Text(format!("{other:?}")),
    }
}

pub fn row_from_mysql(mut row: mysql_async::Row) -> Row {
    let columns: Arc<[String]> = row
        .columns_ref()
        .iter()
        .map(|c| c.name_str().into_owned())
        .collect::<Vec<_>>()
        .into();
    let values = (0..columns.len())
        .map(|i| {
            row.take(i)
                .map(value_from_mysql)
                .unwrap_or(Value::Null)
        })
        .collect();
    Row::new(columns, values)
}
