//! Binding aiodb's dynamically-typed [`Value`] into `tokio-postgres`'s wire
//! format, and reading rows back out of it.
//!
//! `tokio-postgres`'s `ToSql`/`FromSql` are normally derived per Rust type; since
//! `Value` is a single dynamic enum standing in for every bind parameter and
//! column type the facade can see, we implement the wire encoding by hand here,
//! keyed off the `Type` the server tells us a parameter or column actually is.

use aiodb_core::{Row, Value, driver_error};
use bytes::BytesMut;
use std::error::Error as StdError;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int64(v) => match *ty {
                Type::INT2 => (*v as i16).to_sql(ty, out),
                Type::INT4 => (*v as i32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Float64(v) => match *ty {
                Type::FLOAT4 => (*v as f32).to_sql(ty, out),
                _ => v.to_sql(ty, out),
            },
            Value::Text(v) => v.to_sql(ty, out),
            Value::Blob(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

/// Read column `i` out of `row` into a [`Value`], picking the Rust side type
/// from the column's reported `Type`. Unknown/unsupported types fall back to
/// text, matching the adapter's best-effort stance on exotic server types.
pub fn value_from_row(row: &tokio_postgres::Row, i: usize) -> aiodb_core::Result<Value> {
    let ty = row.columns()[i].type_().clone();
    let value = match ty {
        Type::BOOL => get::<bool>(row, i)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, i)?.map(|v| Value::Int64(v as i64)),
        Type::INT4 => get::<i32>(row, i)?.map(|v| Value::Int64(v as i64)),
        Type::INT8 => get::<i64>(row, i)?.map(Value::Int64),
        Type::FLOAT4 => get::<f32>(row, i)?.map(|v| Value::Float64(v as f64)),
        Type::FLOAT8 => get::<f64>(row, i)?.map(Value::Float64),
        Type::BYTEA => get::<Vec<u8>>(row, i)?.map(Value::Blob),
        Type::JSON | Type::JSONB => {
            get::<serde_json::Value>(row, i)?.map(|v| Value::Text(v.to_string()))
        }
        _ => get::<String>(row, i)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

fn get<'a, T>(row: &'a tokio_postgres::Row, i: usize) -> aiodb_core::Result<Option<T>>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(i).map_err(driver_error)
}

pub fn row_from_postgres(row: tokio_postgres::Row) -> aiodb_core::Result<Row> {
    let columns: std::sync::Arc<[String]> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into();
    let values = (0..columns.len())
        .map(|i| value_from_row(&row, i))
        .collect::<aiodb_core::Result<Vec<_>>>()?;
    Ok(Row::new(columns, values))
}
