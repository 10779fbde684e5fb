//! ODBC adapter for `aiodb`, wrapping the synchronous `odbc-api` crate behind
//! `tokio::task::spawn_blocking` — the same offloading idiom `aiodb-sqlite` uses
//! for its own synchronous driver, since no pack example touches ODBC directly.
//! A direct (unpooled) adapter: every `acquire` opens a fresh connection, same
//! as SQLite and unlike the pooled Postgres/MySQL adapters.
//!
//! `odbc-api` connections borrow the process-wide `Environment` that creates
//! them; we build that environment once, in a `OnceLock`, and hand out `'static`
//! connections from it — the same "one leaked/static root, many borrowed
//! handles" shape `lazy_static`/`OnceLock` globals are used for elsewhere in
//! this kind of driver crate.

use aiodb_core::{Adapter, BoxStream, Options, RawConnection, Row, RowsAffected, Value, connect_error, driver_error};
use async_trait::async_trait;
use odbc_api::Cursor;
use std::sync::{Arc, OnceLock};
use url::Url;

static ENVIRONMENT: OnceLock<odbc_api::Environment> = OnceLock::new();

fn environment() -> aiodb_core::Result<&'static odbc_api::Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = odbc_api::Environment::new()
        .map_err(|e| connect_error(format!("failed to initialize the ODBC environment: {e}")))?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

struct Handle(odbc_api::Connection<'static>);

/// A leaked `dyn Adapter` is safe to treat as `Send`: ODBC connections are
/// not shared across threads concurrently, only moved between the blocking
/// thread pool and the task that owns the `Session`.
unsafe impl Send for Handle {}

pub struct OdbcAdapter {
    connection_string: String,
    db_type: String,
    convert_params: bool,
}

impl OdbcAdapter {
    fn new(url: &Url, options: &Options) -> aiodb_core::Result<Self> {
        let connection_string = options
            .get_text("dsn")
            .map(str::to_string)
            .unwrap_or_else(|| {
                format!("{}{}", url.host_str().unwrap_or(""), url.path())
            });
        let db_type = options.get_text("db_type").unwrap_or("odbc").to_string();
        let convert_params = options.get_bool("convert_params").unwrap_or(true);
        Ok(Self { connection_string, db_type, convert_params })
    }
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(v) => Some((*v as i64).to_string()),
        Value::Int64(v) => Some(v.to_string()),
        Value::Float64(v) => Some(v.to_string()),
        Value::Text(v) => Some(v.clone()),
        Value::Blob(v) => Some(String::from_utf8_lossy(v).into_owned()),
    }
}

fn fetch_rows(cursor: &mut impl Cursor, limit: Option<usize>) -> aiodb_core::Result<Vec<Row>> {
    let num_cols = cursor.num_result_cols().map_err(driver_error)? as u16;
    let mut names = Vec::with_capacity(num_cols as usize);
    for i in 1..=num_cols {
        let mut buf = Vec::new();
        cursor.col_name(i, &mut buf).map_err(driver_error)?;
        names.push(String::from_utf8_lossy(&buf).into_owned());
    }
    let columns: Arc<[String]> = names.into();

    let mut out = Vec::new();
    while limit.map(|n| out.len() < n).unwrap_or(true) {
        let mut row = match cursor.next_row().map_err(driver_error)? {
            Some(row) => row,
            None => break,
        };
        let mut values = Vec::with_capacity(columns.len());
        for i in 1..=num_cols {
            let mut buf: Vec<u8> = Vec::new();
            let got = row.get_text(i, &mut buf).map_err(driver_error)?;
            values.push(if got {
                Value::Text(String::from_utf8_lossy(&buf).into_owned())
            } else {
                Value::Null
            });
        }
        out.push(Row::new(columns.clone(), values));
    }
    Ok(out)
}

#[async_trait]
impl Adapter for OdbcAdapter {
    fn names(&self) -> &'static [&'static str] {
        &["odbc", "aioodbc"]
    }

    fn db_type(&self) -> &'static str {
        // `db_type` is an override for reporting purposes only (ODBC fronts many
        // different SQL dialects); dispatch always matches on the `odbc` scheme.
        "odbc"
    }

    fn convert_params(&self) -> bool {
        self.convert_params
    }

    fn rewrite(&self, sql: &str) -> String {
        aiodb_core::marker::rewrite(sql, aiodb_core::PlaceholderStyle::Question)
    }

    async fn connect(&self) -> aiodb_core::Result<()> {
        environment()?;
        Ok(())
    }

    async fn disconnect(&self) -> aiodb_core::Result<()> {
        Ok(())
    }

    async fn acquire(&self) -> aiodb_core::Result<RawConnection> {
        let connection_string = self.connection_string.clone();
        tokio::task::spawn_blocking(move || {
            let env = environment()?;
            let conn = env
                .connect_with_connection_string(&connection_string, odbc_api::ConnectionOptions::default())
                .map_err(|e| connect_error(format!("failed to open an ODBC connection: {e}")))?;
            Ok::<_, aiodb_core::Error>(RawConnection::new(Handle(conn)))
        })
        .await
        .map_err(|e| connect_error(format!("odbc connect task panicked: {e}")))?
    }

    async fn release(&self, _raw: RawConnection) -> aiodb_core::Result<()> {
        Ok(())
    }

    async fn execute(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<RowsAffected> {
        let conn = &raw.downcast_mut::<Handle>().0;
        let params: Vec<Option<String>> = args.iter().map(value_to_text).collect();
        // `execute` only tells us whether a result set came back, never a real
        // affected-row count; `odbc-api` has no portable `SQLRowCount` wrapper
        // on this path, so we report "unknown" rather than fabricate a number.
        conn.execute(sql, params.as_slice(), None).map_err(driver_error)?;
        Ok(RowsAffected { rows_affected: None, last_inserted_id: None })
    }

    async fn execute_many(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        batch: &[Vec<Value>],
    ) -> aiodb_core::Result<RowsAffected> {
        let conn = &raw.downcast_mut::<Handle>().0;
        let mut total = 0u64;
        for args in batch {
            let params: Vec<Option<String>> = args.iter().map(value_to_text).collect();
            conn.execute(sql, params.as_slice(), None).map_err(driver_error)?;
            total += 1;
        }
        Ok(RowsAffected { rows_affected: Some(total), last_inserted_id: None })
    }

    async fn fetch_all(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Vec<Row>> {
        let conn = &raw.downcast_mut::<Handle>().0;
        let params: Vec<Option<String>> = args.iter().map(value_to_text).collect();
        match conn.execute(sql, params.as_slice(), None).map_err(driver_error)? {
            Some(mut cursor) => fetch_rows(&mut cursor, None),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_many(
        &self,
        raw: &mut RawConnection,
        n: usize,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Vec<Row>> {
        let conn = &raw.downcast_mut::<Handle>().0;
        let params: Vec<Option<String>> = args.iter().map(value_to_text).collect();
        match conn.execute(sql, params.as_slice(), None).map_err(driver_error)? {
            Some(mut cursor) => fetch_rows(&mut cursor, Some(n)),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_one(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Option<Row>> {
        Ok(self.fetch_many(raw, 1, sql, args).await?.into_iter().next())
    }

    fn iterate<'a>(
        &'a self,
        raw: &'a mut RawConnection,
        sql: String,
        args: Vec<Value>,
    ) -> BoxStream<'a, aiodb_core::Result<Row>> {
        let stream = async_stream::try_stream! {
            let conn = &raw.downcast_mut::<Handle>().0;
            let params: Vec<Option<String>> = args.iter().map(value_to_text).collect();
            let rows = match conn.execute(&sql, params.as_slice(), None).map_err(driver_error)? {
                Some(mut cursor) => fetch_rows(&mut cursor, None)?,
                None => Vec::new(),
            };
            for row in rows {
                yield row;
            }
        };
        Box::pin(stream)
    }
}

/// Build an `odbc://` adapter from its URL and options. `db_type` is accepted
/// for reporting/logging only; dispatch happens on the `odbc` scheme alone
/// since a single generic driver serves every ODBC-reachable database.
pub fn factory(url: Url, options: Options) -> aiodb_core::Result<Arc<dyn Adapter>> {
    let adapter = OdbcAdapter::new(&url, &options)?;
    log::debug!("odbc adapter reporting db_type={}", adapter.db_type);
    Ok(Arc::new(adapter))
}
