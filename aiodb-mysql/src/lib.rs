//! MySQL/MariaDB adapter for `aiodb`.
//!
//! Grounded on `tank-mysql`'s use of `mysql_async`, pooled the same way via
//! `mysql_async::Pool` rather than a bolted-on third pool crate (unlike
//! Postgres, `mysql_async` already owns its own pool). Transactions go through
//! plain SQL text (`BEGIN`/`SAVEPOINT`) rather than `mysql_async::Transaction`,
//! for the same reason as the Postgres adapter: that type borrows the
//! connection for its lifetime and can't live behind a type-erased, `'static`
//! `RawConnection`.

mod convert;

use aiodb_core::{Adapter, BoxStream, Options, RawConnection, Row, RowsAffected, Value, connect_error, driver_error};
use async_trait::async_trait;
use convert::{params_from, row_from_mysql};
use mysql_async::prelude::Queryable;
use std::sync::Arc;
use url::Url;

struct Handle(mysql_async::Conn);

pub struct MysqlAdapter {
    pool: mysql_async::Pool,
    autocommit: Option<bool>,
    charset: Option<String>,
    convert_params: bool,
}

impl MysqlAdapter {
    fn new(url: &Url, options: &Options) -> aiodb_core::Result<Self> {
        let mut builder = mysql_async::OptsBuilder::default()
            .ip_or_hostname(if url.host_str().unwrap_or("").is_empty() {
                "localhost".to_string()
            } else {
                url.host_str().unwrap().to_string()
            })
            .tcp_port(url.port().unwrap_or(3306));
        if !url.username().is_empty() {
            builder = builder.user(Some(url.username().to_string()));
        }
        if let Some(password) = url.password() {
            builder = builder.pass(Some(password.to_string()));
        }
        let dbname = url.path().trim_start_matches('/');
        if !dbname.is_empty() {
            builder = builder.db_name(Some(dbname.to_string()));
        }

        // Mirrors the pool-sizing options `aiomysql.create_pool` accepts in the
        // original (`_aiomysql.py`), forwarded verbatim into `**self.options`.
        let min_size = options
            .get_int("min_size")
            .or_else(|| options.get_int("minsize"))
            .unwrap_or(10) as usize;
        let max_size = options
            .get_int("max_size")
            .or_else(|| options.get_int("maxsize"))
            .unwrap_or(100) as usize;
        let mut pool_opts = mysql_async::PoolOpts::default();
        if let Some(constraints) = mysql_async::PoolConstraints::new(min_size, max_size) {
            pool_opts = pool_opts.with_constraints(constraints);
        } else {
            log::debug!("ignoring invalid pool bounds min_size={min_size} max_size={max_size}");
        }
        if let Some(recycle) = options.get_int("pool_recycle") {
            pool_opts = pool_opts.with_inactive_connection_ttl(std::time::Duration::from_secs(recycle.max(0) as u64));
        }
        builder = builder.pool_opts(pool_opts);

        let pool = mysql_async::Pool::new(builder);
        let autocommit = options.get_bool("autocommit");
        let charset = options.get_text("charset").map(str::to_string);
        if options.get_bool("use_unicode").is_some() {
            log::debug!("ignoring use_unicode: mysql_async always speaks UTF-8");
        }
        let convert_params = options.get_bool("convert_params").unwrap_or(true);

        Ok(Self { pool, autocommit, charset, convert_params })
    }

    async fn apply_session_options(conn: &mut mysql_async::Conn, autocommit: Option<bool>, charset: &Option<String>) -> aiodb_core::Result<()> {
        if let Some(autocommit) = autocommit {
            conn.query_drop(format!("SET autocommit={}", autocommit as u8))
                .await
                .map_err(driver_error)?;
        }
        if let Some(charset) = charset {
            conn.query_drop(format!("SET NAMES {charset}"))
                .await
                .map_err(driver_error)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Adapter for MysqlAdapter {
    fn names(&self) -> &'static [&'static str] {
        &["mysql", "aiomysql", "mariadb"]
    }

    fn db_type(&self) -> &'static str {
        "mysql"
    }

    fn convert_params(&self) -> bool {
        self.convert_params
    }

    fn rewrite(&self, sql: &str) -> String {
        aiodb_core::marker::rewrite(sql, aiodb_core::PlaceholderStyle::Question)
    }

    async fn connect(&self) -> aiodb_core::Result<()> {
        let conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| connect_error(format!("failed to validate the mysql pool: {e}")))?;
        drop(conn);
        Ok(())
    }

    async fn disconnect(&self) -> aiodb_core::Result<()> {
        self.pool.clone().disconnect().await.map_err(driver_error)
    }

    async fn acquire(&self) -> aiodb_core::Result<RawConnection> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| connect_error(format!("failed to acquire a mysql connection: {e}")))?;
        Self::apply_session_options(&mut conn, self.autocommit, &self.charset).await?;
        Ok(RawConnection::new(Handle(conn)))
    }

    async fn release(&self, raw: RawConnection) -> aiodb_core::Result<()> {
        drop(raw.downcast::<Handle>());
        Ok(())
    }

    async fn execute(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<RowsAffected> {
        let conn = &mut raw.downcast_mut::<Handle>().0;
        conn.exec_drop(sql, params_from(args)).await.map_err(driver_error)?;
        Ok(RowsAffected {
            rows_affected: Some(conn.affected_rows()),
            last_inserted_id: Some(conn.last_insert_id().unwrap_or_default() as i64),
        })
    }

    async fn execute_many(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        batch: &[Vec<Value>],
    ) -> aiodb_core::Result<RowsAffected> {
        let conn = &mut raw.downcast_mut::<Handle>().0;
        let mut total = 0u64;
        for args in batch {
            conn.exec_drop(sql, params_from(args)).await.map_err(driver_error)?;
            total += conn.affected_rows();
        }
        Ok(RowsAffected { rows_affected: Some(total), last_inserted_id: None })
    }

    async fn fetch_all(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Vec<Row>> {
        let conn = &mut raw.downcast_mut::<Handle>().0;
        let rows: Vec<mysql_async::Row> = conn.exec(sql, params_from(args)).await.map_err(driver_error)?;
        Ok(rows.into_iter().map(row_from_mysql).collect())
    }

    async fn fetch_many(
        &self,
        raw: &mut RawConnection,
        n: usize,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Vec<Row>> {
        // No portable "fetch N more" short of a server-side cursor; run the full
        // query and truncate, same tradeoff as the Postgres adapter.
        let mut rows = self.fetch_all(raw, sql, args).await?;
        rows.truncate(n);
        Ok(rows)
    }

    async fn fetch_one(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Option<Row>> {
        Ok(self.fetch_all(raw, sql, args).await?.into_iter().next())
    }

    fn iterate<'a>(
        &'a self,
        raw: &'a mut RawConnection,
        sql: String,
        args: Vec<Value>,
    ) -> BoxStream<'a, aiodb_core::Result<Row>> {
        let stream = async_stream::try_stream! {
            let conn = &mut raw.downcast_mut::<Handle>().0;
            let rows: Vec<mysql_async::Row> = conn.exec(sql, params_from(&args)).await.map_err(driver_error)?;
            for row in rows {
                yield row_from_mysql(row);
            }
        };
        Box::pin(stream)
    }
}

/// Build a `mysql://`/`mariadb://` adapter from its URL and options.
pub fn factory(url: Url, options: Options) -> aiodb_core::Result<Arc<dyn Adapter>> {
    Ok(Arc::new(MysqlAdapter::new(&url, &options)?))
}
