//! PostgreSQL adapter for `aiodb`.
//!
//! Grounded on `tank-postgres`'s use of `tokio-postgres`, but pooled with
//! `deadpool-postgres` rather than a hand-rolled pool — the same pairing
//! `sql-middleware` (one of this repository's other reference crates) uses for
//! its own `tokio-postgres` backend. Transactions go through plain `BEGIN`/
//! `SAVEPOINT` SQL text rather than `tokio-postgres`'s own `Client::transaction`,
//! since that API borrows the client for the transaction's lifetime and can't be
//! stored behind the type-erased, `Send`-boxed `RawConnection` every adapter
//! shares — the same SQL-text style `aiopg`'s backend (not `asyncpg`'s) uses in
//! the original.

mod convert;

use aiodb_core::{
    Adapter, BoxStream, Options, PlaceholderStyle, RawConnection, Row, RowsAffected, Value,
    connect_error, driver_error, marker,
};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Timeouts};
use std::sync::Arc;
use tokio_postgres::NoTls;
use tokio_postgres::types::ToSql;
use url::Url;

struct Handle(deadpool_postgres::Object);

pub struct PostgresAdapter {
    pool: Pool,
    convert_params: bool,
}

impl PostgresAdapter {
    fn new(url: &Url, options: &Options) -> aiodb_core::Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config.host(url.host_str().unwrap_or("localhost"));
        if let Some(port) = url.port() {
            config.port(port);
        }
        if !url.username().is_empty() {
            config.user(url.username());
        }
        if let Some(password) = url.password() {
            config.password(password);
        }
        let dbname = url.path().trim_start_matches('/');
        if !dbname.is_empty() {
            config.dbname(dbname);
        }

        let manager = Manager::from_config(
            config,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );

        // Mirrors the pool-sizing options `asyncpg.create_pool` accepts in the
        // original (`_asyncpg.py`), forwarded verbatim into `**self.options`.
        let max_size = options
            .get_int("max_size")
            .or_else(|| options.get_int("maxsize"))
            .unwrap_or(10) as usize;
        if let Some(min_size) = options.get_int("min_size").or_else(|| options.get_int("minsize")) {
            log::debug!(
                "ignoring min_size={min_size}: deadpool-postgres opens connections lazily and \
                 has no minimum-pool-size concept"
            );
        }
        if let Some(max_queries) = options.get_int("max_queries") {
            log::debug!(
                "ignoring max_queries={max_queries}: deadpool-postgres has no \
                 query-count-based connection recycling"
            );
        }
        let mut timeouts = Timeouts::default();
        if let Some(lifetime) = options
            .get_int("max_inactive_connection_lifetime")
            .or_else(|| options.get_int("pool_recycle"))
        {
            timeouts.recycle = Some(std::time::Duration::from_secs(lifetime.max(0) as u64));
        }

        let pool = Pool::builder(manager)
            .max_size(max_size)
            .timeouts(timeouts)
            .build()
            .map_err(|e| connect_error(format!("failed to build the postgres pool: {e}")))?;

        let convert_params = options.get_bool("convert_params").unwrap_or(true);

        Ok(Self { pool, convert_params })
    }

    fn args_to_refs(args: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
        args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }
}

#[async_trait]
impl Adapter for PostgresAdapter {
    fn names(&self) -> &'static [&'static str] {
        &["postgresql", "asyncpg", "aiopg"]
    }

    fn db_type(&self) -> &'static str {
        "postgresql"
    }

    fn convert_params(&self) -> bool {
        self.convert_params
    }

    fn rewrite(&self, sql: &str) -> String {
        marker::rewrite(sql, PlaceholderStyle::Dollar)
    }

    async fn connect(&self) -> aiodb_core::Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| connect_error(format!("failed to validate the postgres pool: {e}")))?;
        drop(client);
        Ok(())
    }

    async fn disconnect(&self) -> aiodb_core::Result<()> {
        self.pool.close();
        Ok(())
    }

    async fn acquire(&self) -> aiodb_core::Result<RawConnection> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| connect_error(format!("failed to acquire a postgres connection: {e}")))?;
        Ok(RawConnection::new(Handle(client)))
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
        let client = &raw.downcast_mut::<Handle>().0;
        let refs = Self::args_to_refs(args);
        let rows_affected = client.execute(sql, &refs).await.map_err(driver_error)?;
        Ok(RowsAffected { rows_affected: Some(rows_affected), last_inserted_id: None })
    }

    async fn execute_many(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        batch: &[Vec<Value>],
    ) -> aiodb_core::Result<RowsAffected> {
        let client = &raw.downcast_mut::<Handle>().0;
        let mut total = 0u64;
        for args in batch {
            let refs = Self::args_to_refs(args);
            total += client.execute(sql, &refs).await.map_err(driver_error)?;
        }
        Ok(RowsAffected { rows_affected: Some(total), last_inserted_id: None })
    }

    async fn fetch_all(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Vec<Row>> {
        let client = &raw.downcast_mut::<Handle>().0;
        let refs = Self::args_to_refs(args);
        let rows = client.query(sql, &refs).await.map_err(driver_error)?;
        rows.into_iter().map(convert::row_from_postgres).collect()
    }

    async fn fetch_many(
        &self,
        raw: &mut RawConnection,
        n: usize,
        sql: &str,
        args: &[Value],
    ) -> aiodb_core::Result<Vec<Row>> {
        // tokio-postgres has no portable cursor-based "fetch N more" short of a
        // named `DECLARE CURSOR`; we run the full query and truncate, trading a
        // real partial fetch for simplicity (noted in this repository's DESIGN.md).
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
        let client = &raw.downcast_mut::<Handle>().0;
        let refs = Self::args_to_refs(args);
        let row = client.query_opt(sql, &refs).await.map_err(driver_error)?;
        row.map(convert::row_from_postgres).transpose()
    }

    fn iterate<'a>(
        &'a self,
        raw: &'a mut RawConnection,
        sql: String,
        args: Vec<Value>,
    ) -> BoxStream<'a, aiodb_core::Result<Row>> {
        let stream = async_stream::try_stream! {
            let client = &raw.downcast_mut::<Handle>().0;
            let refs: Vec<&(dyn ToSql + Sync)> = args.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
            let mut rows = Box::pin(client.query_raw(&sql, refs).await.map_err(driver_error)?);
            while let Some(row) = futures::TryStreamExt::try_next(&mut rows).await.map_err(driver_error)? {
                yield convert::row_from_postgres(row)?;
            }
        };
        Box::pin(stream)
    }
}

/// Build a `postgresql://` adapter from its URL and options.
pub fn factory(url: Url, options: Options) -> aiodb_core::Result<Arc<dyn Adapter>> {
    Ok(Arc::new(PostgresAdapter::new(&url, &options)?))
}
