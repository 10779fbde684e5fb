//! A `Session` wraps exactly one physical connection from a backend's pool,
//! serializing every operation issued against it — the Rust counterpart of
//! `ABCConnection` in `aio-databases`.
//!
//! The original tracks "is a connection attached" via a bare `self._conn`
//! reference and serializes access with a separate `asyncio.Lock`. We fold both
//! into one `tokio::sync::Mutex<Option<RawConnection>>`: holding the lock *is*
//! holding the right to touch the connection, so there's no window where
//! `is_ready` can read stale state between the check and the lock acquisition
//! that the Python version has (`if self._conn is None: async with self._lock`).

use crate::{
    Adapter, BoxStream, IsolationLevel, RawConnection, Row, RowsAffected, Transaction, Value,
    connect_error, state_error,
};
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as SyncMutex};
use tokio::sync::Mutex as AsyncMutex;

/// One leased connection plus every operation that can be run against it.
pub struct Session {
    backend: Arc<dyn Adapter>,
    state: AsyncMutex<Option<RawConnection>>,
    ready: AtomicBool,
    transactions: SyncMutex<HashSet<u64>>,
    next_transaction_id: AtomicU64,
}

impl Session {
    /// Build a session directly against a backend adapter, bypassing
    /// `Database`. Mainly useful for adapter-level tests that want to drive a
    /// single connection without a full URL/registry round trip.
    pub fn new(backend: Arc<dyn Adapter>) -> Self {
        Self {
            backend,
            state: AsyncMutex::new(None),
            ready: AtomicBool::new(false),
            transactions: SyncMutex::new(HashSet::new()),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    /// Fast, possibly-stale readiness check — accurate the instant no acquire or
    /// release is racing it, same caveat as the Python `is_ready` property.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Acquire a raw connection from the backend if this session doesn't already
    /// hold one. Idempotent.
    pub async fn acquire(&self) -> crate::Result<()> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            let raw = self.backend.acquire().await.map_err(|e| {
                connect_error(format!("failed to acquire a connection: {e:#}"))
            })?;
            *guard = Some(raw);
            self.ready.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Release this session's connection back to the backend, if held.
    pub async fn release(&self) -> crate::Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(raw) = guard.take() {
            self.ready.store(false, Ordering::Release);
            self.backend.release(raw).await?;
        }
        Ok(())
    }

    pub(crate) fn next_transaction_id(&self) -> u64 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn has_active_transaction(&self) -> bool {
        !self.transactions.lock().unwrap().is_empty()
    }

    pub(crate) fn register_transaction(&self, id: u64) {
        self.transactions.lock().unwrap().insert(id);
    }

    pub(crate) fn unregister_transaction(&self, id: u64) {
        self.transactions.lock().unwrap().remove(&id);
    }

    /// Run `body` against the currently held raw connection, holding the
    /// session's lock for its duration. Returns a `StateError` if no connection
    /// is attached.
    pub(crate) async fn with_raw<F, T>(&self, body: F) -> crate::Result<T>
    where
        F: for<'a> FnOnce(
            &'a dyn Adapter,
            &'a mut RawConnection,
        ) -> BoxFuture<'a, crate::Result<T>>,
    {
        let mut guard = self.state.lock().await;
        let raw = guard
            .as_mut()
            .ok_or_else(|| state_error("session has no acquired connection"))?;
        body(self.backend.as_ref(), raw).await
    }

    fn rewrite(&self, sql: &str) -> String {
        if self.backend.convert_params() {
            self.backend.rewrite(sql)
        } else {
            sql.to_string()
        }
    }

    pub async fn execute(&self, sql: &str, args: &[Value]) -> crate::Result<RowsAffected> {
        let sql = self.rewrite(sql);
        log::debug!("{sql} {args:?}");
        self.with_raw(|adapter, raw| Box::pin(async move { adapter.execute(raw, &sql, args).await }))
            .await
    }

    pub async fn execute_many(&self, sql: &str, batch: &[Vec<Value>]) -> crate::Result<RowsAffected> {
        let sql = self.rewrite(sql);
        log::debug!("{sql} (batch of {})", batch.len());
        self.with_raw(|adapter, raw| {
            Box::pin(async move { adapter.execute_many(raw, &sql, batch).await })
        })
        .await
    }

    pub async fn fetch_all(&self, sql: &str, args: &[Value]) -> crate::Result<Vec<Row>> {
        let sql = self.rewrite(sql);
        log::debug!("{sql} {args:?}");
        self.with_raw(|adapter, raw| Box::pin(async move { adapter.fetch_all(raw, &sql, args).await }))
            .await
    }

    pub async fn fetch_many(&self, n: usize, sql: &str, args: &[Value]) -> crate::Result<Vec<Row>> {
        let sql = self.rewrite(sql);
        log::debug!("{sql} {args:?}");
        self.with_raw(|adapter, raw| {
            Box::pin(async move { adapter.fetch_many(raw, n, &sql, args).await })
        })
        .await
    }

    pub async fn fetch_one(&self, sql: &str, args: &[Value]) -> crate::Result<Option<Row>> {
        let sql = self.rewrite(sql);
        log::debug!("{sql} {args:?}");
        self.with_raw(|adapter, raw| Box::pin(async move { adapter.fetch_one(raw, &sql, args).await }))
            .await
    }

    /// Fetch a single column from a single row, by position or name.
    pub async fn fetch_val(
        &self,
        sql: &str,
        args: &[Value],
        column: impl Into<crate::ColumnIndex>,
    ) -> crate::Result<Option<Value>> {
        let column = column.into();
        let row = self.fetch_one(sql, args).await?;
        Ok(row.and_then(|r| r.get(column).cloned()))
    }

    /// Lazily stream rows. The returned stream borrows this session, and
    /// releasing/dropping it mid-iteration ends the stream rather than panicking.
    pub fn iterate<'a>(&'a self, sql: &str, args: &[Value]) -> BoxStream<'a, crate::Result<Row>> {
        let sql = self.rewrite(sql);
        let args = args.to_vec();
        log::debug!("{sql} {args:?}");
        let backend = self.backend.clone();
        let stream = async_stream::try_stream! {
            let mut guard = self.state.lock().await;
            let raw = guard
                .as_mut()
                .ok_or_else(|| state_error("session has no acquired connection"))?;
            let mut inner = backend.iterate(raw, sql, args);
            while let Some(row) = futures::StreamExt::next(&mut inner).await {
                yield row?;
            }
        };
        Box::pin(stream)
    }

    /// Begin a new transaction scoped to this session. Nested when another
    /// transaction is already active on it (synthesized as a SAVEPOINT).
    pub fn transaction(&self, silent: bool, isolation_level: Option<IsolationLevel>) -> Transaction<'_> {
        Transaction::new(self, silent, isolation_level)
    }
}
