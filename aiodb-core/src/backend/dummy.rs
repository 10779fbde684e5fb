//! The `dummy` backend: every operation is a no-op, ported from
//! `aio_databases.backends._dummy` ("Must not be used in production"). Registered
//! under the `dummy://` scheme so the facade's own plumbing — session lifecycle,
//! the task-local registry, savepoint-based nested transactions — can be exercised
//! in `tests/dummy.rs` without standing up a real server.
//!
//! Unlike the Python original, calls are additionally recorded into a shared log
//! so tests can assert on *what* was asked of the backend, not just that nothing
//! panicked.

use crate::{Adapter, BoxStream, Options, RawConnection, Row, RowsAffected, Value};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use url::Url;

/// One call the dummy adapter recorded, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyCall {
    Connect,
    Disconnect,
    Acquire,
    Release,
    Execute(String),
    ExecuteMany(String),
    FetchAll(String),
    FetchMany(String),
    FetchOne(String),
    Iterate(String),
    NativeBegin,
    NativeCommit,
    NativeRollback,
}

/// The dummy backend's connection handle: just a marker, nothing is physically
/// opened. Holds the adapter's shared call log so operations can append to it.
struct DummyConnection;

/// No-op backend adapter that records every call it receives.
pub struct DummyAdapter {
    calls: Arc<Mutex<Vec<DummyCall>>>,
    native_transactions: bool,
}

impl DummyAdapter {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            native_transactions: false,
        }
    }

    /// Build a dummy adapter whose transactions go through `native_begin` /
    /// `native_commit` / `native_rollback` instead of SQL `BEGIN`/`COMMIT`, for
    /// exercising that branch of `Transaction` in tests.
    pub fn with_native_transactions() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            native_transactions: true,
        }
    }

    /// Snapshot of every call recorded so far, oldest first.
    pub fn calls(&self) -> Vec<DummyCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: DummyCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for DummyAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for DummyAdapter {
    fn names(&self) -> &'static [&'static str] {
        &["dummy"]
    }

    fn db_type(&self) -> &'static str {
        "dummy"
    }

    fn convert_params(&self) -> bool {
        false
    }

    async fn connect(&self) -> crate::Result<()> {
        self.record(DummyCall::Connect);
        Ok(())
    }

    async fn disconnect(&self) -> crate::Result<()> {
        self.record(DummyCall::Disconnect);
        Ok(())
    }

    async fn acquire(&self) -> crate::Result<RawConnection> {
        self.record(DummyCall::Acquire);
        Ok(RawConnection::new(DummyConnection))
    }

    async fn release(&self, _raw: RawConnection) -> crate::Result<()> {
        self.record(DummyCall::Release);
        Ok(())
    }

    async fn execute(
        &self,
        _raw: &mut RawConnection,
        sql: &str,
        _args: &[Value],
    ) -> crate::Result<RowsAffected> {
        self.record(DummyCall::Execute(sql.to_string()));
        Ok(RowsAffected::default())
    }

    async fn execute_many(
        &self,
        _raw: &mut RawConnection,
        sql: &str,
        _batch: &[Vec<Value>],
    ) -> crate::Result<RowsAffected> {
        self.record(DummyCall::ExecuteMany(sql.to_string()));
        Ok(RowsAffected::default())
    }

    async fn fetch_all(
        &self,
        _raw: &mut RawConnection,
        sql: &str,
        _args: &[Value],
    ) -> crate::Result<Vec<Row>> {
        self.record(DummyCall::FetchAll(sql.to_string()));
        Ok(Vec::new())
    }

    async fn fetch_many(
        &self,
        _raw: &mut RawConnection,
        _n: usize,
        sql: &str,
        _args: &[Value],
    ) -> crate::Result<Vec<Row>> {
        self.record(DummyCall::FetchMany(sql.to_string()));
        Ok(Vec::new())
    }

    async fn fetch_one(
        &self,
        _raw: &mut RawConnection,
        sql: &str,
        _args: &[Value],
    ) -> crate::Result<Option<Row>> {
        self.record(DummyCall::FetchOne(sql.to_string()));
        Ok(None)
    }

    fn iterate<'a>(
        &'a self,
        _raw: &'a mut RawConnection,
        sql: String,
        _args: Vec<Value>,
    ) -> BoxStream<'a, crate::Result<Row>> {
        self.record(DummyCall::Iterate(sql));
        Box::pin(futures::stream::empty())
    }

    fn supports_native_transaction(&self) -> bool {
        self.native_transactions
    }

    async fn native_begin(&self, _raw: &mut RawConnection) -> crate::Result<()> {
        self.record(DummyCall::NativeBegin);
        Ok(())
    }

    async fn native_commit(&self, _raw: &mut RawConnection) -> crate::Result<()> {
        self.record(DummyCall::NativeCommit);
        Ok(())
    }

    async fn native_rollback(&self, _raw: &mut RawConnection) -> crate::Result<()> {
        self.record(DummyCall::NativeRollback);
        Ok(())
    }
}

/// Build a `dummy://` adapter, ignoring the URL entirely (matching the Python
/// `Backend` which opens nothing) and honoring only the `native` option flag.
pub fn factory(_url: Url, options: Options) -> crate::Result<Arc<dyn Adapter>> {
    let native = options.get_bool("native").unwrap_or(false);
    let adapter: Arc<dyn Adapter> = if native {
        Arc::new(DummyAdapter::with_native_transactions())
    } else {
        Arc::new(DummyAdapter::new())
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_connect_acquire_release_disconnect_in_order() {
        let adapter = DummyAdapter::new();
        adapter.connect().await.unwrap();
        let raw = adapter.acquire().await.unwrap();
        adapter.release(raw).await.unwrap();
        adapter.disconnect().await.unwrap();
        assert_eq!(
            adapter.calls(),
            vec![
                DummyCall::Connect,
                DummyCall::Acquire,
                DummyCall::Release,
                DummyCall::Disconnect,
            ]
        );
    }

    #[tokio::test]
    async fn execute_records_the_sql_text() {
        let adapter = DummyAdapter::new();
        let mut raw = adapter.acquire().await.unwrap();
        adapter
            .execute(&mut raw, "insert into t values (?)", &[Value::Int64(1)])
            .await
            .unwrap();
        assert_eq!(
            adapter.calls().last(),
            Some(&DummyCall::Execute("insert into t values (?)".to_string()))
        );
    }
}
