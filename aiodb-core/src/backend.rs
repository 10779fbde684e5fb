//! The backend adapter contract (§4.1) and the scheme -> adapter registry (§4.4).
//!
//! Concrete connection types differ per driver (`rusqlite::Connection`,
//! `tokio_postgres::Client`, ...), but the facade needs to dispatch across all of
//! them at *runtime* from a single URL — unlike `tank-core`, which is generic over
//! one statically-known `Driver` per call site. We resolve that the same way
//! `tank-core::query::dyn_query` resolves its own "one concrete type behind a
//! dynamic interface" problem: a type-erased handle downcast at the point of use,
//! behind an `async_trait` object (`Arc<dyn Adapter>`) for dyn-compatible async
//! methods — `async-trait` is not part of the teacher's own dependency set, but it
//! is exactly the tool `uporm-uorm`'s `Driver`/`Connection` traits reach for to get
//! an object-safe async interface across heterogeneous backends, which is the same
//! shape of problem here.

use crate::{BoxStream, Options, Row, Value, config_error, state_error};
use anyhow::Context;
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;
use url::Url;

/// A type-erased raw physical connection handed out by [`Adapter::acquire`] and
/// handed back to [`Adapter::release`]. Each adapter implementation downcasts it
/// to its own concrete connection type; the facade never looks inside.
pub struct RawConnection(Box<dyn Any + Send>);

impl RawConnection {
    pub fn new<T: Send + 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> &mut T {
        self.0
            .downcast_mut::<T>()
            .expect("raw connection type mismatch: adapter given a handle it did not create")
    }

    pub fn downcast<T: 'static>(self) -> T {
        match self.0.downcast::<T>() {
            Ok(v) => *v,
            Err(_) => {
                panic!("raw connection type mismatch: adapter given a handle it did not create")
            }
        }
    }
}

/// Normalized result of `execute`/`execute_many`: how many rows an operation
/// touched, and (driver-dependent) the last inserted id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RowsAffected {
    pub rows_affected: Option<u64>,
    pub last_inserted_id: Option<i64>,
}

/// The backend adapter contract: pool lifecycle, raw-connection acquire/release,
/// cursor operations, and the handful of points where drivers diverge (native
/// transactions, placeholder rewriting, execute-result parsing).
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Name used to match this adapter against a URL scheme (`aiosqlite`, ...).
    fn names(&self) -> &'static [&'static str];
    /// The canonical database family this adapter reports (`sqlite`, ...);
    /// matched against the scheme too, exactly like `db_type` in the original.
    fn db_type(&self) -> &'static str;
    /// Whether `%s` placeholders should be rewritten before reaching the driver.
    fn convert_params(&self) -> bool;

    /// Idempotent; opens the pool if the adapter is pooled, else a no-op.
    async fn connect(&self) -> crate::Result<()>;
    /// Idempotent; closes the pool (or a no-op). After this, `acquire` fails.
    async fn disconnect(&self) -> crate::Result<()>;

    /// Take a raw connection from the pool, or open a fresh one. Applies the
    /// configured `init` hook (if any) and uses its return value, so `init` may
    /// wrap or decorate the connection.
    async fn acquire(&self) -> crate::Result<RawConnection>;
    /// Return a raw connection to the pool, or close it.
    async fn release(&self, raw: RawConnection) -> crate::Result<()>;

    async fn execute(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> crate::Result<RowsAffected>;
    async fn execute_many(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        batch: &[Vec<Value>],
    ) -> crate::Result<RowsAffected>;
    async fn fetch_all(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> crate::Result<Vec<Row>>;
    async fn fetch_many(
        &self,
        raw: &mut RawConnection,
        n: usize,
        sql: &str,
        args: &[Value],
    ) -> crate::Result<Vec<Row>>;
    async fn fetch_one(
        &self,
        raw: &mut RawConnection,
        sql: &str,
        args: &[Value],
    ) -> crate::Result<Option<Row>>;

    /// A lazy, non-restartable stream of rows. Implementations build this with
    /// `async_stream::try_stream!`, the same idiom the teacher uses throughout its
    /// own connection implementations.
    fn iterate<'a>(
        &'a self,
        raw: &'a mut RawConnection,
        sql: String,
        args: Vec<Value>,
    ) -> BoxStream<'a, crate::Result<Row>>;

    /// Rewrite `%s` placeholders into this adapter's native marker syntax.
    /// Identity unless `convert_params()` is set.
    fn rewrite(&self, sql: &str) -> String {
        let _ = sql;
        sql.to_string()
    }

    /// Whether this adapter has a native driver-level transaction primitive
    /// (e.g. `tokio_postgres::Transaction`) it prefers over issuing `BEGIN`/
    /// `COMMIT`/`ROLLBACK` as SQL text.
    fn supports_native_transaction(&self) -> bool {
        false
    }
    async fn native_begin(&self, _raw: &mut RawConnection) -> crate::Result<()> {
        Err(state_error("this adapter has no native transaction primitive"))
    }
    async fn native_commit(&self, _raw: &mut RawConnection) -> crate::Result<()> {
        Err(state_error("this adapter has no native transaction primitive"))
    }
    async fn native_rollback(&self, _raw: &mut RawConnection) -> crate::Result<()> {
        Err(state_error("this adapter has no native transaction primitive"))
    }
}

/// Factory function registered per adapter family: given the parsed URL and the
/// merged option map, construct the adapter. Each backend crate supplies one of
/// these via [`BackendRegistry::register`].
pub type AdapterFactory = Arc<dyn Fn(Url, Options) -> crate::Result<Arc<dyn Adapter>> + Send + Sync>;

/// Maps a URL scheme (with its aliases) to the adapter factory that handles it.
///
/// Rust has no import-time side effects, so unlike `aio-databases`'s
/// `ABCDatabaseBackend.__init_subclass__` auto-registration, each enabled driver
/// crate is registered explicitly — the `aiodb` meta-crate does this once per
/// compiled-in feature at `Database::connect` time.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    entries: Vec<(&'static [&'static str], &'static str, AdapterFactory)>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, names: &'static [&'static str], db_type: &'static str, factory: AdapterFactory) {
        self.entries.push((names, db_type, factory));
    }

    /// Resolve `scheme` (already alias-normalized) against every registered
    /// adapter's names/db_type, in registration order, and build it.
    pub fn build(&self, scheme: &str, url: Url, options: Options) -> crate::Result<Arc<dyn Adapter>> {
        for (names, db_type, factory) in &self.entries {
            if names.contains(&scheme) || *db_type == scheme {
                return factory(url, options).context("while constructing the backend adapter");
            }
        }
        Err(config_error(format!(
            "Unsupported backend: '{scheme}', please enable a matching driver feature"
        )))
    }
}

pub mod dummy;
