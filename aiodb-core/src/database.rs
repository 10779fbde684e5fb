//! `Database`: the top-level facade. Resolves a URL to a backend adapter, owns
//! its connect/disconnect lifecycle, and provides both scoped access to a
//! session (`with_connection`/`with_transaction`) and one-shot convenience
//! methods that acquire, run, and release a connection for a single call.
//!
//! Mirrors `aio_databases.database.Database`, with its `ConnectionContext`/
//! `TransactionContext` `async with` guards reshaped into the closure-based
//! scoping described in `task_local`.

use crate::{
    BackendRegistry, BoxStream, IsolationLevel, Options, Row, RowsAffected, Session, Value,
    task_local,
};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct Database {
    url: String,
    display_url: String,
    backend: Arc<dyn crate::Adapter>,
    is_connected: AtomicBool,
}

impl Database {
    /// Resolve `url`'s scheme against `registry`, merge `overrides` over the
    /// URL's own query-string options, and build the matching adapter. Does not
    /// open any connection yet — call [`Database::connect`] for that.
    pub fn new(url: impl Into<String>, registry: &BackendRegistry, overrides: Options) -> crate::Result<Self> {
        let url = url.into();
        let (parsed, base_options) = crate::url::parse(&url)?;
        let display_url = crate::url::redact(&parsed);
        let scheme = crate::url::normalize_scheme(parsed.scheme()).to_string();
        let options = base_options.merged(overrides);
        let backend = registry.build(&scheme, parsed, options)?;
        Ok(Self {
            url,
            display_url,
            backend,
            is_connected: AtomicBool::new(false),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Open the backend's pool. Idempotent.
    pub async fn connect(&self) -> crate::Result<()> {
        if !self.is_connected.load(Ordering::Acquire) {
            log::info!("Database connect: {}", self.display_url);
            self.backend.connect().await?;
            self.is_connected.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Release the task-current session (if any is attached to this task) and
    /// close the backend's pool. Idempotent.
    ///
    /// The original leaves releasing the current connection commented out; we
    /// do it, since otherwise `disconnect` can close the pool out from under a
    /// session another task still believes is attached.
    pub async fn disconnect(&self) -> crate::Result<()> {
        log::info!("Database disconnect: {}", self.display_url);
        if let Some(session) = task_local::current() {
            session.release().await?;
        }
        if self.is_connected.load(Ordering::Acquire) {
            self.backend.disconnect().await?;
            self.is_connected.store(false, Ordering::Release);
        }
        Ok(())
    }

    /// Run `body` against a session: the task-current one when `create` is
    /// `false` and one is already bound, otherwise a freshly acquired one. The
    /// session is released afterward only if this call is the one that created
    /// it, and is bound as task-current for `body`'s duration either way.
    pub async fn with_connection<F, Fut, T>(&self, create: bool, body: F) -> crate::Result<T>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        let existing = if create { None } else { task_local::current() };
        let (session, owns) = match existing {
            Some(session) => (session, false),
            None => (Arc::new(Session::new(self.backend.clone())), true),
        };

        session.acquire().await?;
        let result = {
            let session = session.clone();
            task_local::scoped(session.clone(), async move { body(session).await }).await
        };
        if owns {
            session.release().await?;
        }
        result
    }

    /// Run `body` inside a transaction, committing on success and rolling back
    /// on error. `create` has the same meaning as in [`Database::with_connection`]
    /// — `false` (the default callers should use) joins the task-current session
    /// so a nested call ends up as a nested (savepoint) transaction on the same
    /// connection, matching `TransactionContext`'s `use_existing=True` default.
    pub async fn with_transaction<F, Fut, T>(
        &self,
        silent: bool,
        create: bool,
        isolation_level: Option<IsolationLevel>,
        body: F,
    ) -> crate::Result<T>
    where
        F: FnOnce(Arc<Session>) -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        self.with_connection(create, move |session| async move {
            let mut tx = session.transaction(silent, isolation_level);
            tx.start().await?;
            match body(session.clone()).await {
                Ok(value) => {
                    tx.commit(None).await?;
                    Ok(value)
                }
                Err(error) => {
                    tx.rollback(None).await?;
                    Err(error)
                }
            }
        })
        .await
    }

    pub async fn execute(&self, sql: &str, args: &[Value]) -> crate::Result<RowsAffected> {
        self.with_connection(false, |session| async move { session.execute(sql, args).await })
            .await
    }

    pub async fn execute_many(&self, sql: &str, batch: &[Vec<Value>]) -> crate::Result<RowsAffected> {
        self.with_connection(false, |session| async move {
            session.execute_many(sql, batch).await
        })
        .await
    }

    pub async fn fetch_all(&self, sql: &str, args: &[Value]) -> crate::Result<Vec<Row>> {
        self.with_connection(false, |session| async move { session.fetch_all(sql, args).await })
            .await
    }

    pub async fn fetch_many(&self, n: usize, sql: &str, args: &[Value]) -> crate::Result<Vec<Row>> {
        self.with_connection(false, |session| async move {
            session.fetch_many(n, sql, args).await
        })
        .await
    }

    pub async fn fetch_one(&self, sql: &str, args: &[Value]) -> crate::Result<Option<Row>> {
        self.with_connection(false, |session| async move { session.fetch_one(sql, args).await })
            .await
    }

    pub async fn fetch_val(
        &self,
        sql: &str,
        args: &[Value],
        column: impl Into<crate::ColumnIndex>,
    ) -> crate::Result<Option<Value>> {
        self.with_connection(false, |session| async move {
            session.fetch_val(sql, args, column).await
        })
        .await
    }

    /// Iterate rows against the task-current session if one is bound, else a
    /// freshly acquired and released-at-drop one. Unlike the one-shot methods
    /// above, the returned stream borrows `self` directly rather than going
    /// through `with_connection`, since a stream can't be handed a body closure
    /// to run "inside" the scope — it outlives any single `.await`.
    pub fn iterate<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> BoxStream<'a, crate::Result<Row>> {
        let sql = sql.to_string();
        let args = args.to_vec();
        let backend = self.backend.clone();
        let stream = async_stream::try_stream! {
            let existing = task_local::current();
            let (session, owns) = match existing {
                Some(session) => (session, false),
                None => (Arc::new(Session::new(backend)), true),
            };
            session.acquire().await?;
            let mut inner = session.iterate(&sql, &args);
            while let Some(row) = futures::StreamExt::next(&mut inner).await {
                yield row?;
            }
            drop(inner);
            if owns {
                session.release().await?;
            }
        };
        Box::pin(stream)
    }
}
