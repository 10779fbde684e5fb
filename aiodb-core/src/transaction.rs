//! Transaction state machine: start -> active -> terminated (committed or rolled
//! back), with nested transactions synthesized as SAVEPOINTs.
//!
//! Ported from `ABCTransaction`/`backends/common.py`'s `Transaction` in
//! `aio-databases`: the first transaction on a session issues `BEGIN`, every
//! transaction opened while one is already active on that session issues
//! `SAVEPOINT AIODB__<uuid>` instead, and `commit`/`rollback` mirror that choice
//! with `RELEASE SAVEPOINT`/`ROLLBACK TO SAVEPOINT`.

use crate::{Session, state_error, state_error_silent};
use uuid::Uuid;

/// Transaction isolation level, forwarded to backends that support setting one
/// natively (PostgreSQL). Adapters that don't are free to ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unstarted,
    Active,
    Terminated,
}

/// A transaction scoped to one [`Session`]. Not `Clone`: a transaction has at
/// most one owner, who is responsible for calling `commit` or `rollback` exactly
/// once after `start`.
pub struct Transaction<'a> {
    session: &'a Session,
    id: u64,
    savepoint: Option<String>,
    silent: bool,
    isolation_level: Option<IsolationLevel>,
    phase: Phase,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(session: &'a Session, silent: bool, isolation_level: Option<IsolationLevel>) -> Self {
        Self {
            session,
            id: session.next_transaction_id(),
            savepoint: None,
            silent,
            isolation_level,
            phase: Phase::Unstarted,
        }
    }

    /// Begin the transaction: `BEGIN` if this session has no transaction active
    /// yet, else a freshly named `SAVEPOINT`.
    pub async fn start(&mut self) -> crate::Result<()> {
        if self.phase != Phase::Unstarted {
            return Err(state_error("transaction already started"));
        }
        if !self.session.is_ready() {
            return Err(state_error(
                "there is no acquired connection to start a transaction on",
            ));
        }

        let nested = self.session.has_active_transaction();
        self.session
            .with_raw(|adapter, raw| {
                let savepoint = nested.then(|| format!("AIODB__{}", Uuid::new_v4().simple()));
                Box::pin(async move {
                    if adapter.supports_native_transaction() {
                        adapter.native_begin(raw).await?;
                    } else if let Some(sp) = &savepoint {
                        adapter.execute(raw, &format!("SAVEPOINT {sp}"), &[]).await?;
                    } else {
                        adapter.execute(raw, "BEGIN", &[]).await?;
                    }
                    Ok(savepoint)
                })
            })
            .await
            .map(|sp| self.savepoint = sp)?;

        self.session.register_transaction(self.id);
        self.phase = Phase::Active;
        Ok(())
    }

    /// Commit the transaction. If the session was released out from under it,
    /// succeeds silently when `silent` (constructor default or `silent` override)
    /// is set, else returns a `StateError`.
    pub async fn commit(&mut self, silent: Option<bool>) -> crate::Result<()> {
        self.terminate(true, silent).await
    }

    /// Roll back the transaction. Same silent-on-detached-session semantics as
    /// [`Transaction::commit`].
    pub async fn rollback(&mut self, silent: Option<bool>) -> crate::Result<()> {
        self.terminate(false, silent).await
    }

    async fn terminate(&mut self, commit: bool, silent: Option<bool>) -> crate::Result<()> {
        if self.phase != Phase::Active {
            return Err(state_error("transaction is not active"));
        }
        self.session.unregister_transaction(self.id);
        self.phase = Phase::Terminated;

        if !self.session.is_ready() {
            let silent = silent.unwrap_or(self.silent);
            if silent {
                let error = state_error_silent(
                    "session was released before the transaction could be terminated",
                );
                log::debug!("{:#} (silent, downgraded to success)", error);
                return Ok(());
            }
            return Err(state_error(
                "there is no acquired connection to terminate the transaction on",
            ));
        }

        let savepoint = self.savepoint.clone();
        self.session
            .with_raw(|adapter, raw| {
                Box::pin(async move {
                    if adapter.supports_native_transaction() {
                        if commit {
                            adapter.native_commit(raw).await
                        } else {
                            adapter.native_rollback(raw).await
                        }
                    } else {
                        let sql = match (&savepoint, commit) {
                            (Some(sp), true) => format!("RELEASE SAVEPOINT {sp}"),
                            (Some(sp), false) => format!("ROLLBACK TO SAVEPOINT {sp}"),
                            (None, true) => "COMMIT".to_string(),
                            (None, false) => "ROLLBACK".to_string(),
                        };
                        adapter.execute(raw, &sql, &[]).await.map(|_| ())
                    }
                })
            })
            .await
    }

    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation_level
    }

    /// Run `body`, committing on success and rolling back if it returns `Err` or
    /// panics-unwinds past this point, mirroring `ABCTransaction.__aexit__`.
    pub async fn run<F, Fut, T>(mut self, body: F) -> crate::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = crate::Result<T>>,
    {
        self.start().await?;
        match body().await {
            Ok(value) => {
                self.commit(None).await?;
                Ok(value)
            }
            Err(error) => {
                self.rollback(None).await?;
                Err(error)
            }
        }
    }
}
