//! The "currently attached session" registry.
//!
//! `aio-databases` keeps this in a `contextvars.ContextVar[Optional[ABCConnection]]`
//! that `ConnectionContext.__aenter__`/`__aexit__` `set`/`reset` around the body of
//! an `async with`. `tokio::task_local!` gives us the same per-task-tree storage,
//! but only as `LocalKey::scope(value, future)` — a value can only be bound for the
//! lifetime of one future, there is no free-standing `set`/`reset` pair we could
//! call from a guard's constructor and destructor (`Drop` cannot `.await`, and
//! dropping a task-local binding early isn't exposed at all). So instead of a
//! `ConnectionContext` guard object, [`scoped`] takes the body as a closure and
//! runs it *inside* the scope — "enter, run, always exit" expressed as a
//! higher-order function rather than RAII.

use crate::Session;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT_SESSION: Arc<Session>;
}

/// The session bound to the current task, if any (`Database.current_conn` in the
/// original). `None` outside of [`scoped`] or after [`Database::disconnect`].
pub fn current() -> Option<Arc<Session>> {
    CURRENT_SESSION.try_with(|s| s.clone()).ok()
}

/// Run `fut` with `session` bound as the task-current session for its duration.
/// Nesting `scoped` calls shadows the outer binding for the inner future only,
/// matching `current_conn.set`/`reset` around a nested `async with`.
pub async fn scoped<F, T>(session: Arc<Session>, fut: F) -> T
where
    F: Future<Output = T>,
{
    CURRENT_SESSION.scope(session, fut).await
}

/// Propagate the task-current session into a `tokio::spawn`ed child task, for
/// call sites that need to hand work off rather than `.await` it inline (the
/// original relies on `contextvars`' automatic propagation into every new task,
/// which `tokio::task_local!` does not do for `tokio::spawn`).
pub fn bind_task<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let current = current();
    async move {
        match current {
            Some(session) => scoped(session, fut).await,
            None => fut.await,
        }
    }
}
