//! Driver-agnostic async database access: the shared core.
//!
//! This crate carries everything that does not depend on a specific wire
//! protocol — the `Session`/`Transaction`/`Database` facade, the task-local
//! "current connection" registry, configuration, row/value types, and the
//! `Adapter` trait each backend crate (`aiodb-sqlite`, `aiodb-postgres`, ...)
//! implements. Mirrors the split between `tank-core` and its driver crates.

pub mod backend;
pub mod database;
pub mod error;
pub mod marker;
pub mod options;
pub mod pg_status;
pub mod row;
pub mod session;
pub mod task_local;
pub mod transaction;
pub mod url;
pub mod value;

pub use backend::{Adapter, AdapterFactory, BackendRegistry, RawConnection, RowsAffected};
pub use database::Database;
pub use error::{
    ConfigError, ConnectError, DriverError, Error, Result, StateError, config_error,
    connect_error, driver_error, is_silent_eligible, state_error, state_error_silent,
};
pub use marker::PlaceholderStyle;
pub use options::{InitHook, OptionValue, Options};
pub use row::{ColumnIndex, Row};
pub use session::Session;
pub use transaction::{IsolationLevel, Transaction};
pub use value::Value;

/// A boxed, pinned stream of fallible items, the shape every `Adapter::iterate`
/// and `Session::iterate` returns. Matches the `futures::stream::BoxStream` alias
/// the teacher's own streaming query paths use.
pub type BoxStream<'a, T> = std::pin::Pin<Box<dyn futures::Stream<Item = T> + Send + 'a>>;
