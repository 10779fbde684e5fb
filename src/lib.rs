//! `aiodb`: a driver-agnostic async database access facade over SQLite,
//! PostgreSQL, MySQL and ODBC.
//!
//! This crate is a thin assembly layer: it re-exports the shared facade from
//! `aiodb-core` and wires in whichever backend crates are enabled as Cargo
//! features, the same split `tank` keeps between its core crate and its
//! per-driver crates.
//!
//! ```no_run
//! # async fn example() -> aiodb::Result<()> {
//! let db = aiodb::connect("sqlite://:memory:").await?;
//! db.execute("create table greeting (message text)", &[]).await?;
//! db.execute("insert into greeting values (?)", &[aiodb::Value::from("hello")]).await?;
//! let rows = db.fetch_all("select message from greeting", &[]).await?;
//! assert_eq!(rows[0].get(0).unwrap().as_str(), Some("hello"));
//! db.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub use aiodb_core::{
    Adapter, AdapterFactory, BackendRegistry, BoxStream, ColumnIndex, ConfigError, ConnectError,
    Database, DriverError, Error, InitHook, IsolationLevel, OptionValue, Options, RawConnection,
    Result, Row, RowsAffected, Session, StateError, Transaction, Value,
};

/// Build the registry of every backend compiled into this build, via its
/// enabled Cargo feature.
fn registry() -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    #[cfg(feature = "sqlite")]
    registry.register(&["sqlite", "aiosqlite"], "sqlite", std::sync::Arc::new(aiodb_sqlite::factory));
    #[cfg(feature = "postgres")]
    registry.register(
        &["postgresql", "asyncpg", "asyncpg+pool", "aiopg", "aiopg+pool", "triopg"],
        "postgresql",
        std::sync::Arc::new(aiodb_postgres::factory),
    );
    #[cfg(feature = "mysql")]
    registry.register(
        &["mysql", "aiomysql", "aiomysql+pool", "mariadb", "trio-mysql"],
        "mysql",
        std::sync::Arc::new(aiodb_mysql::factory),
    );
    #[cfg(feature = "odbc")]
    registry.register(&["odbc", "aioodbc", "aioodbc+pool"], "odbc", std::sync::Arc::new(aiodb_odbc::factory));
    registry.register(&["dummy"], "dummy", std::sync::Arc::new(aiodb_core::backend::dummy::factory));
    registry
}

/// Build a [`Database`] for `url` against every compiled-in backend, without
/// opening any connection yet.
pub fn database(url: impl Into<String>) -> Result<Database> {
    Database::new(url, &registry(), Options::new())
}

/// Build a [`Database`] for `url` with configuration overrides merged over its
/// query-string options.
pub fn database_with_options(url: impl Into<String>, overrides: Options) -> Result<Database> {
    Database::new(url, &registry(), overrides)
}

/// Build and immediately [`Database::connect`] a facade for `url`.
pub async fn connect(url: impl Into<String>) -> Result<Database> {
    let db = database(url)?;
    db.connect().await?;
    Ok(db)
}
