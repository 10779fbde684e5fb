//! Crate-wide error type.
//!
//! Like `tank-core`, we standardize on a single `anyhow`-based alias rather than a
//! `thiserror` enum, since most call sites only ever propagate the error with added
//! context. The four logical kinds from the error handling design are small marker
//! types carried inside the `anyhow::Error` so callers that need to branch on "was
//! this a StateError eligible for silent downgrade" can `downcast_ref` for it.

use std::fmt;

/// Crate-wide result alias using `anyhow` for flexible error context.
pub type Result<T> = anyhow::Result<T>;
/// Crate-wide error alias using `anyhow`.
pub type Error = anyhow::Error;

/// Unknown scheme, contradictory options, or any other misconfiguration caught
/// before a driver is ever touched.
#[derive(Debug, Clone)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for ConfigError {}

/// A backend failed to open its pool or to acquire a raw connection.
#[derive(Debug, Clone)]
pub struct ConnectError(pub String);

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for ConnectError {}

/// An operation was invalid in the current lifecycle state (transaction on a
/// detached session, commit/rollback on a terminated transaction, ...).
///
/// `silent_eligible` marks errors that a `Transaction` in `silent` mode is allowed
/// to downgrade to a no-op instead of propagating.
#[derive(Debug, Clone)]
pub struct StateError {
    pub message: String,
    pub silent_eligible: bool,
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for StateError {}

/// Anything the underlying driver raised from a cursor call, propagated as-is.
#[derive(Debug)]
pub struct DriverError(pub anyhow::Error);

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.0)
    }
}
impl std::error::Error for DriverError {}

/// Build and log a `ConfigError`.
pub fn config_error(message: impl Into<String>) -> Error {
    let error = Error::new(ConfigError(message.into()));
    log::error!("{:#}", error);
    error
}

/// Build and log a `ConnectError`.
pub fn connect_error(message: impl Into<String>) -> Error {
    let error = Error::new(ConnectError(message.into()));
    log::error!("{:#}", error);
    error
}

/// Build (and log, unless `silent_eligible`) a `StateError`.
pub fn state_error(message: impl Into<String>) -> Error {
    let error = Error::new(StateError {
        message: message.into(),
        silent_eligible: false,
    });
    log::error!("{:#}", error);
    error
}

/// A `StateError` that a `silent` `Transaction` may downgrade to success instead
/// of propagating. Not logged at error level since it may never surface.
pub fn state_error_silent(message: impl Into<String>) -> Error {
    Error::new(StateError {
        message: message.into(),
        silent_eligible: true,
    })
}

/// Wrap a driver-raised error, logging it once at the point it first surfaces.
pub fn driver_error(source: impl Into<anyhow::Error>) -> Error {
    let error = Error::new(DriverError(source.into()));
    log::error!("{:#}", error);
    error
}

/// True iff `error` is a `StateError` marked `silent_eligible`.
pub fn is_silent_eligible(error: &Error) -> bool {
    error
        .downcast_ref::<StateError>()
        .map(|e| e.silent_eligible)
        .unwrap_or(false)
}
