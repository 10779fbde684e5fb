//! Backend configuration: URL query-string parameters merged with
//! constructor-supplied overrides, exactly as `ABCDatabaseBackend.__init__` folds
//! `parse_qsl(url.query)` together with `**options` in `aio-databases`.

use crate::RawConnection;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A single configuration value. Covers everything the URL query string or a
/// constructor override can carry, plus the one case that is a callback rather
/// than data: the `init` hook applied to every newly acquired raw connection.
#[derive(Clone)]
pub enum OptionValue {
    Text(String),
    Int(i64),
    Bool(bool),
    /// `init`: applied to a freshly acquired raw connection; its return value
    /// replaces the connection (so it may wrap or decorate it).
    Init(Arc<dyn InitHook>),
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Text(v) => f.debug_tuple("Text").field(v).finish(),
            OptionValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            OptionValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            OptionValue::Init(_) => f.write_str("Init(<fn>)"),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_owned())
    }
}
impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}
impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}
impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

/// Async callback applied to every newly acquired raw connection.
pub trait InitHook: Send + Sync {
    fn call<'a>(
        &'a self,
        raw: RawConnection,
    ) -> Pin<Box<dyn Future<Output = crate::Result<RawConnection>> + Send + 'a>>;
}

impl<F, Fut> InitHook for F
where
    F: Fn(RawConnection) -> Fut + Send + Sync,
    Fut: Future<Output = crate::Result<RawConnection>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        raw: RawConnection,
    ) -> Pin<Box<dyn Future<Output = crate::Result<RawConnection>> + Send + 'a>> {
        Box::pin(self(raw))
    }
}

/// Backend configuration: URL query parameters merged with constructor
/// overrides (the latter take precedence, matching `dict(parse_qsl(url.query),
/// **options)` in the original).
#[derive(Clone, Default, Debug)]
pub struct Options(HashMap<String, OptionValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_query_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = HashMap::new();
        for (k, v) in pairs {
            map.insert(k, OptionValue::Text(v));
        }
        Self(map)
    }

    /// Merge `overrides` on top of `self`, overrides winning on key conflicts.
    pub fn merged(mut self, overrides: Options) -> Self {
        for (k, v) in overrides.0 {
            self.0.insert(k, v);
        }
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.0.get(key)
    }

    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(OptionValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(OptionValue::Bool(v)) => Some(*v),
            Some(OptionValue::Text(v)) => match v.as_str() {
                "1" | "true" | "True" | "yes" => Some(true),
                "0" | "false" | "False" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(OptionValue::Int(v)) => Some(*v),
            Some(OptionValue::Text(v)) => v.parse().ok(),
            _ => None,
        }
    }

    pub fn init_hook(&self) -> Option<Arc<dyn InitHook>> {
        match self.0.get("init") {
            Some(OptionValue::Init(hook)) => Some(hook.clone()),
            _ => None,
        }
    }

    /// Remove and return a key, used by adapters to carve pool-sizing options
    /// out of the residual map before forwarding the rest to the driver.
    pub fn take(&mut self, key: &str) -> Option<OptionValue> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}
