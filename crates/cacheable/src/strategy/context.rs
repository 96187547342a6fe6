// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{any::Any, fmt::Debug, sync::Arc, time::Duration};

use cacheable_client::DynamicClient;
use futures::future::BoxFuture;
use serde::de::{DeserializeOwned, Error as _};
use serde_json::Value;

use crate::{CacheKey, Error};

/// A future producing the decorated method's fresh result.
pub type MethodFuture = BoxFuture<'static, Result<ReadValue, Error>>;

/// The outcome of a read: a value loaded from the store, or the method's fresh result.
///
/// A fresh result keeps the method's own value next to its store
/// representation. Callers of a decorated method receive that value unchanged;
/// only values loaded from the store are decoded.
#[derive(Clone)]
pub struct ReadValue {
    stored: Option<Value>,
    fresh: Option<Arc<dyn Any + Send + Sync>>,
}

impl ReadValue {
    /// Wraps a value loaded from the store.
    #[must_use]
    pub fn stored(value: Value) -> Self {
        Self {
            stored: Some(value),
            fresh: None,
        }
    }

    /// Wraps a result the method just returned.
    ///
    /// `stored` is `None` when the result has no store representation.
    pub(crate) fn fresh<R>(result: R, stored: Option<Value>) -> Self
    where
        R: Send + Sync + 'static,
    {
        Self {
            stored,
            fresh: Some(Arc::new(result)),
        }
    }

    /// The store representation, if there is one.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.stored.as_ref()
    }

    /// Returns `true` if the method produced this value during the call.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.fresh.is_some()
    }

    /// Recovers the method's return type: the fresh result itself, or the decoded stored value.
    pub(crate) fn into_result<R>(self) -> Result<R, Error>
    where
        R: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if let Some(fresh) = self.fresh {
            if let Ok(result) = fresh.downcast::<R>() {
                return Ok(Arc::unwrap_or_clone(result));
            }
        }

        match self.stored {
            Some(value) => serde_json::from_value(value).map_err(Error::decode),
            None => Err(Error::decode(serde_json::Error::custom("read produced no value"))),
        }
    }
}

impl Debug for ReadValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadValue")
            .field("stored", &self.stored)
            .field("fresh", &self.is_fresh())
            .finish()
    }
}

pub(crate) type Invoker = Arc<dyn Fn() -> MethodFuture + Send + Sync>;
pub(crate) type ValuePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Everything a [`ReadStrategy`](super::ReadStrategy) needs for one call.
///
/// Contexts are built fresh for every call and are read-only.
#[derive(Clone)]
pub struct ReadContext {
    method_name: Arc<str>,
    invoker: Invoker,
    client: DynamicClient,
    fallback_client: Option<DynamicClient>,
    key: String,
    ttl: Option<Duration>,
    debug: bool,
    is_cacheable: ValuePredicate,
}

impl ReadContext {
    /// Creates a context that caches every value with no TTL and no fallback.
    ///
    /// `invoke` runs the decorated method once per call.
    pub fn new<F>(method_name: impl Into<Arc<str>>, key: impl Into<String>, client: DynamicClient, invoke: F) -> Self
    where
        F: Fn() -> MethodFuture + Send + Sync + 'static,
    {
        Self {
            method_name: method_name.into(),
            invoker: Arc::new(invoke),
            client,
            fallback_client: None,
            key: key.into(),
            ttl: None,
            debug: false,
            is_cacheable: Arc::new(|_: &Value| true),
        }
    }

    /// Sets the fallback client.
    #[must_use]
    pub fn with_fallback_client(mut self, client: Option<DynamicClient>) -> Self {
        self.fallback_client = client;
        self
    }

    /// Sets the time-to-live for stored values.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the debug flag.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the predicate deciding which values may be served from and written to the store.
    #[must_use]
    pub fn with_is_cacheable<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.is_cacheable = Arc::new(predicate);
        self
    }

    /// The decorated method's name.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Runs the decorated method with the call's receiver and arguments.
    ///
    /// The returned future does not borrow the context. Its value is fresh and
    /// carries a store representation unless the result could not be encoded.
    #[must_use]
    pub fn invoke(&self) -> MethodFuture {
        (self.invoker)()
    }

    /// The primary client.
    #[must_use]
    pub fn client(&self) -> &DynamicClient {
        &self.client
    }

    /// The fallback client, if any.
    #[must_use]
    pub fn fallback_client(&self) -> Option<&DynamicClient> {
        self.fallback_client.as_ref()
    }

    /// The final cache key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The time-to-live for stored values.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Whether absorbed failures should be logged.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Returns `true` if `value` may be served from or written to the store.
    #[must_use]
    pub fn is_cacheable(&self, value: &Value) -> bool {
        (self.is_cacheable)(value)
    }

    pub(crate) fn invoker(&self) -> Invoker {
        Arc::clone(&self.invoker)
    }

    pub(crate) fn predicate(&self) -> ValuePredicate {
        Arc::clone(&self.is_cacheable)
    }
}

impl Debug for ReadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadContext")
            .field("method_name", &self.method_name)
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("debug", &self.debug)
            .field("has_fallback_client", &self.fallback_client.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything a [`ClearStrategy`](super::ClearStrategy) needs for one call.
#[derive(Clone, Debug)]
pub struct ClearContext {
    method_name: Arc<str>,
    client: DynamicClient,
    fallback_client: Option<DynamicClient>,
    key: CacheKey,
    is_pattern: bool,
    hashes_to_clear: Option<CacheKey>,
    debug: bool,
}

impl ClearContext {
    /// Creates a context that deletes `key` literally.
    pub fn new(method_name: impl Into<Arc<str>>, key: impl Into<CacheKey>, client: DynamicClient) -> Self {
        Self {
            method_name: method_name.into(),
            client,
            fallback_client: None,
            key: key.into(),
            is_pattern: false,
            hashes_to_clear: None,
            debug: false,
        }
    }

    /// Sets the fallback client.
    #[must_use]
    pub fn with_fallback_client(mut self, client: Option<DynamicClient>) -> Self {
        self.fallback_client = client;
        self
    }

    /// Treats the keys as patterns to expand through the client.
    #[must_use]
    pub fn with_pattern(mut self, is_pattern: bool) -> Self {
        self.is_pattern = is_pattern;
        self
    }

    /// Clears whole namespaces instead of keys.
    #[must_use]
    pub fn with_hashes_to_clear(mut self, hashes: Option<CacheKey>) -> Self {
        self.hashes_to_clear = hashes;
        self
    }

    /// Sets the debug flag.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The decorated method's name.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The primary client.
    #[must_use]
    pub fn client(&self) -> &DynamicClient {
        &self.client
    }

    /// The fallback client, if any.
    #[must_use]
    pub fn fallback_client(&self) -> Option<&DynamicClient> {
        self.fallback_client.as_ref()
    }

    /// The keys or patterns to clear.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Whether [`key`](Self::key) holds patterns.
    #[must_use]
    pub fn is_pattern(&self) -> bool {
        self.is_pattern
    }

    /// Namespaces to clear wholesale. Takes precedence over [`key`](Self::key).
    #[must_use]
    pub fn hashes_to_clear(&self) -> Option<&CacheKey> {
        self.hashes_to_clear.as_ref()
    }

    /// Whether absorbed failures should be logged.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }
}

/// Everything an [`UpdateStrategy`](super::UpdateStrategy) needs for one call.
#[derive(Clone, Debug)]
pub struct UpdateContext {
    method_name: Arc<str>,
    client: DynamicClient,
    fallback_client: Option<DynamicClient>,
    key: String,
    ttl: Option<Duration>,
    result: Value,
    debug: bool,
}

impl UpdateContext {
    /// Creates a context that writes `result` under `key`.
    pub fn new(method_name: impl Into<Arc<str>>, key: impl Into<String>, client: DynamicClient, result: Value) -> Self {
        Self {
            method_name: method_name.into(),
            client,
            fallback_client: None,
            key: key.into(),
            ttl: None,
            result,
            debug: false,
        }
    }

    /// Sets the fallback client.
    #[must_use]
    pub fn with_fallback_client(mut self, client: Option<DynamicClient>) -> Self {
        self.fallback_client = client;
        self
    }

    /// Sets the time-to-live for the stored value.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the debug flag.
    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// The decorated method's name.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The primary client.
    #[must_use]
    pub fn client(&self) -> &DynamicClient {
        &self.client
    }

    /// The fallback client, if any.
    #[must_use]
    pub fn fallback_client(&self) -> Option<&DynamicClient> {
        self.fallback_client.as_ref()
    }

    /// The final cache key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The time-to-live for the stored value.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// The method's result, already produced.
    #[must_use]
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// Whether absorbed failures should be logged.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }
}
