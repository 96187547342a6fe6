// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The capability every backing store must provide.

use std::time::Duration;

use serde_json::Value;

use crate::Error;

/// Trait for cache store adapters.
///
/// All operations are asynchronous and fallible. A failure is a first-class
/// signal: the caching core reacts to it by trying a fallback client or by
/// degrading to an uncached call, never by failing the decorated method.
///
/// Multi-key operations take slices, so deleting a single key and deleting
/// many keys go through the same call.
#[dynosaur::dynosaur(pub(crate) DynCacheClient = dyn(box) CacheClient, bridge(none))]
pub trait CacheClient: Send + Sync {
    /// Looks up the value stored under `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, Error>> + Send;

    /// Stores `value` under `key`.
    ///
    /// A `ttl` of `None` means "use the store's default expiration".
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Deletes every listed key.
    fn del(&self, keys: &[String]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Lists the stored keys matching `pattern`.
    ///
    /// Pattern syntax is defined by the store (glob for network stores,
    /// regular expressions for in-process maps).
    fn keys(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>, Error>> + Send;

    /// Deletes every key living under any of the given namespace prefixes.
    fn del_hash(&self, hashes: &[String]) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns the store's default time-to-live, if it has one.
    fn client_ttl(&self) -> Option<Duration> {
        None
    }
}
