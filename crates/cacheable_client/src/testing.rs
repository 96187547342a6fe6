// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock client implementation for testing.
//!
//! This module provides `MockClient`, a configurable in-memory client that
//! records all operations and supports failure injection for testing error paths.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use crate::{CacheClient, Error};

/// Recorded client operation with full context.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOp {
    /// A get was performed for the given key.
    Get(String),
    /// A set was performed.
    Set {
        /// The key written.
        key: String,
        /// The value written.
        value: Value,
        /// The TTL requested by the caller.
        ttl: Option<Duration>,
    },
    /// A delete was performed for the given keys.
    Del(Vec<String>),
    /// A key listing was performed with the given pattern.
    Keys(String),
    /// A namespace delete was performed for the given hashes.
    DelHash(Vec<String>),
}

impl ClientOp {
    /// Returns the key of a `Get` or `Set` operation.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Get(key) | Self::Set { key, .. } => Some(key),
            _ => None,
        }
    }
}

type FailPredicate = Box<dyn Fn(&ClientOp) -> bool + Send + Sync>;

/// A configurable mock client for testing.
///
/// Values live in an in-memory map. Every operation is recorded, and
/// [`fail_when`](Self::fail_when) makes selected operations fail.
/// `keys` interprets its pattern as a regular expression and `del_hash`
/// removes every key starting with `"<hash>:"`.
///
/// # Examples
///
/// ```
/// use cacheable_client::{CacheClient, testing::{ClientOp, MockClient}};
/// use serde_json::json;
/// # futures::executor::block_on(async {
///
/// let client = MockClient::new();
/// client.set("user:1", json!("Ann"), None).await.unwrap();
/// assert_eq!(client.get("user:1").await.unwrap(), Some(json!("Ann")));
///
/// // Fail every read from now on.
/// client.fail_when(|op| matches!(op, ClientOp::Get(_)));
/// client.get("user:1").await.unwrap_err();
/// # });
/// ```
pub struct MockClient {
    data: Arc<Mutex<BTreeMap<String, Value>>>,
    operations: Arc<Mutex<Vec<ClientOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
    ttl: Option<Duration>,
}

impl std::fmt::Debug for MockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClient")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Clone for MockClient {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            ttl: self.ttl,
        }
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// Creates a new empty mock client without a default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(BTreeMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            ttl: None,
        }
    }

    /// Creates a mock client reporting `ttl` from [`CacheClient::client_ttl`].
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), ..Self::new() }
    }

    /// Sets a predicate that decides which operations fail.
    ///
    /// Failed operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&ClientOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Makes every operation fail.
    pub fn fail_always(&self) {
        self.fail_when(|_| true);
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<ClientOp> {
        self.operations.lock().clone()
    }

    /// Returns how many recorded operations satisfy `filter`.
    #[must_use]
    pub fn count(&self, filter: impl Fn(&ClientOp) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| filter(op)).count()
    }

    /// Returns the number of recorded `get` operations.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.count(|op| matches!(op, ClientOp::Get(_)))
    }

    /// Returns the number of recorded `set` operations.
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.count(|op| matches!(op, ClientOp::Set { .. }))
    }

    /// Returns the number of recorded `del` operations.
    #[must_use]
    pub fn del_count(&self) -> usize {
        self.count(|op| matches!(op, ClientOp::Del(_)))
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Returns the stored value for `key` without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.data.lock().get(key).cloned()
    }

    /// Stores a value without recording an operation.
    pub fn seed(&self, key: impl Into<String>, value: Value) {
        self.data.lock().insert(key.into(), value);
    }

    /// Returns `true` if a value is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    fn record(&self, op: ClientOp) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let message = match &op {
            ClientOp::Get(_) => "mock: get failed",
            ClientOp::Set { .. } => "mock: set failed",
            ClientOp::Del(_) => "mock: del failed",
            ClientOp::Keys(_) => "mock: keys failed",
            ClientOp::DelHash(_) => "mock: del_hash failed",
        };
        self.operations.lock().push(op);
        if fail { Err(Error::caused_by(message)) } else { Ok(()) }
    }
}

impl CacheClient for MockClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        self.record(ClientOp::Get(key.to_string()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), Error> {
        self.record(ClientOp::Set {
            key: key.to_string(),
            value: value.clone(),
            ttl,
        })?;
        self.data.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<(), Error> {
        self.record(ClientOp::Del(keys.to_vec()))?;
        let mut data = self.data.lock();
        for key in keys {
            data.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        self.record(ClientOp::Keys(pattern.to_string()))?;
        let regex = Regex::new(pattern).map_err(Error::caused_by)?;
        Ok(self.data.lock().keys().filter(|key| regex.is_match(key)).cloned().collect())
    }

    async fn del_hash(&self, hashes: &[String]) -> Result<(), Error> {
        self.record(ClientOp::DelHash(hashes.to_vec()))?;
        let prefixes: Vec<String> = hashes.iter().map(|hash| format!("{hash}:")).collect();
        self.data
            .lock()
            .retain(|key, _| !prefixes.iter().any(|prefix| key.starts_with(prefix)));
        Ok(())
    }

    fn client_ttl(&self) -> Option<Duration> {
        self.ttl
    }
}
