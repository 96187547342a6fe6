// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type-erased client handle.

use std::{fmt::Debug, sync::Arc, time::Duration};

use serde_json::Value;

use crate::{CacheClient, Error, client::DynCacheClient};

/// Extension trait for converting any [`CacheClient`] into a [`DynamicClient`].
///
/// This trait is automatically implemented for all types that implement `CacheClient`.
///
/// # Examples
///
/// ```
/// use cacheable_client::{CacheClient, DynamicClient, DynamicClientExt};
///
/// fn erase<T>(client: T) -> DynamicClient
/// where
///     T: CacheClient + 'static,
/// {
///     client.into_dynamic()
/// }
/// ```
pub trait DynamicClientExt: Sized {
    /// Converts this client into a `DynamicClient`.
    fn into_dynamic(self) -> DynamicClient;
}

impl<T> DynamicClientExt for T
where
    T: CacheClient + 'static,
{
    fn into_dynamic(self) -> DynamicClient {
        DynamicClient::new(self)
    }
}

/// A clonable client with type erasure.
///
/// `DynamicClient` wraps a trait object in an `Arc`, so the same store can be
/// shared by a process-wide configuration and any number of call sites.
pub struct DynamicClient(Arc<DynCacheClient<'static>>);

impl DynamicClient {
    /// Creates a dynamic client from any `CacheClient` implementation.
    pub fn new<T>(client: T) -> Self
    where
        T: CacheClient + 'static,
    {
        Self(DynCacheClient::new_arc(client))
    }

    /// Returns `true` if both handles refer to the same underlying client.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for DynamicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicClient").finish_non_exhaustive()
    }
}

impl Clone for DynamicClient {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl CacheClient for DynamicClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
        self.0.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), Error> {
        self.0.set(key, value, ttl).await
    }

    async fn del(&self, keys: &[String]) -> Result<(), Error> {
        self.0.del(keys).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        self.0.keys(pattern).await
    }

    async fn del_hash(&self, hashes: &[String]) -> Result<(), Error> {
        self.0.del_hash(hashes).await
    }

    fn client_ttl(&self) -> Option<Duration> {
        self.0.client_ttl()
    }
}
