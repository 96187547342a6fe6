// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Collapses concurrent operations that share a key into one execution.

use std::{collections::HashMap, hash::Hash, panic::AssertUnwindSafe, sync::Arc};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use parking_lot::Mutex;

/// Reported to every waiter when the shared operation panicked.
#[derive(Clone, Copy, Debug, thiserror::Error)]
#[error("a shared in-flight operation panicked")]
pub(crate) struct Panicked;

type Pending<T> = Shared<BoxFuture<'static, Result<T, Panicked>>>;

/// A map of operations currently running, keyed by what they compute.
///
/// The first caller for a key starts the work; callers arriving while it runs
/// await the same execution and receive a clone of its output. The entry is
/// removed as soon as the work settles, so the next caller starts afresh.
pub(crate) struct InFlight<K, T> {
    pending: Arc<Mutex<HashMap<K, Pending<T>>>>,
}

impl<K, T> InFlight<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Joins the operation running for `key`, or starts `work` if there is none.
    pub(crate) fn run<F, Fut>(&self, key: K, work: F) -> Pending<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut pending = self.pending.lock();
        if let Some(existing) = pending.get(&key) {
            return existing.clone();
        }

        let map = Arc::clone(&self.pending);
        let owned_key = key.clone();
        let future = work();
        let shared = async move {
            let output = AssertUnwindSafe(future).catch_unwind().await.map_err(|_panic| Panicked);
            map.lock().remove(&owned_key);
            output
        }
        .boxed()
        .shared();

        pending.insert(key, shared.clone());
        shared
    }

    /// Returns the number of operations currently running.
    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<K, T> std::fmt::Debug for InFlight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlight").field("pending", &self.pending.lock().len()).finish()
    }
}
