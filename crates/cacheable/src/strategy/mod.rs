// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pluggable algorithms behind the three decorators.
//!
//! A strategy receives a fully resolved context and talks to the store. The
//! built-in strategies absorb store failures: a broken store degrades to
//! calling the method, it never fails a call that would otherwise succeed.
//! Custom strategies may choose differently.

use std::{fmt::Debug, sync::Arc, time::Duration};

use cacheable_client::{CacheClient, DynamicClient};
use serde_json::Value;

use crate::{
    Error,
    telemetry::{self, Activity},
};

mod clear;
mod context;
mod noop;
mod read;
mod update;

pub use clear::DefaultClearStrategy;
pub use context::{ClearContext, MethodFuture, ReadContext, ReadValue, UpdateContext};
pub use noop::{NoOpClearStrategy, NoOpReadStrategy, NoOpUpdateStrategy};
pub use read::DefaultReadStrategy;
pub use update::DefaultUpdateStrategy;

/// Serves a decorated call from the store, or runs the method and stores its result.
///
/// # Examples
///
/// ```
/// use cacheable::{Error, ReadContext, ReadStrategy, ReadValue};
///
/// /// Always runs the method and never touches the store.
/// struct Bypass;
///
/// impl ReadStrategy for Bypass {
///     async fn handle(&self, context: &ReadContext) -> Result<ReadValue, Error> {
///         context.invoke().await
///     }
/// }
/// ```
#[dynosaur::dynosaur(pub(crate) DynReadStrategy = dyn(box) ReadStrategy, bridge(none))]
pub trait ReadStrategy: Send + Sync {
    /// Produces the call's result.
    fn handle(&self, context: &ReadContext) -> impl Future<Output = Result<ReadValue, Error>> + Send;
}

/// Removes entries after a decorated method succeeded.
#[dynosaur::dynosaur(pub(crate) DynClearStrategy = dyn(box) ClearStrategy, bridge(none))]
pub trait ClearStrategy: Send + Sync {
    /// Clears the entries described by `context`.
    fn handle(&self, context: &ClearContext) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Writes a freshly produced result to the store.
#[dynosaur::dynosaur(pub(crate) DynUpdateStrategy = dyn(box) UpdateStrategy, bridge(none))]
pub trait UpdateStrategy: Send + Sync {
    /// Stores the result and returns the representation that was stored.
    ///
    /// The decorated call hands the method's own result back to its caller.
    fn handle(&self, context: &UpdateContext) -> impl Future<Output = Result<Value, Error>> + Send;
}

/// A clonable, type-erased [`ReadStrategy`].
///
/// Clones share one strategy instance, including any in-flight bookkeeping it keeps.
#[derive(Clone)]
pub struct SharedReadStrategy(Arc<DynReadStrategy<'static>>);

impl SharedReadStrategy {
    /// Wraps a strategy.
    pub fn new(strategy: impl ReadStrategy + 'static) -> Self {
        Self(DynReadStrategy::new_arc(strategy))
    }
}

impl Debug for SharedReadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedReadStrategy").finish_non_exhaustive()
    }
}

impl ReadStrategy for SharedReadStrategy {
    async fn handle(&self, context: &ReadContext) -> Result<ReadValue, Error> {
        self.0.handle(context).await
    }
}

/// A clonable, type-erased [`ClearStrategy`].
#[derive(Clone)]
pub struct SharedClearStrategy(Arc<DynClearStrategy<'static>>);

impl SharedClearStrategy {
    /// Wraps a strategy.
    pub fn new(strategy: impl ClearStrategy + 'static) -> Self {
        Self(DynClearStrategy::new_arc(strategy))
    }
}

impl Debug for SharedClearStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedClearStrategy").finish_non_exhaustive()
    }
}

impl ClearStrategy for SharedClearStrategy {
    async fn handle(&self, context: &ClearContext) -> Result<(), Error> {
        self.0.handle(context).await
    }
}

/// A clonable, type-erased [`UpdateStrategy`].
#[derive(Clone)]
pub struct SharedUpdateStrategy(Arc<DynUpdateStrategy<'static>>);

impl SharedUpdateStrategy {
    /// Wraps a strategy.
    pub fn new(strategy: impl UpdateStrategy + 'static) -> Self {
        Self(DynUpdateStrategy::new_arc(strategy))
    }
}

impl Debug for SharedUpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedUpdateStrategy").finish_non_exhaustive()
    }
}

impl UpdateStrategy for SharedUpdateStrategy {
    async fn handle(&self, context: &UpdateContext) -> Result<Value, Error> {
        self.0.handle(context).await
    }
}

/// Where a value is written.
pub(crate) struct Target<'a> {
    pub(crate) method_name: &'a str,
    pub(crate) client: &'a DynamicClient,
    pub(crate) fallback_client: Option<&'a DynamicClient>,
    pub(crate) key: &'a str,
    pub(crate) ttl: Option<Duration>,
    pub(crate) debug: bool,
}

/// Writes `value` to the primary client, retrying on the fallback client if that fails.
///
/// Failures are reported and absorbed.
pub(crate) async fn write_through(target: Target<'_>, value: &Value) {
    let Err(error) = target.client.set(target.key, value.clone(), target.ttl).await else {
        return;
    };

    if let Some(fallback) = target.fallback_client {
        if let Err(fallback_error) = fallback.set(target.key, value.clone(), target.ttl).await {
            telemetry::report(
                target.debug,
                target.method_name,
                Activity::FallbackSetFailed,
                Some(target.key),
                Some(&fallback_error),
            );
        }
    }

    telemetry::report(target.debug, target.method_name, Activity::SetFailed, Some(target.key), Some(&error));
}
