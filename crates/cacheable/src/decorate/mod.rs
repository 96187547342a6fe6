// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolution shared by the three decorators.

use std::sync::Arc;

use cacheable_client::DynamicClient;
use futures::{FutureExt, future::BoxFuture};

use crate::{
    Error, Setting,
    manager::{ManagerState, MissingClientPolicy},
    telemetry::{self, Activity},
};

pub(crate) mod cache_clear;
pub(crate) mod cache_update;
pub(crate) mod cacheable;

/// A decorated method with its error erased.
pub(crate) type MethodFn<C, A, R> = Arc<dyn Fn(C, A) -> BoxFuture<'static, Result<R, Error>> + Send + Sync>;

pub(crate) fn erase_method<C, A, R, E, F, Fut>(method: F) -> MethodFn<C, A, R>
where
    C: 'static,
    A: 'static,
    R: Send + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    F: Fn(C, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
{
    Arc::new(move |context, args| {
        let future = method(context, args);
        async move { future.await.map_err(Error::method) }.boxed()
    })
}

/// Per-call-site options every decorator accepts.
pub(crate) struct CommonOptions<A, C, R> {
    pub(crate) hash_key: Option<Setting<String, A, C, R>>,
    pub(crate) client: Option<Setting<DynamicClient, A, C, R>>,
    pub(crate) fallback_client: Option<Setting<DynamicClient, A, C, R>>,
    pub(crate) noop: Option<Setting<bool, A, C, R>>,
}

impl<A, C, R> Default for CommonOptions<A, C, R> {
    fn default() -> Self {
        Self {
            hash_key: None,
            client: None,
            fallback_client: None,
            noop: None,
        }
    }
}

/// How a decorated call proceeds.
pub(crate) enum Plan {
    /// Run the method and nothing else.
    PassThrough,
    /// Go through the strategy with these clients.
    Cache {
        client: DynamicClient,
        fallback_client: Option<DynamicClient>,
    },
    /// Fail without running the method.
    Fail(Error),
}

impl<A, C, R> CommonOptions<A, C, R> {
    /// Decides whether the call is cached and with which clients.
    ///
    /// `noop` builders always see the receiver; the other builders see it only
    /// when the manager does not exclude it.
    pub(crate) fn plan(&self, method_name: &str, state: &ManagerState, args: &A, context: &C) -> Plan {
        let options = &state.options;
        if options.is_disabled() {
            return Plan::PassThrough;
        }
        if self.noop.as_ref().is_some_and(|noop| noop.resolve(args, Some(context), None)) {
            return Plan::PassThrough;
        }

        let scope = scope(state, context);
        let client = self
            .client
            .as_ref()
            .map(|client| client.resolve(args, scope, None))
            .or_else(|| state.client.clone());

        let Some(client) = client else {
            return match options.missing_client_policy() {
                MissingClientPolicy::PassThrough => {
                    telemetry::report(options.is_debug(), method_name, Activity::MissingClient, None, None);
                    Plan::PassThrough
                }
                MissingClientPolicy::Error => Plan::Fail(Error::MissingClient {
                    method: method_name.to_string(),
                }),
            };
        };

        let fallback_client = self
            .fallback_client
            .as_ref()
            .map(|fallback| fallback.resolve(args, scope, None))
            .or_else(|| state.fallback_client.clone());

        Plan::Cache { client, fallback_client }
    }
}

/// The receiver as seen by key derivation and builders.
pub(crate) fn scope<'a, C>(state: &ManagerState, context: &'a C) -> Option<&'a C> {
    if state.options.excludes_context() { None } else { Some(context) }
}

/// Builder methods for the options in [`CommonOptions`].
macro_rules! common_options {
    () => {
        /// Prefixes every key with `<hash>:` so related entries can be cleared together.
        #[must_use]
        pub fn hash_key(mut self, hash: impl Into<String>) -> Self {
            self.common.hash_key = Some($crate::Setting::value(hash.into()));
            self
        }

        /// Computes the hash key from each call.
        #[must_use]
        pub fn hash_key_with<H>(mut self, hash: H) -> Self
        where
            H: Fn(&A, Option<&C>, Option<&R>) -> String + Send + Sync + 'static,
        {
            self.common.hash_key = Some($crate::Setting::from_fn(hash));
            self
        }

        /// Uses this client instead of the manager's.
        #[must_use]
        pub fn client(mut self, client: impl ::cacheable_client::CacheClient + 'static) -> Self {
            self.common.client = Some($crate::Setting::value(::cacheable_client::DynamicClient::new(client)));
            self
        }

        /// Picks the client for each call.
        #[must_use]
        pub fn client_with<P>(mut self, client: P) -> Self
        where
            P: Fn(&A, Option<&C>, Option<&R>) -> ::cacheable_client::DynamicClient + Send + Sync + 'static,
        {
            self.common.client = Some($crate::Setting::from_fn(client));
            self
        }

        /// Uses this fallback client instead of the manager's.
        #[must_use]
        pub fn fallback_client(mut self, client: impl ::cacheable_client::CacheClient + 'static) -> Self {
            self.common.fallback_client = Some($crate::Setting::value(::cacheable_client::DynamicClient::new(client)));
            self
        }

        /// Picks the fallback client for each call.
        #[must_use]
        pub fn fallback_client_with<P>(mut self, client: P) -> Self
        where
            P: Fn(&A, Option<&C>, Option<&R>) -> ::cacheable_client::DynamicClient + Send + Sync + 'static,
        {
            self.common.fallback_client = Some($crate::Setting::from_fn(client));
            self
        }

        /// Turns this call site into a plain pass-through.
        #[must_use]
        pub fn noop(mut self, noop: bool) -> Self {
            self.common.noop = Some($crate::Setting::value(noop));
            self
        }

        /// Decides per call whether to bypass caching. The builder always receives the receiver.
        #[must_use]
        pub fn noop_with<P>(mut self, noop: P) -> Self
        where
            P: Fn(&A, Option<&C>, Option<&R>) -> bool + Send + Sync + 'static,
        {
            self.common.noop = Some($crate::Setting::from_fn(noop));
            self
        }
    };
}

pub(crate) use common_options;
