// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc, time::Duration};

use futures::FutureExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use super::{CommonOptions, MethodFn, Plan, common_options, erase_method, scope};
use crate::{
    CacheManager, Result, Setting,
    keys::get_final_key,
    strategy::{DefaultReadStrategy, MethodFuture, ReadContext, ReadStrategy, ReadValue, SharedReadStrategy},
    telemetry::{self, Activity},
};

type CachePredicate<A, C, R> = Arc<dyn Fn(&R, &A, Option<&C>) -> bool + Send + Sync>;

/// A method whose results are served from the cache when possible.
///
/// On every call the key is derived from the arguments (and the receiver, when
/// the manager includes it), the store is consulted and the method runs only
/// on a miss. Concurrent identical calls through the same strategy instance
/// share one execution.
///
/// # Examples
///
/// ```
/// use cacheable::{CacheManager, Cacheable};
/// use cacheable_client::testing::MockClient;
/// # futures::executor::block_on(async {
///
/// let manager = CacheManager::new();
/// manager.set_client(MockClient::new());
///
/// let get_user = Cacheable::builder("get_user", |_: (), id: u32| async move {
///     Ok::<_, std::io::Error>(format!("user-{id}"))
/// })
/// .cache_key_with(|id, _, _| format!("user:{id}"))
/// .build(&manager);
///
/// assert_eq!(get_user.call((), 7).await.unwrap(), "user-7");
/// // Served from the store.
/// assert_eq!(get_user.call((), 7).await.unwrap(), "user-7");
/// # });
/// ```
pub struct Cacheable<C, A, R> {
    name: Arc<str>,
    method: MethodFn<C, A, R>,
    manager: CacheManager,
    common: CommonOptions<A, C, R>,
    cache_key: Option<Setting<String, A, C, R>>,
    ttl: Option<Setting<Duration, A, C, R>>,
    strategy: Option<Setting<SharedReadStrategy, A, C, R>>,
    is_cacheable: Option<CachePredicate<A, C, R>>,
    default_strategy: SharedReadStrategy,
}

/// Configures a [`Cacheable`].
pub struct CacheableBuilder<C, A, R> {
    name: Arc<str>,
    method: MethodFn<C, A, R>,
    common: CommonOptions<A, C, R>,
    cache_key: Option<Setting<String, A, C, R>>,
    ttl: Option<Setting<Duration, A, C, R>>,
    strategy: Option<Setting<SharedReadStrategy, A, C, R>>,
    is_cacheable: Option<CachePredicate<A, C, R>>,
}

impl<C, A, R> Cacheable<C, A, R> {
    /// Starts configuring a cached method.
    ///
    /// `method` receives the receiver and the arguments by value. Use a tuple
    /// for several arguments and `()` for methods without a receiver.
    pub fn builder<E, F, Fut>(name: impl Into<Arc<str>>, method: F) -> CacheableBuilder<C, A, R>
    where
        C: 'static,
        A: 'static,
        R: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        F: Fn(C, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        CacheableBuilder {
            name: name.into(),
            method: erase_method(method),
            common: CommonOptions::default(),
            cache_key: None,
            ttl: None,
            strategy: None,
            is_cacheable: None,
        }
    }

    /// The method's name, used in default keys and log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C, A, R> CacheableBuilder<C, A, R> {
    common_options!();

    /// Uses a fixed key.
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(Setting::value(key.into()));
        self
    }

    /// Computes the key from each call. An empty key falls back to the default digest.
    #[must_use]
    pub fn cache_key_with<K>(mut self, key: K) -> Self
    where
        K: Fn(&A, Option<&C>, Option<&R>) -> String + Send + Sync + 'static,
    {
        self.cache_key = Some(Setting::from_fn(key));
        self
    }

    /// Sets the time-to-live for stored results, overriding the manager's default.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(Setting::value(ttl));
        self
    }

    /// Computes the time-to-live from each call.
    #[must_use]
    pub fn ttl_with<T>(mut self, ttl: T) -> Self
    where
        T: Fn(&A, Option<&C>, Option<&R>) -> Duration + Send + Sync + 'static,
    {
        self.ttl = Some(Setting::from_fn(ttl));
        self
    }

    /// Uses this strategy instead of the manager's or the default one.
    #[must_use]
    pub fn strategy(mut self, strategy: impl ReadStrategy + 'static) -> Self {
        self.strategy = Some(Setting::value(SharedReadStrategy::new(strategy)));
        self
    }

    /// Picks the strategy for each call.
    #[must_use]
    pub fn strategy_with<S>(mut self, strategy: S) -> Self
    where
        S: Fn(&A, Option<&C>, Option<&R>) -> SharedReadStrategy + Send + Sync + 'static,
    {
        self.strategy = Some(Setting::from_fn(strategy));
        self
    }

    /// Decides which results may be served from and written to the store.
    ///
    /// Values that cannot be decoded as `R` are never served, whatever the predicate says.
    #[must_use]
    pub fn is_cacheable<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&R, &A, Option<&C>) -> bool + Send + Sync + 'static,
    {
        self.is_cacheable = Some(Arc::new(predicate));
        self
    }

    /// Finishes configuration.
    ///
    /// Without a strategy of its own or one on the manager, the method gets its
    /// own [`DefaultReadStrategy`], so concurrent identical calls are collapsed
    /// per decorated method.
    #[must_use]
    pub fn build(self, manager: &CacheManager) -> Cacheable<C, A, R> {
        Cacheable {
            name: self.name,
            method: self.method,
            manager: manager.clone(),
            common: self.common,
            cache_key: self.cache_key,
            ttl: self.ttl,
            strategy: self.strategy,
            is_cacheable: self.is_cacheable,
            default_strategy: SharedReadStrategy::new(DefaultReadStrategy::new()),
        }
    }
}

impl<C, A, R> Cacheable<C, A, R>
where
    C: Serialize + Clone + Send + Sync + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
    R: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Calls the method through the cache.
    ///
    /// When the method runs, its result is returned as is. A result that cannot
    /// be encoded for the store is returned uncached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Method`](crate::Error::Method) if the method ran and
    /// failed. Store failures are absorbed by the built-in strategies. Custom
    /// strategies, the
    /// [`MissingClientPolicy::Error`](crate::MissingClientPolicy::Error) policy
    /// and stored values that cannot be decoded produce the other variants.
    pub async fn call(&self, context: C, args: A) -> Result<R> {
        let state = self.manager.snapshot();
        let (client, fallback_client) = match self.common.plan(&self.name, &state, &args, &context) {
            Plan::PassThrough => return (self.method)(context, args).await,
            Plan::Fail(error) => return Err(error),
            Plan::Cache { client, fallback_client } => (client, fallback_client),
        };
        let options = &state.options;
        let scope = scope(&state, &context);

        let key = match get_final_key(self.cache_key.as_ref(), self.common.hash_key.as_ref(), &self.name, &args, scope, None) {
            Ok(key) => key,
            Err(error) => {
                telemetry::report(options.is_debug(), &self.name, Activity::KeyUnavailable, None, Some(&error));
                return (self.method)(context, args).await;
            }
        };

        let ttl = self
            .ttl
            .as_ref()
            .map(|ttl| ttl.resolve(&args, scope, None))
            .or_else(|| options.default_ttl());
        let strategy = self
            .strategy
            .as_ref()
            .map(|strategy| strategy.resolve(&args, scope, None))
            .or_else(|| options.read_strategy().cloned())
            .unwrap_or_else(|| self.default_strategy.clone());

        let read = ReadContext::new(Arc::clone(&self.name), key, client, self.invoker(&context, &args, options.is_debug()))
            .with_fallback_client(fallback_client)
            .with_ttl(ttl)
            .with_debug(options.is_debug())
            .with_is_cacheable(self.value_predicate(&args, scope));

        strategy.handle(&read).await?.into_result()
    }

    fn invoker(&self, context: &C, args: &A, debug: bool) -> impl Fn() -> MethodFuture + Send + Sync + use<C, A, R> {
        let name = Arc::clone(&self.name);
        let method = Arc::clone(&self.method);
        let context = context.clone();
        let args = args.clone();
        move || {
            let name = Arc::clone(&name);
            let future = method(context.clone(), args.clone());
            async move {
                let result = future.await?;
                let stored = match serde_json::to_value(&result) {
                    Ok(value) => Some(value),
                    Err(error) => {
                        telemetry::report(debug, &name, Activity::EncodeFailed, None, Some(&error));
                        None
                    }
                };
                Ok(ReadValue::fresh(result, stored))
            }
            .boxed()
        }
    }

    fn value_predicate(&self, args: &A, context: Option<&C>) -> impl Fn(&Value) -> bool + Send + Sync + use<C, A, R> {
        let predicate = self.is_cacheable.clone();
        let args = args.clone();
        let context = context.cloned();
        move |value: &Value| match R::deserialize(value) {
            Ok(result) => predicate
                .as_ref()
                .is_none_or(|predicate| predicate(&result, &args, context.as_ref())),
            Err(_) => false,
        }
    }
}

impl<C, A, R> Debug for Cacheable<C, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cacheable").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<C, A, R> Debug for CacheableBuilder<C, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheableBuilder").field("name", &self.name).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use cacheable_client::testing::MockClient;
    use futures::executor::block_on;

    use super::*;
    use crate::{ManagerOptions, telemetry::testing::LogCapture};

    #[test]
    fn unencodable_result_is_reported_in_debug() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let client = MockClient::new();
        let manager = CacheManager::new();
        manager.set_client(client.clone());
        manager.set_options(ManagerOptions::default().debug(true));
        let grid = Cacheable::builder("grid", |_: (), (): ()| async {
            Ok::<_, std::io::Error>(HashMap::from([((1_u8, 2_u8), 3_u8)]))
        })
        .cache_key("grid")
        .build(&manager);

        let result = block_on(grid.call((), ())).unwrap();

        assert_eq!(result[&(1, 2)], 3);
        assert_eq!(client.set_count(), 0);
        capture.assert_contains("encode_failed");
    }
}
