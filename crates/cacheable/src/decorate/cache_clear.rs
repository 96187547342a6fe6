// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc};

use cacheable_client::DynamicClient;
use serde::Serialize;

use super::{CommonOptions, MethodFn, Plan, common_options, erase_method, scope};
use crate::{
    CacheKey, CacheManager, Result, Setting,
    keys::{extract_key, get_final_key},
    manager::ManagerState,
    strategy::{ClearContext, ClearStrategy, DefaultClearStrategy, SharedClearStrategy},
    telemetry::{self, Activity},
};

/// A method that invalidates cache entries after it succeeds.
///
/// Keys are derived before the method runs. If the method fails, nothing is
/// cleared and the failure is returned. Otherwise the entries are cleared and
/// the method's result is returned; clearing failures are absorbed.
///
/// When a hash key is set and no cache key is, the whole namespace is cleared.
///
/// # Examples
///
/// ```
/// use cacheable::{CacheClear, CacheManager};
/// use cacheable_client::testing::MockClient;
/// use serde_json::json;
/// # futures::executor::block_on(async {
///
/// let client = MockClient::new();
/// client.seed("users:1", json!("Ann"));
/// client.seed("users:2", json!("Bob"));
///
/// let manager = CacheManager::new();
/// manager.set_client(client.clone());
///
/// let reset = CacheClear::builder("reset_users", |_: (), (): ()| async { Ok::<_, std::io::Error>(()) })
///     .hash_key("users")
///     .build(&manager);
///
/// reset.call((), ()).await.unwrap();
/// assert_eq!(client.entry_count(), 0);
/// # });
/// ```
pub struct CacheClear<C, A, R> {
    name: Arc<str>,
    method: MethodFn<C, A, R>,
    manager: CacheManager,
    common: CommonOptions<A, C, R>,
    cache_key: Option<Setting<CacheKey, A, C, R>>,
    is_pattern: bool,
    strategy: Option<Setting<SharedClearStrategy, A, C, R>>,
    default_strategy: SharedClearStrategy,
}

/// Configures a [`CacheClear`].
pub struct CacheClearBuilder<C, A, R> {
    name: Arc<str>,
    method: MethodFn<C, A, R>,
    common: CommonOptions<A, C, R>,
    cache_key: Option<Setting<CacheKey, A, C, R>>,
    is_pattern: bool,
    strategy: Option<Setting<SharedClearStrategy, A, C, R>>,
}

impl<C, A, R> CacheClear<C, A, R> {
    /// Starts configuring an invalidating method.
    pub fn builder<E, F, Fut>(name: impl Into<Arc<str>>, method: F) -> CacheClearBuilder<C, A, R>
    where
        C: 'static,
        A: 'static,
        R: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        F: Fn(C, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        CacheClearBuilder {
            name: name.into(),
            method: erase_method(method),
            common: CommonOptions::default(),
            cache_key: None,
            is_pattern: false,
            strategy: None,
        }
    }

    /// The method's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C, A, R> CacheClearBuilder<C, A, R> {
    common_options!();

    /// Clears a fixed key or set of keys.
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.cache_key = Some(Setting::value(key.into()));
        self
    }

    /// Computes the keys to clear from each call.
    #[must_use]
    pub fn cache_key_with<K, F>(mut self, key: F) -> Self
    where
        K: Into<CacheKey>,
        F: Fn(&A, Option<&C>, Option<&R>) -> K + Send + Sync + 'static,
    {
        self.cache_key = Some(Setting::from_fn(move |args, context, result| key(args, context, result).into()));
        self
    }

    /// Treats the keys as patterns, expanded through the client before deleting.
    #[must_use]
    pub fn is_pattern(mut self, is_pattern: bool) -> Self {
        self.is_pattern = is_pattern;
        self
    }

    /// Uses this strategy instead of the manager's or the default one.
    #[must_use]
    pub fn strategy(mut self, strategy: impl ClearStrategy + 'static) -> Self {
        self.strategy = Some(Setting::value(SharedClearStrategy::new(strategy)));
        self
    }

    /// Picks the strategy for each call.
    #[must_use]
    pub fn strategy_with<S>(mut self, strategy: S) -> Self
    where
        S: Fn(&A, Option<&C>, Option<&R>) -> SharedClearStrategy + Send + Sync + 'static,
    {
        self.strategy = Some(Setting::from_fn(strategy));
        self
    }

    /// Finishes configuration.
    #[must_use]
    pub fn build(self, manager: &CacheManager) -> CacheClear<C, A, R> {
        CacheClear {
            name: self.name,
            method: self.method,
            manager: manager.clone(),
            common: self.common,
            cache_key: self.cache_key,
            is_pattern: self.is_pattern,
            strategy: self.strategy,
            default_strategy: SharedClearStrategy::new(DefaultClearStrategy::new()),
        }
    }
}

impl<C, A, R> CacheClear<C, A, R>
where
    C: Serialize + Send + Sync + 'static,
    A: Serialize + Send + Sync + 'static,
    R: Send + 'static,
{
    /// Calls the method, then clears the configured entries if it succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Method`](crate::Error::Method) if the method failed, in
    /// which case nothing is cleared, and
    /// [`Error::MissingClient`](crate::Error::MissingClient) under the strict
    /// missing-client policy.
    pub async fn call(&self, context: C, args: A) -> Result<R> {
        let state = self.manager.snapshot();
        let (client, fallback_client) = match self.common.plan(&self.name, &state, &args, &context) {
            Plan::PassThrough => return (self.method)(context, args).await,
            Plan::Fail(error) => return Err(error),
            Plan::Cache { client, fallback_client } => (client, fallback_client),
        };
        let debug = state.options.is_debug();
        let scope = scope(&state, &context);

        let clear = self.clear_context(&state, client, fallback_client, &args, scope);
        let strategy = self
            .strategy
            .as_ref()
            .map(|strategy| strategy.resolve(&args, scope, None))
            .or_else(|| state.options.shared_clear_strategy().cloned())
            .unwrap_or_else(|| self.default_strategy.clone());

        let result = (self.method)(context, args).await?;

        if let Some(clear) = clear {
            if let Err(error) = strategy.handle(&clear).await {
                telemetry::report(debug, &self.name, Activity::ClearFailed, None, Some(&error));
            }
        }
        Ok(result)
    }

    fn clear_context(
        &self,
        state: &ManagerState,
        client: DynamicClient,
        fallback_client: Option<DynamicClient>,
        args: &A,
        scope: Option<&C>,
    ) -> Option<ClearContext> {
        let debug = state.options.is_debug();
        let key: CacheKey = match get_final_key(self.cache_key.as_ref(), self.common.hash_key.as_ref(), &self.name, args, scope, None) {
            Ok(key) => key,
            Err(error) => {
                telemetry::report(debug, &self.name, Activity::KeyUnavailable, None, Some(&error));
                return None;
            }
        };

        let hashes_to_clear = if self.cache_key.is_none() {
            extract_key(self.common.hash_key.as_ref(), args, scope, None)
                .filter(|hash| !hash.is_empty())
                .map(CacheKey::Single)
        } else {
            None
        };

        Some(
            ClearContext::new(Arc::clone(&self.name), key, client)
                .with_fallback_client(fallback_client)
                .with_pattern(self.is_pattern)
                .with_hashes_to_clear(hashes_to_clear)
                .with_debug(debug),
        )
    }
}

impl<C, A, R> Debug for CacheClear<C, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClear")
            .field("name", &self.name)
            .field("is_pattern", &self.is_pattern)
            .finish_non_exhaustive()
    }
}

impl<C, A, R> Debug for CacheClearBuilder<C, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClearBuilder").field("name", &self.name).finish_non_exhaustive()
    }
}
