// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc, time::Duration};

use cacheable_client::DynamicClient;
use serde::Serialize;

use super::{CommonOptions, MethodFn, Plan, common_options, erase_method, scope};
use crate::{
    CacheKey, CacheManager, Result, Setting,
    keys::{KeyShape, extract_key, get_final_key},
    manager::ManagerState,
    strategy::{
        ClearContext, ClearStrategy, DefaultClearStrategy, DefaultUpdateStrategy, SharedClearStrategy, SharedUpdateStrategy,
        UpdateContext, UpdateStrategy,
    },
    telemetry::{self, Activity},
};

/// A method whose fresh result is written to the cache after every successful call.
///
/// The method always runs first. Its result feeds key derivation, so keys may
/// depend on what the method produced. Optionally, other keys are cleared at
/// the same time, either after the write or concurrently with it.
///
/// # Examples
///
/// ```
/// use cacheable::{CacheManager, CacheUpdate};
/// use cacheable_client::testing::MockClient;
/// use serde_json::json;
/// # futures::executor::block_on(async {
///
/// let client = MockClient::new();
/// client.seed("users:all", json!(["Ann"]));
///
/// let manager = CacheManager::new();
/// manager.set_client(client.clone());
///
/// let rename = CacheUpdate::builder("rename", |_: (), (id, name): (u32, String)| async move {
///     Ok::<_, std::io::Error>(format!("{id}:{name}"))
/// })
/// .cache_key_with(|(id, _), _, _| format!("user:{id}"))
/// .cache_keys_to_clear("users:all")
/// .build(&manager);
///
/// rename.call((), (1, "Bea".to_string())).await.unwrap();
/// assert_eq!(client.peek("user:1"), Some(json!("1:Bea")));
/// assert!(!client.contains_key("users:all"));
/// # });
/// ```
pub struct CacheUpdate<C, A, R> {
    name: Arc<str>,
    method: MethodFn<C, A, R>,
    manager: CacheManager,
    common: CommonOptions<A, C, R>,
    cache_key: Option<Setting<String, A, C, R>>,
    cache_keys_to_clear: Option<Setting<CacheKey, A, C, R>>,
    ttl: Option<Setting<Duration, A, C, R>>,
    strategy: Option<Setting<SharedUpdateStrategy, A, C, R>>,
    clear_strategy: Option<Setting<SharedClearStrategy, A, C, R>>,
    clear_and_update_in_parallel: bool,
    default_strategy: SharedUpdateStrategy,
    default_clear_strategy: SharedClearStrategy,
}

/// Configures a [`CacheUpdate`].
pub struct CacheUpdateBuilder<C, A, R> {
    name: Arc<str>,
    method: MethodFn<C, A, R>,
    common: CommonOptions<A, C, R>,
    cache_key: Option<Setting<String, A, C, R>>,
    cache_keys_to_clear: Option<Setting<CacheKey, A, C, R>>,
    ttl: Option<Setting<Duration, A, C, R>>,
    strategy: Option<Setting<SharedUpdateStrategy, A, C, R>>,
    clear_strategy: Option<Setting<SharedClearStrategy, A, C, R>>,
    clear_and_update_in_parallel: bool,
}

impl<C, A, R> CacheUpdate<C, A, R> {
    /// Starts configuring a write-through method.
    pub fn builder<E, F, Fut>(name: impl Into<Arc<str>>, method: F) -> CacheUpdateBuilder<C, A, R>
    where
        C: 'static,
        A: 'static,
        R: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
        F: Fn(C, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        CacheUpdateBuilder {
            name: name.into(),
            method: erase_method(method),
            common: CommonOptions::default(),
            cache_key: None,
            cache_keys_to_clear: None,
            ttl: None,
            strategy: None,
            clear_strategy: None,
            clear_and_update_in_parallel: false,
        }
    }

    /// The method's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<C, A, R> CacheUpdateBuilder<C, A, R> {
    common_options!();

    /// Writes under a fixed key.
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(Setting::value(key.into()));
        self
    }

    /// Computes the key from each call. The builder receives the method's result.
    #[must_use]
    pub fn cache_key_with<K>(mut self, key: K) -> Self
    where
        K: Fn(&A, Option<&C>, Option<&R>) -> String + Send + Sync + 'static,
    {
        self.cache_key = Some(Setting::from_fn(key));
        self
    }

    /// Also clears these keys on every successful call. Nothing is cleared unless this is set.
    #[must_use]
    pub fn cache_keys_to_clear(mut self, keys: impl Into<CacheKey>) -> Self {
        self.cache_keys_to_clear = Some(Setting::value(keys.into()));
        self
    }

    /// Computes the keys to clear from each call.
    #[must_use]
    pub fn cache_keys_to_clear_with<K, F>(mut self, keys: F) -> Self
    where
        K: Into<CacheKey>,
        F: Fn(&A, Option<&C>, Option<&R>) -> K + Send + Sync + 'static,
    {
        self.cache_keys_to_clear = Some(Setting::from_fn(move |args, context, result| keys(args, context, result).into()));
        self
    }

    /// Sets the time-to-live for the written entry.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(Setting::value(ttl));
        self
    }

    /// Computes the time-to-live from each call. The builder receives the method's result.
    #[must_use]
    pub fn ttl_with<T>(mut self, ttl: T) -> Self
    where
        T: Fn(&A, Option<&C>, Option<&R>) -> Duration + Send + Sync + 'static,
    {
        self.ttl = Some(Setting::from_fn(ttl));
        self
    }

    /// Uses this update strategy instead of the manager's or the default one.
    #[must_use]
    pub fn strategy(mut self, strategy: impl UpdateStrategy + 'static) -> Self {
        self.strategy = Some(Setting::value(SharedUpdateStrategy::new(strategy)));
        self
    }

    /// Picks the update strategy for each call.
    #[must_use]
    pub fn strategy_with<S>(mut self, strategy: S) -> Self
    where
        S: Fn(&A, Option<&C>, Option<&R>) -> SharedUpdateStrategy + Send + Sync + 'static,
    {
        self.strategy = Some(Setting::from_fn(strategy));
        self
    }

    /// Uses this clear strategy for [`cache_keys_to_clear`](Self::cache_keys_to_clear).
    #[must_use]
    pub fn clear_strategy(mut self, strategy: impl ClearStrategy + 'static) -> Self {
        self.clear_strategy = Some(Setting::value(SharedClearStrategy::new(strategy)));
        self
    }

    /// Picks the clear strategy for each call.
    #[must_use]
    pub fn clear_strategy_with<S>(mut self, strategy: S) -> Self
    where
        S: Fn(&A, Option<&C>, Option<&R>) -> SharedClearStrategy + Send + Sync + 'static,
    {
        self.clear_strategy = Some(Setting::from_fn(strategy));
        self
    }

    /// Runs the write and the clear concurrently instead of one after the other.
    #[must_use]
    pub fn clear_and_update_in_parallel(mut self, parallel: bool) -> Self {
        self.clear_and_update_in_parallel = parallel;
        self
    }

    /// Finishes configuration.
    #[must_use]
    pub fn build(self, manager: &CacheManager) -> CacheUpdate<C, A, R> {
        CacheUpdate {
            name: self.name,
            method: self.method,
            manager: manager.clone(),
            common: self.common,
            cache_key: self.cache_key,
            cache_keys_to_clear: self.cache_keys_to_clear,
            ttl: self.ttl,
            strategy: self.strategy,
            clear_strategy: self.clear_strategy,
            clear_and_update_in_parallel: self.clear_and_update_in_parallel,
            default_strategy: SharedUpdateStrategy::new(DefaultUpdateStrategy::new()),
            default_clear_strategy: SharedClearStrategy::new(DefaultClearStrategy::new()),
        }
    }
}

impl<C, A, R> CacheUpdate<C, A, R>
where
    C: Serialize + Clone + Send + Sync + 'static,
    A: Serialize + Clone + Send + Sync + 'static,
    R: Serialize + Send + 'static,
{
    /// Calls the method and writes its result to the cache.
    ///
    /// The method's result is returned as is, whether or not it could be stored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Method`](crate::Error::Method) if the method failed, in
    /// which case the cache is left untouched. Store failures are absorbed by
    /// the built-in strategies;
    /// a failing custom update strategy surfaces its error, a failing custom
    /// clear strategy is logged and ignored.
    pub async fn call(&self, context: C, args: A) -> Result<R> {
        let state = self.manager.snapshot();
        let (client, fallback_client) = match self.common.plan(&self.name, &state, &args, &context) {
            Plan::PassThrough => return (self.method)(context, args).await,
            Plan::Fail(error) => return Err(error),
            Plan::Cache { client, fallback_client } => (client, fallback_client),
        };

        let result = (self.method)(context.clone(), args.clone()).await?;

        let options = &state.options;
        let debug = options.is_debug();
        let scope = scope(&state, &context);

        let value = match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(error) => {
                telemetry::report(debug, &self.name, Activity::EncodeFailed, None, Some(&error));
                return Ok(result);
            }
        };
        let key: String = match get_final_key(
            self.cache_key.as_ref(),
            self.common.hash_key.as_ref(),
            &self.name,
            &args,
            scope,
            Some(&result),
        ) {
            Ok(key) => key,
            Err(error) => {
                telemetry::report(debug, &self.name, Activity::KeyUnavailable, None, Some(&error));
                return Ok(result);
            }
        };

        let ttl = self
            .ttl
            .as_ref()
            .map(|ttl| ttl.resolve(&args, scope, Some(&result)))
            .or_else(|| options.default_ttl());
        let strategy = self
            .strategy
            .as_ref()
            .map(|strategy| strategy.resolve(&args, scope, Some(&result)))
            .or_else(|| options.shared_update_strategy().cloned())
            .unwrap_or_else(|| self.default_strategy.clone());
        let clear = self.clear_job(&state, &client, fallback_client.as_ref(), &args, scope, &result);

        let update = UpdateContext::new(Arc::clone(&self.name), key, client, value)
            .with_fallback_client(fallback_client)
            .with_ttl(ttl)
            .with_debug(debug);

        match clear {
            None => {
                strategy.handle(&update).await?;
            }
            Some((clear_strategy, clear)) if self.clear_and_update_in_parallel => {
                let (updated, cleared) = futures::join!(strategy.handle(&update), clear_strategy.handle(&clear));
                self.report_clear(debug, cleared);
                updated?;
            }
            Some((clear_strategy, clear)) => {
                strategy.handle(&update).await?;
                self.report_clear(debug, clear_strategy.handle(&clear).await);
            }
        }

        Ok(result)
    }

    fn clear_job(
        &self,
        state: &ManagerState,
        client: &DynamicClient,
        fallback_client: Option<&DynamicClient>,
        args: &A,
        scope: Option<&C>,
        result: &R,
    ) -> Option<(SharedClearStrategy, ClearContext)> {
        let keys = extract_key(self.cache_keys_to_clear.as_ref(), args, scope, None).filter(|keys| !keys.is_blank())?;
        let keys = match extract_key(self.common.hash_key.as_ref(), args, scope, None) {
            Some(hash) if !hash.is_empty() => keys.prefixed(&hash),
            _ => keys,
        };

        let strategy = self
            .clear_strategy
            .as_ref()
            .map(|strategy| strategy.resolve(args, scope, Some(result)))
            .or_else(|| state.options.shared_clear_strategy().cloned())
            .unwrap_or_else(|| self.default_clear_strategy.clone());

        let context = ClearContext::new(Arc::clone(&self.name), keys, client.clone())
            .with_fallback_client(fallback_client.cloned())
            .with_debug(state.options.is_debug());
        Some((strategy, context))
    }

    fn report_clear(&self, debug: bool, cleared: Result<()>) {
        if let Err(error) = cleared {
            telemetry::report(debug, &self.name, Activity::ClearFailed, None, Some(&error));
        }
    }
}

impl<C, A, R> Debug for CacheUpdate<C, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheUpdate")
            .field("name", &self.name)
            .field("clear_and_update_in_parallel", &self.clear_and_update_in_parallel)
            .finish_non_exhaustive()
    }
}

impl<C, A, R> Debug for CacheUpdateBuilder<C, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheUpdateBuilder").field("name", &self.name).finish_non_exhaustive()
    }
}
