// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Process-wide configuration for decorated methods.

use std::{sync::Arc, time::Duration};

use cacheable_client::{CacheClient, DynamicClient};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::strategy::{ClearStrategy, ReadStrategy, SharedClearStrategy, SharedReadStrategy, SharedUpdateStrategy, UpdateStrategy};

static GLOBAL: Lazy<CacheManager> = Lazy::new(CacheManager::new);

/// What a decorated call does when no client is configured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingClientPolicy {
    /// Call the method without caching. Logged as a warning in debug mode.
    #[default]
    PassThrough,
    /// Fail the call with [`Error::MissingClient`](crate::Error::MissingClient).
    Error,
}

/// Options that apply to every method decorated against a manager.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use cacheable::ManagerOptions;
///
/// let options = ManagerOptions::default()
///     .ttl(Duration::from_secs(60))
///     .debug(true);
///
/// assert!(options.excludes_context());
/// assert_eq!(options.default_ttl(), Some(Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug)]
pub struct ManagerOptions {
    disabled: bool,
    exclude_context: bool,
    ttl: Option<Duration>,
    debug: bool,
    missing_client: MissingClientPolicy,
    strategy: Option<SharedReadStrategy>,
    clear_strategy: Option<SharedClearStrategy>,
    update_strategy: Option<SharedUpdateStrategy>,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            exclude_context: true,
            ttl: None,
            debug: false,
            missing_client: MissingClientPolicy::default(),
            strategy: None,
            clear_strategy: None,
            update_strategy: None,
        }
    }
}

impl ManagerOptions {
    /// Turns every decorated method into a plain pass-through.
    #[must_use]
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Controls whether the receiver feeds key derivation and builders. Defaults to `true`.
    #[must_use]
    pub fn exclude_context(mut self, exclude: bool) -> Self {
        self.exclude_context = exclude;
        self
    }

    /// Sets the default time-to-live for stored entries.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Enables warning logs for absorbed client failures and missing clients.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the behavior when no client is configured.
    #[must_use]
    pub fn missing_client(mut self, policy: MissingClientPolicy) -> Self {
        self.missing_client = policy;
        self
    }

    /// Sets the read strategy shared by every `Cacheable` without its own.
    ///
    /// A shared strategy instance also shares its in-flight bookkeeping, so
    /// concurrent identical calls are collapsed across every method using it.
    #[must_use]
    pub fn strategy(mut self, strategy: impl ReadStrategy + 'static) -> Self {
        self.strategy = Some(SharedReadStrategy::new(strategy));
        self
    }

    /// Sets the clear strategy shared by every `CacheClear` and `CacheUpdate` without their own.
    #[must_use]
    pub fn clear_strategy(mut self, strategy: impl ClearStrategy + 'static) -> Self {
        self.clear_strategy = Some(SharedClearStrategy::new(strategy));
        self
    }

    /// Sets the update strategy shared by every `CacheUpdate` without its own.
    #[must_use]
    pub fn update_strategy(mut self, strategy: impl UpdateStrategy + 'static) -> Self {
        self.update_strategy = Some(SharedUpdateStrategy::new(strategy));
        self
    }

    /// Returns `true` if caching is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns `true` if the receiver is excluded from key derivation.
    #[must_use]
    pub fn excludes_context(&self) -> bool {
        self.exclude_context
    }

    /// Returns the default time-to-live.
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns `true` if debug logging is enabled.
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Returns the missing-client policy.
    #[must_use]
    pub fn missing_client_policy(&self) -> MissingClientPolicy {
        self.missing_client
    }

    pub(crate) fn read_strategy(&self) -> Option<&SharedReadStrategy> {
        self.strategy.as_ref()
    }

    pub(crate) fn shared_clear_strategy(&self) -> Option<&SharedClearStrategy> {
        self.clear_strategy.as_ref()
    }

    pub(crate) fn shared_update_strategy(&self) -> Option<&SharedUpdateStrategy> {
        self.update_strategy.as_ref()
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct ManagerState {
    pub(crate) client: Option<DynamicClient>,
    pub(crate) fallback_client: Option<DynamicClient>,
    pub(crate) options: ManagerOptions,
}

/// Holds the client, the fallback client and the options used by decorated methods.
///
/// Decorated methods read the manager on every call, so reconfiguring it takes
/// effect immediately, including for wrappers built earlier. Most programs use
/// the process-wide instance from [`CacheManager::global`]; independent
/// managers are handy in tests.
///
/// Cloning is cheap and clones share the same configuration.
///
/// # Examples
///
/// ```
/// use cacheable::{CacheManager, ManagerOptions};
///
/// let manager = CacheManager::new();
/// manager.set_options(ManagerOptions::default().debug(true));
/// manager.disable();
///
/// assert!(manager.options().is_disabled());
/// assert!(manager.options().is_debug());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CacheManager {
    state: Arc<RwLock<ManagerState>>,
}

impl CacheManager {
    /// Creates an independent manager with default options and no client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide manager, creating it on first use.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Sets the primary client.
    ///
    /// When no default TTL has been set yet, it is seeded from the client's own default.
    pub fn set_client(&self, client: impl CacheClient + 'static) {
        let client = DynamicClient::new(client);
        let mut state = self.state.write();
        if state.options.ttl.is_none() {
            state.options.ttl = client.client_ttl();
        }
        state.client = Some(client);
    }

    /// Sets the client used when the primary one fails.
    pub fn set_fallback_client(&self, client: impl CacheClient + 'static) {
        self.state.write().fallback_client = Some(DynamicClient::new(client));
    }

    /// Replaces the options wholesale.
    pub fn set_options(&self, options: ManagerOptions) {
        self.state.write().options = options;
    }

    /// Turns every decorated method into a pass-through.
    pub fn disable(&self) {
        self.state.write().options.disabled = true;
    }

    /// Re-enables caching after [`disable`](Self::disable).
    pub fn enable(&self) {
        self.state.write().options.disabled = false;
    }

    /// Returns the primary client, if any.
    #[must_use]
    pub fn client(&self) -> Option<DynamicClient> {
        self.state.read().client.clone()
    }

    /// Returns the fallback client, if any.
    #[must_use]
    pub fn fallback_client(&self) -> Option<DynamicClient> {
        self.state.read().fallback_client.clone()
    }

    /// Returns a copy of the current options.
    #[must_use]
    pub fn options(&self) -> ManagerOptions {
        self.state.read().options.clone()
    }

    pub(crate) fn snapshot(&self) -> ManagerState {
        self.state.read().clone()
    }
}
