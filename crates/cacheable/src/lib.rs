// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Method-level memoization over a pluggable store.
//!
//! Wrap an async method in one of three decorators and its calls go through a
//! cache:
//! - [`Cacheable`] serves results from the store and runs the method only on a miss
//! - [`CacheClear`] removes entries after the method succeeds
//! - [`CacheUpdate`] writes the method's fresh result after every successful call
//!
//! The store is any [`CacheClient`]. Clients, default options and default
//! strategies live in a [`CacheManager`], usually the process-wide
//! [`CacheManager::global`]. Each call site can override every setting, and
//! most settings can be computed per call from the arguments, the receiver and,
//! for updates, the method's result (see [`Setting`]).
//!
//! Keys are derived per call: an explicit key wins, otherwise a stable digest of
//! the method name, the arguments and (unless the manager excludes it) the
//! receiver is used. A hash key groups entries under a `<hash>:` prefix.
//!
//! The store is an optimization, never a point of failure: the built-in
//! strategies absorb store errors, retry on an optional fallback client and, in
//! debug mode, log what they absorbed through `tracing`.
//!
//! # Examples
//!
//! ```
//! use cacheable::{CacheClear, CacheManager, Cacheable};
//! use cacheable_client::testing::MockClient;
//! use serde::{Deserialize, Serialize};
//! # futures::executor::block_on(async {
//!
//! #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
//! struct User {
//!     id: u32,
//!     name: String,
//! }
//!
//! let client = MockClient::new();
//! let manager = CacheManager::new();
//! manager.set_client(client.clone());
//!
//! let get_user = Cacheable::builder("get_user", |_: (), id: u32| async move {
//!     Ok::<_, std::io::Error>(User { id, name: "Ann".to_string() })
//! })
//! .hash_key("users")
//! .cache_key_with(|id, _, _| id.to_string())
//! .build(&manager);
//!
//! let forget_users = CacheClear::builder("forget_users", |_: (), (): ()| async { Ok::<_, std::io::Error>(()) })
//!     .hash_key("users")
//!     .build(&manager);
//!
//! let user = get_user.call((), 1).await?;
//! assert!(client.contains_key("users:1"));
//! assert_eq!(get_user.call((), 1).await?, user);
//!
//! forget_users.call((), ()).await?;
//! assert!(!client.contains_key("users:1"));
//! # Ok::<(), cacheable::Error>(())
//! # });
//! ```
//!
//! # Concurrency
//!
//! While a [`Cacheable`] call is looking up or computing a key, identical calls
//! through the same strategy instance wait for it instead of hitting the store
//! or the method again. By default each decorated method owns its strategy.

mod decorate;
mod error;
mod inflight;
pub mod keys;
mod manager;
mod setting;
pub mod strategy;
mod telemetry;
mod timeout;

#[doc(inline)]
pub use cacheable_client::{CacheClient, DynamicClient, DynamicClientExt, Value};
#[doc(inline)]
pub use decorate::{
    cache_clear::{CacheClear, CacheClearBuilder},
    cache_update::{CacheUpdate, CacheUpdateBuilder},
    cacheable::{Cacheable, CacheableBuilder},
};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use keys::{CacheKey, KeyShape};
#[doc(inline)]
pub use manager::{CacheManager, ManagerOptions, MissingClientPolicy};
#[doc(inline)]
pub use setting::Setting;
#[doc(inline)]
pub use strategy::{
    ClearContext, ClearStrategy, DefaultClearStrategy, DefaultReadStrategy, DefaultUpdateStrategy, MethodFuture, NoOpClearStrategy,
    NoOpReadStrategy, NoOpUpdateStrategy, ReadContext, ReadStrategy, ReadValue, SharedClearStrategy, SharedReadStrategy, SharedUpdateStrategy,
    UpdateContext, UpdateStrategy,
};
#[doc(inline)]
pub use timeout::with_timeout;

/// Test doubles for exercising decorated methods without a real store.
#[cfg(feature = "test-util")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing {
    #[doc(inline)]
    pub use cacheable_client::testing::{ClientOp, MockClient};
}
