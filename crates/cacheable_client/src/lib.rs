// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! The store capability consumed by the `cacheable` memoization core.
//!
//! This crate defines the [`CacheClient`] trait that every backing store adapter
//! must satisfy, the [`Error`] type a store reports failures with, and
//! [`DynamicClient`], a clonable type-erased handle that lets heterogeneous
//! stores be configured side by side (primary and fallback).
//!
//! # Overview
//!
//! The client is a black box to the core: it stores JSON [`Value`]s under string
//! keys, can enumerate keys matching a pattern, and can drop every key below a
//! namespace ("hash") prefix. Eviction, durability and wire encoding are the
//! client's business.
//!
//! # Implementing a Client
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//! use std::time::Duration;
//!
//! use cacheable_client::{CacheClient, Error, Value};
//!
//! #[derive(Default)]
//! struct MapClient(RwLock<HashMap<String, Value>>);
//!
//! impl CacheClient for MapClient {
//!     async fn get(&self, key: &str) -> Result<Option<Value>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn set(&self, key: &str, value: Value, _ttl: Option<Duration>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.to_string(), value);
//!         Ok(())
//!     }
//!
//!     async fn del(&self, keys: &[String]) -> Result<(), Error> {
//!         let mut map = self.0.write().unwrap();
//!         keys.iter().for_each(|key| {
//!             map.remove(key);
//!         });
//!         Ok(())
//!     }
//!
//!     async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
//!         Ok(self.0.read().unwrap().keys().filter(|k| k.contains(pattern)).cloned().collect())
//!     }
//!
//!     async fn del_hash(&self, hashes: &[String]) -> Result<(), Error> {
//!         let mut map = self.0.write().unwrap();
//!         map.retain(|key, _| !hashes.iter().any(|hash| key.starts_with(&format!("{hash}:"))));
//!         Ok(())
//!     }
//! }
//! ```

mod client;
mod dynamic;
pub mod error;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[doc(inline)]
pub use client::CacheClient;
#[doc(inline)]
pub use dynamic::{DynamicClient, DynamicClientExt};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use serde_json::Value;
