// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde_json::Value;

use super::{Target, UpdateContext, UpdateStrategy, write_through};
use crate::Error;

/// The write strategy used by `CacheUpdate` unless configured otherwise.
///
/// Stores the result in the primary client, or in the fallback client if that
/// write fails, and hands the result back unchanged. Failures are absorbed.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultUpdateStrategy;

impl DefaultUpdateStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl UpdateStrategy for DefaultUpdateStrategy {
    async fn handle(&self, context: &UpdateContext) -> Result<Value, Error> {
        let target = Target {
            method_name: context.method_name(),
            client: context.client(),
            fallback_client: context.fallback_client(),
            key: context.key(),
            ttl: context.ttl(),
            debug: context.debug(),
        };
        write_through(target, context.result()).await;
        Ok(context.result().clone())
    }
}
