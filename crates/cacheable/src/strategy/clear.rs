// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashSet;

use cacheable_client::{CacheClient, DynamicClient};
use futures::future::try_join_all;

use super::{ClearContext, ClearStrategy};
use crate::{
    Error,
    telemetry::{self, Activity},
};

/// The invalidation strategy used by `CacheClear` and `CacheUpdate` unless configured otherwise.
///
/// Namespaces listed in [`ClearContext::hashes_to_clear`] are dropped through
/// the client's namespace delete. Otherwise, pattern keys are first expanded
/// through the client's key listing and the union of matches is deleted;
/// literal keys are deleted directly.
///
/// If the primary client fails, the same operation is attempted on the
/// fallback client. Failures are absorbed.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultClearStrategy;

impl DefaultClearStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

async fn clear_with(client: &DynamicClient, context: &ClearContext) -> Result<(), cacheable_client::Error> {
    if let Some(hashes) = context.hashes_to_clear() {
        return client.del_hash(hashes.as_slice()).await;
    }

    let keys = context.key().as_slice();
    if !context.is_pattern() {
        return client.del(keys).await;
    }

    let expanded = try_join_all(keys.iter().map(|pattern| client.keys(pattern))).await?;
    let mut seen = HashSet::new();
    let matched: Vec<String> = expanded.into_iter().flatten().filter(|key| seen.insert(key.clone())).collect();
    if matched.is_empty() {
        return Ok(());
    }
    client.del(&matched).await
}

impl ClearStrategy for DefaultClearStrategy {
    async fn handle(&self, context: &ClearContext) -> Result<(), Error> {
        let Err(error) = clear_with(context.client(), context).await else {
            return Ok(());
        };

        if let Some(fallback) = context.fallback_client() {
            if let Err(fallback_error) = clear_with(fallback, context).await {
                telemetry::report(
                    context.debug(),
                    context.method_name(),
                    Activity::FallbackClearFailed,
                    None,
                    Some(&fallback_error),
                );
            }
        }

        telemetry::report(context.debug(), context.method_name(), Activity::ClearFailed, None, Some(&error));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cacheable_client::{
        DynamicClientExt,
        testing::{ClientOp, MockClient},
    };
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;
    use crate::CacheKey;

    type TestResult = Result<(), Error>;

    fn seeded() -> MockClient {
        let client = MockClient::new();
        for key in ["user:1", "user:2", "team:1", "users:list"] {
            client.seed(key, json!(key));
        }
        client
    }

    #[test]
    fn deletes_literal_keys() -> TestResult {
        block_on(async {
            let client = seeded();
            let context = ClearContext::new("save", vec!["user:1", "team:1"], client.clone().into_dynamic());

            DefaultClearStrategy::new().handle(&context).await?;

            assert_eq!(client.operations(), vec![ClientOp::Del(vec!["user:1".to_string(), "team:1".to_string()])]);
            assert!(!client.contains_key("user:1"));
            assert!(!client.contains_key("team:1"));
            assert!(client.contains_key("user:2"));
            Ok(())
        })
    }

    #[test]
    fn expands_patterns_before_deleting() -> TestResult {
        block_on(async {
            let client = seeded();
            let context = ClearContext::new("save", vec!["^user:", "^user:1$"], client.clone().into_dynamic()).with_pattern(true);

            DefaultClearStrategy::new().handle(&context).await?;

            assert_eq!(client.count(|op| matches!(op, ClientOp::Keys(_))), 2);
            assert!(client.operations().contains(&ClientOp::Del(vec!["user:1".to_string(), "user:2".to_string()])));
            assert!(client.contains_key("users:list"));
            assert!(client.contains_key("team:1"));
            Ok(())
        })
    }

    #[test]
    fn empty_expansion_skips_delete() -> TestResult {
        block_on(async {
            let client = seeded();
            let context = ClearContext::new("save", "^nothing", client.clone().into_dynamic()).with_pattern(true);

            DefaultClearStrategy::new().handle(&context).await?;

            assert_eq!(client.del_count(), 0);
            assert_eq!(client.entry_count(), 4);
            Ok(())
        })
    }

    #[test]
    fn hashes_take_precedence_over_keys() -> TestResult {
        block_on(async {
            let client = seeded();
            let context = ClearContext::new("save", "team:1", client.clone().into_dynamic()).with_hashes_to_clear(Some(CacheKey::from("user")));

            DefaultClearStrategy::new().handle(&context).await?;

            assert_eq!(client.operations(), vec![ClientOp::DelHash(vec!["user".to_string()])]);
            assert!(client.contains_key("team:1"));
            assert!(client.contains_key("users:list"));
            assert!(!client.contains_key("user:2"));
            Ok(())
        })
    }

    #[test]
    fn primary_failure_retries_on_fallback() -> TestResult {
        block_on(async {
            let primary = seeded();
            primary.fail_always();
            let fallback = seeded();
            let context = ClearContext::new("save", "user:1", primary.clone().into_dynamic())
                .with_fallback_client(Some(fallback.clone().into_dynamic()));

            DefaultClearStrategy::new().handle(&context).await?;

            assert!(primary.contains_key("user:1"));
            assert!(!fallback.contains_key("user:1"));
            Ok(())
        })
    }

    #[test]
    fn failures_are_absorbed() -> TestResult {
        block_on(async {
            let primary = seeded();
            primary.fail_always();
            let fallback = seeded();
            fallback.fail_always();
            let context = ClearContext::new("save", "^user", primary.into_dynamic())
                .with_pattern(true)
                .with_fallback_client(Some(fallback.into_dynamic()));

            DefaultClearStrategy::new().handle(&context).await
        })
    }
}
