// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use cacheable_client::{CacheClient, DynamicClient};
use serde_json::Value;

use super::{ReadContext, ReadStrategy, ReadValue, Target, write_through};
use crate::{
    Error,
    inflight::InFlight,
    telemetry::{self, Activity},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Tier {
    Primary,
    Fallback,
}

type Lookup = Result<Option<Value>, cacheable_client::Error>;

/// The read-through strategy used by `Cacheable` unless configured otherwise.
///
/// 1. Look the key up in the primary client. A stored value that is not null
///    and passes the cacheability check is returned as is.
/// 2. If the primary lookup fails, look the key up in the fallback client.
/// 3. Otherwise run the method and, if the result is cacheable, store it in
///    the primary client, or in the fallback client if that write fails. The
///    fresh result is returned as the method produced it.
///
/// Concurrent calls for the same key share one lookup per client and one
/// method execution. The bookkeeping belongs to the strategy instance, so
/// calls are collapsed only among callers using the same instance.
///
/// Store failures never fail the call. Method failures always do, and are not stored.
#[derive(Debug)]
pub struct DefaultReadStrategy {
    lookups: InFlight<(Tier, String), Lookup>,
    calls: InFlight<String, Result<ReadValue, Error>>,
}

impl Default for DefaultReadStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultReadStrategy {
    /// Creates a strategy with empty in-flight bookkeeping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lookups: InFlight::new(),
            calls: InFlight::new(),
        }
    }

    /// Returns the number of lookups and method executions currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lookups.len() + self.calls.len()
    }

    async fn lookup(&self, tier: Tier, client: &DynamicClient, key: &str) -> Lookup {
        let client = client.clone();
        let owned_key = key.to_string();
        self.lookups
            .run((tier, key.to_string()), move || async move { client.get(&owned_key).await })
            .await
            .unwrap_or_else(|panicked| Err(cacheable_client::Error::caused_by(panicked)))
    }

    async fn call_and_store(&self, context: &ReadContext) -> Result<ReadValue, Error> {
        let invoker = context.invoker();
        let is_cacheable = context.predicate();
        let method_name = context.method_name().to_string();
        let client = context.client().clone();
        let fallback_client = context.fallback_client().cloned();
        let key = context.key().to_string();
        let ttl = context.ttl();
        let debug = context.debug();

        self.calls
            .run(key.clone(), move || async move {
                let fresh = invoker().await?;
                if let Some(value) = fresh.value().filter(|value| !value.is_null() && is_cacheable(*value)) {
                    let target = Target {
                        method_name: &method_name,
                        client: &client,
                        fallback_client: fallback_client.as_ref(),
                        key: &key,
                        ttl,
                        debug,
                    };
                    write_through(target, value).await;
                }
                Ok(fresh)
            })
            .await
            .unwrap_or_else(|panicked| Err(Error::method(panicked)))
    }
}

fn is_hit(context: &ReadContext, value: &Value) -> bool {
    !value.is_null() && context.is_cacheable(value)
}

impl ReadStrategy for DefaultReadStrategy {
    async fn handle(&self, context: &ReadContext) -> Result<ReadValue, Error> {
        match self.lookup(Tier::Primary, context.client(), context.key()).await {
            Ok(Some(value)) if is_hit(context, &value) => return Ok(ReadValue::stored(value)),
            Ok(_) => {}
            Err(error) => {
                if let Some(fallback) = context.fallback_client() {
                    if let Ok(Some(value)) = self.lookup(Tier::Fallback, fallback, context.key()).await {
                        if is_hit(context, &value) {
                            return Ok(ReadValue::stored(value));
                        }
                    }
                }
                telemetry::report(
                    context.debug(),
                    context.method_name(),
                    Activity::GetFailed,
                    Some(context.key()),
                    Some(&error),
                );
            }
        }

        self.call_and_store(context).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use cacheable_client::{
        DynamicClientExt,
        testing::{ClientOp, MockClient},
    };
    use futures::{FutureExt, executor::block_on};
    use serde_json::json;

    use super::*;
    use crate::telemetry::testing::LogCapture;

    type TestResult = Result<(), Error>;

    fn counting_context(client: &MockClient, calls: &Arc<AtomicUsize>, result: Value) -> ReadContext {
        let calls = Arc::clone(calls);
        ReadContext::new("get_user", "user:1", client.clone().into_dynamic(), move || {
            calls.fetch_add(1, Ordering::SeqCst);
            let result = result.clone();
            async move { Ok(ReadValue::fresh(result.clone(), Some(result))) }.boxed()
        })
    }

    #[test]
    fn hit_skips_the_method() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            client.seed("user:1", json!("cached"));
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&client, &calls, json!("fresh"));

            let value = DefaultReadStrategy::new().handle(&context).await?;

            assert_eq!(value.value(), Some(&json!("cached")));
            assert!(!value.is_fresh());
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert_eq!(client.set_count(), 0);
            Ok(())
        })
    }

    #[test]
    fn miss_runs_method_and_stores_with_ttl() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            let calls = Arc::new(AtomicUsize::new(0));
            let ttl = Some(std::time::Duration::from_secs(9));
            let context = counting_context(&client, &calls, json!({"name": "Ann"})).with_ttl(ttl);

            let value = DefaultReadStrategy::new().handle(&context).await?;

            assert_eq!(value.value(), Some(&json!({"name": "Ann"})));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(client.operations().contains(&ClientOp::Set {
                key: "user:1".to_string(),
                value: json!({"name": "Ann"}),
                ttl,
            }));
            Ok(())
        })
    }

    #[test]
    fn stored_null_is_a_miss() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            client.seed("user:1", Value::Null);
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&client, &calls, json!(5));

            assert_eq!(DefaultReadStrategy::new().handle(&context).await?.value(), Some(&json!(5)));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            Ok(())
        })
    }

    #[test]
    fn uncacheable_values_are_neither_served_nor_stored() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            client.seed("user:1", json!(-1));
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&client, &calls, json!(-2)).with_is_cacheable(|value| value.as_i64().is_some_and(|n| n >= 0));

            assert_eq!(DefaultReadStrategy::new().handle(&context).await?.value(), Some(&json!(-2)));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(client.set_count(), 0);
            assert_eq!(client.peek("user:1"), Some(json!(-1)));
            Ok(())
        })
    }

    #[test]
    fn fresh_result_is_handed_back_untouched() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            let context = ReadContext::new("ratio", "ratio", client.clone().into_dynamic(), || {
                async { Ok(ReadValue::fresh(f64::NAN, serde_json::to_value(f64::NAN).ok())) }.boxed()
            });

            let value = DefaultReadStrategy::new().handle(&context).await?;

            assert!(value.is_fresh());
            assert!(value.into_result::<f64>()?.is_nan());
            assert_eq!(client.set_count(), 0);
            Ok(())
        })
    }

    #[test]
    fn results_without_representation_are_not_stored() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            let context = ReadContext::new("labels", "labels", client.clone().into_dynamic(), || {
                async { Ok(ReadValue::fresh(vec!["a".to_string()], None)) }.boxed()
            });

            let value = DefaultReadStrategy::new().handle(&context).await?;

            assert_eq!(value.value(), None);
            assert_eq!(value.into_result::<Vec<String>>()?, vec!["a".to_string()]);
            assert_eq!(client.set_count(), 0);
            Ok(())
        })
    }

    #[test]
    fn primary_get_failure_reads_fallback() -> TestResult {
        block_on(async {
            let primary = MockClient::new();
            primary.fail_when(|op| matches!(op, ClientOp::Get(_)));
            let fallback = MockClient::new();
            fallback.seed("user:1", json!("from fallback"));
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&primary, &calls, json!("fresh")).with_fallback_client(Some(fallback.clone().into_dynamic()));

            assert_eq!(DefaultReadStrategy::new().handle(&context).await?.value(), Some(&json!("from fallback")));
            assert_eq!(calls.load(Ordering::SeqCst), 0);
            assert_eq!(fallback.get_count(), 1);
            Ok(())
        })
    }

    #[test]
    fn get_failure_without_fallback_runs_method() -> TestResult {
        block_on(async {
            let client = MockClient::new();
            client.fail_when(|op| matches!(op, ClientOp::Get(_)));
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&client, &calls, json!(1));

            assert_eq!(DefaultReadStrategy::new().handle(&context).await?.value(), Some(&json!(1)));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert_eq!(client.peek("user:1"), Some(json!(1)));
            Ok(())
        })
    }

    #[test]
    fn primary_set_failure_writes_fallback() -> TestResult {
        block_on(async {
            let primary = MockClient::new();
            primary.fail_when(|op| matches!(op, ClientOp::Set { .. }));
            let fallback = MockClient::new();
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&primary, &calls, json!("v")).with_fallback_client(Some(fallback.clone().into_dynamic()));

            assert_eq!(DefaultReadStrategy::new().handle(&context).await?.value(), Some(&json!("v")));
            assert_eq!(fallback.peek("user:1"), Some(json!("v")));
            assert!(!primary.contains_key("user:1"));
            Ok(())
        })
    }

    #[test]
    fn total_store_outage_still_returns_result() -> TestResult {
        block_on(async {
            let primary = MockClient::new();
            primary.fail_always();
            let fallback = MockClient::new();
            fallback.fail_always();
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&primary, &calls, json!("v")).with_fallback_client(Some(fallback.into_dynamic()));

            assert_eq!(DefaultReadStrategy::new().handle(&context).await?.value(), Some(&json!("v")));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            Ok(())
        })
    }

    #[test]
    fn method_failure_propagates_and_is_not_stored() {
        block_on(async {
            let client = MockClient::new();
            let context = ReadContext::new("get_user", "user:1", client.clone().into_dynamic(), || {
                async { Err(Error::method(std::io::Error::other("db down"))) }.boxed()
            });

            let strategy = DefaultReadStrategy::new();
            let error = strategy.handle(&context).await.unwrap_err();

            assert_eq!(error.method_error::<std::io::Error>().unwrap().to_string(), "db down");
            assert_eq!(client.set_count(), 0);
            assert_eq!(strategy.in_flight(), 0);
        });
    }

    #[test]
    fn absorbed_failures_are_logged_in_debug() -> TestResult {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        block_on(async {
            let client = MockClient::new();
            client.fail_always();
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&client, &calls, json!(1)).with_debug(true);

            DefaultReadStrategy::new().handle(&context).await?;
            Ok::<(), Error>(())
        })?;

        capture.assert_contains("get_failed");
        capture.assert_contains("set_failed");
        capture.assert_contains("mock: get failed");
        Ok(())
    }

    #[test]
    fn absorbed_failures_are_silent_without_debug() -> TestResult {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        block_on(async {
            let client = MockClient::new();
            client.fail_always();
            let calls = Arc::new(AtomicUsize::new(0));
            let context = counting_context(&client, &calls, json!(1));

            DefaultReadStrategy::new().handle(&context).await?;
            Ok::<(), Error>(())
        })?;

        assert!(capture.output().is_empty());
        Ok(())
    }
}
