// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "test-util")]

//! Integration tests for the mock client and the dynamic handle.

use std::time::Duration;

use cacheable_client::{
    CacheClient, DynamicClientExt, Error,
    testing::{ClientOp, MockClient},
};
use serde_json::json;

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[test]
fn set_then_get_round_trips() -> TestResult {
    block_on(async {
        let client = MockClient::new();

        assert!(client.get("missing").await?.is_none());
        client.set("key", json!({"id": 1}), Some(Duration::from_secs(5))).await?;
        assert_eq!(client.get("key").await?, Some(json!({"id": 1})));

        assert_eq!(
            client.operations(),
            vec![
                ClientOp::Get("missing".to_string()),
                ClientOp::Set {
                    key: "key".to_string(),
                    value: json!({"id": 1}),
                    ttl: Some(Duration::from_secs(5)),
                },
                ClientOp::Get("key".to_string()),
            ]
        );
        Ok(())
    })
}

#[test]
fn del_removes_every_listed_key() -> TestResult {
    block_on(async {
        let client = MockClient::new();
        client.seed("a", json!(1));
        client.seed("b", json!(2));
        client.seed("c", json!(3));

        client.del(&["a".to_string(), "b".to_string()]).await?;

        assert!(!client.contains_key("a"));
        assert!(!client.contains_key("b"));
        assert!(client.contains_key("c"));
        Ok(())
    })
}

#[test]
fn keys_matches_regular_expressions() -> TestResult {
    block_on(async {
        let client = MockClient::new();
        client.seed("user:1", json!(1));
        client.seed("user:2", json!(2));
        client.seed("team:1", json!(3));

        let mut keys = client.keys("^user:").await?;
        keys.sort();
        assert_eq!(keys, vec!["user:1".to_string(), "user:2".to_string()]);
        Ok(())
    })
}

#[test]
fn del_hash_removes_namespace_only() -> TestResult {
    block_on(async {
        let client = MockClient::new();
        client.seed("users:1", json!(1));
        client.seed("users:2", json!(2));
        client.seed("usersettings", json!(3));

        client.del_hash(&["users".to_string()]).await?;

        assert_eq!(client.entry_count(), 1);
        assert!(client.contains_key("usersettings"));
        Ok(())
    })
}

#[test]
fn injected_failures_are_recorded() {
    block_on(async {
        let client = MockClient::new();
        client.fail_when(|op| matches!(op, ClientOp::Set { .. }));

        let err = client.set("key", json!(1), None).await.expect_err("set should fail");
        assert!(err.to_string().contains("mock: set failed"));
        assert_eq!(client.set_count(), 1);
        assert!(!client.contains_key("key"));

        client.clear_failures();
        client.set("key", json!(1), None).await.unwrap();
    });
}

#[test]
fn dynamic_client_delegates_to_inner() -> TestResult {
    block_on(async {
        let mock = MockClient::with_ttl(Duration::from_secs(30));
        let dynamic = mock.clone().into_dynamic();
        let clone = dynamic.clone();

        clone.set("key", json!("value"), None).await?;
        assert_eq!(mock.peek("key"), Some(json!("value")));
        assert_eq!(dynamic.get("key").await?, Some(json!("value")));
        assert_eq!(dynamic.client_ttl(), Some(Duration::from_secs(30)));
        assert!(dynamic.ptr_eq(&clone));
        Ok(())
    })
}
