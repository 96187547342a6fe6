// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for write-through updates.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use cacheable::{CacheManager, CacheUpdate, CacheUpdateBuilder, Cacheable, Error, NoOpUpdateStrategy, UpdateContext, UpdateStrategy, Value};
use cacheable_client::testing::{ClientOp, MockClient};
use serde::{Deserialize, Serialize};
use serde_json::json;

type TestResult = Result<(), Error>;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Session {
    id: u32,
    #[serde(skip)]
    token: String,
}

fn setup() -> (CacheManager, MockClient) {
    let manager = CacheManager::new();
    let client = MockClient::new();
    manager.set_client(client.clone());
    (manager, client)
}

fn rename(calls: &Arc<AtomicUsize>) -> CacheUpdateBuilder<(), (u32, String), User> {
    let calls = Arc::clone(calls);
    CacheUpdate::builder("rename", move |_: (), (id, name): (u32, String)| {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, std::io::Error>(User { id, name }) }
    })
    .cache_key_with(|_, _, user| format!("user:{}", user.map_or(0, |user| user.id)))
    .ttl(Duration::from_secs(30))
}

#[test]
fn every_call_runs_the_method_and_writes() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let rename = rename(&calls).build(&manager);

        rename.call((), (1, "Ann".to_string())).await?;
        let user = rename.call((), (1, "Bea".to_string())).await?;

        assert_eq!(user, User { id: 1, name: "Bea".to_string() });
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.get_count(), 0);
        assert_eq!(client.set_count(), 2);
        assert_eq!(client.peek("user:1"), Some(json!({"id": 1, "name": "Bea"})));
        assert!(client.operations().contains(&ClientOp::Set {
            key: "user:1".to_string(),
            value: json!({"id": 1, "name": "Bea"}),
            ttl: Some(Duration::from_secs(30)),
        }));
        Ok(())
    })
}

#[test]
fn results_are_returned_as_the_method_produced_them() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        let measure = CacheUpdate::builder("measure", |_: (), (): ()| async { Ok::<_, std::io::Error>(f64::NAN) })
            .cache_key("measure")
            .build(&manager);
        let login = CacheUpdate::builder("login", |_: (), id: u32| async move {
            Ok::<_, std::io::Error>(Session {
                id,
                token: "secret".to_string(),
            })
        })
        .cache_key_with(|id, _, _| format!("session:{id}"))
        .build(&manager);

        assert!(measure.call((), ()).await?.is_nan());

        let session = login.call((), 3).await?;
        assert_eq!(session.id, 3);
        assert_eq!(session.token, "secret");
        assert_eq!(client.peek("session:3"), Some(json!({"id": 3})));
        Ok(())
    })
}

#[test]
fn update_refreshes_what_cacheable_serves() -> TestResult {
    block_on(async {
        let (manager, _client) = setup();
        let get_user = Cacheable::builder("get_user", |_: (), id: u32| async move {
            Ok::<_, std::io::Error>(User {
                id,
                name: "Ann".to_string(),
            })
        })
        .cache_key_with(|id, _, _| format!("user:{id}"))
        .build(&manager);
        let calls = Arc::new(AtomicUsize::new(0));
        let rename = rename(&calls).build(&manager);

        assert_eq!(get_user.call((), 1).await?.name, "Ann");
        rename.call((), (1, "Bea".to_string())).await?;
        assert_eq!(get_user.call((), 1).await?.name, "Bea");
        Ok(())
    })
}

#[test]
fn failed_method_writes_nothing() {
    block_on(async {
        let (manager, client) = setup();
        let save = CacheUpdate::builder("save", |_: (), (): ()| async { Err::<u32, _>(std::io::Error::other("conflict")) })
            .cache_key("k")
            .cache_keys_to_clear("other")
            .build(&manager);

        assert!(save.call((), ()).await.unwrap_err().is_method());
        assert!(client.operations().is_empty());
    });
}

#[test]
fn clears_listed_keys_after_writing() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        client.seed("users:all", json!([]));
        client.seed("users:count", json!(0));
        let save = CacheUpdate::builder("save", |_: (), id: u32| async move { Ok::<_, std::io::Error>(id) })
            .cache_key_with(|id, _, _| format!("user:{id}"))
            .cache_keys_to_clear(vec!["users:all", "users:count"])
            .build(&manager);

        save.call((), 3).await?;

        let operations = client.operations();
        assert!(matches!(&operations[0], ClientOp::Set { key, .. } if key == "user:3"));
        assert_eq!(operations[1], ClientOp::Del(vec!["users:all".to_string(), "users:count".to_string()]));
        assert_eq!(client.entry_count(), 1);
        Ok(())
    })
}

#[test]
fn clear_keys_share_the_hash_namespace() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        client.seed("users:all", json!([]));
        let save = CacheUpdate::builder("save", |_: (), id: u32| async move { Ok::<_, std::io::Error>(id) })
            .hash_key("users")
            .cache_key_with(|id, _, _| id.to_string())
            .cache_keys_to_clear_with(|_, _, _| "all")
            .build(&manager);

        save.call((), 3).await?;

        assert_eq!(client.peek("users:3"), Some(json!(3)));
        assert!(!client.contains_key("users:all"));
        Ok(())
    })
}

#[test]
fn parallel_mode_writes_and_clears() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        client.seed("stale", json!(1));
        let save = CacheUpdate::builder("save", |_: (), (): ()| async { Ok::<_, std::io::Error>("fresh") })
            .cache_key("current")
            .cache_keys_to_clear("stale")
            .clear_and_update_in_parallel(true)
            .build(&manager);

        assert_eq!(save.call((), ()).await?, "fresh");
        assert_eq!(client.peek("current"), Some(json!("fresh")));
        assert!(!client.contains_key("stale"));
        Ok(())
    })
}

#[test]
fn nothing_is_cleared_unless_configured() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        let save = CacheUpdate::builder("save", |_: (), (): ()| async { Ok::<_, std::io::Error>(1) }).build(&manager);

        save.call((), ()).await?;

        assert_eq!(client.set_count(), 1);
        assert_eq!(client.del_count(), 0);
        Ok(())
    })
}

#[test]
fn store_outage_still_returns_result() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        client.fail_always();
        let save = CacheUpdate::builder("save", |_: (), n: u32| async move { Ok::<_, std::io::Error>(n + 1) })
            .cache_keys_to_clear("x")
            .clear_and_update_in_parallel(true)
            .build(&manager);

        assert_eq!(save.call((), 1).await?, 2);
        Ok(())
    })
}

#[test]
fn noop_update_strategy_skips_the_write() -> TestResult {
    block_on(async {
        let (manager, client) = setup();
        let save = CacheUpdate::builder("save", |_: (), (): ()| async { Ok::<_, std::io::Error>(1) })
            .strategy(NoOpUpdateStrategy)
            .build(&manager);

        assert_eq!(save.call((), ()).await?, 1);
        assert!(client.operations().is_empty());
        Ok(())
    })
}

struct Rejecting;

impl UpdateStrategy for Rejecting {
    async fn handle(&self, _context: &UpdateContext) -> Result<Value, Error> {
        Err(Error::Client(cacheable_client::Error::from_message("read-only store")))
    }
}

#[test]
fn custom_update_failures_surface() {
    block_on(async {
        let (manager, client) = setup();
        let save = CacheUpdate::builder("save", |_: (), (): ()| async { Ok::<_, std::io::Error>(1) })
            .cache_keys_to_clear("x")
            .strategy(Rejecting)
            .build(&manager);

        let error = save.call((), ()).await.unwrap_err();
        assert!(matches!(error, Error::Client(_)));
        assert_eq!(client.del_count(), 0);
    });
}
