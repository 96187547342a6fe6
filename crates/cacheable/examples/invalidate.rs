// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Invalidation Example
//!
//! Demonstrates clearing single keys, several keys, key patterns and whole
//! hash namespaces after a successful write.

use cacheable::{CacheClear, CacheManager, Cacheable, testing::MockClient};
use serde_json::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), cacheable::Error> {
    let store = MockClient::new();
    let manager = CacheManager::new();
    manager.set_client(store.clone());

    let get_order = Cacheable::builder("get_order", |_: (), id: u32| async move { Ok::<_, std::io::Error>(id * 100) })
        .hash_key("orders")
        .cache_key_with(|id, _, _| id.to_string())
        .build(&manager);

    for id in 1..=3 {
        get_order.call((), id).await?;
    }
    store.seed("reports:2024:q1", json!("..."));
    store.seed("reports:2024:q2", json!("..."));

    // Clear one order after it changes.
    let cancel = CacheClear::builder("cancel", |_: (), id: u32| async move { Ok::<_, std::io::Error>(id) })
        .hash_key("orders")
        .cache_key_with(|id, _, _| id.to_string())
        .build(&manager);
    cancel.call((), 1).await?;
    assert!(!store.contains_key("orders:1"));

    // Clear every report of a year through a pattern.
    let close_year = CacheClear::builder("close_year", |_: (), year: u32| async move { Ok::<_, std::io::Error>(year) })
        .cache_key_with(|year, _, _| format!("^reports:{year}:"))
        .is_pattern(true)
        .build(&manager);
    close_year.call((), 2024).await?;
    assert!(!store.contains_key("reports:2024:q1"));

    // Drop the whole namespace.
    let reset = CacheClear::builder("reset", |_: (), (): ()| async { Ok::<_, std::io::Error>(()) })
        .hash_key("orders")
        .build(&manager);
    reset.call((), ()).await?;
    assert_eq!(store.entry_count(), 0);

    Ok(())
}
