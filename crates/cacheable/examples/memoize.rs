// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Memoization Example
//!
//! Demonstrates caching a repository lookup, request collapsing and
//! write-through updates against an in-memory mock store.

use std::time::Duration;

use cacheable::{CacheManager, CacheUpdate, Cacheable, ManagerOptions, testing::MockClient};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

#[derive(Clone, Debug, Serialize)]
struct UserRepo {
    table: &'static str,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), cacheable::Error> {
    let store = MockClient::new();

    // Configure the process-wide manager once at startup.
    let manager = CacheManager::global();
    manager.set_options(ManagerOptions::default().ttl(Duration::from_secs(300)).debug(true));
    manager.set_client(store.clone());

    let get_user = Cacheable::builder("get_user", |repo: UserRepo, id: u32| async move {
        // Stand-in for a slow database query.
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok::<_, std::io::Error>(User {
            id,
            name: format!("{}-{id}", repo.table),
        })
    })
    .hash_key("users")
    .cache_key_with(|id, _, _| id.to_string())
    .build(manager);

    let rename = CacheUpdate::builder("rename", |_: UserRepo, (id, name): (u32, String)| async move {
        Ok::<_, std::io::Error>(User { id, name })
    })
    .hash_key("users")
    .cache_key_with(|_, _, user| user.map(|user| user.id.to_string()).unwrap_or_default())
    .build(manager);

    let repo = UserRepo { table: "users" };

    // Ten concurrent lookups for the same user run the query once.
    let users = join_all((0..10).map(|_| get_user.call(repo.clone(), 1))).await;
    assert!(users.iter().all(Result::is_ok));
    assert_eq!(store.set_count(), 1);

    // A rename writes the fresh value, which the next lookup serves.
    rename.call(repo.clone(), (1, "Ann".to_string())).await?;
    let user = get_user.call(repo, 1).await?;
    assert_eq!(user.name, "Ann");

    Ok(())
}
