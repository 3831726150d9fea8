// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate that sessions wait for the initial cluster listing.
// Author: Lukas Bower
#![forbid(unsafe_code)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{deployment, namespace};
use k9p::{Kind, Session, Shutdown, Store};
use tokio::time::timeout;

const PENDING: Duration = Duration::from_millis(50);
const SETTLE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn sessions_wait_until_every_kind_is_listed() {
    let store = Arc::new(Store::new());
    let shutdown = Shutdown::new();
    let session = Arc::new(Session::new(store.clone()));

    let waiter = {
        let session = Arc::clone(&session);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { session.wait_for_cache_sync(&shutdown).await })
    };

    store.replace(Kind::Namespace, vec![namespace("default", Some(1))]);
    tokio::time::sleep(PENDING).await;
    assert!(!waiter.is_finished(), "deployments are still unlisted");

    store.replace(Kind::Deployment, vec![deployment("default", "web", Some(1))]);
    let synced = timeout(SETTLE, waiter)
        .await
        .expect("barrier released")
        .expect("waiter task");
    assert!(synced);
}

#[tokio::test]
async fn empty_listings_still_count_as_synced() {
    let store = Arc::new(Store::new());
    store.replace(Kind::Deployment, Vec::new());
    store.replace(Kind::Namespace, Vec::new());
    let session = Session::new(store);
    let synced = timeout(SETTLE, session.wait_for_cache_sync(&Shutdown::new()))
        .await
        .expect("already synced");
    assert!(synced);
}

#[tokio::test]
async fn shutdown_abandons_the_wait() {
    let store = Arc::new(Store::new());
    let shutdown = Shutdown::new();
    let session = Session::new(store);

    assert!(timeout(PENDING, session.wait_for_cache_sync(&shutdown))
        .await
        .is_err());
    shutdown.trigger();
    let synced = timeout(SETTLE, session.wait_for_cache_sync(&shutdown))
        .await
        .expect("shutdown wakes the waiter");
    assert!(!synced);
}

#[tokio::test]
async fn later_relists_do_not_reset_the_barrier() {
    let store = common::cluster();
    store.replace(Kind::Namespace, Vec::new());
    let session = Session::new(store);
    let synced = timeout(SETTLE, session.wait_for_cache_sync(&Shutdown::new()))
        .await
        .expect("barrier stays released");
    assert!(synced);
}
