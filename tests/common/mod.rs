// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Shared cluster fixtures for k9p integration tests.
// Author: Lukas Bower
#![allow(dead_code)]

use std::sync::Arc;

use k9p::{CacheError, Kind, Object, ResourceCache, Service, Session, Store, SyncSignal};
use k9p_codec::{DirEntries, Qid};
use serde_json::{json, Value};

pub const ROOT: u32 = 1;

pub fn namespace(name: &str, generation: Option<i64>) -> Object {
    let mut metadata = json!({
        "name": name,
        "uid": format!("uid-{name}"),
        "resourceVersion": "100",
        "creationTimestamp": "2024-01-02T03:04:05Z",
    });
    if let Some(generation) = generation {
        metadata["generation"] = Value::from(generation);
    }
    Object::from_value(Kind::Namespace, json!({ "metadata": metadata })).expect("namespace fixture")
}

pub fn deployment(namespace: &str, name: &str, replicas: Option<i64>) -> Object {
    let mut spec = json!({ "selector": { "matchLabels": { "app": name } } });
    if let Some(replicas) = replicas {
        spec["replicas"] = Value::from(replicas);
    }
    Object::from_value(
        Kind::Deployment,
        json!({
            "metadata": {
                "name": name,
                "namespace": namespace,
                "generation": 2,
                "resourceVersion": "200",
                "creationTimestamp": "2024-03-01T12:00:00Z",
            },
            "spec": spec,
        }),
    )
    .expect("deployment fixture")
}

/// Synced store holding `default` and `kube-system` with a few deployments.
pub fn cluster() -> Arc<Store> {
    let store = Arc::new(Store::new());
    store.replace(
        Kind::Namespace,
        vec![namespace("default", Some(4)), namespace("kube-system", None)],
    );
    store.replace(
        Kind::Deployment,
        vec![
            deployment("default", "web", Some(3)),
            deployment("default", "api", None),
            deployment("kube-system", "coredns", Some(2)),
        ],
    );
    store
}

/// Message carried by every [`FailingCache`] error.
pub const OUTAGE: &str = "api server unreachable";

/// Synced cache whose every lookup fails with [`CacheError::Unavailable`].
pub struct FailingCache {
    barrier: Store,
}

impl FailingCache {
    pub fn new() -> Arc<Self> {
        let barrier = Store::new();
        barrier.replace(Kind::Namespace, Vec::new());
        barrier.replace(Kind::Deployment, Vec::new());
        Arc::new(Self { barrier })
    }

    fn outage<T>() -> Result<T, CacheError> {
        Err(CacheError::Unavailable(OUTAGE.to_owned()))
    }
}

impl ResourceCache for FailingCache {
    fn get_namespace(&self, _name: &str) -> Result<Arc<Object>, CacheError> {
        Self::outage()
    }

    fn list_namespaces(&self) -> Result<Vec<Arc<Object>>, CacheError> {
        Self::outage()
    }

    fn get_deployment(&self, _namespace: &str, _name: &str) -> Result<Arc<Object>, CacheError> {
        Self::outage()
    }

    fn list_deployments(&self, _namespace: &str) -> Result<Vec<Arc<Object>>, CacheError> {
        Self::outage()
    }

    fn sync_signal(&self) -> SyncSignal {
        self.barrier.sync_signal()
    }
}

pub fn attached(store: &Arc<Store>, uname: &str) -> Session {
    let session = Session::new(store.clone());
    session.attach(ROOT, k9p_codec::NOFID, uname, "").expect("attach");
    session
}

pub fn path(text: &str) -> Vec<String> {
    text.split('/')
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn walk(session: &impl Service, newfid: u32, text: &str) -> Vec<Qid> {
    let names = path(text);
    let qids = session
        .walk(ROOT, newfid, &names)
        .unwrap_or_else(|err| panic!("walk /{text}: {err}"));
    assert_eq!(qids.len(), names.len(), "walk /{text} resolved partially");
    qids
}

/// Read a fid to end of stream using `count`-byte requests.
pub fn read_all(session: &impl Service, fid: u32, count: u32) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let chunk = session
            .read(fid, out.len() as u64, count)
            .expect("sequential read");
        if chunk.is_empty() {
            return out;
        }
        out.extend_from_slice(&chunk);
    }
}

pub fn entry_names(buf: &[u8]) -> Vec<String> {
    let mut names: Vec<String> = DirEntries::new(buf)
        .map(|entry| entry.expect("decode entry").name)
        .collect();
    names.sort();
    names
}
