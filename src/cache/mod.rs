// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide the process-wide resource cache and its sync barrier.
// Author: Lukas Bower

//! Read-only view of cluster state consumed by the file tree.
//!
//! [`Store`] is the in-memory implementation fed by the reflector. Every
//! accessor returns a point-in-time snapshot; callers never hold the store
//! lock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use log::debug;
use thiserror::Error;
use tokio::sync::watch;

use crate::shutdown::Shutdown;

mod object;

pub use object::{Kind, Object, ObjectMeta};

/// Errors reported by a [`ResourceCache`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No object is stored under the key.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Kind that was queried.
        kind: Kind,
        /// `name` or `namespace/name` of the missing object.
        key: String,
    },
    /// An object could not be parsed or rendered.
    #[error("malformed object: {0}")]
    Malformed(String),
    /// The cache cannot answer right now.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl CacheError {
    /// Return true when the error means "no such object".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound { .. })
    }
}

/// Accessors the file tree uses to read cluster state.
pub trait ResourceCache: Send + Sync {
    /// Look up a namespace by exact name.
    fn get_namespace(&self, name: &str) -> Result<Arc<Object>, CacheError>;

    /// List every namespace.
    fn list_namespaces(&self) -> Result<Vec<Arc<Object>>, CacheError>;

    /// Look up a deployment by namespace and exact name.
    fn get_deployment(&self, namespace: &str, name: &str) -> Result<Arc<Object>, CacheError>;

    /// List the deployments of one namespace.
    fn list_deployments(&self, namespace: &str) -> Result<Vec<Arc<Object>>, CacheError>;

    /// Signal that fires once the initial population has completed.
    fn sync_signal(&self) -> SyncSignal;
}

/// Receiver side of the cache's "synced" barrier.
#[derive(Debug, Clone)]
pub struct SyncSignal {
    rx: watch::Receiver<bool>,
}

impl SyncSignal {
    /// Return whether the initial population has completed.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the cache is synced or `shutdown` fires. Returns true when
    /// the cache synced.
    pub async fn wait(&self, shutdown: &Shutdown) -> bool {
        let mut rx = self.rx.clone();
        tokio::select! {
            biased;
            synced = rx.wait_for(|synced| *synced) => synced.is_ok(),
            () = shutdown.wait() => false,
        }
    }
}

#[derive(Debug, Default)]
struct Tables {
    namespaces: BTreeMap<String, Arc<Object>>,
    deployments: BTreeMap<(String, String), Arc<Object>>,
    listed: BTreeSet<Kind>,
}

/// In-memory [`ResourceCache`] kept current by the reflector.
#[derive(Debug)]
pub struct Store {
    tables: RwLock<Tables>,
    synced: watch::Sender<bool>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Create an empty, unsynced store.
    #[must_use]
    pub fn new() -> Self {
        let (synced, _) = watch::channel(false);
        Self {
            tables: RwLock::new(Tables::default()),
            synced,
        }
    }

    /// Replace every object of `kind` with the result of a fresh list and
    /// record that `kind` has been listed at least once.
    pub fn replace(&self, kind: Kind, objects: Vec<Object>) {
        let all_listed = {
            let mut tables = self.tables.write().expect("poisoned cache lock");
            match kind {
                Kind::Namespace => {
                    tables.namespaces = objects
                        .into_iter()
                        .map(|object| (object.name().to_owned(), Arc::new(object)))
                        .collect();
                }
                Kind::Deployment => {
                    tables.deployments = objects
                        .into_iter()
                        .map(|object| (deployment_key(&object), Arc::new(object)))
                        .collect();
                }
            }
            tables.listed.insert(kind);
            Kind::ALL.iter().all(|kind| tables.listed.contains(kind))
        };
        if all_listed && !*self.synced.borrow() {
            debug!("[cache] every kind listed, releasing sync barrier");
            self.synced.send_replace(true);
        }
    }

    /// Insert or update one object.
    pub fn upsert(&self, object: Object) {
        let mut tables = self.tables.write().expect("poisoned cache lock");
        match object.kind() {
            Kind::Namespace => {
                tables
                    .namespaces
                    .insert(object.name().to_owned(), Arc::new(object));
            }
            Kind::Deployment => {
                tables
                    .deployments
                    .insert(deployment_key(&object), Arc::new(object));
            }
        }
    }

    /// Remove one object, returning whether it was present.
    pub fn remove(&self, object: &Object) -> bool {
        let mut tables = self.tables.write().expect("poisoned cache lock");
        match object.kind() {
            Kind::Namespace => tables.namespaces.remove(object.name()).is_some(),
            Kind::Deployment => tables
                .deployments
                .remove(&deployment_key(object))
                .is_some(),
        }
    }

    /// Number of objects of `kind` currently stored.
    #[must_use]
    pub fn len(&self, kind: Kind) -> usize {
        let tables = self.tables.read().expect("poisoned cache lock");
        match kind {
            Kind::Namespace => tables.namespaces.len(),
            Kind::Deployment => tables.deployments.len(),
        }
    }
}

fn deployment_key(object: &Object) -> (String, String) {
    (object.namespace().to_owned(), object.name().to_owned())
}

impl ResourceCache for Store {
    fn get_namespace(&self, name: &str) -> Result<Arc<Object>, CacheError> {
        let tables = self.tables.read().expect("poisoned cache lock");
        tables
            .namespaces
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::NotFound {
                kind: Kind::Namespace,
                key: name.to_owned(),
            })
    }

    fn list_namespaces(&self) -> Result<Vec<Arc<Object>>, CacheError> {
        let tables = self.tables.read().expect("poisoned cache lock");
        Ok(tables.namespaces.values().cloned().collect())
    }

    fn get_deployment(&self, namespace: &str, name: &str) -> Result<Arc<Object>, CacheError> {
        let tables = self.tables.read().expect("poisoned cache lock");
        tables
            .deployments
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
            .ok_or_else(|| CacheError::NotFound {
                kind: Kind::Deployment,
                key: format!("{namespace}/{name}"),
            })
    }

    fn list_deployments(&self, namespace: &str) -> Result<Vec<Arc<Object>>, CacheError> {
        let tables = self.tables.read().expect("poisoned cache lock");
        Ok(tables
            .deployments
            .range((namespace.to_owned(), String::new())..)
            .take_while(|((ns, _), _)| ns == namespace)
            .map(|(_, object)| Arc::clone(object))
            .collect())
    }

    fn sync_signal(&self) -> SyncSignal {
        SyncSignal {
            rx: self.synced.subscribe(),
        }
    }
}
