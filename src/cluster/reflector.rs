// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Mirror namespaces and deployments into the cache with list+watch loops.
// Author: Lukas Bower

//! List+watch reflector.
//!
//! One thread per [`Kind`] lists the collection, replaces the kind in the
//! [`Store`], then follows a watch from the list's resource version. A
//! failed request, a broken stream or an expired version (410) triggers a
//! relist after the retry backoff. Threads exit at the next backoff or
//! watch boundary after shutdown.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use super::{ClusterClient, ClusterError, WatchEvent, WatchEventType};
use crate::cache::{Kind, Object, Store};
use crate::shutdown::Shutdown;

/// Timing knobs for the list+watch loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectorSettings {
    /// Server-side timeout of each watch request.
    pub watch_timeout: Duration,
    /// Pause before retrying a failed list or watch.
    pub retry_backoff: Duration,
}

impl Default for ReflectorSettings {
    fn default() -> Self {
        Self {
            watch_timeout: Duration::from_secs(300),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// Keeps a [`Store`] in step with the API server.
#[derive(Debug, Clone)]
pub struct Reflector {
    client: Arc<ClusterClient>,
    store: Arc<Store>,
    settings: ReflectorSettings,
    shutdown: Shutdown,
}

impl Reflector {
    /// Create a reflector feeding `store` from `client`.
    pub fn new(
        client: Arc<ClusterClient>,
        store: Arc<Store>,
        settings: ReflectorSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            client,
            store,
            settings,
            shutdown,
        }
    }

    /// Start one thread per mirrored kind.
    pub fn spawn(&self) -> Result<Vec<JoinHandle<()>>, ClusterError> {
        Kind::ALL
            .iter()
            .map(|&kind| {
                let reflector = self.clone();
                thread::Builder::new()
                    .name(format!("reflector-{}", kind.to_string().to_lowercase()))
                    .spawn(move || reflector.run(kind))
                    .map_err(ClusterError::from)
            })
            .collect()
    }

    fn run(&self, kind: Kind) {
        while !self.shutdown.is_triggered() {
            let mut version = match self.relist(kind) {
                Ok(version) => version,
                Err(err) => {
                    warn!("[k9p][reflector] list {kind} failed: {err}");
                    if self.shutdown.sleep(self.settings.retry_backoff) {
                        break;
                    }
                    continue;
                }
            };
            while !self.shutdown.is_triggered() {
                if let Err(err) = self.watch(kind, &mut version) {
                    warn!("[k9p][reflector] watch {kind} failed, relisting: {err}");
                    self.shutdown.sleep(self.settings.retry_backoff);
                    break;
                }
            }
        }
        debug!("[k9p][reflector] {kind} reflector stopped");
    }

    fn relist(&self, kind: Kind) -> Result<String, ClusterError> {
        let list = self.client.list(kind)?;
        let objects: Vec<Object> = list
            .items
            .into_iter()
            .filter_map(|item| match Object::from_value(kind, item) {
                Ok(object) => Some(object),
                Err(err) => {
                    warn!("[k9p][reflector] skipping {kind}: {err}");
                    None
                }
            })
            .collect();
        info!(
            "[k9p][reflector] listed {} {kind} objects at version {}",
            objects.len(),
            list.metadata.resource_version
        );
        self.store.replace(kind, objects);
        Ok(list.metadata.resource_version)
    }

    /// Follow one watch request to its end, advancing `version`.
    fn watch(&self, kind: Kind, version: &mut String) -> Result<(), ClusterError> {
        let events = self
            .client
            .watch(kind, version, self.settings.watch_timeout)?;
        for event in events {
            if self.shutdown.is_triggered() {
                break;
            }
            if let Some(next) = apply_event(&self.store, kind, event?)? {
                *version = next;
            }
        }
        Ok(())
    }
}

/// Apply one watch event to `store`, returning the resource version it
/// carries.
pub fn apply_event(
    store: &Store,
    kind: Kind,
    event: WatchEvent,
) -> Result<Option<String>, ClusterError> {
    match event.event_type {
        WatchEventType::Added | WatchEventType::Modified => {
            let object = Object::from_value(kind, event.object)?;
            let version = object.metadata().resource_version.clone();
            store.upsert(object);
            Ok(version)
        }
        WatchEventType::Deleted => {
            let object = Object::from_value(kind, event.object)?;
            let version = object.metadata().resource_version.clone();
            store.remove(&object);
            Ok(version)
        }
        WatchEventType::Bookmark => Ok(event
            .object
            .pointer("/metadata/resourceVersion")
            .and_then(|value| value.as_str())
            .map(str::to_owned)),
        WatchEventType::Error => Err(ClusterError::Status {
            code: event
                .object
                .get("code")
                .and_then(|value| value.as_u64())
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or_default(),
            message: event
                .object
                .get("message")
                .and_then(|value| value.as_str())
                .unwrap_or("watch failed")
                .to_owned(),
        }),
    }
}
