// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Issue list and watch requests against the Kubernetes REST API.
// Author: Lukas Bower

use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::CertificateDer;
use serde::Deserialize;
use serde_json::Value;

use super::{ClusterConfig, ClusterError};
use crate::cache::Kind;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Slack added to the server-side watch timeout before the client gives up.
const WATCH_SLACK: Duration = Duration::from_secs(30);

/// Response to a collection `GET`.
#[derive(Debug, Deserialize)]
pub struct ObjectList {
    /// List metadata.
    #[serde(default)]
    pub metadata: ListMeta,
    /// Raw items; list responses omit per-item `kind`.
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Collection metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    /// Version to resume a watch from.
    #[serde(default)]
    pub resource_version: String,
}

/// Change notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WatchEventType {
    /// Object created.
    Added,
    /// Object updated.
    Modified,
    /// Object deleted; carries its last state.
    Deleted,
    /// Progress marker carrying only a resource version.
    Bookmark,
    /// Stream failure carrying a `Status` object.
    Error,
}

/// One line of a watch stream.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchEvent {
    /// What happened.
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    /// Object, or `Status` for [`WatchEventType::Error`].
    pub object: Value,
}

/// Blocking REST client for the API server.
#[derive(Debug)]
pub struct ClusterClient {
    agent: ureq::Agent,
    server: String,
    authorization: Option<String>,
}

impl ClusterClient {
    /// Build a client; reads may block for up to `watch_timeout` plus slack.
    pub fn new(config: &ClusterConfig, watch_timeout: Duration) -> Result<Self, ClusterError> {
        let mut builder = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(watch_timeout + WATCH_SLACK);
        if let Some(pem) = &config.ca_pem {
            builder = builder.tls_config(Arc::new(tls_config(pem)?));
        }
        Ok(Self {
            agent: builder.build(),
            server: config.server.clone(),
            authorization: config.token.as_ref().map(|token| format!("Bearer {token}")),
        })
    }

    fn get(&self, url: &str) -> Result<ureq::Response, ClusterError> {
        let mut request = self.agent.get(url).set("Accept", "application/json");
        if let Some(authorization) = &self.authorization {
            request = request.set("Authorization", authorization);
        }
        Ok(request.call()?)
    }

    /// List every object of `kind` across all namespaces.
    pub fn list(&self, kind: Kind) -> Result<ObjectList, ClusterError> {
        let response = self.get(&format!("{}{}", self.server, kind.api_path()))?;
        Ok(serde_json::from_reader(response.into_reader())?)
    }

    /// Open a watch on `kind` starting after `resource_version`. The stream
    /// ends when the server-side `timeout` elapses.
    pub fn watch(
        &self,
        kind: Kind,
        resource_version: &str,
        timeout: Duration,
    ) -> Result<impl Iterator<Item = Result<WatchEvent, ClusterError>>, ClusterError> {
        let url = format!(
            "{}{}?watch=1&allowWatchBookmarks=true&resourceVersion={}&timeoutSeconds={}",
            self.server,
            kind.api_path(),
            resource_version,
            timeout.as_secs().max(1),
        );
        let response = self.get(&url)?;
        Ok(BufReader::new(response.into_reader())
            .lines()
            .filter(|line| !matches!(line, Ok(text) if text.trim().is_empty()))
            .map(|line| -> Result<WatchEvent, ClusterError> {
                Ok(serde_json::from_str(&line?)?)
            }))
    }
}

fn tls_config(pem: &[u8]) -> Result<rustls::ClientConfig, ClusterError> {
    let mut roots = rustls::RootCertStore::empty();
    for der in rustls_pemfile::certs(&mut &pem[..])? {
        roots.add(CertificateDer::from(der))?;
    }
    if roots.is_empty() {
        return Err(ClusterError::Config(
            "certificate authority bundle holds no certificates".to_owned(),
        ));
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_events_parse_from_stream_lines() {
        let line = r#"{"type":"MODIFIED","object":{"metadata":{"name":"web","namespace":"default","resourceVersion":"42"}}}"#;
        let event: WatchEvent = serde_json::from_str(line).expect("parse event");
        assert_eq!(event.event_type, WatchEventType::Modified);
        assert_eq!(event.object["metadata"]["resourceVersion"], "42");
    }

    #[test]
    fn list_metadata_carries_resource_version() {
        let body = r#"{"kind":"NamespaceList","metadata":{"resourceVersion":"977"},"items":[{"metadata":{"name":"default"}}]}"#;
        let list: ObjectList = serde_json::from_str(body).expect("parse list");
        assert_eq!(list.metadata.resource_version, "977");
        assert_eq!(list.items.len(), 1);
    }

    #[test]
    fn empty_ca_bundle_is_rejected() {
        let err = tls_config(b"not a certificate").expect_err("no certificates");
        assert!(matches!(err, ClusterError::Config(_)), "got {err:?}");
    }
}
