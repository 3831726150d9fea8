// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Model the cluster objects mirrored by the resource cache.
// Author: Lukas Bower

//! Cluster objects as kept by the cache: parsed metadata plus the raw
//! JSON document received from the API server.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::CacheError;

/// Resource kinds mirrored from the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// `v1/Namespace`, cluster scoped.
    Namespace,
    /// `apps/v1/Deployment`, namespace scoped.
    Deployment,
}

impl Kind {
    /// Every mirrored kind, in the order the reflector starts them.
    pub const ALL: [Kind; 2] = [Kind::Namespace, Kind::Deployment];

    /// Cluster-wide collection path on the API server.
    #[must_use]
    pub fn api_path(self) -> &'static str {
        match self {
            Kind::Namespace => "/api/v1/namespaces",
            Kind::Deployment => "/apis/apps/v1/deployments",
        }
    }

    fn api_version(self) -> &'static str {
        match self {
            Kind::Namespace => "v1",
            Kind::Deployment => "apps/v1",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Namespace => f.write_str("Namespace"),
            Kind::Deployment => f.write_str("Deployment"),
        }
    }
}

/// Subset of `metadata` the file tree needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Object name, unique within its namespace.
    pub name: String,
    /// Owning namespace for namespace-scoped kinds.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Server-assigned identifier.
    #[serde(default)]
    pub uid: Option<String>,
    /// Opaque version used to resume watches.
    #[serde(default)]
    pub resource_version: Option<String>,
    /// Spec generation, bumped on every spec change.
    #[serde(default)]
    pub generation: Option<i64>,
    /// Creation time.
    #[serde(default)]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// One cluster object.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    kind: Kind,
    metadata: ObjectMeta,
    raw: Value,
}

impl Object {
    /// Parse an object of `kind` from its JSON document.
    ///
    /// List responses omit `apiVersion` and `kind` on items; they are filled
    /// in so the serialized snapshot reads like `kubectl get -o yaml`.
    pub fn from_value(kind: Kind, mut raw: Value) -> Result<Self, CacheError> {
        let metadata = raw
            .get("metadata")
            .cloned()
            .ok_or_else(|| CacheError::Malformed(format!("{kind} without metadata")))?;
        let metadata: ObjectMeta = serde_json::from_value(metadata)
            .map_err(|err| CacheError::Malformed(format!("{kind} metadata: {err}")))?;
        if kind == Kind::Deployment && metadata.namespace.is_none() {
            return Err(CacheError::Malformed(format!(
                "deployment {} without namespace",
                metadata.name
            )));
        }
        if let Some(fields) = raw.as_object_mut() {
            fields
                .entry("apiVersion")
                .or_insert_with(|| Value::from(kind.api_version()));
            fields
                .entry("kind")
                .or_insert_with(|| Value::from(kind.to_string()));
        }
        Ok(Self {
            kind,
            metadata,
            raw,
        })
    }

    /// Resource kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Parsed metadata.
    #[must_use]
    pub fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    /// Object name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Owning namespace, empty for cluster-scoped kinds.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or_default()
    }

    /// Full JSON document.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Desired replica count of a deployment. The API server defaults an
    /// unset `spec.replicas` to one.
    #[must_use]
    pub fn replicas(&self) -> i64 {
        self.raw
            .pointer("/spec/replicas")
            .and_then(Value::as_i64)
            .unwrap_or(1)
    }

    /// Render the document as YAML.
    pub fn to_yaml(&self) -> Result<String, CacheError> {
        serde_yaml::to_string(&self.raw)
            .map_err(|err| CacheError::Malformed(format!("{} yaml: {err}", self.kind)))
    }
}
