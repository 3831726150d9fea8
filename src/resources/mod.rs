// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define the lazily resolved file tree served to 9P clients.
// Author: Lukas Bower

//! The file tree.
//!
//! ```text
//! /
//! ├── cluster/
//! └── namespaces/
//!     └── <namespace>/
//!         └── deployments/
//!             └── <deployment>/
//!                 ├── data.yaml
//!                 └── scale
//! ```
//!
//! Cache-backed nodes are built on demand by [`Node::get`]; static children
//! are built once with their parent and shared between walks. Every node
//! memoizes its [`Dir`] the first time it is described, so the random
//! `Qid.path` it carries stays stable for the node's lifetime.

use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use k9p_codec::{Dir, Qid, QidType, DMDIR};

use crate::cache::{CacheError, Object, ResourceCache};
use crate::stream::Reader;
use crate::K9pError;

mod cluster;
mod fixed;

pub use cluster::{DeploymentDir, DeploymentsDir, NamespaceDir, NamespacesDir};
pub use fixed::{StaticDir, StaticFile};

/// Permission bits reported for every node.
pub const PERMISSIONS: u32 = 0o664;

/// Last-modifier reported for every node.
pub const MUID: &str = "none";

/// Per-attach state shared by every node of one tree.
#[derive(Clone)]
pub struct Context {
    cache: Arc<dyn ResourceCache>,
    owner: Arc<str>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Create a context attributing every node to `owner`.
    #[must_use]
    pub fn new(cache: Arc<dyn ResourceCache>, owner: &str) -> Self {
        Self {
            cache,
            owner: Arc::from(owner),
        }
    }

    /// Identity reported as owner and group.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn cache(&self) -> &dyn ResourceCache {
        self.cache.as_ref()
    }
}

/// Look up a cached object, turning a missing key into [`K9pError::NotFound`].
fn resolve(lookup: Result<Arc<Object>, CacheError>) -> Result<Arc<Object>, K9pError> {
    lookup.map_err(|err| {
        if err.is_not_found() {
            K9pError::NotFound
        } else {
            K9pError::Cache(err)
        }
    })
}

/// Static attributes of a node and its memoized description.
#[derive(Debug)]
pub(crate) struct Meta {
    name: String,
    directory: bool,
    version: u32,
    time: DateTime<Utc>,
    length: u64,
    owner: Arc<str>,
    info: OnceLock<Dir>,
}

impl Meta {
    pub(crate) fn directory(ctx: &Context, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            directory: true,
            version: 0,
            time: Utc::now(),
            length: 0,
            owner: Arc::clone(&ctx.owner),
            info: OnceLock::new(),
        }
    }

    pub(crate) fn file(ctx: &Context, name: &str, length: usize) -> Self {
        Self {
            directory: false,
            length: length as u64,
            ..Self::directory(ctx, name)
        }
    }

    /// Directory describing a cluster object: its generation becomes the
    /// Qid version and its creation time the access and modify times.
    pub(crate) fn entity(ctx: &Context, object: &Object) -> Self {
        let meta = object.metadata();
        let mut dir = Self::directory(ctx, object.name());
        dir.version = meta.generation.unwrap_or_default() as u32;
        if let Some(created) = meta.creation_timestamp {
            dir.time = created;
        }
        dir
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn info(&self) -> Dir {
        self.info
            .get_or_init(|| {
                let (ty, mode) = if self.directory {
                    (QidType::DIRECTORY, DMDIR | PERMISSIONS)
                } else {
                    (QidType::FILE, PERMISSIONS)
                };
                let seconds = self.time.timestamp().clamp(0, i64::from(u32::MAX)) as u32;
                Dir {
                    qid: Qid::new(ty, self.version, rand::random()),
                    mode,
                    atime: seconds,
                    mtime: seconds,
                    length: self.length,
                    name: self.name.clone(),
                    uid: self.owner.to_string(),
                    gid: self.owner.to_string(),
                    muid: MUID.to_owned(),
                    ..Dir::default()
                }
            })
            .clone()
    }
}

/// A node of the file tree. Cloning shares the node and its memoized
/// description.
#[derive(Debug, Clone)]
pub enum Node {
    /// Directory with a fixed set of children.
    Dir(Arc<StaticDir>),
    /// Leaf file with fixed content.
    File(Arc<StaticFile>),
    /// `/namespaces`, listing the cached namespaces.
    Namespaces(Arc<NamespacesDir>),
    /// `/namespaces/<namespace>`.
    Namespace(Arc<NamespaceDir>),
    /// `/namespaces/<namespace>/deployments`, listing cached deployments.
    Deployments(Arc<DeploymentsDir>),
    /// `/namespaces/<namespace>/deployments/<deployment>`.
    Deployment(Arc<DeploymentDir>),
}

impl Node {
    /// Build the root of a fresh tree for one attach.
    #[must_use]
    pub fn root(ctx: &Context) -> Node {
        let namespaces = Node::Namespaces(Arc::new(NamespacesDir::new(ctx)));
        let cluster = Node::Dir(Arc::new(StaticDir::new(ctx, "cluster", Vec::new())));
        Node::Dir(Arc::new(StaticDir::new(ctx, "/", vec![namespaces, cluster])))
    }

    fn meta(&self) -> &Meta {
        match self {
            Node::Dir(dir) => dir.meta(),
            Node::File(file) => file.meta(),
            Node::Namespaces(dir) => dir.meta(),
            Node::Namespace(dir) => dir.meta(),
            Node::Deployments(dir) => dir.meta(),
            Node::Deployment(dir) => dir.meta(),
        }
    }

    /// Name of the node within its parent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.meta().name()
    }

    /// Describe the node. Idempotent: the first call fixes the result.
    #[must_use]
    pub fn info(&self) -> Dir {
        self.meta().info()
    }

    /// Qid from [`Node::info`].
    #[must_use]
    pub fn qid(&self) -> Qid {
        self.info().qid
    }

    /// Resolve one child by exact name.
    pub fn get(&self, name: &str) -> Result<Node, K9pError> {
        match self {
            Node::Dir(dir) => dir.get(name),
            Node::File(_) => Err(K9pError::NotADirectory),
            Node::Namespaces(dir) => dir.get(name),
            Node::Namespace(dir) => dir.get(name),
            Node::Deployments(dir) => dir.get(name),
            Node::Deployment(dir) => dir.get(name),
        }
    }

    /// Start reading the node from offset zero.
    pub(crate) fn reader(&self) -> Result<Reader, K9pError> {
        match self {
            Node::Dir(dir) => Ok(dir.reader()),
            Node::File(file) => Ok(file.reader()),
            Node::Namespaces(dir) => dir.reader(),
            Node::Namespace(dir) => Ok(dir.reader()),
            Node::Deployments(dir) => dir.reader(),
            Node::Deployment(dir) => Ok(dir.reader()),
        }
    }
}
