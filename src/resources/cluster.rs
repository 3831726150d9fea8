// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide the cache-backed namespace and deployment nodes of the file tree.
// Author: Lukas Bower

//! Nodes that consult the resource cache.
//!
//! Collections query the cache on every lookup and once per directory
//! stream. Entity nodes capture a snapshot of their object when built.

use std::sync::Arc;

use k9p_codec::Dir;

use super::{resolve, Context, Meta, Node, StaticDir, StaticFile};
use crate::cache::Object;
use crate::stream::{DirStream, Reader};
use crate::K9pError;

/// `/namespaces`.
#[derive(Debug)]
pub struct NamespacesDir {
    meta: Meta,
    ctx: Context,
}

impl NamespacesDir {
    pub(crate) fn new(ctx: &Context) -> Self {
        Self {
            meta: Meta::directory(ctx, "namespaces"),
            ctx: ctx.clone(),
        }
    }

    pub(crate) fn meta(&self) -> &Meta {
        &self.meta
    }

    pub(crate) fn get(&self, name: &str) -> Result<Node, K9pError> {
        let object = resolve(self.ctx.cache().get_namespace(name))?;
        Ok(Node::Namespace(Arc::new(NamespaceDir::new(&self.ctx, object))))
    }

    pub(crate) fn reader(&self) -> Result<Reader, K9pError> {
        let namespaces = self.ctx.cache().list_namespaces()?;
        let ctx = self.ctx.clone();
        Ok(Reader::Dir(DirStream::new(Box::new(
            namespaces
                .into_iter()
                .map(move |object| -> Result<Dir, K9pError> {
                    Ok(NamespaceDir::new(&ctx, object).meta.info())
                }),
        ))))
    }
}

/// `/namespaces/<namespace>`.
#[derive(Debug)]
pub struct NamespaceDir {
    meta: Meta,
    ctx: Context,
    object: Arc<Object>,
}

impl NamespaceDir {
    const DEPLOYMENTS: &'static str = "deployments";

    fn new(ctx: &Context, object: Arc<Object>) -> Self {
        Self {
            meta: Meta::entity(ctx, &object),
            ctx: ctx.clone(),
            object,
        }
    }

    /// Namespace snapshot the node was built from.
    #[must_use]
    pub fn object(&self) -> &Object {
        &self.object
    }

    pub(crate) fn meta(&self) -> &Meta {
        &self.meta
    }

    fn deployments(&self) -> DeploymentsDir {
        DeploymentsDir::new(&self.ctx, self.object.name())
    }

    pub(crate) fn get(&self, name: &str) -> Result<Node, K9pError> {
        if name == Self::DEPLOYMENTS {
            Ok(Node::Deployments(Arc::new(self.deployments())))
        } else {
            Err(K9pError::NotFound)
        }
    }

    pub(crate) fn reader(&self) -> Reader {
        Reader::Dir(DirStream::fixed(vec![self.deployments().meta.info()]))
    }
}

/// `/namespaces/<namespace>/deployments`.
#[derive(Debug)]
pub struct DeploymentsDir {
    meta: Meta,
    ctx: Context,
    namespace: String,
}

impl DeploymentsDir {
    fn new(ctx: &Context, namespace: &str) -> Self {
        Self {
            meta: Meta::directory(ctx, NamespaceDir::DEPLOYMENTS),
            ctx: ctx.clone(),
            namespace: namespace.to_owned(),
        }
    }

    pub(crate) fn meta(&self) -> &Meta {
        &self.meta
    }

    pub(crate) fn get(&self, name: &str) -> Result<Node, K9pError> {
        let object = resolve(self.ctx.cache().get_deployment(&self.namespace, name))?;
        let deployment = DeploymentDir::new(&self.ctx, object)?;
        Ok(Node::Deployment(Arc::new(deployment)))
    }

    pub(crate) fn reader(&self) -> Result<Reader, K9pError> {
        let deployments = self.ctx.cache().list_deployments(&self.namespace)?;
        let ctx = self.ctx.clone();
        Ok(Reader::Dir(DirStream::new(Box::new(
            deployments
                .into_iter()
                .map(move |object| -> Result<Dir, K9pError> {
                    Ok(DeploymentDir::new(&ctx, object)?.meta().info())
                }),
        ))))
    }
}

/// `/namespaces/<namespace>/deployments/<deployment>`.
///
/// `data.yaml` holds the object rendered as YAML and `scale` its desired
/// replica count, both fixed when the node is built.
#[derive(Debug)]
pub struct DeploymentDir {
    dir: StaticDir,
    object: Arc<Object>,
}

impl DeploymentDir {
    fn new(ctx: &Context, object: Arc<Object>) -> Result<Self, K9pError> {
        let data = StaticFile::new(ctx, "data.yaml", object.to_yaml()?.into_bytes());
        let scale = StaticFile::new(ctx, "scale", object.replicas().to_string().into_bytes());
        let dir = StaticDir::with_meta(
            Meta::entity(ctx, &object),
            vec![
                Node::File(Arc::new(data)),
                Node::File(Arc::new(scale)),
            ],
        );
        Ok(Self { dir, object })
    }

    /// Deployment snapshot the node was built from.
    #[must_use]
    pub fn object(&self) -> &Object {
        &self.object
    }

    pub(crate) fn meta(&self) -> &Meta {
        self.dir.meta()
    }

    pub(crate) fn get(&self, name: &str) -> Result<Node, K9pError> {
        self.dir.get(name)
    }

    pub(crate) fn reader(&self) -> Reader {
        self.dir.reader()
    }
}
