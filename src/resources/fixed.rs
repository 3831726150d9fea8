// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide static directories and fixed-content files for the file tree.
// Author: Lukas Bower

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Context, Meta, Node};
use crate::stream::{DirStream, FileCursor, Reader};
use crate::K9pError;

/// Directory whose children are fixed when it is built.
#[derive(Debug)]
pub struct StaticDir {
    meta: Meta,
    children: BTreeMap<String, Node>,
}

impl StaticDir {
    /// Build a directory named `name` holding `children`.
    #[must_use]
    pub fn new(ctx: &Context, name: &str, children: Vec<Node>) -> Self {
        Self::with_meta(Meta::directory(ctx, name), children)
    }

    pub(crate) fn with_meta(meta: Meta, children: Vec<Node>) -> Self {
        let children = children
            .into_iter()
            .map(|child| (child.name().to_owned(), child))
            .collect();
        Self { meta, children }
    }

    pub(crate) fn meta(&self) -> &Meta {
        &self.meta
    }

    pub(crate) fn get(&self, name: &str) -> Result<Node, K9pError> {
        self.children.get(name).cloned().ok_or(K9pError::NotFound)
    }

    pub(crate) fn reader(&self) -> Reader {
        Reader::Dir(DirStream::fixed(
            self.children.values().map(Node::info).collect(),
        ))
    }
}

/// Leaf file whose bytes are captured when it is built.
#[derive(Debug)]
pub struct StaticFile {
    meta: Meta,
    content: Arc<[u8]>,
}

impl StaticFile {
    /// Build a file named `name` holding `content`.
    #[must_use]
    pub fn new(ctx: &Context, name: &str, content: impl Into<Arc<[u8]>>) -> Self {
        let content = content.into();
        Self {
            meta: Meta::file(ctx, name, content.len()),
            content,
        }
    }

    pub(crate) fn meta(&self) -> &Meta {
        &self.meta
    }

    /// File content.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub(crate) fn reader(&self) -> Reader {
        Reader::File(FileCursor::new(Arc::clone(&self.content)))
    }
}
