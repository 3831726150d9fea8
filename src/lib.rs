// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Expose the k9p session core, resource tree, cluster cache and 9P transport.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! k9p serves a Kubernetes cluster's namespaces and deployments as a
//! read-only 9P2000 file tree.
//!
//! The [`session::Session`] state machine binds client fids to nodes of a
//! lazily resolved [`resources::Node`] tree backed by a process-wide
//! [`cache::ResourceCache`]. The [`cluster`] module keeps that cache fresh
//! through list+watch against the API server and [`server`] carries 9P
//! frames between TCP clients and sessions.

use thiserror::Error;

pub mod cache;
pub mod cluster;
mod fid;
pub mod logging;
pub mod resources;
pub mod server;
pub mod service;
pub mod session;
pub mod shutdown;
mod stream;

pub use cache::{CacheError, Kind, Object, ResourceCache, Store, SyncSignal};
pub use service::{Service, Traced};
pub use session::Session;
pub use shutdown::Shutdown;

/// Errors surfaced to 9P clients by session operations.
///
/// The display strings are the `Rerror` messages sent on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum K9pError {
    /// The fid is not bound in this session, or is `NOFID`.
    #[error("unknown fid")]
    UnknownFid,
    /// The fid is already bound in this session.
    #[error("duplicate fid")]
    DuplicateFid,
    /// A named child does not exist.
    #[error("file not found")]
    NotFound,
    /// A child was requested from a leaf file.
    #[error("walk in non-directory")]
    NotADirectory,
    /// A read offset does not continue the previous read.
    #[error("bad offset")]
    BadOffset,
    /// The operation would mutate the tree.
    #[error("operation not supported")]
    NotSupported,
    /// Attach supplied an empty user name.
    #[error("no user")]
    InvalidIdentity,
    /// The resource cache failed for a reason other than a missing key.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
