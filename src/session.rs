// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Implement the per-connection 9P session over the resource tree.
// Author: Lukas Bower

//! Per-connection session: the fid table plus the operations that walk and
//! read the resource tree.

use std::fmt;
use std::sync::{Arc, Mutex};

use k9p_codec::{Dir, OpenMode, Qid, DEFAULT_MSIZE, VERSION};
use log::{debug, info};

use crate::cache::ResourceCache;
use crate::fid::FidTable;
use crate::resources::{Context, Node};
use crate::service::Service;
use crate::shutdown::Shutdown;
use crate::stream::Reader;
use crate::K9pError;

/// Node bound to a fid, with its read cursor created on first read.
#[derive(Debug)]
struct Binding {
    node: Node,
    reader: Mutex<Option<Reader>>,
}

impl Binding {
    fn new(node: Node) -> Self {
        Self {
            node,
            reader: Mutex::new(None),
        }
    }
}

/// Identity and tree selector recorded by the latest attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// User name supplied by the client.
    pub uname: String,
    /// Requested tree root, `/` when the client sent none.
    pub aname: String,
}

/// 9P session state for one client connection.
pub struct Session {
    cache: Arc<dyn ResourceCache>,
    fids: FidTable<Binding>,
    attachment: Mutex<Option<Attachment>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("fids", &self.fids.len())
            .field("attachment", &self.attachment())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session reading from `cache`.
    #[must_use]
    pub fn new(cache: Arc<dyn ResourceCache>) -> Self {
        Self {
            cache,
            fids: FidTable::new(),
            attachment: Mutex::new(None),
        }
    }

    /// Block until the cache holds its initial view of the cluster, or
    /// `shutdown` fires. Returns true when the session may serve.
    pub async fn wait_for_cache_sync(&self, shutdown: &Shutdown) -> bool {
        let signal = self.cache.sync_signal();
        if !signal.is_synced() {
            debug!("[k9p][session] waiting for cache sync");
        }
        signal.wait(shutdown).await
    }

    /// Identity recorded by the latest successful attach.
    #[must_use]
    pub fn attachment(&self) -> Option<Attachment> {
        self.attachment
            .lock()
            .expect("poisoned session lock")
            .clone()
    }

    /// Number of bound fids.
    #[must_use]
    pub fn fid_count(&self) -> usize {
        self.fids.len()
    }

    /// Return whether `fid` is bound.
    #[must_use]
    pub fn is_bound(&self, fid: u32) -> bool {
        self.fids.contains(fid)
    }
}

impl Service for Session {
    fn version(&self) -> (u32, String) {
        (DEFAULT_MSIZE, VERSION.to_owned())
    }

    fn auth(&self, _afid: u32, _uname: &str, _aname: &str) -> Result<Qid, K9pError> {
        Ok(Qid::ZERO)
    }

    fn attach(&self, fid: u32, _afid: u32, uname: &str, aname: &str) -> Result<Qid, K9pError> {
        if uname.is_empty() {
            return Err(K9pError::InvalidIdentity);
        }
        let aname = if aname.is_empty() { "/" } else { aname };
        let ctx = Context::new(Arc::clone(&self.cache), uname);
        let root = Node::root(&ctx);
        let qid = root.qid();
        self.fids.insert(fid, Binding::new(root))?;
        info!("[k9p][session] attach fid={fid} uname={uname} aname={aname}");
        *self.attachment.lock().expect("poisoned session lock") = Some(Attachment {
            uname: uname.to_owned(),
            aname: aname.to_owned(),
        });
        Ok(qid)
    }

    fn walk(&self, fid: u32, newfid: u32, names: &[String]) -> Result<Vec<Qid>, K9pError> {
        let start = self.fids.get(fid)?;
        if names.is_empty() {
            self.fids.insert(newfid, Binding::new(start.node.clone()))?;
            return Ok(Vec::new());
        }
        let mut node = start.node.clone();
        let mut qids = Vec::with_capacity(names.len());
        for name in names {
            match node.get(name) {
                Ok(child) => {
                    qids.push(child.qid());
                    node = child;
                }
                Err(err) => {
                    debug!("[k9p][session] walk stopped at {name:?}: {err}");
                    break;
                }
            }
        }
        if qids.len() == names.len() {
            self.fids.insert(newfid, Binding::new(node))?;
        }
        Ok(qids)
    }

    fn open(&self, fid: u32, _mode: OpenMode) -> Result<(Qid, u32), K9pError> {
        let binding = self.fids.get(fid)?;
        Ok((binding.node.qid(), 0))
    }

    fn read(&self, fid: u32, offset: u64, count: u32) -> Result<Vec<u8>, K9pError> {
        let binding = self.fids.get(fid)?;
        let mut reader = binding.reader.lock().expect("poisoned binding lock");
        let reader = match &mut *reader {
            Some(reader) => reader,
            empty => empty.insert(binding.node.reader()?),
        };
        reader.read(offset, count)
    }

    fn write(&self, _fid: u32, _offset: u64, _data: &[u8]) -> Result<u32, K9pError> {
        Err(K9pError::NotSupported)
    }

    fn create(
        &self,
        _fid: u32,
        _name: &str,
        _perm: u32,
        _mode: OpenMode,
    ) -> Result<(Qid, u32), K9pError> {
        Err(K9pError::NotSupported)
    }

    fn remove(&self, _fid: u32) -> Result<(), K9pError> {
        Err(K9pError::NotSupported)
    }

    fn stat(&self, fid: u32) -> Result<Dir, K9pError> {
        Ok(self.fids.get(fid)?.node.info())
    }

    fn wstat(&self, _fid: u32, _dir: &Dir) -> Result<(), K9pError> {
        Err(K9pError::NotSupported)
    }

    fn clunk(&self, fid: u32) -> Result<(), K9pError> {
        self.fids.remove(fid).map(drop)
    }
}
