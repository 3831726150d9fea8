// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Track fid bindings for a single 9P session.
// Author: Lukas Bower

//! Per-session fid table.
//!
//! Entries are handed out as `Arc`s so callers can drop the table lock
//! before touching the bound node or its read cursor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use k9p_codec::NOFID;

use crate::K9pError;

/// Map from client-chosen fid to a bound value.
#[derive(Debug)]
pub(crate) struct FidTable<T> {
    entries: Mutex<HashMap<u32, Arc<T>>>,
}

impl<T> FidTable<T> {
    /// Create an empty fid table.
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return true if the fid is bound.
    pub(crate) fn contains(&self, fid: u32) -> bool {
        self.entries
            .lock()
            .expect("poisoned fid table lock")
            .contains_key(&fid)
    }

    /// Bind a fid. Fails if the fid is `NOFID` or already bound.
    pub(crate) fn insert(&self, fid: u32, value: T) -> Result<Arc<T>, K9pError> {
        if fid == NOFID {
            return Err(K9pError::UnknownFid);
        }
        let mut entries = self.entries.lock().expect("poisoned fid table lock");
        if entries.contains_key(&fid) {
            return Err(K9pError::DuplicateFid);
        }
        let value = Arc::new(value);
        entries.insert(fid, Arc::clone(&value));
        Ok(value)
    }

    /// Look up a bound fid.
    pub(crate) fn get(&self, fid: u32) -> Result<Arc<T>, K9pError> {
        if fid == NOFID {
            return Err(K9pError::UnknownFid);
        }
        self.entries
            .lock()
            .expect("poisoned fid table lock")
            .get(&fid)
            .cloned()
            .ok_or(K9pError::UnknownFid)
    }

    /// Unbind a fid, returning its value.
    pub(crate) fn remove(&self, fid: u32) -> Result<Arc<T>, K9pError> {
        if fid == NOFID {
            return Err(K9pError::UnknownFid);
        }
        self.entries
            .lock()
            .expect("poisoned fid table lock")
            .remove(&fid)
            .ok_or(K9pError::UnknownFid)
    }

    /// Number of bound fids.
    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("poisoned fid table lock").len()
    }
}

impl<T> Default for FidTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
