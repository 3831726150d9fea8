// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define the 9P operation set and a request-tracing decorator.
// Author: Lukas Bower

//! The 9P2000 operation set as seen by the transport, and [`Traced`], a
//! decorator that logs every call with its arguments, result and latency.

use std::fmt;
use std::time::Instant;

use k9p_codec::{Dir, OpenMode, Qid};
use log::{debug, log_enabled, Level};

use crate::K9pError;

/// 9P2000 operations served for one connection.
pub trait Service: Send + Sync {
    /// Maximum message size and protocol version offered to clients.
    fn version(&self) -> (u32, String);

    /// Establish an authentication fid.
    fn auth(&self, afid: u32, uname: &str, aname: &str) -> Result<Qid, K9pError>;

    /// Bind `fid` to the tree root on behalf of `uname`.
    fn attach(&self, fid: u32, afid: u32, uname: &str, aname: &str) -> Result<Qid, K9pError>;

    /// Resolve `names` from `fid`, binding `newfid` when every name resolves.
    fn walk(&self, fid: u32, newfid: u32, names: &[String]) -> Result<Vec<Qid>, K9pError>;

    /// Prepare `fid` for I/O, returning its Qid and I/O unit.
    fn open(&self, fid: u32, mode: OpenMode) -> Result<(Qid, u32), K9pError>;

    /// Read up to `count` bytes at `offset`.
    fn read(&self, fid: u32, offset: u64, count: u32) -> Result<Vec<u8>, K9pError>;

    /// Write `data` at `offset`.
    fn write(&self, fid: u32, offset: u64, data: &[u8]) -> Result<u32, K9pError>;

    /// Create `name` in the directory bound to `fid`.
    fn create(&self, fid: u32, name: &str, perm: u32, mode: OpenMode)
        -> Result<(Qid, u32), K9pError>;

    /// Remove the file bound to `fid`.
    fn remove(&self, fid: u32) -> Result<(), K9pError>;

    /// Describe the node bound to `fid`.
    fn stat(&self, fid: u32) -> Result<Dir, K9pError>;

    /// Rewrite the description of the node bound to `fid`.
    fn wstat(&self, fid: u32, dir: &Dir) -> Result<(), K9pError>;

    /// Release `fid`.
    fn clunk(&self, fid: u32) -> Result<(), K9pError>;
}

/// Decorator logging each operation at debug level.
#[derive(Debug)]
pub struct Traced<S> {
    inner: S,
    label: String,
}

impl<S: Service> Traced<S> {
    /// Wrap `inner`, prefixing log lines with `label` (usually the peer address).
    pub fn new(inner: S, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
        }
    }

    /// Borrow the wrapped service.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn record<T: fmt::Debug>(
        &self,
        op: &str,
        args: fmt::Arguments<'_>,
        started: Instant,
        result: &Result<T, K9pError>,
    ) {
        if !log_enabled!(Level::Debug) {
            return;
        }
        let elapsed = started.elapsed();
        match result {
            Ok(value) => debug!(
                "[k9p][{}] {op} {args} -> {value:?} ({elapsed:?})",
                self.label
            ),
            Err(err) => debug!(
                "[k9p][{}] {op} {args} -> error: {err} ({elapsed:?})",
                self.label
            ),
        }
    }
}

impl<S: Service> Service for Traced<S> {
    fn version(&self) -> (u32, String) {
        let started = Instant::now();
        let result = self.inner.version();
        self.record::<(u32, String)>("version", format_args!(""), started, &Ok(result.clone()));
        result
    }

    fn auth(&self, afid: u32, uname: &str, aname: &str) -> Result<Qid, K9pError> {
        let started = Instant::now();
        let result = self.inner.auth(afid, uname, aname);
        self.record(
            "auth",
            format_args!("afid={afid} uname={uname:?} aname={aname:?}"),
            started,
            &result,
        );
        result
    }

    fn attach(&self, fid: u32, afid: u32, uname: &str, aname: &str) -> Result<Qid, K9pError> {
        let started = Instant::now();
        let result = self.inner.attach(fid, afid, uname, aname);
        self.record(
            "attach",
            format_args!("fid={fid} afid={afid} uname={uname:?} aname={aname:?}"),
            started,
            &result,
        );
        result
    }

    fn walk(&self, fid: u32, newfid: u32, names: &[String]) -> Result<Vec<Qid>, K9pError> {
        let started = Instant::now();
        let result = self.inner.walk(fid, newfid, names);
        self.record(
            "walk",
            format_args!("fid={fid} newfid={newfid} names={names:?}"),
            started,
            &result,
        );
        result
    }

    fn open(&self, fid: u32, mode: OpenMode) -> Result<(Qid, u32), K9pError> {
        let started = Instant::now();
        let result = self.inner.open(fid, mode);
        self.record(
            "open",
            format_args!("fid={fid} mode={:#x}", mode.raw()),
            started,
            &result,
        );
        result
    }

    fn read(&self, fid: u32, offset: u64, count: u32) -> Result<Vec<u8>, K9pError> {
        let started = Instant::now();
        let result = self.inner.read(fid, offset, count);
        self.record(
            "read",
            format_args!("fid={fid} offset={offset} count={count}"),
            started,
            &result.as_ref().map(Vec::len).map_err(Clone::clone),
        );
        result
    }

    fn write(&self, fid: u32, offset: u64, data: &[u8]) -> Result<u32, K9pError> {
        let started = Instant::now();
        let result = self.inner.write(fid, offset, data);
        self.record(
            "write",
            format_args!("fid={fid} offset={offset} len={}", data.len()),
            started,
            &result,
        );
        result
    }

    fn create(
        &self,
        fid: u32,
        name: &str,
        perm: u32,
        mode: OpenMode,
    ) -> Result<(Qid, u32), K9pError> {
        let started = Instant::now();
        let result = self.inner.create(fid, name, perm, mode);
        self.record(
            "create",
            format_args!("fid={fid} name={name:?} perm={perm:#o}"),
            started,
            &result,
        );
        result
    }

    fn remove(&self, fid: u32) -> Result<(), K9pError> {
        let started = Instant::now();
        let result = self.inner.remove(fid);
        self.record("remove", format_args!("fid={fid}"), started, &result);
        result
    }

    fn stat(&self, fid: u32) -> Result<Dir, K9pError> {
        let started = Instant::now();
        let result = self.inner.stat(fid);
        self.record("stat", format_args!("fid={fid}"), started, &result);
        result
    }

    fn wstat(&self, fid: u32, dir: &Dir) -> Result<(), K9pError> {
        let started = Instant::now();
        let result = self.inner.wstat(fid, dir);
        self.record(
            "wstat",
            format_args!("fid={fid} name={:?}", dir.name),
            started,
            &result,
        );
        result
    }

    fn clunk(&self, fid: u32) -> Result<(), K9pError> {
        let started = Instant::now();
        let result = self.inner.clunk(fid);
        self.record("clunk", format_args!("fid={fid}"), started, &result);
        result
    }
}
