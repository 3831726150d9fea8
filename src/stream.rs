// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Implement sequential read cursors for leaf files and directory streams.
// Author: Lukas Bower

//! Read cursors attached to a fid binding.
//!
//! Both cursors only accept the offset at which the previous read ended.
//! Directory reads pack whole stat records and hold back the first record
//! that does not fit for the next call.

use std::fmt;
use std::sync::Arc;

use k9p_codec::{encode_dir, Dir};

use crate::{CacheError, K9pError};

/// Lazily produced directory entries.
pub(crate) type Entries = Box<dyn Iterator<Item = Result<Dir, K9pError>> + Send>;

/// Cursor state kept per binding between reads.
#[derive(Debug)]
pub(crate) enum Reader {
    /// Byte cursor over a leaf file.
    File(FileCursor),
    /// Entry stream over a directory.
    Dir(DirStream),
}

impl Reader {
    pub(crate) fn read(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, K9pError> {
        match self {
            Reader::File(cursor) => cursor.read(offset, count),
            Reader::Dir(stream) => stream.read(offset, count),
        }
    }
}

/// Sequential cursor over an immutable byte buffer.
#[derive(Debug)]
pub(crate) struct FileCursor {
    content: Arc<[u8]>,
    offset: u64,
}

impl FileCursor {
    pub(crate) fn new(content: Arc<[u8]>) -> Self {
        Self { content, offset: 0 }
    }

    fn read(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, K9pError> {
        if offset != self.offset {
            return Err(K9pError::BadOffset);
        }
        let start = usize::try_from(offset).map_err(|_| K9pError::BadOffset)?;
        let rest = self.content.get(start..).unwrap_or_default();
        let take = rest.len().min(count as usize);
        self.offset += take as u64;
        Ok(rest[..take].to_vec())
    }
}

/// Resumable stream of encoded directory entries.
pub(crate) struct DirStream {
    entries: Entries,
    held: Option<Vec<u8>>,
    failed: Option<K9pError>,
    offset: u64,
}

impl fmt::Debug for DirStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirStream")
            .field("offset", &self.offset)
            .field("held", &self.held.as_ref().map(Vec::len))
            .finish_non_exhaustive()
    }
}

impl DirStream {
    pub(crate) fn new(entries: Entries) -> Self {
        Self {
            entries,
            held: None,
            failed: None,
            offset: 0,
        }
    }

    /// Stream over an already materialized entry list.
    pub(crate) fn fixed(entries: Vec<Dir>) -> Self {
        Self::new(Box::new(entries.into_iter().map(Ok)))
    }

    fn next_record(&mut self) -> Result<Option<Vec<u8>>, K9pError> {
        if let Some(record) = self.held.take() {
            return Ok(Some(record));
        }
        match self.entries.next() {
            None => Ok(None),
            Some(entry) => {
                let entry = entry?;
                let mut record = Vec::new();
                encode_dir(&mut record, &entry).map_err(|err| {
                    CacheError::Malformed(format!("stat for {}: {err}", entry.name))
                })?;
                Ok(Some(record))
            }
        }
    }

    fn read(&mut self, offset: u64, count: u32) -> Result<Vec<u8>, K9pError> {
        if offset != self.offset {
            return Err(K9pError::BadOffset);
        }
        if let Some(err) = self.failed.take() {
            return Err(err);
        }
        let limit = count as usize;
        let mut out = Vec::new();
        loop {
            let record = match self.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => break,
                // Hand back what was packed; the error surfaces on the next read.
                Err(err) if !out.is_empty() => {
                    self.failed = Some(err);
                    break;
                }
                Err(err) => return Err(err),
            };
            if out.len() + record.len() > limit {
                self.held = Some(record);
                break;
            }
            out.extend_from_slice(&record);
        }
        self.offset += out.len() as u64;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9p_codec::DirEntries;

    fn entry(name: &str) -> Dir {
        Dir {
            name: name.to_owned(),
            uid: "alice".to_owned(),
            gid: "alice".to_owned(),
            muid: "none".to_owned(),
            ..Dir::default()
        }
    }

    fn names(buf: &[u8]) -> Vec<String> {
        DirEntries::new(buf)
            .map(|dir| dir.expect("decode entry").name)
            .collect()
    }

    #[test]
    fn file_reads_are_strictly_sequential() {
        let mut cursor = FileCursor::new(Arc::from(&b"hello"[..]));
        assert_eq!(cursor.read(0, 3).expect("first read"), b"hel");
        assert_eq!(cursor.read(0, 3), Err(K9pError::BadOffset));
        assert_eq!(cursor.read(3, 16).expect("second read"), b"lo");
        assert_eq!(cursor.read(5, 16).expect("eof read"), b"");
        assert_eq!(cursor.read(4, 1), Err(K9pError::BadOffset));
    }

    #[test]
    fn directory_reads_pack_whole_records() {
        let record = entry("aa").encoded_len();
        let mut stream = DirStream::fixed(vec![entry("aa"), entry("bb"), entry("cc")]);
        let first = stream
            .read(0, (record * 2 - 1) as u32)
            .expect("first page");
        assert_eq!(names(&first), ["aa"]);
        let second = stream
            .read(first.len() as u64, (record * 2) as u32)
            .expect("second page");
        assert_eq!(names(&second), ["bb", "cc"]);
        let offset = (first.len() + second.len()) as u64;
        assert!(stream.read(offset, 4096).expect("end of stream").is_empty());
    }

    #[test]
    fn oversized_record_is_held_not_split() {
        let mut stream = DirStream::fixed(vec![entry("deployments")]);
        assert!(stream.read(0, 8).expect("tiny read").is_empty());
        let page = stream.read(0, 4096).expect("retry with room");
        assert_eq!(names(&page), ["deployments"]);
    }

    #[test]
    fn directory_offset_must_continue_the_stream() {
        let mut stream = DirStream::fixed(vec![entry("aa"), entry("bb")]);
        let first = stream.read(0, entry("aa").encoded_len() as u32).expect("page");
        assert_eq!(stream.read(0, 4096), Err(K9pError::BadOffset));
        assert_eq!(stream.read(first.len() as u64 + 1, 4096), Err(K9pError::BadOffset));
    }

    #[test]
    fn mid_stream_errors_surface_after_packed_entries() {
        let entries: Entries = Box::new(
            vec![Ok(entry("aa")), Err(K9pError::NotFound), Ok(entry("bb"))].into_iter(),
        );
        let mut stream = DirStream::new(entries);
        let first = stream.read(0, 4096).expect("entries before the error");
        assert_eq!(names(&first), ["aa"]);
        assert_eq!(stream.read(first.len() as u64, 4096), Err(K9pError::NotFound));
        let rest = stream.read(first.len() as u64, 4096).expect("stream resumes");
        assert_eq!(names(&rest), ["bb"]);
    }
}
