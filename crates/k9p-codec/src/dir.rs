// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode 9P2000 stat records and directory read payloads.
// Author: Lukas Bower

//! Stat (directory entry) encoding shared by `Rstat` and directory reads.
//!
//! A directory read returns a concatenation of stat records, each prefixed
//! by its own `size[2]`, so the same encoder serves both paths.

use alloc::vec::Vec;

use crate::codec::{put_qid, put_string, Cursor};
use crate::types::{CodecError, Dir};

/// Fixed bytes of a stat record excluding the string bodies:
/// size[2] type[2] dev[4] qid[13] mode[4] atime[4] mtime[4] length[8] and four len[2].
const FIXED_LEN: usize = 2 + 2 + 4 + 13 + 4 + 4 + 4 + 8 + 4 * 2;

impl Dir {
    /// Number of bytes the record occupies on the wire, size prefix included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FIXED_LEN + self.name.len() + self.uid.len() + self.gid.len() + self.muid.len()
    }
}

/// Append the wire form of `dir` to `buffer`.
pub fn encode_dir(buffer: &mut Vec<u8>, dir: &Dir) -> Result<(), CodecError> {
    let size: u16 = (dir.encoded_len() - 2)
        .try_into()
        .map_err(|_| CodecError::StringTooLong(dir.encoded_len()))?;
    buffer.reserve(dir.encoded_len());
    buffer.extend_from_slice(&size.to_le_bytes());
    buffer.extend_from_slice(&dir.ty.to_le_bytes());
    buffer.extend_from_slice(&dir.dev.to_le_bytes());
    put_qid(buffer, &dir.qid);
    buffer.extend_from_slice(&dir.mode.to_le_bytes());
    buffer.extend_from_slice(&dir.atime.to_le_bytes());
    buffer.extend_from_slice(&dir.mtime.to_le_bytes());
    buffer.extend_from_slice(&dir.length.to_le_bytes());
    put_string(buffer, &dir.name)?;
    put_string(buffer, &dir.uid)?;
    put_string(buffer, &dir.gid)?;
    put_string(buffer, &dir.muid)?;
    Ok(())
}

/// Decode a single stat record from the front of `bytes`, returning the
/// entry and the number of bytes consumed.
pub fn decode_dir(bytes: &[u8]) -> Result<(Dir, usize), CodecError> {
    let mut cursor = Cursor::new(bytes);
    let size = cursor.read_u16()? as usize;
    let body = cursor.take(size)?;
    let mut inner = Cursor::new(body);
    let dir = Dir {
        ty: inner.read_u16()?,
        dev: inner.read_u32()?,
        qid: inner.read_qid()?,
        mode: inner.read_u32()?,
        atime: inner.read_u32()?,
        mtime: inner.read_u32()?,
        length: inner.read_u64()?,
        name: inner.read_string()?,
        uid: inner.read_string()?,
        gid: inner.read_string()?,
        muid: inner.read_string()?,
    };
    if inner.position() != size {
        return Err(CodecError::LengthMismatch {
            declared: size as u32,
            actual: inner.position(),
        });
    }
    Ok((dir, cursor.position()))
}

/// Iterator over the stat records packed into a directory read payload.
#[derive(Debug, Clone)]
pub struct DirEntries<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> DirEntries<'a> {
    /// Iterate over the records in `buffer`.
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }
}

impl Iterator for DirEntries<'_> {
    type Item = Result<Dir, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.buffer.get(self.offset..)?;
        if rest.is_empty() {
            return None;
        }
        match decode_dir(rest) {
            Ok((dir, consumed)) => {
                self.offset += consumed;
                Some(Ok(dir))
            }
            Err(err) => {
                self.offset = self.buffer.len();
                Some(Err(err))
            }
        }
    }
}
