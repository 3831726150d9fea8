// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define 9P2000 wire types and constants shared across components.
// Author: Lukas Bower
#![allow(clippy::module_name_repetitions)]

//! 9P2000 data model definitions shared by the codec and the server.

use alloc::string::String;
use alloc::vec::Vec;

/// Default maximum message size offered by the server.
pub const DEFAULT_MSIZE: u32 = 65536;

/// Protocol version string.
pub const VERSION: &str = "9P2000";

/// Version string returned when the client's version is not understood.
pub const VERSION_UNKNOWN: &str = "unknown";

/// Reserved fid meaning "no fid".
pub const NOFID: u32 = u32::MAX;

/// Reserved tag used by `Tversion`.
pub const NOTAG: u16 = u16::MAX;

/// Maximum number of path elements carried by a single walk.
pub const MAXWELEM: usize = 16;

/// Directory bit in the stat `mode` field.
pub const DMDIR: u32 = 0x8000_0000;

/// Bytes occupied by the frame header (`size[4] type[1]`).
pub const HEADER_LEN: usize = 5;

/// Bytes of an `Rread` frame that precede the data payload
/// (`size[4] type[1] tag[2] count[4]`).
pub const RREAD_OVERHEAD: u32 = 11;

/// Possible errors produced while encoding or decoding 9P2000 messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input buffer was shorter than the declared frame length.
    #[error("truncated frame")]
    Truncated,
    /// Encountered an unknown message type.
    #[error("unsupported message type {0}")]
    Unsupported(u8),
    /// Encountered malformed UTF-8 data.
    #[error("invalid utf8 in string field")]
    InvalidUtf8,
    /// Declared message size does not match the actual payload length.
    #[error("length mismatch: declared {declared} actual {actual}")]
    LengthMismatch {
        /// Message length declared in the frame header.
        declared: u32,
        /// Actual byte length observed in the payload.
        actual: usize,
    },
    /// Frame exceeds the negotiated maximum message size.
    #[error("frame of {declared} bytes exceeds msize {max}")]
    FrameTooLarge {
        /// Declared frame length.
        declared: u32,
        /// Maximum permitted frame length.
        max: u32,
    },
    /// A string field does not fit the 16-bit length prefix.
    #[error("string of {0} bytes exceeds protocol limit")]
    StringTooLong(usize),
    /// Detected an invalid path component or walk depth beyond the limit.
    #[error("invalid path component")]
    InvalidPath,
}

/// Qid type bitflags per the 9P2000 specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct QidType(u8);

impl QidType {
    /// Directory bit.
    pub const DIRECTORY: Self = Self(0x80);
    /// Append-only bit.
    pub const APPEND_ONLY: Self = Self(0x40);
    /// Exclusive-use bit.
    pub const EXCLUSIVE: Self = Self(0x20);
    /// Authentication file bit.
    pub const AUTH: Self = Self(0x08);
    /// Regular file.
    pub const FILE: Self = Self(0x00);

    fn as_u8(self) -> u8 {
        self.0
    }

    pub(crate) fn from_raw(value: u8) -> Self {
        Self(value)
    }

    /// Check whether the Qid represents a directory.
    #[must_use]
    pub fn is_directory(self) -> bool {
        self.0 & Self::DIRECTORY.0 != 0
    }

    /// Check whether the Qid represents an append-only node.
    #[must_use]
    pub fn is_append_only(self) -> bool {
        self.0 & Self::APPEND_ONLY.0 != 0
    }
}

impl From<QidType> for u8 {
    fn from(value: QidType) -> Self {
        value.as_u8()
    }
}

/// 9P Qid descriptor: the server's unique identity for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Qid {
    ty: QidType,
    version: u32,
    path: u64,
}

impl Qid {
    /// Qid with every field zeroed, returned by no-op authentication.
    pub const ZERO: Qid = Qid {
        ty: QidType::FILE,
        version: 0,
        path: 0,
    };

    /// Construct a new Qid.
    #[must_use]
    pub fn new(ty: QidType, version: u32, path: u64) -> Self {
        Self { ty, version, path }
    }

    /// Return the Qid type flags.
    #[must_use]
    pub fn ty(&self) -> QidType {
        self.ty
    }

    /// Return the Qid version field.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Return the Qid path field.
    #[must_use]
    pub fn path(&self) -> u64 {
        self.path
    }
}

/// Base open mode encoded in the low bits of the open mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpenModeBase {
    /// Open for reading.
    ReadOnly = 0,
    /// Open for writing.
    WriteOnly = 1,
    /// Open for reading and writing.
    ReadWrite = 2,
    /// Execute traversal.
    Execute = 3,
}

/// 9P open mode flags as a structured representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    base: OpenModeBase,
    truncate: bool,
    remove_on_close: bool,
}

impl OpenMode {
    const OTRUNC: u8 = 0x10;
    const ORCLOSE: u8 = 0x40;

    /// Construct a read-only mode descriptor.
    #[must_use]
    pub fn read_only() -> Self {
        Self {
            base: OpenModeBase::ReadOnly,
            truncate: false,
            remove_on_close: false,
        }
    }

    /// Construct a truncating write-only descriptor.
    #[must_use]
    pub fn write_truncate() -> Self {
        Self {
            base: OpenModeBase::WriteOnly,
            truncate: true,
            remove_on_close: false,
        }
    }

    /// Decode wire flags. Bits outside the access mode, `OTRUNC` and
    /// `ORCLOSE` are dropped.
    #[must_use]
    pub fn from_bits_truncate(value: u8) -> Self {
        let base = match value & 0x03 {
            0 => OpenModeBase::ReadOnly,
            1 => OpenModeBase::WriteOnly,
            2 => OpenModeBase::ReadWrite,
            _ => OpenModeBase::Execute,
        };
        Self {
            base,
            truncate: value & Self::OTRUNC != 0,
            remove_on_close: value & Self::ORCLOSE != 0,
        }
    }

    /// Return the base access mode.
    #[must_use]
    pub fn base(self) -> OpenModeBase {
        self.base
    }

    /// Determine if the mode permits reading.
    #[must_use]
    pub fn allows_read(self) -> bool {
        matches!(
            self.base,
            OpenModeBase::ReadOnly | OpenModeBase::ReadWrite | OpenModeBase::Execute
        )
    }

    /// Determine if the mode permits writing.
    #[must_use]
    pub fn allows_write(self) -> bool {
        matches!(self.base, OpenModeBase::WriteOnly | OpenModeBase::ReadWrite)
    }

    /// Expose the raw flag representation used on the wire.
    #[must_use]
    pub fn raw(self) -> u8 {
        let mut bits = self.base as u8;
        if self.truncate {
            bits |= Self::OTRUNC;
        }
        if self.remove_on_close {
            bits |= Self::ORCLOSE;
        }
        bits
    }
}

impl From<OpenMode> for u8 {
    fn from(value: OpenMode) -> Self {
        value.raw()
    }
}

/// Machine-independent directory entry, the payload of `Rstat`, `Twstat`
/// and directory reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Dir {
    /// Server type (kernel use).
    pub ty: u16,
    /// Server subtype (kernel use).
    pub dev: u32,
    /// Unique identity of the file.
    pub qid: Qid,
    /// Permission bits, with [`DMDIR`] set on directories.
    pub mode: u32,
    /// Last access time, seconds since the epoch.
    pub atime: u32,
    /// Last modification time, seconds since the epoch.
    pub mtime: u32,
    /// Length of the file in bytes.
    pub length: u64,
    /// Last path element.
    pub name: String,
    /// Owner name.
    pub uid: String,
    /// Group name.
    pub gid: String,
    /// Name of the user who last modified the file.
    pub muid: String,
}

impl Dir {
    /// Return whether the entry describes a directory.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.mode & DMDIR != 0
    }
}

/// Request envelope containing a tag and message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request identifier, echoed back by responses.
    pub tag: u16,
    /// The concrete request payload.
    pub body: RequestBody,
}

/// Response envelope containing a tag and message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response identifier (mirrors the request tag).
    pub tag: u16,
    /// The concrete response payload.
    pub body: ResponseBody,
}

/// 9P2000 T-messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// `Tversion` negotiates the message size and version string.
    Version {
        /// Requested maximum message size.
        msize: u32,
        /// Protocol version string supplied by the client.
        version: String,
    },
    /// `Tauth` requests an authentication fid.
    Auth {
        /// Fid to bind to the authentication file.
        afid: u32,
        /// User name string provided by the client.
        uname: String,
        /// Attachment name supplied by the client.
        aname: String,
    },
    /// `Tattach` binds a fid to the tree root.
    Attach {
        /// Fid identifier associated with the tree root.
        fid: u32,
        /// Authentication fid, [`NOFID`] when unauthenticated.
        afid: u32,
        /// User name string provided by the client.
        uname: String,
        /// Attachment name supplied by the client.
        aname: String,
    },
    /// `Tflush` aborts an outstanding request.
    Flush {
        /// Tag of the request to abort.
        oldtag: u16,
    },
    /// `Twalk` traverses the tree to produce a new fid.
    Walk {
        /// Source fid for the walk operation.
        fid: u32,
        /// Destination fid receiving the walk result.
        newfid: u32,
        /// Path components supplied by the client.
        wnames: Vec<String>,
    },
    /// `Topen` opens a fid for subsequent I/O operations.
    Open {
        /// Fid to open.
        fid: u32,
        /// Requested open mode.
        mode: OpenMode,
    },
    /// `Tcreate` creates a file in the directory bound to `fid`.
    Create {
        /// Directory fid.
        fid: u32,
        /// Name of the new file.
        name: String,
        /// Permission bits of the new file.
        perm: u32,
        /// Open mode applied after creation.
        mode: OpenMode,
    },
    /// `Tread` reads a range of bytes from a fid.
    Read {
        /// Fid to read from.
        fid: u32,
        /// Offset into the file.
        offset: u64,
        /// Number of bytes requested.
        count: u32,
    },
    /// `Twrite` writes bytes to a fid.
    Write {
        /// Fid to write to.
        fid: u32,
        /// Offset within the file.
        offset: u64,
        /// Payload bytes supplied by the client.
        data: Vec<u8>,
    },
    /// `Tclunk` closes a fid.
    Clunk {
        /// Fid identifier to close.
        fid: u32,
    },
    /// `Tremove` removes the file bound to a fid.
    Remove {
        /// Fid identifier to remove.
        fid: u32,
    },
    /// `Tstat` requests the directory entry of a fid.
    Stat {
        /// Fid identifier to describe.
        fid: u32,
    },
    /// `Twstat` rewrites the directory entry of a fid.
    Wstat {
        /// Fid identifier to update.
        fid: u32,
        /// New directory entry.
        stat: Dir,
    },
}

/// 9P2000 R-messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Response to `Tversion` carrying the negotiated size and version.
    Version {
        /// Negotiated maximum message size.
        msize: u32,
        /// Protocol version string.
        version: String,
    },
    /// Response to `Tauth` carrying the authentication Qid.
    Auth {
        /// Qid of the authentication file.
        aqid: Qid,
    },
    /// Response to `Tattach` containing the root Qid.
    Attach {
        /// Qid associated with the tree root.
        qid: Qid,
    },
    /// Error response carrying the error string.
    Error {
        /// Human-readable error string.
        ename: String,
    },
    /// Response to `Tflush`.
    Flush,
    /// Response to `Twalk` containing the traversed Qids.
    Walk {
        /// Qids encountered during the walk.
        qids: Vec<Qid>,
    },
    /// Response to `Topen` containing the opened Qid and I/O unit size.
    Open {
        /// Qid associated with the opened fid.
        qid: Qid,
        /// Maximum I/O payload size, zero meaning "use msize".
        iounit: u32,
    },
    /// Response to `Tcreate`.
    Create {
        /// Qid of the created file.
        qid: Qid,
        /// Maximum I/O payload size.
        iounit: u32,
    },
    /// Response to `Tread` containing the payload bytes.
    Read {
        /// Data payload read from the fid.
        data: Vec<u8>,
    },
    /// Response to `Twrite` containing the write count.
    Write {
        /// Number of bytes written.
        count: u32,
    },
    /// Response to `Tclunk` acknowledging the closure.
    Clunk,
    /// Response to `Tremove`.
    Remove,
    /// Response to `Tstat` carrying the directory entry.
    Stat {
        /// Directory entry of the fid.
        stat: Dir,
    },
    /// Response to `Twstat`.
    Wstat,
}
