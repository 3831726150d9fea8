// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide 9P2000 wire types and codec primitives for the k9p server.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! 9P2000 wire types, message codec, stat encoding and frame validation
//! shared by the k9p server and its test clients.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod codec;
mod dir;
mod frame;
mod types;

pub use codec::{decode_request, decode_response, encode_request, encode_response, Codec};
pub use dir::{decode_dir, encode_dir, DirEntries};
pub use frame::{frame_len, MIN_FRAME};
pub use types::*;
