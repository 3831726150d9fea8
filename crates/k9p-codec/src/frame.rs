// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate the size prefix of 9P frames read from a stream.
// Author: Lukas Bower

//! Frame length validation for stream transports.

use crate::types::{CodecError, HEADER_LEN};

/// Smallest legal frame: header plus tag.
pub const MIN_FRAME: u32 = HEADER_LEN as u32 + 2;

/// Validate a frame's `size[4]` prefix against an optional upper bound and
/// return the full frame length in bytes.
pub fn frame_len(prefix: [u8; 4], max_frame: Option<u32>) -> Result<usize, CodecError> {
    let declared = u32::from_le_bytes(prefix);
    if let Some(max) = max_frame {
        if declared > max {
            return Err(CodecError::FrameTooLarge { declared, max });
        }
    }
    if declared < MIN_FRAME {
        return Err(CodecError::LengthMismatch {
            declared,
            actual: MIN_FRAME as usize,
        });
    }
    usize::try_from(declared).map_err(|_| CodecError::FrameTooLarge {
        declared,
        max: u32::MAX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_MSIZE;

    #[test]
    fn runt_headers_are_rejected() {
        assert!(matches!(
            frame_len(3u32.to_le_bytes(), None),
            Err(CodecError::LengthMismatch { declared: 3, .. })
        ));
        assert_eq!(frame_len(7u32.to_le_bytes(), Some(DEFAULT_MSIZE)), Ok(7));
    }

    #[test]
    fn frames_beyond_msize_are_rejected() {
        assert_eq!(
            frame_len((DEFAULT_MSIZE + 1).to_le_bytes(), Some(DEFAULT_MSIZE)),
            Err(CodecError::FrameTooLarge {
                declared: DEFAULT_MSIZE + 1,
                max: DEFAULT_MSIZE,
            })
        );
        assert_eq!(
            frame_len((DEFAULT_MSIZE + 1).to_le_bytes(), None),
            Ok(DEFAULT_MSIZE as usize + 1)
        );
    }
}
