// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Fuzz-style regression tests for 9P2000 codec framing.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use std::panic::{catch_unwind, AssertUnwindSafe};

use k9p_codec::{
    Codec, Dir, OpenMode, Qid, QidType, Request, RequestBody, Response, ResponseBody, DMDIR,
    DEFAULT_MSIZE, NOFID,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn fuzz_decode_never_panics() {
    let iterations = std::env::var("K9P_FUZZ_ITERS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(512);
    let mut rng = StdRng::seed_from_u64(0x9_2000_u64);
    let codec = Codec;

    for _ in 0..iterations {
        let mut frame = codec
            .encode_request(&random_request(&mut rng))
            .expect("encode request");
        mutate_frame(&mut rng, &mut frame);
        let result = catch_unwind(AssertUnwindSafe(|| codec.decode_request(&frame)));
        assert!(result.is_ok(), "request decoder panicked on mutated frame");
    }

    for _ in 0..iterations {
        let mut frame = codec
            .encode_response(&random_response(&mut rng))
            .expect("encode response");
        mutate_frame(&mut rng, &mut frame);
        let result = catch_unwind(AssertUnwindSafe(|| codec.decode_response(&frame)));
        assert!(result.is_ok(), "response decoder panicked on mutated frame");
    }
}

#[test]
fn unmutated_frames_decode_to_the_original() {
    let mut rng = StdRng::seed_from_u64(0x564);
    let codec = Codec;
    for _ in 0..64 {
        let request = random_request(&mut rng);
        let frame = codec.encode_request(&request).expect("encode request");
        assert_eq!(codec.decode_request(&frame), Ok(request));

        let response = random_response(&mut rng);
        let frame = codec.encode_response(&response).expect("encode response");
        assert_eq!(codec.decode_response(&frame), Ok(response));
    }
}

fn mutate_frame<R: Rng>(rng: &mut R, frame: &mut Vec<u8>) {
    if frame.len() < 5 {
        return;
    }
    match rng.random_range(0..3) {
        0 => {
            let declared: u32 = rng.random();
            frame[0..4].copy_from_slice(&declared.to_le_bytes());
        }
        1 => {
            if frame.len() > 6 {
                let new_len = rng.random_range(5..frame.len());
                frame.truncate(new_len);
                if rng.random_bool(0.5) {
                    frame[0..4].copy_from_slice(&(new_len as u32).to_le_bytes());
                }
            }
        }
        _ => {
            let tail_len = rng.random_range(1..16);
            let mut tail = vec![0u8; tail_len];
            rng.fill_bytes(&mut tail);
            frame.extend_from_slice(&tail);
            if rng.random_bool(0.5) {
                let declared = frame.len() as u32;
                frame[0..4].copy_from_slice(&declared.to_le_bytes());
            }
        }
    }

    frame[4] ^= rng.random_range(1..=0x7F);
}

fn random_request<R: Rng>(rng: &mut R) -> Request {
    let tag = rng.random();
    let body = match rng.random_range(0..8) {
        0 => RequestBody::Version {
            msize: rng.random_range(256..=DEFAULT_MSIZE),
            version: "9P2000".to_owned(),
        },
        1 => RequestBody::Attach {
            fid: rng.random(),
            afid: NOFID,
            uname: random_atom(rng, 6),
            aname: random_atom(rng, 4),
        },
        2 => RequestBody::Walk {
            fid: rng.random(),
            newfid: rng.random(),
            wnames: (0..rng.random_range(0..5))
                .map(|_| random_atom(rng, 10))
                .collect(),
        },
        3 => RequestBody::Open {
            fid: rng.random(),
            mode: if rng.random_bool(0.5) {
                OpenMode::read_only()
            } else {
                OpenMode::write_truncate()
            },
        },
        4 => RequestBody::Read {
            fid: rng.random(),
            offset: rng.random(),
            count: rng.random_range(0..DEFAULT_MSIZE),
        },
        5 => RequestBody::Stat { fid: rng.random() },
        6 => RequestBody::Wstat {
            fid: rng.random(),
            stat: random_dir(rng),
        },
        _ => {
            let mut data = vec![0u8; rng.random_range(0..64)];
            rng.fill_bytes(&mut data);
            RequestBody::Write {
                fid: rng.random(),
                offset: rng.random(),
                data,
            }
        }
    };
    Request { tag, body }
}

fn random_response<R: Rng>(rng: &mut R) -> Response {
    let tag = rng.random();
    let body = match rng.random_range(0..7) {
        0 => ResponseBody::Version {
            msize: rng.random_range(256..=DEFAULT_MSIZE),
            version: "9P2000".to_owned(),
        },
        1 => ResponseBody::Attach {
            qid: random_qid(rng),
        },
        2 => ResponseBody::Walk {
            qids: (0..rng.random_range(0..5))
                .map(|_| random_qid(rng))
                .collect(),
        },
        3 => ResponseBody::Open {
            qid: random_qid(rng),
            iounit: 0,
        },
        4 => ResponseBody::Read {
            data: {
                let mut buf = vec![0u8; rng.random_range(0..64)];
                rng.fill_bytes(&mut buf);
                buf
            },
        },
        5 => ResponseBody::Stat {
            stat: random_dir(rng),
        },
        _ => ResponseBody::Error {
            ename: random_atom(rng, 12),
        },
    };
    Response { tag, body }
}

fn random_atom<R: Rng>(rng: &mut R, max_len: usize) -> String {
    let len = rng.random_range(1..=max_len.max(1));
    (0..len)
        .map(|_| {
            const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz-.";
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

fn random_qid<R: Rng>(rng: &mut R) -> Qid {
    let ty = if rng.random_bool(0.5) {
        QidType::DIRECTORY
    } else {
        QidType::FILE
    };
    Qid::new(ty, rng.random(), rng.random())
}

fn random_dir<R: Rng>(rng: &mut R) -> Dir {
    let qid = random_qid(rng);
    Dir {
        qid,
        mode: if qid.ty().is_directory() {
            DMDIR | 0o664
        } else {
            0o664
        },
        atime: rng.random(),
        mtime: rng.random(),
        length: rng.random_range(0..4096),
        name: random_atom(rng, 12),
        uid: random_atom(rng, 6),
        gid: random_atom(rng, 6),
        muid: "none".to_owned(),
        ..Dir::default()
    }
}
