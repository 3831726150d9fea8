// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate that cache failures reach 9P clients unchanged.
// Author: Lukas Bower
#![forbid(unsafe_code)]

mod common;

use common::{path, FailingCache, OUTAGE, ROOT};
use k9p::server::Connection;
use k9p::{CacheError, K9pError, Service, Session};
use k9p_codec::{
    decode_response, encode_request, OpenMode, Request, RequestBody, ResponseBody, DEFAULT_MSIZE,
    NOFID, VERSION,
};

fn unavailable() -> K9pError {
    K9pError::Cache(CacheError::Unavailable(OUTAGE.to_owned()))
}

fn session() -> Session {
    let session = Session::new(FailingCache::new());
    session
        .attach(ROOT, NOFID, "alice", "")
        .expect("root needs no cache lookup");
    session
}

#[test]
fn listing_failure_is_returned_verbatim() {
    let session = session();
    let qids = session
        .walk(ROOT, 2, &path("namespaces"))
        .expect("walk to a static child");
    assert_eq!(qids.len(), 1);
    assert_eq!(session.read(2, 0, 8192), Err(unavailable()));
}

#[test]
fn lookup_failure_ends_the_walk_early() {
    let session = session();
    let qids = session
        .walk(ROOT, 2, &path("namespaces/default/deployments"))
        .expect("lookup failures do not fail the walk");
    assert_eq!(qids.len(), 1, "only namespaces resolves");
    assert!(!session.is_bound(2));
}

#[test]
fn root_listing_needs_no_cache() {
    let session = session();
    let listing = common::read_all(&session, ROOT, 8192);
    assert_eq!(common::entry_names(&listing), ["cluster", "namespaces"]);
}

#[test]
fn rerror_text_is_the_cache_message() {
    let mut conn = Connection::new(Session::new(FailingCache::new()));
    assert!(format!("{conn:?}").contains("msize: 65536"));
    let mut call = |tag: u16, body: RequestBody| {
        let frame = encode_request(&Request { tag, body }).expect("encode request");
        let response = conn.handle_frame(&frame).expect("frame handled");
        let response = decode_response(&response).expect("decode response");
        assert_eq!(response.tag, tag);
        response.body
    };

    call(
        1,
        RequestBody::Version {
            msize: DEFAULT_MSIZE,
            version: VERSION.to_owned(),
        },
    );
    call(
        2,
        RequestBody::Attach {
            fid: ROOT,
            afid: NOFID,
            uname: "alice".to_owned(),
            aname: String::new(),
        },
    );
    call(
        3,
        RequestBody::Walk {
            fid: ROOT,
            newfid: 2,
            wnames: path("namespaces"),
        },
    );
    call(
        4,
        RequestBody::Open {
            fid: 2,
            mode: OpenMode::read_only(),
        },
    );
    let body = call(
        5,
        RequestBody::Read {
            fid: 2,
            offset: 0,
            count: 8192,
        },
    );
    assert_eq!(
        body,
        ResponseBody::Error {
            ename: format!("cache unavailable: {OUTAGE}"),
        }
    );
}
