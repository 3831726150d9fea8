// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate directory listings and record packing across read calls.
// Author: Lukas Bower
#![forbid(unsafe_code)]

mod common;

use common::{attached, cluster, entry_names, namespace, read_all, walk, ROOT};
use k9p::{K9pError, Service};
use k9p_codec::{DirEntries, DMDIR};

#[test]
fn root_lists_cluster_and_namespaces() {
    let session = attached(&cluster(), "alice");
    let listing = read_all(&session, ROOT, 8192);
    assert_eq!(entry_names(&listing), ["cluster", "namespaces"]);
    for entry in DirEntries::new(&listing) {
        let entry = entry.expect("decode entry");
        assert_eq!(entry.mode, DMDIR | 0o664);
        assert_eq!(entry.uid, "alice");
    }
}

#[test]
fn namespaces_list_the_cache() {
    let session = attached(&cluster(), "alice");
    walk(&session, 2, "namespaces");
    assert_eq!(
        entry_names(&read_all(&session, 2, 8192)),
        ["default", "kube-system"]
    );
}

#[test]
fn deployments_are_scoped_to_their_namespace() {
    let session = attached(&cluster(), "alice");
    walk(&session, 2, "namespaces/default/deployments");
    walk(&session, 3, "namespaces/kube-system/deployments");
    assert_eq!(entry_names(&read_all(&session, 2, 8192)), ["api", "web"]);
    assert_eq!(entry_names(&read_all(&session, 3, 8192)), ["coredns"]);
}

#[test]
fn entity_directories_list_their_children() {
    let session = attached(&cluster(), "alice");
    walk(&session, 2, "namespaces/default");
    walk(&session, 3, "namespaces/default/deployments/web");
    walk(&session, 4, "cluster");
    assert_eq!(entry_names(&read_all(&session, 2, 8192)), ["deployments"]);

    let listing = read_all(&session, 3, 8192);
    assert_eq!(entry_names(&listing), ["data.yaml", "scale"]);
    let scale = DirEntries::new(&listing)
        .map(|entry| entry.expect("decode entry"))
        .find(|entry| entry.name == "scale")
        .expect("scale entry");
    assert_eq!(scale.mode, 0o664);
    assert_eq!(scale.length, 1);

    assert!(read_all(&session, 4, 8192).is_empty());
}

#[test]
fn small_reads_see_the_same_entries() {
    let store = cluster();
    let whole = attached(&store, "alice");
    walk(&whole, 2, "namespaces/default/deployments/web");
    let expected = entry_names(&read_all(&whole, 2, 8192));

    let split = attached(&store, "alice");
    walk(&split, 2, "namespaces/default/deployments/web");
    let first = split.read(2, 0, 80).expect("first record");
    let records: Vec<_> = DirEntries::new(&first).collect();
    assert_eq!(records.len(), 1, "one record fits in 80 bytes");
    let rest = split.read(2, first.len() as u64, 80).expect("second record");
    assert!(!rest.is_empty());

    let mut combined = first;
    combined.extend_from_slice(&rest);
    assert!(split
        .read(2, combined.len() as u64, 80)
        .expect("end of directory")
        .is_empty());
    assert_eq!(entry_names(&combined), expected);
}

#[test]
fn record_larger_than_count_is_held_back() {
    let session = attached(&cluster(), "alice");
    walk(&session, 2, "namespaces");
    assert!(session.read(2, 0, 16).expect("short read").is_empty());
    let listing = read_all(&session, 2, 8192);
    assert_eq!(entry_names(&listing), ["default", "kube-system"]);
}

#[test]
fn open_listing_is_not_requeried() {
    let store = cluster();
    let session = attached(&store, "alice");
    walk(&session, 2, "namespaces");
    let first = session.read(2, 0, 80).expect("first record");
    assert_eq!(entry_names(&first), ["default"]);

    store.upsert(namespace("monitoring", Some(1)));
    let mut listing = first;
    loop {
        let chunk = session
            .read(2, listing.len() as u64, 80)
            .expect("continue listing");
        if chunk.is_empty() {
            break;
        }
        listing.extend_from_slice(&chunk);
    }
    assert_eq!(entry_names(&listing), ["default", "kube-system"]);

    walk(&session, 3, "namespaces");
    assert_eq!(
        entry_names(&read_all(&session, 3, 8192)),
        ["default", "kube-system", "monitoring"]
    );
}

#[test]
fn directory_offsets_must_continue() {
    let session = attached(&cluster(), "alice");
    walk(&session, 2, "namespaces");
    let first = session.read(2, 0, 80).expect("first record");
    assert!(!first.is_empty());
    assert_eq!(session.read(2, 0, 80), Err(K9pError::BadOffset));
    assert_eq!(session.read(2, 1, 80), Err(K9pError::BadOffset));
    assert!(session.read(2, first.len() as u64, 80).is_ok());
}
