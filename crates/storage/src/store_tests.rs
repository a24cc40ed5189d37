// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tm_core::{JobStatus, ProcessRecord, ProcessRecordBuilder};

fn temp_store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::open(dir.path().join("state")).unwrap();
    (dir, store)
}

#[test]
fn put_then_get_round_trips() {
    let (_dir, store) = temp_store();
    store.put("proc-web1.state", "hello\n").unwrap();
    assert_eq!(store.get("proc-web1.state").unwrap().as_deref(), Some("hello\n"));
}

#[test]
fn get_missing_is_none() {
    let (_dir, store) = temp_store();
    assert!(store.get("proc-ghost.state").unwrap().is_none());
}

#[test]
fn put_replaces_previous_content() {
    let (_dir, store) = temp_store();
    store.put("k", "one").unwrap();
    store.put("k", "two").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
}

#[test]
fn typed_record_round_trips() {
    let (_dir, store) = temp_store();
    let record = ProcessRecordBuilder::default().status(JobStatus::Failed).build();
    store.put_record(&ProcessRecord::key("web1"), &record).unwrap();
    let reread: ProcessRecord = store.get_record(&ProcessRecord::key("web1")).unwrap().unwrap();
    assert_eq!(reread, record);
}

#[test]
fn corrupt_record_is_skipped_not_fatal() {
    let (_dir, store) = temp_store();
    store.put("proc-web1.state", "garbage|||").unwrap();
    let parsed: Option<ProcessRecord> = store.get_record("proc-web1.state").unwrap();
    assert!(parsed.is_none());
    // The raw content is still there for post-mortems.
    assert!(store.get("proc-web1.state").unwrap().is_some());
}

#[test]
fn list_filters_by_prefix_and_sorts_by_mtime_desc() {
    let (_dir, store) = temp_store();
    store.put("proc-a.state", "1").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    store.put("proc-b.state", "2").unwrap();
    store.put("restore-a-1.state", "3").unwrap();

    let keys = store.list("proc-").unwrap();
    assert_eq!(keys, vec!["proc-b.state", "proc-a.state"]);
}

#[test]
fn list_skips_temp_files() {
    let (_dir, store) = temp_store();
    store.put("proc-a.state", "1").unwrap();
    std::fs::write(store.dir().join(".proc-x.state.tmp"), "partial").unwrap();
    assert_eq!(store.list("").unwrap(), vec!["proc-a.state"]);
}

#[test]
fn list_records_skips_corrupt_entries() {
    let (_dir, store) = temp_store();
    let good = ProcessRecordBuilder::default().hostname("a").build();
    store.put_record("proc-a.state", &good).unwrap();
    store.put("proc-b.state", "not|a|record").unwrap();
    let records: Vec<ProcessRecord> = store.list_records("proc-").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hostname, "a");
}

#[test]
fn delete_is_idempotent() {
    let (_dir, store) = temp_store();
    store.put("k", "v").unwrap();
    store.delete("k").unwrap();
    store.delete("k").unwrap();
    assert!(store.get("k").unwrap().is_none());
}

#[test]
fn reload_marker_set_and_consume() {
    let (_dir, store) = temp_store();
    assert!(!store.take_reload().unwrap());
    store.mark_reload().unwrap();
    assert!(store.take_reload().unwrap());
    assert!(!store.take_reload().unwrap());
}
