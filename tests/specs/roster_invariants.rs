// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roster invariants across interleaved mutations.

use tm_core::{Roster, RosterError, ServerEntry};

#[test]
fn interleaved_mutations_never_produce_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let active = Roster::new(dir.path().join("servers.conf"));
    let archive = Roster::new(dir.path().join("servers-archived.conf"));

    active.append(&ServerEntry::new("a")).unwrap();
    active.append(&ServerEntry::new("b")).unwrap();
    assert!(matches!(active.append(&ServerEntry::new("a")), Err(RosterError::DuplicateHost(_))));

    active.move_to(&archive, "a").unwrap();
    active.append(&ServerEntry::new("a")).unwrap();
    // "a" now exists in both rosters; unarchiving it back must conflict
    // rather than duplicate the active entry.
    assert!(matches!(archive.move_to(&active, "a"), Err(RosterError::DuplicateHost(_))));

    let mut seen = std::collections::BTreeSet::new();
    for entry in active.read().unwrap() {
        assert!(seen.insert(entry.hostname.clone()), "duplicate {}", entry.hostname);
    }
}

#[test]
fn serialization_survives_every_recognized_option() {
    let line = "db1 --db-only --no-rotate --priority 3 --db-interval 6h --notify ops@example.com --notify-ok --future ok";
    let entry = ServerEntry::parse(line).unwrap();
    let reparsed = ServerEntry::parse(&entry.serialize()).unwrap();
    assert_eq!(entry, reparsed);
}

#[test]
fn settings_write_then_read_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmservice.env");
    let mut settings = tm_core::Settings::load(&path).unwrap();
    settings.retention_days = 21;
    settings.parallel_jobs = 6;
    settings.notify_ok = true;
    settings.save(&path).unwrap();
    let reread = tm_core::Settings::load(&path).unwrap();
    assert_eq!(reread.to_map(), settings.to_map());
}
