// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn own_pid_is_alive() {
    assert!(pid_alive(std::process::id()));
}

#[test]
fn pid_zero_is_never_alive() {
    assert!(!pid_alive(0));
}

#[test]
fn tail_returns_last_lines_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.log");
    let content: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
    std::fs::write(&path, content.join("\n")).unwrap();
    let tail = tail_lines(&path, 5);
    assert_eq!(tail, vec!["line 15", "line 16", "line 17", "line 18", "line 19"]);
}

#[test]
fn tail_of_missing_file_is_empty() {
    assert!(tail_lines(Path::new("/nonexistent/job.log"), 10).is_empty());
}

#[parameterized(
    error_tag = { "[ERROR] rsync exited with code 12", JobStatus::Failed },
    fail_word = { "TMDUMP FAIL mysql auth", JobStatus::Failed },
    fatal = { "fatal: could not read from remote", JobStatus::Failed },
    permission = { "rsync: opendir failed: Permission denied (13)", JobStatus::Failed },
    cannot_create = { "rsync: cannot create /backup/x: No space left", JobStatus::Failed },
    clean = { "summary: backup finished in 4m 10s", JobStatus::Completed },
    empty = { "", JobStatus::Completed },
)]
fn infers_status_from_tail(last_line: &str, expected: JobStatus) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("job.log");
    std::fs::write(&path, format!("starting backup\n{last_line}\n")).unwrap();
    assert_eq!(infer_status(&path), expected);
}

#[test]
fn job_log_lines_are_timestamped_and_flagged() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = JobLog::create(dir.path().join("logs/backup-web1.log")).unwrap();
    log.line("file sync starting");
    log.error("rsync exited with code 23");
    let content = std::fs::read_to_string(log.path()).unwrap();
    assert!(content.contains("] file sync starting"));
    assert!(content.contains("[ERROR] rsync exited with code 23"));
    assert_eq!(infer_status(log.path()), JobStatus::Failed);
}
