// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn settings_in(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.run_dir = dir.join("run");
    settings.log_dir = dir.join("log");
    std::fs::create_dir_all(&settings.run_dir).unwrap();
    settings
}

#[test]
fn live_pid_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    std::fs::write(settings.pid_path(), format!("{}\n", std::process::id())).unwrap();
    assert_eq!(daemon_pid(&settings), Some(std::process::id()));
}

#[test]
fn dead_pid_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    std::fs::write(settings.pid_path(), "3999999\n").unwrap();
    assert_eq!(daemon_pid(&settings), None);
}

#[test]
fn missing_or_garbage_pid_file_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    assert_eq!(daemon_pid(&settings), None);
    std::fs::write(settings.pid_path(), "not-a-pid\n").unwrap();
    assert_eq!(daemon_pid(&settings), None);
}

#[test]
fn healthy_daemon_means_no_action() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings_in(dir.path());
    std::fs::write(settings.pid_path(), format!("{}\n", std::process::id())).unwrap();
    let outcome = run_once(&settings);
    assert_eq!(outcome, WatchdogOutcome::Healthy { pid: std::process::id() });
    // Idempotent: a second pass says the same thing.
    assert_eq!(run_once(&settings), WatchdogOutcome::Healthy { pid: std::process::id() });
    let log = std::fs::read_to_string(settings.log_dir.join("watchdog.log")).unwrap();
    assert_eq!(log.matches("daemon healthy").count(), 2);
}
