// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;
use tm_core::Settings;

fn test_settings(dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.config_dir = dir.to_path_buf();
    settings.backup_root = dir.join("backup");
    settings.ssh_port = 2222;
    settings.ssh_key_path = PathBuf::from("/root/.ssh/id_test");
    settings.ssh_timeout = 7;
    settings
}

fn test_job(dir: &Path) -> RsyncJob {
    RsyncJob::from_settings(
        &test_settings(dir),
        "web1",
        dir.join("backup/web1/2026-02-08/files"),
        dir.join("rsync-web1.log"),
    )
}

#[test]
fn remote_shell_embeds_port_key_and_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let shell = test_job(dir.path()).ssh.remote_shell();
    assert!(shell.contains("-p 2222"));
    assert!(shell.contains("-i /root/.ssh/id_test"));
    assert!(shell.contains("ConnectTimeout=7"));
    assert!(shell.contains("StrictHostKeyChecking=no"));
}

#[test]
fn args_end_with_source_then_dest() {
    let dir = tempfile::tempdir().unwrap();
    let args = test_job(dir.path()).build_args();
    let n = args.len();
    assert_eq!(args[n - 2], "web1:/");
    assert!(args[n - 1].ends_with("/2026-02-08/files/"));
}

#[test]
fn default_flags_include_archive_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let args = test_job(dir.path()).build_args();
    assert!(args.contains(&"-a".to_string()));
    assert!(args.contains(&"--delete".to_string()));
    assert!(args.contains(&"--rsync-path=sudo rsync".to_string()));
}

#[test]
fn flags_override_replaces_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = test_job(dir.path());
    job.flags_override = Some("-rlt --delete-after".to_string());
    let args = job.build_args();
    assert!(args.contains(&"-rlt".to_string()));
    assert!(args.contains(&"--delete-after".to_string()));
    assert!(!args.contains(&"-a".to_string()));
}

#[test]
fn bwlimit_only_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = test_job(dir.path());
    assert!(!job.build_args().iter().any(|a| a.starts_with("--bwlimit")));
    job.bw_limit = Some(4000);
    assert!(job.build_args().contains(&"--bwlimit=4000".to_string()));
}

#[test]
fn link_dest_is_absolute_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = test_job(dir.path());
    let prev = dir.path().join("backup/web1/2026-02-07/files");
    job.link_dest = Some(prev.clone());
    let args = job.build_args();
    assert!(args.contains(&format!("--link-dest={}", prev.display())));
}

#[test]
fn exclude_files_applied_in_order_global_then_host() {
    let dir = tempfile::tempdir().unwrap();
    let settings = test_settings(dir.path());
    std::fs::write(settings.global_excludes_path(), "/proc\n").unwrap();
    std::fs::write(settings.host_excludes_path("web1"), "/var/cache\n").unwrap();
    let job = RsyncJob::from_settings(
        &settings,
        "web1",
        dir.path().join("dest"),
        dir.path().join("log"),
    );
    let args = job.build_args();
    let excludes: Vec<&String> =
        args.iter().filter(|a| a.starts_with("--exclude-from=")).collect();
    assert_eq!(excludes.len(), 2);
    assert!(excludes[0].contains("excludes.conf"));
    assert!(excludes[1].contains("excludes-web1.conf"));
}

#[test]
fn missing_exclude_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let args = test_job(dir.path()).build_args();
    assert!(!args.iter().any(|a| a.starts_with("--exclude-from=")));
}

#[test]
fn extra_opts_are_appended_before_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let mut job = test_job(dir.path());
    job.extra_opts = vec!["--one-file-system".to_string()];
    let args = job.build_args();
    let extra_ix = args.iter().position(|a| a == "--one-file-system").unwrap();
    assert_eq!(extra_ix, args.len() - 3);
}
