// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixture: a daemon state rooted in a temp dir plus scripted
//! rsync/ssh binaries on PATH.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tm_daemon::lifecycle::{startup, DaemonState};

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub state: Arc<DaemonState>,
}

impl Fixture {
    pub async fn new(extra_env: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let env_path = dir.path().join("tmservice.env");
        std::fs::write(
            &env_path,
            format!(
                "backup_root={}\nrun_dir={}\nlog_dir={}\nalert_enabled=false\n{extra_env}",
                dir.path().join("backup").display(),
                dir.path().join("run").display(),
                dir.path().join("log").display(),
            ),
        )
        .unwrap();
        let state = Arc::new(startup(env_path).await.unwrap());
        Self { dir, state }
    }

    pub fn add_host(&self, line: &str) {
        let roster = tm_core::Roster::new(self.state.settings.lock().roster_path());
        roster.append(&tm_core::ServerEntry::parse(line).unwrap()).unwrap();
    }

    pub fn host_root(&self, host: &str) -> PathBuf {
        self.state.settings.lock().host_root(host)
    }

    /// Install scripted `rsync` and `ssh` first on PATH. Callers must be
    /// `#[serial]` — PATH is process-global.
    pub fn install_fake_tools(&self, rsync_body: &str, ssh_body: &str) {
        let bin = self.dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        for (name, body) in [("rsync", rsync_body), ("ssh", ssh_body)] {
            let path = bin.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let path = std::env::var("PATH").unwrap_or_default();
        std::env::set_var("PATH", format!("{}:{path}", bin.display()));
    }

    /// An rsync script that appends `start`/`end` events (with the remote
    /// source argument, which carries the hostname) to an events file.
    pub fn install_event_rsync(&self, sleep_secs: &str) -> PathBuf {
        let events = self.dir.path().join("events.log");
        let body = format!(
            "src=$(echo \"$@\" | tr ' ' '\\n' | grep ':' | head -1)\n\
             echo \"start $src $(date +%s.%N)\" >> {events}\n\
             sleep {sleep_secs}\n\
             echo \"end $src $(date +%s.%N)\" >> {events}\n\
             exit 0",
            events = events.display(),
        );
        self.install_fake_tools(&body, "echo 'TMDUMP NONE'; exit 0");
        events
    }
}

/// Parse the events file into (kind, host) pairs in file order.
pub fn parse_events(path: &Path) -> Vec<(String, String)> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let kind = fields.next()?.to_string();
            let source = fields.next()?;
            let host = source.split(':').next()?.to_string();
            Some((kind, host))
        })
        .collect()
}

/// Maximum number of transfers in flight at once, from the event order.
pub fn max_concurrency(events: &[(String, String)]) -> usize {
    let mut current = 0usize;
    let mut max = 0usize;
    for (kind, _) in events {
        match kind.as_str() {
            "start" => {
                current += 1;
                max = max.max(current);
            }
            "end" => current = current.saturating_sub(1),
            _ => {}
        }
    }
    max
}
