// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rsync invocation: argument assembly and the backup-file operation.

use crate::error::TransportError;
use crate::snapshots;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use std::process::Stdio;
use tm_core::{Settings, SnapshotId};
use tokio::process::Command;
use tracing::{info, warn};

/// Exit code rsync uses for "some files vanished while we were reading them".
/// Normal on a live system; downgraded to a warning.
const RSYNC_PARTIAL_VANISHED: i32 = 24;

/// SSH connection options shared by rsync and the dump driver.
#[derive(Debug, Clone)]
pub struct SshOptions {
    pub port: u16,
    pub key_path: PathBuf,
    pub connect_timeout: u64,
}

impl SshOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            port: settings.ssh_port,
            key_path: settings.ssh_key_path.clone(),
            connect_timeout: settings.ssh_timeout,
        }
    }

    /// The remote shell string for rsync's `-e`.
    pub fn remote_shell(&self) -> String {
        format!(
            "ssh -p {} -i {} -o ConnectTimeout={} -o StrictHostKeyChecking=no -o BatchMode=yes",
            self.port,
            self.key_path.display(),
            self.connect_timeout
        )
    }

    /// A ready-to-extend `ssh` command for direct remote execution.
    pub fn command(&self, hostname: &str) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.arg("-p")
            .arg(self.port.to_string())
            .arg("-i")
            .arg(&self.key_path)
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout))
            .arg("-o")
            .arg("StrictHostKeyChecking=no")
            .arg("-o")
            .arg("BatchMode=yes")
            .arg(hostname);
        cmd.kill_on_drop(true);
        cmd
    }
}

/// One rsync transfer, fully described.
#[derive(Debug, Clone)]
pub struct RsyncJob {
    pub hostname: String,
    /// Remote source root (typically `/`).
    pub source_root: String,
    /// Local destination (`<host>/<snapshot>/files/`).
    pub dest: PathBuf,
    pub link_dest: Option<PathBuf>,
    /// Exclude files in application order: global first, then per-host.
    pub exclude_files: Vec<PathBuf>,
    pub bw_limit: Option<u32>,
    pub extra_opts: Vec<String>,
    pub flags_override: Option<String>,
    /// `--rsync-path='sudo rsync'` for privileged reads on the sender.
    pub sudo_rsync: bool,
    pub ssh: SshOptions,
    /// Transfer log (`rsync-<host>-<ts>.log`).
    pub log_path: PathBuf,
}

impl RsyncJob {
    pub fn from_settings(settings: &Settings, hostname: &str, dest: PathBuf, log_path: PathBuf) -> Self {
        let mut exclude_files = vec![settings.global_excludes_path()];
        exclude_files.push(settings.host_excludes_path(hostname));
        Self {
            hostname: hostname.to_string(),
            source_root: settings.backup_source.clone(),
            dest,
            link_dest: None,
            exclude_files,
            bw_limit: settings.rsync_bw_limit,
            extra_opts: settings.rsync_extra_opts.clone(),
            flags_override: settings.rsync_flags_override.clone(),
            sudo_rsync: true,
            ssh: SshOptions::from_settings(settings),
            log_path,
        }
    }

    /// Assemble the full rsync argument vector.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match &self.flags_override {
            Some(flags) => args.extend(flags.split_whitespace().map(String::from)),
            None => {
                // Ownership-preserving archive flags; numeric ids so uid/gid
                // survive hosts with mismatched passwd files.
                args.push("-a".to_string());
                #[cfg(target_os = "linux")]
                {
                    args.push("--numeric-ids".to_string());
                    args.push("--acls".to_string());
                    args.push("--xattrs".to_string());
                }
                args.push("--delete".to_string());
            }
        }
        for exclude in &self.exclude_files {
            if exclude.exists() {
                args.push(format!("--exclude-from={}", exclude.display()));
            }
        }
        if let Some(limit) = self.bw_limit {
            args.push(format!("--bwlimit={limit}"));
        }
        args.push("-e".to_string());
        args.push(self.ssh.remote_shell());
        if self.sudo_rsync {
            args.push("--rsync-path=sudo rsync".to_string());
        }
        if let Some(link_dest) = &self.link_dest {
            args.push(format!("--link-dest={}", link_dest.display()));
        }
        args.extend(self.extra_opts.iter().cloned());

        let source_root =
            if self.source_root.ends_with('/') { self.source_root.clone() } else { format!("{}/", self.source_root) };
        args.push(format!("{}:{}", self.hostname, source_root));
        args.push(format!("{}/", self.dest.display()));
        args
    }

    /// Run the transfer, appending rsync output to the transfer log.
    ///
    /// Exit 24 is success-with-warning; any other non-zero exit is a hard
    /// failure.
    pub async fn run(&self) -> Result<bool, TransportError> {
        std::fs::create_dir_all(&self.dest).map_err(|e| TransportError::io(&self.dest, e))?;
        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| TransportError::io(&self.log_path, e))?;
        let log_err = log.try_clone().map_err(|e| TransportError::io(&self.log_path, e))?;

        let mut cmd = Command::new("rsync");
        cmd.args(self.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);

        let status = cmd
            .status()
            .await
            .map_err(|e| TransportError::Spawn { command: "rsync".to_string(), source: e })?;

        match status.code() {
            Some(0) => Ok(false),
            Some(RSYNC_PARTIAL_VANISHED) => {
                warn!(host = %self.hostname, "rsync: some files vanished during transfer");
                Ok(true)
            }
            Some(code) => Err(TransportError::Rsync { code }),
            // Killed by signal (cancellation path).
            None => Err(TransportError::Rsync { code: -1 }),
        }
    }
}

/// Result of a successful backup-file operation.
#[derive(Debug, Clone)]
pub struct FileSyncOutcome {
    pub snapshot: SnapshotId,
    pub vanished_warning: bool,
}

/// The backup-file operation: resolve `latest` as the hardlink source,
/// allocate today's snapshot, sync, and swing `latest` on success.
pub async fn backup_files(
    settings: &Settings,
    hostname: &str,
    now: NaiveDateTime,
    log_path: PathBuf,
) -> Result<FileSyncOutcome, TransportError> {
    let host_root = settings.host_root(hostname);
    std::fs::create_dir_all(&host_root).map_err(|e| TransportError::io(&host_root, e))?;

    let link_dest = snapshots::resolve_latest(&host_root)?.map(|prev| prev.join("files"));
    let snapshot = snapshots::allocate_snapshot(&host_root, now)?;
    let dest = host_root.join(snapshot.dir_name()).join("files");

    let mut job = RsyncJob::from_settings(settings, hostname, dest, log_path);
    job.link_dest = link_dest.filter(|p| p.is_dir());

    info!(host = hostname, snapshot = %snapshot, link_dest = ?job.link_dest, "starting file sync");
    let vanished_warning = job.run().await?;

    // Only a successful sync may move the hardlink source.
    snapshots::swing_latest(&host_root, &snapshot)?;

    Ok(FileSyncOutcome { snapshot, vanished_warning })
}

/// The SQL sync operation: pull the remote `~/sql/` working directory into
/// the snapshot chosen by the placement rules.
pub async fn sql_sync(
    settings: &Settings,
    hostname: &str,
    run_snapshot: Option<&SnapshotId>,
    now: NaiveDateTime,
    log_path: PathBuf,
) -> Result<snapshots::SqlTarget, TransportError> {
    let host_root = settings.host_root(hostname);
    let target = snapshots::choose_sql_target(&host_root, run_snapshot, now)?;

    let mut job = RsyncJob::from_settings(settings, hostname, target.sql_dir.clone(), log_path);
    // Dumps live under the login user's home; no excludes, no hardlinks,
    // no sudo needed to read them.
    job.source_root = "~/sql".to_string();
    job.exclude_files.clear();
    job.sudo_rsync = false;
    job.link_dest = None;

    info!(host = hostname, snapshot = %target.snapshot, dest = %target.sql_dir.display(), "syncing database dumps");
    job.run().await?;
    Ok(target)
}

#[cfg(test)]
#[path = "rsync_tests.rs"]
mod tests;
