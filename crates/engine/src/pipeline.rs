// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-host backup pipeline.
//!
//! State machine: locking → [files] → [db-dump] → [sql-sync] → [rotate] →
//! summary. A files failure short-circuits the snapshot phases but still
//! lets the DB dump run; rotation and encryption never fail a job that
//! already succeeded. The host lock is released on every exit path.

use crate::error::EngineError;
use crate::lock::HostLock;
use crate::logs::{tail_lines, JobLog, TAIL_LINES};
use chrono::Local;
use std::path::PathBuf;
use std::time::Duration;
use tm_adapters::{Notification, Notifier, NotifyEvent, NotifyLevel};
use tm_core::{format_elapsed, BackupMode, Clock, ServerEntry, Settings, SnapshotId, Trigger};
use tm_transport::{crypt, dbdump, rotate, rsync, snapshots, ArchiveFormat, DumpConfig, SshOptions};
use tracing::{info, warn};

/// Per-job options, usually lifted off the host's roster line.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub mode: BackupMode,
    pub rotate: bool,
    pub notify_email: Option<String>,
    pub notify_ok: bool,
}

impl JobOptions {
    pub fn from_entry(entry: &ServerEntry) -> Self {
        Self {
            mode: entry.mode,
            rotate: entry.rotate,
            notify_email: entry.notify_email.clone(),
            notify_ok: entry.notify_ok,
        }
    }

    /// Manual/API override: force a mode, keep the entry's other options.
    pub fn with_mode(mut self, mode: BackupMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub hostname: String,
    pub mode: BackupMode,
    pub trigger: Trigger,
    pub success: bool,
    pub snapshot: Option<SnapshotId>,
    pub vanished_warning: bool,
    pub failed_phases: Vec<&'static str>,
    pub duration: Duration,
}

pub(crate) struct PipelineContext<N: Notifier, C: Clock> {
    pub settings: Settings,
    pub hostname: String,
    pub options: JobOptions,
    pub trigger: Trigger,
    pub log_path: PathBuf,
    pub rsync_log_path: PathBuf,
    pub notifier: N,
    pub clock: C,
}

/// Run the full pipeline for one host.
pub(crate) async fn run<N: Notifier, C: Clock>(
    ctx: PipelineContext<N, C>,
) -> Result<PipelineReport, EngineError> {
    let started = ctx.clock.now();
    let mut log = JobLog::create(ctx.log_path.clone()).map_err(|e| EngineError::io(&ctx.log_path, e))?;
    log.line(&format!(
        "starting backup of {} (mode {}, trigger {})",
        ctx.hostname, ctx.options.mode, ctx.trigger
    ));

    // locking
    let lock = match HostLock::acquire(&ctx.settings.run_dir, &ctx.hostname, std::process::id()) {
        Ok(lock) => lock,
        Err(crate::lock::LockError::Conflict { pid, .. }) => {
            log.error(&format!("backup already running with pid {pid}"));
            return Err(EngineError::AlreadyRunning(ctx.hostname));
        }
        Err(e) => return Err(e.into()),
    };

    let mut failed_phases: Vec<&'static str> = Vec::new();
    let mut snapshot: Option<SnapshotId> = None;
    let mut vanished_warning = false;
    let mut db_output = String::new();

    // files
    if ctx.options.mode.includes_files() {
        log.line("file sync starting");
        match rsync::backup_files(
            &ctx.settings,
            &ctx.hostname,
            Local::now().naive_local(),
            ctx.rsync_log_path.clone(),
        )
        .await
        {
            Ok(outcome) => {
                vanished_warning = outcome.vanished_warning;
                if outcome.vanished_warning {
                    log.line("WARNING: some files vanished during transfer (rsync exit 24)");
                }
                log.line(&format!("file sync finished into snapshot {}", outcome.snapshot));
                snapshot = Some(outcome.snapshot);
            }
            Err(e) => {
                log.error(&format!("file sync failed: {e}"));
                failed_phases.push("files");
            }
        }
    }

    // db-dump — runs even when the files phase failed.
    let mut db_ran_clean = false;
    let mut db_has_artifacts = false;
    if ctx.options.mode.includes_db() {
        log.line("remote database dump starting");
        let ssh = SshOptions::from_settings(&ctx.settings);
        let config = DumpConfig::from_settings(&ctx.settings);
        match dbdump::run_remote_dump(&ssh, &ctx.hostname, &config).await {
            Ok(outcome) => {
                db_output = outcome.output.clone();
                if outcome.is_empty() {
                    log.line("no database engines detected; skipping sql sync");
                    db_ran_clean = true;
                } else if outcome.succeeded() {
                    log.line(&format!(
                        "database dump succeeded for {} engine(s)",
                        outcome.engines.len()
                    ));
                    db_ran_clean = true;
                    db_has_artifacts = true;
                } else {
                    for failure in outcome.failures() {
                        log.error(&format!("database dump: {failure}"));
                    }
                    failed_phases.push("db-dump");
                    if outcome.has_credential_failure() {
                        notify_credentials(&ctx, &outcome).await;
                    }
                }
            }
            Err(e) => {
                log.error(&format!("database dump failed: {e}"));
                failed_phases.push("db-dump");
            }
        }
    }

    // sql-sync — only after a dump that produced artifacts.
    if db_ran_clean && db_has_artifacts {
        log.line("sql sync starting");
        match rsync::sql_sync(
            &ctx.settings,
            &ctx.hostname,
            snapshot.as_ref(),
            Local::now().naive_local(),
            ctx.rsync_log_path.clone(),
        )
        .await
        {
            Ok(target) => {
                log.line(&format!("sql dumps stored in {}", target.sql_dir.display()));
                if snapshot.is_none() {
                    snapshot = Some(target.snapshot);
                }
            }
            Err(e) => {
                log.error(&format!("sql sync failed: {e}"));
                failed_phases.push("sql-sync");
            }
        }
    }

    // rotate — only when nothing failed and the host wants it.
    if failed_phases.is_empty() && ctx.options.rotate {
        let host_root = ctx.settings.host_root(&ctx.hostname);
        match rotate::rotate(&host_root, ctx.settings.retention_days, Local::now().date_naive()) {
            Ok(removed) if !removed.is_empty() => {
                log.line(&format!("rotated out {} expired snapshot(s)", removed.len()));
            }
            Ok(_) => {}
            Err(e) => {
                // Rotation problems never fail a backup that succeeded.
                log.line(&format!("WARNING: rotation failed: {e}"));
                warn!(host = %ctx.hostname, error = %e, "rotation failed");
            }
        }
    }

    // encrypted archive — config-gated, non-fatal like rotation.
    if failed_phases.is_empty() && ctx.settings.encrypt_enabled {
        if let Some(id) = &snapshot {
            if let Err(e) = encrypt_snapshot(&ctx.settings, &ctx.hostname, id).await {
                log.line(&format!("WARNING: archive encryption failed: {e}"));
                warn!(host = %ctx.hostname, error = %e, "archive encryption failed");
            } else {
                log.line("encrypted archive written");
            }
        }
    }

    // summary
    let success = failed_phases.is_empty();
    let duration = started.elapsed();
    let summary = summary_body(&ctx.settings, &ctx.hostname, &ctx.options, snapshot.as_ref(), duration);
    log.line(&summary.replace('\n', " / "));
    drop(log);

    if success {
        info!(host = %ctx.hostname, elapsed = %format_elapsed(duration), "backup finished");
        if should_notify_success(&ctx.settings, &ctx.options) {
            let mut notification = Notification::new(
                NotifyEvent::BackupOk,
                NotifyLevel::Info,
                format!("backup-ok: {}", ctx.hostname),
                summary,
            );
            if let Some(recipient) = &ctx.options.notify_email {
                notification = notification.recipient(recipient);
            }
            let _ = ctx.notifier.notify(&notification).await;
        }
    } else if ctx.settings.alert_enabled {
        let body = failure_body(&summary, &failed_phases, &ctx.rsync_log_path, &db_output, &ctx.log_path);
        let mut notification = Notification::new(
            NotifyEvent::BackupFail,
            NotifyLevel::Error,
            format!("backup-fail: {} ({})", ctx.hostname, failed_phases.join(", ")),
            body,
        );
        if let Some(recipient) = &ctx.options.notify_email {
            notification = notification.recipient(recipient);
        }
        let _ = ctx.notifier.notify(&notification).await;
    }

    drop(lock);
    Ok(PipelineReport {
        hostname: ctx.hostname,
        mode: ctx.options.mode,
        trigger: ctx.trigger,
        success,
        snapshot,
        vanished_warning,
        failed_phases,
        duration,
    })
}

async fn notify_credentials<N: Notifier, C: Clock>(
    ctx: &PipelineContext<N, C>,
    outcome: &dbdump::DbDumpOutcome,
) {
    if !ctx.settings.alert_enabled {
        return;
    }
    let failures: Vec<String> = outcome.failures().iter().map(|f| f.to_string()).collect();
    let mut notification = Notification::new(
        NotifyEvent::DbCredentials,
        NotifyLevel::Error,
        format!("db-credentials: {}", ctx.hostname),
        format!(
            "database credentials need attention on {}:\n{}",
            ctx.hostname,
            failures.join("\n")
        ),
    );
    if let Some(recipient) = &ctx.options.notify_email {
        notification = notification.recipient(recipient);
    }
    let _ = ctx.notifier.notify(&notification).await;
}

/// Archive the snapshot's file tree and encrypt it in place.
async fn encrypt_snapshot(
    settings: &Settings,
    hostname: &str,
    snapshot: &SnapshotId,
) -> Result<(), EngineError> {
    let snapshot_dir = settings.host_root(hostname).join(snapshot.dir_name());
    let files_dir = snapshot_dir.join("files");
    if !files_dir.is_dir() {
        return Ok(());
    }
    let plain = snapshot_dir.join("files.tar.gz");
    let plain_for_task = plain.clone();
    let files_for_task = files_dir.clone();
    tokio::task::spawn_blocking(move || {
        tm_transport::archive::create_archive(&files_for_task, &plain_for_task, ArchiveFormat::TarGz)
    })
    .await
    .map_err(|e| EngineError::io(&plain, std::io::Error::other(e)))??;
    crypt::encrypt_file(settings, &plain).await?;
    std::fs::remove_file(&plain).map_err(|e| EngineError::io(&plain, e))?;
    Ok(())
}

/// Success notifications are globally suppressed unless the settings or the
/// host's `--notify-ok` ask for them.
pub(crate) fn should_notify_success(settings: &Settings, options: &JobOptions) -> bool {
    settings.alert_enabled && (settings.notify_ok || options.notify_ok)
}

/// Compact summary for logs and the backup-ok body.
pub(crate) fn summary_body(
    settings: &Settings,
    hostname: &str,
    options: &JobOptions,
    snapshot: Option<&SnapshotId>,
    duration: Duration,
) -> String {
    let host_root = settings.host_root(hostname);
    let disk_free = fs2::free_space(&settings.backup_root).unwrap_or(0);
    let snapshot_size = snapshot
        .map(|id| snapshots::tree_size(&host_root.join(id.dir_name())))
        .unwrap_or(0);
    let snapshot_count = snapshots::unique_date_count(&host_root).unwrap_or(0);
    format!(
        "host: {hostname}\nmode: {}\nsnapshot: {}\nduration: {}\nsnapshot size: {}\nsnapshots kept: {snapshot_count}\ndisk free: {}",
        options.mode,
        snapshot.map(|s| s.dir_name()).unwrap_or_else(|| "-".to_string()),
        format_elapsed(duration),
        human_bytes(snapshot_size),
        human_bytes(disk_free),
    )
}

/// Failure body: summary plus the rsync transfer log, the remote dump
/// output, and the bounded job log tail.
pub(crate) fn failure_body(
    summary: &str,
    failed_phases: &[&str],
    rsync_log: &std::path::Path,
    db_output: &str,
    job_log: &std::path::Path,
) -> String {
    let mut body = format!("{summary}\nfailed phases: {}\n", failed_phases.join(", "));
    let rsync_tail = tail_lines(rsync_log, TAIL_LINES);
    if !rsync_tail.is_empty() {
        body.push_str("\n--- rsync log ---\n");
        body.push_str(&rsync_tail.join("\n"));
        body.push('\n');
    }
    if !db_output.is_empty() {
        body.push_str("\n--- database dump output ---\n");
        body.push_str(db_output);
        body.push('\n');
    }
    let log_tail = tail_lines(job_log, TAIL_LINES);
    if !log_tail.is_empty() {
        body.push_str("\n--- job log (tail) ---\n");
        body.push_str(&log_tail.join("\n"));
        body.push('\n');
    }
    body
}

pub(crate) fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
