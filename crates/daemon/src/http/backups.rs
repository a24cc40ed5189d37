// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backup job control, per-host logs, failures, and history.

use super::{ApiError, AppState};
use axum::extract::{Path as UrlPath, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tm_core::{BackupMode, JobStatus, Roster, Trigger};
use tm_engine::logs::{tail_lines, FAILURE_MARKERS, TAIL_LINES};
use tm_engine::JobOptions;
use tm_transport::snapshots;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct BackupQuery {
    #[serde(rename = "files-only", default)]
    files_only: Option<String>,
    #[serde(rename = "db-only", default)]
    db_only: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LaunchedDto {
    pub pid: u32,
    pub logfile: String,
}

/// POST /api/backup/{host}?files-only|db-only
pub(crate) async fn start_backup(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
    Query(query): Query<BackupQuery>,
) -> Result<Json<LaunchedDto>, ApiError> {
    let roster = Roster::new(state.settings.lock().roster_path());
    let mut options = match roster.find(&host)? {
        Some(entry) => JobOptions::from_entry(&entry),
        // Unknown hosts may still be backed up ad hoc.
        None => JobOptions { rotate: true, ..JobOptions::default() },
    };
    if query.files_only.is_some() {
        options = options.with_mode(BackupMode::FilesOnly);
    } else if query.db_only.is_some() {
        options = options.with_mode(BackupMode::DbOnly);
    }
    let handle = state.supervisor.launch(&host, options, Trigger::Api)?;
    Ok(Json(LaunchedDto { pid: handle.pid, logfile: handle.logfile }))
}

/// DELETE /api/backup/{host}
pub(crate) async fn cancel_backup(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.supervisor.cancel(&host).await?;
    Ok(Json(serde_json::json!({ "status": "killed", "hostname": host })))
}

#[derive(Debug, Serialize)]
pub(crate) struct HostLogsDto {
    pub running: bool,
    pub lines: Vec<String>,
    pub logs: Vec<String>,
}

/// GET /api/logs/{host} — tail of the newest job log plus the available set.
pub(crate) async fn host_logs(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
) -> Result<Json<HostLogsDto>, ApiError> {
    let log_dir = state.settings.lock().log_dir.clone();
    let mut logs: Vec<(String, std::time::SystemTime)> = Vec::new();
    let prefix = format!("backup-{host}-");
    if let Ok(read_dir) = std::fs::read_dir(&log_dir) {
        for dirent in read_dir.flatten() {
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !name.starts_with(&prefix) || !name.ends_with(".log") {
                continue;
            }
            let mtime = dirent
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            logs.push((name, mtime));
        }
    }
    logs.sort_by(|a, b| b.1.cmp(&a.1));
    let names: Vec<String> = logs.into_iter().map(|(name, _)| name).collect();

    let lines = names
        .first()
        .map(|newest| tail_lines(&log_dir.join(newest), TAIL_LINES))
        .unwrap_or_default();
    let running = state
        .supervisor
        .observe(&host)?
        .map(|r| r.status == JobStatus::Running)
        .unwrap_or(false);
    Ok(Json(HostLogsDto { running, lines, logs: names }))
}

#[derive(Debug, Serialize)]
pub(crate) struct FailureDto {
    pub logfile: String,
    pub lines: Vec<String>,
    pub modified: u64,
}

/// GET /api/failures — recent failure markers grouped by host, newest first.
pub(crate) async fn failures(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Vec<FailureDto>>>, ApiError> {
    let log_dir = state.settings.lock().log_dir.clone();
    let mut files: Vec<(String, std::time::SystemTime)> = Vec::new();
    if let Ok(read_dir) = std::fs::read_dir(&log_dir) {
        for dirent in read_dir.flatten() {
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !name.starts_with("backup-") || !name.ends_with(".log") {
                continue;
            }
            let mtime = dirent
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            files.push((name, mtime));
        }
    }
    files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut grouped: BTreeMap<String, Vec<FailureDto>> = BTreeMap::new();
    for (name, mtime) in files.into_iter().take(200) {
        let Some(host) = host_from_log_name(&name) else {
            continue;
        };
        let matches: Vec<String> = tail_lines(&log_dir.join(&name), TAIL_LINES)
            .into_iter()
            .filter(|line| FAILURE_MARKERS.iter().any(|marker| line.contains(marker)))
            .take(5)
            .collect();
        if matches.is_empty() {
            continue;
        }
        let modified = mtime
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        grouped
            .entry(host)
            .or_default()
            .push(FailureDto { logfile: name, lines: matches, modified });
    }
    Ok(Json(grouped))
}

/// Pull the hostname out of `backup-<host>-<YYYYmmdd>-<HHMMSS>.log`.
fn host_from_log_name(name: &str) -> Option<String> {
    let stem = name.strip_prefix("backup-")?.strip_suffix(".log")?;
    // The trailing two dash-separated fields are the timestamp.
    let mut parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < 3 {
        return None;
    }
    parts.truncate(parts.len() - 2);
    Some(parts.join("-"))
}

#[derive(Debug, Serialize)]
pub(crate) struct HistoryDto {
    pub hostname: String,
    pub last_backup: Option<String>,
    pub snapshots: usize,
    pub total_size: u64,
    pub status: String,
}

/// GET /api/history — per-host summary derived from the snapshot tree.
pub(crate) async fn history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryDto>>, ApiError> {
    let backup_root = state.settings.lock().backup_root.clone();
    let mut entries = Vec::new();
    if let Ok(read_dir) = std::fs::read_dir(&backup_root) {
        for dirent in read_dir.flatten() {
            if !dirent.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let hostname = dirent.file_name().to_string_lossy().into_owned();
            if hostname == "restore" {
                continue;
            }
            let host_root = dirent.path();
            let ids = snapshots::list_snapshots(&host_root)?;
            if ids.is_empty() {
                continue;
            }
            let status = state
                .supervisor
                .observe(&hostname)?
                .map(|r| r.status.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            entries.push(HistoryDto {
                hostname,
                last_backup: ids.last().map(|id| id.dir_name()),
                snapshots: snapshots::unique_date_count(&host_root)?,
                total_size: snapshots::tree_size(&host_root),
                status,
            });
        }
    }
    entries.sort_by(|a, b| a.hostname.cmp(&b.hostname));
    Ok(Json(entries))
}
