// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status, process listing, and host introspection endpoints.

use super::{ApiError, AppState};
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::path::Path;
use tm_core::ProcessRecord;

#[derive(Debug, Serialize)]
pub(crate) struct ProcessDto {
    pub pid: u32,
    pub hostname: String,
    pub mode: String,
    pub started_at: u64,
    pub status: String,
    pub logfile: String,
    pub trigger: String,
}

impl From<ProcessRecord> for ProcessDto {
    fn from(record: ProcessRecord) -> Self {
        // Log files are reported by base name; clients resolve them through
        // the logs endpoint, never by absolute path.
        let logfile = Path::new(&record.logfile)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or(record.logfile);
        Self {
            pid: record.pid,
            hostname: record.hostname,
            mode: record.mode.to_string(),
            started_at: record.started_at,
            status: record.status.to_string(),
            logfile,
            trigger: record.trigger.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusDto {
    pub status: &'static str,
    pub uptime: u64,
    pub hostname: String,
    pub version: &'static str,
    pub processes: Vec<ProcessDto>,
}

/// GET /api/status — also reconciles dead-PID records as a side effect.
pub(crate) async fn api_status(State(state): State<AppState>) -> Result<Json<StatusDto>, ApiError> {
    let processes = state.supervisor.list()?.into_iter().map(ProcessDto::from).collect();
    Ok(Json(StatusDto {
        status: "ok",
        uptime: state.start_time.elapsed().as_secs(),
        hostname: sysinfo::System::host_name().unwrap_or_else(|| "unknown".to_string()),
        version: crate::VERSION,
        processes,
    }))
}

/// GET /api/processes
pub(crate) async fn api_processes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProcessDto>>, ApiError> {
    Ok(Json(state.supervisor.list()?.into_iter().map(ProcessDto::from).collect()))
}

#[derive(Debug, Serialize)]
pub(crate) struct SystemDto {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    pub cpu_count: usize,
    pub mem_total: u64,
    pub mem_used: u64,
    pub mem_available: u64,
    pub mem_percent: f64,
    pub os: String,
    pub kernel: String,
    pub sys_uptime: u64,
}

/// GET /api/system
pub(crate) async fn api_system(State(_state): State<AppState>) -> Json<SystemDto> {
    let system = sysinfo::System::new_all();
    let load = sysinfo::System::load_average();
    let total = system.total_memory();
    let available = system.available_memory();
    let used = total.saturating_sub(available);
    Json(SystemDto {
        load1: load.one,
        load5: load.five,
        load15: load.fifteen,
        cpu_count: system.cpus().len(),
        mem_total: total,
        mem_used: used,
        mem_available: available,
        mem_percent: if total > 0 { used as f64 * 100.0 / total as f64 } else { 0.0 },
        os: sysinfo::System::long_os_version().unwrap_or_else(|| "unknown".to_string()),
        kernel: sysinfo::System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        sys_uptime: sysinfo::System::uptime(),
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct DiskDto {
    pub path: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub percent: f64,
}

/// GET /api/disk — usage of the backup root filesystem.
pub(crate) async fn api_disk(State(state): State<AppState>) -> Result<Json<DiskDto>, ApiError> {
    let backup_root = state.settings.lock().backup_root.clone();
    let total = fs2::total_space(&backup_root)?;
    let available = fs2::available_space(&backup_root)?;
    let used = total.saturating_sub(available);
    Ok(Json(DiskDto {
        path: backup_root.display().to_string(),
        total,
        used,
        available,
        percent: if total > 0 { used as f64 * 100.0 / total as f64 } else { 0.0 },
    }))
}
