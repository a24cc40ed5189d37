// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore task endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path as UrlPath, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tm_core::RestoreRecord;
use tm_engine::{RestoreMode, RestoreRequest};
use tm_transport::ArchiveFormat;

#[derive(Debug, Deserialize)]
pub(crate) struct RestoreBody {
    pub snapshot: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub decrypt: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct RestoreDto {
    pub id: String,
    pub pid: u32,
    pub hostname: String,
    pub snapshot: String,
    pub started_at: u64,
    pub status: String,
    pub logfile: String,
}

impl From<RestoreRecord> for RestoreDto {
    fn from(record: RestoreRecord) -> Self {
        Self {
            id: record.id,
            pid: record.pid,
            hostname: record.hostname,
            snapshot: record.snapshot,
            started_at: record.started_at,
            status: record.status.to_string(),
            logfile: record.logfile,
        }
    }
}

/// POST /api/restore/{host}
pub(crate) async fn start_restore(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
    Json(body): Json<RestoreBody>,
) -> Result<Json<RestoreDto>, ApiError> {
    let mode = match body.mode.as_deref() {
        None | Some("files") | Some("full") => RestoreMode::Files,
        Some("db") | Some("sql") => RestoreMode::Db,
        Some("archive") => RestoreMode::Archive,
        Some(other) => {
            return Err(ApiError::bad_request(format!("unknown restore mode {other:?}")))
        }
    };
    let format = match body.format.as_deref() {
        None => ArchiveFormat::TarGz,
        Some(name) => name
            .parse()
            .map_err(|_| ApiError::bad_request(format!("unknown archive format {name:?}")))?,
    };
    let record = state.restores.start_restore(RestoreRequest {
        hostname: host,
        snapshot: body.snapshot,
        path: body.path,
        target: body.target.map(PathBuf::from),
        mode,
        format,
        decrypt: body.decrypt,
    })?;
    Ok(Json(record.into()))
}

/// GET /api/restores — last 30 days, dead PIDs reconciled.
pub(crate) async fn list_restores(
    State(state): State<AppState>,
) -> Result<Json<Vec<RestoreDto>>, ApiError> {
    Ok(Json(state.restores.list_restores()?.into_iter().map(RestoreDto::from).collect()))
}

#[derive(Debug, Serialize)]
pub(crate) struct RestoreLogDto {
    pub running: bool,
    pub lines: Vec<String>,
}

/// GET /api/restore-log/{name}
pub(crate) async fn restore_log(
    State(state): State<AppState>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<RestoreLogDto>, ApiError> {
    if name.contains('/') || name.contains("..") {
        return Err(ApiError::bad_request("invalid log name"));
    }
    let (lines, running) = state.restores.restore_log(&name)?;
    Ok(Json(RestoreLogDto { running, lines }))
}

/// DELETE /api/restore/{id}
pub(crate) async fn delete_restore(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.restores.delete_restore(&id)?;
    Ok(Json(serde_json::json!({ "status": "deleted", "id": id })))
}

/// DELETE /api/restores — clear all terminal restore records.
pub(crate) async fn clear_restores(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cleared = state.restores.clear_restores()?;
    Ok(Json(serde_json::json!({ "status": "cleared", "count": cleared })))
}
