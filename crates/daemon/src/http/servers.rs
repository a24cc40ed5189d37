// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roster management endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path as UrlPath, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tm_core::{BackupMode, Roster, ServerEntry};

#[derive(Debug, Serialize)]
pub(crate) struct ServerDto {
    pub hostname: String,
    pub priority: i32,
    pub db_interval: Option<u32>,
    pub mode: String,
    pub rotate: bool,
    pub notify_email: Option<String>,
    pub notify_ok: bool,
    pub extra_options: Vec<String>,
}

impl From<ServerEntry> for ServerDto {
    fn from(entry: ServerEntry) -> Self {
        Self {
            hostname: entry.hostname,
            priority: entry.priority,
            db_interval: entry.db_interval_hours,
            mode: entry.mode.to_string(),
            rotate: entry.rotate,
            notify_email: entry.notify_email,
            notify_ok: entry.notify_ok,
            extra_options: entry.extra_options,
        }
    }
}

fn rosters(state: &AppState) -> (Roster, Roster) {
    let settings = state.settings.lock();
    (Roster::new(settings.roster_path()), Roster::new(settings.archive_roster_path()))
}

/// GET /api/servers
pub(crate) async fn list(State(state): State<AppState>) -> Result<Json<Vec<ServerDto>>, ApiError> {
    let (active, _) = rosters(&state);
    Ok(Json(active.read()?.into_iter().map(ServerDto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct AppendBody {
    pub hostname: String,
    #[serde(default)]
    pub options: Option<String>,
}

/// POST /api/servers — append; duplicate hostnames conflict.
pub(crate) async fn append(
    State(state): State<AppState>,
    Json(body): Json<AppendBody>,
) -> Result<Json<ServerDto>, ApiError> {
    let line = match &body.options {
        Some(options) if !options.trim().is_empty() => {
            format!("{} {}", body.hostname, options.trim())
        }
        _ => body.hostname.clone(),
    };
    let entry = ServerEntry::parse(&line)?;
    let (active, _) = rosters(&state);
    active.append(&entry)?;
    Ok(Json(entry.into()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateBody {
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub db_interval: Option<u32>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub no_rotate: Option<bool>,
    #[serde(default)]
    pub notify_email: Option<String>,
    #[serde(default)]
    pub notify_ok: Option<bool>,
}

/// PUT /api/servers/{host} — replace in place.
pub(crate) async fn update(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<ServerDto>, ApiError> {
    let (active, _) = rosters(&state);
    let mut entry = active
        .find(&host)?
        .ok_or_else(|| ApiError::not_found(format!("host not found: {host}")))?;
    if let Some(priority) = body.priority {
        if !(1..=999).contains(&priority) {
            return Err(ApiError::bad_request("priority out of range 1..=999"));
        }
        entry.priority = priority;
    }
    if let Some(hours) = body.db_interval {
        entry.db_interval_hours = (hours > 0).then_some(hours);
    }
    if let Some(mode) = &body.mode {
        entry.mode = mode
            .parse::<BackupMode>()
            .map_err(|_| ApiError::bad_request(format!("unknown mode {mode:?}")))?;
    }
    if let Some(no_rotate) = body.no_rotate {
        entry.rotate = !no_rotate;
    }
    if let Some(email) = &body.notify_email {
        entry.notify_email = (!email.is_empty()).then(|| email.clone());
    }
    if let Some(notify_ok) = body.notify_ok {
        entry.notify_ok = notify_ok;
    }
    active.update(&entry)?;
    Ok(Json(entry.into()))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RemoveQuery {
    #[serde(default)]
    pub action: Option<String>,
}

/// DELETE /api/servers/{host}?action=archive|delete
pub(crate) async fn remove(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (active, archive) = rosters(&state);
    match query.action.as_deref().unwrap_or("archive") {
        "archive" => {
            active.move_to(&archive, &host)?;
            Ok(Json(serde_json::json!({ "status": "archived", "hostname": host })))
        }
        "delete" => {
            // Drop the entry wherever it lives, then clear the tree in the
            // background. A 50 GB host directory is not a request-scoped job.
            let in_active = active.remove(&host).is_ok();
            let in_archive = archive.remove(&host).is_ok();
            if !in_active && !in_archive {
                return Err(ApiError::not_found(format!("host not found: {host}")));
            }
            state.restores.start_delete(&host)?;
            Ok(Json(serde_json::json!({ "status": "deleting", "hostname": host })))
        }
        other => Err(ApiError::bad_request(format!("unknown action {other:?}"))),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ArchivedDto {
    pub servers: Vec<ServerDto>,
    pub deletes: Vec<DeleteDto>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteDto {
    pub hostname: String,
    pub started_at: u64,
    pub status: String,
}

/// GET /api/archived — archived hosts plus background delete-task states.
pub(crate) async fn archived(State(state): State<AppState>) -> Result<Json<ArchivedDto>, ApiError> {
    let (_, archive) = rosters(&state);
    let servers = archive.read()?.into_iter().map(ServerDto::from).collect();
    let deletes = state
        .restores
        .list_deletes()?
        .into_iter()
        .map(|d| DeleteDto {
            hostname: d.hostname,
            started_at: d.started_at,
            status: d.status.to_string(),
        })
        .collect();
    Ok(Json(ArchivedDto { servers, deletes }))
}

/// POST /api/archived/{host}/unarchive
pub(crate) async fn unarchive(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
) -> Result<Json<ServerDto>, ApiError> {
    let (active, archive) = rosters(&state);
    let entry = archive.move_to(&active, &host)?;
    Ok(Json(entry.into()))
}

/// DELETE /api/archived/{host} — drop the archive entry and purge snapshots.
pub(crate) async fn purge_archived(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_, archive) = rosters(&state);
    archive.remove(&host)?;
    state.restores.start_delete(&host)?;
    Ok(Json(serde_json::json!({ "status": "deleting", "hostname": host })))
}
