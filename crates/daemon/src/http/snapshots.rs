// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot listing, browsing, and archive downloads.

use super::{ApiError, AppState};
use axum::body::Body;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{Local, Months};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tm_transport::{snapshots, ArchiveFormat};
use tokio_util::io::ReaderStream;

#[derive(Debug, Serialize)]
pub(crate) struct SnapshotDto {
    pub date: String,
    pub size: u64,
    pub has_files: bool,
    pub has_db: bool,
}

/// GET /api/snapshots/{host} — snapshots of the last three calendar months.
pub(crate) async fn list_snapshots(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
) -> Result<Json<Vec<SnapshotDto>>, ApiError> {
    let host_root = state.settings.lock().host_root(&host);
    let horizon = Local::now()
        .date_naive()
        .checked_sub_months(Months::new(3))
        .unwrap_or(Local::now().date_naive());
    let mut out = Vec::new();
    for id in snapshots::list_snapshots(&host_root)?.into_iter().rev() {
        if id.date() < horizon {
            continue;
        }
        let dir = host_root.join(id.dir_name());
        out.push(SnapshotDto {
            date: id.dir_name(),
            size: snapshots::tree_size(&dir),
            has_files: dir.join("files").is_dir(),
            has_db: dir.join("sql").is_dir(),
        });
    }
    Ok(Json(out))
}

/// Reject traversal: every component must be a plain name.
fn sanitize_rel_path(path: &str) -> Result<PathBuf, ApiError> {
    let rel = Path::new(path.trim_start_matches('/'));
    for component in rel.components() {
        match component {
            Component::Normal(_) => {}
            _ => return Err(ApiError::bad_request("invalid path")),
        }
    }
    Ok(rel.to_path_buf())
}

fn snapshot_dir(state: &AppState, host: &str, date: &str) -> Result<PathBuf, ApiError> {
    // The date segment is a snapshot directory name, never a free path.
    date.parse::<tm_core::SnapshotId>()
        .map_err(|_| ApiError::bad_request("invalid snapshot name"))?;
    let dir = state.settings.lock().host_root(host).join(date);
    if !dir.is_dir() {
        return Err(ApiError::not_found(format!("no snapshot {date} for {host}")));
    }
    Ok(dir)
}

#[derive(Debug, Serialize)]
pub(crate) struct BrowseEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub size: u64,
}

fn list_children(dir: &Path) -> Result<Vec<BrowseEntry>, ApiError> {
    let mut entries = Vec::new();
    for dirent in std::fs::read_dir(dir)?.flatten() {
        let Ok(file_type) = dirent.file_type() else {
            continue;
        };
        let kind = if file_type.is_dir() {
            "dir"
        } else if file_type.is_symlink() {
            "symlink"
        } else {
            "file"
        };
        let size = if file_type.is_file() {
            dirent.metadata().map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };
        entries.push(BrowseEntry {
            name: dirent.file_name().to_string_lossy().into_owned(),
            kind,
            size,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// GET /api/browse/{host}/{date} — the snapshot's own subtrees.
pub(crate) async fn browse_root(
    State(state): State<AppState>,
    UrlPath((host, date)): UrlPath<(String, String)>,
) -> Result<Json<Vec<BrowseEntry>>, ApiError> {
    let dir = snapshot_dir(&state, &host, &date)?;
    Ok(Json(list_children(&dir)?))
}

/// GET /api/browse/{host}/{date}/{*path} — one level deep.
pub(crate) async fn browse(
    State(state): State<AppState>,
    UrlPath((host, date, path)): UrlPath<(String, String, String)>,
) -> Result<Json<Vec<BrowseEntry>>, ApiError> {
    let dir = snapshot_dir(&state, &host, &date)?.join(sanitize_rel_path(&path)?);
    if !dir.is_dir() {
        return Err(ApiError::not_found("no such snapshot path"));
    }
    Ok(Json(list_children(&dir)?))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DownloadQuery {
    format: Option<String>,
}

/// GET /api/download/{host}/{date}/{*path}?format=zip|tar.gz
///
/// Streams an archive of the resolved subtree. The archive is produced
/// into an unlinked temp file first; downloads may run arbitrarily long.
pub(crate) async fn download(
    State(state): State<AppState>,
    UrlPath((host, date, path)): UrlPath<(String, String, String)>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let format: ArchiveFormat = match query.format.as_deref() {
        None => ArchiveFormat::TarGz,
        Some(name) => name
            .parse()
            .map_err(|_| ApiError::bad_request(format!("unknown archive format {name:?}")))?,
    };
    let src = snapshot_dir(&state, &host, &date)?.join(sanitize_rel_path(&path)?);
    if !src.exists() {
        return Err(ApiError::not_found("no such snapshot path"));
    }

    let tmp = tempfile::NamedTempFile::new()?;
    let tmp_path = tmp.path().to_path_buf();
    let src_clone = src.clone();
    tokio::task::spawn_blocking(move || {
        tm_transport::archive::create_archive(&src_clone, &tmp_path, format)
    })
    .await
    .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))??;

    let file = tokio::fs::File::open(tmp.path()).await?;
    // The open handle keeps the bytes alive; the temp file can unlink now.
    drop(tmp);

    let base = src
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let filename = format!("{host}-{date}-{base}.{}", format.extension());
    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(body)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
