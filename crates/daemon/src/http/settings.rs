// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Settings, exclude lists, and SSH key endpoints.

use super::{ApiError, AppState};
use axum::extract::{Path as UrlPath, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// GET /api/settings — known keys only.
pub(crate) async fn get_settings(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, String>> {
    Json(state.settings.lock().to_map())
}

/// PUT /api/settings — write known keys, then ask the scheduler to reload.
pub(crate) async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<BTreeMap<String, Value>>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    let mut updated = state.settings.lock().clone();
    for (key, value) in &body {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Null => String::new(),
            other => return Err(ApiError::bad_request(format!("{key}: unsupported value {other}"))),
        };
        if !updated.apply_key(key, &value)? {
            return Err(ApiError::bad_request(format!("unknown settings key {key:?}")));
        }
    }
    updated.save(&state.env_path)?;
    // Anything that captured the old settings regenerates on the next tick.
    state.store.mark_reload()?;
    *state.settings.lock() = updated.clone();
    Ok(Json(updated.to_map()))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExcludesBody {
    pub content: String,
}

fn read_excludes(path: &Path) -> Json<serde_json::Value> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    Json(serde_json::json!({ "content": content }))
}

fn write_excludes(path: &Path, content: &str) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// GET /api/excludes
pub(crate) async fn get_global_excludes(State(state): State<AppState>) -> Json<serde_json::Value> {
    read_excludes(&state.settings.lock().global_excludes_path())
}

/// PUT /api/excludes
pub(crate) async fn put_global_excludes(
    State(state): State<AppState>,
    Json(body): Json<ExcludesBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.settings.lock().global_excludes_path();
    write_excludes(&path, &body.content)?;
    Ok(Json(serde_json::json!({ "status": "saved" })))
}

/// GET /api/excludes/{host}
pub(crate) async fn get_host_excludes(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
) -> Json<serde_json::Value> {
    read_excludes(&state.settings.lock().host_excludes_path(&host))
}

/// PUT /api/excludes/{host}
pub(crate) async fn put_host_excludes(
    State(state): State<AppState>,
    UrlPath(host): UrlPath<String>,
    Json(body): Json<ExcludesBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.settings.lock().host_excludes_path(&host);
    write_excludes(&path, &body.content)?;
    Ok(Json(serde_json::json!({ "status": "saved" })))
}

/// GET /api/ssh-key — the public key the remote hosts must authorize.
pub(crate) async fn ssh_key(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.settings.lock().ssh_pubkey_path();
    let key = std::fs::read_to_string(&path)
        .map_err(|_| ApiError::not_found(format!("no public key at {}", path.display())))?;
    Ok(Json(serde_json::json!({ "key": key.trim() })))
}

/// GET /api/ssh-key/raw — plaintext for `curl >> authorized_keys`.
pub(crate) async fn ssh_key_raw(State(state): State<AppState>) -> Result<String, ApiError> {
    let path = state.settings.lock().ssh_pubkey_path();
    std::fs::read_to_string(&path)
        .map_err(|_| ApiError::not_found(format!("no public key at {}", path.display())))
}
