// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP control surface.
//!
//! A single axum listener serves JSON for everything except archive
//! downloads and the static dashboard stubs. Every response carries
//! permissive CORS headers; unknown routes return a JSON 404.

mod assets;
mod backups;
mod restores;
mod servers;
mod settings;
mod snapshots;
mod status;

use crate::lifecycle::{DaemonState, LifecycleError};
use axum::extract::Request;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

pub(crate) type AppState = Arc<DaemonState>;

/// API error carried to the client as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<tm_engine::EngineError> for ApiError {
    fn from(e: tm_engine::EngineError) -> Self {
        use tm_engine::EngineError as E;
        let status = match &e {
            E::AlreadyRunning(_) | E::RestoreRunning(_) => StatusCode::CONFLICT,
            E::NotRunning(_) | E::UnknownSnapshot { .. } | E::RestoreNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            E::EncryptedSnapshot => StatusCode::BAD_REQUEST,
            E::Lock(tm_engine::LockError::Conflict { .. }) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<tm_core::RosterError> for ApiError {
    fn from(e: tm_core::RosterError) -> Self {
        use tm_core::RosterError as R;
        let status = match &e {
            R::DuplicateHost(_) => StatusCode::CONFLICT,
            R::NotFound(_) => StatusCode::NOT_FOUND,
            R::Parse { .. } => StatusCode::BAD_REQUEST,
            R::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

impl From<tm_storage::StorageError> for ApiError {
    fn from(e: tm_storage::StorageError) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<tm_core::SettingsError> for ApiError {
    fn from(e: tm_core::SettingsError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

impl From<tm_transport::TransportError> for ApiError {
    fn from(e: tm_transport::TransportError) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        let status = match e.kind() {
            std::io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, e.to_string())
    }
}

/// Permissive CORS on every response; the dashboard may be served from
/// anywhere.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("Content-Type"));
    response
}

async fn not_found() -> ApiError {
    ApiError::not_found("no such route")
}

/// Build the full API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(status::api_status))
        .route("/api/processes", get(status::api_processes))
        .route("/api/system", get(status::api_system))
        .route("/api/disk", get(status::api_disk))
        .route("/api/backup/{host}", post(backups::start_backup).delete(backups::cancel_backup))
        .route("/api/logs/{host}", get(backups::host_logs))
        .route("/api/failures", get(backups::failures))
        .route("/api/history", get(backups::history))
        .route("/api/snapshots/{host}", get(snapshots::list_snapshots))
        .route("/api/browse/{host}/{date}", get(snapshots::browse_root))
        .route("/api/browse/{host}/{date}/{*path}", get(snapshots::browse))
        .route("/api/download/{host}/{date}/{*path}", get(snapshots::download))
        .route("/api/restore/{id}", post(restores::start_restore).delete(restores::delete_restore))
        .route("/api/restores", get(restores::list_restores).delete(restores::clear_restores))
        .route("/api/restore-log/{name}", get(restores::restore_log))
        .route("/api/servers", get(servers::list).post(servers::append))
        .route("/api/servers/{host}", axum::routing::put(servers::update).delete(servers::remove))
        .route("/api/archived", get(servers::archived))
        .route("/api/archived/{host}/unarchive", post(servers::unarchive))
        .route("/api/archived/{host}", delete(servers::purge_archived))
        .route("/api/excludes", get(settings::get_global_excludes).put(settings::put_global_excludes))
        .route(
            "/api/excludes/{host}",
            get(settings::get_host_excludes).put(settings::put_host_excludes),
        )
        .route("/api/settings", get(settings::get_settings).put(settings::put_settings))
        .route("/api/ssh-key", get(settings::ssh_key))
        .route("/api/ssh-key/raw", get(settings::ssh_key_raw))
        .route("/", get(assets::index))
        .route("/style.css", get(assets::style))
        .route("/app.js", get(assets::app_js))
        .route("/favicon.ico", get(assets::favicon))
        .fallback(not_found)
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Bind and serve until the shutdown token fires.
pub async fn serve(
    state: AppState,
    shutdown: tokio_util::sync::CancellationToken,
) -> Result<(), LifecycleError> {
    let (bind, port) = {
        let settings = state.settings.lock();
        (settings.api_bind.clone(), settings.api_port)
    };
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LifecycleError::Bind { addr: addr.clone(), source: e })?;
    info!(%addr, "api listening");
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("api shutting down");
        })
        .await
        .map_err(|e| LifecycleError::Io { path: std::path::PathBuf::from(addr), source: e })
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
