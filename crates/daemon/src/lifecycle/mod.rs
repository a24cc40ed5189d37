// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration paths, singleton lock, startup.

mod startup;
pub use startup::{startup, DaemonState};

use std::path::PathBuf;
use thiserror::Error;
use tm_core::SettingsError;
use tm_storage::StorageError;

/// Default environment file location.
pub const DEFAULT_ENV_FILE: &str = "/etc/tmservice/tmservice.env";

/// Errors that prevent the daemon from starting
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("another tmserviced already holds the lock")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind api listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve the environment file path: CLI flag, then `TM_ENV_FILE`,
/// then the packaged default.
pub fn env_file_path(cli_override: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_override {
        return path;
    }
    if let Ok(path) = std::env::var("TM_ENV_FILE") {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_ENV_FILE)
}
