// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::lock::LockError;
use std::path::PathBuf;
use thiserror::Error;
use tm_storage::StorageError;
use tm_transport::TransportError;

/// Errors from engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("a job for {0} is already running")]
    AlreadyRunning(String),
    #[error("no job running for {0}")]
    NotRunning(String),
    #[error("unknown snapshot {snapshot} for {hostname}")]
    UnknownSnapshot { hostname: String, snapshot: String },
    #[error("restore task not found: {0}")]
    RestoreNotFound(String),
    #[error("restore task {0} is still running")]
    RestoreRunning(String),
    #[error("snapshot is encrypted; pass decrypt=true to restore it")]
    EncryptedSnapshot,
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io { path: path.into(), source }
    }
}
