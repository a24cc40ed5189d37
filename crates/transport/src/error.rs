// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::dbdump::DbFailure;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rsync exited with code {code}")]
    Rsync { code: i32 },
    #[error("ssh exited with code {code}")]
    Ssh { code: i32 },
    #[error("database dump failed: {0}")]
    DbDump(DbFailure),
    #[error("gpg exited with code {code}")]
    Gpg { code: i32 },
    #[error("no previous snapshot to restore from: {0}")]
    NoSnapshot(String),
    #[error("snapshot is encrypted; decryption not requested")]
    EncryptedSnapshot,
}

impl TransportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransportError::Io { path: path.into(), source }
    }
}
