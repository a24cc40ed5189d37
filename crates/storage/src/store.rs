// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Directory-of-small-files state store.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;
use thiserror::Error;
use tracing::warn;

/// Errors from state store operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Marker file consumed by the scheduler's reload gate.
pub const RELOAD_MARKER: &str = ".reload_config";

/// One record per file under the state directory.
///
/// Keys are file names (`proc-web1.state`, `restore-web1-1700000123.state`).
/// Reads tolerate truncated or corrupt content: callers parsing a record get
/// `None` and the file is left for post-mortem inspection.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    /// Open a store rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|source| StorageError::Io { path: dir.clone(), source })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn io_err(&self, path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io { path: path.to_path_buf(), source }
    }

    /// Write a record, replacing any previous content (temp + rename).
    pub fn put(&self, key: &str, content: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        let tmp = self.dir.join(format!(".{key}.tmp"));
        std::fs::write(&tmp, content).map_err(|e| self.io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| self.io_err(&path, e))?;
        Ok(())
    }

    /// Write a typed record using its line serialization.
    pub fn put_record<T: std::fmt::Display>(&self, key: &str, record: &T) -> Result<(), StorageError> {
        self.put(key, &format!("{record}\n"))
    }

    /// Read raw content. `None` when the file does not exist.
    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_err(&path, e)),
        }
    }

    /// Read and parse a typed record. Corrupt content is skipped with a warning.
    pub fn get_record<T: FromStr>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(content) = self.get(key)? else {
            return Ok(None);
        };
        match content.trim().parse() {
            Ok(record) => Ok(Some(record)),
            Err(_) => {
                warn!(key, "skipping corrupt state record");
                Ok(None)
            }
        }
    }

    /// List keys with a prefix, most recently modified first.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut entries: Vec<(String, SystemTime)> = Vec::new();
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(&self.dir, e)),
        };
        for dirent in read_dir.flatten() {
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !name.starts_with(prefix) || name.ends_with(".tmp") {
                continue;
            }
            let mtime = dirent
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            entries.push((name, mtime));
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        Ok(entries.into_iter().map(|(name, _)| name).collect())
    }

    /// List and parse typed records with a prefix, most recent first.
    /// Corrupt records are skipped.
    pub fn list_records<T: FromStr>(&self, prefix: &str) -> Result<Vec<T>, StorageError> {
        let mut records = Vec::new();
        for key in self.list(prefix)? {
            if let Some(record) = self.get_record(&key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Remove a record. Missing files are fine.
    pub fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_err(&path, e)),
        }
    }

    /// Ask the scheduler to reload configuration on its next tick.
    pub fn mark_reload(&self) -> Result<(), StorageError> {
        self.put(RELOAD_MARKER, "")
    }

    /// Consume the reload marker. Returns whether it was present.
    pub fn take_reload(&self) -> Result<bool, StorageError> {
        let present = self.path(RELOAD_MARKER).exists();
        if present {
            self.delete(RELOAD_MARKER)?;
        }
        Ok(present)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
