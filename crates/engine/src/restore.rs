// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restore and delete tasks.
//!
//! Both are subordinate background jobs: the API returns "started" and the
//! client polls the task record. Restores copy or archive a snapshot
//! subtree; deletes remove a host's whole snapshot directory after the
//! roster entry is gone.

use crate::error::EngineError;
use crate::logs::{infer_status, pid_alive, tail_lines, JobLog, TAIL_LINES};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tm_core::{Clock, DeleteRecord, RestoreRecord, Settings, SystemClock, TaskStatus};
use tm_storage::StateStore;
use tm_transport::{archive, crypt, ArchiveFormat};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Restore listings hide tasks older than this.
const RESTORE_LISTING_DAYS: u64 = 30;

/// What a restore produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Copy the file tree (optionally path-scoped) to a target directory.
    #[default]
    Files,
    /// Copy database dumps to a target directory.
    Db,
    /// Produce an archive of the selected subtree.
    Archive,
}

tm_core::simple_display! {
    RestoreMode {
        Files => "files",
        Db => "db",
        Archive => "archive",
    }
}

/// A restore request as it arrives from the API.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub hostname: String,
    pub snapshot: String,
    /// Optional subpath inside `files/` or `sql/`.
    pub path: Option<String>,
    pub target: Option<PathBuf>,
    pub mode: RestoreMode,
    pub format: ArchiveFormat,
    /// Required to restore an encrypted-only snapshot.
    pub decrypt: bool,
}

/// Launches and tracks restore/delete tasks.
#[derive(Clone)]
pub struct RestoreManager {
    settings: Arc<Mutex<Settings>>,
    store: StateStore,
}

impl RestoreManager {
    pub fn new(settings: Arc<Mutex<Settings>>, store: StateStore) -> Self {
        Self { settings, store }
    }

    /// Start a restore task; returns its record immediately.
    pub fn start_restore(&self, request: RestoreRequest) -> Result<RestoreRecord, EngineError> {
        let settings = self.settings.lock().clone();
        let snapshot_dir =
            settings.host_root(&request.hostname).join(&request.snapshot);
        if !snapshot_dir.is_dir() {
            return Err(EngineError::UnknownSnapshot {
                hostname: request.hostname.clone(),
                snapshot: request.snapshot.clone(),
            });
        }
        if crypt::is_encrypted_only(&snapshot_dir) && !request.decrypt {
            return Err(EngineError::EncryptedSnapshot);
        }

        let started_at = SystemClock.epoch_secs();
        let id = format!("r-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        let logfile = format!("restore-{}-{started_at}.log", request.hostname);
        let record = RestoreRecord {
            id: id.clone(),
            pid: std::process::id(),
            hostname: request.hostname.clone(),
            snapshot: request.snapshot.clone(),
            started_at,
            status: TaskStatus::Running,
            logfile: logfile.clone(),
        };
        let key = RestoreRecord::key(&request.hostname, started_at);
        self.store.put_record(&key, &record)?;

        let store = self.store.clone();
        let log_path = settings.log_dir.join(&logfile);
        let mut final_record = record.clone();
        tokio::spawn(async move {
            let status = match run_restore(&settings, &request, &snapshot_dir, log_path).await {
                Ok(()) => TaskStatus::Completed,
                Err(e) => {
                    warn!(host = %request.hostname, error = %e, "restore failed");
                    TaskStatus::Failed
                }
            };
            final_record.status = status;
            if let Err(e) = store.put_record(&key, &final_record) {
                warn!(error = %e, "failed to persist restore outcome");
            }
        });

        info!(host = %record.hostname, id = %record.id, "restore started");
        Ok(record)
    }

    /// Restore records from the last 30 days, newest first, with dead-PID
    /// `running` records settled from their logs.
    pub fn list_restores(&self) -> Result<Vec<RestoreRecord>, EngineError> {
        let settings = self.settings.lock().clone();
        let horizon = SystemClock.epoch_secs().saturating_sub(RESTORE_LISTING_DAYS * 86_400);
        let mut records = Vec::new();
        for key in self.store.list("restore-")? {
            if !key.ends_with(".state") {
                continue;
            }
            let Some(mut record) = self.store.get_record::<RestoreRecord>(&key)? else {
                continue;
            };
            if record.started_at < horizon {
                continue;
            }
            if record.status == TaskStatus::Running && !pid_alive(record.pid) {
                let log_path = settings.log_dir.join(&record.logfile);
                record.status = match infer_status(&log_path) {
                    tm_core::JobStatus::Failed => TaskStatus::Failed,
                    _ => TaskStatus::Completed,
                };
                self.store.put_record(&key, &record)?;
            }
            records.push(record);
        }
        Ok(records)
    }

    /// Tail of a restore log plus whether the task still runs.
    pub fn restore_log(&self, logfile: &str) -> Result<(Vec<String>, bool), EngineError> {
        let settings = self.settings.lock().clone();
        let tail = tail_lines(&settings.log_dir.join(logfile), TAIL_LINES);
        let running = self
            .list_restores()?
            .iter()
            .any(|r| r.logfile == logfile && r.status == TaskStatus::Running);
        Ok((tail, running))
    }

    /// Delete a terminal restore record and its log.
    pub fn delete_restore(&self, id: &str) -> Result<(), EngineError> {
        let settings = self.settings.lock().clone();
        for key in self.store.list("restore-")? {
            let Some(record) = self.store.get_record::<RestoreRecord>(&key)? else {
                continue;
            };
            if record.id != id {
                continue;
            }
            if record.status == TaskStatus::Running && pid_alive(record.pid) {
                return Err(EngineError::RestoreRunning(id.to_string()));
            }
            self.store.delete(&key)?;
            let log_path = settings.log_dir.join(&record.logfile);
            if let Err(e) = std::fs::remove_file(&log_path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %log_path.display(), error = %e, "failed to remove restore log");
                }
            }
            return Ok(());
        }
        Err(EngineError::RestoreNotFound(id.to_string()))
    }

    /// Remove every terminal restore record.
    pub fn clear_restores(&self) -> Result<usize, EngineError> {
        let mut cleared = 0;
        for key in self.store.list("restore-")? {
            let Some(record) = self.store.get_record::<RestoreRecord>(&key)? else {
                continue;
            };
            if record.status == TaskStatus::Running && pid_alive(record.pid) {
                continue;
            }
            self.store.delete(&key)?;
            cleared += 1;
        }
        Ok(cleared)
    }

    /// Start a background deletion of a host's whole snapshot directory.
    pub fn start_delete(&self, hostname: &str) -> Result<DeleteRecord, EngineError> {
        let settings = self.settings.lock().clone();
        let record = DeleteRecord {
            pid: std::process::id(),
            hostname: hostname.to_string(),
            started_at: SystemClock.epoch_secs(),
            status: TaskStatus::Running,
        };
        let key = DeleteRecord::key(hostname);
        self.store.put_record(&key, &record)?;

        let store = self.store.clone();
        let host_root = settings.host_root(hostname);
        let mut final_record = record.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || {
                match std::fs::remove_dir_all(&host_root) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e),
                }
            })
            .await;
            final_record.status = match result {
                Ok(Ok(())) => TaskStatus::Completed,
                _ => TaskStatus::Failed,
            };
            if let Err(e) = store.put_record(&key, &final_record) {
                warn!(error = %e, "failed to persist delete outcome");
            }
        });

        info!(host = hostname, "snapshot tree deletion started");
        Ok(record)
    }

    /// All background delete task records.
    pub fn list_deletes(&self) -> Result<Vec<DeleteRecord>, EngineError> {
        Ok(self.store.list_records("delete-")?)
    }
}

/// The restore body, run off the API path.
async fn run_restore(
    settings: &Settings,
    request: &RestoreRequest,
    snapshot_dir: &Path,
    log_path: PathBuf,
) -> Result<(), EngineError> {
    let mut log = JobLog::create(log_path.clone()).map_err(|e| EngineError::io(&log_path, e))?;
    log.line(&format!(
        "restore of {}/{} starting (mode {})",
        request.hostname, request.snapshot, request.mode
    ));

    // Encrypted-only snapshots are unpacked into a scratch directory first.
    let mut source_root = snapshot_dir.to_path_buf();
    let _scratch;
    if crypt::is_encrypted_only(snapshot_dir) {
        log.line("decrypting snapshot archive");
        let scratch = tempfile::Builder::new()
            .prefix("tm-restore-")
            .tempdir()
            .map_err(|e| EngineError::io(snapshot_dir, e))?;
        let plain = scratch.path().join("files.tar.gz");
        crypt::decrypt_file(settings, &crypt::encrypted_archive_path(snapshot_dir), &plain).await?;
        let unpack_dir = scratch.path().to_path_buf();
        let plain_clone = plain.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let tar = flate2::read::GzDecoder::new(std::fs::File::open(&plain_clone)?);
            tar::Archive::new(tar).unpack(&unpack_dir)
        })
        .await
        .map_err(|e| EngineError::io(&plain, std::io::Error::other(e)))?
        .map_err(|e| EngineError::io(&plain, e))?;
        source_root = scratch.path().to_path_buf();
        _scratch = scratch;
    }

    let subtree = match request.mode {
        RestoreMode::Db => "sql",
        _ => "files",
    };
    let mut src = source_root.join(subtree);
    if let Some(path) = &request.path {
        src = src.join(path.trim_start_matches('/'));
    }
    if !src.exists() {
        log.error(&format!("source path does not exist: {}", src.display()));
        return Err(EngineError::io(
            &src,
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing restore source"),
        ));
    }

    let default_target = settings
        .backup_root
        .join("restore")
        .join(format!("{}-{}", request.hostname, request.snapshot));
    let target = request.target.clone().unwrap_or(default_target);

    match request.mode {
        RestoreMode::Files | RestoreMode::Db => {
            log.line(&format!("copying {} -> {}", src.display(), target.display()));
            let src_clone = src.clone();
            let target_clone = target.clone();
            tokio::task::spawn_blocking(move || copy_tree(&src_clone, &target_clone))
                .await
                .map_err(|e| EngineError::io(&target, std::io::Error::other(e)))??;
        }
        RestoreMode::Archive => {
            let archive_path = if target.extension().is_some() {
                target.clone()
            } else {
                std::fs::create_dir_all(&target).map_err(|e| EngineError::io(&target, e))?;
                target.join(format!(
                    "{}-{}.{}",
                    request.hostname,
                    request.snapshot,
                    request.format.extension()
                ))
            };
            log.line(&format!("archiving {} -> {}", src.display(), archive_path.display()));
            let format = request.format;
            let src_clone = src.clone();
            let archive_clone = archive_path.clone();
            tokio::task::spawn_blocking(move || {
                archive::create_archive(&src_clone, &archive_clone, format)
            })
            .await
            .map_err(|e| EngineError::io(&archive_path, std::io::Error::other(e)))??;
        }
    }

    log.line("restore finished");
    Ok(())
}

/// Recursive copy preserving directory structure and symlinks.
fn copy_tree(src: &Path, dest: &Path) -> Result<(), EngineError> {
    if src.is_file() {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }
        std::fs::copy(src, dest).map_err(|e| EngineError::io(dest, e))?;
        return Ok(());
    }
    for entry in WalkDir::new(src).into_iter().flatten() {
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let out = dest.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&out).map_err(|e| EngineError::io(&out, e))?;
        } else if file_type.is_symlink() {
            let link_target =
                std::fs::read_link(entry.path()).map_err(|e| EngineError::io(entry.path(), e))?;
            let _ = std::fs::remove_file(&out);
            #[cfg(unix)]
            std::os::unix::fs::symlink(link_target, &out)
                .map_err(|e| EngineError::io(&out, e))?;
        } else {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
            }
            std::fs::copy(entry.path(), &out).map_err(|e| EngineError::io(&out, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "restore_tests.rs"]
mod tests;
