// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and initialization logic.

use super::LifecycleError;
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tm_adapters::LogNotifier;
use tm_core::{Settings, SystemClock};
use tm_engine::{RestoreManager, Supervisor};
use tm_storage::{Cursors, StateStore};
use tracing::info;

/// Everything the scheduler and the HTTP API share.
pub struct DaemonState {
    pub env_path: PathBuf,
    pub settings: Arc<Mutex<Settings>>,
    pub store: StateStore,
    pub cursors: Cursors,
    pub supervisor: Arc<Supervisor<LogNotifier, SystemClock>>,
    pub restores: RestoreManager,
    pub notifier: LogNotifier,
    pub start_time: Instant,
    // NOTE(lifetime): held to maintain the exclusive daemon lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

/// Start the daemon: load settings, take the singleton lock, open state.
pub async fn startup(env_path: PathBuf) -> Result<DaemonState, LifecycleError> {
    // 1. Settings first — a parse error refuses startup synchronously.
    let settings = Settings::load(&env_path)?;

    // 2. Create the run directory, then take the lock before touching
    //    anything else. Open without truncating so a losing race does not
    //    wipe the running daemon's PID.
    std::fs::create_dir_all(&settings.run_dir)
        .map_err(|e| LifecycleError::Io { path: settings.run_dir.clone(), source: e })?;
    let pid_path = settings.pid_path();
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&pid_path)
        .map_err(|e| LifecycleError::Io { path: pid_path.clone(), source: e })?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file
        .set_len(0)
        .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
        .map_err(|e| LifecycleError::Io { path: pid_path.clone(), source: e })?;
    let lock_file = lock_file;

    // 3. Remaining directories.
    for dir in [&settings.log_dir, &settings.backup_root] {
        std::fs::create_dir_all(dir)
            .map_err(|e| LifecycleError::Io { path: dir.clone(), source: e })?;
    }

    // 4. State store and cursors.
    let store = StateStore::open(settings.state_dir())?;
    let cursors = Cursors::new(store.clone());

    let notifier = LogNotifier;
    let settings = Arc::new(Mutex::new(settings));
    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&settings),
        store.clone(),
        notifier,
        SystemClock,
    ));
    let restores = RestoreManager::new(Arc::clone(&settings), store.clone());

    info!(env = %env_path.display(), pid = std::process::id(), "tmserviced started");
    Ok(DaemonState {
        env_path,
        settings,
        store,
        cursors,
        supervisor,
        restores,
        notifier,
        start_time: Instant::now(),
        lock_file,
    })
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
