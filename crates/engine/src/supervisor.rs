// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job supervisor: launches pipelines as supervised tasks, tracks them,
//! cancels them, and keeps the state records truthful.
//!
//! Records carry the daemon's PID. While the daemon lives, the supervisor
//! itself transitions records; after a crash, the dead PID tells observers
//! to settle leftover `running` records from the log tail.

use crate::error::EngineError;
use crate::logs::{infer_status, pid_alive};
use crate::pipeline::{self, JobOptions, PipelineContext};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tm_adapters::Notifier;
use tm_core::{Clock, JobStatus, ProcessRecord, Settings, Trigger};
use tm_storage::StateStore;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Grace period between the polite cancel and the hard abort.
const CANCEL_GRACE: Duration = Duration::from_secs(2);

struct RunningJob {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle returned by [`Supervisor::launch`].
pub struct JobHandle {
    pub hostname: String,
    pub pid: u32,
    pub logfile: String,
    done: oneshot::Receiver<JobStatus>,
}

impl JobHandle {
    /// Wait for the job to reach a terminal status.
    pub async fn wait(self) -> JobStatus {
        // A dropped sender means the task was aborted mid-flight.
        self.done.await.unwrap_or(JobStatus::Killed)
    }
}

/// Launches and tracks at most one pipeline per host.
pub struct Supervisor<N: Notifier, C: Clock> {
    settings: Arc<Mutex<Settings>>,
    store: StateStore,
    notifier: N,
    clock: C,
    jobs: Arc<Mutex<HashMap<String, RunningJob>>>,
}

impl<N: Notifier, C: Clock> Supervisor<N, C> {
    pub fn new(settings: Arc<Mutex<Settings>>, store: StateStore, notifier: N, clock: C) -> Self {
        Self { settings, store, notifier, clock, jobs: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Number of live supervisor-launched jobs. The parallel cap is
    /// enforced against this count at the moment of launch.
    pub fn running_count(&self) -> usize {
        let mut jobs = self.jobs.lock();
        jobs.retain(|_, job| !job.handle.is_finished());
        jobs.len()
    }

    /// Launch a backup job. At most one job per host may run at a time.
    pub fn launch(
        &self,
        hostname: &str,
        options: JobOptions,
        trigger: Trigger,
    ) -> Result<JobHandle, EngineError> {
        let settings = self.settings.lock().clone();
        let mut jobs = self.jobs.lock();
        jobs.retain(|_, job| !job.handle.is_finished());
        if jobs.contains_key(hostname) {
            return Err(EngineError::AlreadyRunning(hostname.to_string()));
        }
        // A record with a live foreign PID means another daemon instance
        // still owns this host.
        if let Some(record) = self.store.get_record::<ProcessRecord>(&ProcessRecord::key(hostname))? {
            if record.status == JobStatus::Running
                && record.pid != std::process::id()
                && pid_alive(record.pid)
            {
                return Err(EngineError::AlreadyRunning(hostname.to_string()));
            }
        }

        let pid = std::process::id();
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let logfile = format!("backup-{hostname}-{stamp}.log");
        let log_path = settings.log_dir.join(&logfile);
        let rsync_log_path = settings.log_dir.join(format!("rsync-{hostname}-{stamp}.log"));

        let record = ProcessRecord {
            pid,
            hostname: hostname.to_string(),
            mode: options.mode,
            started_at: self.clock.epoch_secs(),
            status: JobStatus::Running,
            logfile: logfile.clone(),
            trigger,
        };
        self.store.put_record(&ProcessRecord::key(hostname), &record)?;

        let token = CancellationToken::new();
        let (done_tx, done_rx) = oneshot::channel();

        let ctx = PipelineContext {
            settings,
            hostname: hostname.to_string(),
            options,
            trigger,
            log_path,
            rsync_log_path,
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
        };
        let store = self.store.clone();
        let jobs_map = Arc::clone(&self.jobs);
        let task_token = token.clone();
        let host = hostname.to_string();
        let mut final_record = record;

        let handle = tokio::spawn(async move {
            let status = tokio::select! {
                _ = task_token.cancelled() => JobStatus::Killed,
                result = pipeline::run(ctx) => match result {
                    Ok(report) if report.success => JobStatus::Completed,
                    Ok(_) => JobStatus::Failed,
                    Err(e) => {
                        warn!(host = %host, error = %e, "pipeline error");
                        JobStatus::Failed
                    }
                },
            };
            final_record.status = status;
            if let Err(e) = store.put_record(&ProcessRecord::key(&host), &final_record) {
                warn!(host = %host, error = %e, "failed to persist job outcome");
            }
            jobs_map.lock().remove(&host);
            let _ = done_tx.send(status);
        });

        jobs.insert(hostname.to_string(), RunningJob { token, handle });
        info!(host = hostname, %trigger, "job launched");
        Ok(JobHandle { hostname: hostname.to_string(), pid, logfile, done: done_rx })
    }

    /// Cancel a running job: polite cancel, two-second grace, then abort.
    /// The record is marked `killed` either way.
    pub async fn cancel(&self, hostname: &str) -> Result<(), EngineError> {
        let job = self
            .jobs
            .lock()
            .remove(hostname)
            .ok_or_else(|| EngineError::NotRunning(hostname.to_string()))?;

        job.token.cancel();
        let mut handle = job.handle;
        if tokio::time::timeout(CANCEL_GRACE, &mut handle).await.is_err() {
            warn!(host = hostname, "job did not stop in time; aborting");
            handle.abort();
            let _ = handle.await;
        }

        if let Some(mut record) =
            self.store.get_record::<ProcessRecord>(&ProcessRecord::key(hostname))?
        {
            record.status = JobStatus::Killed;
            self.store.put_record(&ProcessRecord::key(hostname), &record)?;
        }
        info!(host = hostname, "job cancelled");
        Ok(())
    }

    /// All process records, with dead-PID `running` records settled from
    /// their log tails.
    pub fn list(&self) -> Result<Vec<ProcessRecord>, EngineError> {
        let log_dir = self.settings.lock().log_dir.clone();
        let mut records = Vec::new();
        for key in self.store.list("proc-")? {
            let Some(record) = self.store.get_record::<ProcessRecord>(&key)? else {
                continue;
            };
            records.push(self.reconcile(record, &log_dir)?);
        }
        Ok(records)
    }

    /// One host's record, settled the same way as [`Supervisor::list`].
    pub fn observe(&self, hostname: &str) -> Result<Option<ProcessRecord>, EngineError> {
        let log_dir = self.settings.lock().log_dir.clone();
        let Some(record) = self.store.get_record::<ProcessRecord>(&ProcessRecord::key(hostname))?
        else {
            return Ok(None);
        };
        Ok(Some(self.reconcile(record, &log_dir)?))
    }

    fn reconcile(
        &self,
        mut record: ProcessRecord,
        log_dir: &std::path::Path,
    ) -> Result<ProcessRecord, EngineError> {
        if record.status == JobStatus::Running && !pid_alive(record.pid) {
            let log_path: PathBuf = log_dir.join(&record.logfile);
            record.status = infer_status(&log_path);
            warn!(
                host = %record.hostname,
                status = %record.status,
                "settled record left behind by dead pid"
            );
            self.store.put_record(&ProcessRecord::key(&record.hostname), &record)?;
        }
        Ok(record)
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
