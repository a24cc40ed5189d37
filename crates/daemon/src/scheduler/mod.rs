// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler: one cooperative loop, one tick per minute.
//!
//! Tick order: heartbeat, daily gate, interval gate, reload gate. A failing
//! tick is logged and the loop continues — only a shutdown signal exits.

use crate::lifecycle::DaemonState;
use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tm_adapters::{Notification, Notifier, NotifyEvent, NotifyLevel};
use tm_core::{Clock, JobStatus, RosterError, ServerEntry, SystemClock, Trigger};
use tm_engine::{reporter, DailyReport, HostOutcome, JobOptions};
use tm_storage::StorageError;
use tracing::{debug, error, info, warn};

/// Heartbeat cadence, in ticks.
const HEARTBEAT_TICKS: u64 = 30;

/// How long a slot waiter sleeps between checks of the parallel cap.
const SLOT_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Engine(#[from] tm_engine::EngineError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Whether the daily run is due: not yet run today, and the local time has
/// reached the configured schedule. Strict date equality keeps the run
/// from re-entering within one calendar day.
pub fn daily_due(
    last_daily_run: Option<NaiveDate>,
    today: NaiveDate,
    now: NaiveTime,
    schedule_hour: u8,
    schedule_minute: u8,
) -> bool {
    if last_daily_run == Some(today) {
        return false;
    }
    let Some(schedule) = NaiveTime::from_hms_opt(schedule_hour as u32, schedule_minute as u32, 0)
    else {
        return false;
    };
    now >= schedule
}

/// Whether a host's DB-interval backup is due. A host with no cursor yet is
/// due immediately.
pub fn interval_due(now_secs: u64, last_db_run: Option<u64>, interval_hours: u32) -> bool {
    if interval_hours == 0 {
        return false;
    }
    match last_db_run {
        None => true,
        Some(last) => now_secs.saturating_sub(last) >= interval_hours as u64 * 3600,
    }
}

/// Sort roster entries for a daily run: ascending priority, stable within
/// equal priorities.
pub fn daily_order(mut entries: Vec<ServerEntry>) -> Vec<ServerEntry> {
    entries.sort_by_key(|e| e.priority);
    entries
}

pub struct Scheduler {
    state: Arc<DaemonState>,
    ticks: u64,
}

impl Scheduler {
    pub fn new(state: Arc<DaemonState>) -> Self {
        Self { state, ticks: 0 }
    }

    /// Run until shutdown. Tick failures never kill the loop.
    pub async fn run(mut self, shutdown: tokio_util::sync::CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("scheduler started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Local::now()).await {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }

    /// One tick. Public so tests can drive the scheduler with a chosen time.
    pub async fn tick(&mut self, now: DateTime<Local>) -> Result<(), SchedulerError> {
        self.ticks += 1;
        if self.ticks % HEARTBEAT_TICKS == 0 {
            debug!(ticks = self.ticks, "scheduler heartbeat");
        }

        // Daily gate
        let (schedule_hour, schedule_minute) = {
            let settings = self.state.settings.lock();
            (settings.schedule_hour, settings.schedule_minute)
        };
        let today = now.date_naive();
        let last = self.state.cursors.last_daily_run()?;
        if daily_due(last, today, now.time(), schedule_hour, schedule_minute) {
            if self.preflight().await? {
                self.daily_run(today).await?;
            }
        }

        // Interval gate
        self.interval_tick().await?;

        // Reload gate
        if self.state.store.take_reload()? {
            self.reload();
        }

        Ok(())
    }

    /// Pre-flight: refuse the daily run while scheduler-origin jobs from a
    /// previous run are still alive. Dead-PID records are settled by the
    /// supervisor listing itself.
    async fn preflight(&self) -> Result<bool, SchedulerError> {
        let records = self.state.supervisor.list()?;
        let blockers: Vec<String> = records
            .iter()
            .filter(|r| r.status == JobStatus::Running && r.trigger.blocks_daily_run())
            .map(|r| r.hostname.clone())
            .collect();
        if blockers.is_empty() {
            return Ok(true);
        }
        warn!(hosts = ?blockers, "pre-flight: previous daily run still active, refusing");
        let _ = self
            .state
            .notifier
            .notify(&Notification::new(
                NotifyEvent::Preflight,
                NotifyLevel::Warning,
                "daily run skipped: previous run still active",
                format!("still running from a previous daily run: {}", blockers.join(", ")),
            ))
            .await;
        Ok(false)
    }

    /// Execute the daily run: launch the roster in priority order under the
    /// parallel cap, reap everything, report, and advance the cursors.
    async fn daily_run(&self, today: NaiveDate) -> Result<(), SchedulerError> {
        let (roster, cap) = {
            let settings = self.state.settings.lock();
            (tm_core::Roster::new(settings.roster_path()), settings.parallel_jobs)
        };
        let entries = daily_order(roster.read()?);
        info!(hosts = entries.len(), "daily run starting");

        let mut launched = Vec::new();
        let mut outcomes = Vec::new();
        for entry in entries {
            self.wait_for_slot(cap).await;
            let options = JobOptions::from_entry(&entry);
            let mode = options.mode;
            match self.state.supervisor.launch(&entry.hostname, options, Trigger::Daily) {
                Ok(handle) => launched.push((entry.hostname.clone(), mode, Instant::now(), handle)),
                Err(e) => {
                    warn!(host = %entry.hostname, error = %e, "daily launch failed");
                    outcomes.push(HostOutcome {
                        hostname: entry.hostname,
                        mode,
                        status: JobStatus::Failed,
                        duration: Duration::ZERO,
                        detail: Some(format!("launch failed: {e}")),
                    });
                }
            }
        }

        for (hostname, mode, started, handle) in launched {
            let status = handle.wait().await;
            outcomes.push(HostOutcome {
                hostname,
                mode,
                status,
                duration: started.elapsed(),
                detail: None,
            });
        }

        let log_dir = self.state.settings.lock().log_dir.clone();
        let report = DailyReport::new(today, outcomes);
        reporter::submit(&report, &log_dir, &self.state.notifier).await?;

        self.state.cursors.set_last_daily_run(today)?;
        // The daily run covered every host's databases; push the interval
        // cursors forward so the interval gate stays quiet.
        let now_secs = SystemClock.epoch_secs();
        for entry in roster.read()? {
            self.state.cursors.set_last_db_run(&entry.hostname, now_secs)?;
        }
        info!(succeeded = report.succeeded(), failed = report.failed(), "daily run finished");
        Ok(())
    }

    /// Launch due DB-interval backups, one slot at a time.
    async fn interval_tick(&self) -> Result<(), SchedulerError> {
        let (roster, cap) = {
            let settings = self.state.settings.lock();
            (tm_core::Roster::new(settings.roster_path()), settings.parallel_jobs)
        };
        for entry in roster.read()? {
            let Some(interval_hours) = entry.db_interval_hours else {
                continue;
            };
            let now_secs = SystemClock.epoch_secs();
            let last = self.state.cursors.last_db_run(&entry.hostname)?;
            if !interval_due(now_secs, last, interval_hours) {
                continue;
            }

            self.wait_for_slot(cap).await;
            let options =
                JobOptions::from_entry(&entry).with_mode(tm_core::BackupMode::DbOnly);
            let handle =
                match self.state.supervisor.launch(&entry.hostname, options, Trigger::IntervalDb) {
                    Ok(handle) => handle,
                    Err(e) => {
                        warn!(host = %entry.hostname, error = %e, "interval launch failed");
                        continue;
                    }
                };
            let status = handle.wait().await;
            let level = if status == JobStatus::Completed {
                NotifyLevel::Info
            } else {
                NotifyLevel::Error
            };
            let _ = self
                .state
                .notifier
                .notify(&Notification::new(
                    NotifyEvent::IntervalBackup,
                    level,
                    format!("interval-db {}: {status}", entry.hostname),
                    format!("interval database backup for {} finished: {status}", entry.hostname),
                ))
                .await;
            self.state.cursors.set_last_db_run(&entry.hostname, SystemClock.epoch_secs())?;
        }
        Ok(())
    }

    /// Swap in a freshly-parsed environment file. A parse error keeps the
    /// old settings — the daemon never runs with half a config.
    fn reload(&self) {
        match tm_core::Settings::load(&self.state.env_path) {
            Ok(new_settings) => {
                *self.state.settings.lock() = new_settings;
                info!("configuration reloaded");
            }
            Err(e) => {
                error!(error = %e, "config reload failed; keeping previous settings");
            }
        }
    }

    async fn wait_for_slot(&self, cap: usize) {
        while self.state.supervisor.running_count() >= cap.max(1) {
            tokio::time::sleep(SLOT_POLL).await;
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
