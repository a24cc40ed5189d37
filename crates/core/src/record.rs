// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job, restore, and delete state records.
//!
//! Records serialize to the pipe-delimited line format the state files have
//! always used, so helper scripts that grep the state directory keep working.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors from parsing a state record line
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed record: {0:?}")]
    Malformed(String),
    #[error("unknown status: {0:?}")]
    UnknownStatus(String),
    #[error("unknown trigger: {0:?}")]
    UnknownTrigger(String),
    #[error("unknown mode: {0:?}")]
    UnknownMode(String),
}

/// What started a job. Pre-flight only blocks on scheduler-origin triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    Manual,
    Api,
    Daily,
    Interval,
    IntervalDb,
    Scheduler,
}

crate::simple_display! {
    Trigger {
        Manual => "manual",
        Api => "api",
        Daily => "daily",
        Interval => "interval",
        IntervalDb => "interval-db",
        Scheduler => "scheduler",
    }
}

impl FromStr for Trigger {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Trigger::Manual),
            "api" => Ok(Trigger::Api),
            "daily" => Ok(Trigger::Daily),
            "interval" => Ok(Trigger::Interval),
            "interval-db" => Ok(Trigger::IntervalDb),
            "scheduler" => Ok(Trigger::Scheduler),
            other => Err(RecordError::UnknownTrigger(other.to_string())),
        }
    }
}

impl Trigger {
    /// Whether a running job with this trigger blocks the daily pre-flight.
    pub fn blocks_daily_run(self) -> bool {
        matches!(self, Trigger::Daily | Trigger::Scheduler)
    }
}

/// What a backup job transfers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupMode {
    #[default]
    Full,
    FilesOnly,
    DbOnly,
}

crate::simple_display! {
    BackupMode {
        Full => "full",
        FilesOnly => "files-only",
        DbOnly => "db-only",
    }
}

impl FromStr for BackupMode {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(BackupMode::Full),
            "files-only" => Ok(BackupMode::FilesOnly),
            "db-only" => Ok(BackupMode::DbOnly),
            other => Err(RecordError::UnknownMode(other.to_string())),
        }
    }
}

impl BackupMode {
    pub fn includes_files(self) -> bool {
        !matches!(self, BackupMode::DbOnly)
    }

    pub fn includes_db(self) -> bool {
        !matches!(self, BackupMode::FilesOnly)
    }
}

/// Lifecycle status of a backup job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Killed,
}

crate::simple_display! {
    JobStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Killed => "killed",
    }
}

impl FromStr for JobStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "killed" => Ok(JobStatus::Killed),
            other => Err(RecordError::UnknownStatus(other.to_string())),
        }
    }
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Lifecycle status of a restore or delete task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

crate::simple_display! {
    TaskStatus {
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

impl FromStr for TaskStatus {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(RecordError::UnknownStatus(other.to_string())),
        }
    }
}

/// Per-job state record, one per active hostname
/// (`proc-<host>.state`, overwritten on re-run).
///
/// Line format: `pid|hostname|mode|started_at|status|logfile|trigger`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub hostname: String,
    pub mode: BackupMode,
    /// Unix seconds
    pub started_at: u64,
    pub status: JobStatus,
    pub logfile: String,
    pub trigger: Trigger,
}

impl std::fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.pid,
            self.hostname,
            self.mode,
            self.started_at,
            self.status,
            self.logfile,
            self.trigger
        )
    }
}

impl FromStr for ProcessRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != 7 {
            return Err(RecordError::Malformed(line.to_string()));
        }
        Ok(ProcessRecord {
            pid: fields[0].parse().map_err(|_| RecordError::Malformed(line.to_string()))?,
            hostname: fields[1].to_string(),
            mode: fields[2].parse()?,
            started_at: fields[3]
                .parse()
                .map_err(|_| RecordError::Malformed(line.to_string()))?,
            status: fields[4].parse()?,
            logfile: fields[5].to_string(),
            trigger: fields[6].parse()?,
        })
    }
}

impl ProcessRecord {
    /// State-store key for a host's job record.
    pub fn key(hostname: &str) -> String {
        format!("proc-{hostname}.state")
    }
}

crate::builder! {
    pub struct ProcessRecordBuilder => ProcessRecord {
        into {
            hostname: String = "web1",
            logfile: String = "backup-web1-20260201-020000.log",
        }
        set {
            pid: u32 = 4242,
            mode: BackupMode = BackupMode::Full,
            started_at: u64 = 1_700_000_000,
            status: JobStatus = JobStatus::Running,
            trigger: Trigger = Trigger::Manual,
        }
    }
}

/// Restore task record (`restore-<host>-<ts>.state`).
///
/// Line format: `id|pid|hostname|snapshot|started_at|status|logfile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRecord {
    pub id: String,
    pub pid: u32,
    pub hostname: String,
    pub snapshot: String,
    pub started_at: u64,
    pub status: TaskStatus,
    pub logfile: String,
}

impl std::fmt::Display for RestoreRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}|{}|{}",
            self.id,
            self.pid,
            self.hostname,
            self.snapshot,
            self.started_at,
            self.status,
            self.logfile
        )
    }
}

impl FromStr for RestoreRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != 7 {
            return Err(RecordError::Malformed(line.to_string()));
        }
        Ok(RestoreRecord {
            id: fields[0].to_string(),
            pid: fields[1].parse().map_err(|_| RecordError::Malformed(line.to_string()))?,
            hostname: fields[2].to_string(),
            snapshot: fields[3].to_string(),
            started_at: fields[4]
                .parse()
                .map_err(|_| RecordError::Malformed(line.to_string()))?,
            status: fields[5].parse()?,
            logfile: fields[6].to_string(),
        })
    }
}

impl RestoreRecord {
    pub fn key(hostname: &str, started_at: u64) -> String {
        format!("restore-{hostname}-{started_at}.state")
    }
}

/// Background snapshot-tree deletion record (`delete-<host>.state`).
///
/// Line format: `pid|hostname|started_at|status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRecord {
    pub pid: u32,
    pub hostname: String,
    pub started_at: u64,
    pub status: TaskStatus,
}

impl std::fmt::Display for DeleteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}|{}|{}", self.pid, self.hostname, self.started_at, self.status)
    }
}

impl FromStr for DeleteRecord {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() != 4 {
            return Err(RecordError::Malformed(line.to_string()));
        }
        Ok(DeleteRecord {
            pid: fields[0].parse().map_err(|_| RecordError::Malformed(line.to_string()))?,
            hostname: fields[1].to_string(),
            started_at: fields[2]
                .parse()
                .map_err(|_| RecordError::Malformed(line.to_string()))?,
            status: fields[3].parse()?,
        })
    }
}

impl DeleteRecord {
    pub fn key(hostname: &str) -> String {
        format!("delete-{hostname}.state")
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
