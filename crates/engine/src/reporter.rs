// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daily run reporting.
//!
//! After the scheduler reaps a daily run it hands the per-host outcomes to
//! the reporter, which renders one plain-text report, writes it to a dated
//! log file, and submits it through the notifier.

use crate::error::EngineError;
use chrono::NaiveDate;
use std::path::Path;
use std::time::Duration;
use tm_adapters::{Notification, Notifier, NotifyEvent, NotifyLevel};
use tm_core::{format_elapsed, BackupMode, JobStatus};
use tracing::info;

/// One host's result within a daily run.
#[derive(Debug, Clone)]
pub struct HostOutcome {
    pub hostname: String,
    pub mode: BackupMode,
    pub status: JobStatus,
    pub duration: Duration,
    pub detail: Option<String>,
}

/// Aggregated daily run report.
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub outcomes: Vec<HostOutcome>,
}

impl DailyReport {
    pub fn new(date: NaiveDate, outcomes: Vec<HostOutcome>) -> Self {
        Self { date, outcomes }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == JobStatus::Completed).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, JobStatus::Failed | JobStatus::Killed))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status == JobStatus::Running).count()
    }

    /// Whether the run as a whole should alarm.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// Render the plain-text report body.
    pub fn render(&self) -> String {
        let mut out = format!(
            "daily backup report for {}\n{} succeeded, {} failed, {} skipped\n\n",
            self.date.format("%Y-%m-%d"),
            self.succeeded(),
            self.failed(),
            self.skipped(),
        );
        for outcome in &self.outcomes {
            out.push_str(&format!(
                "{:<9} {:<11} {:>9}  {}",
                outcome.status,
                outcome.mode,
                format_elapsed(outcome.duration),
                outcome.hostname,
            ));
            if let Some(detail) = &outcome.detail {
                out.push_str(&format!("  ({detail})"));
            }
            out.push('\n');
        }
        out
    }

    /// The dated report log file name.
    pub fn log_name(&self) -> String {
        format!("report-daily-{}.log", self.date.format("%Y-%m-%d"))
    }
}

/// Write the report log and submit it through the notifier.
pub async fn submit<N: Notifier>(
    report: &DailyReport,
    log_dir: &Path,
    notifier: &N,
) -> Result<(), EngineError> {
    let body = report.render();
    let path = log_dir.join(report.log_name());
    std::fs::create_dir_all(log_dir).map_err(|e| EngineError::io(log_dir, e))?;
    std::fs::write(&path, &body).map_err(|e| EngineError::io(&path, e))?;
    info!(path = %path.display(), "daily report written");

    let level = if report.has_failures() { NotifyLevel::Error } else { NotifyLevel::Info };
    let subject = format!(
        "daily-report {}: {} ok, {} failed",
        report.date.format("%Y-%m-%d"),
        report.succeeded(),
        report.failed()
    );
    let _ = notifier
        .notify(&Notification::new(NotifyEvent::DailyReport, level, subject, body))
        .await;
    Ok(())
}

#[cfg(test)]
#[path = "reporter_tests.rs"]
mod tests;
