// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tm_adapters::FakeNotifier;

fn outcome(host: &str, status: JobStatus) -> HostOutcome {
    HostOutcome {
        hostname: host.to_string(),
        mode: BackupMode::Full,
        status,
        duration: Duration::from_secs(90),
        detail: None,
    }
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn counts_group_by_status() {
    let report = DailyReport::new(
        date("2026-02-08"),
        vec![
            outcome("db1", JobStatus::Completed),
            outcome("web1", JobStatus::Completed),
            outcome("dev1", JobStatus::Failed),
            outcome("old1", JobStatus::Killed),
        ],
    );
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.skipped(), 0);
    assert!(report.has_failures());
}

#[test]
fn render_contains_header_and_per_host_lines() {
    let mut failed = outcome("dev1", JobStatus::Failed);
    failed.detail = Some("files".to_string());
    let report =
        DailyReport::new(date("2026-02-08"), vec![outcome("db1", JobStatus::Completed), failed]);
    let body = report.render();
    assert!(body.contains("daily backup report for 2026-02-08"));
    assert!(body.contains("1 succeeded, 1 failed, 0 skipped"));
    assert!(body.contains("db1"));
    assert!(body.contains("(files)"));
    assert!(body.contains("1m 30s"));
}

#[test]
fn log_name_is_dated() {
    let report = DailyReport::new(date("2026-02-08"), Vec::new());
    assert_eq!(report.log_name(), "report-daily-2026-02-08.log");
}

#[tokio::test]
async fn submit_writes_log_and_notifies_info_on_success() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = FakeNotifier::new();
    let report =
        DailyReport::new(date("2026-02-08"), vec![outcome("db1", JobStatus::Completed)]);
    submit(&report, dir.path(), &notifier).await.unwrap();

    assert!(dir.path().join("report-daily-2026-02-08.log").exists());
    let calls = notifier.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].event, NotifyEvent::DailyReport);
    assert_eq!(calls[0].level, NotifyLevel::Info);
}

#[tokio::test]
async fn submit_escalates_to_error_on_failures() {
    let dir = tempfile::tempdir().unwrap();
    let notifier = FakeNotifier::new();
    let report = DailyReport::new(date("2026-02-08"), vec![outcome("db1", JobStatus::Failed)]);
    submit(&report, dir.path(), &notifier).await.unwrap();
    assert_eq!(notifier.calls()[0].level, NotifyLevel::Error);
}
