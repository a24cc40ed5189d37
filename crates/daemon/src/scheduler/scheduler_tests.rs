// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::lifecycle::startup;
use chrono::TimeZone;
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use tm_core::{ProcessRecord, ProcessRecordBuilder, Roster};
use yare::parameterized;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, "%H:%M").unwrap()
}

#[parameterized(
    due_at_schedule = { None, "11:00", true },
    due_after_schedule = { None, "15:30", true },
    not_due_before = { None, "10:59", false },
    already_ran_today = { Some("2026-02-08"), "12:00", false },
    ran_yesterday = { Some("2026-02-07"), "11:00", true },
)]
fn daily_gate(last: Option<&str>, now: &str, expected: bool) {
    let last = last.map(date);
    assert_eq!(daily_due(last, date("2026-02-08"), time(now), 11, 0), expected);
}

#[test]
fn daily_gate_respects_minutes() {
    assert!(!daily_due(None, date("2026-02-08"), time("11:29"), 11, 30));
    assert!(daily_due(None, date("2026-02-08"), time("11:30"), 11, 30));
}

#[parameterized(
    never_ran = { None, 4, true },
    just_ran = { Some(1_700_000_000), 4, false },
    exactly_elapsed = { Some(1_700_000_000 - 4 * 3600), 4, true },
    one_second_short = { Some(1_700_000_000 - 4 * 3600 + 1), 4, false },
    zero_interval = { None, 0, false },
)]
fn interval_gate(last: Option<u64>, hours: u32, expected: bool) {
    assert_eq!(interval_due(1_700_000_000, last, hours), expected);
}

#[test]
fn daily_order_sorts_by_priority_stably() {
    let mut a = tm_core::ServerEntry::new("db1");
    a.priority = 1;
    let mut b = tm_core::ServerEntry::new("web1");
    b.priority = 5;
    let mut c = tm_core::ServerEntry::new("dev1");
    c.priority = 20;
    let mut d = tm_core::ServerEntry::new("web2");
    d.priority = 5;

    let sorted = daily_order(vec![c.clone(), d.clone(), a.clone(), b.clone()]);
    let names: Vec<&str> = sorted.iter().map(|e| e.hostname.as_str()).collect();
    assert_eq!(names, vec!["db1", "web1", "web2", "dev1"]);
}

// --- tick-driven tests against a real daemon state -----------------------

struct Fixture {
    dir: tempfile::TempDir,
    state: Arc<DaemonState>,
}

async fn fixture(roster_lines: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let env_path = dir.path().join("tmservice.env");
    std::fs::write(
        &env_path,
        format!(
            "backup_root={}\nrun_dir={}\nlog_dir={}\nparallel_jobs=2\nschedule_hour=11\nschedule_minute=0\nalert_enabled=false\n",
            dir.path().join("backup").display(),
            dir.path().join("run").display(),
            dir.path().join("log").display(),
        ),
    )
    .unwrap();
    let state = Arc::new(startup(env_path).await.unwrap());
    let roster = Roster::new(state.settings.lock().roster_path());
    for line in roster_lines.lines().filter(|l| !l.trim().is_empty()) {
        roster.append(&tm_core::ServerEntry::parse(line).unwrap()).unwrap();
    }
    Fixture { dir, state }
}

/// Scripted rsync/ssh so no transfer or remote dump ever leaves the host.
fn install_fake_tools(fx: &Fixture) {
    let bin = fx.dir.path().join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    for (name, body) in [("rsync", "exit 0"), ("ssh", "echo 'TMDUMP NONE'; exit 0")] {
        let path = bin.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{path}", bin.display()));
}

fn at(hms: (u32, u32, u32)) -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 2, 8, hms.0, hms.1, hms.2).unwrap()
}

#[tokio::test]
#[serial]
async fn daily_run_executes_roster_and_advances_cursors() {
    let fx = fixture("db1 --priority 1\nweb1 --priority 5\n").await;
    install_fake_tools(&fx);
    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));

    scheduler.tick(at((11, 0, 30))).await.unwrap();

    assert_eq!(fx.state.cursors.last_daily_run().unwrap(), Some(date("2026-02-08")));
    for host in ["db1", "web1"] {
        let record = fx.state.supervisor.observe(host).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.trigger, Trigger::Daily);
        // Interval cursors were pushed forward to suppress interval work.
        assert!(fx.state.cursors.last_db_run(host).unwrap().is_some());
    }
    let report = fx.state.settings.lock().log_dir.join("report-daily-2026-02-08.log");
    assert!(report.exists());
}

#[tokio::test]
#[serial]
async fn daily_run_does_not_reenter_same_day() {
    let fx = fixture("web1\n").await;
    install_fake_tools(&fx);
    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((11, 1, 0))).await.unwrap();

    // Wipe the evidence; a second tick the same day must not recreate it.
    fx.state.store.delete(&ProcessRecord::key("web1")).unwrap();
    scheduler.tick(at((18, 0, 0))).await.unwrap();
    assert!(fx.state.supervisor.observe("web1").unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn daily_run_not_due_before_schedule_time() {
    let fx = fixture("web1\n").await;
    install_fake_tools(&fx);
    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((10, 59, 0))).await.unwrap();
    assert_eq!(fx.state.cursors.last_daily_run().unwrap(), None);
    assert!(fx.state.supervisor.observe("web1").unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn preflight_blocks_on_live_daily_job() {
    let fx = fixture("web1\n").await;
    install_fake_tools(&fx);
    // A previous daily job, owned by a live PID (init), still "running".
    let blocker = ProcessRecordBuilder::default()
        .hostname("stuck")
        .pid(1)
        .trigger(Trigger::Daily)
        .build();
    fx.state.store.put_record(&ProcessRecord::key("stuck"), &blocker).unwrap();

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((11, 0, 0))).await.unwrap();
    assert_eq!(fx.state.cursors.last_daily_run().unwrap(), None);
    assert!(fx.state.supervisor.observe("web1").unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn preflight_ignores_manual_jobs_and_reaps_dead_ones() {
    let fx = fixture("web1\n").await;
    install_fake_tools(&fx);
    // Manual job with a live PID does not block.
    let manual = ProcessRecordBuilder::default()
        .hostname("manual-host")
        .pid(1)
        .trigger(Trigger::Manual)
        .build();
    fx.state.store.put_record(&ProcessRecord::key("manual-host"), &manual).unwrap();
    // Dead daily job gets reaped, does not block.
    let dead = ProcessRecordBuilder::default()
        .hostname("dead-host")
        .pid(3999999)
        .trigger(Trigger::Daily)
        .logfile("backup-dead-host.log")
        .build();
    fx.state.store.put_record(&ProcessRecord::key("dead-host"), &dead).unwrap();

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((11, 0, 0))).await.unwrap();
    assert_eq!(fx.state.cursors.last_daily_run().unwrap(), Some(date("2026-02-08")));
}

#[tokio::test]
#[serial]
async fn interval_gate_launches_db_only_job() {
    let fx = fixture("db1 --db-interval 4h\n").await;
    install_fake_tools(&fx);
    // Daily already ran today; DB cursor is five hours stale.
    fx.state.cursors.set_last_daily_run(date("2026-02-08")).unwrap();
    let now_secs = SystemClock.epoch_secs();
    fx.state.cursors.set_last_db_run("db1", now_secs - 5 * 3600).unwrap();

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((16, 0, 0))).await.unwrap();

    let record = fx.state.supervisor.observe("db1").unwrap().unwrap();
    assert_eq!(record.trigger, Trigger::IntervalDb);
    assert_eq!(record.mode, tm_core::BackupMode::DbOnly);
    assert!(fx.state.cursors.last_db_run("db1").unwrap().unwrap() > now_secs - 5 * 3600);
}

#[tokio::test]
#[serial]
async fn interval_gate_quiet_when_not_elapsed() {
    let fx = fixture("db1 --db-interval 4h\n").await;
    install_fake_tools(&fx);
    fx.state.cursors.set_last_daily_run(date("2026-02-08")).unwrap();
    let now_secs = SystemClock.epoch_secs();
    fx.state.cursors.set_last_db_run("db1", now_secs - 3600).unwrap();

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((12, 0, 0))).await.unwrap();
    assert!(fx.state.supervisor.observe("db1").unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn hosts_without_interval_never_get_interval_jobs() {
    let fx = fixture("web1\n").await;
    install_fake_tools(&fx);
    fx.state.cursors.set_last_daily_run(date("2026-02-08")).unwrap();
    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((12, 0, 0))).await.unwrap();
    assert!(fx.state.supervisor.observe("web1").unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn reload_gate_swaps_settings_and_consumes_marker() {
    let fx = fixture("").await;
    install_fake_tools(&fx);
    fx.state.cursors.set_last_daily_run(date("2026-02-08")).unwrap();

    // Change the env file and request a reload.
    let mut content = std::fs::read_to_string(&fx.state.env_path).unwrap();
    content.push_str("retention_days=9\n");
    std::fs::write(&fx.state.env_path, content).unwrap();
    fx.state.store.mark_reload().unwrap();

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at((12, 0, 0))).await.unwrap();

    assert_eq!(fx.state.settings.lock().retention_days, 9);
    assert!(!fx.state.store.take_reload().unwrap());
}
