// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daily-run scheduling: priority order and the parallel-jobs cap.

use super::helpers::{max_concurrency, parse_events, Fixture};
use chrono::TimeZone;
use serial_test::serial;
use std::sync::Arc;
use tm_daemon::scheduler::Scheduler;

fn at_eleven() -> chrono::DateTime<chrono::Local> {
    chrono::Local.with_ymd_and_hms(2026, 2, 8, 11, 0, 0).unwrap()
}

#[tokio::test]
#[serial]
async fn daily_run_respects_priority_and_parallel_cap() {
    let fx = Fixture::new("parallel_jobs=2\nschedule_hour=11\nschedule_minute=0\n").await;
    fx.add_host("db1 --priority 1");
    fx.add_host("web1 --priority 5");
    fx.add_host("dev1 --priority 20");
    let events_path = fx.install_event_rsync("0.4");

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at_eleven()).await.unwrap();

    let events = parse_events(&events_path);
    let starts: Vec<&str> = events
        .iter()
        .filter(|(kind, _)| kind == "start")
        .map(|(_, host)| host.as_str())
        .collect();
    assert_eq!(starts.len(), 3, "every host ran exactly once: {events:?}");

    // The first two slots go to the two highest-priority hosts; the
    // lowest-priority host is the one that had to wait.
    assert!(starts[..2].contains(&"db1"), "db1 must be in the first wave: {starts:?}");
    assert!(starts[..2].contains(&"web1"), "web1 must be in the first wave: {starts:?}");
    assert_eq!(starts[2], "dev1", "dev1 waits for a free slot: {starts:?}");

    // At no point are three transfers in flight.
    assert!(max_concurrency(&events) <= 2, "parallel cap exceeded: {events:?}");

    // dev1 only started after one of the first wave finished.
    let dev1_start = events.iter().position(|(k, h)| k == "start" && h == "dev1").unwrap();
    let first_end = events.iter().position(|(k, _)| k == "end").unwrap();
    assert!(dev1_start > first_end, "dev1 started before any slot freed: {events:?}");
}

#[tokio::test]
#[serial]
async fn serial_cap_runs_strictly_in_priority_order() {
    let fx = Fixture::new("parallel_jobs=1\nschedule_hour=11\nschedule_minute=0\n").await;
    fx.add_host("dev1 --priority 20");
    fx.add_host("db1 --priority 1");
    fx.add_host("web1 --priority 5");
    let events_path = fx.install_event_rsync("0.1");

    let mut scheduler = Scheduler::new(Arc::clone(&fx.state));
    scheduler.tick(at_eleven()).await.unwrap();

    let events = parse_events(&events_path);
    let starts: Vec<&str> = events
        .iter()
        .filter(|(kind, _)| kind == "start")
        .map(|(_, host)| host.as_str())
        .collect();
    assert_eq!(starts, vec!["db1", "web1", "dev1"]);
    assert_eq!(max_concurrency(&events), 1);
}
