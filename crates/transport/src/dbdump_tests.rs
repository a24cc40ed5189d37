// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn parses_ok_markers() {
    let outcome = DbDumpOutcome::parse("TMDUMP BEGIN\nTMDUMP OK mysql\nTMDUMP OK postgres\nTMDUMP END\n");
    assert_eq!(outcome.engines.len(), 2);
    assert!(outcome.succeeded());
    assert!(!outcome.is_empty());
}

#[test]
fn non_marker_lines_are_ignored() {
    let outcome = DbDumpOutcome::parse("Warning: Using a password\nTMDUMP OK mysql\nnoise\n");
    assert_eq!(outcome.engines.len(), 1);
}

#[test]
fn no_engines_is_empty_not_failed() {
    let outcome = DbDumpOutcome::parse("TMDUMP BEGIN\nTMDUMP NONE\nTMDUMP END\n");
    assert!(outcome.is_empty());
    assert!(outcome.succeeded());
    assert!(outcome.failures().is_empty());
}

#[parameterized(
    mysql_auth = { "TMDUMP FAIL mysql auth", DbFailure::MysqlAuth },
    mysql_list = { "TMDUMP FAIL mysql list", DbFailure::MysqlList },
    pg_auth = { "TMDUMP FAIL postgres auth", DbFailure::PostgresAuth },
    mongo = { "TMDUMP FAIL mongo dump", DbFailure::MongoDump },
    redis = { "TMDUMP FAIL redis bgsave", DbFailure::RedisBgsave },
    missing_pw = { "TMDUMP FAIL mysql missing-password", DbFailure::MissingPassword },
)]
fn classifies_failures(line: &str, expected: DbFailure) {
    let outcome = DbDumpOutcome::parse(line);
    assert_eq!(outcome.failures(), vec![expected]);
    assert!(!outcome.succeeded());
}

#[test]
fn unknown_failure_code_maps_to_other() {
    let outcome = DbDumpOutcome::parse("TMDUMP FAIL sqlite dump");
    assert_eq!(outcome.failures(), vec![DbFailure::Other("sqlite dump".to_string())]);
}

#[parameterized(
    mysql_auth = { "TMDUMP FAIL mysql auth", true },
    missing_pw = { "TMDUMP FAIL postgres missing-password", true },
    mongo = { "TMDUMP FAIL mongo dump", false },
)]
fn credential_failures_are_flagged(line: &str, expected: bool) {
    assert_eq!(DbDumpOutcome::parse(line).has_credential_failure(), expected);
}

#[test]
fn mixed_results_fail_overall_but_keep_successes() {
    let outcome = DbDumpOutcome::parse("TMDUMP OK mysql\nTMDUMP FAIL redis bgsave\n");
    assert!(!outcome.succeeded());
    assert_eq!(outcome.engines[0].failure, None);
}

#[test]
fn prelude_exports_every_setting() {
    let config = DumpConfig::from_settings(&tm_core::Settings::default());
    let prelude = config.prelude();
    for key in [
        "TM_DB_TYPES",
        "TM_RETRIES",
        "TM_MYSQL_PW_FILE",
        "TM_MYSQL_HOST",
        "TM_PG_USER",
        "TM_PG_HOST",
        "TM_MONGO_HOST",
        "TM_MONGO_AUTH_DB",
        "TM_REDIS_HOST",
        "TM_REDIS_PORT",
        "TM_SQLITE_PATHS",
    ] {
        assert!(prelude.contains(&format!("export {key}")), "missing {key}");
    }
}

#[test]
fn prelude_quotes_single_quotes() {
    let mut settings = tm_core::Settings::default();
    settings.mysql_host = "it's-db".to_string();
    let prelude = DumpConfig::from_settings(&settings).prelude();
    assert!(prelude.contains("it'\\''s-db"));
}

#[test]
fn retries_never_below_one() {
    let mut settings = tm_core::Settings::default();
    settings.db_dump_retries = 0;
    assert_eq!(DumpConfig::from_settings(&settings).retries, 1);
}
