// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schedule cursors: when the daily run last happened and when each host
//! last had a DB backup.

use crate::store::{StateStore, StorageError};
use chrono::NaiveDate;
use tracing::warn;

const LAST_DAILY_RUN: &str = "last-daily-run";

fn last_db_key(hostname: &str) -> String {
    format!("last-db-{hostname}")
}

/// Cursor reads/writes over the state store.
#[derive(Debug, Clone)]
pub struct Cursors {
    store: StateStore,
}

impl Cursors {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Date of the last completed daily run, if any.
    pub fn last_daily_run(&self) -> Result<Option<NaiveDate>, StorageError> {
        let Some(content) = self.store.get(LAST_DAILY_RUN)? else {
            return Ok(None);
        };
        match NaiveDate::parse_from_str(content.trim(), "%Y-%m-%d") {
            Ok(date) => Ok(Some(date)),
            Err(_) => {
                warn!(content = content.trim(), "ignoring corrupt last-daily-run cursor");
                Ok(None)
            }
        }
    }

    pub fn set_last_daily_run(&self, date: NaiveDate) -> Result<(), StorageError> {
        self.store.put(LAST_DAILY_RUN, &format!("{}\n", date.format("%Y-%m-%d")))
    }

    /// Unix seconds of the host's last DB backup (daily or interval).
    pub fn last_db_run(&self, hostname: &str) -> Result<Option<u64>, StorageError> {
        let Some(content) = self.store.get(&last_db_key(hostname))? else {
            return Ok(None);
        };
        match content.trim().parse() {
            Ok(secs) => Ok(Some(secs)),
            Err(_) => {
                warn!(hostname, "ignoring corrupt last-db cursor");
                Ok(None)
            }
        }
    }

    /// Advance the host's DB cursor. The cursor never moves backwards.
    pub fn set_last_db_run(&self, hostname: &str, epoch_secs: u64) -> Result<(), StorageError> {
        if let Some(existing) = self.last_db_run(hostname)? {
            if existing > epoch_secs {
                return Ok(());
            }
        }
        self.store.put(&last_db_key(hostname), &format!("{epoch_secs}\n"))
    }

    pub fn clear_last_db_run(&self, hostname: &str) -> Result<(), StorageError> {
        self.store.delete(&last_db_key(hostname))
    }
}

#[cfg(test)]
#[path = "cursors_tests.rs"]
mod tests;
