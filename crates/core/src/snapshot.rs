// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot directory naming.
//!
//! A snapshot is named `YYYY-MM-DD`, or `YYYY-MM-DD_HHMMSS` when the daily
//! name is taken. Rotation and history both key on the first ten characters
//! ([`SnapshotId::date_key`]): `2026-02-01` and `2026-02-01_140000` count as
//! one version but rotate together. The legacy `daily.YYYY-MM-DD` form is
//! still recognized so old trees keep rotating.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotIdError {
    #[error("not a snapshot directory name: {0:?}")]
    Invalid(String),
}

/// Legacy naming prefix from early releases (`daily.YYYY-MM-DD`).
pub const LEGACY_PREFIX: &str = "daily.";

/// A validated snapshot directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotId {
    date: NaiveDate,
    time: Option<NaiveTime>,
    legacy: bool,
}

impl SnapshotId {
    /// Daily snapshot name for a date.
    pub fn daily(date: NaiveDate) -> Self {
        Self { date, time: None, legacy: false }
    }

    /// Timestamped snapshot name, used when the daily name is taken.
    pub fn timestamped(datetime: NaiveDateTime) -> Self {
        Self { date: datetime.date(), time: Some(datetime.time()), legacy: false }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn time(&self) -> Option<NaiveTime> {
        self.time
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Canonical date key: the `YYYY-MM-DD` both rotation and history use.
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// The directory name under the host root.
    pub fn dir_name(&self) -> String {
        let date = self.date.format("%Y-%m-%d");
        match (self.legacy, self.time) {
            (true, _) => format!("{LEGACY_PREFIX}{date}"),
            (false, None) => date.to_string(),
            (false, Some(time)) => format!("{date}_{}", time.format("%H%M%S")),
        }
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dir_name())
    }
}

impl FromStr for SnapshotId {
    type Err = SnapshotIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SnapshotIdError::Invalid(s.to_string());
        let (legacy, rest) = match s.strip_prefix(LEGACY_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (date_part, time_part) = match rest.split_once('_') {
            Some((d, t)) => (d, Some(t)),
            None => (rest, None),
        };
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| invalid())?;
        let time = match time_part {
            Some(t) => {
                if legacy {
                    // Legacy names never carried a time suffix.
                    return Err(invalid());
                }
                Some(NaiveTime::parse_from_str(t, "%H%M%S").map_err(|_| invalid())?)
            }
            None => None,
        };
        Ok(SnapshotId { date, time, legacy })
    }
}

impl Ord for SnapshotId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Daily (no time) sorts before timestamped snapshots of the same day.
        (self.date, self.time).cmp(&(other.date, other.time))
    }
}

impl PartialOrd for SnapshotId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
