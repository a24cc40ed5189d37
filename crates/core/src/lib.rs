// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tm-core: shared types for the tmservice backup orchestrator.
//!
//! Holds everything both the daemon and the CLI need to agree on:
//! settings, the server roster, job state records, snapshot naming,
//! and the clock abstraction.

pub mod macros;

pub mod clock;
pub mod record;
pub mod roster;
pub mod settings;
pub mod snapshot;
pub mod time_fmt;

pub use clock::{Clock, FakeClock, SystemClock};
pub use record::{
    BackupMode, DeleteRecord, JobStatus, ProcessRecord, RecordError, RestoreRecord, TaskStatus,
    Trigger,
};
#[cfg(any(test, feature = "test-support"))]
pub use record::ProcessRecordBuilder;
pub use roster::{Roster, RosterError, ServerEntry};
pub use settings::{DbEngine, DbTypes, EncryptMode, NotifyMethod, Settings, SettingsError};
pub use snapshot::{SnapshotId, SnapshotIdError};
pub use time_fmt::format_elapsed;
