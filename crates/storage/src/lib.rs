// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tm-storage: the durable state directory.
//!
//! A directory of small text files is the cross-process source of truth:
//! it survives daemon restarts and is readable by external tooling with
//! nothing more than `cat`. All writes are temp-then-rename.

pub mod cursors;
pub mod store;

pub use cursors::Cursors;
pub use store::{StateStore, StorageError};
