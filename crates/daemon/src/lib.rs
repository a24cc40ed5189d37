// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tm-daemon: the long-lived backup orchestrator process (`tmserviced`).
//!
//! Owns the scheduler loop, the HTTP control surface, and process
//! lifecycle (singleton lock, logging, shutdown). The `tmwatchdog` binary
//! in this crate restarts the daemon when it dies.

pub mod http;
pub mod lifecycle;
pub mod scheduler;
pub mod watchdog;

/// Daemon version string (crate version + git hash).
pub const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));
