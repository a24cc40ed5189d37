// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmwatchdog — restart tmserviced if it is absent.
//!
//! Meant to be run from cron or a systemd timer. Exits 0 when the daemon
//! is healthy or was restarted, 1 when a restart was needed and failed.

use std::path::PathBuf;
use tm_core::Settings;
use tm_daemon::lifecycle;
use tm_daemon::watchdog::{run_once, WatchdogOutcome};

fn main() {
    let mut env_override: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("tmwatchdog {}", tm_daemon::VERSION);
                return;
            }
            "--help" | "-h" => {
                println!("tmwatchdog {}", tm_daemon::VERSION);
                println!("Restart tmserviced when its PID file is missing or stale");
                println!();
                println!("USAGE:");
                println!("    tmwatchdog [--config <env-file>]");
                return;
            }
            "--config" | "-c" => {
                env_override = args.next().map(PathBuf::from);
                if env_override.is_none() {
                    eprintln!("error: --config needs a path");
                    std::process::exit(2);
                }
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                std::process::exit(2);
            }
        }
    }

    let env_path = lifecycle::env_file_path(env_override);
    let settings = match Settings::load(&env_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("tmwatchdog: cannot read {}: {e}", env_path.display());
            std::process::exit(2);
        }
    };

    match run_once(&settings) {
        WatchdogOutcome::Healthy { pid } => {
            println!("tmserviced healthy (pid {pid})");
        }
        WatchdogOutcome::Restarted { .. } => {
            println!("tmserviced restarted");
        }
        WatchdogOutcome::RestartFailed { reason } => {
            eprintln!("tmserviced restart failed: {reason}");
            std::process::exit(1);
        }
    }
}
