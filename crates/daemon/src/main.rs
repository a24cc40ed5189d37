// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmserviced — the backup orchestrator daemon.
//!
//! Architecture:
//! - Scheduler task: one tick per minute (daily gate, interval gate, reload)
//! - API task: axum listener serving the control surface
//! - Pipelines: supervised per-host tasks owning their child processes

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::path::PathBuf;
use std::sync::Arc;
use tm_daemon::lifecycle::{self, LifecycleError};
use tm_daemon::{http, scheduler, VERSION};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut env_override: Option<PathBuf> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("tmserviced {VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("tmserviced {VERSION}");
                println!("Fleet backup orchestrator daemon");
                println!();
                println!("USAGE:");
                println!("    tmserviced [--config <env-file>]");
                println!();
                println!("The daemon pulls rsync snapshots and database dumps from every");
                println!("host on the roster, on a daily schedule, and serves the control");
                println!("API on the configured port (default 7600).");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <FILE>  Environment file (default {})", lifecycle::DEFAULT_ENV_FILE);
                println!("    -h, --help           Print help information");
                println!("    -v, --version        Print version information");
                return Ok(());
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
                eprintln!("Usage: tmserviced [--config <env-file>]");
                std::process::exit(2);
            }
        }
    }

    let env_path = lifecycle::env_file_path(env_override);

    // Logging to <log_dir>/scheduler.log, non-blocking. Settings are read
    // once here just for the log location; startup re-reads them under the
    // lock.
    let log_dir = match tm_core::Settings::load(&env_path) {
        Ok(settings) => settings.log_dir,
        Err(e) => {
            eprintln!("tmserviced failed to start: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("tmserviced cannot create {}: {e}", log_dir.display());
        std::process::exit(1);
    }
    let appender = tracing_appender::rolling::never(&log_dir, "scheduler.log");
    let (writer, _log_guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();

    info!(version = VERSION, "tmserviced starting");

    // Startup: settings, singleton lock, state store.
    let state = match lifecycle::startup(env_path).await {
        Ok(state) => Arc::new(state),
        Err(LifecycleError::LockFailed(_)) => {
            eprintln!("tmserviced is already running");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("tmserviced failed to start: {e}");
            return Err(e.into());
        }
    };

    let shutdown = CancellationToken::new();

    let api = tokio::spawn(http::serve(Arc::clone(&state), shutdown.clone()));
    let sched = tokio::spawn(scheduler::Scheduler::new(Arc::clone(&state)).run(shutdown.clone()));

    // Exit cooperatively on SIGTERM/SIGINT; the watchdog restarts us if we die.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }
    shutdown.cancel();

    if let Err(e) = sched.await {
        error!(error = %e, "scheduler task panicked");
    }
    match api.await {
        Ok(Err(e)) => error!(error = %e, "api task failed"),
        Err(e) => error!(error = %e, "api task panicked"),
        Ok(Ok(())) => {}
    }

    info!("tmserviced stopped");
    Ok(())
}
