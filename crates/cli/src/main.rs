// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! tmctl — operator CLI for the tmservice backup daemon.
//!
//! A thin client over the daemon's HTTP API: everything tmctl can do, the
//! dashboard can do too.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tmctl", version, about = "Control the tmservice backup daemon")]
struct Cli {
    /// Environment file (to find the API port)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// API base URL override (e.g. http://127.0.0.1:7600)
    #[arg(long, global = true)]
    api: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Daemon status and running jobs
    Status,
    /// Start a backup for a host
    Backup {
        hostname: String,
        /// Sync files only, skip database dumps
        #[arg(long, conflicts_with = "db_only")]
        files_only: bool,
        /// Dump databases only, skip the file sync
        #[arg(long)]
        db_only: bool,
    },
    /// Cancel a running backup
    Cancel { hostname: String },
    /// Manage the server roster
    #[command(subcommand)]
    Servers(commands::ServersCommand),
    /// Read or change daemon settings
    #[command(subcommand)]
    Settings(commands::SettingsCommand),
    /// Restore task listing
    Restores,
    /// Per-host backup history
    History,
}

fn main() {
    let cli = Cli::parse();
    let client = match client::ApiClient::new(cli.config.clone(), cli.api.clone()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("tmctl: {e}");
            std::process::exit(2);
        }
    };

    let result = match cli.command {
        Command::Status => commands::status(&client),
        Command::Backup { hostname, files_only, db_only } => {
            commands::backup(&client, &hostname, files_only, db_only)
        }
        Command::Cancel { hostname } => commands::cancel(&client, &hostname),
        Command::Servers(cmd) => commands::servers(&client, cmd),
        Command::Settings(cmd) => commands::settings(&client, cmd),
        Command::Restores => commands::restores(&client),
        Command::History => commands::history(&client),
    };

    if let Err(e) = result {
        eprintln!("tmctl: {e}");
        std::process::exit(1);
    }
}
