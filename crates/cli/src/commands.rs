// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand implementations.

use crate::client::ApiClient;
use crate::output;
use anyhow::{bail, Result};
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ServersCommand {
    /// Show the active roster
    List,
    /// Add a host (options use the roster line syntax)
    Add {
        hostname: String,
        /// e.g. "--priority 1 --db-interval 4h"
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        options: Vec<String>,
    },
    /// Change one host's options
    Update {
        hostname: String,
        #[arg(long)]
        priority: Option<i32>,
        #[arg(long)]
        db_interval: Option<u32>,
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        no_rotate: Option<bool>,
        #[arg(long)]
        notify: Option<String>,
    },
    /// Move a host to the archive roster
    Archive { hostname: String },
    /// Move a host back to the active roster
    Unarchive { hostname: String },
    /// Remove a host and delete its snapshots
    Remove { hostname: String },
    /// Show archived hosts and pending deletions
    Archived,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print all known settings
    Get,
    /// Change settings (key=value pairs); the daemon reloads on its next tick
    Set { pairs: Vec<String> },
}

pub fn status(client: &ApiClient) -> Result<()> {
    let status = client.get("/api/status")?;
    println!(
        "tmserviced {} on {} (up {})",
        status["version"].as_str().unwrap_or("?"),
        status["hostname"].as_str().unwrap_or("?"),
        output::human_secs(status["uptime"].as_u64().unwrap_or(0)),
    );
    let processes = status["processes"].as_array().cloned().unwrap_or_default();
    if processes.is_empty() {
        println!("no jobs on record");
        return Ok(());
    }
    output::process_table(&processes);
    Ok(())
}

pub fn backup(client: &ApiClient, hostname: &str, files_only: bool, db_only: bool) -> Result<()> {
    let query = if files_only {
        "?files-only"
    } else if db_only {
        "?db-only"
    } else {
        ""
    };
    let launched = client.post(&format!("/api/backup/{hostname}{query}"), None)?;
    println!(
        "backup of {hostname} started (pid {}, log {})",
        launched["pid"],
        launched["logfile"].as_str().unwrap_or("?")
    );
    Ok(())
}

pub fn cancel(client: &ApiClient, hostname: &str) -> Result<()> {
    client.delete(&format!("/api/backup/{hostname}"))?;
    println!("backup of {hostname} cancelled");
    Ok(())
}

pub fn servers(client: &ApiClient, command: ServersCommand) -> Result<()> {
    match command {
        ServersCommand::List => {
            let servers = client.get("/api/servers")?;
            output::server_table(servers.as_array().cloned().unwrap_or_default().as_slice());
        }
        ServersCommand::Add { hostname, options } => {
            let body = serde_json::json!({
                "hostname": hostname,
                "options": options.join(" "),
            });
            client.post("/api/servers", Some(body))?;
            println!("added {hostname}");
        }
        ServersCommand::Update { hostname, priority, db_interval, mode, no_rotate, notify } => {
            let mut body = serde_json::Map::new();
            if let Some(priority) = priority {
                body.insert("priority".into(), priority.into());
            }
            if let Some(hours) = db_interval {
                body.insert("db_interval".into(), hours.into());
            }
            if let Some(mode) = mode {
                body.insert("mode".into(), mode.into());
            }
            if let Some(no_rotate) = no_rotate {
                body.insert("no_rotate".into(), no_rotate.into());
            }
            if let Some(notify) = notify {
                body.insert("notify_email".into(), notify.into());
            }
            if body.is_empty() {
                bail!("nothing to update");
            }
            client.put(&format!("/api/servers/{hostname}"), body.into())?;
            println!("updated {hostname}");
        }
        ServersCommand::Archive { hostname } => {
            client.delete(&format!("/api/servers/{hostname}?action=archive"))?;
            println!("archived {hostname}");
        }
        ServersCommand::Unarchive { hostname } => {
            client.post(&format!("/api/archived/{hostname}/unarchive"), None)?;
            println!("unarchived {hostname}");
        }
        ServersCommand::Remove { hostname } => {
            client.delete(&format!("/api/servers/{hostname}?action=delete"))?;
            println!("removing {hostname} and its snapshots in the background");
        }
        ServersCommand::Archived => {
            let archived = client.get("/api/archived")?;
            output::server_table(
                archived["servers"].as_array().cloned().unwrap_or_default().as_slice(),
            );
            for delete in archived["deletes"].as_array().cloned().unwrap_or_default() {
                println!(
                    "deleting {}: {}",
                    delete["hostname"].as_str().unwrap_or("?"),
                    delete["status"].as_str().unwrap_or("?")
                );
            }
        }
    }
    Ok(())
}

pub fn settings(client: &ApiClient, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Get => {
            let settings = client.get("/api/settings")?;
            if let Some(map) = settings.as_object() {
                for (key, value) in map {
                    println!("{key}={}", value.as_str().unwrap_or(""));
                }
            }
        }
        SettingsCommand::Set { pairs } => {
            if pairs.is_empty() {
                bail!("usage: tmctl settings set key=value [key=value ...]");
            }
            let mut body = serde_json::Map::new();
            for pair in &pairs {
                let Some((key, value)) = pair.split_once('=') else {
                    bail!("not a key=value pair: {pair:?}");
                };
                body.insert(key.to_string(), value.into());
            }
            client.put("/api/settings", body.into())?;
            println!("settings saved; daemon reloads on its next tick");
        }
    }
    Ok(())
}

pub fn restores(client: &ApiClient) -> Result<()> {
    let restores = client.get("/api/restores")?;
    let list = restores.as_array().cloned().unwrap_or_default();
    if list.is_empty() {
        println!("no restore tasks in the last 30 days");
        return Ok(());
    }
    for restore in list {
        println!(
            "{} {} {} -> {} ({})",
            restore["id"].as_str().unwrap_or("?"),
            restore["hostname"].as_str().unwrap_or("?"),
            restore["snapshot"].as_str().unwrap_or("?"),
            restore["status"].as_str().unwrap_or("?"),
            restore["logfile"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}

pub fn history(client: &ApiClient) -> Result<()> {
    let history = client.get("/api/history")?;
    for entry in history.as_array().cloned().unwrap_or_default() {
        println!(
            "{:<30} last {}  {} snapshot(s)  {}  [{}]",
            entry["hostname"].as_str().unwrap_or("?"),
            entry["last_backup"].as_str().unwrap_or("never"),
            entry["snapshots"],
            output::human_bytes(entry["total_size"].as_u64().unwrap_or(0)),
            entry["status"].as_str().unwrap_or("unknown"),
        );
    }
    Ok(())
}
