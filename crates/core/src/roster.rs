// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The server roster: one line per host, options after the hostname.
//!
//! The file is the source of truth — every operation re-reads it, mutates,
//! and writes back with temp-then-rename. A single writer is assumed.

use crate::record::BackupMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from roster parsing and mutation
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid roster line {line:?}: {reason}")]
    Parse { line: String, reason: String },
    #[error("host already present: {0}")]
    DuplicateHost(String),
    #[error("host not found: {0}")]
    NotFound(String),
}

/// One roster line.
///
/// Recognized options: `--files-only`, `--db-only`, `--no-rotate`,
/// `--priority <int>`, `--db-interval <N>h`, `--notify <email>`,
/// `--notify-ok`. Anything else passes through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub hostname: String,
    /// Lower runs earlier in the daily run. Valid range 1..=999.
    pub priority: i32,
    /// `None` or `Some(0)` means no interval backups.
    pub db_interval_hours: Option<u32>,
    pub mode: BackupMode,
    pub rotate: bool,
    pub notify_email: Option<String>,
    /// Success notifications for this host even when globally suppressed.
    pub notify_ok: bool,
    /// Unrecognized option tokens, preserved in order.
    pub extra_options: Vec<String>,
}

pub const DEFAULT_PRIORITY: i32 = 10;

impl ServerEntry {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            priority: DEFAULT_PRIORITY,
            db_interval_hours: None,
            mode: BackupMode::Full,
            rotate: true,
            notify_email: None,
            notify_ok: false,
            extra_options: Vec::new(),
        }
    }

    /// Parse a roster line. Blank lines and comments are handled by the caller.
    pub fn parse(line: &str) -> Result<Self, RosterError> {
        let parse_err = |reason: &str| RosterError::Parse {
            line: line.to_string(),
            reason: reason.to_string(),
        };
        let mut tokens = line.split_whitespace();
        let hostname = tokens.next().ok_or_else(|| parse_err("empty line"))?;
        if hostname.starts_with('-') {
            return Err(parse_err("missing hostname"));
        }
        let mut entry = ServerEntry::new(hostname);
        while let Some(token) = tokens.next() {
            match token {
                "--files-only" => entry.mode = BackupMode::FilesOnly,
                "--db-only" => entry.mode = BackupMode::DbOnly,
                "--no-rotate" => entry.rotate = false,
                "--notify-ok" => entry.notify_ok = true,
                "--priority" => {
                    let value = tokens.next().ok_or_else(|| parse_err("--priority needs a value"))?;
                    let priority: i32 =
                        value.parse().map_err(|_| parse_err("--priority is not an integer"))?;
                    if !(1..=999).contains(&priority) {
                        return Err(parse_err("--priority out of range 1..=999"));
                    }
                    entry.priority = priority;
                }
                "--db-interval" => {
                    let value =
                        tokens.next().ok_or_else(|| parse_err("--db-interval needs a value"))?;
                    let digits = value.strip_suffix('h').unwrap_or(value);
                    let hours: u32 = digits
                        .parse()
                        .map_err(|_| parse_err("--db-interval is not a number of hours"))?;
                    entry.db_interval_hours = (hours > 0).then_some(hours);
                }
                "--notify" => {
                    let email = tokens.next().ok_or_else(|| parse_err("--notify needs a value"))?;
                    entry.notify_email = Some(email.to_string());
                }
                other => entry.extra_options.push(other.to_string()),
            }
        }
        Ok(entry)
    }

    /// Serialize to roster line format. `parse(serialize(e)) == e`.
    pub fn serialize(&self) -> String {
        let mut parts = vec![self.hostname.clone()];
        match self.mode {
            BackupMode::Full => {}
            BackupMode::FilesOnly => parts.push("--files-only".to_string()),
            BackupMode::DbOnly => parts.push("--db-only".to_string()),
        }
        if !self.rotate {
            parts.push("--no-rotate".to_string());
        }
        if self.priority != DEFAULT_PRIORITY {
            parts.push(format!("--priority {}", self.priority));
        }
        if let Some(hours) = self.db_interval_hours {
            parts.push(format!("--db-interval {hours}h"));
        }
        if let Some(email) = &self.notify_email {
            parts.push(format!("--notify {email}"));
        }
        if self.notify_ok {
            parts.push("--notify-ok".to_string());
        }
        parts.extend(self.extra_options.iter().cloned());
        parts.join(" ")
    }
}

/// A roster file (active or archive). Holds only the path; content is
/// re-read on every operation.
#[derive(Debug, Clone)]
pub struct Roster {
    path: PathBuf,
}

impl Roster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all entries. A missing file is an empty roster.
    pub fn read(&self) -> Result<Vec<ServerEntry>, RosterError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        let mut entries = Vec::new();
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            entries.push(ServerEntry::parse(trimmed)?);
        }
        Ok(entries)
    }

    /// Look up a single host.
    pub fn find(&self, hostname: &str) -> Result<Option<ServerEntry>, RosterError> {
        Ok(self.read()?.into_iter().find(|e| e.hostname == hostname))
    }

    /// Append a new entry. Duplicate hostnames conflict.
    pub fn append(&self, entry: &ServerEntry) -> Result<(), RosterError> {
        let mut entries = self.read()?;
        if entries.iter().any(|e| e.hostname == entry.hostname) {
            return Err(RosterError::DuplicateHost(entry.hostname.clone()));
        }
        entries.push(entry.clone());
        self.write(&entries)
    }

    /// Replace an entry in place, keeping its line position.
    pub fn update(&self, entry: &ServerEntry) -> Result<(), RosterError> {
        let mut entries = self.read()?;
        let slot = entries
            .iter_mut()
            .find(|e| e.hostname == entry.hostname)
            .ok_or_else(|| RosterError::NotFound(entry.hostname.clone()))?;
        *slot = entry.clone();
        self.write(&entries)
    }

    /// Remove and return an entry.
    pub fn remove(&self, hostname: &str) -> Result<ServerEntry, RosterError> {
        let mut entries = self.read()?;
        let pos = entries
            .iter()
            .position(|e| e.hostname == hostname)
            .ok_or_else(|| RosterError::NotFound(hostname.to_string()))?;
        let entry = entries.remove(pos);
        self.write(&entries)?;
        Ok(entry)
    }

    /// Move an entry from this roster to `other` (archive / unarchive).
    pub fn move_to(&self, other: &Roster, hostname: &str) -> Result<ServerEntry, RosterError> {
        let entry = self
            .find(hostname)?
            .ok_or_else(|| RosterError::NotFound(hostname.to_string()))?;
        other.append(&entry)?;
        self.remove(hostname)?;
        Ok(entry)
    }

    /// Overwrite the roster file (temp + rename).
    pub fn write(&self, entries: &[ServerEntry]) -> Result<(), RosterError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut content = String::new();
        for entry in entries {
            content.push_str(&entry.serialize());
            content.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))?;
        Ok(())
    }

    fn io_err(&self, source: std::io::Error) -> RosterError {
        RosterError::Io { path: self.path.clone(), source }
    }
}

#[cfg(test)]
#[path = "roster_tests.rs"]
mod tests;
