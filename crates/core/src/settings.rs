// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide settings loaded from the environment file.
//!
//! The file is line-oriented `key=value`; every recognized key has a default
//! so an empty file is a valid configuration. Unknown lines are preserved
//! verbatim on save so operator annotations survive API-driven edits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Errors from loading or saving settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
    #[error("{key} out of range: {value}")]
    Range { key: String, value: String },
}

/// Database engines the dump driver knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    Mysql,
    Postgres,
    Mongo,
    Redis,
    Sqlite,
}

crate::simple_display! {
    DbEngine {
        Mysql => "mysql",
        Postgres => "postgres",
        Mongo => "mongo",
        Redis => "redis",
        Sqlite => "sqlite",
    }
}

impl FromStr for DbEngine {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" | "mariadb" => Ok(DbEngine::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(DbEngine::Postgres),
            "mongo" | "mongodb" => Ok(DbEngine::Mongo),
            "redis" => Ok(DbEngine::Redis),
            "sqlite" | "sqlite3" => Ok(DbEngine::Sqlite),
            _ => Err(()),
        }
    }
}

/// `db_types`: either probe the remote host or dump a fixed engine list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbTypes {
    Auto,
    List(Vec<DbEngine>),
}

impl Default for DbTypes {
    fn default() -> Self {
        DbTypes::Auto
    }
}

impl fmt::Display for DbTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbTypes::Auto => f.write_str("auto"),
            DbTypes::List(engines) => {
                let names: Vec<String> = engines.iter().map(|e| e.to_string()).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}

impl FromStr for DbTypes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim() == "auto" {
            return Ok(DbTypes::Auto);
        }
        let mut engines = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let engine = part.parse().map_err(|_| part.to_string())?;
            if !engines.contains(&engine) {
                engines.push(engine);
            }
        }
        Ok(DbTypes::List(engines))
    }
}

/// Archive encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptMode {
    #[default]
    Symmetric,
    Asymmetric,
}

crate::simple_display! {
    EncryptMode {
        Symmetric => "symmetric",
        Asymmetric => "asymmetric",
    }
}

/// Notification delivery channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMethod {
    Email,
    Webhook,
    Slack,
}

crate::simple_display! {
    NotifyMethod {
        Email => "email",
        Webhook => "webhook",
        Slack => "slack",
    }
}

impl FromStr for NotifyMethod {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(NotifyMethod::Email),
            "webhook" => Ok(NotifyMethod::Webhook),
            "slack" => Ok(NotifyMethod::Slack),
            _ => Err(()),
        }
    }
}

/// Typed view of the environment file. One instance is shared by the
/// scheduler, supervisor, and HTTP API; the reload marker swaps it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Backup
    pub backup_root: PathBuf,
    pub backup_source: String,
    pub retention_days: u32,
    pub parallel_jobs: usize,
    pub rsync_bw_limit: Option<u32>,
    pub rsync_extra_opts: Vec<String>,
    pub rsync_flags_override: Option<String>,

    // SSH
    pub ssh_port: u16,
    pub ssh_key_path: PathBuf,
    pub ssh_timeout: u64,

    // Database dumps
    pub db_types: DbTypes,
    pub credentials_dir: PathBuf,
    pub mysql_pw_file: Option<PathBuf>,
    pub mysql_host: String,
    pub pg_user: String,
    pub pg_host: String,
    pub mongo_host: String,
    pub mongo_auth_db: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub sqlite_paths: Vec<String>,
    pub db_dump_retries: u32,

    // API
    pub api_port: u16,
    pub api_bind: String,

    // Scheduler
    pub schedule_hour: u8,
    pub schedule_minute: u8,

    // Notifications
    pub alert_enabled: bool,
    pub alert_email: Option<String>,
    pub notify_methods: Vec<NotifyMethod>,
    pub notify_ok: bool,
    pub webhook_url: Option<String>,
    pub slack_webhook_url: Option<String>,

    // Encryption
    pub encrypt_enabled: bool,
    pub encrypt_mode: EncryptMode,
    pub encrypt_recipient: Option<String>,
    pub encrypt_passphrase_file: Option<PathBuf>,

    // Daemon paths
    pub run_dir: PathBuf,
    pub log_dir: PathBuf,

    /// Directory holding the environment file, roster, and excludes.
    #[serde(skip)]
    pub config_dir: PathBuf,
    /// Unrecognized lines, preserved verbatim on save.
    #[serde(skip)]
    unknown_lines: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_root: PathBuf::from("/backup"),
            backup_source: "/".to_string(),
            retention_days: 30,
            parallel_jobs: 2,
            rsync_bw_limit: None,
            rsync_extra_opts: Vec::new(),
            rsync_flags_override: None,
            ssh_port: 22,
            ssh_key_path: PathBuf::from("/root/.ssh/id_rsa"),
            ssh_timeout: 10,
            db_types: DbTypes::Auto,
            credentials_dir: PathBuf::from("/etc/tmservice/credentials"),
            mysql_pw_file: None,
            mysql_host: "localhost".to_string(),
            pg_user: "postgres".to_string(),
            pg_host: "localhost".to_string(),
            mongo_host: "localhost".to_string(),
            mongo_auth_db: "admin".to_string(),
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            sqlite_paths: Vec::new(),
            db_dump_retries: 3,
            api_port: 7600,
            api_bind: "0.0.0.0".to_string(),
            schedule_hour: 2,
            schedule_minute: 0,
            alert_enabled: true,
            alert_email: None,
            notify_methods: vec![NotifyMethod::Email],
            notify_ok: false,
            webhook_url: None,
            slack_webhook_url: None,
            encrypt_enabled: false,
            encrypt_mode: EncryptMode::Symmetric,
            encrypt_recipient: None,
            encrypt_passphrase_file: None,
            run_dir: PathBuf::from("/run/tmservice"),
            log_dir: PathBuf::from("/var/log/tmservice"),
            config_dir: PathBuf::from("/etc/tmservice"),
            unknown_lines: Vec::new(),
        }
    }
}

/// Keys the settings API will read and write.
pub const KNOWN_KEYS: &[&str] = &[
    "backup_root",
    "backup_source",
    "retention_days",
    "parallel_jobs",
    "rsync_bw_limit",
    "rsync_extra_opts",
    "rsync_flags_override",
    "ssh_port",
    "ssh_key_path",
    "ssh_timeout",
    "db_types",
    "credentials_dir",
    "mysql_pw_file",
    "mysql_host",
    "pg_user",
    "pg_host",
    "mongo_host",
    "mongo_auth_db",
    "redis_host",
    "redis_port",
    "sqlite_paths",
    "db_dump_retries",
    "api_port",
    "api_bind",
    "schedule_hour",
    "schedule_minute",
    "alert_enabled",
    "alert_email",
    "notify_methods",
    "notify_ok",
    "webhook_url",
    "slack_webhook_url",
    "encrypt_enabled",
    "encrypt_mode",
    "encrypt_recipient",
    "encrypt_passphrase_file",
    "run_dir",
    "log_dir",
];

impl Settings {
    /// Load settings from the environment file.
    ///
    /// A missing file yields pure defaults; a malformed value refuses startup.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = Settings {
            config_dir: path.parent().unwrap_or(Path::new("/etc/tmservice")).to_path_buf(),
            ..Settings::default()
        };
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(settings),
            Err(e) => return Err(SettingsError::Io { path: path.to_path_buf(), source: e }),
        };
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                settings.unknown_lines.push(line.to_string());
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                settings.unknown_lines.push(line.to_string());
                continue;
            };
            let key = key.trim();
            let value = value.trim().trim_matches('"');
            if !settings.apply_key(key, value)? {
                settings.unknown_lines.push(line.to_string());
            }
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Apply one `key=value` pair. Returns false for unrecognized keys.
    pub fn apply_key(&mut self, key: &str, value: &str) -> Result<bool, SettingsError> {
        let invalid = |key: &str, value: &str| SettingsError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "backup_root" => self.backup_root = PathBuf::from(value),
            "backup_source" => self.backup_source = value.to_string(),
            "retention_days" => {
                self.retention_days = value.parse().map_err(|_| invalid(key, value))?
            }
            "parallel_jobs" => {
                let n: usize = value.parse().map_err(|_| invalid(key, value))?;
                if n == 0 {
                    return Err(SettingsError::Range {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.parallel_jobs = n;
            }
            "rsync_bw_limit" => {
                let n: u32 = value.parse().map_err(|_| invalid(key, value))?;
                self.rsync_bw_limit = (n > 0).then_some(n);
            }
            "rsync_extra_opts" => {
                self.rsync_extra_opts =
                    value.split_whitespace().map(|s| s.to_string()).collect();
            }
            "rsync_flags_override" => {
                self.rsync_flags_override =
                    (!value.is_empty()).then(|| value.to_string());
            }
            "ssh_port" => self.ssh_port = value.parse().map_err(|_| invalid(key, value))?,
            "ssh_key_path" => self.ssh_key_path = PathBuf::from(value),
            "ssh_timeout" => self.ssh_timeout = value.parse().map_err(|_| invalid(key, value))?,
            "db_types" => {
                self.db_types = value.parse().map_err(|bad: String| SettingsError::Invalid {
                    key: key.to_string(),
                    value: bad,
                })?
            }
            "credentials_dir" => self.credentials_dir = PathBuf::from(value),
            "mysql_pw_file" => {
                self.mysql_pw_file = (!value.is_empty()).then(|| PathBuf::from(value))
            }
            "mysql_host" => self.mysql_host = value.to_string(),
            "pg_user" => self.pg_user = value.to_string(),
            "pg_host" => self.pg_host = value.to_string(),
            "mongo_host" => self.mongo_host = value.to_string(),
            "mongo_auth_db" => self.mongo_auth_db = value.to_string(),
            "redis_host" => self.redis_host = value.to_string(),
            "redis_port" => self.redis_port = value.parse().map_err(|_| invalid(key, value))?,
            "sqlite_paths" => {
                self.sqlite_paths = value
                    .split(':')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect();
            }
            "db_dump_retries" => {
                self.db_dump_retries = value.parse().map_err(|_| invalid(key, value))?
            }
            "api_port" => self.api_port = value.parse().map_err(|_| invalid(key, value))?,
            "api_bind" => self.api_bind = value.to_string(),
            "schedule_hour" => {
                let hour: u8 = value.parse().map_err(|_| invalid(key, value))?;
                if hour > 23 {
                    return Err(SettingsError::Range {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.schedule_hour = hour;
            }
            "schedule_minute" => {
                let minute: u8 = value.parse().map_err(|_| invalid(key, value))?;
                if minute > 59 {
                    return Err(SettingsError::Range {
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                self.schedule_minute = minute;
            }
            "alert_enabled" => self.alert_enabled = parse_bool(value).ok_or_else(|| invalid(key, value))?,
            "alert_email" => self.alert_email = (!value.is_empty()).then(|| value.to_string()),
            "notify_methods" => {
                let mut methods = Vec::new();
                for part in value.split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    let method = part.parse().map_err(|_| invalid(key, part))?;
                    if !methods.contains(&method) {
                        methods.push(method);
                    }
                }
                self.notify_methods = methods;
            }
            "notify_ok" => self.notify_ok = parse_bool(value).ok_or_else(|| invalid(key, value))?,
            "webhook_url" => self.webhook_url = (!value.is_empty()).then(|| value.to_string()),
            "slack_webhook_url" => {
                self.slack_webhook_url = (!value.is_empty()).then(|| value.to_string())
            }
            "encrypt_enabled" => {
                self.encrypt_enabled = parse_bool(value).ok_or_else(|| invalid(key, value))?
            }
            "encrypt_mode" => {
                self.encrypt_mode = match value {
                    "symmetric" => EncryptMode::Symmetric,
                    "asymmetric" => EncryptMode::Asymmetric,
                    _ => return Err(invalid(key, value)),
                }
            }
            "encrypt_recipient" => {
                self.encrypt_recipient = (!value.is_empty()).then(|| value.to_string())
            }
            "encrypt_passphrase_file" => {
                self.encrypt_passphrase_file = (!value.is_empty()).then(|| PathBuf::from(value))
            }
            "run_dir" => self.run_dir = PathBuf::from(value),
            "log_dir" => self.log_dir = PathBuf::from(value),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.schedule_hour > 23 {
            return Err(SettingsError::Range {
                key: "schedule_hour".to_string(),
                value: self.schedule_hour.to_string(),
            });
        }
        if self.schedule_minute > 59 {
            return Err(SettingsError::Range {
                key: "schedule_minute".to_string(),
                value: self.schedule_minute.to_string(),
            });
        }
        Ok(())
    }

    /// Serialize to the environment-file format, known keys first,
    /// unknown lines preserved at the end.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.to_map() {
            out.push_str(&format!("{key}={value}\n"));
        }
        for line in &self.unknown_lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Write the environment file atomically (temp + rename).
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io = |source| SettingsError::Io { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, self.serialize()).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)?;
        Ok(())
    }

    /// Known keys and their current values, as strings.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        let opt_path =
            |v: &Option<PathBuf>| v.as_deref().map(|p| p.display().to_string()).unwrap_or_default();
        let mut map = BTreeMap::new();
        map.insert("backup_root".into(), self.backup_root.display().to_string());
        map.insert("backup_source".into(), self.backup_source.clone());
        map.insert("retention_days".into(), self.retention_days.to_string());
        map.insert("parallel_jobs".into(), self.parallel_jobs.to_string());
        map.insert(
            "rsync_bw_limit".into(),
            self.rsync_bw_limit.map(|n| n.to_string()).unwrap_or_else(|| "0".into()),
        );
        map.insert("rsync_extra_opts".into(), self.rsync_extra_opts.join(" "));
        map.insert("rsync_flags_override".into(), opt(&self.rsync_flags_override));
        map.insert("ssh_port".into(), self.ssh_port.to_string());
        map.insert("ssh_key_path".into(), self.ssh_key_path.display().to_string());
        map.insert("ssh_timeout".into(), self.ssh_timeout.to_string());
        map.insert("db_types".into(), self.db_types.to_string());
        map.insert("credentials_dir".into(), self.credentials_dir.display().to_string());
        map.insert("mysql_pw_file".into(), opt_path(&self.mysql_pw_file));
        map.insert("mysql_host".into(), self.mysql_host.clone());
        map.insert("pg_user".into(), self.pg_user.clone());
        map.insert("pg_host".into(), self.pg_host.clone());
        map.insert("mongo_host".into(), self.mongo_host.clone());
        map.insert("mongo_auth_db".into(), self.mongo_auth_db.clone());
        map.insert("redis_host".into(), self.redis_host.clone());
        map.insert("redis_port".into(), self.redis_port.to_string());
        map.insert("sqlite_paths".into(), self.sqlite_paths.join(":"));
        map.insert("db_dump_retries".into(), self.db_dump_retries.to_string());
        map.insert("api_port".into(), self.api_port.to_string());
        map.insert("api_bind".into(), self.api_bind.clone());
        map.insert("schedule_hour".into(), self.schedule_hour.to_string());
        map.insert("schedule_minute".into(), self.schedule_minute.to_string());
        map.insert("alert_enabled".into(), self.alert_enabled.to_string());
        map.insert("alert_email".into(), opt(&self.alert_email));
        map.insert(
            "notify_methods".into(),
            self.notify_methods.iter().map(|m| m.to_string()).collect::<Vec<_>>().join(","),
        );
        map.insert("notify_ok".into(), self.notify_ok.to_string());
        map.insert("webhook_url".into(), opt(&self.webhook_url));
        map.insert("slack_webhook_url".into(), opt(&self.slack_webhook_url));
        map.insert("encrypt_enabled".into(), self.encrypt_enabled.to_string());
        map.insert("encrypt_mode".into(), self.encrypt_mode.to_string());
        map.insert("encrypt_recipient".into(), opt(&self.encrypt_recipient));
        map.insert(
            "encrypt_passphrase_file".into(),
            opt_path(&self.encrypt_passphrase_file),
        );
        map.insert("run_dir".into(), self.run_dir.display().to_string());
        map.insert("log_dir".into(), self.log_dir.display().to_string());
        map
    }

    // Derived paths. The file names are part of the external interface;
    // helper tools read them directly.

    pub fn state_dir(&self) -> PathBuf {
        self.run_dir.join("state")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.run_dir.join("tmserviced.pid")
    }

    pub fn roster_path(&self) -> PathBuf {
        self.config_dir.join("servers.conf")
    }

    pub fn archive_roster_path(&self) -> PathBuf {
        self.config_dir.join("servers-archived.conf")
    }

    pub fn global_excludes_path(&self) -> PathBuf {
        self.config_dir.join("excludes.conf")
    }

    pub fn host_excludes_path(&self, hostname: &str) -> PathBuf {
        self.config_dir.join(format!("excludes-{hostname}.conf"))
    }

    pub fn host_root(&self, hostname: &str) -> PathBuf {
        self.backup_root.join(hostname)
    }

    pub fn ssh_pubkey_path(&self) -> PathBuf {
        let mut name = self.ssh_key_path.as_os_str().to_os_string();
        name.push(".pub");
        PathBuf::from(name)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
