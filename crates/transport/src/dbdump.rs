// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote database dump driver.
//!
//! Nothing is installed on the remote host: a self-contained POSIX shell
//! program is piped over SSH together with a prelude that exports per-engine
//! configuration. The remote side probes for engines, dumps each one with
//! bounded retries into `~/sql/`, and reports per-engine results on stdout
//! using `TMDUMP` markers this driver parses.

use crate::error::TransportError;
use crate::rsync::SshOptions;
use std::process::Stdio;
use thiserror::Error;
use tm_core::{DbTypes, Settings};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Marker prefix the remote dump program prints for machine parsing.
const MARKER: &str = "TMDUMP";

/// The dump program piped to the remote host. Kept POSIX-sh so it runs on
/// anything with a shell; engine tools are probed, never assumed.
const DUMP_SCRIPT: &str = r#"
set -u
say() { echo "TMDUMP $*"; }
have() { command -v "$1" >/dev/null 2>&1; }

wants() {
    case ",${TM_DB_TYPES}," in
        *,auto,*) have "$1" ;;
        *,"$2",*) true ;;
        *) false ;;
    esac
}

retry() {
    i=0
    while [ "$i" -lt "${TM_RETRIES}" ]; do
        "$@" && return 0
        i=$((i + 1))
        sleep 2
    done
    return 1
}

say BEGIN
rm -rf "$HOME/sql"
mkdir -p "$HOME/sql" || { say FAIL setup workdir; exit 1; }
found=0

if wants mysqldump mysql; then
    found=1
    if [ -n "${TM_MYSQL_PW_FILE}" ] && [ ! -r "${TM_MYSQL_PW_FILE}" ]; then
        say FAIL mysql missing-password
    else
        [ -n "${TM_MYSQL_PW_FILE}" ] && MYSQL_PWD=$(cat "${TM_MYSQL_PW_FILE}") && export MYSQL_PWD
        dbs=$(mysql -h "${TM_MYSQL_HOST}" -N -e 'SHOW DATABASES' 2>/dev/null \
              | grep -Ev '^(information_schema|performance_schema|sys)$')
        if [ -z "$dbs" ]; then
            if mysql -h "${TM_MYSQL_HOST}" -N -e 'SELECT 1' >/dev/null 2>&1; then
                say FAIL mysql list
            else
                say FAIL mysql auth
            fi
        else
            ok=1
            for db in $dbs; do
                retry sh -c "mysqldump -h '${TM_MYSQL_HOST}' --single-transaction '$db' | gzip > '$HOME/sql/mysql-$db.sql.gz'" || ok=0
            done
            [ "$ok" = 1 ] && say OK mysql || say FAIL mysql dump
        fi
    fi
fi

if wants pg_dump postgres; then
    found=1
    dbs=$(psql -U "${TM_PG_USER}" -h "${TM_PG_HOST}" -At -c \
          'SELECT datname FROM pg_database WHERE NOT datistemplate' 2>/dev/null)
    if [ -z "$dbs" ]; then
        say FAIL postgres auth
    else
        ok=1
        for db in $dbs; do
            retry sh -c "pg_dump -U '${TM_PG_USER}' -h '${TM_PG_HOST}' '$db' | gzip > '$HOME/sql/pg-$db.sql.gz'" || ok=0
        done
        [ "$ok" = 1 ] && say OK postgres || say FAIL postgres dump
    fi
fi

if wants mongodump mongo; then
    found=1
    if retry mongodump --host "${TM_MONGO_HOST}" --authenticationDatabase "${TM_MONGO_AUTH_DB}" \
            --archive="$HOME/sql/mongo.archive.gz" --gzip >/dev/null 2>&1; then
        say OK mongo
    else
        say FAIL mongo dump
    fi
fi

if wants redis-cli redis; then
    found=1
    if retry redis-cli -h "${TM_REDIS_HOST}" -p "${TM_REDIS_PORT}" --rdb "$HOME/sql/redis.rdb" >/dev/null 2>&1; then
        say OK redis
    else
        say FAIL redis bgsave
    fi
fi

if wants sqlite3 sqlite; then
    found=1
    ok=1
    oldifs=$IFS; IFS=:
    for db in ${TM_SQLITE_PATHS}; do
        [ -f "$db" ] || continue
        name=$(basename "$db")
        retry sh -c "sqlite3 '$db' '.backup $HOME/sql/sqlite-$name'" || ok=0
    done
    IFS=$oldifs
    [ "$ok" = 1 ] && say OK sqlite || say FAIL sqlite dump
fi

[ "$found" = 0 ] && say NONE
say END
"#;

/// Classified database dump failures. Each maps to a typed notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbFailure {
    #[error("mysql authentication failed")]
    MysqlAuth,
    #[error("mysql database listing failed")]
    MysqlList,
    #[error("postgres authentication failed")]
    PostgresAuth,
    #[error("mongo dump failed")]
    MongoDump,
    #[error("redis rdb snapshot failed")]
    RedisBgsave,
    #[error("database password file missing")]
    MissingPassword,
    #[error("dump failed for {0}")]
    Other(String),
}

/// Per-engine result parsed from the remote markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineResult {
    pub engine: String,
    pub failure: Option<DbFailure>,
}

/// Everything the remote program needs, exported in the prelude.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub db_types: DbTypes,
    pub retries: u32,
    pub mysql_pw_file: String,
    pub mysql_host: String,
    pub pg_user: String,
    pub pg_host: String,
    pub mongo_host: String,
    pub mongo_auth_db: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub sqlite_paths: String,
}

impl DumpConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            db_types: settings.db_types.clone(),
            retries: settings.db_dump_retries.max(1),
            // The password file is a path on the remote host; the packaged
            // default lives under the credentials directory.
            mysql_pw_file: settings
                .mysql_pw_file
                .clone()
                .unwrap_or_else(|| settings.credentials_dir.join("mysql.pw"))
                .display()
                .to_string(),
            mysql_host: settings.mysql_host.clone(),
            pg_user: settings.pg_user.clone(),
            pg_host: settings.pg_host.clone(),
            mongo_host: settings.mongo_host.clone(),
            mongo_auth_db: settings.mongo_auth_db.clone(),
            redis_host: settings.redis_host.clone(),
            redis_port: settings.redis_port,
            sqlite_paths: settings.sqlite_paths.join(":"),
        }
    }

    /// Shell prelude exporting the configuration, prepended to the script.
    fn prelude(&self) -> String {
        let mut out = String::new();
        for (key, value) in [
            ("TM_DB_TYPES", self.db_types.to_string()),
            ("TM_RETRIES", self.retries.to_string()),
            ("TM_MYSQL_PW_FILE", self.mysql_pw_file.clone()),
            ("TM_MYSQL_HOST", self.mysql_host.clone()),
            ("TM_PG_USER", self.pg_user.clone()),
            ("TM_PG_HOST", self.pg_host.clone()),
            ("TM_MONGO_HOST", self.mongo_host.clone()),
            ("TM_MONGO_AUTH_DB", self.mongo_auth_db.clone()),
            ("TM_REDIS_HOST", self.redis_host.clone()),
            ("TM_REDIS_PORT", self.redis_port.to_string()),
            ("TM_SQLITE_PATHS", self.sqlite_paths.clone()),
        ] {
            out.push_str(&format!("{key}='{}'\nexport {key}\n", value.replace('\'', "'\\''")));
        }
        out
    }
}

/// Outcome of one remote dump run.
#[derive(Debug, Clone, Default)]
pub struct DbDumpOutcome {
    pub engines: Vec<EngineResult>,
    /// Full remote output, appended to failure notifications.
    pub output: String,
}

impl DbDumpOutcome {
    /// Parse `TMDUMP` markers out of remote output.
    pub fn parse(output: &str) -> Self {
        let mut engines = Vec::new();
        for line in output.lines() {
            let Some(rest) = line.strip_prefix(MARKER) else {
                continue;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            match fields.as_slice() {
                ["OK", engine] => {
                    engines.push(EngineResult { engine: engine.to_string(), failure: None });
                }
                ["FAIL", engine, code @ ..] => {
                    let code = code.join(" ");
                    engines.push(EngineResult {
                        engine: engine.to_string(),
                        failure: Some(classify(engine, &code)),
                    });
                }
                _ => {}
            }
        }
        Self { engines, output: output.to_string() }
    }

    /// No engines were present on the host. Informational, not a failure.
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn succeeded(&self) -> bool {
        self.engines.iter().all(|e| e.failure.is_none())
    }

    pub fn failures(&self) -> Vec<DbFailure> {
        self.engines.iter().filter_map(|e| e.failure.clone()).collect()
    }

    /// Whether any failure is a credentials problem that warrants the typed
    /// `db-credentials` notification.
    pub fn has_credential_failure(&self) -> bool {
        self.failures().iter().any(|f| {
            matches!(
                f,
                DbFailure::MysqlAuth | DbFailure::PostgresAuth | DbFailure::MissingPassword
            )
        })
    }
}

fn classify(engine: &str, code: &str) -> DbFailure {
    match (engine, code) {
        (_, "missing-password") => DbFailure::MissingPassword,
        ("mysql", "auth") => DbFailure::MysqlAuth,
        ("mysql", "list") => DbFailure::MysqlList,
        ("postgres", "auth") => DbFailure::PostgresAuth,
        ("mongo", _) => DbFailure::MongoDump,
        ("redis", _) => DbFailure::RedisBgsave,
        _ => DbFailure::Other(format!("{engine} {code}")),
    }
}

/// Pipe the dump program to the remote host and collect per-engine results.
pub async fn run_remote_dump(
    ssh: &SshOptions,
    hostname: &str,
    config: &DumpConfig,
) -> Result<DbDumpOutcome, TransportError> {
    let mut cmd = ssh.command(hostname);
    cmd.arg("sh").arg("-s").stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| TransportError::Spawn { command: "ssh".to_string(), source: e })?;

    let program = format!("{}{}", config.prelude(), DUMP_SCRIPT);
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(program.as_bytes())
            .await
            .map_err(|e| TransportError::Spawn { command: "ssh".to_string(), source: e })?;
        drop(stdin);
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| TransportError::Spawn { command: "ssh".to_string(), source: e })?;

    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    debug!(host = hostname, "remote dump output:\n{combined}");

    if !output.status.success() {
        return Err(TransportError::Ssh { code: output.status.code().unwrap_or(-1) });
    }

    let outcome = DbDumpOutcome::parse(&combined);
    if outcome.is_empty() {
        info!(host = hostname, "no database engines detected on remote host");
    }
    Ok(outcome)
}

#[cfg(test)]
#[path = "dbdump_tests.rs"]
mod tests;
