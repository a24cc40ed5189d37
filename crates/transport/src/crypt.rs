// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gpg driver for encrypted archive production and opt-in restore
//! decryption.

use crate::error::TransportError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tm_core::{EncryptMode, Settings};
use tokio::process::Command;
use tracing::info;

/// File suffix of an encrypted archive.
pub const ENCRYPTED_SUFFIX: &str = ".gpg";

/// Whether a snapshot holds only an encrypted archive (no plain `files/`).
pub fn is_encrypted_only(snapshot_dir: &Path) -> bool {
    !snapshot_dir.join("files").is_dir() && encrypted_archive_path(snapshot_dir).is_file()
}

/// Path of the encrypted archive inside a snapshot.
pub fn encrypted_archive_path(snapshot_dir: &Path) -> PathBuf {
    snapshot_dir.join(format!("files.tar.gz{ENCRYPTED_SUFFIX}"))
}

/// Encrypt `input` to `input.gpg` according to settings. Returns the
/// output path.
pub async fn encrypt_file(settings: &Settings, input: &Path) -> Result<PathBuf, TransportError> {
    let output = PathBuf::from(format!("{}{ENCRYPTED_SUFFIX}", input.display()));
    let mut cmd = Command::new("gpg");
    cmd.arg("--batch").arg("--yes").arg("--output").arg(&output);
    match settings.encrypt_mode {
        EncryptMode::Asymmetric => {
            let recipient = settings.encrypt_recipient.as_deref().unwrap_or_default();
            cmd.arg("--encrypt").arg("--recipient").arg(recipient);
        }
        EncryptMode::Symmetric => {
            cmd.arg("--symmetric");
            if let Some(passphrase_file) = &settings.encrypt_passphrase_file {
                cmd.arg("--passphrase-file").arg(passphrase_file).arg("--pinentry-mode").arg("loopback");
            }
        }
    }
    cmd.arg(input);
    run_gpg(cmd).await?;
    info!(output = %output.display(), "encrypted archive written");
    Ok(output)
}

/// Decrypt `input` (an `.gpg` archive) into `output`.
pub async fn decrypt_file(
    settings: &Settings,
    input: &Path,
    output: &Path,
) -> Result<(), TransportError> {
    let mut cmd = Command::new("gpg");
    cmd.arg("--batch").arg("--yes").arg("--output").arg(output);
    if let Some(passphrase_file) = &settings.encrypt_passphrase_file {
        cmd.arg("--passphrase-file").arg(passphrase_file).arg("--pinentry-mode").arg("loopback");
    }
    cmd.arg("--decrypt").arg(input);
    run_gpg(cmd).await
}

async fn run_gpg(mut cmd: Command) -> Result<(), TransportError> {
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null()).kill_on_drop(true);
    let status = cmd
        .status()
        .await
        .map_err(|e| TransportError::Spawn { command: "gpg".to_string(), source: e })?;
    if !status.success() {
        return Err(TransportError::Gpg { code: status.code().unwrap_or(-1) });
    }
    Ok(())
}
