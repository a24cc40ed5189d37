// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive production for downloads and restores.

use crate::error::TransportError;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;
use walkdir::WalkDir;

/// Download/restore archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    #[default]
    TarGz,
    Zip,
}

tm_core::simple_display! {
    ArchiveFormat {
        TarGz => "tar.gz",
        Zip => "zip",
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tar.gz" | "tgz" => Ok(ArchiveFormat::TarGz),
            "zip" => Ok(ArchiveFormat::Zip),
            other => Err(other.to_string()),
        }
    }
}

impl ArchiveFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "application/gzip",
            ArchiveFormat::Zip => "application/zip",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }
}

/// Archive `src` (a file or directory) into `dest`. The archive root is the
/// source's base name, so extraction reproduces the subtree in place.
pub fn create_archive(
    src: &Path,
    dest: &Path,
    format: ArchiveFormat,
) -> Result<(), TransportError> {
    let out = File::create(dest).map_err(|e| TransportError::io(dest, e))?;
    match format {
        ArchiveFormat::TarGz => write_tar_gz(src, out),
        ArchiveFormat::Zip => write_zip(src, out),
    }
}

fn write_tar_gz(src: &Path, out: File) -> Result<(), TransportError> {
    let encoder = GzEncoder::new(out, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    let name = base_name(src);
    if src.is_dir() {
        builder.append_dir_all(&name, src).map_err(|e| TransportError::io(src, e))?;
    } else {
        builder
            .append_path_with_name(src, &name)
            .map_err(|e| TransportError::io(src, e))?;
    }
    let encoder = builder.into_inner().map_err(|e| TransportError::io(src, e))?;
    encoder.finish().map_err(|e| TransportError::io(src, e))?;
    Ok(())
}

fn write_zip(src: &Path, out: File) -> Result<(), TransportError> {
    let mut zip = zip::ZipWriter::new(out);
    let options: zip::write::SimpleFileOptions = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    let root = base_name(src);

    let add_file = |zip: &mut zip::ZipWriter<File>, path: &Path, name: &str| {
        zip.start_file(name, options).map_err(|e| TransportError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        let mut file = File::open(path).map_err(|e| TransportError::io(path, e))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(|e| TransportError::io(path, e))?;
        zip.write_all(&buf).map_err(|e| TransportError::io(path, e))?;
        Ok::<(), TransportError>(())
    };

    if src.is_dir() {
        for entry in WalkDir::new(src).into_iter().flatten() {
            let rel = match entry.path().strip_prefix(src) {
                Ok(rel) if !rel.as_os_str().is_empty() => rel,
                _ => continue,
            };
            let name = format!("{root}/{}", rel.to_string_lossy());
            if entry.file_type().is_dir() {
                zip.add_directory(&name, options).map_err(|e| TransportError::Io {
                    path: entry.path().to_path_buf(),
                    source: std::io::Error::other(e),
                })?;
            } else if entry.file_type().is_file() {
                add_file(&mut zip, entry.path(), &name)?;
            }
        }
    } else {
        add_file(&mut zip, src, &root)?;
    }
    zip.finish().map_err(|e| TransportError::Io {
        path: src.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    Ok(())
}

fn base_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "archive".to_string())
}

#[cfg(test)]
#[path = "archive_tests.rs"]
mod tests;
