// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Immutable run requests built from command-line input.
//!
//! Everything that can be rejected without contacting storage is rejected
//! here, before any adapter is built.

use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::checksum::ChecksumSpec;
use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::url::StorageUrl;

/// Raw retrieval arguments, as typed by the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetrievalInput<'a> {
    pub source: &'a str,
    pub destination: &'a str,
    pub size: Option<&'a str>,
    pub checksum: Option<&'a str>,
    pub space_token: Option<&'a str>,
    pub guid: Option<&'a str>,
}

/// A validated retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub source: StorageUrl,
    /// Final destination file path
    pub destination: PathBuf,
    pub expected_size: Option<u64>,
    pub checksum: Option<ChecksumSpec>,
    pub space_token: Option<String>,
    pub guid: Option<String>,
}

impl TransferRequest {
    /// Validate input, resolve the destination and refuse to overwrite an
    /// existing file.
    pub fn from_input(input: RetrievalInput<'_>, config: &Config) -> Result<Self> {
        let source = StorageUrl::parse(input.source, config)?;
        let expected_size = input.size.map(parse_size).transpose()?;
        let checksum = input.checksum.map(ChecksumSpec::parse).transpose()?;

        let destination = resolve_destination(input.destination, &source.filename)?;
        check_existing(&destination, expected_size, checksum.as_ref())?;

        Ok(Self {
            source,
            destination,
            expected_size,
            checksum,
            space_token: non_empty(input.space_token),
            guid: non_empty(input.guid),
        })
    }
}

/// A validated removal.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalRequest {
    pub endpoint: StorageUrl,
    pub space_token: Option<String>,
}

impl RemovalRequest {
    pub fn from_input(endpoint: &str, space_token: Option<&str>, config: &Config) -> Result<Self> {
        Ok(Self {
            endpoint: StorageUrl::parse(endpoint, config)?,
            space_token: non_empty(space_token),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Parse a positive byte count.
pub fn parse_size(input: &str) -> Result<u64> {
    match input.trim().parse::<u64>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(ValidationError::InvalidSize(input.to_string())),
    }
}

/// Final destination path: directories (or paths ending in a separator) get
/// the source filename appended. Missing directories are created.
pub fn resolve_destination(raw: &str, filename: &str) -> Result<PathBuf> {
    let mut path = PathBuf::from(raw);
    if path.is_relative() {
        let cwd = std::env::current_dir().map_err(|source| ValidationError::DestinationCreate {
            path: path.clone(),
            source,
        })?;
        path = cwd.join(path);
    }

    let names_directory = raw.ends_with('/') || raw.ends_with(MAIN_SEPARATOR) || path.is_dir();
    if names_directory {
        ensure_directory(&path)?;
        return Ok(path.join(filename));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }
    Ok(path)
}

fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| ValidationError::DestinationCreate {
        path: dir.to_path_buf(),
        source,
    })
}

/// Refuse to proceed when the destination file already exists.
///
/// Always returns an error for an existing file; the variant says whether
/// it matches the expected size and checksum.
pub fn check_existing(
    path: &Path,
    expected_size: Option<u64>,
    checksum: Option<&ChecksumSpec>,
) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(()),
    };

    if let Some(expected) = expected_size {
        if metadata.len() != expected {
            return Err(ValidationError::ExistingSizeDiffers {
                path: path.to_path_buf(),
                expected,
                actual: metadata.len(),
            });
        }
    }

    if let Some(spec) = checksum {
        if spec.check(path).is_err() {
            return Err(ValidationError::ExistingChecksumDiffers {
                path: path.to_path_buf(),
                expected: spec.to_string(),
            });
        }
    }

    Err(ValidationError::AlreadyIdentical(path.to_path_buf()))
}
