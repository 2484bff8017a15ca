// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Post-transfer verification of the destination file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::checksum::ChecksumSpec;
use crate::outcome::Outcome;

/// Check that a nominally successful transfer left the expected file.
///
/// Returns the file size on success. Permissions are normalised to 0644 on
/// a best-effort basis first.
pub fn verify_destination(
    path: &Path,
    expected_size: Option<u64>,
    checksum: Option<&ChecksumSpec>,
) -> Result<u64, Outcome> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(Outcome::DestinationMissing),
    };

    normalise_permissions(path);

    let actual = metadata.len();
    if let Some(expected) = expected_size {
        if actual != expected {
            return Err(Outcome::SizeMismatch { expected, actual });
        }
    }

    if let Some(spec) = checksum {
        if let Err(actual) = spec.check(path) {
            return Err(Outcome::ChecksumMismatch {
                expected: spec.to_string(),
                actual: actual.map(|digest| format!("{}:{}", spec.algorithm, digest)),
            });
        }
    }

    Ok(actual)
}

#[cfg(unix)]
fn normalise_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o644)) {
        debug!("Could not set permissions on {}: {}", path.display(), e);
    }
}

#[cfg(not(unix))]
fn normalise_permissions(_path: &Path) {}

/// Removes the destination file on drop unless the attempt is kept.
///
/// Created before every retrieval attempt so no failure path leaves a
/// partial or unverified file behind.
#[derive(Debug)]
pub struct PartialArtifact {
    path: PathBuf,
    armed: bool,
}

impl PartialArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Keep the file in place.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialArtifact {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial artifact {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", self.path.display(), e),
        }
    }
}
