// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Attempt outcome taxonomy.
//!
//! Every external run is converted into an [`Outcome`] before the
//! orchestrator looks at it. Numeric exit codes only appear at the process
//! boundary ([`crate::exit`]).

use serde::{Serialize, Serializer};
use std::fmt;
use std::io;
use std::time::Duration;

use crate::protocol::Protocol;

/// Classification of a single protocol attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Fresh transfer succeeded
    Transferred,
    /// Caching layer already held the file
    AlreadyCached,
    /// Caching layer retried internally before succeeding
    TransferredAfterRetry { retries: u32 },
    /// Remote object deleted
    Removed,
    /// Tool exited with an error status
    CommandFailed { status: Option<i32> },
    /// Tool did not finish within its budget
    CommandTimeout,
    /// Tool reported success but no file was produced
    DestinationMissing,
    SizeMismatch { expected: u64, actual: u64 },
    /// `actual` is `None` when the digest could not be computed
    ChecksumMismatch {
        expected: String,
        actual: Option<String>,
    },
    /// Tool binary unavailable on this host
    CommandNotFound,
    /// Caching layer answered outside its contract
    InternalError { code: Option<i32> },
    /// Removal target never existed
    MissingOnRemote,
}

impl Outcome {
    /// Whether this outcome ends the fallback loop.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Transferred
                | Self::AlreadyCached
                | Self::TransferredAfterRetry { .. }
                | Self::Removed
        )
    }

    /// Status string used in logs and monitoring.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transferred => "transferred",
            Self::AlreadyCached => "already-cached",
            Self::TransferredAfterRetry { .. } => "transferred-after-retry",
            Self::Removed => "removed",
            Self::CommandFailed { .. } => "command-failed",
            Self::CommandTimeout => "command-timeout",
            Self::DestinationMissing => "destination-missing",
            Self::SizeMismatch { .. } => "size-mismatch",
            Self::ChecksumMismatch { .. } => "checksum-mismatch",
            Self::CommandNotFound => "command-not-found",
            Self::InternalError { .. } => "internal-error",
            Self::MissingOnRemote => "missing-on-remote",
        }
    }

    /// Secondary numeric detail, if any.
    pub fn detail(&self) -> Option<i64> {
        match self {
            Self::TransferredAfterRetry { retries } => Some(i64::from(*retries)),
            Self::CommandFailed { status } => status.map(i64::from),
            Self::InternalError { code } => code.map(i64::from),
            _ => None,
        }
    }

    /// Human-readable description of a failure.
    pub fn describe(&self) -> String {
        match self {
            Self::CommandFailed { status: Some(status) } => {
                if (1..=255).contains(status) {
                    format!(
                        "transfer command failed with status {}: {}",
                        status,
                        os_error_text(*status)
                    )
                } else {
                    format!("transfer command failed with status {}", status)
                }
            }
            Self::CommandFailed { status: None } => "transfer command failed".to_string(),
            Self::CommandTimeout => "transfer command timed out".to_string(),
            Self::DestinationMissing => {
                "transfer reported success but destination file is missing".to_string()
            }
            Self::SizeMismatch { expected, actual } => {
                format!("size mismatch: expected {} bytes, got {}", expected, actual)
            }
            Self::ChecksumMismatch {
                expected,
                actual: Some(actual),
            } => format!("checksum mismatch: expected {}, got {}", expected, actual),
            Self::ChecksumMismatch {
                expected,
                actual: None,
            } => format!("checksum could not be computed (expected {})", expected),
            Self::CommandNotFound => "transfer tool not found on this host".to_string(),
            Self::InternalError { code: Some(code) } => {
                format!("caching layer returned unexpected status {}", code)
            }
            Self::InternalError { code: None } => {
                "caching layer terminated abnormally".to_string()
            }
            Self::MissingOnRemote => "file does not exist on remote storage".to_string(),
            success => success.as_str().to_string(),
        }
    }
}

/// OS error description without the "(os error N)" suffix.
fn os_error_text(code: i32) -> String {
    let text = io::Error::from_raw_os_error(code).to_string();
    match text.rfind(" (os error") {
        Some(idx) => text[..idx].to_string(),
        None => text,
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Result of one executed protocol attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptResult {
    pub protocol: Protocol,
    pub outcome: Outcome,
    /// Bytes in place at the destination (successful attempt only)
    pub bytes: Option<u64>,
    /// Wall time of the attempt (successful attempt only)
    pub elapsed: Option<Duration>,
    /// Failure description (failed attempts only)
    pub error: Option<String>,
}

impl AttemptResult {
    pub fn new(protocol: Protocol, outcome: Outcome, bytes: Option<u64>, elapsed: Duration) -> Self {
        if outcome.is_success() {
            Self {
                protocol,
                outcome,
                bytes,
                elapsed: Some(elapsed),
                error: None,
            }
        } else {
            let error = Some(outcome.describe());
            Self {
                protocol,
                outcome,
                bytes: None,
                elapsed: None,
                error,
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    /// Throughput in bytes per second, when both size and time are known.
    pub fn throughput_bps(&self) -> Option<u64> {
        let bytes = self.bytes?;
        let secs = self.elapsed?.as_secs_f64();
        if secs <= 0.0 {
            return None;
        }
        Some((bytes as f64 / secs) as u64)
    }

    /// Formatted throughput string.
    pub fn speed_string(&self) -> Option<String> {
        self.throughput_bps().map(|bps| {
            if bps >= 1_073_741_824 {
                format!("{:.1} GB/s", bps as f64 / 1_073_741_824.0)
            } else if bps >= 1_048_576 {
                format!("{:.1} MB/s", bps as f64 / 1_048_576.0)
            } else if bps >= 1024 {
                format!("{:.1} KB/s", bps as f64 / 1024.0)
            } else {
                format!("{} B/s", bps)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_family() {
        assert!(Outcome::Transferred.is_success());
        assert!(Outcome::AlreadyCached.is_success());
        assert!(Outcome::TransferredAfterRetry { retries: 2 }.is_success());
        assert!(Outcome::Removed.is_success());

        assert!(!Outcome::MissingOnRemote.is_success());
        assert!(!Outcome::CommandTimeout.is_success());
        assert!(!Outcome::DestinationMissing.is_success());
        assert!(!Outcome::InternalError { code: Some(9) }.is_success());
    }

    #[test]
    fn test_detail() {
        assert_eq!(Outcome::TransferredAfterRetry { retries: 2 }.detail(), Some(2));
        assert_eq!(Outcome::CommandFailed { status: Some(13) }.detail(), Some(13));
        assert_eq!(Outcome::CommandTimeout.detail(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_describe_translates_os_status() {
        let text = Outcome::CommandFailed { status: Some(2) }.describe();
        assert_eq!(
            text,
            "transfer command failed with status 2: No such file or directory"
        );
    }

    #[test]
    fn test_describe_out_of_range_status() {
        let text = Outcome::CommandFailed { status: Some(1000) }.describe();
        assert_eq!(text, "transfer command failed with status 1000");
    }

    #[test]
    fn test_attempt_result_keeps_stats_only_on_success() {
        let ok = AttemptResult::new(
            Protocol::Xrootd,
            Outcome::Transferred,
            Some(2 * 1_048_576),
            Duration::from_secs(1),
        );
        assert_eq!(ok.bytes, Some(2_097_152));
        assert_eq!(ok.error, None);
        assert_eq!(ok.speed_string().as_deref(), Some("2.0 MB/s"));

        let failed = AttemptResult::new(
            Protocol::Srm,
            Outcome::SizeMismatch {
                expected: 10,
                actual: 3,
            },
            Some(3),
            Duration::from_secs(1),
        );
        assert_eq!(failed.bytes, None);
        assert_eq!(failed.elapsed, None);
        assert_eq!(
            failed.error.as_deref(),
            Some("size mismatch: expected 10 bytes, got 3")
        );
    }

    #[test]
    fn test_serializes_as_status_string() {
        let json = serde_json::to_string(&Outcome::ChecksumMismatch {
            expected: "ab".into(),
            actual: None,
        })
        .unwrap();
        assert_eq!(json, "\"checksum-mismatch\"");
    }
}
