// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Process exit codes. Nothing below the binaries deals in numbers.

use crate::error::{ConfigError, ValidationError};
use crate::orchestrator::{RunReport, RunStatus};
use crate::outcome::Outcome;

pub const SUCCESS: u8 = 0;
pub const BAD_URL: u8 = 10;
pub const MISSING_PATH_ROOT: u8 = 11;
pub const UNKNOWN_PROTOCOL: u8 = 12;
pub const INVALID_SIZE: u8 = 13;
pub const UNSUPPORTED_CHECKSUM: u8 = 14;
pub const INVALID_CHECKSUM: u8 = 15;
pub const ALREADY_IDENTICAL: u8 = 16;
pub const EXISTING_SIZE_DIFFERS: u8 = 17;
pub const EXISTING_CHECKSUM_DIFFERS: u8 = 18;
pub const DESTINATION_CREATE: u8 = 19;
pub const COMMAND_FAILED: u8 = 20;
pub const COMMAND_TIMEOUT: u8 = 21;
pub const DESTINATION_MISSING: u8 = 22;
pub const SIZE_MISMATCH: u8 = 23;
pub const CHECKSUM_MISMATCH: u8 = 24;
pub const COMMAND_NOT_FOUND: u8 = 25;
pub const CACHE_INTERNAL: u8 = 26;
pub const MISSING_ON_REMOTE: u8 = 27;
/// EX_SOFTWARE
pub const SOFTWARE: u8 = 70;
/// EX_CONFIG
pub const CONFIG: u8 = 78;
pub const EXHAUSTED: u8 = 255;

pub fn for_validation(err: &ValidationError) -> u8 {
    match err {
        ValidationError::BadUrlPrefix { .. } | ValidationError::MalformedUrl { .. } => BAD_URL,
        ValidationError::MissingPathRoot { .. } => MISSING_PATH_ROOT,
        ValidationError::UnknownProtocol(_) => UNKNOWN_PROTOCOL,
        ValidationError::InvalidSize(_) => INVALID_SIZE,
        ValidationError::UnsupportedChecksum(_) => UNSUPPORTED_CHECKSUM,
        ValidationError::InvalidChecksum { .. } => INVALID_CHECKSUM,
        ValidationError::AlreadyIdentical(_) => ALREADY_IDENTICAL,
        ValidationError::ExistingSizeDiffers { .. } => EXISTING_SIZE_DIFFERS,
        ValidationError::ExistingChecksumDiffers { .. } => EXISTING_CHECKSUM_DIFFERS,
        ValidationError::DestinationCreate { .. } => DESTINATION_CREATE,
    }
}

pub fn for_config(_err: &ConfigError) -> u8 {
    CONFIG
}

pub fn for_outcome(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Transferred
        | Outcome::AlreadyCached
        | Outcome::TransferredAfterRetry { .. }
        | Outcome::Removed => SUCCESS,
        Outcome::CommandFailed { .. } => COMMAND_FAILED,
        Outcome::CommandTimeout => COMMAND_TIMEOUT,
        Outcome::DestinationMissing => DESTINATION_MISSING,
        Outcome::SizeMismatch { .. } => SIZE_MISMATCH,
        Outcome::ChecksumMismatch { .. } => CHECKSUM_MISMATCH,
        Outcome::CommandNotFound => COMMAND_NOT_FOUND,
        Outcome::InternalError { .. } => CACHE_INTERNAL,
        Outcome::MissingOnRemote => MISSING_ON_REMOTE,
    }
}

/// Success, or the last attempt's code, or [`EXHAUSTED`] when nothing ran.
pub fn for_report(report: &RunReport) -> u8 {
    match (report.status, report.last()) {
        (RunStatus::Succeeded, _) => SUCCESS,
        (RunStatus::Exhausted, Some(last)) => for_outcome(&last.outcome),
        (RunStatus::Exhausted, None) => EXHAUSTED,
    }
}
