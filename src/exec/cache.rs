// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Caching wrapper return contract.
//!
//! The wrapper performs the actual copy (or serves a local cached copy) and
//! reports through its exit status:
//!
//! | status | meaning |
//! |--------|---------|
//! | 0 | copied |
//! | 1 | served from cache |
//! | 2 | copied after internal retries |
//! | 3 | copy command failed |
//! | 4 | copy command timed out |
//! | 5 | copy tool not found |
//!
//! Statuses 0-2 guarantee the destination file is in place. A secondary
//! detail (retry count or the copy tool's status) is printed on stdout as a
//! `detail=N` line.

use regex::Regex;
use std::sync::LazyLock;

use super::{ExecError, ExecOutput};
use crate::outcome::Outcome;

/// JUSTIFICATION for .expect(): static pattern, validated by the tests below.
static DETAIL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^\s*(?:detail|retries|status)\s*[=:]\s*(-?\d+)\s*$")
        .expect("detail regex is valid")
});

/// Documented wrapper exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Copied,
    Cached,
    CopiedAfterRetry,
    CopyFailed,
    CopyTimedOut,
    ToolNotFound,
}

impl CacheStatus {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Copied),
            1 => Some(Self::Cached),
            2 => Some(Self::CopiedAfterRetry),
            3 => Some(Self::CopyFailed),
            4 => Some(Self::CopyTimedOut),
            5 => Some(Self::ToolNotFound),
            _ => None,
        }
    }
}

/// Last secondary detail reported on stdout.
pub fn parse_detail(stdout: &str) -> Option<i64> {
    DETAIL_LINE
        .captures_iter(stdout)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Convert a wrapper run into the outcome taxonomy.
///
/// Nominal successes still need [`crate::verify`] before they count.
pub fn classify_cache_reply(reply: Result<ExecOutput, ExecError>) -> Outcome {
    let output = match reply {
        Ok(output) => output,
        Err(ExecError::NotFound(_)) => return Outcome::CommandNotFound,
        Err(ExecError::Timeout(_)) => return Outcome::CommandTimeout,
        Err(ExecError::Io(_)) => return Outcome::InternalError { code: None },
    };

    let Some(code) = output.status else {
        return Outcome::InternalError { code: None };
    };
    let detail = parse_detail(&output.stdout);

    match CacheStatus::from_code(code) {
        Some(CacheStatus::Copied) => Outcome::Transferred,
        Some(CacheStatus::Cached) => Outcome::AlreadyCached,
        Some(CacheStatus::CopiedAfterRetry) => Outcome::TransferredAfterRetry {
            retries: detail
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(0),
        },
        Some(CacheStatus::CopyFailed) => Outcome::CommandFailed {
            status: detail.and_then(|d| i32::try_from(d).ok()),
        },
        Some(CacheStatus::CopyTimedOut) => Outcome::CommandTimeout,
        Some(CacheStatus::ToolNotFound) => Outcome::CommandNotFound,
        None => Outcome::InternalError { code: Some(code) },
    }
}
