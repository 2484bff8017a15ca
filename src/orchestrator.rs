// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Protocol fallback loop.
//!
//! Planned adapters are tried strictly in order. Unavailable adapters are
//! skipped without telemetry; every executed attempt produces exactly one
//! monitoring record. The first success-family outcome ends the run.

use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::exec::{classify_cache_reply, CommandRunner, ExecError, ExecOutput};
use crate::monitor::{Direction, Emitter, RecordScope};
use crate::outcome::{AttemptResult, Outcome};
use crate::protocol::{PlannedAdapter, PlannedRemoval};
use crate::request::{RemovalRequest, TransferRequest};
use crate::verify::{verify_destination, PartialArtifact};

/// Tool output meaning the removal target does not exist. Only object-level
/// phrases: "host not found" or "proxy not found" are tool failures.
/// JUSTIFICATION for .expect(): static pattern, validated by the tests below.
static MISSING_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no such file|does not exist|SRM_INVALID_PATH|file not found|\[3011\]")
        .expect("missing marker regex is valid")
});

/// Shell status for a program that could not be executed.
const SHELL_NOT_FOUND: i32 = 127;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Exhausted,
}

/// Everything that happened during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Executed attempts, in order
    pub attempts: Vec<AttemptResult>,
    pub status: RunStatus,
}

impl RunReport {
    fn finish(attempts: Vec<AttemptResult>) -> Self {
        let status = match attempts.last() {
            Some(last) if last.is_success() => RunStatus::Succeeded,
            _ => RunStatus::Exhausted,
        };
        Self { attempts, status }
    }

    pub fn last(&self) -> Option<&AttemptResult> {
        self.attempts.last()
    }

    /// The successful attempt, if the run succeeded.
    pub fn success(&self) -> Option<&AttemptResult> {
        match self.status {
            RunStatus::Succeeded => self.attempts.last(),
            RunStatus::Exhausted => None,
        }
    }
}

/// Classify a raw removal tool run.
///
/// Exit 127 is checked before the output markers since shells report it as
/// "command not found". Markers win over any other status, including 0.
pub fn classify_removal(reply: Result<ExecOutput, ExecError>) -> Outcome {
    let output = match reply {
        Ok(output) => output,
        Err(ExecError::NotFound(_)) => return Outcome::CommandNotFound,
        Err(ExecError::Timeout(_)) => return Outcome::CommandTimeout,
        Err(ExecError::Io(_)) => return Outcome::InternalError { code: None },
    };

    if output.status == Some(SHELL_NOT_FOUND) {
        return Outcome::CommandNotFound;
    }
    if MISSING_MARKER.is_match(&output.combined()) {
        return Outcome::MissingOnRemote;
    }
    match output.status {
        Some(0) => Outcome::Removed,
        status => Outcome::CommandFailed { status },
    }
}

/// Drives the planned adapters of one run.
pub struct Orchestrator<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a Config,
    emitter: &'a Emitter,
}

impl<'a> Orchestrator<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a Config, emitter: &'a Emitter) -> Self {
        Self {
            runner,
            config,
            emitter,
        }
    }

    /// Fetch `request.source` into `request.destination`.
    pub async fn retrieve(&self, request: &TransferRequest, plan: &[PlannedAdapter]) -> RunReport {
        let scope = RecordScope::new(
            Direction::Get,
            &self.config.site,
            &request.source.filename,
            request.guid.as_deref(),
            request.space_token.as_deref(),
        );
        let mut attempts = Vec::new();

        for planned in plan {
            let Some(commands) = &planned.commands else {
                warn!(
                    "Skipping {}: not available for {}",
                    planned.protocol, request.source.filename
                );
                continue;
            };

            info!(
                "Trying {} for {} -> {}",
                planned.protocol,
                request.source.filename,
                request.destination.display()
            );
            debug!("Command: {}", commands.cache);
            debug!("Timeouts: {:?}", planned.timeouts);

            let started = Utc::now();
            let clock = Instant::now();
            let artifact = PartialArtifact::new(&request.destination);

            let nominal = if self.runner.locate(&commands.transfer.program) {
                let reply = self
                    .runner
                    .run(&commands.cache, planned.timeouts.cache_duration())
                    .await;
                classify_cache_reply(reply)
            } else {
                Outcome::CommandNotFound
            };

            let (outcome, bytes) = if nominal.is_success() {
                match verify_destination(
                    &request.destination,
                    request.expected_size,
                    request.checksum.as_ref(),
                ) {
                    Ok(bytes) => (nominal, Some(bytes)),
                    Err(failure) => (failure, None),
                }
            } else {
                (nominal, None)
            };

            let attempt = AttemptResult::new(planned.protocol, outcome, bytes, clock.elapsed());
            self.emitter.emit(scope.record(
                &attempt,
                Some(&commands.transfer),
                started,
                Utc::now(),
            ));

            if attempt.is_success() {
                artifact.keep();
                info!("{} succeeded: {}", attempt.protocol, attempt.outcome);
                attempts.push(attempt);
                break;
            }

            warn!(
                "{} failed: {}",
                attempt.protocol,
                attempt.error.as_deref().unwrap_or(attempt.outcome.as_str())
            );
            attempts.push(attempt);
        }

        RunReport::finish(attempts)
    }

    /// Delete `request.endpoint` from remote storage.
    pub async fn remove(&self, request: &RemovalRequest, plan: &[PlannedRemoval]) -> RunReport {
        let scope = RecordScope::new(
            Direction::Remove,
            &self.config.site,
            &request.endpoint.filename,
            None,
            request.space_token.as_deref(),
        );
        let mut attempts = Vec::new();

        for planned in plan {
            let Some(command) = &planned.command else {
                warn!(
                    "Skipping {}: cannot remove {}",
                    planned.protocol, request.endpoint.filename
                );
                continue;
            };

            info!("Removing {} via {}", request.endpoint.path(), planned.protocol);
            debug!("Command: {}", command);

            let started = Utc::now();
            let clock = Instant::now();

            let outcome = if self.runner.locate(&command.program) {
                let reply = self
                    .runner
                    .run(command, planned.timeouts.total_duration())
                    .await;
                classify_removal(reply)
            } else {
                Outcome::CommandNotFound
            };

            let attempt = AttemptResult::new(planned.protocol, outcome, None, clock.elapsed());
            self.emitter
                .emit(scope.record(&attempt, Some(command), started, Utc::now()));

            let success = attempt.is_success();
            if success {
                info!("{} removed {}", attempt.protocol, request.endpoint.path());
            } else {
                warn!(
                    "{} failed: {}",
                    attempt.protocol,
                    attempt.error.as_deref().unwrap_or(attempt.outcome.as_str())
                );
            }
            attempts.push(attempt);
            if success {
                break;
            }
        }

        RunReport::finish(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn output(status: i32, stdout: &str, stderr: &str) -> Result<ExecOutput, ExecError> {
        Ok(ExecOutput {
            status: Some(status),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        })
    }

    #[test]
    fn test_classify_removal_markers() {
        assert_eq!(
            classify_removal(output(1, "", "SRM_INVALID_PATH: no such path")),
            Outcome::MissingOnRemote
        );
        assert_eq!(
            classify_removal(output(0, "File Does Not Exist", "")),
            Outcome::MissingOnRemote
        );
        assert_eq!(
            classify_removal(output(54, "", "[ERROR] Server responded with an error: [3011] No such file or directory")),
            Outcome::MissingOnRemote
        );
    }

    #[test]
    fn test_environment_not_found_is_a_tool_failure() {
        assert_eq!(
            classify_removal(output(
                1,
                "",
                "Error: proxy certificate not found: /tmp/x509up_u1000"
            )),
            Outcome::CommandFailed { status: Some(1) }
        );
        assert_eq!(
            classify_removal(output(2, "", "srm client error: host not found")),
            Outcome::CommandFailed { status: Some(2) }
        );
        assert_eq!(
            classify_removal(output(1, "", "Remote file not found on server")),
            Outcome::MissingOnRemote
        );
        assert_eq!(
            classify_removal(output(54, "", "[ERROR] Server responded with an error: [3011] Unable to open")),
            Outcome::MissingOnRemote
        );
    }

    #[test]
    fn test_classify_removal_statuses() {
        assert_eq!(classify_removal(output(0, "", "")), Outcome::Removed);
        assert_eq!(
            classify_removal(output(127, "", "sh: srmrm: command not found")),
            Outcome::CommandNotFound
        );
        assert_eq!(
            classify_removal(output(1, "", "permission denied")),
            Outcome::CommandFailed { status: Some(1) }
        );
        assert_eq!(
            classify_removal(Ok(ExecOutput::default())),
            Outcome::CommandFailed { status: None }
        );
    }

    #[test]
    fn test_classify_removal_exec_errors() {
        assert_eq!(
            classify_removal(Err(ExecError::NotFound("srmrm".into()))),
            Outcome::CommandNotFound
        );
        assert_eq!(
            classify_removal(Err(ExecError::Timeout(Duration::from_secs(1)))),
            Outcome::CommandTimeout
        );
    }

    #[test]
    fn test_report_status() {
        let ok = AttemptResult::new(
            crate::protocol::Protocol::Srm,
            Outcome::Removed,
            None,
            Duration::ZERO,
        );
        let failed = AttemptResult::new(
            crate::protocol::Protocol::Xrootd,
            Outcome::CommandTimeout,
            None,
            Duration::ZERO,
        );

        let report = RunReport::finish(vec![failed.clone(), ok.clone()]);
        assert_eq!(report.status, RunStatus::Succeeded);
        assert_eq!(report.success(), Some(&ok));

        let report = RunReport::finish(vec![failed.clone()]);
        assert_eq!(report.status, RunStatus::Exhausted);
        assert_eq!(report.success(), None);
        assert_eq!(report.last(), Some(&failed));

        assert_eq!(RunReport::finish(Vec::new()).status, RunStatus::Exhausted);
    }
}
