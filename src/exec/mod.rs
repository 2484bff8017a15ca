// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! External command execution.
//!
//! The orchestrator never spawns processes directly; it goes through a
//! [`CommandRunner`] so the fallback logic can be driven by a scripted runner
//! in tests. [`ProcessRunner`] is the real implementation on top of
//! `tokio::process`.

pub mod cache;
pub mod command;

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;

pub use cache::{classify_cache_reply, CacheStatus};
pub use command::CommandLine;

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit status; `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    /// Stdout and stderr joined, for marker matching.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Reasons a command produced no exit status.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be found
    #[error("Command not found: {0}")]
    NotFound(String),

    /// The command did not finish within its budget
    #[error("Command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Spawning or waiting failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Runs external commands with a wall-clock limit.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion, or fail with [`ExecError::Timeout`].
    async fn run(&self, command: &CommandLine, timeout: Duration) -> Result<ExecOutput, ExecError>;

    /// Whether `program` can be executed on this host.
    fn locate(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Runs commands as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandLine, timeout: Duration) -> Result<ExecOutput, ExecError> {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args);
        for (key, value) in &command.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the wait future on timeout kills the child
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ExecError::NotFound(command.program.clone()),
            _ => ExecError::Io(err),
        })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ExecError::Timeout(timeout))??;

        Ok(ExecOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_process_runner_captures_output() {
        let cmd = CommandLine::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3");
        let output = ProcessRunner
            .run(&cmd, Duration::from_secs(10))
            .await
            .expect("sh should run");
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[tokio::test]
    async fn test_process_runner_passes_env() {
        let cmd = CommandLine::new("sh")
            .env("LSM_TEST_VALUE", 42)
            .arg("-c")
            .arg("echo $LSM_TEST_VALUE");
        let output = ProcessRunner.run(&cmd, Duration::from_secs(10)).await.unwrap();
        assert_eq!(output.stdout.trim(), "42");
    }

    #[tokio::test]
    async fn test_process_runner_timeout() {
        let cmd = CommandLine::new("sleep").arg("5");
        let result = ProcessRunner.run(&cmd, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ExecError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_process_runner_not_found() {
        let cmd = CommandLine::new("lsm-definitely-not-a-real-binary");
        let result = ProcessRunner.run(&cmd, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ExecError::NotFound(_))));
        assert!(!ProcessRunner.locate("lsm-definitely-not-a-real-binary"));
        assert!(ProcessRunner.locate("sh"));
    }
}
