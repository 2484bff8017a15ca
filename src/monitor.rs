// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Per-attempt monitoring records.
//!
//! Records are handed to an [`Emitter`], which forwards them to a
//! [`TelemetrySink`] from a background task. Sink failures are logged and
//! never affect the run.
//!
//! JSON-lines format (one object per attempt):
//! `{"event":"lsm-get","protocol":"srm","status":"transferred",...}`

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::exec::CommandLine;
use crate::outcome::{AttemptResult, Outcome};
use crate::protocol::Protocol;

/// Token value recorded when no space token was given.
pub const NO_TOKEN: &str = "NULL";

/// Which tool produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    #[serde(rename = "lsm-get")]
    Get,
    #[serde(rename = "lsm-rm")]
    Remove,
}

impl Direction {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Get => "lsm-get",
            Self::Remove => "lsm-rm",
        }
    }
}

/// One attempt, as reported to monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringRecord {
    pub event: Direction,
    pub protocol: Protocol,
    /// Raw transfer tool invocation (never the cache wrapper)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub token: String,
    pub start: String,
    pub end: String,
    pub status: Outcome,
    /// Retry count or tool status behind `status`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<i64>,
    pub site: String,
    pub host: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run-wide fields shared by every record of one run.
#[derive(Debug, Clone)]
pub struct RecordScope {
    pub direction: Direction,
    pub site: String,
    pub host: String,
    pub filename: String,
    pub guid: Option<String>,
    pub token: Option<String>,
}

impl RecordScope {
    pub fn new(
        direction: Direction,
        site: &str,
        filename: &str,
        guid: Option<&str>,
        token: Option<&str>,
    ) -> Self {
        Self {
            direction,
            site: site.to_string(),
            host: local_hostname(),
            filename: filename.to_string(),
            guid: guid.map(String::from),
            token: token.map(String::from),
        }
    }

    /// Build a fresh record for one attempt.
    pub fn record(
        &self,
        attempt: &AttemptResult,
        command: Option<&CommandLine>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MonitoringRecord {
        let success = attempt.is_success();
        MonitoringRecord {
            event: self.direction,
            protocol: attempt.protocol,
            command: command.map(ToString::to_string),
            token: self.token.clone().unwrap_or_else(|| NO_TOKEN.to_string()),
            start: timestamp(start),
            end: timestamp(end),
            status: attempt.outcome.clone(),
            detail: attempt.outcome.detail(),
            site: self.site.clone(),
            host: self.host.clone(),
            filename: self.filename.clone(),
            guid: self.guid.clone(),
            size: if success { attempt.bytes } else { None },
            cached: (success && self.direction == Direction::Get)
                .then(|| attempt.outcome == Outcome::AlreadyCached),
            error: attempt.error.clone(),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Destination for monitoring records.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &str, record: &MonitoringRecord) -> Result<()>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TelemetrySink for JsonLinesSink {
    fn emit(&self, _event: &str, record: &MonitoringRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let line = serde_json::to_string(record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open monitor log {}", self.path.display()))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Writes records to the log stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: &str, record: &MonitoringRecord) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        info!(target: "lsm::monitor", event = event, "{}", payload);
        Ok(())
    }
}

/// Forwards records to a sink from a background task.
pub struct Emitter {
    tx: mpsc::UnboundedSender<MonitoringRecord>,
    worker: JoinHandle<()>,
}

impl Emitter {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(sink: Arc<dyn TelemetrySink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<MonitoringRecord>();
        let worker = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.emit(record.event.event_name(), &record) {
                    warn!("Failed to emit monitoring record: {:#}", e);
                }
            }
        });
        Self { tx, worker }
    }

    pub fn emit(&self, record: MonitoringRecord) {
        if self.tx.send(record).is_err() {
            warn!("Monitoring worker stopped; record dropped");
        }
    }

    /// Deliver everything queued so far, then stop the worker.
    pub async fn close(self) {
        let Self { tx, worker } = self;
        drop(tx);
        if let Err(e) = worker.await {
            warn!("Monitoring worker failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Collect(Mutex<Vec<(String, MonitoringRecord)>>);

    impl TelemetrySink for Collect {
        fn emit(&self, event: &str, record: &MonitoringRecord) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .push((event.to_string(), record.clone()));
            Ok(())
        }
    }

    struct Broken;

    impl TelemetrySink for Broken {
        fn emit(&self, _event: &str, _record: &MonitoringRecord) -> Result<()> {
            anyhow::bail!("sink offline")
        }
    }

    fn scope(token: Option<&str>) -> RecordScope {
        RecordScope::new(Direction::Get, "UTA", "file.root", Some("ABC-123"), token)
    }

    fn success(outcome: Outcome) -> AttemptResult {
        AttemptResult::new(Protocol::Srm, outcome, Some(2048), Duration::from_secs(2))
    }

    #[test]
    fn test_success_record() {
        let now = Utc::now();
        let command = CommandLine::new("srmcp").arg("-2");
        let record = scope(Some("ATLASDATADISK")).record(
            &success(Outcome::AlreadyCached),
            Some(&command),
            now,
            now,
        );

        assert_eq!(record.token, "ATLASDATADISK");
        assert_eq!(record.command.as_deref(), Some("srmcp -2"));
        assert_eq!(record.size, Some(2048));
        assert_eq!(record.cached, Some(true));
        assert_eq!(record.error, None);
        assert_eq!(record.detail, None);
        assert!(record.start.ends_with('Z'));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "lsm-get");
        assert_eq!(json["protocol"], "srm");
        assert_eq!(json["status"], "already-cached");
        assert_eq!(json["site"], "UTA");
    }

    #[test]
    fn test_failure_record() {
        let now = Utc::now();
        let failed = AttemptResult::new(
            Protocol::Xrootd,
            Outcome::CommandFailed { status: Some(2) },
            None,
            Duration::from_secs(1),
        );
        let record = scope(None).record(&failed, None, now, now);

        assert_eq!(record.token, NO_TOKEN);
        assert_eq!(record.detail, Some(2));
        assert_eq!(record.size, None);
        assert_eq!(record.cached, None);
        let error = record.error.unwrap();
        assert!(error.contains("status 2"));

        let json = serde_json::to_value(scope(None).record(&failed, None, now, now)).unwrap();
        assert!(json.get("size").is_none());
        assert!(json.get("command").is_none());
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("logs/monitor.jsonl");
        let sink = JsonLinesSink::new(&path);
        let now = Utc::now();
        let record = scope(None).record(&success(Outcome::Transferred), None, now, now);

        sink.emit("lsm-get", &record).unwrap();
        sink.emit("lsm-get", &record).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["status"], "transferred");
        assert_eq!(parsed["cached"], false);
    }

    #[tokio::test]
    async fn test_emitter_drains_on_close() {
        let sink = Arc::new(Collect::default());
        let emitter = Emitter::spawn(sink.clone());
        let now = Utc::now();
        for _ in 0..3 {
            emitter.emit(scope(None).record(&success(Outcome::Transferred), None, now, now));
        }
        emitter.close().await;

        let seen = sink.0.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(event, _)| event == "lsm-get"));
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let emitter = Emitter::spawn(Arc::new(Broken));
        let now = Utc::now();
        emitter.emit(scope(None).record(&success(Outcome::Transferred), None, now, now));
        emitter.close().await;
    }
}
