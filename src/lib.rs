// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! lsm - local site mover
//!
//! Stage files in from grid storage and remove them again, trying an ordered
//! list of transfer protocols until one succeeds:
//!
//! **srm** -> **xrootd** -> **fax** (federation redirect)
//!
//! Transfers run through an external caching wrapper and are verified
//! (existence, size, checksum) before they count.
//!
//! # Core Modules
//!
//! - [`config`] - Site configuration loaded from JSON
//! - [`url`] - Storage URL decomposition and federation names
//! - [`request`] - Validated retrieval/removal requests
//! - [`timeout`] - Per-protocol timeout budgets
//! - [`protocol`] - Protocol enum, adapters and run planning
//! - [`exec`] - External command execution and the cache contract
//! - [`orchestrator`] - The fallback loop
//! - [`verify`] - Destination checks and partial-file cleanup
//! - [`monitor`] - Per-attempt monitoring records
//! - [`exit`] - Process exit codes

pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod exit;
pub mod monitor;
pub mod orchestrator;
pub mod outcome;
pub mod protocol;
pub mod request;
pub mod timeout;
pub mod url;
pub mod verify;

pub use checksum::{ChecksumAlgorithm, ChecksumSpec};
pub use config::Config;
pub use error::{ConfigError, ValidationError};
pub use exec::{CommandLine, CommandRunner, ExecError, ExecOutput, ProcessRunner};
pub use monitor::{Emitter, JsonLinesSink, MonitoringRecord, TelemetrySink, TracingSink};
pub use orchestrator::{Orchestrator, RunReport, RunStatus};
pub use outcome::{AttemptResult, Outcome};
pub use protocol::{plan_removal, plan_retrieval, PlannedAdapter, PlannedRemoval, Protocol};
pub use request::{RemovalRequest, RetrievalInput, TransferRequest};
pub use timeout::{ProtocolTimeouts, TimeoutBudget};
pub use url::StorageUrl;
