// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Command-line entry points for `lsm-get` and `lsm-rm`.
//!
//! Each run: parse arguments, load configuration, validate, plan, then drive
//! the orchestrator on a single-threaded runtime. Logs go to stderr; stdout
//! carries only the final result line.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::error::ValidationError;
use crate::exec::ProcessRunner;
use crate::exit;
use crate::monitor::{Emitter, JsonLinesSink, TelemetrySink, TracingSink};
use crate::orchestrator::{Orchestrator, RunReport};
use crate::protocol::{plan_removal, plan_retrieval, Protocol};
use crate::request::{RemovalRequest, RetrievalInput, TransferRequest};
use crate::timeout::TimeoutBudget;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fetch a file from grid storage, falling back across protocols.
#[derive(Parser, Debug)]
#[command(name = "lsm-get")]
#[command(version = VERSION)]
#[command(about = "Copy a file from grid storage to local disk")]
pub struct GetCli {
    /// Protocol to try, in order (repeatable or comma separated)
    #[arg(short = 'p', long = "protocol", value_name = "PROTO", value_delimiter = ',')]
    pub protocols: Vec<String>,

    /// Space token
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Expected size in bytes
    #[arg(short = 's', long)]
    pub size: Option<String>,

    /// Expected checksum, `algorithm:value` or a bare md5
    #[arg(short = 'c', long)]
    pub checksum: Option<String>,

    /// File GUID, passed to the cache and monitoring
    #[arg(short = 'g', long)]
    pub guid: Option<String>,

    /// Debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Source storage URL
    pub source: String,

    /// Destination file or directory
    pub destination: String,
}

/// Remove a file from grid storage, falling back across protocols.
#[derive(Parser, Debug)]
#[command(name = "lsm-rm")]
#[command(version = VERSION)]
#[command(about = "Delete a file from grid storage")]
pub struct RmCli {
    /// Protocol to try, in order (repeatable or comma separated)
    #[arg(short = 'p', long = "protocol", value_name = "PROTO", value_delimiter = ',')]
    pub protocols: Vec<String>,

    /// Space token
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Storage URL to delete
    pub endpoint: String,
}

/// Install the stderr subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn get_main() -> ExitCode {
    let cli = GetCli::parse();
    init_logging(cli.verbose);
    ExitCode::from(run_get(&cli))
}

pub fn rm_main() -> ExitCode {
    let cli = RmCli::parse();
    init_logging(cli.verbose);
    ExitCode::from(run_rm(&cli))
}

/// Explicit protocol list, or the configured default order.
pub fn protocol_order(names: &[String], config: &Config) -> Result<Vec<Protocol>, ValidationError> {
    if names.is_empty() {
        return Ok(config.default_protocols.clone());
    }
    Protocol::parse_list(names)
}

fn load_config() -> Result<Config, u8> {
    Config::load().map_err(|e| {
        error!("Configuration error: {}", e);
        exit::for_config(&e)
    })
}

fn reject(err: ValidationError) -> u8 {
    match &err {
        ValidationError::AlreadyIdentical(path) => {
            info!("{} is already present and identical", path.display())
        }
        _ => error!("{}", err),
    }
    exit::for_validation(&err)
}

fn monitoring_sink(config: &Config) -> Arc<dyn TelemetrySink> {
    match &config.monitor_log {
        Some(path) => Arc::new(JsonLinesSink::new(path)),
        None => Arc::new(TracingSink),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, u8> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error!("Failed to start runtime: {}", e);
            exit::SOFTWARE
        })
}

/// Run `lsm-get` and return its exit code.
pub fn run_get(cli: &GetCli) -> u8 {
    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    let protocols = match protocol_order(&cli.protocols, &config) {
        Ok(protocols) => protocols,
        Err(e) => return reject(e),
    };
    let input = RetrievalInput {
        source: &cli.source,
        destination: &cli.destination,
        size: cli.size.as_deref(),
        checksum: cli.checksum.as_deref(),
        space_token: cli.token.as_deref(),
        guid: cli.guid.as_deref(),
    };
    let request = match TransferRequest::from_input(input, &config) {
        Ok(request) => request,
        Err(e) => return reject(e),
    };

    let budget = TimeoutBudget::new(&config.timeouts, request.expected_size);
    debug!("Timeout budget: {:?}", budget);
    let plan = plan_retrieval(&protocols, &request, &budget, &config);

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };
    let report = runtime.block_on(async {
        let emitter = Emitter::spawn(monitoring_sink(&config));
        let report = Orchestrator::new(&ProcessRunner, &config, &emitter)
            .retrieve(&request, &plan)
            .await;
        emitter.close().await;
        report
    });

    println!("{}", get_summary(&report, &request));
    exit::for_report(&report)
}

/// Run `lsm-rm` and return its exit code.
pub fn run_rm(cli: &RmCli) -> u8 {
    let config = match load_config() {
        Ok(config) => config,
        Err(code) => return code,
    };

    let protocols = match protocol_order(&cli.protocols, &config) {
        Ok(protocols) => protocols,
        Err(e) => return reject(e),
    };
    let request = match RemovalRequest::from_input(&cli.endpoint, cli.token.as_deref(), &config) {
        Ok(request) => request,
        Err(e) => return reject(e),
    };

    let budget = TimeoutBudget::new(&config.timeouts, None);
    let plan = plan_removal(&protocols, &request, &budget, &config);

    let runtime = match runtime() {
        Ok(runtime) => runtime,
        Err(code) => return code,
    };
    let report = runtime.block_on(async {
        let emitter = Emitter::spawn(monitoring_sink(&config));
        let report = Orchestrator::new(&ProcessRunner, &config, &emitter)
            .remove(&request, &plan)
            .await;
        emitter.close().await;
        report
    });

    println!("{}", rm_summary(&report, &request));
    exit::for_report(&report)
}

/// Result line for a retrieval.
pub fn get_summary(report: &RunReport, request: &TransferRequest) -> String {
    match report.success() {
        Some(attempt) => {
            let bytes = attempt.bytes.unwrap_or(0);
            let secs = attempt.elapsed.map(|d| d.as_secs_f64()).unwrap_or(0.0);
            let speed = attempt
                .speed_string()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default();
            format!(
                "OK {} {} via {}: {} bytes in {:.1}s{}",
                attempt.outcome,
                request.destination.display(),
                attempt.protocol,
                bytes,
                secs,
                speed
            )
        }
        None => failure_summary(report, &request.source.filename),
    }
}

/// Result line for a removal.
pub fn rm_summary(report: &RunReport, request: &RemovalRequest) -> String {
    match report.success() {
        Some(attempt) => format!("OK removed {} via {}", request.endpoint.path(), attempt.protocol),
        None => failure_summary(report, &request.endpoint.filename),
    }
}

fn failure_summary(report: &RunReport, filename: &str) -> String {
    match report.last() {
        Some(last) => format!(
            "FAILED {} after {} attempt(s): {}",
            filename,
            report.attempts.len(),
            last.error.as_deref().unwrap_or(last.outcome.as_str())
        ),
        None => format!("FAILED {}: no protocol available", filename),
    }
}
