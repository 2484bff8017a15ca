// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Transfer protocols and their adapters.
//!
//! Each [`Protocol`] maps to exactly one [`Adapter`] implementation. Adapters
//! only build command lines; running them is the orchestrator's job.

pub mod registry;
pub mod srm;
pub mod xrootd;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{Result, ValidationError};
use crate::exec::CommandLine;
use crate::request::TransferRequest;
use crate::timeout::ProtocolTimeouts;
use crate::url::StorageUrl;

pub use registry::{plan_removal, plan_retrieval, AdapterCommands, PlannedAdapter, PlannedRemoval};

/// Supported transfer protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// SRM copy/remove via srmcp/srmrm
    Srm,
    /// Direct XRootD access to the site door
    Xrootd,
    /// XRootD through the federation redirector
    Fax,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Srm, Protocol::Xrootd, Protocol::Fax];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Srm => "srm",
            Self::Xrootd => "xrootd",
            Self::Fax => "fax",
        }
    }

    /// Whether the protocol reaches the file through a federation redirect.
    pub fn is_federated(&self) -> bool {
        matches!(self, Self::Fax)
    }

    /// Parse an ordered protocol list, rejecting it whole on any unknown name.
    ///
    /// Order and duplicates are preserved.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Protocol>> {
        names.iter().map(|name| name.as_ref().parse()).collect()
    }

    /// The adapter implementing this protocol.
    pub fn adapter(&self) -> &'static dyn Adapter {
        match self {
            Self::Srm => &srm::SrmAdapter,
            Self::Xrootd => &xrootd::XrootdAdapter,
            Self::Fax => &xrootd::FaxAdapter,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "srm" => Ok(Self::Srm),
            "xrootd" => Ok(Self::Xrootd),
            "fax" => Ok(Self::Fax),
            _ => Err(ValidationError::UnknownProtocol(s.to_string())),
        }
    }
}

/// Inputs shared by every command an adapter builds during one run.
#[derive(Debug, Clone, Copy)]
pub struct AdapterContext<'a> {
    pub config: &'a Config,
    pub timeouts: ProtocolTimeouts,
    pub space_token: Option<&'a str>,
}

/// Builds the command lines for one protocol.
pub trait Adapter: Sync {
    fn protocol(&self) -> Protocol;

    /// Whether the URL carries everything this adapter needs.
    fn is_available(&self, _url: &StorageUrl) -> bool {
        true
    }

    /// Raw transfer tool invocation for a retrieval.
    fn build_transfer_command(
        &self,
        ctx: &AdapterContext<'_>,
        request: &TransferRequest,
    ) -> Option<CommandLine>;

    /// Removal invocation; `None` when the protocol cannot delete.
    fn build_remove_command(
        &self,
        ctx: &AdapterContext<'_>,
        endpoint: &StorageUrl,
    ) -> Option<CommandLine>;

    /// Transfer invocation wrapped in the caching layer.
    fn build_cache_command(
        &self,
        ctx: &AdapterContext<'_>,
        request: &TransferRequest,
    ) -> Option<CommandLine> {
        let transfer = self.build_transfer_command(ctx, request)?;
        Some(wrap_in_cache(ctx, request, &transfer))
    }
}

/// Prefix `transfer` with the caching wrapper and its options.
pub fn wrap_in_cache(
    ctx: &AdapterContext<'_>,
    request: &TransferRequest,
    transfer: &CommandLine,
) -> CommandLine {
    let cache = &ctx.config.cache;
    let mut cmd = CommandLine::new(cache.executable.as_str())
        .args(["-t".to_string(), ctx.timeouts.cache.to_string()])
        .args(["-r".to_string(), cache.max_retries.to_string()])
        .args(["-S".to_string(), cache.max_space.clone()])
        .args(["-C".to_string(), cache.root.display().to_string()]);
    if let Some(guid) = &request.guid {
        cmd = cmd.args(["-g", guid.as_str()]);
    }
    if let Some(token) = ctx.space_token {
        cmd = cmd.args(["-k", token]);
    }
    cmd.env = transfer.env.clone();
    cmd.arg("--")
        .arg(transfer.program.as_str())
        .args(transfer.args.iter().cloned())
}
