// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Adapter planning: one entry per requested protocol, in request order.

use super::{AdapterContext, Protocol};
use crate::config::Config;
use crate::exec::CommandLine;
use crate::request::{RemovalRequest, TransferRequest};
use crate::timeout::{ProtocolTimeouts, TimeoutBudget};

/// Commands for a retrieval attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterCommands {
    /// What actually runs
    pub cache: CommandLine,
    /// The raw tool invocation inside the wrapper (monitoring, tool lookup)
    pub transfer: CommandLine,
}

/// A retrieval attempt. `commands` is `None` when the adapter cannot serve
/// the source URL.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedAdapter {
    pub protocol: Protocol,
    pub timeouts: ProtocolTimeouts,
    pub commands: Option<AdapterCommands>,
}

/// A removal attempt. `command` is `None` when the protocol cannot delete
/// this endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRemoval {
    pub protocol: Protocol,
    pub timeouts: ProtocolTimeouts,
    pub command: Option<CommandLine>,
}

/// Build retrieval attempts for `protocols`. Order and duplicates are kept.
pub fn plan_retrieval(
    protocols: &[Protocol],
    request: &TransferRequest,
    budget: &TimeoutBudget,
    config: &Config,
) -> Vec<PlannedAdapter> {
    protocols
        .iter()
        .map(|&protocol| {
            let adapter = protocol.adapter();
            let ctx = AdapterContext {
                config,
                timeouts: budget.for_protocol(protocol),
                space_token: request.space_token.as_deref(),
            };

            let commands = if adapter.is_available(&request.source) {
                adapter
                    .build_transfer_command(&ctx, request)
                    .zip(adapter.build_cache_command(&ctx, request))
                    .map(|(transfer, cache)| AdapterCommands { cache, transfer })
            } else {
                None
            };

            PlannedAdapter {
                protocol,
                timeouts: ctx.timeouts,
                commands,
            }
        })
        .collect()
}

/// Build removal attempts for `protocols`. Order and duplicates are kept.
pub fn plan_removal(
    protocols: &[Protocol],
    request: &RemovalRequest,
    budget: &TimeoutBudget,
    config: &Config,
) -> Vec<PlannedRemoval> {
    protocols
        .iter()
        .map(|&protocol| {
            let adapter = protocol.adapter();
            let ctx = AdapterContext {
                config,
                timeouts: budget.for_protocol(protocol),
                space_token: request.space_token.as_deref(),
            };

            let command = if adapter.is_available(&request.endpoint) {
                adapter.build_remove_command(&ctx, &request.endpoint)
            } else {
                None
            };

            PlannedRemoval {
                protocol,
                timeouts: ctx.timeouts,
                command,
            }
        })
        .collect()
}
