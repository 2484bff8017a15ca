// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SRM adapter (srmcp / srmrm).

use super::{Adapter, AdapterContext, Protocol};
use crate::exec::CommandLine;
use crate::request::TransferRequest;
use crate::url::StorageUrl;

#[derive(Debug, Clone, Copy, Default)]
pub struct SrmAdapter;

impl Adapter for SrmAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Srm
    }

    fn build_transfer_command(
        &self,
        ctx: &AdapterContext<'_>,
        request: &TransferRequest,
    ) -> Option<CommandLine> {
        let cmd = CommandLine::new(ctx.config.tools.srm_copy.as_str())
            .arg("-2")
            .arg("-retry_num=0")
            .arg(format!("-connection_timeout={}", ctx.timeouts.connect))
            .arg(format!("-request_lifetime={}", ctx.timeouts.total))
            .arg_opt(ctx.space_token.map(|token| format!("-space_token={}", token)))
            .arg(request.source.surl(ctx.config))
            .arg(format!("file://{}", request.destination.display()));
        Some(cmd)
    }

    fn build_remove_command(
        &self,
        ctx: &AdapterContext<'_>,
        endpoint: &StorageUrl,
    ) -> Option<CommandLine> {
        let cmd = CommandLine::new(ctx.config.tools.srm_remove.as_str())
            .arg("-2")
            .arg("-retry_num=0")
            .arg(format!("-connection_timeout={}", ctx.timeouts.connect))
            .arg(endpoint.surl(ctx.config));
        Some(cmd)
    }
}
