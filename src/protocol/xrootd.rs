// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! XRootD adapters: direct door access and federation redirect.
//!
//! xrdcp/xrdfs take their timeouts from the environment rather than flags.

use super::{Adapter, AdapterContext, Protocol};
use crate::exec::CommandLine;
use crate::request::TransferRequest;
use crate::url::StorageUrl;

/// Seconds allowed for establishing the connection
const CONNECT_ENV: &str = "XRD_CONNECTIONWINDOW";
/// Seconds allowed for a single request
const REQUEST_ENV: &str = "XRD_REQUESTTIMEOUT";

fn xrdcp(ctx: &AdapterContext<'_>, source: String, request: &TransferRequest) -> CommandLine {
    CommandLine::new(ctx.config.tools.xrd_copy.as_str())
        .env(CONNECT_ENV, ctx.timeouts.connect)
        .env(REQUEST_ENV, ctx.timeouts.transfer)
        .args(["-f", "-N"])
        .arg(source)
        .arg(request.destination.display().to_string())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct XrootdAdapter;

impl Adapter for XrootdAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Xrootd
    }

    fn build_transfer_command(
        &self,
        ctx: &AdapterContext<'_>,
        request: &TransferRequest,
    ) -> Option<CommandLine> {
        Some(xrdcp(ctx, request.source.xrootd_url(ctx.config), request))
    }

    fn build_remove_command(
        &self,
        ctx: &AdapterContext<'_>,
        endpoint: &StorageUrl,
    ) -> Option<CommandLine> {
        let cmd = CommandLine::new(ctx.config.tools.xrd_fs.as_str())
            .env(CONNECT_ENV, ctx.timeouts.connect)
            .env(REQUEST_ENV, ctx.timeouts.transfer)
            .arg(endpoint.xrootd_door(ctx.config))
            .arg("rm")
            .arg(endpoint.path());
        Some(cmd)
    }
}

/// Federation-redirected XRootD. Needs a derived logical name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaxAdapter;

impl Adapter for FaxAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Fax
    }

    fn is_available(&self, url: &StorageUrl) -> bool {
        url.federation_name.is_some()
    }

    fn build_transfer_command(
        &self,
        ctx: &AdapterContext<'_>,
        request: &TransferRequest,
    ) -> Option<CommandLine> {
        let source = request.source.federation_url(ctx.config)?;
        Some(xrdcp(ctx, source, request))
    }

    // The redirector only resolves reads.
    fn build_remove_command(
        &self,
        _ctx: &AdapterContext<'_>,
        _endpoint: &StorageUrl,
    ) -> Option<CommandLine> {
        None
    }
}
