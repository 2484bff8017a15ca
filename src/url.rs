// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Storage URL decomposition.
//!
//! Splits an SRM URL such as
//! `srm://host:8443/srm/managerv2?SFN=/pnfs/site/atlasdatadisk/rucio/mc16/ab/cd/file.root`
//! into host, service path, directory and filename, and derives the
//! federation logical name (`/atlas/rucio/mc16:file.root`) when the path
//! follows the federation layout.

use serde::Serialize;

use crate::config::Config;
use crate::error::{Result, ValidationError};

/// Path segments whose scope spans two directory levels.
const TWO_LEVEL_SCOPES: [&str; 2] = ["group", "user"];

/// A decomposed storage URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageUrl {
    /// Host with optional port, e.g. `host:8443`
    pub host: String,
    /// SRM service path, e.g. `/srm/managerv2`
    pub service_path: String,
    /// Physical directory, without trailing separator
    pub directory: String,
    pub filename: String,
    /// Federation logical name, when the path follows the federation layout
    pub federation_name: Option<String>,
}

impl StorageUrl {
    /// Decompose `url` using the markers from `config`.
    pub fn parse(url: &str, config: &Config) -> Result<Self> {
        let url = url.trim();
        let rest = url
            .strip_prefix(config.url_prefix.as_str())
            .ok_or_else(|| ValidationError::BadUrlPrefix {
                url: url.to_string(),
                prefix: config.url_prefix.clone(),
            })?;

        let (host, remainder) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        if host.is_empty() {
            return Err(ValidationError::malformed(url, "missing host"));
        }

        let (service_path, physical) = match remainder.find(config.sfn_marker.as_str()) {
            Some(idx) => (
                remainder[..idx].to_string(),
                &remainder[idx + config.sfn_marker.len()..],
            ),
            None => (config.default_service_path.clone(), remainder),
        };

        let root = physical
            .find(config.path_root.as_str())
            .ok_or_else(|| ValidationError::MissingPathRoot {
                url: url.to_string(),
                marker: config.path_root.clone(),
            })?;
        let path = &physical[root..];

        let (directory, filename) = match path.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", path),
        };
        if filename.is_empty() {
            return Err(ValidationError::malformed(url, "path does not name a file"));
        }

        let federation_name = federation_name(path, filename, config);

        Ok(Self {
            host: host.to_string(),
            service_path,
            directory: directory.to_string(),
            filename: filename.to_string(),
            federation_name,
        })
    }

    /// Full physical path (directory + filename).
    pub fn path(&self) -> String {
        format!("{}/{}", self.directory, self.filename)
    }

    /// Host without the port suffix.
    pub fn hostname(&self) -> &str {
        match self.host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => &self.host,
        }
    }

    /// Canonical SRM URL with an explicit service path.
    pub fn surl(&self, config: &Config) -> String {
        format!(
            "{}{}{}{}{}",
            config.url_prefix,
            self.host,
            self.service_path,
            config.sfn_marker,
            self.path()
        )
    }

    /// XRootD door serving this endpoint.
    pub fn xrootd_door(&self, config: &Config) -> String {
        match &config.xrootd_door {
            Some(door) => door.clone(),
            None => format!("{}:{}", self.hostname(), config.xrootd_port),
        }
    }

    /// Direct XRootD URL for this file.
    pub fn xrootd_url(&self, config: &Config) -> String {
        format!("root://{}/{}", self.xrootd_door(config), self.path())
    }

    /// Federation redirector URL, when a logical name could be derived.
    pub fn federation_url(&self, config: &Config) -> Option<String> {
        self.federation_name
            .as_ref()
            .map(|lfn| format!("root://{}/{}", config.federation_redirector, lfn))
    }
}

/// Derive the federation logical name from a physical path.
///
/// The tail after the marker is `<scope>/<hash dirs...>/<file>`, except for
/// the two-level scopes where it is `user/<name>/<hash dirs...>/<file>` and the
/// scope becomes `user.<name>`.
fn federation_name(path: &str, filename: &str, config: &Config) -> Option<String> {
    let idx = path.find(config.federation_marker.as_str())?;
    let tail = &path[idx + config.federation_marker.len()..];
    let segments: Vec<&str> = tail.split('/').filter(|s| !s.is_empty()).collect();

    let scope = match segments.as_slice() {
        [first, second, _, ..] if TWO_LEVEL_SCOPES.contains(first) => {
            format!("{}.{}", first, second)
        }
        [first, ..] if TWO_LEVEL_SCOPES.contains(first) => return None,
        [first, _, ..] => first.to_string(),
        _ => return None,
    };

    Some(format!("{}{}:{}", config.federation_prefix, scope, filename))
}
