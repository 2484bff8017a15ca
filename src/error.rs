// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for lsm.
//!
//! Upfront validation failures are fatal and never reach an adapter; they are
//! represented by [`ValidationError`]. Failures of an individual attempt are
//! not errors at all; they are [`crate::outcome::Outcome`] values.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal input problems detected before any transfer attempt is made.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// URL does not start with the storage scheme prefix
    #[error("URL '{url}' does not start with '{prefix}'")]
    BadUrlPrefix { url: String, prefix: String },

    /// URL has the right prefix but cannot be split into host and path
    #[error("Malformed storage URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    /// Configured path root not found in the URL
    #[error("Path root '{marker}' not found in '{url}'")]
    MissingPathRoot { url: String, marker: String },

    /// Protocol name outside the supported set
    #[error("Unknown protocol '{0}' (supported: srm, xrootd, fax)")]
    UnknownProtocol(String),

    /// Size argument is not a positive integer
    #[error("Invalid size '{0}': expected a positive number of bytes")]
    InvalidSize(String),

    /// Checksum algorithm not supported
    #[error("Unsupported checksum algorithm '{0}' (supported: md5, adler32)")]
    UnsupportedChecksum(String),

    /// Checksum value is not valid hex for its algorithm
    #[error("Invalid {algorithm} checksum value '{value}'")]
    InvalidChecksum { algorithm: String, value: String },

    /// Destination already holds the expected file
    #[error("Destination {0} already exists and matches")]
    AlreadyIdentical(PathBuf),

    /// Destination exists with a different size
    #[error("Destination {path} already exists with size {actual} (expected {expected})")]
    ExistingSizeDiffers {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Destination exists with a different checksum
    #[error("Destination {path} already exists with a different checksum (expected {expected})")]
    ExistingChecksumDiffers { path: PathBuf, expected: String },

    /// Destination directory could not be created
    #[error("Cannot create destination directory {path}: {source}")]
    DestinationCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ValidationError {
    /// Create a MalformedUrl error
    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::MalformedUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Configuration could not be loaded or is inconsistent.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON deserialization error
    #[error("Invalid config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A field holds a value the budgeter or registry cannot use
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type alias for validation steps.
pub type Result<T> = std::result::Result<T, ValidationError>;
