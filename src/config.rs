// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Site configuration.
//!
//! Loaded once at startup and passed by reference into the budgeter, the
//! adapter registry and the orchestrator. Every field has a default so a
//! site only needs to override what differs:
//!
//! ```json
//! {
//!   "site": "MWT2",
//!   "path_root": "/pnfs/uchicago.edu/",
//!   "timeouts": { "min_transfer_secs": 900 },
//!   "monitor_log": "/var/log/lsm/monitor.jsonl"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::protocol::Protocol;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "LSM_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site identifier reported in monitoring records
    pub site: String,
    /// Required scheme prefix of storage URLs
    pub url_prefix: String,
    /// Separator between SRM service path and site file name
    pub sfn_marker: String,
    /// Service path used when a URL carries no SFN marker
    pub default_service_path: String,
    /// Marker that must appear in every physical path
    pub path_root: String,
    /// Marker after which the federation scope layout starts
    pub federation_marker: String,
    /// Prefix of derived federation logical names
    pub federation_prefix: String,
    /// Federation redirector host
    pub federation_redirector: String,
    /// Explicit XRootD door (host:port); derived from the SRM host when unset
    pub xrootd_door: Option<String>,
    pub xrootd_port: u16,
    pub timeouts: TimeoutConfig,
    pub cache: CacheConfig,
    pub tools: ToolConfig,
    /// Protocol order used when none is given on the command line
    pub default_protocols: Vec<Protocol>,
    /// JSON-lines file receiving monitoring records (log stream when unset)
    pub monitor_log: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: "UNKNOWN".to_string(),
            url_prefix: "srm://".to_string(),
            sfn_marker: "?SFN=".to_string(),
            default_service_path: "/srm/managerv2".to_string(),
            path_root: "/".to_string(),
            federation_marker: "/rucio/".to_string(),
            federation_prefix: "/atlas/rucio/".to_string(),
            federation_redirector: "glrd.usatlas.org".to_string(),
            xrootd_door: None,
            xrootd_port: 1094,
            timeouts: TimeoutConfig::default(),
            cache: CacheConfig::default(),
            tools: ToolConfig::default(),
            default_protocols: vec![Protocol::Xrootd, Protocol::Srm, Protocol::Fax],
            monitor_log: None,
        }
    }
}

/// Base values for the timeout budgeter, in (possibly fractional) seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_secs: f64,
    /// Transfer timeout used when the file size is unknown
    pub transfer_secs: f64,
    /// Transfer seconds granted per started MiB
    pub secs_per_mb: f64,
    pub min_transfer_secs: f64,
    /// Scale applied to federation-redirected protocols
    pub federation_multiplier: f64,
    /// Extra time granted to the cache wrapper on top of the total
    pub cache_fudge_secs: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 300.0,
            transfer_secs: 3600.0,
            secs_per_mb: 2.0,
            min_transfer_secs: 600.0,
            federation_multiplier: 2.0,
            cache_fudge_secs: 60.0,
        }
    }
}

/// Caching wrapper invocation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub executable: String,
    pub root: PathBuf,
    pub max_retries: u32,
    /// Space limit understood by the wrapper (e.g. "80%" or "200G")
    pub max_space: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            executable: "pcache".to_string(),
            root: PathBuf::from("/scratch/pcache"),
            max_retries: 3,
            max_space: "80%".to_string(),
        }
    }
}

/// Names (or paths) of the external transfer tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub srm_copy: String,
    pub srm_remove: String,
    pub xrd_copy: String,
    pub xrd_fs: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            srm_copy: "srmcp".to_string(),
            srm_remove: "srmrm".to_string(),
            xrd_copy: "xrdcp".to_string(),
            xrd_fs: "xrdfs".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration: `$LSM_CONFIG`, then `~/.lsm/config.json`,
    /// then built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Read a config file without validating it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the per-user config path (~/.lsm/config.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".lsm").join("config.json"))
    }

    /// Reject values the budgeter and registry cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timeouts;
        for (field, value) in [
            ("timeouts.connect_secs", t.connect_secs),
            ("timeouts.transfer_secs", t.transfer_secs),
            ("timeouts.secs_per_mb", t.secs_per_mb),
            ("timeouts.min_transfer_secs", t.min_transfer_secs),
            ("timeouts.cache_fudge_secs", t.cache_fudge_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be a non-negative number, got {}", value),
                ));
            }
        }
        if !t.federation_multiplier.is_finite() || t.federation_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "timeouts.federation_multiplier",
                format!("must be at least 1, got {}", t.federation_multiplier),
            ));
        }

        for (field, value) in [
            ("url_prefix", &self.url_prefix),
            ("sfn_marker", &self.sfn_marker),
            ("path_root", &self.path_root),
            ("federation_marker", &self.federation_marker),
            ("federation_redirector", &self.federation_redirector),
            ("cache.executable", &self.cache.executable),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }

        if self.default_protocols.is_empty() {
            return Err(ConfigError::invalid(
                "default_protocols",
                "at least one protocol is required",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.url_prefix, "srm://");
        assert_eq!(
            config.default_protocols,
            vec![Protocol::Xrootd, Protocol::Srm, Protocol::Fax]
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(
            file,
            r#"{{"site": "MWT2", "timeouts": {{"min_transfer_secs": 900}}, "default_protocols": ["srm"]}}"#
        )
        .expect("Failed to write config");

        let config = Config::from_file(file.path()).expect("config should parse");
        assert_eq!(config.site, "MWT2");
        assert_eq!(config.timeouts.min_transfer_secs, 900.0);
        assert_eq!(config.timeouts.connect_secs, 300.0);
        assert_eq!(config.default_protocols, vec![Protocol::Srm]);
        assert_eq!(config.cache.executable, "pcache");
    }

    #[test]
    fn test_unknown_protocol_in_file_is_rejected() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, r#"{{"default_protocols": ["gridftp"]}}"#).expect("Failed to write config");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.timeouts.secs_per_mb = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.timeouts.federation_multiplier = 0.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.path_root = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.default_protocols.clear();
        assert!(config.validate().is_err());
    }
}
