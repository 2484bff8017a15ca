// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Timeout budgeting.
//!
//! Transfer time scales with the expected file size; federation-redirected
//! protocols get a multiplier on top, and the cache wrapper gets a fixed
//! fudge so it can report a timeout of its child before it is killed itself.

use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::protocol::Protocol;

/// Bytes per MiB used for size-based scaling.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Run-wide timeout budget, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutBudget {
    pub connect: u64,
    pub transfer: u64,
    pub total: u64,
    pub federation_multiplier: f64,
    pub cache_fudge: u64,
}

/// Timeouts applied to a single protocol attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTimeouts {
    pub connect: u64,
    pub transfer: u64,
    pub total: u64,
    /// Budget for the cache wrapper process
    pub cache: u64,
}

impl ProtocolTimeouts {
    /// Wall-clock limit for a cache-wrapped transfer.
    pub fn cache_duration(&self) -> Duration {
        Duration::from_secs(self.cache)
    }

    /// Wall-clock limit for a raw tool invocation (removal).
    pub fn total_duration(&self) -> Duration {
        Duration::from_secs(self.total)
    }
}

impl TimeoutBudget {
    /// Derive the budget from configuration and an optional expected size.
    pub fn new(config: &TimeoutConfig, expected_size: Option<u64>) -> Self {
        let connect = round_up(config.connect_secs);

        let raw_transfer = match expected_size {
            Some(bytes) => bytes.div_ceil(BYTES_PER_MB) as f64 * config.secs_per_mb,
            None => config.transfer_secs,
        };
        let transfer = round_up(raw_transfer.max(config.min_transfer_secs));

        Self {
            connect,
            transfer,
            total: connect.saturating_add(transfer),
            federation_multiplier: config.federation_multiplier,
            cache_fudge: round_up(config.cache_fudge_secs),
        }
    }

    /// Timeouts for one protocol.
    pub fn for_protocol(&self, protocol: Protocol) -> ProtocolTimeouts {
        let cache = self.total.saturating_add(self.cache_fudge);
        if protocol.is_federated() {
            ProtocolTimeouts {
                connect: self.connect,
                transfer: self.scale(self.transfer),
                total: self.scale(self.total),
                cache: self.scale(cache),
            }
        } else {
            ProtocolTimeouts {
                connect: self.connect,
                transfer: self.transfer,
                total: self.total,
                cache,
            }
        }
    }

    fn scale(&self, secs: u64) -> u64 {
        round_up(secs as f64 * self.federation_multiplier)
    }
}

/// Round fractional seconds up, clamping negatives to zero.
fn round_up(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        secs.ceil() as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TimeoutConfig {
        TimeoutConfig {
            connect_secs: 300.0,
            transfer_secs: 3600.0,
            secs_per_mb: 2.0,
            min_transfer_secs: 600.0,
            federation_multiplier: 2.0,
            cache_fudge_secs: 60.0,
        }
    }

    #[test]
    fn test_unknown_size_uses_base_transfer() {
        let budget = TimeoutBudget::new(&config(), None);
        assert_eq!(budget.connect, 300);
        assert_eq!(budget.transfer, 3600);
        assert_eq!(budget.total, 3900);
    }

    #[test]
    fn test_minimum_floor_applies_exactly() {
        // 300 MiB * 2 s/MiB = 600 s is the crossover
        for size in [0, 1, BYTES_PER_MB, 150 * BYTES_PER_MB, 300 * BYTES_PER_MB] {
            let budget = TimeoutBudget::new(&config(), Some(size));
            assert_eq!(budget.transfer, 600, "size {}", size);
        }

        let budget = TimeoutBudget::new(&config(), Some(300 * BYTES_PER_MB + 1));
        assert_eq!(budget.transfer, 602);
    }

    #[test]
    fn test_partial_megabytes_round_up() {
        let mut cfg = config();
        cfg.min_transfer_secs = 0.0;
        let budget = TimeoutBudget::new(&cfg, Some(BYTES_PER_MB + 1));
        assert_eq!(budget.transfer, 4);
    }

    #[test]
    fn test_monotonic_in_size() {
        let cfg = config();
        let mut previous = 0;
        for mb in (0..2000).step_by(7) {
            let budget = TimeoutBudget::new(&cfg, Some(mb * BYTES_PER_MB + 17));
            assert!(budget.total >= previous);
            previous = budget.total;
        }
    }

    #[test]
    fn test_fractional_inputs_round_up() {
        let cfg = TimeoutConfig {
            connect_secs: 10.2,
            transfer_secs: 99.1,
            secs_per_mb: 0.5,
            min_transfer_secs: 0.0,
            federation_multiplier: 1.5,
            cache_fudge_secs: 0.4,
        };
        let budget = TimeoutBudget::new(&cfg, None);
        assert_eq!(budget.connect, 11);
        assert_eq!(budget.transfer, 100);
        assert_eq!(budget.total, 111);
        assert_eq!(budget.cache_fudge, 1);

        let fax = budget.for_protocol(Protocol::Fax);
        assert_eq!(fax.transfer, 150);
        assert_eq!(fax.total, 167); // ceil(111 * 1.5)
        assert_eq!(fax.cache, 168); // ceil(112 * 1.5)
    }

    #[test]
    fn test_federation_multiplier_only_for_fax() {
        let budget = TimeoutBudget::new(&config(), None);

        let srm = budget.for_protocol(Protocol::Srm);
        assert_eq!(srm.transfer, 3600);
        assert_eq!(srm.total, 3900);
        assert_eq!(srm.cache, 3960);
        assert_eq!(budget.for_protocol(Protocol::Xrootd), srm);

        let fax = budget.for_protocol(Protocol::Fax);
        assert_eq!(fax.connect, 300);
        assert_eq!(fax.transfer, 7200);
        assert_eq!(fax.total, 7800);
        assert_eq!(fax.cache, 7920);
    }

    #[test]
    fn test_huge_config_saturates() {
        let cfg = TimeoutConfig {
            connect_secs: 1e30,
            transfer_secs: 1e30,
            min_transfer_secs: 0.0,
            cache_fudge_secs: 1e30,
            ..config()
        };
        let budget = TimeoutBudget::new(&cfg, None);
        assert_eq!(budget.total, u64::MAX);

        let srm = budget.for_protocol(Protocol::Srm);
        assert_eq!(srm.cache, u64::MAX);
        assert_eq!(budget.for_protocol(Protocol::Fax).cache, u64::MAX);
        assert_eq!(srm.cache_duration(), Duration::from_secs(u64::MAX));
    }
}
