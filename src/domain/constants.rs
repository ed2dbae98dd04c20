// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::time::Duration;

// =============================================================================
// SNAPSHOT
// =============================================================================

pub const STATE_VERSION: u32 = 1;
pub const DEFAULT_STATE_FILE: &str = "state.json";

// =============================================================================
// PROTOCOL CONSTANTS
// =============================================================================

/// Markets with any other tick granularity are not tracked.
pub const REQUIRED_NUM_TICKS: u64 = 10_000;

/// Pools whose window is more than this many windows behind are pruned.
pub const POOL_RETENTION_WINDOWS: u64 = 3;

/// A market counts as over only this long after its window ended.
pub const MARKET_OVER_GRACE_SECS: u64 = 3_600;

// =============================================================================
// SCHEDULING
// =============================================================================

/// Fee collection is skipped while the next window end is this close.
pub const FEE_COLLECTION_QUIET_SECS: u64 = 24 * 3_600;

/// Boundary polling starts once the next window end is this close.
pub const BOUNDARY_WAIT_THRESHOLD_SECS: u64 = 15 * 60;

/// The scheduler wakes up this long before the boundary.
pub const BOUNDARY_LEAD_SECS: u64 = 5;

/// The executor holds submissions until this long past the boundary.
pub const BOUNDARY_SETTLE_SECS: u64 = 1;

pub const BOUNDARY_POLL_FLOOR: Duration = Duration::from_millis(250);
pub const BOUNDARY_POLL_CEILING: Duration = Duration::from_secs(30);

pub const FAILURE_BACKOFF_BASE: Duration = Duration::from_secs(10);
pub const FAILURE_BACKOFF_CEILING: Duration = Duration::from_secs(300);

// =============================================================================
// GAS & TRANSACTION CONSTANTS
// =============================================================================

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
pub const DEFAULT_DISPUTE_GAS_UNITS: u64 = 3_000_000;
pub const FEE_WITHDRAWAL_GAS_LIMIT: u64 = 1_500_000;

pub fn gwei_to_wei(gwei: u64) -> u128 {
    (gwei as u128).saturating_mul(WEI_PER_GWEI)
}

pub fn format_gwei(wei: u128) -> String {
    format!("{:.3}", wei as f64 / WEI_PER_GWEI as f64)
}
