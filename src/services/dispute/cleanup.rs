// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::data::schema::Snapshot;
use crate::domain::constants::POOL_RETENTION_WINDOWS;

/// Drop pools more than `POOL_RETENTION_WINDOWS` behind, funded or not.
pub fn prune_pools(mut snapshot: Snapshot, current_window: u64) -> Snapshot {
    for market in snapshot.markets.values_mut() {
        let address = market.address;
        market.pools.retain(|key, pool| {
            let keep = current_window.saturating_sub(pool.window_id) <= POOL_RETENTION_WINDOWS;
            if !keep {
                tracing::info!(
                    target: "gc",
                    market = %address,
                    pool = %pool.pool_address,
                    key = %key,
                    window_id = pool.window_id,
                    "Pruned pool"
                );
            }
            keep
        });
    }
    snapshot
}

/// Drop markets that are over and have no pools left.
pub fn prune_markets(mut snapshot: Snapshot) -> Snapshot {
    snapshot.markets.retain(|address, market| {
        let keep = !(market.is_over && market.pools.is_empty());
        if !keep {
            tracing::info!(target: "gc", market = %address, "Pruned market");
        }
        keep
    });
    snapshot
}
