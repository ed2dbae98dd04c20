// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use super::Policy;
use crate::data::schema::{PoolKey, Snapshot};
use crate::domain::constants::format_gwei;
use crate::domain::error::AppError;
use crate::network::chain::ChainClient;
use alloy::primitives::Address;

/// Withdraw fees from every pool whose window has started, one at a time.
pub async fn collect_fees(
    chain: &dyn ChainClient,
    policy: &Policy,
    snapshot: Snapshot,
    current_window: u64,
) -> Result<Snapshot, AppError> {
    let due: Vec<(Address, PoolKey, Address, Address)> = snapshot
        .pools()
        .filter(|(_, p)| p.window_id <= current_window && !p.we_collected_fees)
        .map(|(m, p)| (m.address, p.key, p.pool_address, p.disputer_address))
        .collect();

    let mut next = snapshot;
    for (market, key, pool, disputer) in due {
        let status = match chain.pool_status(pool, disputer).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(target: "fees", pool = %pool, error = %e, "Pool status unavailable");
                continue;
            }
        };
        if status.fees_collected {
            tracing::debug!(target: "fees", pool = %pool, "Fees already collected");
            continue;
        }
        if status.fee_recipient != policy.fee_recipient {
            tracing::warn!(
                target: "fees",
                pool = %pool,
                recipient = %status.fee_recipient,
                expected = %policy.fee_recipient,
                "Fee recipient mismatch, skipping"
            );
            continue;
        }

        let gas_price = match chain.gas_price().await {
            Ok(network) => network.min(policy.max_gas_price),
            Err(e) => {
                tracing::warn!(target: "fees", error = %e, "Gas price unavailable");
                continue;
            }
        };
        match chain.collect_fees(pool, gas_price).await {
            Ok(hash) => {
                tracing::info!(
                    target: "fees",
                    pool = %pool,
                    tx = %hash,
                    gas_gwei = %format_gwei(gas_price),
                    "Collected fees"
                );
                if let Some(entry) = next.pool_mut(&market, &key) {
                    entry.we_collected_fees = true;
                }
                if !policy.cooldown.is_zero() {
                    tokio::time::sleep(policy.cooldown).await;
                }
            }
            Err(e) => {
                tracing::error!(target: "fees", pool = %pool, error = %e, "Fee withdrawal failed");
            }
        }
    }
    Ok(next)
}
