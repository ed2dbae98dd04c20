// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::data::schema::Snapshot;
use crate::domain::constants::MARKET_OVER_GRACE_SECS;
use crate::domain::error::AppError;
use crate::network::chain::ChainClient;
use alloy::primitives::Address;
use futures::future::join_all;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Observation {
    last_observed_window: u64,
    is_over: bool,
}

/// The window end time belongs to the following window, hence the `- 1`.
fn observe(end_time: u64, duration: u64, now: u64) -> Observation {
    Observation {
        last_observed_window: (end_time / duration.max(1)).saturating_sub(1),
        is_over: now > end_time.saturating_add(MARKET_OVER_GRACE_SECS),
    }
}

async fn observe_market(
    chain: &dyn ChainClient,
    market: Address,
    duration: u64,
    now: u64,
) -> Result<Option<Observation>, AppError> {
    let Some(window) = chain.market_window(market).await? else {
        tracing::warn!(target: "lifecycle", market = %market, "Market reports no window, leaving as is");
        return Ok(None);
    };
    let end_time = chain.window_end_time(window).await?;
    Ok(Some(observe(end_time, duration, now)))
}

/// Refresh `lastObservedWindow` and `isOver` for markets behind `current_window`.
pub async fn update_lifecycle(
    chain: &dyn ChainClient,
    snapshot: Snapshot,
    duration: u64,
    now: u64,
) -> Result<Snapshot, AppError> {
    let current_window = now / duration.max(1);
    let stale: Vec<Address> = snapshot
        .markets
        .values()
        .filter(|m| !m.is_over && m.last_observed_window < current_window)
        .map(|m| m.address)
        .collect();
    if stale.is_empty() {
        return Ok(snapshot);
    }

    let observations = join_all(
        stale
            .iter()
            .map(|market| observe_market(chain, *market, duration, now)),
    )
    .await;

    let mut next = snapshot;
    for (address, observed) in stale.iter().zip(observations) {
        let observation = match observed {
            Ok(Some(observation)) => observation,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(target: "lifecycle", market = %address, error = %e, "Market refresh failed");
                continue;
            }
        };
        let Some(market) = next.markets.get_mut(address) else {
            continue;
        };
        market.last_observed_window = observation.last_observed_window;
        if observation.is_over && !market.is_over {
            market.is_over = true;
            tracing::info!(target: "lifecycle", market = %address, "Market is over");
        }
        tracing::debug!(
            target: "lifecycle",
            market = %address,
            last_observed_window = market.last_observed_window,
            "Market refreshed"
        );
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::Market;
    use crate::network::chain::{DisputeView, MarketInfo};
    use crate::network::fake::{FakeChain, FakeMarket};
    use alloy::primitives::U256;

    const DURATION: u64 = 604_800;

    fn fake_market(window: Option<Address>, window_end: u64) -> FakeMarket {
        FakeMarket {
            info: MarketInfo {
                universe: Address::ZERO,
                num_outcomes: 2,
                num_ticks: 10_000,
                window,
            },
            window_end,
            dispute: DisputeView {
                round: 0,
                leading: false,
                total_stake: U256::ZERO,
                outcome_stake: U256::ZERO,
            },
        }
    }

    #[test]
    fn observation_applies_offset_and_grace() {
        let end = 11 * DURATION;
        assert_eq!(observe(end, DURATION, end).last_observed_window, 10);
        assert!(!observe(end, DURATION, end + MARKET_OVER_GRACE_SECS).is_over);
        assert!(observe(end, DURATION, end + MARKET_OVER_GRACE_SECS + 1).is_over);
    }

    #[tokio::test]
    async fn stale_markets_are_refreshed() {
        let (live, ended, windowless) = (
            Address::new([1; 20]),
            Address::new([2; 20]),
            Address::new([3; 20]),
        );
        let now = 12 * DURATION + 10;
        let chain = FakeChain::new(DURATION)
            .with_market(live, fake_market(Some(Address::new([0xa1; 20])), 13 * DURATION))
            .with_market(ended, fake_market(Some(Address::new([0xa2; 20])), 10 * DURATION))
            .with_market(windowless, fake_market(None, 0));

        let mut snapshot = Snapshot::initial();
        for address in [live, ended, windowless] {
            snapshot.insert_market(Market::new(address, 2));
        }

        let next = update_lifecycle(&chain, snapshot, DURATION, now)
            .await
            .expect("lifecycle");

        assert_eq!(next.markets[&live].last_observed_window, 12);
        assert!(!next.markets[&live].is_over);
        assert_eq!(next.markets[&ended].last_observed_window, 9);
        assert!(next.markets[&ended].is_over);
        assert_eq!(next.markets[&windowless], Market::new(windowless, 2));
    }

    #[tokio::test]
    async fn current_and_over_markets_are_skipped() {
        let address = Address::new([4; 20]);
        let chain = FakeChain::new(DURATION);
        let mut snapshot = Snapshot::initial();
        let mut market = Market::new(address, 2);
        market.last_observed_window = 12;
        snapshot.insert_market(market);

        // No fake market registered: any chain read would fail.
        let next = update_lifecycle(&chain, snapshot.clone(), DURATION, 12 * DURATION + 5)
            .await
            .expect("lifecycle");
        assert_eq!(next, snapshot);
    }
}
