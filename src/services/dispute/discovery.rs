// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use super::Policy;
use crate::common::single_flight::SingleFlight;
use crate::data::schema::{Market, Pool, PoolKey, Snapshot, validate_payout};
use crate::domain::constants::REQUIRED_NUM_TICKS;
use crate::domain::error::AppError;
use crate::network::chain::ChainClient;
use alloy::primitives::Address;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of validating a market the snapshot does not track yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketVerdict {
    Accepted { num_outcomes: u64 },
    /// Fails a check that cannot change.
    Rejected(String),
    /// Not in dispute yet; asked again next iteration.
    Deferred(String),
}

/// Pools and markets that failed validation for good, forgotten when the
/// current window changes.
#[derive(Debug, Default)]
pub struct Rejections {
    window: Option<u64>,
    markets: HashSet<Address>,
    pools: HashSet<Address>,
}

impl Rejections {
    fn roll(&mut self, current_window: u64) {
        if self.window != Some(current_window) {
            self.markets.clear();
            self.pools.clear();
            self.window = Some(current_window);
        }
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

type VerdictFlights = SingleFlight<Address, Result<MarketVerdict, Arc<AppError>>>;

/// A pool ready to merge, with its market when that market is new.
#[derive(Debug)]
struct Discovered {
    market: Address,
    new_market: Option<Market>,
    pool: Pool,
}

#[derive(Debug)]
enum Resolution {
    Found(Discovered),
    /// Carries the market when the market itself was rejected.
    Rejected { market: Option<Address> },
    Deferred,
}

pub async fn validate_market(
    chain: &dyn ChainClient,
    universe: Address,
    market: Address,
) -> Result<MarketVerdict, AppError> {
    let info = chain.market_info(market).await?;
    if info.universe != universe {
        return Ok(MarketVerdict::Rejected(format!(
            "belongs to universe {:#x}",
            info.universe
        )));
    }
    if info.num_ticks != REQUIRED_NUM_TICKS {
        return Ok(MarketVerdict::Rejected(format!(
            "has {} ticks, need {REQUIRED_NUM_TICKS}",
            info.num_ticks
        )));
    }
    if info.window.is_none() {
        return Ok(MarketVerdict::Deferred("has no current window".into()));
    }
    Ok(MarketVerdict::Accepted {
        num_outcomes: info.num_outcomes,
    })
}

/// Page through the factory for `window_id`, skipping everything in `exclude`.
/// Found pools are appended to `exclude`.
async fn find_new_pools(
    chain: &dyn ChainClient,
    policy: &Policy,
    window_id: u64,
    exclude: &mut Vec<Address>,
) -> Result<Vec<Address>, AppError> {
    let mut found = Vec::new();
    let mut start_index = 0u64;
    while let Some(hit) = chain
        .find_pool(window_id, start_index, policy.min_pool_stake, exclude)
        .await?
    {
        if exclude.contains(&hit.pool) || hit.index < start_index {
            return Err(AppError::Invariant(format!(
                "pool search returned {:#x} at index {} (start {start_index})",
                hit.pool, hit.index
            )));
        }
        exclude.push(hit.pool);
        found.push(hit.pool);
        start_index = hit.index.saturating_add(1);
    }
    Ok(found)
}

async fn resolve_candidate(
    chain: Arc<dyn ChainClient>,
    policy: &Policy,
    snapshot: &Snapshot,
    flights: &VerdictFlights,
    rejections: &Rejections,
    pool_address: Address,
) -> Result<Resolution, AppError> {
    let params = chain.pool_params(pool_address).await?;
    if rejections.markets.contains(&params.market) {
        tracing::debug!(target: "discovery", market = %params.market, pool = %pool_address, "Market already rejected");
        return Ok(Resolution::Rejected { market: None });
    }

    let (num_outcomes, new_market) = match snapshot.markets.get(&params.market) {
        Some(known) => (known.num_outcomes, None),
        None => {
            let universe = policy.universe;
            let market = params.market;
            let validator = chain.clone();
            let verdict = flights
                .run(market, move || async move {
                    validate_market(validator.as_ref(), universe, market)
                        .await
                        .map_err(Arc::new)
                })
                .await?;
            match verdict {
                MarketVerdict::Accepted { num_outcomes } => {
                    (num_outcomes, Some(Market::new(market, num_outcomes)))
                }
                MarketVerdict::Rejected(reason) => {
                    tracing::info!(
                        target: "discovery",
                        market = %market,
                        pool = %pool_address,
                        "Rejected market: {reason}"
                    );
                    return Ok(Resolution::Rejected {
                        market: Some(market),
                    });
                }
                MarketVerdict::Deferred(reason) => {
                    tracing::info!(
                        target: "discovery",
                        market = %market,
                        pool = %pool_address,
                        "Deferred market: {reason}"
                    );
                    return Ok(Resolution::Deferred);
                }
            }
        }
    };

    if let Err(e) = validate_payout(REQUIRED_NUM_TICKS, num_outcomes, params.invalid, &params.payout)
    {
        tracing::info!(target: "discovery", pool = %pool_address, error = %e, "Rejected pool");
        return Ok(Resolution::Rejected { market: None });
    }

    Ok(Resolution::Found(Discovered {
        market: params.market,
        new_market,
        pool: Pool::new(
            params.window_id,
            params.invalid,
            params.payout,
            pool_address,
            params.disputer,
        ),
    }))
}

/// Find pools for windows `current_window` and `current_window + 1` that the
/// snapshot does not know yet and merge the valid ones in. Permanent
/// rejections are recorded in `rejections` and skipped on later passes.
pub async fn discover(
    chain: Arc<dyn ChainClient>,
    policy: &Policy,
    snapshot: Snapshot,
    current_window: u64,
    rejections: &mut Rejections,
) -> Result<Snapshot, AppError> {
    rejections.roll(current_window);
    let mut exclude: Vec<Address> = snapshot.known_pool_addresses().into_iter().collect();
    exclude.extend(rejections.pools.iter().copied());
    let mut candidates = Vec::new();
    for window_id in [current_window, current_window.saturating_add(1)] {
        let found = find_new_pools(chain.as_ref(), policy, window_id, &mut exclude).await?;
        tracing::debug!(target: "discovery", window_id, found = found.len(), "Pool search done");
        candidates.extend(found);
    }
    if candidates.is_empty() {
        return Ok(snapshot);
    }

    let flights = VerdictFlights::new();
    let known_rejections: &Rejections = rejections;
    let results = join_all(candidates.iter().map(|pool| {
        resolve_candidate(
            chain.clone(),
            policy,
            &snapshot,
            &flights,
            known_rejections,
            *pool,
        )
    }))
    .await;

    let mut next = snapshot;
    for (pool_address, result) in candidates.iter().zip(results) {
        let discovered = match result {
            Ok(Resolution::Found(discovered)) => discovered,
            Ok(Resolution::Rejected { market }) => {
                rejections.pools.insert(*pool_address);
                if let Some(market) = market {
                    rejections.markets.insert(market);
                }
                continue;
            }
            Ok(Resolution::Deferred) => continue,
            Err(e) => {
                tracing::warn!(
                    target: "discovery",
                    pool = %pool_address,
                    error = %e,
                    "Pool lookup failed, retrying next iteration"
                );
                continue;
            }
        };
        if let Some(market) = discovered.new_market
            && next.insert_market(market)
        {
            tracing::info!(target: "discovery", market = %discovered.market, "Discovered new market");
        }
        let key: PoolKey = discovered.pool.key;
        next.insert_pool(discovered.market, discovered.pool)?;
        tracing::info!(
            target: "discovery",
            market = %discovered.market,
            pool = %pool_address,
            key = %key,
            "Discovered new pool"
        );
    }
    Ok(next)
}
