// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use super::Policy;
use super::window::WindowClock;
use crate::data::schema::{PoolKey, Snapshot};
use crate::domain::constants::{BOUNDARY_SETTLE_SECS, format_gwei};
use crate::domain::error::AppError;
use crate::network::chain::ChainClient;
use crate::network::price_feed::ExchangeRateSource;
use alloy::primitives::{Address, U256};
use futures::future::join_all;
use std::cmp::Reverse;

/// Stake needed to overturn the leading outcome: `total * 2 - ours * 3`,
/// limited to what the pool can actually put up.
pub fn possible_contribution(total_stake: U256, outcome_stake: U256, available: U256) -> U256 {
    total_stake
        .saturating_mul(U256::from(2))
        .saturating_sub(outcome_stake.saturating_mul(U256::from(3)))
        .min(available)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GasDecision {
    /// Below the configured floor; carries the computed price in wei.
    Uneconomical { target: u128 },
    Submit { gas_price: u128, clamped: bool },
}

fn atto_to_f64(value: U256) -> f64 {
    u128::try_from(value).map(|v| v as f64).unwrap_or(f64::MAX)
}

/// Gas price we can afford for a dispute paying `projected_fee` protocol-token
/// atto units, given `rate` pricing-asset units per protocol token.
pub fn price_dispute(projected_fee: U256, rate: f64, policy: &Policy) -> GasDecision {
    let fee_in_pricing_asset = atto_to_f64(projected_fee) * rate;
    let per_gas =
        fee_in_pricing_asset * policy.aggressiveness / policy.dispute_gas_units.max(1) as f64;
    // Float to int casts saturate; NaN becomes zero.
    let target = per_gas as u128;
    if target < policy.min_gas_price {
        return GasDecision::Uneconomical { target };
    }
    if target > policy.max_gas_price {
        return GasDecision::Submit {
            gas_price: policy.max_gas_price,
            clamped: true,
        };
    }
    GasDecision::Submit {
        gas_price: target,
        clamped: false,
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    market: Address,
    key: PoolKey,
    pool: Address,
    disputer: Address,
    invalid: bool,
    payout: Vec<u64>,
}

/// A funding transaction we decided to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeAction {
    pub market: Address,
    pub key: PoolKey,
    pub pool: Address,
    pub disputer: Address,
    pub gas_price: u128,
    pub description: String,
}

/// Highest gas price first; ties keep a stable order by pool address.
pub fn order_actions(actions: &mut [DisputeAction]) {
    actions.sort_by_key(|a| (Reverse(a.gas_price), a.pool));
}

async fn assess(
    chain: &dyn ChainClient,
    policy: &Policy,
    rate: f64,
    candidate: &Candidate,
) -> Result<Option<DisputeAction>, AppError> {
    let pool = candidate.pool;
    let status = chain.pool_status(pool, candidate.disputer).await?;
    if status.disputed {
        tracing::debug!(target: "executor", pool = %pool, "Pool already disputed on chain");
        return Ok(None);
    }
    let view = chain
        .dispute_view(candidate.market, candidate.invalid, &candidate.payout)
        .await?;
    if view.round != status.target_round {
        tracing::info!(
            target: "executor",
            pool = %pool,
            round = view.round,
            target_round = status.target_round,
            "Pool targets another dispute round"
        );
        return Ok(None);
    }
    if view.leading {
        tracing::info!(target: "executor", pool = %pool, "Outcome already leading");
        return Ok(None);
    }
    let contribution =
        possible_contribution(view.total_stake, view.outcome_stake, status.available_stake);
    if contribution.is_zero() {
        tracing::info!(
            target: "executor",
            pool = %pool,
            total_stake = %view.total_stake,
            outcome_stake = %view.outcome_stake,
            available = %status.available_stake,
            "Nothing to contribute"
        );
        return Ok(None);
    }

    let projected_fee = chain.projected_fee(pool, contribution).await?;
    match price_dispute(projected_fee, rate, policy) {
        GasDecision::Uneconomical { target } => {
            tracing::info!(
                target: "executor",
                pool = %pool,
                contribution = %contribution,
                projected_fee = %projected_fee,
                rate,
                target_gwei = %format_gwei(target),
                min_gwei = %format_gwei(policy.min_gas_price),
                "Dispute uneconomical"
            );
            Ok(None)
        }
        GasDecision::Submit { gas_price, clamped } => {
            if clamped {
                tracing::info!(
                    target: "executor",
                    pool = %pool,
                    max_gwei = %format_gwei(policy.max_gas_price),
                    "Gas price clamped to maximum"
                );
            }
            Ok(Some(DisputeAction {
                market: candidate.market,
                key: candidate.key,
                pool,
                disputer: candidate.disputer,
                gas_price,
                description: format!(
                    "fund pool {pool:#x} of market {:#x} with {contribution} atto (fee {projected_fee})",
                    candidate.market
                ),
            }))
        }
    }
}

async fn execute(
    chain: &dyn ChainClient,
    policy: &Policy,
    action: &DisputeAction,
) -> Result<(), AppError> {
    let hash = chain
        .fund_pool(action.pool, action.disputer, action.gas_price)
        .await?;
    tracing::info!(
        target: "executor",
        pool = %action.pool,
        tx = %hash,
        gas_gwei = %format_gwei(action.gas_price),
        "Dispute confirmed"
    );
    if !policy.cooldown.is_zero() {
        tokio::time::sleep(policy.cooldown).await;
    }
    Ok(())
}

/// Fund every profitable pool of the target window. The target is the next
/// window when its start is imminent, in which case execution waits until
/// just past the boundary.
pub async fn evaluate_and_execute(
    chain: &dyn ChainClient,
    rates: &dyn ExchangeRateSource,
    policy: &Policy,
    clock: &WindowClock,
    snapshot: Snapshot,
    duration: u64,
) -> Result<Snapshot, AppError> {
    let current_window = clock.current_window(duration);
    let boundary = clock.next_boundary(duration);
    let await_boundary = clock.boundary_imminent(duration);
    let target_window = if await_boundary {
        current_window.saturating_add(1)
    } else {
        current_window
    };

    let candidates: Vec<Candidate> = snapshot
        .pools()
        .filter(|(_, p)| p.window_id == target_window && !p.we_funded)
        .map(|(m, p)| Candidate {
            market: m.address,
            key: p.key,
            pool: p.pool_address,
            disputer: p.disputer_address,
            invalid: p.invalid,
            payout: p.payout_vector.clone(),
        })
        .collect();
    if candidates.is_empty() {
        return Ok(snapshot);
    }

    let rate = rates.rate().await?;
    let assessed = join_all(
        candidates
            .iter()
            .map(|candidate| assess(chain, policy, rate, candidate)),
    )
    .await;
    let mut actions = Vec::new();
    for (candidate, result) in candidates.iter().zip(assessed) {
        match result {
            Ok(Some(action)) => actions.push(action),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "executor", pool = %candidate.pool, error = %e, "Pool assessment failed");
            }
        }
    }
    if actions.is_empty() {
        return Ok(snapshot);
    }

    order_actions(&mut actions);
    for (rank, action) in actions.iter().enumerate() {
        tracing::info!(
            target: "executor",
            rank,
            gas_gwei = %format_gwei(action.gas_price),
            "Eligible: {}",
            action.description
        );
    }

    if await_boundary {
        clock
            .wait_until(boundary.saturating_add(BOUNDARY_SETTLE_SECS))
            .await;
    }

    // join_all polls in order, so submissions start highest price first.
    let outcomes = join_all(actions.iter().map(|action| execute(chain, policy, action))).await;

    let mut next = snapshot;
    for (action, outcome) in actions.iter().zip(outcomes) {
        match outcome {
            Ok(()) => {
                if let Some(pool) = next.pool_mut(&action.market, &action.key) {
                    pool.we_funded = true;
                }
            }
            Err(e) => {
                tracing::error!(target: "executor", pool = %action.pool, error = %e, "Dispute failed");
            }
        }
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::schema::{Market, Pool};
    use crate::network::chain::{DisputeView, MarketInfo, PoolParams, PoolStatus};
    use crate::network::fake::{FakeChain, FakeMarket, FakePool, FixedRate, Submission};
    use crate::services::dispute::testing::policy;

    const DURATION: u64 = 604_800;
    const GWEI: u128 = 1_000_000_000;

    fn action(pool: u8, gas_price: u128) -> DisputeAction {
        DisputeAction {
            market: Address::ZERO,
            key: PoolKey::derive(1, false, &[pool as u64]),
            pool: Address::new([pool; 20]),
            disputer: Address::ZERO,
            gas_price,
            description: format!("pool {pool}"),
        }
    }

    #[test]
    fn contribution_follows_bonding_formula() {
        let c = possible_contribution(U256::from(100), U256::from(10), U256::from(1_000));
        assert_eq!(c, U256::from(170));
        let capped = possible_contribution(U256::from(100), U256::from(10), U256::from(50));
        assert_eq!(capped, U256::from(50));
        let none = possible_contribution(U256::from(100), U256::from(70), U256::from(1_000));
        assert!(none.is_zero());
    }

    // 2e16 atto * 0.5 / 1e6 gas = 1e10 wei = 10 gwei.
    fn fee() -> U256 {
        U256::from(20_000_000_000_000_000u128)
    }

    #[test]
    fn below_minimum_is_rejected() {
        let mut policy = policy();
        policy.min_gas_price = 10 * GWEI;
        assert_eq!(
            price_dispute(fee(), 0.5, &policy),
            GasDecision::Submit {
                gas_price: 10 * GWEI,
                clamped: false
            }
        );
        assert_eq!(
            price_dispute(fee(), 0.25, &policy),
            GasDecision::Uneconomical { target: 5 * GWEI }
        );
    }

    #[test]
    fn above_maximum_is_clamped_exactly() {
        let mut policy = policy();
        policy.max_gas_price = 5 * GWEI;
        assert_eq!(
            price_dispute(fee(), 0.5, &policy),
            GasDecision::Submit {
                gas_price: 5 * GWEI,
                clamped: true
            }
        );
    }

    #[test]
    fn aggressiveness_scales_the_price() {
        let mut policy = policy();
        policy.aggressiveness = 0.5;
        assert_eq!(
            price_dispute(fee(), 0.5, &policy),
            GasDecision::Submit {
                gas_price: 5 * GWEI,
                clamped: false
            }
        );
    }

    #[test]
    fn actions_are_ordered_by_descending_gas_price() {
        let mut actions = vec![action(1, 3), action(2, 9), action(3, 1), action(4, 9)];
        order_actions(&mut actions);
        let prices: Vec<u128> = actions.iter().map(|a| a.gas_price).collect();
        assert_eq!(prices, vec![9, 9, 3, 1]);
        assert_eq!(actions[0].pool, Address::new([2; 20]));
        assert_eq!(actions[1].pool, Address::new([4; 20]));
    }

    fn fixture(
        market: Address,
        pools: &[(Address, u64, u128)],
    ) -> (FakeChain, Snapshot) {
        let mut chain = FakeChain::new(DURATION).with_market(
            market,
            FakeMarket {
                info: MarketInfo {
                    universe: Address::ZERO,
                    num_outcomes: 2,
                    num_ticks: 10_000,
                    window: Some(Address::new([0xf0; 20])),
                },
                window_end: 11 * DURATION,
                dispute: DisputeView {
                    round: 2,
                    leading: false,
                    total_stake: U256::from(1_000),
                    outcome_stake: U256::ZERO,
                },
            },
        );
        let mut snapshot = Snapshot::initial();
        snapshot.insert_market(Market::new(market, 2));
        for (i, (pool, window_id, fee_eth_milli)) in pools.iter().enumerate() {
            let payout = if i % 2 == 0 {
                vec![10_000, 0]
            } else {
                vec![0, 10_000]
            };
            chain = chain.with_pool(
                *pool,
                FakePool {
                    index: i as u64,
                    params: PoolParams {
                        market,
                        window_id: *window_id,
                        payout: payout.clone(),
                        invalid: false,
                        disputer: Address::new([0xd0; 20]),
                    },
                    status: PoolStatus {
                        disputed: false,
                        fees_collected: false,
                        target_round: 2,
                        available_stake: U256::from(500),
                        fee_recipient: Address::ZERO,
                    },
                    projected_fee: U256::from(*fee_eth_milli * 1_000_000_000_000_000),
                },
            );
            snapshot
                .insert_pool(
                    market,
                    Pool::new(*window_id, false, payout, *pool, Address::new([0xd0; 20])),
                )
                .expect("seed pool");
        }
        (chain, snapshot)
    }

    #[tokio::test]
    async fn profitable_pools_are_funded_highest_price_first() {
        let market = Address::new([1; 20]);
        let (cheap, rich, other_window) = (
            Address::new([0x10; 20]),
            Address::new([0x20; 20]),
            Address::new([0x30; 20]),
        );
        let (chain, snapshot) = fixture(
            market,
            &[(cheap, 10, 1_000), (rich, 10, 3_000), (other_window, 9, 5_000)],
        );
        let clock = WindowClock::fixed(10 * DURATION + 1_000);

        let next = evaluate_and_execute(&chain, &FixedRate(1.0), &policy(), &clock, snapshot, DURATION)
            .await
            .expect("evaluate");

        // 1e18 * 1.0 / 1e6 gas = 1e12 wei per gas per token of fee.
        assert_eq!(
            chain.submissions(),
            vec![
                Submission::Fund {
                    pool: rich,
                    gas_price: 3_000_000_000_000
                },
                Submission::Fund {
                    pool: cheap,
                    gas_price: 1_000_000_000_000
                },
            ]
        );
        let funded: Vec<(Address, bool)> = next
            .pools()
            .map(|(_, p)| (p.pool_address, p.we_funded))
            .collect();
        assert!(funded.contains(&(cheap, true)));
        assert!(funded.contains(&(rich, true)));
        assert!(funded.contains(&(other_window, false)));
    }

    #[tokio::test]
    async fn failed_siblings_do_not_block_successful_ones() {
        let market = Address::new([2; 20]);
        let (ok, broken) = (Address::new([0x40; 20]), Address::new([0x50; 20]));
        let (chain, snapshot) = fixture(market, &[(ok, 10, 1_000), (broken, 10, 2_000)]);
        let chain = chain.failing_submissions_for(broken);
        let clock = WindowClock::fixed(10 * DURATION + 1_000);

        let next = evaluate_and_execute(&chain, &FixedRate(1.0), &policy(), &clock, snapshot, DURATION)
            .await
            .expect("evaluate");

        for (_, pool) in next.pools() {
            assert_eq!(pool.we_funded, pool.pool_address == ok);
        }
    }

    #[tokio::test]
    async fn uneconomical_pools_stay_unfunded() {
        let market = Address::new([3; 20]);
        let pool = Address::new([0x60; 20]);
        let (chain, snapshot) = fixture(market, &[(pool, 10, 1)]);
        let mut policy = policy();
        policy.min_gas_price = 100 * GWEI;
        let clock = WindowClock::fixed(10 * DURATION + 1_000);

        let next = evaluate_and_execute(&chain, &FixedRate(1.0), &policy, &clock, snapshot.clone(), DURATION)
            .await
            .expect("evaluate");
        assert_eq!(next, snapshot);
        assert!(chain.submissions().is_empty());
    }

    #[tokio::test]
    async fn imminent_boundary_targets_next_window() {
        let market = Address::new([4; 20]);
        let (current, upcoming) = (Address::new([0x70; 20]), Address::new([0x80; 20]));
        let (chain, snapshot) = fixture(market, &[(current, 10, 1_000), (upcoming, 11, 1_000)]);
        // Override pins the boundary in the past so the wait returns at once.
        let now = 11 * DURATION - 60;
        let clock = WindowClock::with_now(std::sync::Arc::new(move || now), Some(now - 10));

        evaluate_and_execute(&chain, &FixedRate(1.0), &policy(), &clock, snapshot, DURATION)
            .await
            .expect("evaluate");
        assert_eq!(
            chain.submissions(),
            vec![Submission::Fund {
                pool: upcoming,
                gas_price: 1_000_000_000_000
            }]
        );
    }

    async fn assert_skipped(chain: FakeChain, snapshot: Snapshot) {
        let clock = WindowClock::fixed(10 * DURATION + 1_000);
        let next = evaluate_and_execute(&chain, &FixedRate(1.0), &policy(), &clock, snapshot.clone(), DURATION)
            .await
            .expect("evaluate");
        assert!(chain.submissions().is_empty());
        assert!(next.pools().all(|(_, p)| !p.we_funded));
        assert_eq!(next, snapshot);
    }

    #[tokio::test]
    async fn pools_disputed_on_chain_are_skipped() {
        let market = Address::new([5; 20]);
        let pool = Address::new([0x90; 20]);
        let (chain, snapshot) = fixture(market, &[(pool, 10, 1_000)]);
        let chain = chain.map_pool(pool, |p| p.status.disputed = true);
        assert_skipped(chain, snapshot).await;
    }

    #[tokio::test]
    async fn pools_for_another_round_are_skipped() {
        let market = Address::new([6; 20]);
        let pool = Address::new([0xa0; 20]);
        let (chain, snapshot) = fixture(market, &[(pool, 10, 1_000)]);
        let chain = chain.map_pool(pool, |p| p.status.target_round = 3);
        assert_skipped(chain, snapshot).await;
    }

    #[tokio::test]
    async fn leading_outcomes_are_skipped() {
        let market = Address::new([7; 20]);
        let pool = Address::new([0xb0; 20]);
        let (chain, snapshot) = fixture(market, &[(pool, 10, 1_000)]);
        let chain = chain.map_market(market, |m| m.dispute.leading = true);
        assert_skipped(chain, snapshot).await;
    }

    #[tokio::test]
    async fn pools_with_nothing_to_contribute_are_skipped() {
        // 1000 * 2 - 700 * 3 saturates to zero.
        let market = Address::new([8; 20]);
        let outweighed = Address::new([0xc0; 20]);
        let (chain, snapshot) = fixture(market, &[(outweighed, 10, 1_000)]);
        let chain = chain.map_market(market, |m| m.dispute.outcome_stake = U256::from(700));
        assert_skipped(chain, snapshot).await;

        let market = Address::new([9; 20]);
        let drained = Address::new([0xd1; 20]);
        let (chain, snapshot) = fixture(market, &[(drained, 10, 1_000)]);
        let chain = chain.map_pool(drained, |p| p.status.available_stake = U256::ZERO);
        assert_skipped(chain, snapshot).await;
    }

    #[tokio::test]
    async fn expensive_disputes_are_sent_at_the_maximum_price() {
        let market = Address::new([10; 20]);
        let pool = Address::new([0xe0; 20]);
        let (chain, snapshot) = fixture(market, &[(pool, 10, 3_000)]);
        let mut policy = policy();
        policy.max_gas_price = 2_000_000_000_000;
        let clock = WindowClock::fixed(10 * DURATION + 1_000);

        let next = evaluate_and_execute(&chain, &FixedRate(1.0), &policy, &clock, snapshot, DURATION)
            .await
            .expect("evaluate");
        assert_eq!(
            chain.submissions(),
            vec![Submission::Fund {
                pool,
                gas_price: 2_000_000_000_000
            }]
        );
        assert!(next.pools().all(|(_, p)| p.we_funded));
    }
}
