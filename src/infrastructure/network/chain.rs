// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::error::AppError;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;

/// Static properties read when a market is first seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketInfo {
    pub universe: Address,
    pub num_outcomes: u64,
    pub num_ticks: u64,
    /// `None` when the market reports the zero address.
    pub window: Option<Address>,
}

/// Defining parameters of a dispute pool, read in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
    pub market: Address,
    pub window_id: u64,
    pub payout: Vec<u64>,
    pub invalid: bool,
    pub disputer: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    pub disputed: bool,
    pub fees_collected: bool,
    pub target_round: u64,
    pub available_stake: U256,
    pub fee_recipient: Address,
}

/// Market dispute state as seen from one payout outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisputeView {
    pub round: u64,
    /// Our outcome is already the leading one.
    pub leading: bool,
    pub total_stake: U256,
    pub outcome_stake: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundPool {
    pub index: u64,
    pub pool: Address,
}

/// Narrow read/submit surface over the dispute protocol contracts.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn window_duration(&self) -> Result<u64, AppError>;

    async fn market_info(&self, market: Address) -> Result<MarketInfo, AppError>;

    async fn market_window(&self, market: Address) -> Result<Option<Address>, AppError>;

    async fn window_end_time(&self, window: Address) -> Result<u64, AppError>;

    /// Next pool at or after `start_index` for `window_id`, skipping `exclude`.
    async fn find_pool(
        &self,
        window_id: u64,
        start_index: u64,
        min_stake: U256,
        exclude: &[Address],
    ) -> Result<Option<FoundPool>, AppError>;

    async fn pool_params(&self, pool: Address) -> Result<PoolParams, AppError>;

    async fn pool_status(&self, pool: Address, disputer: Address) -> Result<PoolStatus, AppError>;

    async fn dispute_view(
        &self,
        market: Address,
        invalid: bool,
        payout: &[u64],
    ) -> Result<DisputeView, AppError>;

    /// Fees, in protocol-token atto units, earned by contributing `contribution`.
    async fn projected_fee(&self, pool: Address, contribution: U256) -> Result<U256, AppError>;

    async fn gas_price(&self) -> Result<u128, AppError>;

    /// Submit the dispute through the pool's disputer and wait for the receipt.
    async fn fund_pool(
        &self,
        pool: Address,
        disputer: Address,
        gas_price: u128,
    ) -> Result<B256, AppError>;

    async fn collect_fees(&self, pool: Address, gas_price: u128) -> Result<B256, AppError>;
}
