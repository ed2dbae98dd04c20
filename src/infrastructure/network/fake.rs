// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! In-memory `ChainClient` used by unit tests.

use crate::common::error::AppError;
use crate::network::chain::{
    ChainClient, DisputeView, FoundPool, MarketInfo, PoolParams, PoolStatus,
};
use crate::network::price_feed::ExchangeRateSource;
use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct FakeMarket {
    pub info: MarketInfo,
    pub window_end: u64,
    pub dispute: DisputeView,
}

#[derive(Clone, Debug)]
pub struct FakePool {
    pub index: u64,
    pub params: PoolParams,
    pub status: PoolStatus,
    pub projected_fee: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Fund { pool: Address, gas_price: u128 },
    Collect { pool: Address, gas_price: u128 },
}

pub struct FakeChain {
    pub duration: u64,
    pub gas_price: u128,
    pub market_info_delay: Duration,
    markets: Mutex<HashMap<Address, FakeMarket>>,
    pools: Mutex<BTreeMap<Address, FakePool>>,
    failing: Mutex<HashSet<Address>>,
    submissions: Mutex<Vec<Submission>>,
    market_info_calls: AtomicUsize,
}

impl FakeChain {
    pub fn new(duration: u64) -> Self {
        Self {
            duration,
            gas_price: 1_000_000_000,
            market_info_delay: Duration::ZERO,
            markets: Mutex::new(HashMap::new()),
            pools: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            submissions: Mutex::new(Vec::new()),
            market_info_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_market(self, address: Address, market: FakeMarket) -> Self {
        self.markets
            .lock()
            .expect("markets lock")
            .insert(address, market);
        self
    }

    pub fn with_pool(self, address: Address, pool: FakePool) -> Self {
        self.pools.lock().expect("pools lock").insert(address, pool);
        self
    }

    pub fn map_pool(self, address: Address, f: impl FnOnce(&mut FakePool)) -> Self {
        if let Some(pool) = self.pools.lock().expect("pools lock").get_mut(&address) {
            f(pool);
        }
        self
    }

    pub fn map_market(self, address: Address, f: impl FnOnce(&mut FakeMarket)) -> Self {
        if let Some(market) = self.markets.lock().expect("markets lock").get_mut(&address) {
            f(market);
        }
        self
    }

    pub fn failing_submissions_for(self, pool: Address) -> Self {
        self.failing.lock().expect("failing lock").insert(pool);
        self
    }

    pub fn market_info_calls(&self) -> usize {
        self.market_info_calls.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().expect("submissions lock").clone()
    }

    fn pool(&self, pool: Address) -> Result<FakePool, AppError> {
        self.pools
            .lock()
            .expect("pools lock")
            .get(&pool)
            .cloned()
            .ok_or_else(|| AppError::Connection(format!("unknown pool {pool:#x}")))
    }

    fn market(&self, market: Address) -> Result<FakeMarket, AppError> {
        self.markets
            .lock()
            .expect("markets lock")
            .get(&market)
            .cloned()
            .ok_or_else(|| AppError::Connection(format!("unknown market {market:#x}")))
    }

    fn check_failing(&self, pool: Address) -> Result<(), AppError> {
        if self.failing.lock().expect("failing lock").contains(&pool) {
            return Err(AppError::Transaction {
                hash: String::new(),
                reason: "broadcast rejected".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn window_duration(&self) -> Result<u64, AppError> {
        Ok(self.duration)
    }

    async fn market_info(&self, market: Address) -> Result<MarketInfo, AppError> {
        self.market_info_calls.fetch_add(1, Ordering::SeqCst);
        if !self.market_info_delay.is_zero() {
            tokio::time::sleep(self.market_info_delay).await;
        }
        Ok(self.market(market)?.info)
    }

    async fn market_window(&self, market: Address) -> Result<Option<Address>, AppError> {
        Ok(self.market(market)?.info.window)
    }

    async fn window_end_time(&self, window: Address) -> Result<u64, AppError> {
        self.markets
            .lock()
            .expect("markets lock")
            .values()
            .find(|m| m.info.window == Some(window))
            .map(|m| m.window_end)
            .ok_or_else(|| AppError::Connection(format!("unknown window {window:#x}")))
    }

    async fn find_pool(
        &self,
        window_id: u64,
        start_index: u64,
        _min_stake: U256,
        exclude: &[Address],
    ) -> Result<Option<FoundPool>, AppError> {
        let pools = self.pools.lock().expect("pools lock");
        let mut candidates: Vec<(&Address, &FakePool)> = pools
            .iter()
            .filter(|(addr, p)| {
                p.params.window_id == window_id && p.index >= start_index && !exclude.contains(addr)
            })
            .collect();
        candidates.sort_by_key(|(_, p)| p.index);
        Ok(candidates.first().map(|(addr, p)| FoundPool {
            index: p.index,
            pool: **addr,
        }))
    }

    async fn pool_params(&self, pool: Address) -> Result<PoolParams, AppError> {
        Ok(self.pool(pool)?.params)
    }

    async fn pool_status(&self, pool: Address, _disputer: Address) -> Result<PoolStatus, AppError> {
        Ok(self.pool(pool)?.status)
    }

    async fn dispute_view(
        &self,
        market: Address,
        _invalid: bool,
        _payout: &[u64],
    ) -> Result<DisputeView, AppError> {
        Ok(self.market(market)?.dispute)
    }

    async fn projected_fee(&self, pool: Address, _contribution: U256) -> Result<U256, AppError> {
        Ok(self.pool(pool)?.projected_fee)
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        Ok(self.gas_price)
    }

    async fn fund_pool(
        &self,
        pool: Address,
        _disputer: Address,
        gas_price: u128,
    ) -> Result<B256, AppError> {
        self.check_failing(pool)?;
        self.submissions
            .lock()
            .expect("submissions lock")
            .push(Submission::Fund { pool, gas_price });
        if let Some(p) = self.pools.lock().expect("pools lock").get_mut(&pool) {
            p.status.disputed = true;
        }
        Ok(B256::from([1u8; 32]))
    }

    async fn collect_fees(&self, pool: Address, gas_price: u128) -> Result<B256, AppError> {
        self.check_failing(pool)?;
        self.submissions
            .lock()
            .expect("submissions lock")
            .push(Submission::Collect { pool, gas_price });
        if let Some(p) = self.pools.lock().expect("pools lock").get_mut(&pool) {
            p.status.fees_collected = true;
        }
        Ok(B256::from([2u8; 32]))
    }
}

pub struct FixedRate(pub f64);

#[async_trait]
impl ExchangeRateSource for FixedRate {
    async fn rate(&self) -> Result<f64, AppError> {
        Ok(self.0)
    }
}
