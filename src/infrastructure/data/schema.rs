// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::STATE_VERSION;
use crate::domain::error::AppError;
use alloy::primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Content-addressed pool identity: `keccak256(abi.encode(window, invalid, payout))`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolKey(B256);

impl PoolKey {
    pub fn derive(window_id: u64, invalid: bool, payout: &[u64]) -> Self {
        let numerators: Vec<U256> = payout.iter().map(|v| U256::from(*v)).collect();
        let encoded = (U256::from(window_id), invalid, numerators).abi_encode();
        Self(keccak256(encoded))
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pool {
    pub key: PoolKey,
    pub window_id: u64,
    pub invalid: bool,
    pub payout_vector: Vec<u64>,
    pub pool_address: Address,
    pub disputer_address: Address,
    pub we_funded: bool,
    pub we_collected_fees: bool,
}

impl Pool {
    pub fn new(
        window_id: u64,
        invalid: bool,
        payout_vector: Vec<u64>,
        pool_address: Address,
        disputer_address: Address,
    ) -> Self {
        Self {
            key: PoolKey::derive(window_id, invalid, &payout_vector),
            window_id,
            invalid,
            payout_vector,
            pool_address,
            disputer_address,
            we_funded: false,
            we_collected_fees: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub address: Address,
    pub num_outcomes: u64,
    pub is_over: bool,
    pub last_observed_window: u64,
    #[serde(with = "sorted_entries")]
    pub pools: BTreeMap<PoolKey, Pool>,
}

impl Market {
    pub fn new(address: Address, num_outcomes: u64) -> Self {
        Self {
            address,
            num_outcomes,
            is_over: false,
            last_observed_window: 0,
            pools: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(with = "sorted_entries")]
    pub markets: BTreeMap<Address, Market>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::initial()
    }
}

impl Snapshot {
    pub fn initial() -> Self {
        Self {
            version: STATE_VERSION,
            markets: BTreeMap::new(),
        }
    }

    pub fn pool_count(&self) -> usize {
        self.markets.values().map(|m| m.pools.len()).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "tracking {} markets and {} pools",
            self.markets.len(),
            self.pool_count()
        )
    }

    pub fn known_pool_addresses(&self) -> HashSet<Address> {
        self.markets
            .values()
            .flat_map(|m| m.pools.values().map(|p| p.pool_address))
            .collect()
    }

    pub fn pools(&self) -> impl Iterator<Item = (&Market, &Pool)> {
        self.markets
            .values()
            .flat_map(|m| m.pools.values().map(move |p| (m, p)))
    }

    /// Returns `false` when the market is already tracked.
    pub fn insert_market(&mut self, market: Market) -> bool {
        if self.markets.contains_key(&market.address) {
            return false;
        }
        self.markets.insert(market.address, market);
        true
    }

    pub fn insert_pool(&mut self, market: Address, pool: Pool) -> Result<(), AppError> {
        let entry = self.markets.get_mut(&market).ok_or_else(|| {
            AppError::Invariant(format!(
                "pool {:#x} references untracked market {:#x}",
                pool.pool_address, market
            ))
        })?;
        if let Some(existing) = entry.pools.get(&pool.key) {
            return Err(AppError::Invariant(format!(
                "duplicate pool key {} in market {:#x}: {:#x} vs {:#x}",
                pool.key, market, existing.pool_address, pool.pool_address
            )));
        }
        entry.pools.insert(pool.key, pool);
        Ok(())
    }

    pub fn pool_mut(&mut self, market: &Address, key: &PoolKey) -> Option<&mut Pool> {
        self.markets.get_mut(market)?.pools.get_mut(key)
    }
}

/// Checks a payout vector against the protocol's distribution rules.
pub fn validate_payout(
    num_ticks: u64,
    num_outcomes: u64,
    invalid: bool,
    payout: &[u64],
) -> Result<(), AppError> {
    let reject = |message: String| AppError::Validation {
        field: "payout_vector".into(),
        message,
    };
    if num_outcomes == 0 {
        return Err(reject("market reports zero outcomes".into()));
    }
    if payout.len() as u64 != num_outcomes {
        return Err(reject(format!(
            "expected {} entries, got {}",
            num_outcomes,
            payout.len()
        )));
    }
    if invalid {
        let share = num_ticks / num_outcomes;
        if let Some(bad) = payout.iter().find(|v| **v != share) {
            return Err(reject(format!(
                "invalid payout entry {bad} differs from even share {share}"
            )));
        }
        return Ok(());
    }
    let full = payout.iter().filter(|v| **v == num_ticks).count();
    let zero = payout.iter().filter(|v| **v == 0).count();
    if full != 1 || full + zero != payout.len() {
        return Err(reject(format!(
            "expected exactly one entry of {num_ticks} and zeros elsewhere, got {payout:?}"
        )));
    }
    Ok(())
}

/// Serializes a map as a key-sorted list of `[key, value]` pairs.
mod sorted_entries {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S, K, V>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        K: Serialize,
        V: Serialize,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        D: Deserializer<'de>,
        K: DeserializeOwned + Ord,
        V: DeserializeOwned,
    {
        let entries = Vec::<(K, V)>::deserialize(deserializer)?;
        Ok(entries.into_iter().collect())
    }
}
