// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

//! Iteration engine: discovery, lifecycle tracking, fee collection, pruning
//! and dispute funding, sequenced by the [`scheduler::Scheduler`].

pub mod cleanup;
pub mod discovery;
pub mod evaluator;
pub mod fees;
pub mod lifecycle;
pub mod safety;
pub mod scheduler;
pub mod window;

use crate::app::config::GlobalSettings;
use crate::domain::error::AppError;
use alloy::primitives::{Address, U256};
use std::time::Duration;

/// Operator policy shared by the phases, resolved once from settings.
#[derive(Debug, Clone)]
pub struct Policy {
    pub universe: Address,
    pub fee_recipient: Address,
    pub min_pool_stake: U256,
    /// Wei per gas unit.
    pub min_gas_price: u128,
    pub max_gas_price: u128,
    pub aggressiveness: f64,
    pub dispute_gas_units: u64,
    pub cooldown: Duration,
    pub iteration_interval: Duration,
}

impl Policy {
    pub fn from_settings(settings: &GlobalSettings) -> Result<Self, AppError> {
        Ok(Self {
            universe: settings.universe_address,
            fee_recipient: settings.fee_recipient(),
            min_pool_stake: settings.min_pool_stake()?,
            min_gas_price: settings.min_gas_price_wei(),
            max_gas_price: settings.max_gas_price_wei(),
            aggressiveness: settings.aggressiveness,
            dispute_gas_units: settings.dispute_gas_units,
            cooldown: settings.cooldown(),
            iteration_interval: settings.iteration_interval(),
        })
    }
}
