// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::data_path::{resolve_data_path, resolve_default_data_file};
use crate::domain::constants;
use crate::domain::error::AppError;
use alloy::primitives::{Address, U256};
use alloy::signers::local::PrivateKeySigner;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

const REDACTED: &str = "<redacted>";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GlobalSettings {
    // General
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub log_json: bool,

    // Connectivity
    pub http_provider: String,
    pub universe_address: Address,
    pub crowdsourcer_factory_address: Address,
    /// Defaults to the wallet address.
    pub fee_recipient_address: Option<Address>,

    // Identity
    pub wallet_key: String,
    pub wallet_address: Address,

    // Gas policy
    #[serde(default = "default_min_gas")]
    pub min_gas_price_gwei: u64,
    #[serde(default = "default_max_gas")]
    pub max_gas_price_gwei: u64,
    /// Share of the projected fee we are willing to burn on gas, in (0, 1].
    #[serde(default = "default_aggressiveness")]
    pub aggressiveness: f64,
    #[serde(default = "default_dispute_gas_units")]
    pub dispute_gas_units: u64,

    // Discovery
    /// Decimal or 0x-hex amount of protocol-token atto units.
    #[serde(default = "default_min_pool_stake")]
    pub min_pool_stake_atto: String,

    // State
    pub state_path: Option<String>,
    pub data_dir: Option<String>,

    // Scheduling
    /// Unix seconds. Replaces the computed window boundary; meant for test networks.
    pub window_end_override: Option<u64>,
    #[serde(default = "default_iteration_interval_secs")]
    pub iteration_interval_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    #[serde(default = "default_receipt_timeout_ms")]
    pub receipt_timeout_ms: u64,

    // Pricing
    #[serde(default = "default_price_symbol")]
    pub price_symbol: String,
    #[serde(default = "default_price_api_url")]
    pub price_api_url: String,
}

// Defaults
fn default_min_gas() -> u64 {
    1
}
fn default_max_gas() -> u64 {
    500
}
fn default_aggressiveness() -> f64 {
    0.5
}
fn default_dispute_gas_units() -> u64 {
    constants::DEFAULT_DISPUTE_GAS_UNITS
}
fn default_min_pool_stake() -> String {
    "0".to_string()
}
fn default_iteration_interval_secs() -> u64 {
    10
}
fn default_cooldown_secs() -> u64 {
    10
}
fn default_max_concurrent_queries() -> usize {
    16
}
fn default_receipt_timeout_ms() -> u64 {
    120_000
}
fn default_price_symbol() -> String {
    "REPETH".to_string()
}
fn default_price_api_url() -> String {
    "https://api.binance.com/api/v3/ticker/price".to_string()
}

/// The only keys the state commands need.
#[derive(Debug, Default, Deserialize)]
struct StateLocation {
    state_path: Option<String>,
    data_dir: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `DATA_DIR` from the environment wins over the configured directory.
fn effective_data_dir(configured: Option<&str>) -> Option<String> {
    non_blank(std::env::var("DATA_DIR").ok().as_deref()).or_else(|| non_blank(configured))
}

fn resolve_state_path(state_path: Option<&str>, data_dir: Option<&str>) -> PathBuf {
    let data_dir = effective_data_dir(data_dir);
    match non_blank(state_path) {
        Some(raw) => resolve_data_path(&raw, data_dir.as_deref()),
        None => resolve_default_data_file(constants::DEFAULT_STATE_FILE, data_dir.as_deref()),
    }
}

fn sources(path: Option<&str>) -> ConfigBuilder<DefaultState> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();
    if let Some(selected_path) = path {
        builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
    } else {
        builder = builder.add_source(File::with_name("config").required(false));
    }
    // Deterministic precedence: env/.env > selected file.
    builder.add_source(Environment::default())
}

impl GlobalSettings {
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        let settings: GlobalSettings = sources(path).build()?.try_deserialize()?;
        settings.validate()?;
        tracing::debug!(target: "config", path = ?path, "Settings loaded");
        Ok(settings)
    }

    /// State file location from the same sources as [`Self::load_with_path`],
    /// without requiring or validating the rest of the settings.
    pub fn locate_state(path: Option<&str>) -> Result<PathBuf, AppError> {
        let location: StateLocation = sources(path).build()?.try_deserialize()?;
        Ok(resolve_state_path(
            location.state_path.as_deref(),
            location.data_dir.as_deref(),
        ))
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let signer = self.signer()?;
        if signer.address() != self.wallet_address {
            return Err(AppError::Validation {
                field: "wallet_address".into(),
                message: format!(
                    "wallet key controls {:#x}, configured {:#x}",
                    signer.address(),
                    self.wallet_address
                ),
            });
        }
        if !(self.aggressiveness > 0.0 && self.aggressiveness <= 1.0) {
            return Err(AppError::Validation {
                field: "aggressiveness".into(),
                message: format!("must be in (0, 1], got {}", self.aggressiveness),
            });
        }
        if self.min_gas_price_gwei > self.max_gas_price_gwei {
            return Err(AppError::Validation {
                field: "min_gas_price_gwei".into(),
                message: format!(
                    "min {} exceeds max {}",
                    self.min_gas_price_gwei, self.max_gas_price_gwei
                ),
            });
        }
        if self.dispute_gas_units == 0 {
            return Err(AppError::Validation {
                field: "dispute_gas_units".into(),
                message: "must be positive".into(),
            });
        }
        Url::parse(self.http_provider.trim()).map_err(|e| AppError::Validation {
            field: "http_provider".into(),
            message: e.to_string(),
        })?;
        self.min_pool_stake()?;
        Ok(())
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, AppError> {
        let key = self.wallet_key.trim();
        if key.is_empty() {
            return Err(AppError::Config("WALLET_KEY is missing".to_string()));
        }
        PrivateKeySigner::from_str(key.trim_start_matches("0x"))
            .map_err(|e| AppError::Config(format!("WALLET_KEY is not a private key: {e}")))
    }

    pub fn fee_recipient(&self) -> Address {
        self.fee_recipient_address.unwrap_or(self.wallet_address)
    }

    pub fn min_pool_stake(&self) -> Result<U256, AppError> {
        let raw = self.min_pool_stake_atto.trim();
        let parsed = match raw.strip_prefix("0x") {
            Some(hex) => U256::from_str_radix(hex, 16),
            None => U256::from_str_radix(raw, 10),
        };
        parsed.map_err(|e| AppError::Validation {
            field: "min_pool_stake_atto".into(),
            message: format!("'{raw}': {e}"),
        })
    }

    pub fn min_gas_price_wei(&self) -> u128 {
        constants::gwei_to_wei(self.min_gas_price_gwei)
    }

    pub fn max_gas_price_wei(&self) -> u128 {
        constants::gwei_to_wei(self.max_gas_price_gwei)
    }

    /// Configured state file, or `state.json` inside the data dir.
    pub fn state_path(&self) -> PathBuf {
        resolve_state_path(self.state_path.as_deref(), self.data_dir.as_deref())
    }

    pub fn iteration_interval(&self) -> Duration {
        Duration::from_secs(self.iteration_interval_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms.max(1_000))
    }

    pub fn log_level(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }

    /// Pretty JSON of the effective settings with the wallet key masked.
    pub fn redacted_json(&self) -> Result<String, AppError> {
        let mut shown = self.clone();
        shown.wallet_key = REDACTED.to_string();
        serde_json::to_string_pretty(&shown)
            .map_err(|e| AppError::Config(format!("settings encode failed: {e}")))
    }
}
