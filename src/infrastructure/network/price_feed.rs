// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const CACHE_TTL: Duration = Duration::from_secs(60);

/// Price of one protocol token in the pricing asset (the gas currency).
#[async_trait]
pub trait ExchangeRateSource: Send + Sync {
    async fn rate(&self) -> Result<f64, AppError>;
}

#[derive(Deserialize, Debug)]
struct TickerResponse {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Clone, Debug)]
pub struct PriceQuote {
    pub price: f64,
}

/// Ticker-endpoint price feed with a short-lived cache.
#[derive(Clone)]
pub struct PriceFeed {
    client: Client,
    api_url: String,
    symbol: String,
    cache: Arc<RwLock<Option<(PriceQuote, Instant)>>>,
}

impl PriceFeed {
    pub fn new(api_url: &str, symbol: &str) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| AppError::Initialization(format!("price client build failed: {e}")))?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            symbol: normalize_symbol(symbol),
            cache: Arc::new(RwLock::new(None)),
        })
    }

    pub async fn get_price(&self) -> Result<PriceQuote, AppError> {
        {
            let read_guard = self.cache.read().await;
            if let Some((quote, fetched_at)) = read_guard.as_ref()
                && fetched_at.elapsed() < CACHE_TTL
            {
                return Ok(quote.clone());
            }
        }

        let url = format!("{}?symbol={}", self.api_url, self.symbol);
        let client = self.client.clone();
        let resp = retry_async(
            move |_| {
                let client = client.clone();
                let url = url.clone();
                async move { client.get(&url).send().await }
            },
            3,
            Duration::from_millis(200),
        )
        .await
        .map_err(|e| AppError::Connection(format!("price request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::ApiCall {
                provider: self.api_url.clone(),
                status: resp.status().as_u16(),
            });
        }
        let ticker: TickerResponse = resp.json().await.map_err(|_| AppError::ApiCall {
            provider: format!("{} JSON", self.api_url),
            status: 0,
        })?;
        let price = parse_price(&ticker.price)?;
        let quote = PriceQuote { price };
        tracing::debug!(target: "price", symbol = %self.symbol, price, "Fetched exchange rate");
        *self.cache.write().await = Some((quote.clone(), Instant::now()));
        Ok(quote)
    }
}

#[async_trait]
impl ExchangeRateSource for PriceFeed {
    async fn rate(&self) -> Result<f64, AppError> {
        Ok(self.get_price().await?.price)
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn parse_price(raw: &str) -> Result<f64, AppError> {
    let price: f64 = raw.trim().parse().map_err(|_| AppError::Validation {
        field: "price".into(),
        message: format!("unparseable price '{raw}'"),
    })?;
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::Validation {
            field: "price".into(),
            message: format!("price must be positive, got {price}"),
        });
    }
    Ok(price)
}
