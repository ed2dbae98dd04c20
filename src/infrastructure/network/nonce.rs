// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::network::provider::HttpProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Hands out sequential nonces to concurrent submissions from one account.
#[derive(Clone)]
pub struct NonceManager {
    provider: HttpProvider,
    address: Address,
    next: Arc<Mutex<Option<u64>>>,
}

impl NonceManager {
    pub fn new(provider: HttpProvider, address: Address) -> Self {
        Self {
            provider,
            address,
            next: Arc::new(Mutex::new(None)),
        }
    }

    async fn fetch_pending(&self) -> Result<u64, AppError> {
        let provider = self.provider.clone();
        let address = self.address;
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_transaction_count(address).pending().await }
            },
            3,
            Duration::from_millis(100),
        )
        .await
        .map_err(|e| AppError::Connection(format!("Failed to fetch nonce: {}", e)))
    }

    async fn allocate<F, Fut>(&self, fetch: F) -> Result<u64, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, AppError>>,
    {
        let mut guard = self.next.lock().await;
        let nonce = match *guard {
            Some(n) => n,
            None => {
                let pending = fetch().await?;
                tracing::debug!(target: "rpc", nonce = pending, "Nonce synced from pending count");
                pending
            }
        };
        *guard = Some(nonce.saturating_add(1));
        Ok(nonce)
    }

    pub async fn next_nonce(&self) -> Result<u64, AppError> {
        self.allocate(|| self.fetch_pending()).await
    }

    /// Forget the local counter after a failed broadcast or a missing receipt.
    /// The next allocation re-reads the pending count, which reuses the nonce
    /// of a dropped transaction and skips one that is still in flight.
    pub async fn invalidate(&self) {
        *self.next.lock().await = None;
    }
}
