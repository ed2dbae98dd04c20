// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::common::retry::retry_async;
use crate::data::abi::{
    ICrowdsourcer, ICrowdsourcerFactory, IDisputer, IFeeWindow, IMarket, IReportingParticipant,
    IUniverse,
};
use crate::domain::constants::FEE_WITHDRAWAL_GAS_LIMIT;
use crate::network::chain::{
    ChainClient, DisputeView, FoundPool, MarketInfo, PoolParams, PoolStatus,
};
use crate::network::nonce::NonceManager;
use crate::network::provider::HttpProvider;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

const READ_ATTEMPTS: usize = 3;
const READ_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone)]
pub struct AugurAddresses {
    pub universe: Address,
    pub crowdsourcer_factory: Address,
    pub fee_recipient: Address,
}

/// `ChainClient` backed by an alloy provider and a local signer.
pub struct AugurChain {
    provider: HttpProvider,
    wallet: EthereumWallet,
    sender: Address,
    chain_id: u64,
    addresses: AugurAddresses,
    dispute_gas_units: u64,
    nonces: NonceManager,
    permits: Arc<Semaphore>,
    receipt_timeout: Duration,
}

impl AugurChain {
    pub async fn new(
        provider: HttpProvider,
        signer: PrivateKeySigner,
        addresses: AugurAddresses,
        dispute_gas_units: u64,
        max_concurrent_queries: usize,
        receipt_timeout: Duration,
    ) -> Result<Self, AppError> {
        let chain_id = provider
            .get_chain_id()
            .await
            .map_err(|e| AppError::Connection(format!("chain_id detect failed: {e}")))?;
        let sender = signer.address();
        tracing::info!(target: "rpc", chain_id, sender = %sender, universe = %addresses.universe, "Connected to node");
        Ok(Self {
            nonces: NonceManager::new(provider.clone(), sender),
            provider,
            wallet: EthereumWallet::from(signer),
            sender,
            chain_id,
            addresses,
            dispute_gas_units,
            permits: Arc::new(Semaphore::new(max_concurrent_queries.max(1))),
            receipt_timeout,
        })
    }

    async fn read<T, F, Fut>(&self, what: &str, op: F) -> Result<T, AppError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, alloy::contract::Error>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AppError::Connection(format!("query limiter closed: {e}")))?;
        retry_async(op, READ_ATTEMPTS, READ_BACKOFF)
            .await
            .map_err(|e| AppError::Connection(format!("{what} failed: {e}")))
    }

    async fn submit(
        &self,
        to: Address,
        input: Vec<u8>,
        gas_limit: u64,
        gas_price: u128,
        what: &str,
    ) -> Result<B256, AppError> {
        let nonce = self.nonces.next_nonce().await?;
        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(Bytes::from(input))
            .with_chain_id(self.chain_id)
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price);
        tx.from = Some(self.sender);
        let envelope = tx.build(&self.wallet).await.map_err(|e| AppError::Transaction {
            hash: String::new(),
            reason: format!("{what} signing failed: {e}"),
        })?;
        let raw = envelope.encoded_2718();

        let pending = match self.provider.send_raw_transaction(&raw).await {
            Ok(pending) => pending,
            Err(e) => {
                self.nonces.invalidate().await;
                return Err(AppError::Transaction {
                    hash: String::new(),
                    reason: format!("{what} broadcast failed: {e}"),
                });
            }
        };
        let hash = *pending.tx_hash();
        tracing::info!(target: "executor", tx = %hash, nonce, to = %to, "{what} submitted");

        let receipt = match pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                // The transaction may have been dropped; later nonces would queue behind it.
                self.nonces.invalidate().await;
                return Err(AppError::Transaction {
                    hash: format!("{hash:#x}"),
                    reason: format!("{what} receipt failed: {e}"),
                });
            }
        };
        if !receipt.status() {
            return Err(AppError::Transaction {
                hash: format!("{hash:#x}"),
                reason: format!("{what} reverted"),
            });
        }
        Ok(hash)
    }
}

fn to_u64(value: U256, field: &str) -> Result<u64, AppError> {
    u64::try_from(value).map_err(|_| AppError::Validation {
        field: field.to_string(),
        message: format!("{value} does not fit in 64 bits"),
    })
}

fn non_zero(address: Address) -> Option<Address> {
    (!address.is_zero()).then_some(address)
}

#[async_trait]
impl ChainClient for AugurChain {
    async fn window_duration(&self) -> Result<u64, AppError> {
        let universe = IUniverse::new(self.addresses.universe, self.provider.clone());
        let secs = self
            .read("getDisputeRoundDurationInSeconds", move |_| {
                let universe = universe.clone();
                async move { universe.getDisputeRoundDurationInSeconds().call().await }
            })
            .await?;
        let secs = to_u64(secs, "window_duration")?;
        if secs == 0 {
            return Err(AppError::Validation {
                field: "window_duration".into(),
                message: "universe reports a zero-length window".into(),
            });
        }
        Ok(secs)
    }

    async fn market_info(&self, market: Address) -> Result<MarketInfo, AppError> {
        let contract = IMarket::new(market, self.provider.clone());
        let (c1, c2, c3, c4) = (
            contract.clone(),
            contract.clone(),
            contract.clone(),
            contract,
        );
        let (universe, num_outcomes, num_ticks, window) = tokio::try_join!(
            self.read("getUniverse", move |_| {
                let c = c1.clone();
                async move { c.getUniverse().call().await }
            }),
            self.read("getNumberOfOutcomes", move |_| {
                let c = c2.clone();
                async move { c.getNumberOfOutcomes().call().await }
            }),
            self.read("getNumTicks", move |_| {
                let c = c3.clone();
                async move { c.getNumTicks().call().await }
            }),
            self.read("getFeeWindow", move |_| {
                let c = c4.clone();
                async move { c.getFeeWindow().call().await }
            }),
        )?;
        Ok(MarketInfo {
            universe,
            num_outcomes: to_u64(num_outcomes, "num_outcomes")?,
            num_ticks: to_u64(num_ticks, "num_ticks")?,
            window: non_zero(window),
        })
    }

    async fn market_window(&self, market: Address) -> Result<Option<Address>, AppError> {
        let contract = IMarket::new(market, self.provider.clone());
        let window = self
            .read("getFeeWindow", move |_| {
                let c = contract.clone();
                async move { c.getFeeWindow().call().await }
            })
            .await?;
        Ok(non_zero(window))
    }

    async fn window_end_time(&self, window: Address) -> Result<u64, AppError> {
        let contract = IFeeWindow::new(window, self.provider.clone());
        let end = self
            .read("getEndTime", move |_| {
                let c = contract.clone();
                async move { c.getEndTime().call().await }
            })
            .await?;
        to_u64(end, "window_end_time")
    }

    async fn find_pool(
        &self,
        window_id: u64,
        start_index: u64,
        min_stake: U256,
        exclude: &[Address],
    ) -> Result<Option<FoundPool>, AppError> {
        let factory =
            ICrowdsourcerFactory::new(self.addresses.crowdsourcer_factory, self.provider.clone());
        let exclude = exclude.to_vec();
        let found = self
            .read("findCrowdsourcer", move |_| {
                let factory = factory.clone();
                let exclude = exclude.clone();
                async move {
                    factory
                        .findCrowdsourcer(
                            U256::from(window_id),
                            U256::from(start_index),
                            min_stake,
                            exclude,
                        )
                        .call()
                        .await
                }
            })
            .await?;
        let Some(pool) = non_zero(found.crowdsourcer) else {
            return Ok(None);
        };
        Ok(Some(FoundPool {
            index: to_u64(found.foundIndex, "pool_index")?,
            pool,
        }))
    }

    async fn pool_params(&self, pool: Address) -> Result<PoolParams, AppError> {
        let contract = ICrowdsourcer::new(pool, self.provider.clone());
        let for_disputer = contract.clone();
        let (params, disputer) = tokio::try_join!(
            self.read("getDisputerParams", move |_| {
                let c = contract.clone();
                async move { c.getDisputerParams().call().await }
            }),
            self.read("getDisputer", move |_| {
                let c = for_disputer.clone();
                async move { c.getDisputer().call().await }
            }),
        )?;
        let payout = params
            .payoutNumerators
            .iter()
            .map(|v| to_u64(*v, "payout_vector"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PoolParams {
            market: params.market,
            window_id: to_u64(params.feeWindowId, "window_id")?,
            payout,
            invalid: params.invalid,
            disputer,
        })
    }

    async fn pool_status(&self, pool: Address, disputer: Address) -> Result<PoolStatus, AppError> {
        let crowdsourcer = ICrowdsourcer::new(pool, self.provider.clone());
        let disputer = IDisputer::new(disputer, self.provider.clone());
        let (c1, c2, c3) = (crowdsourcer.clone(), crowdsourcer.clone(), crowdsourcer);
        let (d1, d2) = (disputer.clone(), disputer);
        let (disputed, fees_collected, target_round, available_stake, fee_recipient) = tokio::try_join!(
            self.read("hasDisputed", move |_| {
                let d = d1.clone();
                async move { d.hasDisputed().call().await }
            }),
            self.read("isFeesCollected", move |_| {
                let c = c1.clone();
                async move { c.isFeesCollected().call().await }
            }),
            self.read("getTargetRound", move |_| {
                let c = c2.clone();
                async move { c.getTargetRound().call().await }
            }),
            self.read("getAvailableRep", move |_| {
                let c = c3.clone();
                async move { c.getAvailableRep().call().await }
            }),
            self.read("getFeeReceiver", move |_| {
                let d = d2.clone();
                async move { d.getFeeReceiver().call().await }
            }),
        )?;
        Ok(PoolStatus {
            disputed,
            fees_collected,
            target_round: to_u64(target_round, "target_round")?,
            available_stake,
            fee_recipient,
        })
    }

    async fn dispute_view(
        &self,
        market: Address,
        invalid: bool,
        payout: &[u64],
    ) -> Result<DisputeView, AppError> {
        let contract = IMarket::new(market, self.provider.clone());
        let numerators: Vec<U256> = payout.iter().map(|v| U256::from(*v)).collect();
        let (c1, c2, c3, c4) = (
            contract.clone(),
            contract.clone(),
            contract.clone(),
            contract.clone(),
        );
        let (round, total_stake, winner, our_hash) = tokio::try_join!(
            self.read("getNumParticipants", move |_| {
                let c = c1.clone();
                async move { c.getNumParticipants().call().await }
            }),
            self.read("getParticipantStake", move |_| {
                let c = c2.clone();
                async move { c.getParticipantStake().call().await }
            }),
            self.read("getWinningReportingParticipant", move |_| {
                let c = c3.clone();
                async move { c.getWinningReportingParticipant().call().await }
            }),
            self.read("derivePayoutDistributionHash", move |_| {
                let c = c4.clone();
                let numerators = numerators.clone();
                async move {
                    c.derivePayoutDistributionHash(numerators, invalid)
                        .call()
                        .await
                }
            }),
        )?;

        let leading = match non_zero(winner) {
            Some(winner) => {
                let participant = IReportingParticipant::new(winner, self.provider.clone());
                let winning_hash = self
                    .read("getPayoutDistributionHash", move |_| {
                        let p = participant.clone();
                        async move { p.getPayoutDistributionHash().call().await }
                    })
                    .await?;
                winning_hash == our_hash
            }
            None => false,
        };

        let ours = self
            .read("getCrowdsourcer", move |_| {
                let c = contract.clone();
                async move { c.getCrowdsourcer(our_hash).call().await }
            })
            .await?;
        let outcome_stake = match non_zero(ours) {
            Some(ours) => {
                let participant = IReportingParticipant::new(ours, self.provider.clone());
                self.read("getStake", move |_| {
                    let p = participant.clone();
                    async move { p.getStake().call().await }
                })
                .await?
            }
            None => U256::ZERO,
        };

        Ok(DisputeView {
            round: to_u64(round, "dispute_round")?,
            leading,
            total_stake,
            outcome_stake,
        })
    }

    async fn projected_fee(&self, pool: Address, contribution: U256) -> Result<U256, AppError> {
        let contract = ICrowdsourcer::new(pool, self.provider.clone());
        self.read("getProjectedFees", move |_| {
            let c = contract.clone();
            async move { c.getProjectedFees(contribution).call().await }
        })
        .await
    }

    async fn gas_price(&self) -> Result<u128, AppError> {
        let provider = self.provider.clone();
        retry_async(
            move |_| {
                let provider = provider.clone();
                async move { provider.get_gas_price().await }
            },
            READ_ATTEMPTS,
            READ_BACKOFF,
        )
        .await
        .map_err(|e| AppError::Connection(format!("gas price fetch failed: {e}")))
    }

    async fn fund_pool(
        &self,
        pool: Address,
        disputer: Address,
        gas_price: u128,
    ) -> Result<B256, AppError> {
        let input = IDisputer::disputeCall {
            feeReceiver: self.addresses.fee_recipient,
        }
        .abi_encode();
        let what = format!("dispute for pool {pool:#x}");
        self.submit(disputer, input, self.dispute_gas_units, gas_price, &what)
            .await
    }

    async fn collect_fees(&self, pool: Address, gas_price: u128) -> Result<B256, AppError> {
        let input = ICrowdsourcer::withdrawFeesCall {}.abi_encode();
        let what = format!("fee withdrawal for pool {pool:#x}");
        self.submit(pool, input, FEE_WITHDRAWAL_GAS_LIMIT, gas_price, &what)
            .await
    }
}
