// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use super::Policy;
use super::discovery::Rejections;
use super::safety::FailureBackoff;
use super::window::WindowClock;
use super::{cleanup, discovery, evaluator, fees, lifecycle};
use crate::data::schema::Snapshot;
use crate::data::snapshot::SnapshotStore;
use crate::domain::constants::{
    BOUNDARY_LEAD_SECS, BOUNDARY_SETTLE_SECS, BOUNDARY_WAIT_THRESHOLD_SECS,
    FEE_COLLECTION_QUIET_SECS,
};
use crate::domain::error::AppError;
use crate::network::chain::ChainClient;
use crate::network::price_feed::ExchangeRateSource;
use std::sync::Arc;

/// Owns the snapshot and drives the phases, persisting after each one.
pub struct Scheduler {
    chain: Arc<dyn ChainClient>,
    rates: Arc<dyn ExchangeRateSource>,
    policy: Policy,
    clock: WindowClock,
    store: SnapshotStore,
    snapshot: Snapshot,
    backoff: FailureBackoff,
    rejections: Rejections,
    last_duration: Option<u64>,
}

impl Scheduler {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        rates: Arc<dyn ExchangeRateSource>,
        policy: Policy,
        clock: WindowClock,
        store: SnapshotStore,
        snapshot: Snapshot,
    ) -> Self {
        Self {
            chain,
            rates,
            policy,
            clock,
            store,
            snapshot,
            backoff: FailureBackoff::default(),
            rejections: Rejections::default(),
            last_duration: None,
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    async fn commit(&mut self, phase: &'static str, next: Snapshot) -> Result<(), AppError> {
        self.snapshot = next;
        let written = self.store.persist(&self.snapshot).await?;
        tracing::debug!(target: "scheduler", phase, written, "Phase complete");
        Ok(())
    }

    /// One pass over every phase. A failing phase leaves the snapshot as the
    /// previous phase committed it.
    pub async fn run_iteration(&mut self) -> Result<(), AppError> {
        let duration = self.chain.window_duration().await?;
        self.last_duration = Some(duration);
        let current_window = self.clock.current_window(duration);
        tracing::debug!(target: "scheduler", current_window, duration, "Window");

        let next = discovery::discover(
            self.chain.clone(),
            &self.policy,
            self.snapshot.clone(),
            current_window,
            &mut self.rejections,
        )
        .await?;
        self.commit("discover", next).await?;

        let next = lifecycle::update_lifecycle(
            self.chain.as_ref(),
            self.snapshot.clone(),
            duration,
            self.clock.now(),
        )
        .await?;
        self.commit("lifecycle", next).await?;

        let until_boundary = self.clock.secs_until(self.clock.next_boundary(duration));
        if until_boundary > FEE_COLLECTION_QUIET_SECS {
            let next = fees::collect_fees(
                self.chain.as_ref(),
                &self.policy,
                self.snapshot.clone(),
                current_window,
            )
            .await?;
            self.commit("fees", next).await?;
        } else {
            tracing::debug!(target: "scheduler", until_boundary, "Window end near, skipping fee collection");
        }

        let next = cleanup::prune_pools(self.snapshot.clone(), current_window);
        self.commit("prune-pools", next).await?;
        let next = cleanup::prune_markets(self.snapshot.clone());
        self.commit("prune-markets", next).await?;

        let next = evaluator::evaluate_and_execute(
            self.chain.as_ref(),
            self.rates.as_ref(),
            &self.policy,
            &self.clock,
            self.snapshot.clone(),
            duration,
        )
        .await?;
        self.commit("execute", next).await
    }

    /// Sleep between iterations. Near a boundary, wake just before it instead;
    /// once inside the lead, wait until just past it.
    pub async fn pause(&self) {
        if let Some(duration) = self.last_duration {
            let boundary = self.clock.next_boundary(duration);
            let remaining = self.clock.secs_until(boundary);
            if (1..=BOUNDARY_WAIT_THRESHOLD_SECS).contains(&remaining) {
                let wake = if remaining > BOUNDARY_LEAD_SECS {
                    boundary - BOUNDARY_LEAD_SECS
                } else {
                    boundary.saturating_add(BOUNDARY_SETTLE_SECS)
                };
                self.clock.wait_until(wake).await;
                return;
            }
        }
        tokio::time::sleep(self.policy.iteration_interval).await;
    }

    /// Supervisor loop. Iteration errors are logged and retried with backoff.
    pub async fn run_forever(mut self) {
        let mut iteration: u64 = 0;
        tracing::info!(target: "scheduler", "Starting, {}", self.snapshot.summary());
        loop {
            tracing::info!(target: "scheduler", iteration, "Running iteration");
            match self.run_iteration().await {
                Ok(()) => {
                    self.backoff.report_success();
                    tracing::info!(
                        target: "scheduler",
                        iteration,
                        "Finished iteration, {}",
                        self.snapshot.summary()
                    );
                    self.pause().await;
                }
                Err(e) => {
                    let delay = self.backoff.report_failure();
                    if e.is_invariant() {
                        tracing::error!(
                            target: "scheduler",
                            iteration,
                            error = %e,
                            "Iteration aborted on invariant violation"
                        );
                    } else {
                        tracing::error!(
                            target: "scheduler",
                            iteration,
                            error = %e,
                            failures = self.backoff.consecutive_failures(),
                            retry_in_secs = delay.as_secs(),
                            "Iteration failed"
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
            }
            iteration = iteration.wrapping_add(1);
        }
    }
}
