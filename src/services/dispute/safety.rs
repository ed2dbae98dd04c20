// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::constants::{FAILURE_BACKOFF_BASE, FAILURE_BACKOFF_CEILING};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Tracks consecutive iteration failures and derives the retry delay.
pub struct FailureBackoff {
    consecutive_failures: AtomicUsize,
    base: Duration,
    ceiling: Duration,
}

impl Default for FailureBackoff {
    fn default() -> Self {
        Self::new(FAILURE_BACKOFF_BASE, FAILURE_BACKOFF_CEILING)
    }
}

impl FailureBackoff {
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            consecutive_failures: AtomicUsize::new(0),
            base,
            ceiling,
        }
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn report_success(&self) {
        let previous = self.consecutive_failures.swap(0, Ordering::Relaxed);
        if previous > 0 {
            tracing::info!(target: "scheduler", previous, "Recovered after failures");
        }
    }

    /// Delay before the next attempt: base doubled per prior failure, capped.
    pub fn report_failure(&self) -> Duration {
        let prior = self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        let factor = 1u32.checked_shl(prior.min(31) as u32).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.ceiling)
    }
}
