// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::domain::constants::{
    BOUNDARY_POLL_CEILING, BOUNDARY_POLL_FLOOR, BOUNDARY_WAIT_THRESHOLD_SECS,
};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub type NowFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Wall clock in unix seconds plus the window arithmetic built on it.
#[derive(Clone)]
pub struct WindowClock {
    now: NowFn,
    window_end_override: Option<u64>,
}

fn system_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl WindowClock {
    pub fn system(window_end_override: Option<u64>) -> Self {
        Self::with_now(Arc::new(system_now), window_end_override)
    }

    pub fn with_now(now: NowFn, window_end_override: Option<u64>) -> Self {
        Self {
            now,
            window_end_override,
        }
    }

    pub fn fixed(now: u64) -> Self {
        Self::with_now(Arc::new(move || now), None)
    }

    pub fn now(&self) -> u64 {
        (self.now)()
    }

    pub fn current_window(&self, duration: u64) -> u64 {
        self.now() / duration.max(1)
    }

    /// End of the current window, unless overridden.
    pub fn next_boundary(&self, duration: u64) -> u64 {
        match self.window_end_override {
            Some(end) => end,
            None => self
                .current_window(duration)
                .saturating_add(1)
                .saturating_mul(duration.max(1)),
        }
    }

    pub fn secs_until(&self, instant: u64) -> u64 {
        instant.saturating_sub(self.now())
    }

    pub fn boundary_imminent(&self, duration: u64) -> bool {
        self.secs_until(self.next_boundary(duration)) <= BOUNDARY_WAIT_THRESHOLD_SECS
    }

    /// Poll until `target`. Targets further out than the boundary-wait
    /// threshold are not waited for.
    pub async fn wait_until(&self, target: u64) {
        let remaining = self.secs_until(target);
        if remaining > BOUNDARY_WAIT_THRESHOLD_SECS {
            tracing::warn!(target: "scheduler", remaining, "Boundary too far out, not waiting");
            return;
        }
        tracing::info!(target: "scheduler", target, remaining, "Waiting for window boundary");
        loop {
            let remaining = self.secs_until(target);
            if remaining == 0 {
                return;
            }
            tokio::time::sleep(poll_interval(remaining)).await;
        }
    }
}

/// A quarter of the remaining time, kept within the poll floor and ceiling.
pub fn poll_interval(remaining_secs: u64) -> Duration {
    (Duration::from_secs(remaining_secs) / 4).clamp(BOUNDARY_POLL_FLOOR, BOUNDARY_POLL_CEILING)
}
