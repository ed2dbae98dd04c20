// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const NOISY_MODULES: &[&str] = &[
    "h2",
    "hyper",
    "hyper_util",
    "reqwest",
    "rustls",
    "alloy_transport_http",
    "alloy_rpc_client",
];

/// A bare level (e.g. "debug") gets quiet defaults for the transport stack.
/// Directive strings (with ',' or '=') are respected as-is.
fn filter_spec(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.contains(',') || normalized.contains('=') {
        return normalized.to_string();
    }
    let base = if normalized.is_empty() {
        "info"
    } else {
        normalized
    };
    let mut spec = base.to_string();
    for module in NOISY_MODULES {
        spec.push_str(&format!(",{module}=info"));
    }
    spec
}

pub fn setup_logging(log_level: &str, json_format: bool) {
    let spec = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| filter_spec(log_level));
    let filter = EnvFilter::from_str(&spec).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false);
        subscriber.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).init();
    }

    tracing::info!(
        filter = %spec,
        format = if json_format { "json" } else { "compact" },
        "Logging initialized"
    );
}
