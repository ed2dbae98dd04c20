// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

pub mod augur;
pub mod chain;
pub mod nonce;
pub mod price_feed;
pub mod provider;

#[cfg(test)]
pub mod fake;
