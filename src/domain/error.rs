// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: String, reason: String },

    #[error("External API error: {provider} responded with {status}")]
    ApiCall { provider: String, status: u16 },

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Snapshot persistence failed: {0}")]
    Persistence(String),

    #[error(transparent)]
    Shared(#[from] Arc<AppError>),

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Invariant violations point at a bug rather than a transient condition.
    pub fn is_invariant(&self) -> bool {
        match self {
            AppError::Invariant(_) => true,
            AppError::Shared(inner) => inner.is_invariant(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
