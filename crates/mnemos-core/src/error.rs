// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Mnemos memory engine.

use thiserror::Error;

/// The primary error type used across all Mnemos adapter traits and core operations.
#[derive(Debug, Error)]
pub enum MnemosError {
    /// Configuration errors (invalid TOML, missing API key, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database open, query failure, migration failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Text-generation service errors (network, auth, quota, malformed response).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Embedding service errors (network, auth, quota, empty output).
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An explicitly addressed memory does not exist.
    #[error("memory {memory_id} not found")]
    NotFound { memory_id: i64 },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemosError {
    /// Builds a [`MnemosError::Provider`] without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        MnemosError::Provider {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a [`MnemosError::Embedding`] without an underlying source.
    pub fn embedding(message: impl Into<String>) -> Self {
        MnemosError::Embedding {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when the error came from one of the external services.
    pub fn is_external_service(&self) -> bool {
        matches!(
            self,
            MnemosError::Provider { .. } | MnemosError::Embedding { .. } | MnemosError::Timeout { .. }
        )
    }
}
