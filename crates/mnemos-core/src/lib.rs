// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Mnemos memory engine.
//!
//! This crate provides the error type, the adapter traits for the two
//! external services (text generation and embeddings), and the
//! wire-neutral request/response types those traits exchange.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MnemosError;
pub use types::{AdapterType, HealthStatus, Role};

pub use traits::{EmbeddingAdapter, PluginAdapter, ProviderAdapter};
