// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Mnemos integration tests.
//!
//! Provides mock service adapters and a harness for fast, deterministic,
//! CI-runnable tests without network access.
//!
//! # Components
//!
//! - [`MockProvider`] - text-generation adapter replaying queued responses
//! - [`MockEmbedder`] - embedding adapter with pinned or hash-derived vectors
//! - [`TestHarness`] - a [`ContextMemory`](mnemos_memory::ContextMemory) over an in-memory database

pub mod harness;
pub mod mock_embedder;
pub mod mock_provider;

pub use harness::TestHarness;
pub use mock_embedder::MockEmbedder;
pub use mock_provider::{MockProvider, extraction_response, text_response, tool_call_response};
