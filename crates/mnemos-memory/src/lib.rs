// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term conversational memory for the Mnemos engine.
//!
//! New conversation turns pass through a three-stage pipeline:
//!
//! - **Extraction**: one JSON-mode completion proposes semantic facts and
//!   episodic bubbles
//! - **Reconciliation**: each fact is compared with its nearest stored
//!   neighbours and the model picks add, update, delete or noop
//! - **Bubbles**: each bubble is stored and linked to similar bubbles in a
//!   symmetric connection graph
//!
//! Retrieval ranks memories by `similarity × importance × recency` and
//! follows the connection graph for related context. [`ContextMemory`] ties
//! the stages together.

pub mod bubbles;
pub mod embedding;
pub mod extractor;
pub mod memory;
pub mod reconcile;
pub mod retriever;
pub mod similarity;
pub mod store;
pub mod summary;
pub mod types;

pub use embedding::EmbeddingGateway;
pub use memory::ContextMemory;
pub use reconcile::ReconciliationAction;
pub use similarity::cosine_similarity;
pub use store::{MemoryStore, MemoryTxn};
pub use types::*;
