// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end pipeline tests.
//!
//! `TestHarness` assembles a [`ContextMemory`] over an in-memory SQLite
//! database with mock services, and keeps handles to the mocks so tests
//! can script responses and inspect requests.

use std::sync::Arc;

use mnemos_config::MemoryConfig;
use mnemos_core::MnemosError;
use mnemos_core::types::ProviderResponse;
use mnemos_memory::{ContextMemory, MemoryRecord, MemoryStore};
use mnemos_storage::Database;

use crate::mock_embedder::MockEmbedder;
use crate::mock_provider::MockProvider;

/// Default dimensionality of the harness embedder.
const DEFAULT_DIMENSIONS: usize = 8;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<ProviderResponse>,
    embedder: Option<MockEmbedder>,
    config: MemoryConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            embedder: None,
            config: MemoryConfig::default(),
        }
    }

    /// Set the provider's scripted responses.
    pub fn with_responses(mut self, responses: Vec<ProviderResponse>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_embedder(mut self, embedder: MockEmbedder) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_config(mut self, config: MemoryConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Result<TestHarness, MnemosError> {
        let db = Database::open_in_memory().await?;
        let store = MemoryStore::new(db);
        let provider = Arc::new(MockProvider::with_responses(self.responses));
        let embedder = Arc::new(
            self.embedder
                .unwrap_or_else(|| MockEmbedder::new(DEFAULT_DIMENSIONS)),
        );
        let memory = ContextMemory::new(
            store.clone(),
            provider.clone(),
            embedder.clone(),
            self.config,
        );
        Ok(TestHarness {
            memory,
            store,
            provider,
            embedder,
        })
    }
}

/// A fully wired memory engine with mock services.
pub struct TestHarness {
    pub memory: ContextMemory,
    pub store: MemoryStore,
    pub provider: Arc<MockProvider>,
    pub embedder: Arc<MockEmbedder>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with defaults and no scripted responses.
    pub async fn new() -> Result<Self, MnemosError> {
        Self::builder().build().await
    }

    /// Active memories of a conversation, in id order.
    pub async fn memories(&self, conversation_id: i64) -> Result<Vec<MemoryRecord>, MnemosError> {
        self.store.list_active(conversation_id).await
    }
}
