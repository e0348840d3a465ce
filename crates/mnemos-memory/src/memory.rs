// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The [`ContextMemory`] facade: the public operations of the engine.

use std::sync::Arc;

use chrono::Utc;
use mnemos_config::MemoryConfig;
use mnemos_core::{EmbeddingAdapter, MnemosError, ProviderAdapter, Role};
use mnemos_storage::queries::messages;
use tracing::{debug, info};

use crate::bubbles::BubbleWriter;
use crate::embedding::EmbeddingGateway;
use crate::extractor::{ExtractionWindow, extract};
use crate::reconcile::Reconciler;
use crate::retriever::Retriever;
use crate::store::MemoryStore;
use crate::summary;
use crate::types::{
    AddOutcome, ConversationTurn, DeletedMemory, MemoryRecord, SearchOptions, SearchResponse,
};

/// Long-term memory for conversations.
///
/// Collaborators are injected once at construction; nothing is global.
#[derive(Clone)]
pub struct ContextMemory {
    store: MemoryStore,
    provider: Arc<dyn ProviderAdapter>,
    embeddings: EmbeddingGateway,
    config: MemoryConfig,
}

impl ContextMemory {
    pub fn new(
        store: MemoryStore,
        provider: Arc<dyn ProviderAdapter>,
        embedder: Arc<dyn EmbeddingAdapter>,
        config: MemoryConfig,
    ) -> Self {
        let embeddings = EmbeddingGateway::new(embedder, config.embedding_model.clone());
        Self {
            store,
            provider,
            embeddings,
            config,
        }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Consolidate new conversation turns into memory.
    ///
    /// Semantic facts are reconciled and committed first, then bubbles are
    /// created and connected in a second transaction. A service failure in
    /// the bubble stage leaves the committed semantic changes in place.
    pub async fn add(
        &self,
        turns: &[ConversationTurn],
        conversation_id: i64,
    ) -> Result<AddOutcome, MnemosError> {
        if turns.is_empty() {
            return Ok(AddOutcome::default());
        }

        let summary = summary::current_summary(self.store.database(), conversation_id).await?;
        let window = ExtractionWindow::from_turns(turns, summary, self.config.recent_turns);
        let extracted = extract(self.provider.as_ref(), &self.config, &window).await?;
        if extracted.is_empty() {
            debug!(conversation_id, "nothing worth remembering");
            return Ok(AddOutcome::default());
        }

        let bubbles: Vec<_> = extracted
            .bubbles
            .into_iter()
            .filter(|b| !b.text.trim().is_empty())
            .collect();
        let outcome = AddOutcome {
            semantic: extracted.semantic.clone(),
            bubbles: bubbles.iter().map(|b| b.text.trim().to_string()).collect(),
        };

        if !extracted.semantic.is_empty() {
            let txn = self.store.begin().await?;
            Reconciler::new(self.provider.as_ref(), &self.embeddings, &self.config)
                .reconcile(&txn, conversation_id, &extracted.semantic)
                .await?;
            txn.commit().await?;
        }

        if !bubbles.is_empty() {
            let txn = self.store.begin().await?;
            BubbleWriter::new(&self.embeddings, &self.config)
                .create_bubbles(&txn, conversation_id, &bubbles, Utc::now())
                .await?;
            txn.commit().await?;
        }

        info!(
            conversation_id,
            semantic = outcome.semantic.len(),
            bubbles = outcome.bubbles.len(),
            "memories consolidated"
        );
        Ok(outcome)
    }

    /// Ranked search over a conversation's active memories.
    pub async fn search(
        &self,
        query: &str,
        conversation_id: i64,
        options: SearchOptions,
    ) -> Result<SearchResponse, MnemosError> {
        Retriever::new(&self.store, &self.embeddings, &self.config)
            .search(query, conversation_id, options)
            .await
    }

    /// Replace a memory's text and re-embed it.
    pub async fn update(&self, memory_id: i64, text: &str) -> Result<MemoryRecord, MnemosError> {
        let txn = self.store.begin().await?;
        if txn.get(memory_id).await?.is_none() {
            txn.rollback().await?;
            return Err(MnemosError::NotFound { memory_id });
        }

        let embedding = self.embeddings.embed(text).await?;
        txn.update_content(memory_id, text.to_string(), embedding)
            .await?;
        let updated = txn
            .get(memory_id)
            .await?
            .ok_or(MnemosError::NotFound { memory_id })?;
        txn.commit().await?;

        info!(memory_id, "memory updated");
        Ok(updated)
    }

    /// Hard-delete a memory and unlink it from the connection graph.
    pub async fn delete(&self, memory_id: i64) -> Result<DeletedMemory, MnemosError> {
        let txn = self.store.begin().await?;
        if !txn.delete(memory_id).await? {
            txn.rollback().await?;
            return Err(MnemosError::NotFound { memory_id });
        }
        txn.commit().await?;

        info!(memory_id, "memory deleted");
        Ok(DeletedMemory {
            deleted_memory_id: memory_id,
        })
    }

    /// Append turns to the conversation log.
    ///
    /// Returns the new summary when the log just reached a multiple of the
    /// configured summary interval.
    pub async fn log_turns(
        &self,
        conversation_id: i64,
        turns: &[ConversationTurn],
    ) -> Result<Option<String>, MnemosError> {
        if turns.is_empty() {
            return Ok(None);
        }
        let rows: Vec<(Role, String)> = turns.iter().map(|t| (t.role, t.text.clone())).collect();
        let total = messages::append_messages(self.store.database(), conversation_id, &rows).await?;

        if !summary::summary_due(total, self.config.summary_every_messages) {
            return Ok(None);
        }
        self.summarize(conversation_id).await
    }

    /// Number of logged messages in the conversation.
    pub async fn message_count(&self, conversation_id: i64) -> Result<i64, MnemosError> {
        messages::count_messages(self.store.database(), conversation_id).await
    }

    /// Regenerate the conversation summary now.
    pub async fn summarize(&self, conversation_id: i64) -> Result<Option<String>, MnemosError> {
        summary::regenerate_summary(
            self.store.database(),
            self.provider.as_ref(),
            &self.config,
            conversation_id,
        )
        .await
    }
}
