// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Episodic bubble creation and the connection graph.
//!
//! Each bubble is inserted first so it has an id, then linked to the most
//! similar active memories of its conversation. Links are written on both
//! ends with the same rounded score.

use chrono::{DateTime, Utc};
use mnemos_config::MemoryConfig;
use mnemos_core::MnemosError;
use tracing::{debug, info};

use crate::embedding::EmbeddingGateway;
use crate::similarity::cosine_similarity;
use crate::store::MemoryTxn;
use crate::types::{ConnectionLink, Connections, ExtractedBubble, MemoryRecord, NewMemory};

/// Round a similarity to 3 decimals for persistence.
pub fn round_score(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}

/// Select connections for `embedding` among `candidates`.
///
/// Keeps scores at or above `threshold`, best first (ties in input order),
/// at most `max` of them. Candidates without an embedding are ignored.
pub fn discover_connections(
    embedding: &[f32],
    candidates: &[MemoryRecord],
    threshold: f64,
    max: usize,
) -> Vec<ConnectionLink> {
    let mut scored: Vec<(i64, f64)> = candidates
        .iter()
        .filter_map(|m| {
            let score = cosine_similarity(embedding, m.embedding.as_deref()?);
            (score >= threshold).then_some((m.id, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(max)
        .map(|(memory_id, score)| ConnectionLink {
            memory_id,
            score: round_score(score),
        })
        .collect()
}

/// A bubble written by [`BubbleWriter::create_bubbles`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedBubble {
    pub memory_id: i64,
    pub text: String,
    pub importance: f64,
    pub connections: Vec<ConnectionLink>,
}

/// Persists bubbles and maintains the symmetric connection graph.
pub struct BubbleWriter<'a> {
    embeddings: &'a EmbeddingGateway,
    config: &'a MemoryConfig,
}

impl<'a> BubbleWriter<'a> {
    pub fn new(embeddings: &'a EmbeddingGateway, config: &'a MemoryConfig) -> Self {
        Self { embeddings, config }
    }

    /// Create every non-empty bubble and connect it. The caller commits once.
    pub async fn create_bubbles(
        &self,
        txn: &MemoryTxn,
        conversation_id: i64,
        bubbles: &[ExtractedBubble],
        now: DateTime<Utc>,
    ) -> Result<Vec<CreatedBubble>, MnemosError> {
        let mut created = Vec::with_capacity(bubbles.len());

        for bubble in bubbles {
            let text = bubble.text.trim();
            if text.is_empty() {
                debug!(conversation_id, "skipping bubble without text");
                continue;
            }
            let importance = bubble.importance_or(self.config.default_importance);

            let embedding = self.embeddings.embed(text).await?;
            let memory_id = txn
                .insert(NewMemory::bubble(
                    conversation_id,
                    text,
                    embedding.clone(),
                    importance,
                    now,
                ))
                .await?;
            metrics::counter!("mnemos_bubbles_created_total").increment(1);

            let connections = self
                .connect(txn, conversation_id, memory_id, &embedding)
                .await?;
            debug!(
                conversation_id,
                memory_id,
                importance,
                connections = connections.len(),
                "created bubble"
            );
            created.push(CreatedBubble {
                memory_id,
                text: text.to_string(),
                importance,
                connections,
            });
        }

        info!(conversation_id, bubbles = created.len(), "bubble batch staged");
        Ok(created)
    }

    async fn connect(
        &self,
        txn: &MemoryTxn,
        conversation_id: i64,
        memory_id: i64,
        embedding: &[f32],
    ) -> Result<Vec<ConnectionLink>, MnemosError> {
        let mut others = txn.list_active(conversation_id).await?;
        let Some(pos) = others.iter().position(|m| m.id == memory_id) else {
            return Err(MnemosError::Internal(format!(
                "bubble {memory_id} vanished before it could be connected"
            )));
        };
        let mut record = others.remove(pos);

        let links = discover_connections(
            embedding,
            &others,
            self.config.connection_threshold,
            self.config.max_connections,
        );
        if links.is_empty() {
            return Ok(links);
        }

        record.metadata.connections = links.iter().copied().collect::<Connections>();
        txn.update_metadata(memory_id, record.metadata).await?;

        for link in &links {
            let Some(neighbour) = others.iter().find(|m| m.id == link.memory_id) else {
                continue;
            };
            let mut metadata = neighbour.metadata.clone();
            if metadata.connections.insert(memory_id, link.score) {
                txn.update_metadata(neighbour.id, metadata).await?;
            }
        }
        metrics::counter!("mnemos_connections_created_total").increment(links.len() as u64);
        Ok(links)
    }
}
