// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composite-score retrieval with connection-graph expansion.
//!
//! Every active memory of the conversation is scored as
//! `similarity × importance × recency`. The top results are then followed
//! by a few memories reached through their connections.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use mnemos_config::MemoryConfig;
use mnemos_core::MnemosError;
use tracing::debug;

use crate::embedding::EmbeddingGateway;
use crate::similarity::cosine_similarity;
use crate::store::MemoryStore;
use crate::types::{HitKind, MemoryRecord, SearchHit, SearchOptions, SearchResponse};

/// Importance assumed for memories that carry none (semantic facts).
const NEUTRAL_IMPORTANCE: f64 = 0.5;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Exponential decay by days since the episode. 1.0 for anything that is
/// not an episodic memory with a timestamp. Future timestamps count as now.
pub fn recency_weight(
    occurred_at: Option<DateTime<Utc>>,
    is_episodic: bool,
    now: DateTime<Utc>,
    decay_rate: f64,
) -> f64 {
    match occurred_at {
        Some(at) if is_episodic => {
            let days = ((now - at).num_milliseconds() as f64 / MILLIS_PER_DAY).max(0.0);
            (-decay_rate * days).exp()
        }
        _ => 1.0,
    }
}

fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

fn kind_of(memory: &MemoryRecord) -> HitKind {
    if memory.is_episodic {
        HitKind::Bubble
    } else {
        HitKind::Semantic
    }
}

/// Score and rank `memories` against a query embedding.
///
/// Memories without an embedding are skipped. Ties keep input order.
pub fn rank_memories<'m>(
    query_embedding: &[f32],
    memories: &'m [MemoryRecord],
    now: DateTime<Utc>,
    decay_rate: f64,
    limit: usize,
) -> Vec<(&'m MemoryRecord, f64)> {
    let mut scored: Vec<(&MemoryRecord, f64)> = memories
        .iter()
        .filter_map(|m| {
            let similarity = cosine_similarity(query_embedding, m.embedding.as_deref()?);
            let importance = m.importance.unwrap_or(NEUTRAL_IMPORTANCE);
            let recency = recency_weight(m.occurred_at, m.is_episodic, now, decay_rate);
            Some((m, similarity * importance * recency))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

/// Follow the connections of `ranked` into `pool`.
///
/// At most `per_result` links are followed from each ranked memory and at
/// most `max_total` entries are returned. Ids already present are skipped,
/// as are ids missing from `pool` (inactive, deleted, other conversation).
pub fn expand_connections<'m>(
    ranked: &[&MemoryRecord],
    pool: &HashMap<i64, &'m MemoryRecord>,
    per_result: usize,
    max_total: usize,
) -> Vec<&'m MemoryRecord> {
    let mut seen: HashSet<i64> = ranked.iter().map(|m| m.id).collect();
    let mut connected = Vec::new();

    'outer: for memory in ranked {
        for id in memory.connections().ids().into_iter().take(per_result) {
            if connected.len() >= max_total {
                break 'outer;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(&found) = pool.get(&id) {
                connected.push(found);
            }
        }
    }
    connected
}

/// Connected entries carry score 0, so they may only follow a ranked
/// section whose lowest rounded score is not negative.
fn leaves_room_for_connections(ranked: &[(&MemoryRecord, f64)]) -> bool {
    ranked.last().is_some_and(|(_, score)| round4(*score) >= 0.0)
}

fn hit(memory: &MemoryRecord, kind: HitKind, score: f64) -> SearchHit {
    SearchHit {
        memory_id: memory.id,
        memory: memory.text.clone(),
        kind,
        occurred_at: memory.occurred_at,
        score: round4(score),
        connections: memory.connections().ids(),
    }
}

/// Read-only search over one conversation.
pub struct Retriever<'a> {
    store: &'a MemoryStore,
    embeddings: &'a EmbeddingGateway,
    config: &'a MemoryConfig,
}

impl<'a> Retriever<'a> {
    pub fn new(
        store: &'a MemoryStore,
        embeddings: &'a EmbeddingGateway,
        config: &'a MemoryConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            config,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        conversation_id: i64,
        options: SearchOptions,
    ) -> Result<SearchResponse, MnemosError> {
        let limit = options.limit.unwrap_or(self.config.default_search_limit);
        let query_embedding = self.embeddings.embed(query).await?;
        let memories = self.store.list_active(conversation_id).await?;

        let ranked = rank_memories(
            &query_embedding,
            &memories,
            Utc::now(),
            self.config.recency_decay_rate,
            limit,
        );

        let mut results: Vec<SearchHit> = ranked
            .iter()
            .map(|(m, score)| hit(m, kind_of(m), *score))
            .collect();

        if options.include_connections && leaves_room_for_connections(&ranked) {
            let pool: HashMap<i64, &MemoryRecord> = memories.iter().map(|m| (m.id, m)).collect();
            let top: Vec<&MemoryRecord> = ranked.iter().map(|(m, _)| *m).collect();
            let connected = expand_connections(
                &top,
                &pool,
                self.config.connections_per_result,
                self.config.max_connected_results,
            );
            results.extend(connected.into_iter().map(|m| hit(m, HitKind::Connected, 0.0)));
        }

        debug!(
            conversation_id,
            candidates = memories.len(),
            results = results.len(),
            "search complete"
        );
        Ok(SearchResponse {
            query: query.to_string(),
            total: results.len(),
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Connections, MemoryMetadata};
    use chrono::Duration;

    fn memory(id: i64, embedding: Vec<f32>) -> MemoryRecord {
        MemoryRecord {
            id,
            conversation_id: 1,
            text: format!("m{id}"),
            category: None,
            embedding: Some(embedding),
            is_episodic: false,
            occurred_at: None,
            session_id: None,
            importance: None,
            is_active: true,
            metadata: MemoryMetadata::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn linked(mut m: MemoryRecord, ids: &[i64]) -> MemoryRecord {
        m.metadata.connections = ids
            .iter()
            .map(|&id| crate::types::ConnectionLink {
                memory_id: id,
                score: 0.7,
            })
            .collect::<Connections>();
        m
    }

    #[test]
    fn recency_is_one_at_zero_days_and_for_semantic_memories() {
        let now = Utc::now();
        assert_eq!(recency_weight(Some(now), true, now, 0.05), 1.0);
        assert_eq!(recency_weight(Some(now - Duration::days(30)), false, now, 0.05), 1.0);
        assert_eq!(recency_weight(None, true, now, 0.05), 1.0);
    }

    #[test]
    fn recency_strictly_decreases_with_age() {
        let now = Utc::now();
        let weights: Vec<f64> = [0, 1, 7, 30, 365]
            .iter()
            .map(|d| recency_weight(Some(now - Duration::days(*d)), true, now, 0.05))
            .collect();
        assert!(weights.windows(2).all(|w| w[0] > w[1]));
        assert!((weights[1] - (-0.05f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn future_timestamps_are_not_boosted() {
        let now = Utc::now();
        assert_eq!(recency_weight(Some(now + Duration::days(3)), true, now, 0.05), 1.0);
    }

    #[test]
    fn ranking_applies_importance_and_recency() {
        let now = Utc::now();
        let semantic = memory(1, vec![1.0, 0.0]);
        let mut fresh = memory(2, vec![1.0, 0.0]);
        fresh.is_episodic = true;
        fresh.importance = Some(0.9);
        fresh.occurred_at = Some(now);
        let mut stale = memory(3, vec![1.0, 0.0]);
        stale.is_episodic = true;
        stale.importance = Some(0.9);
        stale.occurred_at = Some(now - Duration::days(20));

        let memories = vec![semantic, fresh, stale];
        let ranked = rank_memories(&[1.0, 0.0], &memories, now, 0.05, 10);
        let ids: Vec<i64> = ranked.iter().map(|(m, _)| m.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert!((ranked[0].1 - 0.9).abs() < 1e-9);
        assert!((ranked[1].1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ranking_skips_missing_embeddings_and_respects_limit() {
        let mut no_vec = memory(1, vec![]);
        no_vec.embedding = None;
        let memories = vec![no_vec, memory(2, vec![1.0]), memory(3, vec![1.0])];
        let ranked = rank_memories(&[1.0], &memories, Utc::now(), 0.05, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0.id, 2);
    }

    #[test]
    fn expansion_caps_per_result_and_total() {
        let a = linked(memory(1, vec![1.0]), &[10, 11, 12]);
        let b = linked(memory(2, vec![1.0]), &[1, 13, 14]);
        let pool_records: Vec<MemoryRecord> = (10..=14).map(|id| memory(id, vec![0.0])).collect();
        let mut pool: HashMap<i64, &MemoryRecord> = pool_records.iter().map(|m| (m.id, m)).collect();
        pool.insert(a.id, &a);
        pool.insert(b.id, &b);

        let connected = expand_connections(&[&a, &b], &pool, 2, 3);
        let ids: Vec<i64> = connected.iter().map(|m| m.id).collect();
        // 12 is beyond the per-result cap, 1 is already ranked.
        assert_eq!(ids, vec![10, 11, 13]);
    }

    #[test]
    fn expansion_skips_ids_outside_the_pool() {
        let a = linked(memory(1, vec![1.0]), &[99, 5]);
        let five = memory(5, vec![0.0]);
        let pool: HashMap<i64, &MemoryRecord> = [(5, &five)].into_iter().collect();
        let connected = expand_connections(&[&a], &pool, 2, 3);
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].id, 5);
    }

    #[test]
    fn negative_tail_leaves_no_room_for_connections() {
        let a = memory(1, vec![1.0]);
        let b = memory(2, vec![1.0]);
        assert!(!leaves_room_for_connections(&[]));
        assert!(leaves_room_for_connections(&[(&a, 0.4), (&b, 0.0)]));
        assert!(leaves_room_for_connections(&[(&a, -0.00001)]));
        assert!(!leaves_room_for_connections(&[(&a, 0.4), (&b, -0.2)]));
    }

    #[test]
    fn scores_round_to_four_decimals() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(0.0), 0.0);
    }
}
