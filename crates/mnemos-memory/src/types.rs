// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mnemos_core::Role;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A stored memory: a semantic fact or an episodic bubble.
///
/// Both variants share one table; `is_episodic` tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryRecord {
    /// Monotonically assigned, never reused.
    pub id: i64,
    pub conversation_id: i64,
    pub text: String,
    /// Free-form tag, semantic facts only.
    pub category: Option<String>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub is_episodic: bool,
    /// When the episode happened, bubbles only.
    pub occurred_at: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
    /// In [0, 1], bubbles only.
    pub importance: Option<f64>,
    pub is_active: bool,
    pub metadata: MemoryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn connections(&self) -> &Connections {
        &self.metadata.connections
    }
}

/// A memory about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMemory {
    pub conversation_id: i64,
    pub text: String,
    pub category: Option<String>,
    pub embedding: Vec<f32>,
    pub is_episodic: bool,
    pub occurred_at: Option<DateTime<Utc>>,
    pub session_id: Option<String>,
    pub importance: Option<f64>,
}

impl NewMemory {
    /// A semantic fact: no occurrence time, no importance.
    pub fn semantic(conversation_id: i64, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            category: None,
            embedding,
            is_episodic: false,
            occurred_at: None,
            session_id: None,
            importance: None,
        }
    }

    /// An episodic bubble stamped at `occurred_at`.
    pub fn bubble(
        conversation_id: i64,
        text: impl Into<String>,
        embedding: Vec<f32>,
        importance: f64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            category: None,
            embedding,
            is_episodic: true,
            occurred_at: Some(occurred_at),
            session_id: None,
            importance: Some(importance),
        }
    }
}

/// Open key/value metadata with the connection graph parsed out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(default, skip_serializing_if = "Connections::is_empty")]
    pub connections: Connections,
    /// Every other key, preserved as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl MemoryMetadata {
    /// Parse the stored JSON column. Malformed JSON is logged and treated as empty.
    pub fn parse(memory_id: i64, raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::default();
        }
        serde_json::from_str(raw).unwrap_or_else(|e| {
            warn!(memory_id, error = %e, "ignoring malformed memory metadata");
            Self::default()
        })
    }
}

/// One edge of the connection graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionLink {
    pub memory_id: i64,
    /// Cosine similarity rounded to 3 decimals.
    pub score: f64,
}

/// Ordered `memory_id -> score` mapping.
///
/// Persisted as `{"bubble_ids": [..], "scores": {"<id>": score}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConnections", into = "RawConnections")]
pub struct Connections {
    links: Vec<ConnectionLink>,
}

impl Connections {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionLink> {
        self.links.iter()
    }

    /// Linked ids in insertion order.
    pub fn ids(&self) -> Vec<i64> {
        self.links.iter().map(|l| l.memory_id).collect()
    }

    pub fn contains(&self, memory_id: i64) -> bool {
        self.links.iter().any(|l| l.memory_id == memory_id)
    }

    pub fn score(&self, memory_id: i64) -> Option<f64> {
        self.links
            .iter()
            .find(|l| l.memory_id == memory_id)
            .map(|l| l.score)
    }

    /// Append a link unless the id is already listed. Returns whether it was added.
    pub fn insert(&mut self, memory_id: i64, score: f64) -> bool {
        if self.contains(memory_id) {
            return false;
        }
        self.links.push(ConnectionLink { memory_id, score });
        true
    }

    /// Drop the link to `memory_id`. Returns whether one was present.
    pub fn remove(&mut self, memory_id: i64) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.memory_id != memory_id);
        self.links.len() != before
    }
}

impl FromIterator<ConnectionLink> for Connections {
    fn from_iter<T: IntoIterator<Item = ConnectionLink>>(iter: T) -> Self {
        let mut connections = Connections::default();
        for link in iter {
            connections.insert(link.memory_id, link.score);
        }
        connections
    }
}

#[derive(Serialize, Deserialize)]
struct RawConnections {
    #[serde(default)]
    bubble_ids: Vec<i64>,
    #[serde(default)]
    scores: BTreeMap<String, f64>,
}

impl From<RawConnections> for Connections {
    fn from(raw: RawConnections) -> Self {
        raw.bubble_ids
            .into_iter()
            .map(|memory_id| ConnectionLink {
                memory_id,
                score: raw
                    .scores
                    .get(&memory_id.to_string())
                    .copied()
                    .unwrap_or(0.0),
            })
            .collect()
    }
}

impl From<Connections> for RawConnections {
    fn from(connections: Connections) -> Self {
        RawConnections {
            bubble_ids: connections.ids(),
            scores: connections
                .links
                .iter()
                .map(|l| (l.memory_id.to_string(), l.score))
                .collect(),
        }
    }
}

/// One conversation turn handed to `add()` or the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Candidates returned by the extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractedMemories {
    #[serde(default)]
    pub semantic: Vec<String>,
    #[serde(default)]
    pub bubbles: Vec<ExtractedBubble>,
}

impl ExtractedMemories {
    pub fn is_empty(&self) -> bool {
        self.semantic.is_empty() && self.bubbles.is_empty()
    }
}

/// An episodic candidate. `importance` is kept raw and coerced later.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ExtractedBubble {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub importance: serde_json::Value,
}

impl ExtractedBubble {
    pub fn new(text: impl Into<String>, importance: f64) -> Self {
        Self {
            text: text.into(),
            importance: serde_json::Value::from(importance),
        }
    }

    /// Importance as a float in [0, 1], or `default` when missing or unparsable.
    pub fn importance_or(&self, default: f64) -> f64 {
        let parsed = match &self.importance {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed {
            Some(value) if value.is_finite() => value.clamp(0.0, 1.0),
            _ => default,
        }
    }
}

/// Result of `add()`: the candidate texts that went through each stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddOutcome {
    pub semantic: Vec<String>,
    pub bubbles: Vec<String>,
}

/// How a search hit was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitKind {
    Semantic,
    Bubble,
    /// Reached through the connection graph, not ranked.
    Connected,
}

/// One entry of a search response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub memory_id: i64,
    pub memory: String,
    #[serde(rename = "type")]
    pub kind: HitKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Rounded to 4 decimals; 0 for connected entries.
    pub score: f64,
    pub connections: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub total: usize,
    pub results: Vec<SearchHit>,
}

/// Knobs for a single search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// `None` uses the configured default.
    pub limit: Option<usize>,
    pub include_connections: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: None,
            include_connections: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeletedMemory {
    pub deleted_memory_id: i64,
}

/// Convert an f32 vector to little-endian bytes for BLOB storage.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Convert a BLOB back to an f32 vector. Trailing partial chunks are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connections_parse_from_stored_layout() {
        let meta = MemoryMetadata::parse(
            1,
            r#"{"connections":{"bubble_ids":[7,3],"scores":{"3":0.61,"7":0.912}},"source":"import"}"#,
        );
        assert_eq!(meta.connections.ids(), vec![7, 3]);
        assert_eq!(meta.connections.score(7), Some(0.912));
        assert_eq!(meta.connections.score(3), Some(0.61));
        assert_eq!(meta.extra["source"], "import");
    }

    #[test]
    fn connections_serialize_with_string_keys() {
        let mut meta = MemoryMetadata::default();
        meta.connections.insert(12, 0.75);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"connections": {"bubble_ids": [12], "scores": {"12": 0.75}}})
        );
    }

    #[test]
    fn empty_metadata_serializes_as_empty_object() {
        assert_eq!(serde_json::to_string(&MemoryMetadata::default()).unwrap(), "{}");
    }

    #[test]
    fn malformed_metadata_is_treated_as_empty() {
        assert_eq!(MemoryMetadata::parse(1, "{not json"), MemoryMetadata::default());
        assert_eq!(MemoryMetadata::parse(1, ""), MemoryMetadata::default());
    }

    #[test]
    fn insert_is_idempotent_and_remove_reports_presence() {
        let mut c = Connections::default();
        assert!(c.insert(4, 0.7));
        assert!(!c.insert(4, 0.9));
        assert_eq!(c.score(4), Some(0.7));
        assert!(c.remove(4));
        assert!(!c.remove(4));
        assert!(c.is_empty());
    }

    #[test]
    fn duplicate_stored_ids_collapse_to_one_link() {
        let meta = MemoryMetadata::parse(
            1,
            r#"{"connections":{"bubble_ids":[5,5],"scores":{"5":0.8}}}"#,
        );
        assert_eq!(meta.connections.len(), 1);
    }

    #[test]
    fn bubble_importance_coercion() {
        let parse = |json: &str| serde_json::from_str::<ExtractedBubble>(json).unwrap();
        assert_eq!(parse(r#"{"text":"a","importance":0.8}"#).importance_or(0.5), 0.8);
        assert_eq!(parse(r#"{"text":"a","importance":"0.3"}"#).importance_or(0.5), 0.3);
        assert_eq!(parse(r#"{"text":"a","importance":"high"}"#).importance_or(0.5), 0.5);
        assert_eq!(parse(r#"{"text":"a"}"#).importance_or(0.5), 0.5);
        assert_eq!(parse(r#"{"text":"a","importance":7}"#).importance_or(0.5), 1.0);
    }

    #[test]
    fn search_hit_serializes_type_and_omits_missing_time() {
        let hit = SearchHit {
            memory_id: 3,
            memory: "User likes tea".into(),
            kind: HitKind::Semantic,
            occurred_at: None,
            score: 0.45,
            connections: vec![],
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["type"], "semantic");
        assert!(json.get("occurred_at").is_none());
    }

    #[test]
    fn blob_roundtrip_preserves_values() {
        let original = vec![0.1_f32, -0.5, 1.0, f32::MIN_POSITIVE];
        assert_eq!(blob_to_vec(&vec_to_blob(&original)), original);
        assert_eq!(blob_to_vec(&[0, 0, 128]), Vec::<f32>::new());
    }
}
