// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation of candidate semantic facts against existing memory.
//!
//! For each fact, in order: embed it, find the most similar memories in the
//! conversation, let the model pick exactly one of add / update / delete /
//! noop through function calling, then apply that action inside the
//! caller's transaction. Later facts see the effects of earlier ones.

use mnemos_config::MemoryConfig;
use mnemos_core::types::{
    ProviderMessage, ProviderRequest, ResponseFormat, ToolCall, ToolChoice, ToolDefinition,
};
use mnemos_core::{MnemosError, ProviderAdapter};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingGateway;
use crate::similarity::cosine_similarity;
use crate::store::MemoryTxn;
use crate::types::{MemoryRecord, NewMemory};

const DECISION_PROMPT: &str = r#"You manage a long-term memory store. Decide how to handle ONE new candidate fact by calling EXACTLY ONE tool.

Tools:
- add_memory: store the fact when no existing memory captures the same meaning.
- update_memory: rewrite an existing memory when it is about the same thing AND the candidate is strictly more specific, clearer or more complete.
- delete_memory: remove an existing memory when the candidate directly and explicitly contradicts it.
- noop: do nothing when the candidate is redundant, weaker, vague, or you are unsure.

Principles:
1. Memory quality over quantity.
2. Never store the same meaning twice; prefer update_memory or noop.
3. Delete only on a strong, explicit contradiction.
4. When in doubt, choose noop.

Examples:
- Existing: (none). Candidate: "User prefers backend development" -> add_memory {"text": "User prefers backend development"}
- Existing: ID 4: "User works with Python". Candidate: "User primarily uses Python with FastAPI" -> update_memory {"memory_id": 4, "text": "User primarily uses Python with FastAPI"}
- Existing: ID 9: "User prefers short explanations". Candidate: "User prefers detailed, step-by-step explanations" -> delete_memory {"memory_id": 9}
- Existing: ID 6: "User is a Computer Science student". Candidate: "User studies Computer Science" -> noop

Call one tool. Do not reply with text."#;

/// The single action chosen for a candidate fact.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationAction {
    Add { text: String },
    Update { memory_id: i64, text: String },
    Delete { memory_id: i64 },
    Noop,
}

impl ReconciliationAction {
    pub fn name(&self) -> &'static str {
        match self {
            ReconciliationAction::Add { .. } => "add",
            ReconciliationAction::Update { .. } => "update",
            ReconciliationAction::Delete { .. } => "delete",
            ReconciliationAction::Noop => "noop",
        }
    }

    /// Decode the first tool call of a decision response.
    ///
    /// Returns `None` when there is no call or it cannot be understood.
    /// `add_memory` without text falls back to the candidate fact.
    pub fn from_tool_calls(calls: &[ToolCall], fact: &str) -> Option<Self> {
        let call = calls.first()?;
        let args: DecisionArgs = if call.function.arguments.trim().is_empty() {
            DecisionArgs::default()
        } else {
            match serde_json::from_str(&call.function.arguments) {
                Ok(args) => args,
                Err(e) => {
                    warn!(tool = %call.function.name, error = %e, "undecodable decision arguments");
                    return None;
                }
            }
        };
        let text = args.text.filter(|t| !t.trim().is_empty());

        match call.function.name.as_str() {
            "add_memory" => Some(ReconciliationAction::Add {
                text: text.unwrap_or_else(|| fact.to_string()),
            }),
            "update_memory" => Some(ReconciliationAction::Update {
                memory_id: args.memory_id?.0,
                text: text?,
            }),
            "delete_memory" => Some(ReconciliationAction::Delete {
                memory_id: args.memory_id?.0,
            }),
            "noop" => Some(ReconciliationAction::Noop),
            other => {
                warn!(tool = other, "unknown decision tool");
                None
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DecisionArgs {
    #[serde(default)]
    memory_id: Option<LenientId>,
    #[serde(default)]
    text: Option<String>,
}

/// A memory id given as a JSON integer or a numeric string.
#[derive(Debug)]
struct LenientId(i64);

impl<'de> Deserialize<'de> for LenientId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Str(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(LenientId(id)),
            Raw::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(LenientId(f as i64)),
            Raw::Str(s) => s
                .trim()
                .parse()
                .map(LenientId)
                .map_err(|_| serde::de::Error::custom(format!("invalid memory id `{s}`"))),
            Raw::Float(f) => Err(serde::de::Error::custom(format!("invalid memory id {f}"))),
        }
    }
}

/// Function tools offered to the decision model.
pub fn decision_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "add_memory".into(),
            description: "Add a new memory".into(),
            parameters: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: "update_memory".into(),
            description: "Update an existing memory".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "memory_id": {"type": "integer"},
                    "text": {"type": "string"}
                },
                "required": ["memory_id", "text"]
            }),
        },
        ToolDefinition {
            name: "delete_memory".into(),
            description: "Delete an existing memory".into(),
            parameters: json!({
                "type": "object",
                "properties": {"memory_id": {"type": "integer"}},
                "required": ["memory_id"]
            }),
        },
        ToolDefinition {
            name: "noop".into(),
            description: "Do nothing".into(),
            parameters: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// The `limit` memories most similar to `query`, best first.
///
/// Memories without an embedding are skipped. Ties keep input order.
pub fn top_similar(
    query: &[f32],
    memories: Vec<MemoryRecord>,
    limit: usize,
) -> Vec<(MemoryRecord, f64)> {
    let mut scored: Vec<(MemoryRecord, f64)> = memories
        .into_iter()
        .filter_map(|memory| {
            let score = cosine_similarity(query, memory.embedding.as_deref()?);
            Some((memory, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);
    scored
}

fn render_neighbours(neighbours: &[(MemoryRecord, f64)]) -> String {
    if neighbours.is_empty() {
        return "(none)".to_string();
    }
    neighbours
        .iter()
        .map(|(m, _)| format!("- ID {}: {}", m.id, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the tool-constrained decision request for one fact.
pub fn build_decision_request(
    config: &MemoryConfig,
    fact: &str,
    neighbours: &[(MemoryRecord, f64)],
) -> ProviderRequest {
    ProviderRequest {
        model: config.chat_model.clone(),
        messages: vec![
            ProviderMessage::system(DECISION_PROMPT),
            ProviderMessage::user(format!(
                "Candidate fact:\n{fact}\n\nSimilar existing memories:\n{}",
                render_neighbours(neighbours)
            )),
        ],
        temperature: 0.0,
        tools: Some(decision_tools()),
        tool_choice: Some(ToolChoice::Auto),
        response_format: ResponseFormat::Text,
    }
}

/// What one reconciliation pass did, in fact order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationReport {
    /// `(fact, action applied)`; skipped facts and dropped actions are absent.
    pub applied: Vec<(String, ReconciliationAction)>,
    /// Ids created by `add` actions.
    pub added_ids: Vec<i64>,
}

/// Runs the decision loop for one batch of facts.
pub struct Reconciler<'a> {
    provider: &'a dyn ProviderAdapter,
    embeddings: &'a EmbeddingGateway,
    config: &'a MemoryConfig,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        provider: &'a dyn ProviderAdapter,
        embeddings: &'a EmbeddingGateway,
        config: &'a MemoryConfig,
    ) -> Self {
        Self {
            provider,
            embeddings,
            config,
        }
    }

    /// Reconcile `facts` sequentially inside `txn`. The caller commits.
    ///
    /// Any service failure aborts the batch; the caller's transaction then
    /// rolls back on drop.
    pub async fn reconcile(
        &self,
        txn: &MemoryTxn,
        conversation_id: i64,
        facts: &[String],
    ) -> Result<ReconciliationReport, MnemosError> {
        let mut report = ReconciliationReport::default();

        for fact in facts {
            let fact_embedding = self.embeddings.embed(fact).await?;
            let active = txn.list_active(conversation_id).await?;
            let neighbours = top_similar(
                &fact_embedding,
                active,
                self.config.reconciliation_neighbors,
            );

            let response = self
                .provider
                .complete(build_decision_request(self.config, fact, &neighbours))
                .await?;
            let Some(action) = ReconciliationAction::from_tool_calls(&response.tool_calls, fact)
            else {
                debug!(conversation_id, fact = %fact, "no actionable decision, skipping fact");
                continue;
            };

            if self
                .apply(txn, conversation_id, fact, &fact_embedding, &action, &mut report)
                .await?
            {
                metrics::counter!("mnemos_reconciliation_actions_total", "action" => action.name())
                    .increment(1);
                report.applied.push((fact.clone(), action));
            }
        }

        info!(
            conversation_id,
            facts = facts.len(),
            applied = report.applied.len(),
            "reconciliation complete"
        );
        Ok(report)
    }

    /// Apply one action. Returns false when it was dropped (missing target).
    async fn apply(
        &self,
        txn: &MemoryTxn,
        conversation_id: i64,
        fact: &str,
        fact_embedding: &[f32],
        action: &ReconciliationAction,
        report: &mut ReconciliationReport,
    ) -> Result<bool, MnemosError> {
        match action {
            ReconciliationAction::Add { text } => {
                let embedding = self.embedding_for(text, fact, fact_embedding).await?;
                let id = txn
                    .insert(NewMemory::semantic(conversation_id, text.clone(), embedding))
                    .await?;
                debug!(conversation_id, memory_id = id, "added semantic memory");
                report.added_ids.push(id);
                Ok(true)
            }
            ReconciliationAction::Update { memory_id, text } => {
                if !self.target_exists(txn, conversation_id, *memory_id).await? {
                    return Ok(false);
                }
                let embedding = self.embedding_for(text, fact, fact_embedding).await?;
                txn.update_content(*memory_id, text.clone(), embedding)
                    .await?;
                debug!(conversation_id, memory_id, "updated memory");
                Ok(true)
            }
            ReconciliationAction::Delete { memory_id } => {
                if !self.target_exists(txn, conversation_id, *memory_id).await? {
                    return Ok(false);
                }
                txn.delete(*memory_id).await?;
                debug!(conversation_id, memory_id, "deleted memory");
                Ok(true)
            }
            ReconciliationAction::Noop => Ok(true),
        }
    }

    /// Inactive targets and targets in another conversation count as missing.
    async fn target_exists(
        &self,
        txn: &MemoryTxn,
        conversation_id: i64,
        memory_id: i64,
    ) -> Result<bool, MnemosError> {
        let found = txn
            .get(memory_id)
            .await?
            .is_some_and(|m| m.conversation_id == conversation_id && m.is_active);
        if !found {
            debug!(conversation_id, memory_id, "reconciliation target missing, dropping action");
        }
        Ok(found)
    }

    async fn embedding_for(
        &self,
        text: &str,
        fact: &str,
        fact_embedding: &[f32],
    ) -> Result<Vec<f32>, MnemosError> {
        if text == fact {
            Ok(fact_embedding.to_vec())
        } else {
            self.embeddings.embed(text).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mnemos_core::types::FunctionCall;
    use crate::types::MemoryMetadata;

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    fn record(id: i64, embedding: Option<Vec<f32>>) -> MemoryRecord {
        MemoryRecord {
            id,
            conversation_id: 1,
            text: format!("memory {id}"),
            category: None,
            embedding,
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

    #[test]
    fn decodes_each_tool() {
        let fact = "User likes tea";
        assert_eq!(
            ReconciliationAction::from_tool_calls(&[call("add_memory", r#"{"text":"User likes green tea"}"#)], fact),
            Some(ReconciliationAction::Add { text: "User likes green tea".into() })
        );
        assert_eq!(
            ReconciliationAction::from_tool_calls(&[call("update_memory", r#"{"memory_id":4,"text":"t"}"#)], fact),
            Some(ReconciliationAction::Update { memory_id: 4, text: "t".into() })
        );
        assert_eq!(
            ReconciliationAction::from_tool_calls(&[call("delete_memory", r#"{"memory_id":"9"}"#)], fact),
            Some(ReconciliationAction::Delete { memory_id: 9 })
        );
        assert_eq!(
            ReconciliationAction::from_tool_calls(&[call("noop", "")], fact),
            Some(ReconciliationAction::Noop)
        );
    }

    #[test]
    fn add_without_text_falls_back_to_fact() {
        assert_eq!(
            ReconciliationAction::from_tool_calls(&[call("add_memory", "{}")], "User likes tea"),
            Some(ReconciliationAction::Add { text: "User likes tea".into() })
        );
    }

    #[test]
    fn unusable_decisions_decode_to_none() {
        let fact = "f";
        assert_eq!(ReconciliationAction::from_tool_calls(&[], fact), None);
        assert_eq!(ReconciliationAction::from_tool_calls(&[call("update_memory", r#"{"text":"t"}"#)], fact), None);
        assert_eq!(ReconciliationAction::from_tool_calls(&[call("update_memory", r#"{"memory_id":3}"#)], fact), None);
        assert_eq!(ReconciliationAction::from_tool_calls(&[call("delete_memory", r#"{"memory_id":"abc"}"#)], fact), None);
        assert_eq!(ReconciliationAction::from_tool_calls(&[call("forget_all", "{}")], fact), None);
        assert_eq!(ReconciliationAction::from_tool_calls(&[call("add_memory", "not json")], fact), None);
    }

    #[test]
    fn only_first_tool_call_counts() {
        let calls = [call("noop", "{}"), call("delete_memory", r#"{"memory_id":1}"#)];
        assert_eq!(
            ReconciliationAction::from_tool_calls(&calls, "f"),
            Some(ReconciliationAction::Noop)
        );
    }

    #[test]
    fn top_similar_is_stable_and_skips_missing_embeddings() {
        let memories = vec![
            record(1, Some(vec![1.0, 0.0])),
            record(2, None),
            record(3, Some(vec![0.0, 1.0])),
            record(4, Some(vec![2.0, 0.0])),
        ];
        let top = top_similar(&[1.0, 0.0], memories, 10);
        let ids: Vec<i64> = top.iter().map(|(m, _)| m.id).collect();
        assert_eq!(ids, vec![1, 4, 3]);
    }

    #[test]
    fn top_similar_truncates_to_limit() {
        let memories = (1..=12).map(|i| record(i, Some(vec![1.0, i as f32]))).collect();
        assert_eq!(top_similar(&[1.0, 0.0], memories, 10).len(), 10);
    }

    #[test]
    fn decision_request_lists_neighbours_and_tools() {
        let config = MemoryConfig::default();
        let neighbours = vec![(record(4, Some(vec![1.0])), 0.9)];
        let request = build_decision_request(&config, "User uses FastAPI", &neighbours);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.tool_choice, Some(ToolChoice::Auto));
        let names: Vec<String> = request.tools.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, ["add_memory", "update_memory", "delete_memory", "noop"]);
        assert!(request.messages[1].content.contains("- ID 4: memory 4"));

        let empty = build_decision_request(&config, "x", &[]);
        assert!(empty.messages[1].content.ends_with("(none)"));
    }
}
