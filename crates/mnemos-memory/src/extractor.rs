// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LLM-based extraction of semantic facts and episodic bubbles.
//!
//! One JSON-mode completion turns a window of the conversation into
//! candidate memories. A response that cannot be parsed yields no
//! candidates: extraction never blocks the conversation.

use mnemos_config::MemoryConfig;
use mnemos_core::types::{ProviderMessage, ProviderRequest, ResponseFormat};
use mnemos_core::{MnemosError, ProviderAdapter};
use tracing::{debug, warn};

use crate::types::{ConversationTurn, ExtractedMemories};

const EXTRACTION_PROMPT: &str = r#"You extract long-term memories about the USER from a conversation.

There are two kinds of memory.

SEMANTIC FACTS are stable and atemporal: preferences, likes and dislikes, skills and tools used regularly, professional role or background, personal traits, long-term goals or ongoing projects, habits.
Never semantic: moods or temporary states, one-off events, the task currently being worked on, questions, hypotheticals.

BUBBLES are time-bound moments: current problems or bugs, active tasks, questions asked in this conversation, decisions reached, deadlines and appointments, recent events, explicit requests to remember something, blockers.
Never bubbles: greetings, thanks, acknowledgements, anything the assistant said, vague statements without context.

Give every bubble an importance between 0.0 and 1.0:
- 0.9-1.0 critical: explicit deadlines, outages or major blockers, critical decisions, emergencies
- 0.7-0.8 high: problems being actively solved, important questions, significant work, key frustrations
- 0.5-0.6 medium: general context for today, notable discoveries, moderate interest
- 0.3-0.4 low: minor or casual mentions, background information

Rules:
1. Extract only from USER messages. Assistant content is never extracted.
2. Each memory is atomic (one idea), a single concise sentence, written in third person ("User ...").
3. Never record the same information as both a semantic fact and a bubble.
4. Only extract what is explicitly stated. Do not infer skills from a single try.
5. Keep facts separate; do not merge them.
6. When unsure whether something is stable, prefer semantic over bubble.
7. Emotions and acknowledgements alone produce nothing. Empty arrays are valid.

You receive a CONVERSATION SUMMARY (older history), RECENT MESSAGES (broader context) and the LATEST INTERACTION (highest signal). Focus bubbles on the latest interaction and use the summary to confirm that semantic facts are stable. Do not repeat what the summary already captures.

Respond with a single JSON object and nothing else:
{"semantic": ["User ..."], "bubbles": [{"text": "User ...", "importance": 0.7}]}"#;

/// The slice of a conversation shown to the extraction model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionWindow {
    pub summary: String,
    pub recent: Vec<ConversationTurn>,
    pub latest: Vec<ConversationTurn>,
}

impl ExtractionWindow {
    /// Split `turns` into the latest exchange (last two turns) and up to
    /// `recent_limit` turns before it.
    pub fn from_turns(turns: &[ConversationTurn], summary: String, recent_limit: usize) -> Self {
        let latest_start = turns.len().saturating_sub(2);
        let recent_start = latest_start.saturating_sub(recent_limit);
        Self {
            summary,
            recent: turns[recent_start..latest_start].to_vec(),
            latest: turns[latest_start..].to_vec(),
        }
    }

    /// The user message sent alongside the extraction prompt.
    pub fn render(&self) -> String {
        format!(
            "Conversation Summary:\n{}\n\nRecent Messages:\n{}\n\nLatest Interaction:\n{}\n\nExtract memory facts.",
            self.summary,
            render_turns(&self.recent),
            render_turns(&self.latest),
        )
    }
}

fn render_turns(turns: &[ConversationTurn]) -> String {
    turns
        .iter()
        .map(|t| format!("{}: {}", t.role.to_string().to_uppercase(), t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the JSON-mode extraction request.
pub fn build_extraction_request(config: &MemoryConfig, window: &ExtractionWindow) -> ProviderRequest {
    ProviderRequest {
        model: config.chat_model.clone(),
        messages: vec![
            ProviderMessage::system(EXTRACTION_PROMPT),
            ProviderMessage::user(window.render()),
        ],
        temperature: config.extraction_temperature,
        tools: None,
        tool_choice: None,
        response_format: ResponseFormat::JsonObject,
    }
}

/// Run extraction. Service failures propagate; unparsable output yields empty sets.
pub async fn extract(
    provider: &dyn ProviderAdapter,
    config: &MemoryConfig,
    window: &ExtractionWindow,
) -> Result<ExtractedMemories, MnemosError> {
    let response = provider
        .complete(build_extraction_request(config, window))
        .await?;

    let content = response.content.unwrap_or_default();
    match parse_extraction_response(&content) {
        Some(extracted) => {
            debug!(
                semantic = extracted.semantic.len(),
                bubbles = extracted.bubbles.len(),
                "extraction complete"
            );
            Ok(extracted)
        }
        None => {
            metrics::counter!("mnemos_extraction_failures_total").increment(1);
            Ok(ExtractedMemories::default())
        }
    }
}

/// Parse the model's JSON answer, tolerating a surrounding code fence.
///
/// Returns `None` when the text is not the expected object.
pub fn parse_extraction_response(text: &str) -> Option<ExtractedMemories> {
    let trimmed = text.trim();
    let json_str = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<ExtractedMemories>(json_str) {
        Ok(mut extracted) => {
            extracted.semantic.retain(|fact| !fact.trim().is_empty());
            Some(extracted)
        }
        Err(e) => {
            warn!(error = %e, "failed to parse extraction response, treating as empty");
            None
        }
    }
}
