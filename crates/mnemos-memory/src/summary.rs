// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling conversation summaries.
//!
//! The summary is regenerated from the oldest part of the conversation log
//! and fed back into extraction as long-range context.

use mnemos_config::MemoryConfig;
use mnemos_core::types::{ProviderMessage, ProviderRequest, ResponseFormat};
use mnemos_core::{MnemosError, ProviderAdapter};
use mnemos_storage::Database;
use mnemos_storage::StoredMessage;
use mnemos_storage::queries::{messages, summaries};
use tracing::info;

const SUMMARY_PROMPT: &str = "Summarize the conversation below in a short paragraph. \
Keep what matters for understanding the user later: who they are, what they work on, \
their preferences, open problems and decisions. Skip greetings and small talk.";

/// Whether a log of `total` messages is due for a new summary.
pub fn summary_due(total: i64, every: usize) -> bool {
    let every = i64::try_from(every).unwrap_or(i64::MAX);
    total > 0 && every > 0 && total % every == 0
}

pub fn build_summary_request(config: &MemoryConfig, log: &[StoredMessage]) -> ProviderRequest {
    let transcript = log
        .iter()
        .map(|m| format!("{}: {}", m.role.to_string().to_uppercase(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    ProviderRequest {
        model: config.chat_model.clone(),
        messages: vec![
            ProviderMessage::system(SUMMARY_PROMPT),
            ProviderMessage::user(transcript),
        ],
        temperature: config.summary_temperature,
        tools: None,
        tool_choice: None,
        response_format: ResponseFormat::Text,
    }
}

/// Regenerate and store the summary of one conversation.
///
/// Returns `None` without calling the provider when the log is empty.
pub async fn regenerate_summary(
    db: &Database,
    provider: &dyn ProviderAdapter,
    config: &MemoryConfig,
    conversation_id: i64,
) -> Result<Option<String>, MnemosError> {
    let log = messages::oldest_messages(db, conversation_id, config.summary_max_messages).await?;
    if log.is_empty() {
        return Ok(None);
    }

    let response = provider
        .complete(build_summary_request(config, &log))
        .await?;
    let summary = response.content.unwrap_or_default().trim().to_string();
    summaries::upsert_summary(db, conversation_id, &summary).await?;

    info!(conversation_id, messages = log.len(), "conversation summary updated");
    Ok(Some(summary))
}

/// The stored summary text, or the empty string.
pub async fn current_summary(db: &Database, conversation_id: i64) -> Result<String, MnemosError> {
    Ok(summaries::get_summary(db, conversation_id)
        .await?
        .map(|s| s.summary_text)
        .unwrap_or_default())
}
