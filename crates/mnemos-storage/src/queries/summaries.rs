// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling conversation summary operations.

use chrono::Utc;
use mnemos_core::MnemosError;
use rusqlite::{OptionalExtension, params};

use super::sql_err;
use crate::database::Database;
use crate::models::ConversationSummary;

/// Fetch the stored summary for a conversation, if one exists.
pub async fn get_summary(
    db: &Database,
    conversation_id: i64,
) -> Result<Option<ConversationSummary>, MnemosError> {
    db.call(move |conn| {
        conn.query_row(
            "SELECT conversation_id, summary_text, updated_at
             FROM conversation_summaries WHERE conversation_id = ?1",
            [conversation_id],
            |row| {
                Ok(ConversationSummary {
                    conversation_id: row.get(0)?,
                    summary_text: row.get(1)?,
                    updated_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(sql_err)
    })
    .await
}

/// Insert or replace the summary for a conversation.
pub async fn upsert_summary(
    db: &Database,
    conversation_id: i64,
    summary_text: &str,
) -> Result<(), MnemosError> {
    let summary_text = summary_text.to_string();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO conversation_summaries (conversation_id, summary_text, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(conversation_id) DO UPDATE SET
                 summary_text = excluded.summary_text,
                 updated_at = excluded.updated_at",
            params![conversation_id, summary_text, Utc::now()],
        )
        .map_err(sql_err)?;
        Ok(())
    })
    .await
}
