// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation log operations.

use std::str::FromStr;

use chrono::Utc;
use mnemos_core::{MnemosError, Role};
use rusqlite::params;

use super::sql_err;
use crate::database::Database;
use crate::models::StoredMessage;

/// Append turns to a conversation's log in one transaction.
///
/// Returns the conversation's total message count afterwards.
pub async fn append_messages(
    db: &Database,
    conversation_id: i64,
    turns: &[(Role, String)],
) -> Result<i64, MnemosError> {
    let turns = turns.to_vec();
    db.call(move |conn| {
        let tx = conn.transaction().map_err(sql_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO messages (conversation_id, role, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(sql_err)?;
            let now = Utc::now();
            for (role, content) in &turns {
                stmt.execute(params![conversation_id, role.to_string(), content, now])
                    .map_err(sql_err)?;
            }
        }
        let total = count_in(&tx, conversation_id)?;
        tx.commit().map_err(sql_err)?;
        Ok(total)
    })
    .await
}

/// Number of logged messages in a conversation.
pub async fn count_messages(db: &Database, conversation_id: i64) -> Result<i64, MnemosError> {
    db.call(move |conn| count_in(conn, conversation_id)).await
}

fn count_in(conn: &rusqlite::Connection, conversation_id: i64) -> Result<i64, MnemosError> {
    conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )
    .map_err(sql_err)
}

/// The first `limit` messages of a conversation, oldest first.
pub async fn oldest_messages(
    db: &Database,
    conversation_id: i64,
    limit: usize,
) -> Result<Vec<StoredMessage>, MnemosError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.call(move |conn| {
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY id ASC LIMIT ?2",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![conversation_id, limit], |row| {
                let role: String = row.get(2)?;
                let role = Role::from_str(&role).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(StoredMessage {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(sql_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
    })
    .await
}
