// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row types for the conversation log tables.
//!
//! Memory rows are owned by `mnemos-memory`, which parses them into its
//! own typed records.

use chrono::{DateTime, Utc};
use mnemos_core::Role;

/// One logged conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The rolling summary for one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    pub summary_text: String,
    pub updated_at: DateTime<Utc>,
}
