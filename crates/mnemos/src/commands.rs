// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory subcommands: wiring and JSON output.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Subcommand;
use mnemos_config::MnemosConfig;
use mnemos_core::{MnemosError, PluginAdapter};
use mnemos_memory::{ContextMemory, ConversationTurn, MemoryStore, SearchOptions};
use mnemos_openai::OpenAiAdapter;
use mnemos_storage::SqliteStorage;
use serde::Serialize;
use tracing::debug;

/// Subcommands that operate on the memory store.
#[derive(Subcommand, Debug)]
pub enum MemoryCommand {
    /// Consolidate a conversation exchange into memory.
    Add {
        #[arg(short, long)]
        conversation: i64,
        /// The user's message.
        #[arg(long)]
        user: Option<String>,
        /// The assistant's reply.
        #[arg(long)]
        assistant: Option<String>,
        /// JSON array of `{"role", "text"}` turns; `-` reads stdin.
        #[arg(long, conflicts_with_all = ["user", "assistant"])]
        input: Option<PathBuf>,
        /// Do not append the turns to the conversation log.
        #[arg(long)]
        no_log: bool,
    },
    /// Search a conversation's memories.
    Search {
        #[arg(short, long)]
        conversation: i64,
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
        /// Leave out memories reached through the connection graph.
        #[arg(long)]
        no_connections: bool,
    },
    /// Replace the text of a memory.
    Update { memory_id: i64, text: String },
    /// Delete a memory.
    Delete { memory_id: i64 },
    /// Regenerate the rolling summary of a conversation.
    Summarize {
        #[arg(short, long)]
        conversation: i64,
    },
}

/// Open the database and connect the service adapter.
pub async fn build_memory(
    config: &MnemosConfig,
) -> Result<(ContextMemory, SqliteStorage), MnemosError> {
    let storage = SqliteStorage::new(config.storage.clone());
    let db = storage.initialize().await?;
    let adapter = Arc::new(OpenAiAdapter::new(&config.provider)?);
    let memory = ContextMemory::new(
        MemoryStore::new(db),
        adapter.clone(),
        adapter,
        config.memory.clone(),
    );
    Ok((memory, storage))
}

pub async fn run(command: MemoryCommand, config: &MnemosConfig) -> Result<(), MnemosError> {
    let (memory, storage) = build_memory(config).await?;
    let result = execute(command, &memory).await;
    storage.shutdown().await?;
    result
}

async fn execute(command: MemoryCommand, memory: &ContextMemory) -> Result<(), MnemosError> {
    match command {
        MemoryCommand::Add {
            conversation,
            user,
            assistant,
            input,
            no_log,
        } => {
            let turns = match input {
                Some(path) => read_turns(&path)?,
                None => inline_turns(user, assistant),
            };
            let summary = if no_log {
                None
            } else {
                memory.log_turns(conversation, &turns).await?
            };
            let added = memory.add(&turns, conversation).await?;
            print_json(&AddReport { added, summary })
        }
        MemoryCommand::Search {
            conversation,
            query,
            limit,
            no_connections,
        } => {
            let options = SearchOptions {
                limit,
                include_connections: !no_connections,
            };
            print_json(&memory.search(&query, conversation, options).await?)
        }
        MemoryCommand::Update { memory_id, text } => print_json(&memory.update(memory_id, &text).await?),
        MemoryCommand::Delete { memory_id } => print_json(&memory.delete(memory_id).await?),
        MemoryCommand::Summarize { conversation } => {
            let summary = memory.summarize(conversation).await?;
            let messages = memory.message_count(conversation).await?;
            print_json(&serde_json::json!({
                "conversation_id": conversation,
                "messages": messages,
                "summary": summary,
            }))
        }
    }
}

#[derive(Serialize)]
struct AddReport {
    #[serde(flatten)]
    added: mnemos_memory::AddOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

fn inline_turns(user: Option<String>, assistant: Option<String>) -> Vec<ConversationTurn> {
    user.map(ConversationTurn::user)
        .into_iter()
        .chain(assistant.map(ConversationTurn::assistant))
        .collect()
}

fn read_turns(path: &Path) -> Result<Vec<ConversationTurn>, MnemosError> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| MnemosError::Internal(format!("failed to read stdin: {e}")))?;
        buf
    } else {
        std::fs::read_to_string(path).map_err(|e| {
            MnemosError::Internal(format!("failed to read {}: {e}", path.display()))
        })?
    };
    let turns = parse_turns(&raw)?;
    debug!(turns = turns.len(), "read conversation turns");
    Ok(turns)
}

fn parse_turns(raw: &str) -> Result<Vec<ConversationTurn>, MnemosError> {
    serde_json::from_str(raw)
        .map_err(|e| MnemosError::Internal(format!("invalid turns JSON: {e}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), MnemosError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MnemosError::Internal(format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::Role;

    #[test]
    fn inline_turns_keep_order_and_skip_missing() {
        let turns = inline_turns(Some("hi".into()), Some("hello".into()));
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(inline_turns(Some("hi".into()), None).len(), 1);
        assert!(inline_turns(None, None).is_empty());
    }

    #[test]
    fn turns_parse_from_json() {
        let turns = parse_turns(
            r#"[{"role": "user", "text": "I like tea"}, {"role": "assistant", "text": "Noted"}]"#,
        )
        .unwrap();
        assert_eq!(turns, vec![ConversationTurn::user("I like tea"), ConversationTurn::assistant("Noted")]);
        assert!(parse_turns(r#"[{"role": "robot", "text": "x"}]"#).is_err());
    }

    #[test]
    fn turns_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.json");
        std::fs::write(&path, r#"[{"role": "user", "text": "hello"}]"#).unwrap();
        assert_eq!(read_turns(&path).unwrap().len(), 1);
        assert!(read_turns(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn add_report_flattens_outcome() {
        let report = AddReport {
            added: mnemos_memory::AddOutcome {
                semantic: vec!["User likes tea".into()],
                bubbles: vec![],
            },
            summary: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["semantic"][0], "User likes tea");
        assert!(json.get("summary").is_none());
    }
}
