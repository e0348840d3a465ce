// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed memory store with BLOB embeddings and typed metadata.
//!
//! Reads outside a transaction go through [`MemoryStore`]; every write in the
//! pipeline goes through a [`MemoryTxn`] so a batch commits or rolls back as
//! a unit.

use chrono::Utc;
use mnemos_core::MnemosError;
use mnemos_storage::{Database, Transaction};
use rusqlite::{OptionalExtension, Row, params};
use tracing::debug;

use crate::types::{MemoryMetadata, MemoryRecord, NewMemory, blob_to_vec, vec_to_blob};

const SELECT_COLUMNS: &str = "SELECT id, conversation_id, memory_text, category, embedding, \
     is_episodic, occurred_at, session_id, importance, is_active, metadata, created_at, updated_at \
     FROM memories";

fn sql_err(e: rusqlite::Error) -> MnemosError {
    MnemosError::Storage {
        source: Box::new(e),
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let id: i64 = row.get(0)?;
    let embedding: Option<Vec<u8>> = row.get(4)?;
    let metadata: String = row.get(10)?;
    Ok(MemoryRecord {
        id,
        conversation_id: row.get(1)?,
        text: row.get(2)?,
        category: row.get(3)?,
        embedding: embedding.map(|blob| blob_to_vec(&blob)),
        is_episodic: row.get(5)?,
        occurred_at: row.get(6)?,
        session_id: row.get(7)?,
        importance: row.get(8)?,
        is_active: row.get(9)?,
        metadata: MemoryMetadata::parse(id, &metadata),
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn encode_metadata(metadata: &MemoryMetadata) -> Result<String, MnemosError> {
    serde_json::to_string(metadata)
        .map_err(|e| MnemosError::Internal(format!("failed to encode memory metadata: {e}")))
}

fn insert_row(conn: &rusqlite::Connection, memory: &NewMemory) -> Result<i64, MnemosError> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO memories (conversation_id, memory_text, category, embedding, is_episodic, \
         occurred_at, session_id, importance, is_active, metadata, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, '{}', ?9, ?9)",
        params![
            memory.conversation_id,
            memory.text,
            memory.category,
            vec_to_blob(&memory.embedding),
            memory.is_episodic,
            memory.occurred_at,
            memory.session_id,
            memory.importance,
            now,
        ],
    )
    .map_err(sql_err)?;
    Ok(conn.last_insert_rowid())
}

fn get_row(conn: &rusqlite::Connection, id: i64) -> Result<Option<MemoryRecord>, MnemosError> {
    conn.query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], row_to_record)
        .optional()
        .map_err(sql_err)
}

fn list_active_rows(
    conn: &rusqlite::Connection,
    conversation_id: i64,
) -> Result<Vec<MemoryRecord>, MnemosError> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_COLUMNS} WHERE conversation_id = ?1 AND is_active = 1 ORDER BY id ASC"
        ))
        .map_err(sql_err)?;
    let rows = stmt
        .query_map([conversation_id], row_to_record)
        .map_err(sql_err)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)
}

fn update_content_row(
    conn: &rusqlite::Connection,
    id: i64,
    text: &str,
    embedding: &[f32],
) -> Result<bool, MnemosError> {
    let changed = conn
        .execute(
            "UPDATE memories SET memory_text = ?1, embedding = ?2, updated_at = ?3 WHERE id = ?4",
            params![text, vec_to_blob(embedding), Utc::now(), id],
        )
        .map_err(sql_err)?;
    Ok(changed > 0)
}

fn update_metadata_row(
    conn: &rusqlite::Connection,
    id: i64,
    metadata: &MemoryMetadata,
) -> Result<bool, MnemosError> {
    let changed = conn
        .execute(
            "UPDATE memories SET metadata = ?1, updated_at = ?2 WHERE id = ?3",
            params![encode_metadata(metadata)?, Utc::now(), id],
        )
        .map_err(sql_err)?;
    Ok(changed > 0)
}

/// Hard-delete a row and unlink it from every memory in its conversation.
fn delete_row(conn: &rusqlite::Connection, id: i64) -> Result<bool, MnemosError> {
    let Some(conversation_id) = conn
        .query_row(
            "SELECT conversation_id FROM memories WHERE id = ?1",
            [id],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map_err(sql_err)?
    else {
        return Ok(false);
    };

    conn.execute("DELETE FROM memories WHERE id = ?1", [id])
        .map_err(sql_err)?;

    let linked: Vec<(i64, String)> = {
        let mut stmt = conn
            .prepare("SELECT id, metadata FROM memories WHERE conversation_id = ?1")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([conversation_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(sql_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(sql_err)?
    };

    let mut pruned = 0usize;
    for (other_id, raw) in linked {
        let mut metadata = MemoryMetadata::parse(other_id, &raw);
        if metadata.connections.remove(id) {
            update_metadata_row(conn, other_id, &metadata)?;
            pruned += 1;
        }
    }
    debug!(memory_id = id, pruned, "deleted memory");
    Ok(true)
}

fn set_active_row(conn: &rusqlite::Connection, id: i64, active: bool) -> Result<bool, MnemosError> {
    let changed = conn
        .execute(
            "UPDATE memories SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, Utc::now(), id],
        )
        .map_err(sql_err)?;
    Ok(changed > 0)
}

/// Persistent store for memories.
#[derive(Clone)]
pub struct MemoryStore {
    db: Database,
}

impl MemoryStore {
    /// Wrap an opened database (migrations already applied).
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Open a transaction for a batch of writes.
    pub async fn begin(&self) -> Result<MemoryTxn, MnemosError> {
        Ok(MemoryTxn {
            tx: self.db.begin().await?,
        })
    }

    /// Load a memory by id, active or not.
    pub async fn get(&self, id: i64) -> Result<Option<MemoryRecord>, MnemosError> {
        self.db.call(move |conn| get_row(conn, id)).await
    }

    /// All active memories of a conversation, in id order.
    pub async fn list_active(&self, conversation_id: i64) -> Result<Vec<MemoryRecord>, MnemosError> {
        self.db
            .call(move |conn| list_active_rows(conn, conversation_id))
            .await
    }

    /// Toggle the exclusion flag. Returns false if the id does not exist.
    pub async fn set_active(&self, id: i64, active: bool) -> Result<bool, MnemosError> {
        self.db
            .call(move |conn| set_active_row(conn, id, active))
            .await
    }
}

/// A write batch against the memory table.
///
/// Inserted ids are available immediately. Dropping without
/// [`commit`](MemoryTxn::commit) discards every change.
pub struct MemoryTxn {
    tx: Transaction,
}

impl MemoryTxn {
    /// Insert and return the new id ("flush without commit").
    pub async fn insert(&self, memory: NewMemory) -> Result<i64, MnemosError> {
        self.tx.call(move |conn| insert_row(conn, &memory)).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<MemoryRecord>, MnemosError> {
        self.tx.call(move |conn| get_row(conn, id)).await
    }

    /// Active memories of a conversation as seen inside this transaction.
    pub async fn list_active(&self, conversation_id: i64) -> Result<Vec<MemoryRecord>, MnemosError> {
        self.tx
            .call(move |conn| list_active_rows(conn, conversation_id))
            .await
    }

    /// Replace text and embedding. Returns false if the id does not exist.
    pub async fn update_content(
        &self,
        id: i64,
        text: String,
        embedding: Vec<f32>,
    ) -> Result<bool, MnemosError> {
        self.tx
            .call(move |conn| update_content_row(conn, id, &text, &embedding))
            .await
    }

    /// Replace the metadata column. Returns false if the id does not exist.
    pub async fn update_metadata(
        &self,
        id: i64,
        metadata: MemoryMetadata,
    ) -> Result<bool, MnemosError> {
        self.tx
            .call(move |conn| update_metadata_row(conn, id, &metadata))
            .await
    }

    /// Hard-delete and prune connection references. Returns false if absent.
    pub async fn delete(&self, id: i64) -> Result<bool, MnemosError> {
        self.tx.call(move |conn| delete_row(conn, id)).await
    }

    pub async fn commit(self) -> Result<(), MnemosError> {
        self.tx.commit().await
    }

    pub async fn rollback(self) -> Result<(), MnemosError> {
        self.tx.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> MemoryStore {
        MemoryStore::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn insert_is_visible_before_commit_and_after() {
        let store = store().await;
        let txn = store.begin().await.unwrap();
        let id = txn
            .insert(NewMemory::semantic(1, "User likes tea", vec![1.0, 0.0]))
            .await
            .unwrap();
        let inside = txn.get(id).await.unwrap().unwrap();
        assert_eq!(inside.text, "User likes tea");
        txn.commit().await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.embedding, Some(vec![1.0, 0.0]));
        assert!(record.is_active);
        assert!(!record.is_episodic);
        assert!(record.importance.is_none());
        assert!(record.metadata.connections.is_empty());
    }

    #[tokio::test]
    async fn ids_are_monotonic_and_not_reused() {
        let store = store().await;
        let txn = store.begin().await.unwrap();
        let a = txn.insert(NewMemory::semantic(1, "a", vec![1.0])).await.unwrap();
        let b = txn.insert(NewMemory::semantic(1, "b", vec![1.0])).await.unwrap();
        assert!(b > a);
        txn.delete(b).await.unwrap();
        let c = txn.insert(NewMemory::semantic(1, "c", vec![1.0])).await.unwrap();
        assert!(c > b);
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn dropped_txn_discards_writes() {
        let store = store().await;
        {
            let txn = store.begin().await.unwrap();
            txn.insert(NewMemory::semantic(1, "gone", vec![1.0]))
                .await
                .unwrap();
        }
        assert!(store.list_active(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_active_is_scoped_and_excludes_inactive() {
        let store = store().await;
        let txn = store.begin().await.unwrap();
        let a = txn.insert(NewMemory::semantic(1, "a", vec![1.0])).await.unwrap();
        let b = txn.insert(NewMemory::semantic(1, "b", vec![1.0])).await.unwrap();
        txn.insert(NewMemory::semantic(2, "other", vec![1.0]))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert!(store.set_active(a, false).await.unwrap());
        let active = store.list_active(1).await.unwrap();
        assert_eq!(active.iter().map(|m| m.id).collect::<Vec<_>>(), vec![b]);
        assert!(!store.get(a).await.unwrap().unwrap().is_active);
        assert!(!store.set_active(999, false).await.unwrap());
    }

    #[tokio::test]
    async fn update_content_refreshes_timestamp() {
        let store = store().await;
        let txn = store.begin().await.unwrap();
        let id = txn.insert(NewMemory::semantic(1, "old", vec![1.0, 0.0])).await.unwrap();
        txn.commit().await.unwrap();
        let before = store.get(id).await.unwrap().unwrap();

        let txn = store.begin().await.unwrap();
        assert!(txn
            .update_content(id, "new".into(), vec![0.0, 1.0])
            .await
            .unwrap());
        assert!(!txn.update_content(999, "x".into(), vec![1.0]).await.unwrap());
        txn.commit().await.unwrap();

        let after = store.get(id).await.unwrap().unwrap();
        assert_eq!(after.text, "new");
        assert_eq!(after.embedding, Some(vec![0.0, 1.0]));
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.created_at, before.created_at);
    }

    #[tokio::test]
    async fn delete_prunes_links_in_neighbours() {
        let store = store().await;
        let now = Utc::now();
        let txn = store.begin().await.unwrap();
        let a = txn
            .insert(NewMemory::bubble(1, "a", vec![1.0], 0.7, now))
            .await
            .unwrap();
        let b = txn
            .insert(NewMemory::bubble(1, "b", vec![1.0], 0.7, now))
            .await
            .unwrap();
        let c = txn
            .insert(NewMemory::bubble(1, "c", vec![1.0], 0.7, now))
            .await
            .unwrap();

        let mut meta_a = MemoryMetadata::default();
        meta_a.connections.insert(b, 0.9);
        meta_a.connections.insert(c, 0.8);
        txn.update_metadata(a, meta_a).await.unwrap();
        let mut meta_b = MemoryMetadata::default();
        meta_b.connections.insert(a, 0.9);
        txn.update_metadata(b, meta_b).await.unwrap();

        assert!(txn.delete(a).await.unwrap());
        assert!(!txn.delete(a).await.unwrap());
        txn.commit().await.unwrap();

        assert!(store.get(a).await.unwrap().is_none());
        let b = store.get(b).await.unwrap().unwrap();
        assert!(b.metadata.connections.is_empty());
        assert!(store.get(c).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn metadata_extra_keys_survive_rewrites() {
        let store = store().await;
        let txn = store.begin().await.unwrap();
        let id = txn.insert(NewMemory::semantic(1, "a", vec![1.0])).await.unwrap();
        let mut meta = MemoryMetadata::default();
        meta.extra
            .insert("source".into(), serde_json::Value::from("import"));
        meta.connections.insert(42, 0.612);
        txn.update_metadata(id, meta.clone()).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(store.get(id).await.unwrap().unwrap().metadata, meta);
    }
}
