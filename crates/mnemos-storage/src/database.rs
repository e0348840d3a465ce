// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and transactions.
//!
//! All statements run on tokio-rusqlite's single background thread. A
//! store-wide async gate orders autocommit statements and explicit
//! transactions, so statements from one task never land inside another
//! task's open transaction. Do NOT create additional Connection instances.

use std::sync::Arc;

use mnemos_core::MnemosError;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

/// Convert a tokio-rusqlite error into [`MnemosError::Storage`].
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> MnemosError {
    MnemosError::Storage {
        source: Box::new(e),
    }
}

/// Unwrap a [`MnemosError`] returned from inside a `call` closure.
///
/// Closures that need to fail with a domain error (bad JSON, a missing row)
/// return `MnemosError` directly; connection-level failures become `Storage`.
pub fn flatten_call_err(e: tokio_rusqlite::Error<MnemosError>) -> MnemosError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        other => MnemosError::Storage {
            source: other.to_string().into(),
        },
    }
}

/// Shared handle to the Mnemos SQLite database.
///
/// Cloning is cheap; clones share the background thread and the gate.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    gate: Arc<Mutex<()>>,
}

impl Database {
    /// Open (or create) a file-backed database with WAL mode, then run migrations.
    pub async fn open(path: &str) -> Result<Self, MnemosError> {
        Self::open_with(path, true).await
    }

    /// Open a file-backed database, choosing the journal mode explicitly.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, MnemosError> {
        if let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| MnemosError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| MnemosError::Storage {
                source: Box::new(e),
            })?;
        let db = Self::init(conn, wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// Open a private in-memory database with the full schema applied.
    pub async fn open_in_memory() -> Result<Self, MnemosError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| MnemosError::Storage {
                source: Box::new(e),
            })?;
        Self::init(conn, false).await
    }

    async fn init(conn: tokio_rusqlite::Connection, wal_mode: bool) -> Result<Self, MnemosError> {
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")?;
            if wal_mode {
                // journal_mode returns a row, so it cannot go through execute_batch.
                let mode: String =
                    conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
                if !mode.eq_ignore_ascii_case("wal") {
                    warn!(mode = %mode, "WAL mode not available, continuing with default journal");
                }
                conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
            }
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        conn.call(|conn| Ok(crate::migrations::run_migrations(conn)))
            .await
            .map_err(map_tr_err)??;

        Ok(Self {
            conn,
            gate: Arc::new(Mutex::new(())),
        })
    }

    /// Raw connection, for code that manages ordering itself (tests, maintenance).
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Run one autocommit unit of work once no transaction is open.
    pub async fn call<F, R>(&self, function: F) -> Result<R, MnemosError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, MnemosError> + Send + 'static,
        R: Send + 'static,
    {
        let _guard = self.gate.lock().await;
        self.conn.call(function).await.map_err(flatten_call_err)
    }

    /// Start an explicit `BEGIN IMMEDIATE` transaction.
    ///
    /// Holds the gate until the returned [`Transaction`] commits, rolls back,
    /// or is dropped.
    pub async fn begin(&self) -> Result<Transaction, MnemosError> {
        let guard = self.gate.clone().lock_owned().await;
        self.conn
            .call(|conn| conn.execute_batch("BEGIN IMMEDIATE"))
            .await
            .map_err(map_tr_err)?;
        Ok(Transaction {
            conn: self.conn.clone(),
            guard: Some(guard),
        })
    }

    /// Checkpoint the WAL so the main database file is self-contained.
    pub async fn checkpoint(&self) -> Result<(), MnemosError> {
        let _guard = self.gate.lock().await;
        self.conn
            .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint and release the connection.
    pub async fn close(self) -> Result<(), MnemosError> {
        self.checkpoint().await?;
        self.conn.close().await.map_err(|e| MnemosError::Storage {
            source: Box::new(e),
        })
    }
}

/// An open SQLite transaction holding the database gate.
///
/// Statements issued through [`Transaction::call`] see each other's effects
/// (inserted ids are available before commit). Dropping without
/// [`commit`](Transaction::commit) rolls back.
pub struct Transaction {
    conn: tokio_rusqlite::Connection,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Transaction {
    /// Run statements inside the transaction.
    pub async fn call<F, R>(&self, function: F) -> Result<R, MnemosError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R, MnemosError> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(function).await.map_err(flatten_call_err)
    }

    /// Make all staged changes durable.
    pub async fn commit(mut self) -> Result<(), MnemosError> {
        let result = self
            .conn
            .call(|conn| conn.execute_batch("COMMIT"))
            .await
            .map_err(map_tr_err);
        if result.is_err() {
            // Leave the drop handler to roll back the still-open transaction.
            return result;
        }
        self.guard.take();
        Ok(())
    }

    /// Discard all staged changes.
    pub async fn rollback(mut self) -> Result<(), MnemosError> {
        let result = self
            .conn
            .call(|conn| conn.execute_batch("ROLLBACK"))
            .await
            .map_err(map_tr_err);
        self.guard.take();
        result
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        let conn = self.conn.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.call(|conn| conn.execute_batch("ROLLBACK")).await {
                        warn!(error = %e, "rollback of abandoned transaction failed");
                    }
                    drop(guard);
                });
            }
            Err(_) => warn!("transaction dropped outside a runtime; rollback skipped"),
        }
    }
}
