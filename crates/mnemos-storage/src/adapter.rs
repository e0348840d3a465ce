// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite storage exposed as a [`PluginAdapter`] for health reporting.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use mnemos_config::model::StorageConfig;
use mnemos_core::{AdapterType, HealthStatus, MnemosError, PluginAdapter};

use crate::database::Database;

/// Lazily opened SQLite storage.
///
/// The database file is not touched until [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Open the configured database and run migrations.
    pub async fn initialize(&self) -> Result<Database, MnemosError> {
        let db = self
            .db
            .get_or_try_init(|| Database::open_with(&self.config.database_path, self.config.wal_mode))
            .await?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(db.clone())
    }

    /// The opened database, or an error if [`initialize`](Self::initialize) was not called.
    pub fn database(&self) -> Result<&Database, MnemosError> {
        self.db.get().ok_or_else(|| MnemosError::Storage {
            source: "storage not initialized, call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemosError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("not initialized".to_string()));
        };
        let check: Result<String, MnemosError> = db
            .call(|conn| {
                conn.query_row("PRAGMA quick_check", [], |row| row.get(0))
                    .map_err(crate::queries::sql_err)
            })
            .await;
        Ok(match check {
            Ok(result) if result == "ok" => HealthStatus::Healthy,
            Ok(result) => HealthStatus::Degraded(result),
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        })
    }

    async fn shutdown(&self) -> Result<(), MnemosError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}
