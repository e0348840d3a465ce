// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `mnemos doctor` command implementation.
//!
//! Runs diagnostic checks against the local setup to find configuration,
//! database and provider problems before the first `add`.

use std::time::Instant;

use mnemos_config::{MnemosConfig, ProviderConfig, StorageConfig};
use mnemos_core::{HealthStatus, MnemosError, PluginAdapter};
use mnemos_openai::OpenAiAdapter;
use mnemos_storage::SqliteStorage;
use serde::Serialize;

/// Status of a diagnostic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub duration_ms: u128,
}

fn from_health(name: &'static str, started: Instant, health: HealthStatus, ok: String) -> CheckResult {
    let (status, message) = match health {
        HealthStatus::Healthy => (CheckStatus::Pass, ok),
        HealthStatus::Degraded(msg) => (CheckStatus::Warn, msg),
        HealthStatus::Unhealthy(msg) => (CheckStatus::Fail, msg),
    };
    CheckResult {
        name,
        status,
        message,
        duration_ms: started.elapsed().as_millis(),
    }
}

fn failed(name: &'static str, started: Instant, err: &MnemosError) -> CheckResult {
    CheckResult {
        name,
        status: CheckStatus::Fail,
        message: err.to_string(),
        duration_ms: started.elapsed().as_millis(),
    }
}

/// Open the database, run migrations and an integrity check.
pub async fn check_database(config: &StorageConfig) -> CheckResult {
    let started = Instant::now();
    let storage = SqliteStorage::new(config.clone());
    let checked = async {
        storage.initialize().await?;
        let health = storage.health_check().await?;
        storage.shutdown().await?;
        Ok::<_, MnemosError>(health)
    }
    .await;
    match checked {
        Ok(health) => from_health(
            "database",
            started,
            health,
            format!("{} ok", config.database_path),
        ),
        Err(e) => failed("database", started, &e),
    }
}

/// Build the provider adapter. No request is sent.
pub async fn check_provider(config: &ProviderConfig) -> CheckResult {
    let started = Instant::now();
    let adapter = match OpenAiAdapter::new(config) {
        Ok(adapter) => adapter,
        Err(e) => return failed("provider", started, &e),
    };
    match adapter.health_check().await {
        Ok(health) => from_health(
            "provider",
            started,
            health,
            format!("{} configured", config.base_url),
        ),
        Err(e) => failed("provider", started, &e),
    }
}

/// Run all checks and print them as JSON. Fails if any check failed.
pub async fn run_doctor(config: &MnemosConfig) -> Result<(), MnemosError> {
    let config_check = CheckResult {
        name: "config",
        status: CheckStatus::Pass,
        message: "configuration is valid".to_string(),
        duration_ms: 0,
    };
    let results = vec![
        config_check,
        check_database(&config.storage).await,
        check_provider(&config.provider).await,
    ];

    let text = serde_json::to_string_pretty(&results)
        .map_err(|e| MnemosError::Internal(format!("failed to encode output: {e}")))?;
    println!("{text}");

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failures > 0 {
        return Err(MnemosError::Internal(format!("{failures} check(s) failed")));
    }
    Ok(())
}
