// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Range checks that serde attributes cannot express: similarity thresholds,
//! importance bounds, positive counts, and well-formed endpoints.

use crate::diagnostic::ConfigError;
use crate::model::MnemosConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &MnemosConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let level = config.agent.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(format!(
            "agent.log_level `{}` must be one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let base_url = config.provider.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "provider.base_url `{base_url}` must start with http:// or https://"
        ));
    }
    if config.provider.timeout_secs == 0 {
        fail("provider.timeout_secs must be greater than 0".to_string());
    }

    let memory = &config.memory;
    if memory.chat_model.trim().is_empty() {
        fail("memory.chat_model must not be empty".to_string());
    }
    if memory.embedding_model.trim().is_empty() {
        fail("memory.embedding_model must not be empty".to_string());
    }
    if !(-1.0..=1.0).contains(&memory.connection_threshold) {
        fail(format!(
            "memory.connection_threshold must be within [-1, 1], got {}",
            memory.connection_threshold
        ));
    }
    if !(0.0..=1.0).contains(&memory.default_importance) {
        fail(format!(
            "memory.default_importance must be within [0, 1], got {}",
            memory.default_importance
        ));
    }
    if !memory.recency_decay_rate.is_finite() || memory.recency_decay_rate < 0.0 {
        fail(format!(
            "memory.recency_decay_rate must be non-negative, got {}",
            memory.recency_decay_rate
        ));
    }
    for (name, temperature) in [
        ("extraction_temperature", memory.extraction_temperature),
        ("summary_temperature", memory.summary_temperature),
    ] {
        if !(0.0..=2.0).contains(&temperature) {
            fail(format!(
                "memory.{name} must be within [0, 2], got {temperature}"
            ));
        }
    }
    for (name, value) in [
        ("reconciliation_neighbors", memory.reconciliation_neighbors),
        ("default_search_limit", memory.default_search_limit),
        ("summary_every_messages", memory.summary_every_messages),
        ("summary_max_messages", memory.summary_max_messages),
    ] {
        if value == 0 {
            fail(format!("memory.{name} must be greater than 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &MnemosConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&MnemosConfig::default()).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = MnemosConfig::default();
        config.storage.database_path = "  ".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("database_path")));
    }

    #[test]
    fn out_of_range_threshold_and_importance_are_both_reported() {
        let mut config = MnemosConfig::default();
        config.memory.connection_threshold = 1.5;
        config.memory.default_importance = -0.1;
        let errors = messages(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("connection_threshold"));
        assert!(errors[1].contains("default_importance"));
    }

    #[test]
    fn nan_decay_rate_is_rejected() {
        let mut config = MnemosConfig::default();
        config.memory.recency_decay_rate = f64::NAN;
        assert!(messages(&config)[0].contains("recency_decay_rate"));
    }

    #[test]
    fn zero_counts_are_rejected() {
        let mut config = MnemosConfig::default();
        config.memory.default_search_limit = 0;
        config.memory.summary_every_messages = 0;
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("default_search_limit")));
        assert!(errors.iter().any(|m| m.contains("summary_every_messages")));
    }

    #[test]
    fn zero_connection_cap_is_allowed() {
        let mut config = MnemosConfig::default();
        config.memory.max_connections = 0;
        config.memory.max_connected_results = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut config = MnemosConfig::default();
        config.provider.base_url = "ftp://example.com".to_string();
        assert!(messages(&config)[0].contains("provider.base_url"));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = MnemosConfig::default();
        config.agent.log_level = "verbose".to_string();
        assert!(messages(&config)[0].contains("agent.log_level"));
    }
}
