// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock text-generation adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` by replaying queued
//! responses in FIFO order and recording every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mnemos_core::types::{
    AdapterType, FunctionCall, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
    ToolCall,
};
use mnemos_core::{MnemosError, PluginAdapter, ProviderAdapter};

/// A plain text completion.
pub fn text_response(content: impl Into<String>) -> ProviderResponse {
    ProviderResponse {
        id: "mock-resp".to_string(),
        model: "mock-model".to_string(),
        content: Some(content.into()),
        tool_calls: Vec::new(),
        usage: TokenUsage {
            input_tokens: 10,
            output_tokens: 20,
        },
    }
}

/// A completion consisting of a single tool call.
pub fn tool_call_response(name: &str, arguments: serde_json::Value) -> ProviderResponse {
    ProviderResponse {
        content: None,
        tool_calls: vec![ToolCall {
            id: "call_mock".to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
        ..text_response("")
    }
}

/// An extraction answer with the given semantic facts and `(text, importance)` bubbles.
pub fn extraction_response(semantic: &[&str], bubbles: &[(&str, f64)]) -> ProviderResponse {
    let bubbles: Vec<serde_json::Value> = bubbles
        .iter()
        .map(|(text, importance)| serde_json::json!({ "text": text, "importance": importance }))
        .collect();
    text_response(serde_json::json!({ "semantic": semantic, "bubbles": bubbles }).to_string())
}

type Queued = Result<ProviderResponse, String>;

/// A mock provider that returns pre-configured responses.
///
/// An exhausted queue is a provider error, so a test fails loudly when the
/// pipeline makes more calls than it scripted.
#[derive(Default)]
pub struct MockProvider {
    responses: Arc<Mutex<VecDeque<Queued>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock provider pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            requests: Arc::default(),
        }
    }

    pub async fn push_response(&self, response: ProviderResponse) {
        self.responses.lock().await.push_back(Ok(response));
    }

    /// Queue a failure, returned as [`MnemosError::Provider`].
    pub async fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().await.push_back(Err(message.into()));
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemosError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemosError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MnemosError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);
        match self.responses.lock().await.pop_front() {
            Some(Ok(response)) => Ok(ProviderResponse { model, ..response }),
            Some(Err(message)) => Err(MnemosError::provider(message)),
            None => Err(MnemosError::provider("mock provider has no queued response")),
        }
    }
}
