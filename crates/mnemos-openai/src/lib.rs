// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible adapter for the Mnemos memory engine.
//!
//! This crate implements both [`ProviderAdapter`] (chat completions with
//! function tools or JSON mode) and [`EmbeddingAdapter`] (the embeddings
//! endpoint) over one HTTP client. Any service speaking the same API,
//! OpenRouter included, works through `provider.base_url`.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use mnemos_config::ProviderConfig;
use mnemos_core::types::{
    AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus, ProviderRequest,
    ProviderResponse, ResponseFormat, TokenUsage, ToolChoice,
};
use mnemos_core::{EmbeddingAdapter, MnemosError, PluginAdapter, ProviderAdapter};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{
    ChatMessage, ChatRequest, ChatTool, EmbeddingRequest, FunctionSpec, ResponseFormatSpec,
};

/// Chat and embedding adapter for OpenAI-compatible endpoints.
///
/// API key resolution order: `provider.api_key` -> `OPENAI_API_KEY` -> error.
pub struct OpenAiAdapter {
    client: OpenAiClient,
}

impl OpenAiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self, MnemosError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            MnemosError::Config(
                "no API key: set provider.api_key, MNEMOS_PROVIDER_API_KEY or OPENAI_API_KEY"
                    .to_string(),
            )
        })?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        info!(base_url = %client.base_url(), "OpenAI-compatible adapter initialized");
        Ok(Self { client })
    }

    /// Creates an adapter with an existing client.
    pub fn with_client(client: OpenAiClient) -> Self {
        Self { client }
    }
}

fn to_chat_request(request: &ProviderRequest) -> ChatRequest {
    let tools = request.tools.as_ref().filter(|t| !t.is_empty()).map(|tools| {
        tools
            .iter()
            .map(|t| ChatTool {
                tool_type: "function",
                function: FunctionSpec {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect::<Vec<_>>()
    });
    let tool_choice = tools.as_ref().and(request.tool_choice).map(|choice| {
        match choice {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
            ToolChoice::Required => "required",
        }
        .to_string()
    });
    let response_format = match request.response_format {
        ResponseFormat::Text => None,
        ResponseFormat::JsonObject => Some(ResponseFormatSpec {
            format_type: "json_object",
        }),
    };

    ChatRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
            .collect(),
        temperature: request.temperature,
        tools,
        tool_choice,
        response_format,
    }
}

#[async_trait]
impl PluginAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemosError> {
        // The client exists, so configuration was valid. No request is made.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemosError> {
        debug!("OpenAI-compatible adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MnemosError> {
        let response = self.client.chat(&to_chat_request(&request)).await?;
        let usage = response.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| MnemosError::provider("completion returned no choices"))?;

        Ok(ProviderResponse {
            id: response.id,
            model: response.model,
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
            usage,
        })
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiAdapter {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemosError> {
        let expected = input.texts.len();
        let mut response = self
            .client
            .embeddings(&EmbeddingRequest {
                model: input.model,
                input: input.texts,
            })
            .await?;
        if response.data.len() != expected {
            return Err(MnemosError::embedding(format!(
                "expected {expected} embeddings, got {}",
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);

        let embeddings: Vec<Vec<f32>> = response.data.into_iter().map(|d| d.embedding).collect();
        let dimensions = embeddings.first().map_or(0, Vec::len);
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mnemos_core::types::{ProviderMessage, ToolDefinition};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> OpenAiAdapter {
        let client = OpenAiClient::new("test-key", &server.uri(), Duration::from_secs(5), 0)
            .unwrap();
        OpenAiAdapter::with_client(client)
    }

    fn request(format: ResponseFormat, tools: Option<Vec<ToolDefinition>>) -> ProviderRequest {
        ProviderRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                ProviderMessage::system("You decide."),
                ProviderMessage::user("Candidate fact"),
            ],
            temperature: 0.0,
            tool_choice: tools.as_ref().map(|_| ToolChoice::Auto),
            tools,
            response_format: format,
        }
    }

    fn noop_tool() -> ToolDefinition {
        ToolDefinition {
            name: "noop".into(),
            description: "Do nothing".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn json_mode_maps_to_response_format() {
        let chat = to_chat_request(&request(ResponseFormat::JsonObject, None));
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn tools_map_to_function_tools() {
        let chat = to_chat_request(&request(ResponseFormat::Text, Some(vec![noop_tool()])));
        let json = serde_json::to_value(&chat).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "noop");
        assert_eq!(json["tool_choice"], "auto");
        assert!(json.get("response_format").is_none());
    }

    #[test]
    fn tool_choice_without_tools_is_dropped() {
        let mut req = request(ResponseFormat::Text, None);
        req.tool_choice = Some(ToolChoice::Required);
        assert!(to_chat_request(&req).tool_choice.is_none());
    }

    #[tokio::test]
    async fn complete_returns_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"tool_choice": "auto"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-9",
                "model": "gpt-4o-mini",
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "call_1", "type": "function",
                     "function": {"name": "delete_memory", "arguments": "{\"memory_id\": 3}"}}
                ]}}],
                "usage": {"prompt_tokens": 40, "completion_tokens": 8}
            })))
            .mount(&server)
            .await;

        let response = adapter(&server)
            .complete(request(ResponseFormat::Text, Some(vec![noop_tool()])))
            .await
            .unwrap();
        assert!(response.content.is_none());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].function.name, "delete_memory");
        assert_eq!(response.usage.input_tokens, 40);
    }

    #[tokio::test]
    async fn complete_without_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "x", "model": "m", "choices": []})),
            )
            .mount(&server)
            .await;

        let err = adapter(&server)
            .complete(request(ResponseFormat::JsonObject, None))
            .await
            .unwrap_err();
        assert!(matches!(err, MnemosError::Provider { .. }));
    }

    #[tokio::test]
    async fn embed_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(serde_json::json!({"model": "text-embedding-3-small"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [
                    {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                    {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let output = adapter(&server)
            .embed(EmbeddingInput {
                model: "text-embedding-3-small".into(),
                texts: vec!["a".into(), "b".into()],
            })
            .await
            .unwrap();
        assert_eq!(output.embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(output.dimensions, 2);
    }

    #[tokio::test]
    async fn embed_count_mismatch_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .mount(&server)
            .await;

        let err = adapter(&server)
            .embed(EmbeddingInput {
                model: "m".into(),
                texts: vec!["a".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MnemosError::Embedding { .. }));
    }

    #[test]
    fn blank_api_key_is_a_config_error() {
        let config = ProviderConfig {
            api_key: Some("  ".into()),
            ..ProviderConfig::default()
        };
        assert!(matches!(
            OpenAiAdapter::new(&config),
            Err(MnemosError::Config(_))
        ));
    }

    #[tokio::test]
    async fn health_check_makes_no_request() {
        let server = MockServer::start().await;
        let status = adapter(&server).health_check().await.unwrap();
        assert_eq!(status, HealthStatus::Healthy);
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
