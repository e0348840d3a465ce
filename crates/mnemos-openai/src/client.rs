// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible APIs.
//!
//! Provides [`OpenAiClient`] which handles bearer authentication, JSON
//! request/response handling and retry of transient errors for the chat
//! completions and embeddings endpoints.

use std::time::Duration;

use mnemos_core::MnemosError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::types::{
    ApiErrorResponse, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse,
};

/// Which service an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Service {
    Chat,
    Embeddings,
}

impl Service {
    fn path(self) -> &'static str {
        match self {
            Service::Chat => "chat/completions",
            Service::Embeddings => "embeddings",
        }
    }

    fn error(
        self,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> MnemosError {
        match self {
            Service::Chat => MnemosError::Provider { message, source },
            Service::Embeddings => MnemosError::Embedding { message, source },
        }
    }
}

/// HTTP client for an OpenAI-compatible endpoint.
///
/// Retries 429, 500, 502 and 503 responses up to `max_retries` times.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl OpenAiClient {
    /// Creates a client authenticating with `api_key` against `base_url`
    /// (for example `https://api.openai.com/v1`).
    pub fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> Result<Self, MnemosError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| MnemosError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| MnemosError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Overrides the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Overrides the delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, MnemosError> {
        self.post(Service::Chat, request).await
    }

    pub async fn embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingResponse, MnemosError> {
        self.post(Service::Embeddings, request).await
    }

    async fn post<Req, Resp>(&self, service: Service, body: &Req) -> Result<Resp, MnemosError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, service.path());
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, endpoint = service.path(), "retrying request after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| self.transport_error(service, "HTTP request failed", e))?;

            let status = response.status();
            debug!(status = %status, attempt, endpoint = service.path(), "response received");

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| self.transport_error(service, "failed to read response body", e))?;
                return serde_json::from_str(&text).map_err(|e| {
                    service.error(format!("failed to parse API response: {e}"), Some(Box::new(e)))
                });
            }

            let text = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %text, "transient error, will retry");
                last_error = Some(service.error(format!("API returned {status}: {text}"), None));
                continue;
            }

            // Non-transient error or exhausted retries.
            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!(
                    "API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {text}"),
            };
            return Err(service.error(message, None));
        }

        Err(last_error
            .unwrap_or_else(|| service.error("request failed after retries".to_string(), None)))
    }

    /// Timeouts become [`MnemosError::Timeout`]; everything else is a service error.
    fn transport_error(&self, service: Service, context: &str, e: reqwest::Error) -> MnemosError {
        if e.is_timeout() {
            return MnemosError::Timeout {
                duration: self.timeout,
            };
        }
        service.error(format!("{context}: {e}"), Some(Box::new(e)))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new("test-api-key", base_url, Duration::from_secs(5), 1)
            .unwrap()
            .with_retry_delay(Duration::from_millis(10))
    }

    fn chat_request() -> ChatRequest {
        ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "Hello".into(),
            }],
            temperature: 0.1,
            tools: None,
            tool_choice: None,
            response_format: None,
        }
    }

    fn chat_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-test",
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5}
        })
    }

    #[tokio::test]
    async fn chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Hi there!")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let response = client.chat(&chat_request()).await.unwrap();
        assert_eq!(response.id, "chatcmpl-test");
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Hi there!"));
    }

    #[tokio::test]
    async fn sends_bearer_auth_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-api-key"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("ok")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.chat(&chat_request()).await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }

    #[tokio::test]
    async fn retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"type": "rate_limit_error", "message": "Rate limited"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("After retry")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let response = client.chat(&chat_request()).await.unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("After retry"));
    }

    #[tokio::test]
    async fn fails_on_401_with_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "Incorrect API key"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.chat(&chat_request()).await.unwrap_err();
        assert!(matches!(err, MnemosError::Provider { .. }));
        let msg = err.to_string();
        assert!(msg.contains("invalid_request_error"), "got: {msg}");
        assert!(msg.contains("Incorrect API key"), "got: {msg}");
    }

    #[tokio::test]
    async fn exhausts_retries_on_503() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.chat(&chat_request()).await.unwrap_err();
        assert!(err.to_string().contains("503"), "got: {err}");
    }

    #[tokio::test]
    async fn embedding_errors_are_embedding_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "input too long"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .embeddings(&EmbeddingRequest {
                model: "text-embedding-3-small".into(),
                input: vec!["x".into()],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MnemosError::Embedding { .. }));
    }

    #[tokio::test]
    async fn malformed_success_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.chat(&chat_request()).await.unwrap_err();
        assert!(err.to_string().contains("failed to parse"), "got: {err}");
    }

    #[tokio::test]
    async fn slow_response_is_a_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": []}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = OpenAiClient::new("k", &server.uri(), Duration::from_millis(100), 0).unwrap();
        let err = client
            .embeddings(&EmbeddingRequest {
                model: "text-embedding-3-small".into(),
                input: vec!["x".into()],
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, MnemosError::Timeout { duration } if duration == Duration::from_millis(100)),
            "got: {err}"
        );
        assert!(err.is_external_service());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = OpenAiClient::new("k", "https://example.com/v1/", Duration::from_secs(1), 0)
            .unwrap();
        assert_eq!(client.base_url(), "https://example.com/v1");
    }
}
