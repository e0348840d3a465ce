// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock embedding adapter.
//!
//! Texts with a pinned vector get exactly that vector; any other text gets
//! a deterministic vector derived from a hash of its bytes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use mnemos_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use mnemos_core::{EmbeddingAdapter, MnemosError, PluginAdapter};

pub struct MockEmbedder {
    dimensions: usize,
    vectors: Mutex<HashMap<String, Vec<f32>>>,
    failure: Option<String>,
    fail_after: Option<usize>,
    requests: Arc<Mutex<Vec<EmbeddingInput>>>,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Mutex::new(HashMap::new()),
            failure: None,
            fail_after: None,
            requests: Arc::default(),
        }
    }

    /// Pin the vector returned for `text`.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.vectors.get_mut().insert(text.into(), vector);
        self
    }

    /// Fail every call with an embedding error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Succeed for the first `calls` requests, then fail.
    pub fn fail_after(mut self, calls: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some(calls);
        self.failure = Some(message.into());
        self
    }

    /// Pin a vector after construction.
    pub async fn set_vector(&self, text: impl Into<String>, vector: Vec<f32>) {
        self.vectors.lock().await.insert(text.into(), vector);
    }

    pub async fn requests(&self) -> Vec<EmbeddingInput> {
        self.requests.lock().await.clone()
    }

    /// The vector this embedder returns for `text`.
    pub async fn vector_for(&self, text: &str) -> Vec<f32> {
        match self.vectors.lock().await.get(text) {
            Some(v) => v.clone(),
            None => hashed_vector(text, self.dimensions),
        }
    }
}

/// FNV-1a over the text, one stream per dimension, mapped to [-1, 1].
fn hashed_vector(text: &str, dimensions: usize) -> Vec<f32> {
    (0..dimensions)
        .map(|i| {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ (i as u64).wrapping_mul(0x9e37_79b9);
            for byte in text.bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            (hash % 2001) as f32 / 1000.0 - 1.0
        })
        .collect()
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemosError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemosError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, MnemosError> {
        let calls_before = {
            let mut requests = self.requests.lock().await;
            requests.push(input.clone());
            requests.len() - 1
        };
        if let Some(message) = &self.failure
            && self.fail_after.is_none_or(|n| calls_before >= n)
        {
            return Err(MnemosError::embedding(message.clone()));
        }

        let mut embeddings = Vec::with_capacity(input.texts.len());
        for text in &input.texts {
            embeddings.push(self.vector_for(text).await);
        }
        let dimensions = embeddings.first().map_or(self.dimensions, Vec::len);
        Ok(EmbeddingOutput {
            embeddings,
            dimensions,
        })
    }
}
