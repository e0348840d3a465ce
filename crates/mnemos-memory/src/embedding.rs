// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-to-vector gateway over an [`EmbeddingAdapter`].

use std::sync::Arc;

use mnemos_core::types::EmbeddingInput;
use mnemos_core::{EmbeddingAdapter, MnemosError};
use tracing::debug;

/// Embeds single texts with a fixed model.
#[derive(Clone)]
pub struct EmbeddingGateway {
    adapter: Arc<dyn EmbeddingAdapter>,
    model: String,
}

impl EmbeddingGateway {
    pub fn new(adapter: Arc<dyn EmbeddingAdapter>, model: impl Into<String>) -> Self {
        Self {
            adapter,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Embed one text. An empty response is an embedding failure.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, MnemosError> {
        let output = self
            .adapter
            .embed(EmbeddingInput {
                model: self.model.clone(),
                texts: vec![text.to_string()],
            })
            .await?;

        let embedding = output
            .embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| MnemosError::embedding("embedding service returned no vector"))?;
        debug!(model = %self.model, dimensions = embedding.len(), "embedded text");
        Ok(embedding)
    }
}
