use crate::embeddings::Embedder;
use crate::error::{RagserveError, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const INFERENCE_BASE_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// Request structure for the HuggingFace feature-extraction pipeline
#[derive(Serialize)]
struct EmbeddingRequest {
    inputs: Vec<String>,
}

/// HuggingFace inference embeddings client
///
/// Handles batch embedding generation with retry logic for single-query
/// embedding on the retrieval path.
#[derive(Clone)]
pub struct HfEmbedder {
    client: Client,
    api_key: String,
    model: String,
    batch_size: usize,
}

impl HfEmbedder {
    /// Create a new embedder for `model` (e.g. "sentence-transformers/all-MiniLM-L6-v2").
    pub fn new(api_key: String, model: String, batch_size: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagserveError::Embedding(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model,
            batch_size: batch_size.max(1),
        })
    }

    /// Embed a batch of texts, automatically splitting into smaller batches.
    ///
    /// Returns one embedding per input text, in the same order.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            let embeddings = self.embed_batch_internal(chunk).await?;
            all_embeddings.extend(embeddings);

            // Small delay between full batches to stay under rate limits
            if chunk.len() == self.batch_size {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }

        Ok(all_embeddings)
    }

    /// Internal method to make a single API request
    async fn embed_batch_internal(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            inputs: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!(
                "{}/{}/pipeline/feature-extraction",
                INFERENCE_BASE_URL, self.model
            ))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RagserveError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(RagserveError::Embedding(format!(
                "HuggingFace API error {}: {}",
                status, body
            )));
        }

        let embeddings: Vec<Vec<f32>> = response
            .json()
            .await
            .map_err(|e| RagserveError::Embedding(format!("Failed to parse response: {}", e)))?;

        if embeddings.len() != texts.len() {
            return Err(RagserveError::Embedding(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }

    /// Embed a single query text with retry on rate-limit and server errors.
    pub async fn embed_query(&self, text: &str, max_retries: usize) -> Result<Vec<f32>> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.embed_batch_internal(&[text.to_string()]).await {
                Ok(mut embeddings) => {
                    if embeddings.is_empty() {
                        return Err(RagserveError::Embedding(
                            "Empty response from HuggingFace API".to_string(),
                        ));
                    }
                    return Ok(embeddings.remove(0));
                }
                Err(e) if attempt < max_retries => {
                    let message = e.to_string();
                    let should_retry = message.contains("429")
                        || message.contains("500")
                        || message.contains("502")
                        || message.contains("503")
                        || message.contains("504");

                    if should_retry {
                        log::warn!("Retry {}/{} after error: {}", attempt + 1, max_retries, e);
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        attempt += 1;
                    } else {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Embedder for HfEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_batch(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedder_new() {
        let embedder = HfEmbedder::new(
            "test-key".to_string(),
            "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            64,
        )
        .unwrap();

        assert_eq!(embedder.model, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(embedder.batch_size, 64);
    }

    #[test]
    fn test_embedder_batch_size_floor() {
        let embedder =
            HfEmbedder::new("test-key".to_string(), "model".to_string(), 0).unwrap();
        assert_eq!(embedder.batch_size, 1);
    }

    #[tokio::test]
    async fn test_embed_batch_empty_input() {
        let embedder =
            HfEmbedder::new("test-key".to_string(), "model".to_string(), 64).unwrap();
        let embeddings = embedder.embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
