//! Pinecone serverless REST gateway: index lifecycle, batched upsert,
//! stats, and similarity query.

use crate::error::{RagserveError, Result};
use crate::vector::{QueryMatch, RecordMetadata, VectorRecord, VectorWriter};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2025-01";

#[derive(Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: &'a str,
    spec: IndexSpec,
}

#[derive(Serialize)]
struct IndexSpec {
    serverless: ServerlessSpec,
}

#[derive(Serialize)]
struct ServerlessSpec {
    cloud: &'static str,
    region: &'static str,
}

#[derive(Deserialize)]
struct ListIndexesResponse {
    #[serde(default)]
    indexes: Vec<IndexSummary>,
}

#[derive(Deserialize)]
struct IndexSummary {
    name: String,
}

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
    status: IndexStatus,
}

#[derive(Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    vector: &'a [f32],
    #[serde(rename = "topK")]
    top_k: usize,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(rename = "totalVectorCount", default)]
    total_vector_count: u64,
}

/// Control-plane client: lists, creates, and describes indexes.
#[derive(Clone)]
pub struct PineconeClient {
    http: Client,
    api_key: String,
}

impl PineconeClient {
    pub fn new(api_key: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagserveError::VectorStore(format!("HTTP client: {}", e)))?;
        Ok(Self { http, api_key })
    }

    pub async fn list_indexes(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/indexes", CONTROL_PLANE_URL))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| RagserveError::VectorStore(format!("list indexes: {}", e)))?;

        let body: ListIndexesResponse = check_response(response, "list indexes").await?;
        Ok(body.indexes.into_iter().map(|i| i.name).collect())
    }

    pub async fn create_index(&self, name: &str, dimension: usize, metric: &str) -> Result<()> {
        let request = CreateIndexRequest {
            name,
            dimension,
            metric,
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: "aws",
                    region: "us-east-1",
                },
            },
        };

        let response = self
            .http
            .post(format!("{}/indexes", CONTROL_PLANE_URL))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagserveError::VectorStore(format!("create index: {}", e)))?;

        // 409 means another process created it first, which is fine.
        if response.status() == reqwest::StatusCode::CONFLICT {
            return Ok(());
        }
        let _ = check_response::<serde_json::Value>(response, "create index").await?;
        Ok(())
    }

    async fn describe_index(&self, name: &str) -> Result<DescribeIndexResponse> {
        let response = self
            .http
            .get(format!("{}/indexes/{}", CONTROL_PLANE_URL, name))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| RagserveError::VectorStore(format!("describe index: {}", e)))?;

        check_response(response, "describe index").await
    }

    /// Ensure the named index exists and is ready, creating it if absent.
    ///
    /// Readiness is polled with exponential backoff up to `ready_timeout`;
    /// persistent non-readiness is a fatal error rather than an open-ended
    /// wait. Returns a data-plane handle bound to the index host.
    pub async fn ensure_index(
        &self,
        name: &str,
        dimension: usize,
        metric: &str,
        ready_timeout: Duration,
        upsert_batch_size: usize,
    ) -> Result<PineconeIndex> {
        let existing = self.list_indexes().await?;
        if !existing.iter().any(|n| n == name) {
            log::info!("Creating vector index '{}' (dimension {})", name, dimension);
            self.create_index(name, dimension, metric).await?;
        }

        let deadline = Instant::now() + ready_timeout;
        let mut delay = Duration::from_secs(1);

        loop {
            let described = self.describe_index(name).await?;
            if described.status.ready {
                log::info!("Connected to vector index '{}'", name);
                return Ok(PineconeIndex {
                    http: self.http.clone(),
                    api_key: self.api_key.clone(),
                    host: described.host,
                    dimension,
                    upsert_batch_size,
                });
            }

            if Instant::now() + delay > deadline {
                return Err(RagserveError::VectorStore(format!(
                    "index '{}' not ready within {:?} (state: {})",
                    name, ready_timeout, described.status.state
                )));
            }

            log::info!(
                "Waiting for index '{}' to become ready (state: {})",
                name,
                described.status.state
            );
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_secs(15));
        }
    }
}

/// Data-plane handle for one index: batched upsert, stats, and query.
#[derive(Clone)]
pub struct PineconeIndex {
    http: Client,
    api_key: String,
    host: String,
    dimension: usize,
    upsert_batch_size: usize,
}

impl PineconeIndex {
    /// Bind directly to a known index host, bypassing the control plane.
    pub fn new(
        host: String,
        api_key: String,
        dimension: usize,
        upsert_batch_size: usize,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagserveError::VectorStore(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            api_key,
            host,
            dimension,
            upsert_batch_size: upsert_batch_size.max(1),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Send records in fixed-size batches.
    ///
    /// Every embedding must match the index dimension; a mismatch is a hard
    /// failure before anything is sent. A failed batch error names its offset
    /// so the caller can retry or remediate, and is never swallowed.
    pub async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            if record.values.len() != self.dimension {
                return Err(RagserveError::VectorStore(format!(
                    "embedding dimension {} does not match index dimension {} (record {})",
                    record.values.len(),
                    self.dimension,
                    record.id
                )));
            }
        }

        for (batch_number, batch) in records.chunks(self.upsert_batch_size).enumerate() {
            let offset = batch_number * self.upsert_batch_size;
            let request = UpsertRequest { vectors: batch };

            let response = self
                .http
                .post(format!("https://{}/vectors/upsert", self.host))
                .header("Api-Key", &self.api_key)
                .header("X-Pinecone-API-Version", API_VERSION)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    RagserveError::VectorStore(format!(
                        "upsert batch at offset {}: {}",
                        offset, e
                    ))
                })?;

            let _ = check_response::<serde_json::Value>(
                response,
                &format!("upsert batch at offset {}", offset),
            )
            .await?;

            log::debug!("Upserted batch of {} records (offset {})", batch.len(), offset);
        }

        Ok(())
    }

    /// Current total record count, used at startup to decide whether bulk
    /// ingestion is needed.
    pub async fn record_count(&self) -> Result<u64> {
        let response = self
            .http
            .post(format!("https://{}/describe_index_stats", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RagserveError::VectorStore(format!("index stats: {}", e)))?;

        let stats: StatsResponse = check_response(response, "index stats").await?;
        Ok(stats.total_vector_count)
    }

    /// Similarity search returning the top `top_k` matches with metadata.
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
        };

        let response = self
            .http
            .post(format!("https://{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagserveError::VectorStore(format!("query: {}", e)))?;

        let body: QueryResponse = check_response(response, "query").await?;
        Ok(body.matches)
    }
}

impl VectorWriter for PineconeIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        PineconeIndex::upsert(self, records).await
    }
}

async fn check_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error response".to_string());
        return Err(RagserveError::VectorStore(format!(
            "{} failed with {}: {}",
            context, status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| RagserveError::VectorStore(format!("{}: invalid response: {}", context, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_index() -> PineconeIndex {
        PineconeIndex {
            http: Client::new(),
            api_key: "test-key".to_string(),
            host: "unused.example".to_string(),
            dimension: 3,
            upsert_batch_size: 100,
        }
    }

    fn record(values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: "r1".to_string(),
            values,
            metadata: RecordMetadata {
                text: "t".into(),
                source: "s".into(),
                chunk_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_empty_is_noop() {
        let index = test_index();
        assert!(index.upsert(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_upsert_rejects_dimension_mismatch() {
        let index = test_index();
        // Validation happens before any network I/O.
        let err = index.upsert(&[record(vec![1.0, 2.0])]).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("dimension"), "unexpected error: {}", msg);
        assert!(msg.contains("r1"));
    }

    #[test]
    fn test_query_request_shape() {
        let request = QueryRequest {
            vector: &[0.1, 0.2],
            top_k: 4,
            include_metadata: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["topK"], 4);
        assert_eq!(json["includeMetadata"], true);
    }
}
