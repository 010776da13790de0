pub mod pinecone;

pub use pinecone::{PineconeClient, PineconeIndex};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;

/// Metadata stored alongside each vector, returned verbatim on query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub text: String,
    pub source: String,
    #[serde(rename = "chunkIndex")]
    pub chunk_index: usize,
}

/// The persisted unit in the vector store.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// A similarity-search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    pub metadata: Option<RecordMetadata>,
}

/// Deterministic record id for one chunk of one source file.
///
/// Hashing the source path, the chunk's ordinal within its document, and the
/// chunk text makes ids unique across files and batches while staying stable
/// across runs, so re-ingesting an unchanged file overwrites in place instead
/// of duplicating records.
pub fn record_id(source: &str, ordinal: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(ordinal.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Write-side seam between the ingestion pipeline and the vector store.
pub trait VectorWriter: Send + Sync {
    fn upsert(&self, records: &[VectorRecord]) -> impl Future<Output = Result<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_deterministic() {
        let a = record_id("data/a.txt", 0, "hello");
        let b = record_id("data/a.txt", 0, "hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_record_id_unique_per_chunk() {
        let base = record_id("data/a.txt", 0, "hello");
        assert_ne!(base, record_id("data/a.txt", 1, "hello"));
        assert_ne!(base, record_id("data/b.txt", 0, "hello"));
        assert_ne!(base, record_id("data/a.txt", 0, "hello!"));
    }

    #[test]
    fn test_metadata_serializes_camel_case_chunk_index() {
        let meta = RecordMetadata {
            text: "t".into(),
            source: "s".into(),
            chunk_index: 7,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["chunkIndex"], 7);
    }
}
