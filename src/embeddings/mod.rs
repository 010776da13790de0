pub mod huggingface;

pub use huggingface::HfEmbedder;

use crate::error::Result;
use std::future::Future;

/// Batch text-to-vector seam between the ingestion pipeline and the
/// embedding provider. Output preserves input order.
pub trait Embedder: Send + Sync {
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}
