//! Ingestion pipeline: load, chunk, embed, upsert, mark-processed.
//!
//! Used for both bulk initial ingestion and incremental updates from the
//! watcher. Commits at per-file granularity: a file is marked processed only
//! after all of its chunks are embedded and upserted, so a partial failure
//! leaves the remaining files eligible for retry on the next trigger.

use crate::config::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::{RagserveError, Result};
use crate::ingest::chunker::chunk_document;
use crate::ingest::ledger::Ledger;
use crate::ingest::loader::load_document;
use crate::vector::{record_id, RecordMetadata, VectorRecord, VectorWriter};
use std::path::{Path, PathBuf};

/// Outcome of one pipeline pass.
#[derive(Debug, Default, PartialEq)]
pub struct IngestReport {
    pub files_processed: usize,
    pub files_failed: usize,
    pub chunks_indexed: usize,
}

/// Ingest the given files: for each, load, chunk, embed, upsert, then mark
/// it processed in the ledger and persist the ledger.
///
/// Paths already in the ledger are skipped without any embedding or upsert
/// call. A failure on one file is logged and counted; it never aborts the
/// rest of the batch, and the failed file stays out of the ledger.
pub async fn ingest_paths<E, V>(
    paths: &[PathBuf],
    ledger: &mut Ledger,
    embedder: &E,
    index: &V,
    chunking: &ChunkingConfig,
) -> Result<IngestReport>
where
    E: Embedder,
    V: VectorWriter,
{
    let mut report = IngestReport::default();
    // chunkIndex values must be unique within one ingestion batch.
    let mut next_chunk_index = 0usize;

    for path in paths {
        let source = path.display().to_string();
        if ledger.contains(&source) {
            continue;
        }

        match ingest_file(path, embedder, index, chunking, &mut next_chunk_index).await {
            Ok(chunk_count) => {
                ledger.mark_processed([source]);
                ledger.persist()?;
                report.files_processed += 1;
                report.chunks_indexed += chunk_count;
            }
            Err(e) => {
                log::error!("Failed to ingest {}: {}", source, e);
                report.files_failed += 1;
            }
        }
    }

    if report.files_processed > 0 || report.files_failed > 0 {
        log::info!(
            "Ingestion pass complete: {} file(s) indexed ({} chunks), {} failed",
            report.files_processed,
            report.chunks_indexed,
            report.files_failed
        );
    }

    Ok(report)
}

/// Load, chunk, embed, and upsert one file. Returns the number of chunks
/// indexed. The caller marks the file processed only on success.
async fn ingest_file<E, V>(
    path: &Path,
    embedder: &E,
    index: &V,
    chunking: &ChunkingConfig,
    next_chunk_index: &mut usize,
) -> Result<usize>
where
    E: Embedder,
    V: VectorWriter,
{
    let doc = load_document(path)?;
    let chunks = chunk_document(&doc, chunking, next_chunk_index);

    if chunks.is_empty() {
        log::debug!("{}: no content to index", path.display());
        return Ok(0);
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed(&texts).await?;

    if embeddings.len() != chunks.len() {
        return Err(RagserveError::Embedding(format!(
            "expected {} embeddings for {}, got {}",
            chunks.len(),
            path.display(),
            embeddings.len()
        )));
    }

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(ordinal, (chunk, values))| VectorRecord {
            id: record_id(&chunk.source_path, ordinal, &chunk.text),
            values,
            metadata: RecordMetadata {
                text: chunk.text.clone(),
                source: chunk.source_path.clone(),
                chunk_index: chunk.chunk_index,
            },
        })
        .collect();

    index.upsert(&records).await?;

    Ok(records.len())
}
