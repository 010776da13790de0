//! Startup wiring: build the provider clients, reconcile the vector index
//! with the documents folder, and start the watcher.

use crate::chat::GeminiChat;
use crate::config::{ChunkingConfig, Config};
use crate::embeddings::{Embedder, HfEmbedder};
use crate::error::{RagserveError, Result};
use crate::ingest::{discover_files, ingest_paths, Ledger};
use crate::query::QueryEngine;
use crate::vector::{PineconeClient, PineconeIndex, VectorWriter};
use crate::watch::{run_scan_loop, spawn_watcher, WatchController};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Read a required secret from the environment.
pub fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| RagserveError::Config(format!("environment variable {} not set", name)))
}

/// Everything the server needs once initialization finishes.
pub struct RagRuntime {
    pub engine: Arc<QueryEngine>,
    watcher: WatchController,
    scan_task: tokio::task::JoinHandle<Result<()>>,
}

impl RagRuntime {
    /// Stop watching and wait for any in-flight scan to finish, so a
    /// partially-applied ledger update is never abandoned.
    pub async fn shutdown(self) {
        self.watcher.stop();
        match self.scan_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("scan loop error: {}", e),
            Err(e) => log::warn!("scan loop did not exit cleanly: {}", e),
        }
    }
}

/// Build the provider clients from config and environment.
pub fn build_clients(config: &Config) -> Result<(HfEmbedder, PineconeClient, GeminiChat)> {
    let embedder = HfEmbedder::new(
        require_env(&config.embeddings.api_key_env)?,
        config.embeddings.model.clone(),
        config.embeddings.batch_size,
    )?;
    let pinecone = PineconeClient::new(require_env(&config.vector_store.api_key_env)?)?;
    let chat = GeminiChat::new(
        require_env(&config.chat.api_key_env)?,
        config.chat.model.clone(),
    )?;
    Ok((embedder, pinecone, chat))
}

/// Ensure the configured index exists and is ready.
pub async fn connect_index(config: &Config, pinecone: &PineconeClient) -> Result<PineconeIndex> {
    pinecone
        .ensure_index(
            &config.vector_store.index_name,
            config.embeddings.dimension,
            &config.vector_store.metric,
            Duration::from_secs(config.vector_store.ready_timeout_secs),
            config.vector_store.upsert_batch_size,
        )
        .await
}

/// Reconcile the local state with the vector index at startup.
///
/// When the index holds no records, any prior ledger is stale (the index was
/// wiped or recreated), so the whole root is re-ingested from a fresh ledger.
/// A non-empty index means earlier runs already did the bulk work; the ledger
/// is loaded as-is and not rewritten.
pub async fn reconcile<E, V>(
    record_count: u64,
    root: &Path,
    ledger_path: &Path,
    embedder: &E,
    index: &V,
    chunking: &ChunkingConfig,
) -> Result<Ledger>
where
    E: Embedder,
    V: VectorWriter,
{
    if record_count > 0 {
        log::info!("Index already populated; skipping bulk ingestion");
        return Ok(Ledger::load(ledger_path));
    }

    let mut ledger = Ledger::new(ledger_path);
    let files = discover_files(root)?;
    log::info!("Index is empty; ingesting {} files", files.len());
    let report = ingest_paths(&files, &mut ledger, embedder, index, chunking).await?;
    log::info!(
        "Bulk ingestion done: {} files, {} chunks, {} failures",
        report.files_processed,
        report.chunks_indexed,
        report.files_failed
    );
    Ok(ledger)
}

/// Full initialization: connect, reconcile, watch.
pub async fn initialize(config: &Config) -> Result<RagRuntime> {
    let (embedder, pinecone, chat) = build_clients(config)?;
    let index = connect_index(config, &pinecone).await?;

    let record_count = index.record_count().await?;
    let ledger = reconcile(
        record_count,
        config.data_root(),
        config.ledger_path(),
        &embedder,
        &index,
        &config.chunking,
    )
    .await?;
    let ledger = Arc::new(tokio::sync::Mutex::new(ledger));

    let (watcher, trigger_rx) = spawn_watcher(
        config.data_root(),
        Duration::from_millis(config.watch.debounce_ms),
    );
    let scan_task = tokio::spawn(run_scan_loop(
        trigger_rx,
        config.data_root().to_path_buf(),
        Arc::clone(&ledger),
        embedder.clone(),
        index.clone(),
        config.chunking.clone(),
    ));

    let engine = Arc::new(QueryEngine::new(
        embedder,
        index,
        chat,
        config.retrieval.top_k,
    ));

    Ok(RagRuntime {
        engine,
        watcher,
        scan_task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorRecord;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for CountingEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![vec![0.0; 4]; texts.len()])
        }
    }

    struct CollectingIndex {
        upserted: Mutex<Vec<VectorRecord>>,
    }

    impl CollectingIndex {
        fn new() -> Self {
            Self {
                upserted: Mutex::new(Vec::new()),
            }
        }
    }

    impl VectorWriter for CollectingIndex {
        async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
            self.upserted.lock().unwrap().extend_from_slice(records);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reconcile_skips_bulk_when_index_populated() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "hello world").unwrap();

        let ledger_path = temp_dir.path().join("ledger.json");
        fs::write(&ledger_path, r#"["prior.txt"]"#).unwrap();

        let embedder = CountingEmbedder::new();
        let index = CollectingIndex::new();
        let chunking = ChunkingConfig::default();

        let ledger = reconcile(42, &root, &ledger_path, &embedder, &index, &chunking)
            .await
            .unwrap();

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert!(index.upserted.lock().unwrap().is_empty());
        assert!(ledger.contains("prior.txt"));
        // Ledger file is not rewritten on the skip path.
        assert_eq!(fs::read_to_string(&ledger_path).unwrap(), r#"["prior.txt"]"#);
    }

    #[tokio::test]
    async fn test_reconcile_bulk_ingests_empty_index_from_fresh_ledger() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "hello world").unwrap();

        // A stale ledger must not suppress re-ingestion when the index is empty.
        let ledger_path = temp_dir.path().join("ledger.json");
        fs::write(
            &ledger_path,
            format!(r#"["{}"]"#, root.join("a.txt").display()),
        )
        .unwrap();

        let embedder = CountingEmbedder::new();
        let index = CollectingIndex::new();
        let chunking = ChunkingConfig::default();

        let ledger = reconcile(0, &root, &ledger_path, &embedder, &index, &chunking)
            .await
            .unwrap();

        assert_eq!(index.upserted.lock().unwrap().len(), 1);
        assert!(ledger.contains(&root.join("a.txt").display().to_string()));
    }

    #[test]
    fn test_require_env_present() {
        std::env::set_var("RAGSERVE_BOOTSTRAP_TEST_VAR", "value");
        assert_eq!(
            require_env("RAGSERVE_BOOTSTRAP_TEST_VAR").unwrap(),
            "value"
        );
        std::env::remove_var("RAGSERVE_BOOTSTRAP_TEST_VAR");
    }

    #[test]
    fn test_require_env_missing_names_variable() {
        let err = require_env("RAGSERVE_DEFINITELY_NOT_SET").unwrap_err();
        assert!(err.to_string().contains("RAGSERVE_DEFINITELY_NOT_SET"));
    }
}
